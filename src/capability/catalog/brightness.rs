use log::debug;

use super::{announce, scale_brightness};
use crate::{
    capability::{Args, Value},
    device::{Device, Zone},
    error::RazerResult,
};

pub(super) fn get_brightness(device: &Device, _: &Args<'_>) -> RazerResult<Value> {
    Ok(Value::F64(device.zone(Zone::Backlight).brightness))
}

/// Percent brightness of the whole matrix, written to the driver as 0..=255.
pub(super) fn set_brightness(device: &Device, args: &Args<'_>) -> RazerResult<Value> {
    let (percent, raw) = scale_brightness(args.f64(0)?);
    debug!("[{}] brightness {percent}%", device.serial());

    device.write_attribute("matrix_brightness", raw.to_string())?;
    device.update_zone(Zone::Backlight, |zone| zone.brightness = percent);
    device.persist(Some(Zone::Backlight), "brightness", percent);
    announce(device, "setBrightness", &[Value::F64(percent)]);
    Ok(Value::Unit)
}
