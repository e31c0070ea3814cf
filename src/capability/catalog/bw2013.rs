//! Single-colour BlackWidow effects. The colour is fixed by the hardware.

use super::{announce, remember};
use crate::{
    capability::{Args, Value},
    device::{Device, Zone},
    error::RazerResult,
};

pub(super) fn set_pulsate(device: &Device, _: &Args<'_>) -> RazerResult<Value> {
    device.write_attribute("matrix_effect_pulsate", "1")?;
    remember(device, Zone::Backlight, "pulsate", &[]);
    announce(device, "setPulsate", &[]);
    Ok(Value::Unit)
}

pub(super) fn set_static(device: &Device, _: &Args<'_>) -> RazerResult<Value> {
    device.write_attribute("matrix_effect_static", "1")?;
    remember(device, Zone::Backlight, "static", &[]);
    announce(device, "setStatic", &[]);
    Ok(Value::Unit)
}
