//! Hardware matrix effects.
//!
//! Every setter writes its driver attribute first. Only when the write went
//! through is the backlight zone updated and the change announced.

use log::debug;

use super::{announce, remember};
use crate::{
    capability::{Args, Value},
    device::{Device, Zone},
    error::RazerResult,
};

pub(super) fn set_wave(device: &Device, args: &Args<'_>) -> RazerResult<Value> {
    let direction: u8 = match args.i32(0)? {
        2 => 2,
        _ => 1,
    };
    device.write_attribute("matrix_effect_wave", direction.to_string())?;
    remember(device, Zone::Backlight, "wave", &[]);
    device.update_zone(Zone::Backlight, |zone| zone.wave_direction = direction);
    device.persist(Some(Zone::Backlight), "wave_dir", direction);
    announce(device, "setWave", &[Value::I32(i32::from(direction))]);
    Ok(Value::Unit)
}

pub(super) fn set_static(device: &Device, args: &Args<'_>) -> RazerResult<Value> {
    let rgb = args.rgb(0)?;
    device.write_attribute("matrix_effect_static", rgb)?;
    remember(device, Zone::Backlight, "static", &rgb);
    announce(device, "setStatic", args.values());
    Ok(Value::Unit)
}

pub(super) fn set_spectrum(device: &Device, _: &Args<'_>) -> RazerResult<Value> {
    device.write_attribute("matrix_effect_spectrum", "1")?;
    remember(device, Zone::Backlight, "spectrum", &[]);
    announce(device, "setSpectrum", &[]);
    Ok(Value::Unit)
}

pub(super) fn set_none(device: &Device, _: &Args<'_>) -> RazerResult<Value> {
    device.write_attribute("matrix_effect_none", "1")?;
    remember(device, Zone::Backlight, "none", &[]);
    announce(device, "setNone", &[]);
    Ok(Value::Unit)
}

/// Speed outside `1..=4` falls back to 4.
pub(super) fn set_reactive(device: &Device, args: &Args<'_>) -> RazerResult<Value> {
    let rgb = args.rgb(0)?;
    let speed = match args.u8(3)? {
        speed @ 1..=4 => speed,
        _ => 4,
    };
    device.write_attribute("matrix_effect_reactive", [speed, rgb[0], rgb[1], rgb[2]])?;
    remember(device, Zone::Backlight, "reactive", &rgb);
    device.update_zone(Zone::Backlight, |zone| zone.speed = speed);
    device.persist(Some(Zone::Backlight), "speed", speed);
    announce(
        device,
        "setReactive",
        &[Value::U8(rgb[0]), Value::U8(rgb[1]), Value::U8(rgb[2]), Value::U8(speed)],
    );
    Ok(Value::Unit)
}

pub(super) fn set_breath_random(device: &Device, _: &Args<'_>) -> RazerResult<Value> {
    device.write_attribute("matrix_effect_breath", "1")?;
    remember(device, Zone::Backlight, "breathRandom", &[]);
    announce(device, "setBreathRandom", &[]);
    Ok(Value::Unit)
}

fn set_breath(device: &Device, args: &Args<'_>, effect: &str, method: &str) -> RazerResult<Value> {
    let colors = (0..args.values().len())
        .map(|index| args.u8(index))
        .collect::<RazerResult<Vec<u8>>>()?;
    device.write_attribute("matrix_effect_breath", &colors)?;
    remember(device, Zone::Backlight, effect, &colors);
    announce(device, method, args.values());
    Ok(Value::Unit)
}

pub(super) fn set_breath_single(device: &Device, args: &Args<'_>) -> RazerResult<Value> {
    set_breath(device, args, "breathSingle", "setBreathSingle")
}

pub(super) fn set_breath_dual(device: &Device, args: &Args<'_>) -> RazerResult<Value> {
    set_breath(device, args, "breathDual", "setBreathDual")
}

pub(super) fn set_breath_triple(device: &Device, args: &Args<'_>) -> RazerResult<Value> {
    set_breath(device, args, "breathTriple", "setBreathTriple")
}

/// Shows the frame buffer filled by `setKeyRow`.
pub(super) fn set_custom(device: &Device, _: &Args<'_>) -> RazerResult<Value> {
    device.write_attribute("matrix_effect_custom", "1")?;
    Ok(Value::Unit)
}

/// Payload is `[row, start_col, end_col, r, g, b, ...]`.
pub(super) fn set_key_row(device: &Device, args: &Args<'_>) -> RazerResult<Value> {
    let payload = args.bytes(0)?;
    if payload.is_empty() {
        debug!("[{}] empty key row ignored", device.serial());
        return Ok(Value::Unit);
    }
    device.write_attribute("matrix_custom_frame", payload)?;
    Ok(Value::Unit)
}

pub(super) fn get_effect(device: &Device, _: &Args<'_>) -> RazerResult<Value> {
    Ok(Value::Str(device.zone(Zone::Backlight).effect))
}

pub(super) fn get_effect_colors(device: &Device, _: &Args<'_>) -> RazerResult<Value> {
    Ok(Value::Bytes(device.zone(Zone::Backlight).colors.to_vec()))
}

pub(super) fn get_effect_speed(device: &Device, _: &Args<'_>) -> RazerResult<Value> {
    Ok(Value::U8(device.zone(Zone::Backlight).speed))
}
