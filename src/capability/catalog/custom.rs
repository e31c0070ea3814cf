//! Daemon-rendered effects.
//!
//! These methods touch no driver attribute. They record the choice and
//! announce it; the device's effect managers pick the announcement up and
//! start drawing frames.

use super::{announce, remember};
use crate::{
    capability::{Args, Value},
    device::{Device, Zone},
    error::RazerResult,
};

fn start(
    device: &Device,
    args: &Args<'_>,
    effect: &str,
    trigger: &str,
    colour: bool,
) -> RazerResult<Value> {
    let colors = if colour { args.rgb(0)?.to_vec() } else { Vec::new() };
    remember(device, Zone::Backlight, effect, &colors);
    if let Some(path) = args.values().iter().find_map(Value::as_str) {
        device.persist(Some(Zone::Backlight), "config_file", path);
    }
    announce(device, trigger, args.values());
    Ok(Value::Unit)
}

pub(super) fn set_ripple(device: &Device, args: &Args<'_>) -> RazerResult<Value> {
    start(device, args, "ripple", "setRipple", true)
}

pub(super) fn set_ripple_random_colour(device: &Device, args: &Args<'_>) -> RazerResult<Value> {
    start(device, args, "rippleRandomColour", "setRipple", false)
}

pub(super) fn set_ripple_config_file(device: &Device, args: &Args<'_>) -> RazerResult<Value> {
    start(device, args, "rippleConfigFile", "setRipple", true)
}

pub(super) fn set_reactive2(device: &Device, args: &Args<'_>) -> RazerResult<Value> {
    start(device, args, "reactive2", "setReactive2", true)
}

pub(super) fn set_reactive2_random_colour(device: &Device, args: &Args<'_>) -> RazerResult<Value> {
    start(device, args, "reactive2RandomColour", "setReactive2", false)
}

pub(super) fn set_reactive2_config_file(device: &Device, args: &Args<'_>) -> RazerResult<Value> {
    start(device, args, "reactive2ConfigFile", "setReactive2", true)
}

pub(super) fn set_wheel(device: &Device, args: &Args<'_>) -> RazerResult<Value> {
    start(device, args, "wheel", "setWheel", false)
}

pub(super) fn set_fire(device: &Device, args: &Args<'_>) -> RazerResult<Value> {
    start(device, args, "fire", "setFire", false)
}

pub(super) fn set_fire_variant(device: &Device, args: &Args<'_>) -> RazerResult<Value> {
    start(device, args, "fireVariant", "setFire", false)
}

pub(super) fn set_fire_palette(device: &Device, args: &Args<'_>) -> RazerResult<Value> {
    start(device, args, "firePalette", "setFire", false)
}
