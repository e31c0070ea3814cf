//! Game mode and macro LED switches.

use super::flag;
use crate::{
    capability::{Args, Value},
    device::Device,
    error::{RazerError, RazerResult},
};

fn read_flag(device: &Device, attribute: &str) -> RazerResult<Value> {
    Ok(Value::Bool(device.read_text(attribute)? == "1"))
}

pub(super) fn get_game_mode(device: &Device, _: &Args<'_>) -> RazerResult<Value> {
    read_flag(device, "game_led_state")
}

pub(super) fn set_game_mode(device: &Device, args: &Args<'_>) -> RazerResult<Value> {
    device.write_attribute("game_led_state", flag(args.bool(0)?))?;
    Ok(Value::Unit)
}

pub(super) fn get_macro_mode(device: &Device, _: &Args<'_>) -> RazerResult<Value> {
    read_flag(device, "macro_led_state")
}

pub(super) fn set_macro_mode(device: &Device, args: &Args<'_>) -> RazerResult<Value> {
    device.write_attribute("macro_led_state", flag(args.bool(0)?))?;
    Ok(Value::Unit)
}

pub(super) fn get_macro_effect(device: &Device, _: &Args<'_>) -> RazerResult<Value> {
    let text = device.read_text("macro_led_effect")?;
    text.parse::<i32>()
        .map(Value::I32)
        .map_err(|e| RazerError::MalformedAttribute {
            attribute: "macro_led_effect".to_string(),
            detail: format!("{text:?}: {e}"),
        })
}

pub(super) fn set_macro_effect(device: &Device, args: &Args<'_>) -> RazerResult<Value> {
    device.write_attribute("macro_led_effect", args.u8(0)?.to_string())?;
    Ok(Value::Unit)
}
