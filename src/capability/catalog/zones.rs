//! Logo and scroll wheel LEDs.
//!
//! Both zones share one driver layout: `<zone>_led_state`,
//! `<zone>_led_brightness`, `<zone>_led_rgb` and `<zone>_led_effect`.

use super::{announce, flag, remember, scale_brightness};
use crate::{
    capability::{Args, Value},
    device::{Device, Zone},
    error::{RazerError, RazerResult},
};

const EFFECT_STATIC: &str = "0";
const EFFECT_BLINKING: &str = "1";
const EFFECT_PULSATE: &str = "2";
const EFFECT_SPECTRUM: &str = "4";

fn attribute(zone: Zone, name: &str) -> String {
    format!("{}_led_{}", zone.as_str(), name)
}

fn get_active(device: &Device, zone: Zone) -> RazerResult<Value> {
    Ok(Value::Bool(device.zone(zone).active))
}

fn set_active(device: &Device, zone: Zone, args: &Args<'_>) -> RazerResult<Value> {
    let active = args.bool(0)?;
    device.write_attribute(&attribute(zone, "state"), flag(active))?;
    device.update_zone(zone, |state| state.active = active);
    device.persist(Some(zone), "active", active);
    Ok(Value::Unit)
}

fn get_brightness(device: &Device, zone: Zone) -> RazerResult<Value> {
    Ok(Value::F64(device.zone(zone).brightness))
}

fn set_brightness(device: &Device, zone: Zone, args: &Args<'_>) -> RazerResult<Value> {
    let (percent, raw) = scale_brightness(args.f64(0)?);
    device.write_attribute(&attribute(zone, "brightness"), raw.to_string())?;
    device.update_zone(zone, |state| state.brightness = percent);
    device.persist(Some(zone), "brightness", percent);
    announce(device, "setBrightness", &[Value::F64(percent)]);
    Ok(Value::Unit)
}

/// Writes the colour, then the effect code that uses it.
fn set_coloured(
    device: &Device,
    zone: Zone,
    args: &Args<'_>,
    code: &str,
    effect: &str,
) -> RazerResult<()> {
    let rgb = args.rgb(0)?;
    device.write_attribute(&attribute(zone, "rgb"), rgb)?;
    device.write_attribute(&attribute(zone, "effect"), code)?;
    remember(device, zone, effect, &rgb);
    Ok(())
}

fn set_static(device: &Device, zone: Zone, args: &Args<'_>) -> RazerResult<Value> {
    set_coloured(device, zone, args, EFFECT_STATIC, "static")?;
    announce(device, "setStatic", args.values());
    Ok(Value::Unit)
}

fn set_pulsate(device: &Device, zone: Zone, args: &Args<'_>) -> RazerResult<Value> {
    set_coloured(device, zone, args, EFFECT_PULSATE, "pulsate")?;
    announce(device, "setPulsate", &[]);
    Ok(Value::Unit)
}

fn set_blinking(device: &Device, zone: Zone, args: &Args<'_>) -> RazerResult<Value> {
    set_coloured(device, zone, args, EFFECT_BLINKING, "blinking")?;
    Ok(Value::Unit)
}

fn set_spectrum(device: &Device, zone: Zone) -> RazerResult<Value> {
    device.write_attribute(&attribute(zone, "effect"), EFFECT_SPECTRUM)?;
    remember(device, zone, "spectrum", &[]);
    announce(device, "setSpectrum", &[]);
    Ok(Value::Unit)
}

fn get_effect(device: &Device, zone: Zone) -> RazerResult<Value> {
    let name = attribute(zone, "effect");
    let text = device.read_text(&name)?;
    text.parse::<u8>()
        .map(Value::U8)
        .map_err(|e| RazerError::MalformedAttribute {
            attribute: name,
            detail: format!("{text:?}: {e}"),
        })
}

pub(super) fn get_logo_active(device: &Device, _: &Args<'_>) -> RazerResult<Value> {
    get_active(device, Zone::Logo)
}

pub(super) fn set_logo_active(device: &Device, args: &Args<'_>) -> RazerResult<Value> {
    set_active(device, Zone::Logo, args)
}

pub(super) fn get_logo_brightness(device: &Device, _: &Args<'_>) -> RazerResult<Value> {
    get_brightness(device, Zone::Logo)
}

pub(super) fn set_logo_brightness(device: &Device, args: &Args<'_>) -> RazerResult<Value> {
    set_brightness(device, Zone::Logo, args)
}

pub(super) fn set_logo_static(device: &Device, args: &Args<'_>) -> RazerResult<Value> {
    set_static(device, Zone::Logo, args)
}

pub(super) fn set_logo_pulsate(device: &Device, args: &Args<'_>) -> RazerResult<Value> {
    set_pulsate(device, Zone::Logo, args)
}

pub(super) fn set_logo_blinking(device: &Device, args: &Args<'_>) -> RazerResult<Value> {
    set_blinking(device, Zone::Logo, args)
}

pub(super) fn set_logo_spectrum(device: &Device, _: &Args<'_>) -> RazerResult<Value> {
    set_spectrum(device, Zone::Logo)
}

pub(super) fn get_logo_effect(device: &Device, _: &Args<'_>) -> RazerResult<Value> {
    get_effect(device, Zone::Logo)
}

pub(super) fn get_scroll_active(device: &Device, _: &Args<'_>) -> RazerResult<Value> {
    get_active(device, Zone::Scroll)
}

pub(super) fn set_scroll_active(device: &Device, args: &Args<'_>) -> RazerResult<Value> {
    set_active(device, Zone::Scroll, args)
}

pub(super) fn get_scroll_brightness(device: &Device, _: &Args<'_>) -> RazerResult<Value> {
    get_brightness(device, Zone::Scroll)
}

pub(super) fn set_scroll_brightness(device: &Device, args: &Args<'_>) -> RazerResult<Value> {
    set_brightness(device, Zone::Scroll, args)
}

pub(super) fn set_scroll_static(device: &Device, args: &Args<'_>) -> RazerResult<Value> {
    set_static(device, Zone::Scroll, args)
}

pub(super) fn set_scroll_pulsate(device: &Device, args: &Args<'_>) -> RazerResult<Value> {
    set_pulsate(device, Zone::Scroll, args)
}

pub(super) fn set_scroll_blinking(device: &Device, args: &Args<'_>) -> RazerResult<Value> {
    set_blinking(device, Zone::Scroll, args)
}

pub(super) fn set_scroll_spectrum(device: &Device, _: &Args<'_>) -> RazerResult<Value> {
    set_spectrum(device, Zone::Scroll)
}

pub(super) fn get_scroll_effect(device: &Device, _: &Args<'_>) -> RazerResult<Value> {
    get_effect(device, Zone::Scroll)
}
