//! Explicit table of every endpoint the daemon knows.
//!
//! Handlers are grouped by namespace. Each one reads or writes driver
//! attributes through the device, updates the zone cache, persists what the
//! user chose and announces lighting changes to the directory.

mod brightness;
mod bw2013;
mod chroma;
mod custom;
mod misc;
mod modes;
mod zones;

use super::{CapabilityEndpoint, Value, ValueKind};
use crate::device::{Device, Zone};

pub const MISC: &str = "razer.device.misc";
pub const BRIGHTNESS: &str = "razer.device.lighting.brightness";
pub const GAME_MODE: &str = "razer.device.led.gamemode";
pub const MACRO_MODE: &str = "razer.device.led.macromode";
pub const CHROMA: &str = "razer.device.lighting.chroma";
pub const BW2013: &str = "razer.device.lighting.bw2013";
pub const LOGO: &str = "razer.device.lighting.logo";
pub const SCROLL: &str = "razer.device.lighting.scroll";
pub const CUSTOM: &str = "razer.device.lighting.custom";

const NONE: &[ValueKind] = &[];
const BYTE: &[ValueKind] = &[ValueKind::U8];
const BYTES: &[ValueKind] = &[ValueKind::Bytes];
const FLAG: &[ValueKind] = &[ValueKind::Bool];
const LEVEL: &[ValueKind] = &[ValueKind::F64];
const RGB: &[ValueKind] = &[ValueKind::U8, ValueKind::U8, ValueKind::U8];
const RGB2: &[ValueKind] = &[
    ValueKind::U8, ValueKind::U8, ValueKind::U8,
    ValueKind::U8, ValueKind::U8, ValueKind::U8,
];
const RGB3: &[ValueKind] = &[
    ValueKind::U8, ValueKind::U8, ValueKind::U8,
    ValueKind::U8, ValueKind::U8, ValueKind::U8,
    ValueKind::U8, ValueKind::U8, ValueKind::U8,
];
const RGB_SPEED: &[ValueKind] = &[ValueKind::U8, ValueKind::U8, ValueKind::U8, ValueKind::U8];
const RGB_REFRESH: &[ValueKind] = &[ValueKind::U8, ValueKind::U8, ValueKind::U8, ValueKind::F64];
const RGB_FILE_REFRESH: &[ValueKind] = &[
    ValueKind::U8,
    ValueKind::U8,
    ValueKind::U8,
    ValueKind::Str,
    ValueKind::F64,
];
const MODE: &[ValueKind] = &[ValueKind::U8, ValueKind::U8];
const DIRECTION: &[ValueKind] = &[ValueKind::I32];
const DIRECTION_REFRESH: &[ValueKind] = &[ValueKind::U8, ValueKind::F64];
const SPEED_VARIANT: &[ValueKind] = &[ValueKind::U8, ValueKind::U8];
const SPEED_PALETTE: &[ValueKind] = &[ValueKind::U8, ValueKind::Bytes];

const INTS: ValueKind = ValueKind::Array(&ValueKind::I32);

/// Every endpoint, in registration order.
pub fn endpoints() -> Vec<CapabilityEndpoint> {
    use CapabilityEndpoint as E;
    use ValueKind as K;

    vec![
        E::new("get_serial", MISC, "getSerial", NONE, K::Str, misc::get_serial),
        E::new("get_firmware", MISC, "getFirmware", NONE, K::Str, misc::get_firmware),
        E::new("get_device_name", MISC, "getDeviceName", NONE, K::Str, misc::get_device_name),
        E::new("get_device_type", MISC, "getDeviceType", NONE, K::Str, misc::get_device_type),
        E::new("get_vid_pid", MISC, "getVidPid", NONE, INTS, misc::get_vid_pid),
        E::new("has_matrix", MISC, "hasMatrix", NONE, K::Bool, misc::has_matrix),
        E::new("get_matrix_dims", MISC, "getMatrixDimensions", NONE, INTS, misc::get_matrix_dims),
        E::new("get_device_mode", MISC, "getDeviceMode", NONE, K::Str, misc::get_device_mode),
        E::new("set_device_mode", MISC, "setDeviceMode", MODE, K::Unit, misc::set_device_mode),
        E::new("suspend_device", MISC, "suspendDevice", NONE, K::Unit, misc::suspend_device),
        E::new("resume_device", MISC, "resumeDevice", NONE, K::Unit, misc::resume_device),

        E::new("get_brightness", BRIGHTNESS, "getBrightness", NONE, K::F64, brightness::get_brightness),
        E::new("set_brightness", BRIGHTNESS, "setBrightness", LEVEL, K::Unit, brightness::set_brightness),

        E::new("get_game_mode", GAME_MODE, "getGameMode", NONE, K::Bool, modes::get_game_mode),
        E::new("set_game_mode", GAME_MODE, "setGameMode", FLAG, K::Unit, modes::set_game_mode),
        E::new("get_macro_mode", MACRO_MODE, "getMacroMode", NONE, K::Bool, modes::get_macro_mode),
        E::new("set_macro_mode", MACRO_MODE, "setMacroMode", FLAG, K::Unit, modes::set_macro_mode),
        E::new("get_macro_effect", MACRO_MODE, "getMacroEffect", NONE, K::I32, modes::get_macro_effect),
        E::new("set_macro_effect", MACRO_MODE, "setMacroEffect", BYTE, K::Unit, modes::set_macro_effect),

        E::new("set_wave_effect", CHROMA, "setWave", DIRECTION, K::Unit, chroma::set_wave),
        E::new("set_static_effect", CHROMA, "setStatic", RGB, K::Unit, chroma::set_static),
        E::new("set_spectrum_effect", CHROMA, "setSpectrum", NONE, K::Unit, chroma::set_spectrum),
        E::new("set_none_effect", CHROMA, "setNone", NONE, K::Unit, chroma::set_none),
        E::new("set_reactive_effect", CHROMA, "setReactive", RGB_SPEED, K::Unit, chroma::set_reactive),
        E::new("set_breath_random_effect", CHROMA, "setBreathRandom", NONE, K::Unit, chroma::set_breath_random),
        E::new("set_breath_single_effect", CHROMA, "setBreathSingle", RGB, K::Unit, chroma::set_breath_single),
        E::new("set_breath_dual_effect", CHROMA, "setBreathDual", RGB2, K::Unit, chroma::set_breath_dual),
        E::new("set_breath_triple_effect", CHROMA, "setBreathTriple", RGB3, K::Unit, chroma::set_breath_triple),
        E::new("set_custom_effect", CHROMA, "setCustom", NONE, K::Unit, chroma::set_custom),
        E::new("set_key_row", CHROMA, "setKeyRow", BYTES, K::Unit, chroma::set_key_row).with_byte_arrays(),
        E::new("get_effect", CHROMA, "getEffect", NONE, K::Str, chroma::get_effect),
        E::new("get_effect_colors", CHROMA, "getEffectColors", NONE, K::Bytes, chroma::get_effect_colors),
        E::new("get_effect_speed", CHROMA, "getEffectSpeed", NONE, K::U8, chroma::get_effect_speed),

        E::new("bw_set_pulsate", BW2013, "setPulsate", NONE, K::Unit, bw2013::set_pulsate),
        E::new("bw_set_static", BW2013, "setStatic", NONE, K::Unit, bw2013::set_static),

        E::new("get_logo_active", LOGO, "getLogoActive", NONE, K::Bool, zones::get_logo_active),
        E::new("set_logo_active", LOGO, "setLogoActive", FLAG, K::Unit, zones::set_logo_active),
        E::new("get_logo_brightness", LOGO, "getLogoBrightness", NONE, K::F64, zones::get_logo_brightness),
        E::new("set_logo_brightness", LOGO, "setLogoBrightness", LEVEL, K::Unit, zones::set_logo_brightness),
        E::new("set_logo_static", LOGO, "setLogoStatic", RGB, K::Unit, zones::set_logo_static),
        E::new("set_logo_pulsate", LOGO, "setLogoPulsate", RGB, K::Unit, zones::set_logo_pulsate),
        E::new("set_logo_blinking", LOGO, "setLogoBlinking", RGB, K::Unit, zones::set_logo_blinking),
        E::new("set_logo_spectrum", LOGO, "setLogoSpectrum", NONE, K::Unit, zones::set_logo_spectrum),
        E::new("get_logo_effect", LOGO, "getLogoEffect", NONE, K::U8, zones::get_logo_effect),
        E::new("get_scroll_active", SCROLL, "getScrollActive", NONE, K::Bool, zones::get_scroll_active),
        E::new("set_scroll_active", SCROLL, "setScrollActive", FLAG, K::Unit, zones::set_scroll_active),
        E::new("get_scroll_brightness", SCROLL, "getScrollBrightness", NONE, K::F64, zones::get_scroll_brightness),
        E::new("set_scroll_brightness", SCROLL, "setScrollBrightness", LEVEL, K::Unit, zones::set_scroll_brightness),
        E::new("set_scroll_static", SCROLL, "setScrollStatic", RGB, K::Unit, zones::set_scroll_static),
        E::new("set_scroll_pulsate", SCROLL, "setScrollPulsate", RGB, K::Unit, zones::set_scroll_pulsate),
        E::new("set_scroll_blinking", SCROLL, "setScrollBlinking", RGB, K::Unit, zones::set_scroll_blinking),
        E::new("set_scroll_spectrum", SCROLL, "setScrollSpectrum", NONE, K::Unit, zones::set_scroll_spectrum),
        E::new("get_scroll_effect", SCROLL, "getScrollEffect", NONE, K::U8, zones::get_scroll_effect),

        E::new("set_ripple_effect", CUSTOM, "setRipple", RGB_REFRESH, K::Unit, custom::set_ripple),
        E::new("set_ripple_effect_random_colour", CUSTOM, "setRippleRandomColour", LEVEL, K::Unit, custom::set_ripple_random_colour),
        E::new("set_ripple_effect_config_file", CUSTOM, "setRippleConfigFile", RGB_FILE_REFRESH, K::Unit, custom::set_ripple_config_file),
        E::new("set_reactive2_effect", CUSTOM, "setReactive2", RGB_REFRESH, K::Unit, custom::set_reactive2),
        E::new("set_reactive2_effect_random_colour", CUSTOM, "setReactive2RandomColour", LEVEL, K::Unit, custom::set_reactive2_random_colour),
        E::new("set_reactive2_effect_config_file", CUSTOM, "setReactive2ConfigFile", RGB_FILE_REFRESH, K::Unit, custom::set_reactive2_config_file),
        E::new("set_wheel_effect", CUSTOM, "setWheel", DIRECTION_REFRESH, K::Unit, custom::set_wheel),
        E::new("set_fire_effect", CUSTOM, "setFire", BYTE, K::Unit, custom::set_fire),
        E::new("set_fire_effect_variant", CUSTOM, "setFireVariant", SPEED_VARIANT, K::Unit, custom::set_fire_variant),
        E::new("set_fire_effect_palette", CUSTOM, "setFirePalette", SPEED_PALETTE, K::Unit, custom::set_fire_palette).with_byte_arrays(),
    ]
}

/// Records the active effect of a zone in the cache and the persistence sink.
fn remember(device: &Device, zone: Zone, effect: &str, colors: &[u8]) {
    device.update_zone(zone, |state| {
        state.effect = effect.to_string();
        state.set_colors(colors);
    });
    device.persist(Some(zone), "effect", effect);
    if !colors.is_empty() {
        device.persist(Some(zone), "colors", colors.to_vec());
    }
}

/// Announces a lighting change under the method name that made it.
fn announce(device: &Device, method: &str, params: &[Value]) {
    device.send_effect_event(method, params.to_vec());
}

/// Percent brightness clamped to `0..=100`, with its driver byte value.
fn scale_brightness(percent: f64) -> (f64, u8) {
    let clamped = percent.clamp(0.0, 100.0);
    (clamped, (clamped * 255.0 / 100.0).round() as u8)
}

fn flag(value: bool) -> &'static str {
    if value { "1" } else { "0" }
}
