//! Static table of supported hardware.
//!
//! A profile is plain data: identifiers, matrix geometry, the capability ids
//! the device exposes and the suspend strategy it uses.

/// Vendor id shared by every supported device.
pub const RAZER_VID: u16 = 0x1532;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceKind {
    Keyboard,
    Mouse,
    Mousemat,
}

impl DeviceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Keyboard => "keyboard",
            Self::Mouse => "mouse",
            Self::Mousemat => "mousemat",
        }
    }
}

/// Size of the per-key lighting matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatrixDims {
    pub rows: u8,
    pub cols: u8,
}

/// A virtual cell whose hits light a different physical cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellRemap {
    pub from: (u8, u8),
    pub to: (u8, u8),
}

/// Getter/setter pair whose value is saved on suspend and restored on resume.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BrightnessControl {
    pub getter: &'static str,
    pub setter: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuspendStrategy {
    /// Dim every listed control to zero, restore on resume.
    Brightness(&'static [BrightnessControl]),
    /// Device has nothing to save.
    Unsupported,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeviceProfile {
    pub name: &'static str,
    pub kind: DeviceKind,
    pub vid: u16,
    pub pid: u16,
    pub has_matrix: bool,
    pub matrix: Option<MatrixDims>,
    pub capabilities: &'static [&'static str],
    /// Cells animated effects never light.
    pub excluded_cells: &'static [(u8, u8)],
    pub cell_remaps: &'static [CellRemap],
    pub suspend: SuspendStrategy,
}

const MAIN_BRIGHTNESS: &[BrightnessControl] = &[BrightnessControl {
    getter: "getBrightness",
    setter: "setBrightness",
}];

const LOGO_AND_SCROLL_BRIGHTNESS: &[BrightnessControl] = &[
    BrightnessControl {
        getter: "getLogoBrightness",
        setter: "setLogoBrightness",
    },
    BrightnessControl {
        getter: "getScrollBrightness",
        setter: "setScrollBrightness",
    },
];

pub const BLACKWIDOW_CHROMA: DeviceProfile = DeviceProfile {
    name: "Razer BlackWidow Chroma",
    kind: DeviceKind::Keyboard,
    vid: RAZER_VID,
    pid: 0x0203,
    has_matrix: true,
    matrix: Some(MatrixDims { rows: 6, cols: 22 }),
    capabilities: &[
        "get_serial", "get_firmware", "get_device_name", "get_device_type", "get_vid_pid",
        "has_matrix", "get_matrix_dims", "get_device_mode", "set_device_mode",
        "suspend_device", "resume_device",
        "get_brightness", "set_brightness",
        "get_game_mode", "set_game_mode", "get_macro_mode", "set_macro_mode",
        "get_macro_effect", "set_macro_effect",
        "set_wave_effect", "set_static_effect", "set_spectrum_effect", "set_reactive_effect",
        "set_none_effect", "set_breath_random_effect", "set_breath_single_effect",
        "set_breath_dual_effect", "set_custom_effect", "set_key_row",
        "get_effect", "get_effect_colors", "get_effect_speed",
        "set_ripple_effect", "set_ripple_effect_random_colour", "set_ripple_effect_config_file",
        "set_reactive2_effect", "set_reactive2_effect_random_colour",
        "set_reactive2_effect_config_file", "set_wheel_effect",
        "set_fire_effect", "set_fire_effect_variant", "set_fire_effect_palette",
    ],
    excluded_cells: &[(0, 20)],
    cell_remaps: &[CellRemap {
        from: (6, 11),
        to: (0, 20),
    }],
    suspend: SuspendStrategy::Brightness(MAIN_BRIGHTNESS),
};

pub const BLACKWIDOW_ULTIMATE_2013: DeviceProfile = DeviceProfile {
    name: "Razer BlackWidow Ultimate 2013",
    kind: DeviceKind::Keyboard,
    vid: RAZER_VID,
    pid: 0x011A,
    has_matrix: false,
    matrix: Some(MatrixDims { rows: 6, cols: 22 }),
    capabilities: &[
        "get_serial", "get_firmware", "get_device_name", "get_device_type", "get_vid_pid",
        "has_matrix", "get_matrix_dims", "get_device_mode", "set_device_mode",
        "suspend_device", "resume_device",
        "get_brightness", "set_brightness",
        "get_game_mode", "set_game_mode", "get_macro_mode", "set_macro_mode",
        "get_macro_effect", "set_macro_effect",
        "bw_set_pulsate", "bw_set_static",
    ],
    excluded_cells: &[],
    cell_remaps: &[],
    suspend: SuspendStrategy::Brightness(MAIN_BRIGHTNESS),
};

pub const DEATHADDER_CHROMA: DeviceProfile = DeviceProfile {
    name: "Razer DeathAdder Chroma",
    kind: DeviceKind::Mouse,
    vid: RAZER_VID,
    pid: 0x0043,
    has_matrix: false,
    matrix: None,
    capabilities: &[
        "get_serial", "get_firmware", "get_device_name", "get_device_type", "get_vid_pid",
        "has_matrix", "get_matrix_dims", "get_device_mode", "set_device_mode",
        "suspend_device", "resume_device",
        "set_logo_active", "get_logo_active", "get_logo_effect", "get_logo_brightness",
        "set_logo_brightness", "set_logo_static", "set_logo_pulsate", "set_logo_blinking",
        "set_logo_spectrum",
        "set_scroll_active", "get_scroll_active", "get_scroll_effect", "get_scroll_brightness",
        "set_scroll_brightness", "set_scroll_static", "set_scroll_pulsate", "set_scroll_blinking",
        "set_scroll_spectrum",
    ],
    excluded_cells: &[],
    cell_remaps: &[],
    suspend: SuspendStrategy::Brightness(LOGO_AND_SCROLL_BRIGHTNESS),
};

pub const FIREFLY: DeviceProfile = DeviceProfile {
    name: "Razer Firefly",
    kind: DeviceKind::Mousemat,
    vid: RAZER_VID,
    pid: 0x0C00,
    has_matrix: true,
    matrix: Some(MatrixDims { rows: 1, cols: 15 }),
    capabilities: &[
        "get_serial", "get_firmware", "get_device_name", "get_device_type", "get_vid_pid",
        "has_matrix", "get_matrix_dims", "get_device_mode", "set_device_mode",
        "suspend_device", "resume_device",
        "get_brightness", "set_brightness",
        "set_wave_effect", "set_static_effect", "set_spectrum_effect", "set_reactive_effect",
        "set_none_effect", "set_breath_random_effect", "set_breath_single_effect",
        "set_breath_dual_effect", "set_custom_effect", "set_key_row",
        "get_effect", "get_effect_colors", "get_effect_speed", "set_wheel_effect",
        "set_fire_effect", "set_fire_effect_variant", "set_fire_effect_palette",
    ],
    excluded_cells: &[],
    cell_remaps: &[],
    suspend: SuspendStrategy::Brightness(MAIN_BRIGHTNESS),
};

pub const PROFILES: &[DeviceProfile] = &[
    BLACKWIDOW_CHROMA,
    BLACKWIDOW_ULTIMATE_2013,
    DEATHADDER_CHROMA,
    FIREFLY,
];

/// Finds the profile for a USB id pair.
pub fn find(vid: u16, pid: u16) -> Option<&'static DeviceProfile> {
    PROFILES
        .iter()
        .find(|profile| profile.vid == vid && profile.pid == pid)
}
