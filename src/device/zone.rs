use std::fmt;

/// Lighting zone of a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Zone {
    Backlight,
    Logo,
    Scroll,
}

impl Zone {
    pub const ALL: [Zone; 3] = [Zone::Backlight, Zone::Logo, Zone::Scroll];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Backlight => "backlight",
            Self::Logo => "logo",
            Self::Scroll => "scroll",
        }
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Last known lighting state of a zone, served by the getter methods.
#[derive(Debug, Clone, PartialEq)]
pub struct ZoneState {
    pub active: bool,
    pub brightness: f64,
    pub effect: String,
    pub colors: [u8; 9],
    pub speed: u8,
    pub wave_direction: u8,
}

impl Default for ZoneState {
    fn default() -> Self {
        Self {
            active: true,
            brightness: 75.0,
            effect: "spectrum".to_string(),
            colors: [0, 255, 0, 0, 255, 255, 0, 0, 255],
            speed: 1,
            wave_direction: 1,
        }
    }
}

impl ZoneState {
    /// Stores up to three colours, leaving the remaining slots untouched.
    pub fn set_colors(&mut self, colors: &[u8]) {
        let len = colors.len().min(self.colors.len());
        self.colors[..len].copy_from_slice(&colors[..len]);
    }
}
