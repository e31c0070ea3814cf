//! Daemon-rendered matrix effects.
//!
//! Each matrix device gets one [`EffectManager`] per [`EffectKind`] its
//! surface can trigger. The manager listens to the device's own effect
//! announcements and drives a background render task that streams frames to
//! the hardware while the effect is active.

pub mod fire;
pub mod frame;
pub mod key_store;
pub mod keymap;
pub mod manager;
pub mod reactive;
pub mod ripple;
pub mod wheel;
mod worker;

use std::{
    fmt,
    time::{Duration, Instant},
};

use crate::device::profiles::{CellRemap, MatrixDims};

pub use fire::{FirePalette, FireSpeed, FireVariant};
pub use frame::Frame;
pub use key_store::{KeyPress, KeyPressStore};
pub use keymap::KeyMap;
pub use manager::EffectManager;

/// Refresh interval used when a request carries none or a useless one.
pub const DEFAULT_REFRESH: Duration = Duration::from_millis(40);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EffectKind {
    Ripple,
    Reactive,
    Wheel,
    Fire,
}

impl EffectKind {
    pub const ALL: [EffectKind; 4] = [
        EffectKind::Ripple,
        EffectKind::Reactive,
        EffectKind::Wheel,
        EffectKind::Fire,
    ];

    /// Announcement that starts this effect.
    pub fn trigger(&self) -> &'static str {
        match self {
            Self::Ripple => "setRipple",
            Self::Reactive => "setReactive2",
            Self::Wheel => "setWheel",
            Self::Fire => "setFire",
        }
    }

    pub fn from_trigger(effect: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.trigger() == effect)
    }

    /// Effects drawn around recorded key presses.
    pub fn records_keys(&self) -> bool {
        matches!(self, Self::Ripple | Self::Reactive)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ripple => "ripple",
            Self::Reactive => "reactive",
            Self::Wheel => "wheel",
            Self::Fire => "fire",
        }
    }
}

impl fmt::Display for EffectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Timing knobs shared by every effect worker.
#[derive(Debug, Clone, PartialEq)]
pub struct EffectSettings {
    /// Frame interval until a request sets its own.
    pub refresh: Duration,
    /// How long a key press stays visible.
    pub key_press_window: Duration,
    /// Bounded wait for a worker to confirm termination.
    pub shutdown_timeout: Duration,
    /// Pause after a frame failed to render or push.
    pub render_backoff: Duration,
}

impl Default for EffectSettings {
    fn default() -> Self {
        Self {
            refresh: DEFAULT_REFRESH,
            key_press_window: Duration::from_secs(2),
            shutdown_timeout: Duration::from_secs(2),
            render_backoff: Duration::from_millis(250),
        }
    }
}

/// Where a key effect takes its colours from.
#[derive(Debug, Clone, PartialEq)]
pub enum Colouring {
    Fixed([u8; 3]),
    /// Each press carries its own random colour.
    Random,
    /// Per-key colours loaded from a config file; `fallback` covers keys the
    /// map does not list.
    KeyMap { map: KeyMap, fallback: [u8; 3] },
}

/// Parameters of an active effect.
#[derive(Debug, Clone, PartialEq)]
pub enum EffectParams {
    Keys { colouring: Colouring, refresh: Duration },
    Wheel { clockwise: bool, refresh: Duration },
    Fire { speed: FireSpeed, palette: FirePalette },
}

impl EffectParams {
    pub fn refresh(&self) -> Duration {
        match self {
            Self::Keys { refresh, .. } | Self::Wheel { refresh, .. } => *refresh,
            Self::Fire { speed, .. } => speed.refresh(),
        }
    }
}

/// Everything a key-driven effect needs to draw one frame.
#[derive(Debug, Clone, Copy)]
pub struct KeyScene<'a> {
    pub matrix: MatrixDims,
    pub excluded: &'a [(u8, u8)],
    pub remaps: &'a [CellRemap],
    pub presses: &'a [KeyPress],
    pub window: Duration,
    pub now: Instant,
}

impl KeyScene<'_> {
    pub fn is_excluded(&self, row: u8, col: u8) -> bool {
        self.excluded.contains(&(row, col))
    }
}

/// Colour a key effect draws for a press.
pub(crate) fn press_colour(colouring: &Colouring, press: &KeyPress) -> [u8; 3] {
    let (row, col) = press.cell;
    match colouring {
        Colouring::Fixed(colour) => *colour,
        Colouring::Random => press.colour,
        Colouring::KeyMap { map, fallback } => map.colour(row, col).unwrap_or(*fallback),
    }
}

/// Seconds to a usable frame interval.
pub fn refresh_from_secs(secs: f64) -> Duration {
    if secs.is_finite() && secs > 0.0 {
        Duration::try_from_secs_f64(secs).unwrap_or(DEFAULT_REFRESH)
    } else {
        DEFAULT_REFRESH
    }
}
