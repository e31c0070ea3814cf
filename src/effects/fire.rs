//! Flames rising from the bottom rows.
//!
//! A heat field is seeded with sparks along the bottom of the matrix and
//! carried upwards with diffusion and cooling. Heat is mapped to colour
//! through a palette of intensity stops.

use std::time::Duration;

use rand::Rng;

use super::Frame;
use crate::device::profiles::MatrixDims;

/// Intensity and the colour shown at it.
pub type Stop = (u8, [u8; 3]);

const WARM: &[Stop] = &[
    (0, [0, 0, 0]),
    (40, [48, 0, 0]),
    (90, [180, 0, 0]),
    (140, [255, 40, 0]),
    (190, [255, 140, 0]),
    (235, [255, 220, 0]),
    (255, [255, 255, 120]),
];

const BLUE: &[Stop] = &[
    (0, [0, 0, 0]),
    (40, [0, 0, 40]),
    (90, [0, 0, 150]),
    (140, [0, 90, 255]),
    (190, [90, 230, 255]),
    (235, [230, 255, 255]),
    (255, [255, 255, 255]),
];

const SPECTRAL: &[Stop] = &[
    (0, [0, 0, 0]),
    (50, [0, 25, 0]),
    (100, [0, 90, 25]),
    (150, [0, 220, 70]),
    (200, [150, 255, 150]),
    (235, [230, 255, 230]),
    (255, [255, 255, 255]),
];

const MAGIC: &[Stop] = &[
    (0, [0, 0, 0]),
    (40, [18, 0, 35]),
    (90, [60, 0, 110]),
    (140, [130, 0, 210]),
    (190, [210, 90, 255]),
    (230, [245, 225, 255]),
    (255, [255, 255, 255]),
];

/// Built-in flame colours.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FireVariant {
    Warm,
    Blue,
    Spectral,
    Magic,
}

impl FireVariant {
    /// `0` warm, `1` blue, `2` spectral, `3` magic. Anything else is warm.
    pub fn from_number(number: u8) -> Self {
        match number {
            1 => Self::Blue,
            2 => Self::Spectral,
            3 => Self::Magic,
            _ => Self::Warm,
        }
    }

    fn stops(self) -> &'static [Stop] {
        match self {
            Self::Warm => WARM,
            Self::Blue => BLUE,
            Self::Spectral => SPECTRAL,
            Self::Magic => MAGIC,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FirePalette {
    Builtin(FireVariant),
    Custom(Vec<Stop>),
}

impl Default for FirePalette {
    fn default() -> Self {
        Self::Builtin(FireVariant::Warm)
    }
}

impl FirePalette {
    /// Palette from packed RGB triplets spread evenly from intensity 0 to
    /// 255. A single colour is framed by black and white. Returns `None`
    /// unless the payload is a non-empty multiple of three bytes.
    pub fn from_rgb_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.is_empty() || bytes.len() % 3 != 0 {
            return None;
        }
        let mut colours: Vec<[u8; 3]> = bytes
            .chunks_exact(3)
            .map(|rgb| [rgb[0], rgb[1], rgb[2]])
            .collect();
        if colours.len() == 1 {
            colours = vec![[0, 0, 0], colours[0], [255, 255, 255]];
        }
        let last = (colours.len() - 1) as f64;
        let stops = colours
            .into_iter()
            .enumerate()
            .map(|(i, colour)| ((255.0 * i as f64 / last).round() as u8, colour))
            .collect();
        Some(Self::Custom(stops))
    }

    pub fn stops(&self) -> &[Stop] {
        match self {
            Self::Builtin(variant) => variant.stops(),
            Self::Custom(stops) => stops,
        }
    }

    /// Colour for `intensity`, interpolated between the surrounding stops.
    pub fn colour(&self, intensity: u8) -> [u8; 3] {
        let stops = self.stops();
        let Some(&(mut prev_at, mut prev)) = stops.first() else {
            return [0, 0, 0];
        };
        for &(next_at, next) in &stops[1..] {
            if intensity <= next_at {
                if next_at == prev_at {
                    return prev;
                }
                let t = f64::from(intensity.saturating_sub(prev_at)) / f64::from(next_at - prev_at);
                let mix = |a: u8, b: u8| (f64::from(a) + (f64::from(b) - f64::from(a)) * t) as u8;
                return [mix(prev[0], next[0]), mix(prev[1], next[1]), mix(prev[2], next[2])];
            }
            (prev_at, prev) = (next_at, next);
        }
        prev
    }

    /// The coloured variants fade harder towards the top.
    fn strong_gradient(&self) -> bool {
        matches!(
            self,
            Self::Builtin(FireVariant::Blue | FireVariant::Spectral | FireVariant::Magic)
        )
    }
}

/// Flame speed from 1 (calm) to 4 (fierce).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FireSpeed(u8);

impl Default for FireSpeed {
    fn default() -> Self {
        Self(3)
    }
}

impl FireSpeed {
    /// Out of range speeds fall back to 3.
    pub fn new(speed: u8) -> Self {
        if (1..=4).contains(&speed) {
            Self(speed)
        } else {
            Self::default()
        }
    }

    pub fn get(self) -> u8 {
        self.0
    }

    /// Faster flames redraw more often.
    pub fn refresh(self) -> Duration {
        Duration::from_millis(match self.0 {
            1 => 60,
            2 => 45,
            4 => 25,
            _ => 35,
        })
    }

    fn cooling(self) -> u32 {
        match self.0 {
            1 => 12,
            2 => 16,
            4 => 22,
            _ => 19,
        }
    }

    fn spark_probability(self) -> f64 {
        match self.0 {
            1 => 0.16,
            2 => 0.20,
            4 => 0.28,
            _ => 0.24,
        }
    }
}

/// Heat field of one fire animation, rows by columns.
#[derive(Debug, Default, Clone)]
pub struct Fire {
    heat: Vec<Vec<u8>>,
}

impl Fire {
    pub fn heat(&self, row: u8, col: u8) -> Option<u8> {
        self.heat
            .get(usize::from(row))
            .and_then(|line| line.get(usize::from(col)))
            .copied()
    }

    /// Advances the simulation by one frame.
    pub fn step(&mut self, matrix: MatrixDims, speed: FireSpeed, rng: &mut impl Rng) {
        let rows = usize::from(matrix.rows);
        let cols = usize::from(matrix.cols);
        if self.heat.len() != rows || self.heat.first().map_or(0, Vec::len) != cols {
            self.heat = vec![vec![0; cols]; rows];
        }
        if rows == 0 || cols == 0 {
            return;
        }

        let cooling = speed.cooling();
        let sparks = speed.spark_probability();
        let mut next = vec![vec![0u8; cols]; rows];
        let bottom = rows - 1;
        let ignite_rows = rows.min(3);

        // Ignition: the bottom rows get fresh heat, a little less each row up.
        for lift in 0..ignite_rows {
            let y = bottom - lift;
            let p = (sparks * (1.0 - 0.25 * lift as f64)).max(0.05);
            for x in 0..cols {
                let fade = rng.random_range(0..=(cooling / 3).max(1)) as u8;
                let mut heat = self.heat[y][x].saturating_sub(fade);
                if rng.random_bool(p) {
                    heat = 255;
                } else if rng.random_bool(p * 0.35) {
                    heat = heat.max(220);
                } else if rng.random_bool(p * 0.45) {
                    heat = heat.max(160);
                }
                next[y][x] = heat;
            }
        }

        for y in (0..rows - ignite_rows).rev() {
            let below = y + 1;
            let two_below = bottom.min(y + 2);
            let height = (bottom - y) as f64 / (bottom as f64).max(1.0);
            let local_cooling = (f64::from(cooling) * (0.55 + 0.35 * height)) as u32;

            for x in 0..cols {
                let left = (x + cols - 1) % cols;
                let right = (x + 1) % cols;
                let spread = (u32::from(next[below][x]) * 5
                    + u32::from(next[below][left]) * 2
                    + u32::from(next[below][right]) * 2
                    + u32::from(next[two_below][x]) * 2)
                    / 11;
                // Sideways drift against vertical banding.
                let drift = (x + cols + rng.random_range(0..=2usize) - 1) % cols;
                let heat = (spread + u32::from(next[below][drift])) / 2;
                let decay = rng.random_range(0..=local_cooling.max(1));
                next[y][x] = heat.saturating_sub(decay) as u8;
            }
        }

        self.heat = next;
    }

    /// Maps the heat field through `palette`. Upper rows are dimmed.
    pub fn render(&self, matrix: MatrixDims, palette: &FirePalette) -> Frame {
        let mut frame = Frame::new(matrix.rows, matrix.cols);
        let rows = self.heat.len();
        for (row, line) in self.heat.iter().enumerate() {
            let factor = row_factor(row, rows, palette.strong_gradient());
            for (col, heat) in line.iter().enumerate() {
                let scaled = (f64::from(*heat) * factor).powf(0.95) as u8;
                frame.set(row as u8, col as u8, palette.colour(scaled));
            }
        }
        frame
    }
}

fn row_factor(row: usize, rows: usize, strong: bool) -> f64 {
    if rows <= 1 {
        return 1.0;
    }
    let depth = row as f64 / (rows - 1) as f64;
    if strong {
        0.35 + 0.65 * depth
    } else {
        0.60 + 0.40 * depth
    }
}
