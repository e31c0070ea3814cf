//! Rainbow rotating around the matrix centre.

use std::{f64::consts::TAU, time::Duration};

use super::Frame;
use crate::device::profiles::MatrixDims;

/// Phase advance per second of refresh interval.
pub const PHASE_PER_SEC: f64 = 0.6;

/// Fully saturated, full value HSV colour for `hue` in `0.0..1.0`.
pub fn hue_to_rgb(hue: f64) -> [u8; 3] {
    let h = hue.rem_euclid(1.0) * 6.0;
    let sector = h.floor();
    let f = h - sector;
    let (r, g, b) = match sector as u8 % 6 {
        0 => (1.0, f, 0.0),
        1 => (1.0 - f, 1.0, 0.0),
        2 => (0.0, 1.0, f),
        3 => (0.0, 1.0 - f, 1.0),
        4 => (f, 0.0, 1.0),
        _ => (1.0, 0.0, 1.0 - f),
    };
    [(r * 255.0) as u8, (g * 255.0) as u8, (b * 255.0) as u8]
}

/// Running phase of one wheel animation.
#[derive(Debug, Default, Clone)]
pub struct Wheel {
    phase: f64,
}

impl Wheel {
    pub fn phase(&self) -> f64 {
        self.phase
    }

    /// Draws the current frame, then advances the phase by one step.
    pub fn render(&mut self, matrix: MatrixDims, clockwise: bool, refresh: Duration) -> Frame {
        let mut frame = Frame::new(matrix.rows, matrix.cols);
        let cx = (f64::from(matrix.cols) - 1.0) / 2.0;
        let cy = (f64::from(matrix.rows) - 1.0) / 2.0;
        // Stretch rows so the rotation stays round on wide matrices.
        let aspect = f64::from(matrix.cols) / f64::from(matrix.rows).max(1.0);

        for row in 0..matrix.rows {
            for col in 0..matrix.cols {
                let x = f64::from(col) - cx;
                let y = (f64::from(row) - cy) * aspect;
                let hue = (y.atan2(x) / TAU + 0.5 + self.phase).rem_euclid(1.0);
                frame.set(row, col, hue_to_rgb(hue));
            }
        }

        let sign = if clockwise { 1.0 } else { -1.0 };
        self.phase = (self.phase + sign * refresh.as_secs_f64() * PHASE_PER_SEC).rem_euclid(1.0);
        frame
    }
}
