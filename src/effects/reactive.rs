//! Pressed keys light up and fade out over the press window.

use std::collections::HashSet;

use super::{Colouring, Frame, KeyScene, press_colour};

fn scale_colour(colour: [u8; 3], scale: f64) -> [u8; 3] {
    let scale = scale.clamp(0.0, 1.0);
    colour.map(|channel| (f64::from(channel) * scale) as u8)
}

/// Draws one reactive frame. When a key was pressed more than once the
/// oldest press still in the window decides its colour.
pub fn render(scene: &KeyScene<'_>, colouring: &Colouring) -> Frame {
    let mut frame = Frame::new(scene.matrix.rows, scene.matrix.cols);
    let window = scene.window.as_secs_f64();
    if window <= 0.0 {
        return frame;
    }

    let mut lit = HashSet::new();
    for press in scene.presses {
        let (row, col) = press.cell;
        if scene.is_excluded(row, col) || !lit.insert(press.cell) {
            continue;
        }
        let remaining = (window - press.elapsed(scene.now).as_secs_f64()) / window;
        frame.set(row, col, scale_colour(press_colour(colouring, press), remaining));
    }
    frame
}
