//! Expanding rings around recent key presses.

use super::{Colouring, Frame, KeyScene, keymap::KeyMapMode, press_colour};

/// Ring growth in cells per second.
pub const RADIUS_PER_SEC: f64 = 24.0;
/// Ring thickness in cells.
pub const RING_WIDTH: f64 = 2.0;

struct Ring {
    centre: (u8, u8),
    radius: f64,
    colour: [u8; 3],
}

impl Ring {
    fn covers(&self, row: u8, col: u8) -> bool {
        let dr = f64::from(self.centre.0) - f64::from(row);
        let dc = f64::from(self.centre.1) - f64::from(col);
        let distance = (dr * dr + dc * dc).sqrt();
        self.radius >= distance && distance >= self.radius - RING_WIDTH
    }
}

/// Draws one ripple frame. The first ring covering a cell decides its
/// colour.
pub fn render(scene: &KeyScene<'_>, colouring: &Colouring) -> Frame {
    let (rows, cols) = (scene.matrix.rows, scene.matrix.cols);
    let mut frame = Frame::new(rows, cols);

    let rings: Vec<Ring> = scene
        .presses
        .iter()
        .map(|press| Ring {
            centre: press.cell,
            radius: press.elapsed(scene.now).as_secs_f64() * RADIUS_PER_SEC,
            colour: press_colour(colouring, press),
        })
        .collect();
    if rings.is_empty() {
        return frame;
    }

    let lit_cell_map = match colouring {
        Colouring::KeyMap { map, fallback } if map.mode() == KeyMapMode::LitCell => {
            Some((map, *fallback))
        }
        _ => None,
    };

    for row in 0..rows {
        for col in 0..cols {
            if scene.is_excluded(row, col) {
                continue;
            }
            if let Some(ring) = rings.iter().find(|ring| ring.covers(row, col)) {
                let colour = match lit_cell_map {
                    Some((map, fallback)) => map.colour(row, col).unwrap_or(fallback),
                    None => ring.colour,
                };
                frame.set(row, col, colour);
            }
        }
    }

    for remap in scene.remaps {
        let (row, col) = remap.from;
        if let Some(ring) = rings.iter().find(|ring| ring.covers(row, col)) {
            frame.set(remap.to.0, remap.to.1, ring.colour);
        }
    }
    frame
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use super::*;
    use crate::device::profiles::{CellRemap, MatrixDims};
    use crate::effects::{KeyMap, KeyPress};
    use pretty_assertions::assert_eq;

    const BLACK: [u8; 3] = [0, 0, 0];
    const MATRIX: MatrixDims = MatrixDims { rows: 6, cols: 22 };

    fn press(cell: (u8, u8), at: Instant) -> KeyPress {
        KeyPress {
            cell,
            pressed_at: at,
            colour: [7, 7, 7],
        }
    }

    fn scene<'a>(presses: &'a [KeyPress], now: Instant) -> KeyScene<'a> {
        KeyScene {
            matrix: MATRIX,
            excluded: &[],
            remaps: &[],
            presses,
            window: Duration::from_secs(2),
            now,
        }
    }

    #[test]
    fn ring_lights_cells_at_current_radius() {
        let start = Instant::now();
        let presses = [press((0, 0), start)];
        // radius 6 after 0.25s: cells at distance 4..=6 are lit
        let frame = render(
            &scene(&presses, start + Duration::from_millis(250)),
            &Colouring::Fixed([0, 0, 255]),
        );
        assert_eq!(frame.get(0, 5), Some([0, 0, 255]));
        assert_eq!(frame.get(0, 4), Some([0, 0, 255]));
        assert_eq!(frame.get(0, 3), Some(BLACK));
        assert_eq!(frame.get(0, 7), Some(BLACK));
    }

    #[test]
    fn random_colouring_uses_press_colour() {
        let start = Instant::now();
        let presses = [press((2, 2), start)];
        let frame = render(&scene(&presses, start + Duration::from_millis(125)), &Colouring::Random);
        assert_eq!(frame.get(2, 5), Some([7, 7, 7]));
    }

    #[test]
    fn first_ring_wins() {
        let start = Instant::now();
        let mut first = press((0, 0), start);
        first.colour = [1, 0, 0];
        let mut second = press((0, 6), start);
        second.colour = [0, 2, 0];
        let presses = [first, second];
        // both rings have radius 3; cell (0, 3) is on both
        let frame = render(&scene(&presses, start + Duration::from_millis(125)), &Colouring::Random);
        assert_eq!(frame.get(0, 3), Some([1, 0, 0]));
    }

    #[test]
    fn excluded_cell_stays_dark() {
        let start = Instant::now();
        let presses = [press((0, 19), start)];
        let mut scene = scene(&presses, start + Duration::from_millis(50));
        scene.excluded = &[(0, 20)];
        // radius 1.2 around (0, 19)
        let frame = render(&scene, &Colouring::Fixed([9, 9, 9]));
        assert_eq!(frame.get(0, 18), Some([9, 9, 9]));
        assert_eq!(frame.get(0, 20), Some(BLACK));
    }

    #[test]
    fn remapped_cell_lights_its_target() {
        let start = Instant::now();
        let presses = [press((5, 11), start)];
        let remaps = [CellRemap {
            from: (6, 11),
            to: (0, 20),
        }];
        let mut scene = scene(&presses, start + Duration::from_millis(50));
        scene.excluded = &[(0, 20)];
        scene.remaps = &remaps;
        let frame = render(&scene, &Colouring::Fixed([9, 9, 9]));
        assert_eq!(frame.get(0, 20), Some([9, 9, 9]));
    }

    #[test]
    fn lit_cell_mode_paints_from_the_map() {
        let start = Instant::now();
        let presses = [press((0, 0), start)];
        let map = KeyMap::parse(r##"{"mode": 2, "matrix": {"5": {"0": "#00ff00"}}}"##).unwrap();
        let frame = render(
            &scene(&presses, start + Duration::from_millis(250)),
            &Colouring::KeyMap {
                map,
                fallback: [1, 1, 1],
            },
        );
        assert_eq!(frame.get(0, 5), Some([0, 255, 0]));
        assert_eq!(frame.get(0, 4), Some([1, 1, 1]));
    }
}
