use std::{
    sync::{
        Mutex, MutexGuard,
        atomic::{AtomicBool, Ordering},
    },
    time::{Duration, Instant},
};

use rand::{Rng, seq::IndexedRandom};

/// Colours a press can be given in random colour mode.
pub const PRESS_COLOURS: [[u8; 3]; 6] = [
    [255, 0, 0],
    [0, 255, 0],
    [0, 0, 255],
    [255, 255, 0],
    [0, 255, 255],
    [255, 0, 255],
];

/// Random palette colour other than `last`.
pub fn pick_colour(last: Option<[u8; 3]>, rng: &mut impl Rng) -> [u8; 3] {
    let choices: Vec<[u8; 3]> = PRESS_COLOURS
        .into_iter()
        .filter(|colour| Some(*colour) != last)
        .collect();
    choices.choose(rng).copied().unwrap_or(PRESS_COLOURS[0])
}

/// A recorded key press.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeyPress {
    pub cell: (u8, u8),
    pub pressed_at: Instant,
    /// Palette colour drawn at press time, never the one drawn before it.
    pub colour: [u8; 3],
}

impl KeyPress {
    pub fn elapsed(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.pressed_at)
    }
}

#[derive(Debug, Default)]
struct Presses {
    list: Vec<KeyPress>,
    last_colour: Option<[u8; 3]>,
}

/// Short-lived presses feeding the key-driven effects.
///
/// Presses are only kept while recording is on and expire `window` after
/// they were made. Expired presses are dropped on every record and render.
#[derive(Debug)]
pub struct KeyPressStore {
    window: Duration,
    recording: AtomicBool,
    presses: Mutex<Presses>,
}

impl KeyPressStore {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            recording: AtomicBool::new(false),
            presses: Mutex::new(Presses::default()),
        }
    }

    fn presses(&self) -> MutexGuard<'_, Presses> {
        self.presses.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn is_recording(&self) -> bool {
        self.recording.load(Ordering::SeqCst)
    }

    /// Switching recording off drops every stored press.
    pub fn set_recording(&self, recording: bool) {
        self.recording.store(recording, Ordering::SeqCst);
        if !recording {
            self.presses().list.clear();
        }
    }

    /// Stores a press made at `at`. Returns false when not recording.
    pub fn record(&self, cell: (u8, u8), at: Instant) -> bool {
        if !self.is_recording() {
            return false;
        }
        let mut presses = self.presses();
        presses.list.retain(|press| press.elapsed(at) < self.window);
        let colour = pick_colour(presses.last_colour, &mut rand::rng());
        presses.last_colour = Some(colour);
        presses.list.push(KeyPress {
            cell,
            pressed_at: at,
            colour,
        });
        true
    }

    /// Presses still inside the window at `now`, oldest first. Expired
    /// presses are dropped.
    pub fn active(&self, now: Instant) -> Vec<KeyPress> {
        let mut presses = self.presses();
        presses.list.retain(|press| press.elapsed(now) < self.window);
        presses.list.clone()
    }

    pub fn len(&self) -> usize {
        self.presses().list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.presses().list.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn presses_are_ignored_unless_recording() {
        let store = KeyPressStore::new(Duration::from_secs(2));
        assert!(!store.record((0, 0), Instant::now()));
        assert!(store.is_empty());

        store.set_recording(true);
        assert!(store.record((0, 0), Instant::now()));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn presses_expire_after_the_window() {
        let store = KeyPressStore::new(Duration::from_secs(2));
        store.set_recording(true);
        let start = Instant::now();
        store.record((1, 2), start);

        let visible = store.active(start + Duration::from_millis(1000));
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].cell, (1, 2));

        assert!(store.active(start + Duration::from_millis(2100)).is_empty());
        assert!(store.is_empty());
    }

    #[test]
    fn recording_drops_expired_presses() {
        let store = KeyPressStore::new(Duration::from_secs(2));
        store.set_recording(true);
        let start = Instant::now();
        for i in 0..5000u32 {
            store.record((0, 0), start + Duration::from_millis(u64::from(i)));
        }
        assert!(store.len() <= 2000);

        store.record((1, 1), start + Duration::from_secs(60));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn press_colours_come_from_the_palette_without_repeats() {
        let store = KeyPressStore::new(Duration::from_secs(2));
        store.set_recording(true);
        let now = Instant::now();
        for _ in 0..200 {
            store.record((0, 0), now);
        }

        let colours: Vec<[u8; 3]> = store.active(now).iter().map(|p| p.colour).collect();
        assert_eq!(colours.len(), 200);
        assert!(colours.iter().all(|c| PRESS_COLOURS.contains(c)));
        assert!(colours.windows(2).all(|pair| pair[0] != pair[1]));
    }

    #[test]
    fn pick_colour_skips_the_last_choice() {
        let mut rng = rand::rng();
        for last in PRESS_COLOURS {
            for _ in 0..20 {
                assert_ne!(pick_colour(Some(last), &mut rng), last);
            }
        }
    }

    #[test]
    fn stopping_recording_clears_presses() {
        let store = KeyPressStore::new(Duration::from_secs(2));
        store.set_recording(true);
        store.record((0, 1), Instant::now());
        store.set_recording(false);
        assert!(store.is_empty());
        assert!(!store.is_recording());
    }
}
