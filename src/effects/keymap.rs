//! Per-key colour files for ripple and reactive effects.
//!
//! ```json
//! {"mode": 2, "matrix": {"3": {"1": "#ff8800"}}}
//! ```
//!
//! `matrix` is keyed by column, then row.

use std::{collections::BTreeMap, fs, path::Path};

use serde::Deserialize;

use crate::error::{RazerError, RazerResult};

/// Colour used for entries that are not valid `#rrggbb`.
pub const INVALID_COLOUR: [u8; 3] = [255, 0, 0];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyMapMode {
    /// The whole ripple takes the colour of the pressed key.
    PressedKey,
    /// Each lit cell shows its own mapped colour.
    LitCell,
}

#[derive(Debug, Deserialize)]
struct KeyMapFile {
    #[serde(default)]
    mode: Option<u8>,
    matrix: BTreeMap<String, BTreeMap<String, String>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct KeyMap {
    mode: KeyMapMode,
    colours: BTreeMap<(u8, u8), [u8; 3]>,
}

fn parse_hex(text: &str) -> [u8; 3] {
    let Some(hex) = text.strip_prefix('#') else {
        return INVALID_COLOUR;
    };
    if hex.len() != 6 || !hex.is_ascii() {
        return INVALID_COLOUR;
    }
    let channel = |range: std::ops::Range<usize>| u8::from_str_radix(&hex[range], 16);
    match (channel(0..2), channel(2..4), channel(4..6)) {
        (Ok(r), Ok(g), Ok(b)) => [r, g, b],
        _ => INVALID_COLOUR,
    }
}

impl KeyMap {
    pub fn parse(json: &str) -> RazerResult<Self> {
        let file: KeyMapFile = serde_json::from_str(json).map_err(|e| RazerError::EffectConfig {
            path: "<inline>".to_string(),
            detail: e.to_string(),
        })?;
        let mode = match file.mode {
            Some(2) => KeyMapMode::LitCell,
            _ => KeyMapMode::PressedKey,
        };
        let mut colours = BTreeMap::new();
        for (col, rows) in &file.matrix {
            let Ok(col) = col.parse::<u8>() else {
                continue;
            };
            for (row, hex) in rows {
                if let Ok(row) = row.parse::<u8>() {
                    colours.insert((row, col), parse_hex(hex));
                }
            }
        }
        Ok(Self { mode, colours })
    }

    pub fn load(path: impl AsRef<Path>) -> RazerResult<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| RazerError::EffectConfig {
            path: path.display().to_string(),
            detail: e.to_string(),
        })?;
        Self::parse(&text).map_err(|e| match e {
            RazerError::EffectConfig { detail, .. } => RazerError::EffectConfig {
                path: path.display().to_string(),
                detail,
            },
            other => other,
        })
    }

    pub fn mode(&self) -> KeyMapMode {
        self.mode
    }

    pub fn colour(&self, row: u8, col: u8) -> Option<[u8; 3]> {
        self.colours.get(&(row, col)).copied()
    }
}
