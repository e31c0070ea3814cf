//! Finding supported devices under the driver directory.

use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use log::{debug, info};

use super::{Device, profiles::{self, DeviceProfile}};
use crate::{
    capability::CapabilityRegistry,
    error::{RazerError, RazerResult},
    hardware::SysfsEndpoint,
    persistence::PersistenceSink,
};

/// Attribute every driver-bound device directory carries.
const DEVICE_TYPE_ATTRIBUTE: &str = "device_type";

/// A device directory matched against a known profile.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub path: PathBuf,
    pub profile: &'static DeviceProfile,
}

impl Candidate {
    /// Directory name, e.g. `0003:1532:0203.0001`.
    pub fn id(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

fn hex_field(field: &str) -> Option<u16> {
    let valid = field.len() == 4
        && field
            .chars()
            .all(|c| c.is_ascii_digit() || ('A'..='F').contains(&c));
    valid.then(|| u16::from_str_radix(field, 16).ok()).flatten()
}

/// Extracts `(vid, pid)` from a `XXXX:VVVV:PPPP.XXXX` directory name.
pub fn parse_device_id(name: &str) -> Option<(u16, u16)> {
    let (bus, rest) = name.split_once(':')?;
    let (vid, rest) = rest.split_once(':')?;
    let (pid, instance) = rest.split_once('.')?;
    hex_field(bus)?;
    hex_field(instance)?;
    Some((hex_field(vid)?, hex_field(pid)?))
}

/// Lists supported devices below `root`, sorted by directory name.
pub fn scan(root: &Path) -> RazerResult<Vec<Candidate>> {
    let entries =
        fs::read_dir(root).map_err(|e| RazerError::hardware(root.display().to_string(), e))?;

    let mut found: Vec<Candidate> = entries
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| {
            let name = entry.file_name();
            let (vid, pid) = parse_device_id(name.to_str()?)?;
            let path = entry.path();
            if !path.join(DEVICE_TYPE_ATTRIBUTE).exists() {
                debug!("{} has no {}", path.display(), DEVICE_TYPE_ATTRIBUTE);
                return None;
            }
            let Some(profile) = profiles::find(vid, pid) else {
                debug!("No profile for {:04X}:{:04X}", vid, pid);
                return None;
            };
            Some(Candidate { path, profile })
        })
        .collect();
    found.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(found)
}

/// Builds devices from scan results with shared collaborators.
#[derive(Clone)]
pub struct DeviceFactory {
    registry: Arc<CapabilityRegistry>,
    persistence: Arc<dyn PersistenceSink>,
    key_press_window: Duration,
}

impl DeviceFactory {
    pub fn new(
        registry: Arc<CapabilityRegistry>,
        persistence: Arc<dyn PersistenceSink>,
        key_press_window: Duration,
    ) -> Self {
        Self {
            registry,
            persistence,
            key_press_window,
        }
    }

    /// Reads the serial from the hardware, so it may block briefly.
    pub fn build(&self, candidate: &Candidate) -> RazerResult<Arc<Device>> {
        let endpoint = Arc::new(SysfsEndpoint::new(&candidate.path));
        let device = Device::builder(*candidate.profile, endpoint)
            .registry(self.registry.clone())
            .persistence(self.persistence.clone())
            .key_press_window(self.key_press_window)
            .build()?;
        info!(
            "Found {} ({}) at {}",
            candidate.profile.name,
            device.serial(),
            candidate.id()
        );
        Ok(device)
    }
}
