//! Driver attribute access.
//!
//! Every device talks to its kernel driver through named attributes living in
//! one directory. The [`HardwareEndpoint`] trait hides whether those are real
//! sysfs files or an in-memory double.

use std::{
    fs,
    path::{Path, PathBuf},
};

use log::debug;

use crate::error::{RazerError, RazerResult};

/// Read/write access to the attributes of one device.
pub trait HardwareEndpoint: Send + Sync {
    /// Reads the raw content of an attribute.
    fn read(&self, attribute: &str) -> RazerResult<Vec<u8>>;

    /// Replaces the content of an attribute.
    fn write(&self, attribute: &str, data: &[u8]) -> RazerResult<()>;

    /// Returns true when the attribute is present.
    fn exists(&self, attribute: &str) -> bool;

    /// Human readable location used in log lines.
    fn describe(&self) -> String;

    /// Reads an attribute as trimmed UTF-8 text.
    fn read_text(&self, attribute: &str) -> RazerResult<String> {
        let raw = self.read(attribute)?;
        String::from_utf8(raw)
            .map(|text| text.trim().to_string())
            .map_err(|e| RazerError::MalformedAttribute {
                attribute: attribute.to_string(),
                detail: e.to_string(),
            })
    }
}

/// Attributes backed by files in a driver directory.
#[derive(Debug, Clone)]
pub struct SysfsEndpoint {
    root: PathBuf,
}

impl SysfsEndpoint {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn attribute_path(&self, attribute: &str) -> PathBuf {
        self.root.join(attribute)
    }
}

impl HardwareEndpoint for SysfsEndpoint {
    fn read(&self, attribute: &str) -> RazerResult<Vec<u8>> {
        fs::read(self.attribute_path(attribute)).map_err(|e| RazerError::hardware(attribute, e))
    }

    fn write(&self, attribute: &str, data: &[u8]) -> RazerResult<()> {
        debug!(
            "Writing {} bytes to {}/{}",
            data.len(),
            self.root.display(),
            attribute
        );
        fs::write(self.attribute_path(attribute), data)
            .map_err(|e| RazerError::hardware(attribute, e))
    }

    fn exists(&self, attribute: &str) -> bool {
        self.attribute_path(attribute).exists()
    }

    fn describe(&self) -> String {
        self.root.display().to_string()
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn sysfs_endpoint_round_trips_attribute_files() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("device_serial"), "XX0000000001\n").unwrap();
        let endpoint = SysfsEndpoint::new(dir.path());

        assert_eq!(endpoint.read_text("device_serial").unwrap(), "XX0000000001");

        endpoint.write("matrix_effect_static", &[255, 0, 0]).unwrap();
        assert_eq!(
            fs::read(dir.path().join("matrix_effect_static")).unwrap(),
            vec![255, 0, 0]
        );
        assert!(endpoint.exists("matrix_effect_static"));
    }

    #[test]
    fn sysfs_endpoint_reports_missing_attribute() {
        let dir = TempDir::new().unwrap();
        let endpoint = SysfsEndpoint::new(dir.path());

        let err = endpoint.read("firmware_version").unwrap_err();
        assert!(matches!(err, RazerError::HardwareIo { ref attribute, .. } if attribute == "firmware_version"));
        assert!(!endpoint.exists("firmware_version"));
    }

    #[test]
    fn read_text_rejects_invalid_utf8() {
        let endpoint = testing::MemoryEndpoint::new().with_attribute("device_type", [0xff, 0xfe]);
        let err = endpoint.read_text("device_type").unwrap_err();
        assert!(matches!(err, RazerError::MalformedAttribute { .. }));
    }
}
