//! Per-device suspend and resume.
//!
//! A device's profile picks the strategy; the misc `suspendDevice` and
//! `resumeDevice` methods run it.

use std::{collections::HashMap, sync::Mutex};

use log::{debug, warn};

use crate::{
    capability::Value,
    device::{
        Device,
        profiles::{BrightnessControl, SuspendStrategy},
    },
    error::RazerResult,
};

/// Brightness restored when nothing was saved before resume.
pub const DEFAULT_RESUME_BRIGHTNESS: f64 = 100.0;

pub trait SuspendResume: Send + Sync {
    fn suspend(&self, device: &Device) -> RazerResult<()>;
    fn resume(&self, device: &Device) -> RazerResult<()>;
}

/// Builds the strategy named in a device profile.
pub fn strategy_for(strategy: &SuspendStrategy) -> Box<dyn SuspendResume> {
    match strategy {
        SuspendStrategy::Brightness(controls) => Box::new(BrightnessSuspend::new(controls)),
        SuspendStrategy::Unsupported => Box::new(UnsupportedSuspend),
    }
}

/// Dims every listed control to zero and restores the saved levels later.
///
/// Neither direction is announced to other devices.
pub struct BrightnessSuspend {
    controls: &'static [BrightnessControl],
    saved: Mutex<HashMap<&'static str, f64>>,
}

impl BrightnessSuspend {
    pub fn new(controls: &'static [BrightnessControl]) -> Self {
        Self {
            controls,
            saved: Mutex::new(HashMap::new()),
        }
    }
}

impl SuspendResume for BrightnessSuspend {
    fn suspend(&self, device: &Device) -> RazerResult<()> {
        let _guard = device.suppress_notifications();
        let mut saved = self.saved.lock().unwrap_or_else(|p| p.into_inner());
        for control in self.controls {
            match device.call(control.getter, &[]) {
                Ok(value) => {
                    if let Some(level) = value.as_f64() {
                        saved.insert(control.setter, level);
                    }
                }
                Err(e) => warn!("[{}] could not save {}: {}", device.serial(), control.getter, e),
            }
            device.call(control.setter, &[Value::F64(0.0)])?;
        }
        Ok(())
    }

    fn resume(&self, device: &Device) -> RazerResult<()> {
        let _guard = device.suppress_notifications();
        let saved = self.saved.lock().unwrap_or_else(|p| p.into_inner());
        for control in self.controls {
            let level = saved
                .get(control.setter)
                .copied()
                .unwrap_or(DEFAULT_RESUME_BRIGHTNESS);
            device.call(control.setter, &[Value::F64(level)])?;
        }
        Ok(())
    }
}

/// For devices with nothing to dim.
pub struct UnsupportedSuspend;

impl SuspendResume for UnsupportedSuspend {
    fn suspend(&self, device: &Device) -> RazerResult<()> {
        debug!("[{}] suspend not supported", device.serial());
        Ok(())
    }

    fn resume(&self, device: &Device) -> RazerResult<()> {
        debug!("[{}] resume not supported", device.serial());
        Ok(())
    }
}
