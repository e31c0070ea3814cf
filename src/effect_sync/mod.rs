//! Mirrors lighting changes from sibling devices.

pub mod translation;

use std::sync::Weak;

use log::{debug, warn};

use crate::{
    device::Device,
    directory::{EffectListener, EffectMessage},
    error::RazerResult,
};

pub use translation::{PlannedCall, plan};

/// Listener attached to every device that replays sibling effects on it.
///
/// Holds only a weak reference so it never keeps its device alive.
pub struct EffectSynchronizer {
    device: Weak<Device>,
}

impl EffectSynchronizer {
    pub fn new(device: Weak<Device>) -> Self {
        Self { device }
    }
}

impl EffectListener for EffectSynchronizer {
    fn name(&self) -> &'static str {
        "effect-sync"
    }

    fn on_message(&self, message: &EffectMessage) -> RazerResult<()> {
        let Some(device) = self.device.upgrade() else {
            return Ok(());
        };
        if message.origin() == device.serial() {
            return Ok(());
        }
        if let Err(e) = message.validate() {
            warn!("[{}] ignoring message: {}", device.serial(), e);
            return Ok(());
        }

        let calls = plan(
            message.effect(),
            message.params(),
            &device.surface().method_arities(),
        );
        if calls.is_empty() {
            debug!("[{}] no translation for {}", device.serial(), message);
            return Ok(());
        }

        // Replayed changes must not bounce back to the directory.
        let _guard = device.suppress_notifications();
        for call in calls {
            debug!("[{}] sync {} from {}", device.serial(), call.method, message.origin());
            if let Err(e) = device.call(&call.method, &call.params) {
                warn!("[{}] sync call {} failed: {}", device.serial(), call.method, e);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::capability::Value;
    use crate::device::testing::{chroma_keyboard, device_with_profile, test_device};
    use crate::device::profiles::{BLACKWIDOW_ULTIMATE_2013, DEATHADDER_CHROMA};
    use crate::directory::{DeviceDirectory, testing::RecordingListener};
    use pretty_assertions::assert_eq;

    #[test]
    fn coloured_static_reaches_colourless_keyboard() {
        let directory = Arc::new(DeviceDirectory::new(true));
        let (source, _) = chroma_keyboard("SRC");
        let (target, target_io) = device_with_profile("BW2013", BLACKWIDOW_ULTIMATE_2013);
        directory.add(source.clone());
        directory.add(target.clone());

        source
            .call("setStatic", &[Value::U8(255), Value::U8(0), Value::U8(0)])
            .unwrap();

        assert_eq!(target_io.writes_to("matrix_effect_static"), vec![b"1".to_vec()]);
        assert!(!target.notifications_suppressed());
    }

    #[test]
    fn pulsate_becomes_green_breath_on_chroma() {
        let directory = Arc::new(DeviceDirectory::new(true));
        let (source, _) = device_with_profile("BW2013", BLACKWIDOW_ULTIMATE_2013);
        let (target, target_io) = chroma_keyboard("CHROMA");
        directory.add(source.clone());
        directory.add(target.clone());

        source.call("setPulsate", &[]).unwrap();

        assert_eq!(
            target_io.writes_to("matrix_effect_breath"),
            vec![vec![0x00, 0xFF, 0x00]]
        );
    }

    #[test]
    fn static_lights_mouse_zones() {
        let directory = Arc::new(DeviceDirectory::new(true));
        let (source, _) = chroma_keyboard("KBD");
        let (mouse, mouse_io) = device_with_profile("MOUSE", DEATHADDER_CHROMA);
        directory.add(source.clone());
        directory.add(mouse.clone());

        source
            .call("setStatic", &[Value::U8(1), Value::U8(2), Value::U8(3)])
            .unwrap();

        assert_eq!(mouse_io.writes_to("logo_led_state"), vec![b"1".to_vec()]);
        assert_eq!(mouse_io.writes_to("logo_led_rgb"), vec![vec![1, 2, 3]]);
        assert_eq!(mouse_io.writes_to("scroll_led_rgb"), vec![vec![1, 2, 3]]);
    }

    #[test]
    fn replayed_changes_do_not_fan_out_again() {
        let directory = Arc::new(DeviceDirectory::new(true));
        let (a, _) = chroma_keyboard("A");
        let (b, _) = chroma_keyboard("B");
        let (c, _) = chroma_keyboard("C");
        let recording = Arc::new(RecordingListener::default());
        c.add_listener(recording.clone());
        for device in [&a, &b, &c] {
            directory.add((*device).clone());
        }

        a.call("setSpectrum", &[]).unwrap();

        // Only the original message from A, never B's replay.
        let seen = recording.seen.lock().unwrap().clone();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].origin(), "A");
    }

    #[test]
    fn own_and_malformed_messages_are_ignored() {
        let (device, endpoint) = test_device("SELF", &["set_spectrum_effect"]);
        let sync = EffectSynchronizer::new(Arc::downgrade(&device));

        sync.on_message(&EffectMessage::new("SELF", "setSpectrum", vec![]))
            .unwrap();
        sync.on_message(&EffectMessage::new("OTHER", "set Spectrum!", vec![]))
            .unwrap();
        sync.on_message(&EffectMessage::new("OTHER", "setRipple", vec![Value::F64(0.1)]))
            .unwrap();
        assert_eq!(endpoint.write_count(), 0);

        sync.on_message(&EffectMessage::new("OTHER", "setSpectrum", vec![]))
            .unwrap();
        assert_eq!(endpoint.writes_to("matrix_effect_spectrum").len(), 1);
    }

    #[test]
    fn dropped_device_is_a_no_op() {
        let (device, _) = test_device("GONE", &["set_spectrum_effect"]);
        let sync = EffectSynchronizer::new(Arc::downgrade(&device));
        drop(device);
        assert!(sync
            .on_message(&EffectMessage::new("OTHER", "setSpectrum", vec![]))
            .is_ok());
    }
}
