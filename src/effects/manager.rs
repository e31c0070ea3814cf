//! Per-device effect managers.

use std::{sync::Weak, time::Duration};

use log::{debug, info, warn};
use tokio_util::sync::CancellationToken;

use super::{
    Colouring, EffectKind, EffectParams, EffectSettings, FirePalette, FireSpeed, FireVariant,
    KeyMap, refresh_from_secs, worker::Worker,
};
use crate::{
    capability::Value,
    device::Device,
    directory::{EffectListener, EffectMessage},
    error::{RazerError, RazerResult},
};

/// Owns the render worker of one effect kind on one device.
///
/// Attached to the device as a listener: the kind's trigger announcement
/// enables the worker, any other effect announcement disables it.
pub struct EffectManager {
    kind: EffectKind,
    device: Weak<Device>,
    default_refresh: Duration,
    worker: Worker,
}

impl EffectManager {
    /// Spawns the worker task. Must be called inside a tokio runtime.
    pub fn spawn(
        device: Weak<Device>,
        kind: EffectKind,
        settings: EffectSettings,
        parent: &CancellationToken,
    ) -> Self {
        let default_refresh = settings.refresh;
        let worker = Worker::spawn(device.clone(), kind, settings, parent.child_token());
        Self {
            kind,
            device,
            default_refresh,
            worker,
        }
    }

    pub fn kind(&self) -> EffectKind {
        self.kind
    }

    pub fn is_active(&self) -> bool {
        self.worker.params().is_some()
    }

    /// Parameters of the running effect, if any.
    pub fn params(&self) -> Option<EffectParams> {
        self.worker.params()
    }

    pub fn enable(&self, params: EffectParams) {
        if self.kind.records_keys() {
            if let Some(device) = self.device.upgrade() {
                device.key_presses().set_recording(true);
            }
        }
        self.worker.enable(params);
    }

    /// Returns false when the effect was not running.
    pub fn disable(&self) -> bool {
        self.stop(false)
    }

    fn stop(&self, keep_recording: bool) -> bool {
        let stopped = self.worker.disable();
        if stopped && self.kind.records_keys() && !keep_recording {
            if let Some(device) = self.device.upgrade() {
                device.key_presses().set_recording(false);
            }
        }
        stopped
    }

    /// Turns key recording off unless another key effect is still drawing.
    fn release_recording(&self) {
        let Some(device) = self.device.upgrade() else {
            return;
        };
        let still_drawing = EffectKind::ALL
            .into_iter()
            .filter(|kind| kind.records_keys())
            .filter_map(|kind| device.effect_manager(kind))
            .any(|manager| manager.is_active());
        if !still_drawing {
            device.key_presses().set_recording(false);
        }
    }

    pub async fn shutdown(&self, timeout: Duration) -> RazerResult<()> {
        self.worker.shutdown(timeout).await
    }

    /// Palette of the running fire, kept when a request carries an unusable one.
    fn fire_palette(&self) -> Option<FirePalette> {
        match self.worker.params() {
            Some(EffectParams::Fire { palette, .. }) => Some(palette),
            _ => None,
        }
    }

    fn parse(&self, message: &EffectMessage) -> RazerResult<EffectParams> {
        let params = message.params();
        let malformed = || RazerError::MalformedMessage(message.to_string());
        let refresh = |value: Option<&Value>| {
            value
                .and_then(Value::as_f64)
                .map_or(self.default_refresh, refresh_from_secs)
        };
        let rgb = || -> RazerResult<[u8; 3]> {
            let channel = |i: usize| params.get(i).and_then(Value::as_u8).ok_or_else(malformed);
            Ok([channel(0)?, channel(1)?, channel(2)?])
        };

        if self.kind == EffectKind::Fire {
            let speed = params.first().and_then(Value::as_u8).ok_or_else(malformed)?;
            let palette = match params.get(1) {
                None => FirePalette::default(),
                Some(Value::Bytes(bytes)) => FirePalette::from_rgb_bytes(bytes)
                    .or_else(|| self.fire_palette())
                    .unwrap_or_default(),
                Some(variant) => {
                    let number = variant.as_u8().ok_or_else(malformed)?;
                    FirePalette::Builtin(FireVariant::from_number(number))
                }
            };
            let speed = FireSpeed::new(speed);
            return Ok(EffectParams::Fire { speed, palette });
        }

        if self.kind == EffectKind::Wheel {
            let direction = params.first().and_then(Value::as_u8).ok_or_else(malformed)?;
            return Ok(EffectParams::Wheel {
                clockwise: direction != 2,
                refresh: refresh(params.get(1)),
            });
        }

        let colouring = match params.len() {
            1 => Colouring::Random,
            4 => Colouring::Fixed(rgb()?),
            5 => {
                let path = params[3].as_str().ok_or_else(malformed)?;
                Colouring::KeyMap {
                    map: KeyMap::load(path)?,
                    fallback: rgb()?,
                }
            }
            _ => return Err(malformed()),
        };
        Ok(EffectParams::Keys {
            colouring,
            refresh: refresh(params.last()),
        })
    }
}

impl EffectListener for EffectManager {
    fn name(&self) -> &'static str {
        match self.kind {
            EffectKind::Ripple => "ripple-manager",
            EffectKind::Reactive => "reactive-manager",
            EffectKind::Wheel => "wheel-manager",
            EffectKind::Fire => "fire-manager",
        }
    }

    fn on_message(&self, message: &EffectMessage) -> RazerResult<()> {
        if message.effect() == self.kind.trigger() {
            let params = self.parse(message).inspect_err(|e| {
                warn!("{} not started: {}", self.kind, e);
                if self.kind.records_keys() {
                    self.release_recording();
                }
            })?;
            info!("{} effect enabled by {}", self.kind, message.origin());
            self.enable(params);
            return Ok(());
        }

        // Another key effect takes over recording from us.
        let keep_recording =
            EffectKind::from_trigger(message.effect()).is_some_and(|kind| kind.records_keys());
        if self.stop(keep_recording) {
            debug!("{} effect stopped by {}", self.kind, message.effect());
        }
        Ok(())
    }
}

impl Drop for EffectManager {
    fn drop(&mut self) {
        if self.kind.records_keys() && self.is_active() {
            if let Some(device) = self.device.upgrade() {
                device.key_presses().set_recording(false);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{io::Write, sync::Arc, time::Instant};

    use super::*;
    use crate::device::testing::{chroma_keyboard, device_with_profile};
    use crate::device::profiles::DEATHADDER_CHROMA;
    use crate::hardware::testing::MemoryEndpoint;
    use pretty_assertions::assert_eq;
    use tempfile::NamedTempFile;

    fn settings() -> EffectSettings {
        EffectSettings {
            refresh: Duration::from_millis(10),
            ..EffectSettings::default()
        }
    }

    fn started(serial: &str) -> (Arc<Device>, Arc<MemoryEndpoint>, CancellationToken) {
        let (device, endpoint) = chroma_keyboard(serial);
        let token = CancellationToken::new();
        assert_eq!(device.start_effects(&settings(), &token), 4);
        (device, endpoint, token)
    }

    fn ripple(device: &Device) -> Arc<EffectManager> {
        device.effect_manager(EffectKind::Ripple).unwrap()
    }

    fn fixed(rgb: [u8; 3], refresh: f64) -> Vec<Value> {
        vec![Value::U8(rgb[0]), Value::U8(rgb[1]), Value::U8(rgb[2]), Value::F64(refresh)]
    }

    #[tokio::test]
    async fn trigger_enables_and_frames_reach_the_device() {
        let (device, endpoint, _token) = started("AAA");
        device.call("setRipple", &fixed([0, 0, 255], 0.01)).unwrap();

        let manager = ripple(&device);
        assert!(manager.is_active());
        assert!(device.key_presses().is_recording());

        tokio::time::sleep(Duration::from_millis(100)).await;
        let frames = endpoint.writes_to("matrix_custom_frame");
        assert!(!frames.is_empty());
        assert_eq!(frames[0].len(), 6 * (3 + 22 * 3));
        assert!(!endpoint.writes_to("matrix_effect_custom").is_empty());

        device.teardown(Duration::from_secs(2)).await;
    }

    #[tokio::test]
    async fn shutdown_stops_an_active_worker_promptly() {
        let (device, endpoint, _token) = started("AAA");
        let manager = ripple(&device);
        manager.enable(EffectParams::Keys {
            colouring: Colouring::Random,
            refresh: Duration::from_millis(40),
        });
        tokio::time::sleep(Duration::from_millis(100)).await;

        let begun = Instant::now();
        manager.shutdown(Duration::from_secs(2)).await.unwrap();
        assert!(begun.elapsed() < Duration::from_secs(2));

        let writes = endpoint.write_count();
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(endpoint.write_count(), writes);
    }

    #[tokio::test]
    async fn second_enable_replaces_parameters() {
        let (device, _, _token) = started("AAA");
        let manager = ripple(&device);
        let first = EffectParams::Keys {
            colouring: Colouring::Fixed([255, 0, 0]),
            refresh: Duration::from_millis(20),
        };
        let second = EffectParams::Keys {
            colouring: Colouring::Fixed([0, 0, 255]),
            refresh: Duration::from_millis(30),
        };
        manager.enable(first);
        manager.enable(second.clone());
        assert_eq!(manager.params(), Some(second));

        device.teardown(Duration::from_secs(2)).await;
    }

    #[tokio::test]
    async fn disable_is_idempotent() {
        let (device, _, _token) = started("AAA");
        let manager = ripple(&device);
        assert!(!manager.disable());

        manager.enable(EffectParams::Keys {
            colouring: Colouring::Random,
            refresh: Duration::from_millis(40),
        });
        assert!(manager.disable());
        assert!(!manager.disable());
        assert!(!manager.is_active());
        assert!(!device.key_presses().is_recording());

        device.teardown(Duration::from_secs(2)).await;
    }

    #[tokio::test]
    async fn other_effects_stop_the_worker() {
        let (device, _, _token) = started("AAA");
        device.call("setRipple", &fixed([1, 2, 3], 0.05)).unwrap();
        device
            .call("setStatic", &[Value::U8(9), Value::U8(9), Value::U8(9)])
            .unwrap();

        assert!(!ripple(&device).is_active());
        assert!(!device.key_presses().is_recording());

        device.teardown(Duration::from_secs(2)).await;
    }

    #[tokio::test]
    async fn switching_key_effects_keeps_recording() {
        let (device, _, _token) = started("AAA");
        device.call("setRipple", &fixed([1, 2, 3], 0.05)).unwrap();
        device
            .call("setReactive2RandomColour", &[Value::F64(0.05)])
            .unwrap();

        assert!(!ripple(&device).is_active());
        let reactive = device.effect_manager(EffectKind::Reactive).unwrap();
        assert_eq!(
            reactive.params(),
            Some(EffectParams::Keys {
                colouring: Colouring::Random,
                refresh: Duration::from_millis(50),
            })
        );
        assert!(device.key_presses().is_recording());

        device.teardown(Duration::from_secs(2)).await;
    }

    fn no_frame_after_last_static(endpoint: &MemoryEndpoint) -> bool {
        let writes = endpoint.writes();
        let Some(last_static) = writes
            .iter()
            .rposition(|(attribute, _)| attribute == "matrix_effect_static")
        else {
            return true;
        };
        writes[last_static..].iter().all(|(attribute, _)| {
            attribute != "matrix_custom_frame" && attribute != "matrix_effect_custom"
        })
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn static_effect_is_not_overdrawn_by_a_late_frame() {
        let (device, endpoint, _token) = started("AAA");
        for round in 0..50u8 {
            device
                .call("setRipple", &fixed([0, 0, 255], 0.000_001))
                .unwrap();
            tokio::time::sleep(Duration::from_millis(2)).await;

            let caller = device.clone();
            tokio::task::spawn_blocking(move || {
                caller.call("setStatic", &[Value::U8(round), Value::U8(9), Value::U8(9)])
            })
            .await
            .unwrap()
            .unwrap();
            tokio::time::sleep(Duration::from_millis(5)).await;

            assert!(no_frame_after_last_static(&endpoint), "round {round}");
            assert!(!ripple(&device).is_active());
        }
        assert!(!endpoint.writes_to("matrix_custom_frame").is_empty());

        device.teardown(Duration::from_secs(2)).await;
    }

    #[tokio::test]
    async fn quiet_firmware_effect_ends_the_animation() {
        let (device, endpoint, _token) = started("AAA");
        device.call("setRipple", &fixed([0, 0, 255], 0.01)).unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        {
            // Replayed sibling effects arrive without an announcement.
            let _quiet = device.suppress_notifications();
            device
                .call("setStatic", &[Value::U8(1), Value::U8(2), Value::U8(3)])
                .unwrap();
        }
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert!(!ripple(&device).is_active());
        assert!(!device.key_presses().is_recording());
        assert!(no_frame_after_last_static(&endpoint));

        device.teardown(Duration::from_secs(2)).await;
    }

    #[tokio::test]
    async fn failed_switch_between_key_effects_stops_recording() {
        let (device, _, _token) = started("AAA");
        device.call("setRipple", &fixed([1, 2, 3], 0.05)).unwrap();
        device
            .call(
                "setReactive2ConfigFile",
                &[
                    Value::U8(4),
                    Value::U8(5),
                    Value::U8(6),
                    Value::Str("/nonexistent.json".into()),
                    Value::F64(0.05),
                ],
            )
            .unwrap();

        assert!(!ripple(&device).is_active());
        assert!(!device.effect_manager(EffectKind::Reactive).unwrap().is_active());
        assert!(!device.key_presses().is_recording());
        assert!(!device.record_key_press(1, 1));
        assert!(device.key_presses().is_empty());

        device.teardown(Duration::from_secs(2)).await;
    }

    #[tokio::test]
    async fn failed_restart_keeps_the_running_key_effect() {
        let (device, _, _token) = started("AAA");
        device.call("setRipple", &fixed([1, 2, 3], 0.05)).unwrap();
        device
            .call(
                "setRippleConfigFile",
                &[
                    Value::U8(4),
                    Value::U8(5),
                    Value::U8(6),
                    Value::Str("/nonexistent.json".into()),
                    Value::F64(0.05),
                ],
            )
            .unwrap();

        assert!(ripple(&device).is_active());
        assert!(device.key_presses().is_recording());

        device.teardown(Duration::from_secs(2)).await;
    }

    #[tokio::test]
    async fn fire_speed_and_palette_are_parsed() {
        let (device, endpoint, _token) = started("AAA");
        let fire = device.effect_manager(EffectKind::Fire).unwrap();

        device
            .call("setFireVariant", &[Value::U8(4), Value::U8(3)])
            .unwrap();
        let magic = FirePalette::Builtin(FireVariant::Magic);
        assert_eq!(
            fire.params(),
            Some(EffectParams::Fire {
                speed: FireSpeed::new(4),
                palette: magic.clone(),
            })
        );
        assert_eq!(fire.params().unwrap().refresh(), Duration::from_millis(25));

        // An unusable palette keeps the running one.
        device
            .call("setFirePalette", &[Value::U8(9), Value::Bytes(vec![1, 2])])
            .unwrap();
        assert_eq!(
            fire.params(),
            Some(EffectParams::Fire {
                speed: FireSpeed::default(),
                palette: magic,
            })
        );

        device.call("setFire", &[Value::U8(1)]).unwrap();
        assert_eq!(
            fire.params(),
            Some(EffectParams::Fire {
                speed: FireSpeed::new(1),
                palette: FirePalette::default(),
            })
        );
        assert!(!device.key_presses().is_recording());

        tokio::time::sleep(Duration::from_millis(200)).await;
        let frames = endpoint.writes_to("matrix_custom_frame");
        assert!(!frames.is_empty());
        assert_eq!(frames[0].len(), 6 * (3 + 22 * 3));

        device.call("setSpectrum", &[]).unwrap();
        assert!(!fire.is_active());

        device.teardown(Duration::from_secs(2)).await;
    }

    #[tokio::test]
    async fn wheel_direction_and_refresh_are_parsed() {
        let (device, _, _token) = started("AAA");
        device
            .call("setWheel", &[Value::U8(2), Value::F64(-1.0)])
            .unwrap();
        let wheel = device.effect_manager(EffectKind::Wheel).unwrap();
        assert_eq!(
            wheel.params(),
            Some(EffectParams::Wheel {
                clockwise: false,
                refresh: crate::effects::DEFAULT_REFRESH,
            })
        );
        assert!(!device.key_presses().is_recording());

        device.teardown(Duration::from_secs(2)).await;
    }

    #[tokio::test]
    async fn config_file_colours_the_effect() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r##"{{"mode": 1, "matrix": {{"2": {{"1": "#112233"}}}}}}"##).unwrap();
        let path = file.path().display().to_string();

        let (device, _, _token) = started("AAA");
        device
            .call(
                "setRippleConfigFile",
                &[Value::U8(4), Value::U8(5), Value::U8(6), Value::Str(path), Value::F64(0.05)],
            )
            .unwrap();

        match ripple(&device).params() {
            Some(EffectParams::Keys {
                colouring: Colouring::KeyMap { map, fallback },
                ..
            }) => {
                assert_eq!(fallback, [4, 5, 6]);
                assert_eq!(map.colour(1, 2), Some([0x11, 0x22, 0x33]));
            }
            other => panic!("unexpected params {other:?}"),
        }

        device.teardown(Duration::from_secs(2)).await;
    }

    #[tokio::test]
    async fn unreadable_config_file_leaves_worker_idle() {
        let (device, _, _token) = started("AAA");
        device
            .call(
                "setRippleConfigFile",
                &[
                    Value::U8(4),
                    Value::U8(5),
                    Value::U8(6),
                    Value::Str("/nonexistent/keys.json".into()),
                    Value::F64(0.05),
                ],
            )
            .unwrap();
        assert!(!ripple(&device).is_active());

        device.teardown(Duration::from_secs(2)).await;
    }

    #[tokio::test]
    async fn devices_without_a_matrix_get_no_managers() {
        let (device, _) = device_with_profile("MOUSE", DEATHADDER_CHROMA);
        let token = CancellationToken::new();
        assert_eq!(device.start_effects(&settings(), &token), 0);
    }

    #[tokio::test]
    async fn cancelled_parent_token_stops_workers() {
        let (device, _, token) = started("AAA");
        token.cancel();
        let manager = ripple(&device);
        manager.shutdown(Duration::from_secs(2)).await.unwrap();
    }
}
