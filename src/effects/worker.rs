//! Background render loop shared by every animated effect.

use std::{
    sync::{Arc, Mutex, Weak},
    time::{Duration, Instant},
};

use anyhow::{Context, Result};
use log::{debug, error, info};
use tokio::{sync::watch, task::JoinHandle};
use tokio_util::sync::CancellationToken;

use super::{
    EffectKind, EffectParams, EffectSettings, Frame, KeyScene, fire::Fire, reactive, ripple,
    wheel::Wheel,
};
use crate::{
    capability::Value,
    device::Device,
    error::{RazerError, RazerResult},
};

#[derive(Debug, Clone, PartialEq)]
pub(super) enum WorkerState {
    Idle,
    /// `generation` is the device frame generation seen when enabled.
    Active { params: EffectParams, generation: u64 },
}

impl WorkerState {
    fn is_active_since(&self, generation: u64) -> bool {
        matches!(self, Self::Active { generation: since, .. } if *since == generation)
    }
}

/// Handle to one render task.
///
/// The task sleeps on its state channel while idle and exits once the
/// cancellation token fires.
pub(super) struct Worker {
    kind: EffectKind,
    serial: String,
    device: Weak<Device>,
    state: Arc<watch::Sender<WorkerState>>,
    cancel: CancellationToken,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Worker {
    pub(super) fn spawn(
        device: Weak<Device>,
        kind: EffectKind,
        settings: EffectSettings,
        cancel: CancellationToken,
    ) -> Self {
        let serial = device
            .upgrade()
            .map(|d| d.serial().to_string())
            .unwrap_or_default();
        let state = Arc::new(watch::Sender::new(WorkerState::Idle));
        let handle = tokio::spawn(run(
            device.clone(),
            kind,
            settings,
            state.clone(),
            cancel.clone(),
        ));
        Self {
            kind,
            serial,
            device,
            state,
            cancel,
            handle: Mutex::new(Some(handle)),
        }
    }

    /// Starts drawing, or swaps the parameters of the running loop.
    pub(super) fn enable(&self, params: EffectParams) {
        let generation = self
            .device
            .upgrade()
            .map_or(0, |device| device.frame_generation());
        self.state
            .send_replace(WorkerState::Active { params, generation });
    }

    /// Returns false when the worker was already idle. Once this returns,
    /// no frame of the stopped effect reaches the hardware.
    pub(super) fn disable(&self) -> bool {
        let stopped = self.state.send_if_modified(|state| {
            if matches!(state, WorkerState::Active { .. }) {
                *state = WorkerState::Idle;
                true
            } else {
                false
            }
        });
        if stopped {
            if let Some(device) = self.device.upgrade() {
                device.wait_for_frame();
            }
        }
        stopped
    }

    pub(super) fn params(&self) -> Option<EffectParams> {
        match &*self.state.borrow() {
            WorkerState::Active { params, .. } => Some(params.clone()),
            WorkerState::Idle => None,
        }
    }

    /// Cancels the loop and waits up to `timeout` for it to finish.
    pub(super) async fn shutdown(&self, timeout: Duration) -> RazerResult<()> {
        self.cancel.cancel();
        let handle = self
            .handle
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        let Some(handle) = handle else {
            return Ok(());
        };

        match tokio::time::timeout(timeout, handle).await {
            Ok(Ok(())) => {
                debug!("[{}] {} worker stopped", self.serial, self.kind);
                Ok(())
            }
            Ok(Err(e)) => {
                error!("[{}] {} worker panicked: {}", self.serial, self.kind, e);
                Ok(())
            }
            Err(_) => {
                error!(
                    "[{}] Could not stop {} worker within {:?}",
                    self.serial, self.kind, timeout
                );
                Err(RazerError::WorkerShutdownTimeout {
                    effect: self.kind.to_string(),
                    serial: self.serial.clone(),
                })
            }
        }
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Animation state carried from one frame to the next.
#[derive(Debug, Default)]
struct Animation {
    wheel: Wheel,
    fire: Fire,
}

async fn run(
    device: Weak<Device>,
    kind: EffectKind,
    settings: EffectSettings,
    state: Arc<watch::Sender<WorkerState>>,
    cancel: CancellationToken,
) {
    let mut updates = state.subscribe();
    let mut animation = Animation::default();
    loop {
        let current = updates.borrow_and_update().clone();
        let WorkerState::Active { params, generation } = current else {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                changed = updates.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
            continue;
        };
        if cancel.is_cancelled() {
            break;
        }

        let Some(device) = device.upgrade() else {
            debug!("{kind} worker lost its device");
            break;
        };
        let serial = device.serial().to_string();
        let drawn = draw(
            device.clone(),
            kind,
            &params,
            generation,
            &mut animation,
            updates.clone(),
        )
        .await;
        let pause = match drawn {
            Ok(true) => params.refresh(),
            Ok(false) => {
                if device.frame_generation() != generation {
                    overridden(&device, kind, &state, generation);
                }
                params.refresh()
            }
            Err(e) => {
                error!("[{serial}] {kind} frame failed: {e:#}");
                settings.render_backoff
            }
        };
        drop(device);

        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            () = tokio::time::sleep(pause) => {}
        }
    }
    debug!("{kind} worker exited");
}

/// A firmware effect was written while this effect was running. The matrix
/// belongs to that effect now, so the worker goes idle.
fn overridden(
    device: &Device,
    kind: EffectKind,
    state: &watch::Sender<WorkerState>,
    generation: u64,
) {
    let stopped = state.send_if_modified(|current| {
        if current.is_active_since(generation) {
            *current = WorkerState::Idle;
            true
        } else {
            false
        }
    });
    if stopped {
        info!("[{}] {kind} effect replaced by a firmware effect", device.serial());
        if kind.records_keys() {
            device.key_presses().set_recording(false);
        }
    }
}

/// Renders one frame and pushes it on the blocking pool. Returns false when
/// the frame was dropped at the gate.
async fn draw(
    device: Arc<Device>,
    kind: EffectKind,
    params: &EffectParams,
    generation: u64,
    animation: &mut Animation,
    current: watch::Receiver<WorkerState>,
) -> Result<bool> {
    let frame = render(&device, kind, params, animation)?;
    let pushed = tokio::task::spawn_blocking(move || {
        device.push_frame(
            generation,
            || current.borrow().is_active_since(generation),
            |device| push(device, &frame),
        )
    })
    .await
    .context("frame push task failed")??;
    Ok(pushed)
}

fn render(
    device: &Device,
    kind: EffectKind,
    params: &EffectParams,
    animation: &mut Animation,
) -> RazerResult<Frame> {
    let profile = device.profile();
    let matrix = profile.matrix.ok_or_else(|| {
        RazerError::UnsupportedOperation(format!("{kind} needs a key matrix"))
    })?;

    let frame = match params {
        EffectParams::Wheel { clockwise, refresh } => {
            animation.wheel.render(matrix, *clockwise, *refresh)
        }
        EffectParams::Fire { speed, palette } => {
            animation.fire.step(matrix, *speed, &mut rand::rng());
            animation.fire.render(matrix, palette)
        }
        EffectParams::Keys { colouring, .. } => {
            let store = device.key_presses();
            let now = Instant::now();
            let presses = store.active(now);
            let scene = KeyScene {
                matrix,
                excluded: profile.excluded_cells,
                remaps: profile.cell_remaps,
                presses: &presses,
                window: store.window(),
                now,
            };
            match kind {
                EffectKind::Reactive => reactive::render(&scene, colouring),
                _ => ripple::render(&scene, colouring),
            }
        }
    };
    Ok(frame)
}

fn push(device: &Device, frame: &Frame) -> RazerResult<()> {
    device.call("setKeyRow", &[Value::Bytes(frame.encode())])?;
    device.call("setCustom", &[])?;
    Ok(())
}
