use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::task;
use tracing::{info, warn};

use crate::{DeviceMap, TryOnError, TryOnPipeline};

/// Whether pipeline weights currently occupy accelerator memory.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResidencyState {
    Unloaded,
    Loaded,
}

serde_plain::derive_display_from_serialize!(ResidencyState);
serde_plain::derive_fromstr_from_deserialize!(ResidencyState);

/// Point-in-time residency report; producing one never blocks.
#[derive(Clone, Copy, Debug, Serialize)]
pub struct ResidencyStatus {
    pub state: ResidencyState,
    pub device: DeviceMap,
}

/// Owns the process-wide residency state machine.
///
/// At most one transition is in flight at a time: callers racing an
/// in-progress load wait on the transition lock and return once the single
/// transfer finishes. Each transition runs on its own task and holds the
/// lock there, so a caller dropped mid-transfer leaves the transfer running
/// to completion with its outcome recorded. A failed transfer leaves the
/// state `Unloaded`; nothing here retries on the caller's behalf.
pub struct ResidencyManager {
    pipeline: Arc<dyn TryOnPipeline>,
    device: DeviceMap,
    transition: Arc<Mutex<()>>,
    loaded: Arc<AtomicBool>,
}

impl ResidencyManager {
    /// Starts out `Unloaded`; weights stay on the host until the first
    /// request or an explicit load.
    pub fn new(pipeline: Arc<dyn TryOnPipeline>, device: DeviceMap) -> Self {
        Self {
            pipeline,
            device,
            transition: Arc::new(Mutex::new(())),
            loaded: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Guarantees the weights are resident, paying the transfer at most once.
    ///
    /// The transfer is not tied to this future: a caller dropped mid-load
    /// leaves it running to completion, outcome recorded.
    pub async fn ensure_loaded(&self) -> Result<(), TryOnError> {
        let transition = self.transition.clone();
        let loaded = self.loaded.clone();
        let pipeline = self.pipeline.clone();
        let device = self.device;
        let transfer = task::spawn(async move {
            let _transition = transition.lock().await;
            if loaded.load(Ordering::SeqCst) {
                return Ok(());
            }

            info!(device = %device, "loading pipeline weights onto device");
            let started = Instant::now();
            task::spawn_blocking(move || pipeline.load(device))
                .await
                .map_err(|e| TryOnError::residency(format!("load task failed: {e}")))?
                .map_err(|e| TryOnError::residency(e.to_string()))?;

            loaded.store(true, Ordering::SeqCst);
            info!(elapsed_ms = started.elapsed().as_millis() as u64, "pipeline weights loaded");
            Ok(())
        });
        transfer
            .await
            .map_err(|e| TryOnError::residency(format!("load task failed: {e}")))?
    }

    /// Moves weights off the accelerator; a no-op when nothing is resident.
    ///
    /// Survives caller cancellation the same way `ensure_loaded` does.
    pub async fn ensure_unloaded(&self) {
        let transition = self.transition.clone();
        let loaded = self.loaded.clone();
        let pipeline = self.pipeline.clone();
        let transfer = task::spawn(async move {
            let _transition = transition.lock().await;
            if !loaded.load(Ordering::SeqCst) {
                return;
            }

            info!("moving pipeline weights off the accelerator");
            if let Err(e) = task::spawn_blocking(move || pipeline.unload()).await {
                warn!("unload task failed: {e}");
            }
            loaded.store(false, Ordering::SeqCst);
            info!("pipeline weights unloaded");
        });
        if let Err(e) = transfer.await {
            warn!("unload task failed: {e}");
        }
    }

    /// Current state and device identity, read without taking the
    /// transition lock.
    pub fn status(&self) -> ResidencyStatus {
        let state = if self.loaded.load(Ordering::SeqCst) {
            ResidencyState::Loaded
        } else {
            ResidencyState::Unloaded
        };
        ResidencyStatus { state, device: self.device }
    }
}
