// SPDX-License-Identifier: GPL-3.0-only

//! Capture-to-classification orchestration
//!
//! # Architecture
//!
//! - `gate`: Single-flight readiness gate
//! - `state`: Stage cell and UI messages
//! - `platform`: Device factory trait and the Linux implementation
//! - `session`: Pipeline state owned by the worker thread
//!
//! A cycle runs: trigger → gate → capture → conversion → classification →
//! UI publish → gate release → LED pulse. Everything after the gate runs on
//! the worker thread; triggers return immediately.

pub mod gate;
pub mod platform;
pub mod session;
pub mod state;

pub use gate::ReadinessGate;
pub use platform::{LinuxPlatform, Platform};
pub use session::{MODEL_SIZE, Session};
pub use state::{Stage, StageCell, UiPublisher, UiUpdate, ui_channel};

use crate::backends::button::ButtonDriver;
use crate::backends::camera::FrameSize;
use crate::config::Config;
use crate::constants::{texts, timing};
use crate::errors::{AppError, AppResult};
use crate::worker::{Worker, WorkerHandle};
use std::time::Duration;
use tracing::{error, info, warn};

/// Timing knobs for the orchestrator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrchestratorSettings {
    pub led_pulse: Duration,
    pub button_poll: Duration,
    pub button_debounce: Duration,
    pub shutdown_timeout: Duration,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            led_pulse: timing::LED_PULSE,
            button_poll: timing::BUTTON_POLL,
            button_debounce: timing::BUTTON_DEBOUNCE,
            shutdown_timeout: timing::SHUTDOWN_TIMEOUT,
        }
    }
}

impl From<&Config> for OrchestratorSettings {
    fn from(config: &Config) -> Self {
        Self {
            led_pulse: config.led_pulse(),
            button_poll: config.button_poll(),
            button_debounce: config.button_debounce(),
            shutdown_timeout: config.shutdown_timeout(),
        }
    }
}

/// Cloneable entry point for input events (button thread, UI)
#[derive(Clone)]
pub struct TriggerHandle {
    gate: ReadinessGate,
    stage: StageCell,
    ui: UiPublisher,
    worker: WorkerHandle<Session>,
}

impl TriggerHandle {
    /// Start a capture cycle if none is in flight
    ///
    /// Returns true if a capture was dispatched.
    pub fn fire(&self) -> bool {
        if !self.gate.try_acquire() {
            info!("Sorry, processing hasn't finished. Try again in a few seconds");
            return false;
        }

        self.stage.set(Stage::Capturing);
        self.ui.status(texts::PROCESSING);

        if !self.worker.post(Session::take_picture) {
            error!("Worker stopped, capture not dispatched");
            return false;
        }
        true
    }
}

/// Owns the worker, the button driver and the readiness gate
pub struct Orchestrator {
    trigger: TriggerHandle,
    worker: Option<Worker<Session>>,
    button: Option<ButtonDriver>,
    settings: OrchestratorSettings,
    capture_size: Option<FrameSize>,
    shut_down: bool,
}

impl Orchestrator {
    /// Bring the pipeline up and open the gate
    ///
    /// # Errors
    /// * `AppError::DeviceUnavailable` - camera could not be opened
    /// * `AppError::ModelLoad` - classifier could not be loaded
    ///
    /// Everything opened before the failure is released again.
    pub fn initialize(
        platform: Box<dyn Platform>,
        ui: UiPublisher,
        settings: OrchestratorSettings,
    ) -> AppResult<Self> {
        let gate = ReadinessGate::new();
        let stage = StageCell::default();
        let session = Session::new(gate.clone(), stage.clone(), ui.clone(), settings.led_pulse);

        let worker = Worker::spawn("sorter-worker", session)
            .map_err(|e| AppError::Other(format!("Cannot start worker thread: {}", e)))?;
        let context = worker.handle();

        let mut orchestrator = Self {
            trigger: TriggerHandle {
                gate,
                stage,
                ui,
                worker: context.clone(),
            },
            worker: Some(worker),
            button: None,
            settings,
            capture_size: None,
            shut_down: false,
        };

        let delivery = context.clone();
        let outcome = context.call(move |session| {
            let mut platform = platform;
            let result = session.initialize(platform.as_mut(), delivery);
            (platform, result)
        });

        let Some((mut platform, result)) = outcome else {
            orchestrator.shutdown();
            return Err(AppError::Other("Worker stopped during initialization".to_string()));
        };

        match result {
            Ok(size) => orchestrator.capture_size = Some(size),
            Err(e) => {
                error!(error = %e, "Initialization failed");
                orchestrator.shutdown();
                return Err(e);
            }
        }

        match platform.open_button() {
            Ok(Some(line)) => {
                let trigger = orchestrator.trigger.clone();
                match ButtonDriver::start(
                    line,
                    settings.button_poll,
                    settings.button_debounce,
                    move || {
                        trigger.fire();
                    },
                ) {
                    Ok(driver) => orchestrator.button = Some(driver),
                    Err(e) => warn!(error = %e, "Could not start button driver"),
                }
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "Could not open button, screen tap still works"),
        }

        orchestrator.trigger.stage.set(Stage::Ready);
        orchestrator.trigger.ui.status(texts::READY);
        orchestrator.trigger.gate.release();
        info!(button = orchestrator.button.is_some(), "Sorter ready");

        Ok(orchestrator)
    }

    /// Input event (button release or screen tap)
    pub fn on_trigger_event(&self) -> bool {
        self.trigger.fire()
    }

    pub fn trigger_handle(&self) -> TriggerHandle {
        self.trigger.clone()
    }

    pub fn is_ready(&self) -> bool {
        self.trigger.gate.is_ready()
    }

    pub fn stage(&self) -> Stage {
        self.trigger.stage.get()
    }

    pub fn capture_size(&self) -> Option<FrameSize> {
        self.capture_size
    }

    pub fn has_button(&self) -> bool {
        self.button.is_some()
    }

    /// Block until every task queued so far (including LED pulses) has run
    pub fn wait_for_worker(&self) -> bool {
        self.worker
            .as_ref()
            .and_then(|w| w.handle().call_timeout(self.settings.shutdown_timeout, |_| ()))
            .is_some()
    }

    /// Completed classification cycles
    pub fn cycles(&self) -> Option<u64> {
        self.worker
            .as_ref()
            .and_then(|w| w.handle().call_timeout(self.settings.shutdown_timeout, |s| s.cycles()))
    }

    /// Release camera, classifier, button and LEDs, in that order
    ///
    /// Idempotent. A worker that does not answer within the shutdown timeout
    /// is abandoned together with whatever it still owns.
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;
        info!("Shutting down");

        self.trigger.gate.close();
        self.trigger.stage.set(Stage::ShutDown);

        let timeout = self.settings.shutdown_timeout;
        let worker = self.worker.take();

        let pipeline_released = match &worker {
            Some(w) => w
                .handle()
                .call_timeout(timeout, Session::release_pipeline)
                .is_some(),
            None => true,
        };
        if !pipeline_released {
            warn!("Worker did not respond, abandoning camera and classifier");
        }

        if let Some(mut button) = self.button.take() {
            button.stop();
        }

        let indicators_released = pipeline_released
            && match &worker {
                Some(w) => w
                    .handle()
                    .call_timeout(timeout, Session::release_indicators)
                    .is_some(),
                None => true,
            };

        match worker {
            Some(mut w) if indicators_released => w.stop(),
            Some(w) => {
                warn!("Abandoning LED lines with the unresponsive worker");
                w.abandon();
            }
            None => {}
        }

        info!("Shutdown complete");
    }
}

impl Drop for Orchestrator {
    fn drop(&mut self) {
        self.shutdown();
    }
}
