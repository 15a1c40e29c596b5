// SPDX-License-Identifier: GPL-3.0-only

//! Worker-owned pipeline state
//!
//! Everything in a [`Session`] lives on the worker thread, so the capture
//! cycle runs without locks. The other threads only touch the gate, the
//! stage cell and the UI channel.

use super::gate::ReadinessGate;
use super::platform::Platform;
use super::state::{Stage, StageCell, UiPublisher, UiUpdate};
use crate::backends::camera::{CaptureController, FrameSize, RawFrame};
use crate::classifier::{ClassificationResult, Classifier};
use crate::constants::{MODEL_IMAGE_HEIGHT, MODEL_IMAGE_WIDTH};
use crate::errors::AppResult;
use crate::indicator::PeripheralIndicator;
use crate::media::FrameConverter;
use crate::worker::WorkerHandle;
use std::time::Duration;
use tracing::{debug, error, info, warn};

pub const MODEL_SIZE: FrameSize = FrameSize::new(MODEL_IMAGE_WIDTH, MODEL_IMAGE_HEIGHT);

pub struct Session {
    capture: CaptureController<Session>,
    converter: Option<FrameConverter>,
    classifier: Option<Box<dyn Classifier>>,
    indicator: PeripheralIndicator,
    gate: ReadinessGate,
    stage: StageCell,
    ui: UiPublisher,
    led_pulse: Duration,
    cycles: u64,
}

impl Session {
    pub fn new(
        gate: ReadinessGate,
        stage: StageCell,
        ui: UiPublisher,
        led_pulse: Duration,
    ) -> Self {
        Self {
            capture: CaptureController::new(),
            converter: None,
            classifier: None,
            indicator: PeripheralIndicator::disconnected(led_pulse),
            gate,
            stage,
            ui,
            led_pulse,
            cycles: 0,
        }
    }

    /// Open camera, converter, classifier and LEDs, in that order
    ///
    /// A camera failure returns before the classifier or GPIO are touched.
    /// A classifier failure releases the camera. LED failures only degrade.
    pub fn initialize(
        &mut self,
        platform: &mut dyn Platform,
        context: WorkerHandle<Session>,
    ) -> AppResult<FrameSize> {
        let device = platform.open_camera()?;
        let dimensions = self.capture.initialize(
            device,
            MODEL_SIZE,
            context,
            Session::on_frame_ready,
        )?;

        for format in self.capture.supported_formats() {
            debug!(%format, "Supported capture format");
        }

        self.converter = Some(FrameConverter::new(dimensions, MODEL_SIZE));

        match platform.load_classifier() {
            Ok(classifier) => self.classifier = Some(classifier),
            Err(e) => {
                error!(error = %e, "Cannot initialize classifier");
                self.capture.shutdown();
                self.converter = None;
                return Err(e.into());
            }
        }

        self.indicator = match platform.open_indicators() {
            Ok(leds) => PeripheralIndicator::new(leds, self.led_pulse),
            Err(e) => {
                warn!(error = %e, "Could not open LED pins, continuing without indicators");
                PeripheralIndicator::disconnected(self.led_pulse)
            }
        };

        info!(capture = %dimensions, model = %MODEL_SIZE, "Pipeline initialized");
        Ok(dimensions)
    }

    /// Start one capture; the frame comes back through `on_frame_ready`
    pub fn take_picture(&mut self) {
        if let Err(e) = self.capture.take_picture() {
            error!(error = %e, "Capture failed, sorter stays busy");
        }
    }

    /// Convert, publish, classify, publish, reopen the gate, pulse the LED
    pub fn on_frame_ready(&mut self, frame: RawFrame) {
        self.stage.set(Stage::Classifying);

        let Some(converter) = self.converter else {
            error!("Frame delivered without a converter");
            return;
        };

        let bitmap = match converter.convert(frame) {
            Ok(bitmap) => bitmap,
            Err(e) => {
                error!(error = %e, "Frame conversion failed, sorter stays busy");
                return;
            }
        };
        self.ui.send(UiUpdate::Preview(bitmap.clone()));

        let result = match self.classifier.as_mut() {
            Some(classifier) => classifier.classify(&bitmap),
            None => {
                warn!("Frame delivered without a classifier");
                ClassificationResult::NoResult
            }
        };
        self.cycles += 1;
        info!(cycle = self.cycles, result = result.display_text(), "Classification finished");

        self.ui.send(UiUpdate::Result(result.clone()));

        self.stage.set(Stage::Indicating);
        self.gate.release();

        // The pulse may overlap the next trigger
        if let Some(label) = result.label() {
            self.indicator.indicate(label);
        }
        self.stage.transition(Stage::Indicating, Stage::Ready);
    }

    /// Release the camera, then the classifier
    pub fn release_pipeline(&mut self) {
        self.capture.shutdown();
        self.converter = None;
        if let Some(mut classifier) = self.classifier.take() {
            classifier.close();
        }
    }

    pub fn release_indicators(&mut self) {
        self.indicator.close();
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn capture_size(&self) -> Option<FrameSize> {
        self.capture.dimensions()
    }
}
