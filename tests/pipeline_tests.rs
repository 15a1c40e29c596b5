// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for the capture-to-classification cycle

use material_sorter::app::{
    LinuxPlatform, Orchestrator, OrchestratorSettings, Platform, Stage, UiUpdate, ui_channel,
};
use material_sorter::backends::camera::{
    CaptureDevice, CaptureFormat, FrameSize, PixelFormat, RawFrame,
};
use material_sorter::backends::gpio::{InputLine, OutputLine};
use material_sorter::board::BoardConfig;
use material_sorter::classifier::{ClassificationResult, Classifier};
use material_sorter::config::{CameraSource, Config};
use material_sorter::errors::{AppError, AppResult, CaptureError, GpioError, ModelLoadError};
use material_sorter::indicator::LedSet;
use material_sorter::media::ModelBitmap;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::mpsc::UnboundedReceiver;

/// Shared record of everything the fakes were asked to do
#[derive(Clone, Default)]
struct Recorder {
    events: Arc<Mutex<Vec<String>>>,
    captures: Arc<AtomicUsize>,
    led_writes: Arc<Mutex<Vec<(u32, bool)>>>,
}

impl Recorder {
    fn record(&self, event: &str) {
        self.events.lock().unwrap().push(event.to_string());
    }

    fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    fn count(&self, event: &str) -> usize {
        self.events().iter().filter(|e| *e == event).count()
    }

    fn led_writes(&self) -> Vec<(u32, bool)> {
        self.led_writes.lock().unwrap().clone()
    }
}

struct FakeCamera {
    recorder: Recorder,
    fail_open: bool,
    fail_capture: bool,
}

impl CaptureDevice for FakeCamera {
    fn name(&self) -> String {
        "fake camera".to_string()
    }

    fn open(&mut self, _target: FrameSize) -> AppResult<FrameSize> {
        self.recorder.record("camera.open");
        if self.fail_open {
            return Err(AppError::DeviceUnavailable("no camera attached".to_string()));
        }
        Ok(FrameSize::new(640, 480))
    }

    fn capture(&mut self) -> Result<RawFrame, CaptureError> {
        self.recorder.captures.fetch_add(1, Ordering::SeqCst);
        if self.fail_capture {
            return Err(CaptureError::Device("sensor timed out".to_string()));
        }
        Ok(RawFrame::packed(
            640,
            480,
            PixelFormat::Gray8,
            vec![128; 640 * 480],
        ))
    }

    fn supported_formats(&self) -> Vec<CaptureFormat> {
        Vec::new()
    }

    fn close(&mut self) -> AppResult<()> {
        self.recorder.record("camera.close");
        Ok(())
    }
}

struct FakeClassifier {
    recorder: Recorder,
    label: String,
    /// When set, each classification waits for a message (or disconnect)
    hold: Option<Receiver<()>>,
}

impl Classifier for FakeClassifier {
    fn classify(&mut self, bitmap: &ModelBitmap) -> ClassificationResult {
        assert_eq!((bitmap.width(), bitmap.height()), (224, 224));
        self.recorder.record("classify");
        if let Some(hold) = &self.hold {
            let _ = hold.recv();
        }
        ClassificationResult::from_label(&self.label)
    }

    fn close(&mut self) {
        self.recorder.record("classifier.close");
    }
}

struct FakeLed {
    recorder: Recorder,
    line: u32,
    /// Writes are recorded, then reported as failed
    fail_writes: bool,
}

impl OutputLine for FakeLed {
    fn line(&self) -> u32 {
        self.line
    }

    fn set_active(&mut self, active: bool) -> Result<(), GpioError> {
        self.recorder.led_writes.lock().unwrap().push((self.line, active));
        if self.fail_writes {
            return Err(GpioError::Io {
                line: self.line,
                reason: "EIO".to_string(),
            });
        }
        Ok(())
    }

    fn close(&mut self) -> Result<(), GpioError> {
        self.recorder.record("led.close");
        Ok(())
    }
}

struct FakeButton {
    recorder: Recorder,
    samples: VecDeque<bool>,
}

impl InputLine for FakeButton {
    fn line(&self) -> u32 {
        21
    }

    fn is_active(&mut self) -> Result<bool, GpioError> {
        if self.samples.len() > 1 {
            Ok(self.samples.pop_front().unwrap_or(false))
        } else {
            Ok(self.samples.front().copied().unwrap_or(false))
        }
    }

    fn close(&mut self) -> Result<(), GpioError> {
        self.recorder.record("button.close");
        Ok(())
    }
}

struct FakePlatform {
    recorder: Recorder,
    label: String,
    fail_camera: bool,
    fail_capture: bool,
    fail_model: bool,
    fail_leds: bool,
    failing_led: Option<u32>,
    classifier_hold: Option<Receiver<()>>,
    button_script: Option<Vec<bool>>,
}

impl FakePlatform {
    fn new(recorder: &Recorder, label: &str) -> Self {
        Self {
            recorder: recorder.clone(),
            label: label.to_string(),
            fail_camera: false,
            fail_capture: false,
            fail_model: false,
            fail_leds: false,
            failing_led: None,
            classifier_hold: None,
            button_script: None,
        }
    }
}

impl Platform for FakePlatform {
    fn open_camera(&mut self) -> AppResult<Box<dyn CaptureDevice>> {
        Ok(Box::new(FakeCamera {
            recorder: self.recorder.clone(),
            fail_open: self.fail_camera,
            fail_capture: self.fail_capture,
        }))
    }

    fn load_classifier(&mut self) -> Result<Box<dyn Classifier>, ModelLoadError> {
        self.recorder.record("classifier.load");
        if self.fail_model {
            return Err(ModelLoadError::Invalid("corrupt model".to_string()));
        }
        Ok(Box::new(FakeClassifier {
            recorder: self.recorder.clone(),
            label: self.label.clone(),
            hold: self.classifier_hold.take(),
        }))
    }

    fn open_indicators(&mut self) -> AppResult<LedSet> {
        self.recorder.record("gpio.leds");
        if self.fail_leds {
            return Err(AppError::DeviceUnavailable("gpio busy".to_string()));
        }
        let led = |line| -> Box<dyn OutputLine> {
            Box::new(FakeLed {
                recorder: self.recorder.clone(),
                line,
                fail_writes: self.failing_led == Some(line),
            })
        };
        Ok(LedSet::new(led(0), led(1), led(2)))
    }

    fn open_button(&mut self) -> AppResult<Option<Box<dyn InputLine>>> {
        self.recorder.record("gpio.button");
        Ok(self.button_script.take().map(|script| {
            Box::new(FakeButton {
                recorder: self.recorder.clone(),
                samples: script.into(),
            }) as Box<dyn InputLine>
        }))
    }
}

fn fast_settings() -> OrchestratorSettings {
    OrchestratorSettings {
        led_pulse: Duration::from_millis(20),
        button_poll: Duration::from_millis(1),
        button_debounce: Duration::from_millis(2),
        shutdown_timeout: Duration::from_secs(2),
    }
}

/// Collect updates until a result arrives
fn updates_until_result(rx: &mut UnboundedReceiver<UiUpdate>) -> Vec<UiUpdate> {
    let deadline = Instant::now() + Duration::from_secs(5);
    let mut updates = Vec::new();
    while Instant::now() < deadline {
        match rx.try_recv() {
            Ok(update) => {
                let done = matches!(update, UiUpdate::Result(_));
                updates.push(update);
                if done {
                    return updates;
                }
            }
            Err(_) => std::thread::sleep(Duration::from_millis(2)),
        }
    }
    panic!("no result published, got {:?}", updates);
}

fn wait_until(what: &str, condition: impl Fn() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(Instant::now() < deadline, "timed out waiting for {}", what);
        std::thread::sleep(Duration::from_millis(2));
    }
}

#[test]
fn test_full_cycle_publishes_and_pulses_then_reopens() {
    let recorder = Recorder::default();
    let (ui, mut rx) = ui_channel();
    let platform = FakePlatform::new(&recorder, "metal");
    let orchestrator =
        Orchestrator::initialize(Box::new(platform), ui, fast_settings()).expect("initialize");

    assert!(orchestrator.is_ready(), "gate opens after initialization");
    assert_eq!(orchestrator.capture_size(), Some(FrameSize::new(640, 480)));
    assert!(matches!(rx.try_recv(), Ok(UiUpdate::Status(_))));

    assert!(orchestrator.on_trigger_event());
    let updates = updates_until_result(&mut rx);

    assert_eq!(updates.len(), 3, "status, preview, result: {:?}", updates);
    assert_eq!(updates[0], UiUpdate::Status("Hold on...".to_string()));
    match &updates[1] {
        UiUpdate::Preview(bitmap) => assert_eq!((bitmap.width(), bitmap.height()), (224, 224)),
        other => panic!("expected preview, got {:?}", other),
    }
    assert_eq!(
        updates[2],
        UiUpdate::Result(ClassificationResult::Label("metal".to_string()))
    );

    assert!(orchestrator.wait_for_worker());
    assert!(orchestrator.is_ready(), "full cycle leaves the gate ready");
    assert_eq!(orchestrator.stage(), Stage::Ready);
    assert_eq!(recorder.led_writes(), vec![(1, true), (1, false)]);
    assert_eq!(orchestrator.cycles(), Some(1));
}

#[test]
fn test_trigger_while_busy_dispatches_nothing() {
    let recorder = Recorder::default();
    let (release, hold): (Sender<()>, Receiver<()>) = mpsc::channel();
    let mut platform = FakePlatform::new(&recorder, "paper");
    platform.classifier_hold = Some(hold);

    let (ui, mut rx) = ui_channel();
    let orchestrator =
        Orchestrator::initialize(Box::new(platform), ui, fast_settings()).expect("initialize");

    assert!(orchestrator.on_trigger_event());
    assert!(!orchestrator.is_ready());
    assert!(!orchestrator.on_trigger_event(), "second trigger rejected while busy");
    assert!(!orchestrator.trigger_handle().fire());

    wait_until("classification to start", || recorder.count("classify") == 1);
    assert_eq!(recorder.captures.load(Ordering::SeqCst), 1);

    drop(release);
    updates_until_result(&mut rx);
    assert!(orchestrator.wait_for_worker());

    assert_eq!(recorder.captures.load(Ordering::SeqCst), 1, "no queued capture");
    assert!(orchestrator.on_trigger_event(), "accepted again once ready");
    updates_until_result(&mut rx);
    assert_eq!(recorder.captures.load(Ordering::SeqCst), 2);
}

#[test]
fn test_trigger_accepted_while_led_is_lit() {
    let recorder = Recorder::default();
    let settings = OrchestratorSettings {
        led_pulse: Duration::from_millis(600),
        shutdown_timeout: Duration::from_secs(5),
        ..fast_settings()
    };
    let (ui, mut rx) = ui_channel();
    let platform = FakePlatform::new(&recorder, "metal");
    let orchestrator =
        Orchestrator::initialize(Box::new(platform), ui, settings).expect("initialize");

    assert!(orchestrator.on_trigger_event());
    updates_until_result(&mut rx);
    wait_until("metal LED to light", || !recorder.led_writes().is_empty());

    assert_eq!(recorder.led_writes(), vec![(1, true)], "LED still lit");
    assert!(orchestrator.is_ready(), "gate reopens before the pulse ends");
    assert!(orchestrator.on_trigger_event(), "trigger during the pulse is accepted");

    updates_until_result(&mut rx);
    assert!(orchestrator.wait_for_worker());
    assert_eq!(recorder.captures.load(Ordering::SeqCst), 2);
    assert_eq!(
        recorder.led_writes(),
        vec![(1, true), (1, false), (1, true), (1, false)]
    );
}

#[test]
fn test_failed_capture_publishes_nothing_and_stays_busy() {
    let recorder = Recorder::default();
    let mut platform = FakePlatform::new(&recorder, "metal");
    platform.fail_capture = true;

    let (ui, mut rx) = ui_channel();
    let orchestrator =
        Orchestrator::initialize(Box::new(platform), ui, fast_settings()).expect("initialize");
    assert!(matches!(rx.try_recv(), Ok(UiUpdate::Status(_))));

    assert!(orchestrator.on_trigger_event());
    wait_until("capture attempt", || {
        recorder.captures.load(Ordering::SeqCst) == 1
    });
    assert!(orchestrator.wait_for_worker());

    assert_eq!(
        rx.try_recv().ok(),
        Some(UiUpdate::Status("Hold on...".to_string()))
    );
    assert!(rx.try_recv().is_err(), "no preview or result after a failed capture");
    assert!(!orchestrator.is_ready(), "failed capture leaves the gate busy");
    assert_eq!(orchestrator.stage(), Stage::Capturing);
    assert!(!orchestrator.on_trigger_event());
    assert_eq!(recorder.captures.load(Ordering::SeqCst), 1);
    assert!(recorder.led_writes().is_empty());
}

#[test]
fn test_led_write_failure_keeps_result_and_gate() {
    let recorder = Recorder::default();
    let mut platform = FakePlatform::new(&recorder, "metal");
    platform.failing_led = Some(1);

    let (ui, mut rx) = ui_channel();
    let orchestrator =
        Orchestrator::initialize(Box::new(platform), ui, fast_settings()).expect("initialize");

    assert!(orchestrator.on_trigger_event());
    let updates = updates_until_result(&mut rx);
    assert_eq!(
        updates.last(),
        Some(&UiUpdate::Result(ClassificationResult::Label(
            "metal".to_string()
        )))
    );

    assert!(orchestrator.wait_for_worker());
    assert!(orchestrator.is_ready());
    assert_eq!(orchestrator.stage(), Stage::Ready);
    // The inactive write is still attempted after the failed activation
    assert_eq!(recorder.led_writes(), vec![(1, true), (1, false)]);
    assert!(orchestrator.on_trigger_event(), "next cycle still accepted");
}

#[test]
fn test_camera_failure_touches_nothing_else() {
    let recorder = Recorder::default();
    let mut platform = FakePlatform::new(&recorder, "metal");
    platform.fail_camera = true;

    let (ui, _rx) = ui_channel();
    let result = Orchestrator::initialize(Box::new(platform), ui, fast_settings());

    assert!(matches!(result, Err(AppError::DeviceUnavailable(_))));
    assert_eq!(recorder.events(), vec!["camera.open".to_string()]);
}

#[test]
fn test_model_failure_releases_camera() {
    let recorder = Recorder::default();
    let mut platform = FakePlatform::new(&recorder, "metal");
    platform.fail_model = true;

    let (ui, _rx) = ui_channel();
    let result = Orchestrator::initialize(Box::new(platform), ui, fast_settings());

    assert!(matches!(result, Err(AppError::ModelLoad(_))));
    assert_eq!(
        recorder.events(),
        vec!["camera.open", "classifier.load", "camera.close"]
    );
}

#[test]
fn test_led_failure_degrades_but_cycles_still_run() {
    let recorder = Recorder::default();
    let mut platform = FakePlatform::new(&recorder, "plastic");
    platform.fail_leds = true;

    let (ui, mut rx) = ui_channel();
    let orchestrator =
        Orchestrator::initialize(Box::new(platform), ui, fast_settings()).expect("initialize");

    assert!(orchestrator.on_trigger_event());
    let updates = updates_until_result(&mut rx);
    assert_eq!(
        updates.last(),
        Some(&UiUpdate::Result(ClassificationResult::Label(
            "plastic".to_string()
        )))
    );
    assert!(orchestrator.wait_for_worker());
    assert!(orchestrator.is_ready());
    assert!(recorder.led_writes().is_empty());
}

#[test]
fn test_empty_label_shows_fallback_and_lights_nothing() {
    let recorder = Recorder::default();
    let (ui, mut rx) = ui_channel();
    let platform = FakePlatform::new(&recorder, "");
    let orchestrator =
        Orchestrator::initialize(Box::new(platform), ui, fast_settings()).expect("initialize");

    assert!(orchestrator.on_trigger_event());
    let updates = updates_until_result(&mut rx);
    match updates.last() {
        Some(UiUpdate::Result(result)) => {
            assert_eq!(result, &ClassificationResult::NoResult);
            assert_eq!(result.display_text(), "I don't understand what I see");
        }
        other => panic!("expected result, got {:?}", other),
    }

    assert!(orchestrator.wait_for_worker());
    assert!(recorder.led_writes().is_empty());
    assert!(orchestrator.is_ready());
}

#[test]
fn test_button_release_triggers_a_cycle() {
    let recorder = Recorder::default();
    let mut platform = FakePlatform::new(&recorder, "paper");
    let mut script = vec![false; 50];
    script.extend([true; 10]);
    script.push(false);
    platform.button_script = Some(script);

    let (ui, mut rx) = ui_channel();
    let orchestrator =
        Orchestrator::initialize(Box::new(platform), ui, fast_settings()).expect("initialize");
    assert!(orchestrator.has_button());

    let updates = updates_until_result(&mut rx);
    assert_eq!(
        updates.last(),
        Some(&UiUpdate::Result(ClassificationResult::Label(
            "paper".to_string()
        )))
    );
    assert!(orchestrator.wait_for_worker());
    assert_eq!(recorder.captures.load(Ordering::SeqCst), 1);
    assert_eq!(recorder.led_writes(), vec![(0, true), (0, false)]);
}

#[test]
fn test_shutdown_is_ordered_and_repeatable() {
    let recorder = Recorder::default();
    let mut platform = FakePlatform::new(&recorder, "metal");
    platform.button_script = Some(vec![false]);

    let (ui, _rx) = ui_channel();
    let mut orchestrator =
        Orchestrator::initialize(Box::new(platform), ui, fast_settings()).expect("initialize");
    let trigger = orchestrator.trigger_handle();

    orchestrator.shutdown();
    orchestrator.shutdown();
    assert_eq!(orchestrator.stage(), Stage::ShutDown);
    assert!(!trigger.fire(), "no captures after shutdown");
    drop(orchestrator);

    assert_eq!(
        recorder.events(),
        vec![
            "camera.open",
            "classifier.load",
            "gpio.leds",
            "gpio.button",
            "camera.close",
            "classifier.close",
            "button.close",
            "led.close",
            "led.close",
            "led.close",
        ]
    );
}

#[test]
fn test_shutdown_abandons_a_stuck_cycle() {
    let recorder = Recorder::default();
    let (release, hold) = mpsc::channel::<()>();
    let mut platform = FakePlatform::new(&recorder, "metal");
    platform.classifier_hold = Some(hold);

    let (ui, _rx) = ui_channel();
    let settings = OrchestratorSettings {
        shutdown_timeout: Duration::from_millis(100),
        ..fast_settings()
    };
    let mut orchestrator =
        Orchestrator::initialize(Box::new(platform), ui, settings).expect("initialize");

    assert!(orchestrator.on_trigger_event());
    wait_until("classification to start", || recorder.count("classify") == 1);

    let start = Instant::now();
    orchestrator.shutdown();
    assert!(start.elapsed() < Duration::from_secs(2), "shutdown did not hang");
    assert_eq!(recorder.count("camera.close"), 0, "stuck worker still owns the camera");

    // Unblock the abandoned worker so it can finish releasing
    drop(release);
    wait_until("abandoned worker to release the camera", || {
        recorder.count("camera.close") == 1
    });
    assert!(!orchestrator.is_ready(), "late cycle does not reopen the gate");
    assert!(!orchestrator.on_trigger_event());
    assert_eq!(
        orchestrator.stage(),
        Stage::ShutDown,
        "late cycle does not move the stage"
    );
}

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "material-sorter-it-{}-{}",
        name,
        std::process::id()
    ));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn read_attr(root: &Path, line: u32, attr: &str) -> String {
    std::fs::read_to_string(root.join(format!("gpio{}", line)).join(attr))
        .unwrap()
        .trim()
        .to_string()
}

#[test]
fn test_still_images_through_linux_platform() {
    let dir = scratch_dir("still");
    let images = dir.join("images");
    std::fs::create_dir_all(&images).unwrap();
    image::RgbImage::from_pixel(640, 480, image::Rgb([204, 199, 189]))
        .save(images.join("sheet.png"))
        .unwrap();

    let gpio_root = dir.join("gpio");
    for line in [6, 19, 26] {
        let pin = gpio_root.join(format!("gpio{}", line));
        std::fs::create_dir_all(&pin).unwrap();
        std::fs::write(pin.join("value"), "0").unwrap();
    }

    let config = Config {
        camera: CameraSource::Still {
            path: images.clone(),
        },
        model_path: Some(Path::new(env!("CARGO_MANIFEST_DIR")).join("res/model.json")),
        gpio_root: gpio_root.clone(),
        led_pulse_ms: 10,
        ..Config::default()
    };
    let board = BoardConfig {
        name: "test".to_string(),
        leds: [6, 19, 26],
        button: None,
        button_active_low: true,
        gpio_base: 0,
    };

    let settings = OrchestratorSettings::from(&config);
    let (ui, mut rx) = ui_channel();
    let mut orchestrator =
        Orchestrator::initialize(Box::new(LinuxPlatform::new(config, board)), ui, settings)
            .expect("initialize");

    assert_eq!(orchestrator.capture_size(), Some(FrameSize::new(640, 480)));
    assert!(!orchestrator.has_button());
    for line in [6, 19, 26] {
        assert_eq!(read_attr(&gpio_root, line, "direction"), "low");
    }

    assert!(orchestrator.on_trigger_event());
    let updates = updates_until_result(&mut rx);
    assert_eq!(
        updates.last(),
        Some(&UiUpdate::Result(ClassificationResult::Label(
            "paper".to_string()
        )))
    );
    assert!(orchestrator.wait_for_worker());
    assert_eq!(read_attr(&gpio_root, 6, "value"), "0", "LED off after the pulse");

    orchestrator.shutdown();
    std::fs::remove_dir_all(&dir).unwrap();
}
