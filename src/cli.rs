// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands
//!
//! This module provides command-line functionality for:
//! - Running the sorter without a terminal UI
//! - Listing capture formats
//! - Classifying a single image file
//! - Printing the resolved board pin table

use chrono::Local;
use material_sorter::app::{MODEL_SIZE, Orchestrator, UiUpdate};
use material_sorter::backends::camera::{
    CaptureDevice, FrameSize, PixelFormat, RawFrame, StillImageCamera, V4l2Camera, still,
};
use material_sorter::board;
use material_sorter::classifier::{CentroidClassifier, Classifier};
use material_sorter::config::{CameraSource, Config};
use material_sorter::constants::timing;
use material_sorter::media::FrameConverter;
use std::io::BufRead;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, info, warn};

/// Run without a display; results are printed, Enter on stdin triggers
pub fn run_headless(
    orchestrator: &Orchestrator,
    mut updates: UnboundedReceiver<UiUpdate>,
) -> Result<(), Box<dyn std::error::Error>> {
    let stop_flag = Arc::new(AtomicBool::new(false));
    let stop_flag_clone = stop_flag.clone();
    ctrlc::set_handler(move || {
        stop_flag_clone.store(true, Ordering::SeqCst);
    })?;

    // Blocking stdin reader; the thread is left behind on exit
    let trigger = orchestrator.trigger_handle();
    std::thread::Builder::new()
        .name("stdin-trigger".to_string())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                if line.is_err() {
                    break;
                }
                trigger.fire();
            }
            debug!("stdin closed");
        })?;

    println!("Sorter running. Press the button or Enter to capture, Ctrl+C to quit.");

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        loop {
            if stop_flag.load(Ordering::SeqCst) {
                println!();
                println!("Stopping...");
                break;
            }

            tokio::select! {
                update = updates.recv() => match update {
                    Some(update) => print_update(&update),
                    None => break,
                },
                _ = tokio::time::sleep(timing::HEADLESS_TICK) => {}
            }
        }
    });

    Ok(())
}

fn print_update(update: &UiUpdate) {
    let timestamp = Local::now().format("%H:%M:%S");
    match update {
        UiUpdate::Status(text) => {
            info!(status = %text, "Status");
            println!("[{}] {}", timestamp, text);
        }
        UiUpdate::Preview(bitmap) => {
            debug!(width = bitmap.width(), height = bitmap.height(), "Preview updated");
        }
        UiUpdate::Result(result) => {
            info!(result = result.display_text(), "Result");
            println!("[{}] Result: {}", timestamp, result.display_text());
        }
    }
}

/// List the capture formats of the configured camera
pub fn list_formats(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let formats = match &config.camera {
        CameraSource::V4l2 { device } => {
            println!("Formats of {}:", device);
            V4l2Camera::probe_formats(device)?
        }
        CameraSource::Still { path } => {
            println!("Formats of still images at {}:", path.display());
            let mut camera = StillImageCamera::new(path);
            camera.open(MODEL_SIZE)?;
            let formats = camera.supported_formats();
            camera.close()?;
            formats
        }
    };

    if formats.is_empty() {
        println!("  No formats reported.");
        return Ok(());
    }

    for format in formats {
        println!("  {}", format);
    }
    Ok(())
}

/// Classify one image file and print the result
pub fn classify_image(config: &Config, image: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let rgb = still::load_rgb(image)?;
    let size = FrameSize::new(rgb.width(), rgb.height());
    if !size.covers(MODEL_SIZE) {
        warn!(size = %size, "Image is smaller than the model input, upscaling");
    }

    let frame = RawFrame::packed(size.width, size.height, PixelFormat::RGB24, rgb.into_raw());
    let bitmap = FrameConverter::new(size, MODEL_SIZE).convert(frame)?;

    let model_path = config.resolve_model_path();
    let mut classifier = CentroidClassifier::from_file(&model_path)?;
    let result = classifier.classify(&bitmap);
    classifier.close();

    println!("{}: {}", image.display(), result.display_text());
    Ok(())
}

/// Print the pin table the sorter would use
pub fn print_board(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let board = board::resolve(&config.device_tree_model, &config.gpio_root, &config.board);
    println!("{}", board);
    println!("GPIO root: {}", config.gpio_root.display());
    Ok(())
}
