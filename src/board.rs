// SPDX-License-Identifier: GPL-3.0-only

//! Board pin tables
//!
//! Known boards are recognised from the device-tree model string. Line
//! numbers are offsets on the board's GPIO controller; the sysfs base of
//! that controller is looked up at runtime because it moved between kernel
//! versions (0 on older Raspberry Pi kernels, 512 on newer ones).

use crate::indicator::Category;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info, warn};

/// Resolved pin table, consumed once at startup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardConfig {
    pub name: String,
    /// LED offsets in category order (paper, metal, plastic)
    pub leds: [u32; 3],
    /// Push-button offset, `None` for no button
    pub button: Option<u32>,
    pub button_active_low: bool,
    /// sysfs number of the controller's first line
    pub gpio_base: u32,
}

impl BoardConfig {
    /// sysfs line number of a category LED
    pub fn led_line(&self, category: Category) -> u32 {
        self.gpio_base + self.leds[category.index()]
    }

    /// sysfs line number of the push-button
    pub fn button_line(&self) -> Option<u32> {
        self.button.map(|offset| self.gpio_base + offset)
    }
}

/// Per-field overrides from the configuration file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoardOverrides {
    pub leds: Option<[u32; 3]>,
    pub button: Option<u32>,
    /// Run without a push-button even if the board has one
    pub disable_button: bool,
    pub button_active_low: Option<bool>,
    pub gpio_base: Option<u32>,
}

struct Preset {
    model_prefix: &'static str,
    name: &'static str,
    leds: [u32; 3],
    button: Option<u32>,
    /// Labels of the gpiochip the offsets refer to
    chip_labels: &'static [&'static str],
}

const PRESETS: &[Preset] = &[Preset {
    model_prefix: "Raspberry Pi",
    name: "Raspberry Pi",
    leds: [6, 19, 26],
    button: Some(21),
    chip_labels: &["pinctrl-bcm2835", "pinctrl-bcm2711", "pinctrl-rp1"],
}];

impl Preset {
    fn to_config(&self) -> BoardConfig {
        BoardConfig {
            name: self.name.to_string(),
            leds: self.leds,
            button: self.button,
            button_active_low: true,
            gpio_base: 0,
        }
    }
}

/// Pin table used when the board is not recognised
pub fn generic() -> BoardConfig {
    BoardConfig {
        name: "generic".to_string(),
        ..PRESETS[0].to_config()
    }
}

fn preset_for(model: &str) -> Option<&'static Preset> {
    PRESETS.iter().find(|p| model.starts_with(p.model_prefix))
}

/// Preset pin table for a device-tree model string
pub fn preset_for_model(model: &str) -> Option<BoardConfig> {
    preset_for(model).map(Preset::to_config)
}

/// Read the device-tree model string (NUL terminated in procfs)
pub fn read_model(path: &Path) -> Option<String> {
    let raw = std::fs::read(path).ok()?;
    let text = String::from_utf8_lossy(&raw);
    let model = text.trim_end_matches('\0').trim().to_string();
    (!model.is_empty()).then_some(model)
}

/// sysfs base of the first gpiochip whose label matches one of `labels`
pub fn detect_gpio_base(gpio_root: &Path, labels: &[&str]) -> Option<u32> {
    let entries = std::fs::read_dir(gpio_root).ok()?;
    let mut chips: Vec<_> = entries
        .flatten()
        .map(|e| e.path())
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.starts_with("gpiochip"))
                .unwrap_or(false)
        })
        .collect();
    chips.sort();

    for chip in chips {
        let Ok(label) = std::fs::read_to_string(chip.join("label")) else {
            continue;
        };
        let label = label.trim();
        if labels.iter().any(|l| label == *l) {
            let base = std::fs::read_to_string(chip.join("base")).ok()?;
            let base = base.trim().parse().ok()?;
            debug!(chip = %chip.display(), label, base, "Found board GPIO controller");
            return Some(base);
        }
    }
    None
}

/// Build the pin table from the detected board and configured overrides
pub fn resolve(model_path: &Path, gpio_root: &Path, overrides: &BoardOverrides) -> BoardConfig {
    let model = read_model(model_path);
    let preset = model.as_deref().and_then(preset_for);

    let mut board = match (preset, model.as_deref()) {
        (Some(preset), Some(model)) => {
            info!(model, board = preset.name, "Detected board");
            let mut board = preset.to_config();
            if let Some(base) = detect_gpio_base(gpio_root, preset.chip_labels) {
                board.gpio_base = base;
            }
            board
        }
        (_, model) => {
            warn!(model = ?model, "Unknown board, using generic pin table");
            generic()
        }
    };

    if let Some(leds) = overrides.leds {
        board.leds = leds;
    }
    if let Some(button) = overrides.button {
        board.button = Some(button);
    }
    if overrides.disable_button {
        board.button = None;
    }
    if let Some(active_low) = overrides.button_active_low {
        board.button_active_low = active_low;
    }
    if let Some(base) = overrides.gpio_base {
        board.gpio_base = base;
    }

    board
}

impl std::fmt::Display for BoardConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Board: {}", self.name)?;
        writeln!(f, "GPIO base: {}", self.gpio_base)?;
        for category in Category::ALL {
            writeln!(
                f,
                "  {:<8} LED  offset {:>3}  sysfs gpio{}",
                category.label(),
                self.leds[category.index()],
                self.led_line(category)
            )?;
        }
        match (self.button, self.button_line()) {
            (Some(offset), Some(line)) => write!(
                f,
                "  button        offset {:>3}  sysfs gpio{} (active {})",
                offset,
                line,
                if self.button_active_low { "low" } else { "high" }
            ),
            _ => write!(f, "  button        none"),
        }
    }
}
