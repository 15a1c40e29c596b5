// SPDX-License-Identifier: GPL-3.0-only

//! Category indicator LEDs
//!
//! Three output lines, one per material. A classification result lights the
//! matching LED for a fixed hold time. Write failures are logged and
//! swallowed; the indicator never fails the capture cycle.

use crate::backends::gpio::OutputLine;
use crate::constants::labels;
use crate::errors::{AppError, GpioError};
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Material categories, in LED order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Paper,
    Metal,
    Plastic,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::Paper, Category::Metal, Category::Plastic];

    /// Exact, case-sensitive lookup
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            labels::PAPER => Some(Self::Paper),
            labels::METAL => Some(Self::Metal),
            labels::PLASTIC => Some(Self::Plastic),
            _ => None,
        }
    }

    /// LED index
    pub fn index(self) -> usize {
        match self {
            Self::Paper => 0,
            Self::Metal => 1,
            Self::Plastic => 2,
        }
    }

    pub fn label(self) -> &'static str {
        labels::ALL[self.index()]
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// The three indicator lines
pub struct LedSet {
    lines: [Box<dyn OutputLine>; 3],
}

impl LedSet {
    pub fn new(
        paper: Box<dyn OutputLine>,
        metal: Box<dyn OutputLine>,
        plastic: Box<dyn OutputLine>,
    ) -> Self {
        Self {
            lines: [paper, metal, plastic],
        }
    }

    fn line_mut(&mut self, category: Category) -> &mut dyn OutputLine {
        self.lines[category.index()].as_mut()
    }
}

/// Lights the LED for a classification label
pub struct PeripheralIndicator {
    leds: Option<LedSet>,
    hold: Duration,
}

impl PeripheralIndicator {
    pub fn new(leds: LedSet, hold: Duration) -> Self {
        Self {
            leds: Some(leds),
            hold,
        }
    }

    /// Indicator without LEDs; every call is a logged no-op
    pub fn disconnected(hold: Duration) -> Self {
        Self { leds: None, hold }
    }

    pub fn is_connected(&self) -> bool {
        self.leds.is_some()
    }

    pub fn hold(&self) -> Duration {
        self.hold
    }

    /// Pulse the LED mapped to `label`
    ///
    /// Blocks for the hold time. Unknown or empty labels do nothing.
    /// Returns the category that was pulsed.
    pub fn indicate(&mut self, label: &str) -> Option<Category> {
        let Some(category) = Category::from_label(label) else {
            debug!(label, "No indicator for label");
            return None;
        };

        let hold = self.hold;
        let Some(leds) = self.leds.as_mut() else {
            debug!(%category, "Indicator LEDs not available, skipping pulse");
            return None;
        };

        let line = leds.line_mut(category);
        debug!(%category, line = line.line(), hold_ms = hold.as_millis() as u64, "Pulsing LED");

        if let Err(e) = pulse(line, hold) {
            warn!(%category, error = %AppError::from(e), "LED pulse failed");
        }
        Some(category)
    }

    /// Close every line; idempotent
    pub fn close(&mut self) {
        let Some(mut leds) = self.leds.take() else {
            return;
        };
        for line in leds.lines.iter_mut() {
            let number = line.line();
            match line.close() {
                Ok(()) => debug!(line = number, "LED line closed"),
                Err(e) => warn!(line = number, error = %e, "Failed to close LED line"),
            }
        }
        info!("Indicator LEDs released");
    }
}

impl Drop for PeripheralIndicator {
    fn drop(&mut self) {
        self.close();
    }
}

/// Drive active, hold, drive inactive
///
/// The inactive write is attempted even when activation failed.
fn pulse(line: &mut dyn OutputLine, hold: Duration) -> Result<(), GpioError> {
    let activated = line.set_active(true);
    if activated.is_ok() {
        thread::sleep(hold);
    }
    let deactivated = line.set_active(false);
    activated.and(deactivated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Instant;

    type WriteLog = Arc<Mutex<Vec<(u32, bool)>>>;

    struct RecordingLine {
        line: u32,
        log: WriteLog,
        fail_activation: bool,
        closes: Arc<AtomicUsize>,
    }

    impl OutputLine for RecordingLine {
        fn line(&self) -> u32 {
            self.line
        }

        fn set_active(&mut self, active: bool) -> Result<(), GpioError> {
            self.log.lock().unwrap().push((self.line, active));
            if active && self.fail_activation {
                return Err(GpioError::Io {
                    line: self.line,
                    reason: "EIO".to_string(),
                });
            }
            Ok(())
        }

        fn close(&mut self) -> Result<(), GpioError> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn indicator(
        hold: Duration,
        failing: Option<u32>,
    ) -> (PeripheralIndicator, WriteLog, Arc<AtomicUsize>) {
        let log: WriteLog = Arc::new(Mutex::new(Vec::new()));
        let closes = Arc::new(AtomicUsize::new(0));
        let line = |n: u32| -> Box<dyn OutputLine> {
            Box::new(RecordingLine {
                line: n,
                log: Arc::clone(&log),
                fail_activation: failing == Some(n),
                closes: Arc::clone(&closes),
            })
        };
        let leds = LedSet::new(line(0), line(1), line(2));
        (PeripheralIndicator::new(leds, hold), log, closes)
    }

    #[test]
    fn test_label_table_is_exact() {
        assert_eq!(Category::from_label("paper"), Some(Category::Paper));
        assert_eq!(Category::from_label("metal").map(Category::index), Some(1));
        assert_eq!(Category::from_label("plastic").map(Category::index), Some(2));
        assert_eq!(Category::from_label("Metal"), None);
        assert_eq!(Category::from_label(""), None);
        for category in Category::ALL {
            assert_eq!(Category::from_label(category.label()), Some(category));
        }
    }

    #[test]
    fn test_metal_pulses_only_line_one() {
        let hold = Duration::from_millis(50);
        let (mut indicator, log, _) = indicator(hold, None);

        let start = Instant::now();
        assert_eq!(indicator.indicate("metal"), Some(Category::Metal));
        assert!(start.elapsed() >= hold, "pulse held for the full duration");

        assert_eq!(*log.lock().unwrap(), vec![(1, true), (1, false)]);
    }

    #[test]
    fn test_unmapped_labels_touch_nothing() {
        let (mut indicator, log, _) = indicator(Duration::from_millis(1), None);
        assert_eq!(indicator.indicate(""), None);
        assert_eq!(indicator.indicate("glass"), None);
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn test_failed_activation_still_drives_inactive() {
        let (mut indicator, log, _) = indicator(Duration::from_millis(1), Some(2));
        assert_eq!(indicator.indicate("plastic"), Some(Category::Plastic));
        assert_eq!(*log.lock().unwrap(), vec![(2, true), (2, false)]);
    }

    #[test]
    fn test_close_releases_each_line_once() {
        let (mut indicator, log, closes) = indicator(Duration::from_millis(1), None);
        indicator.close();
        indicator.close();
        drop(indicator);
        assert_eq!(closes.load(Ordering::SeqCst), 3);
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn test_disconnected_indicator_is_noop() {
        let mut indicator = PeripheralIndicator::disconnected(Duration::from_secs(1));
        let start = Instant::now();
        assert_eq!(indicator.indicate("paper"), None);
        assert!(start.elapsed() < Duration::from_millis(500));
        assert!(!indicator.is_connected());
    }
}
