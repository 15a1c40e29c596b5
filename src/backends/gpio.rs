// SPDX-License-Identifier: GPL-3.0-only

//! GPIO lines via the Linux sysfs interface
//!
//! Lines under `/sys/class/gpio` are exported on open and unexported on
//! close. The root directory is configurable so tests can point it at a
//! scratch tree.

use crate::errors::GpioError;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Attempts to wait for the kernel to create `gpioN` after export
const EXPORT_RETRIES: u32 = 20;
const EXPORT_RETRY_DELAY: Duration = Duration::from_millis(10);

/// A digital output
pub trait OutputLine: Send {
    /// Line number (for logs)
    fn line(&self) -> u32;

    /// Drive the line active or inactive
    fn set_active(&mut self, active: bool) -> Result<(), GpioError>;

    /// Release the line; calling it again is a no-op
    fn close(&mut self) -> Result<(), GpioError>;
}

/// A digital input
pub trait InputLine: Send {
    fn line(&self) -> u32;

    /// Read the logical state of the line
    fn is_active(&mut self) -> Result<bool, GpioError>;

    fn close(&mut self) -> Result<(), GpioError>;
}

/// Entry point for opening sysfs GPIO lines
#[derive(Debug, Clone)]
pub struct SysfsGpio {
    root: PathBuf,
}

impl SysfsGpio {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Export `line` as an output that starts inactive
    pub fn open_output(&self, line: u32, active_low: bool) -> Result<SysfsOutput, GpioError> {
        let polarity = if active_low { "1" } else { "0" };
        // "low" sets direction and initial level in one write, no glitch
        let pin = SysfsPin::export(&self.root, line)?
            .configure(&[("active_low", polarity), ("direction", "low")])?;
        info!(line, active_low, "GPIO output opened");
        Ok(SysfsOutput {
            line,
            pin: Some(pin),
        })
    }

    /// Export `line` as an input
    pub fn open_input(&self, line: u32, active_low: bool) -> Result<SysfsInput, GpioError> {
        let polarity = if active_low { "1" } else { "0" };
        let pin = SysfsPin::export(&self.root, line)?
            .configure(&[("direction", "in"), ("active_low", polarity)])?;
        info!(line, active_low, "GPIO input opened");
        Ok(SysfsInput {
            line,
            pin: Some(pin),
        })
    }
}

#[derive(Debug)]
struct SysfsPin {
    root: PathBuf,
    line: u32,
    dir: PathBuf,
    /// False if the line was already exported by someone else
    exported_here: bool,
}

impl SysfsPin {
    fn export(root: &Path, line: u32) -> Result<Self, GpioError> {
        let dir = root.join(format!("gpio{}", line));
        let mut exported_here = false;

        if !dir.exists() {
            std::fs::write(root.join("export"), line.to_string()).map_err(|e| GpioError::Open {
                line,
                reason: format!("export failed: {}", e),
            })?;
            exported_here = true;

            let mut attempts = 0;
            while !dir.join("value").exists() {
                attempts += 1;
                if attempts > EXPORT_RETRIES {
                    return Err(GpioError::Open {
                        line,
                        reason: format!("{} did not appear after export", dir.display()),
                    });
                }
                std::thread::sleep(EXPORT_RETRY_DELAY);
            }
        } else {
            debug!(line, "GPIO already exported");
        }

        Ok(Self {
            root: root.to_path_buf(),
            line,
            dir,
            exported_here,
        })
    }

    /// Write setup attributes in order; a line exported here is unexported
    /// again if any write fails
    fn configure(self, attrs: &[(&str, &str)]) -> Result<Self, GpioError> {
        for (attr, value) in attrs {
            if let Err(reason) = self.write_attr(attr, value) {
                let line = self.line;
                if let Err(e) = self.unexport() {
                    warn!(line, error = %e, "Failed to unexport after setup error");
                }
                return Err(GpioError::Open { line, reason });
            }
        }
        Ok(self)
    }

    fn write_attr(&self, attr: &str, value: &str) -> Result<(), String> {
        std::fs::write(self.dir.join(attr), value)
            .map_err(|e| format!("writing {} failed: {}", attr, e))
    }

    fn read_value(&self) -> Result<bool, GpioError> {
        let raw = std::fs::read_to_string(self.dir.join("value")).map_err(|e| GpioError::Io {
            line: self.line,
            reason: e.to_string(),
        })?;
        match raw.trim() {
            "0" => Ok(false),
            "1" => Ok(true),
            other => Err(GpioError::Io {
                line: self.line,
                reason: format!("unexpected value {:?}", other),
            }),
        }
    }

    fn write_value(&self, active: bool) -> Result<(), GpioError> {
        self.write_attr("value", if active { "1" } else { "0" })
            .map_err(|reason| GpioError::Io {
                line: self.line,
                reason,
            })
    }

    fn unexport(self) -> Result<(), GpioError> {
        if !self.exported_here {
            return Ok(());
        }
        std::fs::write(self.root.join("unexport"), self.line.to_string()).map_err(|e| {
            GpioError::Io {
                line: self.line,
                reason: format!("unexport failed: {}", e),
            }
        })
    }
}

/// Output line backed by sysfs
#[derive(Debug)]
pub struct SysfsOutput {
    line: u32,
    pin: Option<SysfsPin>,
}

impl OutputLine for SysfsOutput {
    fn line(&self) -> u32 {
        self.line
    }

    fn set_active(&mut self, active: bool) -> Result<(), GpioError> {
        match self.pin.as_ref() {
            Some(pin) => pin.write_value(active),
            None => Err(GpioError::Closed { line: self.line }),
        }
    }

    fn close(&mut self) -> Result<(), GpioError> {
        let Some(pin) = self.pin.take() else {
            return Ok(());
        };
        let line = pin.line;
        if let Err(e) = pin.write_value(false) {
            warn!(line, error = %e, "Failed to drive output inactive before release");
        }
        pin.unexport()?;
        debug!(line, "GPIO output released");
        Ok(())
    }
}

impl Drop for SysfsOutput {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!(error = %e, "Failed to release GPIO output");
        }
    }
}

/// Input line backed by sysfs
#[derive(Debug)]
pub struct SysfsInput {
    line: u32,
    pin: Option<SysfsPin>,
}

impl InputLine for SysfsInput {
    fn line(&self) -> u32 {
        self.line
    }

    fn is_active(&mut self) -> Result<bool, GpioError> {
        match self.pin.as_ref() {
            Some(pin) => pin.read_value(),
            None => Err(GpioError::Closed { line: self.line }),
        }
    }

    fn close(&mut self) -> Result<(), GpioError> {
        match self.pin.take() {
            Some(pin) => pin.unexport(),
            None => Ok(()),
        }
    }
}

impl Drop for SysfsInput {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!(error = %e, "Failed to release GPIO input");
        }
    }
}
