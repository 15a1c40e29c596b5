// SPDX-License-Identifier: GPL-3.0-only

//! Push-button driver
//!
//! Polls an input line on its own thread and reports a "shutter" event each
//! time the button is released. Edges are only accepted once the line has
//! been stable for the debounce interval.

use super::gpio::InputLine;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Debounced edge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    Pressed,
    Released,
}

/// Turns raw line samples into debounced edges
#[derive(Debug, Clone)]
pub struct Debouncer {
    debounce: Duration,
    stable: bool,
    candidate: bool,
    candidate_since: Instant,
}

impl Debouncer {
    pub fn new(debounce: Duration, initial: bool, now: Instant) -> Self {
        Self {
            debounce,
            stable: initial,
            candidate: initial,
            candidate_since: now,
        }
    }

    /// Feed one sample taken at `now`
    pub fn update(&mut self, sample: bool, now: Instant) -> Option<Edge> {
        if sample != self.candidate {
            self.candidate = sample;
            self.candidate_since = now;
        }

        if self.candidate != self.stable
            && now.duration_since(self.candidate_since) >= self.debounce
        {
            self.stable = self.candidate;
            return Some(if self.stable {
                Edge::Pressed
            } else {
                Edge::Released
            });
        }
        None
    }

    pub fn is_pressed(&self) -> bool {
        self.stable
    }
}

/// Background thread polling a button line
pub struct ButtonDriver {
    thread_handle: Option<JoinHandle<()>>,
    stop_signal: Arc<AtomicBool>,
    line: u32,
}

impl ButtonDriver {
    /// Start polling `input` every `poll`, calling `on_release` for each
    /// debounced release
    pub fn start<F>(
        mut input: Box<dyn InputLine>,
        poll: Duration,
        debounce: Duration,
        on_release: F,
    ) -> std::io::Result<Self>
    where
        F: Fn() + Send + 'static,
    {
        let stop_signal = Arc::new(AtomicBool::new(false));
        let stop_signal_clone = Arc::clone(&stop_signal);
        let line = input.line();

        info!(line, poll_ms = poll.as_millis() as u64, "Starting button driver");

        let thread_handle = thread::Builder::new()
            .name(format!("button-gpio{}", line))
            .spawn(move || {
                let initial = input.is_active().unwrap_or(false);
                let mut debouncer = Debouncer::new(debounce, initial, Instant::now());
                let mut read_failing = false;

                while !stop_signal_clone.load(Ordering::SeqCst) {
                    match input.is_active() {
                        Ok(sample) => {
                            if read_failing {
                                info!(line, "Button line readable again");
                                read_failing = false;
                            }
                            match debouncer.update(sample, Instant::now()) {
                                Some(Edge::Released) => {
                                    debug!(line, "Shutter key released");
                                    on_release();
                                }
                                Some(Edge::Pressed) => debug!(line, "Shutter key pressed"),
                                None => {}
                            }
                        }
                        Err(e) => {
                            if !read_failing {
                                warn!(line, error = %e, "Failed to read button line");
                                read_failing = true;
                            }
                        }
                    }
                    thread::sleep(poll);
                }

                if let Err(e) = input.close() {
                    warn!(line, error = %e, "Failed to release button line");
                }
                debug!(line, "Button driver thread exiting");
            })?;

        Ok(Self {
            thread_handle: Some(thread_handle),
            stop_signal,
            line,
        })
    }

    pub fn is_running(&self) -> bool {
        self.thread_handle
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }

    /// Stop polling and release the line; idempotent
    pub fn stop(&mut self) {
        self.stop_signal.store(true, Ordering::SeqCst);
        if let Some(handle) = self.thread_handle.take() {
            if handle.join().is_err() {
                warn!(line = self.line, "Button driver thread panicked");
            } else {
                info!(line = self.line, "Button driver stopped");
            }
        }
    }
}

impl Drop for ButtonDriver {
    fn drop(&mut self) {
        self.stop();
    }
}
