// SPDX-License-Identifier: GPL-3.0-only

//! Serial background worker
//!
//! One dedicated thread owns a piece of state `S` and runs queued tasks
//! against it, one at a time, in submission order. Everything the capture
//! pipeline does (camera setup, frame delivery, conversion, classification,
//! LED pulses) runs here, so the pipeline state never needs a lock.
//!
//! # Example
//!
//! ```
//! use material_sorter::worker::Worker;
//!
//! let mut worker = Worker::spawn("counter", 0u32).unwrap();
//! let handle = worker.handle();
//! handle.post(|count| *count += 1);
//! assert_eq!(handle.call(|count| *count), Some(1));
//! worker.stop();
//! ```

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, warn};

type Task<S> = Box<dyn FnOnce(&mut S) + Send>;

enum Message<S> {
    Run(Task<S>),
    Stop,
}

/// Cloneable handle used to queue work on a [`Worker`]
pub struct WorkerHandle<S> {
    sender: Sender<Message<S>>,
}

impl<S> Clone for WorkerHandle<S> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

impl<S: 'static> WorkerHandle<S> {
    /// Queue a task
    ///
    /// Returns false if the worker has stopped; the task is dropped.
    pub fn post<F>(&self, task: F) -> bool
    where
        F: FnOnce(&mut S) + Send + 'static,
    {
        self.sender.send(Message::Run(Box::new(task))).is_ok()
    }

    /// Queue a task and block until it has run
    ///
    /// Returns `None` if the worker stopped before running it.
    pub fn call<F, R>(&self, task: F) -> Option<R>
    where
        F: FnOnce(&mut S) -> R + Send + 'static,
        R: Send + 'static,
    {
        let (reply_tx, reply_rx) = mpsc::sync_channel(1);
        let queued = self.post(move |state| {
            let _ = reply_tx.send(task(state));
        });
        if !queued {
            return None;
        }
        reply_rx.recv().ok()
    }

    /// Like [`call`](Self::call) but gives up after `timeout`
    ///
    /// A task that times out stays queued and still runs if the worker ever
    /// gets to it; its result is discarded.
    pub fn call_timeout<F, R>(&self, timeout: Duration, task: F) -> Option<R>
    where
        F: FnOnce(&mut S) -> R + Send + 'static,
        R: Send + 'static,
    {
        let (reply_tx, reply_rx) = mpsc::sync_channel(1);
        let queued = self.post(move |state| {
            let _ = reply_tx.send(task(state));
        });
        if !queued {
            return None;
        }
        match reply_rx.recv_timeout(timeout) {
            Ok(result) => Some(result),
            Err(RecvTimeoutError::Timeout) => {
                warn!(timeout_ms = timeout.as_millis() as u64, "Worker did not answer in time");
                None
            }
            Err(RecvTimeoutError::Disconnected) => None,
        }
    }
}

/// A dedicated thread running tasks against owned state
pub struct Worker<S: 'static> {
    handle: WorkerHandle<S>,
    thread_handle: Option<JoinHandle<()>>,
    name: String,
}

impl<S: Send + 'static> Worker<S> {
    /// Start the worker thread, moving `state` onto it
    pub fn spawn(name: &str, state: S) -> std::io::Result<Self> {
        let (sender, receiver) = mpsc::channel();
        let name_clone = name.to_string();

        info!(name = %name, "Starting worker");

        let thread_handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || run_queue(&name_clone, state, receiver))?;

        Ok(Self {
            handle: WorkerHandle { sender },
            thread_handle: Some(thread_handle),
            name: name.to_string(),
        })
    }
}

impl<S: 'static> Worker<S> {
    pub fn handle(&self) -> WorkerHandle<S> {
        self.handle.clone()
    }

    /// Check if the thread is still running
    pub fn is_running(&self) -> bool {
        self.thread_handle
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }

    /// Stop after the tasks already queued and wait for the thread
    pub fn stop(&mut self) {
        let _ = self.handle.sender.send(Message::Stop);
        if let Some(handle) = self.thread_handle.take() {
            debug!(name = %self.name, "Waiting for worker thread to finish");
            if let Err(e) = handle.join() {
                warn!(name = %self.name, "Worker thread panicked: {:?}", e);
            } else {
                debug!(name = %self.name, "Worker thread finished");
            }
        }
    }

    /// Ask the thread to stop but do not wait for it
    ///
    /// Used when the worker is stuck in a task that never returns.
    pub fn abandon(mut self) {
        let _ = self.handle.sender.send(Message::Stop);
        if self.thread_handle.take().is_some() {
            warn!(name = %self.name, "Detaching unresponsive worker thread");
        }
    }
}

impl<S: 'static> Drop for Worker<S> {
    fn drop(&mut self) {
        if self.thread_handle.is_some() {
            debug!(name = %self.name, "Worker dropped, stopping");
            self.stop();
        }
    }
}

fn run_queue<S>(name: &str, mut state: S, receiver: Receiver<Message<S>>) {
    debug!(name, "Worker thread started");

    while let Ok(message) = receiver.recv() {
        match message {
            Message::Run(task) => {
                if catch_unwind(AssertUnwindSafe(|| task(&mut state))).is_err() {
                    error!(name, "Worker task panicked");
                }
            }
            Message::Stop => {
                debug!(name, "Stop requested");
                break;
            }
        }
    }

    info!(name, "Worker thread exiting");
}
