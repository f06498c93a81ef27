// SPDX-License-Identifier: GPL-3.0-only
//! Thread lifecycle for the acquisition loop
//!
//! The loop owns its state (typically the open frame source) for as long as the
//! thread runs and hands it back on join, so the caller can release the device
//! only after the thread has exited.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use tracing::{debug, info, warn};

/// Action returned by the loop callback to control loop behavior
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopAction {
    /// Continue running the loop
    Continue,
    /// Stop the loop gracefully
    Stop,
}

/// Controller for a capture loop running in a separate thread
///
/// The stop signal is checked before every iteration, never during one: a
/// callback blocked on the device keeps blocking until the device returns or is
/// released by other means.
///
/// # Example
///
/// ```ignore
/// let mut controller = CaptureLoopController::start("acquisition", source, |source| {
///     match source.capture_next() {
///         Ok(frames) => {
///             publish(frames);
///             LoopAction::Continue
///         }
///         Err(_) => LoopAction::Stop,
///     }
/// });
///
/// // Later: stop, join and get the source back
/// let source = controller.stop();
/// ```
pub struct CaptureLoopController<S: Send + 'static> {
    /// Thread handle for joining; yields the loop state
    thread_handle: Option<JoinHandle<S>>,
    /// Signal to stop the loop
    stop_signal: Arc<AtomicBool>,
    /// Name for logging
    name: String,
}

impl<S: Send + 'static> CaptureLoopController<S> {
    /// Start a new capture loop in a separate thread
    ///
    /// `loop_fn` is called with the loop state until it returns
    /// [`LoopAction::Stop`] or the stop signal is raised.
    pub fn start<F>(name: &str, state: S, mut loop_fn: F) -> Self
    where
        F: FnMut(&mut S) -> LoopAction + Send + 'static,
    {
        let stop_signal = Arc::new(AtomicBool::new(false));
        let stop_signal_clone = Arc::clone(&stop_signal);
        let name_clone = name.to_string();

        info!(name = %name, "Starting capture loop");

        let thread_handle = thread::spawn(move || {
            debug!(name = %name_clone, "Capture loop thread started");
            let mut state = state;

            loop {
                if stop_signal_clone.load(Ordering::SeqCst) {
                    debug!(name = %name_clone, "Stop signal received");
                    break;
                }

                match loop_fn(&mut state) {
                    LoopAction::Continue => {}
                    LoopAction::Stop => {
                        debug!(name = %name_clone, "Loop requested stop");
                        break;
                    }
                }
            }

            info!(name = %name_clone, "Capture loop thread exiting");
            state
        });

        Self {
            thread_handle: Some(thread_handle),
            stop_signal,
            name: name.to_string(),
        }
    }

    /// Check if the loop thread is still running
    pub fn is_running(&self) -> bool {
        self.thread_handle
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }

    /// Signal the loop to stop (non-blocking)
    pub fn request_stop(&self) {
        debug!(name = %self.name, "Requesting capture loop stop");
        self.stop_signal.store(true, Ordering::SeqCst);
    }

    /// Stop the loop, wait for the thread and return its state
    pub fn stop(&mut self) -> Option<S> {
        self.request_stop();
        self.join()
    }

    /// Wait for the thread to finish without sending the stop signal
    ///
    /// Returns `None` if the thread was already joined or panicked.
    pub fn join(&mut self) -> Option<S> {
        let handle = self.thread_handle.take()?;
        debug!(name = %self.name, "Waiting for capture loop thread to finish");
        match handle.join() {
            Ok(state) => {
                debug!(name = %self.name, "Capture loop thread finished");
                Some(state)
            }
            Err(e) => {
                warn!(name = %self.name, "Capture loop thread panicked: {:?}", e);
                None
            }
        }
    }
}

impl<S: Send + 'static> Drop for CaptureLoopController<S> {
    fn drop(&mut self) {
        if self.thread_handle.is_some() {
            debug!(name = %self.name, "CaptureLoopController dropped, stopping loop");
            self.stop();
        }
    }
}
