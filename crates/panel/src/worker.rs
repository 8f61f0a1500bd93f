//! Cancellable single-frame background loader.
//!
//! Each [`FrameLoadWorker`] owns one named thread that locks the panel's
//! source, decodes one frame and sends the result over a one-shot channel.
//! The interface thread picks the result up with [`FrameLoadWorker::poll`],
//! so delivery always happens after `start` has returned.
//!
//! Cancellation is cooperative: [`FrameLoadWorker::stop`] clears the liveness
//! flag and joins the thread. The thread checks the flag before and after
//! decoding, and `stop` drops the receiving end, so a stopped worker never
//! delivers.

use crossbeam::channel::{self, Receiver, TryRecvError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use tracing::{debug, trace, warn};

use vs_common::{DecodeError, RgbFrame, SharedSource};

/// Outcome of one background decode.
pub type LoadResult = Result<RgbFrame, DecodeError>;

/// Hook run on the loader thread after a result has been sent, used to wake
/// the interface thread (e.g. `egui::Context::request_repaint`).
pub type Notify = Arc<dyn Fn() + Send + Sync>;

/// Lifecycle of a loader. A worker is `Running` from the moment it is
/// started and ends in exactly one of the other states.
///
/// These states describe the loader, not the panel: whether a delivered
/// frame is actually shown is decided by the panel and reported as a
/// [`PanelEvent`](crate::PanelEvent).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkerState {
    Running,
    /// A decoded frame was handed over by [`FrameLoadWorker::poll`]. The
    /// panel may still drop it as stale.
    Delivered,
    /// Stopped before a result was handed over.
    Cancelled,
    /// The decode failed and the error was handed over.
    Failed,
}

/// Background decode of one frame index.
pub struct FrameLoadWorker {
    index: u32,
    state: WorkerState,
    alive: Arc<AtomicBool>,
    result_rx: Option<Receiver<LoadResult>>,
    handle: Option<thread::JoinHandle<()>>,
}

impl FrameLoadWorker {
    /// Spawn a loader thread decoding `index` from `source`.
    pub fn start(
        source: SharedSource,
        index: u32,
        notify: Option<Notify>,
    ) -> std::io::Result<Self> {
        let (result_tx, result_rx) = channel::bounded::<LoadResult>(1);
        let alive = Arc::new(AtomicBool::new(true));
        let thread_alive = Arc::clone(&alive);

        let handle = thread::Builder::new()
            .name(format!("frame-loader-{index}"))
            .spawn(move || {
                if !thread_alive.load(Ordering::Acquire) {
                    return;
                }

                let result = source.lock().decode_frame(index);

                if !thread_alive.load(Ordering::Acquire) {
                    trace!("Frame loader {}: cancelled during decode", index);
                    return;
                }

                if result_tx.send(result).is_ok() {
                    if let Some(notify) = notify {
                        notify();
                    }
                }
            })?;

        debug!("Frame loader started for frame {}", index);

        Ok(Self {
            index,
            state: WorkerState::Running,
            alive,
            result_rx: Some(result_rx),
            handle: Some(handle),
        })
    }

    /// Frame index this worker decodes.
    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == WorkerState::Running
    }

    /// Take the result if the loader has finished. Never blocks on the decode.
    ///
    /// Yields at most one result over the worker's lifetime and nothing once
    /// the worker has been stopped.
    pub fn poll(&mut self) -> Option<LoadResult> {
        if self.state != WorkerState::Running {
            return None;
        }

        let received = match self.result_rx.as_ref()?.try_recv() {
            Ok(result) => result,
            Err(TryRecvError::Empty) => return None,
            Err(TryRecvError::Disconnected) => Err(DecodeError::Backend {
                index: self.index,
                reason: "loader thread exited without a result".into(),
            }),
        };

        self.state = match received {
            Ok(_) => WorkerState::Delivered,
            Err(_) => WorkerState::Failed,
        };
        self.result_rx = None;
        self.join();

        Some(received)
    }

    /// Cancel the loader and wait for its thread to exit.
    ///
    /// Blocks for as long as an in-flight decode takes. Idempotent.
    pub fn stop(&mut self) {
        self.alive.store(false, Ordering::Release);
        self.join();
        self.result_rx = None;

        if self.state == WorkerState::Running {
            self.state = WorkerState::Cancelled;
            debug!("Frame loader for frame {} cancelled", self.index);
        }
    }

    fn join(&mut self) {
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("Frame loader for frame {} panicked", self.index);
            }
        }
    }
}

impl Drop for FrameLoadWorker {
    fn drop(&mut self) {
        self.stop();
    }
}
