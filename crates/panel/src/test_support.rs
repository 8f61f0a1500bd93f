//! In-memory frame source and polling helpers for tests.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use vs_common::{DecodeError, FrameSource, OpenError, RgbFrame, VideoMetadata};

use crate::panel::{PanelEvent, VideoPanel};
use crate::worker::{FrameLoadWorker, LoadResult};

pub const WIDTH: u32 = 4;
pub const HEIGHT: u32 = 2;

/// Deterministic source: frame `i` is filled with [`ScriptedSource::fill_for`]`(i)`.
pub struct ScriptedSource {
    metadata: VideoMetadata,
    delay: Duration,
    fail_on: HashSet<u32>,
    started: Arc<AtomicUsize>,
    finished: Arc<AtomicUsize>,
    closed: bool,
}

impl ScriptedSource {
    pub fn new(path: impl AsRef<Path>, frame_count: u32) -> Self {
        Self {
            metadata: VideoMetadata {
                path: path.as_ref().to_path_buf(),
                frame_count,
                fps: 25.0,
                width: WIDTH,
                height: HEIGHT,
                codec: "scripted".into(),
            },
            delay: Duration::ZERO,
            fail_on: HashSet::new(),
            started: Arc::new(AtomicUsize::new(0)),
            finished: Arc::new(AtomicUsize::new(0)),
            closed: false,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn failing_on(mut self, index: u32) -> Self {
        self.fail_on.insert(index);
        self
    }

    /// Counts decodes that have begun.
    pub fn started_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.started)
    }

    /// Counts decodes that have returned, successfully or not.
    pub fn finished_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.finished)
    }

    pub fn fill_for(index: u32) -> u8 {
        (index % 251) as u8
    }
}

impl FrameSource for ScriptedSource {
    fn metadata(&self) -> &VideoMetadata {
        &self.metadata
    }

    fn decode_frame(&mut self, index: u32) -> Result<RgbFrame, DecodeError> {
        if self.closed {
            return Err(DecodeError::Closed);
        }
        if index >= self.metadata.frame_count {
            return Err(DecodeError::OutOfRange {
                index,
                frame_count: self.metadata.frame_count,
            });
        }

        self.started.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            thread::sleep(self.delay);
        }

        let result = if self.fail_on.contains(&index) {
            Err(DecodeError::Backend {
                index,
                reason: "scripted failure".into(),
            })
        } else {
            let len = RgbFrame::expected_len(WIDTH, HEIGHT);
            RgbFrame::new(WIDTH, HEIGHT, vec![Self::fill_for(index); len]).ok_or(
                DecodeError::Backend {
                    index,
                    reason: "bad buffer".into(),
                },
            )
        };

        self.finished.fetch_add(1, Ordering::SeqCst);
        result
    }

    fn close(&mut self) {
        self.closed = true;
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}

/// Opener that accepts every path except ones containing "corrupt" and
/// gives each video `frames_for(path)` frames.
pub fn scripted_opener(
    frames_for: impl Fn(&Path) -> u32 + 'static,
) -> impl Fn(&Path) -> Result<Box<dyn FrameSource>, OpenError> + 'static {
    move |path: &Path| {
        if path.to_string_lossy().contains("corrupt") {
            return Err(OpenError::Backend {
                path: PathBuf::from(path),
                reason: "Invalid data found when processing input".into(),
            });
        }
        Ok(Box::new(ScriptedSource::new(path, frames_for(path))) as Box<dyn FrameSource>)
    }
}

pub fn poll_worker(worker: &mut FrameLoadWorker, timeout: Duration) -> Option<LoadResult> {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if let Some(result) = worker.poll() {
            return Some(result);
        }
        thread::sleep(Duration::from_millis(1));
    }
    None
}

pub fn poll_panel(panel: &mut VideoPanel, timeout: Duration) -> Option<PanelEvent> {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if let Some(event) = panel.poll() {
            return Some(event);
        }
        thread::sleep(Duration::from_millis(1));
    }
    None
}

pub fn wait_for_count(counter: &AtomicUsize, at_least: usize, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if counter.load(Ordering::SeqCst) >= at_least {
            return true;
        }
        thread::sleep(Duration::from_millis(1));
    }
    false
}
