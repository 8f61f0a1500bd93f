//! One video's viewing unit: source, frame cache, navigation state and the
//! background loader for cache misses.

use std::sync::Arc;
use tracing::{debug, info, warn};

use vs_common::{share, DecodeError, FrameSource, OpenError, RgbFrame, SharedSource, VideoMetadata};

use crate::cache::FrameCache;
use crate::worker::{FrameLoadWorker, Notify};

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// The frame currently shown by a panel.
#[derive(Clone, Debug)]
pub struct DisplayedFrame {
    pub index: u32,
    pub frame: Arc<RgbFrame>,
    /// Bumped on every render, including redisplays of the same index, so a
    /// view can tell when to re-upload its texture.
    pub revision: u64,
}

/// How a `jump_to_frame` request was served.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JumpOutcome {
    /// Rendered synchronously from the cache.
    CacheHit,
    /// A background load is in flight; the frame arrives through `poll`.
    Loading,
}

/// Result of draining a panel's loader on the interface thread.
#[derive(Clone, Debug, PartialEq)]
pub enum PanelEvent {
    /// A loaded frame was cached and rendered.
    FrameShown { index: u32 },
    /// A loaded frame no longer matched the current frame and was dropped.
    Discarded { index: u32 },
    /// The background decode failed. Panel state is unchanged.
    DecodeFailed { index: u32, error: DecodeError },
}

#[derive(Debug, thiserror::Error)]
pub enum PanelError {
    #[error("frame {index} out of range (video has {total} frames)")]
    OutOfRange { index: u32, total: u32 },

    #[error("panel has been cleaned up")]
    Closed,

    #[error("failed to spawn frame loader: {0}")]
    Spawn(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// VideoPanel
// ---------------------------------------------------------------------------

pub struct VideoPanel {
    metadata: VideoMetadata,
    source: SharedSource,
    cache: FrameCache,
    /// Always within `[0, total_frames)`.
    current_frame: u32,
    worker: Option<FrameLoadWorker>,
    displayed: Option<DisplayedFrame>,
    revision: u64,
    last_error: Option<DecodeError>,
    notify: Option<Notify>,
    closed: bool,
}

impl VideoPanel {
    /// Build a panel around an opened source. Fails for a video without
    /// frames, since no current frame could satisfy the range invariant.
    pub fn new(source: Box<dyn FrameSource>, cache: FrameCache) -> Result<Self, OpenError> {
        let metadata = source.metadata().clone();
        if metadata.frame_count == 0 {
            return Err(OpenError::Empty(metadata.path));
        }

        Ok(Self {
            metadata,
            source: share(source),
            cache,
            current_frame: 0,
            worker: None,
            displayed: None,
            revision: 0,
            last_error: None,
            notify: None,
            closed: false,
        })
    }

    /// Install a hook that background loaders run after sending a result.
    pub fn with_notify(mut self, notify: Notify) -> Self {
        self.notify = Some(notify);
        self
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn metadata(&self) -> &VideoMetadata {
        &self.metadata
    }

    pub fn total_frames(&self) -> u32 {
        self.metadata.frame_count
    }

    pub fn current_frame(&self) -> u32 {
        self.current_frame
    }

    pub fn displayed(&self) -> Option<&DisplayedFrame> {
        self.displayed.as_ref()
    }

    pub fn cache(&self) -> &FrameCache {
        &self.cache
    }

    /// Whether a background load is in flight.
    pub fn is_loading(&self) -> bool {
        self.worker.as_ref().is_some_and(|w| w.is_running())
    }

    /// The most recent background decode failure, cleared by the next
    /// successful render.
    pub fn last_error(&self) -> Option<&DecodeError> {
        self.last_error.as_ref()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Position of the current frame as a whole percentage of the video.
    pub fn progress_percent(&self) -> u8 {
        (u64::from(self.current_frame) * 100 / u64::from(self.metadata.frame_count)) as u8
    }

    /// Multi-line description shown above the frame.
    pub fn info_text(&self) -> String {
        let m = &self.metadata;
        let stats = self.cache.stats();
        let cache = match stats.utilization() {
            Some(used) => format!(
                "{} frames, {} MB ({:.0}% of budget)",
                stats.frame_count,
                stats.used_mb(),
                used * 100.0
            ),
            None => format!("{} frames, {} MB", stats.frame_count, stats.used_mb()),
        };
        format!(
            "File: {}\nSize: {}x{}\nFPS: {:.2}\nFrames: {}\nDuration: {:.2} s\nCache: {}",
            m.file_name(),
            m.width,
            m.height,
            m.fps,
            m.frame_count,
            m.duration_secs(),
            cache,
        )
    }

    // -----------------------------------------------------------------------
    // Navigation
    // -----------------------------------------------------------------------

    /// Make `index` the current frame and show it.
    ///
    /// A cached frame is rendered immediately. Otherwise any previous loader
    /// is stopped (blocking until its thread exits) and a new one started;
    /// the frame is rendered by a later [`poll`](Self::poll). Jumping to the
    /// current frame is allowed and redisplays it.
    pub fn jump_to_frame(&mut self, index: u32) -> Result<JumpOutcome, PanelError> {
        if self.closed {
            return Err(PanelError::Closed);
        }
        let total = self.total_frames();
        if index >= total {
            return Err(PanelError::OutOfRange { index, total });
        }

        self.current_frame = index;

        if let Some(frame) = self.cache.get(index) {
            debug!("{}: frame {} served from cache", self.metadata.file_name(), index);
            self.render(index, frame);
            return Ok(JumpOutcome::CacheHit);
        }

        // Same frame already loading: let it finish
        if let Some(worker) = &self.worker {
            if worker.is_running() && worker.index() == index {
                return Ok(JumpOutcome::Loading);
            }
        }

        if let Some(mut previous) = self.worker.take() {
            previous.stop();
        }

        let worker = FrameLoadWorker::start(Arc::clone(&self.source), index, self.notify.clone())?;
        self.worker = Some(worker);

        Ok(JumpOutcome::Loading)
    }

    /// Jump back to the first frame.
    pub fn reset_to_start(&mut self) -> Result<JumpOutcome, PanelError> {
        self.jump_to_frame(0)
    }

    /// Apply a finished background load, if there is one. Call on the
    /// interface thread.
    ///
    /// A loaded frame is cached and rendered, and a failure recorded, only
    /// when it is still the current frame; anything else is dropped.
    pub fn poll(&mut self) -> Option<PanelEvent> {
        let worker = self.worker.as_mut()?;
        let result = worker.poll()?;
        let index = worker.index();
        self.worker = None;

        match result {
            Ok(frame) if index == self.current_frame => {
                let frame = Arc::new(frame);
                self.cache.put(index, Arc::clone(&frame));
                self.render(index, frame);
                Some(PanelEvent::FrameShown { index })
            }
            Ok(_) => {
                debug!(
                    "{}: dropped stale frame {} (current is {})",
                    self.metadata.file_name(),
                    index,
                    self.current_frame
                );
                Some(PanelEvent::Discarded { index })
            }
            Err(error) if index != self.current_frame => {
                debug!(
                    "{}: ignored failure for abandoned frame {}: {}",
                    self.metadata.file_name(),
                    index,
                    error
                );
                Some(PanelEvent::Discarded { index })
            }
            Err(error) => {
                warn!(
                    "{}: failed to decode frame {}: {}",
                    self.metadata.file_name(),
                    index,
                    error
                );
                self.last_error = Some(error.clone());
                Some(PanelEvent::DecodeFailed { index, error })
            }
        }
    }

    fn render(&mut self, index: u32, frame: Arc<RgbFrame>) {
        self.revision += 1;
        self.last_error = None;
        self.displayed = Some(DisplayedFrame {
            index,
            frame,
            revision: self.revision,
        });
    }

    // -----------------------------------------------------------------------
    // Teardown
    // -----------------------------------------------------------------------

    /// Stop the loader (blocking), drop cached frames and close the source.
    /// Idempotent; also run on drop.
    pub fn cleanup(&mut self) {
        if self.closed {
            return;
        }

        if let Some(mut worker) = self.worker.take() {
            worker.stop();
        }
        self.cache.clear();
        self.displayed = None;
        self.source.lock().close();
        self.closed = true;

        info!("Closed panel for {}", self.metadata.file_name());
    }
}

impl Drop for VideoPanel {
    fn drop(&mut self) {
        self.cleanup();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{poll_panel, wait_for_count, ScriptedSource, HEIGHT, WIDTH};
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    const TIMEOUT: Duration = Duration::from_secs(2);

    fn panel(frames: u32) -> VideoPanel {
        VideoPanel::new(
            Box::new(ScriptedSource::new("clip.mp4", frames)),
            FrameCache::unbounded(),
        )
        .unwrap()
    }

    #[test]
    fn empty_video_is_rejected() {
        let result = VideoPanel::new(
            Box::new(ScriptedSource::new("empty.mp4", 0)),
            FrameCache::unbounded(),
        );
        assert!(matches!(result, Err(OpenError::Empty(_))));
    }

    #[test]
    fn every_frame_loads_with_full_rgb_size() {
        let mut panel = panel(6);
        for i in 0..6 {
            assert_eq!(panel.jump_to_frame(i).unwrap(), JumpOutcome::Loading);
            assert_eq!(poll_panel(&mut panel, TIMEOUT), Some(PanelEvent::FrameShown { index: i }));

            let cached = panel.cache.get(i).expect("frame cached after delivery");
            assert_eq!(cached.data.len(), (WIDTH * HEIGHT * 3) as usize);
            assert_eq!(panel.displayed().unwrap().index, i);
        }
        assert_eq!(panel.cache().len(), 6);
    }

    #[test]
    fn second_jump_hits_cache_without_decoding() {
        let scripted = ScriptedSource::new("clip.mp4", 10);
        let decodes = scripted.finished_counter();
        let mut panel = VideoPanel::new(Box::new(scripted), FrameCache::unbounded()).unwrap();

        panel.jump_to_frame(5).unwrap();
        poll_panel(&mut panel, TIMEOUT).expect("first load");
        let first_revision = panel.displayed().unwrap().revision;

        assert_eq!(panel.jump_to_frame(5).unwrap(), JumpOutcome::CacheHit);
        assert_eq!(decodes.load(Ordering::SeqCst), 1);
        assert!(!panel.is_loading());
        // Redisplay still counts as a render
        assert!(panel.displayed().unwrap().revision > first_revision);
    }

    #[test]
    fn superseded_load_is_never_applied() {
        let scripted = ScriptedSource::new("clip.mp4", 10).with_delay(Duration::from_millis(40));
        let started = scripted.started_counter();
        let mut panel = VideoPanel::new(Box::new(scripted), FrameCache::unbounded()).unwrap();

        panel.jump_to_frame(2).unwrap();
        assert!(wait_for_count(&started, 1, TIMEOUT));
        // Stops the loader for 2 (waiting for it) and starts one for 7
        panel.jump_to_frame(7).unwrap();

        assert_eq!(poll_panel(&mut panel, TIMEOUT), Some(PanelEvent::FrameShown { index: 7 }));
        let shown = panel.displayed().unwrap();
        assert_eq!(shown.index, 7);
        assert_eq!(shown.frame.data[0], ScriptedSource::fill_for(7));
        assert!(!panel.cache().contains(2));

        // Nothing left to deliver
        std::thread::sleep(Duration::from_millis(60));
        assert!(panel.poll().is_none());
        assert_eq!(panel.displayed().unwrap().index, 7);
    }

    #[test]
    fn stale_result_after_cache_hit_is_discarded() {
        let scripted = ScriptedSource::new("clip.mp4", 10).with_delay(Duration::from_millis(30));
        let mut panel = VideoPanel::new(Box::new(scripted), FrameCache::unbounded()).unwrap();

        panel.jump_to_frame(1).unwrap();
        poll_panel(&mut panel, TIMEOUT).expect("frame 1 loaded");

        // Start a slow load for 8, then jump back to the cached frame 1
        panel.jump_to_frame(8).unwrap();
        assert_eq!(panel.jump_to_frame(1).unwrap(), JumpOutcome::CacheHit);
        assert_eq!(panel.displayed().unwrap().index, 1);

        assert_eq!(poll_panel(&mut panel, TIMEOUT), Some(PanelEvent::Discarded { index: 8 }));
        assert_eq!(panel.current_frame(), 1);
        assert_eq!(panel.displayed().unwrap().index, 1);
        assert!(!panel.cache().contains(8));
    }

    #[test]
    fn failure_for_abandoned_frame_is_discarded() {
        let scripted = ScriptedSource::new("clip.mp4", 10)
            .with_delay(Duration::from_millis(30))
            .failing_on(8);
        let mut panel = VideoPanel::new(Box::new(scripted), FrameCache::unbounded()).unwrap();

        panel.jump_to_frame(1).unwrap();
        poll_panel(&mut panel, TIMEOUT).expect("frame 1 loaded");

        // Start a failing load for 8, then return to the cached frame 1
        panel.jump_to_frame(8).unwrap();
        assert_eq!(panel.jump_to_frame(1).unwrap(), JumpOutcome::CacheHit);

        assert_eq!(poll_panel(&mut panel, TIMEOUT), Some(PanelEvent::Discarded { index: 8 }));
        assert_eq!(panel.current_frame(), 1);
        assert_eq!(panel.displayed().unwrap().index, 1);
        assert!(panel.last_error().is_none());
    }

    #[test]
    fn repeated_jump_to_loading_frame_keeps_worker() {
        let scripted = ScriptedSource::new("clip.mp4", 10).with_delay(Duration::from_millis(20));
        let decodes = scripted.finished_counter();
        let mut panel = VideoPanel::new(Box::new(scripted), FrameCache::unbounded()).unwrap();

        panel.jump_to_frame(3).unwrap();
        assert_eq!(panel.jump_to_frame(3).unwrap(), JumpOutcome::Loading);
        poll_panel(&mut panel, TIMEOUT).expect("frame 3 loaded");

        assert_eq!(decodes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn decode_failure_leaves_state_unchanged() {
        let scripted = ScriptedSource::new("clip.mp4", 10).failing_on(4);
        let mut panel = VideoPanel::new(Box::new(scripted), FrameCache::unbounded()).unwrap();

        panel.jump_to_frame(2).unwrap();
        poll_panel(&mut panel, TIMEOUT).expect("frame 2 loaded");

        panel.jump_to_frame(4).unwrap();
        match poll_panel(&mut panel, TIMEOUT) {
            Some(PanelEvent::DecodeFailed { index: 4, .. }) => {}
            other => panic!("expected decode failure, got {other:?}"),
        }

        assert_eq!(panel.current_frame(), 4);
        assert_eq!(panel.displayed().unwrap().index, 2);
        assert!(!panel.cache().contains(4));
        assert!(panel.last_error().is_some());
    }

    #[test]
    fn out_of_range_jump_is_rejected() {
        let mut panel = panel(5);
        panel.jump_to_frame(3).unwrap();

        let err = panel.jump_to_frame(5).unwrap_err();
        assert!(matches!(err, PanelError::OutOfRange { index: 5, total: 5 }));
        assert_eq!(panel.current_frame(), 3);
    }

    #[test]
    fn reset_returns_to_first_frame() {
        let mut panel = panel(20);
        panel.jump_to_frame(13).unwrap();
        poll_panel(&mut panel, TIMEOUT);

        panel.reset_to_start().unwrap();
        assert_eq!(panel.current_frame(), 0);
        assert_eq!(poll_panel(&mut panel, TIMEOUT), Some(PanelEvent::FrameShown { index: 0 }));
    }

    #[test]
    fn reset_on_single_frame_video() {
        let mut panel = panel(1);
        panel.reset_to_start().unwrap();
        assert_eq!(panel.current_frame(), 0);
    }

    #[test]
    fn cleanup_stops_loader_and_closes_source() {
        let scripted = ScriptedSource::new("clip.mp4", 10).with_delay(Duration::from_millis(30));
        let started = scripted.started_counter();
        let finished = scripted.finished_counter();
        let mut panel = VideoPanel::new(Box::new(scripted), FrameCache::unbounded()).unwrap();

        panel.jump_to_frame(6).unwrap();
        assert!(wait_for_count(&started, 1, TIMEOUT));
        panel.cleanup();

        assert_eq!(finished.load(Ordering::SeqCst), 1);
        assert!(panel.is_closed());
        assert!(panel.source.lock().is_closed());
        assert!(panel.poll().is_none());
        assert!(panel.cache().is_empty());
        assert!(matches!(panel.jump_to_frame(1), Err(PanelError::Closed)));

        // Second call is a no-op
        panel.cleanup();
    }

    #[test]
    fn progress_and_info() {
        let mut panel = panel(10);
        panel.jump_to_frame(7).unwrap();
        assert_eq!(panel.progress_percent(), 70);

        let info = panel.info_text();
        assert!(info.contains("File: clip.mp4"));
        assert!(info.contains("Size: 4x2"));
        assert!(info.contains("FPS: 25.00"));
        assert!(info.contains("Frames: 10"));
        assert!(info.contains("Duration: 0.40 s"));
        assert!(info.contains("Cache: 0 frames, 0 MB"));

        poll_panel(&mut panel, TIMEOUT).expect("frame 7 loaded");
        assert!(panel.info_text().contains("Cache: 1 frames, 0 MB"));
    }

    #[test]
    fn info_reports_cache_budget_use() {
        let mut panel = VideoPanel::new(
            Box::new(ScriptedSource::new("clip.mp4", 10)),
            FrameCache::with_budget_mb(1),
        )
        .unwrap();
        panel.jump_to_frame(0).unwrap();
        poll_panel(&mut panel, TIMEOUT).expect("frame 0 loaded");

        // One 4x2 frame is far below 1% of a 1 MB budget
        assert!(panel.info_text().contains("Cache: 1 frames, 0 MB (0% of budget)"));
    }
}
