//! Up to four panels in a 2×2 grid, navigated in lockstep.

use std::path::{Path, PathBuf};
use tracing::{debug, info, trace, warn};

use vs_common::{FrameSource, OpenError};

use crate::cache::FrameCache;
use crate::panel::{PanelEvent, VideoPanel};
use crate::worker::Notify;

/// Most videos shown at once; extra paths are ignored.
pub const MAX_PANELS: usize = 4;

/// Grid width. Panel `i` sits at row `i / GRID_COLUMNS`, column `i % GRID_COLUMNS`.
pub const GRID_COLUMNS: usize = 2;

/// Opens a path into a frame source. Injected so the grid is independent of
/// the codec backend.
pub type SourceOpener = Box<dyn Fn(&Path) -> Result<Box<dyn FrameSource>, OpenError>>;

// ---------------------------------------------------------------------------
// Value types
// ---------------------------------------------------------------------------

/// Stable handle to a panel, valid until the next `open_videos`/`clear`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PanelId(u64);

/// Frames skipped per navigation step, kept within `MIN..=MAX`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Interval(u32);

impl Interval {
    pub const MIN: u32 = 1;
    pub const MAX: u32 = 9999;

    pub fn new(frames: u32) -> Self {
        Self(frames.clamp(Self::MIN, Self::MAX))
    }

    pub fn get(self) -> u32 {
        self.0
    }
}

impl Default for Interval {
    fn default() -> Self {
        Self(Self::MIN)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Back,
    Forward,
}

impl Direction {
    pub fn sign(self) -> i64 {
        match self {
            Self::Back => -1,
            Self::Forward => 1,
        }
    }
}

/// Progress of the last panel that moved during a navigation step, in grid
/// order. Not an aggregate over all panels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Progress {
    pub panel: PanelId,
    pub percent: u8,
}

#[derive(Debug)]
pub struct LoadFailure {
    pub path: PathBuf,
    pub error: OpenError,
}

/// What happened to each path passed to `open_videos`.
#[derive(Debug, Default)]
pub struct LoadReport {
    pub opened: Vec<PanelId>,
    pub failures: Vec<LoadFailure>,
    /// Paths beyond [`MAX_PANELS`].
    pub ignored: Vec<PathBuf>,
}

// ---------------------------------------------------------------------------
// PanelGrid
// ---------------------------------------------------------------------------

pub struct PanelGrid {
    opener: SourceOpener,
    /// Grid order.
    panels: Vec<(PanelId, VideoPanel)>,
    next_id: u64,
    interval: Interval,
    progress: Option<Progress>,
    cache_budget_mb: usize,
    notify: Option<Notify>,
}

impl PanelGrid {
    pub fn new(opener: SourceOpener) -> Self {
        Self {
            opener,
            panels: Vec::with_capacity(MAX_PANELS),
            next_id: 0,
            interval: Interval::default(),
            progress: None,
            cache_budget_mb: 0,
            notify: None,
        }
    }

    /// Per-panel cache budget for panels opened from now on. `0` is unbounded.
    pub fn with_cache_budget_mb(mut self, max_mb: usize) -> Self {
        self.cache_budget_mb = max_mb;
        self
    }

    /// Hook handed to every panel's background loaders.
    pub fn with_notify(mut self, notify: Notify) -> Self {
        self.notify = Some(notify);
        self
    }

    // -----------------------------------------------------------------------
    // Loading
    // -----------------------------------------------------------------------

    /// Replace the current panels with videos from `paths`.
    ///
    /// Previous panels are cleaned up first. Only the first [`MAX_PANELS`]
    /// paths are used. A file that fails to open is recorded in the report
    /// and does not stop the others from loading. Each new panel starts
    /// loading its first frame.
    pub fn open_videos<P: AsRef<Path>>(&mut self, paths: &[P]) -> LoadReport {
        self.clear();

        let mut report = LoadReport::default();

        for (slot, path) in paths.iter().enumerate() {
            let path = path.as_ref();

            if slot >= MAX_PANELS {
                debug!("Ignoring {} (grid holds {} videos)", path.display(), MAX_PANELS);
                report.ignored.push(path.to_path_buf());
                continue;
            }

            match self.open_panel(path) {
                Ok(mut panel) => {
                    if let Err(e) = panel.reset_to_start() {
                        warn!("{}: could not load first frame: {}", path.display(), e);
                    }

                    let id = PanelId(self.next_id);
                    self.next_id += 1;
                    self.panels.push((id, panel));
                    report.opened.push(id);
                }
                Err(error) => {
                    warn!("Failed to open {}: {}", path.display(), error);
                    report.failures.push(LoadFailure {
                        path: path.to_path_buf(),
                        error,
                    });
                }
            }
        }

        info!(
            "Loaded {} video(s), {} failed, {} ignored",
            report.opened.len(),
            report.failures.len(),
            report.ignored.len()
        );

        report
    }

    fn open_panel(&self, path: &Path) -> Result<VideoPanel, OpenError> {
        let source = (self.opener)(path)?;
        let panel = VideoPanel::new(source, FrameCache::with_budget_mb(self.cache_budget_mb))?;

        Ok(match &self.notify {
            Some(notify) => panel.with_notify(notify.clone()),
            None => panel,
        })
    }

    /// Clean up and drop every panel.
    pub fn clear(&mut self) {
        for (_, panel) in self.panels.iter_mut() {
            panel.cleanup();
        }
        self.panels.clear();
        self.progress = None;
    }

    // -----------------------------------------------------------------------
    // Navigation
    // -----------------------------------------------------------------------

    pub fn interval(&self) -> Interval {
        self.interval
    }

    pub fn set_interval(&mut self, frames: u32) {
        self.interval = Interval::new(frames);
    }

    /// Step every panel by one interval in `direction`.
    ///
    /// A panel whose target would leave `[0, total_frames)` stays where it is;
    /// the others still move. Returns the progress of the last panel that
    /// moved, or the previous progress if none did.
    pub fn navigate_frames(&mut self, direction: Direction) -> Option<Progress> {
        let step = direction.sign() * i64::from(self.interval.get());

        for (id, panel) in self.panels.iter_mut() {
            let target = i64::from(panel.current_frame()) + step;
            if target < 0 || target >= i64::from(panel.total_frames()) {
                trace!("Panel {:?}: target {} out of range, skipped", id, target);
                continue;
            }

            match panel.jump_to_frame(target as u32) {
                Ok(_) => {
                    self.progress = Some(Progress {
                        panel: *id,
                        percent: panel.progress_percent(),
                    });
                }
                Err(e) => warn!("Panel {:?}: navigation failed: {}", id, e),
            }
        }

        self.progress
    }

    pub fn progress(&self) -> Option<Progress> {
        self.progress
    }

    /// Drain finished background loads from every panel.
    pub fn poll(&mut self) -> Vec<(PanelId, PanelEvent)> {
        self.panels
            .iter_mut()
            .filter_map(|(id, panel)| panel.poll().map(|event| (*id, event)))
            .collect()
    }

    // -----------------------------------------------------------------------
    // Access
    // -----------------------------------------------------------------------

    pub fn len(&self) -> usize {
        self.panels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.panels.is_empty()
    }

    /// Panels in grid order.
    pub fn panels(&self) -> impl Iterator<Item = (PanelId, &VideoPanel)> {
        self.panels.iter().map(|(id, panel)| (*id, panel))
    }

    pub fn panel(&self, id: PanelId) -> Option<&VideoPanel> {
        self.panels
            .iter()
            .find(|(pid, _)| *pid == id)
            .map(|(_, panel)| panel)
    }

    pub fn panel_mut(&mut self, id: PanelId) -> Option<&mut VideoPanel> {
        self.panels
            .iter_mut()
            .find(|(pid, _)| *pid == id)
            .map(|(_, panel)| panel)
    }

    /// `(row, column)` of a panel in the grid.
    pub fn position(&self, id: PanelId) -> Option<(usize, usize)> {
        self.panels
            .iter()
            .position(|(pid, _)| *pid == id)
            .map(|slot| (slot / GRID_COLUMNS, slot % GRID_COLUMNS))
    }
}

impl Drop for PanelGrid {
    fn drop(&mut self) {
        self.clear();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
