//! Per-panel frame loading and synchronized multi-panel navigation.
//!
//! ```text
//! Interface thread                     Loader thread (one per panel)
//! ┌──────────────────────┐            ┌──────────────────────┐
//! │ PanelGrid            │            │ FrameLoadWorker      │
//! │  navigate_frames()   │── spawn ──►│  lock source         │
//! │  VideoPanel::poll()  │◄─ result ──│  seek + decode       │
//! │   cache + render     │  channel   │  check liveness flag │
//! └──────────────────────┘            └──────────────────────┘
//! ```
//!
//! A panel answers cache hits synchronously. On a miss it stops its previous
//! loader (blocking until the thread exits) and starts a new one. Results
//! are only applied when they still match the panel's current frame.

pub mod cache;
pub mod grid;
pub mod panel;
pub mod worker;

#[cfg(test)]
pub(crate) mod test_support;

pub use cache::{CacheStats, FrameCache};
pub use grid::{
    Direction, Interval, LoadFailure, LoadReport, PanelGrid, PanelId, Progress, SourceOpener,
    GRID_COLUMNS, MAX_PANELS,
};
pub use panel::{DisplayedFrame, JumpOutcome, PanelError, PanelEvent, VideoPanel};
pub use worker::{FrameLoadWorker, LoadResult, Notify, WorkerState};
