//! Per-panel decoded frame cache.
//!
//! Unbounded by default: every decoded frame stays resident for the life of
//! the panel, so memory grows with the number of distinct frames visited.
//! A byte budget can be configured, in which case least-recently-used frames
//! are evicted to stay under it.

use linked_hash_map::LinkedHashMap;
use std::sync::Arc;
use tracing::trace;

use vs_common::RgbFrame;

/// Frame index → decoded frame, in least-recently-used order.
pub struct FrameCache {
    frames: LinkedHashMap<u32, Arc<RgbFrame>>,
    used_bytes: usize,
    max_bytes: Option<usize>,
}

impl FrameCache {
    /// A cache that never evicts.
    pub fn unbounded() -> Self {
        Self {
            frames: LinkedHashMap::new(),
            used_bytes: 0,
            max_bytes: None,
        }
    }

    /// A cache limited to `max_mb` megabytes. `0` means unbounded.
    pub fn with_budget_mb(max_mb: usize) -> Self {
        let mut cache = Self::unbounded();
        if max_mb > 0 {
            cache.max_bytes = Some(max_mb * 1024 * 1024);
        }
        cache
    }

    /// Get a frame, marking it as most recently used.
    pub fn get(&mut self, index: u32) -> Option<Arc<RgbFrame>> {
        self.frames.get_refresh(&index).map(|frame| Arc::clone(frame))
    }

    /// Check presence without touching the access order.
    pub fn contains(&self, index: u32) -> bool {
        self.frames.contains_key(&index)
    }

    /// Insert a frame, replacing any previous entry for `index`.
    pub fn put(&mut self, index: u32, frame: Arc<RgbFrame>) {
        let frame_size = frame.size_bytes();

        if let Some(old) = self.frames.remove(&index) {
            self.used_bytes = self.used_bytes.saturating_sub(old.size_bytes());
        }

        if let Some(max_bytes) = self.max_bytes {
            // Don't cache if a single frame exceeds the budget
            if frame_size > max_bytes {
                return;
            }

            while self.used_bytes + frame_size > max_bytes {
                match self.frames.pop_front() {
                    Some((evicted, old)) => {
                        self.used_bytes = self.used_bytes.saturating_sub(old.size_bytes());
                        trace!("Evicted frame {} from cache", evicted);
                    }
                    None => break,
                }
            }
        }

        self.frames.insert(index, frame);
        self.used_bytes += frame_size;
    }

    /// Drop every cached frame.
    pub fn clear(&mut self) {
        self.frames.clear();
        self.used_bytes = 0;
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            used_bytes: self.used_bytes,
            max_bytes: self.max_bytes,
            frame_count: self.frames.len(),
        }
    }
}

impl Default for FrameCache {
    fn default() -> Self {
        Self::unbounded()
    }
}

/// Cache statistics
#[derive(Debug, Clone, PartialEq)]
pub struct CacheStats {
    pub used_bytes: usize,
    pub max_bytes: Option<usize>,
    pub frame_count: usize,
}

impl CacheStats {
    pub fn used_mb(&self) -> usize {
        self.used_bytes / (1024 * 1024)
    }

    /// Fraction of the budget in use; `None` for an unbounded cache.
    pub fn utilization(&self) -> Option<f32> {
        match self.max_bytes {
            Some(0) | None => None,
            Some(max) => Some(self.used_bytes as f32 / max as f32),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(fill: u8, width: u32, height: u32) -> Arc<RgbFrame> {
        let len = RgbFrame::expected_len(width, height);
        Arc::new(RgbFrame::new(width, height, vec![fill; len]).unwrap())
    }

    #[test]
    fn put_then_get() {
        let mut cache = FrameCache::unbounded();
        assert!(cache.get(3).is_none());

        cache.put(3, frame(9, 4, 4));
        let hit = cache.get(3).expect("frame 3 cached");
        assert_eq!(hit.data[0], 9);
        assert!(cache.contains(3));
        assert!(!cache.contains(4));
    }

    #[test]
    fn put_overwrites_single_entry() {
        let mut cache = FrameCache::unbounded();
        cache.put(0, frame(1, 4, 4));
        cache.put(0, frame(2, 4, 4));

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(0).unwrap().data[0], 2);
        assert_eq!(cache.stats().used_bytes, 4 * 4 * 3);
    }

    #[test]
    fn unbounded_never_evicts() {
        let mut cache = FrameCache::with_budget_mb(0);
        for i in 0..500 {
            cache.put(i, frame(0, 64, 64));
        }
        assert_eq!(cache.len(), 500);
        assert_eq!(cache.stats().max_bytes, None);
        assert_eq!(cache.stats().utilization(), None);
    }

    #[test]
    fn budget_evicts_least_recently_used() {
        // 1 MB budget, frames of 512x512x3 = 768 KiB: only one fits
        let mut cache = FrameCache::with_budget_mb(1);
        cache.put(0, frame(0, 512, 512));
        cache.put(1, frame(1, 512, 512));

        assert!(!cache.contains(0));
        assert!(cache.contains(1));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn get_refreshes_access_order() {
        // 1 MB budget, frames of 256x256x3 = 192 KiB: five fit
        let mut cache = FrameCache::with_budget_mb(1);
        for i in 0..5 {
            cache.put(i, frame(i as u8, 256, 256));
        }
        // Touch frame 0 so frame 1 becomes the oldest
        cache.get(0);
        cache.put(5, frame(5, 256, 256));

        assert!(cache.contains(0));
        assert!(!cache.contains(1));
        assert!(cache.contains(5));
    }

    #[test]
    fn oversized_frame_is_not_cached() {
        let mut cache = FrameCache::with_budget_mb(1);
        cache.put(0, frame(0, 1024, 1024));
        assert!(cache.is_empty());
    }

    #[test]
    fn clear_resets_stats() {
        let mut cache = FrameCache::unbounded();
        cache.put(0, frame(0, 8, 8));
        cache.put(1, frame(0, 8, 8));
        cache.clear();

        assert!(cache.is_empty());
        assert_eq!(cache.stats().used_bytes, 0);
        assert_eq!(cache.stats().frame_count, 0);
    }
}
