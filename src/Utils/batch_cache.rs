//! # Batch Cache
//!
//! Hook for a draw-batch cache owned by a renderer. The point cloud only
//! forwards dirty tags and release requests; what a batch contains is up to
//! the implementation.

use std::fmt;

/// What changed when the batch cache is tagged dirty
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BatchDirtyMode {
    /// Everything must be rebuilt
    All,
    /// Only selection state changed
    Select,
}

/// Renderer-side cache attached to a point cloud
pub trait BatchCache: Send + Sync {
    fn dirty_tag(&mut self, mode: BatchDirtyMode);

    /// Release every GPU-side resource; called once when the cache is dropped
    fn free(&mut self);
}

impl fmt::Debug for dyn BatchCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BatchCache")
    }
}
