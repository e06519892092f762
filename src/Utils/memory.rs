//! # Memory Counter
//!
//! Byte accounting for external memory statistics. Nothing in the crate
//! depends on the counted value.

/// Accumulates byte footprints reported by geometry
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryCounter {
    bytes: usize,
    arrays: usize,
}

impl MemoryCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Account for one array of `len` elements of `element_size` bytes
    #[inline]
    pub fn add_array(&mut self, len: usize, element_size: usize) {
        self.bytes += len * element_size;
        self.arrays += 1;
    }

    /// Account for a raw number of bytes
    #[inline]
    pub fn add(&mut self, bytes: usize) {
        self.bytes += bytes;
    }

    pub fn total_bytes(&self) -> usize {
        self.bytes
    }

    /// Number of arrays reported through [`MemoryCounter::add_array`]
    pub fn array_count(&self) -> usize {
        self.arrays
    }
}
