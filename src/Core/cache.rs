//! # Shared Cache
//!
//! Lazily computed derived value with explicit invalidation.
//!
//! States:
//! - `Empty`: never computed
//! - `Valid`: holds an up-to-date value
//! - `Dirty`: a value existed but is stale and must be recomputed
//!
//! Cloning shares the cached value with the copy, so a copied point cloud
//! does not recompute bounds its source already knows. The first
//! [`SharedCache::tag_dirty`] on a shared cache detaches it, leaving the other
//! owner's value intact.

use std::fmt;
use std::sync::Arc;

use log::trace;
use parking_lot::Mutex;

/// Observable state of a [`SharedCache`]
#[derive(Debug, Clone, PartialEq)]
pub enum CacheState<T> {
    Empty,
    Valid(T),
    Dirty,
}

impl<T> CacheState<T> {
    fn kind(&self) -> &'static str {
        match self {
            CacheState::Empty => "empty",
            CacheState::Valid(_) => "valid",
            CacheState::Dirty => "dirty",
        }
    }
}

/// Memoized derived value
pub struct SharedCache<T> {
    inner: Arc<Mutex<CacheState<T>>>,
}

impl<T> Default for SharedCache<T> {
    fn default() -> Self {
        Self {
            inner: Arc::new(Mutex::new(CacheState::Empty)),
        }
    }
}

impl<T> Clone for SharedCache<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for SharedCache<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedCache")
            .field("state", &self.inner.lock().kind())
            .field("shared", &self.is_shared())
            .finish()
    }
}

impl<T: Clone> SharedCache<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached value, computing it first if not valid
    pub fn ensure(&self, compute: impl FnOnce() -> T) -> T {
        let mut state = self.inner.lock();
        if let CacheState::Valid(value) = &*state {
            return value.clone();
        }
        trace!("recomputing {} cache value", state.kind());
        let value = compute();
        *state = CacheState::Valid(value.clone());
        value
    }

    /// The cached value, only when valid
    pub fn data(&self) -> Option<T> {
        match &*self.inner.lock() {
            CacheState::Valid(value) => Some(value.clone()),
            _ => None,
        }
    }

    pub fn state(&self) -> CacheState<T> {
        self.inner.lock().clone()
    }
}

impl<T> SharedCache<T> {
    /// Mark the value stale; a no-op on an empty cache
    pub fn tag_dirty(&mut self) {
        match Arc::get_mut(&mut self.inner) {
            Some(mutex) => {
                let state = mutex.get_mut();
                if matches!(state, CacheState::Valid(_)) {
                    *state = CacheState::Dirty;
                }
            }
            None => {
                let detached = match &*self.inner.lock() {
                    CacheState::Empty => CacheState::Empty,
                    _ => CacheState::Dirty,
                };
                self.inner = Arc::new(Mutex::new(detached));
            }
        }
    }

    /// Whether a valid value is stored
    pub fn is_cached(&self) -> bool {
        matches!(&*self.inner.lock(), CacheState::Valid(_))
    }

    pub fn is_dirty(&self) -> bool {
        matches!(&*self.inner.lock(), CacheState::Dirty)
    }

    /// Whether another cache shares this value
    pub fn is_shared(&self) -> bool {
        Arc::strong_count(&self.inner) > 1
    }
}
