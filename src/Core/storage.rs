//! # AttributeStorage
//!
//! Named, typed per-point layers that all share one element count.
//! Layers are kept ordered by name so iteration (and therefore file output)
//! is deterministic.

use std::collections::BTreeMap;

use glam::Vec3;
use thiserror::Error;

use crate::attribute_type::{AttributeData, AttributeType};
use crate::memory::MemoryCounter;

/// Name of the position attribute, always `Float3`
pub const ATTR_POSITION: &str = "position";
/// Name of the optional per-point radius attribute
pub const ATTR_RADIUS: &str = "radius";
/// Name of the optional per-point material index attribute
pub const ATTR_MATERIAL_INDEX: &str = "material_index";

/// Attribute errors
///
/// Looking up a missing attribute is not an error; these cover explicit
/// structural requests that cannot be honoured.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AttributeError {
    #[error("attribute already exists: {0}")]
    AlreadyExists(String),
    #[error("attribute {name} has {actual} elements, expected {expected}")]
    LengthMismatch {
        name: String,
        expected: usize,
        actual: usize,
    },
    #[error("attribute {0} is required and cannot be removed or retyped")]
    Required(String),
    #[error("attribute {name} must have type {expected}, got {actual}")]
    WrongType {
        name: String,
        expected: AttributeType,
        actual: AttributeType,
    },
}

/// A single named, typed, dense per-point array
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeLayer {
    name: String,
    data: AttributeData,
}

impl AttributeLayer {
    pub fn new(name: impl Into<String>, data: AttributeData) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn data_type(&self) -> AttributeType {
        self.data.data_type()
    }

    #[inline]
    pub fn data(&self) -> &AttributeData {
        &self.data
    }

    #[inline]
    pub fn data_mut(&mut self) -> &mut AttributeData {
        &mut self.data
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn into_data(self) -> AttributeData {
        self.data
    }
}

/// Ordered mapping from name to layer with a shared element count
///
/// `Clone` duplicates every layer; copies never share storage.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttributeStorage {
    layers: BTreeMap<String, AttributeLayer>,
    domain_size: usize,
}

impl AttributeStorage {
    /// Create an empty storage for `domain_size` elements
    pub fn new(domain_size: usize) -> Self {
        Self {
            layers: BTreeMap::new(),
            domain_size,
        }
    }

    /// Create a storage holding only the position layer
    pub fn with_positions(positions: Vec<Vec3>) -> Self {
        let domain_size = positions.len();
        let mut layers = BTreeMap::new();
        layers.insert(
            ATTR_POSITION.to_string(),
            AttributeLayer::new(ATTR_POSITION, AttributeData::Float3(positions)),
        );
        Self { layers, domain_size }
    }

    /// Number of elements every layer holds
    #[inline]
    pub fn domain_size(&self) -> usize {
        self.domain_size
    }

    /// Number of layers
    #[inline]
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        self.layers.contains_key(name)
    }

    #[inline]
    pub fn lookup(&self, name: &str) -> Option<&AttributeLayer> {
        self.layers.get(name)
    }

    #[inline]
    pub fn lookup_mut(&mut self, name: &str) -> Option<&mut AttributeLayer> {
        self.layers.get_mut(name)
    }

    /// Add a new layer
    pub fn add(
        &mut self,
        name: &str,
        data: AttributeData,
    ) -> Result<&mut AttributeLayer, AttributeError> {
        if self.layers.contains_key(name) {
            return Err(AttributeError::AlreadyExists(name.to_string()));
        }
        if data.len() != self.domain_size {
            return Err(AttributeError::LengthMismatch {
                name: name.to_string(),
                expected: self.domain_size,
                actual: data.len(),
            });
        }
        if name == ATTR_POSITION && data.data_type() != AttributeType::Float3 {
            return Err(AttributeError::WrongType {
                name: name.to_string(),
                expected: AttributeType::Float3,
                actual: data.data_type(),
            });
        }
        let layer = self
            .layers
            .entry(name.to_string())
            .or_insert_with(|| AttributeLayer::new(name, data));
        Ok(layer)
    }

    /// Remove a layer, returns whether it existed
    pub fn remove(&mut self, name: &str) -> bool {
        self.layers.remove(name).is_some()
    }

    /// Resize every layer in lock-step
    pub fn resize(&mut self, new_size: usize) {
        for layer in self.layers.values_mut() {
            layer.data.resize(new_size);
        }
        self.domain_size = new_size;
        self.debug_validate();
    }

    /// Iterate layers in name order
    pub fn iter(&self) -> impl Iterator<Item = &AttributeLayer> + '_ {
        self.layers.values()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.layers.keys().map(String::as_str)
    }

    /// Report the footprint of every layer at the current element count
    pub fn count_memory(&self, memory: &mut MemoryCounter) {
        for layer in self.layers.values() {
            memory.add_array(self.domain_size, layer.data_type().size_in_bytes());
        }
    }

    /// Check the length and type invariants (debug builds only)
    #[inline]
    pub fn debug_validate(&self) {
        #[cfg(debug_assertions)]
        for (name, layer) in &self.layers {
            debug_assert_eq!(name, &layer.name, "layer stored under a foreign name");
            debug_assert_eq!(
                layer.len(),
                self.domain_size,
                "layer {} has {} elements, storage has {}",
                name,
                layer.len(),
                self.domain_size
            );
            if name == ATTR_POSITION {
                debug_assert_eq!(layer.data_type(), AttributeType::Float3);
            }
        }
    }
}
