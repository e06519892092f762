//! # PointCloud
//!
//! A variable-length set of points with open-ended typed attributes and
//! lazily computed derived data (bounds, acceleration structure).
//!
//! Derived data is invalidated through two tags:
//! - [`PointCloud::tag_positions_changed`]: plain bounds, radius bounds, tree
//! - [`PointCloud::tag_radii_changed`]: radius bounds only
//!
//! Every write accessor for `position` or `radius` applies the matching tag
//! before returning, so callers only tag manually after editing through raw
//! layer access.

use std::sync::Arc;

use glam::Vec3;
use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::accessor::{
    self, AttrDomain, AttributeAccessor, AttributeChangeObserver, MutableAttributeAccessor,
};
use crate::attribute_type::AttributeType;
use crate::batch_cache::{BatchCache, BatchDirtyMode};
use crate::bounds::{self, Bounds};
use crate::cache::SharedCache;
use crate::config::PointCloudConfig;
use crate::memory::MemoryCounter;
use crate::point_tree::PointTree;
use crate::storage::{
    AttributeError, AttributeStorage, ATTR_MATERIAL_INDEX, ATTR_POSITION, ATTR_RADIUS,
};
use crate::varray::VArray;

/// Radius of a point without a `radius` layer
pub const DEFAULT_RADIUS: f32 = 0.01;

/// Identifier of an external material
pub type MaterialId = u32;

/// Point cloud level flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct PointCloudFlags(u32);

impl PointCloudFlags {
    /// Expanded in an outliner-style UI
    pub const DS_EXPAND: PointCloudFlags = PointCloudFlags(1);

    #[inline]
    pub fn empty() -> Self {
        Self(0)
    }

    #[inline]
    pub fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    #[inline]
    pub fn bits(&self) -> u32 {
        self.0
    }

    #[inline]
    pub fn contains(&self, other: PointCloudFlags) -> bool {
        (self.0 & other.0) == other.0
    }

    #[inline]
    pub fn insert(&mut self, other: PointCloudFlags) {
        self.0 |= other.0;
    }

    #[inline]
    pub fn remove(&mut self, other: PointCloudFlags) {
        self.0 &= !other.0;
    }
}

/// Derived data caches
#[derive(Debug, Clone, Default)]
struct PointCloudRuntime {
    bounds_cache: SharedCache<Option<Bounds>>,
    bounds_with_radius_cache: SharedCache<Option<Bounds>>,
    bvh_cache: SharedCache<Arc<PointTree>>,
}

impl PointCloudRuntime {
    fn tag_positions_changed(&mut self) {
        self.bounds_cache.tag_dirty();
        self.bounds_with_radius_cache.tag_dirty();
        self.bvh_cache.tag_dirty();
    }

    fn tag_radii_changed(&mut self) {
        self.bounds_with_radius_cache.tag_dirty();
    }
}

impl AttributeChangeObserver for PointCloudRuntime {
    fn attribute_changed(&mut self, name: &str) {
        match name {
            ATTR_POSITION => self.tag_positions_changed(),
            ATTR_RADIUS => self.tag_radii_changed(),
            _ => {}
        }
    }
}

/// Point cloud geometry
#[derive(Debug)]
pub struct PointCloud {
    attributes: AttributeStorage,
    materials: Vec<Option<MaterialId>>,
    flag: PointCloudFlags,
    runtime: PointCloudRuntime,
    batch_cache: Option<Box<dyn BatchCache>>,
}

impl PointCloud {
    /// Create an empty point cloud; the position layer exists but is empty
    pub fn new() -> Self {
        Self::with_point_count(0)
    }

    /// Create `point_count` points at the origin with no other attributes
    pub fn with_point_count(point_count: usize) -> Self {
        Self::from_positions(vec![Vec3::ZERO; point_count])
    }

    /// Create a point cloud from explicit positions
    pub fn from_positions(positions: Vec<Vec3>) -> Self {
        Self::from_storage(AttributeStorage::with_positions(positions))
    }

    /// Wrap existing attribute storage; it must hold a `Float3` position layer
    pub fn from_attributes(attributes: AttributeStorage) -> Result<Self, AttributeError> {
        match attributes.lookup(ATTR_POSITION) {
            None => return Err(AttributeError::Required(ATTR_POSITION.to_string())),
            Some(layer) if layer.data_type() != AttributeType::Float3 => {
                return Err(AttributeError::WrongType {
                    name: ATTR_POSITION.to_string(),
                    expected: AttributeType::Float3,
                    actual: layer.data_type(),
                });
            }
            Some(_) => {}
        }
        attributes.debug_validate();
        Ok(Self::from_storage(attributes))
    }

    fn from_storage(attributes: AttributeStorage) -> Self {
        Self {
            attributes,
            materials: Vec::new(),
            flag: PointCloudFlags::empty(),
            runtime: PointCloudRuntime::default(),
            batch_cache: None,
        }
    }

    /// Random cloud used as the initial content of a new object
    ///
    /// Positions are uniform in `[-1, 1]^3`, radii uniform in
    /// `[0, max_random_radius)`.
    pub fn new_random(config: &PointCloudConfig) -> Self {
        let mut rng = StdRng::seed_from_u64(config.random_seed);
        let count = config.default_point_count;
        let mut positions = Vec::with_capacity(count);
        let mut radii = Vec::with_capacity(count);
        for _ in 0..count {
            let p = Vec3::new(rng.gen::<f32>(), rng.gen::<f32>(), rng.gen::<f32>());
            positions.push(p * 2.0 - Vec3::ONE);
            radii.push(config.max_random_radius * rng.gen::<f32>());
        }

        let mut pointcloud = Self::from_positions(positions);
        pointcloud.radius_for_write().copy_from_slice(&radii);
        debug!("created random point cloud with {} points", count);
        pointcloud
    }

    #[inline]
    pub fn point_count(&self) -> usize {
        self.attributes.domain_size()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.point_count() == 0
    }

    /// Whether `name` must always exist on a point cloud
    #[inline]
    pub fn is_attribute_required(name: &str) -> bool {
        accessor::is_required(name)
    }

    // --- Attribute access ---

    pub fn attributes(&self) -> AttributeAccessor<'_> {
        AttributeAccessor::new(&self.attributes)
    }

    /// Write accessor; acquiring position or radius data dirties the caches
    pub fn attributes_for_write(&mut self) -> MutableAttributeAccessor<'_> {
        MutableAttributeAccessor::new(&mut self.attributes, &mut self.runtime)
    }

    /// Direct access to the underlying storage
    pub fn attribute_storage(&self) -> &AttributeStorage {
        &self.attributes
    }

    pub fn positions(&self) -> &[Vec3] {
        self.attributes().get_typed_read(ATTR_POSITION)
    }

    pub fn positions_for_write(&mut self) -> &mut [Vec3] {
        self.attributes_for_write()
            .into_lookup_or_add_for_write(ATTR_POSITION, AttrDomain::Point, Vec3::ZERO)
    }

    /// Per-point radius, virtual [`DEFAULT_RADIUS`] when no layer exists
    pub fn radius(&self) -> VArray<'_, f32> {
        self.attributes()
            .lookup_or_default(ATTR_RADIUS, AttrDomain::Point, DEFAULT_RADIUS)
    }

    pub fn radius_for_write(&mut self) -> &mut [f32] {
        self.attributes_for_write()
            .into_lookup_or_add_for_write(ATTR_RADIUS, AttrDomain::Point, DEFAULT_RADIUS)
    }

    /// Change the point count; every layer is resized in lock-step
    pub fn resize(&mut self, point_count: usize) {
        if point_count == self.point_count() {
            return;
        }
        self.attributes.resize(point_count);
        self.tag_positions_changed();
    }

    // --- Derived data ---

    pub fn tag_positions_changed(&mut self) {
        self.runtime.tag_positions_changed();
    }

    pub fn tag_radii_changed(&mut self) {
        self.runtime.tag_radii_changed();
    }

    /// Axis-aligned bounds, optionally padded by point radii
    ///
    /// Returns `None` for a point cloud without points.
    pub fn bounds_min_max(&self, use_radius: bool) -> Option<Bounds> {
        if self.is_empty() {
            return None;
        }
        if use_radius {
            self.runtime.bounds_with_radius_cache.ensure(|| {
                let radius = self.radius();
                if let Some(single) = radius.get_if_single() {
                    return self.bounds_min_max(false).map(|b| b.padded(single));
                }
                let radii = radius.get_internal_span().unwrap_or(&[]);
                bounds::min_max_with_radii(self.positions(), radii)
            })
        } else {
            self.runtime
                .bounds_cache
                .ensure(|| bounds::min_max(self.positions()))
        }
    }

    /// KD-Tree over the positions, `None` for a point cloud without points
    pub fn bvh(&self) -> Option<Arc<PointTree>> {
        if self.is_empty() {
            return None;
        }
        Some(
            self.runtime
                .bvh_cache
                .ensure(|| Arc::new(PointTree::build(self.positions()))),
        )
    }

    /// Whether the given derived value is currently cached
    pub fn is_bounds_cached(&self, use_radius: bool) -> bool {
        if use_radius {
            self.runtime.bounds_with_radius_cache.is_cached()
        } else {
            self.runtime.bounds_cache.is_cached()
        }
    }

    pub fn is_bvh_cached(&self) -> bool {
        self.runtime.bvh_cache.is_cached()
    }

    /// Highest used material index, `None` without points
    pub fn material_index_max(&self) -> Option<i32> {
        self.attributes()
            .max_of_int(ATTR_MATERIAL_INDEX, AttrDomain::Point, 0)
    }

    /// Report the byte footprint of all attribute layers
    pub fn count_memory(&self, memory: &mut MemoryCounter) {
        self.attributes.count_memory(memory);
    }

    // --- Materials and flags ---

    pub fn materials(&self) -> &[Option<MaterialId>] {
        &self.materials
    }

    /// Number of material slots
    #[inline]
    pub fn totcol(&self) -> usize {
        self.materials.len()
    }

    pub fn set_materials(&mut self, materials: Vec<Option<MaterialId>>) {
        self.materials = materials;
    }

    pub fn flag(&self) -> PointCloudFlags {
        self.flag
    }

    pub fn set_flag(&mut self, flag: PointCloudFlags) {
        self.flag = flag;
    }

    /// Copy flags and the material array from `src`, replacing ours
    pub fn copy_parameters_from(&mut self, src: &PointCloud) {
        copy_parameters(src, self);
    }

    /// Take over the geometry of a standalone point cloud
    ///
    /// Attributes, point count and cached derived data are replaced by the
    /// ones of `src`; materials, flags and the batch cache are kept.
    pub fn assign_from(&mut self, mut src: PointCloud) {
        self.attributes = std::mem::take(&mut src.attributes);
        self.runtime = std::mem::take(&mut src.runtime);
        self.attributes.debug_validate();
    }

    // --- Batch cache ---

    /// Attach a renderer batch cache, releasing any previous one
    pub fn set_batch_cache(&mut self, cache: Box<dyn BatchCache>) {
        self.batch_cache_free();
        self.batch_cache = Some(cache);
    }

    pub fn has_batch_cache(&self) -> bool {
        self.batch_cache.is_some()
    }

    pub fn batch_cache_dirty_tag(&mut self, mode: BatchDirtyMode) {
        if let Some(cache) = self.batch_cache.as_mut() {
            cache.dirty_tag(mode);
        }
    }

    pub fn batch_cache_free(&mut self) {
        if let Some(mut cache) = self.batch_cache.take() {
            cache.free();
        }
    }
}

impl Default for PointCloud {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for PointCloud {
    /// Deep copy of attributes; cached derived values are shared with the
    /// source until either side changes. The batch cache is not copied.
    fn clone(&self) -> Self {
        Self {
            attributes: self.attributes.clone(),
            materials: self.materials.clone(),
            flag: self.flag,
            runtime: self.runtime.clone(),
            batch_cache: None,
        }
    }
}

impl Drop for PointCloud {
    fn drop(&mut self) {
        self.batch_cache_free();
    }
}

/// Copy flags and the full material array from `src` to `dst`
pub fn copy_parameters(src: &PointCloud, dst: &mut PointCloud) {
    dst.flag = src.flag;
    dst.materials = src.materials.clone();
}
