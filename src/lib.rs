//! # RustCloud - Point Cloud Geometry Core
//!
//! Point clouds with open-ended typed per-point attributes, lazily cached
//! derived data and a modifier evaluation pipeline.
//!
//! ## Quick Start
//!
//! ```rust
//! use rustcloud::{EvalMode, Object, PointCloud, Vec3};
//!
//! let mut pointcloud = PointCloud::with_point_count(2);
//! pointcloud.positions_for_write()[1] = Vec3::ONE;
//! pointcloud.radius_for_write().fill(0.5);
//!
//! let bounds = pointcloud.bounds_min_max(true).unwrap();
//! assert_eq!(bounds.max, Vec3::splat(1.5));
//!
//! let mut object = Object::new("points", pointcloud);
//! object.data_update(EvalMode::Viewport);
//! assert!(!object.is_evaluated_owned());
//! ```

// Re-export types
pub use accessor::{
    AttrDomain, AttributeAccessor, AttributeChangeObserver, MutableAttributeAccessor, NoopObserver,
    MAXMAT,
};
pub use attribute_type::{AttributeData, AttributeType, AttributeValue};
pub use batch_cache::{BatchCache, BatchDirtyMode};
pub use bounds::Bounds;
pub use cache::{CacheState, SharedCache};
pub use config::{Config, ConfigError, EvaluationConfig, PointCloudConfig};
pub use evaluation::{EvaluationPipeline, EvaluationResult, Object};
pub use geometry_set::{GeometryOwnership, GeometrySet, PointCloudComponent};
pub use io::*;
pub use memory::MemoryCounter;
pub use modifier::{
    EvalMode, FnModifier, Modifier, ModifierError, ModifierEvalContext, ModifierMode, ModifierSlot,
    StageOutcome,
};
pub use point_tree::PointTree;
pub use pointcloud::{copy_parameters, MaterialId, PointCloud, PointCloudFlags, DEFAULT_RADIUS};
pub use storage::{
    AttributeError, AttributeLayer, AttributeStorage, ATTR_MATERIAL_INDEX, ATTR_POSITION,
    ATTR_RADIUS,
};
pub use test_data::*;
pub use varray::{VArray, VArrayIter};
pub use glam::Vec3;

// Core modules
#[path = "Core/attribute_type.rs"]
pub mod attribute_type;
#[path = "Core/storage.rs"]
pub mod storage;
#[path = "Core/varray.rs"]
pub mod varray;
#[path = "Core/accessor.rs"]
pub mod accessor;
#[path = "Core/cache.rs"]
pub mod cache;
#[path = "Core/bounds.rs"]
pub mod bounds;
#[path = "Core/point_tree.rs"]
pub mod point_tree;
#[path = "Core/pointcloud.rs"]
pub mod pointcloud;
#[path = "Core/geometry_set.rs"]
pub mod geometry_set;

// Evaluation
#[path = "Tools/modifier.rs"]
pub mod modifier;
#[path = "Tools/evaluation.rs"]
pub mod evaluation;

// Utilities
#[path = "Utils/memory.rs"]
pub mod memory;
#[path = "Utils/batch_cache.rs"]
pub mod batch_cache;
#[path = "Utils/config.rs"]
pub mod config;

mod io;
mod test_data;
