//! # Evaluation
//!
//! Runs an ordered list of modifiers over an object's point cloud and keeps
//! the result as the object's evaluated data.
//!
//! The original point cloud enters the pipeline as a read-only component and
//! is never written to. A stage that needs to edit it asks the geometry set
//! for write access, which copies the payload. The geometry is snapshotted
//! before every stage and restored when the stage fails, so a failed stage
//! never leaves partial edits behind.

use std::sync::Arc;
use std::time::Instant;

use log::{debug, info, warn};

use crate::bounds::Bounds;
use crate::config::{EvaluationConfig, PointCloudConfig};
use crate::geometry_set::{GeometryOwnership, GeometrySet};
use crate::modifier::{
    EvalMode, Modifier, ModifierEvalContext, ModifierMode, ModifierSlot, StageOutcome,
};
use crate::pointcloud::PointCloud;

/// Output of one pipeline run
#[derive(Debug, Clone)]
pub struct EvaluationResult {
    /// Final point cloud; the original itself when nothing replaced it
    pub pointcloud: Arc<PointCloud>,
    /// `false` when `pointcloud` is the original
    pub is_owned: bool,
    /// Geometry after the last stage, holding a read-only reference to
    /// `pointcloud` when the stages left one
    pub geometry_set: GeometrySet,
}

/// Ordered modifier stack
#[derive(Debug, Default)]
pub struct EvaluationPipeline {
    slots: Vec<ModifierSlot>,
    default_mode: EvalMode,
    log_stage_timings: bool,
}

impl EvaluationPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &EvaluationConfig) -> Self {
        Self {
            slots: Vec::new(),
            default_mode: config.mode,
            log_stage_timings: config.log_stage_timings,
        }
    }

    /// Append a modifier enabled for the given modes
    pub fn push(&mut self, modifier: Box<dyn Modifier>, mode: ModifierMode) -> &mut ModifierSlot {
        self.push_slot(ModifierSlot::new(modifier, mode))
    }

    pub fn push_slot(&mut self, slot: ModifierSlot) -> &mut ModifierSlot {
        let index = self.slots.len();
        self.slots.push(slot);
        &mut self.slots[index]
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn slots(&self) -> &[ModifierSlot] {
        &self.slots
    }

    pub fn slot_mut(&mut self, index: usize) -> Option<&mut ModifierSlot> {
        self.slots.get_mut(index)
    }

    pub fn default_mode(&self) -> EvalMode {
        self.default_mode
    }

    pub fn clear_errors(&mut self) {
        for slot in &mut self.slots {
            slot.clear_error();
        }
    }

    /// `(stage index, message)` of every stage that failed in the last run
    pub fn errors(&self) -> Vec<(usize, &str)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| slot.error().map(|message| (index, message)))
            .collect()
    }

    /// Run every enabled stage over `original`
    ///
    /// Always produces a point cloud: when the stages leave no payload an
    /// empty owned one is created.
    pub fn evaluate(&mut self, original: &Arc<PointCloud>, mode: EvalMode) -> EvaluationResult {
        let ctx = ModifierEvalContext::new(mode);
        self.clear_errors();

        let mut geometry =
            GeometrySet::from_pointcloud(Arc::clone(original), GeometryOwnership::ReadOnly);
        let log_stage_timings = self.log_stage_timings;

        for (index, slot) in self.slots.iter_mut().enumerate() {
            if !slot.is_enabled(mode) {
                debug!("skipping modifier {} ({}), disabled for {:?}", index, slot.name(), mode);
                continue;
            }

            let before = geometry.ownership();
            // Shares the payload; a write during the stage copies it
            let snapshot = geometry.clone();

            let start = Instant::now();
            let result = slot.modifier_mut().modify_geometry_set(&ctx, &mut geometry);
            let elapsed = start.elapsed();
            slot.set_last_eval_time(elapsed);
            if log_stage_timings {
                info!("modifier {} ({}) took {:?}", index, slot.name(), elapsed);
            }

            match result {
                Ok(outcome) => {
                    debug!("modifier {} ({}): {:?}", index, slot.name(), outcome);
                    if outcome == StageOutcome::Unchanged && geometry.ownership() != before {
                        warn!(
                            "modifier {} ({}) reported no change but altered the geometry",
                            index,
                            slot.name()
                        );
                    }
                }
                Err(err) => {
                    warn!("modifier {} ({}) failed: {}", index, slot.name(), err);
                    slot.set_error(&err);
                    geometry = snapshot;
                }
            }
        }

        finalize(original, geometry)
    }
}

fn finalize(original: &Arc<PointCloud>, mut geometry: GeometrySet) -> EvaluationResult {
    let pointcloud = match geometry.take_pointcloud_ownership() {
        Some((pointcloud, _)) => pointcloud,
        None => {
            debug!("modifiers left no point cloud, creating an empty one");
            Arc::new(PointCloud::new())
        }
    };
    let is_owned = !Arc::ptr_eq(&pointcloud, original);
    EvaluationResult {
        pointcloud,
        is_owned,
        geometry_set: geometry,
    }
}

#[derive(Debug, Default)]
struct ObjectRuntime {
    evaluated: Option<EvaluationResult>,
}

/// Named owner of original point cloud data and its modifier stack
#[derive(Debug)]
pub struct Object {
    name: String,
    data: Arc<PointCloud>,
    pipeline: EvaluationPipeline,
    runtime: ObjectRuntime,
}

impl Object {
    pub fn new(name: impl Into<String>, data: PointCloud) -> Self {
        Self::with_shared_data(name, Arc::new(data))
    }

    pub fn with_shared_data(name: impl Into<String>, data: Arc<PointCloud>) -> Self {
        Self {
            name: name.into(),
            data,
            pipeline: EvaluationPipeline::new(),
            runtime: ObjectRuntime::default(),
        }
    }

    /// Object holding a random default point cloud
    pub fn new_default(name: impl Into<String>, config: &PointCloudConfig) -> Self {
        Self::new(name, PointCloud::new_random(config))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data(&self) -> &Arc<PointCloud> {
        &self.data
    }

    /// Mutable original data; evaluated data is dropped first
    pub fn data_for_write(&mut self) -> &mut PointCloud {
        self.free_derived_caches();
        Arc::make_mut(&mut self.data)
    }

    pub fn pipeline(&self) -> &EvaluationPipeline {
        &self.pipeline
    }

    pub fn pipeline_mut(&mut self) -> &mut EvaluationPipeline {
        &mut self.pipeline
    }

    /// Re-evaluate the modifier stack and store the result
    pub fn data_update(&mut self, mode: EvalMode) {
        self.free_derived_caches();
        let result = self.pipeline.evaluate(&self.data, mode);
        debug!(
            "evaluated object {}: {} points, owned: {}",
            self.name,
            result.pointcloud.point_count(),
            result.is_owned
        );
        self.runtime.evaluated = Some(result);
    }

    /// [`Object::data_update`] with the pipeline's configured mode
    pub fn data_update_default(&mut self) {
        let mode = self.pipeline.default_mode();
        self.data_update(mode);
    }

    pub fn evaluated_pointcloud(&self) -> Option<&Arc<PointCloud>> {
        self.runtime.evaluated.as_ref().map(|result| &result.pointcloud)
    }

    pub fn evaluated_geometry_set(&self) -> Option<&GeometrySet> {
        self.runtime.evaluated.as_ref().map(|result| &result.geometry_set)
    }

    pub fn is_evaluated_owned(&self) -> bool {
        self.runtime.evaluated.as_ref().map_or(false, |result| result.is_owned)
    }

    pub fn free_derived_caches(&mut self) {
        self.runtime.evaluated = None;
    }

    /// Radius-padded bounds of the evaluated data, or the original data
    /// when not evaluated
    pub fn bounds(&self) -> Option<Bounds> {
        self.evaluated_pointcloud()
            .unwrap_or(&self.data)
            .bounds_min_max(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modifier::{FnModifier, ModifierError};
    use crate::storage::ATTR_RADIUS;
    use crate::test_data::diagonal_pair;
    use glam::Vec3;

    fn init() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn translate(offset: Vec3) -> Box<dyn Modifier> {
        Box::new(FnModifier::new("translate", move |_, geometry| {
            match geometry.pointcloud_for_write() {
                Some(pointcloud) => {
                    for p in pointcloud.positions_for_write() {
                        *p += offset;
                    }
                    Ok(StageOutcome::MutatedInPlace)
                }
                None => Ok(StageOutcome::Unchanged),
            }
        }))
    }

    fn set_radius(radius: f32) -> Box<dyn Modifier> {
        Box::new(FnModifier::new("set_radius", move |_, geometry| {
            let pointcloud = geometry
                .pointcloud_for_write()
                .ok_or_else(|| ModifierError::MissingInput("point cloud".into()))?;
            pointcloud.radius_for_write().fill(radius);
            Ok(StageOutcome::MutatedInPlace)
        }))
    }

    fn failing(write_first: bool) -> Box<dyn Modifier> {
        Box::new(FnModifier::new("failing", move |_, geometry| {
            if write_first {
                if let Some(pointcloud) = geometry.pointcloud_for_write() {
                    pointcloud.positions_for_write().fill(Vec3::splat(100.0));
                }
            }
            Err(ModifierError::Failed("boom".into()))
        }))
    }

    fn discard() -> Box<dyn Modifier> {
        Box::new(FnModifier::new("discard", |_, geometry| {
            geometry.remove_pointcloud();
            Ok(StageOutcome::Replaced)
        }))
    }

    #[test]
    fn test_no_stages_returns_original() {
        init();
        let original = Arc::new(diagonal_pair());
        let mut pipeline = EvaluationPipeline::new();

        let result = pipeline.evaluate(&original, EvalMode::Viewport);

        assert!(!result.is_owned);
        assert!(Arc::ptr_eq(&result.pointcloud, &original));
        assert!(result.geometry_set.component().unwrap().is_shared_with(&original));
    }

    #[test]
    fn test_failed_stage_is_skipped() {
        init();
        let original = Arc::new(diagonal_pair());
        let mut pipeline = EvaluationPipeline::new();
        pipeline.push(translate(Vec3::ONE), ModifierMode::ALL);
        pipeline.push(failing(false), ModifierMode::ALL);
        pipeline.push(set_radius(0.5), ModifierMode::ALL);

        let result = pipeline.evaluate(&original, EvalMode::Viewport);

        assert!(result.is_owned);
        assert_eq!(result.pointcloud.positions(), &[Vec3::ONE, Vec3::splat(2.0)]);
        assert_eq!(result.pointcloud.radius().to_vec(), vec![0.5, 0.5]);
        assert_eq!(pipeline.errors(), vec![(1, "boom")]);
        // The original is untouched
        assert_eq!(original.positions(), &[Vec3::ZERO, Vec3::ONE]);
        assert!(!original.attributes().contains(ATTR_RADIUS));
    }

    #[test]
    fn test_failed_stage_on_read_only_geometry_is_rolled_back() {
        init();
        let original = Arc::new(diagonal_pair());
        let mut pipeline = EvaluationPipeline::new();
        pipeline.push(failing(true), ModifierMode::ALL);

        let result = pipeline.evaluate(&original, EvalMode::Viewport);

        assert!(!result.is_owned);
        assert!(Arc::ptr_eq(&result.pointcloud, &original));
        assert_eq!(pipeline.errors().len(), 1);
    }

    #[test]
    fn test_failed_stage_on_owned_geometry_is_rolled_back() {
        init();
        let original = Arc::new(diagonal_pair());
        let mut pipeline = EvaluationPipeline::new();
        pipeline.push(translate(Vec3::ONE), ModifierMode::ALL);
        pipeline.push(failing(true), ModifierMode::ALL);
        pipeline.push(set_radius(0.5), ModifierMode::ALL);

        let result = pipeline.evaluate(&original, EvalMode::Viewport);

        assert!(result.is_owned);
        assert_eq!(result.pointcloud.positions(), &[Vec3::ONE, Vec3::splat(2.0)]);
        assert_eq!(result.pointcloud.radius().to_vec(), vec![0.5, 0.5]);
        assert_eq!(pipeline.errors(), vec![(1, "boom")]);
        assert_eq!(original.positions(), &[Vec3::ZERO, Vec3::ONE]);
    }

    #[test]
    fn test_failed_stage_cannot_discard_owned_geometry() {
        init();
        let original = Arc::new(diagonal_pair());
        let mut pipeline = EvaluationPipeline::new();
        pipeline.push(translate(Vec3::ONE), ModifierMode::ALL);
        pipeline.push(
            Box::new(FnModifier::new("discard_then_fail", |_, geometry| {
                geometry.remove_pointcloud();
                Err(ModifierError::Failed("gone".into()))
            })),
            ModifierMode::ALL,
        );

        let result = pipeline.evaluate(&original, EvalMode::Viewport);

        assert!(result.is_owned);
        assert!(result.geometry_set.has_pointcloud());
        assert_eq!(result.pointcloud.positions(), &[Vec3::ONE, Vec3::splat(2.0)]);
    }

    #[test]
    fn test_errors_cleared_on_next_run() {
        init();
        let original = Arc::new(diagonal_pair());
        let mut pipeline = EvaluationPipeline::new();
        pipeline.push(failing(false), ModifierMode::REALTIME);

        pipeline.evaluate(&original, EvalMode::Viewport);
        assert_eq!(pipeline.errors().len(), 1);

        // Still reported until the next run starts
        assert_eq!(pipeline.slots()[0].error(), Some("boom"));

        pipeline.evaluate(&original, EvalMode::Render);
        assert!(pipeline.errors().is_empty());
    }

    #[test]
    fn test_discarded_payload_gives_empty_owned_result() {
        init();
        let original = Arc::new(diagonal_pair());
        let mut pipeline = EvaluationPipeline::new();
        pipeline.push(discard(), ModifierMode::ALL);
        pipeline.push(translate(Vec3::ONE), ModifierMode::ALL);

        let result = pipeline.evaluate(&original, EvalMode::Render);

        assert!(result.is_owned);
        assert_eq!(result.pointcloud.point_count(), 0);
        assert!(result.pointcloud.attributes().contains(crate::storage::ATTR_POSITION));
        assert!(!result.geometry_set.has_pointcloud());
    }

    #[test]
    fn test_disabled_stage_not_run() {
        init();
        let original = Arc::new(diagonal_pair());
        let mut pipeline = EvaluationPipeline::new();
        pipeline.push(translate(Vec3::ONE), ModifierMode::RENDER);

        let result = pipeline.evaluate(&original, EvalMode::Viewport);
        assert!(!result.is_owned);
        assert!(pipeline.slots()[0].last_eval_time().is_none());

        let result = pipeline.evaluate(&original, EvalMode::Render);
        assert!(result.is_owned);
        assert!(pipeline.slots()[0].last_eval_time().is_some());
    }

    #[test]
    fn test_replacing_with_a_new_cloud() {
        init();
        let original = Arc::new(diagonal_pair());
        let mut pipeline = EvaluationPipeline::new();
        pipeline.push(
            Box::new(FnModifier::new("replace", |_, geometry| {
                geometry.replace_pointcloud(PointCloud::with_point_count(7));
                Ok(StageOutcome::Replaced)
            })),
            ModifierMode::ALL,
        );

        let result = pipeline.evaluate(&original, EvalMode::Viewport);

        assert!(result.is_owned);
        assert_eq!(result.pointcloud.point_count(), 7);
        assert_eq!(result.geometry_set.ownership(), Some(GeometryOwnership::ReadOnly));
        assert!(result.geometry_set.component().unwrap().is_shared_with(&result.pointcloud));
    }

    #[test]
    fn test_object_data_update() {
        init();
        let mut object = Object::new("points", diagonal_pair());
        assert!(object.evaluated_pointcloud().is_none());
        assert!(!object.is_evaluated_owned());

        object.data_update(EvalMode::Viewport);
        assert!(!object.is_evaluated_owned());
        assert!(Arc::ptr_eq(object.evaluated_pointcloud().unwrap(), object.data()));

        object.pipeline_mut().push(translate(Vec3::ONE), ModifierMode::ALL);
        object.data_update(EvalMode::Viewport);

        let evaluated = object.evaluated_pointcloud().unwrap();
        assert!(object.is_evaluated_owned());
        assert_eq!(evaluated.positions()[0], Vec3::ONE);
        let geometry = object.evaluated_geometry_set().unwrap();
        assert!(geometry.component().unwrap().is_shared_with(evaluated));

        let bounds = object.bounds().unwrap();
        assert!((bounds.max - Vec3::splat(2.01)).abs().max_element() < 1e-6);

        object.free_derived_caches();
        assert!(object.evaluated_geometry_set().is_none());
    }

    #[test]
    fn test_object_data_for_write_drops_evaluated_data() {
        let mut object = Object::new("points", diagonal_pair());
        object.data_update(EvalMode::Viewport);

        object.data_for_write().positions_for_write()[0] = Vec3::splat(-1.0);

        assert!(object.evaluated_pointcloud().is_none());
        assert_eq!(object.data().positions()[0], Vec3::splat(-1.0));
    }

    #[test]
    fn test_config_driven_pipeline() {
        init();
        let config = crate::config::Config::from_toml_str(
            "[pointcloud]\ndefault_point_count = 16\n\n\
             [evaluation]\nmode = \"render\"\nlog_stage_timings = true\n",
        )
        .unwrap();

        let mut object = Object::new_default("random", &config.pointcloud);
        *object.pipeline_mut() = EvaluationPipeline::from_config(&config.evaluation);
        object.pipeline_mut().push(set_radius(0.2), ModifierMode::RENDER);
        object.data_update_default();

        let evaluated = object.evaluated_pointcloud().unwrap();
        assert_eq!(evaluated.point_count(), 16);
        assert!(evaluated.radius().iter().all(|r| r == 0.2));
        assert!(object.pipeline().slots()[0].last_eval_time().is_some());
    }
}
