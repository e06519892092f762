//! # Modifier
//!
//! A modifier is one opaque stage of the evaluation pipeline. It receives the
//! in-flight [`GeometrySet`] and either leaves it alone, edits the point cloud
//! through [`GeometrySet::pointcloud_for_write`] (which copies a read-only
//! payload first) or installs a new payload.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::geometry_set::GeometrySet;
use crate::storage::AttributeError;

/// What kind of evaluation is running
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvalMode {
    /// Interactive evaluation
    #[default]
    Viewport,
    /// Final render
    Render,
}

/// Evaluation modes a modifier is enabled for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModifierMode(u32);

impl ModifierMode {
    pub const NONE: ModifierMode = ModifierMode(0);
    pub const REALTIME: ModifierMode = ModifierMode(1 << 0);
    pub const RENDER: ModifierMode = ModifierMode(1 << 1);
    pub const ALL: ModifierMode = ModifierMode(Self::REALTIME.0 | Self::RENDER.0);

    /// Flag required to run under `mode`
    pub fn required_for(mode: EvalMode) -> Self {
        match mode {
            EvalMode::Viewport => Self::REALTIME,
            EvalMode::Render => Self::RENDER,
        }
    }

    #[inline]
    pub fn bits(&self) -> u32 {
        self.0
    }

    #[inline]
    pub fn contains(&self, other: ModifierMode) -> bool {
        (self.0 & other.0) == other.0
    }

    #[inline]
    pub fn insert(&mut self, other: ModifierMode) {
        self.0 |= other.0;
    }

    #[inline]
    pub fn remove(&mut self, other: ModifierMode) {
        self.0 &= !other.0;
    }
}

impl Default for ModifierMode {
    fn default() -> Self {
        Self::ALL
    }
}

impl std::ops::BitOr for ModifierMode {
    type Output = ModifierMode;

    fn bitor(self, rhs: ModifierMode) -> ModifierMode {
        ModifierMode(self.0 | rhs.0)
    }
}

/// Per-run settings passed to every modifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModifierEvalContext {
    pub mode: EvalMode,
    /// Modifiers may reuse their own caches (interactive runs only)
    pub use_cache: bool,
}

impl ModifierEvalContext {
    pub fn new(mode: EvalMode) -> Self {
        Self {
            mode,
            use_cache: mode == EvalMode::Viewport,
        }
    }
}

/// Modifier failure; isolated to the failing stage
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModifierError {
    #[error("missing input: {0}")]
    MissingInput(String),
    #[error("invalid settings: {0}")]
    InvalidSettings(String),
    #[error(transparent)]
    Attribute(#[from] AttributeError),
    #[error("{0}")]
    Failed(String),
}

/// What a stage did to the geometry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageOutcome {
    /// Geometry passed through untouched
    Unchanged,
    /// The point cloud was edited through `pointcloud_for_write`
    MutatedInPlace,
    /// A new payload was installed (or the payload was removed)
    Replaced,
}

/// One stage of the evaluation pipeline
///
/// When a stage returns an error the pipeline restores the geometry it had
/// before the stage ran, whatever the stage wrote in the meantime.
pub trait Modifier: Send {
    fn name(&self) -> &str;

    fn modify_geometry_set(
        &mut self,
        ctx: &ModifierEvalContext,
        geometry: &mut GeometrySet,
    ) -> Result<StageOutcome, ModifierError>;
}

type StageResult = Result<StageOutcome, ModifierError>;
type StageFn = dyn FnMut(&ModifierEvalContext, &mut GeometrySet) -> StageResult + Send;

/// Modifier backed by a closure
pub struct FnModifier {
    name: String,
    func: Box<StageFn>,
}

impl FnModifier {
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: FnMut(&ModifierEvalContext, &mut GeometrySet) -> StageResult + Send + 'static,
    {
        Self {
            name: name.into(),
            func: Box::new(func),
        }
    }
}

impl Modifier for FnModifier {
    fn name(&self) -> &str {
        &self.name
    }

    fn modify_geometry_set(
        &mut self,
        ctx: &ModifierEvalContext,
        geometry: &mut GeometrySet,
    ) -> Result<StageOutcome, ModifierError> {
        (self.func)(ctx, geometry)
    }
}

impl fmt::Debug for FnModifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnModifier").field("name", &self.name).finish()
    }
}

/// A modifier in a pipeline with its enable flags and last-run state
pub struct ModifierSlot {
    modifier: Box<dyn Modifier>,
    mode: ModifierMode,
    error: Option<String>,
    last_eval_time: Option<Duration>,
}

impl ModifierSlot {
    pub fn new(modifier: Box<dyn Modifier>, mode: ModifierMode) -> Self {
        Self {
            modifier,
            mode,
            error: None,
            last_eval_time: None,
        }
    }

    pub fn name(&self) -> &str {
        self.modifier.name()
    }

    pub fn mode(&self) -> ModifierMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: ModifierMode) {
        self.mode = mode;
    }

    #[inline]
    pub fn is_enabled(&self, mode: EvalMode) -> bool {
        self.mode.contains(ModifierMode::required_for(mode))
    }

    /// Error message of the last run, if it failed
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn last_eval_time(&self) -> Option<Duration> {
        self.last_eval_time
    }

    pub(crate) fn set_error(&mut self, error: &ModifierError) {
        self.error = Some(error.to_string());
    }

    pub(crate) fn clear_error(&mut self) {
        self.error = None;
    }

    pub(crate) fn set_last_eval_time(&mut self, elapsed: Duration) {
        self.last_eval_time = Some(elapsed);
    }

    pub(crate) fn modifier_mut(&mut self) -> &mut dyn Modifier {
        self.modifier.as_mut()
    }
}

impl fmt::Debug for ModifierSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModifierSlot")
            .field("name", &self.name())
            .field("mode", &self.mode)
            .field("error", &self.error)
            .field("last_eval_time", &self.last_eval_time)
            .finish()
    }
}
