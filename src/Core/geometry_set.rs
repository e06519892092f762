//! # GeometrySet
//!
//! Container handed from stage to stage during evaluation. The point cloud
//! payload is either a read-only reference to someone else's data or a value
//! owned by the set; only the owned form can be mutated.
//!
//! An owned payload is still held behind an `Arc`, so cloning a set is cheap.
//! Writing to an owned payload that another set also holds copies it first.

use std::sync::Arc;

use log::debug;

use crate::pointcloud::PointCloud;

/// Whether a component may be edited in place
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GeometryOwnership {
    /// Shared, never mutated through this component
    ReadOnly,
    /// Owned by the component, mutated copy-on-write
    Owned,
}

/// Point cloud payload with its ownership state
#[derive(Debug, Clone)]
pub enum PointCloudComponent {
    ReadOnly(Arc<PointCloud>),
    Owned(Arc<PointCloud>),
}

impl PointCloudComponent {
    #[inline]
    pub fn ownership(&self) -> GeometryOwnership {
        match self {
            PointCloudComponent::ReadOnly(_) => GeometryOwnership::ReadOnly,
            PointCloudComponent::Owned(_) => GeometryOwnership::Owned,
        }
    }

    #[inline]
    pub fn get(&self) -> &PointCloud {
        match self {
            PointCloudComponent::ReadOnly(pointcloud) => pointcloud,
            PointCloudComponent::Owned(pointcloud) => pointcloud,
        }
    }

    /// Mutable payload; a read-only payload, or an owned one held elsewhere
    /// too, is copied first
    pub fn get_for_write(&mut self) -> &mut PointCloud {
        if let PointCloudComponent::ReadOnly(shared) = self {
            debug!(
                "copying read-only point cloud ({} points) for write",
                shared.point_count()
            );
            *self = PointCloudComponent::Owned(Arc::new(PointCloud::clone(shared)));
        }
        match self {
            PointCloudComponent::Owned(pointcloud) => {
                if Arc::strong_count(pointcloud) > 1 {
                    debug!(
                        "copying shared owned point cloud ({} points) for write",
                        pointcloud.point_count()
                    );
                }
                Arc::make_mut(pointcloud)
            }
            PointCloudComponent::ReadOnly(_) => {
                unreachable!("read-only component was just replaced")
            }
        }
    }

    /// Whether the payload is the given shared point cloud
    pub fn is_shared_with(&self, other: &Arc<PointCloud>) -> bool {
        match self {
            PointCloudComponent::ReadOnly(pointcloud) => Arc::ptr_eq(pointcloud, other),
            PointCloudComponent::Owned(_) => false,
        }
    }

    /// Convert into a shared handle without copying
    pub fn into_shared(self) -> Arc<PointCloud> {
        match self {
            PointCloudComponent::ReadOnly(pointcloud) => pointcloud,
            PointCloudComponent::Owned(pointcloud) => pointcloud,
        }
    }
}

/// Geometry container with an optional point cloud component
#[derive(Debug, Clone, Default)]
pub struct GeometrySet {
    pointcloud: Option<PointCloudComponent>,
}

impl GeometrySet {
    /// A set without any component
    pub fn empty() -> Self {
        Self::default()
    }

    /// Wrap a shared point cloud
    ///
    /// With [`GeometryOwnership::Owned`] the set edits the value in place
    /// when it holds the only handle and copies it on first write otherwise.
    pub fn from_pointcloud(pointcloud: Arc<PointCloud>, ownership: GeometryOwnership) -> Self {
        let component = match ownership {
            GeometryOwnership::ReadOnly => PointCloudComponent::ReadOnly(pointcloud),
            GeometryOwnership::Owned => PointCloudComponent::Owned(pointcloud),
        };
        Self {
            pointcloud: Some(component),
        }
    }

    pub fn from_owned(pointcloud: PointCloud) -> Self {
        Self {
            pointcloud: Some(PointCloudComponent::Owned(Arc::new(pointcloud))),
        }
    }

    #[inline]
    pub fn has_pointcloud(&self) -> bool {
        self.pointcloud.is_some()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pointcloud.is_none()
    }

    pub fn pointcloud(&self) -> Option<&PointCloud> {
        self.pointcloud.as_ref().map(PointCloudComponent::get)
    }

    pub fn component(&self) -> Option<&PointCloudComponent> {
        self.pointcloud.as_ref()
    }

    /// Ownership of the point cloud component, if any
    pub fn ownership(&self) -> Option<GeometryOwnership> {
        self.pointcloud.as_ref().map(PointCloudComponent::ownership)
    }

    /// Mutable point cloud, copying a read-only payload first
    pub fn pointcloud_for_write(&mut self) -> Option<&mut PointCloud> {
        self.pointcloud.as_mut().map(PointCloudComponent::get_for_write)
    }

    /// Replace the payload with an owned point cloud
    pub fn replace_pointcloud(&mut self, pointcloud: PointCloud) {
        self.pointcloud = Some(PointCloudComponent::Owned(Arc::new(pointcloud)));
    }

    pub fn replace_component(&mut self, component: PointCloudComponent) {
        self.pointcloud = Some(component);
    }

    pub fn remove_pointcloud(&mut self) -> Option<PointCloudComponent> {
        self.pointcloud.take()
    }

    /// Move the payload out, leaving a read-only reference to it behind
    ///
    /// Returns the payload together with the ownership it had in the set, or
    /// `None` when the set holds no point cloud.
    pub fn take_pointcloud_ownership(&mut self) -> Option<(Arc<PointCloud>, GeometryOwnership)> {
        let component = self.pointcloud.take()?;
        let ownership = component.ownership();
        let shared = component.into_shared();
        self.pointcloud = Some(PointCloudComponent::ReadOnly(Arc::clone(&shared)));
        Some((shared, ownership))
    }
}
