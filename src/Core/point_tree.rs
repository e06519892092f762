//! # Point Tree
//!
//! KD-Tree over point positions, built lazily by the point cloud and handed
//! out as an opaque shared handle.
//!
//! kiddo cannot split a bucket whose points all share one coordinate on the
//! split axis. Positions are therefore inserted under a fixed rotation (so an
//! axis-aligned plane of points is not axis-aligned in the tree) and exact
//! duplicates are stored once, with all their point indices kept in a group.

use std::collections::HashMap;
use std::fmt;

use glam::{Mat3, Quat, Vec3};
use kiddo::float::kdtree::KdTree;
use kiddo::SquaredEuclidean;

const BUCKET_SIZE: usize = 256;

type Tree = KdTree<f32, u64, 3, BUCKET_SIZE, u32>;

fn tree_rotation() -> Mat3 {
    Mat3::from_quat(Quat::from_axis_angle(Vec3::new(1.0, 2.0, 3.0).normalize(), 0.7))
}

/// Spatial acceleration structure over a fixed set of positions
pub struct PointTree {
    tree: Tree,
    rotation: Mat3,
    /// Point indices of unique position `g` are
    /// `group_items[group_offsets[g]..group_offsets[g + 1]]`
    group_offsets: Vec<usize>,
    group_items: Vec<usize>,
}

impl PointTree {
    /// Build the tree from positions; items are point indices
    pub fn build(positions: &[Vec3]) -> Self {
        let rotation = tree_rotation();

        // Map every point to the id of its unique position
        let mut unique: HashMap<[u32; 3], usize> = HashMap::new();
        let mut unique_positions = Vec::new();
        let mut group_of = Vec::with_capacity(positions.len());
        for p in positions {
            // +0.0 folds -0.0 into 0.0
            let key = (*p + Vec3::ZERO).to_array().map(f32::to_bits);
            let group = *unique.entry(key).or_insert_with(|| {
                unique_positions.push(*p);
                unique_positions.len() - 1
            });
            group_of.push(group);
        }

        let mut group_offsets = vec![0usize; unique_positions.len() + 1];
        for &group in &group_of {
            group_offsets[group + 1] += 1;
        }
        for g in 0..unique_positions.len() {
            group_offsets[g + 1] += group_offsets[g];
        }
        let mut cursor = group_offsets.clone();
        let mut group_items = vec![0usize; positions.len()];
        for (idx, &group) in group_of.iter().enumerate() {
            group_items[cursor[group]] = idx;
            cursor[group] += 1;
        }

        let mut tree = Tree::new();
        for (group, p) in unique_positions.iter().enumerate() {
            tree.add(&(rotation * *p).to_array(), group as u64);
        }

        Self {
            tree,
            rotation,
            group_offsets,
            group_items,
        }
    }

    /// Number of indexed points, duplicates included
    #[inline]
    pub fn len(&self) -> usize {
        self.group_items.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.group_items.is_empty()
    }

    fn group(&self, group: u64) -> &[usize] {
        let group = group as usize;
        &self.group_items[self.group_offsets[group]..self.group_offsets[group + 1]]
    }

    /// Closest point as `(index, distance)`; the lowest index among
    /// coincident points
    pub fn nearest(&self, query: Vec3) -> Option<(usize, f32)> {
        if self.is_empty() {
            return None;
        }
        let query = (self.rotation * query).to_array();
        self.tree
            .nearest_n::<SquaredEuclidean>(&query, 1)
            .into_iter()
            .next()
            .and_then(|r| self.group(r.item).first().map(|&idx| (idx, r.distance.sqrt())))
    }

    /// Indices of all points within `radius` of `query`, closest first
    pub fn within_radius(&self, query: Vec3, radius: f32) -> Vec<usize> {
        if self.is_empty() {
            return Vec::new();
        }
        let query = (self.rotation * query).to_array();
        self.tree
            .within::<SquaredEuclidean>(&query, radius * radius)
            .into_iter()
            .flat_map(|r| self.group(r.item).iter().copied())
            .collect()
    }
}

impl fmt::Debug for PointTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PointTree")
            .field("len", &self.len())
            .field("unique", &(self.group_offsets.len() - 1))
            .finish()
    }
}
