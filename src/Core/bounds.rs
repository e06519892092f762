//! # Bounds
//!
//! Axis-aligned bounding boxes and the scan-reductions used to compute them.

use glam::Vec3;

use crate::attribute_type::AttributeValue;
use crate::varray::VArray;

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min: Vec3,
    pub max: Vec3,
}

impl Bounds {
    #[inline]
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Degenerate box around a single point
    #[inline]
    pub fn from_point(p: Vec3) -> Self {
        Self { min: p, max: p }
    }

    /// Grow uniformly by `amount` on every side
    #[inline]
    pub fn pad(&mut self, amount: f32) {
        self.min -= Vec3::splat(amount);
        self.max += Vec3::splat(amount);
    }

    #[inline]
    pub fn padded(mut self, amount: f32) -> Self {
        self.pad(amount);
        self
    }

    #[inline]
    pub fn merge(&self, other: &Bounds) -> Bounds {
        Bounds {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    #[inline]
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    #[inline]
    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    #[inline]
    pub fn contains(&self, p: Vec3) -> bool {
        p.cmpge(self.min).all() && p.cmple(self.max).all()
    }
}

/// Bounding box of a point set, `None` when empty
pub fn min_max(points: &[Vec3]) -> Option<Bounds> {
    let (&first, rest) = points.split_first()?;
    let mut bounds = Bounds::from_point(first);
    for &p in rest {
        bounds.min = bounds.min.min(p);
        bounds.max = bounds.max.max(p);
    }
    Some(bounds)
}

/// Bounding box where each point is expanded by its own radius
///
/// `radii` must have the same length as `points`.
pub fn min_max_with_radii(points: &[Vec3], radii: &[f32]) -> Option<Bounds> {
    debug_assert_eq!(points.len(), radii.len());
    let mut iter = points.iter().zip(radii);
    let (&p, &r) = iter.next()?;
    let mut bounds = Bounds::new(p - Vec3::splat(r), p + Vec3::splat(r));
    for (&p, &r) in iter {
        bounds.min = bounds.min.min(p - Vec3::splat(r));
        bounds.max = bounds.max.max(p + Vec3::splat(r));
    }
    Some(bounds)
}

/// Largest element, `None` when empty
pub fn max<T: AttributeValue + Ord>(values: VArray<'_, T>) -> Option<T> {
    if values.is_empty() {
        return None;
    }
    match values.get_if_single() {
        Some(value) => Some(value),
        None => values.iter().max(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_min_max() {
        let points = [
            glam::vec3(0.0, 0.0, 0.0),
            glam::vec3(1.0, 2.0, 3.0),
            glam::vec3(-1.0, 5.0, -2.0),
        ];

        let bounds = min_max(&points).unwrap();

        assert_eq!(bounds.min, glam::vec3(-1.0, 0.0, -2.0));
        assert_eq!(bounds.max, glam::vec3(1.0, 5.0, 3.0));
        assert!(min_max(&[]).is_none());
    }

    #[test]
    fn test_min_max_with_radii() {
        let points = [glam::vec3(0.0, 0.0, 0.0), glam::vec3(1.0, 1.0, 1.0)];
        let radii = [5.0, 0.0];

        let bounds = min_max_with_radii(&points, &radii).unwrap();

        // The first point's radius dominates on both sides
        assert_eq!(bounds.min, Vec3::splat(-5.0));
        assert_eq!(bounds.max, Vec3::splat(5.0));
    }

    #[test]
    fn test_pad_and_contains() {
        let bounds = Bounds::new(Vec3::ZERO, Vec3::ONE).padded(0.5);
        assert_eq!(bounds.min, Vec3::splat(-0.5));
        assert_eq!(bounds.size(), Vec3::splat(2.0));
        assert!(bounds.contains(Vec3::splat(1.25)));
        assert!(!bounds.contains(Vec3::splat(1.75)));
    }

    #[test]
    fn test_max() {
        let values = [3, 9, -1];
        assert_eq!(max(VArray::for_span(&values[..])), Some(9));
        assert_eq!(max(VArray::for_single(4, 10)), Some(4));
        assert_eq!(max(VArray::<i32>::for_single(4, 0)), None);
    }
}
