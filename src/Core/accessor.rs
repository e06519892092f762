//! # Attribute Accessors
//!
//! Uniform, type-checked read/write access to an [`AttributeStorage`].
//!
//! - Reads never fail: a missing layer, or one of another type, reads as an
//!   empty slice or as a virtual array of a default value.
//! - Writes go through [`MutableAttributeAccessor`], which notifies an
//!   [`AttributeChangeObserver`] before handing out a mutable slice. This is
//!   the single place where derived caches of the owner get invalidated.

use log::warn;

use crate::attribute_type::{AttributeData, AttributeValue};
use crate::bounds;
use crate::storage::{AttributeError, AttributeStorage, ATTR_POSITION};
use crate::varray::VArray;

/// Highest valid material index
pub const MAXMAT: i32 = 32767;

/// Attributes that always exist and cannot be removed or retyped
const REQUIRED_ATTRIBUTES: [&str; 1] = [ATTR_POSITION];

/// Element domain an attribute lives on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttrDomain {
    Point,
}

/// Receives a notification whenever write access to an attribute is granted
pub trait AttributeChangeObserver {
    fn attribute_changed(&mut self, name: &str);
}

/// Observer that ignores every change
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl AttributeChangeObserver for NoopObserver {
    fn attribute_changed(&mut self, _name: &str) {}
}

/// Names of the attributes that always exist
#[inline]
pub fn required_attribute_names() -> &'static [&'static str] {
    &REQUIRED_ATTRIBUTES
}

/// Check whether `name` is a required attribute
#[inline]
pub fn is_required(name: &str) -> bool {
    REQUIRED_ATTRIBUTES.contains(&name)
}

/// Read-only accessor
#[derive(Debug, Clone, Copy)]
pub struct AttributeAccessor<'a> {
    storage: &'a AttributeStorage,
}

impl<'a> AttributeAccessor<'a> {
    pub fn new(storage: &'a AttributeStorage) -> Self {
        Self { storage }
    }

    /// Number of elements in `domain`
    #[inline]
    pub fn domain_size(&self, domain: AttrDomain) -> usize {
        match domain {
            AttrDomain::Point => self.storage.domain_size(),
        }
    }

    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        self.storage.contains(name)
    }

    /// Whether `name` is one of the required attributes
    #[inline]
    pub fn is_builtin(&self, name: &str) -> bool {
        is_required(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &'a str> + 'a {
        self.storage.names()
    }

    /// Dense read view, empty when absent or stored under another type
    pub fn get_typed_read<T: AttributeValue>(&self, name: &str) -> &'a [T] {
        self.storage
            .lookup(name)
            .and_then(|layer| T::as_slice(layer.data()))
            .unwrap_or(&[])
    }

    /// Materialized layer as a virtual array, `None` when absent
    pub fn lookup<T: AttributeValue>(
        &self,
        name: &str,
        domain: AttrDomain,
    ) -> Option<VArray<'a, T>> {
        let AttrDomain::Point = domain;
        let layer = self.storage.lookup(name)?;
        T::as_slice(layer.data()).map(VArray::for_span)
    }

    /// Real layer when present, otherwise `default` at every element
    pub fn lookup_or_default<T: AttributeValue>(
        &self,
        name: &str,
        domain: AttrDomain,
        default: T,
    ) -> VArray<'a, T> {
        self.lookup(name, domain)
            .unwrap_or_else(|| VArray::for_single(default, self.domain_size(domain)))
    }

    /// Same as [`lookup_or_default`](Self::lookup_or_default) on the point domain
    #[inline]
    pub fn get_typed_read_with_default<T: AttributeValue>(
        &self,
        name: &str,
        default: T,
    ) -> VArray<'a, T> {
        self.lookup_or_default(name, AttrDomain::Point, default)
    }

    /// Maximum of an integer attribute clamped to `[0, MAXMAT]`
    ///
    /// Returns `None` when the domain is empty.
    pub fn max_of_int(&self, name: &str, domain: AttrDomain, default: i32) -> Option<i32> {
        if self.domain_size(domain) == 0 {
            return None;
        }
        bounds::max(self.lookup_or_default(name, domain, default)).map(|max| max.clamp(0, MAXMAT))
    }
}

/// Read/write accessor
pub struct MutableAttributeAccessor<'a> {
    storage: &'a mut AttributeStorage,
    observer: &'a mut dyn AttributeChangeObserver,
}

impl<'a> MutableAttributeAccessor<'a> {
    pub fn new(
        storage: &'a mut AttributeStorage,
        observer: &'a mut dyn AttributeChangeObserver,
    ) -> Self {
        Self { storage, observer }
    }

    /// Read-only view of the same storage
    #[inline]
    pub fn as_read(&self) -> AttributeAccessor<'_> {
        AttributeAccessor::new(self.storage)
    }

    /// Shorter-lived accessor over the same storage and observer
    #[inline]
    pub fn reborrow(&mut self) -> MutableAttributeAccessor<'_> {
        MutableAttributeAccessor {
            storage: &mut *self.storage,
            observer: &mut *self.observer,
        }
    }

    #[inline]
    pub fn domain_size(&self, domain: AttrDomain) -> usize {
        self.as_read().domain_size(domain)
    }

    /// Write access to an existing layer of type `T`
    pub fn lookup_for_write<T: AttributeValue>(
        &mut self,
        name: &str,
        domain: AttrDomain,
    ) -> Option<&mut [T]> {
        self.reborrow().into_lookup_for_write(name, domain)
    }

    /// Consuming form of [`lookup_for_write`](Self::lookup_for_write)
    pub fn into_lookup_for_write<T: AttributeValue>(
        self,
        name: &str,
        domain: AttrDomain,
    ) -> Option<&'a mut [T]> {
        let AttrDomain::Point = domain;
        let MutableAttributeAccessor { storage, observer } = self;
        let matches = storage
            .lookup(name)
            .is_some_and(|layer| layer.data_type() == T::TYPE);
        if !matches {
            return None;
        }
        observer.attribute_changed(name);
        storage
            .lookup_mut(name)
            .and_then(|layer| T::as_mut_slice(layer.data_mut()))
    }

    /// Write access, creating the layer filled with `default` when absent
    ///
    /// With zero elements nothing is allocated and the slice is empty. A
    /// layer that exists under another type is left untouched and an empty
    /// slice is returned.
    pub fn lookup_or_add_for_write<T: AttributeValue>(
        &mut self,
        name: &str,
        domain: AttrDomain,
        default: T,
    ) -> &mut [T] {
        self.reborrow().into_lookup_or_add_for_write(name, domain, default)
    }

    /// Consuming form of [`lookup_or_add_for_write`](Self::lookup_or_add_for_write)
    pub fn into_lookup_or_add_for_write<T: AttributeValue>(
        self,
        name: &str,
        domain: AttrDomain,
        default: T,
    ) -> &'a mut [T] {
        let size = self.domain_size(domain);
        if size == 0 {
            return &mut [];
        }
        let MutableAttributeAccessor { storage, observer } = self;
        match storage.lookup(name).map(|layer| layer.data_type()) {
            Some(existing) if existing != T::TYPE => {
                warn!(
                    "attribute {} is stored as {}, refusing write access as {}",
                    name,
                    existing,
                    T::TYPE
                );
                return &mut [];
            }
            Some(_) => {}
            None => {
                // Filled exactly once, at creation
                if let Err(err) = storage.add(name, T::wrap(vec![default; size])) {
                    warn!("could not add attribute {}: {}", name, err);
                    return &mut [];
                }
            }
        }
        observer.attribute_changed(name);
        storage
            .lookup_mut(name)
            .and_then(|layer| T::as_mut_slice(layer.data_mut()))
            .unwrap_or(&mut [])
    }

    /// Same as [`lookup_or_add_for_write`](Self::lookup_or_add_for_write) on the point domain
    #[inline]
    pub fn get_typed_write<T: AttributeValue>(&mut self, name: &str, default: T) -> &mut [T] {
        self.lookup_or_add_for_write(name, AttrDomain::Point, default)
    }

    /// Add a layer from explicit values
    pub fn add<T: AttributeValue>(
        &mut self,
        name: &str,
        domain: AttrDomain,
        values: Vec<T>,
    ) -> Result<(), AttributeError> {
        self.add_data(name, domain, T::wrap(values))
    }

    /// Add a layer from already erased data
    pub fn add_data(
        &mut self,
        name: &str,
        domain: AttrDomain,
        data: AttributeData,
    ) -> Result<(), AttributeError> {
        let AttrDomain::Point = domain;
        self.storage.add(name, data)?;
        self.observer.attribute_changed(name);
        Ok(())
    }

    /// Remove a layer; required attributes are refused
    pub fn remove(&mut self, name: &str) -> Result<bool, AttributeError> {
        if is_required(name) {
            return Err(AttributeError::Required(name.to_string()));
        }
        let removed = self.storage.remove(name);
        if removed {
            self.observer.attribute_changed(name);
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute_type::AttributeType;
    use crate::storage::{ATTR_MATERIAL_INDEX, ATTR_RADIUS};
    use glam::Vec3;

    #[derive(Default)]
    struct Recorder {
        changed: Vec<String>,
    }

    impl AttributeChangeObserver for Recorder {
        fn attribute_changed(&mut self, name: &str) {
            self.changed.push(name.to_string());
        }
    }

    fn storage_with_positions(n: usize) -> AttributeStorage {
        let mut storage = AttributeStorage::new(n);
        storage
            .add(ATTR_POSITION, AttributeData::new_filled(AttributeType::Float3, n))
            .unwrap();
        storage
    }

    #[test]
    fn test_typed_read_absent_and_wrong_type() {
        let mut storage = storage_with_positions(3);
        storage.add("weight", AttributeData::Float(vec![1.0, 2.0, 3.0])).unwrap();
        let attributes = AttributeAccessor::new(&storage);

        assert_eq!(attributes.get_typed_read::<f32>("weight"), &[1.0, 2.0, 3.0]);
        assert!(attributes.get_typed_read::<f32>("missing").is_empty());
        assert!(attributes.get_typed_read::<i32>("weight").is_empty());
        assert_eq!(attributes.get_typed_read::<Vec3>(ATTR_POSITION).len(), 3);
    }

    #[test]
    fn test_lookup_or_default_is_virtual() {
        let storage = storage_with_positions(4);
        let attributes = AttributeAccessor::new(&storage);

        let radius = attributes.lookup_or_default(ATTR_RADIUS, AttrDomain::Point, 0.01f32);
        assert_eq!(radius.len(), 4);
        assert_eq!(radius.get_if_single(), Some(0.01));
        assert!(!storage.contains(ATTR_RADIUS));
    }

    #[test]
    fn test_write_creates_layer_with_default() {
        let mut storage = storage_with_positions(3);
        let mut recorder = Recorder::default();
        {
            let mut attributes = MutableAttributeAccessor::new(&mut storage, &mut recorder);
            let radius = attributes.get_typed_write::<f32>(ATTR_RADIUS, 0.25);
            assert_eq!(radius, &[0.25, 0.25, 0.25]);
            radius[1] = 2.0;
        }
        assert_eq!(recorder.changed, vec![ATTR_RADIUS.to_string()]);

        // A second acquisition keeps the caller's values
        let mut attributes = MutableAttributeAccessor::new(&mut storage, &mut recorder);
        let radius = attributes.get_typed_write::<f32>(ATTR_RADIUS, 0.25);
        assert_eq!(radius, &[0.25, 2.0, 0.25]);
    }

    #[test]
    fn test_write_on_empty_domain_allocates_nothing() {
        let mut storage = storage_with_positions(0);
        let mut recorder = Recorder::default();
        let mut attributes = MutableAttributeAccessor::new(&mut storage, &mut recorder);

        assert!(attributes.get_typed_write::<f32>(ATTR_RADIUS, 1.0).is_empty());
        assert!(!attributes.as_read().contains(ATTR_RADIUS));
        assert!(recorder.changed.is_empty());
    }

    #[test]
    fn test_write_with_wrong_type_is_refused() {
        let mut storage = storage_with_positions(2);
        let mut observer = NoopObserver;
        let mut attributes = MutableAttributeAccessor::new(&mut storage, &mut observer);

        assert!(attributes.get_typed_write::<f32>(ATTR_POSITION, 0.0).is_empty());
        assert!(attributes.lookup_for_write::<i32>(ATTR_POSITION, AttrDomain::Point).is_none());
        assert_eq!(
            attributes.as_read().get_typed_read::<Vec3>(ATTR_POSITION).len(),
            2
        );
    }

    #[test]
    fn test_required_attributes_cannot_be_removed() {
        let mut storage = storage_with_positions(1);
        let mut observer = NoopObserver;
        let mut attributes = MutableAttributeAccessor::new(&mut storage, &mut observer);

        assert!(required_attribute_names().contains(&ATTR_POSITION));
        assert_eq!(
            attributes.remove(ATTR_POSITION),
            Err(AttributeError::Required(ATTR_POSITION.to_string()))
        );
        attributes.add("tmp", AttrDomain::Point, vec![true]).unwrap();
        assert_eq!(attributes.remove("tmp"), Ok(true));
        assert_eq!(attributes.remove("tmp"), Ok(false));
    }

    #[test]
    fn test_max_of_int() {
        let mut storage = storage_with_positions(3);
        assert_eq!(
            AttributeAccessor::new(&storage).max_of_int(ATTR_MATERIAL_INDEX, AttrDomain::Point, 0),
            Some(0)
        );

        let mut observer = NoopObserver;
        let mut attributes = MutableAttributeAccessor::new(&mut storage, &mut observer);
        attributes.get_typed_write::<i32>(ATTR_MATERIAL_INDEX, 0)[1] = 7;
        assert_eq!(
            attributes.as_read().max_of_int(ATTR_MATERIAL_INDEX, AttrDomain::Point, 0),
            Some(7)
        );

        attributes.get_typed_write::<i32>(ATTR_MATERIAL_INDEX, 0)[1] = 999_999;
        assert_eq!(
            attributes.as_read().max_of_int(ATTR_MATERIAL_INDEX, AttrDomain::Point, 0),
            Some(MAXMAT)
        );

        let empty = storage_with_positions(0);
        assert_eq!(
            AttributeAccessor::new(&empty).max_of_int(ATTR_MATERIAL_INDEX, AttrDomain::Point, 0),
            None
        );
    }
}
