//! # Virtual Arrays
//!
//! An array-like view that is either backed by real storage or reads the
//! same value at every index without allocating.

use crate::attribute_type::AttributeValue;

/// Read-only per-element view over real or virtual data
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VArray<'a, T: AttributeValue> {
    /// Backed by a materialized layer
    Span(&'a [T]),
    /// `len` copies of `value`
    Single { value: T, len: usize },
}

impl<'a, T: AttributeValue> VArray<'a, T> {
    #[inline]
    pub fn for_span(span: &'a [T]) -> Self {
        VArray::Span(span)
    }

    #[inline]
    pub fn for_single(value: T, len: usize) -> Self {
        VArray::Single { value, len }
    }

    #[inline]
    pub fn len(&self) -> usize {
        match self {
            VArray::Span(span) => span.len(),
            VArray::Single { len, .. } => *len,
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Element at `index`, `None` when out of range
    #[inline]
    pub fn get(&self, index: usize) -> Option<T> {
        match self {
            VArray::Span(span) => span.get(index).copied(),
            VArray::Single { value, len } => (index < *len).then_some(*value),
        }
    }

    /// The repeated value when this view is virtual
    #[inline]
    pub fn get_if_single(&self) -> Option<T> {
        match self {
            VArray::Single { value, .. } => Some(*value),
            VArray::Span(_) => None,
        }
    }

    /// The backing slice when this view is materialized
    #[inline]
    pub fn get_internal_span(&self) -> Option<&'a [T]> {
        match self {
            VArray::Span(span) => Some(span),
            VArray::Single { .. } => None,
        }
    }

    #[inline]
    pub fn is_span(&self) -> bool {
        matches!(self, VArray::Span(_))
    }

    pub fn iter(&self) -> VArrayIter<'a, T> {
        VArrayIter {
            varray: *self,
            index: 0,
        }
    }

    /// Materialize into an owned vector
    pub fn to_vec(&self) -> Vec<T> {
        match self {
            VArray::Span(span) => span.to_vec(),
            VArray::Single { value, len } => vec![*value; *len],
        }
    }
}

/// Iterator over a [`VArray`]
#[derive(Debug, Clone)]
pub struct VArrayIter<'a, T: AttributeValue> {
    varray: VArray<'a, T>,
    index: usize,
}

impl<'a, T: AttributeValue> Iterator for VArrayIter<'a, T> {
    type Item = T;

    #[inline]
    fn next(&mut self) -> Option<T> {
        let item = self.varray.get(self.index)?;
        self.index += 1;
        Some(item)
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.varray.len().saturating_sub(self.index);
        (remaining, Some(remaining))
    }
}

impl<'a, T: AttributeValue> ExactSizeIterator for VArrayIter<'a, T> {}
