//! # Attribute Types
//!
//! Closed set of element types a point attribute can hold, and the typed
//! storage behind each one. Erased data only becomes a typed slice through
//! [`AttributeValue`], which checks the type tag first.

use glam::{Vec2, Vec3, Vec4};
use std::fmt;

/// Element type of an attribute layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeType {
    Float,
    Float2,
    Float3,
    Float4,
    Int8,
    Int32,
    Bool,
}

impl AttributeType {
    /// All supported types, in tag order
    pub const ALL: [AttributeType; 7] = [
        AttributeType::Float,
        AttributeType::Float2,
        AttributeType::Float3,
        AttributeType::Float4,
        AttributeType::Int8,
        AttributeType::Int32,
        AttributeType::Bool,
    ];

    /// Size of one element in bytes
    #[inline]
    pub fn size_in_bytes(self) -> usize {
        match self {
            AttributeType::Float => 4,
            AttributeType::Float2 => 8,
            AttributeType::Float3 => 12,
            AttributeType::Float4 => 16,
            AttributeType::Int8 => 1,
            AttributeType::Int32 => 4,
            AttributeType::Bool => 1,
        }
    }

    /// Stable tag used by the binary container
    #[inline]
    pub fn tag(self) -> u8 {
        match self {
            AttributeType::Float => 0,
            AttributeType::Float2 => 1,
            AttributeType::Float3 => 2,
            AttributeType::Float4 => 3,
            AttributeType::Int8 => 4,
            AttributeType::Int32 => 5,
            AttributeType::Bool => 6,
        }
    }

    /// Inverse of [`AttributeType::tag`]
    pub fn from_tag(tag: u8) -> Option<Self> {
        Self::ALL.get(tag as usize).copied()
    }

    pub fn name(self) -> &'static str {
        match self {
            AttributeType::Float => "float",
            AttributeType::Float2 => "float2",
            AttributeType::Float3 => "float3",
            AttributeType::Float4 => "float4",
            AttributeType::Int8 => "int8",
            AttributeType::Int32 => "int32",
            AttributeType::Bool => "bool",
        }
    }
}

impl fmt::Display for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Dense typed array backing one attribute layer
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeData {
    Float(Vec<f32>),
    Float2(Vec<Vec2>),
    Float3(Vec<Vec3>),
    Float4(Vec<Vec4>),
    Int8(Vec<i8>),
    Int32(Vec<i32>),
    Bool(Vec<bool>),
}

impl AttributeData {
    /// Create `len` elements of the type's default value
    pub fn new_filled(data_type: AttributeType, len: usize) -> Self {
        match data_type {
            AttributeType::Float => AttributeData::Float(vec![0.0; len]),
            AttributeType::Float2 => AttributeData::Float2(vec![Vec2::ZERO; len]),
            AttributeType::Float3 => AttributeData::Float3(vec![Vec3::ZERO; len]),
            AttributeType::Float4 => AttributeData::Float4(vec![Vec4::ZERO; len]),
            AttributeType::Int8 => AttributeData::Int8(vec![0; len]),
            AttributeType::Int32 => AttributeData::Int32(vec![0; len]),
            AttributeType::Bool => AttributeData::Bool(vec![false; len]),
        }
    }

    pub fn data_type(&self) -> AttributeType {
        match self {
            AttributeData::Float(_) => AttributeType::Float,
            AttributeData::Float2(_) => AttributeType::Float2,
            AttributeData::Float3(_) => AttributeType::Float3,
            AttributeData::Float4(_) => AttributeType::Float4,
            AttributeData::Int8(_) => AttributeType::Int8,
            AttributeData::Int32(_) => AttributeType::Int32,
            AttributeData::Bool(_) => AttributeType::Bool,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            AttributeData::Float(v) => v.len(),
            AttributeData::Float2(v) => v.len(),
            AttributeData::Float3(v) => v.len(),
            AttributeData::Float4(v) => v.len(),
            AttributeData::Int8(v) => v.len(),
            AttributeData::Int32(v) => v.len(),
            AttributeData::Bool(v) => v.len(),
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Resize in place; new elements take the type's default value
    pub fn resize(&mut self, len: usize) {
        match self {
            AttributeData::Float(v) => v.resize(len, 0.0),
            AttributeData::Float2(v) => v.resize(len, Vec2::ZERO),
            AttributeData::Float3(v) => v.resize(len, Vec3::ZERO),
            AttributeData::Float4(v) => v.resize(len, Vec4::ZERO),
            AttributeData::Int8(v) => v.resize(len, 0),
            AttributeData::Int32(v) => v.resize(len, 0),
            AttributeData::Bool(v) => v.resize(len, false),
        }
    }

    /// Bytes occupied by the elements (capacity slack is not counted)
    #[inline]
    pub fn size_in_bytes(&self) -> usize {
        self.len() * self.data_type().size_in_bytes()
    }
}

/// Rust element types that can live in an [`AttributeData`]
pub trait AttributeValue: 'static + Copy + PartialEq + Default + fmt::Debug {
    const TYPE: AttributeType;

    fn wrap(values: Vec<Self>) -> AttributeData;

    fn as_slice(data: &AttributeData) -> Option<&[Self]>;

    fn as_mut_slice(data: &mut AttributeData) -> Option<&mut [Self]>;
}

macro_rules! impl_attribute_value {
    ($ty:ty, $variant:ident) => {
        impl AttributeValue for $ty {
            const TYPE: AttributeType = AttributeType::$variant;

            #[inline]
            fn wrap(values: Vec<Self>) -> AttributeData {
                AttributeData::$variant(values)
            }

            #[inline]
            fn as_slice(data: &AttributeData) -> Option<&[Self]> {
                match data {
                    AttributeData::$variant(v) => Some(v.as_slice()),
                    _ => None,
                }
            }

            #[inline]
            fn as_mut_slice(data: &mut AttributeData) -> Option<&mut [Self]> {
                match data {
                    AttributeData::$variant(v) => Some(v.as_mut_slice()),
                    _ => None,
                }
            }
        }
    };
}

impl_attribute_value!(f32, Float);
impl_attribute_value!(Vec2, Float2);
impl_attribute_value!(Vec3, Float3);
impl_attribute_value!(Vec4, Float4);
impl_attribute_value!(i8, Int8);
impl_attribute_value!(i32, Int32);
impl_attribute_value!(bool, Bool);
