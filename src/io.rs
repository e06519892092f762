//! # Point Cloud IO
//!
//! Little-endian binary container for point clouds.
//!
//! ## Format
//!
//! Header:
//! - 4 bytes: magic `RCPT`
//! - 2 bytes: version (u16)
//!
//! Version 2:
//! - 4 bytes: point count (u32)
//! - 4 bytes: flags (u32)
//! - 4 bytes: material slot count (u32), then per slot a presence byte and
//!   a material id (u32)
//! - 4 bytes: layer count (u32), then per layer:
//!   - 2 bytes name length (u16) + UTF-8 name
//!   - 1 byte type tag
//!   - 4 bytes element count (u32)
//!   - raw values, components as f32 / i8 / i32 / u8
//!
//! Version 1 (legacy):
//! - 4 bytes: point count (u32)
//! - point count x 16 bytes: interleaved `x, y, z, radius` (f32)
//! - 4 bytes: extra layer count (u32), then layers as in version 2

use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use glam::{Vec2, Vec3, Vec4};
use log::debug;
use thiserror::Error;

use crate::attribute_type::{AttributeData, AttributeType};
use crate::pointcloud::{MaterialId, PointCloud, PointCloudFlags};
use crate::storage::{AttributeError, AttributeLayer, AttributeStorage, ATTR_RADIUS};

/// File magic
pub const MAGIC: [u8; 4] = *b"RCPT";
/// Version written by [`write_pointcloud`]
pub const CURRENT_VERSION: u16 = 2;
/// Interleaved position/radius layout
pub const LEGACY_VERSION: u16 = 1;

/// Upper bound for up-front allocations driven by counts read from a file
const MAX_PREALLOC: usize = 1 << 16;

/// Result type for IO operations
pub type IoResult<T> = std::result::Result<T, IoError>;

#[derive(Error, Debug)]
pub enum IoError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("not a point cloud file")]
    BadMagic,
    #[error("unsupported version: {0}")]
    UnsupportedVersion(u16),
    #[error("invalid data: {0}")]
    InvalidData(String),
    #[error("invalid attribute: {0}")]
    Attribute(#[from] AttributeError),
}

/// Everything the writer needs, gathered from a point cloud
#[derive(Debug)]
pub struct PointCloudWriteData<'a> {
    pub point_count: usize,
    pub flags: PointCloudFlags,
    pub materials: &'a [Option<MaterialId>],
    pub layers: Vec<&'a AttributeLayer>,
}

impl<'a> PointCloudWriteData<'a> {
    /// Collect the materialized layers of `pointcloud`, in name order
    pub fn prepare(pointcloud: &'a PointCloud) -> Self {
        let storage = pointcloud.attribute_storage();
        Self {
            point_count: storage.domain_size(),
            flags: pointcloud.flag(),
            materials: pointcloud.materials(),
            layers: storage.iter().collect(),
        }
    }
}

/// Legacy records as read from a version 1 file
#[derive(Debug, Clone, PartialEq)]
pub struct LegacyPointData {
    /// `[x, y, z, radius]` per point
    pub records: Vec<[f32; 4]>,
    pub layers: Vec<AttributeLayer>,
}

/// Split interleaved position/radius records into separate layers
pub fn convert_legacy_layout(legacy: LegacyPointData) -> IoResult<AttributeStorage> {
    let point_count = legacy.records.len();
    let (positions, radii): (Vec<Vec3>, Vec<f32>) = legacy
        .records
        .iter()
        .map(|r| (Vec3::new(r[0], r[1], r[2]), r[3]))
        .unzip();

    let mut storage = AttributeStorage::with_positions(positions);
    storage.add(ATTR_RADIUS, AttributeData::Float(radii))?;
    for layer in legacy.layers {
        let name = layer.name().to_string();
        storage.add(&name, layer.into_data())?;
    }
    debug!("converted {} legacy point records", point_count);
    Ok(storage)
}

pub fn write_pointcloud<W: Write>(writer: &mut W, data: &PointCloudWriteData<'_>) -> IoResult<()> {
    writer.write_all(&MAGIC)?;
    writer.write_u16::<LittleEndian>(CURRENT_VERSION)?;
    writer.write_u32::<LittleEndian>(to_u32(data.point_count, "point count")?)?;
    writer.write_u32::<LittleEndian>(data.flags.bits())?;

    writer.write_u32::<LittleEndian>(to_u32(data.materials.len(), "material count")?)?;
    for material in data.materials {
        match material {
            Some(id) => {
                writer.write_u8(1)?;
                writer.write_u32::<LittleEndian>(*id)?;
            }
            None => {
                writer.write_u8(0)?;
                writer.write_u32::<LittleEndian>(0)?;
            }
        }
    }

    writer.write_u32::<LittleEndian>(to_u32(data.layers.len(), "layer count")?)?;
    for layer in &data.layers {
        write_layer(writer, layer)?;
    }
    Ok(())
}

pub fn read_pointcloud<R: Read>(reader: &mut R) -> IoResult<PointCloud> {
    let mut magic = [0u8; 4];
    reader.read_exact(&mut magic)?;
    if magic != MAGIC {
        return Err(IoError::BadMagic);
    }

    let version = reader.read_u16::<LittleEndian>()?;
    match version {
        CURRENT_VERSION => read_current(reader),
        LEGACY_VERSION => read_legacy(reader),
        other => Err(IoError::UnsupportedVersion(other)),
    }
}

/// Save a point cloud in the current format
pub fn save_pointcloud<P: AsRef<Path>>(pointcloud: &PointCloud, path: P) -> IoResult<()> {
    let file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)?;
    let mut writer = BufWriter::new(file);
    write_pointcloud(&mut writer, &PointCloudWriteData::prepare(pointcloud))?;
    writer.flush()?;
    Ok(())
}

/// Load a point cloud written in either format version
pub fn load_pointcloud<P: AsRef<Path>>(path: P) -> IoResult<PointCloud> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    read_pointcloud(&mut reader)
}

fn read_current<R: Read>(reader: &mut R) -> IoResult<PointCloud> {
    let point_count = reader.read_u32::<LittleEndian>()? as usize;
    let flags = PointCloudFlags::from_bits(reader.read_u32::<LittleEndian>()?);

    let material_count = reader.read_u32::<LittleEndian>()? as usize;
    let mut materials = Vec::with_capacity(material_count.min(MAX_PREALLOC));
    for _ in 0..material_count {
        let present = reader.read_u8()?;
        let id = reader.read_u32::<LittleEndian>()?;
        materials.push(if present != 0 { Some(id) } else { None });
    }

    let layers = read_layers(reader)?;
    let mut storage = AttributeStorage::new(point_count);
    for layer in layers {
        let name = layer.name().to_string();
        storage.add(&name, layer.into_data())?;
    }

    let mut pointcloud = PointCloud::from_attributes(storage)?;
    pointcloud.set_flag(flags);
    pointcloud.set_materials(materials);
    Ok(pointcloud)
}

fn read_legacy<R: Read>(reader: &mut R) -> IoResult<PointCloud> {
    let point_count = reader.read_u32::<LittleEndian>()? as usize;
    let mut records = Vec::with_capacity(point_count.min(MAX_PREALLOC));
    for _ in 0..point_count {
        let mut record = [0.0f32; 4];
        reader.read_f32_into::<LittleEndian>(&mut record)?;
        records.push(record);
    }
    let layers = read_layers(reader)?;

    let storage = convert_legacy_layout(LegacyPointData { records, layers })?;
    Ok(PointCloud::from_attributes(storage)?)
}

fn read_layers<R: Read>(reader: &mut R) -> IoResult<Vec<AttributeLayer>> {
    let layer_count = reader.read_u32::<LittleEndian>()? as usize;
    let mut layers = Vec::with_capacity(layer_count.min(MAX_PREALLOC));
    for _ in 0..layer_count {
        layers.push(read_layer(reader)?);
    }
    Ok(layers)
}

fn write_layer<W: Write>(writer: &mut W, layer: &AttributeLayer) -> IoResult<()> {
    let name = layer.name().as_bytes();
    let name_len = u16::try_from(name.len())
        .map_err(|_| IoError::InvalidData(format!("attribute name too long: {}", layer.name())))?;
    writer.write_u16::<LittleEndian>(name_len)?;
    writer.write_all(name)?;
    writer.write_u8(layer.data_type().tag())?;
    writer.write_u32::<LittleEndian>(to_u32(layer.len(), "layer length")?)?;

    match layer.data() {
        AttributeData::Float(values) => {
            for v in values {
                writer.write_f32::<LittleEndian>(*v)?;
            }
        }
        AttributeData::Float2(values) => {
            for v in values {
                write_floats(writer, &v.to_array())?;
            }
        }
        AttributeData::Float3(values) => {
            for v in values {
                write_floats(writer, &v.to_array())?;
            }
        }
        AttributeData::Float4(values) => {
            for v in values {
                write_floats(writer, &v.to_array())?;
            }
        }
        AttributeData::Int8(values) => {
            for v in values {
                writer.write_i8(*v)?;
            }
        }
        AttributeData::Int32(values) => {
            for v in values {
                writer.write_i32::<LittleEndian>(*v)?;
            }
        }
        AttributeData::Bool(values) => {
            for v in values {
                writer.write_u8(u8::from(*v))?;
            }
        }
    }
    Ok(())
}

fn read_layer<R: Read>(reader: &mut R) -> IoResult<AttributeLayer> {
    let name_len = reader.read_u16::<LittleEndian>()? as usize;
    let mut name = vec![0u8; name_len];
    reader.read_exact(&mut name)?;
    let name = String::from_utf8(name)
        .map_err(|_| IoError::InvalidData("attribute name is not UTF-8".to_string()))?;

    let tag = reader.read_u8()?;
    let data_type = AttributeType::from_tag(tag).ok_or_else(|| {
        IoError::InvalidData(format!("unknown type tag {} for attribute {}", tag, name))
    })?;
    let len = reader.read_u32::<LittleEndian>()? as usize;
    let cap = len.min(MAX_PREALLOC);

    let data = match data_type {
        AttributeType::Float => {
            let mut values = Vec::with_capacity(cap);
            for _ in 0..len {
                values.push(reader.read_f32::<LittleEndian>()?);
            }
            AttributeData::Float(values)
        }
        AttributeType::Float2 => {
            let mut values = Vec::with_capacity(cap);
            for _ in 0..len {
                let [x, y] = read_floats::<R, 2>(reader)?;
                values.push(Vec2::new(x, y));
            }
            AttributeData::Float2(values)
        }
        AttributeType::Float3 => {
            let mut values = Vec::with_capacity(cap);
            for _ in 0..len {
                values.push(Vec3::from_array(read_floats::<R, 3>(reader)?));
            }
            AttributeData::Float3(values)
        }
        AttributeType::Float4 => {
            let mut values = Vec::with_capacity(cap);
            for _ in 0..len {
                values.push(Vec4::from_array(read_floats::<R, 4>(reader)?));
            }
            AttributeData::Float4(values)
        }
        AttributeType::Int8 => {
            let mut values = Vec::with_capacity(cap);
            for _ in 0..len {
                values.push(reader.read_i8()?);
            }
            AttributeData::Int8(values)
        }
        AttributeType::Int32 => {
            let mut values = Vec::with_capacity(cap);
            for _ in 0..len {
                values.push(reader.read_i32::<LittleEndian>()?);
            }
            AttributeData::Int32(values)
        }
        AttributeType::Bool => {
            let mut values = Vec::with_capacity(cap);
            for _ in 0..len {
                values.push(reader.read_u8()? != 0);
            }
            AttributeData::Bool(values)
        }
    };
    Ok(AttributeLayer::new(name, data))
}

fn write_floats<W: Write>(writer: &mut W, values: &[f32]) -> IoResult<()> {
    for v in values {
        writer.write_f32::<LittleEndian>(*v)?;
    }
    Ok(())
}

fn read_floats<R: Read, const N: usize>(reader: &mut R) -> IoResult<[f32; N]> {
    let mut values = [0.0f32; N];
    reader.read_f32_into::<LittleEndian>(&mut values)?;
    Ok(values)
}

fn to_u32(value: usize, what: &str) -> IoResult<u32> {
    u32::try_from(value)
        .map_err(|_| IoError::InvalidData(format!("{} {} does not fit in 32 bits", what, value)))
}
