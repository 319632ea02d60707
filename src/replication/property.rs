//! Tagged replicated-property values.
//!
//! A [`PropertyValue`] bundles the value kind with encode/decode for that
//! kind, and a [`PropertyBag`] holds an object's declared properties in
//! declaration order. Property wire form: name string, kind tag (`u8`), then
//! the value encoded by kind.

use glam::{Quat, Vec3};

use crate::codec::ByteStream;
use crate::core::CodecError;

/// Wire tag identifying a property value's kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PropertyKind {
    /// Boolean.
    Bool = 0,
    /// Signed 8-bit integer.
    I8 = 1,
    /// Unsigned 8-bit integer.
    U8 = 2,
    /// Signed 16-bit integer.
    I16 = 3,
    /// Unsigned 16-bit integer.
    U16 = 4,
    /// Signed 32-bit integer.
    I32 = 5,
    /// Unsigned 32-bit integer.
    U32 = 6,
    /// Signed 64-bit integer.
    I64 = 7,
    /// Unsigned 64-bit integer.
    U64 = 8,
    /// 32-bit float.
    F32 = 9,
    /// 64-bit float.
    F64 = 10,
    /// 3-component vector.
    Vec3 = 11,
    /// Rotation quaternion.
    Quat = 12,
    /// UTF-8 string.
    String = 13,
}

impl PropertyKind {
    /// Map a wire tag back to a kind.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Bool),
            1 => Some(Self::I8),
            2 => Some(Self::U8),
            3 => Some(Self::I16),
            4 => Some(Self::U16),
            5 => Some(Self::I32),
            6 => Some(Self::U32),
            7 => Some(Self::I64),
            8 => Some(Self::U64),
            9 => Some(Self::F32),
            10 => Some(Self::F64),
            11 => Some(Self::Vec3),
            12 => Some(Self::Quat),
            13 => Some(Self::String),
            _ => None,
        }
    }
}

/// A replicated property value, tagged by kind.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    /// Boolean.
    Bool(bool),
    /// Signed 8-bit integer.
    I8(i8),
    /// Unsigned 8-bit integer.
    U8(u8),
    /// Signed 16-bit integer.
    I16(i16),
    /// Unsigned 16-bit integer.
    U16(u16),
    /// Signed 32-bit integer.
    I32(i32),
    /// Unsigned 32-bit integer.
    U32(u32),
    /// Signed 64-bit integer.
    I64(i64),
    /// Unsigned 64-bit integer.
    U64(u64),
    /// 32-bit float.
    F32(f32),
    /// 64-bit float.
    F64(f64),
    /// 3-component vector.
    Vec3(Vec3),
    /// Rotation quaternion.
    Quat(Quat),
    /// UTF-8 string.
    String(String),
}

impl PropertyValue {
    /// The kind tag for this value.
    pub fn kind(&self) -> PropertyKind {
        match self {
            Self::Bool(_) => PropertyKind::Bool,
            Self::I8(_) => PropertyKind::I8,
            Self::U8(_) => PropertyKind::U8,
            Self::I16(_) => PropertyKind::I16,
            Self::U16(_) => PropertyKind::U16,
            Self::I32(_) => PropertyKind::I32,
            Self::U32(_) => PropertyKind::U32,
            Self::I64(_) => PropertyKind::I64,
            Self::U64(_) => PropertyKind::U64,
            Self::F32(_) => PropertyKind::F32,
            Self::F64(_) => PropertyKind::F64,
            Self::Vec3(_) => PropertyKind::Vec3,
            Self::Quat(_) => PropertyKind::Quat,
            Self::String(_) => PropertyKind::String,
        }
    }

    /// Encode the value (without its kind tag) into `out`.
    pub fn encode(&self, out: &mut ByteStream) {
        match self {
            Self::Bool(value) => out.write_bool(*value),
            Self::I8(value) => out.write_i8(*value),
            Self::U8(value) => out.write_u8(*value),
            Self::I16(value) => out.write_i16(*value),
            Self::U16(value) => out.write_u16(*value),
            Self::I32(value) => out.write_i32(*value),
            Self::U32(value) => out.write_u32(*value),
            Self::I64(value) => out.write_i64(*value),
            Self::U64(value) => out.write_u64(*value),
            Self::F32(value) => out.write_f32(*value),
            Self::F64(value) => out.write_f64(*value),
            Self::Vec3(value) => out.write_vec3(*value),
            Self::Quat(value) => out.write_quat(*value),
            Self::String(value) => out.write_str(value),
        }
    }

    /// The value's encoding as an owned buffer, used for snapshot comparison.
    pub fn encode_to_vec(&self) -> Vec<u8> {
        let mut stream = ByteStream::new();
        self.encode(&mut stream);
        stream.as_bytes().to_vec()
    }

    /// Decode a value of the given kind from `stream`.
    pub fn decode(kind: PropertyKind, stream: &mut ByteStream) -> Result<Self, CodecError> {
        Ok(match kind {
            PropertyKind::Bool => Self::Bool(stream.read_bool()?),
            PropertyKind::I8 => Self::I8(stream.read_i8()?),
            PropertyKind::U8 => Self::U8(stream.read_u8()?),
            PropertyKind::I16 => Self::I16(stream.read_i16()?),
            PropertyKind::U16 => Self::U16(stream.read_u16()?),
            PropertyKind::I32 => Self::I32(stream.read_i32()?),
            PropertyKind::U32 => Self::U32(stream.read_u32()?),
            PropertyKind::I64 => Self::I64(stream.read_i64()?),
            PropertyKind::U64 => Self::U64(stream.read_u64()?),
            PropertyKind::F32 => Self::F32(stream.read_f32()?),
            PropertyKind::F64 => Self::F64(stream.read_f64()?),
            PropertyKind::Vec3 => Self::Vec3(stream.read_vec3()?),
            PropertyKind::Quat => Self::Quat(stream.read_quat()?),
            PropertyKind::String => Self::String(stream.read_string()?),
        })
    }

    /// The contained `bool`, if that is this value's kind.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            _ => None,
        }
    }

    /// The contained `i32`, if that is this value's kind.
    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Self::I32(value) => Some(*value),
            _ => None,
        }
    }

    /// The contained `f32`, if that is this value's kind.
    pub fn as_f32(&self) -> Option<f32> {
        match self {
            Self::F32(value) => Some(*value),
            _ => None,
        }
    }

    /// The contained vector, if that is this value's kind.
    pub fn as_vec3(&self) -> Option<Vec3> {
        match self {
            Self::Vec3(value) => Some(*value),
            _ => None,
        }
    }

    /// The contained string, if that is this value's kind.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(value) => Some(value),
            _ => None,
        }
    }
}

/// One declared property: name plus current value.
#[derive(Debug, Clone)]
pub struct PropertyEntry {
    name: String,
    value: PropertyValue,
}

impl PropertyEntry {
    /// The property's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The property's current value.
    pub fn value(&self) -> &PropertyValue {
        &self.value
    }
}

/// An object's declared replicated properties, in declaration order.
#[derive(Debug, Clone, Default)]
pub struct PropertyBag {
    entries: Vec<PropertyEntry>,
}

impl PropertyBag {
    /// Create an empty bag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a property with its initial value. Redeclaring a name
    /// replaces the earlier declaration.
    pub fn declare(&mut self, name: &str, value: PropertyValue) {
        match self.entries.iter_mut().find(|entry| entry.name == name) {
            Some(entry) => entry.value = value,
            None => self.entries.push(PropertyEntry {
                name: name.to_string(),
                value,
            }),
        }
    }

    /// The current value of `name`.
    pub fn get(&self, name: &str) -> Option<&PropertyValue> {
        self.entries
            .iter()
            .find(|entry| entry.name == name)
            .map(|entry| &entry.value)
    }

    /// Set `name` to `value`. Returns `false` when the name is undeclared
    /// or the kinds differ; the bag is unchanged in that case.
    pub fn set(&mut self, name: &str, value: PropertyValue) -> bool {
        match self.entries.iter_mut().find(|entry| entry.name == name) {
            Some(entry) if entry.value.kind() == value.kind() => {
                entry.value = value;
                true
            }
            _ => false,
        }
    }

    /// Iterate declared properties in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &PropertyEntry> {
        self.entries.iter()
    }

    /// Number of declared properties.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no properties are declared.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
