//! Schema types and raw, native-endian data containers.
//!
//! These are the building blocks the [`Reader`][crate::Reader] is made of.
//! A PLY file is dynamically typed: each property can have one of eight
//! scalar types and can be either a single value or a list. The header is
//! parsed into [`ElementDef`]s and [`PropertyDef`]s. The data of a loaded
//! element is kept as densely packed bytes in native endianess ([`RawData`]
//! for the fixed-size part of each row, [`ListData`] for list properties).

use std::{
    fmt,
    ops,
    str::FromStr,
};

use byteorder::{ByteOrder, NativeEndian};
use derive_more::{Add, AddAssign, From, Sub, SubAssign};
use num_traits::AsPrimitive;


// ===========================================================================
// ===== Scalar types and values
// ===========================================================================

/// The type of a single PLY value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarType {
    Char,
    UChar,
    Short,
    UShort,
    Int,
    UInt,
    Float,
    Double,
}

/// All names that are accepted for scalar types in a header. The first
/// eight are the canonical ones.
pub const TYPE_NAMES: &[(&str, ScalarType)] = &[
    ("char", ScalarType::Char),
    ("uchar", ScalarType::UChar),
    ("short", ScalarType::Short),
    ("ushort", ScalarType::UShort),
    ("int", ScalarType::Int),
    ("uint", ScalarType::UInt),
    ("float", ScalarType::Float),
    ("double", ScalarType::Double),
    ("int8", ScalarType::Char),
    ("uint8", ScalarType::UChar),
    ("int16", ScalarType::Short),
    ("uint16", ScalarType::UShort),
    ("int32", ScalarType::Int),
    ("uint32", ScalarType::UInt),
];

impl ScalarType {
    /// Looks up a type by one of its header names (canonical or alias).
    pub fn from_name(name: &str) -> Option<Self> {
        TYPE_NAMES.iter().find(|(n, _)| *n == name).map(|(_, ty)| *ty)
    }

    /// The canonical header name of this type.
    pub fn name(&self) -> &'static str {
        match self {
            ScalarType::Char => "char",
            ScalarType::UChar => "uchar",
            ScalarType::Short => "short",
            ScalarType::UShort => "ushort",
            ScalarType::Int => "int",
            ScalarType::UInt => "uint",
            ScalarType::Float => "float",
            ScalarType::Double => "double",
        }
    }

    /// Returns the number of bytes this type occupies.
    pub fn len(&self) -> usize {
        match self {
            ScalarType::Char | ScalarType::UChar => 1,
            ScalarType::Short | ScalarType::UShort => 2,
            ScalarType::Int | ScalarType::UInt | ScalarType::Float => 4,
            ScalarType::Double => 8,
        }
    }

    /// Returns `true` if and only if the type is either `float` or `double`.
    pub fn is_floating_point(&self) -> bool {
        *self == ScalarType::Float || *self == ScalarType::Double
    }

    pub fn is_integer(&self) -> bool {
        !self.is_floating_point()
    }

    /// Decodes a value of this type from the start of `bytes`, which are
    /// expected in native endianess. Panics if `bytes` is too short.
    pub fn read(&self, bytes: &[u8]) -> ScalarValue {
        match self {
            ScalarType::Char => ScalarValue::Char(bytes[0] as i8),
            ScalarType::UChar => ScalarValue::UChar(bytes[0]),
            ScalarType::Short => ScalarValue::Short(NativeEndian::read_i16(bytes)),
            ScalarType::UShort => ScalarValue::UShort(NativeEndian::read_u16(bytes)),
            ScalarType::Int => ScalarValue::Int(NativeEndian::read_i32(bytes)),
            ScalarType::UInt => ScalarValue::UInt(NativeEndian::read_u32(bytes)),
            ScalarType::Float => ScalarValue::Float(NativeEndian::read_f32(bytes)),
            ScalarType::Double => ScalarValue::Double(NativeEndian::read_f64(bytes)),
        }
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl fmt::Display for ScalarTypeParseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "\"{}\" is not a valid PLY scalar type", self.0)
    }
}

impl fmt::Debug for ScalarTypeParseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// The error emitted when the `FromStr` implementation for `ScalarType` cannot
/// parse the given string.
pub struct ScalarTypeParseError(String);

impl FromStr for ScalarType {
    type Err = ScalarTypeParseError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| ScalarTypeParseError(s.to_string()))
    }
}

/// One dynamically typed PLY value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScalarValue {
    Char(i8),
    UChar(u8),
    Short(i16),
    UShort(u16),
    Int(i32),
    UInt(u32),
    Float(f32),
    Double(f64),
}

impl ScalarValue {
    pub fn ty(&self) -> ScalarType {
        match self {
            ScalarValue::Char(_) => ScalarType::Char,
            ScalarValue::UChar(_) => ScalarType::UChar,
            ScalarValue::Short(_) => ScalarType::Short,
            ScalarValue::UShort(_) => ScalarType::UShort,
            ScalarValue::Int(_) => ScalarType::Int,
            ScalarValue::UInt(_) => ScalarType::UInt,
            ScalarValue::Float(_) => ScalarType::Float,
            ScalarValue::Double(_) => ScalarType::Double,
        }
    }

    /// Returns the value as integer, or `None` if it's a floating point
    /// value.
    pub fn as_integer(&self) -> Option<i64> {
        match *self {
            ScalarValue::Char(v) => Some(v.into()),
            ScalarValue::UChar(v) => Some(v.into()),
            ScalarValue::Short(v) => Some(v.into()),
            ScalarValue::UShort(v) => Some(v.into()),
            ScalarValue::Int(v) => Some(v.into()),
            ScalarValue::UInt(v) => Some(v.into()),
            ScalarValue::Float(_) | ScalarValue::Double(_) => None,
        }
    }

    /// Converts the value to `T` with the semantics of an `as` cast.
    pub fn cast<T: Primitive>(self) -> T {
        T::from_value(self)
    }

    /// Writes the value in native endianess to the start of `out`. Panics if
    /// `out` is too short.
    pub fn write(&self, out: &mut [u8]) {
        match *self {
            ScalarValue::Char(v) => out[0] = v as u8,
            ScalarValue::UChar(v) => out[0] = v,
            ScalarValue::Short(v) => NativeEndian::write_i16(out, v),
            ScalarValue::UShort(v) => NativeEndian::write_u16(out, v),
            ScalarValue::Int(v) => NativeEndian::write_i32(out, v),
            ScalarValue::UInt(v) => NativeEndian::write_u32(out, v),
            ScalarValue::Float(v) => NativeEndian::write_f32(out, v),
            ScalarValue::Double(v) => NativeEndian::write_f64(out, v),
        }
    }
}

mod internal {
    pub trait DoNotImplement {}
}

/// Abstracts over the Rust types that correspond to PLY scalar types.
///
/// This is a closed set of types (unusual for a trait): exactly `i8`, `u8`,
/// `i16`, `u16`, `i32`, `u32`, `f32` and `f64` implement it. That's why it
/// has the crate-private supertrait `DoNotImplement`. Extraction functions of
/// the reader are generic over this trait so that you can request the data in
/// any of these types, regardless of how it is stored in the file.
pub trait Primitive: Copy + Default + fmt::Debug + internal::DoNotImplement + 'static {
    /// Converts any value to this type with the semantics of an `as` cast.
    fn from_value(v: ScalarValue) -> Self;
}

macro_rules! impl_primitive {
    ($ty:ident) => {
        impl internal::DoNotImplement for $ty {}
        impl Primitive for $ty {
            fn from_value(v: ScalarValue) -> Self {
                match v {
                    ScalarValue::Char(v) => v.as_(),
                    ScalarValue::UChar(v) => v.as_(),
                    ScalarValue::Short(v) => v.as_(),
                    ScalarValue::UShort(v) => v.as_(),
                    ScalarValue::Int(v) => v.as_(),
                    ScalarValue::UInt(v) => v.as_(),
                    ScalarValue::Float(v) => v.as_(),
                    ScalarValue::Double(v) => v.as_(),
                }
            }
        }
    }
}

impl_primitive!(i8);
impl_primitive!(u8);
impl_primitive!(i16);
impl_primitive!(u16);
impl_primitive!(i32);
impl_primitive!(u32);
impl_primitive!(f32);
impl_primitive!(f64);


// ===========================================================================
// ===== Strongly typed wrapper for certain things
// ===========================================================================

/// A byte offset into the fixed-size part of one row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Add, Sub, AddAssign, SubAssign, From)]
pub struct RawOffset(pub u32);

impl RawOffset {
    pub fn as_usize(&self) -> usize {
        self.0 as usize
    }
}

/// Index of a specific property in the ordered list of properties of one
/// element. Can be used to index a [`PropVec`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, From, Add, Sub, AddAssign, SubAssign)]
pub struct PropIndex(pub u32);

impl PropIndex {
    pub fn as_usize(&self) -> usize {
        self.0 as usize
    }
}

/// A vector that holds data for each property. Can be indexed by
/// [`PropIndex`].
#[derive(Debug, Clone, PartialEq, From)]
pub struct PropVec<T>(Vec<T>);

impl<T> Default for PropVec<T> {
    fn default() -> Self {
        PropVec(Vec::new())
    }
}

impl<T> ops::Index<PropIndex> for PropVec<T> {
    type Output = T;
    fn index(&self, idx: PropIndex) -> &Self::Output {
        &self.0[idx.as_usize()]
    }
}

impl<T> ops::IndexMut<PropIndex> for PropVec<T> {
    fn index_mut(&mut self, idx: PropIndex) -> &mut Self::Output {
        &mut self.0[idx.as_usize()]
    }
}

impl<T> ops::Deref for PropVec<T> {
    type Target = Vec<T>;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<T> ops::DerefMut for PropVec<T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}


// ===========================================================================
// ===== Header definitions
// ===========================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyType {
    Scalar(ScalarType),

    /// A list: the number of values (stored as `len_type`, which is always an
    /// integer type) followed by that many values of type `scalar_type`.
    List {
        len_type: ScalarType,
        scalar_type: ScalarType,
    },
}

impl PropertyType {
    /// The type of the values (for lists: of the list items).
    pub fn scalar_type(&self) -> ScalarType {
        match *self {
            PropertyType::Scalar(scalar_type) => scalar_type,
            PropertyType::List { scalar_type, .. } => scalar_type,
        }
    }

    pub fn len_type(&self) -> Option<ScalarType> {
        match *self {
            PropertyType::Scalar(_) => None,
            PropertyType::List { len_type, .. } => Some(len_type),
        }
    }

    pub fn is_list(&self) -> bool {
        self.len_type().is_some()
    }
}

/// The header definition of one property of an element.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyDef {
    pub name: String,
    pub ty: PropertyType,

    /// Offset of this property within the fixed-size part of a row. Only
    /// meaningful for scalar properties.
    pub offset: RawOffset,
}

impl PropertyDef {
    pub fn new(name: impl Into<String>, ty: PropertyType) -> Self {
        Self {
            name: name.into(),
            ty,
            offset: RawOffset(0),
        }
    }
}

/// The header definition of one element.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementDef {
    pub name: String,

    /// Number of rows.
    pub count: u32,

    /// Definitions of all properties, in declaration order.
    pub properties: PropVec<PropertyDef>,

    fixed_size: bool,

    /// Sum of the sizes of all scalar properties.
    scalar_stride: u32,
}

impl ElementDef {
    pub fn new(name: impl Into<String>, count: u32) -> Self {
        Self {
            name: name.into(),
            count,
            properties: PropVec::default(),
            fixed_size: true,
            scalar_stride: 0,
        }
    }

    /// Returns the index of the property with the given name.
    pub fn find_property(&self, name: &str) -> Option<PropIndex> {
        self.properties.iter()
            .position(|p| p.name == name)
            .map(|idx| PropIndex(idx as u32))
    }

    /// `true` if this element has no list properties, i.e. all rows have the
    /// same size.
    pub fn fixed_size(&self) -> bool {
        self.fixed_size
    }

    /// The size of one row in bytes, or 0 if the element is not fixed-size.
    pub fn row_stride(&self) -> u32 {
        if self.fixed_size { self.scalar_stride } else { 0 }
    }

    /// The size of the scalar part of each row in the loaded data. Equal to
    /// `row_stride` for fixed-size elements.
    pub(crate) fn scalar_stride(&self) -> u32 {
        self.scalar_stride
    }

    /// Assigns offsets to all scalar properties (in declaration order) and
    /// computes `fixed_size` and the row stride. Has to be called once all
    /// properties have been added.
    pub(crate) fn compute_layout(&mut self) {
        let mut offset = RawOffset(0);
        let mut fixed_size = true;
        for prop in self.properties.iter_mut() {
            match prop.ty {
                PropertyType::Scalar(ty) => {
                    prop.offset = offset;
                    offset += RawOffset(ty.len() as u32);
                }
                PropertyType::List { .. } => {
                    prop.offset = RawOffset(0);
                    fixed_size = false;
                }
            }
        }

        self.fixed_size = fixed_size;
        self.scalar_stride = offset.0;
    }
}


// ===========================================================================
// ===== Loaded data
// ===========================================================================

/// Densely packed bytes in native endianess.
///
/// For binary files in native endianess, this can be an exact chunk from the
/// file. Everything else is converted to this format while loading.
#[derive(Debug, Clone, Default, From)]
pub struct RawData(Vec<u8>);

impl RawData {
    /// Reads a value of type `ty` at the given byte offset and converts it to
    /// `T`. Panics if out of bounds.
    pub fn get<T: Primitive>(&self, offset: usize, ty: ScalarType) -> T {
        ty.read(&self.0[offset..offset + ty.len()]).cast()
    }
}

impl ops::Deref for RawData {
    type Target = Vec<u8>;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl ops::DerefMut for RawData {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

/// The values of one list property for all rows of an element.
///
/// `data` holds the values of all rows back to back. For row `i`, the values
/// start at byte `row_start[i]` and there are `row_count[i]` of them.
#[derive(Debug, Clone)]
pub struct ListData {
    pub scalar_type: ScalarType,
    pub data: RawData,
    pub row_start: Vec<usize>,
    pub row_count: Vec<u32>,
}

impl ListData {
    pub(crate) fn new(scalar_type: ScalarType, rows: usize) -> Self {
        Self {
            scalar_type,
            data: RawData::default(),
            row_start: Vec::with_capacity(rows),
            row_count: Vec::with_capacity(rows),
        }
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.row_count.len()
    }

    pub fn is_empty(&self) -> bool {
        self.row_count.is_empty()
    }

    /// Total number of values over all rows.
    pub fn total_len(&self) -> usize {
        self.data.len() / self.scalar_type.len()
    }

    /// Returns the `idx`th value of row `row`, converted to `T`.
    pub fn get<T: Primitive>(&self, row: usize, idx: usize) -> T {
        let size = self.scalar_type.len();
        self.data.get(self.row_start[row] + idx * size, self.scalar_type)
    }

    /// Iterates over all values of all rows, converted to `T`.
    pub fn values<T: Primitive>(&self) -> impl Iterator<Item = T> + '_ {
        let ty = self.scalar_type;
        self.data.chunks_exact(ty.len()).map(move |c| ty.read(c).cast())
    }
}
