//! Decoding of element data for the three PLY encodings.
//!
//! Everything is funneled through one generic row walk
//! ([`EncodingReader::load_element`]) that is parameterized by the encoding.
//! The binary encodings layer a bulk copy for fixed-size elements on top of
//! it. All data ends up in native endianess.

use std::{
    cmp::min,
    io::{Read, Seek},
    marker::PhantomData,
};

use byteorder::{ByteOrder, NativeEndian};

use crate::{
    error::Error,
    parse::buf::Buffer,
    raw::{ElementDef, ListData, PropVec, PropertyType, RawData, ScalarType, ScalarValue},
};


/// Upper bound for preallocations based on counts from the header. The
/// header can claim anything, so we only allocate for data that is actually
/// there.
const MAX_PREALLOC: usize = 1 << 20;

/// The decoded data of one element.
#[derive(Debug)]
pub(crate) struct ElementData {
    /// The scalar properties of all rows, `scalar_stride` bytes per row.
    pub(crate) scalars: RawData,

    /// One entry per property, `Some` for list properties.
    pub(crate) lists: PropVec<Option<ListData>>,
}

/// Abstracts over the three different encodings.
pub(crate) trait EncodingReader: Sized {
    /// Reads a single value of type `ty`.
    fn read_value<R: Read + Seek>(buf: &mut Buffer<R>, ty: ScalarType) -> Result<ScalarValue, Error>;

    /// Reads a single value and writes it in native endianess to the start of
    /// `out`.
    fn read_scalar<R: Read + Seek>(
        buf: &mut Buffer<R>,
        ty: ScalarType,
        out: &mut [u8],
    ) -> Result<(), Error> {
        Self::read_value(buf, ty)?.write(out);
        Ok(())
    }

    /// Reads the number of values of a list. The count type is always an
    /// integer type (checked while parsing the header), but can be signed.
    fn read_list_len<R: Read + Seek>(buf: &mut Buffer<R>, ty: ScalarType) -> Result<i64, Error> {
        let value = Self::read_value(buf, ty)?;
        value.as_integer().ok_or_else(|| Error::MalformedData {
            msg: format!("list count of non-integer type {}", ty),
            offset: buf.offset(),
        })
    }

    /// Reads `count` values of type `ty` and appends them in native endianess
    /// to `out`.
    fn read_list<R: Read + Seek>(
        buf: &mut Buffer<R>,
        ty: ScalarType,
        count: usize,
        out: &mut Vec<u8>,
    ) -> Result<(), Error> {
        let size = ty.len();
        for _ in 0..count {
            let start = out.len();
            out.resize(start + size, 0);
            Self::read_scalar(buf, ty, &mut out[start..])?;
        }
        Ok(())
    }

    /// Finishes one row. Only relevant for ASCII (where the rest of the line
    /// needs to be skipped), therefore this empty implementation is provided.
    fn finish_row<R: Read + Seek>(_buf: &mut Buffer<R>) -> Result<(), Error> {
        Ok(())
    }

    /// Reads all rows of the element described by `def`.
    fn load_element<R: Read + Seek>(
        buf: &mut Buffer<R>,
        def: &ElementDef,
    ) -> Result<ElementData, Error> {
        generic_load::<Self, _>(buf, def)
    }

    /// Moves past all rows of the element described by `def` without storing
    /// anything.
    fn skip_element<R: Read + Seek>(buf: &mut Buffer<R>, def: &ElementDef) -> Result<(), Error> {
        generic_skip::<Self, _>(buf, def)
    }
}


// ===========================================================================
// ===== ASCII
// ===========================================================================

/// ASCII encoding: whitespace separated literals, one row per line.
pub(crate) enum AsciiEncoding {}

impl EncodingReader for AsciiEncoding {
    fn read_value<R: Read + Seek>(buf: &mut Buffer<R>, ty: ScalarType) -> Result<ScalarValue, Error> {
        if !buf.advance()? {
            return Err(Error::TruncatedData(format!(
                "input ended at byte {} while reading a {} value",
                buf.offset(),
                ty,
            )));
        }

        let value = match ty {
            ScalarType::Float => buf.float_literal().map(ScalarValue::Float),
            ScalarType::Double => buf.double_literal().map(ScalarValue::Double),
            _ => buf.int_literal().map(|v| match ty {
                ScalarType::Char => ScalarValue::Char(v as i8),
                ScalarType::UChar => ScalarValue::UChar(v as u8),
                ScalarType::Short => ScalarValue::Short(v as i16),
                ScalarType::UShort => ScalarValue::UShort(v as u16),
                ScalarType::Int => ScalarValue::Int(v as i32),
                _ => ScalarValue::UInt(v as u32),
            }),
        };

        value.ok_or_else(|| Error::MalformedData {
            msg: format!("invalid '{}' literal: {}", ty, buf.excerpt()),
            offset: buf.offset(),
        })
    }

    /// List counts are read as plain integers, independent of the declared
    /// count type, so out-of-range and negative counts are not wrapped.
    fn read_list_len<R: Read + Seek>(buf: &mut Buffer<R>, ty: ScalarType) -> Result<i64, Error> {
        if !buf.advance()? {
            return Err(Error::TruncatedData(format!(
                "input ended at byte {} while reading a list count",
                buf.offset(),
            )));
        }

        let count = buf.int_literal().ok_or_else(|| Error::MalformedData {
            msg: format!("invalid '{}' list count: {}", ty, buf.excerpt()),
            offset: buf.offset(),
        })?;
        if count > i64::from(i32::max_value()) {
            return Err(Error::InvalidCount { what: "list", count });
        }

        Ok(count)
    }

    fn finish_row<R: Read + Seek>(buf: &mut Buffer<R>) -> Result<(), Error> {
        // A missing line break after the very last row is fine. If more rows
        // are expected, reading the next value fails.
        buf.next_line()?;
        Ok(())
    }

    fn skip_element<R: Read + Seek>(buf: &mut Buffer<R>, def: &ElementDef) -> Result<(), Error> {
        for row in 0..def.count {
            if !buf.advance()? {
                return Err(Error::TruncatedData(format!(
                    "input ended after {} of {} rows of element '{}'",
                    row,
                    def.count,
                    def.name,
                )));
            }

            // A missing line break after the very last row is fine.
            buf.next_line()?;
        }

        // Position at the first token of the next row, just like after the
        // header.
        buf.advance()?;
        Ok(())
    }
}


// ===========================================================================
// ===== Binary
// ===========================================================================

/// Binary encoding with byte order `B`.
pub(crate) struct BinaryEncoding<B>(PhantomData<B>);

impl<B: ByteOrder> BinaryEncoding<B> {
    fn is_native() -> bool {
        B::read_u16(&[1, 0]) == NativeEndian::read_u16(&[1, 0])
    }
}

impl<B: ByteOrder> EncodingReader for BinaryEncoding<B> {
    fn read_value<R: Read + Seek>(buf: &mut Buffer<R>, ty: ScalarType) -> Result<ScalarValue, Error> {
        let bytes = buf.take(ty.len())?;
        let v = match ty {
            ScalarType::Char => ScalarValue::Char(bytes[0] as i8),
            ScalarType::UChar => ScalarValue::UChar(bytes[0]),
            ScalarType::Short => ScalarValue::Short(B::read_i16(bytes)),
            ScalarType::UShort => ScalarValue::UShort(B::read_u16(bytes)),
            ScalarType::Int => ScalarValue::Int(B::read_i32(bytes)),
            ScalarType::UInt => ScalarValue::UInt(B::read_u32(bytes)),
            ScalarType::Float => ScalarValue::Float(B::read_f32(bytes)),
            ScalarType::Double => ScalarValue::Double(B::read_f64(bytes)),
        };

        Ok(v)
    }

    fn read_list<R: Read + Seek>(
        buf: &mut Buffer<R>,
        ty: ScalarType,
        count: usize,
        out: &mut Vec<u8>,
    ) -> Result<(), Error> {
        let start = out.len();
        read_bulk(buf, count * ty.len(), out)?;

        if !Self::is_native() {
            swap_all(&mut out[start..], ty.len());
        }
        Ok(())
    }

    fn load_element<R: Read + Seek>(
        buf: &mut Buffer<R>,
        def: &ElementDef,
    ) -> Result<ElementData, Error> {
        if !def.fixed_size() {
            return generic_load::<Self, _>(buf, def);
        }

        // All rows have the same size: copy everything at once and fix the
        // byte order afterwards.
        let stride = def.row_stride() as usize;
        let mut data = Vec::new();
        read_bulk(buf, def.count as usize * stride, &mut data)?;

        if !Self::is_native() && stride > 0 {
            for row in data.chunks_exact_mut(stride) {
                for prop in def.properties.iter() {
                    let start = prop.offset.as_usize();
                    let len = prop.ty.scalar_type().len();
                    row[start..start + len].reverse();
                }
            }
        }

        Ok(ElementData {
            scalars: data.into(),
            lists: def.properties.iter().map(|_| None).collect::<Vec<_>>().into(),
        })
    }

    fn skip_element<R: Read + Seek>(buf: &mut Buffer<R>, def: &ElementDef) -> Result<(), Error> {
        if def.fixed_size() {
            buf.skip_bytes(u64::from(def.count) * u64::from(def.row_stride()))
        } else {
            generic_skip::<Self, _>(buf, def)
        }
    }
}

// ===========================================================================
// ===== Row walks shared by all encodings
// ===========================================================================

/// Reads the element row by row, property by property.
fn generic_load<E: EncodingReader, R: Read + Seek>(
    buf: &mut Buffer<R>,
    def: &ElementDef,
) -> Result<ElementData, Error> {
    let rows = def.count as usize;
    let stride = def.scalar_stride() as usize;

    let mut scalars = Vec::with_capacity(min(rows.saturating_mul(stride), MAX_PREALLOC));
    let mut lists = def.properties.iter()
        .map(|p| match p.ty {
            PropertyType::List { scalar_type, .. } => {
                Some(ListData::new(scalar_type, min(rows, MAX_PREALLOC)))
            }
            PropertyType::Scalar(_) => None,
        })
        .collect::<Vec<_>>();

    for _ in 0..rows {
        let row_start = scalars.len();
        scalars.resize(row_start + stride, 0);
        let row = &mut scalars[row_start..];

        for (prop, list) in def.properties.iter().zip(&mut lists) {
            match prop.ty {
                PropertyType::Scalar(ty) => {
                    E::read_scalar(buf, ty, &mut row[prop.offset.as_usize()..])?;
                }
                PropertyType::List { len_type, scalar_type } => {
                    let count = E::read_list_len(buf, len_type)?;
                    if count < 0 {
                        return Err(Error::InvalidCount { what: "list", count });
                    }

                    if let Some(list) = list {
                        list.row_start.push(list.data.len());
                        list.row_count.push(count as u32);
                        E::read_list(buf, scalar_type, count as usize, &mut list.data)?;
                    }
                }
            }
        }

        E::finish_row(buf)?;
    }

    Ok(ElementData {
        scalars: scalars.into(),
        lists: lists.into(),
    })
}

/// Walks all rows, but only reads the list counts to know how much to skip.
fn generic_skip<E: EncodingReader, R: Read + Seek>(
    buf: &mut Buffer<R>,
    def: &ElementDef,
) -> Result<(), Error> {
    for _ in 0..def.count {
        for prop in def.properties.iter() {
            match prop.ty {
                PropertyType::Scalar(ty) => {
                    buf.skip_bytes(ty.len() as u64)?;
                }
                PropertyType::List { len_type, scalar_type } => {
                    let count = E::read_list_len(buf, len_type)?;
                    if count < 0 {
                        return Err(Error::InvalidCount { what: "list", count });
                    }
                    buf.skip_bytes(count as u64 * scalar_type.len() as u64)?;
                }
            }
        }
    }

    Ok(())
}

/// Appends `len` bytes of input to `out`, growing it chunk by chunk.
fn read_bulk<R: Read + Seek>(buf: &mut Buffer<R>, len: usize, out: &mut Vec<u8>) -> Result<(), Error> {
    let end = out.len() + len;
    while out.len() < end {
        let chunk_start = out.len();
        let chunk = min(end - chunk_start, MAX_PREALLOC);
        out.resize(chunk_start + chunk, 0);
        buf.copy_to(&mut out[chunk_start..])?;
    }
    Ok(())
}

/// Reverses the byte order of each `size` byte value in `data`.
fn swap_all(data: &mut [u8], size: usize) {
    if size > 1 {
        for value in data.chunks_exact_mut(size) {
            value.reverse();
        }
    }
}
