//! Typed access to the data of the loaded element.
//!
//! All functions in here copy data into caller-provided slices and never
//! move the cursor. Errors (unknown property, wrong kind of property, output
//! too small) don't invalidate the reader.

use std::{
    io::{Read, Seek},
    ops::Range,
};

use byteorder::{ByteOrder, NativeEndian};
use smallvec::SmallVec;

use crate::{
    error::Error,
    raw::{ElementDef, ListData, Primitive, PropertyDef, PropertyType, ScalarType},
    triangulate::triangulate_polygon,
};
use super::{encoding::ElementData, Reader};


/// Looks up a scalar property of `def`.
fn scalar_prop<'a>(def: &'a ElementDef, name: &str) -> Result<&'a PropertyDef, Error> {
    let idx = def.find_property(name).ok_or_else(|| Error::MissingProperty(name.into()))?;
    let prop = &def.properties[idx];
    if prop.ty.is_list() {
        return Err(Error::WrongPropertyKind { name: name.into(), expected: "scalar" });
    }

    Ok(prop)
}

/// Looks up a list property of `def` and its data.
fn list_prop<'a>(
    def: &ElementDef,
    data: &'a ElementData,
    name: &str,
) -> Result<&'a ListData, Error> {
    let idx = def.find_property(name).ok_or_else(|| Error::MissingProperty(name.into()))?;
    data.lists[idx].as_ref()
        .ok_or_else(|| Error::WrongPropertyKind { name: name.into(), expected: "list" })
}

fn check_len(needed: usize, actual: usize) -> Result<(), Error> {
    if actual < needed {
        Err(Error::OutputTooSmall { needed, actual })
    } else {
        Ok(())
    }
}

impl<R: Read + Seek> Reader<R> {
    // ===== Scalar properties ================================================

    /// Returns `true` if the current element has scalar properties `x` and
    /// `y`.
    pub fn has_vec2(&self, x: &str, y: &str) -> bool {
        self.has_scalars(&[x, y])
    }

    /// Returns `true` if the current element has scalar properties `x`, `y`
    /// and `z`.
    pub fn has_vec3(&self, x: &str, y: &str, z: &str) -> bool {
        self.has_scalars(&[x, y, z])
    }

    fn has_scalars(&self, names: &[&str]) -> bool {
        match self.element() {
            Some(def) => names.iter().all(|name| scalar_prop(def, name).is_ok()),
            None => false,
        }
    }

    /// Copies the properties `x` and `y` of all rows to `dest` (interleaved,
    /// two values per row), converting them to `f32`.
    pub fn extract_vec2(&self, x: &str, y: &str, dest: &mut [f32]) -> Result<(), Error> {
        self.extract_vec(&[x, y], dest)
    }

    /// Copies the properties `x`, `y` and `z` of all rows to `dest`
    /// (interleaved, three values per row), converting them to `f32`.
    ///
    /// This is the usual way to get vertex positions or normals. It's fast if
    /// the three properties are stored as consecutive `float`s.
    pub fn extract_vec3(&self, x: &str, y: &str, z: &str, dest: &mut [f32]) -> Result<(), Error> {
        self.extract_vec(&[x, y, z], dest)
    }

    fn extract_vec(&self, names: &[&str], dest: &mut [f32]) -> Result<(), Error> {
        let (def, data) = self.loaded()?;
        let props = names.iter()
            .map(|name| scalar_prop(def, name))
            .collect::<Result<SmallVec<[_; 4]>, _>>()?;

        let n = names.len();
        let rows = def.count as usize;
        check_len(rows * n, dest.len())?;
        let dest = &mut dest[..rows * n];
        if rows == 0 {
            return Ok(());
        }

        let stride = def.scalar_stride() as usize;
        let scalars = &data.scalars[..];
        let start = props[0].offset.as_usize();

        let all_float = props.iter().all(|p| p.ty == PropertyType::Scalar(ScalarType::Float));
        let contiguous = props.iter()
            .enumerate()
            .all(|(i, p)| p.offset.as_usize() == start + 4 * i);

        if all_float && contiguous && stride == 4 * n {
            // The properties are all there is: one big copy.
            NativeEndian::read_f32_into(&scalars[..rows * stride], dest);
        } else if all_float && contiguous {
            for (row, out) in scalars.chunks_exact(stride).zip(dest.chunks_exact_mut(n)) {
                NativeEndian::read_f32_into(&row[start..start + 4 * n], out);
            }
        } else if all_float {
            for (row, out) in scalars.chunks_exact(stride).zip(dest.chunks_exact_mut(n)) {
                for (p, v) in props.iter().zip(out) {
                    *v = NativeEndian::read_f32(&row[p.offset.as_usize()..]);
                }
            }
        } else {
            for (row, out) in scalars.chunks_exact(stride).zip(dest.chunks_exact_mut(n)) {
                for (p, v) in props.iter().zip(out) {
                    let ty = p.ty.scalar_type();
                    let offset = p.offset.as_usize();
                    *v = ty.read(&row[offset..offset + ty.len()]).cast();
                }
            }
        }

        Ok(())
    }

    /// Copies the given scalar properties of all rows to `dest` (row by row,
    /// `names.len()` values per row), converting them to `T`.
    pub fn extract_properties<T: Primitive>(&self, names: &[&str], dest: &mut [T]) -> Result<(), Error> {
        let (def, data) = self.loaded()?;
        let props = names.iter()
            .map(|name| scalar_prop(def, name))
            .collect::<Result<SmallVec<[_; 8]>, _>>()?;

        let n = names.len();
        let rows = def.count as usize;
        check_len(rows * n, dest.len())?;
        if n == 0 {
            return Ok(());
        }

        let stride = def.scalar_stride() as usize;
        for row in 0..rows {
            for (p, v) in props.iter().zip(&mut dest[row * n..(row + 1) * n]) {
                let offset = row * stride + p.offset.as_usize();
                *v = data.scalars.get(offset, p.ty.scalar_type());
            }
        }

        Ok(())
    }

    // ===== List properties ==================================================

    /// Returns the number of values of the list property `name` for each
    /// row.
    pub fn list_counts(&self, name: &str) -> Result<&[u32], Error> {
        let (def, data) = self.loaded()?;
        Ok(&list_prop(def, data, name)?.row_count)
    }

    /// Returns the total number of values of the list property `name` over
    /// all rows.
    pub fn sum_of_list_counts(&self, name: &str) -> Result<usize, Error> {
        let (def, data) = self.loaded()?;
        Ok(list_prop(def, data, name)?.total_len())
    }

    /// Copies the values of the list property `name` of all rows to `dest`,
    /// back to back, converting them to `T`. Use
    /// [`list_counts`](Self::list_counts) to find out which values belong to
    /// which row.
    pub fn extract_list_property<T: Primitive>(&self, name: &str, dest: &mut [T]) -> Result<(), Error> {
        let (def, data) = self.loaded()?;
        let list = list_prop(def, data, name)?;
        check_len(list.total_len(), dest.len())?;

        for (out, v) in dest.iter_mut().zip(list.values::<T>()) {
            *out = v;
        }
        Ok(())
    }

    // ===== Faces ============================================================

    /// Returns the number of triangles the polygons in the list property
    /// `name` result in when triangulated. Rows with fewer than three values
    /// count as zero triangles.
    pub fn count_triangles(&self, name: &str) -> Result<usize, Error> {
        let (def, data) = self.loaded()?;
        let list = list_prop(def, data, name)?;
        Ok(list.row_count.iter().map(|&c| (c as usize).saturating_sub(2)).sum())
    }

    /// Returns `true` if each row of the list property `name` has exactly
    /// three values.
    pub fn all_faces_are_triangles(&self, name: &str) -> Result<bool, Error> {
        let (def, data) = self.loaded()?;
        let list = list_prop(def, data, name)?;
        Ok(list.row_count.iter().all(|&c| c == 3))
    }

    /// Writes the triangles of all polygons in the list property `name` to
    /// `dest` and returns the number of triangles written.
    ///
    /// Polygons with more than three vertices are triangulated (see
    /// [`triangulate_polygon`]), which is why `positions` (`x, y, z` per
    /// vertex) and `num_verts` are required. Rows with fewer than three
    /// values and polygons with an index outside of `0..num_verts` are
    /// skipped. `dest` must have room for `3 * count_triangles(name)`
    /// indices.
    pub fn extract_triangles(
        &self,
        name: &str,
        positions: &[f32],
        num_verts: u32,
        dest: &mut [u32],
    ) -> Result<usize, Error> {
        let (def, data) = self.loaded()?;
        let list = list_prop(def, data, name)?;
        let num_tris = self.count_triangles(name)?;
        check_len(num_tris * 3, dest.len())?;

        let is_32bit_int = list.scalar_type == ScalarType::Int
            || list.scalar_type == ScalarType::UInt;

        if is_32bit_int && list.row_count.iter().all(|&c| c == 3) {
            NativeEndian::read_u32_into(&list.data, &mut dest[..num_tris * 3]);
            return Ok(num_tris);
        }

        let mut written = 0;
        let mut run_start = None;
        let mut scratch = SmallVec::<[u32; 32]>::new();
        for row in 0..list.len() {
            let count = list.row_count[row] as usize;
            if count == 3 {
                run_start.get_or_insert(row);
                continue;
            }
            if let Some(start) = run_start.take() {
                written += copy_triangle_rows(list, start..row, &mut dest[written * 3..]);
            }
            if count < 3 {
                continue;
            }

            scratch.clear();
            scratch.extend((0..count).map(|i| list.get::<u32>(row, i)));
            match triangulate_polygon(&scratch, positions, num_verts, &mut dest[written * 3..]) {
                Ok(tris) => written += tris,
                Err(Error::InvalidIndex { index, .. }) => {
                    log::trace!("skipping face {} with invalid vertex index {}", row, index);
                }
                Err(e) => return Err(e),
            }
        }
        if let Some(start) = run_start {
            written += copy_triangle_rows(list, start..list.len(), &mut dest[written * 3..]);
        }

        Ok(written)
    }
}

/// Copies the consecutive triangle rows `rows` of `list` to `dest` and
/// returns the number of triangles copied.
fn copy_triangle_rows(list: &ListData, rows: Range<usize>, dest: &mut [u32]) -> usize {
    let num = rows.end - rows.start;
    let size = list.scalar_type.len();
    let start = list.row_start[rows.start];
    let bytes = &list.data[start..start + num * 3 * size];
    let dest = &mut dest[..num * 3];

    match list.scalar_type {
        ScalarType::Int | ScalarType::UInt => NativeEndian::read_u32_into(bytes, dest),
        ty => {
            for (out, v) in dest.iter_mut().zip(bytes.chunks_exact(size)) {
                *out = ty.read(v).cast();
            }
        }
    }

    num
}
