//! A streaming reader for PLY mesh files.
//!
//! All three PLY encodings are supported: ASCII, binary little endian and
//! binary big endian. The reader parses the header when it is created and
//! then walks the elements of the file one by one. Only elements you
//! explicitly load are decoded; all others are skipped as cheaply as the
//! encoding allows. Memory usage is bounded by one fixed size read buffer
//! plus the data of the currently loaded element.
//!
//! ```no_run
//! use plystream::Reader;
//!
//! # fn main() -> Result<(), plystream::Error> {
//! let mut reader = Reader::open("bunny.ply")?;
//! let mut positions = Vec::new();
//! let mut indices = Vec::new();
//!
//! while reader.has_element() {
//!     let (name, count) = match reader.element() {
//!         Some(e) => (e.name.clone(), e.count as usize),
//!         None => break,
//!     };
//!
//!     if name == "vertex" {
//!         reader.load_element()?;
//!         positions.resize(count * 3, 0.0f32);
//!         reader.extract_vec3("x", "y", "z", &mut positions)?;
//!     } else if name == "face" {
//!         reader.load_element()?;
//!         indices.resize(reader.count_triangles("vertex_indices")? * 3, 0u32);
//!         let num_verts = (positions.len() / 3) as u32;
//!         let tris = reader.extract_triangles(
//!             "vertex_indices",
//!             &positions,
//!             num_verts,
//!             &mut indices,
//!         )?;
//!         indices.truncate(tris * 3);
//!     }
//!
//!     reader.next_element()?;
//! }
//! # Ok(())
//! # }
//! ```

mod error;
pub mod header;
pub(crate) mod parse;
pub mod raw;
pub mod read;
pub mod triangulate;

pub use self::{
    error::Error,
    header::{Format, Header, Version},
    raw::{ElementDef, Primitive, PropertyDef, PropertyType, ScalarType, ScalarValue},
    read::{ReadOptions, Reader},
    triangulate::triangulate_polygon,
};
