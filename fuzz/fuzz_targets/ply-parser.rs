#![no_main]

use std::io::Cursor;
use libfuzzer_sys::fuzz_target;
use plystream::{ReadOptions, Reader};

/// Loads every element and extracts whatever the usual mesh properties are
/// present. Errors are fine, we are only interested in panics.
fn read_all(data: &[u8]) -> Result<(), plystream::Error> {
    let options = ReadOptions::default().buffer_size(64);
    let mut reader = Reader::with_options(Cursor::new(data), options)?;

    let mut positions = Vec::new();
    while reader.has_element() {
        reader.load_element()?;
        let count = reader.element().map(|e| e.count as usize).unwrap_or(0);

        if reader.has_vec3("x", "y", "z") && count < 1 << 16 {
            positions.resize(count * 3, 0.0);
            reader.extract_vec3("x", "y", "z", &mut positions)?;
        }
        if let Ok(tris) = reader.count_triangles("vertex_indices") {
            let mut indices = vec![0u32; tris * 3];
            let num_verts = (positions.len() / 3) as u32;
            reader.extract_triangles("vertex_indices", &positions, num_verts, &mut indices)?;
        }

        reader.next_element()?;
    }

    Ok(())
}

fuzz_target!(|data: &[u8]| {
    let _ = read_all(data);
});
