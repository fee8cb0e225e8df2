use std::io::Cursor;

use byteorder::{BigEndian, ByteOrder, LittleEndian, WriteBytesExt};

use crate::{
    error::Error,
    header::{Format, Version},
    parse::buf::MIN_BUFFER_SIZE,
};
use super::{ReadOptions, Reader};


fn reader(data: &[u8], buffer_size: usize) -> Result<Reader<Cursor<Vec<u8>>>, Error> {
    let options = ReadOptions::default().buffer_size(buffer_size);
    Reader::with_options(Cursor::new(data.to_vec()), options)
}

const BUFFER_SIZES: &[usize] = &[MIN_BUFFER_SIZE, 40, 64, 128 * 1024];

const ASCII_QUAD_AND_TRI: &[u8] = b"\
    ply\n\
    format ascii 1.0\n\
    comment made by hand\n\
    element vertex 4\n\
    property float x\n\
    property float y\n\
    property float z\n\
    element face 2\n\
    property list uchar int vertex_indices\n\
    end_header\n\
    0 0 0\n\
    1 0 0\n\
    1 1 0\n\
    0 1 0\n\
    3 0 1 2\n\
    4 0 1 2 3\n\
";


// ===========================================================================
// ===== Walking through files
// ===========================================================================

#[test]
fn ascii_mesh() -> Result<(), Error> {
    for &size in BUFFER_SIZES {
        let mut reader = reader(ASCII_QUAD_AND_TRI, size)?;
        assert_eq!(reader.format(), Format::Ascii);
        assert_eq!(reader.version(), Version { major: 1, minor: 0 });
        assert_eq!(reader.num_elements(), 2);
        assert_eq!(reader.find_element("face"), Some(1));
        assert_eq!(reader.find_element("edge"), None);

        // Vertices
        assert!(reader.has_element());
        assert_eq!(reader.element().map(|e| e.name.as_str()), Some("vertex"));
        assert!(!reader.is_element_loaded());
        reader.load_element()?;
        assert!(reader.is_element_loaded());

        let mut positions = [0.0; 12];
        reader.extract_vec3("x", "y", "z", &mut positions)?;
        assert_eq!(positions, [0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 1.0, 0.0, 0.0, 1.0, 0.0]);
        reader.next_element()?;

        // Faces
        assert_eq!(reader.element_index(), 1);
        reader.load_element()?;
        assert_eq!(reader.list_counts("vertex_indices")?, &[3, 4]);
        assert_eq!(reader.sum_of_list_counts("vertex_indices")?, 7);
        assert_eq!(reader.count_triangles("vertex_indices")?, 3);
        assert!(!reader.all_faces_are_triangles("vertex_indices")?);

        let mut raw = [0u8; 7];
        reader.extract_list_property("vertex_indices", &mut raw)?;
        assert_eq!(raw, [0, 1, 2, 0, 1, 2, 3]);

        let mut tris = [0; 9];
        let count = reader.extract_triangles("vertex_indices", &positions, 4, &mut tris)?;
        assert_eq!(count, 3, "buffer size {}", size);
        assert_eq!(tris, [0, 1, 2, 0, 1, 3, 2, 3, 1]);

        reader.next_element()?;
        assert!(!reader.has_element());
        assert!(reader.valid());
        assert_eq!(reader.element_index(), 2);
    }

    Ok(())
}

#[test]
fn ascii_skip_everything() -> Result<(), Error> {
    for &size in BUFFER_SIZES {
        let mut reader = reader(ASCII_QUAD_AND_TRI, size)?;
        reader.next_element()?;
        reader.next_element()?;
        assert!(!reader.has_element());
        assert!(reader.valid());
    }

    Ok(())
}

#[test]
fn ascii_skip_then_load() -> Result<(), Error> {
    for &size in BUFFER_SIZES {
        let mut reader = reader(ASCII_QUAD_AND_TRI, size)?;
        reader.next_element()?;
        reader.load_element()?;
        assert_eq!(reader.list_counts("vertex_indices")?, &[3, 4]);
    }

    Ok(())
}

#[test]
fn ascii_crlf_and_missing_final_newline() -> Result<(), Error> {
    let data = b"\
        ply\r\n\
        format ascii 1.0\r\n\
        element vertex 2\r\n\
        property int a\r\n\
        property short b\r\n\
        end_header\r\n\
        1 -2\r\n  \
        3   4";

    for &size in BUFFER_SIZES {
        let mut reader = reader(data, size)?;
        reader.load_element()?;
        let mut out = [0i32; 4];
        reader.extract_properties(&["a", "b"], &mut out)?;
        assert_eq!(out, [1, -2, 3, 4]);
        reader.next_element()?;
        assert!(!reader.has_element());
    }

    Ok(())
}

#[test]
fn load_twice_is_noop() -> Result<(), Error> {
    let mut reader = reader(ASCII_QUAD_AND_TRI, MIN_BUFFER_SIZE)?;
    reader.load_element()?;
    reader.load_element()?;
    reader.next_element()?;
    reader.load_element()?;
    assert_eq!(reader.count_triangles("vertex_indices")?, 3);
    Ok(())
}

#[test]
fn no_elements() -> Result<(), Error> {
    let mut reader = reader(b"ply\nformat binary_big_endian 1.0\nend_header\n", 64)?;
    assert_eq!(reader.format(), Format::BinaryBigEndian);
    assert!(!reader.has_element());
    assert!(reader.element().is_none());
    assert!(matches!(reader.next_element(), Err(Error::NoElement)));
    assert!(matches!(reader.load_element(), Err(Error::NoElement)));
    Ok(())
}


// ===========================================================================
// ===== Header
// ===========================================================================

#[test]
fn header_comments_and_display() -> Result<(), Error> {
    let data = b"\
        ply\n\
        format binary_little_endian 1.0\n\
        comment first\n\
        element vertex 0\n\
        comment   second one  \n\
        property float32 x\n\
        property list uint8 int32 vertex_indices\n\
        end_header\n";

    // `float32` is not a valid type name.
    assert!(matches!(reader(data, 64), Err(Error::MalformedHeader { .. })));

    let data = String::from_utf8_lossy(data).replace("float32", "float");
    let reader = reader(data.as_bytes(), 64)?;
    assert_eq!(reader.comments(), &["first", "second one"]);

    let expected = "\
        ply\n\
        format binary_little_endian 1.0\n\
        element vertex 0\n\
        property float x\n\
        property list uchar int vertex_indices\n\
        end_header\n";
    let printed = reader.header().to_string();
    assert_eq!(printed, expected);

    // Printing and parsing again results in the same header (minus comments).
    let again = self::reader(printed.as_bytes(), 64)?;
    assert_eq!(again.elements(), reader.elements());
    assert!(again.comments().is_empty());

    Ok(())
}

#[test]
fn header_errors() {
    fn header_error(data: &[u8]) -> Error {
        match reader(data, 64) {
            Ok(_) => panic!("header was accepted: {}", String::from_utf8_lossy(data)),
            Err(e) => e,
        }
    }

    let e = header_error(b"ply\nformat ascii 1.0\nelement vertex -1\nend_header\n");
    assert!(matches!(e, Error::InvalidCount { what: "element", count: -1 }), "{:?}", e);

    let e = header_error(b"ply\nformat ascii 1.0\nelement vertex 4294967296\nend_header\n");
    assert!(matches!(e, Error::InvalidCount { what: "element", .. }), "{:?}", e);

    let malformed: &[&[u8]] = &[
        b"",
        b"plyx\n",
        b"PLY\nformat ascii 1.0\nend_header\n",
        b"ply\nformat ascii\nend_header\n",
        b"ply\nformat binary 1.0\nend_header\n",
        b"ply\nformat ascii 1.0\nproperty float x\nend_header\n",
        b"ply\nformat ascii 1.0\nelement vertex 3\nproperty list float int v\nend_header\n",
        b"ply\nformat ascii 1.0\nelement vertex 3\nproperty float\nend_header\n",
        b"ply\nformat ascii 1.0\nelement vertex 3\nproperty float x\n",
        b"ply\nformat ascii 1.0\nelement vertex 3\nobj_info foo\nend_header\n",
        b"ply\nformat ascii 1.0\nend_header",
    ];
    for data in malformed {
        let e = header_error(data);
        assert!(matches!(e, Error::MalformedHeader { .. }), "{:?}", e);
    }
}


// ===========================================================================
// ===== Errors and poisoning
// ===========================================================================

#[test]
fn cursor_and_extraction_errors() -> Result<(), Error> {
    let mut reader = reader(ASCII_QUAD_AND_TRI, 64)?;
    let mut out = [0.0; 12];

    let res = reader.extract_vec3("x", "y", "z", &mut out);
    assert!(matches!(res, Err(Error::ElementNotLoaded)), "{:?}", res);

    reader.load_element()?;
    let res = reader.extract_vec3("x", "y", "w", &mut out);
    assert!(matches!(res, Err(Error::MissingProperty(ref name)) if name == "w"), "{:?}", res);

    let res = reader.extract_vec3("x", "y", "z", &mut out[..11]);
    assert!(matches!(res, Err(Error::OutputTooSmall { needed: 12, actual: 11 })), "{:?}", res);

    let res = reader.list_counts("x");
    assert!(matches!(res, Err(Error::WrongPropertyKind { expected: "list", .. })), "{:?}", res);

    // None of that broke the reader.
    assert!(reader.valid());
    reader.extract_vec3("x", "y", "z", &mut out)?;
    reader.next_element()?;
    reader.load_element()?;

    let mut idx = [0u32; 7];
    let res = reader.extract_properties(&["vertex_indices"], &mut idx);
    assert!(matches!(res, Err(Error::WrongPropertyKind { expected: "scalar", .. })), "{:?}", res);

    let mut tris = [0u32; 8];
    let res = reader.extract_triangles("vertex_indices", &out, 4, &mut tris);
    assert!(matches!(res, Err(Error::OutputTooSmall { needed: 9, actual: 8 })), "{:?}", res);

    reader.next_element()?;
    let res = reader.list_counts("vertex_indices");
    assert!(matches!(res, Err(Error::NoElement)), "{:?}", res);
    assert!(reader.valid());

    Ok(())
}

#[test]
fn truncated_binary_poisons_reader() -> Result<(), Error> {
    let mut data = b"\
        ply\n\
        format binary_little_endian 1.0\n\
        element vertex 4\n\
        property float x\n\
        property float y\n\
        property float z\n\
        element face 1\n\
        property list uchar int vertex_indices\n\
        end_header\n"
        .to_vec();
    data.extend_from_slice(&[0; 20]);

    let mut reader = reader(&data, MIN_BUFFER_SIZE)?;
    let res = reader.load_element();
    assert!(matches!(res, Err(Error::TruncatedData(_))), "{:?}", res);

    assert!(!reader.valid());
    assert!(!reader.has_element());
    assert!(!reader.is_element_loaded());
    assert!(reader.element().is_none());
    assert!(matches!(reader.load_element(), Err(Error::Invalidated)));
    assert!(matches!(reader.next_element(), Err(Error::Invalidated)));
    assert!(matches!(reader.count_triangles("vertex_indices"), Err(Error::Invalidated)));

    Ok(())
}

#[test]
fn malformed_ascii_data() -> Result<(), Error> {
    let data = b"\
        ply\n\
        format ascii 1.0\n\
        element vertex 2\n\
        property float x\n\
        end_header\n\
        1.5\n\
        abc\n";

    let mut reader = reader(data, 64)?;
    let res = reader.load_element();
    assert!(matches!(res, Err(Error::MalformedData { .. })), "{:?}", res);
    assert!(!reader.valid());
    Ok(())
}

#[test]
fn ascii_too_few_rows() -> Result<(), Error> {
    let data = b"\
        ply\n\
        format ascii 1.0\n\
        element vertex 3\n\
        property float x\n\
        end_header\n\
        1\n\
        2\n";

    let mut reader = reader(data, 64)?;
    let res = reader.load_element();
    assert!(matches!(res, Err(Error::TruncatedData(_))), "{:?}", res);

    let mut reader = self::reader(data, 64)?;
    let res = reader.next_element();
    assert!(matches!(res, Err(Error::TruncatedData(_))), "{:?}", res);
    assert!(!reader.valid());
    Ok(())
}

#[test]
fn negative_list_count() -> Result<(), Error> {
    let data = b"\
        ply\n\
        format ascii 1.0\n\
        element face 1\n\
        property list char int vertex_indices\n\
        end_header\n\
        -1 0 1\n";

    let mut reader = reader(data, 64)?;
    let res = reader.load_element();
    assert!(matches!(res, Err(Error::InvalidCount { what: "list", count: -1 })), "{:?}", res);
    assert!(!reader.valid());
    Ok(())
}

#[test]
fn ascii_list_count_ignores_count_type() -> Result<(), Error> {
    let mut data = b"\
        ply\n\
        format ascii 1.0\n\
        element face 2\n\
        property list uchar int vertex_indices\n\
        end_header\n\
        300"
        .to_vec();
    for i in 0..300 {
        data.extend_from_slice(format!(" {}", i).as_bytes());
    }
    data.extend_from_slice(b"\n3 7 8 9\n");

    for &size in BUFFER_SIZES {
        let mut reader = reader(&data, size)?;
        reader.load_element()?;
        assert_eq!(reader.list_counts("vertex_indices")?, &[300, 3]);

        let mut indices = vec![0u32; 303];
        reader.extract_list_property("vertex_indices", &mut indices)?;
        assert_eq!(indices[299], 299);
        assert_eq!(&indices[300..], &[7, 8, 9]);
    }

    let data = b"\
        ply\n\
        format ascii 1.0\n\
        element face 1\n\
        property list uchar int vertex_indices\n\
        end_header\n\
        -1 0 1\n";
    let mut reader = reader(data, 64)?;
    let res = reader.load_element();
    assert!(matches!(res, Err(Error::InvalidCount { what: "list", count: -1 })), "{:?}", res);
    assert!(!reader.valid());

    Ok(())
}

#[test]
fn skip_truncated_fixed_size_element() -> Result<(), Error> {
    let mut data = b"\
        ply\n\
        format binary_little_endian 1.0\n\
        element vertex 1000\n\
        property float x\n\
        end_header\n"
        .to_vec();
    data.extend_from_slice(&[0; 40]);

    for &size in BUFFER_SIZES {
        let mut reader = reader(&data, size)?;
        let res = reader.next_element();
        assert!(matches!(res, Err(Error::TruncatedData(_))), "{:?}", res);
        assert!(!reader.valid());
    }

    Ok(())
}


// ===========================================================================
// ===== Scalar extraction paths
// ===========================================================================

#[test]
fn vec3_from_doubles() -> Result<(), Error> {
    let data = b"\
        ply\n\
        format ascii 1.0\n\
        element vertex 2\n\
        property double x\n\
        property double y\n\
        property double z\n\
        end_header\n\
        1.5 2.5 3.5\n\
        -1 -2 -3\n";

    let mut reader = reader(data, 64)?;
    reader.load_element()?;

    let mut out = [0.0f32; 6];
    reader.extract_vec3("x", "y", "z", &mut out)?;
    assert_eq!(out, [1.5, 2.5, 3.5, -1.0, -2.0, -3.0]);

    let mut out = [0.0f64; 4];
    reader.extract_properties(&["z", "x"], &mut out)?;
    assert_eq!(out, [3.5, 1.5, -3.0, -1.0]);

    Ok(())
}

#[test]
fn vec_from_scattered_floats() -> Result<(), Error> {
    let data = b"\
        ply\n\
        format ascii 1.0\n\
        element vertex 2\n\
        property float x\n\
        property uchar flags\n\
        property float y\n\
        property float z\n\
        end_header\n\
        1 200 2 3\n\
        4 7 5 6\n";

    let mut reader = reader(data, 64)?;

    // Only looks at the header, so works before loading.
    assert!(reader.has_vec3("x", "y", "z"));
    reader.load_element()?;
    assert!(reader.has_vec2("x", "flags"));
    assert!(!reader.has_vec3("x", "y", "w"));

    let mut out = [0.0; 6];
    reader.extract_vec3("x", "y", "z", &mut out)?;
    assert_eq!(out, [1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);

    // Contiguous, but not at the start of the row.
    let mut out = [0.0; 4];
    reader.extract_vec2("y", "z", &mut out)?;
    assert_eq!(out, [2.0, 3.0, 5.0, 6.0]);

    // Not in file order.
    reader.extract_vec2("z", "x", &mut out)?;
    assert_eq!(out, [3.0, 1.0, 6.0, 4.0]);

    let mut flags = [0u8; 2];
    reader.extract_properties(&["flags"], &mut flags)?;
    assert_eq!(flags, [200, 7]);

    // Larger destinations are fine, the rest is untouched.
    let mut out = [-1.0; 8];
    reader.extract_vec3("x", "y", "z", &mut out)?;
    assert_eq!(out, [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, -1.0, -1.0]);

    Ok(())
}


// ===========================================================================
// ===== Binary
// ===========================================================================

/// Three elements: a large fixed-size one, a variable-size one and the
/// vertices.
fn skip_test_file<B: ByteOrder>(format: &str) -> Result<Vec<u8>, Error> {
    let mut out = format!("\
        ply\n\
        format {} 1.0\n\
        element junk 100\n\
        property double a\n\
        property uchar b\n\
        element face 2\n\
        property list uchar uint vertex_indices\n\
        property ushort tag\n\
        element vertex 3\n\
        property float x\n\
        property float y\n\
        property float z\n\
        end_header\n",
        format,
    ).into_bytes();

    for i in 0..100 {
        out.write_f64::<B>(f64::from(i) * 0.5)?;
        out.write_u8(i as u8)?;
    }

    out.write_u8(3)?;
    for &i in &[0, 1, 2] {
        out.write_u32::<B>(i)?;
    }
    out.write_u16::<B>(7)?;
    out.write_u8(4)?;
    for &i in &[2, 1, 0, 2] {
        out.write_u32::<B>(i)?;
    }
    out.write_u16::<B>(300)?;

    for i in 1..=9 {
        out.write_f32::<B>(i as f32)?;
    }

    Ok(out)
}

fn check_skip_file(data: &[u8], format: Format) -> Result<(), Error> {
    for &size in BUFFER_SIZES {
        // Skip everything but the vertices
        let mut reader = reader(data, size)?;
        assert_eq!(reader.format(), format);
        assert_eq!(reader.elements()[0].row_stride(), 9);
        assert!(!reader.elements()[1].fixed_size());
        reader.next_element()?;
        reader.next_element()?;
        reader.load_element()?;

        let mut positions = [0.0; 9];
        reader.extract_vec3("x", "y", "z", &mut positions)?;
        assert_eq!(positions, [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0]);
        reader.next_element()?;
        assert!(!reader.has_element());

        // Load everything
        let mut reader = self::reader(data, size)?;
        reader.load_element()?;
        let mut a = [0.0f32; 100];
        let mut b = [0u32; 100];
        reader.extract_properties(&["a"], &mut a)?;
        reader.extract_properties(&["b"], &mut b)?;
        assert_eq!(a[99], 49.5);
        assert_eq!(b[42], 42);

        reader.next_element()?;
        reader.load_element()?;
        assert_eq!(reader.list_counts("vertex_indices")?, &[3, 4]);
        let mut tags = [0u16; 2];
        reader.extract_properties(&["tag"], &mut tags)?;
        assert_eq!(tags, [7, 300]);

        let mut tris = [0; 9];
        let count = reader.extract_triangles("vertex_indices", &positions, 3, &mut tris)?;
        assert_eq!(count, 3);
        assert_eq!(tris, [0, 1, 2, 2, 1, 2, 0, 2, 1]);

        reader.next_element()?;
        reader.load_element()?;
        reader.extract_vec3("x", "y", "z", &mut positions)?;
        assert_eq!(positions[8], 9.0);
    }

    Ok(())
}

#[test]
fn binary_little_endian_skip_and_load() -> Result<(), Error> {
    let data = skip_test_file::<LittleEndian>("binary_little_endian")?;
    check_skip_file(&data, Format::BinaryLittleEndian)
}

#[test]
fn binary_big_endian_skip_and_load() -> Result<(), Error> {
    let data = skip_test_file::<BigEndian>("binary_big_endian")?;
    check_skip_file(&data, Format::BinaryBigEndian)
}

#[test]
fn binary_triangle_fast_path() -> Result<(), Error> {
    let mut data = b"\
        ply\n\
        format binary_big_endian 1.0\n\
        element face 2\n\
        property list uchar int vertex_indices\n\
        end_header\n"
        .to_vec();
    for face in &[[5, 6, 7], [7, 6, 8]] {
        data.write_u8(3)?;
        for &i in face {
            data.write_i32::<BigEndian>(i)?;
        }
    }

    let mut reader = reader(&data, MIN_BUFFER_SIZE)?;
    reader.load_element()?;
    assert!(reader.all_faces_are_triangles("vertex_indices")?);

    let mut tris = [0; 6];
    let count = reader.extract_triangles("vertex_indices", &[], 0, &mut tris)?;
    assert_eq!(count, 2);
    assert_eq!(tris, [5, 6, 7, 7, 6, 8]);
    Ok(())
}
