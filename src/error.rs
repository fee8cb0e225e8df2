use std::io;

use failure::Fail;


/// Everything that can go wrong while reading a PLY file.
///
/// Errors from parsing the header or loading/skipping element data are
/// fatal: the reader cannot resynchronize with the stream afterwards, so it
/// is marked invalid and every later cursor operation returns
/// [`Error::Invalidated`]. Errors from the extraction functions (missing
/// property, wrong property kind, output slice too short) only affect the
/// single call that returned them.
#[derive(Debug, Fail)]
pub enum Error {
    #[fail(display = "IO error: {}", _0)]
    Io(io::Error),

    #[fail(display = "malformed PLY header: {} (at byte {})", msg, offset)]
    MalformedHeader {
        msg: String,
        offset: u64,
    },

    #[fail(display = "malformed PLY data: {} (at byte {})", msg, offset)]
    MalformedData {
        msg: String,
        offset: u64,
    },

    #[fail(display = "truncated PLY data: {}", _0)]
    TruncatedData(String),

    #[fail(display = "invalid {} count: {}", what, count)]
    InvalidCount {
        what: &'static str,
        count: i64,
    },

    #[fail(display = "property '{}' does not exist in the current element", _0)]
    MissingProperty(String),

    /// A list property was requested where a scalar one is required or the
    /// other way around. `expected` is either `"list"` or `"scalar"`.
    #[fail(display = "property '{}' is not a {} property", name, expected)]
    WrongPropertyKind {
        name: String,
        expected: &'static str,
    },

    #[fail(display = "vertex index {} is out of range (number of vertices: {})", index, num_verts)]
    InvalidIndex {
        index: u32,
        num_verts: u32,
    },

    #[fail(display = "output buffer too small: {} values needed, but only {} given", needed, actual)]
    OutputTooSmall {
        needed: usize,
        actual: usize,
    },

    #[fail(display = "there is no current element (all elements have been visited)")]
    NoElement,

    #[fail(display = "the current element has not been loaded")]
    ElementNotLoaded,

    #[fail(display = "the reader is invalid due to an earlier error")]
    Invalidated,
}

impl From<io::Error> for Error {
    fn from(src: io::Error) -> Self {
        if src.kind() == io::ErrorKind::UnexpectedEof {
            Error::TruncatedData(src.to_string())
        } else {
            Error::Io(src)
        }
    }
}
