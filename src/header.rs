//! The PLY header: format, version, comments and the element/property schema.

use std::{
    fmt,
    io::{Read, Seek},
};

use crate::{
    error::Error,
    parse::buf::Buffer,
    raw::{ElementDef, PropertyDef, PropertyType, ScalarType},
};


/// Element and property names longer than this are rejected.
pub const MAX_IDENTIFIER_LEN: usize = 255;

/// The encoding of the data section of a PLY file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Ascii,
    BinaryLittleEndian,
    BinaryBigEndian,
}

impl Format {
    const NAMES: [&'static str; 3] = ["ascii", "binary_little_endian", "binary_big_endian"];
    const ALL: [Format; 3] = [Format::Ascii, Format::BinaryLittleEndian, Format::BinaryBigEndian];

    /// The name as used in the header's `format` line.
    pub fn name(&self) -> &'static str {
        match self {
            Format::Ascii => "ascii",
            Format::BinaryLittleEndian => "binary_little_endian",
            Format::BinaryBigEndian => "binary_big_endian",
        }
    }

    pub fn is_binary(&self) -> bool {
        *self != Format::Ascii
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The version from the `format` line, e.g. `1.0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Everything stored in the header of a PLY file.
#[derive(Debug, Clone, PartialEq)]
pub struct Header {
    pub format: Format,
    pub version: Version,

    /// The text of all `comment` lines (without the keyword).
    pub comments: Vec<String>,

    /// All element definitions in the order they appear in the file.
    pub elements: Vec<ElementDef>,
}

impl Header {
    pub fn find_element(&self, name: &str) -> Option<usize> {
        self.elements.iter().position(|e| e.name == name)
    }
}

/// Prints the header in PLY syntax, with canonical type names and without
/// comments.
impl fmt::Display for Header {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "ply")?;
        writeln!(f, "format {} {}", self.format, self.version)?;
        for elem in &self.elements {
            writeln!(f, "element {} {}", elem.name, elem.count)?;
            for prop in elem.properties.iter() {
                match prop.ty {
                    PropertyType::Scalar(ty) => {
                        writeln!(f, "property {} {}", ty, prop.name)?;
                    }
                    PropertyType::List { len_type, scalar_type } => {
                        writeln!(f, "property list {} {} {}", len_type, scalar_type, prop.name)?;
                    }
                }
            }
        }
        writeln!(f, "end_header")
    }
}


// ===========================================================================
// ===== Parsing
// ===========================================================================

fn malformed<R: Read + Seek>(buf: &Buffer<R>, msg: impl Into<String>) -> Error {
    Error::MalformedHeader {
        msg: msg.into(),
        offset: buf.offset(),
    }
}

/// Moves to the next token. Running out of input in the header is always an
/// error.
fn advance<R: Read + Seek>(buf: &mut Buffer<R>) -> Result<(), Error> {
    if buf.advance()? {
        Ok(())
    } else {
        Err(malformed(buf, "unexpected end of input"))
    }
}

fn next_line<R: Read + Seek>(buf: &mut Buffer<R>) -> Result<(), Error> {
    if buf.next_line()? {
        Ok(())
    } else {
        Err(malformed(buf, "unexpected end of input"))
    }
}

/// Parses a scalar type name (canonical or alias).
fn scalar_type<R: Read + Seek>(buf: &mut Buffer<R>) -> Result<ScalarType, Error> {
    buf.identifier(MAX_IDENTIFIER_LEN)
        .and_then(|name| ScalarType::from_name(&name))
        .ok_or_else(|| malformed(buf, format!("expected type name, found {}", buf.excerpt())))
}

fn identifier<R: Read + Seek>(buf: &mut Buffer<R>, what: &str) -> Result<String, Error> {
    buf.identifier(MAX_IDENTIFIER_LEN).ok_or_else(|| {
        malformed(buf, format!("expected {} name, found {}", what, buf.excerpt()))
    })
}

/// Parses the whole header, leaving `buf` at the start of the data section.
///
/// For binary files, `buf` is switched to binary mode and positioned at the
/// first byte after `end_header\n`. For ASCII files, `buf` is positioned at
/// the first token of the data.
pub(crate) fn parse_header<R: Read + Seek>(buf: &mut Buffer<R>) -> Result<Header, Error> {
    buf.collect_comments(true);

    // ===== Magic number and format line ====================================
    if !buf.keyword(b"ply") {
        return Err(malformed(buf, "not a PLY file (does not start with \"ply\")"));
    }
    next_line(buf)?;

    if !buf.keyword(b"format") {
        return Err(malformed(buf, format!("expected \"format\", found {}", buf.excerpt())));
    }
    advance(buf)?;

    let format = buf.which(&Format::NAMES).map(|i| Format::ALL[i]).ok_or_else(|| {
        malformed(buf, format!(
            "expected \"ascii\", \"binary_little_endian\" or \"binary_big_endian\", found {}",
            buf.excerpt(),
        ))
    })?;
    advance(buf)?;

    let version_part = |buf: &mut Buffer<R>| {
        buf.int_literal()
            .filter(|&v| v >= 0 && v <= i64::from(u32::max_value()))
            .map(|v| v as u32)
            .ok_or_else(|| malformed(buf, format!("invalid version, found {}", buf.excerpt())))
    };
    let major = version_part(buf)?;
    advance(buf)?;
    if !buf.matches(b".") {
        return Err(malformed(buf, format!("expected '.' in version, found {}", buf.excerpt())));
    }
    advance(buf)?;
    let minor = version_part(buf)?;
    next_line(buf)?;

    // ===== Elements and their properties ===================================
    let mut elements: Vec<ElementDef> = Vec::new();
    loop {
        if buf.keyword(b"element") {
            advance(buf)?;
            let name = identifier(buf, "element")?;
            advance(buf)?;

            let count = buf.int_literal().ok_or_else(|| {
                malformed(buf, format!("expected element count, found {}", buf.excerpt()))
            })?;
            if count < 0 || count > i64::from(u32::max_value()) {
                return Err(Error::InvalidCount { what: "element", count });
            }

            elements.push(ElementDef::new(name, count as u32));
            next_line(buf)?;
        } else if buf.keyword(b"property") {
            if elements.is_empty() {
                return Err(malformed(buf, "property definition without preceding element"));
            }
            advance(buf)?;

            let ty = if buf.keyword(b"list") {
                advance(buf)?;
                let len_type = scalar_type(buf)?;
                if !len_type.is_integer() {
                    return Err(malformed(
                        buf,
                        format!("list counts must have an integer type, found '{}'", len_type),
                    ));
                }
                advance(buf)?;
                let scalar_type = scalar_type(buf)?;
                PropertyType::List { len_type, scalar_type }
            } else {
                PropertyType::Scalar(scalar_type(buf)?)
            };
            advance(buf)?;

            let name = identifier(buf, "property")?;
            if let Some(elem) = elements.last_mut() {
                elem.properties.push(PropertyDef::new(name, ty));
            }
            next_line(buf)?;
        } else if buf.keyword(b"end_header") {
            break;
        } else {
            return Err(malformed(buf, format!(
                "expected \"element\", \"property\" or \"end_header\", found {}",
                buf.excerpt(),
            )));
        }
    }

    // `end_header` has to be followed by a line break. The data starts right
    // after it.
    buf.advance()?;
    if !buf.matches(b"\n") {
        return Err(malformed(buf, "expected line break after \"end_header\""));
    }
    buf.accept();

    let comments = buf.take_comments();
    if format.is_binary() {
        buf.set_text_mode(false);
    } else {
        buf.advance()?;
    }

    for elem in &mut elements {
        elem.compute_layout();
    }

    Ok(Header {
        format,
        version: Version { major, minor },
        comments,
        elements,
    })
}
