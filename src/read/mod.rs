//! The streaming [`Reader`].

use std::{
    fs::File,
    io::{Read, Seek},
    path::Path,
};

use byteorder::{BigEndian, LittleEndian};

use crate::{
    error::Error,
    header::{parse_header, Format, Header, Version},
    parse::buf::{Buffer, MIN_BUFFER_SIZE},
    raw::{ElementDef, PropIndex},
};
use self::encoding::{AsciiEncoding, BinaryEncoding, ElementData, EncodingReader};

mod encoding;
mod extract;

#[cfg(test)]
mod tests;


/// Options for reading PLY files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadOptions {
    /// Size of the read buffer in bytes. A single token in the header or in
    /// ASCII data can't be longer than this. Values below 32 are raised to
    /// 32. Default: 128 KiB.
    pub buffer_size: usize,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            buffer_size: 128 * 1024,
        }
    }
}

impl ReadOptions {
    pub fn buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size.max(MIN_BUFFER_SIZE);
        self
    }
}

/// A streaming reader for PLY files.
///
/// The header is parsed when the reader is created. After that, the reader
/// acts as a cursor over the elements of the file, in the order they are
/// declared in the header. For the current element, you can either call
/// [`load_element`](Self::load_element) and then extract properties from it,
/// or just move on with [`next_element`](Self::next_element), in which case
/// the element's data is skipped.
///
/// If loading or skipping an element fails, the reader can't continue and
/// becomes invalid: [`valid`](Self::valid) returns `false` and all cursor
/// operations return [`Error::Invalidated`].
#[derive(Debug)]
pub struct Reader<R> {
    buf: Buffer<R>,
    header: Header,

    /// Index of the current element.
    current: usize,

    /// The data of the current element, if it was loaded.
    data: Option<ElementData>,
    valid: bool,
}

impl Reader<File> {
    /// Tries to open the file specified by the given path and creates a new
    /// `Reader` from that file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        Self::open_with(path, ReadOptions::default())
    }

    pub fn open_with(path: impl AsRef<Path>, options: ReadOptions) -> Result<Self, Error> {
        // We don't need a `BufReader` here, because we use our own read
        // buffer anyway.
        Self::with_options(File::open(path)?, options)
    }
}

impl<R: Read + Seek> Reader<R> {
    /// Creates a new `Reader` from the given input and parses the header.
    ///
    /// If you want to open a file, rather use [`Reader::open`].
    pub fn new(reader: R) -> Result<Self, Error> {
        Self::with_options(reader, ReadOptions::default())
    }

    pub fn with_options(reader: R, options: ReadOptions) -> Result<Self, Error> {
        let mut buf = Buffer::new(reader, options.buffer_size)?;
        let header = parse_header(&mut buf)?;

        log::debug!(
            "parsed PLY header: format {} {}, {} elements, {} comments (buffer size {})",
            header.format,
            header.version,
            header.elements.len(),
            header.comments.len(),
            buf.capacity(),
        );

        Ok(Self {
            buf,
            header,
            current: 0,
            data: None,
            valid: true,
        })
    }

    // ===== Header information ==============================================

    /// Returns `false` if an earlier load or skip failed.
    pub fn valid(&self) -> bool {
        self.valid
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn format(&self) -> Format {
        self.header.format
    }

    pub fn version(&self) -> Version {
        self.header.version
    }

    pub fn comments(&self) -> &[String] {
        &self.header.comments
    }

    pub fn elements(&self) -> &[ElementDef] {
        &self.header.elements
    }

    pub fn num_elements(&self) -> usize {
        self.header.elements.len()
    }

    pub fn get_element(&self, idx: usize) -> Option<&ElementDef> {
        self.header.elements.get(idx)
    }

    /// Returns the index of the element with the given name.
    pub fn find_element(&self, name: &str) -> Option<usize> {
        self.header.find_element(name)
    }

    // ===== Cursor ===========================================================

    /// Returns `true` if the cursor is at an element, i.e. if not all
    /// elements have been visited yet and the reader is valid.
    pub fn has_element(&self) -> bool {
        self.valid && self.current < self.header.elements.len()
    }

    /// The definition of the current element.
    pub fn element(&self) -> Option<&ElementDef> {
        if self.has_element() {
            self.header.elements.get(self.current)
        } else {
            None
        }
    }

    /// Index of the current element. Equal to `num_elements()` once all
    /// elements have been visited.
    pub fn element_index(&self) -> usize {
        self.current
    }

    pub fn is_element_loaded(&self) -> bool {
        self.has_element() && self.data.is_some()
    }

    /// Returns the index of the property `name` in the current element.
    pub fn find_property(&self, name: &str) -> Option<PropIndex> {
        self.element().and_then(|e| e.find_property(name))
    }

    fn check_cursor(&self) -> Result<(), Error> {
        if !self.valid {
            Err(Error::Invalidated)
        } else if !self.has_element() {
            Err(Error::NoElement)
        } else {
            Ok(())
        }
    }

    /// Poisons the reader if `res` is an error.
    fn guard<T>(&mut self, res: Result<T, Error>) -> Result<T, Error> {
        if let Err(e) = &res {
            log::debug!(
                "error in element {} at byte {}, PLY reader is now invalid: {}",
                self.current,
                self.buf.offset(),
                e,
            );
            self.valid = false;
            self.data = None;
        }

        res
    }

    /// Decodes all data of the current element. Does nothing if the element
    /// is already loaded.
    pub fn load_element(&mut self) -> Result<(), Error> {
        self.check_cursor()?;
        if self.data.is_some() {
            return Ok(());
        }

        let def = &self.header.elements[self.current];
        log::trace!("loading element '{}' ({} rows)", def.name, def.count);

        let res = match self.header.format {
            Format::Ascii => AsciiEncoding::load_element(&mut self.buf, def),
            Format::BinaryLittleEndian => {
                BinaryEncoding::<LittleEndian>::load_element(&mut self.buf, def)
            }
            Format::BinaryBigEndian => {
                BinaryEncoding::<BigEndian>::load_element(&mut self.buf, def)
            }
        };

        let data = self.guard(res)?;
        self.data = Some(data);
        Ok(())
    }

    /// Moves the cursor to the next element. If the current element was not
    /// loaded, its data is skipped. If it was loaded, its data is dropped.
    pub fn next_element(&mut self) -> Result<(), Error> {
        self.check_cursor()?;

        if self.data.take().is_none() {
            let def = &self.header.elements[self.current];
            log::trace!("skipping element '{}' ({} rows)", def.name, def.count);

            let res = match self.header.format {
                Format::Ascii => AsciiEncoding::skip_element(&mut self.buf, def),
                Format::BinaryLittleEndian => {
                    BinaryEncoding::<LittleEndian>::skip_element(&mut self.buf, def)
                }
                Format::BinaryBigEndian => {
                    BinaryEncoding::<BigEndian>::skip_element(&mut self.buf, def)
                }
            };
            self.guard(res)?;
        }

        self.current += 1;
        Ok(())
    }

    /// Returns the current element and its data, or an error if there is no
    /// current element or it isn't loaded.
    fn loaded(&self) -> Result<(&ElementDef, &ElementData), Error> {
        self.check_cursor()?;
        match &self.data {
            Some(data) => Ok((&self.header.elements[self.current], data)),
            None => Err(Error::ElementNotLoaded),
        }
    }
}
