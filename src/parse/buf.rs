use std::{
    cmp::min,
    fmt,
    io::{self, Read, Seek, SeekFrom},
};

use crate::error::Error;
use super::{
    double_literal, float_literal, int_literal, is_keyword_part, is_keyword_start,
    is_safe_buffer_end, is_whitespace,
};


/// The smallest buffer we allow. Any smaller and the longest header keyword
/// (`binary_little_endian` plus separator) might not fit anymore. This is
/// also a good size for tests as it forces a refill every few tokens.
pub(crate) const MIN_BUFFER_SIZE: usize = 32;

/// A fixed capacity read window over some input, with a tokenizer on top.
///
/// The window always holds the bytes `buf[..filled]`, which start at the
/// absolute input offset `buf_offset`. The tokenizer looks at the bytes
/// `buf[pos..end]` (the current token) and never beyond `buf_end`.
///
/// In *text mode* (header and ASCII data), `buf_end` is placed right after
/// the last byte that can never be part of a token (see
/// [`is_safe_buffer_end`]). That way a token is never split by a refill and
/// every scanner can treat `buf_end` as the end of its token. The bytes in
/// `buf[buf_end..filled]` are kept and moved to the front on the next refill.
/// In binary mode, `buf_end == filled`.
pub(crate) struct Buffer<R> {
    reader: R,
    buf: Box<[u8]>,

    /// Start of the current token.
    pos: usize,

    /// End of the current token (exclusive). Always `pos <= end <= buf_end`.
    end: usize,

    /// End of the bytes the tokenizer may look at.
    buf_end: usize,

    /// Number of bytes in `buf` that hold input data.
    filled: usize,

    /// Absolute offset of `buf[0]` in the input.
    buf_offset: u64,

    /// `true` once `reader` returned 0 bytes.
    at_eof: bool,

    text_mode: bool,

    /// If `Some`, the text of all skipped comment lines is pushed here.
    comments: Option<Vec<String>>,
}

impl<R: Read + Seek> Buffer<R> {
    /// Creates a new buffer with the given capacity (which is at least
    /// [`MIN_BUFFER_SIZE`]) and performs the first read. The buffer starts
    /// in text mode.
    pub(crate) fn new(reader: R, capacity: usize) -> Result<Self, Error> {
        let capacity = capacity.max(MIN_BUFFER_SIZE);
        let mut out = Self {
            reader,
            buf: vec![0; capacity].into_boxed_slice(),
            pos: 0,
            end: 0,
            buf_end: 0,
            filled: 0,
            buf_offset: 0,
            at_eof: false,
            text_mode: true,
            comments: None,
        };

        out.refill()?;
        Ok(out)
    }

    // ===== Window management ================================================

    /// Moves everything not yet consumed (`buf[pos..filled]`) to the front and
    /// reads more data from the input until the buffer is full or the input
    /// is exhausted.
    ///
    /// Returns `Ok(false)` if no new bytes became available to the tokenizer.
    /// In text mode, returns `TruncatedData` if the window is full but
    /// contains no position to split safely, which means that one token is
    /// longer than the whole buffer.
    pub(crate) fn refill(&mut self) -> Result<bool, Error> {
        if self.at_eof && self.buf_end == self.filled {
            return Ok(false);
        }

        if self.pos == 0 && self.filled == self.buf.len() {
            return Err(self.token_too_long());
        }

        // Binary reads move `pos` without touching `end`.
        self.end = self.end.max(self.pos);
        self.buf_end = self.buf_end.max(self.pos);

        // Shift the unconsumed tail to the front.
        let shift = self.pos;
        self.buf.copy_within(shift..self.filled, 0);
        self.buf_offset += shift as u64;
        self.filled -= shift;
        self.buf_end -= shift;
        self.end -= shift;
        self.pos = 0;
        let prev_buf_end = self.buf_end;

        while self.filled < self.buf.len() && !self.at_eof {
            match self.reader.read(&mut self.buf[self.filled..]) {
                Ok(0) => self.at_eof = true,
                Ok(n) => self.filled += n,
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }
        }

        if !self.text_mode || self.at_eof {
            self.buf_end = self.filled;
        } else {
            // The buffer is full and the input continues: rewind the usable
            // end to right after the last safe byte. If there is none (e.g.
            // the binary body following the header is all zeroes), the last
            // newline works as well, as `next_line` refills when it lands on
            // the window end.
            let tail = &self.buf[self.end..self.filled];
            let safe = tail.iter()
                .rposition(|&b| is_safe_buffer_end(b))
                .or_else(|| tail.iter().rposition(|&b| b == b'\n'))
                .ok_or_else(|| self.token_too_long())?;
            self.buf_end = self.end + safe + 1;
        }

        if self.buf_end > prev_buf_end {
            Ok(true)
        } else if self.at_eof {
            Ok(false)
        } else {
            Err(self.token_too_long())
        }
    }

    fn token_too_long(&self) -> Error {
        Error::TruncatedData(format!(
            "token at byte {} is longer than the read buffer ({} bytes)",
            self.offset(),
            self.buf.len(),
        ))
    }

    /// Switches between text mode (header, ASCII data) and binary mode.
    pub(crate) fn set_text_mode(&mut self, text_mode: bool) {
        self.text_mode = text_mode;
        if !text_mode {
            self.buf_end = self.filled;
        }
    }

    /// Starts or stops collecting the text of skipped comment lines.
    pub(crate) fn collect_comments(&mut self, collect: bool) {
        self.comments = if collect { Some(Vec::new()) } else { None };
    }

    /// Returns all comments collected since the last call and stops
    /// collecting.
    pub(crate) fn take_comments(&mut self) -> Vec<String> {
        self.comments.take().unwrap_or_default()
    }

    /// The absolute input offset of the start of the current token.
    pub(crate) fn offset(&self) -> u64 {
        self.buf_offset + self.pos as u64
    }

    pub(crate) fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Returns the byte `i` bytes after the token start or `0` if that's
    /// outside of the usable window.
    pub(crate) fn peek(&self, i: usize) -> u8 {
        let idx = self.pos + i;
        if idx < self.buf_end { self.buf[idx] } else { 0 }
    }

    /// The usable window starting at the token start.
    fn window(&self) -> &[u8] {
        &self.buf[self.pos..self.buf_end]
    }

    // ===== Text tokenizer ===================================================

    /// Moves to the end of the current token and skips whitespace (not
    /// newlines), refilling as necessary. Returns `Ok(false)` if the input
    /// ended.
    pub(crate) fn advance(&mut self) -> Result<bool, Error> {
        self.pos = self.end;
        loop {
            while self.pos < self.buf_end && is_whitespace(self.buf[self.pos]) {
                self.pos += 1;
            }
            self.end = self.pos;

            if self.pos < self.buf_end {
                return Ok(true);
            }
            if !self.refill()? {
                return Ok(false);
            }
        }
    }

    /// Moves to the start of the next line that is not a comment line.
    /// Returns `Ok(false)` if the input ended before a `\n` was found.
    pub(crate) fn next_line(&mut self) -> Result<bool, Error> {
        self.pos = self.end;
        if !self.skip_past_newline(false)? {
            return Ok(false);
        }

        while self.matches(b"comment") {
            self.pos = self.end;
            if !self.skip_past_newline(self.comments.is_some())? {
                return Ok(false);
            }
        }

        Ok(true)
    }

    /// Moves `pos` right after the next `\n`. If `record` is set, the bytes
    /// skipped over are stored as comment.
    fn skip_past_newline(&mut self, record: bool) -> Result<bool, Error> {
        let mut line = Vec::new();
        loop {
            match self.window().iter().position(|&b| b == b'\n') {
                Some(i) => {
                    if record {
                        line.extend_from_slice(&self.buf[self.pos..self.pos + i]);
                    }
                    self.pos += i + 1;
                    self.end = self.pos;
                    if self.pos == self.buf_end {
                        self.refill()?;
                    }
                    break;
                }
                None => {
                    if record {
                        line.extend_from_slice(self.window());
                    }
                    self.pos = self.buf_end;
                    self.end = self.pos;
                    if !self.refill()? {
                        return Ok(false);
                    }
                }
            }
        }

        if let Some(comments) = &mut self.comments {
            if record {
                let text = String::from_utf8_lossy(&line);
                comments.push(text.trim().to_string());
            }
        }

        Ok(true)
    }

    /// Checks if the token starting at `pos` begins with `text`. If so, the
    /// current token is set to exactly `text`.
    pub(crate) fn matches(&mut self, text: &[u8]) -> bool {
        if self.window().starts_with(text) {
            self.end = self.pos + text.len();
            true
        } else {
            self.end = self.pos;
            false
        }
    }

    /// Like [`matches`](Self::matches), but `text` must not be directly
    /// followed by a character that could continue an identifier.
    pub(crate) fn keyword(&mut self, text: &[u8]) -> bool {
        self.matches(text) && !is_keyword_part(self.peek(text.len()))
    }

    /// Returns the index of the first of the given keywords that matches.
    pub(crate) fn which(&mut self, keywords: &[&str]) -> Option<usize> {
        keywords.iter().position(|k| self.keyword(k.as_bytes()))
    }

    /// Recognizes an identifier (letter or `_`, followed by letters, digits
    /// and `_`) of at most `max_len` bytes.
    pub(crate) fn identifier(&mut self, max_len: usize) -> Option<String> {
        self.end = self.pos;
        if !is_keyword_start(self.peek(0)) {
            return None;
        }

        let len = self.window().iter().take_while(|&&b| is_keyword_part(b)).count();
        if len > max_len {
            return None;
        }

        self.end = self.pos + len;
        Some(String::from_utf8_lossy(&self.buf[self.pos..self.end]).into_owned())
    }

    /// Consumes the current token.
    pub(crate) fn accept(&mut self) {
        self.pos = self.end;
    }

    pub(crate) fn int_literal(&mut self) -> Option<i64> {
        let (v, len) = int_literal(self.window())?;
        self.end = self.pos + len;
        Some(v)
    }

    pub(crate) fn float_literal(&mut self) -> Option<f32> {
        let (v, len) = float_literal(self.window())?;
        self.end = self.pos + len;
        Some(v)
    }

    pub(crate) fn double_literal(&mut self) -> Option<f64> {
        let (v, len) = double_literal(self.window())?;
        self.end = self.pos + len;
        Some(v)
    }

    /// Returns a short excerpt starting at the current position, for error
    /// messages.
    pub(crate) fn excerpt(&self) -> String {
        let window = self.window();
        let len = window.iter().position(|&b| b == b'\n').unwrap_or(window.len());
        super::debug_fmt_bytes(&window[..min(len, 20)])
    }

    // ===== Binary primitives ================================================

    /// Makes sure at least `n` bytes are in the buffer, starting at `pos`.
    pub(crate) fn ensure(&mut self, n: usize) -> Result<(), Error> {
        if self.filled - self.pos >= n {
            return Ok(());
        }
        if n > self.buf.len() {
            return Err(Error::TruncatedData(format!(
                "{} bytes requested at once, but the read buffer only holds {}",
                n,
                self.buf.len(),
            )));
        }

        self.refill()?;
        if self.filled - self.pos < n {
            return Err(Error::TruncatedData(format!(
                "expected {} more bytes at byte {}, but input ended after {}",
                n,
                self.offset(),
                self.filled - self.pos,
            )));
        }

        Ok(())
    }

    /// Consumes the next `n` bytes and returns them.
    pub(crate) fn take(&mut self, n: usize) -> Result<&[u8], Error> {
        self.ensure(n)?;
        let start = self.pos;
        self.pos += n;
        self.end = self.pos;
        Ok(&self.buf[start..start + n])
    }

    /// Fills `dst` with the next bytes of input. Works in chunks, so `dst`
    /// can be larger than the buffer.
    pub(crate) fn copy_to(&mut self, dst: &mut [u8]) -> Result<(), Error> {
        let mut done = 0;
        while done < dst.len() {
            self.end = self.pos;
            if self.pos == self.filled && !self.refill()? {
                return Err(Error::TruncatedData(format!(
                    "expected {} more bytes at byte {}",
                    dst.len() - done,
                    self.offset(),
                )));
            }

            let chunk = min(self.filled - self.pos, dst.len() - done);
            dst[done..done + chunk].copy_from_slice(&self.buf[self.pos..self.pos + chunk]);
            self.pos += chunk;
            done += chunk;
        }

        self.end = self.pos;
        Ok(())
    }

    /// Skips the next `n` bytes of input. If that goes beyond the buffered
    /// data, the input is seeked directly and the buffer is emptied.
    pub(crate) fn skip_bytes(&mut self, n: u64) -> Result<(), Error> {
        let available = (self.filled - self.pos) as u64;
        if n <= available {
            self.pos += n as usize;
            self.end = self.pos;
            return Ok(());
        }

        // The input is positioned right after the filled part of the buffer.
        // Seeking past the end succeeds, so check against the length first.
        let rest = n - available;
        let here = self.reader.seek(SeekFrom::Current(0))?;
        let len = self.reader.seek(SeekFrom::End(0))?;
        let target = here.checked_add(rest).filter(|&t| t <= len).ok_or_else(|| {
            Error::TruncatedData(format!(
                "cannot skip {} bytes at byte {}, input ends after {}",
                n,
                self.offset(),
                len.saturating_sub(here) + available,
            ))
        })?;
        self.reader.seek(SeekFrom::Start(target))?;

        self.buf_offset += self.filled as u64 + rest;
        self.pos = 0;
        self.end = 0;
        self.buf_end = 0;
        self.filled = 0;
        self.at_eof = false;
        Ok(())
    }
}

impl<R> fmt::Debug for Buffer<R> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Buffer")
            .field("capacity", &self.buf.len())
            .field("pos", &self.pos)
            .field("end", &self.end)
            .field("buf_end", &self.buf_end)
            .field("filled", &self.filled)
            .field("buf_offset", &self.buf_offset)
            .field("at_eof", &self.at_eof)
            .field("text_mode", &self.text_mode)
            .finish()
    }
}
