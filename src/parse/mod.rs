//! Low level parsing building blocks: byte classes and stateless recognizers
//! for numeric literals.
//!
//! All recognizers work on a byte slice that starts at the first byte of the
//! literal. The end of the slice is treated like a terminating byte that is
//! neither a digit nor a letter. The tokenizer in [`buf`] makes sure that a
//! literal is never cut in half by the end of its window, so "end of slice"
//! really means "end of token".

pub(crate) mod buf;



/// Literals with more significant digits than this are rejected. This is
/// intentionally conservative: it lets through some values that don't fit
/// into an `i32` (those are narrowed by the caller) and rejects everything
/// that could not possibly fit.
pub(crate) const MAX_INT_DIGITS: usize = 10;


/// Space, tab and carriage return. Newlines are *not* whitespace in this
/// sense as they are significant in the header and in ASCII data.
pub(crate) fn is_whitespace(b: u8) -> bool {
    b == b' ' || b == b'\t' || b == b'\r'
}

pub(crate) fn is_digit(b: u8) -> bool {
    b.is_ascii_digit()
}

pub(crate) fn is_letter(b: u8) -> bool {
    b.is_ascii_alphabetic()
}

pub(crate) fn is_alnum(b: u8) -> bool {
    is_digit(b) || is_letter(b)
}

pub(crate) fn is_keyword_start(b: u8) -> bool {
    is_letter(b) || b == b'_'
}

pub(crate) fn is_keyword_part(b: u8) -> bool {
    is_alnum(b) || b == b'_'
}

/// Returns `true` if the byte can never be part of a token, i.e. if it's
/// safe to let the usable part of the buffer end right after it.
///
/// Newlines are excluded on purpose: `next_line` steps over a `\n` and then
/// immediately looks at the following line, so a `\n` must never be the last
/// usable byte.
pub(crate) fn is_safe_buffer_end(b: u8) -> bool {
    b != b'\n' && ((b > 0 && b <= 32) || b >= 127)
}

/// Returns the byte at `idx` or `0` if `idx` is out of bounds.
fn at(data: &[u8], idx: usize) -> u8 {
    data.get(idx).copied().unwrap_or(0)
}

/// Recognizes an integer literal at the start of `data`.
///
/// Accepts an optional sign, any number of leading zeroes and at most
/// [`MAX_INT_DIGITS`] significant digits. The literal must not be directly
/// followed by a letter or an underscore (`12abc` is rejected). Returns the
/// value and the number of bytes that belong to the literal.
pub(crate) fn int_literal(data: &[u8]) -> Option<(i64, usize)> {
    let mut pos = 0;

    let negative = match at(data, pos) {
        b'-' => { pos += 1; true }
        b'+' => { pos += 1; false }
        _ => false,
    };

    let has_leading_zeroes = at(data, pos) == b'0';
    while at(data, pos) == b'0' {
        pos += 1;
    }

    let mut num_digits = 0;
    let mut value: i64 = 0;
    while is_digit(at(data, pos)) {
        // Can't overflow: we bail out below if we see more than 10 digits,
        // and we only continue accumulating until then.
        if num_digits < MAX_INT_DIGITS {
            value = value * 10 + i64::from(at(data, pos) - b'0');
        }
        num_digits += 1;
        pos += 1;
    }

    if num_digits == 0 && has_leading_zeroes {
        num_digits = 1;
    }

    let next = at(data, pos);
    if num_digits == 0 || is_letter(next) || next == b'_' || num_digits > MAX_INT_DIGITS {
        return None;
    }

    Some((if negative { -value } else { value }, pos))
}

/// Finds the end of a floating point literal at the start of `data` without
/// converting it. Returns the number of bytes belonging to the literal.
fn float_literal_len(data: &[u8]) -> Option<usize> {
    let mut pos = 0;

    if at(data, pos) == b'-' || at(data, pos) == b'+' {
        pos += 1;
    }

    let has_int_digits = is_digit(at(data, pos));
    if has_int_digits {
        while is_digit(at(data, pos)) {
            pos += 1;
        }
    } else if at(data, pos) != b'.' {
        return None;
    }

    if at(data, pos) == b'.' {
        pos += 1;
        let has_frac_digits = is_digit(at(data, pos));
        if has_frac_digits {
            while is_digit(at(data, pos)) {
                pos += 1;
            }
        } else if !has_int_digits {
            // Neither digits before nor after the decimal point
            return None;
        }
    }

    if at(data, pos) == b'e' || at(data, pos) == b'E' {
        pos += 1;
        if at(data, pos) == b'-' || at(data, pos) == b'+' {
            pos += 1;
        }

        if !is_digit(at(data, pos)) {
            return None;
        }
        while is_digit(at(data, pos)) {
            pos += 1;
        }
    }

    let next = at(data, pos);
    if next == b'.' || next == b'_' || is_alnum(next) {
        return None;
    }

    Some(pos)
}

/// Recognizes a floating point literal at the start of `data` and converts
/// it to `f64`. Returns the value and the number of bytes consumed.
///
/// Grammar: `[+-]? digits? ('.' digits?)? ([eE] [+-]? digits)?` with at least
/// one digit before or after the decimal point. The literal must not be
/// followed by an alphanumeric character, `.` or `_`.
pub(crate) fn double_literal(data: &[u8]) -> Option<(f64, usize)> {
    let len = float_literal_len(data)?;
    let s = std::str::from_utf8(&data[..len]).ok()?;
    s.parse::<f64>().ok().map(|v| (v, len))
}

/// Like [`double_literal`], but converts to `f32` directly (correctly
/// rounded, without going through `f64` first).
pub(crate) fn float_literal(data: &[u8]) -> Option<(f32, usize)> {
    let len = float_literal_len(data)?;
    let s = std::str::from_utf8(&data[..len]).ok()?;
    s.parse::<f32>().ok().map(|v| (v, len))
}

/// Formats bytes for error messages: as string if they are valid UTF-8, as
/// byte list otherwise.
pub(crate) fn debug_fmt_bytes(data: &[u8]) -> String {
    if let Ok(s) = std::str::from_utf8(data) {
        format!("{:?}", s)
    } else {
        format!("{:?}", data)
    }
}
