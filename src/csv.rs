//! Minimal comma-separated-value helpers for the metadata bridges.

use std::io::Read;

use crate::error::{Error, Result};
use crate::io::{self, Reader};

/// Most text the CSV importers will accept.
pub(crate) const MAX_TEXT: usize = 255;

/// Reads the whole input as text, failing with `StrOFlo` once it exceeds
/// [`MAX_TEXT`] bytes.
pub(crate) fn read_text<R: Reader>(reader: &mut R) -> Result<String> {
    let mut buf = [0u8; MAX_TEXT + 1];
    let mut len = 0;
    while len < buf.len() {
        match reader.read(&mut buf[len..]) {
            Ok(0) => break,
            Ok(n) => len += n,
            Err(e) => return Err(io::read_fail(&e)),
        }
    }
    if len > MAX_TEXT {
        return Err(Error::StrOFlo);
    }
    Ok(String::from_utf8_lossy(&buf[..len]).into_owned())
}

/// Parses one CSV record into integers, one per comma-separated field.
/// Each field is read like `strtol`: optional whitespace and sign, then
/// the longest run of digits; anything unparsable counts as zero.
pub(crate) fn parse_record(line: &str) -> Vec<i32> {
    line.split(',').map(parse_int).collect()
}

fn parse_int(field: &str) -> i32 {
    let s = field.trim_start();
    let bytes = s.as_bytes();
    let mut end = 0;
    if end < bytes.len() && (bytes[end] == b'+' || bytes[end] == b'-') {
        end += 1;
    }
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    s[..end].parse().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn parses_signed_fields() {
        assert_eq!(parse_record("1,-2, +3,junk"), [1, -2, 3, 0]);
        assert_eq!(parse_record("12abc"), [12]);
        assert_eq!(parse_record(""), [0]);
    }

    #[test]
    fn caps_input_length() {
        let mut reader = Cursor::new(vec![b'1'; MAX_TEXT]);
        assert!(read_text(&mut reader).is_ok());

        let mut reader = Cursor::new(vec![b'1'; MAX_TEXT + 1]);
        assert_eq!(read_text(&mut reader), Err(Error::StrOFlo));
    }
}
