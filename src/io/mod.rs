//! Byte stream abstractions shared by every codec in the crate.
//!
//! All integers on the wire are 32-bit little-endian two's complement.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Seek, SeekFrom, Write};

use crate::error::{Error, Result};

pub trait Reader: Read + Seek {}
impl<T: Read + Seek> Reader for T {}

/// Seeking past the end of a `Writer` and then writing must zero-fill the
/// gap, as files and `Cursor<Vec<u8>>` both do; the planets emitter
/// depends on it.
pub trait Writer: Write + Seek {}
impl<T: Write + Seek> Writer for T {}

pub(crate) fn read_fail(err: &io::Error) -> Error {
    if err.kind() == io::ErrorKind::UnexpectedEof {
        Error::Trunc
    } else {
        Error::ReadFail
    }
}

pub(crate) fn read_i32<R: Read>(reader: &mut R) -> Result<i32> {
    reader.read_i32::<LittleEndian>().map_err(|e| read_fail(&e))
}

pub(crate) fn read_exact<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<()> {
    reader.read_exact(buf).map_err(|e| read_fail(&e))
}

pub(crate) fn write_i32<W: Write>(writer: &mut W, value: i32) -> Result<()> {
    writer
        .write_i32::<LittleEndian>(value)
        .map_err(|_| Error::WriteFail)
}

pub(crate) fn write_all<W: Write>(writer: &mut W, buf: &[u8]) -> Result<()> {
    writer.write_all(buf).map_err(|_| Error::WriteFail)
}

pub(crate) fn seek_to<S: Seek>(stream: &mut S, pos: i64) -> Result<()> {
    if pos < 0 {
        return Err(Error::BadSeek);
    }
    stream
        .seek(SeekFrom::Start(pos as u64))
        .map(|_| ())
        .map_err(|_| Error::BadSeek)
}

pub(crate) fn skip<S: Seek>(stream: &mut S, bytes: i64) -> Result<()> {
    stream
        .seek(SeekFrom::Current(bytes))
        .map(|_| ())
        .map_err(|_| Error::BadSeek)
}

pub(crate) fn tell<S: Seek>(stream: &mut S) -> Result<i64> {
    stream
        .stream_position()
        .map(|pos| pos as i64)
        .map_err(|_| Error::BadTell)
}

/// Fails with `TooLong` unless the reader is at end of input.
pub(crate) fn expect_eof<R: Read>(reader: &mut R) -> Result<()> {
    let mut byte = [0u8; 1];
    match reader.read(&mut byte) {
        Ok(0) => Ok(()),
        Ok(_) => Err(Error::TooLong),
        Err(e) => Err(read_fail(&e)),
    }
}
