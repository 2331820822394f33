//! The native sky colours format: two scalars followed by 126 dithered
//! colour bands.
//!
//! Each band occupies two 4-pixel rows. The first row of the pair dithers
//! the band's colour with the colour of the band below it; the second row
//! is the plain colour.

use byteorder::{LittleEndian, ReadBytesExt};
use log::debug;
use std::io::{self, Read};

use crate::error::{Error, Result};
use crate::io::{self as stream, Reader, Writer};

/// Number of editable colour bands in a sky.
pub const BANDS: usize = 126;

/// Pixels per bitmap row.
pub const SKY_WIDTH: i32 = 4;

/// Bitmap rows: a dither row and a plain row per band.
pub const SKY_ROWS: i32 = 2 * BANDS as i32;

pub const SKY_BITMAP_SIZE: usize = (SKY_WIDTH * SKY_ROWS) as usize;
pub const SKY_HDR_SIZE: i64 = 8;

pub const RENDER_OFFSET_MIN: i32 = 0;
pub const RENDER_OFFSET_MAX: i32 = 3648;
pub const STARS_HEIGHT_MIN: i32 = -32768;
pub const STARS_HEIGHT_MAX: i32 = 3648;

/// The two scalars at the front of a native sky file.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct SkyHeader {
    /// Compression offset of the colour bands at ground level.
    pub render_offset: i32,
    /// Minimum height at which to plot stars.
    pub stars_height: i32,
}

impl SkyHeader {
    pub(crate) fn read_raw<R: Reader>(reader: &mut R) -> Result<Self> {
        Ok(Self {
            render_offset: stream::read_i32(reader)?,
            stars_height: stream::read_i32(reader)?,
        })
    }

    pub fn read<R: Reader>(reader: &mut R) -> Result<Self> {
        let hdr = Self::read_raw(reader)?;
        if hdr.render_offset < RENDER_OFFSET_MIN || hdr.render_offset > RENDER_OFFSET_MAX {
            return Err(Error::BadRend);
        }
        if hdr.stars_height < STARS_HEIGHT_MIN || hdr.stars_height > STARS_HEIGHT_MAX {
            return Err(Error::BadStar);
        }
        Ok(hdr)
    }

    pub fn write<W: Writer>(&self, writer: &mut W) -> Result<()> {
        debug_assert!(self.render_offset >= RENDER_OFFSET_MIN);
        debug_assert!(self.render_offset <= RENDER_OFFSET_MAX);
        debug_assert!(self.stars_height >= STARS_HEIGHT_MIN);
        debug_assert!(self.stars_height <= STARS_HEIGHT_MAX);
        stream::write_i32(writer, self.render_offset)?;
        stream::write_i32(writer, self.stars_height)
    }

    /// Forces the render offset within bounds. Returns whether it changed.
    pub fn fix_render(&mut self) -> bool {
        if self.render_offset < RENDER_OFFSET_MIN {
            self.render_offset = RENDER_OFFSET_MIN;
        } else if self.render_offset > RENDER_OFFSET_MAX {
            self.render_offset = RENDER_OFFSET_MAX;
        } else {
            return false;
        }
        true
    }

    /// Forces the stars height within bounds. Returns whether it changed.
    pub fn fix_stars(&mut self) -> bool {
        if self.stars_height < STARS_HEIGHT_MIN {
            self.stars_height = STARS_HEIGHT_MIN;
        } else if self.stars_height > STARS_HEIGHT_MAX {
            self.stars_height = STARS_HEIGHT_MAX;
        } else {
            return false;
        }
        true
    }
}

/// A sky definition: 126 colour bands plus the two header scalars.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Sky {
    render_offset: i32,
    stars_height: i32,
    bands: [u8; BANDS],
}

impl Default for Sky {
    fn default() -> Self {
        Self {
            render_offset: 0,
            stars_height: 0,
            bands: [0; BANDS],
        }
    }
}

fn short_file(err: &io::Error) -> Error {
    if err.kind() == io::ErrorKind::UnexpectedEof {
        Error::TooShort
    } else {
        Error::ReadFail
    }
}

impl Sky {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn colour(&self, pos: usize) -> u8 {
        self.bands[pos]
    }

    pub fn set_colour(&mut self, pos: usize, colour: u8) {
        self.bands[pos] = colour;
    }

    #[must_use]
    pub fn bands(&self) -> &[u8; BANDS] {
        &self.bands
    }

    #[must_use]
    pub fn render_offset(&self) -> i32 {
        self.render_offset
    }

    pub fn set_render_offset(&mut self, render_offset: i32) {
        debug_assert!(render_offset >= RENDER_OFFSET_MIN);
        debug_assert!(render_offset <= RENDER_OFFSET_MAX);
        self.render_offset = render_offset;
    }

    #[must_use]
    pub fn stars_height(&self) -> i32 {
        self.stars_height
    }

    pub fn set_stars_height(&mut self, stars_height: i32) {
        debug_assert!(stars_height >= STARS_HEIGHT_MIN);
        debug_assert!(stars_height <= STARS_HEIGHT_MAX);
        self.stars_height = stars_height;
    }

    /// Reads a sky file in the game's native format.
    pub fn read<R: Reader>(reader: &mut R) -> Result<Self> {
        let mut sky = Self::default();

        sky.render_offset = reader
            .read_i32::<LittleEndian>()
            .map_err(|e| short_file(&e))?;
        if sky.render_offset < RENDER_OFFSET_MIN || sky.render_offset > RENDER_OFFSET_MAX {
            return Err(Error::BadRend);
        }

        sky.stars_height = reader
            .read_i32::<LittleEndian>()
            .map_err(|e| short_file(&e))?;
        if sky.stars_height < STARS_HEIGHT_MIN || sky.stars_height > STARS_HEIGHT_MAX {
            return Err(Error::BadStar);
        }

        let width = SKY_WIDTH as usize;
        let mut prev = 0u8;
        for pos in 0..BANDS {
            let mut pair = [0u8; 2 * SKY_WIDTH as usize];
            reader.read_exact(&mut pair).map_err(|e| short_file(&e))?;
            let (dither, plain) = pair.split_at(width);

            // The second row of each pair is the plain colour.
            let colour = plain[0];

            // The first band has no predecessor to dither with, so both of
            // its rows are plain.
            if pos == 0 {
                prev = colour;
            }

            // Alternate pixels of the dither row must be identical.
            for i in 2..width {
                if dither[i] != dither[i - 2] {
                    return Err(Error::BadDither);
                }
            }

            // Every dither pixel must be one of the two colours being
            // mixed; the exact alignment of the pattern is not enforced.
            for &pixel in dither {
                if pixel != prev && pixel != colour {
                    return Err(Error::BadDither);
                }
            }

            for &pixel in &plain[1..] {
                if pixel != colour {
                    return Err(Error::BadDither);
                }
            }

            sky.bands[pos] = colour;
            prev = colour;
        }

        stream::expect_eof(reader)?;
        debug!("read sky: render offset {}, stars height {}", sky.render_offset, sky.stars_height);
        Ok(sky)
    }

    /// Writes the sky file in the game's native format.
    pub fn write<W: Writer>(&self, writer: &mut W) -> Result<()> {
        stream::write_i32(writer, self.render_offset)?;
        stream::write_i32(writer, self.stars_height)?;

        let width = SKY_WIDTH as usize;
        let mut prev = self.bands[0];
        for (pos, &colour) in self.bands.iter().enumerate() {
            let mut row = [0u8; SKY_WIDTH as usize];

            for (i, pixel) in row.iter_mut().enumerate() {
                *pixel = if (pos + i) % 2 == 1 { prev } else { colour };
            }
            stream::write_all(writer, &row)?;

            for pixel in &mut row {
                *pixel = colour;
            }
            stream::write_all(writer, &row)?;

            prev = colour;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn banded_sky() -> Sky {
        let mut sky = Sky::new();
        for pos in 0..BANDS {
            sky.set_colour(pos, if pos % 2 == 1 { pos as u8 } else { 255 - pos as u8 });
        }
        sky.set_render_offset(10);
        sky.set_stars_height(-99);
        sky
    }

    #[test]
    fn read_write_round_trip() {
        let sky = banded_sky();
        let mut buffer = Cursor::new(Vec::new());
        sky.write(&mut buffer).unwrap();
        assert_eq!(buffer.get_ref().len(), (SKY_HDR_SIZE as usize) + SKY_BITMAP_SIZE);

        buffer.set_position(0);
        assert_eq!(Sky::read(&mut buffer).unwrap(), sky);
    }

    #[test]
    fn read_empty_is_too_short() {
        let mut empty = Cursor::new(Vec::new());
        assert_eq!(Sky::read(&mut empty), Err(Error::TooShort));
    }

    #[test]
    fn read_overlong_fails() {
        let mut buffer = Cursor::new(Vec::new());
        banded_sky().write(&mut buffer).unwrap();
        buffer.get_mut().push(0x43);
        buffer.set_position(0);
        assert_eq!(Sky::read(&mut buffer), Err(Error::TooLong));
    }

    #[test]
    fn read_rejects_broken_dither() {
        let mut buffer = Cursor::new(Vec::new());
        banded_sky().write(&mut buffer).unwrap();
        // Corrupt one pixel of the dither row of band 40.
        let offset = (SKY_HDR_SIZE as usize) + 40 * 8 + 1;
        buffer.get_mut()[offset] ^= 0x55;
        buffer.set_position(0);
        assert_eq!(Sky::read(&mut buffer), Err(Error::BadDither));
    }

    #[test]
    fn read_rejects_bad_scalars() {
        let mut buffer = Cursor::new(Vec::new());
        banded_sky().write(&mut buffer).unwrap();
        buffer.get_mut()[0..4].copy_from_slice(&(-1i32).to_le_bytes());
        buffer.set_position(0);
        assert_eq!(Sky::read(&mut buffer), Err(Error::BadRend));
    }
}
