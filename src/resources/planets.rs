//! The native planet images format.
//!
//! Each planet ships two copies of the same bitmap: copy A is the visible
//! pixels left-aligned with a two-pixel black margin on the right, copy B
//! has the margin on the left. The game composites the pair at half-word
//! offsets.

use crate::error::{Error, Result};
use crate::io::{self, Reader, Writer};

/// Stored bitmap width, including the margin.
pub const PLANET_WIDTH: i32 = 36;
pub const PLANET_HEIGHT: i32 = 36;
pub const PLANET_MARGIN: usize = 2;
pub const PLANET_BITMAP_SIZE: usize = (PLANET_WIDTH * PLANET_HEIGHT) as usize;

/// Width of a planet as exposed in a sprite area.
pub const PLANET_SPR_WIDTH: i32 = PLANET_WIDTH - PLANET_MARGIN as i32;
pub const PLANET_SPR_BITMAP_SIZE: usize = PLANET_BITMAP_SIZE;

/// Highest permitted image number.
pub const PLANET_MAX: i32 = 1;

pub const PLANETS_HDR_SIZE: i32 = 36;

/// Refuse files more than double the expected maximum size.
pub const PLANETS_FILE_SIZE_MAX: i32 =
    2 * (PLANETS_HDR_SIZE + 2 * 2 * PLANET_BITMAP_SIZE as i32);

/// Where the game paints a planet, relative to the viewport.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct PaintOffset {
    pub x: i32,
    pub y: i32,
}

impl PaintOffset {
    /// Forces the offset within `[-width, 0] x [-height, 0]`. Returns
    /// whether anything changed.
    pub fn fix(&mut self) -> bool {
        let mut fixed = false;
        if self.x > 0 || self.x < -PLANET_WIDTH {
            self.x = if self.x > 0 { 0 } else { -PLANET_WIDTH };
            fixed = true;
        }
        if self.y > 0 || self.y < -PLANET_HEIGHT {
            self.y = if self.y > 0 { 0 } else { -PLANET_HEIGHT };
            fixed = true;
        }
        fixed
    }

    fn in_range(self) -> bool {
        (-PLANET_WIDTH..=0).contains(&self.x) && (-PLANET_HEIGHT..=0).contains(&self.y)
    }
}

/// File offsets of the two copies of one planet bitmap.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct BitmapOffsets {
    pub image_a: i32,
    pub image_b: i32,
}

/// Header of a native planet images file.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PlanetsHeader {
    pub last_image_num: i32,
    pub paint_coords: [PaintOffset; (PLANET_MAX + 1) as usize],
    pub data_offsets: [BitmapOffsets; (PLANET_MAX + 1) as usize],
}

impl Default for PlanetsHeader {
    /// An empty header with the bitmap copies packed contiguously after
    /// the header.
    fn default() -> Self {
        let mut data_offsets = [BitmapOffsets {
            image_a: 0,
            image_b: 0,
        }; (PLANET_MAX + 1) as usize];
        let mut expected = PLANETS_HDR_SIZE;
        for offsets in &mut data_offsets {
            offsets.image_a = expected;
            expected += PLANET_BITMAP_SIZE as i32;
            offsets.image_b = expected;
            expected += PLANET_BITMAP_SIZE as i32;
        }
        Self {
            last_image_num: -1,
            paint_coords: [PaintOffset::default(); (PLANET_MAX + 1) as usize],
            data_offsets,
        }
    }
}

impl PlanetsHeader {
    pub fn read<R: Reader>(reader: &mut R) -> Result<Self> {
        let mut hdr = Self {
            last_image_num: io::read_i32(reader)?,
            ..Self::default()
        };

        if hdr.last_image_num < 0 || hdr.last_image_num > PLANET_MAX {
            return Err(Error::BadNumGfx);
        }
        let nimages = (hdr.last_image_num + 1) as usize;

        for coords in &mut hdr.paint_coords[..nimages] {
            coords.x = io::read_i32(reader)?;
            coords.y = io::read_i32(reader)?;
            if !coords.in_range() {
                return Err(Error::BadPaintOff);
            }
        }

        // The header always reserves space for the maximum number of
        // coordinate pairs.
        let unread = (PLANET_MAX + 1) as i64 - nimages as i64;
        io::skip(reader, unread * 8)?;

        let bitmap = PLANET_BITMAP_SIZE as i32;
        let mut min_offset = PLANETS_HDR_SIZE;
        for offsets in &mut hdr.data_offsets[..nimages] {
            offsets.image_a = io::read_i32(reader)?;
            offsets.image_b = io::read_i32(reader)?;

            if offsets.image_a < min_offset
                || offsets.image_b < bitmap
                || offsets.image_b - bitmap < offsets.image_a
                || offsets.image_b > PLANETS_FILE_SIZE_MAX - bitmap
            {
                return Err(Error::BadDataOff);
            }
            min_offset = offsets.image_b + bitmap;
        }

        Ok(hdr)
    }

    pub fn write<W: Writer>(&self, writer: &mut W) -> Result<()> {
        debug_assert!(self.last_image_num >= 0);
        debug_assert!(self.last_image_num <= PLANET_MAX);
        io::write_i32(writer, self.last_image_num)?;

        for coords in &self.paint_coords {
            debug_assert!(coords.in_range());
            io::write_i32(writer, coords.x)?;
            io::write_i32(writer, coords.y)?;
        }

        for offsets in &self.data_offsets {
            debug_assert!(offsets.image_a >= PLANETS_HDR_SIZE);
            debug_assert!(offsets.image_b - (PLANET_BITMAP_SIZE as i32) >= offsets.image_a);
            io::write_i32(writer, offsets.image_a)?;
            io::write_i32(writer, offsets.image_b)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use byteorder::{LittleEndian, WriteBytesExt};
    use std::io::Cursor;

    fn header_bytes(last: i32, offsets: &[(i32, i32)]) -> Vec<u8> {
        let mut data = Vec::new();
        data.write_i32::<LittleEndian>(last).unwrap();
        for _ in 0..=PLANET_MAX {
            data.write_i32::<LittleEndian>(-1).unwrap();
            data.write_i32::<LittleEndian>(-2).unwrap();
        }
        for &(a, b) in offsets {
            data.write_i32::<LittleEndian>(a).unwrap();
            data.write_i32::<LittleEndian>(b).unwrap();
        }
        data
    }

    #[test]
    fn accepts_contiguous_offsets() {
        let data = header_bytes(1, &[(36, 1332), (2628, 3924)]);
        let hdr = PlanetsHeader::read(&mut Cursor::new(data)).unwrap();
        assert_eq!(hdr, PlanetsHeader {
            last_image_num: 1,
            paint_coords: [PaintOffset { x: -1, y: -2 }; 2],
            ..PlanetsHeader::default()
        });
    }

    #[test]
    fn rejects_overlapping_copies() {
        let data = header_bytes(0, &[(36, 1331)]);
        assert_eq!(
            PlanetsHeader::read(&mut Cursor::new(data)),
            Err(Error::BadDataOff)
        );
    }

    #[test]
    fn rejects_bad_paint_offset() {
        let mut data = Vec::new();
        data.write_i32::<LittleEndian>(0).unwrap();
        data.write_i32::<LittleEndian>(1).unwrap(); // x > 0
        data.write_i32::<LittleEndian>(0).unwrap();
        assert_eq!(
            PlanetsHeader::read(&mut Cursor::new(data)),
            Err(Error::BadPaintOff)
        );
    }

    #[test]
    fn fix_clamps_both_axes() {
        let mut coords = PaintOffset { x: 3, y: -99 };
        assert!(coords.fix());
        assert_eq!(coords, PaintOffset { x: 0, y: -PLANET_HEIGHT });
        assert!(!coords.fix());
    }
}
