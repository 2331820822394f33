//! The native map tiles set format.

use crate::error::{Error, Result};
use crate::io::{self, Reader, Writer};

pub const TILE_WIDTH: i32 = 16;
pub const TILE_HEIGHT: i32 = 16;
pub const TILE_BITMAP_SIZE: usize = 256;

/// Highest permitted tile number.
pub const TILE_MAX: i32 = 254;

pub const ANIM_FRAMES: usize = 4;
pub const ANIM_TRIGGERS: usize = 4;

pub const TILES_HDR_SIZE: i64 = 16;

/// Header of a native map tiles set.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct MapTilesHeader {
    pub last_tile_num: i32,
    pub splash_anim_1: [u8; ANIM_FRAMES],
    pub splash_anim_2: [u8; ANIM_FRAMES],
    pub splash_2_triggers: [u8; ANIM_TRIGGERS],
}

impl Default for MapTilesHeader {
    fn default() -> Self {
        Self {
            last_tile_num: -1,
            splash_anim_1: [0; ANIM_FRAMES],
            splash_anim_2: [0; ANIM_FRAMES],
            splash_2_triggers: [0; ANIM_TRIGGERS],
        }
    }
}

impl MapTilesHeader {
    pub(crate) fn read_anims<R: Reader>(&mut self, reader: &mut R) -> Result<()> {
        io::read_exact(reader, &mut self.splash_anim_1)?;
        io::read_exact(reader, &mut self.splash_anim_2)?;
        io::read_exact(reader, &mut self.splash_2_triggers)
    }

    pub(crate) fn write_anims<W: Writer>(&self, writer: &mut W) -> Result<()> {
        for frame in self.splash_anim_1.iter().chain(&self.splash_anim_2) {
            debug_assert!(i32::from(*frame) <= self.last_tile_num);
        }
        io::write_all(writer, &self.splash_anim_1)?;
        io::write_all(writer, &self.splash_anim_2)?;
        io::write_all(writer, &self.splash_2_triggers)
    }

    pub fn read<R: Reader>(reader: &mut R) -> Result<Self> {
        let mut hdr = Self {
            last_tile_num: io::read_i32(reader)?,
            ..Self::default()
        };

        if hdr.last_tile_num < 0 || hdr.last_tile_num > TILE_MAX {
            return Err(Error::BadNumGfx);
        }

        hdr.read_anims(reader)?;

        for frame in hdr.splash_anim_1.iter().chain(&hdr.splash_anim_2) {
            if i32::from(*frame) > hdr.last_tile_num {
                return Err(Error::BadAnims);
            }
        }
        Ok(hdr)
    }

    pub fn write<W: Writer>(&self, writer: &mut W) -> Result<()> {
        debug_assert!(self.last_tile_num >= 0);
        debug_assert!(self.last_tile_num <= TILE_MAX);
        io::write_i32(writer, self.last_tile_num)?;
        self.write_anims(writer)
    }

    /// Forces animation frames within the tile range. Returns whether
    /// anything changed.
    pub fn fix_anims(&mut self) -> bool {
        debug_assert!(self.last_tile_num >= 0);
        debug_assert!(self.last_tile_num <= TILE_MAX);
        let mut fixed = false;
        let last = self.last_tile_num as u8;

        for frame in self
            .splash_anim_1
            .iter_mut()
            .chain(&mut self.splash_anim_2)
        {
            if *frame > last {
                *frame = last;
                fixed = true;
            }
        }
        fixed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn rejects_bad_tile_count() {
        let mut data = vec![0u8; 16];
        data[0] = 255; // last_tile_num = 255 > TILE_MAX
        assert_eq!(
            MapTilesHeader::read(&mut Cursor::new(data)),
            Err(Error::BadNumGfx)
        );
    }

    #[test]
    fn rejects_out_of_range_animation() {
        let mut data = vec![0u8; 16];
        data[0] = 4;
        data[7] = 5; // second splash_anim_1 frame beyond the last tile
        assert_eq!(
            MapTilesHeader::read(&mut Cursor::new(data)),
            Err(Error::BadAnims)
        );
    }

    #[test]
    fn fix_anims_clamps_frames_only() {
        let mut hdr = MapTilesHeader {
            last_tile_num: 3,
            splash_anim_1: [0, 9, 2, 3],
            splash_anim_2: [3, 3, 3, 200],
            splash_2_triggers: [250, 0, 0, 0],
        };
        assert!(hdr.fix_anims());
        assert_eq!(hdr.splash_anim_1, [0, 3, 2, 3]);
        assert_eq!(hdr.splash_anim_2, [3, 3, 3, 3]);
        assert_eq!(hdr.splash_2_triggers, [250, 0, 0, 0]);
        assert!(!hdr.fix_anims());
    }
}
