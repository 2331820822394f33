//! The generic sprite area container that third-party editors understand.

use num_derive::FromPrimitive;
use num_traits::FromPrimitive;

use super::word_align;
use crate::error::{Error, Result};
use crate::io::{self, Reader, Writer};

/// Nominal size of a sprite area header. Area offsets are relative to a
/// notional leading size word which is not stored in the file, so only 12
/// bytes appear on disk and the first sprite lives at file offset
/// `first - 4`.
pub const AREA_HDR_SIZE: i32 = 16;

/// Size of the fixed header preceding each sprite's pixel rows.
pub const SPRITE_HDR_SIZE: i32 = 44;

/// Size of the zero-padded sprite name field.
pub const NAME_SIZE: usize = 12;

/// Screen mode written into new sprites (8 bpp, old format).
pub const SPRITE_MODE: i32 = 13;

pub(crate) const EXT_TAG_LEN: usize = 4;

/// Leading fields of a sprite area.
#[derive(Clone, Copy, Debug)]
pub struct AreaHeader {
    pub count: i32,
    pub first: i32,
    pub used: i32,
}

impl AreaHeader {
    pub fn read<R: Reader>(reader: &mut R) -> Result<Self> {
        Ok(Self {
            count: io::read_i32(reader)?,
            first: io::read_i32(reader)?,
            used: io::read_i32(reader)?,
        })
    }

    /// Checks the header fields and returns the extension region size.
    pub fn validate(&self) -> Result<i32> {
        if self.count < 0 {
            return Err(Error::BadNumGfx);
        }
        if self.first < AREA_HDR_SIZE || self.first > self.used {
            return Err(Error::BadDataOff);
        }
        Ok(self.first - AREA_HDR_SIZE)
    }
}

pub(crate) fn write_area_header<W: Writer>(
    writer: &mut W,
    count: i32,
    ext_size: i32,
    sprite_size: i32,
) -> Result<()> {
    debug_assert!(count >= 0);
    debug_assert!(ext_size >= 0);
    debug_assert!(sprite_size >= SPRITE_HDR_SIZE);
    let first = AREA_HDR_SIZE + ext_size;
    let used = first + count * sprite_size;
    io::write_i32(writer, count)?;
    io::write_i32(writer, first)?;
    io::write_i32(writer, used)
}

/// The fixed 44-byte header preceding each sprite.
#[derive(Clone, Copy, Debug)]
pub struct SpriteHeader {
    pub size: i32,
    pub name: [u8; NAME_SIZE],
    /// Stored width in words, minus one.
    pub width_words: i32,
    /// Stored height minus one.
    pub height: i32,
    pub left_bit: i32,
    pub right_bit: i32,
    pub image: i32,
    pub mask: i32,
    pub mode: i32,
}

impl SpriteHeader {
    pub fn read<R: Reader>(reader: &mut R) -> Result<Self> {
        let size = io::read_i32(reader)?;
        let mut name = [0u8; NAME_SIZE];
        io::read_exact(reader, &mut name)?;
        let header = Self {
            size,
            name,
            width_words: io::read_i32(reader)?,
            height: io::read_i32(reader)?,
            left_bit: io::read_i32(reader)?,
            right_bit: io::read_i32(reader)?,
            image: io::read_i32(reader)?,
            mask: io::read_i32(reader)?,
            mode: io::read_i32(reader)?,
        };

        if header.image < SPRITE_HDR_SIZE
            || header.image > header.size
            || header.mask < header.image
            || header.mask > header.size
        {
            return Err(Error::BadDataOff);
        }
        Ok(header)
    }

    /// The sprite name up to the first NUL. Names of maximum length have
    /// no terminator.
    #[must_use]
    pub fn name(&self) -> &[u8] {
        let end = self
            .name
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(NAME_SIZE);
        &self.name[..end]
    }

    #[must_use]
    pub fn name_lossy(&self) -> String {
        String::from_utf8_lossy(self.name()).into_owned()
    }

    /// Whether the sprite is an unmasked 8 bpp bitmap of exactly the given
    /// pixel dimensions.
    #[must_use]
    pub fn has_dims(&self, width: i32, height: i32) -> bool {
        debug_assert!(width > 0);
        debug_assert!(height > 0);
        self.width_words == word_align(width) / 4 - 1
            && self.height == height - 1
            && self.left_bit == 0
            && self.right_bit == (width * 8 - 1) % 32
            && mode_has_8_bpp(self.mode)
    }
}

pub(crate) fn write_sprite_header<W: Writer>(
    writer: &mut W,
    sprite_size: i32,
    name: &str,
    width: i32,
    height: i32,
) -> Result<()> {
    debug_assert!(sprite_size >= SPRITE_HDR_SIZE);
    debug_assert!(name.len() <= NAME_SIZE);

    io::write_i32(writer, sprite_size)?;
    let mut padded = [0u8; NAME_SIZE];
    padded[..name.len()].copy_from_slice(name.as_bytes());
    io::write_all(writer, &padded)?;
    io::write_i32(writer, word_align(width) / 4 - 1)?;
    io::write_i32(writer, height - 1)?;
    io::write_i32(writer, 0)?;
    io::write_i32(writer, (width * 8 - 1) % 32)?;
    io::write_i32(writer, SPRITE_HDR_SIZE)?;
    io::write_i32(writer, SPRITE_HDR_SIZE)?;
    io::write_i32(writer, SPRITE_MODE)
}

/// Image type subfield of a new-format sprite mode word.
#[derive(Clone, Copy, Debug, Eq, FromPrimitive, PartialEq)]
enum SpriteType {
    Old = 0,
    OneBpp = 1,
    TwoBpp = 2,
    FourBpp = 3,
    EightBpp = 4,
}

const TYPE_SHIFT: u32 = 27;
const TYPE_MASK: u32 = 0xf << TYPE_SHIFT;

fn mode_has_8_bpp(mode: i32) -> bool {
    // Old-format sprites store a screen mode number instead of a type word.
    const OLD_8_BPP_MODES: [i32; 9] = [10, 13, 15, 21, 24, 28, 32, 36, 40];

    match SpriteType::from_u32((mode as u32 & TYPE_MASK) >> TYPE_SHIFT) {
        Some(SpriteType::Old) => OLD_8_BPP_MODES.contains(&mode),
        Some(other) => other == SpriteType::EightBpp,
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_check_accepts_old_and_new_formats() {
        assert!(mode_has_8_bpp(13));
        assert!(mode_has_8_bpp(28));
        assert!(!mode_has_8_bpp(12));
        assert!(!mode_has_8_bpp(0));
        // New format: 8 bpp type in bits 27..=30.
        assert!(mode_has_8_bpp((4 << 27) | 1));
        assert!(!mode_has_8_bpp((3 << 27) | 1));
    }

    #[test]
    fn dims_check_matches_planet_sprites() {
        let mut header = SpriteHeader {
            size: 1340,
            name: [0; NAME_SIZE],
            width_words: 36 / 4 - 1,
            height: 35,
            left_bit: 0,
            right_bit: (34 * 8 - 1) % 32,
            image: SPRITE_HDR_SIZE,
            mask: SPRITE_HDR_SIZE,
            mode: SPRITE_MODE,
        };
        assert!(header.has_dims(34, 36));
        assert!(!header.has_dims(16, 16));
        header.left_bit = 5;
        assert!(!header.has_dims(34, 36));
    }
}
