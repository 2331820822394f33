//! Map tile set conversions.

use log::debug;

use super::{copy_flipped, scratch, Convert, ScanContext, Step};
use crate::csv;
use crate::error::{Error, Result};
use crate::io::{self, Reader, Writer};
use crate::resources::sprite::{write_area_header, write_sprite_header, SPRITE_HDR_SIZE};
use crate::resources::tiles::{
    MapTilesHeader, ANIM_FRAMES, ANIM_TRIGGERS, TILES_HDR_SIZE, TILE_BITMAP_SIZE, TILE_HEIGHT,
    TILE_MAX, TILE_WIDTH,
};

/// Bytes per tile sprite, header included.
pub(crate) const SPR_SIZE: i32 = SPRITE_HDR_SIZE + TILE_BITMAP_SIZE as i32;

/// Size of the `ANIM` extension block, tag included.
pub(crate) const EXT_DATA_SIZE: i32 = 4 + 12;

/// Expected size of a native map tiles file with the given header.
#[must_use]
pub fn tiles_size(hdr: &MapTilesHeader) -> i64 {
    TILES_HDR_SIZE + i64::from(hdr.last_tile_num + 1) * TILE_BITMAP_SIZE as i64
}

/// Converts a native map tiles file into a sprite area, one tile per step.
pub struct TilesToSprites<'a, R: Reader, W: Writer> {
    reader: &'a mut R,
    writer: &'a mut W,
    pos: i32,
    count: i32,
    scratch: Vec<u8>,
}

impl<'a, R: Reader, W: Writer> TilesToSprites<'a, R, W> {
    pub fn new(reader: &'a mut R, writer: &'a mut W) -> Result<Self> {
        Self::init(reader, writer, false)
    }

    /// As [`Self::new`], but embeds the animation data in the sprite area
    /// extension region.
    pub fn with_metadata(reader: &'a mut R, writer: &'a mut W) -> Result<Self> {
        Self::init(reader, writer, true)
    }

    fn init(reader: &'a mut R, writer: &'a mut W, metadata: bool) -> Result<Self> {
        let hdr = MapTilesHeader::read(reader)?;
        let count = hdr.last_tile_num + 1;
        debug!("converting {} tiles to sprites", count);

        if metadata {
            write_area_header(writer, count, EXT_DATA_SIZE, SPR_SIZE)?;
            io::write_all(writer, b"ANIM")?;
            hdr.write_anims(writer)?;
        } else {
            write_area_header(writer, count, 0, SPR_SIZE)?;
        }

        Ok(Self {
            reader,
            writer,
            pos: 0,
            count,
            scratch: scratch(TILE_BITMAP_SIZE)?,
        })
    }

    fn convert_one(&mut self) -> Result<()> {
        let name = format!("tile_{}", self.pos);
        write_sprite_header(self.writer, SPR_SIZE, &name, TILE_WIDTH, TILE_HEIGHT)?;
        copy_flipped(
            self.reader,
            self.writer,
            &mut self.scratch,
            TILE_WIDTH,
            TILE_HEIGHT,
        )
    }
}

impl<R: Reader, W: Writer> Convert for TilesToSprites<'_, R, W> {
    fn advance(&mut self) -> Result<Step> {
        if self.pos >= self.count {
            return Ok(Step::Done);
        }
        let result = self.convert_one();
        self.pos += 1;
        result.map(|_| Step::More)
    }
}

pub fn tiles_to_sprites<R: Reader, W: Writer>(reader: &mut R, writer: &mut W) -> Result<()> {
    TilesToSprites::new(reader, writer)?.finish()?;
    io::expect_eof(reader)
}

pub fn tiles_to_sprites_ext<R: Reader, W: Writer>(reader: &mut R, writer: &mut W) -> Result<()> {
    TilesToSprites::with_metadata(reader, writer)?.finish()?;
    io::expect_eof(reader)
}

/// Converts scanned tile sprites back into a native map tiles file.
pub struct SpritesToTiles<'a, R: Reader, W: Writer> {
    reader: &'a mut R,
    writer: &'a mut W,
    offsets: &'a [i64; (TILE_MAX + 1) as usize],
    pos: i32,
    count: i32,
    scratch: Vec<u8>,
}

impl<'a, R: Reader, W: Writer> SpritesToTiles<'a, R, W> {
    pub fn new(
        reader: &'a mut R,
        writer: &'a mut W,
        context: &'a ScanContext,
    ) -> Result<Self> {
        if context.class_count() > 1 || context.tiles.count == 0 {
            return Err(Error::BadSprite);
        }
        if !context.tiles.got_hdr {
            return Err(Error::NoAnim);
        }

        context.tiles.hdr.write(writer)?;

        Ok(Self {
            reader,
            writer,
            offsets: &context.tiles.offsets,
            pos: 0,
            count: context.tiles.hdr.last_tile_num + 1,
            scratch: scratch(TILE_BITMAP_SIZE)?,
        })
    }

    fn convert_one(&mut self) -> Result<()> {
        let offset = self.offsets[self.pos as usize];
        if offset == 0 {
            debug!("no sprite for tile {}; writing a blank bitmap", self.pos);
            for byte in &mut self.scratch {
                *byte = 0;
            }
            return io::write_all(self.writer, &self.scratch);
        }

        io::seek_to(self.reader, offset)?;
        copy_flipped(
            self.reader,
            self.writer,
            &mut self.scratch,
            TILE_WIDTH,
            TILE_HEIGHT,
        )
    }
}

impl<R: Reader, W: Writer> Convert for SpritesToTiles<'_, R, W> {
    fn advance(&mut self) -> Result<Step> {
        if self.pos >= self.count {
            return Ok(Step::Done);
        }
        let result = self.convert_one();
        self.pos += 1;
        result.map(|_| Step::More)
    }
}

pub fn sprites_to_tiles<R: Reader, W: Writer>(
    reader: &mut R,
    writer: &mut W,
    context: &ScanContext,
) -> Result<()> {
    SpritesToTiles::new(reader, writer, context)?.finish()
}

/// Emits the animation data of a native map tiles file as three lines of
/// four comma-separated integers.
pub fn tiles_to_csv<R: Reader, W: Writer>(reader: &mut R, writer: &mut W) -> Result<()> {
    let hdr = MapTilesHeader::read(reader)?;
    for row in &[hdr.splash_anim_1, hdr.splash_anim_2, hdr.splash_2_triggers] {
        let line = format!("{},{},{},{}\n", row[0], row[1], row[2], row[3]);
        io::write_all(writer, line.as_bytes())?;
    }
    Ok(())
}

/// Fills the animation data of `hdr` from CSV text. `hdr.last_tile_num`
/// must already be valid; out-of-range values are forced within bounds and
/// reported as `ForceAnim`.
pub fn csv_to_tiles<R: Reader>(reader: &mut R, hdr: &mut MapTilesHeader) -> Result<()> {
    let text = csv::read_text(reader)?;
    let mut lines = text.lines();
    let mut forced = false;

    let mut apply_anim = |dst: &mut [u8; ANIM_FRAMES], line: &str| {
        for (frame, value) in csv::parse_record(line)
            .into_iter()
            .take(ANIM_FRAMES)
            .enumerate()
        {
            if value < 0 || value > hdr.last_tile_num {
                forced = true;
                dst[frame] = if value < 0 { 0 } else { hdr.last_tile_num as u8 };
            } else {
                dst[frame] = value as u8;
            }
        }
    };

    let mut anim_1 = hdr.splash_anim_1;
    let mut anim_2 = hdr.splash_anim_2;
    if let Some(line) = lines.next() {
        apply_anim(&mut anim_1, line);
    }
    if let Some(line) = lines.next() {
        apply_anim(&mut anim_2, line);
    }
    hdr.splash_anim_1 = anim_1;
    hdr.splash_anim_2 = anim_2;

    if let Some(line) = lines.next() {
        for (frame, value) in csv::parse_record(line)
            .into_iter()
            .take(ANIM_TRIGGERS)
            .enumerate()
        {
            if value < 0 || value > i32::from(u8::MAX) {
                forced = true;
                hdr.splash_2_triggers[frame] = if value < 0 { 0 } else { u8::MAX };
            } else {
                hdr.splash_2_triggers[frame] = value as u8;
            }
        }
    }

    if forced {
        return Err(Error::ForceAnim);
    }
    Ok(())
}
