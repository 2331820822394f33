//! Sky definition conversions.

use super::{copy_flipped, scratch, Convert, ScanContext, Step};
use crate::csv;
use crate::error::{Error, Result};
use crate::io::{self, Reader, Writer};
use crate::resources::sky::{SkyHeader, SKY_BITMAP_SIZE, SKY_HDR_SIZE, SKY_ROWS, SKY_WIDTH};
use crate::resources::sprite::{write_area_header, write_sprite_header, SPRITE_HDR_SIZE};

/// Bytes per sky sprite, header included.
pub(crate) const SPR_SIZE: i32 = SPRITE_HDR_SIZE + SKY_BITMAP_SIZE as i32;

/// Size of the `HEIG` extension block, tag included.
pub(crate) const EXT_DATA_SIZE: i32 = 4 + 8;

/// A sky file holds exactly one image.
const SPR_COUNT: i32 = 1;

/// Expected size of a native sky file.
#[must_use]
pub fn sky_size() -> i64 {
    SKY_HDR_SIZE + SKY_BITMAP_SIZE as i64
}

/// Converts a native sky file into a sprite area holding one `sky` sprite.
pub struct SkyToSprites<'a, R: Reader, W: Writer> {
    reader: &'a mut R,
    writer: &'a mut W,
    pos: i32,
    scratch: Vec<u8>,
}

impl<'a, R: Reader, W: Writer> SkyToSprites<'a, R, W> {
    pub fn new(reader: &'a mut R, writer: &'a mut W) -> Result<Self> {
        Self::init(reader, writer, false)
    }

    /// As [`Self::new`], but embeds the render offset and stars height in
    /// the sprite area extension region.
    pub fn with_metadata(reader: &'a mut R, writer: &'a mut W) -> Result<Self> {
        Self::init(reader, writer, true)
    }

    fn init(reader: &'a mut R, writer: &'a mut W, metadata: bool) -> Result<Self> {
        let hdr = SkyHeader::read(reader)?;

        if metadata {
            write_area_header(writer, SPR_COUNT, EXT_DATA_SIZE, SPR_SIZE)?;
            io::write_all(writer, b"HEIG")?;
            hdr.write(writer)?;
        } else {
            write_area_header(writer, SPR_COUNT, 0, SPR_SIZE)?;
        }

        Ok(Self {
            reader,
            writer,
            pos: 0,
            scratch: scratch(SKY_BITMAP_SIZE)?,
        })
    }

    fn convert_one(&mut self) -> Result<()> {
        write_sprite_header(self.writer, SPR_SIZE, "sky", SKY_WIDTH, SKY_ROWS)?;
        copy_flipped(self.reader, self.writer, &mut self.scratch, SKY_WIDTH, SKY_ROWS)
    }
}

impl<R: Reader, W: Writer> Convert for SkyToSprites<'_, R, W> {
    fn advance(&mut self) -> Result<Step> {
        if self.pos >= SPR_COUNT {
            return Ok(Step::Done);
        }
        let result = self.convert_one();
        self.pos += 1;
        result.map(|_| Step::More)
    }
}

pub fn sky_to_sprites<R: Reader, W: Writer>(reader: &mut R, writer: &mut W) -> Result<()> {
    SkyToSprites::new(reader, writer)?.finish()
}

pub fn sky_to_sprites_ext<R: Reader, W: Writer>(reader: &mut R, writer: &mut W) -> Result<()> {
    SkyToSprites::with_metadata(reader, writer)?.finish()
}

/// Converts a scanned `sky` sprite back into a native sky file.
pub struct SpritesToSky<'a, R: Reader, W: Writer> {
    reader: &'a mut R,
    writer: &'a mut W,
    offset: i64,
    pos: i32,
    scratch: Vec<u8>,
}

impl<'a, R: Reader, W: Writer> SpritesToSky<'a, R, W> {
    pub fn new(
        reader: &'a mut R,
        writer: &'a mut W,
        context: &ScanContext,
    ) -> Result<Self> {
        if context.class_count() > 1 || context.sky.count == 0 {
            return Err(Error::BadSprite);
        }
        if !context.sky.got_hdr {
            return Err(Error::NoHeight);
        }

        context.sky.hdr.write(writer)?;

        Ok(Self {
            reader,
            writer,
            offset: context.sky.offset,
            pos: 0,
            scratch: scratch(SKY_BITMAP_SIZE)?,
        })
    }

    fn convert_one(&mut self) -> Result<()> {
        io::seek_to(self.reader, self.offset)?;
        copy_flipped(self.reader, self.writer, &mut self.scratch, SKY_WIDTH, SKY_ROWS)
    }
}

impl<R: Reader, W: Writer> Convert for SpritesToSky<'_, R, W> {
    fn advance(&mut self) -> Result<Step> {
        if self.pos >= SPR_COUNT {
            return Ok(Step::Done);
        }
        let result = self.convert_one();
        self.pos += 1;
        result.map(|_| Step::More)
    }
}

pub fn sprites_to_sky<R: Reader, W: Writer>(
    reader: &mut R,
    writer: &mut W,
    context: &ScanContext,
) -> Result<()> {
    SpritesToSky::new(reader, writer, context)?.finish()
}

/// Emits the sky header as one `render_offset,stars_height` line.
pub fn sky_to_csv<R: Reader, W: Writer>(reader: &mut R, writer: &mut W) -> Result<()> {
    let hdr = SkyHeader::read(reader)?;
    let line = format!("{},{}\n", hdr.render_offset, hdr.stars_height);
    io::write_all(writer, line.as_bytes())
}

/// Fills the sky header scalars from CSV text. Out-of-range values are
/// forced within bounds and reported as `ForceSky`.
pub fn csv_to_sky<R: Reader>(reader: &mut R, hdr: &mut SkyHeader) -> Result<()> {
    let text = csv::read_text(reader)?;
    let mut forced = false;

    if let Some(line) = text.lines().next() {
        let fields = csv::parse_record(line);
        if let Some(&render_offset) = fields.first() {
            hdr.render_offset = render_offset;
            forced |= hdr.fix_render();
        }
        if let Some(&stars_height) = fields.get(1) {
            hdr.stars_height = stars_height;
            forced |= hdr.fix_stars();
        }
    }

    if forced {
        return Err(Error::ForceSky);
    }
    Ok(())
}
