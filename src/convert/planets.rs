//! Planet image conversions, including the two-copy dither protocol.

use log::debug;

use super::{scratch, Convert, ScanContext, Step};
use crate::csv;
use crate::error::{Error, Result};
use crate::io::{self, Reader, Writer};
use crate::resources::planets::{
    PlanetsHeader, PLANETS_HDR_SIZE, PLANET_BITMAP_SIZE, PLANET_HEIGHT, PLANET_MARGIN,
    PLANET_MAX, PLANET_SPR_BITMAP_SIZE, PLANET_SPR_WIDTH, PLANET_WIDTH,
};
use crate::resources::sprite::{write_area_header, write_sprite_header, SPRITE_HDR_SIZE};

/// Bytes per planet sprite, header included.
pub(crate) const SPR_SIZE: i32 = SPRITE_HDR_SIZE + PLANET_SPR_BITMAP_SIZE as i32;

/// Size of the `OFFS` extension block header: tag plus coordinate count.
pub(crate) const EXT_HDR_SIZE: i32 = 8;

/// Bytes per coordinate pair in the `OFFS` extension block.
pub(crate) const EXT_COORDS_SIZE: i32 = 8;

const ROW_STRIDE: usize = PLANET_WIDTH as usize;

/// Expected size of a native planets file with the given header.
#[must_use]
pub fn planets_size(hdr: &PlanetsHeader) -> i64 {
    i64::from(PLANETS_HDR_SIZE)
        + i64::from(hdr.last_image_num + 1) * 2 * PLANET_BITMAP_SIZE as i64
}

#[cfg(feature = "alien-quirk")]
fn quirk_row(image: i32, row: usize, value: u8) -> bool {
    // The second picture in the game's 'Alien' planets file has stray
    // pixels in its penultimate column, probably a mistake when the asset
    // was drawn.
    const STRAY: [u8; 11] = [1, 1, 2, 2, 2, 36, 2, 5, 2, 2, 1];
    const FIRST_ROW: usize = 12;

    image == 1
        && row >= FIRST_ROW
        && row < FIRST_ROW + STRAY.len()
        && value == STRAY[row - FIRST_ROW]
}

#[cfg(not(feature = "alien-quirk"))]
fn quirk_row(_image: i32, _row: usize, _value: u8) -> bool {
    false
}

/// Converts a native planets file into a sprite area, one image per step.
pub struct PlanetsToSprites<'a, R: Reader, W: Writer> {
    reader: &'a mut R,
    writer: &'a mut W,
    hdr: PlanetsHeader,
    pos: i32,
    count: i32,
    scratch: Vec<u8>,
}

impl<'a, R: Reader, W: Writer> PlanetsToSprites<'a, R, W> {
    pub fn new(reader: &'a mut R, writer: &'a mut W) -> Result<Self> {
        Self::init(reader, writer, false)
    }

    /// As [`Self::new`], but embeds the paint offsets in the sprite area
    /// extension region.
    pub fn with_metadata(reader: &'a mut R, writer: &'a mut W) -> Result<Self> {
        Self::init(reader, writer, true)
    }

    fn init(reader: &'a mut R, writer: &'a mut W, metadata: bool) -> Result<Self> {
        let hdr = PlanetsHeader::read(reader)?;
        let count = hdr.last_image_num + 1;
        debug!("converting {} planets to sprites", count);

        if metadata {
            let ext_size = EXT_HDR_SIZE + EXT_COORDS_SIZE * count;
            write_area_header(writer, count, ext_size, SPR_SIZE)?;
            io::write_all(writer, b"OFFS")?;
            io::write_i32(writer, count)?;
            for coords in &hdr.paint_coords[..count as usize] {
                io::write_i32(writer, coords.x)?;
                io::write_i32(writer, coords.y)?;
            }
        } else {
            write_area_header(writer, count, 0, SPR_SIZE)?;
        }

        Ok(Self {
            reader,
            writer,
            hdr,
            pos: 0,
            count,
            scratch: scratch(PLANET_BITMAP_SIZE)?,
        })
    }

    /// Reads both copies of one planet bitmap, checks that they agree, and
    /// writes the un-margined sprite rows.
    fn convert_one(&mut self) -> Result<()> {
        let image = self.pos;
        let name = format!("planet_{}", image);
        write_sprite_header(self.writer, SPR_SIZE, &name, PLANET_SPR_WIDTH, PLANET_HEIGHT)?;

        let offsets = self.hdr.data_offsets[image as usize];
        io::seek_to(self.reader, i64::from(offsets.image_a))?;
        io::read_exact(self.reader, &mut self.scratch)?;

        io::seek_to(self.reader, i64::from(offsets.image_b))?;

        for row in 0..PLANET_HEIGHT as usize {
            let copy_a = &self.scratch[row * ROW_STRIDE..(row + 1) * ROW_STRIDE];

            // Two pixel columns must be black: the rightmost pair of copy A
            // and the leftmost pair of copy B.
            let stray = copy_a[PLANET_SPR_WIDTH as usize];
            if stray != 0 && !quirk_row(image, row, stray) {
                debug!("penultimate column of image {} row {} is not black", image, row);
                return Err(Error::BadImages);
            }

            let mut copy_b = [0u8; ROW_STRIDE];
            io::read_exact(self.reader, &mut copy_b)?;

            if copy_b[0] != 0
                || copy_b[1] != 0
                || copy_a[PLANET_WIDTH as usize - 1] != 0
                || copy_a[..PLANET_SPR_WIDTH as usize]
                    != copy_b[PLANET_MARGIN..PLANET_MARGIN + PLANET_SPR_WIDTH as usize]
            {
                return Err(Error::BadImages);
            }

            // Copy A is left-aligned, so each sprite row is copy A's row
            // with the margin bytes doubling as row padding.
            io::write_all(self.writer, copy_a)?;
        }
        Ok(())
    }
}

impl<R: Reader, W: Writer> Convert for PlanetsToSprites<'_, R, W> {
    fn advance(&mut self) -> Result<Step> {
        if self.pos >= self.count {
            return Ok(Step::Done);
        }
        let result = self.convert_one();
        self.pos += 1;
        result.map(|_| Step::More)
    }
}

pub fn planets_to_sprites<R: Reader, W: Writer>(reader: &mut R, writer: &mut W) -> Result<()> {
    PlanetsToSprites::new(reader, writer)?.finish()
}

pub fn planets_to_sprites_ext<R: Reader, W: Writer>(
    reader: &mut R,
    writer: &mut W,
) -> Result<()> {
    PlanetsToSprites::with_metadata(reader, writer)?.finish()
}

/// Converts scanned planet sprites back into a native planets file.
pub struct SpritesToPlanets<'a, R: Reader, W: Writer> {
    reader: &'a mut R,
    writer: &'a mut W,
    hdr: PlanetsHeader,
    offsets: &'a [i64; (PLANET_MAX + 1) as usize],
    pos: i32,
    count: i32,
    scratch: Vec<u8>,
}

impl<'a, R: Reader, W: Writer> SpritesToPlanets<'a, R, W> {
    pub fn new(
        reader: &'a mut R,
        writer: &'a mut W,
        context: &'a ScanContext,
    ) -> Result<Self> {
        if context.class_count() > 1 || context.planets.count == 0 {
            return Err(Error::BadSprite);
        }
        if !context.planets.got_hdr {
            return Err(Error::NoOffset);
        }

        context.planets.hdr.write(writer)?;

        Ok(Self {
            reader,
            writer,
            hdr: context.planets.hdr,
            offsets: &context.planets.offsets,
            pos: 0,
            count: context.planets.hdr.last_image_num + 1,
            scratch: scratch(PLANET_SPR_BITMAP_SIZE)?,
        })
    }

    /// Writes both copies of one planet bitmap at the offsets declared in
    /// the header: copy A right-padded with the margin, copy B left-padded.
    fn convert_one(&mut self) -> Result<()> {
        let offset = self.offsets[self.pos as usize];
        if offset == 0 {
            debug!("no sprite for planet {}; writing a blank bitmap", self.pos);
            for byte in &mut self.scratch {
                *byte = 0;
            }
        } else {
            io::seek_to(self.reader, offset)?;
            io::read_exact(self.reader, &mut self.scratch)?;
        }

        let margin = [0u8; PLANET_MARGIN];
        let offsets = self.hdr.data_offsets[self.pos as usize];

        io::seek_to(self.writer, i64::from(offsets.image_a))?;
        for row in 0..PLANET_HEIGHT as usize {
            let pixels = &self.scratch[row * ROW_STRIDE..row * ROW_STRIDE + PLANET_SPR_WIDTH as usize];
            io::write_all(self.writer, pixels)?;
            io::write_all(self.writer, &margin)?;
        }

        io::seek_to(self.writer, i64::from(offsets.image_b))?;
        for row in 0..PLANET_HEIGHT as usize {
            let pixels = &self.scratch[row * ROW_STRIDE..row * ROW_STRIDE + PLANET_SPR_WIDTH as usize];
            io::write_all(self.writer, &margin)?;
            io::write_all(self.writer, pixels)?;
        }
        Ok(())
    }
}

impl<R: Reader, W: Writer> Convert for SpritesToPlanets<'_, R, W> {
    fn advance(&mut self) -> Result<Step> {
        if self.pos >= self.count {
            return Ok(Step::Done);
        }
        let result = self.convert_one();
        self.pos += 1;
        result.map(|_| Step::More)
    }
}

pub fn sprites_to_planets<R: Reader, W: Writer>(
    reader: &mut R,
    writer: &mut W,
    context: &ScanContext,
) -> Result<()> {
    SpritesToPlanets::new(reader, writer, context)?.finish()
}

/// Emits the paint offsets of a native planets file as one `x,y` line per
/// image.
pub fn planets_to_csv<R: Reader, W: Writer>(reader: &mut R, writer: &mut W) -> Result<()> {
    let hdr = PlanetsHeader::read(reader)?;
    for coords in &hdr.paint_coords[..(hdr.last_image_num + 1) as usize] {
        let line = format!("{},{}\n", coords.x, coords.y);
        io::write_all(writer, line.as_bytes())?;
    }
    Ok(())
}

/// Fills the paint offsets of `hdr` from CSV text. `hdr.last_image_num`
/// must already be valid; out-of-range values are forced within bounds and
/// reported as `ForceOff`.
pub fn csv_to_planets<R: Reader>(reader: &mut R, hdr: &mut PlanetsHeader) -> Result<()> {
    let text = csv::read_text(reader)?;
    let mut lines = text.lines();
    let mut forced = false;

    for image in 0..=hdr.last_image_num {
        let line = match lines.next() {
            Some(line) => line,
            None => break,
        };
        let fields = csv::parse_record(line);
        let coords = &mut hdr.paint_coords[image as usize];
        if let Some(&x) = fields.first() {
            coords.x = x;
        }
        if let Some(&y) = fields.get(1) {
            coords.y = y;
        }
        if coords.fix() {
            forced = true;
        }
    }

    if forced {
        return Err(Error::ForceOff);
    }
    Ok(())
}
