//! First pass over a sprite area: classify its contents as map tiles,
//! planets or a sky and record where each bitmap lives.

use bitflags::bitflags;
use log::debug;

use super::{planets as planets_conv, sky as sky_conv, tiles as tiles_conv, Convert, Step};
use crate::error::{Error, Result};
use crate::io::{self, Reader};
use crate::resources::planets::{PaintOffset, PlanetsHeader, PLANET_HEIGHT, PLANET_MAX, PLANET_SPR_WIDTH};
use crate::resources::sky::{SkyHeader, SKY_ROWS, SKY_WIDTH};
use crate::resources::sprite::{AreaHeader, SpriteHeader, EXT_TAG_LEN};
use crate::resources::tiles::{MapTilesHeader, TILE_HEIGHT, TILE_MAX, TILE_WIDTH};

bitflags! {
    /// Values silently forced within bounds while scanning.
    #[derive(Default)]
    pub struct Fixups: u8 {
        const TILE_ANIMS = 1 << 0;
        const PAINT_OFFSETS = 1 << 1;
        const RENDER_OFFSET = 1 << 2;
        const STARS_HEIGHT = 1 << 3;
    }
}

/// Map tile sprites found in an area.
pub struct TilesScan {
    /// Pixel-data file offset per tile number; zero means missing.
    pub offsets: [i64; (TILE_MAX + 1) as usize],
    pub count: i32,
    pub hdr: MapTilesHeader,
    pub got_hdr: bool,
}

impl Default for TilesScan {
    fn default() -> Self {
        Self {
            offsets: [0; (TILE_MAX + 1) as usize],
            count: 0,
            hdr: MapTilesHeader::default(),
            got_hdr: false,
        }
    }
}

impl TilesScan {
    fn identify(&mut self, fpos: i64, name: &[u8]) -> bool {
        if let Some(num) = parse_indexed_name(name, b"tile_", TILE_MAX) {
            self.offsets[num as usize] = fpos;
            if num > self.hdr.last_tile_num {
                self.hdr.last_tile_num = num;
            }
            self.count += 1;
            return true;
        }
        false
    }
}

/// Planet sprites found in an area.
#[derive(Default)]
pub struct PlanetsScan {
    pub offsets: [i64; (PLANET_MAX + 1) as usize],
    pub count: i32,
    pub hdr: PlanetsHeader,
    pub got_hdr: bool,
}

impl PlanetsScan {
    fn identify(&mut self, fpos: i64, name: &[u8]) -> bool {
        if let Some(num) = parse_indexed_name(name, b"planet_", PLANET_MAX) {
            self.offsets[num as usize] = fpos;
            if num > self.hdr.last_image_num {
                self.hdr.last_image_num = num;
            }
            self.count += 1;
            return true;
        }
        false
    }
}

/// A sky sprite found in an area.
#[derive(Default)]
pub struct SkyScan {
    pub offset: i64,
    pub count: i32,
    pub hdr: SkyHeader,
    pub got_hdr: bool,
}

impl SkyScan {
    fn identify(&mut self, fpos: i64, name: &[u8]) -> bool {
        if name == b"sky" {
            self.offset = fpos;
            self.count = 1;
            return true;
        }
        false
    }
}

/// Everything learned from one pass over a sprite area.
#[derive(Default)]
pub struct ScanContext {
    pub tiles: TilesScan,
    pub planets: PlanetsScan,
    pub sky: SkyScan,
    pub fixups: Fixups,
    /// Name of the first sprite that matched no class.
    pub bad_sprite: Option<String>,
}

impl ScanContext {
    /// How many of the three graphics classes matched at least one sprite.
    #[must_use]
    pub fn class_count(&self) -> i32 {
        let mut ntypes = 0;
        if self.tiles.count > 0 {
            ntypes += 1;
        }
        if self.planets.count > 0 {
            ntypes += 1;
        }
        if self.sky.count > 0 {
            ntypes += 1;
        }
        ntypes
    }
}

fn parse_indexed_name(name: &[u8], prefix: &[u8], max: i32) -> Option<i32> {
    let digits = name.strip_prefix(prefix)?;
    if digits.is_empty() {
        return None;
    }
    let mut value: i64 = 0;
    for &byte in digits {
        if !byte.is_ascii_digit() {
            return None;
        }
        value = value * 10 + i64::from(byte - b'0');
        if value > i64::from(max) {
            return None;
        }
    }
    Some(value as i32)
}

fn identify(hdr: &SpriteHeader, fpos: i64, context: &mut ScanContext) {
    if hdr.has_dims(TILE_WIDTH, TILE_HEIGHT) && context.tiles.identify(fpos, hdr.name()) {
        return;
    }
    if hdr.has_dims(PLANET_SPR_WIDTH, PLANET_HEIGHT) && context.planets.identify(fpos, hdr.name())
    {
        return;
    }
    if hdr.has_dims(SKY_WIDTH, SKY_ROWS) && context.sky.identify(fpos, hdr.name()) {
        return;
    }

    debug!("unidentified sprite {:?}", hdr.name_lossy());
    if context.bad_sprite.is_none() {
        context.bad_sprite = Some(hdr.name_lossy());
    }
}

fn scan_sprite<R: Reader>(reader: &mut R, context: &mut ScanContext) -> Result<()> {
    let start = io::tell(reader)?;
    let hdr = SpriteHeader::read(reader)?;
    debug!("sprite {:?} has length {}", hdr.name_lossy(), hdr.size);

    io::seek_to(reader, start + i64::from(hdr.image))?;
    identify(&hdr, start + i64::from(hdr.image), context);

    io::seek_to(reader, start + i64::from(hdr.size))
}

fn read_tiles_ext<R: Reader>(
    context: &mut ScanContext,
    ext_size: i32,
    reader: &mut R,
) -> Result<()> {
    if ext_size == tiles_conv::EXT_DATA_SIZE {
        context.tiles.got_hdr = true;
        // The animation data cannot be validated yet because the final
        // number of tiles is not known until the scan completes.
        context.tiles.hdr.read_anims(reader)?;
    }
    Ok(())
}

fn read_planets_ext<R: Reader>(
    context: &mut ScanContext,
    ext_size: i32,
    reader: &mut R,
) -> Result<()> {
    if ext_size >= planets_conv::EXT_HDR_SIZE {
        let ncoords = io::read_i32(reader)?;
        if i64::from(ext_size)
            >= i64::from(planets_conv::EXT_HDR_SIZE)
                + i64::from(ncoords) * i64::from(planets_conv::EXT_COORDS_SIZE)
        {
            if ncoords < 0 || ncoords > PLANET_MAX + 1 {
                return Err(Error::BadNumGfx);
            }
            context.planets.got_hdr = true;
            for i in 0..ncoords as usize {
                let mut coords = PaintOffset {
                    x: io::read_i32(reader)?,
                    y: io::read_i32(reader)?,
                };
                if coords.fix() {
                    context.fixups |= Fixups::PAINT_OFFSETS;
                }
                context.planets.hdr.paint_coords[i] = coords;
            }
        }
    }
    Ok(())
}

fn read_sky_ext<R: Reader>(
    context: &mut ScanContext,
    ext_size: i32,
    reader: &mut R,
) -> Result<()> {
    if ext_size == sky_conv::EXT_DATA_SIZE {
        context.sky.got_hdr = true;
        context.sky.hdr = SkyHeader::read_raw(reader)?;
        if context.sky.hdr.fix_render() {
            context.fixups |= Fixups::RENDER_OFFSET;
        }
        if context.sky.hdr.fix_stars() {
            context.fixups |= Fixups::STARS_HEIGHT;
        }
    }
    Ok(())
}

fn parse_extension<R: Reader>(
    context: &mut ScanContext,
    ext_size: i32,
    reader: &mut R,
) -> Result<()> {
    if ext_size < EXT_TAG_LEN as i32 {
        return Ok(());
    }
    let mut tag = [0u8; EXT_TAG_LEN];
    io::read_exact(reader, &mut tag)?;

    match &tag {
        b"ANIM" => read_tiles_ext(context, ext_size, reader),
        b"OFFS" => read_planets_ext(context, ext_size, reader),
        b"HEIG" => read_sky_ext(context, ext_size, reader),
        _ => Ok(()),
    }
}

/// Single-step scanner over a sprite area.
pub struct Scan<'a, R: Reader> {
    reader: &'a mut R,
    context: &'a mut ScanContext,
    pos: i32,
    count: i32,
}

impl<'a, R: Reader> Scan<'a, R> {
    pub fn new(reader: &'a mut R, context: &'a mut ScanContext) -> Result<Self> {
        *context = ScanContext::default();

        let hdr = AreaHeader::read(reader)?;
        let ext_size = hdr.validate()?;
        debug!(
            "sprite area: {} sprites, first at {}, {} bytes of extension data",
            hdr.count, hdr.first, ext_size
        );

        parse_extension(context, ext_size, reader)?;
        io::seek_to(reader, i64::from(hdr.first) - 4)?;

        Ok(Self {
            reader,
            context,
            pos: 0,
            count: hdr.count,
        })
    }
}

impl<R: Reader> Convert for Scan<'_, R> {
    fn advance(&mut self) -> Result<Step> {
        if self.pos >= self.count {
            return Ok(Step::Done);
        }
        let result = scan_sprite(self.reader, self.context);
        self.pos += 1;
        result?;

        if self.pos == self.count
            && self.context.tiles.hdr.last_tile_num >= 0
            && self.context.tiles.hdr.fix_anims()
        {
            self.context.fixups |= Fixups::TILE_ANIMS;
        }
        Ok(Step::More)
    }
}

/// Scans a whole sprite area in one call.
pub fn scan_sprite_file<R: Reader>(reader: &mut R) -> Result<ScanContext> {
    let mut context = ScanContext::default();
    Scan::new(reader, &mut context)?.finish()?;
    Ok(context)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indexed_names_parse_strictly() {
        assert_eq!(parse_indexed_name(b"tile_0", b"tile_", TILE_MAX), Some(0));
        assert_eq!(parse_indexed_name(b"tile_254", b"tile_", TILE_MAX), Some(254));
        assert_eq!(parse_indexed_name(b"tile_255", b"tile_", TILE_MAX), None);
        assert_eq!(parse_indexed_name(b"tile_", b"tile_", TILE_MAX), None);
        assert_eq!(parse_indexed_name(b"tile_1x", b"tile_", TILE_MAX), None);
        assert_eq!(parse_indexed_name(b"tile1", b"tile_", TILE_MAX), None);
        assert_eq!(parse_indexed_name(b"planet_1", b"planet_", PLANET_MAX), Some(1));
        assert_eq!(parse_indexed_name(b"planet_2", b"planet_", PLANET_MAX), None);
    }
}
