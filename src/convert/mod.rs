//! Conversion between the game's native graphics files and sprite areas.
//!
//! Every conversion is exposed both as a run-to-completion function and as
//! an iterator that performs one image's worth of work per step, so a host
//! event loop can interleave progress reporting or cancellation.

pub mod planets;
pub mod scan;
pub mod sky;
pub mod tiles;

pub use planets::{
    csv_to_planets, planets_size, planets_to_csv, planets_to_sprites, planets_to_sprites_ext,
    sprites_to_planets, PlanetsToSprites, SpritesToPlanets,
};
pub use scan::{scan_sprite_file, Fixups, Scan, ScanContext};
pub use sky::{
    csv_to_sky, sky_size, sky_to_csv, sky_to_sprites, sky_to_sprites_ext, sprites_to_sky,
    SkyToSprites, SpritesToSky,
};
pub use tiles::{
    csv_to_tiles, sprites_to_tiles, tiles_size, tiles_to_csv, tiles_to_sprites,
    tiles_to_sprites_ext, SpritesToTiles, TilesToSprites,
};

use crate::error::{Error, Result};
use crate::io::{self, Reader, Writer};
use crate::resources::word_align;

/// Outcome of one conversion step.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Step {
    More,
    Done,
}

/// Cooperative single-step conversion.
///
/// `advance` performs exactly one unit of work and is re-entrant after an
/// error return; the iterator owns all of its state.
pub trait Convert {
    fn advance(&mut self) -> Result<Step>;

    /// Runs the conversion to completion.
    fn finish(&mut self) -> Result<()> {
        while let Step::More = self.advance()? {}
        Ok(())
    }

    /// Runs to completion unless `cancelled` reports true between steps.
    fn finish_unless(&mut self, cancelled: &mut dyn FnMut() -> bool) -> Result<()> {
        loop {
            if cancelled() {
                return Err(Error::Escape);
            }
            if let Step::Done = self.advance()? {
                return Ok(());
            }
        }
    }
}

/// Allocates a zeroed scratch buffer, reporting failure as `NoMem`.
pub(crate) fn scratch(size: usize) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(size).map_err(|_| Error::NoMem)?;
    buf.resize(size, 0);
    Ok(buf)
}

/// Copies one bitmap from reader to writer, inverting the row order.
/// Sprites store rows bottom-up; the native files store them top-down.
pub(crate) fn copy_flipped<R: Reader, W: Writer>(
    reader: &mut R,
    writer: &mut W,
    scratch: &mut [u8],
    width: i32,
    height: i32,
) -> Result<()> {
    let awidth = word_align(width) as usize;
    let size = awidth * height as usize;
    debug_assert!(scratch.len() >= size);

    let buf = &mut scratch[..size];
    io::read_exact(reader, buf)?;

    for row in (0..height as usize).rev() {
        io::write_all(writer, &buf[row * awidth..(row + 1) * awidth])?;
    }
    Ok(())
}
