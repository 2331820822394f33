use anyhow::{bail, Context, Result as AResult};
use skyforge::convert::{
    csv_to_planets, csv_to_sky, csv_to_tiles, planets_to_csv, planets_to_sprites,
    planets_to_sprites_ext, scan_sprite_file, sky_to_csv, sky_to_sprites, sky_to_sprites_ext,
    sprites_to_planets, sprites_to_sky, sprites_to_tiles, tiles_to_csv, tiles_to_sprites,
    tiles_to_sprites_ext, ScanContext,
};
use skyforge::resources::planets::{PLANETS_HDR_SIZE, PLANET_BITMAP_SIZE};
use skyforge::resources::sky::{SKY_BITMAP_SIZE, SKY_HDR_SIZE};
use skyforge::resources::tiles::{TILES_HDR_SIZE, TILE_BITMAP_SIZE};
use skyforge::Error;
use std::fs::{self, File};
use std::io::{BufReader, Cursor};
use std::process::exit;

const USAGE: &str = "\
Usage:
  sfconv scan <sprites>
  sfconv to-sprites --kind <tiles|planets|sky> [--metadata] <in> <out>
  sfconv from-sprites [--csv <metadata>] <in> <out>
  sfconv to-csv --kind <tiles|planets|sky> <in> <out>";

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Kind {
    Tiles,
    Planets,
    Sky,
}

impl Kind {
    fn parse(name: &str) -> AResult<Self> {
        match name {
            "tiles" => Ok(Self::Tiles),
            "planets" => Ok(Self::Planets),
            "sky" => Ok(Self::Sky),
            other => bail!("unknown graphics kind {:?}", other),
        }
    }

    /// Smallest native file that can hold one image of this kind.
    fn min_native_size(self) -> u64 {
        match self {
            Self::Tiles => (TILES_HDR_SIZE as u64) + TILE_BITMAP_SIZE as u64,
            Self::Planets => (PLANETS_HDR_SIZE as u64) + 2 * PLANET_BITMAP_SIZE as u64,
            Self::Sky => (SKY_HDR_SIZE as u64) + SKY_BITMAP_SIZE as u64,
        }
    }
}

fn open_input(path: &str) -> AResult<BufReader<File>> {
    let file = File::open(path)
        .map_err(|_| Error::OpenInFail)
        .with_context(|| format!("while opening {}", path))?;
    Ok(BufReader::new(file))
}

fn check_min_size(path: &str, kind: Kind) -> AResult<()> {
    let metadata = fs::metadata(path)
        .map_err(|_| Error::OpenInFail)
        .with_context(|| format!("while opening {}", path))?;
    if metadata.len() < kind.min_native_size() {
        return Err(Error::TooShort).with_context(|| format!("while reading {}", path));
    }
    Ok(())
}

fn save_output(path: &str, data: &[u8]) -> AResult<()> {
    fs::write(path, data)
        .map_err(|_| Error::OpenOutFail)
        .with_context(|| format!("while writing {}", path))
}

fn scan(path: &str) -> AResult<()> {
    let mut reader = open_input(path)?;
    let context = scan_sprite_file(&mut reader).with_context(|| format!("while scanning {}", path))?;

    println!(
        "{}: {} tile(s), {} planet(s), {} sky",
        path, context.tiles.count, context.planets.count, context.sky.count
    );
    if let Some(name) = &context.bad_sprite {
        println!("unidentified sprite {:?} was ignored", name);
    }
    if !context.fixups.is_empty() {
        println!("some metadata was forced within bounds: {:?}", context.fixups);
    }
    Ok(())
}

fn to_sprites(kind: Kind, metadata: bool, input: &str, output: &str) -> AResult<()> {
    check_min_size(input, kind)?;
    let mut reader = open_input(input)?;
    let mut out = Cursor::new(Vec::new());

    let result = match (kind, metadata) {
        (Kind::Tiles, false) => tiles_to_sprites(&mut reader, &mut out),
        (Kind::Tiles, true) => tiles_to_sprites_ext(&mut reader, &mut out),
        (Kind::Planets, false) => planets_to_sprites(&mut reader, &mut out),
        (Kind::Planets, true) => planets_to_sprites_ext(&mut reader, &mut out),
        (Kind::Sky, false) => sky_to_sprites(&mut reader, &mut out),
        (Kind::Sky, true) => sky_to_sprites_ext(&mut reader, &mut out),
    };
    result.with_context(|| format!("while converting {}", input))?;

    save_output(output, out.get_ref())
}

/// Supplies missing header metadata from a CSV file, reporting clamped
/// values as warnings rather than failures.
fn apply_csv(context: &mut ScanContext, path: &str) -> AResult<()> {
    let mut reader = open_input(path)?;

    let result = if context.tiles.count > 0 {
        context.tiles.got_hdr = true;
        csv_to_tiles(&mut reader, &mut context.tiles.hdr)
    } else if context.planets.count > 0 {
        context.planets.got_hdr = true;
        csv_to_planets(&mut reader, &mut context.planets.hdr)
    } else {
        context.sky.got_hdr = true;
        csv_to_sky(&mut reader, &mut context.sky.hdr)
    };

    match result {
        Ok(()) => Ok(()),
        Err(err @ (Error::ForceAnim | Error::ForceOff | Error::ForceSky)) => {
            eprintln!("warning: {}", err);
            Ok(())
        }
        Err(err) => Err(err).with_context(|| format!("while reading {}", path)),
    }
}

fn from_sprites(csv: Option<&str>, input: &str, output: &str) -> AResult<()> {
    let mut reader = open_input(input)?;
    let mut context =
        scan_sprite_file(&mut reader).with_context(|| format!("while scanning {}", input))?;

    if context.class_count() == 0 {
        return Err(Error::BadSprite).with_context(|| format!("while scanning {}", input));
    }
    if let Some(path) = csv {
        apply_csv(&mut context, path)?;
    }

    let mut out = Cursor::new(Vec::new());
    let result = if context.tiles.count > 0 {
        sprites_to_tiles(&mut reader, &mut out, &context)
    } else if context.planets.count > 0 {
        sprites_to_planets(&mut reader, &mut out, &context)
    } else {
        sprites_to_sky(&mut reader, &mut out, &context)
    };
    result.with_context(|| format!("while converting {}", input))?;

    save_output(output, out.get_ref())
}

fn to_csv(kind: Kind, input: &str, output: &str) -> AResult<()> {
    check_min_size(input, kind)?;
    let mut reader = open_input(input)?;
    let mut out = Cursor::new(Vec::new());

    let result = match kind {
        Kind::Tiles => tiles_to_csv(&mut reader, &mut out),
        Kind::Planets => planets_to_csv(&mut reader, &mut out),
        Kind::Sky => sky_to_csv(&mut reader, &mut out),
    };
    result.with_context(|| format!("while converting {}", input))?;

    save_output(output, out.get_ref())
}

fn main() -> AResult<()> {
    let mut args = pico_args::Arguments::from_env();

    let metadata = args.contains("--metadata");
    let kind: Option<String> = args.opt_value_from_str("--kind")?;
    let csv: Option<String> = args.opt_value_from_str("--csv")?;
    let free = args.free()?;

    let (command, paths) = match free.split_first() {
        Some((command, paths)) => (command.as_str(), paths),
        None => {
            println!("{} graphics converter", skyforge::name(true));
            println!("{}", USAGE);
            exit(1);
        }
    };

    match (command, paths) {
        ("scan", [input]) => scan(input),
        ("to-sprites", [input, output]) => {
            let kind = kind.context("to-sprites needs --kind")?;
            to_sprites(Kind::parse(&kind)?, metadata, input, output)
        }
        ("from-sprites", [input, output]) => from_sprites(csv.as_deref(), input, output),
        ("to-csv", [input, output]) => {
            let kind = kind.context("to-csv needs --kind")?;
            to_csv(Kind::parse(&kind)?, input, output)
        }
        _ => {
            println!("{}", USAGE);
            exit(1);
        }
    }
}
