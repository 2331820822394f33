//! Scanner, converter and CSV bridge tests over in-memory streams.

use byteorder::{LittleEndian, WriteBytesExt};
use std::io::{Cursor, Seek, SeekFrom, Write};

use skyforge::convert::{
    csv_to_planets, csv_to_sky, csv_to_tiles, planets_to_sprites, planets_to_sprites_ext,
    planets_to_csv, scan_sprite_file, sky_to_csv, sky_to_sprites_ext, sprites_to_planets,
    sprites_to_sky, sprites_to_tiles, tiles_size, tiles_to_csv, tiles_to_sprites,
    tiles_to_sprites_ext, Convert, Fixups, Step, TilesToSprites,
};
use skyforge::resources::planets::{PlanetsHeader, PaintOffset};
use skyforge::resources::sky::{Sky, SkyHeader};
use skyforge::resources::tiles::MapTilesHeader;
use skyforge::Error;

const SPRITE_HDR_SIZE: i32 = 44;

fn push_i32(buf: &mut Vec<u8>, value: i32) {
    buf.write_i32::<LittleEndian>(value).unwrap();
}

/// Appends a 44-byte sprite header for an unmasked 8 bpp sprite.
fn push_sprite_header(buf: &mut Vec<u8>, size: i32, name: &str, width: i32, height: i32) {
    push_i32(buf, size);
    let mut padded = [0u8; 12];
    padded[..name.len()].copy_from_slice(name.as_bytes());
    buf.extend_from_slice(&padded);
    push_i32(buf, (width + 3) / 4 - 1);
    push_i32(buf, height - 1);
    push_i32(buf, 0);
    push_i32(buf, (width * 8 - 1) % 32);
    push_i32(buf, SPRITE_HDR_SIZE);
    push_i32(buf, SPRITE_HDR_SIZE);
    push_i32(buf, 13);
}

/// Builds a whole sprite area from an extension region and finished
/// sprite records.
fn build_area(ext: &[u8], sprites: &[Vec<u8>]) -> Vec<u8> {
    let mut buf = Vec::new();
    let first = 16 + ext.len() as i32;
    let total: i32 = sprites.iter().map(|s| s.len() as i32).sum();
    push_i32(&mut buf, sprites.len() as i32);
    push_i32(&mut buf, first);
    push_i32(&mut buf, first + total);
    buf.extend_from_slice(ext);
    for sprite in sprites {
        buf.extend_from_slice(sprite);
    }
    buf
}

fn tile_sprite(num: i32) -> Vec<u8> {
    let mut buf = Vec::new();
    push_sprite_header(&mut buf, SPRITE_HDR_SIZE + 256, &format!("tile_{}", num), 16, 16);
    buf.extend((0..256).map(|i| (num * 3 + i) as u8));
    buf
}

fn planet_sprite(num: i32) -> Vec<u8> {
    let mut buf = Vec::new();
    push_sprite_header(&mut buf, SPRITE_HDR_SIZE + 1296, &format!("planet_{}", num), 34, 36);
    for y in 0..36 {
        for x in 0..34 {
            buf.push(((x + y) % 256) as u8);
        }
        buf.extend_from_slice(&[0, 0]); // row padding
    }
    buf
}

fn tiles_native(ntiles: i32) -> Vec<u8> {
    let mut buf = Vec::new();
    push_i32(&mut buf, ntiles - 1);
    let top = (ntiles - 1) as u8;
    buf.extend_from_slice(&[top, 0, top.min(1), top]);
    buf.extend_from_slice(&[0, top, 0, 0]);
    buf.extend_from_slice(&[9, 250, 0, 1]);
    for tile in 0..ntiles {
        buf.extend((0..256).map(|i| (tile * 7 + i) as u8));
    }
    buf
}

/// A native planets file whose bitmaps follow the header contiguously,
/// with `pixel(x, y) = (x + y) % 256` in the visible columns.
fn planets_native(nimages: i32) -> Vec<u8> {
    let mut buf = Vec::new();
    push_i32(&mut buf, nimages - 1);
    for coords in &[(-3, -4), (0, -36)] {
        push_i32(&mut buf, coords.0);
        push_i32(&mut buf, coords.1);
    }
    let mut offset = 36;
    for _ in 0..2 {
        push_i32(&mut buf, offset);
        push_i32(&mut buf, offset + 1296);
        offset += 2 * 1296;
    }
    for _ in 0..nimages {
        // Copy A: left-aligned with the margin on the right.
        for y in 0..36 {
            for x in 0..34 {
                buf.push(((x + y) % 256) as u8);
            }
            buf.extend_from_slice(&[0, 0]);
        }
        // Copy B: the margin on the left.
        for y in 0..36 {
            buf.extend_from_slice(&[0, 0]);
            for x in 0..34 {
                buf.push(((x + y) % 256) as u8);
            }
        }
    }
    buf
}

fn sky_native() -> Vec<u8> {
    let mut sky = Sky::new();
    for pos in 0..126 {
        sky.set_colour(pos, (pos * 2 % 256) as u8);
    }
    sky.set_render_offset(13);
    sky.set_stars_height(-9);
    let mut buf = Cursor::new(Vec::new());
    sky.write(&mut buf).unwrap();
    buf.into_inner()
}

#[test]
fn tiles_round_trip_through_sprites() {
    let native = tiles_native(3);
    let mut reader = Cursor::new(native.clone());
    let mut area = Cursor::new(Vec::new());
    tiles_to_sprites_ext(&mut reader, &mut area).unwrap();

    area.set_position(0);
    let context = scan_sprite_file(&mut area).unwrap();
    assert_eq!(context.tiles.count, 3);
    assert_eq!(context.tiles.hdr.last_tile_num, 2);
    assert!(context.tiles.got_hdr);
    assert!(context.fixups.is_empty());
    assert!(context.bad_sprite.is_none());

    let mut rebuilt = Cursor::new(Vec::new());
    sprites_to_tiles(&mut area, &mut rebuilt, &context).unwrap();
    assert_eq!(rebuilt.get_ref(), &native);
    assert_eq!(rebuilt.get_ref().len() as i64, tiles_size(&context.tiles.hdr));
}

#[test]
fn tiles_without_metadata_need_animation_data() {
    let native = tiles_native(2);
    let mut reader = Cursor::new(native);
    let mut area = Cursor::new(Vec::new());
    tiles_to_sprites(&mut reader, &mut area).unwrap();

    area.set_position(0);
    let mut context = scan_sprite_file(&mut area).unwrap();
    assert!(!context.tiles.got_hdr);

    let mut rebuilt = Cursor::new(Vec::new());
    assert_eq!(
        sprites_to_tiles(&mut area, &mut rebuilt, &context),
        Err(Error::NoAnim)
    );

    // Supplying the animation data as CSV unblocks the conversion.
    let mut csv = Cursor::new(b"1,0,1,0\n0,1,0,1\n5,6,7,8\n".to_vec());
    csv_to_tiles(&mut csv, &mut context.tiles.hdr).unwrap();
    context.tiles.got_hdr = true;
    assert_eq!(context.tiles.hdr.splash_anim_1, [1, 0, 1, 0]);

    let mut rebuilt = Cursor::new(Vec::new());
    sprites_to_tiles(&mut area, &mut rebuilt, &context).unwrap();
}

#[test]
fn missing_tile_numbers_become_blank_bitmaps() {
    let sprites = vec![tile_sprite(0), tile_sprite(2)];
    let mut ext = Vec::new();
    ext.extend_from_slice(b"ANIM");
    ext.extend_from_slice(&[0u8; 12]);
    let area = build_area(&ext, &sprites);

    let mut reader = Cursor::new(area);
    let context = scan_sprite_file(&mut reader).unwrap();
    assert_eq!(context.tiles.count, 2);
    assert_eq!(context.tiles.hdr.last_tile_num, 2);

    let mut native = Cursor::new(Vec::new());
    sprites_to_tiles(&mut reader, &mut native, &context).unwrap();
    let native = native.into_inner();
    assert_eq!(native.len(), 16 + 3 * 256);
    assert!(native[16 + 256..16 + 512].iter().all(|&b| b == 0));
}

#[test]
fn trailing_bytes_after_tiles_fail() {
    let mut native = tiles_native(1);
    native.push(0x43);
    let mut reader = Cursor::new(native);
    let mut area = Cursor::new(Vec::new());
    assert_eq!(tiles_to_sprites(&mut reader, &mut area), Err(Error::TooLong));
}

#[test]
fn scan_clamps_animation_frames_to_found_tiles() {
    let mut ext = Vec::new();
    ext.extend_from_slice(b"ANIM");
    ext.extend_from_slice(&[0, 7, 0, 0]); // frame 7 > last tile 0
    ext.extend_from_slice(&[0u8; 8]);
    let area = build_area(&ext, &[tile_sprite(0)]);

    let context = scan_sprite_file(&mut Cursor::new(area)).unwrap();
    assert!(context.fixups.contains(Fixups::TILE_ANIMS));
    assert_eq!(context.tiles.hdr.splash_anim_1, [0, 0, 0, 0]);
}

#[test]
fn unidentified_sprites_are_recorded_not_fatal() {
    let mut bogus = Vec::new();
    push_sprite_header(&mut bogus, SPRITE_HDR_SIZE + 256, "bogus", 16, 16);
    bogus.extend_from_slice(&[0u8; 256]);
    let area = build_area(&[], &[bogus, tile_sprite(0)]);

    let context = scan_sprite_file(&mut Cursor::new(area)).unwrap();
    assert_eq!(context.bad_sprite.as_deref(), Some("bogus"));
    assert_eq!(context.tiles.count, 1);
}

#[test]
fn ambiguous_area_scans_but_will_not_convert() {
    let area = build_area(&[], &[tile_sprite(0), planet_sprite(0)]);
    let mut reader = Cursor::new(area);
    let context = scan_sprite_file(&mut reader).unwrap();
    assert_eq!(context.class_count(), 2);

    let mut out = Cursor::new(Vec::new());
    assert_eq!(
        sprites_to_tiles(&mut reader, &mut out, &context),
        Err(Error::BadSprite)
    );
    assert_eq!(
        sprites_to_planets(&mut reader, &mut out, &context),
        Err(Error::BadSprite)
    );
}

#[test]
fn planets_round_trip_through_sprites() {
    let native = planets_native(2);
    let mut reader = Cursor::new(native.clone());
    let mut area = Cursor::new(Vec::new());
    planets_to_sprites_ext(&mut reader, &mut area).unwrap();

    area.set_position(0);
    let context = scan_sprite_file(&mut area).unwrap();
    assert_eq!(context.planets.count, 2);
    assert!(context.planets.got_hdr);
    assert_eq!(context.planets.hdr.paint_coords[0], PaintOffset { x: -3, y: -4 });

    let mut rebuilt = Cursor::new(Vec::new());
    sprites_to_planets(&mut area, &mut rebuilt, &context).unwrap();
    assert_eq!(rebuilt.get_ref(), &native);

    // The margin columns of both native copies stay black.
    let rebuilt = rebuilt.into_inner();
    for image in 0..2usize {
        let base_a = 36 + image * 2 * 1296;
        let base_b = base_a + 1296;
        for row in 0..36 {
            assert_eq!(rebuilt[base_a + row * 36 + 34], 0);
            assert_eq!(rebuilt[base_a + row * 36 + 35], 0);
            assert_eq!(rebuilt[base_b + row * 36], 0);
            assert_eq!(rebuilt[base_b + row * 36 + 1], 0);
        }
    }
}

#[test]
fn mismatched_planet_copies_fail() {
    let mut native = planets_native(1);
    // Corrupt one pixel of copy B only.
    let copy_b_pixel = 36 + 1296 + 10 * 36 + 5;
    native[copy_b_pixel] ^= 0xff;

    let mut area = Cursor::new(Vec::new());
    assert_eq!(
        planets_to_sprites(&mut Cursor::new(native), &mut area),
        Err(Error::BadImages)
    );
}

#[test]
fn stray_penultimate_column_fails_except_known_rows() {
    const STRAY: [u8; 11] = [1, 1, 2, 2, 2, 36, 2, 5, 2, 2, 1];

    // The known stray bytes in image 1 are tolerated.
    let mut native = planets_native(2);
    let image_1_copy_a = 36 + 2 * 1296;
    for (i, &value) in STRAY.iter().enumerate() {
        native[image_1_copy_a + (12 + i) * 36 + 34] = value;
    }
    let mut area = Cursor::new(Vec::new());
    if cfg!(feature = "alien-quirk") {
        planets_to_sprites(&mut Cursor::new(native.clone()), &mut area).unwrap();
    } else {
        assert_eq!(
            planets_to_sprites(&mut Cursor::new(native.clone()), &mut area),
            Err(Error::BadImages)
        );
    }

    // A different stray value fails on any row.
    let mut broken = planets_native(2);
    broken[image_1_copy_a + 12 * 36 + 34] = 99;
    let mut area = Cursor::new(Vec::new());
    assert_eq!(
        planets_to_sprites(&mut Cursor::new(broken), &mut area),
        Err(Error::BadImages)
    );

    // The same bytes in image 0 fail too.
    let mut broken = planets_native(2);
    broken[36 + 12 * 36 + 34] = STRAY[0];
    let mut area = Cursor::new(Vec::new());
    assert_eq!(
        planets_to_sprites(&mut Cursor::new(broken), &mut area),
        Err(Error::BadImages)
    );
}

#[test]
fn sky_round_trip_preserves_dithered_rows() {
    let native = sky_native();
    let mut reader = Cursor::new(native.clone());
    let mut area = Cursor::new(Vec::new());
    sky_to_sprites_ext(&mut reader, &mut area).unwrap();

    area.set_position(0);
    let context = scan_sprite_file(&mut area).unwrap();
    assert_eq!(context.sky.count, 1);
    assert!(context.sky.got_hdr);
    assert_eq!(
        context.sky.hdr,
        SkyHeader {
            render_offset: 13,
            stars_height: -9
        }
    );

    let mut rebuilt = Cursor::new(Vec::new());
    sprites_to_sky(&mut area, &mut rebuilt, &context).unwrap();
    assert_eq!(rebuilt.get_ref(), &native);
}

#[test]
fn sky_heights_from_extension_are_clamped() {
    let native = sky_native();
    let mut reader = Cursor::new(native);
    let mut area = Cursor::new(Vec::new());
    sky_to_sprites_ext(&mut reader, &mut area).unwrap();

    // Rewrite the HEIG payload with an out-of-range render offset.
    area.seek(SeekFrom::Start(16)).unwrap();
    area.write_all(&9999i32.to_le_bytes()).unwrap();

    area.set_position(0);
    let context = scan_sprite_file(&mut area).unwrap();
    assert!(context.fixups.contains(Fixups::RENDER_OFFSET));
    assert_eq!(context.sky.hdr.render_offset, 3648);
}

#[test]
fn csv_round_trips() {
    // Tiles: the three animation lines survive a round trip.
    let mut csv = Cursor::new(Vec::new());
    tiles_to_csv(&mut Cursor::new(tiles_native(3)), &mut csv).unwrap();
    let mut hdr = MapTilesHeader {
        last_tile_num: 2,
        ..MapTilesHeader::default()
    };
    csv.set_position(0);
    csv_to_tiles(&mut csv, &mut hdr).unwrap();
    let expected = MapTilesHeader::read(&mut Cursor::new(tiles_native(3))).unwrap();
    assert_eq!(hdr, expected);

    // Planets: one x,y line per image.
    let mut csv = Cursor::new(Vec::new());
    planets_to_csv(&mut Cursor::new(planets_native(2)), &mut csv).unwrap();
    assert_eq!(csv.get_ref().as_slice(), b"-3,-4\n0,-36\n");
    let mut hdr = PlanetsHeader {
        last_image_num: 1,
        ..PlanetsHeader::default()
    };
    csv.set_position(0);
    csv_to_planets(&mut csv, &mut hdr).unwrap();
    assert_eq!(hdr.paint_coords[0], PaintOffset { x: -3, y: -4 });
    assert_eq!(hdr.paint_coords[1], PaintOffset { x: 0, y: -36 });

    // Sky: a single render_offset,stars_height line.
    let mut csv = Cursor::new(Vec::new());
    sky_to_csv(&mut Cursor::new(sky_native()), &mut csv).unwrap();
    assert_eq!(csv.get_ref().as_slice(), b"13,-9\n");
    let mut hdr = SkyHeader::default();
    csv.set_position(0);
    csv_to_sky(&mut csv, &mut hdr).unwrap();
    assert_eq!(hdr, SkyHeader { render_offset: 13, stars_height: -9 });
}

#[test]
fn csv_imports_clamp_and_warn() {
    let mut hdr = SkyHeader::default();
    let mut csv = Cursor::new(b"99999,-99999\n".to_vec());
    assert_eq!(csv_to_sky(&mut csv, &mut hdr), Err(Error::ForceSky));
    assert_eq!(hdr, SkyHeader { render_offset: 3648, stars_height: -32768 });

    let mut hdr = MapTilesHeader {
        last_tile_num: 4,
        ..MapTilesHeader::default()
    };
    let mut csv = Cursor::new(b"9,-1,2,3\n".to_vec());
    assert_eq!(csv_to_tiles(&mut csv, &mut hdr), Err(Error::ForceAnim));
    assert_eq!(hdr.splash_anim_1, [4, 0, 2, 3]);

    let mut overlong = Cursor::new(vec![b'1'; 400]);
    let mut hdr = SkyHeader::default();
    assert_eq!(csv_to_sky(&mut overlong, &mut hdr), Err(Error::StrOFlo));
}

#[test]
fn converters_step_one_image_at_a_time() {
    let native = tiles_native(3);
    let mut reader = Cursor::new(native.clone());
    let mut area = Cursor::new(Vec::new());
    let mut iter = TilesToSprites::with_metadata(&mut reader, &mut area).unwrap();

    for _ in 0..3 {
        assert_eq!(iter.advance().unwrap(), Step::More);
    }
    assert_eq!(iter.advance().unwrap(), Step::Done);
    assert_eq!(iter.advance().unwrap(), Step::Done);

    // Cancellation between steps surfaces as Escape.
    let mut reader = Cursor::new(native);
    let mut area = Cursor::new(Vec::new());
    let mut iter = TilesToSprites::new(&mut reader, &mut area).unwrap();
    assert_eq!(iter.advance().unwrap(), Step::More);
    let mut cancelled = || true;
    assert_eq!(iter.finish_unless(&mut cancelled), Err(Error::Escape));
}

#[test]
fn conversions_work_through_real_files() {
    let dir = tempfile::tempdir().unwrap();
    let native_path = dir.path().join("tiles");
    std::fs::write(&native_path, tiles_native(2)).unwrap();

    let mut reader = std::fs::File::open(&native_path).unwrap();
    let mut area = Cursor::new(Vec::new());
    tiles_to_sprites_ext(&mut reader, &mut area).unwrap();

    area.set_position(0);
    let context = scan_sprite_file(&mut area).unwrap();
    let mut rebuilt = Cursor::new(Vec::new());
    sprites_to_tiles(&mut area, &mut rebuilt, &context).unwrap();
    assert_eq!(rebuilt.get_ref(), &std::fs::read(&native_path).unwrap());
}
