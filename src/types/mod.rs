pub mod palette;

pub use palette::{nearest_entry, Palette, PaletteEntry, PIXEL_COLOURS};
