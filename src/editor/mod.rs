//! Interactive editing of sky colour bands with grouped undo/redo.
//!
//! An [`EditSky`] session owns one [`Sky`], the undo log and any number of
//! editors. Each editor is a selection over the shared band array; every
//! mutation goes through the session so that it can be recorded, redrawn
//! and propagated to the other editors' selections.

mod record;

use log::debug;
use slab::Slab;

use crate::error::Result;
use crate::io::Reader;
use crate::resources::sky::{
    Sky, BANDS, RENDER_OFFSET_MAX, RENDER_OFFSET_MIN, STARS_HEIGHT_MAX, STARS_HEIGHT_MIN,
};
use crate::types::palette::{nearest_entry, Palette};
use record::{EditRecord, Fill, Splice, SpliceKind, Swap};

/// Band positions run from 0 to this value inclusive; a caret at the top
/// sits just past the last band.
pub const BAND_COUNT: i32 = BANDS as i32;

/// Identifies one editor attached to a session.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct EditorId(usize);

/// Receives change notifications from a session, synchronously during the
/// mutator call. Implementations must not call back into the session.
pub trait SkyWatcher {
    /// Bands in `[low, high)` changed.
    fn bands_changed(&mut self, low: i32, high: i32) {
        let _ = (low, high);
    }

    fn render_offset_changed(&mut self) {}

    fn stars_height_changed(&mut self) {}

    /// An editor's ordered selection endpoints moved. Not called when a
    /// selection mutator leaves the ordered pair unchanged.
    fn selection_changed(
        &mut self,
        editor: EditorId,
        old_low: i32,
        old_high: i32,
        new_low: i32,
        new_high: i32,
    ) {
        let _ = (editor, old_low, old_high, new_low, new_high);
    }
}

/// Watcher that ignores every notification.
pub struct NullWatcher;

impl SkyWatcher for NullWatcher {}

struct EditorState {
    /// Selection anchor; this end carries the caret.
    start: i32,
    end: i32,
}

fn clamp_colour(colour: i32) -> u8 {
    colour.clamp(0, 255) as u8
}

fn clamp_pos(pos: i32) -> i32 {
    pos.clamp(0, BAND_COUNT)
}

/// Adjusts `index` for `ncols` bands inserted (positive) or removed
/// (negative) at `change_pos`.
fn budge_index(index: i32, change_pos: i32, ncols: i32) -> i32 {
    debug_assert!((0..=BAND_COUNT).contains(&index));
    debug_assert!((0..=BAND_COUNT).contains(&change_pos));
    if index < change_pos {
        index
    } else {
        (index + ncols).clamp(change_pos, BAND_COUNT)
    }
}

fn update_index(index: i32, change_pos: i32, ndel: i32, nadd: i32) -> i32 {
    debug_assert!(ndel >= 0);
    debug_assert!(nadd >= 0);
    budge_index(budge_index(index, change_pos, -ndel), change_pos, nadd)
}

fn set_saving(sky: &mut Sky, pos: i32, rep: u8, lost: &mut [u8], idx: usize) -> bool {
    let old = sky.colour(pos as usize);
    if idx < lost.len() {
        lost[idx] = old;
    }
    if old == rep {
        return false;
    }
    sky.set_colour(pos as usize, rep);
    true
}

fn write_plain(sky: &mut Sky, start: i32, end: i32, colour: u8, lost: &mut [u8]) -> bool {
    let mut changed = false;
    for pos in start..end {
        if set_saving(sky, pos, colour, lost, (pos - start) as usize) {
            changed = true;
        }
    }
    changed
}

/// Overwrites `[start, end)` from an external integer array, replacing
/// out-of-range entries with black and clearing `is_valid`.
fn set_array(
    sky: &mut Sky,
    start: i32,
    end: i32,
    src: &[i32],
    lost: &mut [u8],
    is_valid: &mut bool,
) -> bool {
    *is_valid = true;
    let mut changed = false;
    for pos in start..end {
        let idx = (pos - start) as usize;
        let mut rep = src[idx];
        if !(0..=255).contains(&rep) {
            rep = 0;
            *is_valid = false;
        }
        if set_saving(sky, pos, rep as u8, lost, idx) {
            changed = true;
        }
    }
    changed
}

fn set_bytes(sky: &mut Sky, start: i32, end: i32, src: &[u8], lost: &mut [u8]) -> bool {
    let mut changed = false;
    for pos in start..end {
        let idx = (pos - start) as usize;
        if set_saving(sky, pos, src[idx], lost, idx) {
            changed = true;
        }
    }
    changed
}

fn get_bytes(sky: &Sky, start: i32, end: i32, dst: &mut [u8]) {
    for pos in start..end {
        dst[(pos - start) as usize] = sky.colour(pos as usize);
    }
}

/// Overwrites `[start, end)` of `dst` with the leading bands of `src`.
fn copy_between(dst: &mut Sky, start: i32, end: i32, src: &Sky, lost: &mut [u8]) -> bool {
    let mut changed = false;
    for pos in start..end {
        let idx = (pos - start) as usize;
        if set_saving(dst, pos, src.colour(idx), lost, idx) {
            changed = true;
        }
    }
    changed
}

/// Shifts `[end, BAND_COUNT)` down to `start`, zero-filling the vacated
/// tail and saving the overwritten head bands.
fn budge_down(sky: &mut Sky, start: i32, end: i32, lost: &mut [u8]) -> bool {
    let size = end - start;
    if size <= 0 {
        return false;
    }

    let mut changed = false;
    for pos in start..BAND_COUNT {
        let old = sky.colour(pos as usize);
        let rep = if pos + size < BAND_COUNT {
            sky.colour((pos + size) as usize)
        } else {
            0
        };

        let idx = (pos - start) as usize;
        if idx < lost.len() {
            lost[idx] = old;
        }
        if old != rep {
            sky.set_colour(pos as usize, rep);
            changed = true;
        }
    }
    changed
}

/// Shifts `[start, BAND_COUNT - size)` up to `end`, saving the bands
/// displaced off the top of the file.
fn budge_up(sky: &mut Sky, start: i32, end: i32, lost: &mut [u8]) -> bool {
    let size = end - start;
    if size <= 0 {
        return false;
    }

    if !lost.is_empty() {
        get_bytes(sky, BAND_COUNT - size, BAND_COUNT, lost);
    }

    let mut changed = false;
    for pos in (end..BAND_COUNT).rev() {
        let old = sky.colour(pos as usize);
        let rep = sky.colour((pos - size) as usize);
        if old != rep {
            sky.set_colour(pos as usize, rep);
            changed = true;
        }
    }
    changed
}

/// Transforms a span ending at `old_end` into one ending at `new_end`.
fn budge(sky: &mut Sky, old_end: i32, new_end: i32, lost: &mut [u8]) -> bool {
    if new_end > old_end {
        budge_up(sky, old_end, new_end, lost)
    } else if new_end < old_end {
        budge_down(sky, new_end, old_end, lost)
    } else {
        false
    }
}

/// Exact inverse of [`budge`], given the bytes it preserved.
fn unbudge(sky: &mut Sky, old_end: i32, new_end: i32, lost: &[u8]) -> bool {
    if new_end > old_end {
        let mut changed = budge_down(sky, old_end, new_end, &mut []);
        if set_bytes(sky, BAND_COUNT - (new_end - old_end), BAND_COUNT, lost, &mut []) {
            changed = true;
        }
        changed
    } else if new_end < old_end {
        let mut changed = budge_up(sky, new_end, old_end, &mut []);
        if set_bytes(sky, new_end, old_end, lost, &mut []) {
            changed = true;
        }
        changed
    } else {
        false
    }
}

/// Writes a gradient between the fill's colours over `[start, end)`,
/// stepping once per band and snapping each step to the nearest palette
/// entry.
fn interpolate_span(
    sky: &mut Sky,
    palette: &Palette,
    start: i32,
    end: i32,
    fill: Fill,
    lost: &mut [u8],
) -> bool {
    debug_assert!(fill.len >= end - start);

    let mut changed = false;
    let mut dist = fill.len;

    let mut effective_start = start;
    if fill.inc_start {
        if start < end
            && set_saving(sky, effective_start, fill.start, lost, 0)
        {
            changed = true;
        }
        effective_start += 1;
    } else {
        dist += 1;
    }

    let mut effective_end = start + fill.len;
    if fill.inc_end {
        effective_end -= 1;
        if effective_end < end
            && effective_end >= effective_start
            && set_saving(sky, effective_end, fill.end, lost, (effective_end - start) as usize)
        {
            changed = true;
        }
    } else {
        dist += 1;
    }

    // The middle part of the gradient may be non-existent.
    if effective_start >= effective_end {
        return changed;
    }

    // The number of transitions is one less than the number of colours.
    debug_assert!(dist > 1);
    dist -= 1;

    if effective_end > end {
        effective_end = end;
    }

    let start_entry = palette[fill.start as usize];
    let end_entry = palette[fill.end as usize];

    let red_inc = (end_entry.red() - start_entry.red()) as f32 / dist as f32;
    let green_inc = (end_entry.green() - start_entry.green()) as f32 / dist as f32;
    let blue_inc = (end_entry.blue() - start_entry.blue()) as f32 / dist as f32;
    let mut red = start_entry.red() as f32;
    let mut green = start_entry.green() as f32;
    let mut blue = start_entry.blue() as f32;

    // This loop never writes the start or end colour itself, even when one
    // or both is included.
    for pos in effective_start..effective_end {
        red += red_inc;
        green += green_inc;
        blue += blue_inc;

        let near = nearest_entry(
            palette,
            (red + 0.5) as i32,
            (green + 0.5) as i32,
            (blue + 0.5) as i32,
        );
        if set_saving(sky, pos, near, lost, (pos - start) as usize) {
            changed = true;
        }
    }
    changed
}

fn new_splice(kind: SpliceKind, dst_start: i32, dst_end: i32, src_start: i32, fill: Fill) -> Splice {
    debug_assert!(dst_start >= 0);
    debug_assert!(dst_start <= dst_end);
    debug_assert!(dst_end <= BAND_COUNT);
    debug_assert!(fill.len >= 0);

    let mut trim = fill.len;
    if dst_start + trim > BAND_COUNT {
        trim = BAND_COUNT - dst_start;
        debug!("truncated import to {} bands", trim);
    }

    let dst_size = dst_end - dst_start;
    let budge_size = (dst_size - trim).abs();
    let lost_size = trim.min(dst_size);
    let fresh_size = match kind {
        SpliceKind::Move | SpliceKind::Copy | SpliceKind::InsertArray => trim,
        _ => 0,
    };

    Splice {
        kind,
        dst_start,
        old_dst_end: dst_end,
        new_dst_end: dst_start + trim,
        src_start,
        lost: vec![0; lost_size as usize],
        budge_lost: vec![0; budge_size as usize],
        fresh: vec![0; fresh_size as usize],
        fill,
    }
}

/// An editing session: one sky, its undo log and its editors.
pub struct EditSky {
    sky: Sky,
    editors: Slab<EditorState>,
    undo_list: Vec<EditRecord>,
    /// Number of applied records; the record at `next_undo - 1` is the
    /// next to be undone.
    next_undo: usize,
    watcher: Box<dyn SkyWatcher>,
}

impl EditSky {
    /// Creates a session over a default (all-black) sky.
    #[must_use]
    pub fn new(watcher: Box<dyn SkyWatcher>) -> Self {
        Self {
            sky: Sky::new(),
            editors: Slab::new(),
            undo_list: Vec::new(),
            next_undo: 0,
            watcher,
        }
    }

    /// Creates a session from a sky file in the game's native format.
    pub fn load<R: Reader>(reader: &mut R, watcher: Box<dyn SkyWatcher>) -> Result<Self> {
        let mut session = Self::new(watcher);
        session.sky = Sky::read(reader)?;
        Ok(session)
    }

    #[must_use]
    pub fn sky(&self) -> &Sky {
        &self.sky
    }

    /// Attaches a new editor with its caret at the bottom.
    pub fn add_editor(&mut self) -> EditorId {
        EditorId(self.editors.insert(EditorState { start: 0, end: 0 }))
    }

    /// Detaches an editor. Its id must not be used again.
    pub fn remove_editor(&mut self, editor: EditorId) {
        self.editors.remove(editor.0);
    }

    fn push_record(&mut self, rec: EditRecord) {
        // A new edit invalidates everything that had been undone.
        self.undo_list.truncate(self.next_undo);
        self.undo_list.push(rec);
        self.next_undo += 1;
    }

    // --- Selection ---

    fn set_selection(&mut self, editor: EditorId, new_start: i32, new_end: i32) -> bool {
        debug_assert!((0..=BAND_COUNT).contains(&new_start));
        debug_assert!((0..=BAND_COUNT).contains(&new_end));

        let state = &mut self.editors[editor.0];
        let (old_start, old_end) = (state.start, state.end);
        if new_start == old_start && new_end == old_end {
            return false;
        }
        state.start = new_start;
        state.end = new_end;

        let (old_low, old_high) = (old_start.min(old_end), old_start.max(old_end));
        let (new_low, new_high) = (new_start.min(new_end), new_start.max(new_end));
        if new_low != old_low || new_high != old_high {
            self.watcher
                .selection_changed(editor, old_low, old_high, new_low, new_high);
        }
        true
    }

    #[must_use]
    pub fn has_selection(&self, editor: EditorId) -> bool {
        let state = &self.editors[editor.0];
        state.start != state.end
    }

    /// Ordered selection endpoints.
    #[must_use]
    pub fn selection_range(&self, editor: EditorId) -> (i32, i32) {
        let state = &self.editors[editor.0];
        (state.start.min(state.end), state.start.max(state.end))
    }

    /// The caret position (selection anchor).
    #[must_use]
    pub fn caret(&self, editor: EditorId) -> i32 {
        self.editors[editor.0].start
    }

    pub fn set_caret(&mut self, editor: EditorId, pos: i32) -> bool {
        let pos = clamp_pos(pos);
        self.set_selection(editor, pos, pos)
    }

    /// Moves the non-anchor selection end.
    pub fn set_selection_end(&mut self, editor: EditorId, pos: i32) -> bool {
        let pos = clamp_pos(pos);
        let start = self.editors[editor.0].start;
        self.set_selection(editor, start, pos)
    }

    /// Moves whichever ordered endpoint is nearer to `pos`; the farther
    /// one becomes the anchor.
    pub fn set_selection_nearest(&mut self, editor: EditorId, pos: i32) -> bool {
        let pos = clamp_pos(pos);
        let (low, high) = self.selection_range(editor);
        let keep = if (pos - low).abs() < (pos - high).abs() {
            high
        } else {
            low
        };
        self.set_selection(editor, keep, pos)
    }

    pub fn clear_selection(&mut self, editor: EditorId) -> bool {
        let pos = self.editors[editor.0].start;
        self.set_caret(editor, pos)
    }

    pub fn select_all(&mut self, editor: EditorId) -> bool {
        self.set_selection(editor, 0, BAND_COUNT)
    }

    /// Colour of the lowest selected band. The selection must not be
    /// empty.
    #[must_use]
    pub fn selected_colour(&self, editor: EditorId) -> u8 {
        debug_assert!(self.has_selection(editor));
        let (low, _) = self.selection_range(editor);
        self.sky.colour(low as usize)
    }

    /// Copies out the selected bands.
    #[must_use]
    pub fn selected_colours(&self, editor: EditorId) -> Vec<u8> {
        let (low, high) = self.selection_range(editor);
        self.sky.bands()[low as usize..high as usize].to_vec()
    }

    /// Remaps every selection except `editor`'s for `ndel` bands replaced
    /// with `nadd` bands at `start`. The originating editor is updated
    /// separately to keep its redraw minimal.
    fn update_other_editors(&mut self, editor: EditorId, start: i32, old_end: i32, new_end: i32) {
        let ndel = old_end - start;
        let nadd = new_end - start;
        if ndel == 0 && nadd == 0 {
            return;
        }

        let keys: Vec<usize> = self.editors.iter().map(|(key, _)| key).collect();
        for key in keys {
            if key == editor.0 {
                continue;
            }
            // A selection ending exactly at the insertion point grows to
            // cover the insert: it is everything up to the next band.
            let state = &self.editors[key];
            let new_start = update_index(state.start, start, ndel, nadd);
            let new_sel_end = update_index(state.end, start, ndel, nadd);
            self.set_selection(EditorId(key), new_start, new_sel_end);
        }
    }

    // --- Scalars ---

    fn apply_render_offset(&mut self, value: i32) -> bool {
        if value == self.sky.render_offset() {
            return false;
        }
        self.sky.set_render_offset(value);
        self.watcher.render_offset_changed();
        true
    }

    fn apply_stars_height(&mut self, value: i32) -> bool {
        if value == self.sky.stars_height() {
            return false;
        }
        self.sky.set_stars_height(value);
        self.watcher.stars_height_changed();
        true
    }

    /// Sets the colour bands compression offset at ground level.
    pub fn set_render_offset(&mut self, render_offset: i32) -> bool {
        let render_offset = render_offset.clamp(RENDER_OFFSET_MIN, RENDER_OFFSET_MAX);
        let swap = Swap {
            old: self.sky.render_offset(),
            new: render_offset,
        };
        self.push_record(EditRecord::SetRenderOffset(swap));
        self.apply_render_offset(render_offset)
    }

    /// Sets the minimum height at which to plot stars.
    pub fn set_stars_height(&mut self, stars_height: i32) -> bool {
        let stars_height = stars_height.clamp(STARS_HEIGHT_MIN, STARS_HEIGHT_MAX);
        let swap = Swap {
            old: self.sky.stars_height(),
            new: stars_height,
        };
        self.push_record(EditRecord::SetStarsHeight(swap));
        self.apply_stars_height(stars_height)
    }

    /// Raises the render offset by `offset` and lowers the stars height by
    /// the same amount, each clamped to its own range.
    pub fn add_render_offset(&mut self, offset: i32) -> bool {
        let old_render = self.sky.render_offset();
        let mut offset = offset.clamp(
            RENDER_OFFSET_MIN - old_render,
            RENDER_OFFSET_MAX - old_render,
        );
        let new_render = old_render + offset;

        let old_stars = self.sky.stars_height();
        offset = offset.clamp(old_stars - STARS_HEIGHT_MAX, old_stars - STARS_HEIGHT_MIN);
        let new_stars = old_stars - offset;

        self.push_record(EditRecord::AddRenderOffset {
            stars: Swap {
                old: old_stars,
                new: new_stars,
            },
            render: Swap {
                old: old_render,
                new: new_render,
            },
        });

        let mut changed = self.apply_stars_height(new_stars);
        if self.apply_render_offset(new_render) {
            changed = true;
        }
        changed
    }

    // --- Splice plumbing ---

    /// Makes room for a resizing splice and remaps the other editors.
    fn prepare_import(&mut self, editor: EditorId, splice: &mut Splice) -> bool {
        let changed = budge(
            &mut self.sky,
            splice.old_dst_end,
            splice.new_dst_end,
            &mut splice.budge_lost,
        );
        self.update_other_editors(editor, splice.dst_start, splice.old_dst_end, splice.new_dst_end);
        changed
    }

    fn redraw_changed(&mut self, splice: &Splice) {
        if splice.old_dst_end == splice.new_dst_end {
            self.watcher.bands_changed(splice.dst_start, splice.old_dst_end);
        } else {
            // Everything above the splice shifted.
            self.watcher.bands_changed(splice.dst_start, BAND_COUNT);
        }
    }

    fn redraw_move(&mut self, splice: &Splice) {
        let src_size = splice.new_dst_end - splice.dst_start;
        let src_end = splice.src_start + src_size;

        // The recorded destination precedes the source deletion, so shift
        // it back before comparing redraw extents.
        let dst_start = budge_index(splice.dst_start, splice.src_start, src_size);
        let dst_end = budge_index(splice.old_dst_end, splice.src_start, src_size);

        let redraw_end = if dst_start == dst_end {
            src_end.max(dst_end)
        } else {
            BAND_COUNT
        };
        self.watcher
            .bands_changed(splice.src_start.min(dst_start), redraw_end);
    }

    fn delete_range(&mut self, editor: EditorId, start: i32, end: i32, lost: &mut [u8]) -> bool {
        let changed = budge_down(&mut self.sky, start, end, lost);
        self.update_other_editors(editor, start, end, start);
        changed
    }

    // --- Edit operations ---

    /// Overwrites the selection with one colour.
    pub fn set_plain(&mut self, editor: EditorId, colour: i32) -> bool {
        let colour = clamp_colour(colour);
        let (low, high) = self.selection_range(editor);
        debug!("set bands {}..{} to colour {}", low, high, colour);

        let fill = Fill {
            len: high - low,
            start: colour,
            ..Fill::default()
        };
        let mut splice = new_splice(SpliceKind::SetPlain, low, high, 0, fill);

        let changed = write_plain(&mut self.sky, low, high, colour, &mut splice.lost);
        self.push_record(EditRecord::Splice(splice));
        if changed {
            self.watcher.bands_changed(low, high);
        }
        changed
    }

    /// Overwrites the selection with a gradient between two colours, both
    /// included.
    pub fn interpolate(
        &mut self,
        editor: EditorId,
        palette: &Palette,
        start_colour: i32,
        end_colour: i32,
    ) -> bool {
        let start_colour = clamp_colour(start_colour);
        let end_colour = clamp_colour(end_colour);
        let (low, high) = self.selection_range(editor);
        debug!("interpolate bands {}..{} from {} to {}", low, high, start_colour, end_colour);

        let fill = Fill {
            len: high - low,
            start: start_colour,
            end: end_colour,
            inc_start: true,
            inc_end: true,
        };
        let mut splice = new_splice(SpliceKind::Interpolate, low, high, 0, fill);

        let changed = interpolate_span(&mut self.sky, palette, low, high, fill, &mut splice.lost);
        self.push_record(EditRecord::Splice(splice));
        if changed {
            self.watcher.bands_changed(low, high);
        }
        changed
    }

    fn do_smooth(&mut self, start: i32, end: i32, palette: &Palette) -> bool {
        let mut changed = false;
        let mut last_trans = start;
        let mut last_centre = start;

        for row in start + 1..end {
            if self.sky.colour(row as usize) == self.sky.colour(last_trans as usize) {
                continue;
            }

            if last_trans == start {
                // For the first gradient, the selection edge stands in for
                // a centre.
                last_centre = start;
            } else {
                let centre = last_trans + (row - last_trans) / 2;
                if centre - last_centre >= 2 {
                    let fill = Fill {
                        len: centre - last_centre - 1,
                        start: self.sky.colour(last_centre as usize),
                        end: self.sky.colour(centre as usize),
                        inc_start: false,
                        inc_end: false,
                    };
                    if interpolate_span(
                        &mut self.sky,
                        palette,
                        last_centre + 1,
                        centre,
                        fill,
                        &mut [],
                    ) {
                        self.watcher.bands_changed(last_centre + 1, centre);
                        changed = true;
                    }
                }
                last_centre = centre;
            }
            last_trans = row;
        }

        // To smooth up to the last row, treat it as a final centre.
        if last_trans != start && end - last_centre >= 3 {
            let fill = Fill {
                len: end - last_centre - 2,
                start: self.sky.colour(last_centre as usize),
                end: self.sky.colour((end - 1) as usize),
                inc_start: false,
                inc_end: false,
            };
            if interpolate_span(&mut self.sky, palette, last_centre + 1, end - 1, fill, &mut []) {
                self.watcher.bands_changed(last_centre + 1, end - 1);
                changed = true;
            }
        }
        changed
    }

    /// Interpolates between the centres of homogeneous colour runs within
    /// the selection.
    pub fn smooth(&mut self, editor: EditorId, palette: &Palette) -> bool {
        let (low, high) = self.selection_range(editor);
        debug!("smooth bands {}..{}", low, high);

        let fill = Fill {
            len: high - low,
            ..Fill::default()
        };
        let mut splice = new_splice(SpliceKind::Smooth, low, high, 0, fill);
        get_bytes(&self.sky, low, high, &mut splice.lost);
        self.push_record(EditRecord::Splice(splice));

        self.do_smooth(low, high, palette)
    }

    /// Replaces the selection with colours from an array and selects the
    /// inserted bands. Returns `(changed, all_valid)`; out-of-range source
    /// entries are stored as black and clear `all_valid`.
    pub fn insert_array(&mut self, editor: EditorId, src: &[i32]) -> (bool, bool) {
        let (low, high) = self.selection_range(editor);
        debug!("insert array of {} at {}..{}", src.len(), low, high);

        let fill = Fill {
            len: src.len() as i32,
            ..Fill::default()
        };
        let mut splice = new_splice(SpliceKind::InsertArray, low, high, 0, fill);

        let mut changed = self.prepare_import(editor, &mut splice);
        let mut all_valid = true;
        let trim = (splice.new_dst_end - low) as usize;
        if set_array(
            &mut self.sky,
            low,
            splice.new_dst_end,
            &src[..trim],
            &mut splice.lost,
            &mut all_valid,
        ) {
            changed = true;
        }
        get_bytes(&self.sky, low, splice.new_dst_end, &mut splice.fresh);

        if changed {
            self.redraw_changed(&splice);
        }
        let (sel_start, sel_end) = (splice.dst_start, splice.new_dst_end);
        self.push_record(EditRecord::Splice(splice));
        // Select the inserted data so that it can immediately be cut again.
        self.set_selection(editor, sel_start, sel_end);
        (changed, all_valid)
    }

    /// Replaces the selection with all bands of another sky and selects
    /// the inserted bands.
    pub fn insert_sky(&mut self, editor: EditorId, src: &Sky) -> bool {
        let (low, high) = self.selection_range(editor);
        debug!("insert sky at {}..{}", low, high);

        let fill = Fill {
            len: BAND_COUNT,
            ..Fill::default()
        };
        let mut splice = new_splice(SpliceKind::InsertArray, low, high, 0, fill);

        let trim = (splice.new_dst_end - low) as usize;
        splice.fresh[..trim].copy_from_slice(&src.bands()[..trim]);

        let mut changed = self.prepare_import(editor, &mut splice);
        if copy_between(&mut self.sky, low, splice.new_dst_end, src, &mut splice.lost) {
            changed = true;
        }

        if changed {
            self.redraw_changed(&splice);
        }
        let (sel_start, sel_end) = (splice.dst_start, splice.new_dst_end);
        self.push_record(EditRecord::Splice(splice));
        self.set_selection(editor, sel_start, sel_end);
        changed
    }

    /// Replaces the selection with `number` bands of one colour and puts
    /// the caret after the inserted bands.
    pub fn insert_plain(&mut self, editor: EditorId, number: i32, colour: i32) -> bool {
        debug_assert!(number >= 0);
        let colour = clamp_colour(colour);
        let (low, high) = self.selection_range(editor);
        debug!("insert {} bands of colour {} at {}..{}", number, colour, low, high);

        let fill = Fill {
            len: number,
            start: colour,
            ..Fill::default()
        };
        let mut splice = new_splice(SpliceKind::InsertPlain, low, high, 0, fill);

        let mut changed = self.prepare_import(editor, &mut splice);
        if write_plain(&mut self.sky, low, splice.new_dst_end, colour, &mut splice.lost) {
            changed = true;
        }

        if changed {
            self.redraw_changed(&splice);
        }
        // The caret lands above the insert to make appending easy.
        let caret = splice.new_dst_end;
        self.push_record(EditRecord::Splice(splice));
        self.set_selection(editor, caret, caret);
        changed
    }

    /// Replaces the selection with a gradient of `number` bands and puts
    /// the caret after the inserted bands.
    pub fn insert_gradient(
        &mut self,
        editor: EditorId,
        palette: &Palette,
        number: i32,
        start_colour: i32,
        end_colour: i32,
        inc_start: bool,
        inc_end: bool,
    ) -> bool {
        debug_assert!(number >= 0);
        let start_colour = clamp_colour(start_colour);
        let end_colour = clamp_colour(end_colour);
        let (low, high) = self.selection_range(editor);
        debug!("insert gradient of {} bands at {}..{}", number, low, high);

        let fill = Fill {
            len: number,
            start: start_colour,
            end: end_colour,
            inc_start,
            inc_end,
        };
        let mut splice = new_splice(SpliceKind::InsertGradient, low, high, 0, fill);

        let mut changed = self.prepare_import(editor, &mut splice);
        if interpolate_span(
            &mut self.sky,
            palette,
            low,
            splice.new_dst_end,
            fill,
            &mut splice.lost,
        ) {
            changed = true;
        }

        if changed {
            self.redraw_changed(&splice);
        }
        let caret = splice.new_dst_end;
        self.push_record(EditRecord::Splice(splice));
        self.set_selection(editor, caret, caret);
        changed
    }

    /// Deletes the selected bands.
    pub fn delete_colours(&mut self, editor: EditorId) -> bool {
        self.insert_plain(editor, 0, 0)
    }

    /// Replaces `dst`'s selection with a copy of `src`'s selection (both
    /// editors of this session) and selects the inserted bands.
    pub fn copy_within(&mut self, dst: EditorId, src: EditorId) -> bool {
        let (src_low, src_high) = self.selection_range(src);
        let (dst_low, dst_high) = self.selection_range(dst);

        if dst_low == src_low && dst_high == src_high {
            debug!("copy of {}..{} onto itself", src_low, src_high);
            return false;
        }

        let fill = Fill {
            len: src_high - src_low,
            ..Fill::default()
        };
        let mut splice = new_splice(SpliceKind::Copy, dst_low, dst_high, 0, fill);

        // The source bands must be captured first: the budge below may
        // shift them, or push them off the top of the file.
        let trim = splice.new_dst_end - dst_low;
        get_bytes(&self.sky, src_low, src_low + trim, &mut splice.fresh);

        let mut changed = self.prepare_import(dst, &mut splice);
        if set_bytes(
            &mut self.sky,
            dst_low,
            splice.new_dst_end,
            &splice.fresh,
            &mut splice.lost,
        ) {
            changed = true;
        }

        if changed {
            self.redraw_changed(&splice);
        }
        let (sel_start, sel_end) = (splice.dst_start, splice.new_dst_end);
        self.push_record(EditRecord::Splice(splice));
        self.set_selection(dst, sel_start, sel_end);
        changed
    }

    /// Moves `src`'s selection to replace `dst`'s selection (both editors
    /// of this session) and selects the moved bands.
    pub fn move_to(&mut self, dst: EditorId, src: EditorId) -> bool {
        let (src_low, src_high) = self.selection_range(src);
        let (dst_low, dst_high) = self.selection_range(dst);

        if dst_low >= src_low && dst_high <= src_high {
            debug!("move of {}..{} onto itself", src_low, src_high);
            return false;
        }

        // The destination shifts downward when the source precedes it.
        let src_size = src_high - src_low;
        let new_dst_low = budge_index(dst_low, src_low, -src_size);
        let new_dst_high = budge_index(dst_high, src_low, -src_size);

        let fill = Fill {
            len: src_size,
            ..Fill::default()
        };
        let mut splice = new_splice(SpliceKind::Move, new_dst_low, new_dst_high, src_low, fill);

        let mut changed = self.delete_range(dst, src_low, src_high, &mut splice.fresh);
        if self.prepare_import(dst, &mut splice) {
            changed = true;
        }
        if set_bytes(
            &mut self.sky,
            new_dst_low,
            splice.new_dst_end,
            &splice.fresh,
            &mut splice.lost,
        ) {
            changed = true;
        }

        if changed {
            self.redraw_move(&splice);
        }
        let (sel_start, sel_end) = (splice.dst_start, splice.new_dst_end);
        self.push_record(EditRecord::Splice(splice));
        self.set_selection(dst, sel_start, sel_end);
        changed
    }

    // --- Undo / redo ---

    #[must_use]
    pub fn can_undo(&self) -> bool {
        self.next_undo > 0
    }

    #[must_use]
    pub fn can_redo(&self) -> bool {
        self.next_undo < self.undo_list.len()
    }

    fn undo_splice(&mut self, editor: EditorId, splice: &Splice) -> bool {
        // Restore the bands that were overwritten in place. (Often none,
        // e.g. when data was inserted at the caret.)
        let mut changed = set_bytes(
            &mut self.sky,
            splice.dst_start,
            splice.dst_start + splice.lost.len() as i32,
            &splice.lost,
            &mut [],
        );

        if unbudge(
            &mut self.sky,
            splice.old_dst_end,
            splice.new_dst_end,
            &splice.budge_lost,
        ) {
            changed = true;
        }

        match splice.kind {
            SpliceKind::Move
            | SpliceKind::Copy
            | SpliceKind::InsertArray
            | SpliceKind::InsertPlain
            | SpliceKind::InsertGradient => {
                self.update_other_editors(
                    editor,
                    splice.dst_start,
                    splice.new_dst_end,
                    splice.old_dst_end,
                );
            }
            _ => {}
        }
        changed
    }

    fn undo_move(&mut self, editor: EditorId, splice: &Splice) -> bool {
        let mut changed = self.undo_splice(editor, splice);

        // Reinstate the source data.
        let src_size = splice.new_dst_end - splice.dst_start;
        let src_end = splice.src_start + src_size;

        if budge_up(&mut self.sky, splice.src_start, src_end, &mut []) {
            changed = true;
        }
        if set_bytes(&mut self.sky, splice.src_start, src_end, &splice.fresh, &mut []) {
            changed = true;
        }
        self.update_other_editors(editor, splice.src_start, splice.src_start, src_end);

        changed
    }

    fn select_move_dst(&mut self, editor: EditorId, splice: &Splice) {
        let src_size = splice.new_dst_end - splice.dst_start;
        let dst_start = budge_index(splice.dst_start, splice.src_start, src_size);
        let dst_end = budge_index(splice.old_dst_end, splice.src_start, src_size);
        self.set_selection(editor, dst_start, dst_end);
    }

    /// Reverses the most recent applied edit. Returns whether any band or
    /// scalar actually changed.
    pub fn undo(&mut self, editor: EditorId) -> bool {
        if !self.can_undo() {
            debug!("nothing to undo");
            return false;
        }
        self.next_undo -= 1;
        let rec = self.undo_list[self.next_undo].clone();

        let changed = match &rec {
            EditRecord::SetStarsHeight(swap) => self.apply_stars_height(swap.old),
            EditRecord::SetRenderOffset(swap) => self.apply_render_offset(swap.old),
            EditRecord::AddRenderOffset { stars, render } => {
                let mut changed = self.apply_stars_height(stars.old);
                if self.apply_render_offset(render.old) {
                    changed = true;
                }
                changed
            }
            EditRecord::Splice(splice) => {
                if splice.kind == SpliceKind::Move {
                    let changed = self.undo_move(editor, splice);
                    if changed {
                        self.redraw_move(splice);
                    }
                    changed
                } else {
                    let changed = self.undo_splice(editor, splice);
                    if changed {
                        self.redraw_changed(splice);
                    }
                    changed
                }
            }
        };

        if let EditRecord::Splice(splice) = &rec {
            if splice.kind == SpliceKind::Move {
                self.select_move_dst(editor, splice);
            } else {
                self.set_selection(editor, splice.dst_start, splice.old_dst_end);
            }
        }
        changed
    }

    fn redo_insert(&mut self, editor: EditorId, splice: &Splice, palette: &Palette) -> bool {
        let mut changed = budge(
            &mut self.sky,
            splice.old_dst_end,
            splice.new_dst_end,
            &mut [],
        );
        self.update_other_editors(editor, splice.dst_start, splice.old_dst_end, splice.new_dst_end);

        match splice.kind {
            SpliceKind::Move | SpliceKind::Copy | SpliceKind::InsertArray => {
                if set_bytes(
                    &mut self.sky,
                    splice.dst_start,
                    splice.new_dst_end,
                    &splice.fresh,
                    &mut [],
                ) {
                    changed = true;
                }
            }
            SpliceKind::InsertPlain => {
                if write_plain(
                    &mut self.sky,
                    splice.dst_start,
                    splice.new_dst_end,
                    splice.fill.start,
                    &mut [],
                ) {
                    changed = true;
                }
            }
            SpliceKind::InsertGradient => {
                if interpolate_span(
                    &mut self.sky,
                    palette,
                    splice.dst_start,
                    splice.new_dst_end,
                    splice.fill,
                    &mut [],
                ) {
                    changed = true;
                }
            }
            _ => {}
        }
        changed
    }

    fn redo_move(&mut self, editor: EditorId, splice: &Splice, palette: &Palette) -> bool {
        let src_end = splice.src_start + (splice.new_dst_end - splice.dst_start);
        let mut changed = self.delete_range(editor, splice.src_start, src_end, &mut []);
        if self.redo_insert(editor, splice, palette) {
            changed = true;
        }
        changed
    }

    /// Re-applies the most recently undone edit. Returns whether any band
    /// or scalar actually changed.
    pub fn redo(&mut self, editor: EditorId, palette: &Palette) -> bool {
        if !self.can_redo() {
            debug!("nothing to redo");
            return false;
        }
        let rec = self.undo_list[self.next_undo].clone();
        self.next_undo += 1;

        let changed = match &rec {
            EditRecord::SetStarsHeight(swap) => self.apply_stars_height(swap.new),
            EditRecord::SetRenderOffset(swap) => self.apply_render_offset(swap.new),
            EditRecord::AddRenderOffset { stars, render } => {
                let mut changed = self.apply_stars_height(stars.new);
                if self.apply_render_offset(render.new) {
                    changed = true;
                }
                changed
            }
            EditRecord::Splice(splice) => match splice.kind {
                SpliceKind::SetPlain => {
                    if write_plain(
                        &mut self.sky,
                        splice.dst_start,
                        splice.old_dst_end,
                        splice.fill.start,
                        &mut [],
                    ) {
                        self.watcher.bands_changed(splice.dst_start, splice.old_dst_end);
                        true
                    } else {
                        false
                    }
                }
                SpliceKind::Smooth => self.do_smooth(splice.dst_start, splice.old_dst_end, palette),
                SpliceKind::Interpolate => {
                    if interpolate_span(
                        &mut self.sky,
                        palette,
                        splice.dst_start,
                        splice.old_dst_end,
                        splice.fill,
                        &mut [],
                    ) {
                        self.watcher.bands_changed(splice.dst_start, splice.old_dst_end);
                        true
                    } else {
                        false
                    }
                }
                SpliceKind::Move => {
                    let changed = self.redo_move(editor, splice, palette);
                    if changed {
                        self.redraw_move(splice);
                    }
                    changed
                }
                SpliceKind::Copy
                | SpliceKind::InsertArray
                | SpliceKind::InsertPlain
                | SpliceKind::InsertGradient => {
                    let changed = self.redo_insert(editor, splice, palette);
                    if changed {
                        self.redraw_changed(splice);
                    }
                    changed
                }
            },
        };

        if let EditRecord::Splice(splice) = &rec {
            match splice.kind {
                SpliceKind::InsertPlain | SpliceKind::InsertGradient => {
                    self.set_selection(editor, splice.new_dst_end, splice.new_dst_end);
                }
                _ => {
                    self.set_selection(editor, splice.dst_start, splice.new_dst_end);
                }
            }
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn budge_index_clamps_to_change_pos() {
        assert_eq!(budge_index(5, 10, -3), 5);
        assert_eq!(budge_index(12, 10, -3), 10);
        assert_eq!(budge_index(20, 10, -3), 17);
        assert_eq!(budge_index(125, 10, 5), BAND_COUNT);
        assert_eq!(update_index(50, 10, 10, 5), 45);
    }

    #[test]
    fn budge_round_trips_through_unbudge() {
        let mut sky = Sky::new();
        for pos in 0..BANDS {
            sky.set_colour(pos, pos as u8);
        }
        let before = sky.clone();

        // Grow a span ending at 20 to end at 30.
        let mut saved = vec![0u8; 10];
        assert!(budge(&mut sky, 20, 30, &mut saved));
        assert_ne!(sky, before);
        assert!(unbudge(&mut sky, 20, 30, &saved));
        assert_eq!(sky, before);

        // Shrink a span ending at 30 to end at 20.
        let mut saved = vec![0u8; 10];
        assert!(budge(&mut sky, 30, 20, &mut saved));
        assert!(unbudge(&mut sky, 30, 20, &saved));
        assert_eq!(sky, before);
    }

    #[test]
    fn budge_down_zero_fills_tail() {
        let mut sky = Sky::new();
        for pos in 0..BANDS {
            sky.set_colour(pos, 7);
        }
        budge_down(&mut sky, 0, 6, &mut []);
        assert_eq!(sky.colour(BANDS - 1), 0);
        assert_eq!(sky.colour(BANDS - 6), 0);
        assert_eq!(sky.colour(BANDS - 7), 7);
    }
}
