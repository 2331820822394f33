//! Reversible edit records.

/// Parameters for a plain or gradient fill, kept so that reparameterisable
/// edits can be re-executed on redo instead of storing their output.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct Fill {
    /// Number of colours that would be filled if not truncated.
    pub len: i32,
    pub start: u8,
    /// Only meaningful for gradients.
    pub end: u8,
    pub inc_start: bool,
    pub inc_end: bool,
}

/// Before/after pair for a scalar edit.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Swap {
    pub old: i32,
    pub new: i32,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum SpliceKind {
    SetPlain,
    Smooth,
    Interpolate,
    InsertArray,
    InsertPlain,
    InsertGradient,
    Move,
    Copy,
}

/// An atomic replacement of `[dst_start, old_dst_end)` by
/// `new_dst_end - dst_start` bands, with enough saved bytes to reverse it.
#[derive(Clone, Debug)]
pub(crate) struct Splice {
    pub kind: SpliceKind,
    /// Index of the first colour to be replaced.
    pub dst_start: i32,
    /// One beyond the last colour to be replaced.
    pub old_dst_end: i32,
    /// One beyond the last substitute colour.
    pub new_dst_end: i32,
    /// Index of the first colour moved (only for `Move`).
    pub src_start: i32,
    /// Colours overwritten in place, not counting any lost by budging.
    pub lost: Vec<u8>,
    /// Colours pushed off the top of the file (grow) or about to be
    /// re-exposed above the replacement (shrink).
    pub budge_lost: Vec<u8>,
    /// Replacement colours, for the variants that cannot be regenerated
    /// from `fill`.
    pub fresh: Vec<u8>,
    pub fill: Fill,
}

/// One user-visible edit.
#[derive(Clone, Debug)]
pub(crate) enum EditRecord {
    SetStarsHeight(Swap),
    SetRenderOffset(Swap),
    AddRenderOffset { stars: Swap, render: Swap },
    Splice(Splice),
}
