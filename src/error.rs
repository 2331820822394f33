use thiserror::Error;

/// Everything that can go wrong while converting or editing game graphics.
///
/// Errors are plain values with no payload so that they can be compared,
/// stored in contexts and reported without allocation. The three `Force*`
/// kinds are advisory: the operation that returns them has already forced
/// the offending values within bounds and the caller may continue.
#[derive(Clone, Copy, Debug, Eq, Error, PartialEq)]
pub enum Error {
    #[error("failed to read from the input stream")]
    ReadFail,
    #[error("failed to write to the output stream")]
    WriteFail,
    #[error("cannot open the input file")]
    OpenInFail,
    #[error("cannot open the output file")]
    OpenOutFail,
    #[error("cannot get the current stream position")]
    BadTell,
    #[error("cannot set the current stream position")]
    BadSeek,
    #[error("the input ended in the middle of a structure")]
    Trunc,
    #[error("the input continues past the expected end of the file")]
    TooLong,
    #[error("the input is smaller than the minimum for its file type")]
    TooShort,
    #[error("the conversion was cancelled")]
    Escape,
    #[error("not enough free memory")]
    NoMem,
    #[error("bad data offset in file")]
    BadDataOff,
    #[error("bad number of images in file header")]
    BadNumGfx,
    #[error("the two copies of a planet bitmap do not match")]
    BadImages,
    #[error("planet paint offset out of range")]
    BadPaintOff,
    #[error("tile animation frame out of range")]
    BadAnims,
    #[error("tile animation frames were forced within bounds")]
    ForceAnim,
    #[error("planet paint offsets were forced within bounds")]
    ForceOff,
    #[error("sky render offset out of range")]
    BadRend,
    #[error("sky stars height out of range")]
    BadStar,
    #[error("sky heights were forced within bounds")]
    ForceSky,
    #[error("sprite area has no graphics of the requested type, or more than one type")]
    BadSprite,
    #[error("no tile animation data; supply it as CSV or sprite metadata")]
    NoAnim,
    #[error("no sky height data; supply it as CSV or sprite metadata")]
    NoHeight,
    #[error("no planet paint offsets; supply them as CSV or sprite metadata")]
    NoOffset,
    #[error("text input is too long")]
    StrOFlo,
    #[error("sky colour bands are not correctly dithered")]
    BadDither,
}

pub type Result<T> = core::result::Result<T, Error>;
