use thiserror::Error;

/// Errors raised while parsing a single `<...>` pattern block.
#[derive(Debug, Clone, Error)]
pub enum PatternError {
    /// Block text is not delimited by `<` and `>`
    #[error("Missing block delimiters in `{0}`")]
    MissingDelimiters(String),

    /// A range bound could not be parsed as a number or a letter run
    #[error("Invalid range bound `{0}`: not a base-10 number or base-36 letter run")]
    InvalidBound(String),

    /// A range step could not be parsed
    #[error("Invalid range step `{0}`")]
    InvalidStep(String),

    /// Step is zero or negative
    #[error("Range step must be positive, got {0}")]
    NonPositiveStep(i64),

    /// Range runs backwards (end before start)
    #[error("Ill-ordered range: `{first}` comes after `{last}`")]
    IllOrderedRange { first: String, last: String },
}

/// Errors related to dimension orders and plane coordinates.
#[derive(Debug, Clone, Error)]
pub enum DimensionError {
    /// Order string is not a permutation of X, Y, Z, C, T
    #[error("Dimension order `{0}` must contain each of X, Y, Z, C, T exactly once")]
    InvalidOrder(String),

    /// X and Y may only occupy the first two positions (in either order)
    #[error("Dimension order `{0}` must keep X and Y in the first two positions")]
    MisplacedSpatialAxes(String),

    /// The channel axis cannot be moved while samples are interleaved
    #[error("Cannot relocate the C axis when the RGB channel count is {0}")]
    RgbChannelFused(u32),

    /// (Z, C, T) coordinate outside the series extents
    #[error(
        "Coordinate ({z}, {c}, {t}) out of range for sizes ({size_z}, {size_c}, {size_t})"
    )]
    CoordsOutOfRange {
        z: u32,
        c: u32,
        t: u32,
        size_z: u32,
        size_c: u32,
        size_t: u32,
    },

    /// Plane index outside the series image count
    #[error("Plane index {index} out of range: image count is {image_count}")]
    IndexOutOfRange { index: u32, image_count: u32 },

    /// Axis sizes do not multiply out to the advertised image count
    #[error(
        "Sizes ({size_z}, {size_c}, {size_t}) do not match image count {image_count}"
    )]
    SizeMismatch {
        size_z: u32,
        size_c: u32,
        size_t: u32,
        image_count: u32,
    },
}

/// Errors surfaced by an underlying single-file reader.
#[derive(Debug, Error)]
pub enum ReaderError {
    /// Filesystem error with path context
    #[error("I/O error on `{path}`: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The id does not name something this reader understands
    #[error("Unrecognized id `{0}`")]
    UnrecognizedId(String),

    /// A dimension token in the id could not be parsed
    #[error("Invalid token `{token}` in `{id}`")]
    InvalidToken { id: String, token: String },

    /// A read was attempted before a successful open
    #[error("No file is currently open")]
    NotOpen,

    /// Plane index beyond this file's own image count
    #[error("Plane {index} out of range: file holds {image_count} planes")]
    PlaneOutOfRange { index: u32, image_count: u32 },

    /// Coordinate or order failure inside the reader
    #[error(transparent)]
    Dimension(#[from] DimensionError),
}

/// Top-level errors from the file-stitching layer.
///
/// Every failure at series-open or plane-request time is one of these;
/// no partial series state is left behind when construction fails.
#[derive(Debug, Error)]
pub enum StitchError {
    /// The id parsed as a pattern, but the pattern is malformed
    #[error("Invalid file pattern `{pattern}`: {message}")]
    InvalidPattern { pattern: String, message: String },

    /// A regex pattern matched nothing on disk
    #[error("No files match pattern `{0}`")]
    NoMatchingFiles(String),

    /// A file named by the expanded pattern is absent
    #[error("File #{index} (`{path}`) does not exist")]
    MissingFile { index: usize, path: String },

    /// The pattern names multiple files and each file holds multiple
    /// series; two independent sources of series multiplicity are
    /// unsupported
    #[error(
        "Unsupported grouping: the file pattern contains multiple files and \
         each file contains multiple series. Rename the files or disable \
         stitching."
    )]
    UnsupportedGrouping,

    /// A pattern block carries no axis assignment (should be
    /// unreachable: the guesser resolves every block)
    #[error("Unknown axis type for pattern block #{0}")]
    UnknownAxis(usize),

    /// Stitcher used before `set_id`
    #[error("No id has been set")]
    NoCurrentId,

    #[error(transparent)]
    Dimension(#[from] DimensionError),

    #[error(transparent)]
    Reader(#[from] ReaderError),
}
