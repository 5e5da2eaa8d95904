//! The reader capability: the trait every single-file decoder exposes
//! and the stitching layer both consumes and re-provides.
//!
//! This module defines [`PlaneReader`], the format-agnostic interface
//! for reading 2D planes out of a multi-dimensional image file, plus
//! the metadata types that travel with it. Decorators such as
//! [`crate::reader::DimensionSwapper`] and
//! [`crate::stitch::FileStitcher`] hold an inner reader (or a pool of
//! them) and implement the same surface by delegating and selectively
//! overriding. Composition, not inheritance.

pub mod fake;
pub mod swapper;

pub use fake::{FakeReader, FakeReaderSource};
pub use swapper::DimensionSwapper;

use bytes::Bytes;
use std::path::PathBuf;

use crate::dims::{self, DimensionOrder};
use crate::error::{DimensionError, ReaderError};

// =============================================================================
// Pixel types
// =============================================================================

/// Sample type of a plane's pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelType {
    #[default]
    UInt8,
    Int8,
    UInt16,
    Int16,
    UInt32,
    Int32,
    Float,
    Double,
}

impl PixelType {
    /// Bytes per sample.
    pub const fn bytes_per_pixel(&self) -> usize {
        match self {
            PixelType::UInt8 | PixelType::Int8 => 1,
            PixelType::UInt16 | PixelType::Int16 => 2,
            PixelType::UInt32 | PixelType::Int32 | PixelType::Float => 4,
            PixelType::Double => 8,
        }
    }

    /// Parse the conventional lowercase name (`uint16`, `float`, ...).
    pub fn parse(s: &str) -> Option<PixelType> {
        match s {
            "uint8" => Some(PixelType::UInt8),
            "int8" => Some(PixelType::Int8),
            "uint16" => Some(PixelType::UInt16),
            "int16" => Some(PixelType::Int16),
            "uint32" => Some(PixelType::UInt32),
            "int32" => Some(PixelType::Int32),
            "float" => Some(PixelType::Float),
            "double" => Some(PixelType::Double),
            _ => None,
        }
    }

    pub const fn name(&self) -> &'static str {
        match self {
            PixelType::UInt8 => "uint8",
            PixelType::Int8 => "int8",
            PixelType::UInt16 => "uint16",
            PixelType::Int16 => "int16",
            PixelType::UInt32 => "uint32",
            PixelType::Int32 => "int32",
            PixelType::Float => "float",
            PixelType::Double => "double",
        }
    }
}

// =============================================================================
// Modulo axes
// =============================================================================

/// A sub-division of Z, C or T into an outer coarse count and an inner
/// packed count (e.g. several exposures packed into the channel axis).
///
/// The no-op value (`start == end == 0`, `step == 1`) has length 1 and
/// subdivides nothing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Modulo {
    pub start: f64,
    pub step: f64,
    pub end: f64,
}

impl Modulo {
    /// The sub-axis that subdivides nothing.
    pub const fn noop() -> Modulo {
        Modulo {
            start: 0.0,
            step: 1.0,
            end: 0.0,
        }
    }

    /// Number of inner positions along the sub-axis.
    pub fn length(&self) -> u32 {
        if self.step <= 0.0 {
            return 1;
        }
        (((self.end - self.start) / self.step) + 1.0).max(1.0) as u32
    }
}

impl Default for Modulo {
    fn default() -> Self {
        Modulo::noop()
    }
}

// =============================================================================
// SeriesCore
// =============================================================================

/// Geometry and layout of one series (one logical image stack).
///
/// Invariant: `image_count == size_z * size_t * effective_size_c()`.
/// Owned exclusively by the reader (or decorator) that serves it;
/// series lists are rebuilt wholesale when an id changes, never patched
/// across owners.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesCore {
    pub size_x: u32,
    pub size_y: u32,
    pub size_z: u32,
    pub size_c: u32,
    pub size_t: u32,
    pub pixel_type: PixelType,
    pub image_count: u32,
    /// Logical iteration order exposed to callers.
    pub dimension_order: DimensionOrder,
    /// Claimed physical on-disk order; differs from `dimension_order`
    /// once an output order has been imposed.
    pub input_order: DimensionOrder,
    pub order_certain: bool,
    /// Samples per pixel fused into each stored plane; 1 for
    /// monochrome, 3 for interleaved RGB.
    pub rgb_channel_count: u32,
    pub modulo_z: Modulo,
    pub modulo_c: Modulo,
    pub modulo_t: Modulo,
    /// Number of pyramid resolutions embedded in this series.
    pub resolution_count: u32,
}

impl Default for SeriesCore {
    fn default() -> Self {
        SeriesCore {
            size_x: 0,
            size_y: 0,
            size_z: 1,
            size_c: 1,
            size_t: 1,
            pixel_type: PixelType::default(),
            image_count: 1,
            dimension_order: DimensionOrder::default(),
            input_order: DimensionOrder::default(),
            order_certain: false,
            rgb_channel_count: 1,
            modulo_z: Modulo::noop(),
            modulo_c: Modulo::noop(),
            modulo_t: Modulo::noop(),
            resolution_count: 1,
        }
    }
}

impl SeriesCore {
    /// Channel count with the interleaved-RGB multiplier divided out.
    pub fn effective_size_c(&self) -> u32 {
        if self.rgb_channel_count == 0 {
            self.size_c
        } else {
            self.size_c / self.rgb_channel_count
        }
    }

    /// Byte size of one full plane at this geometry.
    pub fn plane_bytes(&self) -> usize {
        self.size_x as usize
            * self.size_y as usize
            * self.rgb_channel_count as usize
            * self.pixel_type.bytes_per_pixel()
    }
}

// =============================================================================
// File grouping
// =============================================================================

/// How a reader relates to sibling files of its id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileGroupOption {
    /// The file stands alone.
    Independent,
    /// Sibling files may be grouped into one series by a caller.
    CanGroup,
    /// The reader itself owns grouping; callers must not stitch.
    MustGroup,
}

// =============================================================================
// PlaneReader trait
// =============================================================================

/// Format-agnostic interface for reading planes from one image file.
///
/// All I/O is synchronous and blocking; implementations start no
/// threads. Metadata getters have default implementations over
/// [`core()`](PlaneReader::core) and the current series.
///
/// # Panics
///
/// The metadata getters index into the series list and therefore panic
/// if called before a successful [`open`](PlaneReader::open); opening
/// is the caller's contract, checked failure belongs to `open` itself.
pub trait PlaneReader {
    /// Open the given id, replacing any previously open file.
    fn open(&mut self, id: &str) -> Result<(), ReaderError>;

    /// Close the current file and drop all series state.
    fn close(&mut self);

    /// The currently open id, if any.
    fn current_file(&self) -> Option<&str>;

    /// Per-series geometry. Empty before `open`.
    fn core(&self) -> &[SeriesCore];

    /// Number of series in the open file.
    fn series_count(&self) -> usize {
        self.core().len()
    }

    /// Select the series subsequent calls refer to.
    fn set_series(&mut self, series: usize);

    /// The currently selected series.
    fn series(&self) -> usize;

    fn current_core(&self) -> &SeriesCore {
        &self.core()[self.series()]
    }

    fn size_x(&self) -> u32 {
        self.current_core().size_x
    }

    fn size_y(&self) -> u32 {
        self.current_core().size_y
    }

    fn size_z(&self) -> u32 {
        self.current_core().size_z
    }

    fn size_c(&self) -> u32 {
        self.current_core().size_c
    }

    fn size_t(&self) -> u32 {
        self.current_core().size_t
    }

    fn pixel_type(&self) -> PixelType {
        self.current_core().pixel_type
    }

    fn image_count(&self) -> u32 {
        self.current_core().image_count
    }

    fn dimension_order(&self) -> DimensionOrder {
        self.current_core().dimension_order
    }

    /// Whether the reader is confident in its reported order.
    fn order_certain(&self) -> bool {
        self.current_core().order_certain
    }

    fn is_rgb(&self) -> bool {
        self.current_core().rgb_channel_count > 1
    }

    fn rgb_channel_count(&self) -> u32 {
        self.current_core().rgb_channel_count
    }

    fn effective_size_c(&self) -> u32 {
        self.current_core().effective_size_c()
    }

    fn modulo_z(&self) -> Modulo {
        self.current_core().modulo_z
    }

    fn modulo_c(&self) -> Modulo {
        self.current_core().modulo_c
    }

    fn modulo_t(&self) -> Modulo {
        self.current_core().modulo_t
    }

    /// Convert (Z, C, T) to this reader's own plane index.
    fn zct_to_index(&self, z: u32, c: u32, t: u32) -> Result<u32, DimensionError> {
        let core = self.current_core();
        dims::zct_to_index(
            core.dimension_order,
            core.size_z,
            core.effective_size_c(),
            core.size_t,
            z,
            c,
            t,
        )
    }

    /// Convert a plane index to this reader's own (Z, C, T).
    fn index_to_zct(&self, index: u32) -> Result<(u32, u32, u32), DimensionError> {
        let core = self.current_core();
        dims::index_to_zct(
            core.dimension_order,
            core.size_z,
            core.effective_size_c(),
            core.size_t,
            core.image_count,
            index,
        )
    }

    /// Read the `(x, y, w, h)` sub-region of plane `no` as raw bytes.
    fn open_bytes(&mut self, no: u32, x: u32, y: u32, w: u32, h: u32)
        -> Result<Bytes, ReaderError>;

    /// Read all of plane `no`.
    fn open_plane(&mut self, no: u32) -> Result<Bytes, ReaderError> {
        let (w, h) = (self.size_x(), self.size_y());
        self.open_bytes(no, 0, 0, w, h)
    }

    /// Every file this reader touches for the open id.
    fn used_files(&self) -> Vec<PathBuf>;

    /// How this reader would treat grouping for the given id.
    fn file_group_option(&self, id: &str) -> FileGroupOption;

    /// Hint that a caller is (not) grouping sibling files around this
    /// reader. Default: ignored.
    fn set_group_files(&mut self, group: bool) {
        let _ = group;
    }
}

// =============================================================================
// ReaderSource
// =============================================================================

/// Factory for the underlying per-file readers.
///
/// The stitching layer needs one reader per pooled file slot; this
/// trait abstracts how fresh readers are constructed, so the same
/// stitcher drives any format decoder.
pub trait ReaderSource {
    type Reader: PlaneReader;

    /// Construct a new, unopened reader.
    fn create_reader(&self) -> Self::Reader;
}

// =============================================================================
// Tests
// =============================================================================
