//! # Stack Stitcher
//!
//! Assemble numbered microscopy files into one virtual 5D stack.
//!
//! Multi-dimensional acquisitions are often written as many
//! single-plane files with systematic names (`img_z1c2_t05.tif`). This
//! library discovers the naming pattern, infers which varying number
//! means which axis, and exposes the whole group as a single logical
//! (X, Y, Z, Channel, Time) series with a well-defined plane index.
//!
//! ## Architecture
//!
//! - [`pattern`] - pattern blocks, pattern parsing/expansion, and
//!   inference of a pattern from a file listing
//! - [`dims`] - dimension orders and plane-index arithmetic
//! - [`reader`] - the [`PlaneReader`] capability, the synthetic
//!   [`FakeReader`], and the [`DimensionSwapper`] order decorator
//! - [`stitch`] - the [`AxisGuesser`] heuristic and the
//!   [`FileStitcher`] that composes everything
//! - [`config`] - CLI definition for the `stack-stitcher` binary
//!
//! ## Example
//!
//! ```rust
//! use stack_stitcher::{FakeReaderSource, FileStitcher, PlaneReader};
//!
//! // Three synthetic files, one time point each.
//! let mut stitcher = FileStitcher::new(FakeReaderSource);
//! stitcher.set_id("t<1-3>&sizeX=16&sizeY=16.fake").unwrap();
//!
//! assert_eq!(stitcher.size_t(), 3);
//! assert_eq!(stitcher.image_count(), 3);
//!
//! // Global plane 1 lives in the second file.
//! let (file_index, local) = stitcher.compute_indices(1).unwrap();
//! assert_eq!(file_index, 1);
//! assert_eq!(local, Some(0));
//! ```
//!
//! All I/O is synchronous and blocking; no component starts threads.
//! A stitcher instance is not thread-safe; share one per worker or
//! serialize plane requests externally.

pub mod config;
pub mod dims;
pub mod error;
pub mod pattern;
pub mod reader;
pub mod stitch;

// Re-export commonly used types
pub use config::{Cli, Command, ExpandConfig, InferConfig, InfoConfig};
pub use dims::{Axis, DimensionOrder, ORDER_XYZCT};
pub use error::{DimensionError, PatternError, ReaderError, StitchError};
pub use pattern::{
    find_pattern, find_pattern_excluding, find_pattern_for, find_series_patterns,
    find_series_patterns_in, FilePattern, PatternBlock,
};
pub use reader::{
    DimensionSwapper, FakeReader, FakeReaderSource, FileGroupOption, Modulo, PixelType,
    PlaneReader, ReaderSource, SeriesCore,
};
pub use stitch::{AxisGuesser, AxisType, FileStitcher, StitchOptions, DEFAULT_MAX_READERS};
