//! Multi-file stitching: axis guessing and the stitching reader.

pub mod axis_guesser;
pub mod stitcher;

pub use axis_guesser::{AxisGuesser, AxisType};
pub use stitcher::{FileStitcher, StitchOptions, DEFAULT_MAX_READERS};
