//! File-pattern parsing, expansion and inference.

pub mod block;
pub mod file_pattern;
pub mod infer;

pub use block::{BlockRange, PatternBlock, BLOCK_END, BLOCK_START};
pub use file_pattern::FilePattern;
pub use infer::{
    find_pattern, find_pattern_excluding, find_pattern_for, find_series_patterns,
    find_series_patterns_in,
};
