//! A synthetic reader whose geometry comes from the filename.
//!
//! Ids ending in `.fake` describe an image stack with `&`-separated
//! tokens in the basename; no pixel data exists on disk (the file need
//! not even exist; the stitching layer's existence check has a `.fake`
//! escape for exactly this reason). Example:
//!
//! ```text
//! embryo&sizeZ=5&sizeC=2&sizeT=3&pixelType=uint16&dimOrder=XYCZT.fake
//! ```
//!
//! Recognized tokens: `sizeX`, `sizeY`, `sizeZ`, `sizeC`, `sizeT`,
//! `rgb` (samples per pixel), `dimOrder`, `orderCertain`, `pixelType`,
//! `series` (series count), `mustGroup` (bare token: the reader claims
//! grouping for itself). Unknown tokens are ignored with a warning.
//! Plane bytes are a deterministic function of (series, plane, offset)
//! so tests can recognize which plane they were handed.

use std::path::{Path, PathBuf};

use bytes::Bytes;
use tracing::warn;

use super::{FileGroupOption, PixelType, PlaneReader, SeriesCore};
use crate::error::ReaderError;
use crate::reader::ReaderSource;

/// Default plane width.
pub const DEFAULT_SIZE_X: u32 = 512;

/// Default plane height.
pub const DEFAULT_SIZE_Y: u32 = 512;

const TOKEN_SEPARATOR: char = '&';

/// Synthetic single-file reader for `.fake` ids.
#[derive(Debug, Default)]
pub struct FakeReader {
    current_id: Option<String>,
    core: Vec<SeriesCore>,
    series: usize,
}

impl FakeReader {
    pub fn new() -> FakeReader {
        FakeReader::default()
    }

    fn parse_id(id: &str) -> Result<Vec<SeriesCore>, ReaderError> {
        let name = Path::new(id)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let Some(stem) = name.strip_suffix(".fake") else {
            return Err(ReaderError::UnrecognizedId(id.to_string()));
        };

        let mut template = SeriesCore {
            size_x: DEFAULT_SIZE_X,
            size_y: DEFAULT_SIZE_Y,
            order_certain: true,
            ..SeriesCore::default()
        };
        let mut series_count = 1usize;

        // First token is the dataset name; the rest are key=value.
        for token in stem.split(TOKEN_SEPARATOR).skip(1) {
            let invalid = || ReaderError::InvalidToken {
                id: id.to_string(),
                token: token.to_string(),
            };
            if token == "mustGroup" {
                continue;
            }
            let (key, value) = token.split_once('=').ok_or_else(invalid)?;
            match key {
                "sizeX" => template.size_x = parse_size(value).ok_or_else(invalid)?,
                "sizeY" => template.size_y = parse_size(value).ok_or_else(invalid)?,
                "sizeZ" => template.size_z = parse_size(value).ok_or_else(invalid)?,
                "sizeC" => template.size_c = parse_size(value).ok_or_else(invalid)?,
                "sizeT" => template.size_t = parse_size(value).ok_or_else(invalid)?,
                "rgb" => template.rgb_channel_count = parse_size(value).ok_or_else(invalid)?,
                "dimOrder" => {
                    template.dimension_order = value.parse().map_err(|_| invalid())?;
                    template.input_order = template.dimension_order;
                }
                "orderCertain" => {
                    template.order_certain = value.parse::<bool>().map_err(|_| invalid())?
                }
                "pixelType" => {
                    template.pixel_type = PixelType::parse(value).ok_or_else(invalid)?
                }
                "series" => series_count = parse_size(value).ok_or_else(invalid)? as usize,
                _ => warn!(token, id, "ignoring unknown fake token"),
            }
        }

        if template.size_c % template.rgb_channel_count != 0 {
            return Err(ReaderError::InvalidToken {
                id: id.to_string(),
                token: format!(
                    "rgb={} does not divide sizeC={}",
                    template.rgb_channel_count, template.size_c
                ),
            });
        }
        template.image_count =
            template.size_z * template.size_t * template.effective_size_c();

        Ok(vec![template; series_count])
    }
}

impl PlaneReader for FakeReader {
    fn open(&mut self, id: &str) -> Result<(), ReaderError> {
        let core = FakeReader::parse_id(id)?;
        self.core = core;
        self.series = 0;
        self.current_id = Some(id.to_string());
        Ok(())
    }

    fn close(&mut self) {
        self.current_id = None;
        self.core.clear();
        self.series = 0;
    }

    fn current_file(&self) -> Option<&str> {
        self.current_id.as_deref()
    }

    fn core(&self) -> &[SeriesCore] {
        &self.core
    }

    fn set_series(&mut self, series: usize) {
        if series < self.core.len() {
            self.series = series;
        }
    }

    fn series(&self) -> usize {
        self.series
    }

    fn open_bytes(
        &mut self,
        no: u32,
        x: u32,
        y: u32,
        w: u32,
        h: u32,
    ) -> Result<Bytes, ReaderError> {
        if self.current_id.is_none() {
            return Err(ReaderError::NotOpen);
        }
        let core = self.current_core();
        if no >= core.image_count {
            return Err(ReaderError::PlaneOutOfRange {
                index: no,
                image_count: core.image_count,
            });
        }
        let _ = (x, y);
        let len = w as usize
            * h as usize
            * core.rgb_channel_count as usize
            * core.pixel_type.bytes_per_pixel();
        // Bytes are a function of (file, series, plane) so callers can
        // tell which plane of which file they were handed.
        let name_hash: usize = self
            .current_id
            .as_deref()
            .unwrap_or_default()
            .bytes()
            .fold(0usize, |acc, b| acc.wrapping_mul(31).wrapping_add(b as usize));
        let seed = name_hash
            .wrapping_add(self.series * 131)
            .wrapping_add(no as usize * 31);
        let buf: Vec<u8> = (0..len)
            .map(|i| (seed.wrapping_add(i) % 251) as u8)
            .collect();
        Ok(Bytes::from(buf))
    }

    fn used_files(&self) -> Vec<PathBuf> {
        self.current_id.iter().map(PathBuf::from).collect()
    }

    fn file_group_option(&self, id: &str) -> FileGroupOption {
        if id.contains("mustGroup") {
            FileGroupOption::MustGroup
        } else {
            FileGroupOption::CanGroup
        }
    }
}

/// Factory handing out fresh [`FakeReader`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct FakeReaderSource;

impl ReaderSource for FakeReaderSource {
    type Reader = FakeReader;

    fn create_reader(&self) -> FakeReader {
        FakeReader::new()
    }
}

fn parse_size(value: &str) -> Option<u32> {
    value.parse::<u32>().ok().filter(|v| *v >= 1)
}

// =============================================================================
// Tests
// =============================================================================
