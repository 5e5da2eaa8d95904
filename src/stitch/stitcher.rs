//! Stitch files with similar names into one virtual series.
//!
//! A [`FileStitcher`] normalizes an id (a file path or an explicit
//! pattern string) to a [`FilePattern`], classifies every pattern block
//! with an [`AxisGuesser`] fed by the first matching file's own
//! geometry, and from then on routes each global plane index to a
//! (file, local plane) pair, reading through a bounded pool of
//! [`DimensionSwapper`]-wrapped per-file readers.
//!
//! All files of a group are assumed to share one geometry; files that
//! come up short deliver zero-filled planes rather than errors, so the
//! stitched series always iterates as a full rectangle.
//!
//! Nothing here is thread-safe: opening a pooled reader and reading
//! from it are two separate steps, so concurrent plane requests against
//! one stitcher need external synchronization (or one stitcher per
//! worker).

use std::path::{Path, PathBuf};

use bytes::Bytes;
use tracing::{debug, trace, warn};

use super::axis_guesser::{AxisGuesser, AxisType};
use crate::dims::{self, Axis};
use crate::error::StitchError;
use crate::pattern::{self, FilePattern};
use crate::reader::{
    DimensionSwapper, FileGroupOption, Modulo, PlaneReader, ReaderSource, SeriesCore,
};

/// Default bound on per-series reader pools.
pub const DEFAULT_MAX_READERS: usize = 1000;

// =============================================================================
// StitchOptions
// =============================================================================

/// Configuration for a [`FileStitcher`].
#[derive(Debug, Clone)]
pub struct StitchOptions {
    /// Treat ids as pattern strings rather than file paths.
    pub pattern_ids: bool,

    /// Group sibling files at all; disabled, every id opens alone.
    pub group: bool,

    /// Allow an id given as a pattern to be re-derived from disk.
    /// Disabled, the supplied pattern is used exactly as written.
    pub can_change_pattern: bool,

    /// Bound on each series' reader pool. File indexes at or beyond
    /// the bound alias to pool slot 0, which is reopened for the
    /// requested file on each use. A deliberate degrade path trading
    /// reopen latency for bounded memory and file descriptors, not an
    /// error. Groups larger than this bound pay a reopen per plane.
    pub max_readers: usize,
}

impl Default for StitchOptions {
    fn default() -> Self {
        StitchOptions {
            pattern_ids: false,
            group: true,
            can_change_pattern: true,
            max_readers: DEFAULT_MAX_READERS,
        }
    }
}

// =============================================================================
// ExternalSeries
// =============================================================================

/// One discovered pattern and its pool of per-file readers.
struct ExternalSeries<R: PlaneReader> {
    pattern: FilePattern,
    guesser: AxisGuesser,
    /// Pool slots; `files().len()` slots, or a single slot when the
    /// group exceeds the pool bound.
    readers: Vec<DimensionSwapper<R>>,
    images_per_file: u32,
}

impl<R: PlaneReader> ExternalSeries<R> {
    fn new<S: ReaderSource<Reader = R>>(
        source: &S,
        pattern: FilePattern,
        max_readers: usize,
    ) -> Result<ExternalSeries<R>, StitchError> {
        let n_files = pattern.files().len();
        let n_slots = if n_files > max_readers { 1 } else { n_files };
        let mut readers: Vec<DimensionSwapper<R>> = (0..n_slots)
            .map(|_| DimensionSwapper::new(source.create_reader()))
            .collect();

        // Slot 0 is opened eagerly: the guesser needs the first file's
        // geometry. The rest of the pool opens on demand.
        let first = pattern.files()[0].clone();
        readers[0].set_group_files(false);
        readers[0].open(&first)?;

        let guesser = AxisGuesser::new(
            &pattern,
            readers[0].dimension_order(),
            readers[0].size_z(),
            readers[0].size_t(),
            readers[0].effective_size_c(),
            readers[0].order_certain(),
        );
        let images_per_file = readers[0].image_count();

        Ok(ExternalSeries {
            pattern,
            guesser,
            readers,
            images_per_file,
        })
    }

    fn files(&self) -> &[String] {
        self.pattern.files()
    }

    /// The pool slot for file `fno`, opened for that file. Beyond the
    /// pool bound this is always slot 0, reopened as needed.
    fn reader_for(&mut self, fno: usize) -> Result<&mut DimensionSwapper<R>, StitchError> {
        let slot = if fno < self.readers.len() { fno } else { 0 };
        let files = self.pattern.files();
        let want = files.get(fno).unwrap_or(&files[0]).clone();
        let r = &mut self.readers[slot];
        if r.current_file() != Some(want.as_str()) {
            r.close();
            r.set_group_files(false);
            r.open(&want)?;
        }
        Ok(r)
    }
}

// =============================================================================
// FileStitcher
// =============================================================================

/// Reader decorator that presents many files as one series.
///
/// Implements [`PlaneReader`] itself, so stitchers stack under or over
/// any other decorator that speaks the same interface.
pub struct FileStitcher<S: ReaderSource> {
    source: S,
    options: StitchOptions,
    /// Live copies of the configured flags; initialization mutates
    /// them (a valid multi-file pattern id flips `pattern_ids` on, a
    /// regex id pins the pattern).
    pattern_ids: bool,
    can_change_pattern: bool,
    /// Prototype reader: probes grouping, serves everything when
    /// stitching is bypassed, and carries the adjusted order the
    /// pooled readers are aligned to.
    primary: DimensionSwapper<S::Reader>,
    externals: Vec<ExternalSeries<S::Reader>>,
    core: Vec<SeriesCore>,
    /// Per-series native (single-file) sizes, kept for recomputing
    /// axis lengths when the classification is overridden.
    native_z: Vec<u32>,
    native_c: Vec<u32>,
    native_t: Vec<u32>,
    /// Per-series, per-axis component lengths; index 0 is the native
    /// in-file extent, later entries one per contributing block.
    lens_z: Vec<Vec<u32>>,
    lens_c: Vec<Vec<u32>>,
    lens_t: Vec<Vec<u32>>,
    core_index: usize,
    no_stitch: bool,
    current_id: Option<String>,
}

impl<S: ReaderSource> FileStitcher<S> {
    pub fn new(source: S) -> FileStitcher<S> {
        FileStitcher::with_options(source, StitchOptions::default())
    }

    pub fn with_options(source: S, options: StitchOptions) -> FileStitcher<S> {
        let primary = DimensionSwapper::new(source.create_reader());
        FileStitcher {
            pattern_ids: options.pattern_ids,
            can_change_pattern: options.can_change_pattern,
            options,
            source,
            primary,
            externals: Vec::new(),
            core: Vec::new(),
            native_z: Vec::new(),
            native_c: Vec::new(),
            native_t: Vec::new(),
            lens_z: Vec::new(),
            lens_c: Vec::new(),
            lens_t: Vec::new(),
            core_index: 0,
            no_stitch: false,
            current_id: None,
        }
    }

    /// Whether stitching is bypassed for the current id.
    pub fn is_stitching(&self) -> bool {
        !self.no_stitch
    }

    /// Bind an id (file path or pattern string), discovering patterns
    /// and building every series. Setting the already-bound id is a
    /// no-op; a new id rebuilds all state wholesale.
    pub fn set_id(&mut self, id: &str) -> Result<(), StitchError> {
        if self.current_id.as_deref() == Some(id) {
            return Ok(());
        }
        self.close_all();
        self.init(id)?;
        self.current_id = Some(id.to_string());
        Ok(())
    }

    fn close_all(&mut self) {
        self.primary.close();
        for es in &mut self.externals {
            for r in &mut es.readers {
                r.close();
            }
        }
        self.externals.clear();
        self.core.clear();
        self.native_z.clear();
        self.native_c.clear();
        self.native_t.clear();
        self.lens_z.clear();
        self.lens_c.clear();
        self.lens_t.clear();
        self.core_index = 0;
        self.no_stitch = false;
        self.current_id = None;
    }

    fn init(&mut self, id: &str) -> Result<(), StitchError> {
        debug!(id, "initializing stitcher");

        let fp = FilePattern::new(id);
        if !self.pattern_ids {
            // A plain id that is itself a valid multi-file pattern
            // flips the stitcher into pattern mode.
            self.pattern_ids = fp.is_valid() && fp.files().len() > 1;
        } else if self.can_change_pattern {
            self.pattern_ids = !Path::new(id).exists();
        }

        let must_group = if self.pattern_ids {
            fp.is_valid()
                && self.primary.file_group_option(&fp.files()[0]) == FileGroupOption::MustGroup
        } else {
            self.primary.file_group_option(id) == FileGroupOption::MustGroup
        };

        if must_group || !self.options.group {
            // The reader owns grouping itself, or grouping is off.
            debug!(id, must_group, "stitching bypassed");
            self.no_stitch = true;
            self.primary.set_group_files(self.options.group);
            let open_id = if self.pattern_ids && fp.is_valid() {
                fp.files()[0].clone()
            } else {
                id.to_string()
            };
            self.primary.open(&open_id)?;
            return Ok(());
        }

        if fp.is_regex() {
            // A regex id cannot be re-derived from disk.
            self.can_change_pattern = false;
        }

        let mut patterns = self.find_patterns(id);
        if patterns.is_empty() {
            patterns = vec![id.to_string()];
        }
        debug!(?patterns, "discovered patterns");

        let mut parsed = Vec::with_capacity(patterns.len());
        for p in &patterns {
            let f = FilePattern::new(p);
            if !f.is_valid() {
                return Err(StitchError::InvalidPattern {
                    pattern: f.pattern().to_string(),
                    message: f.error().unwrap_or("invalid pattern").to_string(),
                });
            }
            parsed.push(f);
        }

        // A regex that matched nothing expands to itself; surface that
        // as "no files" rather than a missing-file error. Synthetic
        // `.fake` ids never exist on disk and are exempt.
        let first = &parsed[0];
        if first.is_regex()
            && first.files().len() == 1
            && first.files()[0] == first.pattern()
            && !Path::new(first.pattern()).exists()
            && !first.pattern().to_lowercase().ends_with(".fake")
        {
            return Err(StitchError::NoMatchingFiles(first.pattern().to_string()));
        }

        // Every referenced file must exist before any series is
        // committed. `.fake` ids describe synthetic files and are
        // exempt.
        for f in &parsed {
            for (i, file) in f.files().iter().enumerate() {
                if file.to_lowercase().ends_with(".fake") {
                    continue;
                }
                if !Path::new(file).exists() {
                    return Err(StitchError::MissingFile {
                        index: i,
                        path: file.clone(),
                    });
                }
            }
        }

        self.externals = parsed
            .into_iter()
            .map(|f| ExternalSeries::new(&self.source, f, self.options.max_readers.max(1)))
            .collect::<Result<Vec<_>, _>>()?;

        let first_file = self.externals[0].files()[0].clone();
        self.primary.set_group_files(self.options.group);
        self.primary.open(&first_file)?;

        if self.primary.series_count() > 1 && self.externals.len() > 1 {
            return Err(StitchError::UnsupportedGrouping);
        }

        // The underlying reader already spans multiple files, or the
        // pattern names a single file: nothing to stitch.
        if self.primary.used_files().len() > 1 || self.externals[0].files().len() == 1 {
            debug!(id, "single-file group, stitching bypassed");
            self.no_stitch = true;
            return Ok(());
        }

        // Align the prototype to the guessed order; pooled readers
        // follow it on access.
        let adjusted = self.externals[0].guesser.adjusted_order();
        self.primary.swap_dimensions(adjusted)?;

        let series_count = if self.externals.len() > 1 {
            self.externals.len()
        } else {
            self.primary.series_count()
        };

        self.core = vec![SeriesCore::default(); series_count];
        self.native_z = vec![1; series_count];
        self.native_c = vec![1; series_count];
        self.native_t = vec![1; series_count];
        self.lens_z = vec![Vec::new(); series_count];
        self.lens_c = vec![Vec::new(); series_count];
        self.lens_t = vec![Vec::new(); series_count];

        for i in 0..series_count {
            let ext = self.external_index(i);
            let (g_order, g_certain) = {
                let g = &self.externals[ext].guesser;
                (g.adjusted_order(), g.is_certain())
            };
            let r = self.pooled_reader(i, 0)?;
            let (size_x, size_y) = (r.size_x(), r.size_y());
            let (pixel_type, rgb) = (r.pixel_type(), r.rgb_channel_count());
            let (nz, nc, nt) = (r.size_z(), r.size_c(), r.size_t());
            let (mz, mc, mt) = (r.modulo_z(), r.modulo_c(), r.modulo_t());

            let core = &mut self.core[i];
            core.size_x = size_x;
            core.size_y = size_y;
            core.pixel_type = pixel_type;
            core.rgb_channel_count = rgb;
            core.dimension_order = g_order;
            core.input_order = g_order;
            core.order_certain = g_certain;
            core.modulo_z = mz;
            core.modulo_c = mc;
            core.modulo_t = mt;
            self.native_z[i] = nz;
            self.native_c[i] = nc;
            self.native_t[i] = nt;
        }
        for i in 0..series_count {
            self.compute_axis_lengths(i)?;
        }
        Ok(())
    }

    /// Discover the pattern set for an id, honoring the pattern-ids
    /// flag and pattern immutability.
    fn find_patterns(&mut self, id: &str) -> Vec<String> {
        if !self.pattern_ids {
            return pattern::find_series_patterns(Path::new(id));
        }
        if !self.can_change_pattern {
            return vec![id.to_string()];
        }
        // Re-derive from the first concrete file, then restore mode.
        self.pattern_ids = false;
        let first = FilePattern::new(id)
            .files()
            .first()
            .cloned()
            .unwrap_or_else(|| id.to_string());
        let mut patterns = self.find_patterns(&first);
        if patterns.is_empty() {
            patterns = vec![id.to_string()];
        }
        self.pattern_ids = true;
        patterns
    }

    fn external_index(&self, series: usize) -> usize {
        if self.primary.series_count() > 1 {
            0
        } else {
            series
        }
    }

    /// The pooled reader for (series, file), opened and aligned to the
    /// prototype's order.
    fn pooled_reader(
        &mut self,
        sno: usize,
        fno: usize,
    ) -> Result<&mut DimensionSwapper<S::Reader>, StitchError> {
        let primary_multi = self.primary.series_count() > 1;
        let new_order = self.primary.input_order();
        let ext = if primary_multi { 0 } else { sno };
        let n_files = self.externals[ext].files().len();

        let r = self.externals[ext].reader_for(fno)?;
        r.set_series(if primary_multi { sno } else { 0 });
        // Adopt the corrected order unless the reader is already
        // certain of a lone file, or its interleaved channels pin C.
        if (n_files > 1 || !r.order_certain())
            && (r.rgb_channel_count() == 1
                || new_order.index_of(Axis::C) == r.dimension_order().index_of(Axis::C))
        {
            r.swap_dimensions(new_order)?;
        }
        r.set_output_order(new_order);
        Ok(r)
    }

    /// Compute per-axis total lengths and component lists for a series
    /// from its native sizes and the classified pattern blocks.
    fn compute_axis_lengths(&mut self, sno: usize) -> Result<(), StitchError> {
        let ext_idx = self.external_index(sno);
        let n_files = self.externals[ext_idx].files().len();
        let mut axes = self.externals[ext_idx].guesser.axis_types().to_vec();
        let mut counts = self.externals[ext_idx].pattern.counts();
        if axes.is_empty() && n_files > 1 {
            // A blockless pattern spanning several files is an
            // implicit single Time block.
            axes = vec![AxisType::T];
            counts = vec![n_files as u32];
        }

        let (nz, nc, nt) = (self.native_z[sno], self.native_c[sno], self.native_t[sno]);
        let core = &mut self.core[sno];
        let rgb = core.rgb_channel_count.max(1);
        core.size_z = nz;
        core.size_c = nc;
        core.size_t = nt;
        let mut len_z = vec![nz];
        let mut len_c = vec![nc / rgb];
        let mut len_t = vec![nt];

        for (i, axis) in axes.iter().enumerate() {
            let count = counts[i];
            match axis {
                AxisType::Z => {
                    core.size_z *= count;
                    len_z.push(count);
                }
                AxisType::C => {
                    core.size_c *= count;
                    len_c.push(count);
                }
                AxisType::T => {
                    core.size_t *= count;
                    len_t.push(count);
                }
                AxisType::Series => {}
                AxisType::Unknown => return Err(StitchError::UnknownAxis(i)),
            }
        }
        core.image_count = core.size_z * core.size_t * (core.size_c / rgb);

        // A modulo sub-axis that no longer divides its axis evenly is
        // reset rather than left inconsistent.
        for (modulo, size) in [
            (&mut core.modulo_z, core.size_z),
            (&mut core.modulo_c, core.size_c),
            (&mut core.modulo_t, core.size_t),
        ] {
            if size % modulo.length() != 0 {
                warn!(series = sno, "resetting modulo sub-axis that does not divide its axis");
                *modulo = Modulo::noop();
            }
        }

        self.lens_z[sno] = len_z;
        self.lens_c[sno] = len_c;
        self.lens_t[sno] = len_t;
        trace!(
            series = sno,
            lens_z = ?self.lens_z[sno],
            lens_c = ?self.lens_c[sno],
            lens_t = ?self.lens_t[sno],
            "axis lengths computed"
        );
        Ok(())
    }

    /// Route a global plane index to its file index and the plane index
    /// within that file. `None` for the local index means the file is
    /// short on planes and the caller must substitute a blank plane.
    pub fn compute_indices(&mut self, no: u32) -> Result<(usize, Option<u32>), StitchError> {
        if self.no_stitch {
            return Ok((0, Some(no)));
        }
        let sno = self.core_index;
        let ext_idx = self.external_index(sno);
        let (mut axes, mut counts, n_files) = {
            let es = &self.externals[ext_idx];
            (
                es.guesser.axis_types().to_vec(),
                es.pattern.counts(),
                es.files().len(),
            )
        };
        if axes.is_empty() {
            axes = vec![AxisType::T];
            counts = vec![n_files as u32];
        }

        // Global (Z, C, T), then per-axis (outer blocks, inner native).
        let core = &self.core[sno];
        let (z, c, t) = dims::index_to_zct(
            core.dimension_order,
            core.size_z,
            core.effective_size_c(),
            core.size_t,
            core.image_count,
            no,
        )?;
        let pos_z = dims::raster_to_position(&self.lens_z[sno], z);
        let pos_c = dims::raster_to_position(&self.lens_c[sno], c);
        let pos_t = dims::raster_to_position(&self.lens_t[sno], t);

        // Outer positions recombine, in block order, into a file index.
        let (mut zi, mut ci, mut ti) = (1usize, 1usize, 1usize);
        let mut pos = Vec::with_capacity(axes.len());
        for (i, axis) in axes.iter().enumerate() {
            pos.push(match axis {
                AxisType::Z => {
                    let v = pos_z[zi];
                    zi += 1;
                    v
                }
                AxisType::C => {
                    let v = pos_c[ci];
                    ci += 1;
                    v
                }
                AxisType::T => {
                    let v = pos_t[ti];
                    ti += 1;
                    v
                }
                AxisType::Series => 0,
                AxisType::Unknown => return Err(StitchError::UnknownAxis(i)),
            });
        }
        let fno = dims::position_to_raster(&counts, &pos) as usize;

        let len_c0 = self.lens_c[sno][0];
        let r = self.pooled_reader(sno, fno)?;
        let ino = if pos_z[0] < r.size_z() && pos_c[0] < r.size_c() && pos_t[0] < r.size_t() {
            let mut c0 = pos_c[0];
            if r.is_rgb() && len_c0 > 0 && c0 * r.rgb_channel_count() >= len_c0 {
                c0 /= len_c0;
            }
            Some(r.zct_to_index(pos_z[0], c0, pos_t[0])?)
        } else {
            // The native coordinates overran this file's own extents.
            None
        };
        trace!(no, fno, ?ino, "computed indices");
        Ok((fno, ino))
    }

    /// The classification of every pattern block of the current series.
    pub fn axis_types(&self) -> &[AxisType] {
        self.externals[self.external_index(self.core_index)]
            .guesser
            .axis_types()
    }

    /// Override the block classification for the current series and
    /// recompute every derived axis length.
    pub fn set_axis_types(&mut self, axes: Vec<AxisType>) -> Result<(), StitchError> {
        if self.externals.is_empty() {
            return Err(StitchError::NoCurrentId);
        }
        let sno = self.core_index;
        let ext = self.external_index(sno);
        self.externals[ext].guesser.set_axis_types(axes);
        self.compute_axis_lengths(sno)
    }

    /// The file pattern behind the current series.
    pub fn file_pattern(&self) -> &FilePattern {
        &self.externals[self.external_index(self.core_index)].pattern
    }

    /// Planes each file contributes to the current series.
    pub fn images_per_file(&self) -> u32 {
        if self.no_stitch {
            self.primary.image_count()
        } else {
            self.externals[self.external_index(self.core_index)].images_per_file
        }
    }

    /// The files of the current series, in routing order.
    pub fn series_files(&self) -> Vec<String> {
        if self.no_stitch {
            self.primary
                .used_files()
                .into_iter()
                .map(|p| p.to_string_lossy().into_owned())
                .collect()
        } else {
            self.externals[self.external_index(self.core_index)]
                .files()
                .to_vec()
        }
    }
}

impl<S: ReaderSource> PlaneReader for FileStitcher<S> {
    fn open(&mut self, id: &str) -> Result<(), crate::error::ReaderError> {
        // The stitcher is itself a PlaneReader; structured errors are
        // flattened into the reader error surface when stacked.
        self.set_id(id).map_err(|e| match e {
            StitchError::Reader(inner) => inner,
            other => crate::error::ReaderError::UnrecognizedId(other.to_string()),
        })
    }

    fn close(&mut self) {
        self.close_all();
    }

    fn current_file(&self) -> Option<&str> {
        self.current_id.as_deref()
    }

    fn core(&self) -> &[SeriesCore] {
        if self.no_stitch {
            self.primary.core()
        } else {
            &self.core
        }
    }

    fn set_series(&mut self, series: usize) {
        if self.no_stitch || self.primary.series_count() > 1 {
            self.primary.set_series(series);
        }
        if series < self.core().len() {
            self.core_index = series;
        }
    }

    fn series(&self) -> usize {
        if self.no_stitch {
            self.primary.series()
        } else {
            self.core_index
        }
    }

    fn open_bytes(
        &mut self,
        no: u32,
        x: u32,
        y: u32,
        w: u32,
        h: u32,
    ) -> Result<Bytes, crate::error::ReaderError> {
        if self.no_stitch {
            return self.primary.open_bytes(no, x, y, w, h);
        }
        let to_reader_error = |e: StitchError| match e {
            StitchError::Reader(inner) => inner,
            StitchError::Dimension(inner) => crate::error::ReaderError::Dimension(inner),
            other => crate::error::ReaderError::UnrecognizedId(other.to_string()),
        };
        let (fno, ino) = self.compute_indices(no).map_err(to_reader_error)?;
        let sno = self.core_index;
        let blank_len = {
            let core = &self.core[sno];
            w as usize
                * h as usize
                * core.rgb_channel_count as usize
                * core.pixel_type.bytes_per_pixel()
        };
        if let Some(ino) = ino {
            let r = self.pooled_reader(sno, fno).map_err(to_reader_error)?;
            if ino < r.image_count() {
                return r.open_bytes(ino, x, y, w, h);
            }
        }
        // This file is short on planes; deliver a blank plane of the
        // expected size so the series stays rectangular.
        trace!(no, fno, "blank plane for short file");
        Ok(Bytes::from(vec![0u8; blank_len]))
    }

    fn used_files(&self) -> Vec<PathBuf> {
        if self.no_stitch {
            return self.primary.used_files();
        }
        let mut files: Vec<PathBuf> = Vec::new();
        for es in &self.externals {
            for f in es.files() {
                let p = PathBuf::from(f);
                if !files.contains(&p) {
                    files.push(p);
                }
            }
            for r in &es.readers {
                for p in r.used_files() {
                    if !files.contains(&p) {
                        files.push(p);
                    }
                }
            }
        }
        files
    }

    fn file_group_option(&self, id: &str) -> FileGroupOption {
        self.primary.file_group_option(id)
    }

    fn set_group_files(&mut self, group: bool) {
        self.options.group = group;
    }
}

// =============================================================================
// Tests
// =============================================================================
