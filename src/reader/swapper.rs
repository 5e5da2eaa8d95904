//! Override a reader's physical vs. logical dimension order.
//!
//! Some readers report their planes in the wrong order, or a caller
//! simply wants to iterate Z-fastest over a file stored T-fastest.
//! [`DimensionSwapper`] wraps exactly one inner reader and maintains,
//! per series, an *input order* (the claimed physical on-disk order)
//! separate from the *dimension order* (the logical iteration order
//! callers see). Plane requests are re-expressed from the logical to
//! the physical order before they reach the inner reader; pixel bytes
//! are never touched.
//!
//! `swap_dimensions` relabels which axis each on-disk position means;
//! sizes travel with positions. `set_output_order` changes only the
//! iteration order and moves no sizes at all.

use std::path::PathBuf;

use bytes::Bytes;

use crate::dims::{self, Axis, DimensionOrder};
use crate::error::{DimensionError, ReaderError};
use crate::reader::{FileGroupOption, Modulo, PlaneReader, SeriesCore};

/// Decorator that re-maps plane indices between a logical and a
/// physical dimension order.
///
/// Owns a swapped copy of the inner reader's series list; the inner
/// reader's own metadata is left untouched.
#[derive(Debug)]
pub struct DimensionSwapper<R> {
    inner: R,
    core: Vec<SeriesCore>,
    /// Imposed iteration order per series; `None` until
    /// `set_output_order` is called.
    output_order: Vec<Option<DimensionOrder>>,
    series: usize,
}

impl<R: PlaneReader> DimensionSwapper<R> {
    pub fn new(inner: R) -> DimensionSwapper<R> {
        DimensionSwapper {
            inner,
            core: Vec::new(),
            output_order: Vec::new(),
            series: 0,
        }
    }

    /// The wrapped reader.
    pub fn inner(&self) -> &R {
        &self.inner
    }

    /// The claimed physical on-disk order of the current series.
    pub fn input_order(&self) -> DimensionOrder {
        self.core[self.series].input_order
    }

    /// Relabel the physical on-disk order of the current series.
    ///
    /// A no-op when `order` already equals the input order. Axis sizes
    /// and modulo annotations stay attached to their positions, so this
    /// changes which axis each stored plane run is called. Fails when X
    /// or Y leave the first two positions, or when the channel axis
    /// would move while the inner reader interleaves RGB samples
    /// (`rgb_channel_count() > 1` fuses C to the sample layout).
    pub fn swap_dimensions(&mut self, order: DimensionOrder) -> Result<(), DimensionError> {
        let old = self.core[self.series].input_order;
        if order == old {
            return Ok(());
        }
        if !order.spatial_axes_first() {
            return Err(DimensionError::MisplacedSpatialAxes(order.to_string()));
        }
        let rgb = self.core[self.series].rgb_channel_count;
        if rgb > 1 && order.index_of(Axis::C) != old.index_of(Axis::C) {
            return Err(DimensionError::RgbChannelFused(rgb));
        }

        // Sizes (and modulo annotations) stay with their positions;
        // the axes are renamed over them.
        let core = &mut self.core[self.series];
        let mut sizes = [0u32; 5];
        sizes[old.index_of(Axis::X)] = core.size_x;
        sizes[old.index_of(Axis::Y)] = core.size_y;
        sizes[old.index_of(Axis::Z)] = core.size_z;
        sizes[old.index_of(Axis::C)] = core.size_c;
        sizes[old.index_of(Axis::T)] = core.size_t;
        let mut modulos = [Modulo::noop(); 5];
        modulos[old.index_of(Axis::Z)] = core.modulo_z;
        modulos[old.index_of(Axis::C)] = core.modulo_c;
        modulos[old.index_of(Axis::T)] = core.modulo_t;

        core.size_x = sizes[order.index_of(Axis::X)];
        core.size_y = sizes[order.index_of(Axis::Y)];
        core.size_z = sizes[order.index_of(Axis::Z)];
        core.size_c = sizes[order.index_of(Axis::C)];
        core.size_t = sizes[order.index_of(Axis::T)];
        core.modulo_z = modulos[order.index_of(Axis::Z)];
        core.modulo_c = modulos[order.index_of(Axis::C)];
        core.modulo_t = modulos[order.index_of(Axis::T)];
        core.input_order = order;
        // Iteration order is preserved: until a caller imposes its own
        // output order, the pre-swap order keeps governing plane
        // indexing and reads are remapped underneath it.
        let out = *self.output_order[self.series].get_or_insert(old);
        core.dimension_order = out;
        Ok(())
    }

    /// Impose a logical iteration order without moving any sizes.
    pub fn set_output_order(&mut self, order: DimensionOrder) {
        self.output_order[self.series] = Some(order);
        self.core[self.series].dimension_order = order;
    }

    /// Re-express a logical plane index under the physical order.
    fn reorder(&self, no: u32) -> Result<u32, DimensionError> {
        let core = &self.core[self.series];
        let input = core.input_order;
        let output = core.dimension_order;
        if input == output {
            return Ok(no);
        }
        let (z, c, t) = dims::index_to_zct(
            output,
            core.size_z,
            core.effective_size_c(),
            core.size_t,
            core.image_count,
            no,
        )?;
        dims::zct_to_index(
            input,
            core.size_z,
            core.effective_size_c(),
            core.size_t,
            z,
            c,
            t,
        )
    }
}

impl<R: PlaneReader> PlaneReader for DimensionSwapper<R> {
    fn open(&mut self, id: &str) -> Result<(), ReaderError> {
        self.inner.open(id)?;
        self.core = self.inner.core().to_vec();
        for core in &mut self.core {
            core.input_order = core.dimension_order;
        }
        self.output_order = vec![None; self.core.len()];
        self.series = 0;
        Ok(())
    }

    fn close(&mut self) {
        self.inner.close();
        self.core.clear();
        self.output_order.clear();
        self.series = 0;
    }

    fn current_file(&self) -> Option<&str> {
        self.inner.current_file()
    }

    fn core(&self) -> &[SeriesCore] {
        &self.core
    }

    fn set_series(&mut self, series: usize) {
        if series < self.core.len() {
            self.series = series;
            self.inner.set_series(series);
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
        let physical = self.reorder(no)?;
        self.inner.open_bytes(physical, x, y, w, h)
    }

    fn used_files(&self) -> Vec<PathBuf> {
        self.inner.used_files()
    }

    fn file_group_option(&self, id: &str) -> FileGroupOption {
        self.inner.file_group_option(id)
    }

    fn set_group_files(&mut self, group: bool) {
        self.inner.set_group_files(group);
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::FakeReader;

    fn order(s: &str) -> DimensionOrder {
        s.parse().unwrap()
    }

    fn open_fake(id: &str) -> DimensionSwapper<FakeReader> {
        let mut swapper = DimensionSwapper::new(FakeReader::new());
        swapper.open(id).unwrap();
        swapper
    }

    #[test]
    fn test_swap_is_noop_for_same_order() {
        let mut s = open_fake("t&sizeZ=5&sizeT=3.fake");
        s.swap_dimensions(order("XYZCT")).unwrap();
        assert_eq!(s.size_z(), 5);
        assert_eq!(s.size_t(), 3);
    }

    #[test]
    fn test_swap_relabels_sizes() {
        let mut s = open_fake("t&sizeZ=5&sizeT=3.fake");
        // Relabel: the position that held Z (size 5) is now called T.
        s.swap_dimensions(order("XYTCZ")).unwrap();
        assert_eq!(s.size_t(), 5);
        assert_eq!(s.size_z(), 3);
        assert_eq!(s.input_order(), order("XYTCZ"));
        // Iteration order still reads the old way until imposed.
        assert_eq!(s.dimension_order(), order("XYZCT"));
    }

    #[test]
    fn test_swap_rejects_misplaced_xy() {
        let mut s = open_fake("t&sizeZ=2.fake");
        assert!(matches!(
            s.swap_dimensions(order("ZXYCT")),
            Err(DimensionError::MisplacedSpatialAxes(_))
        ));
        // X and Y reversed is allowed.
        s.swap_dimensions(order("YXZCT")).unwrap();
    }

    #[test]
    fn test_swap_rejects_c_move_under_rgb() {
        let mut s = open_fake("t&sizeC=6&rgb=3&sizeZ=2.fake");
        assert!(matches!(
            s.swap_dimensions(order("XYCZT")),
            Err(DimensionError::RgbChannelFused(3))
        ));
        // Moving Z and T while C keeps its position is fine.
        s.swap_dimensions(order("XYTCZ")).unwrap();
    }

    #[test]
    fn test_output_order_moves_no_sizes() {
        let mut s = open_fake("t&sizeZ=5&sizeT=3.fake");
        s.set_output_order(order("XYTCZ"));
        assert_eq!(s.size_z(), 5);
        assert_eq!(s.size_t(), 3);
        assert_eq!(s.dimension_order(), order("XYTCZ"));
        assert_eq!(s.input_order(), order("XYZCT"));
    }

    #[test]
    fn test_reorder_remaps_plane_indices() {
        // Physical XYZCT with Z=2, T=3; iterate logically T-fastest.
        let mut s = open_fake("t&sizeZ=2&sizeT=3&sizeX=4&sizeY=4.fake");
        s.set_output_order(order("XYTCZ"));

        // Logical index 1 is (z=0, t=1): physically z + 2*t = 2.
        let logical = s.open_bytes(1, 0, 0, 4, 4).unwrap();
        let mut raw = DimensionSwapper::new(FakeReader::new());
        raw.open("t&sizeZ=2&sizeT=3&sizeX=4&sizeY=4.fake").unwrap();
        let physical = raw.open_bytes(2, 0, 0, 4, 4).unwrap();
        assert_eq!(logical, physical);
    }

    #[test]
    fn test_swap_then_read_consistency() {
        // After relabeling, the logical geometry drives index checks.
        let mut s = open_fake("t&sizeZ=6&sizeX=2&sizeY=2.fake");
        s.swap_dimensions(order("XYTCZ")).unwrap();
        assert_eq!(s.size_t(), 6);
        assert_eq!(s.image_count(), 6);
        assert!(s.open_bytes(5, 0, 0, 2, 2).is_ok());
    }
}
