//! Dimensional axes, dimension orders and plane-index arithmetic.
//!
//! A series is iterated as a linear sequence of 2D planes. The
//! [`DimensionOrder`] decides which of Z, C and T varies fastest when a
//! plane index is decomposed into (Z, C, T) coordinates; X and Y always
//! occupy the first two positions and never take part in plane
//! indexing. The mixed-radix helpers at the bottom of this module are
//! shared by the stitching layer, which decomposes each axis further
//! into a native in-file extent plus one position per pattern block.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::DimensionError;

// =============================================================================
// Axis
// =============================================================================

/// One of the five dimensional axes of an image stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Axis {
    X,
    Y,
    Z,
    C,
    T,
}

impl Axis {
    /// Single-letter form used in order strings.
    pub const fn as_char(&self) -> char {
        match self {
            Axis::X => 'X',
            Axis::Y => 'Y',
            Axis::Z => 'Z',
            Axis::C => 'C',
            Axis::T => 'T',
        }
    }

    fn from_char(c: char) -> Option<Axis> {
        match c.to_ascii_uppercase() {
            'X' => Some(Axis::X),
            'Y' => Some(Axis::Y),
            'Z' => Some(Axis::Z),
            'C' => Some(Axis::C),
            'T' => Some(Axis::T),
            _ => None,
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

// =============================================================================
// DimensionOrder
// =============================================================================

/// A permutation of the five axes, e.g. `XYZCT`.
///
/// The type guarantees each axis appears exactly once. It does *not*
/// constrain where X and Y sit; planar validity (X and Y in the first
/// two positions) is checked where it matters, at swap time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DimensionOrder([Axis; 5]);

/// The default order: X fastest, then Y, then Z, C, T.
pub const ORDER_XYZCT: DimensionOrder =
    DimensionOrder([Axis::X, Axis::Y, Axis::Z, Axis::C, Axis::T]);

impl DimensionOrder {
    /// Build from an explicit axis array, validating the permutation.
    pub fn new(axes: [Axis; 5]) -> Result<DimensionOrder, DimensionError> {
        for axis in [Axis::X, Axis::Y, Axis::Z, Axis::C, Axis::T] {
            if !axes.contains(&axis) {
                let s: String = axes.iter().map(Axis::as_char).collect();
                return Err(DimensionError::InvalidOrder(s));
            }
        }
        Ok(DimensionOrder(axes))
    }

    /// The axes in iteration order, slowest last.
    pub fn axes(&self) -> [Axis; 5] {
        self.0
    }

    /// Position of an axis within this order (0..5).
    pub fn index_of(&self, axis: Axis) -> usize {
        self.0.iter().position(|a| *a == axis).unwrap_or(0)
    }

    /// Whether X and Y occupy the first two positions, in either order.
    pub fn spatial_axes_first(&self) -> bool {
        matches!(
            (self.0[0], self.0[1]),
            (Axis::X, Axis::Y) | (Axis::Y, Axis::X)
        )
    }

    /// The same order with the Z and T positions exchanged.
    pub fn with_zt_swapped(&self) -> DimensionOrder {
        let mut axes = self.0;
        for a in axes.iter_mut() {
            *a = match *a {
                Axis::Z => Axis::T,
                Axis::T => Axis::Z,
                other => other,
            };
        }
        DimensionOrder(axes)
    }
}

impl Default for DimensionOrder {
    fn default() -> Self {
        ORDER_XYZCT
    }
}

impl FromStr for DimensionOrder {
    type Err = DimensionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let chars: Vec<char> = s.chars().collect();
        if chars.len() != 5 {
            return Err(DimensionError::InvalidOrder(s.to_string()));
        }
        let mut axes = [Axis::X; 5];
        for (i, c) in chars.iter().enumerate() {
            axes[i] =
                Axis::from_char(*c).ok_or_else(|| DimensionError::InvalidOrder(s.to_string()))?;
        }
        DimensionOrder::new(axes)
    }
}

impl fmt::Display for DimensionOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for axis in &self.0 {
            write!(f, "{axis}")?;
        }
        Ok(())
    }
}

impl Serialize for DimensionOrder {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

// =============================================================================
// Plane-index arithmetic
// =============================================================================

/// Radix layout of the three plane axes for a given order: per slot,
/// the axis size and which coordinate it carries (0 = Z, 1 = C, 2 = T),
/// fastest-varying slot first.
fn plane_radix(
    order: DimensionOrder,
    size_z: u32,
    size_c: u32,
    size_t: u32,
) -> [(u32, usize); 3] {
    let mut slots = [(0u32, 0usize); 3];
    let mut n = 0;
    for axis in order.axes() {
        match axis {
            Axis::Z => {
                slots[n] = (size_z, 0);
                n += 1;
            }
            Axis::C => {
                slots[n] = (size_c, 1);
                n += 1;
            }
            Axis::T => {
                slots[n] = (size_t, 2);
                n += 1;
            }
            Axis::X | Axis::Y => {}
        }
    }
    slots
}

fn check_sizes(
    size_z: u32,
    size_c: u32,
    size_t: u32,
    image_count: u32,
) -> Result<(), DimensionError> {
    if size_z == 0 || size_c == 0 || size_t == 0 || size_z * size_c * size_t != image_count {
        return Err(DimensionError::SizeMismatch {
            size_z,
            size_c,
            size_t,
            image_count,
        });
    }
    Ok(())
}

/// Convert (Z, C, T) coordinates to a linear plane index under the
/// given iteration order.
///
/// `size_c` is the effective channel count (RGB sub-channels excluded).
pub fn zct_to_index(
    order: DimensionOrder,
    size_z: u32,
    size_c: u32,
    size_t: u32,
    z: u32,
    c: u32,
    t: u32,
) -> Result<u32, DimensionError> {
    check_sizes(size_z, size_c, size_t, size_z * size_c * size_t)?;
    if z >= size_z || c >= size_c || t >= size_t {
        return Err(DimensionError::CoordsOutOfRange {
            z,
            c,
            t,
            size_z,
            size_c,
            size_t,
        });
    }
    let zct = [z, c, t];
    let mut index = 0;
    let mut offset = 1;
    for (size, coord) in plane_radix(order, size_z, size_c, size_t) {
        index += zct[coord] * offset;
        offset *= size;
    }
    Ok(index)
}

/// Convert a linear plane index to (Z, C, T) coordinates under the
/// given iteration order. Inverse of [`zct_to_index`].
pub fn index_to_zct(
    order: DimensionOrder,
    size_z: u32,
    size_c: u32,
    size_t: u32,
    image_count: u32,
    index: u32,
) -> Result<(u32, u32, u32), DimensionError> {
    check_sizes(size_z, size_c, size_t, image_count)?;
    if index >= image_count {
        return Err(DimensionError::IndexOutOfRange { index, image_count });
    }
    let mut zct = [0u32; 3];
    let mut rest = index;
    for (size, coord) in plane_radix(order, size_z, size_c, size_t) {
        zct[coord] = rest % size;
        rest /= size;
    }
    Ok((zct[0], zct[1], zct[2]))
}

/// Decompose a linear coordinate over a mixed-radix length list, index
/// 0 varying fastest.
///
/// The stitching layer stores each axis as `[native extent, block
/// count, block count, ...]`; the native extent is always the inner,
/// fastest-moving component. Overflow past the final length lands in
/// the last position rather than wrapping, so an out-of-range
/// coordinate stays detectable.
pub fn raster_to_position(lengths: &[u32], raster: u32) -> Vec<u32> {
    let mut pos = vec![0u32; lengths.len()];
    let mut rest = raster;
    for (i, &len) in lengths.iter().enumerate() {
        if i + 1 < lengths.len() {
            pos[i] = rest % len.max(1);
            rest /= len.max(1);
        } else {
            pos[i] = rest;
        }
    }
    pos
}

/// Recombine per-block positions into a file index, the final block
/// varying fastest, the same nesting the pattern expansion uses for
/// its file listing.
pub fn position_to_raster(lengths: &[u32], pos: &[u32]) -> u32 {
    let mut raster = 0u32;
    for (i, &p) in pos.iter().enumerate() {
        raster = raster * lengths[i].max(1) + p;
    }
    raster
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn order(s: &str) -> DimensionOrder {
        s.parse().unwrap()
    }

    // -------------------------------------------------------------------------
    // DimensionOrder tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_order_parse_and_display() {
        let o = order("XYZCT");
        assert_eq!(o.to_string(), "XYZCT");
        assert_eq!(o.index_of(Axis::Z), 2);
        assert_eq!(o.index_of(Axis::T), 4);
    }

    #[test]
    fn test_order_parse_rejects_non_permutations() {
        assert!("XYZCZ".parse::<DimensionOrder>().is_err());
        assert!("XYZC".parse::<DimensionOrder>().is_err());
        assert!("XYZCTQ".parse::<DimensionOrder>().is_err());
        assert!("ABCDE".parse::<DimensionOrder>().is_err());
    }

    #[test]
    fn test_order_spatial_axes_first() {
        assert!(order("XYZCT").spatial_axes_first());
        assert!(order("YXTCZ").spatial_axes_first());
        assert!(!order("ZXYCT").spatial_axes_first());
    }

    #[test]
    fn test_order_zt_swap() {
        assert_eq!(order("XYZCT").with_zt_swapped(), order("XYTCZ"));
        assert_eq!(order("XYCTZ").with_zt_swapped(), order("XYCZT"));
    }

    // -------------------------------------------------------------------------
    // Plane-index tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_zct_round_trip_all_orders() {
        let orders = ["XYZCT", "XYZTC", "XYCZT", "XYCTZ", "XYTZC", "XYTCZ"];
        let (size_z, size_c, size_t) = (3u32, 2u32, 4u32);
        let count = size_z * size_c * size_t;
        for o in orders {
            let o = order(o);
            for i in 0..count {
                let (z, c, t) = index_to_zct(o, size_z, size_c, size_t, count, i).unwrap();
                let back = zct_to_index(o, size_z, size_c, size_t, z, c, t).unwrap();
                assert_eq!(back, i, "round trip failed for order {o} index {i}");
            }
        }
    }

    #[test]
    fn test_zct_fastest_axis() {
        // Under XYZCT, Z varies fastest.
        let o = order("XYZCT");
        assert_eq!(index_to_zct(o, 3, 2, 2, 12, 1).unwrap(), (1, 0, 0));
        // Under XYCZT, C varies fastest.
        let o = order("XYCZT");
        assert_eq!(index_to_zct(o, 3, 2, 2, 12, 1).unwrap(), (0, 1, 0));
    }

    #[test]
    fn test_zct_rejects_out_of_range() {
        let o = order("XYZCT");
        assert!(matches!(
            zct_to_index(o, 2, 2, 2, 2, 0, 0),
            Err(DimensionError::CoordsOutOfRange { .. })
        ));
        assert!(matches!(
            index_to_zct(o, 2, 2, 2, 8, 8),
            Err(DimensionError::IndexOutOfRange { .. })
        ));
    }

    #[test]
    fn test_zct_rejects_size_mismatch() {
        let o = order("XYZCT");
        assert!(matches!(
            index_to_zct(o, 2, 2, 2, 9, 0),
            Err(DimensionError::SizeMismatch { .. })
        ));
    }

    // -------------------------------------------------------------------------
    // Mixed-radix tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_raster_to_position() {
        // lengths [native=2, block of 3]: coordinate 5 -> native 1, block 2
        assert_eq!(raster_to_position(&[2, 3], 5), vec![1, 2]);
        assert_eq!(raster_to_position(&[2, 3], 0), vec![0, 0]);
        // overflow beyond the declared lengths lands in the last slot
        assert_eq!(raster_to_position(&[2, 3], 7), vec![1, 3]);
    }

    #[test]
    fn test_position_to_raster_last_fastest() {
        // Two blocks of sizes [2, 3]: the final block varies fastest,
        // matching the pattern expansion order.
        assert_eq!(position_to_raster(&[2, 3], &[0, 0]), 0);
        assert_eq!(position_to_raster(&[2, 3], &[0, 2]), 2);
        assert_eq!(position_to_raster(&[2, 3], &[1, 0]), 3);
        assert_eq!(position_to_raster(&[2, 3], &[1, 2]), 5);
    }
}
