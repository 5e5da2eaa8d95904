//! Heuristic classification of pattern blocks as Z, T, C or Series.
//!
//! Block prefixes carry most of the signal: `z`/`focal` mean focal
//! planes, `t`/`time` mean time points, `c`/`w` mean channels, `s`
//! means a separate series. What the prefixes leave unknown is settled
//! against the first file's own reported sizes, with one special move:
//! when the reader is not certain of its dimension order and exactly
//! one of Z/T is named by the pattern while the file claims planes on
//! the other one, the two axes are assumed transposed and swapped.

use std::fmt;

use tracing::debug;

use crate::dims::{Axis, DimensionOrder};
use crate::pattern::FilePattern;

/// Known prefixes for focal planes.
const Z_PREFIXES: [&str; 6] = ["fp", "sec", "z", "zs", "focal", "focalplane"];

/// Known prefixes for time points.
const T_PREFIXES: [&str; 4] = ["t", "tl", "tp", "time"];

/// Known prefixes for channels.
const C_PREFIXES: [&str; 4] = ["c", "ch", "w", "wavelength"];

/// Known prefixes for series.
const S_PREFIXES: [&str; 3] = ["s", "series", "sp"];

// =============================================================================
// AxisType
// =============================================================================

/// The dimensional meaning assigned to one pattern block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum AxisType {
    /// Focal planes.
    Z,
    /// Time points.
    T,
    /// Channels.
    C,
    /// Separate series.
    Series,
    /// Not yet classified.
    Unknown,
}

impl AxisType {
    /// Classify a block prefix by naming convention alone.
    ///
    /// The prefix is lower-cased, trailing digits and divider
    /// characters are stripped, and the trailing letter run is matched
    /// against the known prefix sets (so `img_z` classifies by its
    /// final `z`).
    pub fn from_prefix(prefix: &str) -> AxisType {
        let p = normalize_prefix(prefix);
        if Z_PREFIXES.contains(&p.as_str()) {
            AxisType::Z
        } else if T_PREFIXES.contains(&p.as_str()) {
            AxisType::T
        } else if C_PREFIXES.contains(&p.as_str()) {
            AxisType::C
        } else if S_PREFIXES.contains(&p.as_str()) {
            AxisType::Series
        } else {
            AxisType::Unknown
        }
    }
}

impl fmt::Display for AxisType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AxisType::Z => "Z",
            AxisType::T => "T",
            AxisType::C => "C",
            AxisType::Series => "S",
            AxisType::Unknown => "?",
        };
        write!(f, "{s}")
    }
}

/// Lower-case, strip trailing digits/space/`-`/`_`/`.`, then keep the
/// trailing letter run.
fn normalize_prefix(prefix: &str) -> String {
    let lower = prefix.to_lowercase();
    let chars: Vec<char> = lower.chars().collect();
    let mut end = chars.len();
    while end > 0
        && (chars[end - 1].is_ascii_digit() || matches!(chars[end - 1], ' ' | '-' | '_' | '.'))
    {
        end -= 1;
    }
    let mut start = end;
    while start > 0 && chars[start - 1].is_ascii_lowercase() {
        start -= 1;
    }
    chars[start..end].iter().collect()
}

// =============================================================================
// AxisGuesser
// =============================================================================

/// One axis classification per pattern block, plus the corrected
/// dimension order and (possibly swapped) per-file sizes.
#[derive(Debug, Clone)]
pub struct AxisGuesser {
    axis_types: Vec<AxisType>,
    adjusted_order: DimensionOrder,
    size_z: u32,
    size_t: u32,
    size_c: u32,
    certain: bool,
}

impl AxisGuesser {
    /// Classify every block of `pattern` against the first file's
    /// reported order, sizes and certainty. `size_c` is the effective
    /// channel count.
    pub fn new(
        pattern: &FilePattern,
        order: DimensionOrder,
        size_z: u32,
        size_t: u32,
        size_c: u32,
        order_certain: bool,
    ) -> AxisGuesser {
        let prefixes = pattern.prefixes();
        let suffix = pattern.suffix();
        let blocks = pattern.blocks();

        let mut axis_types = vec![AxisType::Unknown; blocks.len()];
        let (mut found_z, mut found_t, mut found_c) = (false, false, false);

        // 1) classify by naming convention
        for (i, slot) in axis_types.iter_mut().enumerate() {
            *slot = AxisType::from_prefix(prefixes[i]);
            match slot {
                AxisType::Z => found_z = true,
                AxisType::T => found_t = true,
                AxisType::C => found_c = true,
                AxisType::Series | AxisType::Unknown => {}
            }
            if *slot != AxisType::Unknown {
                continue;
            }

            let elements = blocks[i].elements();

            // Bio-Rad convention: a trailing .pic whose final block is
            // {1,2}, {2,3} or {1,2,3} enumerates channels.
            let is_last = i == blocks.len() - 1;
            if is_last && suffix.eq_ignore_ascii_case(".pic") && is_biorad_channels(elements) {
                *slot = AxisType::C;
                found_c = true;
                continue;
            }

            // RGB-letter convention: a 2-3 element block whose first
            // letters include at least two of r, g, b.
            if (2..=3).contains(&elements.len()) {
                let hits = ['r', 'g', 'b']
                    .iter()
                    .filter(|rgb| {
                        elements.iter().any(|e| {
                            e.chars().next().map(|c| c.to_ascii_lowercase()) == Some(**rgb)
                        })
                    })
                    .count();
                if hits >= 2 {
                    *slot = AxisType::C;
                    found_c = true;
                }
            }
        }

        // 2) Z/T swap: an uncertain reader that stores planes on the
        // axis the pattern does not name has likely transposed the two.
        let mut adjusted_order = order;
        let (mut size_z, mut size_t) = (size_z, size_t);
        if !order_certain
            && ((found_z && !found_t && size_z == 1 && size_t > 1)
                || (found_t && !found_z && size_t == 1 && size_z > 1))
        {
            debug!(%order, size_z, size_t, "swapping Z and T for uncertain reader");
            adjusted_order = order.with_zt_swapped();
            std::mem::swap(&mut size_z, &mut size_t);
        }

        // 3) resolve remaining unknowns in strict priority order
        let mut can_be_z = !found_z && size_z == 1;
        let mut can_be_t = !found_t && size_t == 1;
        let mut can_be_c = !found_c && size_c == 1;
        let mut certain = order_certain;

        for slot in axis_types.iter_mut() {
            if *slot != AxisType::Unknown {
                continue;
            }
            certain = false;
            if can_be_z {
                *slot = AxisType::Z;
                can_be_z = false;
            } else if can_be_t {
                *slot = AxisType::T;
                can_be_t = false;
            } else if can_be_c {
                *slot = AxisType::C;
                can_be_c = false;
            } else {
                *slot = match adjusted_order.axes()[4] {
                    Axis::C => AxisType::C,
                    Axis::Z => AxisType::Z,
                    _ => AxisType::T,
                };
            }
        }

        AxisGuesser {
            axis_types,
            adjusted_order,
            size_z,
            size_t,
            size_c,
            certain,
        }
    }

    /// The classification, one entry per pattern block.
    pub fn axis_types(&self) -> &[AxisType] {
        &self.axis_types
    }

    /// Replace the classification wholesale.
    ///
    /// The caller owns the consequences: every derived per-series axis
    /// length must be recomputed before the next metadata read.
    pub fn set_axis_types(&mut self, axis_types: Vec<AxisType>) {
        self.axis_types = axis_types;
    }

    /// The dimension order after any Z/T correction.
    pub fn adjusted_order(&self) -> DimensionOrder {
        self.adjusted_order
    }

    /// Whether the classification is certain (reader certain and no
    /// block fell through to guessing).
    pub fn is_certain(&self) -> bool {
        self.certain
    }

    /// Per-file sizes after any Z/T correction.
    pub fn sizes_zct(&self) -> (u32, u32, u32) {
        (self.size_z, self.size_c, self.size_t)
    }

    /// Number of blocks assigned to Z.
    pub fn axis_count_z(&self) -> usize {
        self.count(AxisType::Z)
    }

    /// Number of blocks assigned to T.
    pub fn axis_count_t(&self) -> usize {
        self.count(AxisType::T)
    }

    /// Number of blocks assigned to C.
    pub fn axis_count_c(&self) -> usize {
        self.count(AxisType::C)
    }

    fn count(&self, which: AxisType) -> usize {
        self.axis_types.iter().filter(|a| **a == which).count()
    }
}

/// `{1,2}`, `{2,3}` or `{1,2,3}` exactly.
fn is_biorad_channels(elements: &[String]) -> bool {
    let e: Vec<&str> = elements.iter().map(String::as_str).collect();
    matches!(e.as_slice(), ["1", "2"] | ["2", "3"] | ["1", "2", "3"])
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
    // Prefix classification tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_prefix_sets() {
        assert_eq!(AxisType::from_prefix("z"), AxisType::Z);
        assert_eq!(AxisType::from_prefix("focalplane"), AxisType::Z);
        assert_eq!(AxisType::from_prefix("t"), AxisType::T);
        assert_eq!(AxisType::from_prefix("time"), AxisType::T);
        assert_eq!(AxisType::from_prefix("ch"), AxisType::C);
        assert_eq!(AxisType::from_prefix("wavelength"), AxisType::C);
        assert_eq!(AxisType::from_prefix("series"), AxisType::Series);
        assert_eq!(AxisType::from_prefix("frame"), AxisType::Unknown);
    }

    #[test]
    fn test_prefix_normalization() {
        // trailing letter run decides, dividers and digits stripped
        assert_eq!(AxisType::from_prefix("img_z"), AxisType::Z);
        assert_eq!(AxisType::from_prefix("cell-T"), AxisType::T);
        assert_eq!(AxisType::from_prefix("a.ch"), AxisType::C);
        assert_eq!(AxisType::from_prefix("stack_z01_"), AxisType::Z);
        assert_eq!(AxisType::from_prefix(""), AxisType::Unknown);
    }

    // -------------------------------------------------------------------------
    // Guesser tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_known_prefixes_certain() {
        let fp = FilePattern::new("img_z<1-3>c<1-2>.tif");
        let g = AxisGuesser::new(&fp, order("XYZCT"), 1, 1, 1, true);
        assert_eq!(g.axis_types(), [AxisType::Z, AxisType::C]);
        assert!(g.is_certain());
        assert_eq!(g.adjusted_order(), order("XYZCT"));
        assert_eq!(g.axis_count_z(), 1);
        assert_eq!(g.axis_count_c(), 1);
        assert_eq!(g.axis_count_t(), 0);
    }

    #[test]
    fn test_zt_swap_for_uncertain_reader() {
        // Pattern names T; the file claims 5 Z planes and a singleton
        // T, and the reader is uncertain: assume Z/T transposed.
        let fp = FilePattern::new("t<1-5>.tif");
        let g = AxisGuesser::new(&fp, order("XYZCT"), 5, 1, 1, false);
        assert_eq!(g.axis_types(), [AxisType::T]);
        assert_eq!(g.adjusted_order(), order("XYTCZ"));
        assert_eq!(g.sizes_zct(), (1, 1, 5));
    }

    #[test]
    fn test_no_swap_when_certain() {
        let fp = FilePattern::new("t<1-5>.tif");
        let g = AxisGuesser::new(&fp, order("XYZCT"), 5, 1, 1, true);
        assert_eq!(g.adjusted_order(), order("XYZCT"));
        assert_eq!(g.sizes_zct(), (5, 1, 1));
    }

    #[test]
    fn test_unknown_resolution_priority() {
        // Unknown prefix, nothing claimed by the file: Z wins first.
        let fp = FilePattern::new("frame<1-4>.tif");
        let g = AxisGuesser::new(&fp, order("XYZCT"), 1, 1, 1, true);
        assert_eq!(g.axis_types(), [AxisType::Z]);
        // guessing always clears certainty
        assert!(!g.is_certain());
    }

    #[test]
    fn test_unknown_resolution_skips_consumed_axes() {
        // Z named by the pattern, so the unknown block falls to T.
        let fp = FilePattern::new("a<1-2>_z<1-3>.tif");
        let g = AxisGuesser::new(&fp, order("XYZCT"), 1, 1, 1, true);
        assert_eq!(g.axis_types(), [AxisType::T, AxisType::Z]);
    }

    #[test]
    fn test_unknown_resolution_last_letter_fallback() {
        // File already extends along Z and T, channel prefix present:
        // the unknown block falls back to the order's last letter.
        let fp = FilePattern::new("a<1-2>_c<1-3>.tif");
        let g = AxisGuesser::new(&fp, order("XYZCT"), 4, 5, 1, true);
        assert_eq!(g.axis_types(), [AxisType::T, AxisType::C]);

        let g = AxisGuesser::new(&fp, order("XYZTC"), 4, 5, 1, true);
        assert_eq!(g.axis_types(), [AxisType::C, AxisType::C]);
    }

    #[test]
    fn test_rgb_letter_blocks_are_channels() {
        let fp = FilePattern::new("img<R,G,B>.tif");
        let g = AxisGuesser::new(&fp, order("XYZCT"), 1, 1, 1, true);
        assert_eq!(g.axis_types(), [AxisType::C]);

        let fp = FilePattern::new("img<r,g>.tif");
        let g = AxisGuesser::new(&fp, order("XYZCT"), 1, 1, 1, true);
        assert_eq!(g.axis_types(), [AxisType::C]);
    }

    #[test]
    fn test_biorad_pic_channels() {
        let fp = FilePattern::new("sdub<1-2>.PIC");
        let g = AxisGuesser::new(&fp, order("XYZCT"), 1, 1, 1, true);
        assert_eq!(g.axis_types(), [AxisType::C]);

        // same elements under a different suffix stay unclassified
        let fp = FilePattern::new("sdub<1-2>.tif");
        let g = AxisGuesser::new(&fp, order("XYZCT"), 1, 1, 1, true);
        assert_eq!(g.axis_types(), [AxisType::Z]);
    }

    #[test]
    fn test_series_prefix() {
        let fp = FilePattern::new("img_s<1-2>_z<1-3>.tif");
        let g = AxisGuesser::new(&fp, order("XYZCT"), 1, 1, 1, true);
        assert_eq!(g.axis_types(), [AxisType::Series, AxisType::Z]);
    }

    #[test]
    fn test_set_axis_types() {
        let fp = FilePattern::new("frame<1-4>.tif");
        let mut g = AxisGuesser::new(&fp, order("XYZCT"), 1, 1, 1, true);
        g.set_axis_types(vec![AxisType::T]);
        assert_eq!(g.axis_types(), [AxisType::T]);
        assert_eq!(g.axis_count_t(), 1);
    }
}
