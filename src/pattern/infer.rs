//! Pattern inference: recover a file pattern from one example filename
//! and a directory listing.
//!
//! Every maximal digit run in the example name is a candidate block.
//! For each run the surrounding literal text is used as a filter over
//! the candidate names; the matched set decides whether the run is
//! constant, a variable-width counter, or a fixed-width field that must
//! be decomposed column by column, possibly into several adjacent
//! counters, found by trying split widths longest-first and keeping the
//! first decomposition whose every piece forms a constant-step
//! sequence. "No consistent decomposition" is an ordinary `None`, not
//! an error: the caller falls back to treating the filename as a
//! single-file pattern.

use std::path::{Path, MAIN_SEPARATOR};

use tracing::debug;

use super::file_pattern::FilePattern;
use crate::stitch::axis_guesser::AxisType;

// =============================================================================
// NumberFilter
// =============================================================================

/// Accepts names of the form `<pre><digits><post>` and extracts the
/// numeric middle.
pub(crate) struct NumberFilter<'a> {
    pre: &'a str,
    post: &'a str,
}

impl<'a> NumberFilter<'a> {
    pub(crate) fn new(pre: &'a str, post: &'a str) -> NumberFilter<'a> {
        NumberFilter { pre, post }
    }

    /// The numeric middle of `name`, when it matches the filter shape.
    pub(crate) fn number(&self, name: &str) -> Option<i64> {
        if name.len() < self.pre.len() + self.post.len()
            || !name.starts_with(self.pre)
            || !name.ends_with(self.post)
        {
            return None;
        }
        let mid = &name[self.pre.len()..name.len() - self.post.len()];
        if mid.is_empty() || !mid.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        mid.parse::<i64>().ok()
    }

    pub(crate) fn accept(&self, name: &str) -> bool {
        self.number(name).is_some()
    }
}

// =============================================================================
// Pattern inference
// =============================================================================

/// Infer the group pattern for a file on disk, using its parent
/// directory listing as the candidate set.
pub fn find_pattern_for(path: &Path) -> Option<String> {
    let name = path.file_name()?.to_string_lossy().into_owned();
    let dir = path.parent().unwrap_or(Path::new(""));
    let names = list_names(dir);
    find_pattern(&name, &dir.to_string_lossy(), &names)
}

/// Infer the group pattern for `name` among `names`, prefixing the
/// result with `dir`.
pub fn find_pattern(name: &str, dir: &str, names: &[String]) -> Option<String> {
    find_pattern_excluding(name, dir, names, &[])
}

/// Infer the group pattern for `name`, keeping any digit run verbatim
/// whose prefix classifies as one of `exclude` (used to pin the Series
/// axis during per-series discovery).
pub fn find_pattern_excluding(
    name: &str,
    dir: &str,
    names: &[String],
    exclude: &[AxisType],
) -> Option<String> {
    let dir = with_separator(dir);
    let bytes = name.as_bytes();

    // Locate every maximal digit run.
    let mut runs: Vec<(usize, usize)> = Vec::new();
    let mut start = None;
    for (i, b) in bytes.iter().enumerate() {
        match (b.is_ascii_digit(), start) {
            (true, None) => start = Some(i),
            (false, Some(s)) => {
                runs.push((s, i));
                start = None;
            }
            _ => {}
        }
    }
    if let Some(s) = start {
        runs.push((s, bytes.len()));
    }

    // Analyze each run, building the pattern as we go.
    let mut sb = dir;
    let mut last = 0;
    for &(run_start, run_end) in &runs {
        let prefix = &name[last..run_start];
        if exclude.contains(&AxisType::from_prefix(prefix)) {
            // leave this run alone; it stays a literal numeral
            sb.push_str(&name[last..run_end]);
            last = run_end;
            continue;
        }
        sb.push_str(prefix);

        let filter = NumberFilter::new(&name[..run_start], &name[run_end..]);
        let matched: Vec<&String> = names.iter().filter(|n| filter.accept(n.as_str())).collect();
        if matched.is_empty() {
            return None;
        }
        if matched.len() == 1 {
            // false alarm; this number block is constant
            sb.push_str(&name[run_start..run_end]);
            last = run_end;
            continue;
        }

        if matched.iter().all(|s| s.len() == name.len()) {
            // Fixed width: the run may pack several numberings. Lock
            // down the columns that never vary, then decompose each
            // varying sub-run.
            let width = run_end - run_start;
            let same: Vec<bool> = (0..width)
                .map(|j| {
                    let jx = run_start + j;
                    matched.iter().all(|s| s.as_bytes()[jx] == bytes[jx])
                })
                .collect();

            let mut j = 0;
            while j < width {
                if same[j] {
                    sb.push(bytes[run_start + j] as char);
                    j += 1;
                    continue;
                }
                let sub_start = run_start + j;
                while j < width && !same[j] {
                    j += 1;
                }
                let piece = split_fixed_run(name, names, sub_start, run_start + j, String::new());
                let before = if run_start > 0 {
                    bytes[run_start - 1] as char
                } else {
                    '.'
                };
                match piece {
                    Some(p) => sb.push_str(&p),
                    // A run guarded by a series/extra marker may simply
                    // enumerate series; keep its final numeral.
                    None if matches!(before, 'S' | 's' | 'E' | 'e') => {
                        sb.push(bytes[run_end - 1] as char)
                    }
                    None => return None,
                }
            }
        } else {
            // Variable width: the run is a single numbering.
            let mut numbers: Vec<i64> =
                matched.iter().filter_map(|s| filter.number(s.as_str())).collect();
            numbers.sort_unstable();
            sb.push_str(&bounds(&numbers, false)?);
        }
        last = run_end;
    }
    sb.push_str(if runs.is_empty() { name } else { &name[last..] });

    debug!(name, pattern = %sb, "inferred pattern");
    Some(sb)
}

/// Discover one pattern per physical series: like [`find_pattern`] for
/// every candidate name, but with the Series axis pinned so each series
/// keeps its own numeral.
pub fn find_series_patterns(base: &Path) -> Vec<String> {
    let Some(name) = base.file_name() else {
        return Vec::new();
    };
    let dir = base.parent().unwrap_or(Path::new(""));
    let names = list_names(dir);
    find_series_patterns_in(
        &name.to_string_lossy(),
        &dir.to_string_lossy(),
        &names,
    )
}

/// Series-pattern discovery over an explicit name list. `base` is the
/// probe file's name within `names`.
pub fn find_series_patterns_in(base: &str, dir: &str, names: &[String]) -> Vec<String> {
    let dir = with_separator(dir);
    let base_path = format!("{dir}{base}");
    let base_suffix = suffix_of(base);

    let mut patterns: Vec<String> = Vec::new();
    for name in names {
        let Some(pattern) =
            find_pattern_excluding(name, &dir, names, &[AxisType::Series])
        else {
            continue;
        };
        let pattern_suffix = suffix_of(basename(&pattern));

        // The fully generalized pattern must reproduce the probe file,
        // otherwise this candidate belongs to an unrelated group.
        let reproduces_base = find_pattern(name, &dir, names)
            .map(|check| FilePattern::new(&check).files().contains(&base_path))
            .unwrap_or(false);

        if !patterns.contains(&pattern)
            && (!Path::new(&pattern).exists() || pattern == base_path)
            && pattern_suffix == base_suffix
            && reproduces_base
        {
            patterns.push(pattern);
        }
    }
    patterns.sort();
    debug!(base, count = patterns.len(), "series patterns");
    patterns
}

// =============================================================================
// Helpers
// =============================================================================

/// Decompose `name[ndx..end]` into adjacent constant-step counters,
/// trying the widest leading counter first. Returns the concatenated
/// block text, or `None` when no combination of widths works.
fn split_fixed_run(
    name: &str,
    names: &[String],
    ndx: usize,
    end: usize,
    acc: String,
) -> Option<String> {
    if ndx == end {
        return Some(acc);
    }
    for width in (1..=end - ndx).rev() {
        let filter = NumberFilter::new(&name[..ndx], &name[ndx + width..]);
        let mut numbers: Vec<i64> = names
            .iter()
            .filter(|n| n.len() == name.len() && filter.accept(n.as_str()))
            .filter_map(|n| n[ndx..ndx + width].parse::<i64>().ok())
            .collect();
        numbers.sort_unstable();
        let Some(b) = bounds(&numbers, true) else {
            continue;
        };
        if let Some(pattern) = split_fixed_run(name, names, ndx + width, end, format!("{acc}{b}")) {
            return Some(pattern);
        }
    }
    None
}

/// Render `<first-last[:step]>` for a sorted number list, or `None`
/// unless the list advances by one constant positive step. `fixed`
/// left-zero-pads the start bound to the end bound's width.
fn bounds(numbers: &[i64], fixed: bool) -> Option<String> {
    if numbers.len() < 2 {
        return None;
    }
    let first = numbers[0];
    let last = numbers[numbers.len() - 1];
    let step = numbers[1] - first;
    if step == 0 {
        return None;
    }
    if numbers.windows(2).any(|w| w[1] - w[0] != step) {
        return None;
    }
    let sb = first.to_string();
    let se = last.to_string();
    let mut out = String::from("<");
    if fixed {
        for _ in 0..se.len().saturating_sub(sb.len()) {
            out.push('0');
        }
    }
    out.push_str(&sb);
    out.push('-');
    out.push_str(&se);
    if step != 1 {
        out.push(':');
        out.push_str(&step.to_string());
    }
    out.push('>');
    Some(out)
}

/// Names (files and directories) directly inside `dir`, unsorted.
fn list_names(dir: &Path) -> Vec<String> {
    let dir = if dir.as_os_str().is_empty() {
        Path::new(".")
    } else {
        dir
    };
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    entries
        .flatten()
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect()
}

/// Ensure a non-empty directory string ends with the path separator.
fn with_separator(dir: &str) -> String {
    if dir.is_empty() || dir.ends_with(MAIN_SEPARATOR) {
        dir.to_string()
    } else {
        format!("{dir}{MAIN_SEPARATOR}")
    }
}

fn basename(path: &str) -> &str {
    path.rfind(MAIN_SEPARATOR)
        .map(|i| &path[i + 1..])
        .unwrap_or(path)
}

/// The text after the first `.` of a file name, or empty.
fn suffix_of(name: &str) -> &str {
    name.find('.').map(|i| &name[i + 1..]).unwrap_or("")
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    // -------------------------------------------------------------------------
    // NumberFilter tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_number_filter() {
        let f = NumberFilter::new("a_z", ".tif");
        assert_eq!(f.number("a_z12.tif"), Some(12));
        assert_eq!(f.number("a_z007.tif"), Some(7));
        assert!(!f.accept("a_z.tif"));
        assert!(!f.accept("b_z12.tif"));
        assert!(!f.accept("a_z12.png"));
        assert!(!f.accept("a_z1x2.tif"));
    }

    // -------------------------------------------------------------------------
    // find_pattern tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_simple_z_run() {
        let list = names(&["a_z1.tif", "a_z2.tif", "a_z3.tif"]);
        let p = find_pattern("a_z1.tif", "", &list).unwrap();
        assert_eq!(p, "a_z<1-3>.tif");
    }

    #[test]
    fn test_stepped_run() {
        let list = names(&["0m.tiff", "3m.tiff", "6m.tiff", "9m.tiff"]);
        let p = find_pattern("0m.tiff", "", &list).unwrap();
        assert_eq!(p, "<0-9:3>m.tiff");
    }

    #[test]
    fn test_two_independent_runs() {
        let mut list = Vec::new();
        for z in 0..4 {
            for c in 0..2 {
                list.push(format!("cell-Z{z}.C{c}.tiff"));
            }
        }
        let p = find_pattern("cell-Z0.C0.tiff", "", &list).unwrap();
        assert_eq!(p, "cell-Z<0-3>.C<0-1>.tiff");
    }

    #[test]
    fn test_constant_run_kept_verbatim() {
        let list = names(&["frame1_v2.tif", "frame2_v2.tif"]);
        let p = find_pattern("frame1_v2.tif", "", &list).unwrap();
        assert_eq!(p, "frame<1-2>_v2.tif");
    }

    #[test]
    fn test_zero_padded_fixed_width() {
        let list = names(&[
            "t01.tif", "t02.tif", "t03.tif", "t04.tif", "t05.tif", "t06.tif", "t07.tif",
            "t08.tif", "t09.tif", "t10.tif",
        ]);
        let p = find_pattern("t01.tif", "", &list).unwrap();
        assert_eq!(p, "t<01-10>.tif");
    }

    #[test]
    fn test_fixed_width_packed_numberings() {
        // Two counters fused into one digit run, no padding between:
        // TST00101.PIC .. TST00302.PIC = series <1-3> x channel <1-2>.
        let mut list = Vec::new();
        for a in 1..=3 {
            for b in 1..=2 {
                list.push(format!("TST00{a}0{b}.PIC"));
            }
        }
        let p = find_pattern("TST00101.PIC", "", &list).unwrap();
        assert_eq!(p, "TST00<1-3>0<1-2>.PIC");
    }

    #[test]
    fn test_fixed_width_no_constant_separator() {
        // 0101.pic through 0231.pic with nothing padding the two
        // counts; the recursive split has to find the 2+2 break.
        let mut list = Vec::new();
        for a in 1..=2 {
            for b in 1..=3 {
                list.push(format!("0{a}{b}1.pic"));
            }
        }
        let p = find_pattern("0111.pic", "", &list).unwrap();
        assert_eq!(p, "0<1-2><1-3>1.pic");
    }

    #[test]
    fn test_no_match_returns_none() {
        let list = names(&["a_z1.tif"]);
        // single file: every run is constant, pattern is the name itself
        let p = find_pattern("a_z1.tif", "", &list).unwrap();
        assert_eq!(p, "a_z1.tif");

        // an unrelated listing yields no acceptance at all
        let list = names(&["other.txt"]);
        assert!(find_pattern("a_z1.tif", "", &list).is_none());
    }

    #[test]
    fn test_inconsistent_steps_return_none() {
        let list = names(&["a_z1.tif", "a_z2.tif", "a_z9.tif"]);
        assert!(find_pattern("a_z1.tif", "", &list).is_none());
    }

    #[test]
    fn test_dir_prefix_carried() {
        let list = names(&["a_z1.tif", "a_z2.tif"]);
        let p = find_pattern("a_z1.tif", "data", &list).unwrap();
        assert_eq!(p, format!("data{MAIN_SEPARATOR}a_z<1-2>.tif"));
    }

    #[test]
    fn test_exclude_series_axis() {
        let list = names(&[
            "img_s1_z1.tif",
            "img_s1_z2.tif",
            "img_s2_z1.tif",
            "img_s2_z2.tif",
        ]);
        let p = find_pattern_excluding("img_s1_z1.tif", "", &list, &[AxisType::Series]).unwrap();
        assert_eq!(p, "img_s1_z<1-2>.tif");
    }

    // -------------------------------------------------------------------------
    // find_series_patterns tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_series_patterns_one_per_series() {
        let list = names(&[
            "img_s1_z1.tif",
            "img_s1_z2.tif",
            "img_s2_z1.tif",
            "img_s2_z2.tif",
        ]);
        let patterns = find_series_patterns_in("img_s1_z1.tif", "", &list);
        assert_eq!(patterns, ["img_s1_z<1-2>.tif", "img_s2_z<1-2>.tif"]);
    }

    #[test]
    fn test_series_patterns_suffix_must_match() {
        let list = names(&["img_s1_z1.tif", "img_s1_z2.tif", "img_s1_z1.txt", "img_s1_z2.txt"]);
        let patterns = find_series_patterns_in("img_s1_z1.tif", "", &list);
        assert_eq!(patterns, ["img_s1_z<1-2>.tif"]);
    }

    #[test]
    fn test_series_patterns_single_group() {
        let list = names(&["a_z1.tif", "a_z2.tif", "a_z3.tif"]);
        let patterns = find_series_patterns_in("a_z1.tif", "", &list);
        assert_eq!(patterns, ["a_z<1-3>.tif"]);
    }

    // -------------------------------------------------------------------------
    // bounds tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_bounds_rendering() {
        assert_eq!(bounds(&[1, 2, 3], false).unwrap(), "<1-3>");
        assert_eq!(bounds(&[2, 4, 6], false).unwrap(), "<2-6:2>");
        assert_eq!(bounds(&[1, 10], true).unwrap(), "<01-10:9>");
        assert!(bounds(&[1], false).is_none());
        assert!(bounds(&[1, 1, 2], false).is_none());
        assert!(bounds(&[1, 2, 4], false).is_none());
    }
}
