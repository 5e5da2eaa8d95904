//! On-disk pattern inference round trips.
//!
//! These tests build real directory trees and verify that an inferred
//! pattern expands back to exactly the files it was inferred from.

use std::fs::File;
use std::path::Path;

use stack_stitcher::{find_pattern_for, find_series_patterns, FilePattern};

/// Create empty files with the given names inside `dir`.
fn touch_all(dir: &Path, names: &[&str]) {
    for name in names {
        File::create(dir.join(name)).unwrap();
    }
}

fn basenames(files: &[String]) -> Vec<String> {
    files
        .iter()
        .map(|f| {
            Path::new(f)
                .file_name()
                .unwrap()
                .to_string_lossy()
                .into_owned()
        })
        .collect()
}

#[test]
fn test_simple_z_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    touch_all(dir.path(), &["a_z1.tif", "a_z2.tif", "a_z3.tif"]);

    let pattern = find_pattern_for(&dir.path().join("a_z1.tif")).unwrap();
    let fp = FilePattern::new(&pattern);
    assert!(fp.is_valid());

    let mut names = basenames(fp.files());
    names.sort();
    assert_eq!(names, ["a_z1.tif", "a_z2.tif", "a_z3.tif"]);
}

#[test]
fn test_two_axis_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let mut expected = Vec::new();
    for z in 0..3 {
        for c in 0..2 {
            expected.push(format!("cell-Z{z}.C{c}.tiff"));
        }
    }
    let refs: Vec<&str> = expected.iter().map(String::as_str).collect();
    touch_all(dir.path(), &refs);

    let pattern = find_pattern_for(&dir.path().join("cell-Z0.C0.tiff")).unwrap();
    let fp = FilePattern::new(&pattern);

    let mut names = basenames(fp.files());
    names.sort();
    expected.sort();
    assert_eq!(names, expected);
}

#[test]
fn test_zero_padded_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let expected: Vec<String> = (1..=12).map(|t| format!("t{t:02}.tif")).collect();
    let refs: Vec<&str> = expected.iter().map(String::as_str).collect();
    touch_all(dir.path(), &refs);

    let pattern = find_pattern_for(&dir.path().join("t01.tif")).unwrap();
    assert!(pattern.ends_with("t<01-12>.tif"));

    let fp = FilePattern::new(&pattern);
    let mut names = basenames(fp.files());
    names.sort();
    assert_eq!(names, expected);
}

#[test]
fn test_outlier_file_does_not_break_inference() {
    let dir = tempfile::tempdir().unwrap();
    touch_all(
        dir.path(),
        &["a_z1.tif", "a_z2.tif", "a_z3.tif", "readme.txt"],
    );

    let pattern = find_pattern_for(&dir.path().join("a_z2.tif")).unwrap();
    let fp = FilePattern::new(&pattern);
    assert_eq!(fp.files().len(), 3);
}

#[test]
fn test_lone_file_infers_itself() {
    let dir = tempfile::tempdir().unwrap();
    touch_all(dir.path(), &["single42.tif"]);

    let path = dir.path().join("single42.tif");
    let pattern = find_pattern_for(&path).unwrap();
    assert_eq!(pattern, path.to_string_lossy());

    // from_file falls back to a single-file pattern either way
    let fp = FilePattern::from_file(&path);
    assert!(fp.is_valid());
    assert_eq!(fp.files().len(), 1);
}

#[test]
fn test_series_patterns_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    touch_all(
        dir.path(),
        &[
            "img_s1_z1.tif",
            "img_s1_z2.tif",
            "img_s2_z1.tif",
            "img_s2_z2.tif",
        ],
    );

    let patterns = find_series_patterns(&dir.path().join("img_s1_z1.tif"));
    assert_eq!(patterns.len(), 2);
    assert!(patterns[0].ends_with("img_s1_z<1-2>.tif"));
    assert!(patterns[1].ends_with("img_s2_z<1-2>.tif"));

    // each series pattern expands to its own two files
    for pattern in &patterns {
        assert_eq!(FilePattern::new(pattern).files().len(), 2);
    }
}
