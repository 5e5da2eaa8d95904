//! File patterns: one string standing for a whole family of files.
//!
//! A pattern is literal text interrupted by [`PatternBlock`] spans.
//! Expansion is the cartesian product of every block's elements,
//! interleaved with the literal pieces, the final block varying
//! fastest:
//!
//! ```text
//! img_z<1-2>c<1-2>.tif  ->  img_z1c1.tif, img_z1c2.tif,
//!                           img_z2c1.tif, img_z2c2.tif
//! ```
//!
//! A pattern with no blocks at all is first tried as a literal path;
//! failing that it is treated as a regular expression matched against a
//! recursive directory listing. Malformed patterns never panic: the
//! object is constructed with `valid() == false` and an inspectable
//! error message, mirroring how a bad id should surface to a caller as
//! data rather than a crash.

use std::path::{Path, MAIN_SEPARATOR};

use regex::Regex;
use tracing::warn;

use super::block::{PatternBlock, BLOCK_END, BLOCK_START};
use super::infer;

/// A parsed file pattern and its expanded file listing.
///
/// Immutable after construction.
#[derive(Debug, Clone)]
pub struct FilePattern {
    pattern: String,
    valid: bool,
    error: Option<String>,
    /// Byte spans of each block within `pattern`; ends are exclusive.
    starts: Vec<usize>,
    ends: Vec<usize>,
    blocks: Vec<PatternBlock>,
    files: Vec<String>,
    is_regex: bool,
}

impl FilePattern {
    /// Parse a pattern string and expand its file listing.
    pub fn new(pattern: &str) -> FilePattern {
        let mut fp = FilePattern {
            pattern: pattern.to_string(),
            valid: false,
            error: None,
            starts: Vec::new(),
            ends: Vec::new(),
            blocks: Vec::new(),
            files: Vec::new(),
            is_regex: false,
        };
        fp.init();
        fp
    }

    /// Infer the pattern for a file on disk and parse it; falls back to
    /// the literal path when no pattern is found.
    pub fn from_file(path: &Path) -> FilePattern {
        match infer::find_pattern_for(path) {
            Some(p) => FilePattern::new(&p),
            None => FilePattern::new(&path.to_string_lossy()),
        }
    }

    fn init(&mut self) {
        // Locate and pair the block delimiters.
        let lt: Vec<usize> = self
            .pattern
            .match_indices(BLOCK_START)
            .map(|(i, _)| i)
            .collect();
        let gt: Vec<usize> = self
            .pattern
            .match_indices(BLOCK_END)
            .map(|(i, _)| i)
            .collect();
        if lt.len() != gt.len() {
            self.error = Some("Mismatched block markers".to_string());
            return;
        }
        for i in 0..lt.len() {
            if gt[i] <= lt[i] || (i > 0 && lt[i] < gt[i - 1]) {
                self.error = Some("Bad block marker order".to_string());
                return;
            }
            self.starts.push(lt[i]);
            self.ends.push(gt[i] + 1);
        }

        // Parse each block.
        for i in 0..self.starts.len() {
            let text = &self.pattern[self.starts[i]..self.ends[i]];
            match PatternBlock::parse(text) {
                Ok(block) => self.blocks.push(block),
                Err(e) => {
                    self.error = Some(e.to_string());
                    return;
                }
            }
        }

        // Expand the file listing. An empty expansion falls back to the
        // pattern itself, never to an empty list.
        if self.blocks.is_empty() {
            self.expand_blockless();
        } else {
            self.build_files("", self.blocks.len());
        }
        if self.files.is_empty() {
            self.files.push(self.pattern.clone());
        }
        self.valid = true;
    }

    /// Recursive cartesian expansion; the final block varies fastest.
    fn build_files(&mut self, prefix: &str, ndx: usize) {
        let n1 = if ndx == 0 { 0 } else { self.ends[ndx - 1] };
        let n2 = if ndx == self.starts.len() {
            self.pattern.len()
        } else {
            self.starts[ndx]
        };
        let pre = self.pattern[n1..n2].to_string();
        if ndx == 0 {
            self.files.push(format!("{pre}{prefix}"));
        } else {
            let elements = self.blocks[ndx - 1].elements().to_vec();
            for element in elements {
                self.build_files(&format!("{element}{pre}{prefix}"), ndx - 1);
            }
        }
    }

    /// Resolve a zero-block pattern: an existing literal file, or a
    /// regular expression over a directory listing.
    fn expand_blockless(&mut self) {
        if Path::new(&self.pattern).exists() {
            self.files.push(self.pattern.clone());
            return;
        }
        self.is_regex = true;

        // Find the directory portion. A `\Q...\E`-quoted prefix counts
        // as literal text, so the separator inside it wins over any
        // later separator inside the regex proper.
        let quoted_end = self
            .pattern
            .find(&format!("{MAIN_SEPARATOR}\\E"))
            .map(|i| i + 1)
            .unwrap_or(0);
        let plain_end = self
            .pattern
            .rfind(MAIN_SEPARATOR)
            .map(|i| i + 1)
            .unwrap_or(0);
        let (dir, base_start) =
            if self.pattern.starts_with("\\Q") && quoted_end > 0 && quoted_end <= plain_end {
                (self.pattern[2..quoted_end].to_string(), quoted_end + 2)
            } else {
                (self.pattern[..plain_end].to_string(), plain_end)
            };
        let dir = if dir.is_empty() || !Path::new(&dir).exists() {
            ".".to_string()
        } else {
            dir
        };

        let mut candidates = list_files_recursive(Path::new(&dir));
        candidates.sort();

        let base_pattern = &self.pattern[base_start..];
        let regex = Regex::new(&anchored(base_pattern)).or_else(|_| {
            warn!(pattern = %self.pattern, "regex tail failed to compile, retrying whole pattern");
            Regex::new(&anchored(&self.pattern))
        });
        let Ok(regex) = regex else {
            // Not a usable regex either; the pattern expands to itself.
            return;
        };

        for candidate in candidates {
            let name = Path::new(&candidate)
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            if regex.is_match(&name) {
                self.files.push(candidate);
            }
        }
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    /// The original pattern string.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Whether the pattern parsed cleanly.
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// The parse error, when `is_valid()` is false.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Whether this pattern was resolved as a regular expression.
    pub fn is_regex(&self) -> bool {
        self.is_regex
    }

    /// Every file named by this pattern, in expansion order.
    pub fn files(&self) -> &[String] {
        &self.files
    }

    /// The parsed blocks, in pattern order.
    pub fn blocks(&self) -> &[PatternBlock] {
        &self.blocks
    }

    /// Element count per block, in pattern order.
    pub fn counts(&self) -> Vec<u32> {
        self.blocks.iter().map(|b| b.len() as u32).collect()
    }

    /// The literal text strictly between the previous block and block
    /// `i` (from the last path separator for block 0).
    pub fn prefix(&self, i: usize) -> Option<&str> {
        if i >= self.starts.len() {
            return None;
        }
        let start = if i > 0 {
            self.ends[i - 1]
        } else {
            self.pattern
                .rfind(MAIN_SEPARATOR)
                .map(|p| p + 1)
                .unwrap_or(0)
        };
        (start <= self.starts[i]).then(|| &self.pattern[start..self.starts[i]])
    }

    /// Per-block prefixes, in pattern order.
    pub fn prefixes(&self) -> Vec<&str> {
        (0..self.starts.len())
            .map(|i| self.prefix(i).unwrap_or(""))
            .collect()
    }

    /// The literal text after the final block (the whole pattern when
    /// there are no blocks).
    pub fn suffix(&self) -> &str {
        match self.ends.last() {
            Some(&end) => &self.pattern[end..],
            None => &self.pattern,
        }
    }
}

/// Anchor a regex so it must match the entire candidate name.
fn anchored(pattern: &str) -> String {
    format!("^(?:{pattern})$")
}

/// All regular files under `dir`, descending into subdirectories,
/// as full paths. Unreadable entries are skipped.
fn list_files_recursive(dir: &Path) -> Vec<String> {
    let mut out = Vec::new();
    let Ok(entries) = std::fs::read_dir(dir) else {
        return out;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            out.extend(list_files_recursive(&path));
        } else {
            out.push(path.to_string_lossy().into_owned());
        }
    }
    out
}

// =============================================================================
// Tests
// =============================================================================
