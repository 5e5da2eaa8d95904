//! A single `<...>` block within a file pattern.
//!
//! A block is one varying axis across files. Three forms are accepted:
//!
//! - a comma-separated literal list: `<R,G,B>`
//! - a single literal element: `<5>`
//! - a range with optional step: `<1-20>`, `<01-09:2>`, `<C-E>`
//!
//! Range bounds parse as base-10 integers first; failing that, as
//! base-36 letter runs (so `<C-E>` expands to `C,D,E`), with the output
//! case taken from the first character of the start bound. When the
//! start and end bounds have equal text length the block is fixed-width
//! and every generated element is left-zero-padded to that width.

use crate::error::PatternError;

/// Start delimiter of a pattern block.
pub const BLOCK_START: char = '<';

/// End delimiter of a pattern block.
pub const BLOCK_END: char = '>';

/// Numeric bounds of a range-form block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockRange {
    pub first: i64,
    pub last: i64,
    pub step: i64,
}

/// One parsed pattern block with its expanded element list.
///
/// Immutable after construction. `elements` always holds at least one
/// entry; for a range form it is strictly ordered by `step` starting at
/// `first`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternBlock {
    text: String,
    elements: Vec<String>,
    is_numeric: bool,
    is_fixed_width: bool,
    range: Option<BlockRange>,
}

impl PatternBlock {
    /// Parse a block from its delimited text (including `<` and `>`).
    pub fn parse(text: &str) -> Result<PatternBlock, PatternError> {
        if text.len() < 2 || !text.starts_with(BLOCK_START) || !text.ends_with(BLOCK_END) {
            return Err(PatternError::MissingDelimiters(text.to_string()));
        }
        let inner = &text[1..text.len() - 1];

        // 1) comma-separated literal list
        let list: Vec<&str> = inner.split(',').collect();
        if list.len() > 1 {
            let is_numeric = list.iter().all(|e| e.parse::<i64>().is_ok());
            let is_fixed_width = list.iter().all(|e| e.len() == list[0].len());
            return Ok(PatternBlock {
                text: text.to_string(),
                elements: list.into_iter().map(str::to_string).collect(),
                is_numeric,
                is_fixed_width,
                range: None,
            });
        }

        // 2) single literal element
        let Some(dash) = inner.find('-') else {
            let is_numeric = inner.parse::<i64>().is_ok();
            return Ok(PatternBlock {
                text: text.to_string(),
                elements: vec![inner.to_string()],
                is_numeric,
                is_fixed_width: true,
                range: None,
            });
        };

        // 3) range, with optional :step
        let begin = &inner[..dash];
        let rest = &inner[dash + 1..];
        let (end, step_text) = match rest.find(':') {
            Some(colon) => (&rest[..colon], &rest[colon + 1..]),
            None => (rest, "1"),
        };

        let (first, last, is_numeric) = match (begin.parse::<i64>(), end.parse::<i64>()) {
            (Ok(b), Ok(e)) => (b, e, true),
            _ => {
                let b = parse_base36(begin)
                    .ok_or_else(|| PatternError::InvalidBound(begin.to_string()))?;
                let e = parse_base36(end)
                    .ok_or_else(|| PatternError::InvalidBound(end.to_string()))?;
                (b, e, false)
            }
        };
        let step = step_text
            .parse::<i64>()
            .map_err(|_| PatternError::InvalidStep(step_text.to_string()))?;
        if step <= 0 {
            return Err(PatternError::NonPositiveStep(step));
        }
        if last < first {
            return Err(PatternError::IllOrderedRange {
                first: begin.to_string(),
                last: end.to_string(),
            });
        }

        let is_fixed_width = begin.len() == end.len();
        let upper = begin.chars().next().is_some_and(|c| c.is_ascii_uppercase());
        let count = (last - first) / step + 1;
        let mut elements = Vec::with_capacity(count as usize);
        let mut value = first;
        while value <= last {
            let mut s = if is_numeric {
                value.to_string()
            } else {
                format_base36(value, upper)
            };
            if is_fixed_width {
                while s.len() < end.len() {
                    s.insert(0, '0');
                }
            }
            elements.push(s);
            value += step;
        }

        Ok(PatternBlock {
            text: text.to_string(),
            elements,
            is_numeric,
            is_fixed_width,
            range: Some(BlockRange { first, last, step }),
        })
    }

    /// The raw block text, delimiters included.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// The expanded, ordered element list.
    pub fn elements(&self) -> &[String] {
        &self.elements
    }

    /// Number of elements this block contributes to the expansion.
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Whether every element parses as a base-10 integer.
    pub fn is_numeric(&self) -> bool {
        self.is_numeric
    }

    /// Whether all elements share one text width.
    pub fn is_fixed_width(&self) -> bool {
        self.is_fixed_width
    }

    /// Range bounds, when the block was written in range form.
    pub fn range(&self) -> Option<BlockRange> {
        self.range
    }
}

/// Parse a base-36 alphanumeric run. Rejects mixed-case and
/// non-alphanumeric text so that punctuation never masquerades as a
/// letter range.
fn parse_base36(s: &str) -> Option<i64> {
    if s.is_empty() || !s.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    i64::from_str_radix(s, 36).ok()
}

/// Render a non-negative value in base 36, letters in the given case.
fn format_base36(mut value: i64, upper: bool) -> String {
    if value == 0 {
        return "0".to_string();
    }
    let digits = if upper {
        b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ"
    } else {
        b"0123456789abcdefghijklmnopqrstuvwxyz"
    };
    let mut out = Vec::new();
    while value > 0 {
        out.push(digits[(value % 36) as usize]);
        value /= 36;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_range() {
        let b = PatternBlock::parse("<1-5>").unwrap();
        assert_eq!(b.elements(), ["1", "2", "3", "4", "5"]);
        assert!(b.is_numeric());
        assert!(b.is_fixed_width());
        assert_eq!(
            b.range(),
            Some(BlockRange {
                first: 1,
                last: 5,
                step: 1
            })
        );
    }

    #[test]
    fn test_zero_padded_stepped_range() {
        let b = PatternBlock::parse("<01-09:2>").unwrap();
        assert_eq!(b.elements(), ["01", "03", "05", "07", "09"]);
        assert!(b.is_fixed_width());
    }

    #[test]
    fn test_variable_width_range() {
        let b = PatternBlock::parse("<8-12>").unwrap();
        assert_eq!(b.elements(), ["8", "9", "10", "11", "12"]);
        assert!(!b.is_fixed_width());
    }

    #[test]
    fn test_literal_list() {
        let b = PatternBlock::parse("<R,G,B>").unwrap();
        assert_eq!(b.elements(), ["R", "G", "B"]);
        assert!(!b.is_numeric());
        assert!(b.is_fixed_width());
        assert!(b.range().is_none());
    }

    #[test]
    fn test_numeric_list() {
        let b = PatternBlock::parse("<2,4,8>").unwrap();
        assert!(b.is_numeric());
        assert_eq!(b.len(), 3);
    }

    #[test]
    fn test_single_element() {
        let b = PatternBlock::parse("<5>").unwrap();
        assert_eq!(b.elements(), ["5"]);
        assert!(b.is_numeric());
        let b = PatternBlock::parse("<abc>").unwrap();
        assert_eq!(b.elements(), ["abc"]);
        assert!(!b.is_numeric());
    }

    #[test]
    fn test_letter_range() {
        let b = PatternBlock::parse("<C-E>").unwrap();
        assert_eq!(b.elements(), ["C", "D", "E"]);
        assert!(!b.is_numeric());

        let b = PatternBlock::parse("<c-e>").unwrap();
        assert_eq!(b.elements(), ["c", "d", "e"]);
    }

    #[test]
    fn test_missing_delimiters() {
        assert!(matches!(
            PatternBlock::parse("1-5"),
            Err(PatternError::MissingDelimiters(_))
        ));
        assert!(matches!(
            PatternBlock::parse("<"),
            Err(PatternError::MissingDelimiters(_))
        ));
    }

    #[test]
    fn test_bad_ranges() {
        assert!(matches!(
            PatternBlock::parse("<5-1>"),
            Err(PatternError::IllOrderedRange { .. })
        ));
        assert!(matches!(
            PatternBlock::parse("<1-5:0>"),
            Err(PatternError::NonPositiveStep(0))
        ));
        assert!(matches!(
            PatternBlock::parse("<1-5:x>"),
            Err(PatternError::InvalidStep(_))
        ));
        assert!(matches!(
            PatternBlock::parse("<!-5>"),
            Err(PatternError::InvalidBound(_))
        ));
    }

    #[test]
    fn test_truncating_step() {
        // 1, 4, 7 covers <1-8:3>: the range need not land on the end.
        let b = PatternBlock::parse("<1-8:3>").unwrap();
        assert_eq!(b.elements(), ["1", "4", "7"]);
    }
}
