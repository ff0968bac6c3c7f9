use crate::core::LineRange;
use similar::{DiffTag, TextDiff};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LineStats {
    pub added: usize,
    pub removed: usize,
    pub ranges: Vec<LineRange>,
}

/// Line-level diff between two texts. Adjacent delete/insert operations are
/// merged into a single range.
pub fn line_changes(old: &str, new: &str) -> LineStats {
    let diff = TextDiff::from_lines(old, new);
    let mut stats = LineStats::default();

    for op in diff.ops() {
        let (tag, old_range, new_range) = op.as_tag_tuple();
        if tag == DiffTag::Equal {
            continue;
        }
        stats.removed += old_range.len();
        stats.added += new_range.len();

        let contiguous = stats.ranges.last().is_some_and(|last| {
            last.old_start - 1 + last.old_len == old_range.start
                && last.new_start - 1 + last.new_len == new_range.start
        });
        if contiguous {
            if let Some(last) = stats.ranges.last_mut() {
                last.old_len += old_range.len();
                last.new_len += new_range.len();
            }
        } else {
            stats.ranges.push(LineRange {
                old_start: old_range.start + 1,
                old_len: old_range.len(),
                new_start: new_range.start + 1,
                new_len: new_range.len(),
            });
        }
    }

    stats
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_texts_have_no_changes() {
        let stats = line_changes("a\nb\n", "a\nb\n");
        assert_eq!(stats, LineStats::default());
    }

    #[test]
    fn test_replacement_is_one_range() {
        let stats = line_changes("a\nb\nc\n", "a\nB\nc\n");
        assert_eq!(stats.added, 1);
        assert_eq!(stats.removed, 1);
        assert_eq!(
            stats.ranges,
            vec![LineRange {
                old_start: 2,
                old_len: 1,
                new_start: 2,
                new_len: 1
            }]
        );
    }

    #[test]
    fn test_separate_hunks() {
        let stats = line_changes("a\nb\nc\nd\n", "x\nb\nc\nd\ne\n");
        assert_eq!(stats.added, 2);
        assert_eq!(stats.removed, 1);
        assert_eq!(stats.ranges.len(), 2);
        assert_eq!(stats.ranges[1].new_start, 5);
    }
}
