//! Byte offset to line number mapping.
//!
//! Scanners that locate findings with a whole-text regex get a byte offset
//! back (`Match::start`). These helpers turn that offset into the same
//! 1-based line number a per-line loop over `str::lines` would report.

/// Number of lines `str::lines` yields for `text`, never less than 1.
pub fn line_count(text: &str) -> usize {
    text.lines().count().max(1)
}

/// Map a byte offset in `text` to a 1-based line number.
///
/// Counts newlines in `text[..offset]`. Offsets past the end of the text are
/// clamped to the last line.
pub fn line_number_of(text: &str, offset: usize) -> usize {
    let end = offset.min(text.len());
    let newlines = text.as_bytes()[..end].iter().filter(|b| **b == b'\n').count();
    (newlines + 1).min(line_count(text))
}

/// Precomputed line starts for repeated lookups on the same text.
#[derive(Debug, Clone)]
pub struct LineIndex {
    starts: Vec<usize>,
    last_line: usize,
}

impl LineIndex {
    pub fn new(text: &str) -> Self {
        let mut starts = vec![0];
        starts.extend(
            text.bytes()
                .enumerate()
                .filter(|(_, b)| *b == b'\n')
                .map(|(i, _)| i + 1),
        );
        Self {
            starts,
            last_line: line_count(text),
        }
    }

    /// 1-based line containing byte `offset`, clamped to the last line.
    pub fn line_of(&self, offset: usize) -> usize {
        // Number of line starts at or before `offset`.
        let line = self.starts.partition_point(|start| *start <= offset);
        line.clamp(1, self.last_line)
    }
}
