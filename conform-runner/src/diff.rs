// Copyright (c) The conform Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Line diffs between expected and actual output, for display.
//!
//! Nothing here affects classification, which always compares bytes exactly.
//!
//! The diff is computed over lines that keep their terminators, so a missing trailing newline
//! shows up as a changed line. Opcodes carry half-open ranges into both line vectors, in the same
//! shape as Python's `difflib`.

use owo_colors::{OwoColorize, Style};
use std::{fmt, io, ops::Range};

/// Inputs whose comparison table would be larger than this are reported as a single replacement.
const MAX_CELLS: usize = 4_000_000;

/// The kind of a [`DiffOp`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DiffTag {
    /// The lines are the same on both sides.
    Equal,

    /// Lines present only in the expected text.
    Delete,

    /// Lines present only in the actual text.
    Insert,

    /// Expected lines replaced by different actual lines.
    Replace,
}

/// One run of lines in an edit script.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DiffOp {
    /// What happened to this run.
    pub tag: DiffTag,

    /// The range of expected lines covered.
    pub expected: Range<usize>,

    /// The range of actual lines covered.
    pub actual: Range<usize>,
}

/// A single rendered line of a diff.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DiffLine<'a> {
    /// A line on both sides.
    Equal(&'a str),

    /// A line only in the expected text.
    Delete(&'a str),

    /// A line only in the actual text.
    Insert(&'a str),
}

impl<'a> DiffLine<'a> {
    /// The prefix used when rendering this line.
    pub fn prefix(self) -> char {
        match self {
            Self::Equal(_) => ' ',
            Self::Delete(_) => '-',
            Self::Insert(_) => '+',
        }
    }

    /// The line's text, including its terminator if it had one.
    pub fn text(self) -> &'a str {
        match self {
            Self::Equal(text) | Self::Delete(text) | Self::Insert(text) => text,
        }
    }
}

/// An edit script between two texts.
#[derive(Clone, Debug)]
pub struct TextDiff<'a> {
    expected: Vec<&'a str>,
    actual: Vec<&'a str>,
    ops: Vec<DiffOp>,
}

impl<'a> TextDiff<'a> {
    /// Computes a line diff from `expected` to `actual`.
    pub fn new(expected: &'a str, actual: &'a str) -> Self {
        Self::with_budget(expected, actual, MAX_CELLS)
    }

    fn with_budget(expected: &'a str, actual: &'a str, max_cells: usize) -> Self {
        let expected: Vec<_> = expected.split_inclusive('\n').collect();
        let actual: Vec<_> = actual.split_inclusive('\n').collect();
        let ops = compute_ops(&expected, &actual, max_cells);
        Self {
            expected,
            actual,
            ops,
        }
    }

    /// Returns the opcodes, in order. Adjacent opcodes never share a tag.
    pub fn ops(&self) -> &[DiffOp] {
        &self.ops
    }

    /// Returns the expected text split into lines.
    pub fn expected_lines(&self) -> &[&'a str] {
        &self.expected
    }

    /// Returns the actual text split into lines.
    pub fn actual_lines(&self) -> &[&'a str] {
        &self.actual
    }

    /// Returns true if both texts are the same.
    pub fn is_identical(&self) -> bool {
        self.ops.iter().all(|op| op.tag == DiffTag::Equal)
    }

    /// Iterates over the diff line by line. Replacements yield their deletions first.
    pub fn iter_lines(&self) -> impl Iterator<Item = DiffLine<'a>> + '_ {
        self.ops.iter().flat_map(move |op| {
            let expected = &self.expected[op.expected.clone()];
            let actual = &self.actual[op.actual.clone()];
            let (deleted, equal, inserted): (&[&str], &[&str], &[&str]) = match op.tag {
                DiffTag::Equal => (&[], expected, &[]),
                DiffTag::Delete | DiffTag::Insert | DiffTag::Replace => (expected, &[], actual),
            };
            equal
                .iter()
                .copied()
                .map(DiffLine::Equal)
                .chain(deleted.iter().copied().map(DiffLine::Delete))
                .chain(inserted.iter().copied().map(DiffLine::Insert))
        })
    }

    /// Writes the diff with `-`, `+` and ` ` prefixes, styling changed lines.
    pub fn render(&self, writer: &mut dyn io::Write, styles: &DiffStyles) -> io::Result<()> {
        write!(writer, "{}", self.styled(styles))
    }

    /// Returns a displayable form of the diff that styles changed lines.
    pub fn styled<'d>(&'d self, styles: &'d DiffStyles) -> StyledDiff<'d, 'a> {
        StyledDiff { diff: self, styles }
    }
}

impl fmt::Display for TextDiff<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.styled(&DiffStyles::default()), f)
    }
}

/// Styles for deleted and inserted lines. The default is unstyled.
#[derive(Clone, Copy, Debug, Default)]
pub struct DiffStyles {
    /// Style for lines only in the expected text.
    pub delete: Style,

    /// Style for lines only in the actual text.
    pub insert: Style,
}

impl DiffStyles {
    fn for_line(&self, line: DiffLine<'_>) -> Style {
        match line {
            DiffLine::Equal(_) => Style::new(),
            DiffLine::Delete(_) => self.delete,
            DiffLine::Insert(_) => self.insert,
        }
    }
}

/// A [`TextDiff`] rendered with [`DiffStyles`]. Created by [`TextDiff::styled`].
pub struct StyledDiff<'d, 'a> {
    diff: &'d TextDiff<'a>,
    styles: &'d DiffStyles,
}

impl fmt::Display for StyledDiff<'_, '_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in self.diff.iter_lines() {
            let text = line.text();
            let content = text.strip_suffix('\n').unwrap_or(text);
            let rendered = format!("{}{}", line.prefix(), content);
            writeln!(f, "{}", rendered.style(self.styles.for_line(line)))?;
            if content.len() == text.len() {
                writeln!(f, "\\ No newline at end of file")?;
            }
        }
        Ok(())
    }
}

fn compute_ops(expected: &[&str], actual: &[&str], max_cells: usize) -> Vec<DiffOp> {
    let prefix = expected
        .iter()
        .zip(actual)
        .take_while(|(a, b)| a == b)
        .count();
    let suffix = expected[prefix..]
        .iter()
        .rev()
        .zip(actual[prefix..].iter().rev())
        .take_while(|(a, b)| a == b)
        .count();

    let mut builder = OpsBuilder::default();
    builder.push(DiffTag::Equal, prefix, prefix);

    let expected_mid = &expected[prefix..expected.len() - suffix];
    let actual_mid = &actual[prefix..actual.len() - suffix];
    let cells = (expected_mid.len() + 1).saturating_mul(actual_mid.len() + 1);
    if cells > max_cells {
        builder.push_change(expected_mid.len(), actual_mid.len());
    } else {
        lcs_ops(expected_mid, actual_mid, &mut builder);
    }

    builder.push(DiffTag::Equal, suffix, suffix);
    builder.finish()
}

/// Walks a longest-common-subsequence table and feeds runs into `builder`.
fn lcs_ops(expected: &[&str], actual: &[&str], builder: &mut OpsBuilder) {
    let width = actual.len() + 1;
    // table[i * width + j] is the LCS length of expected[i..] and actual[j..].
    let mut table = vec![0u32; (expected.len() + 1) * width];
    for i in (0..expected.len()).rev() {
        for j in (0..actual.len()).rev() {
            table[i * width + j] = if expected[i] == actual[j] {
                table[(i + 1) * width + j + 1] + 1
            } else {
                table[(i + 1) * width + j].max(table[i * width + j + 1])
            };
        }
    }

    let (mut i, mut j) = (0, 0);
    let (mut deleted, mut inserted) = (0, 0);
    while i < expected.len() || j < actual.len() {
        if i < expected.len() && j < actual.len() && expected[i] == actual[j] {
            builder.push_change(deleted, inserted);
            (deleted, inserted) = (0, 0);
            builder.push(DiffTag::Equal, 1, 1);
            i += 1;
            j += 1;
        } else if j == actual.len()
            || (i < expected.len() && table[(i + 1) * width + j] >= table[i * width + j + 1])
        {
            deleted += 1;
            i += 1;
        } else {
            inserted += 1;
            j += 1;
        }
    }
    builder.push_change(deleted, inserted);
}

#[derive(Debug, Default)]
struct OpsBuilder {
    ops: Vec<DiffOp>,
    expected_pos: usize,
    actual_pos: usize,
}

impl OpsBuilder {
    /// Pushes a block of changed lines, picking the tag from which sides are non-empty.
    fn push_change(&mut self, deleted: usize, inserted: usize) {
        let tag = match (deleted, inserted) {
            (0, 0) => return,
            (_, 0) => DiffTag::Delete,
            (0, _) => DiffTag::Insert,
            _ => DiffTag::Replace,
        };
        self.push(tag, deleted, inserted);
    }

    fn push(&mut self, tag: DiffTag, expected_len: usize, actual_len: usize) {
        if expected_len == 0 && actual_len == 0 {
            return;
        }
        let expected_end = self.expected_pos + expected_len;
        let actual_end = self.actual_pos + actual_len;

        match self.ops.last_mut() {
            Some(last) if last.tag == tag => {
                last.expected.end = expected_end;
                last.actual.end = actual_end;
            }
            _ => self.ops.push(DiffOp {
                tag,
                expected: self.expected_pos..expected_end,
                actual: self.actual_pos..actual_end,
            }),
        }

        self.expected_pos = expected_end;
        self.actual_pos = actual_end;
    }

    fn finish(self) -> Vec<DiffOp> {
        self.ops
    }
}
