//! Exclusion expressions for numbered lists
//!
//! The operator narrows a package list by naming the positions to drop:
//!
//! ```text
//! expr := "" | term ("," term)*
//! term := digits | digits ".." digits
//! ```
//!
//! Positions are 1-based. Parsing is all-or-nothing: one malformed token
//! rejects the whole line. Once parsed, numbers outside the list are
//! tolerated and simply exclude nothing.

use std::collections::BTreeSet;
use std::str::FromStr;

use crate::error::{Result, SetupError};

/// One comma-separated term of an exclusion expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExclusionTerm {
    /// `n`: a single 1-based position
    Single(usize),
    /// `a..b`: an inclusive range of 1-based positions
    Range { start: usize, end: usize },
}

impl ExclusionTerm {
    /// Zero-based indices this term removes from a list of `len` items.
    ///
    /// A range only applies when `1 <= start <= end <= len`. Reversed ranges
    /// and ranges reaching past either end of the list contribute nothing.
    fn indices(self, len: usize) -> std::ops::Range<usize> {
        match self {
            Self::Single(n) if (1..=len).contains(&n) => n - 1..n,
            Self::Range { start, end } if start >= 1 && start <= end && end <= len => {
                start - 1..end
            }
            _ => 0..0,
        }
    }
}

/// A parsed exclusion expression.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExclusionSpec {
    terms: Vec<ExclusionTerm>,
}

impl ExclusionSpec {
    /// Parse an already-trimmed operator line.
    pub fn parse(input: &str) -> Result<Self> {
        if input.is_empty() {
            return Ok(Self::default());
        }

        let terms = input
            .split(',')
            .map(parse_term)
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| SetupError::invalid_selection(input))?;

        Ok(Self { terms })
    }

    /// The parsed terms, in input order.
    pub fn terms(&self) -> &[ExclusionTerm] {
        &self.terms
    }

    /// True when the expression excludes nothing regardless of list length.
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Resolve to the set of zero-based indices to drop from `len` items.
    pub fn resolve(&self, len: usize) -> BTreeSet<usize> {
        self.terms
            .iter()
            .flat_map(|term| term.indices(len))
            .collect()
    }

    /// Copy of `items` without the excluded positions, order preserved.
    pub fn apply<S: AsRef<str>>(&self, items: &[S]) -> Vec<String> {
        let excluded = self.resolve(items.len());
        items
            .iter()
            .enumerate()
            .filter(|(index, _)| !excluded.contains(index))
            .map(|(_, item)| item.as_ref().to_string())
            .collect()
    }
}

impl FromStr for ExclusionSpec {
    type Err = SetupError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Parse `input` and return the surviving items.
pub fn filter_items<S: AsRef<str>>(items: &[S], input: &str) -> Result<Vec<String>> {
    Ok(ExclusionSpec::parse(input)?.apply(items))
}

fn parse_term(token: &str) -> Option<ExclusionTerm> {
    match token.split_once("..") {
        Some((start, end)) => Some(ExclusionTerm::Range {
            start: parse_number(start)?,
            end: parse_number(end)?,
        }),
        None => parse_number(token).map(ExclusionTerm::Single),
    }
}

/// One or more ASCII digits. Values past `usize::MAX` saturate, which keeps
/// them grammatically valid but out of range for any list.
fn parse_number(digits: &str) -> Option<usize> {
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(digits.parse().unwrap_or(usize::MAX))
}
