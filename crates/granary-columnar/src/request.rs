#![forbid(unsafe_code)]

use crate::column::Column;
use crate::error::{Result, StoreError};
use crate::types::ElementType;

/// A simple wildcard pattern: `*` matches any run of characters (including
/// the empty run), `?` matches exactly one. No other metacharacters.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Pattern {
    chars: Vec<char>,
}

impl Pattern {
    pub fn new(raw: impl AsRef<str>) -> Self {
        Self {
            chars: raw.as_ref().chars().collect(),
        }
    }

    pub fn matches(&self, text: &str) -> bool {
        // Two-pointer match with single-star backtracking; linear for
        // patterns without `*`, O(n*m) worst case.
        let t: Vec<char> = text.chars().collect();
        let p = &self.chars;
        let (mut pi, mut ti) = (0usize, 0usize);
        let mut star: Option<usize> = None;
        let mut mark = 0usize;

        while ti < t.len() {
            if pi < p.len() && (p[pi] == '?' || p[pi] == t[ti]) {
                pi += 1;
                ti += 1;
            } else if pi < p.len() && p[pi] == '*' {
                star = Some(pi);
                mark = ti;
                pi += 1;
            } else if let Some(s) = star {
                pi = s + 1;
                mark += 1;
                ti = mark;
            } else {
                return false;
            }
        }

        while pi < p.len() && p[pi] == '*' {
            pi += 1;
        }
        pi == p.len()
    }
}

/// An immutable, column-name-addressed filter condition.
///
/// A query is a slice of requests; a row qualifies iff every request accepts
/// it. Integer conditions evaluate over the column value widened to `i64`, so
/// one variant covers byte, short, int and long columns alike.
#[derive(Clone, Debug)]
pub enum Request {
    /// Membership in a candidate set (kept sorted for binary search).
    Member { column: String, candidates: Vec<i64> },
    /// Inclusive range on both ends. `low > high` is an empty range.
    Range { column: String, low: i64, high: i64 },
    /// Wildcard match on a string column; a null string never matches.
    Like { column: String, pattern: Pattern },
}

impl Request {
    pub fn member(column: impl Into<String>, mut candidates: Vec<i64>) -> Self {
        // Duplicates are harmless to binary search; sorting once here keeps
        // every evaluation O(log n).
        candidates.sort_unstable();
        Request::Member {
            column: column.into(),
            candidates,
        }
    }

    pub fn range(column: impl Into<String>, low: i64, high: i64) -> Self {
        Request::Range {
            column: column.into(),
            low,
            high,
        }
    }

    pub fn like(column: impl Into<String>, pattern: impl AsRef<str>) -> Self {
        Request::Like {
            column: column.into(),
            pattern: Pattern::new(pattern),
        }
    }

    /// Target column name.
    pub fn column(&self) -> &str {
        match self {
            Request::Member { column, .. } => column,
            Request::Range { column, .. } => column,
            Request::Like { column, .. } => column,
        }
    }

    /// Resolve against a concrete column, checking the element type. Done
    /// once per query, before any scanning.
    pub(crate) fn bind<'a>(&'a self, column: &'a Column) -> Result<BoundRequest<'a>> {
        let integer_only = |column: &Column| -> Result<()> {
            if column.element_type().is_integer() {
                Ok(())
            } else {
                Err(StoreError::ColumnTypeMismatch {
                    name: column.name().to_owned(),
                    expected: "an integer type".to_owned(),
                    actual: column.element_type().to_string(),
                })
            }
        };

        match self {
            Request::Member { candidates, .. } => {
                integer_only(column)?;
                Ok(BoundRequest::Member { column, candidates })
            }
            Request::Range { low, high, .. } => {
                integer_only(column)?;
                Ok(BoundRequest::Range {
                    column,
                    low: *low,
                    high: *high,
                })
            }
            Request::Like { pattern, .. } => {
                if column.element_type() != ElementType::Str {
                    return Err(StoreError::ColumnTypeMismatch {
                        name: column.name().to_owned(),
                        expected: ElementType::Str.to_string(),
                        actual: column.element_type().to_string(),
                    });
                }
                Ok(BoundRequest::Like { column, pattern })
            }
        }
    }
}

/// A request resolved against a concrete column for the duration of one
/// query; evaluated once per candidate row.
pub(crate) enum BoundRequest<'a> {
    Member {
        column: &'a Column,
        candidates: &'a [i64],
    },
    Range {
        column: &'a Column,
        low: i64,
        high: i64,
    },
    Like {
        column: &'a Column,
        pattern: &'a Pattern,
    },
}

impl BoundRequest<'_> {
    /// Positions come from the executor's `0..len` scan, so the typed reads
    /// cannot fail here; a defensive `false` keeps the row out either way.
    pub(crate) fn accepts(&self, position: usize) -> bool {
        match self {
            BoundRequest::Member { column, candidates } => column
                .get_widened(position)
                .map(|v| candidates.binary_search(&v).is_ok())
                .unwrap_or(false),
            BoundRequest::Range { column, low, high } => column
                .get_widened(position)
                .map(|v| *low <= v && v <= *high)
                .unwrap_or(false),
            BoundRequest::Like { column, pattern } => match column.get_str(position) {
                Ok(Some(s)) => pattern.matches(s),
                _ => false,
            },
        }
    }
}
