//! Sequence-dependent changeover matrix.
//!
//! Maps (from change-group, to change-group) → changeover hours. Groups
//! are addressed either by ID or by dense index; the optimizer works on
//! indices, lot derivation on IDs.
//!
//! Lookups never fail: an unmapped group, an out-of-range index or a
//! negative / non-finite entry all read as zero hours.
//!
//! # Reference
//! Allahverdi et al. (2008), "A survey of scheduling problems with
//! setup times or costs"

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Square change-group × change-group duration matrix (hours).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChangeoverMatrix {
    groups: Vec<String>,
    index: HashMap<String, usize>,
    hours: Vec<Vec<f64>>,
}

impl ChangeoverMatrix {
    /// Creates an all-zero matrix over the given groups.
    ///
    /// Duplicate group IDs are collapsed onto their first occurrence.
    pub fn new<I, S>(groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut matrix = Self::default();
        for g in groups {
            matrix.ensure_group(g.into());
        }
        matrix
    }

    /// Creates a matrix from dense rows; groups are named `"0"`, `"1"`, ...
    ///
    /// Ragged rows are padded with zeros to the widest dimension.
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Self {
        let n = rows.iter().map(Vec::len).max().unwrap_or(0).max(rows.len());
        let mut matrix = Self::new((0..n).map(|i| i.to_string()));
        for (i, row) in rows.into_iter().enumerate() {
            for (j, h) in row.into_iter().enumerate() {
                matrix.hours[i][j] = sanitize(h);
            }
        }
        matrix
    }

    /// Builds a matrix from `(from, to, hours)` rules, registering groups
    /// in first-seen order.
    pub fn from_rules<I, S>(rules: I) -> Self
    where
        I: IntoIterator<Item = (S, S, f64)>,
        S: Into<String>,
    {
        let mut matrix = Self::default();
        for (from, to, hours) in rules {
            matrix.set_hours(from, to, hours);
        }
        matrix
    }

    /// Defines the changeover from `from` to `to`, adding unknown groups.
    pub fn set_hours(&mut self, from: impl Into<String>, to: impl Into<String>, hours: f64) {
        let i = self.ensure_group(from.into());
        let j = self.ensure_group(to.into());
        self.hours[i][j] = sanitize(hours);
    }

    /// Builder form of [`set_hours`](Self::set_hours).
    pub fn with_hours(mut self, from: impl Into<String>, to: impl Into<String>, hours: f64) -> Self {
        self.set_hours(from, to, hours);
        self
    }

    /// Dense index of a group ID (whitespace-trimmed).
    pub fn group_index(&self, group: &str) -> Option<usize> {
        self.index.get(group.trim()).copied()
    }

    /// Group ID at an index.
    pub fn group_id(&self, index: usize) -> Option<&str> {
        self.groups.get(index).map(String::as_str)
    }

    /// Changeover hours between two group indices; zero if either is unknown.
    #[inline]
    pub fn hours_between(&self, from: Option<usize>, to: Option<usize>) -> f64 {
        match (from, to) {
            (Some(i), Some(j)) => self
                .hours
                .get(i)
                .and_then(|row| row.get(j))
                .copied()
                .unwrap_or(0.0),
            _ => 0.0,
        }
    }

    /// Changeover hours between two group IDs; zero if either is unmapped.
    pub fn hours_for(&self, from: Option<&str>, to: Option<&str>) -> f64 {
        self.hours_between(
            from.and_then(|g| self.group_index(g)),
            to.and_then(|g| self.group_index(g)),
        )
    }

    /// Number of groups.
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// Whether the matrix has no groups.
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    fn ensure_group(&mut self, group: String) -> usize {
        let key = group.trim().to_string();
        if let Some(&i) = self.index.get(&key) {
            return i;
        }
        let i = self.groups.len();
        self.groups.push(key.clone());
        self.index.insert(key, i);
        for row in &mut self.hours {
            row.push(0.0);
        }
        self.hours.push(vec![0.0; i + 1]);
        i
    }
}

fn sanitize(hours: f64) -> f64 {
    if hours.is_finite() && hours > 0.0 {
        hours
    } else {
        0.0
    }
}
