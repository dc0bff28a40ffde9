//! Lot duration derivation.
//!
//! Resolves the stoppage components of a planned sequence from article
//! master data and the changeover matrix. Each lot is compared with its
//! predecessor only.
//!
//! # Rules
//!
//! | Component | Applies when | Duration |
//! |-----------|--------------|----------|
//! | Changeover | both change groups resolve | matrix hours |
//! | Quality change | no changeover, billet quality differs | 60 min |
//! | Stop change | no changeover or quality change, bar length differs | 10 min |
//! | Adjustment | changeover > 0 | article calibration hours |
//! | Production | pace > 0 | quantity / pace hours |
//!
//! The first lot of a sequence never gets a transition component.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::models::{ChangeoverMatrix, Lot, hours_to_secs, minutes_to_secs};

/// Quality change duration (s).
pub const QUALITY_CHANGE_SECS: i64 = 60 * 60;
/// Stop (length gauge) change duration (s).
pub const STOP_CHANGE_SECS: i64 = 10 * 60;

/// Article master record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Article {
    /// Product code.
    pub sku: String,
    /// Line pace (tons/hour).
    pub pace: f64,
    /// Change-group in the changeover matrix.
    pub change_group: Option<String>,
    /// Billet quality grade.
    pub billet_quality: Option<String>,
    /// Bar length label, e.g. `"12"` for 12 m bars.
    pub length: Option<String>,
    /// Hit-and-calibration time after a changeover (hours).
    pub calibration_hours: f64,
}

impl Article {
    /// Creates an article with the given pace.
    pub fn new(sku: impl Into<String>, pace: f64) -> Self {
        Self {
            sku: sku.into(),
            pace,
            ..Self::default()
        }
    }

    /// Sets the change-group.
    pub fn with_change_group(mut self, group: impl Into<String>) -> Self {
        self.change_group = Some(group.into());
        self
    }

    /// Sets the billet quality.
    pub fn with_billet_quality(mut self, quality: impl Into<String>) -> Self {
        self.billet_quality = Some(quality.into());
        self
    }

    /// Sets the bar length.
    pub fn with_length(mut self, length: impl Into<String>) -> Self {
        self.length = Some(length.into());
        self
    }

    /// Takes the bar length from a description such as `"REBAR 12MM X 9M"`.
    pub fn with_length_from_description(mut self, description: &str) -> Self {
        self.length = length_from_description(description);
        self
    }

    /// Sets the calibration time (hours).
    pub fn with_calibration_hours(mut self, hours: f64) -> Self {
        self.calibration_hours = hours;
        self
    }
}

/// A lot as planned, before derivation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannedLot {
    /// Lot ID.
    pub lot_id: String,
    /// Product code (article lookup key).
    pub sku: String,
    /// Quantity (tons).
    pub quantity: f64,
    /// Named manual stoppages (minutes).
    #[serde(default)]
    pub stoppages: BTreeMap<String, f64>,
}

impl PlannedLot {
    /// Creates a planned lot.
    pub fn new(lot_id: impl Into<String>, sku: impl Into<String>, quantity: f64) -> Self {
        Self {
            lot_id: lot_id.into(),
            sku: sku.into(),
            quantity,
            stoppages: BTreeMap::new(),
        }
    }

    /// Adds a manual stoppage (minutes).
    pub fn with_stoppage(mut self, name: impl Into<String>, minutes: f64) -> Self {
        self.stoppages.insert(name.into(), minutes);
        self
    }
}

/// Derives [`Lot`]s for a planned sequence.
#[derive(Debug, Clone, Default)]
pub struct LotDeriver {
    articles: HashMap<String, Article>,
    matrix: ChangeoverMatrix,
}

impl LotDeriver {
    /// Creates a deriver over an article catalogue and changeover matrix.
    pub fn new(articles: impl IntoIterator<Item = Article>, matrix: ChangeoverMatrix) -> Self {
        Self {
            articles: articles
                .into_iter()
                .map(|a| (a.sku.trim().to_string(), a))
                .collect(),
            matrix,
        }
    }

    /// Looks up an article by SKU.
    pub fn article(&self, sku: &str) -> Option<&Article> {
        self.articles.get(sku.trim())
    }

    /// Resolves every lot of `planned`, in order.
    ///
    /// Unknown SKUs yield lots with zero pace and no transitions.
    pub fn derive(&self, planned: &[PlannedLot]) -> Vec<Lot> {
        let mut lots = Vec::with_capacity(planned.len());
        let mut prev: Option<&Article> = None;

        for item in planned {
            let article = self.article(&item.sku);
            if article.is_none() {
                warn!(lot = %item.lot_id, sku = %item.sku, "unknown article; lot has no pace");
            }

            let mut lot = Lot::new(&item.lot_id, &item.sku).with_quantity(item.quantity);
            if let Some(a) = article {
                lot.pace = a.pace;
                lot.change_group = a.change_group.clone();
            }
            for (name, minutes) in &item.stoppages {
                lot.stoppages.insert(name.clone(), minutes_to_secs(*minutes));
            }

            if let (Some(from), Some(to)) = (prev, article) {
                self.apply_transition(&mut lot, from, to);
            }

            prev = article;
            lots.push(lot);
        }
        lots
    }

    fn apply_transition(&self, lot: &mut Lot, from: &Article, to: &Article) {
        let hours = match (&from.change_group, &to.change_group) {
            (Some(a), Some(b)) => self.matrix.hours_for(Some(a), Some(b)),
            _ => 0.0,
        };
        lot.changeover_secs = hours_to_secs(hours);

        if lot.changeover_secs > 0 {
            lot.adjustment_secs = hours_to_secs(to.calibration_hours);
            return;
        }

        if differs(&from.billet_quality, &to.billet_quality) {
            lot.quality_change_secs = QUALITY_CHANGE_SECS;
        } else if differs(&from.length, &to.length) {
            lot.stop_change_secs = STOP_CHANGE_SECS;
        }
    }
}

/// Both values present, non-empty and different after trimming.
fn differs(a: &Option<String>, b: &Option<String>) -> bool {
    match (a.as_deref().map(str::trim), b.as_deref().map(str::trim)) {
        (Some(a), Some(b)) => !a.is_empty() && !b.is_empty() && a != b,
        _ => false,
    }
}

/// Extracts the bar length from a description of the form `... X 12M ...`.
///
/// Matching is case-insensitive; the number may carry a decimal part.
pub fn length_from_description(description: &str) -> Option<String> {
    let upper = description.to_ascii_uppercase();
    let bytes = upper.as_bytes();

    for (i, _) in upper.match_indices('X') {
        let mut j = i + 1;
        while j < bytes.len() && bytes[j] == b' ' {
            j += 1;
        }
        let num_start = j;
        while j < bytes.len() && (bytes[j].is_ascii_digit() || bytes[j] == b'.') {
            j += 1;
        }
        if j == num_start || !bytes[num_start].is_ascii_digit() {
            continue;
        }
        let number = &upper[num_start..j];
        let mut k = j;
        if k < bytes.len() && bytes[k] == b' ' {
            k += 1;
        }
        if k < bytes.len() && bytes[k] == b'M' {
            return Some(number.trim_end_matches('.').to_string());
        }
    }
    None
}
