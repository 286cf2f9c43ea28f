use std::collections::HashMap;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Seller-internal product code used as the join key between the sales
/// export and the lookup workbook.
pub type Article = String;

/// Identifier required by the accounting system, obtained via the lookup.
pub type CanonicalId = String;

/// A single accepted row of the sales export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SalesRecord {
    pub article: Article,
    pub quantity: u64,
}

/// A sales export row that was skipped instead of aborting the load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedRow {
    /// 1-based line number in the source file.
    pub line: u64,
    pub reason: String,
}

/// Quantities summed per article, in order of first appearance.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AggregatedSales {
    totals: IndexMap<Article, u64>,
    accepted_rows: usize,
    skipped: Vec<SkippedRow>,
}

impl AggregatedSales {
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds one record into the aggregate.
    pub fn add(&mut self, record: SalesRecord) {
        let total = self.totals.entry(record.article).or_insert(0);
        *total = total.saturating_add(record.quantity);
        self.accepted_rows += 1;
    }

    pub fn record_skipped(&mut self, line: u64, reason: impl Into<String>) {
        self.skipped.push(SkippedRow {
            line,
            reason: reason.into(),
        });
    }

    /// Returns the summed quantity for an article.
    pub fn quantity(&self, article: &str) -> Option<u64> {
        self.totals.get(article).copied()
    }

    /// Iterates `(article, quantity)` pairs in order of first appearance.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> + '_ {
        self.totals
            .iter()
            .map(|(article, quantity)| (article.as_str(), *quantity))
    }

    /// Number of distinct articles.
    pub fn len(&self) -> usize {
        self.totals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.totals.is_empty()
    }

    /// Number of raw rows that contributed to the totals.
    pub fn accepted_rows(&self) -> usize {
        self.accepted_rows
    }

    pub fn skipped(&self) -> &[SkippedRow] {
        &self.skipped
    }

    pub fn total_quantity(&self) -> u64 {
        self.totals
            .values()
            .fold(0u64, |sum, quantity| sum.saturating_add(*quantity))
    }
}

impl FromIterator<SalesRecord> for AggregatedSales {
    fn from_iter<I: IntoIterator<Item = SalesRecord>>(iter: I) -> Self {
        let mut sales = AggregatedSales::new();
        for record in iter {
            sales.add(record);
        }
        sales
    }
}

/// One row of the lookup workbook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupEntry {
    pub article: Article,
    pub canonical_id: CanonicalId,
}

/// A lookup row whose article had already been seen; the earlier entry wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateArticle {
    pub article: Article,
    pub kept: CanonicalId,
    pub ignored: CanonicalId,
}

/// Read-only article → canonical id mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LookupTable {
    entries: HashMap<Article, CanonicalId>,
    duplicates: Vec<DuplicateArticle>,
    blank_rows: usize,
}

impl LookupTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts an entry unless its article is already present. Returns
    /// `false` when the entry was ignored as a duplicate.
    pub fn insert(&mut self, entry: LookupEntry) -> bool {
        match self.entries.get(&entry.article) {
            Some(kept) => {
                if *kept != entry.canonical_id {
                    self.duplicates.push(DuplicateArticle {
                        article: entry.article,
                        kept: kept.clone(),
                        ignored: entry.canonical_id,
                    });
                }
                false
            }
            None => {
                self.entries.insert(entry.article, entry.canonical_id);
                true
            }
        }
    }

    pub(crate) fn record_blank_row(&mut self) {
        self.blank_rows += 1;
    }

    pub fn get(&self, article: &str) -> Option<&str> {
        self.entries.get(article).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Conflicting duplicates, in the order they were encountered.
    pub fn duplicates(&self) -> &[DuplicateArticle] {
        &self.duplicates
    }

    pub fn blank_rows(&self) -> usize {
        self.blank_rows
    }
}

impl FromIterator<LookupEntry> for LookupTable {
    fn from_iter<I: IntoIterator<Item = LookupEntry>>(iter: I) -> Self {
        let mut table = LookupTable::new();
        for entry in iter {
            table.insert(entry);
        }
        table
    }
}

/// Result of joining one aggregated article against the lookup table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedRecord {
    pub article: Article,
    pub canonical_id: Option<CanonicalId>,
    pub quantity: u64,
}

/// Row written into the template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputRow {
    pub canonical_id: CanonicalId,
    pub quantity: u64,
}

/// Order in which resolved records, and therefore output rows, are emitted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RowOrder {
    /// Order of first appearance in the sales export.
    #[default]
    FirstAppearance,
    /// Sorted by article code, as the grouped legacy export did.
    Article,
}

/// Output of the resolver: one record per aggregated article, plus the
/// articles that had no canonical id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    pub records: Vec<ResolvedRecord>,
    pub unmatched_articles: Vec<Article>,
}

impl Resolution {
    /// The matched subset, in record order.
    pub fn output_rows(&self) -> Vec<OutputRow> {
        self.records
            .iter()
            .filter_map(|record| {
                record.canonical_id.as_ref().map(|canonical_id| OutputRow {
                    canonical_id: canonical_id.clone(),
                    quantity: record.quantity,
                })
            })
            .collect()
    }

    pub fn matched_count(&self) -> usize {
        self.records.len() - self.unmatched_articles.len()
    }
}
