//! Canned FAQ answers matched by fuzzy text similarity.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

use crate::error::{AppError, Result};

pub const DEFAULT_THRESHOLD: f64 = 0.45;

#[derive(Debug, Clone, Deserialize)]
pub struct FaqEntry {
    pub q: String,
    pub a: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FaqMatch {
    pub q: String,
    pub a: String,
    pub score: f64,
}

type Bigrams = HashMap<(char, char), usize>;

struct IndexedEntry {
    entry: FaqEntry,
    normalized: String,
    bigrams: Bigrams,
}

pub struct FaqIndex {
    entries: Vec<IndexedEntry>,
    threshold: f64,
}

impl FaqIndex {
    pub fn new(entries: Vec<FaqEntry>, threshold: f64) -> Self {
        let entries = entries
            .into_iter()
            .map(|entry| {
                let normalized = normalize(&entry.q);
                let bigrams = bigrams(&normalized);
                IndexedEntry {
                    entry,
                    normalized,
                    bigrams,
                }
            })
            .collect();
        Self { entries, threshold }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new(), DEFAULT_THRESHOLD)
    }

    /// Load a JSON array of `{"q": ..., "a": ...}` objects.
    pub fn load(path: impl AsRef<Path>, threshold: f64) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            AppError::Internal(format!("Failed to read FAQ file {}: {}", path.display(), e))
        })?;
        let entries: Vec<FaqEntry> = serde_json::from_str(&raw)?;
        tracing::info!("Loaded {} FAQ entries from {}", entries.len(), path.display());
        Ok(Self::new(entries, threshold))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Best entry scoring at least the threshold. Ties go to the earlier entry.
    pub fn lookup(&self, query: &str) -> Option<FaqMatch> {
        let normalized = normalize(query);
        if normalized.is_empty() {
            return None;
        }
        let query_bigrams = bigrams(&normalized);

        let mut best: Option<(&IndexedEntry, f64)> = None;
        for indexed in &self.entries {
            let score = dice(&normalized, &query_bigrams, &indexed.normalized, &indexed.bigrams);
            if best.is_none_or(|(_, best_score)| score > best_score) {
                best = Some((indexed, score));
            }
        }

        best.filter(|(_, score)| *score >= self.threshold)
            .map(|(indexed, score)| FaqMatch {
                q: indexed.entry.q.clone(),
                a: indexed.entry.a.clone(),
                score,
            })
    }
}

/// Lowercase, strip accents, turn punctuation into spaces and collapse runs
/// of whitespace.
fn normalize(text: &str) -> String {
    let folded: String = text
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn bigrams(text: &str) -> Bigrams {
    let chars: Vec<char> = text.chars().collect();
    let mut counts = Bigrams::new();
    for pair in chars.windows(2) {
        *counts.entry((pair[0], pair[1])).or_insert(0) += 1;
    }
    counts
}

/// Sørensen-Dice coefficient over bigram multisets.
fn dice(a_text: &str, a: &Bigrams, b_text: &str, b: &Bigrams) -> f64 {
    let total: usize = a.values().sum::<usize>() + b.values().sum::<usize>();
    if total == 0 {
        // Single characters have no bigrams.
        return if a_text == b_text { 1.0 } else { 0.0 };
    }
    let shared: usize = a
        .iter()
        .map(|(pair, n)| (*n).min(b.get(pair).copied().unwrap_or(0)))
        .sum();
    2.0 * shared as f64 / total as f64
}
