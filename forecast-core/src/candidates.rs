//! Description suggestions for new entries.

use std::collections::HashSet;

use crate::transaction::{Transaction, TransactionType};

/// Built-in vocabulary offered before any history exists.
pub const DEFAULT_CANDIDATES: [&str; 10] = [
    "食費",
    "日用品",
    "交通費",
    "家賃",
    "水道光熱費",
    "通信費",
    "娯楽費",
    "外食",
    "給与",
    "賞与",
];

/// Distinct descriptions: the default vocabulary, then `extra`, then history
/// in first-seen order. Blank descriptions are skipped.
pub fn history_candidates(transactions: &[Transaction], extra: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    DEFAULT_CANDIDATES
        .iter()
        .copied()
        .chain(extra.iter().map(String::as_str))
        .chain(transactions.iter().map(|t| t.description.as_str()))
        .filter(|d| !d.trim().is_empty())
        .filter(|d| seen.insert(*d))
        .map(str::to_string)
        .collect()
}

/// Amount and type of the last entry recorded with exactly this description.
pub fn suggest_from_history(transactions: &[Transaction], description: &str) -> Option<(i64, TransactionType)> {
    transactions
        .iter()
        .rev()
        .find(|t| t.description == description)
        .map(|t| (t.amount, t.kind))
}
