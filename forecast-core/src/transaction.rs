//! Income/expense entries and the persisted ledger document.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::LedgerError;
use crate::month::YearMonth;

/// Whether an entry adds to or subtracts from the balance
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum TransactionType {
    #[serde(rename = "income")]
    Income,
    #[serde(rename = "expense")]
    Expense,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Income => "income",
            TransactionType::Expense => "expense",
        }
    }
}

impl std::str::FromStr for TransactionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "income" | "in" => Ok(TransactionType::Income),
            "expense" | "out" => Ok(TransactionType::Expense),
            other => Err(format!("unknown transaction type '{other}' (expected income|expense)")),
        }
    }
}

/// A dated income or expense entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Transaction {
    /// Unique identifier
    pub id: String,
    pub description: String,
    /// Whole currency units, never negative; direction comes from `kind`
    pub amount: i64,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    /// Calendar date (YYYY-MM-DD)
    pub date: NaiveDate,
}

impl Transaction {
    pub fn month(&self) -> YearMonth {
        YearMonth::of(self.date)
    }
}

/// An entry as typed by the user, before an id is assigned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTransaction {
    pub description: String,
    pub amount: i64,
    pub kind: TransactionType,
    pub date: NaiveDate,
}

impl NewTransaction {
    pub fn new(
        description: impl Into<String>,
        amount: i64,
        kind: TransactionType,
        date: NaiveDate,
    ) -> Self {
        Self {
            description: description.into(),
            amount,
            kind,
            date,
        }
    }

    pub fn validate(&self) -> Result<(), LedgerError> {
        validate_fields(&self.description, self.amount)
    }

    pub fn with_id(self, id: impl Into<String>) -> Transaction {
        Transaction {
            id: id.into(),
            description: self.description,
            amount: self.amount,
            kind: self.kind,
            date: self.date,
        }
    }
}

pub(crate) fn validate_fields(description: &str, amount: i64) -> Result<(), LedgerError> {
    if description.trim().is_empty() {
        return Err(LedgerError::EmptyDescription);
    }
    if amount < 0 {
        return Err(LedgerError::NegativeAmount(amount));
    }
    Ok(())
}

/// Sparse map of manually pinned start-of-month balances.
pub type MonthOverrides = BTreeMap<YearMonth, i64>;

/// Everything that is persisted for one user.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LedgerData {
    pub start_balance: i64,
    pub transactions: Vec<Transaction>,
    #[serde(default)]
    pub month_overrides: MonthOverrides,
}

impl LedgerData {
    /// Best-effort decode of a stored document.
    ///
    /// A non-numeric `startBalance` reads as 0, a non-array `transactions` as
    /// empty, and a missing `monthOverrides` as empty. Individual entries that
    /// fail to decode are an error.
    pub fn from_value_lenient(value: &serde_json::Value) -> Result<Self, serde_json::Error> {
        let start_balance = value
            .get("startBalance")
            .and_then(number_as_i64)
            .unwrap_or(0);
        let transactions = match value.get("transactions") {
            Some(v @ serde_json::Value::Array(_)) => Vec::<Transaction>::deserialize(v)?,
            _ => Vec::new(),
        };
        let month_overrides = match value.get("monthOverrides") {
            Some(v @ serde_json::Value::Object(_)) => MonthOverrides::deserialize(v)?,
            _ => MonthOverrides::new(),
        };
        Ok(Self {
            start_balance,
            transactions,
            month_overrides,
        })
    }
}

/// Integral JSON numbers, including `1500.0`, as `i64`.
pub fn number_as_i64(value: &serde_json::Value) -> Option<i64> {
    value.as_i64().or_else(|| {
        value
            .as_f64()
            .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
            .map(|f| f as i64)
    })
}
