//! Backup document: the ledger plus a format version and export timestamp.
//!
//! ```text
//! {"startBalance":1000,"transactions":[...],"monthOverrides":{"2024-02":5000},
//!  "version":2,"exportedAt":"2024-03-01T09:30:00Z"}
//! ```

use chrono::{DateTime, Utc};
use forecast_core::transaction::number_as_i64;
use forecast_core::{LedgerData, MonthOverrides, Transaction};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

/// Version written by [`BackupData::export`].
pub const BACKUP_VERSION: u32 = 2;

#[derive(Debug, Error)]
pub enum BackupError {
    #[error("no backup data was provided")]
    Empty,

    #[error("backup is not valid JSON: {0}")]
    Parse(#[source] serde_json::Error),

    #[error("backup has the wrong shape: {0}")]
    Shape(&'static str),

    #[error("backup contains an invalid {field}: {source}")]
    Entry {
        field: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("backup I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupData {
    pub start_balance: i64,
    pub transactions: Vec<Transaction>,
    #[serde(default)]
    pub month_overrides: MonthOverrides,
    #[serde(default)]
    pub version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exported_at: Option<DateTime<Utc>>,
}

impl BackupData {
    pub fn export(data: &LedgerData, now: DateTime<Utc>) -> Self {
        Self {
            start_balance: data.start_balance,
            transactions: data.transactions.clone(),
            month_overrides: data.month_overrides.clone(),
            version: BACKUP_VERSION,
            exported_at: Some(now),
        }
    }

    /// Compact single-line JSON, suitable for copy and paste.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| String::from("{}"))
    }

    /// Validate and decode pasted backup text.
    ///
    /// Only `startBalance` (a number) and `transactions` (an array) are
    /// required. A missing `monthOverrides` restores as empty, any `version`
    /// is accepted, and unrecognised keys are ignored.
    pub fn parse(input: &str) -> Result<Self, BackupError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(BackupError::Empty);
        }
        let value: Value = serde_json::from_str(input).map_err(BackupError::Parse)?;
        if !value.is_object() {
            return Err(BackupError::Shape("expected a JSON object"));
        }

        let start_balance = match value.get("startBalance") {
            Some(v) if v.is_number() => number_as_i64(v).ok_or(BackupError::Shape("startBalance must be a whole number"))?,
            _ => return Err(BackupError::Shape("startBalance must be a number")),
        };
        let transactions = match value.get("transactions") {
            Some(v @ Value::Array(_)) => Vec::<Transaction>::deserialize(v)
                .map_err(|source| BackupError::Entry { field: "transaction", source })?,
            _ => return Err(BackupError::Shape("transactions must be an array")),
        };
        let month_overrides = match value.get("monthOverrides") {
            None | Some(Value::Null) => MonthOverrides::new(),
            Some(v) => MonthOverrides::deserialize(v)
                .map_err(|source| BackupError::Entry { field: "month override", source })?,
        };
        let version = value
            .get("version")
            .and_then(Value::as_u64)
            .map(|v| v as u32)
            .unwrap_or(0);
        let exported_at = value
            .get("exportedAt")
            .and_then(Value::as_str)
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc));

        debug!(version, transactions = transactions.len(), "parsed backup");
        Ok(Self {
            start_balance,
            transactions,
            month_overrides,
            version,
            exported_at,
        })
    }

    pub fn into_ledger_data(self) -> LedgerData {
        LedgerData {
            start_balance: self.start_balance,
            transactions: self.transactions,
            month_overrides: self.month_overrides,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone};
    use forecast_core::{NewTransaction, TransactionType, YearMonth};
    use serde_json::json;

    fn sample() -> LedgerData {
        let date = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        let mut data = LedgerData {
            start_balance: 1000,
            transactions: vec![NewTransaction::new("食費", 200, TransactionType::Expense, date).with_id("t1")],
            ..Default::default()
        };
        data.month_overrides.insert(YearMonth::new(2024, 2).unwrap(), 5000);
        data
    }

    #[test]
    fn test_export_shape() {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap();
        let backup = BackupData::export(&sample(), now);
        let v: Value = serde_json::from_str(&backup.to_json()).unwrap();
        assert_eq!(v["version"], json!(2));
        assert_eq!(v["startBalance"], json!(1000));
        assert_eq!(v["monthOverrides"], json!({"2024-02": 5000}));
        assert_eq!(v["transactions"][0]["type"], json!("expense"));
        assert!(v["exportedAt"].as_str().unwrap().starts_with("2024-03-01T09:30:00"));
    }

    #[test]
    fn test_parse_export_restores_ledger() {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap();
        let text = BackupData::export(&sample(), now).to_json();
        let parsed = BackupData::parse(&text).unwrap();
        assert_eq!(parsed.exported_at, Some(now));
        assert_eq!(parsed.into_ledger_data(), sample());
    }

    #[test]
    fn test_parse_rejects_empty_and_garbage() {
        assert!(matches!(BackupData::parse("   "), Err(BackupError::Empty)));
        assert!(matches!(BackupData::parse("{not json"), Err(BackupError::Parse(_))));
        assert!(matches!(BackupData::parse("[1,2]"), Err(BackupError::Shape(_))));
    }

    #[test]
    fn test_parse_requires_balance_and_transactions() {
        let missing_balance = r#"{"transactions": []}"#;
        assert!(matches!(BackupData::parse(missing_balance), Err(BackupError::Shape(_))));

        let string_balance = r#"{"startBalance": "100", "transactions": []}"#;
        assert!(matches!(BackupData::parse(string_balance), Err(BackupError::Shape(_))));

        let object_txs = r#"{"startBalance": 100, "transactions": {}}"#;
        assert!(matches!(BackupData::parse(object_txs), Err(BackupError::Shape(_))));
    }

    #[test]
    fn test_parse_accepts_legacy_backup() {
        // Version 1 backups had no overrides and could carry store settings.
        let text = r#"{
            "startBalance": 300,
            "transactions": [],
            "version": 1,
            "exportedAt": "2023-12-31T23:59:59.000Z",
            "firebaseConfig": {"apiKey": "x"}
        }"#;
        let parsed = BackupData::parse(text).unwrap();
        assert_eq!(parsed.version, 1);
        assert!(parsed.month_overrides.is_empty());
        assert_eq!(parsed.start_balance, 300);
        assert!(parsed.exported_at.is_some());
    }

    #[test]
    fn test_parse_reports_bad_entry() {
        let text = r#"{"startBalance": 1, "transactions": [{"id": "x", "amount": 5}]}"#;
        assert!(matches!(
            BackupData::parse(text),
            Err(BackupError::Entry { field: "transaction", .. })
        ));
    }
}
