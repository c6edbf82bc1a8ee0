use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use forecast_core::{LedgerData, SyncStatus};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// `$FORECAST_HOME`, or `~/.forecast`.
pub fn forecast_home() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var("FORECAST_HOME") {
        if !dir.trim().is_empty() {
            return Ok(PathBuf::from(dir));
        }
    }
    let home = std::env::var("HOME").context("HOME is not set")?;
    Ok(PathBuf::from(home).join(".forecast"))
}

pub fn ensure_forecast_home() -> Result<PathBuf> {
    let dir = forecast_home()?;
    fs::create_dir_all(&dir).with_context(|| format!("create {}", dir.display()))?;
    Ok(dir)
}

pub fn ledger_path() -> Result<PathBuf> {
    Ok(ensure_forecast_home()?.join("ledger.json"))
}

pub fn sync_record_path() -> Result<PathBuf> {
    Ok(ensure_forecast_home()?.join("sync.json"))
}

/// Write via a sibling temp file so readers never see a partial file.
pub fn write_file(path: &Path, contents: &str) -> Result<()> {
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, contents).with_context(|| format!("write {}", tmp.display()))?;
    fs::rename(&tmp, path).with_context(|| format!("replace {}", path.display()))?;
    Ok(())
}

/// `None` when the file does not exist.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }
    let s = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let value = serde_json::from_str(&s).with_context(|| format!("parse {}", path.display()))?;
    Ok(Some(value))
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    write_file(path, &serde_json::to_string_pretty(value)?)
}

/// The local copy of the ledger; empty when nothing has been saved yet.
pub fn read_ledger(path: &Path) -> Result<LedgerData> {
    let Some(value) = read_json::<serde_json::Value>(path)? else {
        return Ok(LedgerData::default());
    };
    let data = LedgerData::from_value_lenient(&value)
        .with_context(|| format!("decode ledger in {}", path.display()))?;
    debug!(path = %path.display(), transactions = data.transactions.len(), "loaded ledger");
    Ok(data)
}

pub fn write_ledger(path: &Path, data: &LedgerData) -> Result<()> {
    write_json(path, data)?;
    debug!(path = %path.display(), "saved ledger");
    Ok(())
}

/// Outcome of the most recent sync attempt, shown by `forecast sync status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncRecord {
    pub status: SyncStatus,
    pub at_utc: DateTime<Utc>,
}

pub fn read_sync_record(path: &Path) -> Result<Option<SyncRecord>> {
    read_json(path)
}

pub fn write_sync_record(path: &Path, record: &SyncRecord) -> Result<()> {
    write_json(path, record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_missing_ledger_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let data = read_ledger(&dir.path().join("ledger.json")).unwrap();
        assert_eq!(data, LedgerData::default());
    }

    #[test]
    fn test_ledger_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.json");
        let data = LedgerData {
            start_balance: 1234,
            ..Default::default()
        };
        write_ledger(&path, &data).unwrap();
        assert_eq!(read_ledger(&path).unwrap(), data);
    }

    #[test]
    fn test_sync_record_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sync.json");
        assert!(read_sync_record(&path).unwrap().is_none());

        let record = SyncRecord {
            status: SyncStatus::Error("permission denied".to_string()),
            at_utc: Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap(),
        };
        write_sync_record(&path, &record).unwrap();
        let back = read_sync_record(&path).unwrap().unwrap();
        assert_eq!(back.status, record.status);
        assert_eq!(back.at_utc, record.at_utc);
    }

    #[test]
    fn test_write_file_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("auth.json");
        write_file(&path, "{}").unwrap();
        write_file(&path, "{\"a\":1}").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "{\"a\":1}");
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}
