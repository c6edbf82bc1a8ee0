use std::fs;
use std::path::Path;

use tracing::info;

use crate::format::{BackupData, BackupError};

pub fn write_backup(path: impl AsRef<Path>, backup: &BackupData) -> Result<(), BackupError> {
    let path = path.as_ref();
    fs::write(path, backup.to_json())?;
    info!(path = %path.display(), transactions = backup.transactions.len(), "wrote backup");
    Ok(())
}

pub fn read_backup(path: impl AsRef<Path>) -> Result<BackupData, BackupError> {
    let text = fs::read_to_string(path)?;
    BackupData::parse(&text)
}
