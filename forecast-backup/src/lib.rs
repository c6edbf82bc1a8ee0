//! forecast-backup: portable JSON backups for moving a ledger between devices.

pub mod file;
pub mod format;

pub use file::{read_backup, write_backup};
pub use format::{BackupData, BackupError, BACKUP_VERSION};
