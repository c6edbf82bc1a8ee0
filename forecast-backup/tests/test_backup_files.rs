use chrono::{NaiveDate, TimeZone, Utc};
use forecast_backup::{read_backup, write_backup, BackupData, BackupError};
use forecast_core::{Ledger, LedgerData, NewTransaction, TransactionType, YearMonth};

fn ledger() -> Ledger {
    let mut ledger = Ledger::new(LedgerData {
        start_balance: 1000,
        ..Default::default()
    });
    let date = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
    ledger
        .add_transaction(NewTransaction::new("食費", 200, TransactionType::Expense, date))
        .unwrap();
    ledger.set_month_start_balance(YearMonth::new(2024, 2).unwrap(), Some(5000));
    ledger
}

/// Exporting on one device and importing on another reproduces every month's summary.
#[test]
fn test_backup_file_restores_projection() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("backup.json");
    let source = ledger();

    let now = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
    write_backup(&path, &BackupData::export(source.data(), now)).unwrap();

    let restored = Ledger::new(read_backup(&path).unwrap().into_ledger_data());
    let feb = YearMonth::new(2024, 2).unwrap();
    assert_eq!(restored.summary(feb), source.summary(feb));
    assert_eq!(restored.summary(feb).projected_balance, 5000);
}

#[test]
fn test_missing_backup_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = read_backup(dir.path().join("nope.json")).unwrap_err();
    assert!(matches!(err, BackupError::Io(_)));
}
