//! Directory-backed document store: one JSON document per user.
//!
//! Pointing `store_dir` at a shared or mounted folder lets several machines
//! sync through it. Saves merge into the existing document, so keys written
//! by other clients survive.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, SystemTime};

use chrono::{SecondsFormat, Utc};
use forecast_core::{DocumentStore, LedgerData, StoreError, Subscription, UserId};
use serde_json::{Map, Value};
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct FileDocumentStore {
    dir: PathBuf,
    poll: Duration,
}

impl FileDocumentStore {
    pub fn new(dir: impl Into<PathBuf>, poll: Duration) -> Self {
        Self { dir: dir.into(), poll }
    }

    pub fn document_path(&self, user: &UserId) -> PathBuf {
        self.dir.join(format!("{}.json", file_stem(user)))
    }
}

/// Ids are used as file names. ASCII letters, digits and `-` are kept; every
/// other byte becomes `_` plus two hex digits, so distinct ids never share a
/// file.
fn file_stem(user: &UserId) -> String {
    let mut stem = String::with_capacity(user.as_str().len());
    for b in user.as_str().bytes() {
        if b.is_ascii_alphanumeric() || b == b'-' {
            stem.push(char::from(b));
        } else {
            stem.push_str(&format!("_{b:02x}"));
        }
    }
    if stem.is_empty() { "_".to_string() } else { stem }
}

fn io_error(user: &UserId, err: std::io::Error) -> StoreError {
    match err.kind() {
        ErrorKind::PermissionDenied => StoreError::PermissionDenied(user.to_string()),
        _ => StoreError::Io(err),
    }
}

fn read_document(path: &Path, user: &UserId) -> Result<Option<Value>, StoreError> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(io_error(user, e)),
    };
    serde_json::from_str(&text)
        .map(Some)
        .map_err(|e| StoreError::Malformed {
            user: user.to_string(),
            reason: e.to_string(),
        })
}

fn decode(value: &Value, user: &UserId) -> Result<LedgerData, StoreError> {
    LedgerData::from_value_lenient(value).map_err(|e| StoreError::Malformed {
        user: user.to_string(),
        reason: e.to_string(),
    })
}

fn modified(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}

impl DocumentStore for FileDocumentStore {
    fn fetch(&self, user: &UserId) -> Result<Option<LedgerData>, StoreError> {
        match read_document(&self.document_path(user), user)? {
            Some(value) => decode(&value, user).map(Some),
            None => Ok(None),
        }
    }

    fn save(&self, user: &UserId, data: &LedgerData) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dir).map_err(|e| io_error(user, e))?;
        let path = self.document_path(user);

        let mut doc = match read_document(&path, user) {
            Ok(Some(Value::Object(map))) => map,
            Ok(_) => Map::new(),
            Err(StoreError::Malformed { reason, .. }) => {
                warn!(user = %user, %reason, "overwriting unreadable document");
                Map::new()
            }
            Err(e) => return Err(e),
        };
        let fields = serde_json::to_value(data).map_err(|e| StoreError::Malformed {
            user: user.to_string(),
            reason: e.to_string(),
        })?;
        if let Value::Object(fields) = fields {
            doc.extend(fields);
        }
        doc.insert(
            "updatedAt".to_string(),
            Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)),
        );

        let json = serde_json::to_string_pretty(&Value::Object(doc)).map_err(|e| StoreError::Malformed {
            user: user.to_string(),
            reason: e.to_string(),
        })?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(|e| io_error(user, e))?;
        fs::rename(&tmp, &path).map_err(|e| io_error(user, e))?;
        debug!(user = %user, path = %path.display(), "saved document");
        Ok(())
    }

    /// Polls the document's mtime on a background thread. The current
    /// document is sent first, then again on every change. The thread exits
    /// within one poll interval of the subscription being dropped.
    fn subscribe(&self, user: &UserId) -> Result<Subscription, StoreError> {
        let (tx, rx) = Subscription::channel();
        let path = self.document_path(user);
        let user = user.clone();
        let poll = self.poll;

        let mut last_seen = modified(&path);
        tx.send(self.fetch(&user)?);

        thread::Builder::new()
            .name(format!("forecast-watch-{}", file_stem(&user)))
            .spawn(move || loop {
                thread::sleep(poll);
                if tx.is_closed() {
                    debug!(user = %user, "subscription dropped");
                    break;
                }
                let now = modified(&path);
                if now == last_seen {
                    continue;
                }
                last_seen = now;
                let snapshot = match read_document(&path, &user) {
                    Ok(Some(value)) => match decode(&value, &user) {
                        Ok(data) => Some(data),
                        Err(e) => {
                            warn!(error = %e, "skipping undecodable snapshot");
                            continue;
                        }
                    },
                    Ok(None) => None,
                    Err(e) => {
                        warn!(error = %e, "skipping unreadable snapshot");
                        continue;
                    }
                };
                if !tx.send(snapshot) {
                    break;
                }
            })?;
        Ok(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use forecast_core::{NewTransaction, TransactionType};

    fn store(dir: &Path) -> FileDocumentStore {
        FileDocumentStore::new(dir, Duration::from_millis(20))
    }

    fn sample() -> LedgerData {
        let date = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();
        LedgerData {
            start_balance: 10_000,
            transactions: vec![NewTransaction::new("給与", 3000, TransactionType::Income, date).with_id("t1")],
            ..Default::default()
        }
    }

    #[test]
    fn test_fetch_missing_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(store(dir.path()).fetch(&UserId::new("u1")).unwrap().is_none());
    }

    #[test]
    fn test_save_then_fetch() {
        let dir = tempfile::tempdir().unwrap();
        let s = store(dir.path());
        let user = UserId::new("u1");
        s.save(&user, &sample()).unwrap();
        assert_eq!(s.fetch(&user).unwrap(), Some(sample()));
    }

    #[test]
    fn test_save_keeps_foreign_keys_and_stamps_time() {
        let dir = tempfile::tempdir().unwrap();
        let s = store(dir.path());
        let user = UserId::new("u1");
        fs::write(s.document_path(&user), r#"{"theme":"dark","startBalance":1}"#).unwrap();

        s.save(&user, &sample()).unwrap();

        let raw: Value = serde_json::from_str(&fs::read_to_string(s.document_path(&user)).unwrap()).unwrap();
        assert_eq!(raw["theme"], "dark");
        assert_eq!(raw["startBalance"], 10_000);
        assert!(raw["updatedAt"].is_string());
    }

    #[test]
    fn test_lenient_fetch() {
        let dir = tempfile::tempdir().unwrap();
        let s = store(dir.path());
        let user = UserId::new("u1");
        fs::write(s.document_path(&user), r#"{"startBalance":"abc","transactions":null}"#).unwrap();
        assert_eq!(s.fetch(&user).unwrap(), Some(LedgerData::default()));
    }

    #[test]
    fn test_malformed_json_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let s = store(dir.path());
        let user = UserId::new("u1");
        fs::write(s.document_path(&user), "{not json").unwrap();
        assert!(matches!(s.fetch(&user), Err(StoreError::Malformed { .. })));
    }

    #[test]
    fn test_user_ids_are_escaped() {
        let s = store(Path::new("/tmp/docs"));
        assert_eq!(s.document_path(&UserId::new("../a b")), Path::new("/tmp/docs/_2e_2e_2fa_20b.json"));
        assert_eq!(s.document_path(&UserId::new("user-42")), Path::new("/tmp/docs/user-42.json"));
    }

    #[test]
    fn test_ids_differing_in_punctuation_get_separate_documents() {
        let s = store(Path::new("/tmp/docs"));
        let ids = ["alice.smith", "alice_smith", "alice smith", "alice_2esmith", "", "_"];
        let paths: std::collections::HashSet<PathBuf> =
            ids.iter().map(|id| s.document_path(&UserId::new(*id))).collect();
        assert_eq!(paths.len(), ids.len());
    }

    #[test]
    fn test_punctuated_ids_do_not_share_data() {
        let dir = tempfile::tempdir().unwrap();
        let s = store(dir.path());
        let dotted = UserId::new("alice.smith");
        s.save(&dotted, &sample()).unwrap();
        assert!(s.fetch(&UserId::new("alice_smith")).unwrap().is_none());
        assert_eq!(s.fetch(&dotted).unwrap(), Some(sample()));
    }

    #[test]
    fn test_subscribe_sends_current_then_changes() {
        let dir = tempfile::tempdir().unwrap();
        let s = store(dir.path());
        let user = UserId::new("u1");
        let rx = s.subscribe(&user).unwrap();
        assert_eq!(rx.recv_timeout(Duration::from_secs(1)).unwrap(), None);

        // Some filesystems only record whole-second mtimes.
        thread::sleep(Duration::from_millis(1100));
        s.save(&user, &sample()).unwrap();
        let next = rx.recv_timeout(Duration::from_secs(3)).unwrap();
        assert_eq!(next, Some(sample()));
    }
}
