//! Drives the sync state machine against a document store.

use std::path::{Path, PathBuf};
use std::sync::mpsc::TryRecvError;
use std::time::{Duration, SystemTime};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use forecast_core::{
    DocumentStore, IdentityProvider, LedgerData, StoreError, Subscription, SyncAction, SyncEvent, SyncMachine,
    SyncPolicy, SyncStatus, UserId,
};
use tracing::{info, warn};

use crate::state::{read_ledger, write_ledger, write_sync_record, SyncRecord};

pub struct SyncCoordinator<S> {
    store: S,
    user: UserId,
    machine: SyncMachine,
}

impl<S: DocumentStore> SyncCoordinator<S> {
    pub fn new(store: S, identity: &impl IdentityProvider, policy: SyncPolicy) -> Result<Self> {
        let user = identity
            .current_user()
            .context("sync needs a user; set [sync] user_id in config.toml")?;
        Ok(Self {
            store,
            user,
            machine: SyncMachine::new(policy),
        })
    }

    pub fn user(&self) -> &UserId {
        &self.user
    }

    pub fn status(&self) -> &SyncStatus {
        self.machine.status()
    }

    /// Read the remote document. The first successful fetch opens the gate
    /// for saves; until then `push` and the debounce never write.
    pub fn fetch_remote(&mut self) -> Result<Option<LedgerData>, StoreError> {
        let remote = self.store.fetch(&self.user)?;
        self.machine.handle(SyncEvent::Connected);
        Ok(remote)
    }

    /// First fetch after sign-in.
    ///
    /// An existing remote document wins and is returned for the caller to
    /// apply locally. Otherwise the local data seeds the remote document.
    pub fn connect(&mut self, local: &LedgerData, now: DateTime<Utc>) -> Result<Option<LedgerData>, StoreError> {
        match self.fetch_remote()? {
            Some(remote) => {
                info!(user = %self.user, transactions = remote.transactions.len(), "adopting remote document");
                self.machine.handle(SyncEvent::RemoteSnapshot { at: now });
                Ok(Some(remote))
            }
            None => {
                info!(user = %self.user, "seeding remote document from local data");
                self.push(local, now);
                Ok(None)
            }
        }
    }

    /// The data a local edit should start from: the remote document when
    /// there is one, else `local`. Opens the save gate like `connect`, but
    /// the caller's follow-up edit is never treated as an echo.
    pub fn base_for_edit(&mut self, local: LedgerData) -> Result<LedgerData, StoreError> {
        Ok(self.fetch_remote()?.unwrap_or(local))
    }

    /// Save right away instead of waiting for the debounce. Does nothing
    /// before the first fetch.
    pub fn push(&mut self, local: &LedgerData, now: DateTime<Utc>) -> &SyncStatus {
        if !self.machine.is_connected() {
            warn!(user = %self.user, "not pushing before the remote document has been fetched");
            return self.machine.status();
        }
        self.machine.handle(SyncEvent::LocalChange { at: now });
        if self.machine.handle(SyncEvent::Flush) == SyncAction::Save {
            self.save(local);
        }
        self.machine.status()
    }

    pub fn pull(&mut self, now: DateTime<Utc>) -> Result<Option<LedgerData>, StoreError> {
        let remote = self.fetch_remote()?;
        if remote.is_some() {
            self.remote_applied(now);
        }
        Ok(remote)
    }

    pub fn local_changed(&mut self, at: DateTime<Utc>) {
        self.machine.handle(SyncEvent::LocalChange { at });
    }

    pub fn remote_applied(&mut self, at: DateTime<Utc>) {
        self.machine.handle(SyncEvent::RemoteSnapshot { at });
    }

    pub fn tick(&mut self, now: DateTime<Utc>) -> SyncAction {
        self.machine.handle(SyncEvent::Tick { now })
    }

    pub fn flush(&mut self) -> SyncAction {
        self.machine.handle(SyncEvent::Flush)
    }

    /// Write `data` and feed the outcome back into the machine.
    fn save(&mut self, data: &LedgerData) {
        let event = match self.store.save(&self.user, data) {
            Ok(()) => SyncEvent::SaveSucceeded,
            Err(e) => SyncEvent::SaveFailed { message: e.to_string() },
        };
        self.machine.handle(event);
    }

    pub fn subscribe(&self) -> Result<Subscription, StoreError> {
        self.store.subscribe(&self.user)
    }
}

pub fn record_status(path: &Path, status: &SyncStatus) -> Result<()> {
    write_sync_record(
        path,
        &SyncRecord {
            status: status.clone(),
            at_utc: Utc::now(),
        },
    )
}

fn modified(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}

/// Pairs the local ledger file with a store subscription.
pub struct LocalWatch {
    ledger_path: PathBuf,
    last_modified: Option<SystemTime>,
    remote: Subscription,
}

impl LocalWatch {
    pub fn new(ledger_path: impl Into<PathBuf>, remote: Subscription) -> Self {
        let ledger_path = ledger_path.into();
        let last_modified = modified(&ledger_path);
        Self {
            ledger_path,
            last_modified,
            remote,
        }
    }

    /// One pass: apply remote snapshots, notice local edits, save when due.
    pub fn poll_once<S: DocumentStore>(&mut self, sync: &mut SyncCoordinator<S>, now: DateTime<Utc>) -> Result<()> {
        loop {
            match self.remote.try_recv() {
                Ok(Some(remote)) => self.apply_remote(sync, remote, now)?,
                Ok(None) => {}
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    warn!("store subscription closed");
                    break;
                }
            }
        }

        let current = modified(&self.ledger_path);
        if current != self.last_modified {
            self.last_modified = current;
            sync.local_changed(now);
        }

        if sync.tick(now) == SyncAction::Save {
            let local = read_ledger(&self.ledger_path)?;
            sync.save(&local);
        }
        Ok(())
    }

    fn apply_remote<S: DocumentStore>(
        &mut self,
        sync: &mut SyncCoordinator<S>,
        remote: LedgerData,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let local = read_ledger(&self.ledger_path)?;
        if local == remote {
            return Ok(());
        }
        sync.remote_applied(now);
        write_ledger(&self.ledger_path, &remote)?;
        self.last_modified = modified(&self.ledger_path);
        info!(transactions = remote.transactions.len(), "applied remote changes");
        Ok(())
    }

    /// Save any outstanding edit before exiting.
    pub fn flush<S: DocumentStore>(&mut self, sync: &mut SyncCoordinator<S>) -> Result<()> {
        if modified(&self.ledger_path) != self.last_modified {
            sync.local_changed(Utc::now());
        }
        if sync.flush() == SyncAction::Save {
            let local = read_ledger(&self.ledger_path)?;
            sync.save(&local);
        }
        Ok(())
    }
}

/// Run until Ctrl-C, keeping the local ledger and the store in step.
pub async fn watch<S: DocumentStore>(
    mut sync: SyncCoordinator<S>,
    ledger_path: &Path,
    record_path: &Path,
    poll: Duration,
) -> Result<()> {
    let mut local = LocalWatch::new(ledger_path, sync.subscribe()?);
    let mut ticker = tokio::time::interval(poll);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    let mut shown = sync.status().clone();
    eprintln!("Watching {} for {} (Ctrl-C to stop)", ledger_path.display(), sync.user());

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                local.flush(&mut sync)?;
                record_status(record_path, sync.status())?;
                break;
            }
            _ = ticker.tick() => {
                local.poll_once(&mut sync, Utc::now())?;
            }
        }

        if *sync.status() != shown {
            shown = sync.status().clone();
            eprintln!("sync: {}", crate::render::status_label(&shown));
            record_status(record_path, &shown)?;
        }
    }
    Ok(())
}
