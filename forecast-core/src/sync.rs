//! Debounced save scheduling for bidirectional document sync.
//!
//! Local edits are saved once no further edit has arrived for the debounce
//! period. Applying a remote snapshot produces local change notifications of
//! its own; those are ignored for the echo window so they are never written
//! back to the store.
//!
//! The machine is driven entirely by events carrying timestamps, so it has no
//! clock of its own.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncPolicy {
    pub debounce: Duration,
    pub echo_window: Duration,
}

impl SyncPolicy {
    pub fn from_millis(debounce_ms: u64, echo_window_ms: u64) -> Self {
        Self {
            debounce: Duration::milliseconds(debounce_ms as i64),
            echo_window: Duration::milliseconds(echo_window_ms as i64),
        }
    }
}

impl Default for SyncPolicy {
    fn default() -> Self {
        Self::from_millis(1500, 300)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncState {
    Idle,
    LocallyDirty { last_change: DateTime<Utc> },
    Saving { pending_change: Option<DateTime<Utc>> },
    RemoteApplying { until: DateTime<Utc> },
}

/// What a user-facing indicator should show.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "message", rename_all = "lowercase")]
pub enum SyncStatus {
    Idle,
    Saving,
    Synced,
    Error(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// Signed in and the first fetch has completed
    Connected,
    /// Signed out
    Disconnected,
    LocalChange { at: DateTime<Utc> },
    Tick { now: DateTime<Utc> },
    /// Save now instead of waiting out the debounce
    Flush,
    SaveSucceeded,
    SaveFailed { message: String },
    RemoteSnapshot { at: DateTime<Utc> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncAction {
    None,
    /// Write the current local document to the store
    Save,
}

#[derive(Debug, Clone)]
pub struct SyncMachine {
    policy: SyncPolicy,
    state: SyncState,
    status: SyncStatus,
    connected: bool,
}

impl SyncMachine {
    pub fn new(policy: SyncPolicy) -> Self {
        Self {
            policy,
            state: SyncState::Idle,
            status: SyncStatus::Idle,
            connected: false,
        }
    }

    pub fn state(&self) -> &SyncState {
        &self.state
    }

    pub fn status(&self) -> &SyncStatus {
        &self.status
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn handle(&mut self, event: SyncEvent) -> SyncAction {
        debug!(?event, state = ?self.state, "sync event");
        match event {
            SyncEvent::Connected => {
                self.connected = true;
                SyncAction::None
            }
            SyncEvent::Disconnected => {
                self.connected = false;
                self.state = SyncState::Idle;
                self.status = SyncStatus::Idle;
                SyncAction::None
            }
            SyncEvent::LocalChange { at } => {
                self.local_change(at);
                SyncAction::None
            }
            SyncEvent::Tick { now } => self.tick(now),
            SyncEvent::Flush => match self.state {
                SyncState::LocallyDirty { .. } => self.begin_save(),
                _ => SyncAction::None,
            },
            SyncEvent::SaveSucceeded => {
                if let SyncState::Saving { pending_change } = self.state {
                    info!("sync save completed");
                    self.finish_save(pending_change, SyncStatus::Synced);
                }
                SyncAction::None
            }
            SyncEvent::SaveFailed { message } => {
                if let SyncState::Saving { pending_change } = self.state {
                    warn!(%message, "sync save failed");
                    self.finish_save(pending_change, SyncStatus::Error(message));
                }
                SyncAction::None
            }
            SyncEvent::RemoteSnapshot { at } => {
                self.connected = true;
                self.state = match self.state {
                    SyncState::Saving { .. } => SyncState::Saving { pending_change: None },
                    _ => SyncState::RemoteApplying {
                        until: at + self.policy.echo_window,
                    },
                };
                self.status = SyncStatus::Synced;
                SyncAction::None
            }
        }
    }

    fn local_change(&mut self, at: DateTime<Utc>) {
        if !self.connected {
            return;
        }
        self.state = match self.state {
            SyncState::Idle | SyncState::LocallyDirty { .. } => SyncState::LocallyDirty { last_change: at },
            SyncState::Saving { .. } => SyncState::Saving { pending_change: Some(at) },
            SyncState::RemoteApplying { until } if at < until => {
                debug!(%at, %until, "ignoring echo of remote snapshot");
                return;
            }
            SyncState::RemoteApplying { .. } => SyncState::LocallyDirty { last_change: at },
        };
        self.status = SyncStatus::Saving;
    }

    fn tick(&mut self, now: DateTime<Utc>) -> SyncAction {
        match self.state {
            SyncState::LocallyDirty { last_change } if now - last_change >= self.policy.debounce => {
                self.begin_save()
            }
            SyncState::RemoteApplying { until } if now >= until => {
                self.state = SyncState::Idle;
                SyncAction::None
            }
            _ => SyncAction::None,
        }
    }

    fn begin_save(&mut self) -> SyncAction {
        self.state = SyncState::Saving { pending_change: None };
        self.status = SyncStatus::Saving;
        SyncAction::Save
    }

    fn finish_save(&mut self, pending_change: Option<DateTime<Utc>>, status: SyncStatus) {
        match pending_change {
            Some(at) => {
                self.state = SyncState::LocallyDirty { last_change: at };
                self.status = match status {
                    SyncStatus::Error(_) => status,
                    _ => SyncStatus::Saving,
                };
            }
            None => {
                self.state = SyncState::Idle;
                self.status = status;
            }
        }
    }
}

impl Default for SyncMachine {
    fn default() -> Self {
        Self::new(SyncPolicy::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t(ms: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::milliseconds(ms)
    }

    fn connected() -> SyncMachine {
        let mut m = SyncMachine::default();
        m.handle(SyncEvent::Connected);
        m
    }

    #[test]
    fn test_changes_ignored_until_connected() {
        let mut m = SyncMachine::default();
        m.handle(SyncEvent::LocalChange { at: t(0) });
        assert_eq!(m.state(), &SyncState::Idle);
        assert_eq!(m.handle(SyncEvent::Tick { now: t(5000) }), SyncAction::None);
    }

    #[test]
    fn test_debounce_restarts_on_each_change() {
        let mut m = connected();
        m.handle(SyncEvent::LocalChange { at: t(0) });
        m.handle(SyncEvent::LocalChange { at: t(1000) });
        assert_eq!(m.handle(SyncEvent::Tick { now: t(1600) }), SyncAction::None);
        assert_eq!(m.status(), &SyncStatus::Saving);
        assert_eq!(m.handle(SyncEvent::Tick { now: t(2500) }), SyncAction::Save);
        m.handle(SyncEvent::SaveSucceeded);
        assert_eq!(m.state(), &SyncState::Idle);
        assert_eq!(m.status(), &SyncStatus::Synced);
    }

    #[test]
    fn test_flush_saves_immediately() {
        let mut m = connected();
        assert_eq!(m.handle(SyncEvent::Flush), SyncAction::None);
        m.handle(SyncEvent::LocalChange { at: t(0) });
        assert_eq!(m.handle(SyncEvent::Flush), SyncAction::Save);
    }

    #[test]
    fn test_change_during_save_rearms_debounce() {
        let mut m = connected();
        m.handle(SyncEvent::LocalChange { at: t(0) });
        m.handle(SyncEvent::Tick { now: t(1500) });
        m.handle(SyncEvent::LocalChange { at: t(1700) });
        m.handle(SyncEvent::SaveSucceeded);
        assert_eq!(m.state(), &SyncState::LocallyDirty { last_change: t(1700) });
        assert_eq!(m.handle(SyncEvent::Tick { now: t(3200) }), SyncAction::Save);
    }

    #[test]
    fn test_failed_save_reports_error() {
        let mut m = connected();
        m.handle(SyncEvent::LocalChange { at: t(0) });
        m.handle(SyncEvent::Flush);
        m.handle(SyncEvent::SaveFailed {
            message: "permission denied".to_string(),
        });
        assert_eq!(m.state(), &SyncState::Idle);
        assert_eq!(m.status(), &SyncStatus::Error("permission denied".to_string()));
    }

    #[test]
    fn test_remote_snapshot_suppresses_echo() {
        let mut m = connected();
        m.handle(SyncEvent::LocalChange { at: t(0) });
        m.handle(SyncEvent::RemoteSnapshot { at: t(100) });
        // The pending local debounce is cancelled.
        assert_eq!(m.handle(SyncEvent::Tick { now: t(2000) }), SyncAction::None);

        m.handle(SyncEvent::RemoteSnapshot { at: t(3000) });
        m.handle(SyncEvent::LocalChange { at: t(3100) });
        assert_eq!(m.state(), &SyncState::RemoteApplying { until: t(3300) });
        m.handle(SyncEvent::Tick { now: t(3300) });
        assert_eq!(m.state(), &SyncState::Idle);
        assert_eq!(m.status(), &SyncStatus::Synced);
    }

    #[test]
    fn test_remote_snapshot_connects() {
        let mut m = SyncMachine::default();
        m.handle(SyncEvent::RemoteSnapshot { at: t(0) });
        assert!(m.is_connected());
    }

    #[test]
    fn test_disconnect_resets() {
        let mut m = connected();
        m.handle(SyncEvent::LocalChange { at: t(0) });
        m.handle(SyncEvent::Disconnected);
        assert_eq!(m.state(), &SyncState::Idle);
        assert_eq!(m.status(), &SyncStatus::Idle);
        assert!(!m.is_connected());
    }

    #[test]
    fn test_failed_save_rearms_pending_change() {
        let mut m = connected();
        m.handle(SyncEvent::LocalChange { at: t(0) });
        m.handle(SyncEvent::Flush);
        m.handle(SyncEvent::LocalChange { at: t(100) });
        m.handle(SyncEvent::SaveFailed {
            message: "offline".to_string(),
        });
        assert_eq!(m.state(), &SyncState::LocallyDirty { last_change: t(100) });
        assert_eq!(m.status(), &SyncStatus::Error("offline".to_string()));
        assert_eq!(m.handle(SyncEvent::Tick { now: t(1600) }), SyncAction::Save);
    }

    #[test]
    fn test_remote_snapshot_during_save_drops_pending_change() {
        let mut m = connected();
        m.handle(SyncEvent::LocalChange { at: t(0) });
        assert_eq!(m.handle(SyncEvent::Flush), SyncAction::Save);
        m.handle(SyncEvent::LocalChange { at: t(100) });
        m.handle(SyncEvent::RemoteSnapshot { at: t(200) });
        assert_eq!(m.state(), &SyncState::Saving { pending_change: None });

        m.handle(SyncEvent::SaveSucceeded);
        assert_eq!(m.state(), &SyncState::Idle);
        assert_eq!(m.status(), &SyncStatus::Synced);
        assert_eq!(m.handle(SyncEvent::Tick { now: t(5000) }), SyncAction::None);
    }
}
