//! Background writer for cached payout status snapshots.
//!
//! Handlers return the live status immediately and hand the snapshot to this
//! task. Writes and clears are applied in submission order, so a clear is never
//! overtaken by a snapshot queued before it. Failed snapshot writes are
//! reported on a separate channel and counted; they never reach the request
//! that caused them.

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, warn};

use massclip_firestore::{FirestoreError, FirestoreResult, UserRepository};
use massclip_models::ConnectStatusSnapshot;

use crate::metrics;

/// Pending writes the writer will buffer before dropping new ones.
pub const DEFAULT_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub struct CacheWriteFailure {
    pub uid: String,
    pub error: String,
}

enum Command {
    Write {
        uid: String,
        snapshot: Box<ConnectStatusSnapshot>,
    },
    Clear {
        uid: String,
        ack: oneshot::Sender<FirestoreResult<()>>,
    },
    Flush(oneshot::Sender<()>),
}

/// Handle for submitting snapshot writes.
#[derive(Clone)]
pub struct StatusCacheWriter {
    tx: mpsc::Sender<Command>,
}

impl StatusCacheWriter {
    /// Spawn the writer task. Must be called inside a tokio runtime.
    ///
    /// Returns the handle and the receiving side of the failure channel.
    pub fn spawn(
        users: UserRepository,
        capacity: usize,
    ) -> (Self, mpsc::Receiver<CacheWriteFailure>) {
        let (tx, mut rx) = mpsc::channel::<Command>(capacity.max(1));
        let (failure_tx, failure_rx) = mpsc::channel(capacity.max(1));

        tokio::spawn(async move {
            while let Some(command) = rx.recv().await {
                match command {
                    Command::Write { uid, snapshot } => {
                        match users.set_stripe_status(&uid, &snapshot).await {
                            Ok(()) => debug!(uid = %uid, "Cached payout status"),
                            Err(e) => {
                                metrics::record_status_cache_write_failure();
                                let failure = CacheWriteFailure {
                                    uid,
                                    error: e.to_string(),
                                };
                                if failure_tx.try_send(failure).is_err() {
                                    warn!("Status cache failure channel full or closed");
                                }
                            }
                        }
                    }
                    Command::Clear { uid, ack } => {
                        let result = users.clear_stripe_status(&uid).await;
                        if result.is_ok() {
                            debug!(uid = %uid, "Cleared payout status");
                        }
                        let _ = ack.send(result);
                    }
                    Command::Flush(ack) => {
                        let _ = ack.send(());
                    }
                }
            }
            debug!("Status cache writer stopped");
        });

        (Self { tx }, failure_rx)
    }

    /// Queue a snapshot write without waiting for it.
    pub fn submit(&self, uid: &str, snapshot: ConnectStatusSnapshot) {
        let command = Command::Write {
            uid: uid.to_string(),
            snapshot: Box::new(snapshot),
        };
        if let Err(e) = self.tx.try_send(command) {
            metrics::record_status_cache_write_dropped();
            warn!(uid = %uid, "Dropped payout status cache write: {}", e);
        }
    }

    /// Drop the cached snapshot after every write queued before it.
    pub async fn clear(&self, uid: &str) -> FirestoreResult<()> {
        let (ack, done) = oneshot::channel();
        let command = Command::Clear {
            uid: uid.to_string(),
            ack,
        };
        if self.tx.send(command).await.is_err() {
            return Err(FirestoreError::request_failed("status cache writer stopped"));
        }
        done.await
            .unwrap_or_else(|_| Err(FirestoreError::request_failed("status cache writer stopped")))
    }

    /// Wait until every write submitted so far has been attempted.
    pub async fn flush(&self) {
        let (ack, done) = oneshot::channel();
        if self.tx.send(Command::Flush(ack)).await.is_ok() {
            let _ = done.await;
        }
    }
}

/// Log failures reported by the writer until it shuts down.
pub fn spawn_failure_logger(mut failures: mpsc::Receiver<CacheWriteFailure>) {
    tokio::spawn(async move {
        while let Some(failure) = failures.recv().await {
            error!(uid = %failure.uid, error = %failure.error, "Payout status cache write failed");
        }
    });
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;
    use massclip_firestore::{MemoryStore, SharedStore};
    use massclip_models::{AccountRequirements, ConnectAccountState, UserProfile};

    use super::*;

    fn snapshot() -> ConnectStatusSnapshot {
        ConnectStatusSnapshot {
            account_id: "acct_1".into(),
            charges_enabled: true,
            payouts_enabled: true,
            details_submitted: true,
            status: ConnectAccountState::Active,
            requirements: AccountRequirements::default(),
            disabled_reason: None,
            last_checked: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_writes_land_after_flush() {
        let store: SharedStore = Arc::new(MemoryStore::new());
        let users = UserRepository::new(store);
        users.create(&UserProfile::new("u1", None)).await.unwrap();

        let (writer, _failures) = StatusCacheWriter::spawn(users.clone(), 8);
        writer.submit("u1", snapshot());
        writer.flush().await;

        let cached = users.get("u1").await.unwrap().unwrap().stripe_status.unwrap();
        assert_eq!(cached.account_id, "acct_1");
    }

    #[tokio::test]
    async fn test_clear_lands_after_queued_write() {
        let store: SharedStore = Arc::new(MemoryStore::new());
        let users = UserRepository::new(store);
        users.create(&UserProfile::new("u1", None)).await.unwrap();

        let (writer, _failures) = StatusCacheWriter::spawn(users.clone(), 8);
        writer.submit("u1", snapshot());
        writer.clear("u1").await.unwrap();

        let user = users.get("u1").await.unwrap().unwrap();
        assert!(user.stripe_status.is_none());
    }
}
