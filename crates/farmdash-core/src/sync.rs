//! Queue of changes made while offline, pushed to the backend later.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{GatewayError, StoreError};
use crate::gateway::ApiGateway;
use crate::offline::{pending_changes_key, OfflineStore};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChangeKind {
    DeleteCrop { crop_id: String },
    DeleteFarm { farm_id: String },
    LikePost { post_id: String },
    UnlikePost { post_id: String },
    AddComment { post_id: String, text: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingChange {
    pub id: Uuid,
    pub kind: ChangeKind,
    pub queued_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub pushed: usize,
    /// Changes the backend rejected for good (already gone, or a 4xx).
    pub dropped: usize,
    pub remaining: usize,
    /// The error that stopped the push, if any.
    pub error: Option<GatewayError>,
}

enum Outcome {
    Applied,
    Dropped,
    Stop(GatewayError),
}

pub struct SyncQueue {
    user_id: String,
    changes: Mutex<VecDeque<PendingChange>>,
    pushing: futures::lock::Mutex<()>,
}

impl std::fmt::Debug for SyncQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncQueue")
            .field("user_id", &self.user_id)
            .field("pending", &self.len())
            .finish()
    }
}

impl SyncQueue {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            changes: Mutex::new(VecDeque::new()),
            pushing: futures::lock::Mutex::new(()),
        }
    }

    /// Restores a previously persisted queue; a missing entry is an empty queue.
    pub async fn load(store: &dyn OfflineStore, user_id: &str) -> Result<Self, StoreError> {
        let queue = Self::new(user_id);
        if let Some(value) = store.get_offline_data(&pending_changes_key(user_id)).await? {
            let restored: Vec<PendingChange> = serde_json::from_value(value)?;
            debug!(user_id, count = restored.len(), "restored pending changes");
            queue.changes().extend(restored);
        }
        Ok(queue)
    }

    pub async fn persist(&self, store: &dyn OfflineStore) -> Result<(), StoreError> {
        let value = serde_json::to_value(self.snapshot())?;
        store
            .set_offline_data(&pending_changes_key(&self.user_id), value)
            .await
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    fn changes(&self) -> MutexGuard<'_, VecDeque<PendingChange>> {
        self.changes.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn enqueue(&self, kind: ChangeKind) -> PendingChange {
        let change = PendingChange {
            id: Uuid::new_v4(),
            kind,
            queued_at: Utc::now(),
        };
        self.changes().push_back(change.clone());
        change
    }

    /// Enqueues `kind` and writes the whole queue to `store`. The change
    /// stays queued in memory even when the write fails.
    pub async fn enqueue_persisted(
        &self,
        store: &dyn OfflineStore,
        kind: ChangeKind,
    ) -> Result<PendingChange, StoreError> {
        let change = self.enqueue(kind);
        self.persist(store).await?;
        Ok(change)
    }

    pub fn len(&self) -> usize {
        self.changes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes().is_empty()
    }

    pub fn snapshot(&self) -> Vec<PendingChange> {
        self.changes().iter().cloned().collect()
    }

    /// Pushes queued changes in FIFO order until the queue drains or a
    /// change hits a transient failure. Concurrent pushes are serialized.
    pub async fn push(&self, gateway: &dyn ApiGateway) -> SyncReport {
        let _guard = self.pushing.lock().await;
        let mut report = SyncReport::default();

        loop {
            let next = self.changes().front().cloned();
            let Some(change) = next else {
                break;
            };

            match apply_change(gateway, &change.kind).await {
                Outcome::Applied => {
                    self.changes().pop_front();
                    report.pushed += 1;
                }
                Outcome::Dropped => {
                    self.changes().pop_front();
                    report.dropped += 1;
                }
                Outcome::Stop(err) => {
                    warn!(user_id = %self.user_id, change_id = %change.id, error = %err, "sync push stopped");
                    report.error = Some(err);
                    break;
                }
            }
        }

        report.remaining = self.len();
        info!(
            user_id = %self.user_id,
            pushed = report.pushed,
            dropped = report.dropped,
            remaining = report.remaining,
            "sync push finished"
        );
        report
    }
}

async fn apply_change(gateway: &dyn ApiGateway, kind: &ChangeKind) -> Outcome {
    let result = match kind {
        ChangeKind::DeleteCrop { crop_id } => gateway.delete_crop(crop_id).await,
        ChangeKind::DeleteFarm { farm_id } => gateway.delete_farm(farm_id).await,
        ChangeKind::LikePost { post_id } => gateway.like_community_post(post_id).await,
        ChangeKind::UnlikePost { post_id } => gateway.unlike_community_post(post_id).await,
        ChangeKind::AddComment { post_id, text } => {
            gateway.add_post_comment(post_id, text).await.map(|_| ())
        }
    };

    match result {
        Ok(()) => Outcome::Applied,
        Err(GatewayError::NotFound(_)) => Outcome::Dropped,
        Err(GatewayError::Status { code, message }) if (400..500).contains(&code) => {
            warn!(code, %message, "backend rejected queued change, dropping it");
            Outcome::Dropped
        }
        Err(err) => Outcome::Stop(err),
    }
}

/// Deletes a crop now when online; otherwise queues the deletion and
/// persists the queue to `store`.
///
/// Returns `true` when the deletion was sent immediately.
pub async fn delete_crop_or_enqueue(
    gateway: &dyn ApiGateway,
    store: &dyn OfflineStore,
    queue: &SyncQueue,
    online: bool,
    crop_id: &str,
) -> Result<bool, GatewayError> {
    if online {
        match gateway.delete_crop(crop_id).await {
            Ok(()) => return Ok(true),
            Err(err) if err.is_network() => {
                debug!(crop_id, "network failed during delete, queueing instead");
            }
            Err(err) => return Err(err),
        }
    }
    let kind = ChangeKind::DeleteCrop {
        crop_id: crop_id.to_string(),
    };
    queue_durably(store, queue, kind).await;
    Ok(false)
}

/// Farm counterpart of [`delete_crop_or_enqueue`].
pub async fn delete_farm_or_enqueue(
    gateway: &dyn ApiGateway,
    store: &dyn OfflineStore,
    queue: &SyncQueue,
    online: bool,
    farm_id: &str,
) -> Result<bool, GatewayError> {
    if online {
        match gateway.delete_farm(farm_id).await {
            Ok(()) => return Ok(true),
            Err(err) if err.is_network() => {
                debug!(farm_id, "network failed during delete, queueing instead");
            }
            Err(err) => return Err(err),
        }
    }
    let kind = ChangeKind::DeleteFarm {
        farm_id: farm_id.to_string(),
    };
    queue_durably(store, queue, kind).await;
    Ok(false)
}

async fn queue_durably(store: &dyn OfflineStore, queue: &SyncQueue, kind: ChangeKind) {
    if let Err(err) = queue.enqueue_persisted(store, kind).await {
        warn!(
            user_id = queue.user_id(),
            error = %err,
            "queued change kept in memory only, persisting the queue failed"
        );
    }
}
