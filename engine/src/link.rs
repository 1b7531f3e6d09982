//! Sync links: replaying one store's transforms against another.
//!
//! A link subscribes to the source store's `DidTransform` notifications and
//! feeds them, in emission order, to a worker task that calls
//! `target.transform`. The target re-derives its own record state; nothing is
//! copied between stores directly.

use crate::notify::{DidTransform, EventKind, StoreEvent, SubscriptionId};
use crate::store::Store;
use crate::transform::Transform;
use crate::Notifier;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

/// Which identifiers a replayed transform carries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum IdentifierScope {
    /// Source and target share local IDs: the replay carries the source
    /// record's local ID and, when known, its remote ID.
    #[default]
    Shared,
    /// Local IDs are independent: the replay carries only the remote ID.
    RemoteOnly,
}

#[derive(Debug)]
struct Progress {
    enqueued: AtomicU64,
    completed: watch::Sender<u64>,
    failures: AtomicU64,
}

/// Handle to an established link.
///
/// Dropping the handle does not break the link; call [`SyncLink::unlink`].
#[derive(Debug)]
pub struct SyncLink {
    source: Notifier,
    subscription: SubscriptionId,
    scope: IdentifierScope,
    progress: Arc<Progress>,
}

impl SyncLink {
    /// Subscribe `target` to every transform applied by `source`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn establish<S, T>(source: &S, target: Arc<T>, scope: IdentifierScope) -> Self
    where
        S: Store + ?Sized,
        T: Store + ?Sized + 'static,
    {
        let (tx, mut rx) = mpsc::unbounded_channel::<Transform>();
        let (completed, _) = watch::channel(0u64);
        let progress = Arc::new(Progress {
            enqueued: AtomicU64::new(0),
            completed,
            failures: AtomicU64::new(0),
        });

        let queued = progress.clone();
        let subscription = source
            .notifier()
            .subscribe(EventKind::DidTransform, move |event| {
                let StoreEvent::DidTransform(event) = event;
                let Some(replay) = replay_transform(event, scope) else {
                    return;
                };
                queued.enqueued.fetch_add(1, Ordering::SeqCst);
                if tx.send(replay).is_err() {
                    // Worker is gone; count it as done so settled() cannot hang.
                    queued.completed.send_modify(|n| *n += 1);
                }
            });

        let worker = progress.clone();
        tokio::spawn(async move {
            while let Some(replay) = rx.recv().await {
                let description = replay.to_string();
                if let Err(e) = target.transform(replay).await {
                    worker.failures.fetch_add(1, Ordering::SeqCst);
                    tracing::warn!(transform = %description, error = %e, "sync link replay failed");
                } else {
                    tracing::trace!(transform = %description, "sync link replayed");
                }
                worker.completed.send_modify(|n| *n += 1);
            }
            tracing::debug!("sync link worker stopped");
        });

        tracing::debug!(?scope, "sync link established");

        Self {
            source: source.notifier().clone(),
            subscription,
            scope,
            progress,
        }
    }

    pub fn scope(&self) -> IdentifierScope {
        self.scope
    }

    /// Wait until every transform forwarded so far has been replayed.
    pub async fn settled(&self) {
        let target = self.progress.enqueued.load(Ordering::SeqCst);
        let mut completed = self.progress.completed.subscribe();
        // The sender lives in `progress`, so this only ends when reached.
        let _ = completed.wait_for(|done| *done >= target).await;
    }

    /// Replays that failed on the target.
    pub fn failures(&self) -> u64 {
        self.progress.failures.load(Ordering::SeqCst)
    }

    /// Transforms forwarded to the target so far.
    pub fn forwarded(&self) -> u64 {
        self.progress.enqueued.load(Ordering::SeqCst)
    }

    pub fn is_linked(&self) -> bool {
        self.source.is_subscribed(self.subscription)
    }

    /// Stop forwarding. Transforms already queued are still replayed.
    pub fn unlink(&self) -> bool {
        let removed = self.source.unsubscribe(self.subscription);
        if removed {
            tracing::debug!("sync link removed");
        }
        removed
    }
}

/// Link `target` to `source`, sharing local identifiers.
pub fn link<S, T>(source: &S, target: Arc<T>) -> SyncLink
where
    S: Store + ?Sized,
    T: Store + ?Sized + 'static,
{
    SyncLink::establish(source, target, IdentifierScope::Shared)
}

/// Build the transform the target replays for a source notification.
fn replay_transform(event: &DidTransform, scope: IdentifierScope) -> Option<Transform> {
    let source = &event.transform;
    let mut payload = source.payload.clone();
    let record = event.record.as_ref();

    match scope {
        IdentifierScope::Shared => {
            if let Some(record) = record {
                payload.local_id = Some(record.local_id.clone());
                if record.remote_id.is_some() {
                    payload.remote_id = record.remote_id.clone();
                }
            }
        }
        IdentifierScope::RemoteOnly => {
            payload.local_id = None;
            if let Some(remote_id) = record.and_then(|r| r.remote_id.clone()) {
                payload.remote_id = Some(remote_id);
            }
            if source.verb.targets_existing() && payload.remote_id.is_none() {
                tracing::warn!(
                    transform = %source,
                    "skipping replay: no remote id to address the target record"
                );
                return None;
            }
        }
    }

    Some(Transform {
        verb: source.verb,
        record_type: source.record_type.clone(),
        payload,
    })
}
