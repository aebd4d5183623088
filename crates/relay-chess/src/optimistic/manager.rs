use std::collections::BTreeMap;
use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::metrics::OptimisticMetrics;
use crate::move_id::{MoveId, MoveIdGenerator};
use crate::rules::{self, RulesError};
use crate::types::chess::{Move, Position};
use crate::types::game::{MoveRecord, MoveStatus};

/// Callback invoked with a snapshot of every record after each mutation.
pub type Listener = Arc<dyn Fn(&[MoveRecord]) + Send + Sync>;

/// Registry of moves applied locally before network confirmation.
///
/// Cheap to clone; clones share one registry. Every mutation notifies
/// listeners synchronously, after the internal lock is released, with a
/// snapshot of all records in insertion order.
///
/// Terminal records are evicted after a grace delay on a tokio task. Without
/// a runtime, eviction is skipped and the record stays until removed.
#[derive(Clone)]
pub struct OptimisticMoveManager {
    shared: Arc<Shared>,
}

struct Shared {
    registry: Mutex<MoveRegistry>,
    ids: MoveIdGenerator,
    config: ClientConfig,
    metrics: Arc<OptimisticMetrics>,
}

#[derive(Default)]
struct MoveRegistry {
    /// Ids increase monotonically, so key order is insertion order.
    entries: BTreeMap<MoveId, Entry>,
    listeners: Vec<(u64, Listener)>,
    next_listener: u64,
    watchers: Vec<mpsc::UnboundedSender<Vec<MoveRecord>>>,
}

struct Entry {
    record: MoveRecord,
    eviction: Option<CancellationToken>,
}

impl Entry {
    fn cancel_eviction(&self) {
        if let Some(token) = &self.eviction {
            token.cancel();
        }
    }
}

impl MoveRegistry {
    fn snapshot(&self) -> Vec<MoveRecord> {
        self.entries.values().map(|e| e.record.clone()).collect()
    }

    fn records(&self) -> impl DoubleEndedIterator<Item = &MoveRecord> {
        self.entries.values().map(|e| &e.record)
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        for entry in self.registry.get_mut().entries.values() {
            entry.cancel_eviction();
        }
    }
}

/// Handle returned by [`OptimisticMoveManager::subscribe`].
#[must_use = "dropping a Subscription keeps the listener registered"]
pub struct Subscription {
    shared: Weak<Shared>,
    id: u64,
}

impl Subscription {
    /// Deregister the listener. Calling this more than once is harmless.
    pub fn unsubscribe(&self) {
        if let Some(shared) = self.shared.upgrade() {
            shared.registry.lock().listeners.retain(|(id, _)| *id != self.id);
        }
    }
}

impl OptimisticMoveManager {
    pub fn new(config: ClientConfig) -> Self {
        Self::with_metrics(config, Arc::new(OptimisticMetrics::unregistered()))
    }

    pub fn with_metrics(config: ClientConfig, metrics: Arc<OptimisticMetrics>) -> Self {
        Self {
            shared: Arc::new(Shared {
                registry: Mutex::new(MoveRegistry::default()),
                ids: MoveIdGenerator::new(),
                config,
                metrics,
            }),
        }
    }

    pub fn metrics(&self) -> &OptimisticMetrics {
        &self.shared.metrics
    }

    pub fn config(&self) -> &ClientConfig {
        &self.shared.config
    }

    /// Validate `mv` from `from` and record it as `Pending`.
    ///
    /// Nothing is recorded and no listener runs when validation fails.
    pub fn add_move(&self, from: &Position, mv: &Move) -> Result<MoveRecord, RulesError> {
        let played = match rules::validate_move(from, mv) {
            Ok(played) => played,
            Err(e) => {
                self.shared.metrics.rejected.inc();
                debug!(%mv, error = %e, "optimistic move rejected");
                return Err(e);
            }
        };

        let record = MoveRecord {
            id: self.shared.ids.next(),
            mv: *mv,
            resulting_position: played.resulting_position,
            san: played.san,
            created_at: Utc::now(),
            status: MoveStatus::Pending,
            error: None,
        };
        debug!(move_id = %record.id, san = %record.san, "optimistic move added");

        self.mutate(|registry| {
            registry.entries.insert(
                record.id,
                Entry {
                    record: record.clone(),
                    eviction: None,
                },
            );
        });
        Ok(record)
    }

    /// Set the status (and error) of a live record.
    ///
    /// Returns `false` without notifying anyone when `id` is unknown or the
    /// record is already terminal. A terminal status schedules eviction.
    pub fn update_status(&self, id: MoveId, status: MoveStatus, error: Option<String>) -> bool {
        self.set_status(id, None, status, error)
    }

    /// Move `id` from `from` to `to`, only if it currently is in `from`.
    pub(crate) fn transition(&self, id: MoveId, from: MoveStatus, to: MoveStatus) -> bool {
        self.set_status(id, Some(from), to, None)
    }

    fn set_status(
        &self,
        id: MoveId,
        expected: Option<MoveStatus>,
        status: MoveStatus,
        error: Option<String>,
    ) -> bool {
        self.mutate(|registry| {
            let Some(entry) = registry.entries.get_mut(&id) else {
                return false;
            };
            if entry.record.status.is_terminal()
                || expected.is_some_and(|s| s != entry.record.status)
            {
                return false;
            }
            debug!(move_id = %id, from = %entry.record.status, to = %status, "move status changed");
            entry.record.status = status;
            entry.record.error = error;

            match status {
                MoveStatus::Confirmed => {
                    self.shared.metrics.confirmed.inc();
                    entry.eviction = self.schedule_eviction(id, self.shared.config.confirmed_grace);
                }
                MoveStatus::Failed => {
                    self.shared.metrics.failed.inc();
                    warn!(
                        move_id = %id,
                        error = entry.record.error.as_deref().unwrap_or_default(),
                        "optimistic move failed"
                    );
                    entry.eviction = self.schedule_eviction(id, self.shared.config.failed_grace);
                }
                _ => {}
            }
            true
        })
    }

    /// Remove `id` now, cancelling its eviction timer.
    pub fn remove_move(&self, id: MoveId) -> bool {
        let removed = self.mutate(|registry| match registry.entries.remove(&id) {
            Some(entry) => {
                entry.cancel_eviction();
                true
            }
            None => false,
        });
        if removed {
            debug!(move_id = %id, "optimistic move removed");
        }
        removed
    }

    /// Remove every record. Returns how many were removed.
    pub fn clear(&self) -> usize {
        let removed = self.mutate(|registry| {
            let entries = std::mem::take(&mut registry.entries);
            for entry in entries.values() {
                entry.cancel_eviction();
            }
            entries.len()
        });
        info!(removed, "optimistic moves cleared");
        removed
    }

    /// Records not yet confirmed, in insertion order. Failed records are
    /// included until they are evicted.
    pub fn pending_moves(&self) -> Vec<MoveRecord> {
        self.collect(|r| r.status != MoveStatus::Confirmed)
    }

    /// Records still awaiting the network.
    pub fn in_flight_moves(&self) -> Vec<MoveRecord> {
        self.collect(|r| r.status.is_in_flight())
    }

    pub fn failed_moves(&self) -> Vec<MoveRecord> {
        self.collect(|r| r.status == MoveStatus::Failed)
    }

    pub fn confirmed_moves(&self) -> Vec<MoveRecord> {
        self.collect(|r| r.status == MoveStatus::Confirmed)
    }

    pub fn all_moves(&self) -> Vec<MoveRecord> {
        self.shared.registry.lock().snapshot()
    }

    pub fn get(&self, id: MoveId) -> Option<MoveRecord> {
        self.shared
            .registry
            .lock()
            .entries
            .get(&id)
            .map(|e| e.record.clone())
    }

    pub fn len(&self) -> usize {
        self.shared.registry.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.registry.lock().entries.is_empty()
    }

    /// Resulting position of the newest pending record, or `confirmed` when
    /// nothing is pending.
    pub fn effective_position(&self, confirmed: &Position) -> Position {
        self.shared
            .registry
            .lock()
            .records()
            .rev()
            .find(|r| r.status != MoveStatus::Confirmed)
            .map_or_else(|| confirmed.clone(), |r| r.resulting_position.clone())
    }

    /// Register `listener`. Registering the same callback twice runs it twice.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&[MoveRecord]) + Send + Sync + 'static,
    {
        let mut registry = self.shared.registry.lock();
        let id = registry.next_listener;
        registry.next_listener += 1;
        registry.listeners.push((id, Arc::new(listener)));
        Subscription {
            shared: Arc::downgrade(&self.shared),
            id,
        }
    }

    /// Receive a snapshot after every mutation, starting with the current one.
    ///
    /// Dropping the receiver unregisters it at the next mutation.
    pub fn watch(&self) -> mpsc::UnboundedReceiver<Vec<MoveRecord>> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut registry = self.shared.registry.lock();
        if tx.send(registry.snapshot()).is_ok() {
            registry.watchers.push(tx);
        }
        rx
    }

    fn collect(&self, keep: impl Fn(&MoveRecord) -> bool) -> Vec<MoveRecord> {
        self.shared
            .registry
            .lock()
            .records()
            .filter(|r| keep(r))
            .cloned()
            .collect()
    }

    /// Apply `f` under the lock. When it reports a change, refresh gauges,
    /// feed watchers, and run listeners once the lock is released.
    fn mutate<R: Changed>(&self, f: impl FnOnce(&mut MoveRegistry) -> R) -> R {
        let (result, notification) = {
            let mut registry = self.shared.registry.lock();
            let result = f(&mut registry);
            if !result.changed() {
                return result;
            }
            self.refresh_gauges(&registry);
            let snapshot = registry.snapshot();
            registry
                .watchers
                .retain(|tx| tx.send(snapshot.clone()).is_ok());
            let listeners: Vec<Listener> =
                registry.listeners.iter().map(|(_, l)| Arc::clone(l)).collect();
            (result, (snapshot, listeners))
        };

        let (snapshot, listeners) = notification;
        for listener in listeners {
            listener(&snapshot);
        }
        result
    }

    fn refresh_gauges(&self, registry: &MoveRegistry) {
        let metrics = &self.shared.metrics;
        metrics.tracked.set(registry.entries.len() as i64);
        metrics
            .in_flight
            .set(registry.records().filter(|r| r.status.is_in_flight()).count() as i64);
    }

    fn schedule_eviction(&self, id: MoveId, delay: Duration) -> Option<CancellationToken> {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!(move_id = %id, "no tokio runtime, eviction not scheduled");
            return None;
        };
        let token = CancellationToken::new();
        let cancel = token.clone();
        let shared = Arc::downgrade(&self.shared);
        handle.spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    if let Some(shared) = shared.upgrade() {
                        OptimisticMoveManager { shared }.evict(id);
                    }
                }
            }
        });
        Some(token)
    }

    fn evict(&self, id: MoveId) {
        let evicted = self.mutate(|registry| {
            let terminal = registry
                .entries
                .get(&id)
                .is_some_and(|e| e.record.status.is_terminal());
            terminal && registry.entries.remove(&id).is_some()
        });
        if evicted {
            debug!(move_id = %id, "optimistic move evicted");
        }
    }
}

impl std::fmt::Debug for OptimisticMoveManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OptimisticMoveManager")
            .field("moves", &self.len())
            .finish()
    }
}

/// Whether a mutation changed the registry.
trait Changed {
    fn changed(&self) -> bool;
}

impl Changed for () {
    fn changed(&self) -> bool {
        true
    }
}

impl Changed for bool {
    fn changed(&self) -> bool {
        *self
    }
}

impl Changed for usize {
    fn changed(&self) -> bool {
        true
    }
}
