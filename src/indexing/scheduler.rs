//! Periodic backlog sweep that feeds the index queue.

use crate::error::{Error, Result};
use crate::indexing::{IndexQueue, IndexRequest, IndexType};
use crate::store::{DataStore, EntityStore};
use crate::types::{
    Indexable, Meal, Recipe, ValidIngredient, ValidIngredientState, ValidInstrument,
    ValidMeasurementUnit, ValidPreparation, ValidVessel,
};

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Outcome of one sweep over every index type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickStats {
    pub enqueued: usize,
    /// Backlog ids skipped because a request for the row is still queued.
    pub already_queued: usize,
    /// Backlog ids that did not fit in the queue this tick.
    pub deferred: usize,
    /// Index types whose backlog query failed.
    pub failed_queries: usize,
}

/// Enqueues one non-delete [`IndexRequest`] per backlog row, for every index type.
///
/// Enqueueing is best-effort: a full queue or a failed backlog query is logged
/// and left for the next tick. A row whose request from an earlier tick is
/// still waiting in the queue is not enqueued twice. Archived rows never show
/// up here; their delete requests come from change events.
pub struct IndexingScheduler<S> {
    store: Arc<S>,
    queue: IndexQueue,
    interval: Duration,
}

impl<S: DataStore> IndexingScheduler<S> {
    pub fn new(store: Arc<S>, queue: IndexQueue, interval: Duration) -> Self {
        Self {
            store,
            queue,
            interval,
        }
    }

    async fn backlog(&self, index_type: IndexType) -> Result<Vec<String>> {
        match index_type {
            IndexType::Recipes => self.backlog_for::<Recipe>().await,
            IndexType::Meals => self.backlog_for::<Meal>().await,
            IndexType::ValidIngredients => self.backlog_for::<ValidIngredient>().await,
            IndexType::ValidInstruments => self.backlog_for::<ValidInstrument>().await,
            IndexType::ValidMeasurementUnits => self.backlog_for::<ValidMeasurementUnit>().await,
            IndexType::ValidPreparations => self.backlog_for::<ValidPreparation>().await,
            IndexType::ValidIngredientStates => self.backlog_for::<ValidIngredientState>().await,
            IndexType::ValidVessels => self.backlog_for::<ValidVessel>().await,
        }
    }

    async fn backlog_for<K>(&self) -> Result<Vec<String>>
    where
        K: Indexable,
        S: EntityStore<K>,
    {
        EntityStore::<K>::ids_needing_search_indexing(self.store.as_ref()).await
    }

    /// Run one sweep. Only a closed queue is an error.
    pub async fn tick(&self) -> Result<TickStats> {
        if self.queue.is_closed() {
            return Err(Error::Publish {
                event_type: "index_request".to_string(),
                reason: "index queue is closed".to_string(),
            });
        }

        let mut stats = TickStats::default();

        for index_type in IndexType::ALL {
            let ids = match self.backlog(index_type).await {
                Ok(ids) => ids,
                Err(error) => {
                    tracing::warn!(%error, %index_type, "failed to query search indexing backlog");
                    stats.failed_queries += 1;
                    continue;
                }
            };

            let total = ids.len();
            for (position, id) in ids.into_iter().enumerate() {
                let request = IndexRequest::new(index_type, id, false);
                match self.queue.try_enqueue_unique(&request) {
                    Ok(true) => stats.enqueued += 1,
                    Ok(false) => stats.already_queued += 1,
                    Err(error) => {
                        let deferred = total - position;
                        tracing::warn!(
                            %error,
                            %index_type,
                            deferred,
                            "could not enqueue index request, deferring to next tick"
                        );
                        stats.deferred += deferred;
                        break;
                    }
                }
            }
        }

        if stats.enqueued > 0 || stats.deferred > 0 {
            tracing::info!(
                enqueued = stats.enqueued,
                already_queued = stats.already_queued,
                deferred = stats.deferred,
                failed_queries = stats.failed_queries,
                "search indexing backlog sweep complete"
            );
        }

        Ok(stats)
    }

    /// Tick every `interval` until `shutdown` flips to `true` or the queue closes.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(error) = self.tick().await {
                        tracing::info!(%error, "stopping indexing scheduler");
                        break;
                    }
                }
                _ = async { let _ = shutdown.wait_for(|stop| *stop).await; } => break,
            }
        }

        tracing::debug!("indexing scheduler stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indexing::index_queue;
    use crate::store::SqliteDataStore;
    use crate::types::{ValidIngredient, ValidVessel};

    async fn store() -> Arc<SqliteDataStore> {
        Arc::new(SqliteDataStore::in_memory().await.expect("store"))
    }

    #[tokio::test]
    async fn empty_backlog_enqueues_nothing() {
        let (queue, receiver) = index_queue(8);
        let scheduler = IndexingScheduler::new(store().await, queue, Duration::from_secs(60));

        assert_eq!(scheduler.tick().await.expect("tick"), TickStats::default());
        assert!(receiver.try_next().await.is_none());
    }

    #[tokio::test]
    async fn enqueues_one_request_per_backlog_row() {
        let store = store().await;
        let kale = store
            .create(ValidIngredient {
                name: "kale".into(),
                ..Default::default()
            })
            .await
            .expect("create ingredient");
        let wok = store
            .create(ValidVessel {
                name: "wok".into(),
                ..Default::default()
            })
            .await
            .expect("create vessel");

        let (queue, receiver) = index_queue(8);
        let scheduler = IndexingScheduler::new(store, queue, Duration::from_secs(60));
        let stats = scheduler.tick().await.expect("tick");
        assert_eq!(stats.enqueued, 2);

        let mut requests = Vec::new();
        while let Some(payload) = receiver.try_next().await {
            requests.push(IndexRequest::from_bytes(&payload).expect("decode"));
        }

        assert_eq!(requests.len(), 2);
        assert!(requests.iter().all(|request| !request.delete));
        assert!(requests.iter().any(|request| {
            request.index_type == "valid_ingredients" && request.row_id == kale.metadata.id
        }));
        assert!(requests.iter().any(|request| {
            request.index_type == "vessels" && request.row_id == wok.metadata.id
        }));
    }

    #[tokio::test]
    async fn full_queue_defers_the_rest_to_the_next_tick() {
        let store = store().await;
        for name in ["kale", "leek", "okra"] {
            store
                .create(ValidIngredient {
                    name: name.into(),
                    ..Default::default()
                })
                .await
                .expect("create");
        }

        let (queue, receiver) = index_queue(1);
        let scheduler = IndexingScheduler::new(store, queue, Duration::from_secs(60));

        let stats = scheduler.tick().await.expect("tick");
        assert_eq!(stats.enqueued, 1);
        assert_eq!(stats.deferred, 2);

        // Nothing was marked, so draining the queue lets the next tick retry.
        receiver.try_next().await.expect("queued request");
        assert_eq!(scheduler.tick().await.expect("second tick").enqueued, 1);
    }

    #[tokio::test]
    async fn rows_still_queued_are_not_enqueued_again() {
        let store = store().await;
        for name in ["kale", "leek"] {
            store
                .create(ValidIngredient {
                    name: name.into(),
                    ..Default::default()
                })
                .await
                .expect("create");
        }

        let (queue, receiver) = index_queue(8);
        let scheduler = IndexingScheduler::new(store, queue, Duration::from_secs(60));
        assert_eq!(scheduler.tick().await.expect("first tick").enqueued, 2);

        // Workers have not caught up; the second sweep adds nothing.
        let stats = scheduler.tick().await.expect("second tick");
        assert_eq!(stats.enqueued, 0);
        assert_eq!(stats.already_queued, 2);

        receiver.try_next().await.expect("queued request");
        let stats = scheduler.tick().await.expect("third tick");
        assert_eq!(stats.enqueued, 1);
        assert_eq!(stats.already_queued, 1);

        let mut queued = 0;
        while receiver.try_next().await.is_some() {
            queued += 1;
        }
        assert_eq!(queued, 2);
    }

    #[tokio::test]
    async fn closed_queue_fails_the_tick() {
        let (queue, receiver) = index_queue(8);
        drop(receiver);
        let scheduler = IndexingScheduler::new(store().await, queue, Duration::from_secs(60));

        assert!(scheduler.tick().await.is_err());
    }

    #[tokio::test]
    async fn run_stops_on_shutdown() {
        let (queue, _receiver) = index_queue(8);
        let scheduler = IndexingScheduler::new(store().await, queue, Duration::from_millis(10));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(scheduler.run(shutdown_rx));
        tokio::time::sleep(Duration::from_millis(30)).await;
        shutdown_tx.send(true).expect("signal shutdown");

        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("scheduler stops")
            .expect("scheduler task");
    }
}
