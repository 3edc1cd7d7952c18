//! Non-blocking change-event publisher with a bounded outbound buffer.

use crate::config::EventsConfig;
use crate::error::{Error, Result};
use crate::events::{DataChange, DataChangeSubscriber, OverflowPolicy};

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::{Notify, watch};
use tokio::task::JoinHandle;

struct Outbox {
    events: Mutex<VecDeque<DataChange>>,
    notify: Notify,
    capacity: usize,
    overflow_policy: OverflowPolicy,
}

/// Buffers [`DataChange`]s for a background delivery task.
///
/// `publish_async` never waits: it either buffers the event or applies the
/// overflow policy. The delivery task hands every event to every subscriber,
/// logging subscriber failures.
#[derive(Clone)]
pub struct ChangeEventPublisher {
    outbox: Arc<Outbox>,
}

impl ChangeEventPublisher {
    pub fn new(config: &EventsConfig) -> Self {
        Self {
            outbox: Arc::new(Outbox {
                events: Mutex::new(VecDeque::with_capacity(config.capacity)),
                notify: Notify::new(),
                capacity: config.capacity.max(1),
                overflow_policy: config.overflow_policy,
            }),
        }
    }

    /// Buffer `event` for delivery.
    ///
    /// Under `drop_newest` a full buffer rejects the event with
    /// [`Error::Publish`]; under `drop_oldest` the oldest buffered event is
    /// evicted and this call succeeds.
    pub fn publish_async(&self, event: DataChange) -> Result<()> {
        {
            let mut events = self.outbox.events.lock();
            if events.len() >= self.outbox.capacity {
                match self.outbox.overflow_policy {
                    OverflowPolicy::DropNewest => {
                        return Err(Error::Publish {
                            event_type: event.event_type,
                            reason: "event buffer is full".to_string(),
                        });
                    }
                    OverflowPolicy::DropOldest => {
                        if let Some(evicted) = events.pop_front() {
                            tracing::warn!(
                                event_type = %evicted.event_type,
                                entity_id = %evicted.entity.id(),
                                "event buffer full, dropped oldest change event"
                            );
                        }
                    }
                }
            }
            events.push_back(event);
        }

        self.outbox.notify.notify_one();
        Ok(())
    }

    /// Number of buffered, undelivered events.
    pub fn pending(&self) -> usize {
        self.outbox.events.lock().len()
    }

    fn pop(&self) -> Option<DataChange> {
        self.outbox.events.lock().pop_front()
    }

    /// Deliver buffered events until `shutdown` flips to `true`, then flush
    /// whatever is still buffered and stop.
    pub fn spawn_delivery(
        &self,
        subscribers: Vec<Arc<dyn DataChangeSubscriber>>,
        mut shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        let publisher = self.clone();

        tokio::spawn(async move {
            loop {
                if let Some(event) = publisher.pop() {
                    deliver(&subscribers, &event).await;
                    continue;
                }

                tokio::select! {
                    _ = publisher.outbox.notify.notified() => {}
                    _ = shutdown.wait_for(|stop| *stop) => break,
                }
            }

            while let Some(event) = publisher.pop() {
                deliver(&subscribers, &event).await;
            }

            tracing::debug!("change event delivery stopped");
        })
    }
}

async fn deliver(subscribers: &[Arc<dyn DataChangeSubscriber>], event: &DataChange) {
    for subscriber in subscribers {
        if let Err(error) = subscriber.handle(event).await {
            tracing::warn!(
                %error,
                subscriber = subscriber.name(),
                event_type = %event.event_type,
                entity_id = %event.entity.id(),
                "change event subscriber failed"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::ChangeAction;
    use crate::types::{RecordMetadata, ValidIngredient};
    use std::time::Duration;

    #[derive(Default)]
    struct Recording {
        seen: Mutex<Vec<String>>,
    }

    #[async_trait::async_trait]
    impl DataChangeSubscriber for Recording {
        fn name(&self) -> &str {
            "recording"
        }

        async fn handle(&self, change: &DataChange) -> Result<()> {
            self.seen.lock().push(change.entity.id().to_string());
            Ok(())
        }
    }

    struct Failing;

    #[async_trait::async_trait]
    impl DataChangeSubscriber for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        async fn handle(&self, _change: &DataChange) -> Result<()> {
            Err(Error::Cancelled)
        }
    }

    fn change(id: &str) -> DataChange {
        DataChange::new(
            ChangeAction::Created,
            ValidIngredient {
                metadata: RecordMetadata {
                    id: id.into(),
                    ..Default::default()
                },
                name: id.into(),
                ..Default::default()
            },
            "user-1",
        )
    }

    fn publisher(capacity: usize, overflow_policy: OverflowPolicy) -> ChangeEventPublisher {
        ChangeEventPublisher::new(&EventsConfig {
            capacity,
            overflow_policy,
        })
    }

    fn pending_ids(publisher: &ChangeEventPublisher) -> Vec<String> {
        publisher
            .outbox
            .events
            .lock()
            .iter()
            .map(|event| event.entity.id().to_string())
            .collect()
    }

    #[test]
    fn drop_newest_rejects_when_full() {
        let publisher = publisher(2, OverflowPolicy::DropNewest);
        publisher.publish_async(change("a")).expect("a");
        publisher.publish_async(change("b")).expect("b");

        let error = publisher.publish_async(change("c")).unwrap_err();
        assert!(matches!(error, Error::Publish { .. }));
        assert_eq!(pending_ids(&publisher), vec!["a", "b"]);
    }

    #[test]
    fn drop_oldest_evicts_to_make_room() {
        let publisher = publisher(2, OverflowPolicy::DropOldest);
        for id in ["a", "b", "c"] {
            publisher.publish_async(change(id)).expect("publish");
        }

        assert_eq!(pending_ids(&publisher), vec!["b", "c"]);
    }

    #[tokio::test]
    async fn delivers_every_event_to_every_subscriber() {
        let publisher = publisher(16, OverflowPolicy::DropNewest);
        let first = Arc::new(Recording::default());
        let second = Arc::new(Recording::default());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let subscribers: Vec<Arc<dyn DataChangeSubscriber>> =
            vec![first.clone(), Arc::new(Failing), second.clone()];
        let handle = publisher.spawn_delivery(subscribers, shutdown_rx);

        publisher.publish_async(change("a")).expect("a");
        publisher.publish_async(change("b")).expect("b");

        for _ in 0..100 {
            if second.seen.lock().len() == 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        assert_eq!(*first.seen.lock(), vec!["a", "b"]);
        assert_eq!(*second.seen.lock(), vec!["a", "b"]);

        shutdown_tx.send(true).expect("signal shutdown");
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("delivery stops")
            .expect("delivery task");
    }

    #[tokio::test]
    async fn shutdown_flushes_buffered_events() {
        let publisher = publisher(16, OverflowPolicy::DropNewest);
        let recording = Arc::new(Recording::default());
        publisher.publish_async(change("a")).expect("a");

        let (shutdown_tx, shutdown_rx) = watch::channel(true);
        let handle = publisher.spawn_delivery(vec![recording.clone()], shutdown_rx);
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("delivery stops")
            .expect("delivery task");
        drop(shutdown_tx);

        assert_eq!(*recording.seen.lock(), vec!["a"]);
        assert_eq!(publisher.pending(), 0);
    }
}
