use crate::error::Result;
use crate::events::{ChangeAction, DataChange};
use crate::indexing::{IndexQueue, IndexRequest};

/// A consumer of published [`DataChange`]s.
#[async_trait::async_trait]
pub trait DataChangeSubscriber: Send + Sync {
    fn name(&self) -> &str;

    async fn handle(&self, change: &DataChange) -> Result<()>;
}

/// Turns data changes into index requests: archives become deletes,
/// everything else a (re)index.
pub struct IndexingSubscriber {
    queue: IndexQueue,
}

impl IndexingSubscriber {
    pub fn new(queue: IndexQueue) -> Self {
        Self { queue }
    }

    pub fn request_for(change: &DataChange) -> IndexRequest {
        let delete = change.action() == Some(ChangeAction::Archived);
        IndexRequest::new(change.entity.index_type(), change.entity.id(), delete)
    }
}

#[async_trait::async_trait]
impl DataChangeSubscriber for IndexingSubscriber {
    fn name(&self) -> &str {
        "search_indexing"
    }

    async fn handle(&self, change: &DataChange) -> Result<()> {
        let request = Self::request_for(change);
        // Archived rows leave the backlog, so a delete dropped here would never
        // be retried. Wait for queue space instead of failing fast.
        self.queue.enqueue(&request).await?;

        tracing::debug!(
            event_type = %change.event_type,
            row_id = %request.row_id,
            delete = request.delete,
            "queued index request for data change"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indexing::{IndexType, index_queue};
    use crate::types::{Recipe, RecordMetadata};

    fn recipe() -> Recipe {
        Recipe {
            metadata: RecordMetadata {
                id: "recipe-1".into(),
                ..Default::default()
            },
            name: "Carnitas".into(),
            ..Default::default()
        }
    }

    #[test]
    fn archives_become_deletes() {
        let archived = DataChange::new(ChangeAction::Archived, recipe(), "user-1");
        let request = IndexingSubscriber::request_for(&archived);
        assert!(request.delete);
        assert_eq!(request.row_id, "recipe-1");
        assert_eq!(request.parsed_index_type().expect("type"), IndexType::Recipes);

        let updated = DataChange::new(ChangeAction::Updated, recipe(), "user-1");
        assert!(!IndexingSubscriber::request_for(&updated).delete);
    }

    #[tokio::test]
    async fn handle_puts_the_request_on_the_queue() {
        let (queue, receiver) = index_queue(4);
        let subscriber = IndexingSubscriber::new(queue);

        subscriber
            .handle(&DataChange::new(ChangeAction::Created, recipe(), "user-1"))
            .await
            .expect("handle");

        let payload = receiver.try_next().await.expect("queued");
        let request = IndexRequest::from_bytes(&payload).expect("decode");
        assert_eq!(request.index_type, "recipes");
        assert!(!request.delete);
    }
}
