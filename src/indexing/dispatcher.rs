//! Routes index requests to the typed index and datastore for their kind.

use crate::error::{Error, Result};
use crate::indexing::{IndexRequest, IndexType};
use crate::search::{Index, SearchIndexes};
use crate::store::{DataStore, EntityStore};
use crate::types::{
    Indexable, Meal, Recipe, ValidIngredient, ValidIngredientState, ValidInstrument,
    ValidMeasurementUnit, ValidPreparation, ValidVessel,
};

use std::sync::Arc;

/// Applies one [`IndexRequest`] end to end.
///
/// `handle` returns `Ok` only once the whole effect has landed: the projection
/// written and the row marked as indexed, or the projection deleted. Any
/// failure leaves the row in the backlog for the next scheduler tick.
pub struct IndexDispatcher<S> {
    store: Arc<S>,
    indexes: SearchIndexes,
}

impl<S> Clone for IndexDispatcher<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            indexes: self.indexes.clone(),
        }
    }
}

impl<S: DataStore> IndexDispatcher<S> {
    pub fn new(store: Arc<S>, indexes: SearchIndexes) -> Self {
        Self { store, indexes }
    }

    /// Decode a queue payload and handle it.
    pub async fn handle_message(&self, payload: &[u8]) -> Result<()> {
        let request = IndexRequest::from_bytes(payload)?;
        self.handle(request).await
    }

    pub async fn handle(&self, request: IndexRequest) -> Result<()> {
        let Ok(index_type) = request.parsed_index_type() else {
            tracing::warn!(
                request_id = %request.request_id,
                index_type = %request.index_type,
                row_id = %request.row_id,
                "dropping index request with unknown index type"
            );
            return Ok(());
        };

        if request.row_id.trim().is_empty() {
            return Err(Error::InvalidRequest(format!(
                "index request {} has no row id",
                request.request_id
            )));
        }

        match index_type {
            IndexType::Recipes => self.apply::<Recipe>(&request).await,
            IndexType::Meals => self.apply::<Meal>(&request).await,
            IndexType::ValidIngredients => self.apply::<ValidIngredient>(&request).await,
            IndexType::ValidInstruments => self.apply::<ValidInstrument>(&request).await,
            IndexType::ValidMeasurementUnits => {
                self.apply::<ValidMeasurementUnit>(&request).await
            }
            IndexType::ValidPreparations => self.apply::<ValidPreparation>(&request).await,
            IndexType::ValidIngredientStates => {
                self.apply::<ValidIngredientState>(&request).await
            }
            IndexType::ValidVessels => self.apply::<ValidVessel>(&request).await,
        }
    }

    async fn apply<K>(&self, request: &IndexRequest) -> Result<()>
    where
        K: Indexable,
        S: EntityStore<K>,
    {
        let index = K::search_index(&self.indexes);
        let row_id = request.row_id.as_str();

        if request.delete {
            index.delete(row_id).await?;
            tracing::debug!(
                request_id = %request.request_id,
                index_type = %K::INDEX_TYPE,
                row_id,
                "removed row from search index"
            );
            return Ok(());
        }

        let entity = EntityStore::<K>::get(self.store.as_ref(), row_id).await?;
        let version = entity.metadata().version();
        let projection = entity.to_search_subset();
        index.index(row_id, &projection).await?;
        EntityStore::<K>::mark_as_indexed(self.store.as_ref(), row_id, version).await?;

        tracing::debug!(
            request_id = %request.request_id,
            index_type = %K::INDEX_TYPE,
            row_id,
            "indexed row"
        );

        Ok(())
    }
}
