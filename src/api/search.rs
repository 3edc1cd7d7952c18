//! Full-text search with database fallback.
//!
//! The index answers the query with ranked projections; the datastore then
//! hydrates those ids into full entities, returned in index rank order. When
//! the search service is disabled, or the caller passes
//! `searchWithDatabase=true`, the datastore's own name search answers instead
//! and the index is never consulted.

use super::entities::parse_lenient;
use super::response::{ApiError, ApiResponse};
use super::session::RequestContext;
use super::state::ApiState;
use crate::error::Result;
use crate::search::{IndexSearcher, SearchSubset};
use crate::store::{DataStore, EntityStore, Pagination, QueryFilter, QueryFilteredResult};
use crate::types::Indexable;

use axum::Json;
use axum::extract::{Query, State};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchParams {
    pub q: Option<String>,
    pub page: Option<String>,
    pub limit: Option<String>,
    #[serde(rename = "searchWithDatabase")]
    pub search_with_database: Option<String>,
}

impl SearchParams {
    pub fn query(&self) -> &str {
        self.q.as_deref().unwrap_or_default()
    }

    pub fn filter(&self) -> QueryFilter {
        QueryFilter::new(parse_lenient(&self.page), parse_lenient(&self.limit))
    }

    /// Only a literal `true` (any case, surrounding space ignored) opts in.
    pub fn search_with_database(&self) -> bool {
        self.search_with_database
            .as_deref()
            .is_some_and(|value| value.trim().eq_ignore_ascii_case("true"))
    }
}

pub(super) async fn search_entities<K, S>(
    State(state): State<Arc<ApiState<S>>>,
    context: RequestContext,
    Query(params): Query<SearchParams>,
) -> std::result::Result<Json<ApiResponse<Vec<K>>>, ApiError>
where
    K: Indexable,
    S: DataStore + EntityStore<K>,
{
    context.session()?;

    let query = params.query();
    let filter = params.filter();
    let use_database = !state.use_search_service || params.search_with_database();

    tracing::debug!(
        trace_id = %context.trace_id,
        index_type = %K::INDEX_TYPE,
        query,
        use_database,
        "searching"
    );

    let result = if use_database {
        EntityStore::<K>::search_for(state.store.as_ref(), query, &filter).await
    } else {
        let index = K::search_index(&state.indexes);
        let ids = match ranked_ids(index.as_ref(), query, &filter).await {
            Ok(ids) => ids,
            Err(error) => {
                tracing::warn!(
                    %error,
                    trace_id = %context.trace_id,
                    index_type = %K::INDEX_TYPE,
                    "search index query failed"
                );
                return Err(ApiError::database(context.details()));
            }
        };
        hydrate::<K, S>(state.store.as_ref(), &ids, &filter).await
    };

    let result = match result {
        Ok(result) => result,
        Err(error) if error.is_not_found() => QueryFilteredResult {
            data: Vec::new(),
            pagination: Pagination::synthesized(&filter, 0),
        },
        Err(error) => {
            tracing::warn!(
                %error,
                trace_id = %context.trace_id,
                index_type = %K::INDEX_TYPE,
                "search failed"
            );
            return Err(ApiError::database(context.details()));
        }
    };

    Ok(Json(ApiResponse::page(
        result.data,
        result.pagination,
        context.details(),
    )))
}

/// Deepest rank an index-backed search page can reach. Pages starting at or
/// past it come back empty without querying the index.
pub const MAX_SEARCH_WINDOW: u64 = 10_000;

/// Ids on the requested page of the index's ranked results.
async fn ranked_ids<T, I>(index: &I, query: &str, filter: &QueryFilter) -> Result<Vec<String>>
where
    T: SearchSubset,
    I: IndexSearcher<T> + ?Sized,
{
    let offset = filter.offset();
    if offset >= MAX_SEARCH_WINDOW {
        return Ok(Vec::new());
    }

    let window = (offset + u64::from(filter.limit)).min(MAX_SEARCH_WINDOW) as usize;
    let hits = index.search(query, window).await?;

    Ok(hits
        .iter()
        .skip(filter.offset() as usize)
        .take(filter.limit as usize)
        .map(|hit| hit.id().to_string())
        .collect())
}

/// Load `ids` from the datastore in the given order. Ids the datastore no
/// longer serves (archived since they were indexed) are dropped.
async fn hydrate<K, S>(
    store: &S,
    ids: &[String],
    filter: &QueryFilter,
) -> Result<QueryFilteredResult<K>>
where
    K: Indexable,
    S: EntityStore<K>,
{
    if ids.is_empty() {
        return Ok(QueryFilteredResult {
            data: Vec::new(),
            pagination: Pagination::synthesized(filter, 0),
        });
    }

    let mut by_id: HashMap<String, K> = store
        .get_with_ids(ids)
        .await?
        .into_iter()
        .map(|entity| (entity.id().to_string(), entity))
        .collect();

    let data: Vec<K> = ids.iter().filter_map(|id| by_id.remove(id)).collect();
    let pagination = Pagination::synthesized(filter, data.len());
    Ok(QueryFilteredResult { data, pagination })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::{context, fixture, fixture_with, response_json};
    use crate::api::entities::{archive_entity, create_entity};
    use crate::error::{Error, SearchError};
    use crate::events::{ChangeEventPublisher, DataChange, DataChangeSubscriber, IndexingSubscriber};
    use crate::indexing::IndexDispatcher;
    use crate::indexing::subsets::ValidPreparationSearchSubset;
    use crate::search::{Index, SearchIndexes};
    use crate::store::SqliteDataStore;
    use crate::types::{ValidIngredient, ValidPreparation};

    use axum::body::Bytes;
    use axum::extract::Path;
    use axum::http::StatusCode;
    use axum::response::IntoResponse;

    struct FailingIndex;

    #[async_trait::async_trait]
    impl IndexSearcher<ValidPreparationSearchSubset> for FailingIndex {
        async fn search(
            &self,
            _query: &str,
            _limit: usize,
        ) -> Result<Vec<ValidPreparationSearchSubset>> {
            Err(unavailable())
        }
    }

    #[async_trait::async_trait]
    impl Index<ValidPreparationSearchSubset> for FailingIndex {
        async fn index(&self, _id: &str, _value: &ValidPreparationSearchSubset) -> Result<()> {
            Err(unavailable())
        }

        async fn delete(&self, _id: &str) -> Result<()> {
            Err(unavailable())
        }

        async fn wipe(&self) -> Result<()> {
            Err(unavailable())
        }
    }

    fn unavailable() -> Error {
        SearchError::Unavailable {
            index: "valid_preparations".into(),
            reason: "connection refused".into(),
        }
        .into()
    }

    fn failing_preparations() -> SearchIndexes {
        let mut indexes = SearchIndexes::in_memory();
        indexes.valid_preparations = Arc::new(FailingIndex);
        indexes
    }

    fn params(q: &str) -> SearchParams {
        SearchParams {
            q: Some(q.into()),
            ..Default::default()
        }
    }

    fn names<K: Indexable>(response: &ApiResponse<Vec<K>>) -> Vec<String> {
        response
            .data
            .as_ref()
            .expect("data")
            .iter()
            .map(|entity| entity.name().to_string())
            .collect()
    }

    #[tokio::test]
    async fn index_results_are_hydrated_in_rank_order() {
        let fixture = fixture().await;
        let kale = fixture.create_ingredient("kale").await;
        let chard = fixture.create_ingredient("chard").await;
        let gone = fixture.create_ingredient("kale sprouts").await;

        let index = &fixture.state.indexes.valid_ingredients;
        for ingredient in [&chard, &kale, &gone] {
            index
                .index(ingredient.id(), &ingredient.to_search_subset())
                .await
                .expect("index");
        }
        EntityStore::<ValidIngredient>::archive(fixture.state.store.as_ref(), gone.id())
            .await
            .expect("archive");

        let Json(response) = search_entities::<ValidIngredient, SqliteDataStore>(
            State(fixture.state.clone()),
            context(),
            Query(params("kale")),
        )
        .await
        .expect("search");

        assert_eq!(names(&response), vec!["kale"]);
        let pagination = response.pagination.expect("pagination");
        assert_eq!(pagination.limit, QueryFilter::DEFAULT_LIMIT);
        assert_eq!(pagination.filtered_count, 1);
    }

    #[tokio::test]
    async fn index_failure_is_a_database_error() {
        let fixture = fixture_with(failing_preparations(), true).await;

        let error = search_entities::<ValidPreparation, SqliteDataStore>(
            State(fixture.state.clone()),
            context(),
            Query(params("dice")),
        )
        .await
        .unwrap_err();

        assert_eq!(error.status, StatusCode::INTERNAL_SERVER_ERROR);
        let json = response_json(error.into_response()).await;
        assert_eq!(json["error"]["code"], "ERR_TALKING_TO_DATABASE");
        assert_eq!(json["error"]["message"], "database error");
    }

    #[tokio::test]
    async fn search_with_database_skips_the_index() {
        let fixture = fixture_with(failing_preparations(), true).await;
        let dice = ValidPreparation {
            name: "dice".into(),
            ..Default::default()
        };
        EntityStore::<ValidPreparation>::create(fixture.state.store.as_ref(), dice)
            .await
            .expect("create");

        let Json(response) = search_entities::<ValidPreparation, SqliteDataStore>(
            State(fixture.state.clone()),
            context(),
            Query(SearchParams {
                q: Some("DIC".into()),
                search_with_database: Some(" TRUE ".into()),
                ..Default::default()
            }),
        )
        .await
        .expect("search");

        assert_eq!(names(&response), vec!["dice"]);
    }

    #[tokio::test]
    async fn disabled_search_service_always_uses_the_database() {
        let fixture = fixture_with(failing_preparations(), false).await;
        let dice = ValidPreparation {
            name: "dice".into(),
            ..Default::default()
        };
        EntityStore::<ValidPreparation>::create(fixture.state.store.as_ref(), dice)
            .await
            .expect("create");

        let Json(response) = search_entities::<ValidPreparation, SqliteDataStore>(
            State(fixture.state.clone()),
            context(),
            Query(params("dice")),
        )
        .await
        .expect("search");

        assert_eq!(names(&response), vec!["dice"]);
    }

    #[tokio::test]
    async fn no_hits_is_an_empty_page() {
        let fixture = fixture().await;

        let Json(response) = search_entities::<ValidIngredient, SqliteDataStore>(
            State(fixture.state.clone()),
            context(),
            Query(params("nothing")),
        )
        .await
        .expect("search");

        assert!(names(&response).is_empty());
        assert_eq!(response.pagination.expect("pagination").page, 1);
    }

    /// Records the result limit of every query it answers.
    #[derive(Default)]
    struct LimitRecorder {
        limits: parking_lot::Mutex<Vec<usize>>,
    }

    #[async_trait::async_trait]
    impl IndexSearcher<ValidPreparationSearchSubset> for LimitRecorder {
        async fn search(
            &self,
            _query: &str,
            limit: usize,
        ) -> Result<Vec<ValidPreparationSearchSubset>> {
            self.limits.lock().push(limit);
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn deep_pages_are_capped_before_reaching_the_index() {
        let index = LimitRecorder::default();

        let last_page = QueryFilter::new(Some(40), Some(250));
        ranked_ids(&index, "chop", &last_page).await.expect("last page");
        assert_eq!(*index.limits.lock(), vec![MAX_SEARCH_WINDOW as usize]);

        for page in [41, u32::MAX] {
            let ids = ranked_ids(&index, "chop", &QueryFilter::new(Some(page), Some(250)))
                .await
                .expect("deep page");
            assert!(ids.is_empty());
        }
        assert_eq!(index.limits.lock().len(), 1);
    }

    #[tokio::test]
    async fn huge_page_numbers_return_an_empty_page() {
        let fixture = fixture().await;
        fixture.create_ingredient("kale").await;

        let Json(response) = search_entities::<ValidIngredient, SqliteDataStore>(
            State(fixture.state.clone()),
            context(),
            Query(SearchParams {
                q: Some("kale".into()),
                page: Some(u32::MAX.to_string()),
                limit: Some("250".into()),
                ..Default::default()
            }),
        )
        .await
        .expect("search");

        assert!(names(&response).is_empty());
        assert_eq!(response.pagination.expect("pagination").page, u32::MAX);
    }

    #[tokio::test]
    async fn later_pages_skip_earlier_hits() {
        let fixture = fixture().await;
        let index = &fixture.state.indexes.valid_ingredients;
        for name in ["kale", "kale sprouts", "baby kale"] {
            let ingredient = fixture.create_ingredient(name).await;
            index
                .index(ingredient.id(), &ingredient.to_search_subset())
                .await
                .expect("index");
        }

        let first = search_entities::<ValidIngredient, SqliteDataStore>(
            State(fixture.state.clone()),
            context(),
            Query(SearchParams {
                q: Some("kale".into()),
                limit: Some("2".into()),
                ..Default::default()
            }),
        )
        .await
        .expect("first page");
        let second = search_entities::<ValidIngredient, SqliteDataStore>(
            State(fixture.state.clone()),
            context(),
            Query(SearchParams {
                q: Some("kale".into()),
                limit: Some("2".into()),
                page: Some("2".into()),
                ..Default::default()
            }),
        )
        .await
        .expect("second page");

        let mut seen = names(&first.0);
        assert_eq!(seen.len(), 2);
        let rest = names(&second.0);
        assert_eq!(rest.len(), 1);
        seen.extend(rest);
        seen.sort();
        assert_eq!(seen, vec!["baby kale", "kale", "kale sprouts"]);
    }

    #[tokio::test]
    async fn created_rows_become_searchable_and_archives_drop_out() {
        let fixture = fixture().await;
        let state = fixture.state.clone();
        let dispatcher = IndexDispatcher::new(state.store.clone(), state.indexes.clone());

        let created = create_entity::<ValidIngredient, SqliteDataStore>(
            State(state.clone()),
            context(),
            Bytes::from_static(
                br#"{"name": "kale", "pluralName": "kale", "description": ""}"#,
            ),
        )
        .await
        .expect("create");
        let id = created.1.0.data.expect("data").metadata.id;

        let change = take_change(&state.publisher).await;
        dispatcher
            .handle(IndexingSubscriber::request_for(&change))
            .await
            .expect("index");

        let Json(response) = search_entities::<ValidIngredient, SqliteDataStore>(
            State(state.clone()),
            context(),
            Query(params("kale")),
        )
        .await
        .expect("search");
        assert_eq!(names(&response), vec!["kale"]);
        assert!(response.error.is_none());

        archive_entity::<ValidIngredient, SqliteDataStore>(
            State(state.clone()),
            context(),
            Path(id),
        )
        .await
        .expect("archive");

        let change = take_change(&state.publisher).await;
        let request = IndexingSubscriber::request_for(&change);
        assert!(request.delete);
        dispatcher.handle(request).await.expect("delete");

        let Json(response) = search_entities::<ValidIngredient, SqliteDataStore>(
            State(state.clone()),
            context(),
            Query(params("kale")),
        )
        .await
        .expect("search");
        assert!(names(&response).is_empty());
    }

    async fn take_change(publisher: &ChangeEventPublisher) -> DataChange {
        let recorder = Arc::new(Recorder::default());
        let subscribers: Vec<Arc<dyn DataChangeSubscriber>> = vec![recorder.clone()];
        let (_shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(true);
        publisher
            .spawn_delivery(subscribers, shutdown_rx)
            .await
            .expect("delivery");
        recorder.take()
    }

    #[derive(Default)]
    struct Recorder {
        seen: parking_lot::Mutex<Vec<DataChange>>,
    }

    impl Recorder {
        fn take(&self) -> DataChange {
            self.seen.lock().pop().expect("one change delivered")
        }
    }

    #[async_trait::async_trait]
    impl DataChangeSubscriber for Recorder {
        fn name(&self) -> &str {
            "recorder"
        }

        async fn handle(&self, change: &DataChange) -> Result<()> {
            self.seen.lock().push(change.clone());
            Ok(())
        }
    }

    #[test]
    fn only_literal_true_selects_the_database() {
        let with = |value: &str| SearchParams {
            search_with_database: Some(value.into()),
            ..Default::default()
        };
        assert!(with("true").search_with_database());
        assert!(with(" True").search_with_database());
        assert!(!with("1").search_with_database());
        assert!(!with("yes").search_with_database());
        assert!(!SearchParams::default().search_with_database());
    }
}
