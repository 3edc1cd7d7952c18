//! CRUD handlers shared by every entity collection.
//!
//! Each handler is generic over the entity kind `K`; the router instantiates
//! them once per collection under `/api/v1/<collection>`. Mutations publish a
//! [`DataChange`] so the search index follows the datastore.

use super::response::{ApiError, ApiResponse};
use super::session::RequestContext;
use super::state::{ApiState, cache_key};
use crate::error::Error;
use crate::events::{ChangeAction, DataChange};
use crate::store::{DataStore, EntityStore, QueryFilter};
use crate::types::Indexable;

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use serde::Deserialize;
use std::sync::Arc;

/// Raw pagination parameters. Unparseable values fall back to defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageParams {
    pub page: Option<String>,
    pub limit: Option<String>,
}

impl PageParams {
    pub fn filter(&self) -> QueryFilter {
        QueryFilter::new(parse_lenient(&self.page), parse_lenient(&self.limit))
    }
}

pub(super) fn parse_lenient(value: &Option<String>) -> Option<u32> {
    value.as_deref().and_then(|raw| raw.trim().parse().ok())
}

fn store_failure(context: &RequestContext, action: &str, index_type: &str, error: &Error) -> ApiError {
    if !error.is_not_found() {
        tracing::warn!(%error, trace_id = %context.trace_id, index_type, "{action} failed");
    }
    ApiError::from_error(error, context.details())
}

fn decode_body<K: Indexable>(context: &RequestContext, body: &Bytes) -> Result<K, ApiError> {
    serde_json::from_slice(body).map_err(|error| {
        tracing::debug!(%error, trace_id = %context.trace_id, index_type = %K::INDEX_TYPE, "invalid request body");
        ApiError::invalid_content(context.details())
    })
}

pub(super) async fn create_entity<K, S>(
    State(state): State<Arc<ApiState<S>>>,
    context: RequestContext,
    body: Bytes,
) -> Result<(StatusCode, Json<ApiResponse<K>>), ApiError>
where
    K: Indexable,
    S: DataStore + EntityStore<K>,
{
    let session = context.session()?;
    let input: K = decode_body(&context, &body)?;
    input
        .validate()
        .map_err(|error| ApiError::from_error(&error, context.details()))?;

    let created = EntityStore::<K>::create(state.store.as_ref(), input)
        .await
        .map_err(|error| store_failure(&context, "create", K::INDEX_TYPE.as_str(), &error))?;

    tracing::debug!(trace_id = %context.trace_id, index_type = %K::INDEX_TYPE, id = created.id(), "created entity");
    state.publish(DataChange::new(
        ChangeAction::Created,
        created.clone(),
        session.user_id.clone(),
    ));

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::data(created, context.details())),
    ))
}

pub(super) async fn read_entity<K, S>(
    State(state): State<Arc<ApiState<S>>>,
    context: RequestContext,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<K>>, ApiError>
where
    K: Indexable,
    S: DataStore + EntityStore<K>,
{
    context.session()?;
    let key = cache_key::<K>(&id);

    match state.cache.get(&key).await {
        Ok(cached) => match serde_json::from_value::<K>(cached) {
            Ok(entity) => return Ok(Json(ApiResponse::data(entity, context.details()))),
            Err(error) => {
                tracing::debug!(%error, key = %key, "discarding undecodable cache entry");
            }
        },
        Err(error) if error.is_not_found() => {}
        Err(error) => {
            tracing::warn!(%error, key = %key, "cache read failed, reading from database");
        }
    }

    let entity = EntityStore::<K>::get(state.store.as_ref(), &id)
        .await
        .map_err(|error| store_failure(&context, "read", K::INDEX_TYPE.as_str(), &error))?;

    populate_cache(state.as_ref(), &key, &entity).await;

    Ok(Json(ApiResponse::data(entity, context.details())))
}

/// Cache a database read, then re-read the row and drop the entry unless it
/// still matches. A write committed after our read invalidates the key before
/// the fill; the re-read catches that case.
async fn populate_cache<K, S>(state: &ApiState<S>, key: &str, entity: &K)
where
    K: Indexable,
    S: DataStore + EntityStore<K>,
{
    let value = match serde_json::to_value(entity) {
        Ok(value) => value,
        Err(error) => {
            tracing::warn!(%error, key, "failed to encode entity for cache");
            return;
        }
    };

    if let Err(error) = state.cache.set(key, &value).await {
        tracing::warn!(%error, key, "failed to populate cache");
        return;
    }

    let unchanged = match EntityStore::<K>::get(state.store.as_ref(), entity.id()).await {
        Ok(current) => serde_json::to_value(&current).is_ok_and(|current| current == value),
        Err(_) => false,
    };
    if !unchanged {
        tracing::debug!(key, "row changed while caching, dropping cache entry");
        if let Err(error) = state.cache.delete(key).await {
            tracing::warn!(%error, key, "failed to drop stale cache entry");
        }
    }
}

pub(super) async fn list_entities<K, S>(
    State(state): State<Arc<ApiState<S>>>,
    context: RequestContext,
    Query(params): Query<PageParams>,
) -> Result<Json<ApiResponse<Vec<K>>>, ApiError>
where
    K: Indexable,
    S: DataStore + EntityStore<K>,
{
    context.session()?;
    let filter = params.filter();

    let result = EntityStore::<K>::search_for(state.store.as_ref(), "", &filter)
        .await
        .map_err(|error| store_failure(&context, "list", K::INDEX_TYPE.as_str(), &error))?;

    Ok(Json(ApiResponse::page(
        result.data,
        result.pagination,
        context.details(),
    )))
}

pub(super) async fn update_entity<K, S>(
    State(state): State<Arc<ApiState<S>>>,
    context: RequestContext,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<ApiResponse<K>>, ApiError>
where
    K: Indexable,
    S: DataStore + EntityStore<K>,
{
    let session = context.session()?;
    let mut input: K = decode_body(&context, &body)?;
    input.metadata_mut().id = id;
    input
        .validate()
        .map_err(|error| ApiError::from_error(&error, context.details()))?;

    let updated = EntityStore::<K>::update(state.store.as_ref(), input)
        .await
        .map_err(|error| store_failure(&context, "update", K::INDEX_TYPE.as_str(), &error))?;

    state.invalidate::<K>(updated.id()).await;
    state.publish(DataChange::new(
        ChangeAction::Updated,
        updated.clone(),
        session.user_id.clone(),
    ));

    Ok(Json(ApiResponse::data(updated, context.details())))
}

pub(super) async fn archive_entity<K, S>(
    State(state): State<Arc<ApiState<S>>>,
    context: RequestContext,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<()>>, ApiError>
where
    K: Indexable,
    S: DataStore + EntityStore<K>,
{
    let session = context.session()?;

    let existing = EntityStore::<K>::get(state.store.as_ref(), &id)
        .await
        .map_err(|error| store_failure(&context, "archive", K::INDEX_TYPE.as_str(), &error))?;

    EntityStore::<K>::archive(state.store.as_ref(), &id)
        .await
        .map_err(|error| store_failure(&context, "archive", K::INDEX_TYPE.as_str(), &error))?;

    state.invalidate::<K>(&id).await;
    state.publish(DataChange::new(
        ChangeAction::Archived,
        existing,
        session.user_id.clone(),
    ));

    Ok(Json(ApiResponse::empty(context.details())))
}
