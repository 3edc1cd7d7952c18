//! HTTP server setup: router, entity collections and health routes.

use super::entities::{archive_entity, create_entity, list_entities, read_entity, update_entity};
use super::search::search_entities;
use super::state::ApiState;
use crate::store::{DataStore, EntityStore};
use crate::types::{
    Indexable, Meal, Recipe, ValidIngredient, ValidIngredientState, ValidInstrument,
    ValidMeasurementUnit, ValidPreparation, ValidVessel,
};

use axum::Router;
use axum::extract::State;
use axum::response::Json;
use axum::routing::get;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Start the HTTP server on the given address.
///
/// Returns a handle that resolves when the server shuts down. The caller
/// passes a `tokio::sync::watch::Receiver<bool>` for graceful shutdown.
pub async fn start_http_server<S: DataStore>(
    bind: SocketAddr,
    state: Arc<ApiState<S>>,
    shutdown_rx: tokio::sync::watch::Receiver<bool>,
) -> anyhow::Result<tokio::task::JoinHandle<()>> {
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(bind).await?;
    tracing::info!(%bind, "HTTP server listening");

    let handle = tokio::spawn(async move {
        let mut shutdown = shutdown_rx;
        if let Err(error) = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.wait_for(|v| *v).await;
            })
            .await
        {
            tracing::error!(%error, "HTTP server stopped with an error");
        }
    });

    Ok(handle)
}

pub fn router<S: DataStore>(state: Arc<ApiState<S>>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let v1 = Router::new();
    let v1 = nest_collection::<Recipe, S>(v1);
    let v1 = nest_collection::<Meal, S>(v1);
    let v1 = nest_collection::<ValidIngredient, S>(v1);
    let v1 = nest_collection::<ValidInstrument, S>(v1);
    let v1 = nest_collection::<ValidMeasurementUnit, S>(v1);
    let v1 = nest_collection::<ValidPreparation, S>(v1);
    let v1 = nest_collection::<ValidIngredientState, S>(v1);
    let v1 = nest_collection::<ValidVessel, S>(v1);

    let api_routes = Router::new()
        .route("/health", get(health))
        .route("/status", get(status::<S>))
        .nest("/v1", v1);

    Router::new()
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

fn nest_collection<K, S>(router: Router<Arc<ApiState<S>>>) -> Router<Arc<ApiState<S>>>
where
    K: Indexable,
    S: DataStore + EntityStore<K>,
{
    let collection = Router::new()
        .route("/", get(list_entities::<K, S>).post(create_entity::<K, S>))
        .route("/search", get(search_entities::<K, S>))
        .route(
            "/{id}",
            get(read_entity::<K, S>)
                .put(update_entity::<K, S>)
                .delete(archive_entity::<K, S>),
        );

    router.nest(&format!("/{}", K::INDEX_TYPE.route_segment()), collection)
}

// -- API handlers --

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn status<S: DataStore>(State(state): State<Arc<ApiState<S>>>) -> Json<serde_json::Value> {
    let uptime = state.started_at.elapsed();
    Json(serde_json::json!({
        "status": "running",
        "pid": std::process::id(),
        "uptime_seconds": uptime.as_secs(),
        "use_search_service": state.use_search_service,
        "pending_change_events": state.publisher.pending(),
    }))
}
