//! Dinner Done Better search service binary.

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use dinnerdonebetter::api::{ApiState, start_http_server};
use dinnerdonebetter::cache::provide_cache;
use dinnerdonebetter::config::Config;
use dinnerdonebetter::events::{ChangeEventPublisher, DataChangeSubscriber, IndexingSubscriber};
use dinnerdonebetter::indexing::{
    IndexDispatcher, IndexType, IndexingScheduler, index_queue, spawn_index_workers,
};
use dinnerdonebetter::search::{SearchBackend, SearchIndexes};
use dinnerdonebetter::store::{EntityStore, SqliteDataStore};
use dinnerdonebetter::types::{
    Meal, Recipe, ValidIngredient, ValidIngredientState, ValidInstrument, ValidMeasurementUnit,
    ValidPreparation, ValidVessel,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;

#[derive(Parser, Debug)]
#[command(name = "dinnerdonebetter")]
#[command(about = "Recipe catalog API with full-text search indexing")]
struct Cli {
    /// TOML configuration file, layered under DINNER_DONE_BETTER__* variables
    #[arg(short, long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP API, the indexing scheduler and the index workers
    Serve,
    /// Wipe one index and mark every row of that kind for re-indexing
    Reindex {
        /// Index type, e.g. `recipes` or `valid_ingredients`
        index_type: IndexType,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref()).context("failed to load configuration")?;
    let _log_guard = dinnerdonebetter::telemetry::init(&config.logging)?;

    match cli.command {
        Command::Serve => serve(config).await,
        Command::Reindex { index_type } => reindex(config, index_type).await,
    }
}

async fn open_store(config: &Config) -> anyhow::Result<Arc<SqliteDataStore>> {
    let store = SqliteDataStore::connect(&config.database)
        .await
        .context("failed to open datastore")?;
    Ok(Arc::new(store))
}

async fn serve(config: Config) -> anyhow::Result<()> {
    let store = open_store(&config).await?;
    let backend = SearchBackend::connect(&config.search)
        .await
        .context("failed to connect search backend")?;
    let indexes = SearchIndexes::provide(&backend).await?;
    let cache = provide_cache::<serde_json::Value>(&config.cache)?;

    // Intake (HTTP, scheduler, event delivery) stops before the workers, so the
    // events flushed on shutdown still reach a live queue.
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (workers_shutdown_tx, workers_shutdown_rx) = watch::channel(false);

    let (queue, receiver) = index_queue(config.indexing.queue_capacity);
    let dispatcher = IndexDispatcher::new(store.clone(), indexes.clone());
    let workers = spawn_index_workers(
        dispatcher,
        receiver,
        config.indexing.workers,
        config.indexing.request_timeout(),
        workers_shutdown_rx,
    );

    let publisher = ChangeEventPublisher::new(&config.events);
    let subscribers: Vec<Arc<dyn DataChangeSubscriber>> =
        vec![Arc::new(IndexingSubscriber::new(queue.clone()))];
    let delivery = publisher.spawn_delivery(subscribers, shutdown_rx.clone());

    let scheduler = IndexingScheduler::new(store.clone(), queue, config.indexing.interval());
    let scheduler = tokio::spawn(scheduler.run(shutdown_rx.clone()));

    let state = Arc::new(ApiState::new(
        store.clone(),
        indexes,
        cache,
        publisher,
        config.search.use_search_service,
    ));
    let server = start_http_server(config.server.bind, state, shutdown_rx).await?;

    tracing::info!(
        workers = config.indexing.workers,
        interval_secs = config.indexing.interval_secs,
        use_search_service = config.search.use_search_service,
        "dinnerdonebetter started"
    );

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    tracing::info!("shutting down");
    let _ = shutdown_tx.send(true);

    if let Err(error) = server.await {
        tracing::warn!(%error, "HTTP server task failed");
    }
    if let Err(error) = scheduler.await {
        tracing::warn!(%error, "indexing scheduler task failed");
    }
    if let Err(error) = delivery.await {
        tracing::warn!(%error, "change event delivery task failed");
    }

    let _ = workers_shutdown_tx.send(true);
    for worker in workers {
        if let Err(error) = worker.await {
            tracing::warn!(%error, "index worker task failed");
        }
    }

    store.close().await;
    Ok(())
}

async fn reindex(config: Config, index_type: IndexType) -> anyhow::Result<()> {
    let store = open_store(&config).await?;
    let backend = SearchBackend::connect(&config.search)
        .await
        .context("failed to connect search backend")?;
    let indexes = SearchIndexes::provide(&backend).await?;

    indexes.wipe(index_type).await?;

    let store = store.as_ref();
    let reset = match index_type {
        IndexType::Recipes => EntityStore::<Recipe>::reset_search_indexing(store).await?,
        IndexType::Meals => EntityStore::<Meal>::reset_search_indexing(store).await?,
        IndexType::ValidIngredients => {
            EntityStore::<ValidIngredient>::reset_search_indexing(store).await?
        }
        IndexType::ValidInstruments => {
            EntityStore::<ValidInstrument>::reset_search_indexing(store).await?
        }
        IndexType::ValidMeasurementUnits => {
            EntityStore::<ValidMeasurementUnit>::reset_search_indexing(store).await?
        }
        IndexType::ValidPreparations => {
            EntityStore::<ValidPreparation>::reset_search_indexing(store).await?
        }
        IndexType::ValidIngredientStates => {
            EntityStore::<ValidIngredientState>::reset_search_indexing(store).await?
        }
        IndexType::ValidVessels => EntityStore::<ValidVessel>::reset_search_indexing(store).await?,
    };

    tracing::info!(%index_type, rows = reset, "index wiped; rows will be re-indexed by the scheduler");
    store.close().await;
    Ok(())
}
