//! SQLite implementation of the datastore façade.

use crate::config::DatabaseConfig;
use crate::error::{DbError, Error, Result};
use crate::store::{EntityStore, Pagination, QueryFilter, QueryFilteredResult};
use crate::types::Indexable;

use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use sqlx::{QueryBuilder, Sqlite};

const ENTITY_COLUMNS: &str = "id, data, created_at, last_updated_at, archived_at";

#[derive(Debug, Clone)]
pub struct SqliteDataStore {
    pool: SqlitePool,
    indexing_batch_size: i64,
}

#[derive(sqlx::FromRow)]
struct EntityRow {
    id: String,
    data: String,
    created_at: i64,
    last_updated_at: Option<i64>,
    archived_at: Option<i64>,
}

impl EntityRow {
    /// Decode the stored snapshot. Column values win over whatever metadata the
    /// snapshot carried when it was written.
    fn into_entity<K: Indexable>(self) -> Result<K> {
        let mut entity: K = serde_json::from_str(&self.data)?;
        let metadata = entity.metadata_mut();
        metadata.id = self.id;
        metadata.created_at = from_micros(self.created_at);
        metadata.last_updated_at = self.last_updated_at.map(from_micros);
        metadata.archived_at = self.archived_at.map(from_micros);
        Ok(entity)
    }
}

fn now_micros() -> i64 {
    Utc::now().timestamp_micros()
}

fn from_micros(value: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_micros(value).unwrap_or_default()
}

fn escape_like(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

fn not_found<K: Indexable>(id: &str) -> Error {
    Error::NotFound(format!("{} row {id}", K::INDEX_TYPE))
}

impl SqliteDataStore {
    /// Open the pool described by `config` and apply pending migrations.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.url)
            .await?;

        tracing::info!(url = %config.url, "connected to sqlite datastore");
        Self::from_pool(pool, config.indexing_batch_size).await
    }

    /// A private in-memory database. One connection, since every `:memory:`
    /// connection is its own database.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        Self::from_pool(pool, DatabaseConfig::default().indexing_batch_size).await
    }

    pub async fn from_pool(pool: SqlitePool, indexing_batch_size: u32) -> Result<Self> {
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(DbError::from)?;

        Ok(Self {
            pool,
            indexing_batch_size: i64::from(indexing_batch_size.max(1)),
        })
    }

    pub fn with_indexing_batch_size(mut self, indexing_batch_size: u32) -> Self {
        self.indexing_batch_size = i64::from(indexing_batch_size.max(1));
        self
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait::async_trait]
impl<K: Indexable> EntityStore<K> for SqliteDataStore {
    async fn create(&self, input: K) -> Result<K> {
        let mut entity = input;
        entity.validate()?;

        let now = now_micros();
        {
            let metadata = entity.metadata_mut();
            if metadata.id.is_empty() {
                metadata.id = uuid::Uuid::new_v4().to_string();
            }
            metadata.created_at = from_micros(now);
            metadata.last_updated_at = None;
            metadata.archived_at = None;
        }

        let data = serde_json::to_string(&entity)?;
        let result = sqlx::query(
            "INSERT INTO entities (kind, id, name, data, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(K::INDEX_TYPE.as_str())
        .bind(entity.id())
        .bind(entity.name())
        .bind(&data)
        .bind(now)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(entity),
            Err(sqlx::Error::Database(error)) if error.is_unique_violation() => Err(
                Error::InvalidRequest(format!("{} row {} already exists", K::INDEX_TYPE, entity.id())),
            ),
            Err(error) => Err(error.into()),
        }
    }

    async fn update(&self, entity: K) -> Result<K> {
        entity.validate()?;

        let data = serde_json::to_string(&entity)?;
        // Every write gets a version past both the previous version and the last
        // mark, so it re-enters the backlog even when the clock has not moved.
        let result = sqlx::query(
            "UPDATE entities \
             SET name = ?, data = ?, last_updated_at = MAX(?, \
                 COALESCE(last_indexed_at + 1, 0), \
                 COALESCE(last_updated_at, created_at) + 1) \
             WHERE kind = ? AND id = ? AND archived_at IS NULL",
        )
        .bind(entity.name())
        .bind(&data)
        .bind(now_micros())
        .bind(K::INDEX_TYPE.as_str())
        .bind(entity.id())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(not_found::<K>(entity.id()));
        }

        EntityStore::<K>::get(self, entity.id()).await
    }

    async fn get(&self, id: &str) -> Result<K> {
        let row: Option<EntityRow> = sqlx::query_as(&format!(
            "SELECT {ENTITY_COLUMNS} FROM entities \
             WHERE kind = ? AND id = ? AND archived_at IS NULL"
        ))
        .bind(K::INDEX_TYPE.as_str())
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.ok_or_else(|| not_found::<K>(id))?.into_entity()
    }

    async fn get_with_ids(&self, ids: &[String]) -> Result<Vec<K>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {ENTITY_COLUMNS} FROM entities WHERE kind = "));
        builder.push_bind(K::INDEX_TYPE.as_str());
        builder.push(" AND archived_at IS NULL AND id IN (");
        let mut separated = builder.separated(", ");
        for id in ids {
            separated.push_bind(id);
        }
        separated.push_unseparated(")");

        let rows: Vec<EntityRow> = builder.build_query_as().fetch_all(&self.pool).await?;
        rows.into_iter().map(EntityRow::into_entity).collect()
    }

    async fn search_for(
        &self,
        query: &str,
        filter: &QueryFilter,
    ) -> Result<QueryFilteredResult<K>> {
        let kind = K::INDEX_TYPE.as_str();
        let pattern = format!("%{}%", escape_like(query.trim()));

        let total_count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM entities WHERE kind = ? AND archived_at IS NULL",
        )
        .bind(kind)
        .fetch_one(&self.pool)
        .await?;

        let filtered_count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM entities \
             WHERE kind = ? AND archived_at IS NULL AND name LIKE ? ESCAPE '\\'",
        )
        .bind(kind)
        .bind(&pattern)
        .fetch_one(&self.pool)
        .await?;

        let rows: Vec<EntityRow> = sqlx::query_as(&format!(
            "SELECT {ENTITY_COLUMNS} FROM entities \
             WHERE kind = ? AND archived_at IS NULL AND name LIKE ? ESCAPE '\\' \
             ORDER BY name, id LIMIT ? OFFSET ?"
        ))
        .bind(kind)
        .bind(&pattern)
        .bind(i64::from(filter.limit))
        .bind(i64::try_from(filter.offset()).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        let data = rows
            .into_iter()
            .map(EntityRow::into_entity)
            .collect::<Result<Vec<K>>>()?;

        Ok(QueryFilteredResult {
            data,
            pagination: Pagination {
                page: filter.page,
                limit: filter.limit,
                total_count: total_count.max(0) as u64,
                filtered_count: filtered_count.max(0) as u64,
            },
        })
    }

    async fn archive(&self, id: &str) -> Result<()> {
        let now = now_micros();
        let result = sqlx::query(
            "UPDATE entities SET archived_at = ?, last_updated_at = ? \
             WHERE kind = ? AND id = ? AND archived_at IS NULL",
        )
        .bind(now)
        .bind(now)
        .bind(K::INDEX_TYPE.as_str())
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(not_found::<K>(id));
        }

        Ok(())
    }

    async fn mark_as_indexed(&self, id: &str, indexed_version: DateTime<Utc>) -> Result<()> {
        let result = sqlx::query(
            "UPDATE entities SET last_indexed_at = MAX(COALESCE(last_indexed_at, 0), ?) \
             WHERE kind = ? AND id = ?",
        )
        .bind(indexed_version.timestamp_micros())
        .bind(K::INDEX_TYPE.as_str())
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(not_found::<K>(id));
        }

        Ok(())
    }

    async fn ids_needing_search_indexing(&self) -> Result<Vec<String>> {
        let ids: Vec<String> = sqlx::query_scalar(
            "SELECT id FROM entities \
             WHERE kind = ? AND archived_at IS NULL \
               AND (last_indexed_at IS NULL OR last_indexed_at < COALESCE(last_updated_at, created_at)) \
             ORDER BY COALESCE(last_updated_at, created_at), id \
             LIMIT ?",
        )
        .bind(K::INDEX_TYPE.as_str())
        .bind(self.indexing_batch_size)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }

    async fn reset_search_indexing(&self) -> Result<u64> {
        let result = sqlx::query("UPDATE entities SET last_indexed_at = NULL WHERE kind = ?")
            .bind(K::INDEX_TYPE.as_str())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}
