//! LanceDB-backed index: one table per index type with an FTS index on the
//! projection text.

use crate::error::{Result, SearchError};
use crate::indexing::IndexType;
use crate::search::{Index, IndexSearcher, SearchSubset};

use arrow_array::cast::AsArray;
use arrow_array::{Array, RecordBatchIterator};
use futures::TryStreamExt;
use std::marker::PhantomData;
use std::sync::Arc;

pub struct LanceIndex<T> {
    table: lancedb::Table,
    index_type: IndexType,
    _value: PhantomData<fn() -> T>,
}

impl<T> Clone for LanceIndex<T> {
    fn clone(&self) -> Self {
        Self {
            table: self.table.clone(),
            index_type: self.index_type,
            _value: PhantomData,
        }
    }
}

fn lance_error(error: impl std::fmt::Display) -> SearchError {
    SearchError::LanceDb(error.to_string())
}

fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

impl<T: SearchSubset> LanceIndex<T> {
    /// Open the table for `index_type`, creating it when missing.
    ///
    /// A table that exists but cannot be opened or created (e.g. the process was
    /// killed mid-write) is dropped and recreated; the backlog refills it.
    pub async fn open_or_create(
        connection: &lancedb::Connection,
        index_type: IndexType,
    ) -> Result<Self> {
        let table_name = index_type.as_str();

        match connection.open_table(table_name).execute().await {
            Ok(table) => return Ok(Self::wrap(table, index_type)),
            Err(error) => {
                tracing::debug!(%error, table_name, "failed to open search table, will create");
            }
        }

        match Self::create_empty_table(connection, table_name).await {
            Ok(table) => return Ok(Self::wrap(table, index_type)),
            Err(error) => {
                tracing::warn!(
                    %error,
                    table_name,
                    "failed to create search table, attempting recovery from corrupted state"
                );
            }
        }

        if let Err(error) = connection.drop_table(table_name, &[]).await {
            tracing::warn!(%error, table_name, "drop_table failed during recovery, proceeding anyway");
        }

        let table = Self::create_empty_table(connection, table_name).await?;
        tracing::info!(table_name, "search table recovered, rows will be re-indexed from the backlog");

        Ok(Self::wrap(table, index_type))
    }

    fn wrap(table: lancedb::Table, index_type: IndexType) -> Self {
        Self {
            table,
            index_type,
            _value: PhantomData,
        }
    }

    async fn create_empty_table(
        connection: &lancedb::Connection,
        table_name: &str,
    ) -> Result<lancedb::Table> {
        let schema = Self::schema();
        let batches = RecordBatchIterator::new(vec![].into_iter().map(Ok), Arc::new(schema));

        connection
            .create_table(table_name, Box::new(batches))
            .execute()
            .await
            .map_err(|e| lance_error(e).into())
    }

    /// Create the FTS index on `content`, ignoring "already exists" errors.
    pub async fn create_indexes(&self) -> Result<()> {
        match self
            .table
            .create_index(&["content"], lancedb::index::Index::FTS(Default::default()))
            .execute()
            .await
        {
            Ok(()) => {
                tracing::debug!(index_type = %self.index_type, "FTS index created on content column");
            }
            Err(error) => {
                let message = error.to_string();
                if message.contains("already") || message.contains("index") {
                    tracing::trace!(index_type = %self.index_type, "FTS index already exists");
                } else {
                    return Err(lance_error(format!("failed to create FTS index: {message}")).into());
                }
            }
        }

        Ok(())
    }

    /// Count all rows in the table.
    pub async fn count(&self) -> Result<usize> {
        use lancedb::query::{ExecutableQuery, QueryBase};

        let results: Vec<arrow_array::RecordBatch> = self
            .table
            .query()
            .select(lancedb::query::Select::columns(&["id"]))
            .execute()
            .await
            .map_err(lance_error)?
            .try_collect()
            .await
            .map_err(lance_error)?;

        Ok(results.iter().map(|b| b.num_rows()).sum())
    }

    /// Fetch the stored projection for `id`, if any.
    pub async fn fetch(&self, id: &str) -> Result<Option<T>> {
        use lancedb::query::{ExecutableQuery, QueryBase};

        let results: Vec<arrow_array::RecordBatch> = self
            .table
            .query()
            .only_if(format!("id = {}", quote(id)))
            .select(lancedb::query::Select::columns(&["id", "payload"]))
            .limit(1)
            .execute()
            .await
            .map_err(lance_error)?
            .try_collect()
            .await
            .map_err(lance_error)?;

        Ok(Self::decode_payloads(&results)?.into_iter().next())
    }

    fn decode_payloads(batches: &[arrow_array::RecordBatch]) -> Result<Vec<T>> {
        let mut projections = Vec::new();
        for batch in batches {
            if let Some(payload_col) = batch.column_by_name("payload") {
                let payloads: &arrow_array::StringArray = payload_col.as_string::<i32>();
                for index in 0..payloads.len() {
                    if payloads.is_valid(index) {
                        projections.push(serde_json::from_str(payloads.value(index))?);
                    }
                }
            }
        }

        Ok(projections)
    }

    fn schema() -> arrow_schema::Schema {
        arrow_schema::Schema::new(vec![
            arrow_schema::Field::new("id", arrow_schema::DataType::Utf8, false),
            arrow_schema::Field::new("content", arrow_schema::DataType::Utf8, false),
            arrow_schema::Field::new("payload", arrow_schema::DataType::Utf8, false),
        ])
    }
}

#[async_trait::async_trait]
impl<T: SearchSubset> IndexSearcher<T> for LanceIndex<T> {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<T>> {
        use lancedb::query::{ExecutableQuery, QueryBase};

        let trimmed_query = query.trim();
        if trimmed_query.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }

        let results: Vec<arrow_array::RecordBatch> = self
            .table
            .query()
            .full_text_search(lance_index::scalar::FullTextSearchQuery::new(
                trimmed_query.to_string(),
            ))
            .select(lancedb::query::Select::columns(&["id", "payload", "_score"]))
            .limit(limit)
            .execute()
            .await
            .map_err(lance_error)?
            .try_collect()
            .await
            .map_err(lance_error)?;

        Self::decode_payloads(&results)
    }
}

#[async_trait::async_trait]
impl<T: SearchSubset> Index<T> for LanceIndex<T> {
    async fn index(&self, id: &str, value: &T) -> Result<()> {
        use arrow_array::{RecordBatch, StringArray};

        let payload = serde_json::to_string(value)?;
        let content = value.searchable_text();

        // Replace any existing row for this id so repeated indexing stays idempotent.
        self.delete(id).await?;

        let batch = RecordBatch::try_new(
            Arc::new(Self::schema()),
            vec![
                Arc::new(StringArray::from(vec![id])) as arrow_array::ArrayRef,
                Arc::new(StringArray::from(vec![content.as_str()])) as arrow_array::ArrayRef,
                Arc::new(StringArray::from(vec![payload.as_str()])) as arrow_array::ArrayRef,
            ],
        )
        .map_err(lance_error)?;

        let batches = RecordBatchIterator::new(vec![Ok(batch)], Arc::new(Self::schema()));

        self.table
            .add(Box::new(batches))
            .execute()
            .await
            .map_err(lance_error)?;

        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.table
            .delete(&format!("id = {}", quote(id)))
            .await
            .map_err(lance_error)?;

        Ok(())
    }

    async fn wipe(&self) -> Result<()> {
        self.table
            .delete("id IS NOT NULL")
            .await
            .map_err(lance_error)?;

        tracing::info!(index_type = %self.index_type, "search index wiped");
        Ok(())
    }
}
