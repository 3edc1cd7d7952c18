//! Configuration for the text search subsystem.

use crate::error::{Error, Result};

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Which engine backs the search indexes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchProvider {
    /// Every write succeeds and every search comes back empty.
    #[default]
    Noop,
    /// In-process indexes. Lost on restart.
    Memory,
    /// LanceDB tables with a full-text index on the projection text.
    #[serde(rename = "lancedb")]
    LanceDb,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LanceDbConfig {
    /// Directory holding one table per index type.
    pub path: PathBuf,
}

/// Configuration for indexing and search.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SearchConfig {
    #[serde(default)]
    pub provider: SearchProvider,
    /// Whether search endpoints consult the index instead of the database.
    #[serde(default)]
    pub use_search_service: bool,
    #[serde(default)]
    pub lancedb: Option<LanceDbConfig>,
}

impl SearchConfig {
    pub fn validate(&self) -> Result<()> {
        if self.provider == SearchProvider::LanceDb && self.lancedb.is_none() {
            return Err(Error::Config(
                "search.lancedb is required when search.provider = \"lancedb\"".into(),
            ));
        }

        if self.use_search_service && self.provider == SearchProvider::Noop {
            tracing::warn!(
                "search.use_search_service is enabled with the noop provider; searches will return nothing"
            );
        }

        Ok(())
    }
}
