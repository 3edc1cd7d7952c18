//! In-process index provider.
//!
//! Matches case-insensitive query terms against each projection's searchable
//! text. Results are ranked by the number of matched terms, ties broken by id.

use crate::error::Result;
use crate::search::{Index, IndexSearcher, SearchSubset};

use std::collections::BTreeMap;
use tokio::sync::RwLock;

pub struct MemoryIndex<T> {
    documents: RwLock<BTreeMap<String, T>>,
}

impl<T> MemoryIndex<T> {
    pub fn new() -> Self {
        Self {
            documents: RwLock::new(BTreeMap::new()),
        }
    }

    pub async fn len(&self) -> usize {
        self.documents.read().await.len()
    }

    pub async fn contains(&self, id: &str) -> bool {
        self.documents.read().await.contains_key(id)
    }
}

impl<T> Default for MemoryIndex<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl<T: SearchSubset> IndexSearcher<T> for MemoryIndex<T> {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<T>> {
        let terms: Vec<String> = query
            .split_whitespace()
            .map(|term| term.to_lowercase())
            .collect();
        if terms.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }

        let documents = self.documents.read().await;
        let mut scored: Vec<(usize, &T)> = documents
            .values()
            .filter_map(|document| {
                let text = document.searchable_text().to_lowercase();
                let matched = terms
                    .iter()
                    .filter(|term| text.contains(term.as_str()))
                    .count();
                (matched > 0).then_some((matched, document))
            })
            .collect();

        // BTreeMap iteration is id-ordered and sort_by is stable, so ties stay id-ordered.
        scored.sort_by(|a, b| b.0.cmp(&a.0));

        Ok(scored
            .into_iter()
            .take(limit)
            .map(|(_, document)| document.clone())
            .collect())
    }
}

#[async_trait::async_trait]
impl<T: SearchSubset> Index<T> for MemoryIndex<T> {
    async fn index(&self, id: &str, value: &T) -> Result<()> {
        self.documents
            .write()
            .await
            .insert(id.to_string(), value.clone());
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.documents.write().await.remove(id);
        Ok(())
    }

    async fn wipe(&self) -> Result<()> {
        self.documents.write().await.clear();
        Ok(())
    }
}
