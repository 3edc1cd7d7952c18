use crate::error::Result;
use crate::search::{Index, IndexSearcher};

use std::marker::PhantomData;

/// Index used when search is disabled.
pub struct NoopIndex<T> {
    _value: PhantomData<fn() -> T>,
}

impl<T> NoopIndex<T> {
    pub fn new() -> Self {
        Self {
            _value: PhantomData,
        }
    }
}

impl<T> Default for NoopIndex<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl<T: Send + Sync + 'static> IndexSearcher<T> for NoopIndex<T> {
    async fn search(&self, _query: &str, _limit: usize) -> Result<Vec<T>> {
        Ok(Vec::new())
    }
}

#[async_trait::async_trait]
impl<T: Send + Sync + 'static> Index<T> for NoopIndex<T> {
    async fn index(&self, _id: &str, _value: &T) -> Result<()> {
        Ok(())
    }

    async fn delete(&self, _id: &str) -> Result<()> {
        Ok(())
    }

    async fn wipe(&self) -> Result<()> {
        Ok(())
    }
}
