//! Pagination inputs and outputs for list and search queries.

use serde::{Deserialize, Serialize};

/// Page selection for list and search queries. Pages start at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryFilter {
    pub page: u32,
    pub limit: u32,
}

impl QueryFilter {
    pub const DEFAULT_LIMIT: u32 = 50;
    pub const MAX_LIMIT: u32 = 250;

    /// Build a filter from raw query parameters, clamping out-of-range values.
    pub fn new(page: Option<u32>, limit: Option<u32>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            limit: limit
                .unwrap_or(Self::DEFAULT_LIMIT)
                .clamp(1, Self::MAX_LIMIT),
        }
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.limit)
    }
}

impl Default for QueryFilter {
    fn default() -> Self {
        Self::new(None, None)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    /// Rows of this kind, ignoring the query.
    pub total_count: u64,
    /// Rows matching the query.
    pub filtered_count: u64,
}

impl Pagination {
    /// Pagination for results that did not come from a counted query.
    pub fn synthesized(filter: &QueryFilter, returned: usize) -> Self {
        Self {
            page: filter.page,
            limit: filter.limit,
            total_count: returned as u64,
            filtered_count: returned as u64,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueryFilteredResult<T> {
    pub data: Vec<T>,
    pub pagination: Pagination,
}
