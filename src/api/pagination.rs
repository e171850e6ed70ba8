use serde::{Deserialize, Serialize};

pub(crate) const fn default_limit() -> i64 {
    100
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct PaginatedResponse<T> {
    pub(crate) items: Vec<T>,
    pub(crate) total_count: i64,
    pub(crate) skip: i64,
    pub(crate) limit: i64,
}

impl<T> PaginatedResponse<T> {
    /// Echoes the effective window the repositories applied.
    pub(crate) fn new(items: Vec<T>, total_count: i64, skip: i64, limit: i64) -> Self {
        Self { items, total_count, skip: skip.max(0), limit: limit.clamp(1, 1000) }
    }
}
