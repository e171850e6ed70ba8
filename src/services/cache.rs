use std::future::Future;

use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::core::state::AppState;

/// Entity a cached value summarizes. Writes to that entity drop every entry
/// carrying the tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum CacheTag {
    Assessments,
    Reports,
    Student(String),
}

impl CacheTag {
    fn key(&self) -> String {
        match self {
            Self::Assessments => "assessments".to_string(),
            Self::Reports => "reports".to_string(),
            Self::Student(id) => format!("student:{id}"),
        }
    }
}

pub(crate) fn cache_key(namespace: &str, params: &impl Serialize) -> String {
    let encoded = serde_json::to_vec(params).unwrap_or_default();
    let digest = Sha256::digest(&encoded);
    format!("cache:{namespace}:{}", hex::encode(digest))
}

/// Read-through lookup. Cache failures never fail the request; the loader
/// runs instead.
pub(crate) async fn get_or_load<T, E, F, Fut>(
    state: &AppState,
    namespace: &str,
    params: &impl Serialize,
    tags: &[CacheTag],
    load: F,
) -> Result<T, E>
where
    T: Serialize + DeserializeOwned,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let settings = state.settings().cache();
    if !settings.enabled {
        return load().await;
    }

    let key = cache_key(namespace, params);
    match state.redis().get_json::<T>(&key).await {
        Ok(Some(hit)) => return Ok(hit),
        Ok(None) => {}
        Err(err) => tracing::warn!(error = %err, key = %key, "Cache read failed"),
    }

    let value = load().await?;
    let tag_keys: Vec<String> = tags.iter().map(CacheTag::key).collect();
    if let Err(err) =
        state.redis().set_json_tagged(&key, &value, settings.ttl_seconds, &tag_keys).await
    {
        tracing::warn!(error = %err, key = %key, "Cache write failed");
    }

    Ok(value)
}

pub(crate) async fn invalidate(state: &AppState, tags: &[CacheTag]) {
    if !state.settings().cache().enabled || tags.is_empty() {
        return;
    }

    let tag_keys: Vec<String> = tags.iter().map(CacheTag::key).collect();
    match state.redis().invalidate_tags(&tag_keys).await {
        Ok(removed) => tracing::debug!(tags = ?tag_keys, removed, "Cache invalidated"),
        Err(err) => tracing::warn!(error = %err, tags = ?tag_keys, "Cache invalidation failed"),
    }
}

/// Tags touched by a new result for `student_id`.
pub(crate) fn result_written(student_id: &str) -> [CacheTag; 3] {
    [CacheTag::Assessments, CacheTag::Reports, CacheTag::Student(student_id.to_string())]
}
