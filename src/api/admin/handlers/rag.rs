use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

use crate::api::errors::ApiError;
use crate::api::guards::CurrentAdmin;
use crate::core::state::AppState;

/// Asks the retrieval service to rebuild its knowledge base from portal data.
pub(in crate::api::admin) async fn sync_knowledge(
    current: CurrentAdmin,
    State(state): State<AppState>,
) -> Result<Json<Value>, ApiError> {
    let auth = current.auth();

    match state.rag().sync().await {
        Ok(result) => {
            tracing::info!(admin_id = %auth.actor_id, "Knowledge sync completed");
            Ok(Json(json!({
                "success": true,
                "message": "Knowledge base synchronised",
                "result": result,
            })))
        }
        Err(err) => {
            tracing::warn!(admin_id = %auth.actor_id, error = %err, "Knowledge sync failed");
            Err(ApiError::ServiceUnavailable(
                "Retrieval service is unavailable; try again later".to_string(),
            ))
        }
    }
}

/// Queues a background knowledge sync after catalogue edits when
/// `RAG_AUTO_SYNC` is on. Failures are only logged.
pub(super) fn schedule_sync(state: &AppState) {
    if !state.settings().rag().auto_sync || !state.rag().is_enabled() {
        return;
    }

    let rag = state.rag().clone();
    tokio::spawn(async move {
        if let Err(err) = rag.sync().await {
            tracing::warn!(error = %err, "Automatic knowledge sync failed");
        }
    });
}
