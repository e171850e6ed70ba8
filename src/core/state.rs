use std::sync::Arc;

use sqlx::PgPool;

use crate::core::{config::Settings, redis::RedisHandle};
use crate::services::notifications::Notifier;
use crate::services::rag_client::RagClient;

#[derive(Clone)]
pub(crate) struct AppState {
    inner: Arc<InnerState>,
}

struct InnerState {
    settings: Settings,
    db: PgPool,
    redis: RedisHandle,
    rag: RagClient,
    notifier: Notifier,
}

impl AppState {
    pub(crate) fn new(
        settings: Settings,
        db: PgPool,
        redis: RedisHandle,
        rag: RagClient,
        notifier: Notifier,
    ) -> Self {
        Self { inner: Arc::new(InnerState { settings, db, redis, rag, notifier }) }
    }

    /// Builds the outbound HTTP clients from `settings`.
    pub(crate) fn from_parts(
        settings: Settings,
        db: PgPool,
        redis: RedisHandle,
    ) -> anyhow::Result<Self> {
        let rag = RagClient::from_settings(&settings)?;
        let notifier = Notifier::from_settings(&settings)?;
        Ok(Self::new(settings, db, redis, rag, notifier))
    }

    pub(crate) fn settings(&self) -> &Settings {
        &self.inner.settings
    }

    pub(crate) fn db(&self) -> &PgPool {
        &self.inner.db
    }

    pub(crate) fn redis(&self) -> &RedisHandle {
        &self.inner.redis
    }

    pub(crate) fn rag(&self) -> &RagClient {
        &self.inner.rag
    }

    pub(crate) fn notifier(&self) -> &Notifier {
        &self.inner.notifier
    }
}
