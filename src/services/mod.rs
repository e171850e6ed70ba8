pub(crate) mod answer_key;
pub(crate) mod availability;
pub(crate) mod cache;
pub(crate) mod chat_fallback;
pub(crate) mod csv_export;
pub(crate) mod notifications;
pub(crate) mod rag_client;
pub(crate) mod reporting;
pub(crate) mod scoring;
