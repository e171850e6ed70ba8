use std::sync::OnceLock;

use metrics::{describe_counter, describe_histogram, Unit};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::core::config::Settings;

pub(crate) const HTTP_REQUESTS: &str = "http_requests_total";
pub(crate) const HTTP_DURATION: &str = "http_request_duration_seconds";
pub(crate) const CHAT_REPLIES: &str = "chat_replies_total";
pub(crate) const RAG_REQUESTS: &str = "rag_requests_total";
pub(crate) const SUBMISSIONS: &str = "submissions_total";
pub(crate) const NOTIFICATIONS: &str = "notifications_total";

static PROM_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

pub(crate) fn init(settings: &Settings) -> anyhow::Result<()> {
    if !settings.telemetry().prometheus_enabled {
        return Ok(());
    }

    if PROM_HANDLE.get().is_none() {
        let handle = PrometheusBuilder::new().install_recorder()?;
        let _ = PROM_HANDLE.set(handle);
        describe();
    }
    Ok(())
}

pub(crate) fn render() -> Option<String> {
    PROM_HANDLE.get().map(|handle| handle.render())
}

fn describe() {
    describe_counter!(HTTP_REQUESTS, "HTTP responses by status code");
    describe_histogram!(HTTP_DURATION, Unit::Seconds, "HTTP request latency");
    describe_counter!(CHAT_REPLIES, "Chat replies by serving mode");
    describe_counter!(RAG_REQUESTS, "Calls to the retrieval service by outcome");
    describe_counter!(SUBMISSIONS, "Recorded assessment submissions by flow");
    describe_counter!(NOTIFICATIONS, "Status e-mail deliveries by outcome");
}
