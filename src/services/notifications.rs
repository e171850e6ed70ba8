use std::time::Duration;

use anyhow::Context;
use reqwest::Client;
use serde::Serialize;
use thiserror::Error;

use crate::core::config::Settings;
use crate::core::metrics::NOTIFICATIONS;
use crate::db::types::ApprovalStatus;

#[derive(Debug, Error)]
pub(crate) enum NotifyError {
    #[error("mail webhook request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("mail webhook returned status {0}")]
    Status(u16),
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub(crate) struct StatusEmail {
    pub(crate) to: String,
    pub(crate) subject: String,
    pub(crate) text: String,
}

impl StatusEmail {
    pub(crate) fn compose(
        to: &str,
        student_name: &str,
        status: ApprovalStatus,
        reason: Option<&str>,
        college_name: &str,
        portal_url: &str,
    ) -> Self {
        let (subject, text) = match status {
            ApprovalStatus::Approved => (
                format!("Account Approved - Welcome to {college_name}!"),
                format!(
                    "Dear {student_name},\n\n\
                     Your account has been approved for the {college_name} placement portal.\n\n\
                     Status: Approved\n\n\
                     Log in to take practice assessments: {portal_url}/login\n\n\
                     Best regards,\n{college_name} Team"
                ),
            ),
            _ => {
                let reason_block = reason
                    .filter(|value| !value.trim().is_empty())
                    .map(|value| format!("\nReason for decision:\n{value}\n"))
                    .unwrap_or_default();
                (
                    format!("Application Status Update - {college_name}"),
                    format!(
                        "Dear {student_name},\n\n\
                         Thank you for your interest in joining {college_name}.\n\n\
                         Your account registration has not been approved at this time.\n\n\
                         Status: Not Approved\n{reason_block}\n\
                         You may reapply after addressing the concerns above.\n\n\
                         Best regards,\n{college_name} Admissions Team"
                    ),
                )
            }
        };

        Self { to: to.to_string(), subject, text }
    }
}

/// Sends account status e-mails through an HTTP mail webhook. Without a
/// configured webhook every send is skipped.
#[derive(Debug, Clone)]
pub(crate) struct Notifier {
    client: Client,
    webhook_url: Option<String>,
    college_name: String,
    portal_url: String,
}

impl Notifier {
    pub(crate) fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let notifications = settings.notifications();
        let client = Client::builder()
            .timeout(Duration::from_secs(notifications.timeout_seconds))
            .build()
            .context("Failed to build mail webhook HTTP client")?;

        let webhook_url =
            notifications.webhook_url.clone().filter(|url| !url.trim().is_empty());
        if webhook_url.is_none() {
            tracing::info!("NOTIFY_WEBHOOK_URL not set; status e-mails are disabled");
        }

        Ok(Self {
            client,
            webhook_url,
            college_name: notifications.college_name.clone(),
            portal_url: settings.api().public_url.clone(),
        })
    }

    pub(crate) fn is_enabled(&self) -> bool {
        self.webhook_url.is_some()
    }

    async fn deliver(&self, email: &StatusEmail) -> Result<bool, NotifyError> {
        let Some(url) = &self.webhook_url else {
            return Ok(false);
        };

        let response = self.client.post(url).json(email).send().await?;
        if !response.status().is_success() {
            return Err(NotifyError::Status(response.status().as_u16()));
        }
        Ok(true)
    }

    /// Must only be called after the status change committed. Failures are
    /// logged and counted; the caller's outcome never depends on delivery.
    pub(crate) async fn send_status_email(
        &self,
        to: &str,
        student_name: &str,
        status: ApprovalStatus,
        reason: Option<&str>,
    ) {
        let email = StatusEmail::compose(
            to,
            student_name,
            status,
            reason,
            &self.college_name,
            &self.portal_url,
        );

        let outcome = match self.deliver(&email).await {
            Ok(true) => {
                tracing::info!(to = %to, status = status.as_str(), "Status e-mail sent");
                "sent"
            }
            Ok(false) => {
                tracing::info!(to = %to, status = status.as_str(), "Status e-mail skipped");
                "skipped"
            }
            Err(err) => {
                tracing::warn!(to = %to, status = status.as_str(), error = %err, "Status e-mail failed");
                "failed"
            }
        };
        metrics::counter!(NOTIFICATIONS, "outcome" => outcome).increment(1);
    }
}
