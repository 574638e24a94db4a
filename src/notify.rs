//! End-of-run email notification.
//!
//! Best-effort by design: the processed set is persisted before the
//! notifier runs, and a send failure is logged without affecting it.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use mockall::automock;
use tracing::info;

use crate::config::NotifyConfig;
use crate::error::{CredentialError, NotifyError};
use crate::synchronise::RunReport;

/// Delivers the end-of-run summary.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, report: &RunReport) -> Result<(), NotifyError>;
}

pub struct SmtpNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    sender: String,
    recipients: Vec<String>,
}

impl SmtpNotifier {
    pub fn new(config: &NotifyConfig, password: &str) -> Result<Self, CredentialError> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host)
            .map_err(|e| CredentialError::Smtp(e.to_string()))?
            .credentials(Credentials::new(
                config.sender.clone(),
                password.to_string(),
            ))
            .build();
        Ok(Self {
            transport,
            sender: config.sender.clone(),
            recipients: config.recipients.clone(),
        })
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn notify(&self, report: &RunReport) -> Result<(), NotifyError> {
        let subject = subject_line(&report.started_at);
        let body = format_summary(report);

        let from: Mailbox = self
            .sender
            .parse()
            .map_err(|e| NotifyError::Message(format!("invalid sender address: {e}")))?;
        let mut builder = Message::builder().from(from).subject(subject);
        for recipient in &self.recipients {
            let to: Mailbox = recipient
                .parse()
                .map_err(|e| NotifyError::Message(format!("invalid recipient address: {e}")))?;
            builder = builder.to(to);
        }
        let message = builder
            .body(body)
            .map_err(|e| NotifyError::Message(e.to_string()))?;

        self.transport
            .send(message)
            .await
            .map_err(|e| NotifyError::Transport(e.to_string()))?;
        info!(
            recipients = self.recipients.len(),
            "Email notification sent successfully"
        );
        Ok(())
    }
}

fn subject_line(started_at: &DateTime<Utc>) -> String {
    format!(
        "New Issuu Publications Found - {}",
        started_at.format("%Y-%m-%d")
    )
}

/// Human-readable run summary: new uploads with their Drive links, failures
/// that will be retried next run, or a nothing-new line.
pub fn format_summary(report: &RunReport) -> String {
    let mut body = String::from("Hello!\n\n");

    if report.processed.is_empty() && report.failed.is_empty() {
        body.push_str("No new publications were found since the last check.\n");
    } else {
        body.push_str(&format!(
            "The sync job found {} new publication(s) since the last check:\n\n",
            report.processed.len()
        ));
        for item in &report.processed {
            body.push_str(&format!("- {}\n", item.title));
            body.push_str(&format!("    Handle: {}\n", item.handle));
            body.push_str(&format!(
                "    Published: {}\n",
                item.published.format("%Y-%m-%d")
            ));
            body.push_str(&format!("    Pages: {}\n", item.page_count));
            body.push_str(&format!("    Google Drive link: {}\n\n", item.drive_link));
        }

        if !report.failed.is_empty() {
            body.push_str(&format!(
                "{} publication(s) failed and will be retried on the next run:\n\n",
                report.failed.len()
            ));
            for item in &report.failed {
                body.push_str(&format!(
                    "- {} ({}): {}\n",
                    item.title, item.handle, item.error
                ));
            }
            body.push('\n');
        }
    }

    if !report.unavailable.is_empty() {
        body.push_str(&format!(
            "\nCatalogs that could not be checked this run: {}\n",
            report.unavailable.join(", ")
        ));
    }

    body.push_str(&format!(
        "\nRun started: {}\n\nBest regards,\nThe Issuu sync job\n",
        report.started_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    body
}
