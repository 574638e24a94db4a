//! Error taxonomy of the sync job.
//!
//! Errors fall into three tiers that drive the control flow in
//! [`crate::synchronise`]:
//! - fatal ([`FatalError`]): bad config, missing credentials, or a failed
//!   state write; the run aborts with a non-zero exit;
//! - scoped ([`SourceUnavailable`], [`ItemError`]): one handle or one
//!   publication is skipped, the batch continues;
//! - best-effort ([`NotifyError`]): logged, never escalated.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse config file: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("required environment variable {0} is not set")]
    MissingVar(&'static str),
    #[error("environment variable {0} is set but empty")]
    EmptyVar(&'static str),
    #[error("failed to set up SMTP transport: {0}")]
    Smtp(String),
}

/// A handle whose catalog could not be retrieved this run.
#[derive(Debug, Error)]
#[error("catalog for handle '{handle}' is unavailable: {reason}")]
pub struct SourceUnavailable {
    pub handle: String,
    pub reason: String,
}

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("page {page} of publication {id} returned status {status}")]
    PageStatus {
        id: String,
        page: u32,
        status: reqwest::StatusCode,
    },
    #[error("publication {id} has no pages")]
    NoPages { id: String },
    #[error("failed to assemble PDF: {0}")]
    Pdf(String),
    #[error("scratch file IO failed: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Drive API returned status {status}: {body}")]
    Api {
        status: reqwest::StatusCode,
        body: String,
    },
}

/// Failure of one publication. The publication stays out of the processed
/// set and is retried on the next run.
#[derive(Debug, Error)]
pub enum ItemError {
    #[error(transparent)]
    Download(#[from] DownloadError),
    #[error(transparent)]
    Upload(#[from] UploadError),
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("failed to build notification message: {0}")]
    Message(String),
    #[error("failed to send notification: {0}")]
    Transport(String),
}

/// Aborts the run. Everything else is skip-and-continue.
#[derive(Debug, Error)]
pub enum FatalError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Credential(#[from] CredentialError),
    #[error("failed to persist processed set: {0}")]
    StateWrite(#[source] io::Error),
}
