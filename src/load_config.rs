//! Loads the static YAML config file (no secrets) and merges in the
//! credential env vars. Returns a fully merged [`JobConfig`] or a fatal
//! error, before any network call is made.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::Deserialize;
use tracing::{error, info};

use crate::config::{NotifyConfig, SyncConfig};
use crate::error::{ConfigError, CredentialError, FatalError};

/// Bearer token for the Drive upload API. Opaque to the job; refreshed by
/// whatever supplies the environment.
pub const DRIVE_TOKEN_VAR: &str = "DRIVE_ACCESS_TOKEN";
/// App password for the SMTP relay.
pub const EMAIL_PASSWORD_VAR: &str = "EMAIL_PASSWORD";

#[derive(Deserialize)]
struct StaticConfig {
    handles: Vec<String>,
    cutoff_date: NaiveDate,
    drive_folder_id: String,
    #[serde(default = "default_state_path")]
    state_path: PathBuf,
    #[serde(default = "default_list_depth")]
    list_depth: usize,
    notify: NotifySection,
}

#[derive(Deserialize)]
struct NotifySection {
    sender: String,
    recipients: Vec<String>,
    #[serde(default = "default_smtp_host")]
    smtp_host: String,
}

fn default_state_path() -> PathBuf {
    PathBuf::from("data/processed_publications.json")
}

fn default_list_depth() -> usize {
    10
}

fn default_smtp_host() -> String {
    "smtp.gmail.com".to_string()
}

/// Everything one run needs: merged config plus credential material.
#[derive(Debug)]
pub struct JobConfig {
    pub sync: SyncConfig,
    pub drive_token: String,
    pub smtp_password: String,
}

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<JobConfig, FatalError> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let raw = fs::read_to_string(path_ref).map_err(|e| {
        error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
        ConfigError::Read {
            path: path_ref.to_path_buf(),
            source: e,
        }
    })?;

    let static_conf: StaticConfig = serde_yaml::from_str(&raw).map_err(|e| {
        error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
        ConfigError::from(e)
    })?;

    if static_conf.handles.is_empty() {
        return Err(ConfigError::Invalid("handles must not be empty".into()).into());
    }
    if static_conf.drive_folder_id.is_empty() {
        return Err(ConfigError::Invalid("drive_folder_id must not be empty".into()).into());
    }
    if static_conf.notify.recipients.is_empty() {
        return Err(ConfigError::Invalid("notify.recipients must not be empty".into()).into());
    }

    let drive_token = require_env(DRIVE_TOKEN_VAR)?;
    let smtp_password = require_env(EMAIL_PASSWORD_VAR)?;

    let sync = SyncConfig {
        handles: static_conf.handles,
        cutoff_date: static_conf.cutoff_date,
        drive_folder_id: static_conf.drive_folder_id,
        state_path: static_conf.state_path,
        list_depth: static_conf.list_depth,
        notify: NotifyConfig {
            sender: static_conf.notify.sender,
            recipients: static_conf.notify.recipients,
            smtp_host: static_conf.notify.smtp_host,
        },
    };

    info!(
        handles = sync.handles.len(),
        cutoff = %sync.cutoff_date,
        folder = %sync.drive_folder_id,
        "Config loaded and merged successfully"
    );

    Ok(JobConfig {
        sync,
        drive_token,
        smtp_password,
    })
}

fn require_env(name: &'static str) -> Result<String, CredentialError> {
    match std::env::var(name) {
        Ok(value) if value.trim().is_empty() => {
            error!(var = name, "Credential environment variable is empty");
            Err(CredentialError::EmptyVar(name))
        }
        Ok(value) => Ok(value),
        Err(_) => {
            error!(var = name, "Credential environment variable not set");
            Err(CredentialError::MissingVar(name))
        }
    }
}
