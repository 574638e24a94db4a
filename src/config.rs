use std::path::PathBuf;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Fully merged configuration for one sync run: the static file contents
/// with defaults applied. Credentials live next to it in
/// [`crate::load_config::JobConfig`], never in here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Issuu publisher handles to check.
    pub handles: Vec<String>,
    /// Publications published strictly before this date are ignored.
    pub cutoff_date: NaiveDate,
    /// Destination Google Drive folder.
    pub drive_folder_id: String,
    /// Where the processed-publication set is persisted.
    pub state_path: PathBuf,
    /// How many recent publications to inspect per handle.
    pub list_depth: usize,
    pub notify: NotifyConfig,
}

impl SyncConfig {
    pub fn trace_loaded(&self) {
        info!(
            handles = self.handles.len(),
            cutoff = %self.cutoff_date,
            state_path = %self.state_path.display(),
            list_depth = self.list_depth,
            "Loaded SyncConfig"
        );
        debug!(?self, "SyncConfig loaded (full debug)");
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    /// Sender address, also the SMTP login user.
    pub sender: String,
    pub recipients: Vec<String>,
    pub smtp_host: String,
}
