//! High-level pipeline: list each handle's catalog, process unseen
//! publications (download, upload, mark processed), persist the processed
//! set, then notify.
//!
//! Failure policy:
//! - an unavailable catalog skips that handle for the run;
//! - a download or upload failure skips that publication and records it in
//!   the report; the batch continues;
//! - a failed store save is fatal (the next run would reprocess);
//! - a failed notification is logged only.

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use crate::catalog::{Catalog, Publication};
use crate::config::SyncConfig;
use crate::download::Fetcher;
use crate::error::{FatalError, ItemError};
use crate::notify::Notifier;
use crate::store::ProcessedStore;
use crate::upload::Uploader;

/// Outcome of one run, consumed by the notifier and printed by the CLI.
#[derive(Debug)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub processed: Vec<ProcessedPublication>,
    pub failed: Vec<FailedPublication>,
    /// Handles whose catalog could not be retrieved this run.
    pub unavailable: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ProcessedPublication {
    pub id: String,
    pub title: String,
    pub handle: String,
    pub published: DateTime<Utc>,
    pub page_count: u32,
    pub drive_link: String,
}

#[derive(Debug)]
pub struct FailedPublication {
    pub id: String,
    pub title: String,
    pub handle: String,
    pub error: ItemError,
}

impl FailedPublication {
    fn new(publication: &Publication, error: ItemError) -> Self {
        Self {
            id: publication.id.clone(),
            title: publication.title.clone(),
            handle: publication.handle.clone(),
            error,
        }
    }
}

/// Runs the whole pipeline once. Sequential throughout: handles, then
/// publications within a handle, one at a time.
pub async fn synchronise<C, F, U, N>(
    config: &SyncConfig,
    catalog: &C,
    fetcher: &F,
    uploader: &U,
    notifier: &N,
    store: &mut ProcessedStore,
) -> Result<RunReport, FatalError>
where
    C: Catalog,
    F: Fetcher,
    U: Uploader,
    N: Notifier,
{
    let started_at = Utc::now();
    info!(
        handles = config.handles.len(),
        cutoff = %config.cutoff_date,
        known = store.len(),
        "Starting sync run"
    );

    let mut processed: Vec<ProcessedPublication> = Vec::new();
    let mut failed: Vec<FailedPublication> = Vec::new();
    let mut unavailable: Vec<String> = Vec::new();

    for handle in &config.handles {
        info!(handle = %handle, "Checking handle");
        let publications = match catalog.list(handle, config.cutoff_date).await {
            Ok(publications) => publications,
            Err(e) => {
                warn!(handle = %handle, error = %e, "Catalog unavailable, skipping handle");
                unavailable.push(handle.clone());
                continue;
            }
        };
        info!(
            handle = %handle,
            count = publications.len(),
            "Publications at or after cutoff"
        );

        for publication in publications {
            if publication.published.date_naive() < config.cutoff_date {
                debug!(id = %publication.id, "Publication predates cutoff, skipping");
                continue;
            }
            if store.contains(&publication.id) {
                debug!(id = %publication.id, "Publication already processed, skipping");
                continue;
            }

            info!(id = %publication.id, title = %publication.title, "Processing new publication");
            let document = match fetcher.fetch(&publication).await {
                Ok(document) => document,
                Err(e) => {
                    error!(id = %publication.id, error = %e, "Download failed");
                    failed.push(FailedPublication::new(&publication, e.into()));
                    continue;
                }
            };
            let uploaded = match uploader.upload(&document.filename, document.content).await {
                Ok(uploaded) => uploaded,
                Err(e) => {
                    error!(id = %publication.id, error = %e, "Upload failed");
                    failed.push(FailedPublication::new(&publication, e.into()));
                    continue;
                }
            };

            store.add(publication.id.clone());
            info!(id = %publication.id, link = %uploaded.web_link, "Publication processed");
            processed.push(ProcessedPublication {
                id: publication.id,
                title: publication.title,
                handle: publication.handle,
                published: publication.published,
                page_count: publication.page_count,
                drive_link: uploaded.web_link,
            });
        }
    }

    // Persist before notifying: notification failure must never roll back
    // what was already delivered.
    store.save().map_err(FatalError::StateWrite)?;
    info!(recorded = store.len(), "Processed set persisted");

    let report = RunReport {
        started_at,
        processed,
        failed,
        unavailable,
    };
    if let Err(e) = notifier.notify(&report).await {
        warn!(error = %e, "Notification failed; run result is already persisted");
    }

    info!(
        processed = report.processed.len(),
        failed = report.failed.len(),
        unavailable = report.unavailable.len(),
        "Sync run complete"
    );
    Ok(report)
}
