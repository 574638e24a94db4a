pub mod catalog;
pub mod config;
pub mod download;
pub mod error;
pub mod load_config;
pub mod notify;
pub mod store;
pub mod synchronise;
pub mod upload;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use catalog::IssuuCatalog;
use download::IssuuFetcher;
use load_config::load_config;
use notify::SmtpNotifier;
use store::ProcessedStore;
use synchronise::synchronise;
use upload::DriveUploader;

#[derive(Parser)]
#[clap(
    name = "issuu-drive-sync",
    version,
    about = "Mirror new Issuu publications into a Google Drive folder and send a summary email"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Check all tracked handles once and sync new publications
    Sync {
        /// Path to the YAML config file
        #[clap(long)]
        config: PathBuf,
    },
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Sync { config } => {
            let job = load_config(&config)?;
            job.sync.trace_loaded();

            let catalog = IssuuCatalog::new(job.sync.list_depth)
                .context("failed to build catalog HTTP client")?;
            let fetcher = IssuuFetcher::new().context("failed to build fetcher HTTP client")?;
            let uploader = DriveUploader::new(job.drive_token, job.sync.drive_folder_id.clone())
                .context("failed to build Drive HTTP client")?;
            let notifier = SmtpNotifier::new(&job.sync.notify, &job.smtp_password)?;
            let mut store = ProcessedStore::load(&job.sync.state_path)
                .context("failed to load processed set")?;

            println!("Sync starting...");
            let report = synchronise(
                &job.sync,
                &catalog,
                &fetcher,
                &uploader,
                &notifier,
                &mut store,
            )
            .await?;
            println!("Sync complete.\nReport:");
            println!("{report:#?}");
            Ok(())
        }
    }
}
