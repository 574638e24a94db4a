//! Persisted processed-publication set.
//!
//! The one durable entity of the job: a flat JSON document of publication
//! ids that were already delivered. The set is monotonic: ids are only ever
//! added, never removed. A missing state file loads as the empty set, and an
//! unparseable one is replaced by the empty set (reprocessing means
//! duplicate delivery next run, which is acceptable; silent data loss is
//! not, so real IO errors propagate).

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

#[derive(Debug, Default, Serialize, Deserialize)]
struct StateFile {
    processed_publications: Vec<String>,
}

/// Repository interface over the processed set: load / contains / add / save.
#[derive(Debug)]
pub struct ProcessedStore {
    path: PathBuf,
    ids: BTreeSet<String>,
}

impl ProcessedStore {
    /// Reads the set from `path`. Missing file means a first run.
    pub fn load<P: Into<PathBuf>>(path: P) -> io::Result<Self> {
        let path = path.into();
        let ids = match fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str::<StateFile>(&raw) {
                Ok(state) => state.processed_publications.into_iter().collect(),
                Err(e) => {
                    warn!(
                        error = %e,
                        path = %path.display(),
                        "Could not parse processed set, starting from empty"
                    );
                    BTreeSet::new()
                }
            },
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                warn!(path = %path.display(), "No processed set found, starting from empty");
                BTreeSet::new()
            }
            Err(e) => return Err(e),
        };
        info!(count = ids.len(), path = %path.display(), "Loaded processed set");
        Ok(Self { path, ids })
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    /// Idempotent union insert. Returns whether the id was newly added.
    pub fn add(&mut self, id: impl Into<String>) -> bool {
        let id = id.into();
        let inserted = self.ids.insert(id.clone());
        if inserted {
            debug!(id = %id, "Marked publication as processed");
        }
        inserted
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Rewrites the whole document. Called once at end of run; a failure
    /// here is fatal since the next run would otherwise reprocess.
    pub fn save(&self) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let state = StateFile {
            processed_publications: self.ids.iter().cloned().collect(),
        };
        let json = serde_json::to_string_pretty(&state).map_err(io::Error::other)?;
        fs::write(&self.path, json)?;
        debug!(count = self.ids.len(), path = %self.path.display(), "Persisted processed set");
        Ok(())
    }
}
