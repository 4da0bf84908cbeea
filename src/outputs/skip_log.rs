//! Append-only log of sites that produced no records.
//!
//! Workers share one [`SkipLog`]; appends are serialized through a mutex so
//! lines from concurrent sites never interleave. Entries are also kept in
//! memory for the end-of-run summary.

use crate::models::SkipEntry;
use std::path::PathBuf;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{instrument, warn};

#[derive(Debug)]
pub struct SkipLog {
    path: Option<PathBuf>,
    entries: Mutex<Vec<SkipEntry>>,
}

impl SkipLog {
    /// A sink that appends to the file at `path`, creating it on first use.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            entries: Mutex::new(Vec::new()),
        }
    }

    /// A sink that only keeps entries in memory.
    #[cfg(test)]
    pub fn in_memory() -> Self {
        Self {
            path: None,
            entries: Mutex::new(Vec::new()),
        }
    }

    /// Append one entry.
    ///
    /// A failed file write is logged and otherwise ignored; the entry is
    /// still kept in memory.
    #[instrument(level = "debug", skip_all, fields(company = %entry.company, category = %entry.category))]
    pub async fn record(&self, entry: SkipEntry) {
        let mut entries = self.entries.lock().await;

        if let Some(path) = &self.path {
            let mut line = entry.to_line();
            line.push('\n');
            let written: std::io::Result<()> = async {
                let mut file = OpenOptions::new().create(true).append(true).open(path).await?;
                file.write_all(line.as_bytes()).await?;
                // on disk before the lock is released
                file.flush().await
            }
            .await;
            if let Err(e) = written {
                warn!(path = %path.display(), error = %e, "Failed to append to skip log");
            }
        }

        entries.push(entry);
    }

    /// Entries recorded so far, in append order.
    pub async fn entries(&self) -> Vec<SkipEntry> {
        self.entries.lock().await.clone()
    }
}
