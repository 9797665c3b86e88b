use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::warn;

use crate::core::error::{KeySweepError, Result};
use crate::core::results::KeyReport;

/// Durable memory of keys already validated in earlier runs.
///
/// Backed by a JSON Lines file of [`KeyReport`] records, loaded whole at
/// startup. Records are append-only; nothing here ever rewrites or deletes
/// one.
pub struct DedupStore {
    path: PathBuf,
    seen: Mutex<HashSet<String>>,
}

impl DedupStore {
    /// Load the store. A missing or unreadable file starts the store empty;
    /// that is a warning, never a startup failure.
    pub fn open(path: &Path) -> Self {
        let seen = match load_keys(path) {
            Ok(keys) => keys,
            Err(e) => {
                warn!(
                    "could not read dedup store {}: {} (starting empty)",
                    path.display(),
                    e
                );
                HashSet::new()
            }
        };
        Self {
            path: path.to_path_buf(),
            seen: Mutex::new(seen),
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.seen.lock().unwrap().contains(key)
    }

    /// Keys known before concurrent work begins. The pipeline filters its
    /// candidate pool against this snapshot without touching the lock again.
    pub fn snapshot(&self) -> HashSet<String> {
        self.seen.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.seen.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append one validated record. Appends from concurrent validations are
    /// serialized here; the record is flushed and synced to disk before this
    /// returns. Re-appending a key already present is a no-op.
    ///
    /// A write failure must reach the caller: silently losing a record means
    /// duplicate validation and duplicate reporting on the next run.
    pub fn append(&self, report: &KeyReport) -> Result<()> {
        let mut seen = self.seen.lock().unwrap();
        if seen.contains(&report.key) {
            return Ok(());
        }

        let line = serde_json::to_string(report)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| {
                KeySweepError::Persistence(format!("open {}: {}", self.path.display(), e))
            })?;
        writeln!(file, "{}", line).map_err(|e| {
            KeySweepError::Persistence(format!("write {}: {}", self.path.display(), e))
        })?;
        file.sync_all().map_err(|e| {
            KeySweepError::Persistence(format!("sync {}: {}", self.path.display(), e))
        })?;

        seen.insert(report.key.clone());
        Ok(())
    }
}

fn load_keys(path: &Path) -> std::io::Result<HashSet<String>> {
    if !path.exists() {
        return Ok(HashSet::new());
    }

    let reader = BufReader::new(File::open(path)?);
    let mut keys = HashSet::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<KeyReport>(&line) {
            Ok(report) => {
                keys.insert(report.key);
            }
            Err(e) => warn!("skipping malformed dedup record: {}", e),
        }
    }
    Ok(keys)
}
