use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::core::error::{KeySweepError, Result};

#[derive(Debug, Default, Serialize, Deserialize)]
struct CredFile {
    credentials: Vec<String>,
}

/// Secondary sink: a JSON document listing live credentials by token. Kept in
/// step with the dedup store for the validated set.
pub struct CredList {
    path: PathBuf,
    lock: Mutex<()>,
}

impl CredList {
    /// Open the list, creating an empty document if the file is absent.
    pub fn open(path: &Path) -> Result<Self> {
        if !path.exists() {
            let empty = serde_json::to_string(&CredFile::default())?;
            std::fs::write(path, empty)
                .map_err(|e| KeySweepError::Persistence(format!("create {}: {}", path.display(), e)))?;
        }
        Ok(Self {
            path: path.to_path_buf(),
            lock: Mutex::new(()),
        })
    }

    /// Add a token unless it is already listed. Returns true when the list
    /// changed.
    pub fn record(&self, token: &str) -> Result<bool> {
        let _guard = self.lock.lock().unwrap();

        let contents = std::fs::read_to_string(&self.path)
            .map_err(|e| KeySweepError::Persistence(format!("read {}: {}", self.path.display(), e)))?;
        let mut file: CredFile = serde_json::from_str(&contents)?;

        if file.credentials.iter().any(|c| c == token) {
            return Ok(false);
        }

        file.credentials.push(token.to_string());
        std::fs::write(&self.path, serde_json::to_string(&file)?)
            .map_err(|e| KeySweepError::Persistence(format!("write {}: {}", self.path.display(), e)))?;
        Ok(true)
    }
}
