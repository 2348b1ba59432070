use std::collections::BTreeSet;
use std::io::ErrorKind;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, info, instrument};

/// Errors reading or writing the processed-folder file
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("Failed to read processed folders from {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Processed folder file {path} is not a JSON list of strings: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to write processed folders to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// File-backed set of folder prefixes that have already been processed.
///
/// Every save rewrites the whole file, so there must be a single writer.
#[derive(Debug, Clone)]
pub struct ProcessedStore {
    path: PathBuf,
}

impl ProcessedStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Load the processed set; a missing file is a cold start, not an error
    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub async fn load(&self) -> Result<BTreeSet<String>, PersistenceError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!("No processed folder file found, starting cold");
                return Ok(BTreeSet::new());
            }
            Err(source) => {
                return Err(PersistenceError::Read {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        let folders: Vec<String> =
            serde_json::from_slice(&bytes).map_err(|source| PersistenceError::Corrupt {
                path: self.path.clone(),
                source,
            })?;

        info!(count = folders.len(), "Loaded processed folders");
        Ok(folders.into_iter().collect())
    }

    /// Overwrite the persisted set via a temp file and rename
    #[instrument(skip(self, folders), fields(path = %self.path.display(), count = folders.len()))]
    pub async fn save(&self, folders: &BTreeSet<String>) -> Result<(), PersistenceError> {
        let write_err = |source| PersistenceError::Write {
            path: self.path.clone(),
            source,
        };

        let list: Vec<&String> = folders.iter().collect();
        let body = serde_json::to_vec_pretty(&list)
            .map_err(|e| write_err(std::io::Error::new(ErrorKind::InvalidData, e)))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
        }

        let tmp_path = self.temp_path();
        tokio::fs::write(&tmp_path, &body).await.map_err(write_err)?;
        tokio::fs::rename(&tmp_path, &self.path)
            .await
            .map_err(write_err)?;

        debug!("Processed folders saved");
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "processed_folders.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}
