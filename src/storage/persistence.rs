//! On-disk chain snapshot
//!
//! A data directory holds one `chain.json`. Saves go through a temporary
//! file and a rename so a crash never leaves a half-written snapshot.

use crate::host::Chain;
use std::fs;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

const CHAIN_FILE: &str = "chain.json";
const TEMP_FILE: &str = "chain.json.tmp";

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
    #[error("No treasury at {0:?}. Run 'treasury init' first")]
    NotInitialized(PathBuf),
}

/// Snapshot store rooted at a data directory
#[derive(Debug)]
pub struct Storage {
    data_dir: PathBuf,
}

impl Storage {
    /// Open (creating if needed) a data directory
    pub fn open(data_dir: &Path) -> Result<Self, StorageError> {
        fs::create_dir_all(data_dir)?;
        Ok(Self {
            data_dir: data_dir.to_path_buf(),
        })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn chain_path(&self) -> PathBuf {
        self.data_dir.join(CHAIN_FILE)
    }

    /// Replace the snapshot with `chain`; queued events are not persisted
    pub fn save(&self, chain: &Chain) -> Result<(), StorageError> {
        let temp_path = self.data_dir.join(TEMP_FILE);
        let mut writer = BufWriter::new(fs::File::create(&temp_path)?);
        serde_json::to_writer_pretty(&mut writer, chain)?;
        writer.flush()?;

        let path = self.chain_path();
        fs::rename(&temp_path, &path)?;
        log::debug!("Saved chain at time {} to {}", chain.timestamp(), path.display());
        Ok(())
    }

    pub fn load(&self) -> Result<Chain, StorageError> {
        let path = self.chain_path();
        if !path.exists() {
            return Err(StorageError::NotInitialized(self.data_dir.clone()));
        }
        let reader = BufReader::new(fs::File::open(&path)?);
        Ok(serde_json::from_reader(reader)?)
    }

    pub fn exists(&self) -> bool {
        self.chain_path().exists()
    }

    /// Forget the snapshot, used by `init --force`
    pub fn delete(&self) -> Result<(), StorageError> {
        let path = self.chain_path();
        if path.exists() {
            fs::remove_file(path)?;
        }
        Ok(())
    }
}
