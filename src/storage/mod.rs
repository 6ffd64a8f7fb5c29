//! # Storage Module - Save Document Persistence
//!
//! One JSON document per save record:
//!
//! ```text
//! data/
//! └── saves/
//!     └── {owner}/          ← percent-encoded owner id
//!         └── {save}.json   ← percent-encoded save id
//! ```
//!
//! Writes go through a temp file in the same directory and an atomic rename,
//! under an exclusive `fs2` lock on the destination, so a reader never sees a
//! half-written document.
//!
//! ```rust,no_run
//! use savekeep::storage::SaveStore;
//! use savekeep::game::SaveRecord;
//!
//! fn main() -> savekeep::game::GameResult<()> {
//!     let store = SaveStore::new("./data")?;
//!     store.write(&SaveRecord::new("alice", "slot1"))?;
//!     let record = store.read("alice", "slot1")?;
//!     assert_eq!(record.owner, "alice");
//!     Ok(())
//! }
//! ```

pub mod autosave;

use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use log::{debug, warn};
use percent_encoding::percent_decode_str;

use crate::game::errors::{GameError, GameResult};
use crate::game::inventory::check_shape;
use crate::game::types::{SaveRecord, SAVE_SCHEMA_VERSION};
use crate::logutil::{escape_log, session_label};
use crate::validation::{secure_json_parse, secure_owner_dir, secure_save_path, IdError};

/// Upper bound on a save document read from disk.
pub const MAX_SAVE_BYTES: u64 = 1024 * 1024;

impl From<IdError> for GameError {
    fn from(e: IdError) -> Self {
        match e {
            IdError::FileSizeExceeded { .. } | IdError::InvalidFormat { .. } => {
                GameError::Internal(e.to_string())
            }
            other => GameError::Validation(other.to_string()),
        }
    }
}

/// File-backed store of save documents.
#[derive(Debug, Clone)]
pub struct SaveStore {
    data_dir: PathBuf,
}

impl SaveStore {
    /// Open (and create if needed) the store rooted at `data_dir`.
    pub fn new(data_dir: impl AsRef<Path>) -> GameResult<Self> {
        let data_dir = data_dir.as_ref().to_path_buf();
        fs::create_dir_all(data_dir.join("saves"))?;
        Ok(Self { data_dir })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn path_for(&self, owner: &str, save_id: &str) -> GameResult<PathBuf> {
        Ok(secure_save_path(&self.data_dir, owner, save_id)?)
    }

    pub fn exists(&self, owner: &str, save_id: &str) -> GameResult<bool> {
        Ok(self.path_for(owner, save_id)?.is_file())
    }

    /// Load one save document. Missing files are `NotFound`; unreadable,
    /// undecodable or misshapen documents are `Internal`.
    pub fn read(&self, owner: &str, save_id: &str) -> GameResult<SaveRecord> {
        let path = self.path_for(owner, save_id)?;
        let content = match fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(GameError::NotFound(format!("save {}/{}", owner, save_id)));
            }
            Err(e) => {
                return Err(GameError::Internal(format!(
                    "failed to read {}: {}",
                    path.display(),
                    e
                )))
            }
        };

        let mut record: SaveRecord = secure_json_parse(&content, MAX_SAVE_BYTES)?;
        if record.schema_version > SAVE_SCHEMA_VERSION {
            return Err(GameError::Internal(format!(
                "save {} has schema version {} (supported: {})",
                session_label(owner, save_id),
                record.schema_version,
                SAVE_SCHEMA_VERSION
            )));
        }
        check_shape(&record.inventory).map_err(|e| {
            warn!("save {} is malformed: {}", session_label(owner, save_id), e);
            GameError::Internal(format!("save {} is malformed: {}", session_label(owner, save_id), e))
        })?;
        if record.owner != owner || record.save_id != save_id {
            warn!(
                "save {} carried mismatched identity {}; using file location",
                session_label(owner, save_id),
                session_label(&record.owner, &record.save_id)
            );
            record.owner = owner.to_string();
            record.save_id = save_id.to_string();
        }
        debug!("Loaded save {}", session_label(owner, save_id));
        Ok(record)
    }

    /// Persist `record` atomically, replacing any previous version.
    pub fn write(&self, record: &SaveRecord) -> GameResult<()> {
        let path = self.path_for(&record.owner, &record.save_id)?;
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        let content = serde_json::to_string_pretty(record)?;
        write_file_locked(&path, &content)?;
        debug!(
            "Wrote save {} ({} bytes)",
            session_label(&record.owner, &record.save_id),
            content.len()
        );
        Ok(())
    }

    /// Remove a save document. Returns whether one existed.
    pub fn delete(&self, owner: &str, save_id: &str) -> GameResult<bool> {
        let path = self.path_for(owner, save_id)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Save ids stored for `owner`, sorted.
    pub fn list(&self, owner: &str) -> GameResult<Vec<String>> {
        let dir = secure_owner_dir(&self.data_dir, owner)?;
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut ids = Vec::new();
        for entry in entries {
            let name = entry?.file_name();
            let Some(name) = name.to_str() else { continue };
            if name.starts_with('.') {
                continue;
            }
            if let Some(stem) = name.strip_suffix(".json") {
                match percent_decode_str(stem).decode_utf8() {
                    Ok(id) => ids.push(id.into_owned()),
                    Err(_) => warn!("Skipping undecodable save file {}", escape_log(name)),
                }
            }
        }
        ids.sort();
        Ok(ids)
    }
}

/// Replace `path` with `content`: lock the destination, write a unique temp
/// sibling, fsync it, rename over the destination, then fsync the directory.
fn write_file_locked(path: &Path, content: &str) -> GameResult<()> {
    let lock_file = OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .truncate(false)
        .open(path)?;
    lock_file.lock_exclusive()?;

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let base = path.file_name().and_then(|s| s.to_str()).unwrap_or("save.json");
    let mut counter = 0u32;
    let tmp_path = loop {
        let candidate = dir.join(format!(".{}.tmp-{}-{}", base, std::process::id(), counter));
        match OpenOptions::new().write(true).create_new(true).open(&candidate) {
            Ok(mut tmp) => {
                tmp.write_all(content.as_bytes())?;
                tmp.flush()?;
                let _ = tmp.sync_all();
                break candidate;
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                counter = counter.saturating_add(1);
            }
            Err(e) => {
                return Err(GameError::Internal(format!(
                    "failed to create temp file for atomic write: {}",
                    e
                )))
            }
        }
    };

    if let Err(e) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(e.into());
    }
    if let Ok(dir_file) = File::open(dir) {
        let _ = dir_file.sync_all();
    }
    drop(lock_file);
    Ok(())
}
