//! In-memory session table.
//!
//! At most one [`Session`] exists per `(owner, save_id)` key. The table itself
//! sits behind one `RwLock`; each session has its own `Mutex` so an action can
//! hold its session across fetch, dispatch and commit while other saves keep
//! moving.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use chrono::{DateTime, Utc};
use log::{debug, info, warn};

use crate::game::actions::Dispatcher;
use crate::game::errors::{GameError, GameResult};
use crate::game::inventory::check_shape;
use crate::game::types::{Action, ActionResult, SaveRecord};
use crate::logutil::session_label;
use crate::storage::SaveStore;
use crate::validation::new_save_id;

pub type SessionKey = (String, String);
pub type SessionHandle = Arc<Mutex<Session>>;

/// One loaded save record and its bookkeeping.
#[derive(Debug, Clone)]
pub struct Session {
    pub owner: String,
    pub save_id: String,
    pub record: SaveRecord,
    pub loaded_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Set by `update`/`apply`, cleared by a successful flush.
    pub dirty: bool,
}

impl Session {
    fn new(record: SaveRecord) -> Self {
        let now = Utc::now();
        Self {
            owner: record.owner.clone(),
            save_id: record.save_id.clone(),
            record,
            loaded_at: now,
            updated_at: now,
            dirty: false,
        }
    }
}

/// Result of flushing every dirty session.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FlushReport {
    pub flushed: usize,
    pub failed: Vec<SessionKey>,
}

pub struct SessionManager {
    store: SaveStore,
    sessions: RwLock<HashMap<SessionKey, SessionHandle>>,
}

fn key(owner: &str, save_id: &str) -> SessionKey {
    (owner.to_string(), save_id.to_string())
}

fn lock_session(handle: &SessionHandle) -> GameResult<MutexGuard<'_, Session>> {
    handle.lock().map_err(|_| GameError::poisoned("session"))
}

impl SessionManager {
    pub fn new(store: SaveStore) -> Self {
        Self {
            store,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &SaveStore {
        &self.store
    }

    /// Loaded session handle, if any.
    pub fn handle(&self, owner: &str, save_id: &str) -> GameResult<Option<SessionHandle>> {
        let table = self.sessions.read().map_err(|_| GameError::poisoned("session table"))?;
        Ok(table.get(&key(owner, save_id)).cloned())
    }

    fn require(&self, owner: &str, save_id: &str) -> GameResult<SessionHandle> {
        self.handle(owner, save_id)?
            .ok_or_else(|| GameError::NotFound(format!("session {} not loaded", session_label(owner, save_id))))
    }

    /// Return the live session for the key, reading it from disk only the
    /// first time.
    pub fn load(&self, owner: &str, save_id: &str) -> GameResult<SessionHandle> {
        if let Some(handle) = self.handle(owner, save_id)? {
            return Ok(handle);
        }
        let record = self.store.read(owner, save_id)?;
        let mut table = self.sessions.write().map_err(|_| GameError::poisoned("session table"))?;
        let handle = table
            .entry(key(owner, save_id))
            .or_insert_with(|| {
                info!("Session loaded: {}", session_label(owner, save_id));
                Arc::new(Mutex::new(Session::new(record)))
            })
            .clone();
        Ok(handle)
    }

    /// Re-read from disk, discarding unflushed edits. An existing session keeps
    /// its handle; only its contents are replaced.
    pub fn reload(&self, owner: &str, save_id: &str) -> GameResult<SessionHandle> {
        let record = self.store.read(owner, save_id)?;
        let mut table = self.sessions.write().map_err(|_| GameError::poisoned("session table"))?;
        let existing = table.get(&key(owner, save_id)).cloned();
        match existing {
            Some(handle) => {
                drop(table);
                let mut session = lock_session(&handle)?;
                if session.dirty {
                    warn!("Reload discarded unflushed edits for {}", session_label(owner, save_id));
                }
                *session = Session::new(record);
                drop(session);
                info!("Session reloaded: {}", session_label(owner, save_id));
                Ok(handle)
            }
            None => {
                let handle = Arc::new(Mutex::new(Session::new(record)));
                table.insert(key(owner, save_id), handle.clone());
                info!("Session loaded: {}", session_label(owner, save_id));
                Ok(handle)
            }
        }
    }

    /// Snapshot of the in-memory record.
    pub fn fetch(&self, owner: &str, save_id: &str) -> GameResult<SaveRecord> {
        let handle = self.require(owner, save_id)?;
        let session = lock_session(&handle)?;
        Ok(session.record.clone())
    }

    /// Replace the in-memory record of a loaded session. The replacement must
    /// have well-formed containers.
    pub fn update(&self, owner: &str, save_id: &str, mut record: SaveRecord) -> GameResult<()> {
        let handle = self.require(owner, save_id)?;
        check_shape(&record.inventory).map_err(|e| match e {
            GameError::Internal(msg) => GameError::Validation(msg),
            other => other,
        })?;
        record.owner = owner.to_string();
        record.save_id = save_id.to_string();
        let mut session = lock_session(&handle)?;
        session.record = record;
        session.updated_at = Utc::now();
        session.dirty = true;
        Ok(())
    }

    /// Write the in-memory record to disk. On failure memory stays ahead of
    /// disk and the session remains dirty.
    pub fn flush(&self, owner: &str, save_id: &str) -> GameResult<()> {
        let handle = self.require(owner, save_id)?;
        let mut session = lock_session(&handle)?;
        match self.store.write(&session.record) {
            Ok(()) => {
                session.dirty = false;
                debug!("Session flushed: {}", session_label(owner, save_id));
                Ok(())
            }
            Err(e) => {
                warn!("Flush failed for {}: {}", session_label(owner, save_id), e);
                Err(match e {
                    GameError::Internal(msg) => GameError::Internal(msg),
                    other => GameError::Internal(other.to_string()),
                })
            }
        }
    }

    /// Drop the session without flushing. Returns whether one was loaded.
    pub fn unload(&self, owner: &str, save_id: &str) -> GameResult<bool> {
        let mut table = self.sessions.write().map_err(|_| GameError::poisoned("session table"))?;
        let removed = table.remove(&key(owner, save_id));
        if let Some(handle) = &removed {
            if lock_session(handle).map(|s| s.dirty).unwrap_or(false) {
                warn!("Unloaded {} with unflushed edits", session_label(owner, save_id));
            }
            info!("Session unloaded: {}", session_label(owner, save_id));
        }
        Ok(removed.is_some())
    }

    /// Keys of every loaded session, sorted.
    pub fn loaded(&self) -> GameResult<Vec<SessionKey>> {
        let table = self.sessions.read().map_err(|_| GameError::poisoned("session table"))?;
        let mut keys: Vec<SessionKey> = table.keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }

    /// Flush every dirty session, carrying on past individual failures.
    pub fn flush_dirty(&self) -> GameResult<FlushReport> {
        let handles: Vec<(SessionKey, SessionHandle)> = {
            let table = self.sessions.read().map_err(|_| GameError::poisoned("session table"))?;
            table.iter().map(|(k, h)| (k.clone(), h.clone())).collect()
        };

        let mut report = FlushReport::default();
        for ((owner, save_id), handle) in handles {
            if !lock_session(&handle)?.dirty {
                continue;
            }
            match self.flush(&owner, &save_id) {
                Ok(()) => report.flushed += 1,
                // unloaded between the snapshot and now
                Err(GameError::NotFound(_)) => {}
                Err(_) => report.failed.push((owner, save_id)),
            }
        }
        Ok(report)
    }

    /// Write a brand-new record without loading it. An empty `save_id` gets a
    /// fresh uuid.
    pub fn create(&self, mut record: SaveRecord) -> GameResult<SaveRecord> {
        if record.save_id.is_empty() {
            record.save_id = new_save_id();
        }
        if self.store.exists(&record.owner, &record.save_id)? {
            return Err(GameError::Conflict(format!(
                "save {} already exists",
                session_label(&record.owner, &record.save_id)
            )));
        }
        self.store.write(&record)?;
        info!("Created save {}", session_label(&record.owner, &record.save_id));
        Ok(record)
    }

    /// Dispatch `action` against a loaded session while holding its lock for the
    /// whole read-modify-write cycle.
    pub fn apply(
        &self,
        owner: &str,
        save_id: &str,
        dispatcher: &Dispatcher,
        action: &Action,
    ) -> GameResult<ActionResult> {
        let handle = self.require(owner, save_id)?;
        let mut session = lock_session(&handle)?;
        let result = dispatcher.dispatch(&mut session.record, action);
        if result.success {
            session.updated_at = Utc::now();
            if result.delta.is_some() {
                session.dirty = true;
            }
        }
        Ok(result)
    }
}
