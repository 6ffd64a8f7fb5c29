//! # Savekeep - Session Store for Persistent RPG Save Records
//!
//! Savekeep holds character save records in memory, applies player actions to
//! them one atomic step at a time, and writes them back to disk on request.
//!
//! ## Features
//!
//! - **Session Table**: at most one live session per (owner, save id), behind a
//!   read-write lock, with a per-session lock held across each action.
//! - **Inventory Engine**: fixed-size general, backpack and vault containers with
//!   stack limits, a no-containers-in-the-backpack rule, and twelve gear slots.
//! - **Action Dispatch**: twenty tagged actions covering travel, time, items,
//!   equipment, buildings, NPC dialogue and vaults. Each action returns a typed
//!   delta and either applies fully or not at all.
//! - **Durable Storage**: one JSON document per save, written atomically under
//!   an exclusive file lock.
//! - **Autosave**: optional periodic flush of dirty sessions on UTC minute boundaries.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use savekeep::game::{Action, Catalog, Dispatcher, GameRules, SaveRecord, SessionManager};
//! use savekeep::storage::SaveStore;
//!
//! fn main() -> savekeep::game::GameResult<()> {
//!     let sessions = SessionManager::new(SaveStore::new("./data")?);
//!     let dispatcher = Dispatcher::new(Arc::new(Catalog::new()), GameRules::default());
//!
//!     sessions.create(SaveRecord::new("alice", "slot1"))?;
//!     sessions.load("alice", "slot1")?;
//!     let result = sessions.apply(
//!         "alice",
//!         "slot1",
//!         &dispatcher,
//!         &Action::new("move").with_param("location", "forest"),
//!     )?;
//!     println!("{}", result.message);
//!     sessions.flush("alice", "slot1")?;
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! - [`game`] - save records, inventory, vitals, dialogue, dispatcher and sessions
//! - [`storage`] - durable save documents and the autosave scheduler
//! - [`service`] - newline-delimited JSON request handling for `savekeep serve`
//! - [`config`] - TOML configuration
//! - [`validation`] - identifier checks and safe file names
//! - [`logutil`] - log-safe string rendering

pub mod config;
pub mod game;
pub mod logutil;
pub mod service;
pub mod storage;
pub mod validation;
