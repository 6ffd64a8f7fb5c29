//! Game state core: save records, the slot-addressed inventory engine, time and
//! vitals, NPC dialogue, and the action dispatcher that ties them together.
//!
//! ```text
//! caller ──► SessionManager::apply ──► Dispatcher ──► inventory / vitals / dialogue
//!                   │                                        │
//!                   └──── SaveStore (flush) ◄──── SaveRecord ◄┘
//! ```

pub mod actions;
pub mod delta;
pub mod dialogue;
pub mod errors;
pub mod inventory;
pub mod reference;
pub mod session;
pub mod types;
pub mod vitals;

pub use actions::{ActionKind, Dispatcher};
pub use delta::Delta;
pub use errors::{ErrorKind, GameError, GameResult};
pub use reference::{Catalog, ReferenceData};
pub use session::{Session, SessionManager};
pub use types::{Action, ActionResult, ContainerId, GearSlot, Inventory, SaveRecord, Slot, SlotRef};
pub use vitals::GameRules;
