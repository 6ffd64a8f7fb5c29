//! Test utilities & fixtures.
//! Seed content lives under `tests/fixtures`; every test gets its own temp data dir.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use savekeep::game::types::GearEntry;
use savekeep::game::{Action, Catalog, Dispatcher, GameRules, GearSlot, SaveRecord, SessionManager};
use savekeep::storage::SaveStore;
use serde_json::Value;
use tempfile::TempDir;

/// Return the path to the static seed fixture directory.
pub fn fixture_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests").join("fixtures")
}

pub fn catalog() -> Catalog {
    let root = fixture_root();
    Catalog::load_seeds(
        Some(&root.join("items.json")),
        Some(&root.join("npcs.json")),
        Some(&root.join("buildings.json")),
        Some(&root.join("locations.json")),
    )
    .expect("seed catalog")
}

#[allow(dead_code)]
pub fn dispatcher() -> Dispatcher {
    dispatcher_with(GameRules::default())
}

#[allow(dead_code)]
pub fn dispatcher_with(rules: GameRules) -> Dispatcher {
    Dispatcher::new(Arc::new(catalog()), rules)
}

#[allow(dead_code)]
pub fn manager() -> (TempDir, SessionManager) {
    let tmp = TempDir::new().expect("tempdir");
    let store = SaveStore::new(tmp.path()).expect("store");
    (tmp, SessionManager::new(store))
}

/// A fresh character wearing a backpack, carrying `gold` gold pieces in general slot 0.
#[allow(dead_code)]
pub fn adventurer(owner: &str, save_id: &str, gold: u32) -> SaveRecord {
    let mut record = SaveRecord::new(owner, save_id).with_vitals(20, 10);
    record.inventory.gear_slots.insert(
        GearSlot::Bag,
        GearEntry {
            item: "leather-backpack".into(),
            quantity: 1,
        },
    );
    if gold > 0 {
        record.inventory.general_slots[0].fill("gold-piece", gold);
    }
    record
}

/// Build an action from a tag and a JSON object of parameters.
#[allow(dead_code)]
pub fn act(kind: &str, params: Value) -> Action {
    let mut action = Action::new(kind);
    if let Value::Object(map) = params {
        action.params = map;
    }
    action
}
