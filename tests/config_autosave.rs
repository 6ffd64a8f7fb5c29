//! Configuration loading, autosave scheduling and the request protocol wired
//! together the way `savekeep serve` runs them.
mod common;

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use serde_json::{json, Value};
use tempfile::TempDir;

use common::{act, adventurer, fixture_root, manager};
use savekeep::config::Config;
use savekeep::game::{Dispatcher, SessionManager};
use savekeep::service::SaveService;
use savekeep::storage::autosave::{AutosaveConfig, AutosaveFrequency, AutosaveScheduler};
use savekeep::storage::SaveStore;

fn at(hour: u32, minute: u32, second: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, hour, minute, second).unwrap()
}

fn write_config(dir: &TempDir) -> String {
    let fixtures = fixture_root();
    let body = format!(
        r#"
[storage]
data_dir = {data:?}

[content]
items_file = {items:?}
npcs_file = {npcs:?}
buildings_file = {buildings:?}
locations_file = {locations:?}

[rules]
vault_cost = 5

[autosave]
enabled = true
frequency = "15min"
"#,
        data = dir.path().join("data").display().to_string(),
        items = fixtures.join("items.json").display().to_string(),
        npcs = fixtures.join("npcs.json").display().to_string(),
        buildings = fixtures.join("buildings.json").display().to_string(),
        locations = fixtures.join("locations.json").display().to_string(),
    );
    let path = dir.path().join("config.toml");
    std::fs::write(&path, body).unwrap();
    path.display().to_string()
}

#[test]
fn test_config_drives_catalog_and_rules() {
    let tmp = TempDir::new().unwrap();
    let path = write_config(&tmp);
    let config = tokio_test::block_on(Config::load(&path)).unwrap();

    assert_eq!(config.rules.vault_cost, 5);
    assert_eq!(config.rules.minutes_per_segment, 60);
    assert!(config.autosave.enabled);
    assert_eq!(config.autosave.frequency, AutosaveFrequency::Every15Minutes);

    let catalog = config.content.load_catalog().unwrap();
    assert!(catalog.item_count() >= 9);

    let store = SaveStore::new(&config.storage.data_dir).unwrap();
    assert!(store.data_dir().join("saves").is_dir());
}

#[test]
fn test_config_rejects_zero_segment_length() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("bad.toml");
    std::fs::write(&path, "[rules]\nminutes_per_segment = 0\n").unwrap();
    let err = tokio_test::block_on(Config::load(&path.display().to_string())).unwrap_err();
    assert!(err.to_string().contains("minutes_per_segment"));

    let missing = tmp.path().join("missing.toml");
    assert!(tokio_test::block_on(Config::load(&missing.display().to_string())).is_err());
}

#[test]
fn test_default_config_round_trips_through_disk() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("config.toml").display().to_string();
    tokio_test::block_on(Config::create_default(&path)).unwrap();
    let config = tokio_test::block_on(Config::load(&path)).unwrap();
    assert_eq!(config, Config::default());
}

#[test]
fn test_autosave_flushes_dirty_sessions_on_boundaries() {
    let (_tmp, mgr) = manager();
    let d = common::dispatcher();
    mgr.create(adventurer("gwen", "s", 0)).unwrap();
    mgr.load("gwen", "s").unwrap();

    let mut scheduler = AutosaveScheduler::new(AutosaveConfig {
        enabled: true,
        frequency: AutosaveFrequency::Every5Minutes,
    });

    mgr.apply("gwen", "s", &d, &act("rest", json!({}))).unwrap();
    assert!(scheduler.check_and_flush_at(&mgr, at(10, 3, 0)).unwrap().is_none());

    let report = scheduler.check_and_flush_at(&mgr, at(10, 5, 0)).unwrap().unwrap();
    assert_eq!(report.flushed, 1);
    assert!(scheduler.last_flush_time().is_some());
    assert_eq!(mgr.store().read("gwen", "s").unwrap().time_of_day, 16 * 60);

    // same boundary minute runs once
    mgr.apply("gwen", "s", &d, &act("wait", json!({"hours": 1}))).unwrap();
    assert!(scheduler.check_and_flush_at(&mgr, at(10, 5, 40)).unwrap().is_none());

    let report = scheduler.check_and_flush_at(&mgr, at(10, 10, 0)).unwrap().unwrap();
    assert_eq!(report.flushed, 1);
    assert_eq!(mgr.store().read("gwen", "s").unwrap().time_of_day, 17 * 60);

    // nothing dirty: the check still runs but writes nothing
    let report = scheduler.check_and_flush_at(&mgr, at(10, 15, 0)).unwrap().unwrap();
    assert_eq!(report.flushed, 0);

    let mut disabled = AutosaveScheduler::new(AutosaveConfig {
        enabled: false,
        frequency: AutosaveFrequency::Every5Minutes,
    });
    mgr.apply("gwen", "s", &d, &act("rest", json!({}))).unwrap();
    assert!(disabled.check_and_flush_at(&mgr, at(10, 20, 0)).unwrap().is_none());
    assert_eq!(mgr.store().read("gwen", "s").unwrap().time_of_day, 17 * 60);
}

fn service(tmp: &TempDir) -> SaveService {
    let sessions = SessionManager::new(SaveStore::new(tmp.path()).unwrap());
    let dispatcher = Dispatcher::new(Arc::new(common::catalog()), Default::default());
    SaveService::new(sessions, dispatcher)
}

fn call(service: &SaveService, request: Value) -> Value {
    serde_json::from_str(&service.handle_line(&request.to_string())).unwrap()
}

#[test]
fn test_request_protocol_end_to_end() {
    let tmp = TempDir::new().unwrap();
    let svc = service(&tmp);
    svc.sessions().create(adventurer("hana", "main", 12)).unwrap();

    let out = call(&svc, json!({"op": "fetch", "owner": "hana", "save_id": "main"}));
    assert_eq!(out["ok"], false);
    assert_eq!(out["error"], "not_found");

    let out = call(&svc, json!({"op": "load", "owner": "hana", "save_id": "main"}));
    assert_eq!(out["ok"], true);
    assert_eq!(out["record"]["owner"], "hana");

    let out = call(
        &svc,
        json!({
            "op": "action", "owner": "hana", "save_id": "main",
            "action": {"type": "move", "params": {"location": "forest"}}
        }),
    );
    assert_eq!(out["ok"], true);
    assert_eq!(out["result"]["message"], "Moved to forest");
    assert_eq!(out["result"]["delta"]["location"]["city"], "forest");

    let out = call(
        &svc,
        json!({
            "op": "action", "owner": "hana", "save_id": "main",
            "action": {"type": "teleport"}
        }),
    );
    assert_eq!(out["ok"], false);
    assert_eq!(out["result"]["error"], "unknown_action");

    let out = call(&svc, json!({"op": "flush", "owner": "hana", "save_id": "main"}));
    assert_eq!(out["ok"], true);
    assert_eq!(svc.sessions().store().read("hana", "main").unwrap().location, "forest");

    let out = call(&svc, json!({"op": "unload", "owner": "hana", "save_id": "main"}));
    assert_eq!(out["ok"], true);
    assert!(svc.sessions().loaded().unwrap().is_empty());

    let raw = svc.handle_line("{not json");
    let out: Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(out["error"], "validation_error");
}
