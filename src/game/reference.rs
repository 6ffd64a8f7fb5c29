//! Read-only reference data consumed by the inventory engine and the action handlers.
//!
//! Static content (items, NPC dialogue graphs, buildings, locations) is owned by an
//! external content store. The core only sees it through [`ReferenceData`]; the
//! in-memory [`Catalog`] implementation is filled from JSON seed files or built up
//! in code for tests.

use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::Path;

use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::game::dialogue::DialogueNode;
use crate::game::errors::{GameError, GameResult};

/// Tag that marks an item able to hold other items.
pub const CONTAINER_TAG: &str = "container";

/// Static description of an item kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemRecord {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default, alias = "stack")]
    pub stack_limit: Option<u32>,
    /// Raw effect list; parsed leniently by [`ItemRecord::effects`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effects: Option<Value>,
    /// Default gear slot for equipping, e.g. `mainhand` or `bag`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gear_slot: Option<String>,
}

impl ItemRecord {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            name: id.to_string(),
            tags: BTreeSet::new(),
            stack_limit: None,
            effects: None,
            gear_slot: None,
        }
    }

    pub fn with_tag(mut self, tag: &str) -> Self {
        self.tags.insert(tag.to_string());
        self
    }

    pub fn with_stack_limit(mut self, limit: u32) -> Self {
        self.stack_limit = Some(limit);
        self
    }

    pub fn with_effects(mut self, effects: Value) -> Self {
        self.effects = Some(effects);
        self
    }

    pub fn with_gear_slot(mut self, slot: &str) -> Self {
        self.gear_slot = Some(slot.to_string());
        self
    }

    pub fn stack_limit(&self) -> u32 {
        self.stack_limit.filter(|n| *n > 0).unwrap_or(1)
    }

    pub fn is_container(&self) -> bool {
        self.tags.contains(CONTAINER_TAG)
    }

    /// Parsed effect list. `None` when the item has no effect data or the data is
    /// not a list; individual malformed entries are skipped.
    pub fn effects(&self) -> Option<Vec<ItemEffect>> {
        let list = self.effects.as_ref()?.as_array()?;
        let parsed = list
            .iter()
            .filter_map(|entry| {
                let kind = entry.get("type")?.as_str()?;
                let value = entry.get("value")?.as_f64()?;
                Some(ItemEffect {
                    kind: EffectKind::parse(kind),
                    value: value as i32,
                })
            })
            .collect();
        Some(parsed)
    }
}

/// Which vital an effect touches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EffectKind {
    Hp,
    Mana,
    Hunger,
    Fatigue,
    Other(String),
}

impl EffectKind {
    pub fn parse(s: &str) -> Self {
        match s {
            "hp" | "health" => EffectKind::Hp,
            "mana" => EffectKind::Mana,
            "hunger" => EffectKind::Hunger,
            "fatigue" => EffectKind::Fatigue,
            other => EffectKind::Other(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemEffect {
    pub kind: EffectKind,
    pub value: i32,
}

/// Greeting lines picked by the player's standing with the NPC.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Greeting {
    #[serde(default)]
    pub first_time: String,
    #[serde(default)]
    pub returning: String,
    #[serde(default)]
    pub native_race: String,
}

/// An NPC and its dialogue graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NpcRecord {
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// Building the NPC works in, if fixed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub building: Option<String>,
    /// Location (city) the NPC stays in, if fixed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default)]
    pub greeting: Greeting,
    /// Node a conversation starts at.
    #[serde(default = "default_entry_node")]
    pub entry: String,
    #[serde(default)]
    pub dialogue: HashMap<String, DialogueNode>,
}

fn default_entry_node() -> String {
    "greeting".to_string()
}

impl NpcRecord {
    pub fn new(id: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            building: None,
            location: None,
            greeting: Greeting::default(),
            entry: default_entry_node(),
            dialogue: HashMap::new(),
        }
    }

    pub fn in_building(mut self, building: &str) -> Self {
        self.building = Some(building.to_string());
        self
    }

    pub fn with_greeting(mut self, greeting: Greeting) -> Self {
        self.greeting = greeting;
        self
    }

    pub fn with_node(mut self, name: &str, node: DialogueNode) -> Self {
        self.dialogue.insert(name.to_string(), node);
        self
    }

    pub fn node(&self, name: &str) -> Option<&DialogueNode> {
        self.dialogue.get(name)
    }
}

/// A building with optional opening hours, in minutes since midnight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildingRecord {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub location: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opens_at: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub closes_at: Option<u32>,
}

impl BuildingRecord {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            name: id.to_string(),
            location: String::new(),
            opens_at: None,
            closes_at: None,
        }
    }

    pub fn with_hours(mut self, opens_at: u32, closes_at: u32) -> Self {
        self.opens_at = Some(opens_at);
        self.closes_at = Some(closes_at);
        self
    }

    /// Whether the building admits visitors at `minute`. Buildings without hours
    /// never close; hours may wrap past midnight.
    pub fn is_open_at(&self, minute: u32) -> bool {
        match (self.opens_at, self.closes_at) {
            (Some(open), Some(close)) if open == close => true,
            (Some(open), Some(close)) if open < close => minute >= open && minute < close,
            (Some(open), Some(close)) => minute >= open || minute < close,
            _ => true,
        }
    }
}

/// A city or region and the races native to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationRecord {
    pub id: String,
    #[serde(default)]
    pub native_races: Vec<String>,
}

/// Lookup contract for static game content.
pub trait ReferenceData: Send + Sync {
    fn item(&self, id: &str) -> Option<&ItemRecord>;
    fn npc(&self, id: &str) -> Option<&NpcRecord>;
    fn building(&self, id: &str) -> Option<&BuildingRecord>;
    fn native_races(&self, location: &str) -> &[String];

    /// Stack limit of an item kind; unknown items stack to one.
    fn stack_limit(&self, item_id: &str) -> u32 {
        self.item(item_id).map(ItemRecord::stack_limit).unwrap_or(1)
    }

    fn is_container(&self, item_id: &str) -> bool {
        self.item(item_id).map(ItemRecord::is_container).unwrap_or(false)
    }

    fn is_native(&self, race: &str, location: &str) -> bool {
        self.native_races(location).iter().any(|r| r == race)
    }
}

/// In-memory reference catalog.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    items: HashMap<String, ItemRecord>,
    npcs: HashMap<String, NpcRecord>,
    buildings: HashMap<String, BuildingRecord>,
    locations: HashMap<String, LocationRecord>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_item(mut self, item: ItemRecord) -> Self {
        self.items.insert(item.id.clone(), item);
        self
    }

    pub fn with_npc(mut self, npc: NpcRecord) -> Self {
        self.npcs.insert(npc.id.clone(), npc);
        self
    }

    pub fn with_building(mut self, building: BuildingRecord) -> Self {
        self.buildings.insert(building.id.clone(), building);
        self
    }

    pub fn with_location(mut self, location: LocationRecord) -> Self {
        self.locations.insert(location.id.clone(), location);
        self
    }

    /// Merge every seed file that is present. Missing paths are skipped.
    pub fn load_seeds(
        items: Option<&Path>,
        npcs: Option<&Path>,
        buildings: Option<&Path>,
        locations: Option<&Path>,
    ) -> GameResult<Self> {
        let mut catalog = Catalog::new();
        for item in load_seed_file::<ItemRecord>(items)? {
            catalog = catalog.with_item(item);
        }
        for npc in load_seed_file::<NpcRecord>(npcs)? {
            catalog = catalog.with_npc(npc);
        }
        for building in load_seed_file::<BuildingRecord>(buildings)? {
            catalog = catalog.with_building(building);
        }
        for location in load_seed_file::<LocationRecord>(locations)? {
            catalog = catalog.with_location(location);
        }
        debug!(
            "Reference catalog loaded: {} items, {} npcs, {} buildings, {} locations",
            catalog.items.len(),
            catalog.npcs.len(),
            catalog.buildings.len(),
            catalog.locations.len()
        );
        Ok(catalog)
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }
}

impl ReferenceData for Catalog {
    fn item(&self, id: &str) -> Option<&ItemRecord> {
        self.items.get(id)
    }

    fn npc(&self, id: &str) -> Option<&NpcRecord> {
        self.npcs.get(id)
    }

    fn building(&self, id: &str) -> Option<&BuildingRecord> {
        self.buildings.get(id)
    }

    fn native_races(&self, location: &str) -> &[String] {
        self.locations
            .get(location)
            .map(|l| l.native_races.as_slice())
            .unwrap_or(&[])
    }
}

fn load_seed_file<T: DeserializeOwned>(path: Option<&Path>) -> GameResult<Vec<T>> {
    let Some(path) = path else {
        return Ok(Vec::new());
    };
    if !path.exists() {
        warn!("Seed file {} not found; skipping", path.display());
        return Ok(Vec::new());
    }
    let contents = fs::read_to_string(path)?;
    serde_json::from_str(&contents)
        .map_err(|e| GameError::Internal(format!("failed to parse {}: {}", path.display(), e)))
}
