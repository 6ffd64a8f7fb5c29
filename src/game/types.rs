use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::game::delta::Delta;
use crate::game::errors::{ErrorKind, GameError, GameResult};

pub const SAVE_SCHEMA_VERSION: u8 = 1;

pub const GENERAL_CAPACITY: usize = 4;
pub const BACKPACK_CAPACITY: usize = 20;
pub const VAULT_CAPACITY: usize = 40;

/// Item id that doubles as the currency.
pub const CURRENCY_ITEM: &str = "gold-piece";

pub const MAX_HUNGER: i32 = 3;
pub const MINUTES_PER_DAY: u32 = 1440;

// ============================================================================
// Slots and containers
// ============================================================================

/// One addressable position inside a container.
///
/// `quantity` is zero exactly when `item` is `None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    #[serde(rename = "slot")]
    pub index: usize,
    #[serde(default)]
    pub item: Option<String>,
    #[serde(default)]
    pub quantity: u32,
}

impl Slot {
    pub fn empty(index: usize) -> Self {
        Self {
            index,
            item: None,
            quantity: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.item.is_none()
    }

    pub fn holds(&self, item_id: &str) -> bool {
        self.item.as_deref() == Some(item_id)
    }

    pub fn fill(&mut self, item_id: &str, quantity: u32) {
        if quantity == 0 {
            self.clear();
        } else {
            self.item = Some(item_id.to_string());
            self.quantity = quantity;
        }
    }

    pub fn clear(&mut self) {
        self.item = None;
        self.quantity = 0;
    }

    /// Reduce the stack by `amount`, clearing the slot when it reaches zero.
    pub fn reduce(&mut self, amount: u32) {
        let left = self.quantity.saturating_sub(amount);
        if left == 0 {
            self.clear();
        } else {
            self.quantity = left;
        }
    }

    pub(crate) fn swap_contents(&mut self, other: &mut Slot) {
        std::mem::swap(&mut self.item, &mut other.item);
        std::mem::swap(&mut self.quantity, &mut other.quantity);
    }
}

pub(crate) fn empty_slots(capacity: usize) -> Vec<Slot> {
    (0..capacity).map(Slot::empty).collect()
}

/// The kinds of slot-addressed containers a player owns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainerKind {
    General,
    Backpack,
    Vault,
}

impl ContainerKind {
    pub fn capacity(&self) -> usize {
        match self {
            ContainerKind::General => GENERAL_CAPACITY,
            ContainerKind::Backpack => BACKPACK_CAPACITY,
            ContainerKind::Vault => VAULT_CAPACITY,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ContainerKind::General => "general",
            ContainerKind::Backpack => "backpack",
            ContainerKind::Vault => "vault",
        }
    }

    /// Parse a container name as sent by clients. `inventory` and `bag` are
    /// accepted for the backpack.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "general" => Some(ContainerKind::General),
            "backpack" | "inventory" | "bag" => Some(ContainerKind::Backpack),
            "vault" => Some(ContainerKind::Vault),
            _ => None,
        }
    }
}

/// A concrete container address. Vaults are addressed by building id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ContainerId {
    General,
    Backpack,
    Vault(String),
}

impl ContainerId {
    pub fn kind(&self) -> ContainerKind {
        match self {
            ContainerId::General => ContainerKind::General,
            ContainerId::Backpack => ContainerKind::Backpack,
            ContainerId::Vault(_) => ContainerKind::Vault,
        }
    }

    pub fn is_backpack(&self) -> bool {
        matches!(self, ContainerId::Backpack)
    }
}

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContainerId::Vault(building) => write!(f, "vault@{}", building),
            other => f.write_str(other.kind().as_str()),
        }
    }
}

/// Address of one slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SlotRef {
    pub container: ContainerId,
    pub index: usize,
}

impl SlotRef {
    pub fn new(container: ContainerId, index: usize) -> Self {
        Self { container, index }
    }

    pub fn general(index: usize) -> Self {
        Self::new(ContainerId::General, index)
    }

    pub fn backpack(index: usize) -> Self {
        Self::new(ContainerId::Backpack, index)
    }

    pub fn vault(building: &str, index: usize) -> Self {
        Self::new(ContainerId::Vault(building.to_string()), index)
    }
}

impl fmt::Display for SlotRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.container, self.index)
    }
}

// ============================================================================
// Equipment
// ============================================================================

/// Named gear positions; each holds at most one occupant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GearSlot {
    Neck,
    Head,
    Ammo,
    Mainhand,
    Chest,
    Offhand,
    Ring1,
    Legs,
    Ring2,
    Gloves,
    Boots,
    Bag,
}

impl GearSlot {
    pub const ALL: [GearSlot; 12] = [
        GearSlot::Neck,
        GearSlot::Head,
        GearSlot::Ammo,
        GearSlot::Mainhand,
        GearSlot::Chest,
        GearSlot::Offhand,
        GearSlot::Ring1,
        GearSlot::Legs,
        GearSlot::Ring2,
        GearSlot::Gloves,
        GearSlot::Boots,
        GearSlot::Bag,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            GearSlot::Neck => "neck",
            GearSlot::Head => "head",
            GearSlot::Ammo => "ammo",
            GearSlot::Mainhand => "mainhand",
            GearSlot::Chest => "chest",
            GearSlot::Offhand => "offhand",
            GearSlot::Ring1 => "ring1",
            GearSlot::Legs => "legs",
            GearSlot::Ring2 => "ring2",
            GearSlot::Gloves => "gloves",
            GearSlot::Boots => "boots",
            GearSlot::Bag => "bag",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim().to_lowercase();
        match s.as_str() {
            "weapon" | "main_hand" => Some(GearSlot::Mainhand),
            "shield" | "off_hand" => Some(GearSlot::Offhand),
            "armor" | "body" => Some(GearSlot::Chest),
            "backpack" => Some(GearSlot::Bag),
            _ => GearSlot::ALL.into_iter().find(|g| g.as_str() == s),
        }
    }
}

impl fmt::Display for GearSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The occupant of a gear slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GearEntry {
    pub item: String,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
}

fn default_quantity() -> u32 {
    1
}

// ============================================================================
// Inventory aggregate
// ============================================================================

/// Per-building storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vault {
    pub building: String,
    pub slots: Vec<Slot>,
}

impl Vault {
    pub fn new(building: &str) -> Self {
        Self {
            building: building.to_string(),
            slots: empty_slots(VAULT_CAPACITY),
        }
    }
}

/// All containers of one character: general pockets, the backpack carried by the
/// worn bag, the gear slots and every registered vault.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inventory {
    pub general_slots: Vec<Slot>,
    pub backpack_slots: Vec<Slot>,
    #[serde(default)]
    pub gear_slots: BTreeMap<GearSlot, GearEntry>,
    #[serde(default)]
    pub vaults: BTreeMap<String, Vault>,
}

impl Default for Inventory {
    fn default() -> Self {
        Self {
            general_slots: empty_slots(GENERAL_CAPACITY),
            backpack_slots: empty_slots(BACKPACK_CAPACITY),
            gear_slots: BTreeMap::new(),
            vaults: BTreeMap::new(),
        }
    }
}

impl Inventory {
    pub fn bag_equipped(&self) -> bool {
        self.gear_slots.contains_key(&GearSlot::Bag)
    }

    pub fn gear(&self, slot: GearSlot) -> Option<&GearEntry> {
        self.gear_slots.get(&slot)
    }

    pub fn vault(&self, building: &str) -> Option<&Vault> {
        self.vaults.get(building)
    }

    pub fn has_vault(&self, building: &str) -> bool {
        self.vaults.contains_key(building)
    }

    /// Create a vault for `building` if none exists yet. Returns `true` when created.
    pub fn register_vault(&mut self, building: &str) -> bool {
        if self.vaults.contains_key(building) {
            return false;
        }
        self.vaults
            .insert(building.to_string(), Vault::new(building));
        true
    }

    pub fn slots(&self, container: &ContainerId) -> GameResult<&[Slot]> {
        match container {
            ContainerId::General => Ok(&self.general_slots),
            ContainerId::Backpack => {
                if !self.bag_equipped() {
                    return Err(GameError::NotFound("no bag equipped".into()));
                }
                Ok(&self.backpack_slots)
            }
            ContainerId::Vault(building) => self
                .vaults
                .get(building)
                .map(|v| v.slots.as_slice())
                .ok_or_else(|| GameError::NotFound(format!("no vault registered at {}", building))),
        }
    }

    pub fn slots_mut(&mut self, container: &ContainerId) -> GameResult<&mut [Slot]> {
        match container {
            ContainerId::General => Ok(&mut self.general_slots),
            ContainerId::Backpack => {
                if !self.bag_equipped() {
                    return Err(GameError::NotFound("no bag equipped".into()));
                }
                Ok(&mut self.backpack_slots)
            }
            ContainerId::Vault(building) => self
                .vaults
                .get_mut(building)
                .map(|v| v.slots.as_mut_slice())
                .ok_or_else(|| GameError::NotFound(format!("no vault registered at {}", building))),
        }
    }

    pub fn slot(&self, at: &SlotRef) -> GameResult<&Slot> {
        self.slots(&at.container)?
            .get(at.index)
            .ok_or_else(|| GameError::NotFound(format!("slot {}", at)))
    }

    pub fn slot_mut(&mut self, at: &SlotRef) -> GameResult<&mut Slot> {
        self.slots_mut(&at.container)?
            .get_mut(at.index)
            .ok_or_else(|| GameError::NotFound(format!("slot {}", at)))
    }

    pub fn occupied(&self, container: &ContainerId) -> usize {
        self.slots(container)
            .map(|slots| slots.iter().filter(|s| !s.is_empty()).count())
            .unwrap_or(0)
    }

    /// Containers an item can be carried in, backpack first when a bag is worn.
    pub fn carried_containers(&self) -> Vec<ContainerId> {
        if self.bag_equipped() {
            vec![ContainerId::Backpack, ContainerId::General]
        } else {
            vec![ContainerId::General]
        }
    }
}

// ============================================================================
// Save record
// ============================================================================

/// The durable document describing one character.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveRecord {
    pub owner: String,
    pub save_id: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub race: String,
    #[serde(default)]
    pub class: String,
    pub hp: i32,
    pub max_hp: i32,
    #[serde(default)]
    pub mana: i32,
    #[serde(default)]
    pub max_mana: i32,
    #[serde(default)]
    pub fatigue: i32,
    #[serde(default)]
    pub fatigue_accumulator: u32,
    #[serde(default = "default_hunger")]
    pub hunger: i32,
    #[serde(default)]
    pub hunger_accumulator: u32,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub district: String,
    #[serde(default)]
    pub building: String,
    #[serde(default = "default_day")]
    pub current_day: u32,
    /// Minutes since midnight, always below [`MINUTES_PER_DAY`].
    #[serde(default)]
    pub time_of_day: u32,
    #[serde(default)]
    pub inventory: Inventory,
    #[serde(default)]
    pub known_spells: Vec<String>,
    #[serde(default)]
    pub spell_slots: BTreeMap<String, u32>,
    #[serde(default)]
    pub locations_discovered: BTreeSet<String>,
    #[serde(default)]
    pub music_tracks_unlocked: Vec<String>,
    /// Current dialogue node per NPC id.
    #[serde(default)]
    pub dialogue: BTreeMap<String, String>,
    #[serde(default = "default_schema_version")]
    pub schema_version: u8,
}

fn default_hunger() -> i32 {
    2
}

fn default_day() -> u32 {
    1
}

fn default_schema_version() -> u8 {
    SAVE_SCHEMA_VERSION
}

impl SaveRecord {
    pub fn new(owner: &str, save_id: &str) -> Self {
        Self {
            owner: owner.to_string(),
            save_id: save_id.to_string(),
            created_at: Utc::now(),
            race: "Human".to_string(),
            class: "Fighter".to_string(),
            hp: 10,
            max_hp: 10,
            mana: 0,
            max_mana: 0,
            fatigue: 0,
            fatigue_accumulator: 0,
            hunger: default_hunger(),
            hunger_accumulator: 0,
            location: "kingdom".to_string(),
            district: "center".to_string(),
            building: String::new(),
            current_day: default_day(),
            time_of_day: 8 * 60,
            inventory: Inventory::default(),
            known_spells: Vec::new(),
            spell_slots: BTreeMap::new(),
            locations_discovered: BTreeSet::from(["kingdom".to_string()]),
            music_tracks_unlocked: Vec::new(),
            dialogue: BTreeMap::new(),
            schema_version: SAVE_SCHEMA_VERSION,
        }
    }

    pub fn with_race(mut self, race: &str) -> Self {
        self.race = race.to_string();
        self
    }

    pub fn with_class(mut self, class: &str) -> Self {
        self.class = class.to_string();
        self
    }

    pub fn with_vitals(mut self, max_hp: i32, max_mana: i32) -> Self {
        self.max_hp = max_hp.max(1);
        self.hp = self.max_hp;
        self.max_mana = max_mana.max(0);
        self.mana = self.max_mana;
        self
    }

    pub fn with_location(mut self, location: &str, district: &str) -> Self {
        self.location = location.to_string();
        self.district = district.to_string();
        self.locations_discovered.insert(location.to_string());
        self
    }

    /// Building the character stands in, if any.
    pub fn current_building(&self) -> Option<&str> {
        if self.building.is_empty() {
            None
        } else {
            Some(self.building.as_str())
        }
    }

    /// Gold pieces carried in general pockets and the backpack.
    pub fn currency(&self) -> u32 {
        crate::game::inventory::count_item(&self.inventory, CURRENCY_ITEM)
    }

    /// Clamp every bounded vital back into range.
    pub fn clamp_vitals(&mut self, max_fatigue: i32) {
        self.max_hp = self.max_hp.max(0);
        self.max_mana = self.max_mana.max(0);
        self.hp = self.hp.clamp(0, self.max_hp);
        self.mana = self.mana.clamp(0, self.max_mana);
        self.fatigue = self.fatigue.clamp(0, max_fatigue);
        self.hunger = self.hunger.clamp(0, MAX_HUNGER);
    }
}

// ============================================================================
// Actions
// ============================================================================

/// A tagged request to mutate one save record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub params: Map<String, Value>,
}

impl Action {
    pub fn new(kind: &str) -> Self {
        Self {
            kind: kind.to_string(),
            params: Map::new(),
        }
    }

    pub fn with_param(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.params.insert(key.to_string(), value.into());
        self
    }
}

/// Outcome of one dispatched action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionResult {
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delta: Option<Delta>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorKind>,
}

impl ActionResult {
    pub fn ok(message: impl Into<String>, delta: Option<Delta>) -> Self {
        Self {
            success: true,
            message: message.into(),
            delta,
            error: None,
        }
    }

    pub fn failed(err: &GameError) -> Self {
        Self {
            success: false,
            message: err.to_string(),
            delta: None,
            error: Some(err.kind()),
        }
    }
}
