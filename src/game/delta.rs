//! Field-level differences between two versions of a save record, so clients can
//! patch their view instead of reloading the whole document.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::game::dialogue::DialogueView;
use crate::game::types::{GearSlot, SaveRecord, Slot};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Delta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub character: Option<CharacterDelta>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<LocationDelta>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inventory: Option<InventoryDelta>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub equipment: Option<EquipmentDelta>,
    /// Changed vault slots keyed by building id.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub vaults: BTreeMap<String, BTreeMap<usize, SlotDelta>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dialogue: Option<DialogueView>,
    /// Full contents of a vault the action opened.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub open_vault: Option<Vec<Slot>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CharacterDelta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hp: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_hp: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mana: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_mana: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fatigue: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hunger: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gold: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_of_day: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_day: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LocationDelta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub district: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub building: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub discovered: Vec<String>,
}

/// New state of one slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotDelta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_id: Option<String>,
    #[serde(default)]
    pub quantity: u32,
    #[serde(default)]
    pub empty: bool,
}

impl From<&Slot> for SlotDelta {
    fn from(slot: &Slot) -> Self {
        Self {
            item_id: slot.item.clone(),
            quantity: slot.quantity,
            empty: slot.is_empty(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InventoryDelta {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub general_slots: BTreeMap<usize, SlotDelta>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub backpack_slots: BTreeMap<usize, SlotDelta>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EquipmentDelta {
    /// Gear slot to its new item, `None` when emptied.
    pub changed: BTreeMap<GearSlot, Option<String>>,
}

fn changed<T: PartialEq + Clone>(before: &T, after: &T) -> Option<T> {
    if before == after {
        None
    } else {
        Some(after.clone())
    }
}

fn slot_changes(before: &[Slot], after: &[Slot]) -> BTreeMap<usize, SlotDelta> {
    let empty = Slot::empty(0);
    after
        .iter()
        .enumerate()
        .filter(|(i, slot)| {
            let old = before.get(*i).unwrap_or(&empty);
            old.item != slot.item || old.quantity != slot.quantity
        })
        .map(|(i, slot)| (i, SlotDelta::from(slot)))
        .collect()
}

impl Delta {
    /// Everything that differs between `before` and `after`.
    pub fn between(before: &SaveRecord, after: &SaveRecord) -> Self {
        let character = CharacterDelta {
            hp: changed(&before.hp, &after.hp),
            max_hp: changed(&before.max_hp, &after.max_hp),
            mana: changed(&before.mana, &after.mana),
            max_mana: changed(&before.max_mana, &after.max_mana),
            fatigue: changed(&before.fatigue, &after.fatigue),
            hunger: changed(&before.hunger, &after.hunger),
            gold: changed(&before.currency(), &after.currency()),
            time_of_day: changed(&before.time_of_day, &after.time_of_day),
            current_day: changed(&before.current_day, &after.current_day),
        };
        let location = LocationDelta {
            city: changed(&before.location, &after.location),
            district: changed(&before.district, &after.district),
            building: changed(&before.building, &after.building),
            discovered: after
                .locations_discovered
                .difference(&before.locations_discovered)
                .cloned()
                .collect(),
        };
        let inventory = InventoryDelta {
            general_slots: slot_changes(&before.inventory.general_slots, &after.inventory.general_slots),
            backpack_slots: slot_changes(
                &before.inventory.backpack_slots,
                &after.inventory.backpack_slots,
            ),
        };

        let mut equipment = EquipmentDelta::default();
        for gear in GearSlot::ALL {
            let old = before.inventory.gear(gear).map(|g| &g.item);
            let new = after.inventory.gear(gear).map(|g| &g.item);
            if old != new {
                equipment.changed.insert(gear, new.cloned());
            }
        }

        let mut vaults = BTreeMap::new();
        for (building, vault) in &after.inventory.vaults {
            let old = before
                .inventory
                .vault(building)
                .map(|v| v.slots.as_slice())
                .unwrap_or(&[]);
            let changes = if old.is_empty() {
                // newly registered: report every slot
                vault.slots.iter().map(|s| (s.index, SlotDelta::from(s))).collect()
            } else {
                slot_changes(old, &vault.slots)
            };
            if !changes.is_empty() {
                vaults.insert(building.clone(), changes);
            }
        }

        Delta {
            character: (character != CharacterDelta::default()).then_some(character),
            location: (location != LocationDelta::default()).then_some(location),
            inventory: (inventory != InventoryDelta::default()).then_some(inventory),
            equipment: (!equipment.changed.is_empty()).then_some(equipment),
            vaults,
            dialogue: None,
            open_vault: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Delta::default()
    }
}
