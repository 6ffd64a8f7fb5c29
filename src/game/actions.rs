//! Action dispatch: turns one tagged [`Action`] into one atomic mutation of a
//! [`SaveRecord`].
//!
//! Handlers run against a private copy of the record. The copy replaces the
//! caller's record only when the handler succeeds, so a failed action never
//! leaves a half-applied change behind. The returned [`ActionResult`] carries a
//! [`Delta`] of everything the action changed.

use std::sync::Arc;

use log::{debug, info};
use serde_json::{Map, Value};

use crate::game::delta::Delta;
use crate::game::dialogue::{self, DialogueView};
use crate::game::errors::{GameError, GameResult};
use crate::game::inventory::{self, first_empty, MoveOutcome};
use crate::game::reference::ReferenceData;
use crate::game::types::{
    Action, ActionResult, ContainerId, ContainerKind, GearSlot, SaveRecord, Slot, SlotRef,
    CURRENCY_ITEM,
};
use crate::game::vitals::{self, GameRules, TimeReport};
use crate::logutil::escape_log;

/// The closed set of supported action tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    Move,
    AdvanceTime,
    Wait,
    Rest,
    UseItem,
    AddItem,
    MoveItem,
    StackItem,
    SplitItem,
    DropItem,
    EquipItem,
    UnequipItem,
    EnterBuilding,
    ExitBuilding,
    TalkToNpc,
    NpcDialogueChoice,
    RegisterVault,
    OpenVault,
    VaultDeposit,
    VaultWithdraw,
}

impl ActionKind {
    pub const ALL: [ActionKind; 20] = [
        ActionKind::Move,
        ActionKind::AdvanceTime,
        ActionKind::Wait,
        ActionKind::Rest,
        ActionKind::UseItem,
        ActionKind::AddItem,
        ActionKind::MoveItem,
        ActionKind::StackItem,
        ActionKind::SplitItem,
        ActionKind::DropItem,
        ActionKind::EquipItem,
        ActionKind::UnequipItem,
        ActionKind::EnterBuilding,
        ActionKind::ExitBuilding,
        ActionKind::TalkToNpc,
        ActionKind::NpcDialogueChoice,
        ActionKind::RegisterVault,
        ActionKind::OpenVault,
        ActionKind::VaultDeposit,
        ActionKind::VaultWithdraw,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Move => "move",
            ActionKind::AdvanceTime => "advance_time",
            ActionKind::Wait => "wait",
            ActionKind::Rest => "rest",
            ActionKind::UseItem => "use_item",
            ActionKind::AddItem => "add_item",
            ActionKind::MoveItem => "move_item",
            ActionKind::StackItem => "stack_item",
            ActionKind::SplitItem => "split_item",
            ActionKind::DropItem => "drop_item",
            ActionKind::EquipItem => "equip_item",
            ActionKind::UnequipItem => "unequip_item",
            ActionKind::EnterBuilding => "enter_building",
            ActionKind::ExitBuilding => "exit_building",
            ActionKind::TalkToNpc => "talk_to_npc",
            ActionKind::NpcDialogueChoice => "npc_dialogue_choice",
            ActionKind::RegisterVault => "register_vault",
            ActionKind::OpenVault => "open_vault",
            ActionKind::VaultDeposit => "vault_deposit",
            ActionKind::VaultWithdraw => "vault_withdraw",
        }
    }

    pub fn parse(tag: &str) -> Option<Self> {
        ActionKind::ALL.into_iter().find(|k| k.as_str() == tag)
    }
}

// ============================================================================
// Parameter access
// ============================================================================

/// Typed view over an action's parameter bag.
pub struct Params<'a> {
    map: &'a Map<String, Value>,
}

impl<'a> Params<'a> {
    pub fn new(map: &'a Map<String, Value>) -> Self {
        Self { map }
    }

    pub fn opt_str(&self, key: &str) -> GameResult<Option<&'a str>> {
        match self.map.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.as_str())),
            Some(_) => Err(GameError::Validation(format!("{} must be a string", key))),
        }
    }

    pub fn str(&self, key: &str) -> GameResult<&'a str> {
        match self.opt_str(key)? {
            Some(s) if !s.trim().is_empty() => Ok(s),
            _ => Err(GameError::Validation(format!("missing or invalid {} parameter", key))),
        }
    }

    pub fn opt_u32(&self, key: &str) -> GameResult<Option<u32>> {
        let invalid = || GameError::Validation(format!("{} must be a non-negative whole number", key));
        match self.map.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Number(n)) => {
                if let Some(v) = n.as_u64() {
                    u32::try_from(v).map(Some).map_err(|_| invalid())
                } else {
                    match n.as_f64() {
                        Some(f) if f >= 0.0 && f.fract() == 0.0 && f <= u32::MAX as f64 => {
                            Ok(Some(f as u32))
                        }
                        _ => Err(invalid()),
                    }
                }
            }
            Some(_) => Err(invalid()),
        }
    }

    pub fn u32(&self, key: &str) -> GameResult<u32> {
        self.opt_u32(key)?
            .ok_or_else(|| GameError::Validation(format!("missing or invalid {} parameter", key)))
    }

    /// Container named by `type_key` (or `default`), resolving vaults to the
    /// building in `vault_building` or the one the character stands in.
    pub fn container(
        &self,
        record: &SaveRecord,
        type_key: &str,
        default: ContainerKind,
    ) -> GameResult<ContainerId> {
        let kind = match self.opt_str(type_key)? {
            Some(name) => ContainerKind::parse(name)
                .ok_or_else(|| GameError::Validation(format!("unknown container: {}", name)))?,
            None => default,
        };
        Ok(match kind {
            ContainerKind::General => ContainerId::General,
            ContainerKind::Backpack => ContainerId::Backpack,
            ContainerKind::Vault => ContainerId::Vault(self.vault_building(record)?),
        })
    }

    pub fn slot_ref(
        &self,
        record: &SaveRecord,
        type_key: &str,
        slot_key: &str,
        default: ContainerKind,
    ) -> GameResult<SlotRef> {
        let container = self.container(record, type_key, default)?;
        let index = self.u32(slot_key)? as usize;
        Ok(SlotRef::new(container, index))
    }

    fn vault_building(&self, record: &SaveRecord) -> GameResult<String> {
        if let Some(building) = self.opt_str("vault_building")? {
            return Ok(building.to_string());
        }
        record
            .current_building()
            .map(str::to_string)
            .ok_or_else(|| GameError::Validation("not in a building".into()))
    }
}

// ============================================================================
// Dispatcher
// ============================================================================

/// What a handler reports besides the record changes.
#[derive(Debug, Default)]
struct Handled {
    message: String,
    dialogue: Option<DialogueView>,
    open_vault: Option<Vec<Slot>>,
}

impl Handled {
    fn message(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::default()
        }
    }
}

/// Stateless action processor over shared reference data and rules.
#[derive(Clone)]
pub struct Dispatcher {
    refs: Arc<dyn ReferenceData>,
    rules: GameRules,
}

impl Dispatcher {
    pub fn new(refs: Arc<dyn ReferenceData>, rules: GameRules) -> Self {
        Self { refs, rules }
    }

    pub fn rules(&self) -> &GameRules {
        &self.rules
    }

    pub fn reference(&self) -> &dyn ReferenceData {
        self.refs.as_ref()
    }

    /// Run `action` against `record`. Failures are reported in the result and
    /// leave `record` untouched.
    pub fn dispatch(&self, record: &mut SaveRecord, action: &Action) -> ActionResult {
        match self.execute(record, action) {
            Ok(result) => result,
            Err(e) => {
                debug!(
                    "action {} for {}/{} failed: {}",
                    escape_log(&action.kind),
                    escape_log(&record.owner),
                    escape_log(&record.save_id),
                    e
                );
                ActionResult::failed(&e)
            }
        }
    }

    /// Like [`Dispatcher::dispatch`] but hands the error back to the caller.
    pub fn execute(&self, record: &mut SaveRecord, action: &Action) -> GameResult<ActionResult> {
        let kind = ActionKind::parse(&action.kind)
            .ok_or_else(|| GameError::UnknownAction(action.kind.clone()))?;
        let params = Params::new(&action.params);
        debug!(
            "dispatch {} for {}/{}",
            kind.as_str(),
            escape_log(&record.owner),
            escape_log(&record.save_id)
        );

        let mut working = record.clone();
        let handled = self.handle(kind, &mut working, &params)?;
        working.clamp_vitals(self.rules.max_fatigue);

        let mut delta = Delta::between(record, &working);
        delta.dialogue = handled.dialogue;
        delta.open_vault = handled.open_vault;
        *record = working;

        let delta = if delta.is_empty() { None } else { Some(delta) };
        Ok(ActionResult::ok(handled.message, delta))
    }

    fn handle(&self, kind: ActionKind, rec: &mut SaveRecord, p: &Params<'_>) -> GameResult<Handled> {
        match kind {
            ActionKind::Move => self.handle_move(rec, p),
            ActionKind::AdvanceTime => self.handle_advance_time(rec, p),
            ActionKind::Wait => self.handle_wait(rec, p),
            ActionKind::Rest => self.handle_rest(rec),
            ActionKind::UseItem => self.handle_use_item(rec, p),
            ActionKind::AddItem => self.handle_add_item(rec, p),
            ActionKind::MoveItem => self.handle_move_item(rec, p),
            ActionKind::StackItem => self.handle_stack_item(rec, p),
            ActionKind::SplitItem => self.handle_split_item(rec, p),
            ActionKind::DropItem => self.handle_drop_item(rec, p),
            ActionKind::EquipItem => self.handle_equip_item(rec, p),
            ActionKind::UnequipItem => self.handle_unequip_item(rec, p),
            ActionKind::EnterBuilding => self.handle_enter_building(rec, p),
            ActionKind::ExitBuilding => self.handle_exit_building(rec),
            ActionKind::TalkToNpc => self.handle_talk_to_npc(rec, p),
            ActionKind::NpcDialogueChoice => self.handle_dialogue_choice(rec, p),
            ActionKind::RegisterVault => self.handle_register_vault(rec),
            ActionKind::OpenVault => self.handle_open_vault(rec),
            ActionKind::VaultDeposit => self.handle_vault_deposit(rec, p),
            ActionKind::VaultWithdraw => self.handle_vault_withdraw(rec, p),
        }
    }

    // ------------------------------------------------------------------------
    // Movement and time
    // ------------------------------------------------------------------------

    fn handle_move(&self, rec: &mut SaveRecord, p: &Params<'_>) -> GameResult<Handled> {
        let location = p.str("location")?;
        let district = p.opt_str("district")?.unwrap_or_default();
        let building = p.opt_str("building")?.unwrap_or_default();

        rec.location = location.to_string();
        rec.district = district.to_string();
        rec.building = building.to_string();
        rec.locations_discovered.insert(location.to_string());
        vitals::advance_time(rec, &self.rules, self.rules.move_segments);

        Ok(Handled::message(format!("Moved to {}", location)))
    }

    fn handle_advance_time(&self, rec: &mut SaveRecord, p: &Params<'_>) -> GameResult<Handled> {
        let segments = p.opt_u32("segments")?.unwrap_or(1);
        if segments == 0 || segments > self.rules.max_advance_segments {
            return Err(GameError::Validation(format!(
                "segments must be between 1 and {}",
                self.rules.max_advance_segments
            )));
        }
        let report = vitals::advance_time(rec, &self.rules, segments);
        Ok(Handled::message(time_message(
            &format!("Advanced {} time segment{}", segments, plural(segments)),
            &report,
        )))
    }

    fn handle_wait(&self, rec: &mut SaveRecord, p: &Params<'_>) -> GameResult<Handled> {
        let minutes = match (p.opt_u32("minutes")?, p.opt_u32("hours")?) {
            (Some(minutes), _) => minutes,
            (None, Some(hours)) => {
                let max_hours = self.rules.wait_max_minutes / 60;
                if hours < 1 || hours > max_hours {
                    return Err(GameError::Validation(format!(
                        "you can only wait between 1 and {} hours",
                        max_hours
                    )));
                }
                hours * 60
            }
            (None, None) => {
                return Err(GameError::Validation("hours or minutes parameter is required".into()))
            }
        };
        let segments = self.rules.wait_segments(minutes)?;
        let report = vitals::advance_time(rec, &self.rules, segments);
        Ok(Handled::message(time_message(
            &format!("Waited {} minutes", minutes),
            &report,
        )))
    }

    fn handle_rest(&self, rec: &mut SaveRecord) -> GameResult<Handled> {
        let segments = self.rules.segments_for_minutes(self.rules.rest_minutes);
        vitals::advance_time(rec, &self.rules, segments);
        vitals::restore(rec);
        Ok(Handled::message("Rested and restored HP/Mana"))
    }

    // ------------------------------------------------------------------------
    // Items
    // ------------------------------------------------------------------------

    fn handle_use_item(&self, rec: &mut SaveRecord, p: &Params<'_>) -> GameResult<Handled> {
        let item_id = p.str("item_id")?;
        let at = match p.opt_u32("slot")? {
            Some(_) => p.slot_ref(rec, "slot_type", "slot", ContainerKind::General)?,
            None => inventory::find_item(&rec.inventory, item_id)
                .ok_or_else(|| GameError::NotFound(format!("item not found: {}", item_id)))?,
        };
        inventory::drop_item(&mut rec.inventory, item_id, &at, Some(1))?;

        let effects = self.refs.item(item_id).and_then(|item| item.effects());
        let messages = match effects {
            Some(effects) => vitals::apply_effects(rec, &self.rules, &effects),
            None => {
                debug!("item {} has no usable effect data", escape_log(item_id));
                Vec::new()
            }
        };
        let message = if messages.is_empty() {
            format!("Used {}", item_id)
        } else {
            format!("Used {}: {}", item_id, messages.join(", "))
        };
        Ok(Handled::message(message))
    }

    fn handle_add_item(&self, rec: &mut SaveRecord, p: &Params<'_>) -> GameResult<Handled> {
        let item_id = p.str("item_id")?;
        let quantity = p.opt_u32("quantity")?.unwrap_or(1);
        inventory::add_item(&mut rec.inventory, self.reference(), item_id, quantity)?;
        Ok(Handled::message(format!("Added {}x {}", quantity, item_id)))
    }

    fn handle_move_item(&self, rec: &mut SaveRecord, p: &Params<'_>) -> GameResult<Handled> {
        let item_id = p.str("item_id")?;
        let from = p.slot_ref(rec, "from_slot_type", "from_slot", ContainerKind::General)?;
        let to = p.slot_ref(rec, "to_slot_type", "to_slot", ContainerKind::General)?;
        let outcome = inventory::move_item(&mut rec.inventory, self.reference(), item_id, &from, &to)?;
        let message = match outcome {
            MoveOutcome::Relocated => format!("Moved {}", item_id),
            MoveOutcome::Swapped => format!("Swapped {}", item_id),
        };
        Ok(Handled::message(message))
    }

    fn handle_stack_item(&self, rec: &mut SaveRecord, p: &Params<'_>) -> GameResult<Handled> {
        let item_id = p.str("item_id")?;
        let from = p.slot_ref(rec, "from_slot_type", "from_slot", ContainerKind::General)?;
        let to = p.slot_ref(rec, "to_slot_type", "to_slot", ContainerKind::General)?;
        let moved = inventory::stack_items(&mut rec.inventory, self.reference(), item_id, &from, &to)?;
        Ok(Handled::message(format!("Stacked {}x {}", moved, item_id)))
    }

    fn handle_split_item(&self, rec: &mut SaveRecord, p: &Params<'_>) -> GameResult<Handled> {
        let item_id = p.str("item_id")?;
        let from = p.slot_ref(rec, "from_slot_type", "from_slot", ContainerKind::General)?;
        let to = p.slot_ref(rec, "to_slot_type", "to_slot", ContainerKind::General)?;
        let amount = p.u32("quantity")?;
        inventory::split_stack(&mut rec.inventory, self.reference(), item_id, &from, &to, amount)?;
        Ok(Handled::message(format!("Split {}x {}", amount, item_id)))
    }

    fn handle_drop_item(&self, rec: &mut SaveRecord, p: &Params<'_>) -> GameResult<Handled> {
        let item_id = p.str("item_id")?;
        let at = p.slot_ref(rec, "slot_type", "slot", ContainerKind::General)?;
        let quantity = p.opt_u32("quantity")?;
        let dropped = inventory::drop_item(&mut rec.inventory, item_id, &at, quantity)?;
        Ok(Handled::message(format!("Dropped {}x {}", dropped, item_id)))
    }

    fn handle_equip_item(&self, rec: &mut SaveRecord, p: &Params<'_>) -> GameResult<Handled> {
        let item_id = p.str("item_id")?;
        let from = p.slot_ref(rec, "from_slot_type", "from_slot", ContainerKind::General)?;
        let gear = match p.opt_str("equipment_slot")? {
            Some(name) => parse_gear(name)?,
            None => {
                let name = self
                    .refs
                    .item(item_id)
                    .and_then(|item| item.gear_slot.clone())
                    .ok_or_else(|| GameError::Validation("missing equipment_slot parameter".into()))?;
                parse_gear(&name)?
            }
        };
        inventory::equip_item(&mut rec.inventory, self.reference(), item_id, &from, gear)?;
        Ok(Handled::message(format!("Equipped {} ({})", item_id, gear)))
    }

    fn handle_unequip_item(&self, rec: &mut SaveRecord, p: &Params<'_>) -> GameResult<Handled> {
        let gear = parse_gear(p.str("equipment_slot")?)?;
        let landed = inventory::unequip_item(&mut rec.inventory, self.reference(), gear)?;
        Ok(Handled::message(format!("Unequipped {} to {}", gear, landed)))
    }

    // ------------------------------------------------------------------------
    // Buildings and NPCs
    // ------------------------------------------------------------------------

    fn handle_enter_building(&self, rec: &mut SaveRecord, p: &Params<'_>) -> GameResult<Handled> {
        let building_id = p.str("building_id")?;
        if let Some(building) = self.refs.building(building_id) {
            if !building.location.is_empty() && building.location != rec.location {
                return Err(GameError::Conflict(format!(
                    "{} is not in {}",
                    building.name, rec.location
                )));
            }
            if !building.is_open_at(rec.time_of_day) {
                return Err(GameError::Conflict(format!(
                    "The building is closed. Open hours: {} - {}",
                    clock_label(building.opens_at.unwrap_or(0)),
                    clock_label(building.closes_at.unwrap_or(0))
                )));
            }
        }
        rec.building = building_id.to_string();
        Ok(Handled::message("Entered building"))
    }

    fn handle_exit_building(&self, rec: &mut SaveRecord) -> GameResult<Handled> {
        rec.building.clear();
        let message = if rec.fatigue > 0 {
            format!("Exited building (Fatigue: {})", rec.fatigue)
        } else {
            "Exited building".to_string()
        };
        Ok(Handled::message(message))
    }

    fn handle_talk_to_npc(&self, rec: &mut SaveRecord, p: &Params<'_>) -> GameResult<Handled> {
        let npc_id = p.str("npc_id")?;
        let outcome = dialogue::start(rec, self.reference(), npc_id)?;
        Ok(Handled {
            message: outcome.message,
            dialogue: Some(outcome.view),
            open_vault: outcome.vault,
        })
    }

    fn handle_dialogue_choice(&self, rec: &mut SaveRecord, p: &Params<'_>) -> GameResult<Handled> {
        let npc_id = p.str("npc_id")?;
        let choice = p.str("choice")?;
        let outcome = dialogue::choose(rec, self.reference(), npc_id, choice)?;
        Ok(Handled {
            message: outcome.message,
            dialogue: Some(outcome.view),
            open_vault: outcome.vault,
        })
    }

    // ------------------------------------------------------------------------
    // Vaults
    // ------------------------------------------------------------------------

    fn current_vault(&self, rec: &SaveRecord) -> GameResult<String> {
        let building = rec
            .current_building()
            .ok_or_else(|| GameError::Validation("not in a building".into()))?;
        if !rec.inventory.has_vault(building) {
            return Err(GameError::NotFound("no vault registered at this location".into()));
        }
        Ok(building.to_string())
    }

    fn handle_register_vault(&self, rec: &mut SaveRecord) -> GameResult<Handled> {
        let building = rec
            .current_building()
            .map(str::to_string)
            .ok_or_else(|| GameError::Validation("not in a building".into()))?;
        if rec.inventory.has_vault(&building) {
            return Ok(Handled::message("Vault already registered"));
        }
        inventory::remove_quantity(&mut rec.inventory, CURRENCY_ITEM, self.rules.vault_cost)?;
        rec.inventory.register_vault(&building);
        info!(
            "Registered vault at {} for {}/{}",
            escape_log(&building),
            escape_log(&rec.owner),
            escape_log(&rec.save_id)
        );
        Ok(Handled::message("Vault registered successfully"))
    }

    fn handle_open_vault(&self, rec: &mut SaveRecord) -> GameResult<Handled> {
        let building = self.current_vault(rec)?;
        let slots = rec
            .inventory
            .vault(&building)
            .map(|v| v.slots.clone())
            .unwrap_or_default();
        Ok(Handled {
            message: "Vault opened".into(),
            dialogue: None,
            open_vault: Some(slots),
        })
    }

    fn handle_vault_deposit(&self, rec: &mut SaveRecord, p: &Params<'_>) -> GameResult<Handled> {
        let building = self.current_vault(rec)?;
        let item_id = p.str("item_id")?;
        let from = p.slot_ref(rec, "from_slot_type", "from_slot", ContainerKind::General)?;
        if from.container.kind() == ContainerKind::Vault {
            return Err(GameError::Validation("deposit must come from carried slots".into()));
        }
        let vault = ContainerId::Vault(building);
        let to = match p.opt_u32("to_slot")? {
            Some(index) => SlotRef::new(vault, index as usize),
            None => first_empty(&rec.inventory, &[vault])
                .ok_or_else(|| GameError::Capacity("vault is full".into()))?,
        };
        inventory::move_item(&mut rec.inventory, self.reference(), item_id, &from, &to)?;
        Ok(Handled::message(format!("Deposited {}", item_id)))
    }

    fn handle_vault_withdraw(&self, rec: &mut SaveRecord, p: &Params<'_>) -> GameResult<Handled> {
        let building = self.current_vault(rec)?;
        let item_id = p.str("item_id")?;
        let from = SlotRef::new(ContainerId::Vault(building), p.u32("from_slot")? as usize);
        let to = match p.opt_u32("to_slot")? {
            Some(_) => {
                let to = p.slot_ref(rec, "to_slot_type", "to_slot", ContainerKind::General)?;
                if to.container.kind() == ContainerKind::Vault {
                    return Err(GameError::Validation("withdraw must go to carried slots".into()));
                }
                to
            }
            None => {
                let candidates: Vec<ContainerId> = rec
                    .inventory
                    .carried_containers()
                    .into_iter()
                    .filter(|c| !(c.is_backpack() && self.refs.is_container(item_id)))
                    .collect();
                first_empty(&rec.inventory, &candidates)
                    .ok_or_else(|| GameError::Capacity(format!("no free slot for {}", item_id)))?
            }
        };
        inventory::move_item(&mut rec.inventory, self.reference(), item_id, &from, &to)?;
        Ok(Handled::message(format!("Withdrew {}", item_id)))
    }
}

fn parse_gear(name: &str) -> GameResult<GearSlot> {
    GearSlot::parse(name).ok_or_else(|| GameError::Validation(format!("unknown equipment slot: {}", name)))
}

fn plural(n: u32) -> &'static str {
    if n == 1 {
        ""
    } else {
        "s"
    }
}

fn time_message(head: &str, report: &TimeReport) -> String {
    let mut parts = vec![head.to_string()];
    if report.fatigue_gained > 0 {
        parts.push(format!("fatigue +{}", report.fatigue_gained));
    }
    if report.hunger_lost > 0 {
        parts.push(format!("hunger -{}", report.hunger_lost));
    }
    parts.join("; ")
}

fn clock_label(minutes: u32) -> String {
    let hour = minutes / 60;
    let minute = minutes % 60;
    let period = if hour >= 12 { "PM" } else { "AM" };
    let display = match hour % 12 {
        0 => 12,
        h => h,
    };
    format!("{}:{:02} {}", display, minute, period)
}
