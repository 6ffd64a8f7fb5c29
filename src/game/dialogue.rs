//! NPC dialogue graphs and the small interpreter that walks them.
//!
//! A graph maps node names to [`DialogueNode`]s. Each node lists the names of the
//! nodes offered next; an offered node is only shown when its own
//! [`Requirements`] hold for the current save record. The current node per NPC is
//! kept on the save record so a choice can be checked against what was offered.

use log::debug;
use serde::{Deserialize, Serialize};

use crate::game::errors::{GameError, GameResult};
use crate::game::inventory::remove_quantity;
use crate::game::reference::{NpcRecord, ReferenceData};
use crate::game::types::{SaveRecord, Slot, CURRENCY_ITEM};
use crate::logutil::escape_log;

/// Preconditions gating a dialogue node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Requirements {
    /// A vault must be registered in the current building.
    #[serde(default)]
    pub registered: bool,
    /// No vault may be registered in the current building yet.
    #[serde(default)]
    pub not_registered: bool,
    /// Minimum gold carried.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gold: Option<u32>,
    /// Race must not be native to the current location.
    #[serde(default)]
    pub not_native: bool,
}

impl Requirements {
    pub fn is_met(&self, record: &SaveRecord, refs: &dyn ReferenceData) -> bool {
        let registered = record
            .current_building()
            .map(|b| record.inventory.has_vault(b))
            .unwrap_or(false);
        if self.registered && !registered {
            return false;
        }
        if self.not_registered && registered {
            return false;
        }
        if let Some(gold) = self.gold {
            if record.currency() < gold {
                return false;
            }
        }
        if self.not_native && refs.is_native(&record.race, &record.location) {
            return false;
        }
        true
    }
}

/// Side effect attached to a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DialogueAction {
    RegisterStorage,
    OpenStorage,
    EndDialogue,
    /// Actions handled by other services (shops, lodging); treated as plain text here.
    #[serde(other)]
    Unsupported,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DialogueNode {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub requirements: Requirements,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<DialogueAction>,
    #[serde(default)]
    pub cost: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
}

impl DialogueNode {
    pub fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
            ..Self::default()
        }
    }

    pub fn with_options(mut self, options: &[&str]) -> Self {
        self.options = options.iter().map(|o| o.to_string()).collect();
        self
    }

    pub fn with_requirements(mut self, requirements: Requirements) -> Self {
        self.requirements = requirements;
        self
    }

    pub fn with_action(mut self, action: DialogueAction) -> Self {
        self.action = Some(action);
        self
    }

    pub fn with_cost(mut self, cost: u32, success: &str, failure: &str) -> Self {
        self.cost = cost;
        self.success = Some(success.to_string());
        self.failure = Some(failure.to_string());
        self
    }
}

/// What the client should render after a dialogue step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DialogueView {
    pub npc_id: String,
    pub node: String,
    pub text: String,
    #[serde(default)]
    pub options: Vec<String>,
    /// The conversation ended with this step.
    #[serde(default)]
    pub closed: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DialogueOutcome {
    pub message: String,
    pub view: DialogueView,
    /// Vault contents when the step opened storage.
    pub vault: Option<Vec<Slot>>,
}

/// Options of `node` whose target nodes are currently reachable.
pub fn visible_options(
    npc: &NpcRecord,
    node: &DialogueNode,
    record: &SaveRecord,
    refs: &dyn ReferenceData,
) -> Vec<String> {
    node.options
        .iter()
        .filter(|name| match npc.node(name) {
            Some(target) => target.requirements.is_met(record, refs),
            None => true,
        })
        .cloned()
        .collect()
}

fn lookup_npc<'a>(refs: &'a dyn ReferenceData, npc_id: &str) -> GameResult<&'a NpcRecord> {
    refs.npc(npc_id)
        .ok_or_else(|| GameError::NotFound(format!("npc {}", npc_id)))
}

/// Open a conversation at the NPC's entry node.
pub fn start(record: &mut SaveRecord, refs: &dyn ReferenceData, npc_id: &str) -> GameResult<DialogueOutcome> {
    let npc = lookup_npc(refs, npc_id)?;
    let present = match (&npc.building, &npc.location) {
        (Some(building), _) => record.building == *building,
        (None, Some(location)) => record.location == *location,
        (None, None) => true,
    };
    if !present {
        return Err(GameError::Conflict(format!("{} is not here", npc.name)));
    }

    let entry = npc.node(&npc.entry).ok_or_else(|| {
        GameError::Internal(format!("npc {} has no entry node {}", npc_id, npc.entry))
    })?;

    let home = npc.building.as_deref().or(record.current_building());
    let greeting = if refs.is_native(&record.race, &record.location) {
        &npc.greeting.native_race
    } else if home.map(|b| record.inventory.has_vault(b)).unwrap_or(false) {
        &npc.greeting.returning
    } else {
        &npc.greeting.first_time
    };
    let message = if greeting.is_empty() {
        entry.text.clone()
    } else {
        format!("{}\n\n{}", greeting, entry.text)
    };

    let options = visible_options(npc, entry, record, refs);
    record.dialogue.insert(npc_id.to_string(), npc.entry.clone());
    debug!(
        "dialogue start {} at {} ({} options)",
        escape_log(npc_id),
        npc.entry,
        options.len()
    );
    Ok(DialogueOutcome {
        message,
        view: DialogueView {
            npc_id: npc_id.to_string(),
            node: npc.entry.clone(),
            text: entry.text.clone(),
            options,
            closed: false,
        },
        vault: None,
    })
}

/// Follow `choice` from the NPC's current node and run its side effect.
pub fn choose(
    record: &mut SaveRecord,
    refs: &dyn ReferenceData,
    npc_id: &str,
    choice: &str,
) -> GameResult<DialogueOutcome> {
    let npc = lookup_npc(refs, npc_id)?;
    let node = npc
        .node(choice)
        .ok_or_else(|| GameError::Validation(format!("invalid dialogue choice: {}", choice)))?;

    if let Some(current) = record.dialogue.get(npc_id) {
        let offered = npc
            .node(current)
            .map(|n| n.options.iter().any(|o| o == choice))
            .unwrap_or(false);
        if !offered {
            return Err(GameError::Validation(format!(
                "{} is not an option at {}",
                choice, current
            )));
        }
    }
    if !node.requirements.is_met(record, refs) {
        return Err(GameError::Conflict(
            "requirements not met for this dialogue option".into(),
        ));
    }

    let mut text = node.text.clone();
    match node.action {
        Some(DialogueAction::RegisterStorage) => {
            let building = record
                .current_building()
                .map(str::to_string)
                .ok_or_else(|| GameError::Validation("not in a building".into()))?;
            if !record.inventory.has_vault(&building) {
                if record.currency() >= node.cost {
                    remove_quantity(&mut record.inventory, CURRENCY_ITEM, node.cost)?;
                    record.inventory.register_vault(&building);
                    if let Some(success) = &node.success {
                        text = success.clone();
                    }
                } else if let Some(failure) = &node.failure {
                    text = failure.clone();
                }
            }
        }
        Some(DialogueAction::OpenStorage) => {
            let building = record.current_building().unwrap_or_default();
            let slots = record
                .inventory
                .vault(building)
                .map(|v| v.slots.clone())
                .ok_or_else(|| GameError::NotFound("vault not found for this building".into()))?;
            record.dialogue.remove(npc_id);
            return Ok(closed_outcome(npc_id, choice, text, Some(slots)));
        }
        Some(DialogueAction::EndDialogue) => {
            record.dialogue.remove(npc_id);
            return Ok(closed_outcome(npc_id, choice, text, None));
        }
        Some(DialogueAction::Unsupported) | None => {}
    }

    let options = visible_options(npc, node, record, refs);
    record.dialogue.insert(npc_id.to_string(), choice.to_string());
    Ok(DialogueOutcome {
        message: text.clone(),
        view: DialogueView {
            npc_id: npc_id.to_string(),
            node: choice.to_string(),
            text,
            options,
            closed: false,
        },
        vault: None,
    })
}

fn closed_outcome(npc_id: &str, node: &str, text: String, vault: Option<Vec<Slot>>) -> DialogueOutcome {
    DialogueOutcome {
        message: text.clone(),
        view: DialogueView {
            npc_id: npc_id.to_string(),
            node: node.to_string(),
            text,
            options: Vec::new(),
            closed: true,
        },
        vault,
    }
}
