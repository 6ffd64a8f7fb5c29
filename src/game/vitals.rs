//! Game clock and the vitals that drift with it.
//!
//! Time moves in segments of `minutes_per_segment`. Each segment feeds two
//! accumulators on the save record: fatigue rises by one every
//! `fatigue_segments`, hunger falls by one every `hunger_segments` (twice as
//! slowly once hunger is at or below `low_hunger_threshold`).

use serde::{Deserialize, Serialize};

use crate::game::errors::{GameError, GameResult};
use crate::game::reference::{EffectKind, ItemEffect};
use crate::game::types::{SaveRecord, MAX_HUNGER, MINUTES_PER_DAY};

/// Tunable constants for time and vitals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameRules {
    #[serde(default = "default_minutes_per_segment")]
    pub minutes_per_segment: u32,
    #[serde(default = "default_fatigue_segments")]
    pub fatigue_segments: u32,
    #[serde(default = "default_hunger_segments")]
    pub hunger_segments: u32,
    #[serde(default = "default_low_hunger_threshold")]
    pub low_hunger_threshold: i32,
    #[serde(default = "default_max_fatigue")]
    pub max_fatigue: i32,
    /// Segments spent per travel step.
    #[serde(default = "default_move_segments")]
    pub move_segments: u32,
    #[serde(default = "default_rest_minutes")]
    pub rest_minutes: u32,
    /// Gold charged by the `register_vault` action.
    #[serde(default)]
    pub vault_cost: u32,
    #[serde(default = "default_wait_min_minutes")]
    pub wait_min_minutes: u32,
    #[serde(default = "default_wait_max_minutes")]
    pub wait_max_minutes: u32,
    /// Largest `advance_time` request accepted in one action.
    #[serde(default = "default_max_advance_segments")]
    pub max_advance_segments: u32,
}

fn default_minutes_per_segment() -> u32 {
    60
}
fn default_fatigue_segments() -> u32 {
    4
}
fn default_hunger_segments() -> u32 {
    6
}
fn default_low_hunger_threshold() -> i32 {
    1
}
fn default_max_fatigue() -> i32 {
    10
}
fn default_move_segments() -> u32 {
    1
}
fn default_rest_minutes() -> u32 {
    480
}
fn default_wait_min_minutes() -> u32 {
    15
}
fn default_wait_max_minutes() -> u32 {
    360
}
fn default_max_advance_segments() -> u32 {
    168
}

impl Default for GameRules {
    fn default() -> Self {
        Self {
            minutes_per_segment: default_minutes_per_segment(),
            fatigue_segments: default_fatigue_segments(),
            hunger_segments: default_hunger_segments(),
            low_hunger_threshold: default_low_hunger_threshold(),
            max_fatigue: default_max_fatigue(),
            move_segments: default_move_segments(),
            rest_minutes: default_rest_minutes(),
            vault_cost: 0,
            wait_min_minutes: default_wait_min_minutes(),
            wait_max_minutes: default_wait_max_minutes(),
            max_advance_segments: default_max_advance_segments(),
        }
    }
}

impl GameRules {
    pub fn segments_per_day(&self) -> u32 {
        MINUTES_PER_DAY / self.minutes_per_segment.max(1)
    }

    /// Number of whole segments covering `minutes`, rounding up.
    pub fn segments_for_minutes(&self, minutes: u32) -> u32 {
        let per = self.minutes_per_segment.max(1);
        minutes.div_ceil(per)
    }

    /// Check a requested wait and convert it to segments.
    pub fn wait_segments(&self, minutes: u32) -> GameResult<u32> {
        if minutes < self.wait_min_minutes || minutes > self.wait_max_minutes {
            return Err(GameError::Validation(format!(
                "you can only wait between {} and {} minutes",
                self.wait_min_minutes, self.wait_max_minutes
            )));
        }
        Ok(self.segments_for_minutes(minutes))
    }
}

/// What one clock advance changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeReport {
    pub segments: u32,
    pub days_advanced: u32,
    pub fatigue_gained: i32,
    pub hunger_lost: i32,
}

/// Advance the clock by `segments`, rolling the day over and ticking both
/// vitals accumulators once per segment.
pub fn advance_time(record: &mut SaveRecord, rules: &GameRules, segments: u32) -> TimeReport {
    let mut report = TimeReport {
        segments,
        ..TimeReport::default()
    };
    let step = rules.minutes_per_segment.max(1);

    for _ in 0..segments {
        record.time_of_day += step;
        while record.time_of_day >= MINUTES_PER_DAY {
            record.time_of_day -= MINUTES_PER_DAY;
            record.current_day += 1;
            report.days_advanced += 1;
        }

        if rules.fatigue_segments > 0 && record.fatigue < rules.max_fatigue {
            record.fatigue_accumulator += 1;
            if record.fatigue_accumulator >= rules.fatigue_segments {
                record.fatigue += 1;
                record.fatigue_accumulator = 0;
                report.fatigue_gained += 1;
            }
        } else {
            record.fatigue_accumulator = 0;
        }

        if rules.hunger_segments > 0 && record.hunger > 0 {
            let interval = if record.hunger <= rules.low_hunger_threshold {
                rules.hunger_segments * 2
            } else {
                rules.hunger_segments
            };
            record.hunger_accumulator += 1;
            if record.hunger_accumulator >= interval {
                record.hunger -= 1;
                record.hunger_accumulator = 0;
                report.hunger_lost += 1;
            }
        } else {
            record.hunger_accumulator = 0;
        }
    }
    report
}

/// Full restore after resting: hp and mana to max, fatigue cleared.
pub fn restore(record: &mut SaveRecord) {
    record.hp = record.max_hp;
    record.mana = record.max_mana;
    record.fatigue = 0;
    record.fatigue_accumulator = 0;
}

/// Apply consumable effects with clamping. Returns one message per effect that
/// changed something.
pub fn apply_effects(record: &mut SaveRecord, rules: &GameRules, effects: &[ItemEffect]) -> Vec<String> {
    let mut messages = Vec::new();
    for effect in effects {
        match &effect.kind {
            EffectKind::Hp => {
                let old = record.hp;
                record.hp = (record.hp + effect.value).clamp(0, record.max_hp);
                let healed = record.hp - old;
                if healed > 0 {
                    messages.push(format!("Healed {} HP", healed));
                } else if healed < 0 {
                    messages.push(format!("Lost {} HP", -healed));
                }
            }
            EffectKind::Mana => {
                let old = record.mana;
                record.mana = (record.mana + effect.value).clamp(0, record.max_mana);
                if record.mana > old {
                    messages.push(format!("Restored {} mana", record.mana - old));
                }
            }
            EffectKind::Hunger => {
                let old = record.hunger;
                record.hunger = (record.hunger + effect.value).clamp(0, MAX_HUNGER);
                if record.hunger > old {
                    messages.push("Hunger restored".to_string());
                } else if record.hunger < old {
                    messages.push("Hunger decreased".to_string());
                }
            }
            EffectKind::Fatigue => {
                let old = record.fatigue;
                record.fatigue = (record.fatigue + effect.value).clamp(0, rules.max_fatigue);
                if record.fatigue < old {
                    messages.push(format!("Fatigue reduced by {}", old - record.fatigue));
                } else if record.fatigue > old {
                    messages.push(format!("Fatigue increased by {}", record.fatigue - old));
                }
            }
            EffectKind::Other(kind) => {
                log::warn!("Unknown effect type: {}", crate::logutil::escape_log(kind));
            }
        }
    }
    messages
}
