/// Slot-addressed inventory engine.
///
/// Every operation validates against the current state first and only then
/// writes, so a returned error always leaves the inventory untouched.
use log::debug;

use crate::game::errors::{GameError, GameResult};
use crate::game::reference::ReferenceData;
use crate::game::types::{
    ContainerId, GearEntry, GearSlot, Inventory, Slot, SlotRef, BACKPACK_CAPACITY, GENERAL_CAPACITY,
    VAULT_CAPACITY,
};
use crate::logutil::escape_log;

/// How a successful move landed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    /// Destination was empty; the stack changed slots.
    Relocated,
    /// Destination was occupied; the two stacks traded places.
    Swapped,
}

// ============================================================================
// Lookups
// ============================================================================

/// Total quantity of `item_id` carried in general pockets and the backpack.
pub fn count_item(inv: &Inventory, item_id: &str) -> u32 {
    inv.carried_containers()
        .iter()
        .filter_map(|c| inv.slots(c).ok())
        .flat_map(|slots| slots.iter())
        .filter(|s| s.holds(item_id))
        .map(|s| s.quantity)
        .sum()
}

/// First carried slot holding `item_id`, general pockets before the backpack.
pub fn find_item(inv: &Inventory, item_id: &str) -> Option<SlotRef> {
    let mut order = vec![ContainerId::General];
    if inv.bag_equipped() {
        order.push(ContainerId::Backpack);
    }
    order.into_iter().find_map(|container| {
        let index = inv
            .slots(&container)
            .ok()?
            .iter()
            .position(|s| s.holds(item_id))?;
        Some(SlotRef::new(container, index))
    })
}

/// First empty slot among `containers`, in order.
pub fn first_empty(inv: &Inventory, containers: &[ContainerId]) -> Option<SlotRef> {
    containers.iter().find_map(|container| {
        let index = inv
            .slots(container)
            .ok()?
            .iter()
            .position(Slot::is_empty)?;
        Some(SlotRef::new(container.clone(), index))
    })
}

/// Read the source slot and make sure it carries `item_id`.
fn source_slot<'a>(inv: &'a Inventory, at: &SlotRef, item_id: &str) -> GameResult<&'a Slot> {
    let slot = inv.slot(at)?;
    match slot.item.as_deref() {
        None => Err(GameError::NotFound(format!("slot {} is empty", at))),
        Some(held) if held != item_id => Err(GameError::Conflict(format!(
            "slot {} holds {}, not {}",
            at, held, item_id
        ))),
        Some(_) => Ok(slot),
    }
}

fn check_not_nested(
    refs: &dyn ReferenceData,
    item: Option<&str>,
    destination: &SlotRef,
) -> GameResult<()> {
    if let Some(item_id) = item {
        if destination.container.is_backpack() && refs.is_container(item_id) {
            return Err(GameError::Conflict(format!(
                "{} is a container and cannot go into the backpack",
                item_id
            )));
        }
    }
    Ok(())
}

// ============================================================================
// Slot operations
// ============================================================================

/// Move the stack at `from` to `to`, swapping with whatever is already there.
pub fn move_item(
    inv: &mut Inventory,
    refs: &dyn ReferenceData,
    item_id: &str,
    from: &SlotRef,
    to: &SlotRef,
) -> GameResult<MoveOutcome> {
    if from == to {
        return Err(GameError::Validation("source and destination are the same slot".into()));
    }
    let moving = source_slot(inv, from, item_id)?.clone();
    let displaced = inv.slot(to)?.clone();

    check_not_nested(refs, moving.item.as_deref(), to)?;
    check_not_nested(refs, displaced.item.as_deref(), from)?;

    if from.container == to.container {
        let slots = inv.slots_mut(&from.container)?;
        let (lo, hi) = if from.index < to.index {
            (from.index, to.index)
        } else {
            (to.index, from.index)
        };
        let (head, tail) = slots.split_at_mut(hi);
        head[lo].swap_contents(&mut tail[0]);
    } else {
        {
            let dst = inv.slot_mut(to)?;
            dst.item = moving.item.clone();
            dst.quantity = moving.quantity;
        }
        let src = inv.slot_mut(from)?;
        src.item = displaced.item.clone();
        src.quantity = displaced.quantity;
    }

    let outcome = if displaced.is_empty() {
        MoveOutcome::Relocated
    } else {
        MoveOutcome::Swapped
    };
    debug!(
        "inventory move {} {} -> {} ({:?})",
        escape_log(item_id),
        from,
        to,
        outcome
    );
    Ok(outcome)
}

/// Merge the stack at `from` into the matching stack at `to`, up to the stack limit.
/// Returns how many units were transferred.
pub fn stack_items(
    inv: &mut Inventory,
    refs: &dyn ReferenceData,
    item_id: &str,
    from: &SlotRef,
    to: &SlotRef,
) -> GameResult<u32> {
    if from == to {
        return Err(GameError::Validation("cannot stack a slot onto itself".into()));
    }
    let available = source_slot(inv, from, item_id)?.quantity;
    let dest = inv.slot(to)?;
    match dest.item.as_deref() {
        None => {
            return Err(GameError::Validation(format!(
                "slot {} is empty; move the item instead",
                to
            )))
        }
        Some(held) if held != item_id => {
            return Err(GameError::Conflict(format!(
                "cannot stack {} onto {}",
                item_id, held
            )))
        }
        Some(_) => {}
    }
    check_not_nested(refs, Some(item_id), to)?;

    let limit = refs.stack_limit(item_id);
    let room = limit.saturating_sub(dest.quantity);
    if room == 0 {
        return Err(GameError::Capacity(format!(
            "stack at {} is already full ({})",
            to, limit
        )));
    }
    let transfer = available.min(room);

    inv.slot_mut(to)?.quantity += transfer;
    inv.slot_mut(from)?.reduce(transfer);
    debug!(
        "inventory stack {} x{} {} -> {}",
        escape_log(item_id),
        transfer,
        from,
        to
    );
    Ok(transfer)
}

/// Split `amount` units off the stack at `from` into the empty slot `to`.
pub fn split_stack(
    inv: &mut Inventory,
    refs: &dyn ReferenceData,
    item_id: &str,
    from: &SlotRef,
    to: &SlotRef,
    amount: u32,
) -> GameResult<()> {
    let available = source_slot(inv, from, item_id)?.quantity;
    if amount == 0 || amount >= available {
        return Err(GameError::Validation(format!(
            "split amount must be between 1 and {}",
            available.saturating_sub(1)
        )));
    }
    if !inv.slot(to)?.is_empty() {
        return Err(GameError::Validation(format!("slot {} is occupied", to)));
    }
    check_not_nested(refs, Some(item_id), to)?;

    inv.slot_mut(to)?.fill(item_id, amount);
    inv.slot_mut(from)?.reduce(amount);
    debug!(
        "inventory split {} x{} {} -> {}",
        escape_log(item_id),
        amount,
        from,
        to
    );
    Ok(())
}

/// Place `quantity` units: top up partial stacks first, then fill empty slots,
/// backpack before general pockets. Returns every slot that changed.
pub fn add_item(
    inv: &mut Inventory,
    refs: &dyn ReferenceData,
    item_id: &str,
    quantity: u32,
) -> GameResult<Vec<SlotRef>> {
    if quantity == 0 {
        return Err(GameError::Validation("quantity must be at least 1".into()));
    }
    let limit = refs.stack_limit(item_id);
    let containers: Vec<ContainerId> = inv
        .carried_containers()
        .into_iter()
        .filter(|c| !(c.is_backpack() && refs.is_container(item_id)))
        .collect();

    let mut remaining = quantity;
    let mut plan: Vec<(SlotRef, u32)> = Vec::new();

    for container in &containers {
        for slot in inv.slots(container)? {
            if remaining == 0 {
                break;
            }
            if slot.holds(item_id) && slot.quantity < limit {
                let take = remaining.min(limit - slot.quantity);
                plan.push((SlotRef::new(container.clone(), slot.index), slot.quantity + take));
                remaining -= take;
            }
        }
    }
    for container in &containers {
        for slot in inv.slots(container)? {
            if remaining == 0 {
                break;
            }
            if slot.is_empty() {
                let take = remaining.min(limit);
                plan.push((SlotRef::new(container.clone(), slot.index), take));
                remaining -= take;
            }
        }
    }

    if remaining > 0 {
        return Err(GameError::Capacity(format!(
            "no room for {} more {}",
            remaining, item_id
        )));
    }

    for (at, new_quantity) in &plan {
        inv.slot_mut(at)?.fill(item_id, *new_quantity);
    }
    debug!(
        "inventory add {} x{} across {} slot(s)",
        escape_log(item_id),
        quantity,
        plan.len()
    );
    Ok(plan.into_iter().map(|(at, _)| at).collect())
}

/// Remove `quantity` units (default: the whole stack) from one slot.
/// Returns how many units were removed.
pub fn drop_item(
    inv: &mut Inventory,
    item_id: &str,
    from: &SlotRef,
    quantity: Option<u32>,
) -> GameResult<u32> {
    let held = source_slot(inv, from, item_id)?.quantity;
    let amount = quantity.unwrap_or(held);
    if amount == 0 || amount > held {
        return Err(GameError::Validation(format!(
            "can only drop between 1 and {} {}",
            held, item_id
        )));
    }
    inv.slot_mut(from)?.reduce(amount);
    debug!("inventory drop {} x{} from {}", escape_log(item_id), amount, from);
    Ok(amount)
}

/// Remove `quantity` units of `item_id` across carried slots, general pockets first.
pub fn remove_quantity(inv: &mut Inventory, item_id: &str, quantity: u32) -> GameResult<()> {
    if quantity == 0 {
        return Ok(());
    }
    let held = count_item(inv, item_id);
    if held < quantity {
        return Err(GameError::Conflict(format!(
            "need {} {}, have {}",
            quantity, item_id, held
        )));
    }
    let mut remaining = quantity;
    let mut order = vec![ContainerId::General];
    if inv.bag_equipped() {
        order.push(ContainerId::Backpack);
    }
    for container in &order {
        for slot in inv.slots_mut(container)? {
            if remaining == 0 {
                break;
            }
            if slot.holds(item_id) {
                let take = remaining.min(slot.quantity);
                slot.reduce(take);
                remaining -= take;
            }
        }
    }
    Ok(())
}

// ============================================================================
// Equipment
// ============================================================================

/// Wear the stack at `from` in `gear`. The gear slot must be free.
pub fn equip_item(
    inv: &mut Inventory,
    refs: &dyn ReferenceData,
    item_id: &str,
    from: &SlotRef,
    gear: GearSlot,
) -> GameResult<()> {
    if let Some(worn) = inv.gear(gear) {
        return Err(GameError::Conflict(format!(
            "{} slot already holds {}; unequip it first",
            gear, worn.item
        )));
    }
    let quantity = source_slot(inv, from, item_id)?.quantity;
    if gear == GearSlot::Bag && !refs.is_container(item_id) {
        return Err(GameError::Conflict(format!("{} cannot be worn as a bag", item_id)));
    }

    inv.slot_mut(from)?.clear();
    inv.gear_slots.insert(
        gear,
        GearEntry {
            item: item_id.to_string(),
            quantity,
        },
    );
    debug!("equip {} from {} into {}", escape_log(item_id), from, gear);
    Ok(())
}

/// Take off whatever is worn in `gear` and put it in the first free carried slot,
/// backpack preferred. Returns the slot it landed in.
pub fn unequip_item(
    inv: &mut Inventory,
    refs: &dyn ReferenceData,
    gear: GearSlot,
) -> GameResult<SlotRef> {
    let entry = inv
        .gear(gear)
        .cloned()
        .ok_or_else(|| GameError::NotFound(format!("nothing equipped in {}", gear)))?;

    let candidates: Vec<ContainerId> = if gear == GearSlot::Bag {
        if inv.backpack_slots.iter().any(|s| !s.is_empty()) {
            return Err(GameError::Conflict("empty the backpack before removing the bag".into()));
        }
        vec![ContainerId::General]
    } else {
        inv.carried_containers()
            .into_iter()
            .filter(|c| !(c.is_backpack() && refs.is_container(&entry.item)))
            .collect()
    };
    let target = first_empty(inv, &candidates)
        .ok_or_else(|| GameError::Capacity(format!("no free slot for {}", entry.item)))?;

    inv.slot_mut(&target)?.fill(&entry.item, entry.quantity);
    inv.gear_slots.remove(&gear);
    debug!("unequip {} from {} into {}", escape_log(&entry.item), gear, target);
    Ok(target)
}

// ============================================================================
// Invariants
// ============================================================================

fn slot_groups(inv: &Inventory) -> Vec<(String, &[Slot], usize, bool)> {
    let mut groups: Vec<(String, &[Slot], usize, bool)> = vec![
        ("general".into(), inv.general_slots.as_slice(), GENERAL_CAPACITY, false),
        ("backpack".into(), inv.backpack_slots.as_slice(), BACKPACK_CAPACITY, true),
    ];
    for (building, vault) in &inv.vaults {
        groups.push((format!("vault@{}", building), vault.slots.as_slice(), VAULT_CAPACITY, false));
    }
    groups
}

/// Structural rules that need no reference data: fixed capacities, stable
/// indices and empty-iff-zero. Checked on every document read from disk.
pub fn check_shape(inv: &Inventory) -> GameResult<()> {
    for (name, slots, capacity, _) in slot_groups(inv) {
        if slots.len() != capacity {
            return Err(GameError::Internal(format!(
                "{} has {} slots, expected {}",
                name,
                slots.len(),
                capacity
            )));
        }
        for (i, slot) in slots.iter().enumerate() {
            if slot.index != i {
                return Err(GameError::Internal(format!("{} slot {} has index {}", name, i, slot.index)));
            }
            match (slot.item.as_deref(), slot.quantity) {
                (None, q) if q != 0 => {
                    return Err(GameError::Internal(format!("{}[{}] empty with quantity {}", name, i, q)))
                }
                (Some(item), 0) => {
                    return Err(GameError::Internal(format!("{}[{}] holds {} with quantity 0", name, i, item)))
                }
                _ => {}
            }
        }
    }
    Ok(())
}

/// Check every slot-level rule: the shape rules of [`check_shape`] plus stack
/// limits and the no-container-in-backpack rule.
pub fn check_invariants(inv: &Inventory, refs: &dyn ReferenceData) -> GameResult<()> {
    check_shape(inv)?;
    for (name, slots, _, is_backpack) in slot_groups(inv) {
        for (i, slot) in slots.iter().enumerate() {
            let Some(item) = slot.item.as_deref() else { continue };
            let limit = refs.stack_limit(item);
            if slot.quantity > limit {
                return Err(GameError::Internal(format!(
                    "{}[{}] holds {} x{} (limit {})",
                    name, i, item, slot.quantity, limit
                )));
            }
            if is_backpack && refs.is_container(item) {
                return Err(GameError::Internal(format!(
                    "container {} nested in backpack slot {}",
                    item, i
                )));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::reference::{Catalog, ItemRecord};

    fn catalog() -> Catalog {
        Catalog::new()
            .with_item(ItemRecord::new("arrow").with_stack_limit(10))
            .with_item(ItemRecord::new("sword"))
            .with_item(ItemRecord::new("gold-piece").with_stack_limit(100))
            .with_item(ItemRecord::new("backpack").with_tag("container").with_gear_slot("bag"))
            .with_item(ItemRecord::new("pouch").with_tag("container"))
    }

    fn with_bag() -> Inventory {
        let mut inv = Inventory::default();
        inv.gear_slots.insert(
            GearSlot::Bag,
            GearEntry {
                item: "backpack".into(),
                quantity: 1,
            },
        );
        inv
    }

    // ========================================================================
    // add
    // ========================================================================

    #[test]
    fn test_add_splits_by_stack_limit_into_backpack() {
        let refs = catalog();
        let mut inv = with_bag();
        let touched = add_item(&mut inv, &refs, "arrow", 15).unwrap();
        assert_eq!(touched, vec![SlotRef::backpack(0), SlotRef::backpack(1)]);
        assert_eq!(inv.backpack_slots[0].quantity, 10);
        assert_eq!(inv.backpack_slots[1].quantity, 5);
        assert_eq!(inv.occupied(&ContainerId::General), 0);
    }

    #[test]
    fn test_add_tops_up_partial_stacks_first() {
        let refs = catalog();
        let mut inv = with_bag();
        inv.general_slots[2].fill("arrow", 7);
        inv.backpack_slots[4].fill("arrow", 9);
        add_item(&mut inv, &refs, "arrow", 5).unwrap();
        assert_eq!(inv.backpack_slots[4].quantity, 10);
        assert_eq!(inv.general_slots[2].quantity, 10);
        assert_eq!(inv.backpack_slots[0].quantity, 1);
    }

    #[test]
    fn test_add_without_bag_uses_general_only() {
        let refs = catalog();
        let mut inv = Inventory::default();
        add_item(&mut inv, &refs, "sword", 4).unwrap();
        assert_eq!(inv.occupied(&ContainerId::General), 4);
        let before = inv.clone();
        let err = add_item(&mut inv, &refs, "sword", 1).unwrap_err();
        assert!(matches!(err, GameError::Capacity(_)));
        assert_eq!(inv, before);
    }

    #[test]
    fn test_add_container_skips_backpack() {
        let refs = catalog();
        let mut inv = with_bag();
        let touched = add_item(&mut inv, &refs, "pouch", 1).unwrap();
        assert_eq!(touched, vec![SlotRef::general(0)]);
        check_invariants(&inv, &refs).unwrap();
    }

    #[test]
    fn test_add_overflow_leaves_inventory_untouched() {
        let refs = catalog();
        let mut inv = with_bag();
        let before = inv.clone();
        // 24 slots * 10 arrows
        let err = add_item(&mut inv, &refs, "arrow", 241).unwrap_err();
        assert!(matches!(err, GameError::Capacity(_)));
        assert_eq!(inv, before);
        add_item(&mut inv, &refs, "arrow", 240).unwrap();
        check_invariants(&inv, &refs).unwrap();
    }

    // ========================================================================
    // move
    // ========================================================================

    #[test]
    fn test_move_within_container_swaps_in_place() {
        let refs = catalog();
        let mut inv = Inventory::default();
        inv.general_slots[0].fill("sword", 1);
        inv.general_slots[3].fill("arrow", 4);
        let outcome =
            move_item(&mut inv, &refs, "sword", &SlotRef::general(0), &SlotRef::general(3)).unwrap();
        assert_eq!(outcome, MoveOutcome::Swapped);
        assert!(inv.general_slots[3].holds("sword"));
        assert!(inv.general_slots[0].holds("arrow"));
        assert_eq!(inv.general_slots[0].quantity, 4);
        assert_eq!(inv.general_slots[3].index, 3);
    }

    #[test]
    fn test_move_to_empty_relocates() {
        let refs = catalog();
        let mut inv = with_bag();
        inv.general_slots[1].fill("arrow", 3);
        let outcome =
            move_item(&mut inv, &refs, "arrow", &SlotRef::general(1), &SlotRef::backpack(7)).unwrap();
        assert_eq!(outcome, MoveOutcome::Relocated);
        assert!(inv.general_slots[1].is_empty());
        assert_eq!(inv.backpack_slots[7].quantity, 3);
    }

    #[test]
    fn test_move_container_into_occupied_backpack_slot_conflicts() {
        let refs = catalog();
        let mut inv = with_bag();
        inv.general_slots[0].fill("pouch", 1);
        inv.backpack_slots[2].fill("sword", 1);
        let before = inv.clone();
        let err = move_item(&mut inv, &refs, "pouch", &SlotRef::general(0), &SlotRef::backpack(2))
            .unwrap_err();
        assert!(matches!(err, GameError::Conflict(_)));
        assert_eq!(inv, before);
    }

    #[test]
    fn test_move_rejects_container_displaced_into_backpack() {
        let refs = catalog();
        let mut inv = with_bag();
        inv.backpack_slots[0].fill("sword", 1);
        inv.general_slots[0].fill("pouch", 1);
        let before = inv.clone();
        let err = move_item(&mut inv, &refs, "sword", &SlotRef::backpack(0), &SlotRef::general(0))
            .unwrap_err();
        assert!(matches!(err, GameError::Conflict(_)));
        assert_eq!(inv, before);
    }

    #[test]
    fn test_move_wrong_item_or_empty_source() {
        let refs = catalog();
        let mut inv = Inventory::default();
        inv.general_slots[0].fill("sword", 1);
        let err = move_item(&mut inv, &refs, "arrow", &SlotRef::general(0), &SlotRef::general(1))
            .unwrap_err();
        assert!(matches!(err, GameError::Conflict(_)));
        let err = move_item(&mut inv, &refs, "arrow", &SlotRef::general(2), &SlotRef::general(1))
            .unwrap_err();
        assert!(matches!(err, GameError::NotFound(_)));
        let err = move_item(&mut inv, &refs, "sword", &SlotRef::general(0), &SlotRef::general(9))
            .unwrap_err();
        assert!(matches!(err, GameError::NotFound(_)));
    }

    // ========================================================================
    // stack / split / drop
    // ========================================================================

    #[test]
    fn test_stack_transfers_up_to_limit() {
        let refs = catalog();
        let mut inv = Inventory::default();
        inv.general_slots[0].fill("arrow", 6);
        inv.general_slots[1].fill("arrow", 7);
        let moved =
            stack_items(&mut inv, &refs, "arrow", &SlotRef::general(0), &SlotRef::general(1)).unwrap();
        assert_eq!(moved, 3);
        assert_eq!(inv.general_slots[0].quantity, 3);
        assert_eq!(inv.general_slots[1].quantity, 10);

        let err = stack_items(&mut inv, &refs, "arrow", &SlotRef::general(0), &SlotRef::general(1))
            .unwrap_err();
        assert!(matches!(err, GameError::Capacity(_)));
    }

    #[test]
    fn test_stack_clears_source_when_exhausted() {
        let refs = catalog();
        let mut inv = Inventory::default();
        inv.general_slots[0].fill("arrow", 2);
        inv.general_slots[1].fill("arrow", 2);
        stack_items(&mut inv, &refs, "arrow", &SlotRef::general(0), &SlotRef::general(1)).unwrap();
        assert!(inv.general_slots[0].is_empty());
        assert_eq!(inv.general_slots[0].quantity, 0);
    }

    #[test]
    fn test_stack_requires_same_item() {
        let refs = catalog();
        let mut inv = Inventory::default();
        inv.general_slots[0].fill("arrow", 2);
        inv.general_slots[1].fill("sword", 1);
        let err = stack_items(&mut inv, &refs, "arrow", &SlotRef::general(0), &SlotRef::general(1))
            .unwrap_err();
        assert!(matches!(err, GameError::Conflict(_)));
    }

    #[test]
    fn test_split_full_amount_is_validation_error() {
        let refs = catalog();
        let mut inv = Inventory::default();
        inv.general_slots[0].fill("arrow", 6);
        let err = split_stack(&mut inv, &refs, "arrow", &SlotRef::general(0), &SlotRef::general(1), 6)
            .unwrap_err();
        assert!(matches!(err, GameError::Validation(_)));
        split_stack(&mut inv, &refs, "arrow", &SlotRef::general(0), &SlotRef::general(1), 2).unwrap();
        assert_eq!(inv.general_slots[0].quantity, 4);
        assert_eq!(inv.general_slots[1].quantity, 2);
        let err = split_stack(&mut inv, &refs, "arrow", &SlotRef::general(0), &SlotRef::general(1), 1)
            .unwrap_err();
        assert!(matches!(err, GameError::Validation(_)));
    }

    #[test]
    fn test_drop_defaults_to_whole_stack() {
        let mut inv = Inventory::default();
        inv.general_slots[0].fill("arrow", 6);
        assert_eq!(drop_item(&mut inv, "arrow", &SlotRef::general(0), Some(2)).unwrap(), 2);
        assert_eq!(drop_item(&mut inv, "arrow", &SlotRef::general(0), None).unwrap(), 4);
        assert!(inv.general_slots[0].is_empty());
    }

    #[test]
    fn test_remove_quantity_general_first() {
        let mut inv = with_bag();
        inv.general_slots[0].fill("gold-piece", 5);
        inv.backpack_slots[0].fill("gold-piece", 10);
        remove_quantity(&mut inv, "gold-piece", 8).unwrap();
        assert!(inv.general_slots[0].is_empty());
        assert_eq!(inv.backpack_slots[0].quantity, 7);
        let before = inv.clone();
        assert!(matches!(
            remove_quantity(&mut inv, "gold-piece", 8),
            Err(GameError::Conflict(_))
        ));
        assert_eq!(inv, before);
    }

    // ========================================================================
    // equip / unequip
    // ========================================================================

    #[test]
    fn test_equip_into_occupied_gear_slot_conflicts() {
        let refs = catalog();
        let mut inv = Inventory::default();
        inv.general_slots[0].fill("sword", 1);
        inv.general_slots[1].fill("sword", 1);
        equip_item(&mut inv, &refs, "sword", &SlotRef::general(0), GearSlot::Mainhand).unwrap();
        let before = inv.clone();
        let err = equip_item(&mut inv, &refs, "sword", &SlotRef::general(1), GearSlot::Mainhand)
            .unwrap_err();
        assert!(matches!(err, GameError::Conflict(_)));
        assert_eq!(inv, before);
    }

    #[test]
    fn test_unequip_prefers_backpack_and_reports_capacity() {
        let refs = catalog();
        let mut inv = with_bag();
        inv.gear_slots.insert(
            GearSlot::Head,
            GearEntry {
                item: "sword".into(),
                quantity: 1,
            },
        );
        let landed = unequip_item(&mut inv, &refs, GearSlot::Head).unwrap();
        assert_eq!(landed, SlotRef::backpack(0));
        assert!(matches!(
            unequip_item(&mut inv, &refs, GearSlot::Head),
            Err(GameError::NotFound(_))
        ));

        let mut full = Inventory::default();
        for slot in full.general_slots.iter_mut() {
            slot.fill("sword", 1);
        }
        full.gear_slots.insert(
            GearSlot::Mainhand,
            GearEntry {
                item: "sword".into(),
                quantity: 1,
            },
        );
        assert!(matches!(
            unequip_item(&mut full, &refs, GearSlot::Mainhand),
            Err(GameError::Capacity(_))
        ));
    }

    #[test]
    fn test_bag_round_trip() {
        let refs = catalog();
        let mut inv = Inventory::default();
        inv.general_slots[0].fill("backpack", 1);
        equip_item(&mut inv, &refs, "backpack", &SlotRef::general(0), GearSlot::Bag).unwrap();
        assert!(inv.bag_equipped());
        inv.backpack_slots[0].fill("arrow", 1);
        assert!(matches!(
            unequip_item(&mut inv, &refs, GearSlot::Bag),
            Err(GameError::Conflict(_))
        ));
        inv.backpack_slots[0].clear();
        let landed = unequip_item(&mut inv, &refs, GearSlot::Bag).unwrap();
        assert_eq!(landed, SlotRef::general(0));
    }

    #[test]
    fn test_only_containers_can_be_worn_as_bag() {
        let refs = catalog();
        let mut inv = Inventory::default();
        inv.general_slots[0].fill("sword", 1);
        assert!(matches!(
            equip_item(&mut inv, &refs, "sword", &SlotRef::general(0), GearSlot::Bag),
            Err(GameError::Conflict(_))
        ));
    }

    #[test]
    fn test_shape_rejects_malformed_containers() {
        assert!(check_shape(&Inventory::default()).is_ok());

        let mut inv = Inventory::default();
        inv.general_slots.push(Slot::empty(GENERAL_CAPACITY));
        assert!(matches!(check_shape(&inv), Err(GameError::Internal(_))));

        let mut inv = Inventory::default();
        inv.backpack_slots[3].index = 7;
        assert!(matches!(check_shape(&inv), Err(GameError::Internal(_))));

        let mut inv = Inventory::default();
        inv.general_slots[1].quantity = 5;
        assert!(matches!(check_shape(&inv), Err(GameError::Internal(_))));

        let mut inv = Inventory::default();
        inv.general_slots[2].item = Some("arrow".into());
        assert!(matches!(check_shape(&inv), Err(GameError::Internal(_))));
    }
}
