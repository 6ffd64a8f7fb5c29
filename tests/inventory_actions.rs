//! Inventory and equipment behavior through the action dispatcher.
mod common;

use serde_json::json;

use common::{act, adventurer, catalog, dispatcher};
use savekeep::game::inventory::check_invariants;
use savekeep::game::{ErrorKind, GearSlot, SaveRecord};

#[test]
fn test_add_splits_across_stack_limit() {
    let d = dispatcher();
    let mut rec = SaveRecord::new("p", "s");

    let result = d.dispatch(&mut rec, &act("add_item", json!({"item_id": "arrow", "quantity": 15})));
    assert!(result.success, "{}", result.message);
    assert_eq!(rec.inventory.general_slots[0].quantity, 10);
    assert_eq!(rec.inventory.general_slots[1].quantity, 5);
    assert!(rec.inventory.general_slots[1].holds("arrow"));

    let inv = result.delta.unwrap().inventory.unwrap();
    assert_eq!(inv.general_slots.len(), 2);
    check_invariants(&rec.inventory, &catalog()).unwrap();

    // with a bag worn the backpack fills first
    let mut rec = adventurer("p", "s", 0);
    let result = d.dispatch(&mut rec, &act("add_item", json!({"item_id": "arrow", "quantity": 15})));
    assert!(result.success, "{}", result.message);
    assert_eq!(rec.inventory.backpack_slots[0].quantity, 10);
    assert_eq!(rec.inventory.backpack_slots[1].quantity, 5);
    assert!(rec.inventory.general_slots.iter().all(|s| s.is_empty()));
}

#[test]
fn test_add_tops_up_before_new_slots_and_prefers_backpack() {
    let d = dispatcher();
    let mut rec = adventurer("p", "s", 0);
    rec.inventory.general_slots[3].fill("arrow", 7);

    let result = d.dispatch(&mut rec, &act("add_item", json!({"item_id": "arrow", "quantity": 8})));
    assert!(result.success, "{}", result.message);
    assert_eq!(rec.inventory.general_slots[3].quantity, 10);
    assert_eq!(rec.inventory.backpack_slots[0].quantity, 5);
    check_invariants(&rec.inventory, &catalog()).unwrap();
}

#[test]
fn test_add_without_room_is_capacity_and_atomic() {
    let d = dispatcher();
    let mut rec = SaveRecord::new("p", "s");
    for (i, item) in ["short-sword", "iron-helm", "odd-stone"].iter().enumerate() {
        rec.inventory.general_slots[i].fill(item, 1);
    }
    let before = rec.clone();

    let result = d.dispatch(&mut rec, &act("add_item", json!({"item_id": "arrow", "quantity": 11})));
    assert!(!result.success);
    assert_eq!(result.error, Some(ErrorKind::Capacity));
    assert_eq!(rec, before);
}

#[test]
fn test_container_never_enters_backpack() {
    let d = dispatcher();
    let mut rec = adventurer("p", "s", 0);
    rec.inventory.general_slots[1].fill("small-pouch", 1);
    let before = rec.clone();

    let result = d.dispatch(
        &mut rec,
        &act(
            "move_item",
            json!({
                "item_id": "small-pouch",
                "from_slot": 1, "from_slot_type": "general",
                "to_slot": 0, "to_slot_type": "backpack"
            }),
        ),
    );
    assert_eq!(result.error, Some(ErrorKind::Conflict));
    assert_eq!(rec, before);

    // a swap that would push the pouch into the backpack is refused too
    rec.inventory.backpack_slots[2].fill("arrow", 3);
    let result = d.dispatch(
        &mut rec,
        &act(
            "move_item",
            json!({
                "item_id": "arrow",
                "from_slot": 2, "from_slot_type": "backpack",
                "to_slot": 1, "to_slot_type": "general"
            }),
        ),
    );
    assert_eq!(result.error, Some(ErrorKind::Conflict));

    // adding a container skips the backpack entirely
    let result = d.dispatch(&mut rec, &act("add_item", json!({"item_id": "small-pouch"})));
    assert!(result.success, "{}", result.message);
    assert!(rec.inventory.backpack_slots.iter().all(|s| !s.holds("small-pouch")));
    check_invariants(&rec.inventory, &catalog()).unwrap();
}

#[test]
fn test_move_swaps_occupied_destination() {
    let d = dispatcher();
    let mut rec = adventurer("p", "s", 0);
    rec.inventory.general_slots[1].fill("bread", 2);
    rec.inventory.backpack_slots[4].fill("arrow", 9);

    let result = d.dispatch(
        &mut rec,
        &act(
            "move_item",
            json!({
                "item_id": "bread",
                "from_slot": 1, "from_slot_type": "general",
                "to_slot": 4, "to_slot_type": "backpack"
            }),
        ),
    );
    assert!(result.success, "{}", result.message);
    assert!(rec.inventory.backpack_slots[4].holds("bread"));
    assert!(rec.inventory.general_slots[1].holds("arrow"));
    assert_eq!(rec.inventory.general_slots[1].quantity, 9);
}

#[test]
fn test_backpack_requires_bag() {
    let d = dispatcher();
    let mut rec = SaveRecord::new("p", "s");
    rec.inventory.general_slots[0].fill("arrow", 2);
    let result = d.dispatch(
        &mut rec,
        &act(
            "move_item",
            json!({
                "item_id": "arrow",
                "from_slot": 0, "from_slot_type": "general",
                "to_slot": 0, "to_slot_type": "backpack"
            }),
        ),
    );
    assert_eq!(result.error, Some(ErrorKind::NotFound));
}

#[test]
fn test_stack_and_split() {
    let d = dispatcher();
    let mut rec = SaveRecord::new("p", "s");
    rec.inventory.general_slots[0].fill("arrow", 8);
    rec.inventory.general_slots[1].fill("arrow", 6);

    let result = d.dispatch(
        &mut rec,
        &act("stack_item", json!({"item_id": "arrow", "from_slot": 1, "to_slot": 0})),
    );
    assert!(result.success, "{}", result.message);
    assert_eq!(rec.inventory.general_slots[0].quantity, 10);
    assert_eq!(rec.inventory.general_slots[1].quantity, 4);

    let result = d.dispatch(
        &mut rec,
        &act("stack_item", json!({"item_id": "arrow", "from_slot": 1, "to_slot": 0})),
    );
    assert_eq!(result.error, Some(ErrorKind::Capacity));

    let full_split = act(
        "split_item",
        json!({"item_id": "arrow", "from_slot": 1, "to_slot": 2, "quantity": 4}),
    );
    assert_eq!(d.dispatch(&mut rec, &full_split).error, Some(ErrorKind::ValidationError));

    let split = act(
        "split_item",
        json!({"item_id": "arrow", "from_slot": 1, "to_slot": 2, "quantity": 3}),
    );
    assert!(d.dispatch(&mut rec, &split).success);
    assert_eq!(rec.inventory.general_slots[1].quantity, 1);
    assert_eq!(rec.inventory.general_slots[2].quantity, 3);
    check_invariants(&rec.inventory, &catalog()).unwrap();
}

#[test]
fn test_drop_partial_and_whole() {
    let d = dispatcher();
    let mut rec = SaveRecord::new("p", "s");
    rec.inventory.general_slots[2].fill("bread", 4);

    let result = d.dispatch(
        &mut rec,
        &act("drop_item", json!({"item_id": "bread", "slot": 2, "quantity": 3})),
    );
    assert!(result.success);
    assert_eq!(rec.inventory.general_slots[2].quantity, 1);

    let result = d.dispatch(&mut rec, &act("drop_item", json!({"item_id": "bread", "slot": 2})));
    assert!(result.success);
    assert!(rec.inventory.general_slots[2].is_empty());
    assert_eq!(rec.inventory.general_slots[2].quantity, 0);

    let result = d.dispatch(&mut rec, &act("drop_item", json!({"item_id": "bread", "slot": 2})));
    assert_eq!(result.error, Some(ErrorKind::NotFound));
}

#[test]
fn test_equip_and_unequip_round_trip() {
    let d = dispatcher();
    let mut rec = adventurer("p", "s", 0);
    rec.inventory.general_slots[1].fill("short-sword", 1);
    rec.inventory.general_slots[2].fill("iron-helm", 1);

    let equip = act(
        "equip_item",
        json!({"item_id": "short-sword", "from_slot": 1, "equipment_slot": "weapon"}),
    );
    assert!(d.dispatch(&mut rec, &equip).success);
    assert_eq!(rec.inventory.gear(GearSlot::Mainhand).unwrap().item, "short-sword");
    assert!(rec.inventory.general_slots[1].is_empty());

    // slot already occupied
    let clash = act(
        "equip_item",
        json!({"item_id": "iron-helm", "from_slot": 2, "equipment_slot": "mainhand"}),
    );
    let before = rec.clone();
    assert_eq!(d.dispatch(&mut rec, &clash).error, Some(ErrorKind::Conflict));
    assert_eq!(rec, before);

    let result = d.dispatch(&mut rec, &act("unequip_item", json!({"equipment_slot": "mainhand"})));
    assert!(result.success, "{}", result.message);
    assert!(rec.inventory.gear(GearSlot::Mainhand).is_none());
    assert!(rec.inventory.backpack_slots[0].holds("short-sword"));
    let equipment = result.delta.unwrap().equipment.unwrap();
    assert_eq!(equipment.changed.get(&GearSlot::Mainhand), Some(&None));
}

#[test]
fn test_bag_rules() {
    let d = dispatcher();
    let mut rec = adventurer("p", "s", 0);
    rec.inventory.backpack_slots[0].fill("arrow", 1);

    let result = d.dispatch(&mut rec, &act("unequip_item", json!({"equipment_slot": "bag"})));
    assert_eq!(result.error, Some(ErrorKind::Conflict));

    rec.inventory.backpack_slots[0].clear();
    let result = d.dispatch(&mut rec, &act("unequip_item", json!({"equipment_slot": "bag"})));
    assert!(result.success, "{}", result.message);
    assert!(!rec.inventory.bag_equipped());

    // only containers can be worn as a bag
    rec.inventory.general_slots[3].fill("iron-helm", 1);
    let result = d.dispatch(
        &mut rec,
        &act("equip_item", json!({"item_id": "iron-helm", "from_slot": 3, "equipment_slot": "bag"})),
    );
    assert_eq!(result.error, Some(ErrorKind::Conflict));
}

#[test]
fn test_unknown_slot_type_is_validation() {
    let d = dispatcher();
    let mut rec = SaveRecord::new("p", "s");
    rec.inventory.general_slots[0].fill("arrow", 1);
    let result = d.dispatch(
        &mut rec,
        &act(
            "move_item",
            json!({"item_id": "arrow", "from_slot": 0, "to_slot": 1, "to_slot_type": "pocket"}),
        ),
    );
    assert_eq!(result.error, Some(ErrorKind::ValidationError));

    let result = d.dispatch(
        &mut rec,
        &act("move_item", json!({"item_id": "arrow", "from_slot": 0, "to_slot": 9})),
    );
    assert_eq!(result.error, Some(ErrorKind::NotFound));
}
