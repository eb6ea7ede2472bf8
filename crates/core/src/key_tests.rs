// SPDX-License-Identifier: MIT

use super::*;

#[test]
fn equal_by_value_not_identity() {
    let a = StateKey::new("off");
    let b = StateKey::from("off".to_string());
    assert_eq!(a, b);
}

#[test]
fn borrow_str_enables_map_lookup_by_str() {
    use std::collections::HashMap;
    let mut map: HashMap<StateKey, i32> = HashMap::new();
    map.insert(StateKey::new("on"), 1);
    assert_eq!(map.get("on"), Some(&1));
}

#[test]
fn data_state_key_round_trips_to_plain_key() {
    let k = StateKey::new("counter");
    let tagged: DataStateKey<u32> = DataStateKey::new(k.clone());
    assert_eq!(tagged.key(), &k);
    assert_eq!(tagged.data_type(), std::any::TypeId::of::<u32>());
}
