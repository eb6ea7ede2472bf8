//! `tsm-storage`'s `save_to`/`load_from` round trip exercised against a real
//! `Machine` built from these fixtures, as distinct from `tsm-storage`'s own
//! crate-internal tests against its own minimal tree.

use crate::support::*;
use tsm_core::key::StateKey;
use tsm_storage::{load_from, save_to};

#[tokio::test]
async fn a_snapshot_taken_mid_scenario_restores_the_active_path_and_data() {
    let m = machine(payload_tree());
    m.start().await.unwrap();
    m.send(M).await.unwrap();
    assert_eq!(m.current_leaf(), StateKey::new("y"));

    let mut buf = Vec::new();
    save_to(&m, &mut buf).unwrap();
    m.dispose().await;

    let restored = machine(payload_tree());
    load_from(&restored, buf.as_slice()).unwrap();

    assert_eq!(restored.current_leaf(), StateKey::new("y"));
    let count: Count = restored.data(None).unwrap();
    assert_eq!(count, Count(42));

    restored.dispose().await;
}

#[tokio::test]
async fn restoring_a_snapshot_does_not_rerun_on_enter_hooks() {
    // `x`'s initial data closure is never invoked on the restored machine
    // because `load_from` installs `y`'s data cell directly from the
    // snapshot instead of re-descending through the tree.
    let m = machine(switch_tree());
    m.start().await.unwrap();
    m.send(Toggle).await.unwrap();
    assert_eq!(m.current_leaf(), StateKey::new("on"));

    let mut buf = Vec::new();
    save_to(&m, &mut buf).unwrap();
    m.dispose().await;

    let restored = machine(switch_tree());
    load_from(&restored, buf.as_slice()).unwrap();
    assert_eq!(restored.current_leaf(), StateKey::new("on"));
    assert!(restored.is_active(&StateKey::new("on")));
    assert!(!restored.is_active(&StateKey::new("off")));

    restored.dispose().await;
}
