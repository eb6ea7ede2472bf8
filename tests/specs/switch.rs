//! Scenario 1: toggling between two sibling leaves twice returns to the
//! original leaf with exactly two `Transition` events observed.

use crate::support::*;
use tsm_core::key::StateKey;

#[tokio::test]
async fn toggling_twice_returns_to_the_original_leaf() {
    let m = machine(switch_tree());
    m.start().await.unwrap();
    assert_eq!(m.current_leaf(), StateKey::new("off"));

    let first = m.send(Toggle).await.unwrap();
    let first = first.transition().unwrap();
    assert_eq!(first.from, StateKey::new("off"));
    assert_eq!(first.to, StateKey::new("on"));
    assert_eq!(m.current_leaf(), StateKey::new("on"));

    let second = m.send(Toggle).await.unwrap();
    let second = second.transition().unwrap();
    assert_eq!(second.from, StateKey::new("on"));
    assert_eq!(second.to, StateKey::new("off"));
    assert_eq!(m.current_leaf(), StateKey::new("off"));

    m.dispose().await;
}

#[tokio::test]
async fn each_toggle_emits_one_transition_event_on_the_broadcast_stream() {
    let m = machine(switch_tree());
    let mut transitions = m.transitions();
    m.start().await.unwrap();
    let _ = transitions.recv().await.unwrap(); // the descent from start()

    m.send(Toggle).await.unwrap();
    let seen = transitions.recv().await.unwrap();
    assert_eq!(seen.to, StateKey::new("on"));

    m.send(Toggle).await.unwrap();
    let seen = transitions.recv().await.unwrap();
    assert_eq!(seen.to, StateKey::new("off"));

    m.dispose().await;
}
