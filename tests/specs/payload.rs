//! Scenario 5: a `GoTo` carrying a payload makes that payload visible to
//! the entered leaf's `initial_data` closure via `TransitionCtx::payload`.

use crate::support::*;
use tsm_core::key::StateKey;

#[tokio::test]
async fn a_transitions_payload_seeds_the_entered_leafs_initial_data() {
    let m = machine(payload_tree());
    m.start().await.unwrap();
    assert_eq!(m.current_leaf(), StateKey::new("x"));

    m.send(M).await.unwrap();
    assert_eq!(m.current_leaf(), StateKey::new("y"));

    let count: Count = m.data(None).unwrap();
    assert_eq!(count, Count(42));

    m.dispose().await;
}
