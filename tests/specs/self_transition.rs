//! Scenario 4: an interior node transitions into itself (`goto_self`) while
//! the active leaf is one of its descendants. The descendant is exited and
//! the interior node's subtree is re-entered from scratch, landing back on
//! its `initial_child`.

use crate::support::*;
use tsm_core::key::StateKey;

#[tokio::test]
async fn goto_self_from_an_ancestor_exits_and_re_enters_its_whole_subtree() {
    let m = machine(self_transition_tree());
    m.start().await.unwrap();
    assert_eq!(m.current_leaf(), StateKey::new("a1"));

    let result = m.send(M).await.unwrap();
    let transition = result.transition().unwrap();

    assert_eq!(transition.exited, vec![StateKey::new("a1"), StateKey::new("a")]);
    assert_eq!(transition.entered, vec![StateKey::new("a"), StateKey::new("a1")]);
    assert_eq!(m.current_leaf(), StateKey::new("a1"));

    m.dispose().await;
}
