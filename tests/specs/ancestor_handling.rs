//! Scenario 3: a message sent while the active leaf is `A1` bubbles up to
//! its ancestor `A`, which is the first node in the chain with a handler.

use crate::support::*;
use tsm_core::key::StateKey;

#[tokio::test]
async fn an_unhandled_leaf_message_bubbles_up_to_the_first_ancestor_with_a_handler() {
    let m = machine(ancestor_tree());
    m.start().await.unwrap();
    assert_eq!(m.current_leaf(), StateKey::new("a1"));

    let result = m.send(M).await.unwrap();
    assert!(result.is_handled());
    let tsm_core::result::ProcessResult::Handled(handled) = &result else {
        unreachable!("checked above");
    };
    assert_eq!(handled.receiving, StateKey::new("a1"));
    assert_eq!(handled.handling, StateKey::new("a"));
    let transition = result.transition().unwrap();

    assert_eq!(transition.exited, vec![StateKey::new("a1"), StateKey::new("a")]);
    assert_eq!(transition.entered, vec![StateKey::new("b")]);
    assert_eq!(m.current_leaf(), StateKey::new("b"));

    m.dispose().await;
}
