//! Scenario 2: starting a machine descends through every ancestor down to
//! the default leaf picked out by each level's `initial_child`.

use crate::support::*;
use tsm_core::key::StateKey;

#[tokio::test]
async fn starting_descends_through_every_ancestor_to_the_default_leaf() {
    let m = machine(descent_tree());
    let transition = m.start().await.unwrap();

    assert_eq!(transition.from, StateKey::new("root"));
    assert_eq!(transition.to, StateKey::new("a1"));
    assert_eq!(
        transition.entered,
        vec![StateKey::new("root"), StateKey::new("a"), StateKey::new("a1")]
    );
    assert_eq!(m.current_leaf(), StateKey::new("a1"));
    assert!(m.is_active(&StateKey::new("root")));
    assert!(m.is_active(&StateKey::new("a")));
    assert!(m.is_active(&StateKey::new("a1")));
    assert!(!m.is_active(&StateKey::new("a2")));
    assert!(!m.is_active(&StateKey::new("b")));

    m.dispose().await;
}
