//! Scenario 6: a periodic message scheduled from `on_enter` must stop firing
//! once its owning state is exited — a stray tick must not reach the next
//! state's handler after the transition away.

use std::time::Duration;

use crate::support::*;
use tokio::time::sleep;
use tsm_core::key::StateKey;

#[tokio::test]
async fn leaving_the_scheduling_state_cancels_its_pending_ticks() {
    let m = machine(scheduled_cancellation_tree());
    let mut processed = m.processed_messages();
    m.start().await.unwrap();
    assert_eq!(m.current_leaf(), StateKey::new("a"));

    // Let at least one `Tick` land on `a` before leaving it.
    sleep(Duration::from_millis(25)).await;

    m.send(Stop).await.unwrap();
    assert_eq!(m.current_leaf(), StateKey::new("b"));

    // Drain whatever already landed, then make sure nothing further shows up
    // as handled by `a` once it is no longer on the active path.
    sleep(Duration::from_millis(50)).await;
    while let Ok(result) = processed.try_recv() {
        if let tsm_core::result::ProcessResult::Handled(handled) = &result {
            assert_ne!(handled.handling, StateKey::new("a"));
        }
    }

    m.dispose().await;
}
