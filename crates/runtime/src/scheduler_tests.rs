use super::*;
use std::time::Duration;
use tokio::sync::mpsc;

#[derive(Debug)]
struct Tick(u32);

fn make_scheduler() -> (Scheduler, mpsc::UnboundedReceiver<Msg>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Scheduler::new(tx), rx)
}

#[tokio::test(start_paused = true)]
async fn one_shot_tick_fires_once() {
    let (scheduler, mut rx) = make_scheduler();
    let owner = StateKey::new("a");
    let _handle = scheduler.schedule(owner, Arc::new(|| Msg::new(Tick(1))), Duration::from_secs(1), false, None);

    tokio::time::advance(Duration::from_secs(1)).await;
    let msg = rx.recv().await.unwrap();
    assert!(msg.is::<Tick>());
}

#[tokio::test(start_paused = true)]
async fn periodic_tick_repeats_until_cancelled() {
    let (scheduler, mut rx) = make_scheduler();
    let owner = StateKey::new("a");
    let handle = scheduler.schedule(owner.clone(), Arc::new(|| Msg::new(Tick(1))), Duration::from_secs(1), true, None);

    tokio::time::advance(Duration::from_secs(1)).await;
    rx.recv().await.unwrap();
    tokio::time::advance(Duration::from_secs(1)).await;
    rx.recv().await.unwrap();

    scheduler.cancel_owner(&owner);
    handle.cancel();
    tokio::time::advance(Duration::from_secs(3)).await;
    assert!(rx.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn gate_defers_first_tick_until_notified() {
    let (scheduler, mut rx) = make_scheduler();
    let owner = StateKey::new("a");
    let gate = Arc::new(Notify::new());
    let _handle =
        scheduler.schedule(owner, Arc::new(|| Msg::new(Tick(1))), Duration::from_millis(0), false, Some(gate.clone()));

    tokio::time::advance(Duration::from_secs(5)).await;
    assert!(rx.try_recv().is_err());

    gate.notify_waiters();
    let msg = rx.recv().await.unwrap();
    assert!(msg.is::<Tick>());
}

#[tokio::test(start_paused = true)]
async fn cancel_owner_stops_future_ticks() {
    let (scheduler, mut rx) = make_scheduler();
    let owner = StateKey::new("a");
    scheduler.schedule(owner.clone(), Arc::new(|| Msg::new(Tick(1))), Duration::from_secs(1), true, None);

    scheduler.cancel_owner(&owner);
    tokio::time::advance(Duration::from_secs(5)).await;
    assert!(rx.try_recv().is_err());
}
