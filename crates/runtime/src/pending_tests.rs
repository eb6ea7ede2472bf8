use super::*;
use tsm_core::message::Msg;

#[derive(Debug)]
struct Ping;

#[derive(Debug)]
struct Pong;

#[test]
fn fifo_order() {
    let queue = PendingQueue::new();
    queue.push(Msg::new(Ping));
    queue.push(Msg::new(Pong));

    assert!(queue.pop().unwrap().is::<Ping>());
    assert!(queue.pop().unwrap().is::<Pong>());
    assert!(queue.pop().is_none());
}

#[test]
fn clear_drains_and_reports_count() {
    let queue = PendingQueue::new();
    queue.push(Msg::new(Ping));
    queue.push(Msg::new(Ping));
    assert_eq!(queue.len(), 2);
    assert_eq!(queue.clear(), 2);
    assert_eq!(queue.len(), 0);
    assert!(queue.pop().is_none());
}
