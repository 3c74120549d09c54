//! End-to-end RT send/receive, including the automatic echoed ACK.

use std::thread;
use std::time::Duration;

use canlink::context::Context;
use canlink::ident::{Priority, BROADCAST_ADDRESS};
use canlink::rt::RtMessage;
use canlink::transport::memory::memory_pair;
use pretty_assertions::assert_eq;

#[test]
fn targeted_send_is_acked_across_threads() {
    let (a, b) = memory_pair();
    let mut sender = Context::memory(0x01, a).unwrap();
    let mut receiver = Context::memory(0x02, b).unwrap();

    let receiver_thread = thread::spawn(move || receiver.rt_receive(Duration::from_millis(200)));

    let msg = RtMessage::new(Priority::High, 0x01, 0x02, &[7, 7, 7]).unwrap();
    sender.rt_send(&msg, true).expect("should observe echoed ACK");

    let received = receiver_thread.join().unwrap().unwrap();
    assert_eq!(received.data(), &[7, 7, 7]);
}

#[test]
fn broadcast_has_no_single_acker() {
    let (a, b) = memory_pair();
    let mut sender = Context::memory(0x01, a).unwrap();
    let mut receiver = Context::memory(0x02, b).unwrap();

    let msg = RtMessage::new(Priority::Low, 0x01, BROADCAST_ADDRESS, &[1]).unwrap();
    sender.rt_send(&msg, true).unwrap();

    let received = receiver.rt_receive(Duration::from_millis(50)).unwrap();
    assert_eq!(received.target, BROADCAST_ADDRESS);
}
