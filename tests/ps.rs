//! End-to-end publish/subscribe across two in-memory nodes, including the
//! high/low priority band split and multi-frame reassembly.

use std::thread;
use std::time::Duration;

use canlink::context::Context;
use canlink::ident::Priority;
use canlink::transport::memory::memory_pair;
use pretty_assertions::assert_eq;

#[test]
fn subscriber_only_sees_publications_on_its_own_band() {
    let (a, b) = memory_pair();
    let mut publisher = Context::memory(0x01, a).unwrap();
    let mut subscriber = Context::memory(0x02, b).unwrap();

    publisher
        .ps_publish(10, Priority::High, true, b"high band")
        .unwrap();
    publisher
        .ps_publish(10, Priority::High, false, b"low band")
        .unwrap();

    let first = subscriber.ps_receive(Duration::from_millis(50)).unwrap();
    let second = subscriber.ps_receive(Duration::from_millis(50)).unwrap();

    assert!(first.high_priority);
    assert_eq!(first.payload, b"high band");
    assert!(!second.high_priority);
    assert_eq!(second.payload, b"low band");
}

#[test]
fn large_publication_reassembles_across_many_frames() {
    let (a, b) = memory_pair();
    let mut publisher = Context::memory(0x01, a).unwrap();
    let mut subscriber = Context::memory(0x02, b).unwrap();

    // Big enough to overflow the in-memory transport's 32-frame queue if
    // publish and receive didn't run concurrently.
    let payload: Vec<u8> = (0..2000u32).map(|i| (i % 255) as u8).collect();
    let expected = payload.clone();

    let publisher_thread = thread::spawn(move || {
        publisher
            .ps_publish(99, Priority::MedLow, true, &payload)
            .unwrap();
    });

    let received = subscriber.ps_receive(Duration::from_secs(2)).unwrap();
    publisher_thread.join().unwrap();

    assert_eq!(received.topic, 99);
    assert_eq!(received.payload, expected);
}
