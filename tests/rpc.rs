//! End-to-end RPC call/respond round trips over two in-memory `Context`s on
//! separate threads, since `rpc_call` blocks waiting for its own ACK/NACK.

use std::thread;
use std::time::Duration;

use canlink::context::Context;
use canlink::error::CanError;
use canlink::ident::Priority;
use canlink::transport::memory::memory_pair;
use pretty_assertions::assert_eq;

#[test]
fn call_and_respond_with_ack() {
    let (a, b) = memory_pair();
    let mut caller = Context::memory(0x01, a).unwrap();
    let mut callee = Context::memory(0x02, b).unwrap();

    let callee_thread = thread::spawn(move || {
        let call = callee.rpc_receive(Duration::from_millis(200)).unwrap();
        callee
            .rpc_send_ack(call.sender, call.priority, call.nonce)
            .unwrap();
    });

    caller
        .rpc_call(0x02, Priority::High, true, 7, b"ping")
        .expect("call should be acked");
    callee_thread.join().unwrap();
}

#[test]
fn call_rejected_with_nack_surfaces_remote_error() {
    let (a, b) = memory_pair();
    let mut caller = Context::memory(0x01, a).unwrap();
    let mut callee = Context::memory(0x02, b).unwrap();

    let callee_thread = thread::spawn(move || {
        let call = callee.rpc_receive(Duration::from_millis(200)).unwrap();
        callee
            .rpc_send_nack(call.sender, call.priority, call.nonce, 0x42)
            .unwrap();
    });

    let result = caller.rpc_call(0x02, Priority::High, true, 7, b"ping");
    callee_thread.join().unwrap();

    match result {
        Err(CanError::Remote(code)) => assert_eq!(code, 0x42),
        other => panic!("expected Remote(0x42), got {other:?}"),
    }
}

#[test]
fn call_fails_when_responder_sends_a_start_instead_of_ack() {
    let (a, b) = memory_pair();
    let mut caller = Context::memory(0x01, a).unwrap();
    let mut callee = Context::memory(0x02, b).unwrap();

    // A responder that answers with a StartReturn instead of ACK/NACK
    // (e.g. a buggy peer) must not be mistaken for a successful call.
    let callee_thread = thread::spawn(move || {
        let call = callee.rpc_receive(Duration::from_millis(200)).unwrap();
        callee
            .rpc_respond(call.sender, call.priority, 1, call.nonce, b"unsolicited")
            .unwrap();
    });

    let result = caller.rpc_call(0x02, Priority::High, true, 7, b"ping");
    callee_thread.join().unwrap();

    assert!(matches!(result, Err(CanError::Protocol(_))));
}
