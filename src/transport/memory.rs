//! Fixed-capacity in-memory queue transport, for tests and same-process
//! node-to-node wiring.

use std::collections::VecDeque;
use std::time::Duration;

use tracing::trace;

use crate::error::CanError;
use crate::frame::CanFrame;
use crate::transport::FrameTransport;

/// Matches the original mock backend's 32-entry ring buffer depth.
pub const QUEUE_CAPACITY: usize = 32;

/// One end of a pair; construct with [`memory_pair`] to get two ends wired
/// to each other.
pub struct MemoryTransport {
    inbox: std::sync::Arc<std::sync::Mutex<VecDeque<CanFrame>>>,
    outbox: std::sync::Arc<std::sync::Mutex<VecDeque<CanFrame>>>,
}

/// Build a connected pair of [`MemoryTransport`]s: whatever the first side
/// sends, the second side receives, and vice versa.
#[must_use]
pub fn memory_pair() -> (MemoryTransport, MemoryTransport) {
    let a_to_b = std::sync::Arc::new(std::sync::Mutex::new(VecDeque::with_capacity(
        QUEUE_CAPACITY,
    )));
    let b_to_a = std::sync::Arc::new(std::sync::Mutex::new(VecDeque::with_capacity(
        QUEUE_CAPACITY,
    )));

    let a = MemoryTransport {
        inbox: b_to_a.clone(),
        outbox: a_to_b.clone(),
    };
    let b = MemoryTransport {
        inbox: a_to_b,
        outbox: b_to_a,
    };
    (a, b)
}

impl FrameTransport for MemoryTransport {
    fn init(&mut self) -> Result<(), CanError> {
        self.inbox.lock().unwrap().clear();
        self.outbox.lock().unwrap().clear();
        Ok(())
    }

    fn send(&mut self, frame: &CanFrame) -> Result<(), CanError> {
        let mut outbox = self.outbox.lock().unwrap();
        if outbox.len() >= QUEUE_CAPACITY {
            return Err(CanError::Transport("in-memory queue full".into()));
        }
        trace!(can_id = format!("{:#010X}", frame.can_id), "queued frame");
        outbox.push_back(frame.clone());
        Ok(())
    }

    fn receive(&mut self, timeout: Duration) -> Result<CanFrame, CanError> {
        let deadline = std::time::Instant::now() + timeout;
        loop {
            if let Some(frame) = self.inbox.lock().unwrap().pop_front() {
                return Ok(frame);
            }
            if std::time::Instant::now() >= deadline {
                return Err(CanError::Timeout);
            }
            std::thread::sleep(Duration::from_micros(100));
        }
    }

    fn close(&mut self) -> Result<(), CanError> {
        Ok(())
    }
}
