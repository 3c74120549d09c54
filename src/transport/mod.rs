//! Pluggable frame transports.
//!
//! Every backend — native SocketCAN, an MCP2515-over-SPI stub, an in-memory
//! queue, or a length-prefixed TCP loopback — implements [`FrameTransport`].
//! [`crate::context::Context`] is generic over it rather than boxing it, so
//! the protocol engines never allocate just to move a frame.

pub mod loopback;
pub mod memory;
#[cfg(target_os = "linux")]
pub mod native;
pub mod spi;

use std::time::Duration;

use crate::error::CanError;
use crate::frame::CanFrame;

/// A send/receive channel for 29-bit extended CAN frames.
///
/// `receive` blocks for at most `timeout`, returning [`CanError::Timeout`]
/// if nothing arrives. Implementations that can't express a true deadline
/// (the in-memory queue, for instance) may poll instead.
pub trait FrameTransport {
    fn init(&mut self) -> Result<(), CanError>;
    fn send(&mut self, frame: &CanFrame) -> Result<(), CanError>;
    fn receive(&mut self, timeout: Duration) -> Result<CanFrame, CanError>;
    fn close(&mut self) -> Result<(), CanError>;
}

impl<T: FrameTransport + ?Sized> FrameTransport for Box<T> {
    fn init(&mut self) -> Result<(), CanError> {
        (**self).init()
    }

    fn send(&mut self, frame: &CanFrame) -> Result<(), CanError> {
        (**self).send(frame)
    }

    fn receive(&mut self, timeout: Duration) -> Result<CanFrame, CanError> {
        (**self).receive(timeout)
    }

    fn close(&mut self) -> Result<(), CanError> {
        (**self).close()
    }
}
