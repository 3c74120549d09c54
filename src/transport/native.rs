//! Linux SocketCAN transport, wired through the real `socketcan` crate.

use std::time::Duration;

use socketcan::{CanFrame as SockFrame, ExtendedId, Frame, Id, Socket};
use tracing::debug;

use crate::error::CanError;
use crate::frame::CanFrame;
use crate::transport::FrameTransport;

pub struct NativeTransport {
    interface: String,
    socket: Option<socketcan::CanSocket>,
}

impl NativeTransport {
    #[must_use]
    pub fn new(interface: impl Into<String>) -> Self {
        Self {
            interface: interface.into(),
            socket: None,
        }
    }
}

impl FrameTransport for NativeTransport {
    fn init(&mut self) -> Result<(), CanError> {
        let socket = socketcan::CanSocket::open(&self.interface)
            .map_err(|e| CanError::Transport(format!("open {}: {e}", self.interface)))?;
        debug!(interface = %self.interface, "opened SocketCAN interface");
        self.socket = Some(socket);
        Ok(())
    }

    fn send(&mut self, frame: &CanFrame) -> Result<(), CanError> {
        let socket = self
            .socket
            .as_ref()
            .ok_or(CanError::Transport("transport not initialized".into()))?;
        let id =
            ExtendedId::new(frame.can_id).ok_or(CanError::Argument("CAN id exceeds 29 bits"))?;
        let sock_frame = SockFrame::new(Id::Extended(id), frame.data())
            .ok_or(CanError::Argument("frame data exceeds 8 bytes"))?;
        socket
            .write_frame(&sock_frame)
            .map_err(|e| CanError::Transport(e.to_string()))
    }

    fn receive(&mut self, timeout: Duration) -> Result<CanFrame, CanError> {
        let socket = self
            .socket
            .as_ref()
            .ok_or(CanError::Transport("transport not initialized".into()))?;
        // `timeout_ms == 0` means non-blocking (§6.1); SocketCAN's
        // SO_RCVTIMEO treats a zero timeout as "block forever", so that case
        // goes through `set_nonblocking` instead.
        if timeout.is_zero() {
            socket
                .set_nonblocking(true)
                .map_err(|e| CanError::Transport(e.to_string()))?;
        } else {
            socket
                .set_nonblocking(false)
                .map_err(|e| CanError::Transport(e.to_string()))?;
            socket
                .set_read_timeout(timeout)
                .map_err(|e| CanError::Transport(e.to_string()))?;
        }
        let sock_frame = socket.read_frame().map_err(|e| {
            if matches!(e.kind(), std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut) {
                CanError::Timeout
            } else {
                CanError::Transport(e.to_string())
            }
        })?;
        let can_id = match sock_frame.id() {
            Id::Extended(id) => id.as_raw(),
            Id::Standard(id) => id.as_raw() as u32,
        };
        CanFrame::new(can_id, sock_frame.data())
    }

    fn close(&mut self) -> Result<(), CanError> {
        self.socket = None;
        Ok(())
    }
}
