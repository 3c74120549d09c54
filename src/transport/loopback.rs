//! Length-prefixed TCP loopback transport, for exercising the protocol
//! engines across two processes without real CAN hardware.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::time::Duration;

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use tracing::debug;

use crate::error::CanError;
use crate::frame::CanFrame;
use crate::transport::FrameTransport;

/// Matches the `can_id` (4 bytes) + `dlc` (1 byte) + up to 8 data bytes wire
/// shape used on the loopback socket.
const WIRE_SIZE: usize = 4 + 1 + 8;

#[derive(Clone, Debug)]
pub struct LoopbackConfig {
    pub host: String,
    pub port: u16,
    pub is_server: bool,
}

pub struct LoopbackTransport {
    config: LoopbackConfig,
    listener: Option<TcpListener>,
    stream: Option<TcpStream>,
}

impl LoopbackTransport {
    #[must_use]
    pub fn new(config: LoopbackConfig) -> Self {
        Self {
            config,
            listener: None,
            stream: None,
        }
    }

    fn stream(&mut self) -> Result<&mut TcpStream, CanError> {
        self.stream
            .as_mut()
            .ok_or(CanError::Transport("loopback transport not connected".into()))
    }
}

fn write_frame(stream: &mut TcpStream, frame: &CanFrame) -> std::io::Result<()> {
    let mut wire = [0u8; WIRE_SIZE];
    let mut cursor = &mut wire[..];
    cursor.write_u32::<BigEndian>(frame.can_id)?;
    cursor.write_u8(frame.dlc() as u8)?;
    cursor[..frame.dlc()].copy_from_slice(frame.data());
    stream.write_all(&wire)
}

fn read_frame(stream: &mut TcpStream) -> std::io::Result<CanFrame> {
    let mut wire = [0u8; WIRE_SIZE];
    stream.read_exact(&mut wire)?;
    let mut cursor = &wire[..];
    let can_id = cursor.read_u32::<BigEndian>()?;
    let dlc = cursor.read_u8()? as usize;
    CanFrame::new(can_id, &cursor[..dlc.min(8)])
        .map_err(|e| std::io::Error::other(e.to_string()))
}

impl FrameTransport for LoopbackTransport {
    fn init(&mut self) -> Result<(), CanError> {
        if self.config.is_server {
            let listener = TcpListener::bind((self.config.host.as_str(), self.config.port))
                .map_err(|e| CanError::Transport(e.to_string()))?;
            debug!(port = self.config.port, "listening for loopback peer");
            let (stream, _) = listener
                .accept()
                .map_err(|e| CanError::Transport(e.to_string()))?;
            self.listener = Some(listener);
            self.stream = Some(stream);
        } else {
            let stream = TcpStream::connect((self.config.host.as_str(), self.config.port))
                .map_err(|e| CanError::Transport(e.to_string()))?;
            self.stream = Some(stream);
        }
        Ok(())
    }

    fn send(&mut self, frame: &CanFrame) -> Result<(), CanError> {
        write_frame(self.stream()?, frame).map_err(|e| CanError::Transport(e.to_string()))
    }

    fn receive(&mut self, timeout: Duration) -> Result<CanFrame, CanError> {
        let stream = self.stream()?;
        // `set_read_timeout` rejects a zero duration; `timeout_ms == 0`
        // means non-blocking (§6.1), so drive that case through
        // `set_nonblocking` instead of a zero timeout.
        if timeout.is_zero() {
            stream
                .set_nonblocking(true)
                .map_err(|e| CanError::Transport(e.to_string()))?;
        } else {
            stream
                .set_nonblocking(false)
                .map_err(|e| CanError::Transport(e.to_string()))?;
            stream
                .set_read_timeout(Some(timeout))
                .map_err(|e| CanError::Transport(e.to_string()))?;
        }
        read_frame(stream).map_err(|e| match e.kind() {
            std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut => CanError::Timeout,
            _ => CanError::Transport(e.to_string()),
        })
    }

    fn close(&mut self) -> Result<(), CanError> {
        self.stream = None;
        self.listener = None;
        Ok(())
    }
}
