//! MCP2515-over-SPI transport.
//!
//! Deliberately a stub: driving the MCP2515's TX/RX buffers and interrupt
//! pin over SPI is real embedded work this crate doesn't attempt. `send`
//! always succeeds without touching the bus, `receive` always times out.
//! The type exists so `Context<SpiTransport<_, _>>` compiles against real
//! `embedded-hal` trait bounds for whoever implements the rest.

use std::time::Duration;

use embedded_hal::digital::OutputPin;
use embedded_hal::spi::SpiDevice;

use crate::error::CanError;
use crate::frame::CanFrame;
use crate::transport::FrameTransport;

pub struct SpiTransport<S, P> {
    spi: S,
    chip_select: P,
    initialized: bool,
}

impl<S, P> SpiTransport<S, P>
where
    S: SpiDevice,
    P: OutputPin,
{
    pub fn new(spi: S, chip_select: P) -> Self {
        Self {
            spi,
            chip_select,
            initialized: false,
        }
    }
}

impl<S, P> FrameTransport for SpiTransport<S, P>
where
    S: SpiDevice,
    P: OutputPin,
{
    fn init(&mut self) -> Result<(), CanError> {
        // TODO: reset the MCP2515, configure it for extended frames at the
        // desired bitrate, and set up RX filters/masks.
        let _ = &self.spi;
        let _ = self.chip_select.set_high();
        self.initialized = true;
        Ok(())
    }

    fn send(&mut self, _frame: &CanFrame) -> Result<(), CanError> {
        if !self.initialized {
            return Err(CanError::Transport("SPI transport not initialized".into()));
        }
        // TODO: load the frame into a free TX buffer and request transmission.
        Ok(())
    }

    fn receive(&mut self, _timeout: Duration) -> Result<CanFrame, CanError> {
        if !self.initialized {
            return Err(CanError::Transport("SPI transport not initialized".into()));
        }
        // TODO: poll (or wait on the INT pin for) a populated RX buffer.
        Err(CanError::Timeout)
    }

    fn close(&mut self) -> Result<(), CanError> {
        self.initialized = false;
        Ok(())
    }
}
