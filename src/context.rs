//! Per-node handle bundling a transport, this node's address, and the RPC
//! nonce generator state.

use tracing::{debug, info};

use crate::error::CanError;
use crate::ident::MAX_ADDRESS;
use crate::transport::loopback::{LoopbackConfig, LoopbackTransport};
use crate::transport::memory::MemoryTransport;
#[cfg(target_os = "linux")]
use crate::transport::native::NativeTransport;
use crate::transport::spi::SpiTransport;
use crate::transport::FrameTransport;

/// Node handle over a transport `T`. Generic rather than `Box<dyn
/// FrameTransport>` so the protocol engines stay allocation-free on the hot
/// path; use `Context<Box<dyn FrameTransport>>` if runtime transport
/// selection is worth the indirection.
pub struct Context<T: FrameTransport> {
    pub(crate) node_address: u8,
    pub(crate) transport: T,
    /// Multiplicative congruential generator state for RPC nonces, seeded
    /// per context rather than process-global.
    pub(crate) rpc_nonce_seed: u8,
}

impl<T: FrameTransport> Context<T> {
    /// Wrap an already-constructed transport. Does not call `init` — use
    /// this when the transport is pre-initialized, or call [`Self::init`]
    /// afterward.
    pub fn custom(node_address: u8, transport: T) -> Result<Self, CanError> {
        if node_address > MAX_ADDRESS {
            return Err(CanError::Argument("node address exceeds 6 bits"));
        }
        Ok(Self {
            node_address,
            transport,
            rpc_nonce_seed: 1,
        })
    }

    pub fn init(&mut self) -> Result<(), CanError> {
        self.transport.init()?;
        info!(node_address = self.node_address, "context initialized");
        Ok(())
    }

    pub fn close(&mut self) -> Result<(), CanError> {
        debug!(node_address = self.node_address, "closing context");
        self.transport.close()
    }

    #[must_use]
    pub fn node_address(&self) -> u8 {
        self.node_address
    }

    pub(crate) fn transport(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Pull the next raw frame off the transport without interpreting it as
    /// any particular family — useful for tracing/dump tooling.
    pub fn receive_raw(
        &mut self,
        timeout: std::time::Duration,
    ) -> Result<crate::frame::CanFrame, CanError> {
        self.transport.receive(timeout)
    }

    /// Advance and return the next RPC nonce: `seed = (seed*75 + 74) % 256`,
    /// remapping `0` to `1` so the nonce never collapses to a fixed point.
    pub(crate) fn next_rpc_nonce(&mut self) -> u8 {
        self.rpc_nonce_seed = self.rpc_nonce_seed.wrapping_mul(75).wrapping_add(74);
        if self.rpc_nonce_seed == 0 {
            self.rpc_nonce_seed = 1;
        }
        self.rpc_nonce_seed
    }
}

#[cfg(target_os = "linux")]
impl Context<NativeTransport> {
    pub fn native(node_address: u8, interface: impl Into<String>) -> Result<Self, CanError> {
        let mut ctx = Self::custom(node_address, NativeTransport::new(interface))?;
        ctx.init()?;
        Ok(ctx)
    }
}

impl Context<MemoryTransport> {
    /// Build a `Context` directly over one end of an already-created
    /// in-memory pair (see [`crate::transport::memory::memory_pair`]).
    pub fn memory(node_address: u8, transport: MemoryTransport) -> Result<Self, CanError> {
        let mut ctx = Self::custom(node_address, transport)?;
        ctx.init()?;
        Ok(ctx)
    }
}

impl Context<LoopbackTransport> {
    pub fn loopback(node_address: u8, config: LoopbackConfig) -> Result<Self, CanError> {
        let mut ctx = Self::custom(node_address, LoopbackTransport::new(config))?;
        ctx.init()?;
        Ok(ctx)
    }
}

impl<S, P> Context<SpiTransport<S, P>>
where
    S: embedded_hal::spi::SpiDevice,
    P: embedded_hal::digital::OutputPin,
{
    pub fn spi(node_address: u8, spi: S, chip_select: P) -> Result<Self, CanError> {
        let mut ctx = Self::custom(node_address, SpiTransport::new(spi, chip_select))?;
        ctx.init()?;
        Ok(ctx)
    }
}
