//! RPC messages: request/response procedure calls with CRC-16-checked,
//! byte-stuffed payloads that may span several CAN frames.

use std::time::{Duration, Instant};

use tracing::trace;

use crate::context::Context;
use crate::crc;
use crate::error::CanError;
use crate::frame::{CanFrame, MAX_DATA_SIZE};
use crate::ident::{self, BROADCAST_ADDRESS, Priority, RpcFields, RpcFrameType};
use crate::transport::FrameTransport;

/// Unstuffed payload cap (`ARTIE_CAN_MAX_RPC_PAYLOAD` in the original).
pub const MAX_PAYLOAD: usize = 1024;
/// Stuffed scratch-buffer cap shared with PS (`ARTIE_CAN_MAX_STUFFED_PAYLOAD`).
pub const MAX_STUFFED: usize = 2048;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RpcKind {
    Ack,
    Nack {
        error_code: u8,
    },
    Start {
        /// `false` for a `StartRpc` call, `true` for a `StartReturn` response.
        is_return: bool,
        is_synchronous: bool,
        procedure_id: u8,
        payload: Vec<u8>,
    },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RpcMessage {
    pub priority: Priority,
    pub sender: u8,
    pub target: u8,
    pub nonce: u8,
    pub kind: RpcKind,
}

fn sync_proc_byte(is_synchronous: bool, procedure_id: u8) -> u8 {
    (if is_synchronous { 0x80 } else { 0x00 }) | (procedure_id & 0x7F)
}

impl<T: FrameTransport> Context<T> {
    fn rpc_send_payload(
        &mut self,
        start_type: RpcFrameType,
        continuation_type: RpcFrameType,
        target: u8,
        priority: Priority,
        nonce: u8,
        header_byte: u8,
        payload: &[u8],
    ) -> Result<(), CanError> {
        if payload.len() > MAX_PAYLOAD {
            return Err(CanError::Argument("RPC payload exceeds 1024 bytes"));
        }

        let mut stuffed = [0u8; MAX_STUFFED];
        let stuffed_len = crc::stuff(payload, &mut stuffed)?;

        let mut crc_data = [0u8; MAX_STUFFED + 1];
        crc_data[0] = header_byte;
        crc_data[1..1 + stuffed_len].copy_from_slice(&stuffed[..stuffed_len]);
        let crc16 = crc::crc16(&crc_data[..1 + stuffed_len]);

        let first_space = MAX_DATA_SIZE - 3;
        let first_chunk = stuffed_len.min(first_space);

        let mut first_data = [0u8; MAX_DATA_SIZE];
        first_data[0] = header_byte;
        first_data[1] = (crc16 >> 8) as u8;
        first_data[2] = (crc16 & 0xFF) as u8;
        first_data[3..3 + first_chunk].copy_from_slice(&stuffed[..first_chunk]);

        let can_id = ident::build_rpc(&RpcFields {
            frame_type: start_type,
            priority,
            sender: self.node_address(),
            target,
            nonce,
        })?;
        self.transport()
            .send(&CanFrame::new(can_id, &first_data[..3 + first_chunk])?)?;

        let mut offset = first_chunk;
        while offset < stuffed_len {
            let chunk = (stuffed_len - offset).min(MAX_DATA_SIZE);
            let can_id = ident::build_rpc(&RpcFields {
                frame_type: continuation_type,
                priority,
                sender: self.node_address(),
                target,
                nonce,
            })?;
            self.transport()
                .send(&CanFrame::new(can_id, &stuffed[offset..offset + chunk])?)?;
            offset += chunk;
        }

        Ok(())
    }

    /// Issue an RPC call and wait (30 ms, matching the original) for the
    /// ACK/NACK that closes the request/response handshake. Returns
    /// `Ok(())` on ACK, [`CanError::Remote`] on NACK.
    pub fn rpc_call(
        &mut self,
        target: u8,
        priority: Priority,
        is_synchronous: bool,
        procedure_id: u8,
        payload: &[u8],
    ) -> Result<(), CanError> {
        if target == BROADCAST_ADDRESS {
            return Err(CanError::Argument("RPC calls cannot target broadcast"));
        }

        let nonce = self.next_rpc_nonce();
        self.rpc_send_payload(
            RpcFrameType::StartRpc,
            RpcFrameType::TxData,
            target,
            priority,
            nonce,
            sync_proc_byte(is_synchronous, procedure_id),
            payload,
        )?;
        trace!(target, procedure_id, "sent RPC StartRpc");

        let response = self.rpc_receive(Duration::from_millis(30))?;
        match response.kind {
            RpcKind::Ack => Ok(()),
            RpcKind::Nack { error_code } => Err(CanError::Remote(error_code)),
            _ => Err(CanError::Protocol("unexpected response to RPC call")),
        }
    }

    /// Send an RPC response (`StartReturn`) using the nonce from the
    /// original request.
    pub fn rpc_respond(
        &mut self,
        target: u8,
        priority: Priority,
        procedure_id: u8,
        nonce: u8,
        payload: &[u8],
    ) -> Result<(), CanError> {
        self.rpc_send_payload(
            RpcFrameType::StartReturn,
            RpcFrameType::RxData,
            target,
            priority,
            nonce,
            sync_proc_byte(true, procedure_id),
            payload,
        )
    }

    pub fn rpc_send_ack(
        &mut self,
        target: u8,
        priority: Priority,
        nonce: u8,
    ) -> Result<(), CanError> {
        let can_id = ident::build_rpc(&RpcFields {
            frame_type: RpcFrameType::Ack,
            priority,
            sender: self.node_address(),
            target,
            nonce,
        })?;
        self.transport().send(&CanFrame::new(can_id, &[])?)
    }

    pub fn rpc_send_nack(
        &mut self,
        target: u8,
        priority: Priority,
        nonce: u8,
        error_code: u8,
    ) -> Result<(), CanError> {
        let can_id = ident::build_rpc(&RpcFields {
            frame_type: RpcFrameType::Nack,
            priority,
            sender: self.node_address(),
            target,
            nonce,
        })?;
        self.transport().send(&CanFrame::new(can_id, &[error_code])?)
    }

    /// Receive one RPC frame. ACK/NACK frames return immediately; a
    /// `StartRpc`/`StartReturn` frame triggers full reassembly — continuation
    /// frames (matching protocol, sender, target, and nonce) are pulled
    /// until the byte-stuffing terminator is found or `timeout` elapses,
    /// then the CRC-16 is verified against the received header.
    pub fn rpc_receive(&mut self, timeout: Duration) -> Result<RpcMessage, CanError> {
        let deadline = Instant::now() + timeout;
        let frame = self.transport().receive(timeout)?;
        if !matches!(frame.protocol(), Ok(crate::ident::Protocol::Rpc)) {
            return Err(CanError::Protocol("not an RPC frame"));
        }
        let fields = ident::parse_rpc(frame.can_id)?;

        let kind = match fields.frame_type {
            RpcFrameType::Ack => RpcKind::Ack,
            RpcFrameType::Nack => {
                let data = frame.data();
                if data.is_empty() {
                    return Err(CanError::Protocol("NACK frame missing error code"));
                }
                RpcKind::Nack {
                    error_code: data[0],
                }
            }
            RpcFrameType::StartRpc | RpcFrameType::StartReturn => {
                if frame.dlc() < 3 {
                    return Err(CanError::Protocol("RPC start frame shorter than 3 bytes"));
                }
                let data = frame.data();
                let header_byte = data[0];
                let is_synchronous = header_byte & 0x80 != 0;
                let procedure_id = header_byte & 0x7F;
                let expected_crc = u16::from_be_bytes([data[1], data[2]]);

                let continuation_type = if fields.frame_type == RpcFrameType::StartRpc {
                    RpcFrameType::TxData
                } else {
                    RpcFrameType::RxData
                };

                let mut stuffed = [0u8; MAX_STUFFED];
                let mut stuffed_len = data.len() - 3;
                stuffed[..stuffed_len].copy_from_slice(&data[3..]);

                let mut payload = [0u8; MAX_PAYLOAD];
                let payload_len = loop {
                    match crc::unstuff(&stuffed[..stuffed_len], &mut payload) {
                        Ok(n) => break n,
                        // Only "ran out of bytes" warrants pulling another
                        // continuation frame. A `0x00` marker or an
                        // over-capacity result means the stream is corrupt,
                        // not incomplete, and must fail immediately rather
                        // than be swallowed until the deadline times out.
                        Err(crc::UnstuffError::Truncated) => {
                            let remaining = deadline.saturating_duration_since(Instant::now());
                            if remaining.is_zero() {
                                return Err(CanError::Timeout);
                            }
                            let cont = self.transport().receive(remaining)?;
                            let cont_fields = ident::parse_rpc(cont.can_id)?;
                            if cont_fields.frame_type != continuation_type
                                || cont_fields.sender != fields.sender
                                || cont_fields.target != fields.target
                                || cont_fields.nonce != fields.nonce
                            {
                                return Err(CanError::Protocol(
                                    "unexpected frame while reassembling RPC payload",
                                ));
                            }
                            if stuffed_len + cont.dlc() > MAX_STUFFED {
                                return Err(CanError::Encoding("RPC payload exceeds stuffed cap"));
                            }
                            stuffed[stuffed_len..stuffed_len + cont.dlc()]
                                .copy_from_slice(cont.data());
                            stuffed_len += cont.dlc();
                        }
                        Err(e) => return Err(e.into()),
                    }
                };

                let mut crc_data = [0u8; MAX_STUFFED + 1];
                crc_data[0] = header_byte;
                crc_data[1..1 + stuffed_len].copy_from_slice(&stuffed[..stuffed_len]);
                if crc::crc16(&crc_data[..1 + stuffed_len]) != expected_crc {
                    return Err(CanError::Protocol("RPC CRC16 mismatch"));
                }

                RpcKind::Start {
                    is_return: fields.frame_type == RpcFrameType::StartReturn,
                    is_synchronous,
                    procedure_id,
                    payload: payload[..payload_len].to_vec(),
                }
            }
            RpcFrameType::TxData | RpcFrameType::RxData => {
                return Err(CanError::Protocol(
                    "continuation frame received outside of reassembly",
                ));
            }
        };

        Ok(RpcMessage {
            priority: fields.priority,
            sender: fields.sender,
            target: fields.target,
            nonce: fields.nonce,
            kind,
        })
    }

    /// Wait for exactly one `StartReturn` response, copying its reassembled
    /// payload into `buffer`. Fails with [`CanError::Protocol`] if the next
    /// RPC frame isn't a `StartReturn`, and with [`CanError::Encoding`] if
    /// the response is larger than `buffer` can hold.
    pub fn rpc_wait_response(
        &mut self,
        buffer: &mut [u8],
        timeout: Duration,
    ) -> Result<usize, CanError> {
        let response = self.rpc_receive(timeout)?;
        match response.kind {
            RpcKind::Start {
                is_return: true,
                payload,
                ..
            } => {
                if payload.len() > buffer.len() {
                    return Err(CanError::Encoding("RPC response exceeds caller's buffer"));
                }
                buffer[..payload.len()].copy_from_slice(&payload);
                Ok(payload.len())
            }
            _ => Err(CanError::Protocol(
                "expected an RPC StartReturn response",
            )),
        }
    }
}
