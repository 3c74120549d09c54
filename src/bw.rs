//! BW (block write) messages: address-tagged bulk transfer with a CRC-24
//! `READY` header, raw `DATA` chunks, and caller-driven `REPEAT` recovery.
//!
//! Unlike RT/RPC/PS, reassembly of a block's `DATA` chunks into one buffer,
//! gap detection, and issuing `REPEAT` requests are left to the caller —
//! `bw_receive` hands back exactly one frame's worth of information per
//! call, same as the original library.

use tracing::trace;

use crate::context::Context;
use crate::crc;
use crate::error::CanError;
use crate::frame::{CanFrame, MAX_DATA_SIZE};
use crate::ident::{self, BwFields, BwFrameType, Priority};
use crate::transport::FrameTransport;
use std::time::Duration;

pub const MAX_STUFFED: usize = 2048;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BwKind {
    Repeat {
        repeat_all: bool,
    },
    Ready {
        interrupt: bool,
        class_mask: u8,
        crc24: u32,
        address: u32,
        /// 0 or 1 stuffed bytes, carried alongside the READY header.
        payload: Vec<u8>,
    },
    Data {
        class_mask: u8,
        is_repeat: bool,
        parity: bool,
        payload: Vec<u8>,
    },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BwMessage {
    pub priority: Priority,
    pub sender: u8,
    pub target: u8,
    pub kind: BwKind,
}

impl<T: FrameTransport> Context<T> {
    /// Send a `READY` frame announcing a block write at `address`, then the
    /// first `DATA` frames if the byte-stuffed payload doesn't fit in the
    /// READY frame's single spare byte.
    pub fn bw_send_ready(
        &mut self,
        target: u8,
        class_mask: u8,
        priority: Priority,
        address: u32,
        payload: &[u8],
        interrupt: bool,
    ) -> Result<(), CanError> {
        // An empty payload skips byte-stuffing entirely here rather than
        // producing the usual single `0xFF` terminator (§4.1's general
        // encoding contract): the READY frame has no stuffed byte to carry
        // in that case, and the CRC is taken over the address alone.
        let mut stuffed = [0u8; MAX_STUFFED];
        let stuffed_len = if payload.is_empty() {
            0
        } else {
            crc::stuff(payload, &mut stuffed)?
        };

        let mut crc_data = [0u8; MAX_STUFFED + 4];
        crc_data[0..4].copy_from_slice(&address.to_be_bytes());
        crc_data[4..4 + stuffed_len].copy_from_slice(&stuffed[..stuffed_len]);
        let crc24 = crc::crc24(&crc_data[..4 + stuffed_len]);

        let mut frame_data = [0u8; MAX_DATA_SIZE];
        frame_data[0] = ((crc24 >> 16) & 0xFF) as u8;
        frame_data[1] = ((crc24 >> 8) & 0xFF) as u8;
        frame_data[2] = (crc24 & 0xFF) as u8;
        frame_data[3..7].copy_from_slice(&address.to_be_bytes());

        let dlc = if stuffed_len > 0 {
            frame_data[7] = stuffed[0];
            8
        } else {
            7
        };

        let can_id = ident::build_bw(&BwFields {
            frame_type: BwFrameType::Ready,
            priority,
            sender: self.node_address(),
            target,
            class_mask,
            bit1: interrupt,
            bit0: true,
        })?;
        self.transport()
            .send(&CanFrame::new(can_id, &frame_data[..dlc])?)?;
        trace!(target, address, "sent BW READY frame");

        if stuffed_len > 1 {
            self.bw_send_data(target, class_mask, priority, &stuffed[1..stuffed_len])?;
        }

        Ok(())
    }

    /// Send already-stuffed payload bytes as a sequence of `DATA` frames,
    /// alternating the parity bit starting from `false`.
    pub fn bw_send_data(
        &mut self,
        target: u8,
        class_mask: u8,
        priority: Priority,
        stuffed_payload: &[u8],
    ) -> Result<(), CanError> {
        let mut parity = false;
        let mut offset = 0;
        while offset < stuffed_payload.len() {
            let chunk = (stuffed_payload.len() - offset).min(MAX_DATA_SIZE);
            let can_id = ident::build_bw(&BwFields {
                frame_type: BwFrameType::Data,
                priority,
                sender: self.node_address(),
                target,
                class_mask,
                bit1: false,
                bit0: parity,
            })?;
            self.transport()
                .send(&CanFrame::new(can_id, &stuffed_payload[offset..offset + chunk])?)?;
            offset += chunk;
            parity = !parity;
        }
        Ok(())
    }

    pub fn bw_send_repeat(
        &mut self,
        target: u8,
        priority: Priority,
        repeat_all: bool,
    ) -> Result<(), CanError> {
        let can_id = ident::build_bw(&BwFields {
            frame_type: BwFrameType::Repeat,
            priority,
            sender: self.node_address(),
            target,
            class_mask: 0,
            bit1: repeat_all,
            bit0: false,
        })?;
        self.transport().send(&CanFrame::new(can_id, &[])?)
    }

    /// Receive exactly one BW frame, translated into its fields. Does not
    /// reassemble a block across frames or detect gaps — the caller owns
    /// that, issuing `bw_send_repeat` as needed.
    pub fn bw_receive(&mut self, timeout: Duration) -> Result<BwMessage, CanError> {
        let frame = self.transport().receive(timeout)?;
        if !matches!(frame.protocol(), Ok(crate::ident::Protocol::Bw)) {
            return Err(CanError::Protocol("not a BW frame"));
        }
        let fields = ident::parse_bw(frame.can_id)?;

        let kind = match fields.frame_type {
            BwFrameType::Repeat => BwKind::Repeat {
                repeat_all: fields.bit1,
            },
            BwFrameType::Ready => {
                if frame.dlc() < 7 {
                    return Err(CanError::Protocol("BW READY frame shorter than 7 bytes"));
                }
                let data = frame.data();
                let crc24 = ((data[0] as u32) << 16) | ((data[1] as u32) << 8) | data[2] as u32;
                let address = u32::from_be_bytes([data[3], data[4], data[5], data[6]]);
                let payload = if frame.dlc() > 7 {
                    vec![data[7]]
                } else {
                    Vec::new()
                };
                BwKind::Ready {
                    interrupt: fields.bit1,
                    class_mask: fields.class_mask,
                    crc24,
                    address,
                    payload,
                }
            }
            BwFrameType::Data => BwKind::Data {
                class_mask: fields.class_mask,
                is_repeat: fields.bit1,
                parity: fields.bit0,
                payload: frame.data().to_vec(),
            },
        };

        Ok(BwMessage {
            priority: fields.priority,
            sender: fields.sender,
            target: fields.target,
            kind,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::memory::memory_pair;

    #[test]
    fn ready_frame_round_trips_header_fields() {
        let (a, b) = memory_pair();
        let mut ctx_a = Context::memory(0x01, a).unwrap();
        let mut ctx_b = Context::memory(0x02, b).unwrap();

        ctx_a
            .bw_send_ready(0x02, 0x00, Priority::High, 0xDEAD_BEEF, &[], true)
            .unwrap();
        let msg = ctx_b.bw_receive(Duration::from_millis(50)).unwrap();
        match msg.kind {
            BwKind::Ready {
                interrupt,
                address,
                ref payload,
                ..
            } => {
                assert!(interrupt);
                assert_eq!(address, 0xDEAD_BEEF);
                // Empty input payload skips stuffing, so there's no
                // trailing stuffed byte at all (DLC 7, not 8).
                assert!(payload.is_empty());
            }
            _ => panic!("expected Ready"),
        }
    }

    #[test]
    fn ready_header_matches_fixed_vector() {
        let (a, b) = memory_pair();
        let mut ctx_a = Context::memory(0x01, a).unwrap();
        let mut ctx_b = Context::memory(0x02, b).unwrap();

        ctx_a
            .bw_send_ready(0x02, 0x00, Priority::High, 0xCAFE_BABE, &[0xAA], false)
            .unwrap();
        let msg = ctx_b.bw_receive(Duration::from_millis(50)).unwrap();
        match msg.kind {
            BwKind::Ready {
                crc24,
                address,
                ref payload,
                ..
            } => {
                assert_eq!(address, 0xCAFE_BABE);
                let mut stuffed = [0u8; 16];
                let stuffed_len = crc::stuff(&[0xAA], &mut stuffed).unwrap();
                let mut crc_input = Vec::new();
                crc_input.extend_from_slice(&0xCAFE_BABEu32.to_be_bytes());
                crc_input.extend_from_slice(&stuffed[..stuffed_len]);
                assert_eq!(crc24, crc::crc24(&crc_input));
                assert_eq!(payload, &stuffed[..1]);
            }
            _ => panic!("expected Ready"),
        }
    }

    #[test]
    fn data_parity_alternates_across_chunks() {
        let (a, b) = memory_pair();
        let mut ctx_a = Context::memory(0x01, a).unwrap();
        let mut ctx_b = Context::memory(0x02, b).unwrap();

        let payload = vec![0xAB; 20];
        ctx_a
            .bw_send_data(0x02, 0x00, Priority::High, &payload)
            .unwrap();

        let first = ctx_b.bw_receive(Duration::from_millis(50)).unwrap();
        let second = ctx_b.bw_receive(Duration::from_millis(50)).unwrap();
        let (BwKind::Data { parity: p0, .. }, BwKind::Data { parity: p1, .. }) =
            (first.kind, second.kind)
        else {
            panic!("expected Data frames");
        };
        assert_ne!(p0, p1);
    }

    #[test]
    fn repeat_carries_repeat_all_flag() {
        let (a, b) = memory_pair();
        let mut ctx_a = Context::memory(0x01, a).unwrap();
        let mut ctx_b = Context::memory(0x02, b).unwrap();

        ctx_a.bw_send_repeat(0x02, Priority::Low, true).unwrap();
        let msg = ctx_b.bw_receive(Duration::from_millis(50)).unwrap();
        assert_eq!(msg.kind, BwKind::Repeat { repeat_all: true });
    }
}
