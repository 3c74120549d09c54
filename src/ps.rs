//! PS (publish/subscribe) messages: best-effort broadcast of a byte-stuffed,
//! CRC-16-checked payload to every subscriber of a topic, on a high- or
//! low-priority band.

use std::time::{Duration, Instant};

use tracing::trace;

use crate::context::Context;
use crate::crc;
use crate::error::CanError;
use crate::frame::{CanFrame, MAX_DATA_SIZE};
use crate::ident::{self, PsFields, PsFrameType, Priority};
use crate::transport::FrameTransport;

/// Unstuffed payload cap (`ARTIE_CAN_MAX_PUBSUB_PAYLOAD` in the original).
pub const MAX_PAYLOAD: usize = 2048;
pub const MAX_STUFFED: usize = 2048;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PsMessage {
    pub high_priority: bool,
    pub priority: Priority,
    pub sender: u8,
    pub topic: u8,
    pub payload: Vec<u8>,
}

impl<T: FrameTransport> Context<T> {
    /// Publish `payload` to `topic`, splitting across `PUB` + `DATA` frames
    /// as needed.
    pub fn ps_publish(
        &mut self,
        topic: u8,
        priority: Priority,
        high_priority: bool,
        payload: &[u8],
    ) -> Result<(), CanError> {
        if payload.len() > MAX_PAYLOAD {
            return Err(CanError::Argument("PS payload exceeds 2048 bytes"));
        }

        let mut stuffed = [0u8; MAX_STUFFED];
        let stuffed_len = crc::stuff(payload, &mut stuffed)?;
        let crc16 = crc::crc16(&stuffed[..stuffed_len]);

        let first_space = MAX_DATA_SIZE - 2;
        let first_chunk = stuffed_len.min(first_space);

        let mut first_data = [0u8; MAX_DATA_SIZE];
        first_data[0] = (crc16 >> 8) as u8;
        first_data[1] = (crc16 & 0xFF) as u8;
        first_data[2..2 + first_chunk].copy_from_slice(&stuffed[..first_chunk]);

        let can_id = ident::build_ps(&PsFields {
            high_priority,
            frame_type: PsFrameType::Pub,
            priority,
            sender: self.node_address(),
            topic,
        })?;
        self.transport()
            .send(&CanFrame::new(can_id, &first_data[..2 + first_chunk])?)?;
        trace!(topic, high_priority, "published PS PUB frame");

        let mut offset = first_chunk;
        while offset < stuffed_len {
            let chunk = (stuffed_len - offset).min(MAX_DATA_SIZE);
            let can_id = ident::build_ps(&PsFields {
                high_priority,
                frame_type: PsFrameType::Data,
                priority,
                sender: self.node_address(),
                topic,
            })?;
            self.transport()
                .send(&CanFrame::new(can_id, &stuffed[offset..offset + chunk])?)?;
            offset += chunk;
        }

        Ok(())
    }

    /// Receive the next publication, reassembling continuation `DATA`
    /// frames (matching sender and topic) until the stuffing terminator is
    /// found or `timeout` elapses, then verifying the CRC-16.
    pub fn ps_receive(&mut self, timeout: Duration) -> Result<PsMessage, CanError> {
        let deadline = Instant::now() + timeout;
        let frame = self.transport().receive(timeout)?;
        let protocol = frame.protocol()?;
        if !matches!(
            protocol,
            crate::ident::Protocol::PsHigh | crate::ident::Protocol::PsLow
        ) {
            return Err(CanError::Protocol("not a PS frame"));
        }
        let fields = ident::parse_ps(frame.can_id)?;
        if fields.frame_type != PsFrameType::Pub {
            return Err(CanError::Protocol(
                "continuation frame received outside of reassembly",
            ));
        }
        if frame.dlc() < 2 {
            return Err(CanError::Protocol("PS PUB frame shorter than 2 bytes"));
        }
        let data = frame.data();
        let expected_crc = u16::from_be_bytes([data[0], data[1]]);

        let mut stuffed = [0u8; MAX_STUFFED];
        let mut stuffed_len = data.len() - 2;
        stuffed[..stuffed_len].copy_from_slice(&data[2..]);

        let mut payload = [0u8; MAX_PAYLOAD];
        let payload_len = loop {
            match crc::unstuff(&stuffed[..stuffed_len], &mut payload) {
                Ok(n) => break n,
                // Only "ran out of bytes" warrants pulling another
                // continuation frame; a `0x00` marker or an over-capacity
                // result means the stream is corrupt, not incomplete, and
                // must fail immediately instead of being swallowed until
                // the deadline times out.
                Err(crc::UnstuffError::Truncated) => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    if remaining.is_zero() {
                        return Err(CanError::Timeout);
                    }
                    let cont = self.transport().receive(remaining)?;
                    let cont_fields = ident::parse_ps(cont.can_id)?;
                    if cont_fields.frame_type != PsFrameType::Data
                        || cont_fields.sender != fields.sender
                        || cont_fields.topic != fields.topic
                        || cont_fields.high_priority != fields.high_priority
                    {
                        return Err(CanError::Protocol(
                            "unexpected frame while reassembling PS payload",
                        ));
                    }
                    if stuffed_len + cont.dlc() > MAX_STUFFED {
                        return Err(CanError::Encoding("PS payload exceeds stuffed cap"));
                    }
                    stuffed[stuffed_len..stuffed_len + cont.dlc()].copy_from_slice(cont.data());
                    stuffed_len += cont.dlc();
                }
                Err(e) => return Err(e.into()),
            }
        };

        if crc::crc16(&stuffed[..stuffed_len]) != expected_crc {
            return Err(CanError::Protocol("PS CRC16 mismatch"));
        }

        Ok(PsMessage {
            high_priority: fields.high_priority,
            priority: fields.priority,
            sender: fields.sender,
            topic: fields.topic,
            payload: payload[..payload_len].to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::memory::memory_pair;

    #[test]
    fn single_frame_publish_round_trips() {
        let (a, b) = memory_pair();
        let mut ctx_a = Context::memory(0x01, a).unwrap();
        let mut ctx_b = Context::memory(0x02, b).unwrap();

        ctx_a
            .ps_publish(42, Priority::MedHigh, true, b"topic payload")
            .unwrap();
        let received = ctx_b.ps_receive(Duration::from_millis(50)).unwrap();
        assert_eq!(received.topic, 42);
        assert_eq!(received.payload, b"topic payload");
        assert!(received.high_priority);
    }

    #[test]
    fn band_selection_sets_protocol_tag() {
        let (a, _b) = memory_pair();
        let mut ctx = Context::memory(0x01, a).unwrap();
        ctx.ps_publish(1, Priority::High, true, &[]).unwrap();
        ctx.ps_publish(1, Priority::High, false, &[]).unwrap();
    }

    #[test]
    fn multi_frame_publish_reassembles() {
        let (a, b) = memory_pair();
        let mut ctx_a = Context::memory(0x01, a).unwrap();
        let mut ctx_b = Context::memory(0x02, b).unwrap();

        // Kept small enough that the whole publication fits in the
        // in-memory transport's 32-frame queue before the receiver drains
        // it (publish here runs to completion before receive starts).
        let payload: Vec<u8> = (0..200u16).map(|i| (i % 256) as u8).collect();
        ctx_a.ps_publish(7, Priority::Low, false, &payload).unwrap();
        let received = ctx_b.ps_receive(Duration::from_millis(100)).unwrap();
        assert_eq!(received.payload, payload);
    }

    #[test]
    fn oversize_payload_rejected() {
        let (a, _b) = memory_pair();
        let mut ctx = Context::memory(0x01, a).unwrap();
        let data = vec![0u8; MAX_PAYLOAD + 1];
        assert!(matches!(
            ctx.ps_publish(1, Priority::High, true, &data),
            Err(CanError::Argument(_))
        ));
    }
}
