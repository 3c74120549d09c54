//! 29-bit extended CAN identifier layout for the four message families.
//!
//! Every family packs its fields into the same 29 bits differently; this
//! module is the single place that knows the bit offsets, so `rt`/`rpc`/
//! `ps`/`bw` never touch a shift or mask directly.

use crate::error::CanError;

/// Top-3-bit protocol tag, occupying bits 28-26 of the identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Rt,
    Rpc,
    PsHigh,
    Bw,
    PsLow,
}

impl Protocol {
    const fn tag(self) -> u32 {
        match self {
            Protocol::Rt => 0x00,
            Protocol::Rpc => 0x02,
            Protocol::PsHigh => 0x04,
            Protocol::Bw => 0x05,
            Protocol::PsLow => 0x06,
        }
    }

    /// Extract the protocol tag from a 29-bit identifier, rejecting the two
    /// 3-bit combinations ( `0x01`, `0x03`, `0x07` ) no family uses.
    pub fn from_can_id(can_id: u32) -> Result<Self, CanError> {
        match (can_id >> 26) & 0x07 {
            0x00 => Ok(Protocol::Rt),
            0x02 => Ok(Protocol::Rpc),
            0x04 => Ok(Protocol::PsHigh),
            0x05 => Ok(Protocol::Bw),
            0x06 => Ok(Protocol::PsLow),
            _ => Err(CanError::Protocol("unrecognized protocol tag")),
        }
    }
}

/// Four-level priority band shared by all families (2 bits).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Priority {
    #[default]
    High = 0,
    MedHigh = 1,
    MedLow = 2,
    Low = 3,
}

impl Priority {
    pub fn from_bits(bits: u32) -> Self {
        match bits & 0x03 {
            0 => Priority::High,
            1 => Priority::MedHigh,
            2 => Priority::MedLow,
            _ => Priority::Low,
        }
    }

    pub const fn bits(self) -> u32 {
        self as u32
    }
}

/// Node address `0x00` is the RT/PS broadcast address; `0x3F` is the PS
/// multicast ("all subscribers") address. Both are ordinary 6-bit values for
/// addressing purposes — callers decide when they're forbidden.
pub const BROADCAST_ADDRESS: u8 = 0x00;
pub const MULTICAST_ADDRESS: u8 = 0x3F;
pub const MAX_ADDRESS: u8 = 0x3F;

fn check_address(addr: u8) -> Result<u32, CanError> {
    if addr > MAX_ADDRESS {
        return Err(CanError::Argument("node address exceeds 6 bits"));
    }
    Ok(addr as u32)
}

/// RT frame type: bit 25 (0=ACK, 1=MSG).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RtFrameType {
    Ack = 0,
    Msg = 1,
}

pub struct RtFields {
    pub frame_type: RtFrameType,
    pub priority: Priority,
    pub sender: u8,
    pub target: u8,
}

/// Bits 28-26 protocol, bit 25 frame type, bits 24-23 priority, bits 21-16
/// sender, bits 15-10 target, bits 9-0 all-ones filler.
pub fn build_rt(fields: &RtFields) -> Result<u32, CanError> {
    let mut id = Protocol::Rt.tag() << 26;
    id |= (fields.frame_type as u32) << 25;
    id |= fields.priority.bits() << 23;
    id |= check_address(fields.sender)? << 16;
    id |= check_address(fields.target)? << 10;
    id |= 0x3FF;
    Ok(id)
}

pub fn parse_rt(can_id: u32) -> RtFields {
    let frame_type = if (can_id >> 25) & 0x01 != 0 {
        RtFrameType::Msg
    } else {
        RtFrameType::Ack
    };
    RtFields {
        frame_type,
        priority: Priority::from_bits(can_id >> 23),
        sender: ((can_id >> 16) & 0x3F) as u8,
        target: ((can_id >> 10) & 0x3F) as u8,
    }
}

/// RPC frame type: bits 25-22.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RpcFrameType {
    Ack = 0,
    Nack = 1,
    StartRpc = 2,
    StartReturn = 3,
    TxData = 4,
    RxData = 5,
}

impl RpcFrameType {
    fn from_bits(bits: u32) -> Result<Self, CanError> {
        match bits {
            0 => Ok(RpcFrameType::Ack),
            1 => Ok(RpcFrameType::Nack),
            2 => Ok(RpcFrameType::StartRpc),
            3 => Ok(RpcFrameType::StartReturn),
            4 => Ok(RpcFrameType::TxData),
            5 => Ok(RpcFrameType::RxData),
            _ => Err(CanError::Protocol("unrecognized RPC frame type")),
        }
    }
}

pub struct RpcFields {
    pub frame_type: RpcFrameType,
    pub priority: Priority,
    pub sender: u8,
    pub target: u8,
    pub nonce: u8,
}

/// Bits 28-26 protocol, bits 25-22 frame type, bits 21-20 priority, bits
/// 19-14 sender, bits 13-8 target, bits 7-0 nonce.
pub fn build_rpc(fields: &RpcFields) -> Result<u32, CanError> {
    let mut id = Protocol::Rpc.tag() << 26;
    id |= (fields.frame_type as u32 & 0x0F) << 22;
    id |= fields.priority.bits() << 20;
    id |= check_address(fields.sender)? << 14;
    id |= check_address(fields.target)? << 8;
    id |= fields.nonce as u32;
    Ok(id)
}

pub fn parse_rpc(can_id: u32) -> Result<RpcFields, CanError> {
    Ok(RpcFields {
        frame_type: RpcFrameType::from_bits((can_id >> 22) & 0x0F)?,
        priority: Priority::from_bits(can_id >> 20),
        sender: ((can_id >> 14) & 0x3F) as u8,
        target: ((can_id >> 8) & 0x3F) as u8,
        nonce: (can_id & 0xFF) as u8,
    })
}

/// PS frame type: bits 25-22, only PUB(1) and DATA(3) are valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PsFrameType {
    Pub = 1,
    Data = 3,
}

impl PsFrameType {
    fn from_bits(bits: u32) -> Result<Self, CanError> {
        match bits {
            1 => Ok(PsFrameType::Pub),
            3 => Ok(PsFrameType::Data),
            _ => Err(CanError::Protocol("unrecognized PS frame type")),
        }
    }
}

pub struct PsFields {
    pub high_priority: bool,
    pub frame_type: PsFrameType,
    pub priority: Priority,
    pub sender: u8,
    pub topic: u8,
}

/// Bits 28-26 protocol (high- or low-priority band), bits 25-22 frame type,
/// bits 21-20 priority, bits 19-14 sender, bits 13-6 topic, bits 5-0
/// all-ones filler.
pub fn build_ps(fields: &PsFields) -> Result<u32, CanError> {
    let protocol = if fields.high_priority {
        Protocol::PsHigh
    } else {
        Protocol::PsLow
    };
    let mut id = protocol.tag() << 26;
    id |= (fields.frame_type as u32 & 0x0F) << 22;
    id |= fields.priority.bits() << 20;
    id |= check_address(fields.sender)? << 14;
    id |= (fields.topic as u32) << 6;
    id |= 0x3F;
    Ok(id)
}

pub fn parse_ps(can_id: u32) -> Result<PsFields, CanError> {
    let high_priority = matches!(Protocol::from_can_id(can_id)?, Protocol::PsHigh);
    Ok(PsFields {
        high_priority,
        frame_type: PsFrameType::from_bits((can_id >> 22) & 0x0F)?,
        priority: Priority::from_bits(can_id >> 20),
        sender: ((can_id >> 14) & 0x3F) as u8,
        topic: ((can_id >> 6) & 0xFF) as u8,
    })
}

/// BW frame type: bits 25-22, only REPEAT(1), READY(3), DATA(7) are valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BwFrameType {
    Repeat = 1,
    Ready = 3,
    Data = 7,
}

impl BwFrameType {
    fn from_bits(bits: u32) -> Result<Self, CanError> {
        match bits {
            1 => Ok(BwFrameType::Repeat),
            3 => Ok(BwFrameType::Ready),
            7 => Ok(BwFrameType::Data),
            _ => Err(CanError::Protocol("unrecognized BW frame type")),
        }
    }
}

pub struct BwFields {
    pub frame_type: BwFrameType,
    pub priority: Priority,
    pub sender: u8,
    pub target: u8,
    pub class_mask: u8,
    /// DATA: repeat-of-this-chunk flag. READY: interrupt flag. REPEAT:
    /// repeat-entire-block flag.
    pub bit1: bool,
    /// DATA: parity bit, alternates per chunk. Otherwise always `true`.
    pub bit0: bool,
}

/// Bits 28-26 protocol, bits 25-22 frame type, bits 21-20 priority, bits
/// 19-14 sender, bits 13-8 target, bits 7-2 class mask, bit 1 and bit 0 as
/// documented on [`BwFields`].
pub fn build_bw(fields: &BwFields) -> Result<u32, CanError> {
    let mut id = Protocol::Bw.tag() << 26;
    id |= (fields.frame_type as u32 & 0x0F) << 22;
    id |= fields.priority.bits() << 20;
    id |= check_address(fields.sender)? << 14;
    id |= check_address(fields.target)? << 8;
    id |= (fields.class_mask as u32 & 0x3F) << 2;
    if fields.bit1 {
        id |= 0x02;
    }
    if fields.bit0 {
        id |= 0x01;
    }
    Ok(id)
}

pub fn parse_bw(can_id: u32) -> Result<BwFields, CanError> {
    Ok(BwFields {
        frame_type: BwFrameType::from_bits((can_id >> 22) & 0x0F)?,
        priority: Priority::from_bits(can_id >> 20),
        sender: ((can_id >> 14) & 0x3F) as u8,
        target: ((can_id >> 8) & 0x3F) as u8,
        class_mask: ((can_id >> 2) & 0x3F) as u8,
        bit1: can_id & 0x02 != 0,
        bit0: can_id & 0x01 != 0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rt_round_trip() {
        let fields = RtFields {
            frame_type: RtFrameType::Msg,
            priority: Priority::MedLow,
            sender: 0x12,
            target: 0x34,
        };
        let id = build_rt(&fields).unwrap();
        assert_eq!(id & 0x3FF, 0x3FF);
        let parsed = parse_rt(id);
        assert_eq!(parsed.frame_type, RtFrameType::Msg);
        assert_eq!(parsed.priority, Priority::MedLow);
        assert_eq!(parsed.sender, 0x12);
        assert_eq!(parsed.target, 0x34);
    }

    #[test]
    fn rpc_round_trip() {
        let fields = RpcFields {
            frame_type: RpcFrameType::StartRpc,
            priority: Priority::Low,
            sender: 0x01,
            target: 0x02,
            nonce: 0xAB,
        };
        let id = build_rpc(&fields).unwrap();
        let parsed = parse_rpc(id).unwrap();
        assert_eq!(parsed.frame_type, RpcFrameType::StartRpc);
        assert_eq!(parsed.nonce, 0xAB);
        assert_eq!(Protocol::from_can_id(id).unwrap(), Protocol::Rpc);
    }

    #[test]
    fn ps_round_trip_band_selection() {
        let fields = PsFields {
            high_priority: true,
            frame_type: PsFrameType::Pub,
            priority: Priority::High,
            sender: 0x05,
            topic: 0xCD,
        };
        let id = build_ps(&fields).unwrap();
        assert_eq!(Protocol::from_can_id(id).unwrap(), Protocol::PsHigh);
        let parsed = parse_ps(id).unwrap();
        assert!(parsed.high_priority);
        assert_eq!(parsed.topic, 0xCD);

        let low = PsFields {
            high_priority: false,
            ..fields
        };
        let id = build_ps(&low).unwrap();
        assert_eq!(Protocol::from_can_id(id).unwrap(), Protocol::PsLow);
    }

    #[test]
    fn bw_round_trip() {
        let fields = BwFields {
            frame_type: BwFrameType::Data,
            priority: Priority::MedHigh,
            sender: 0x03,
            target: 0x07,
            class_mask: 0x2A,
            bit1: false,
            bit0: true,
        };
        let id = build_bw(&fields).unwrap();
        let parsed = parse_bw(id).unwrap();
        assert_eq!(parsed.class_mask, 0x2A);
        assert!(parsed.bit0);
        assert!(!parsed.bit1);
    }

    #[test]
    fn oversize_address_rejected() {
        let fields = RtFields {
            frame_type: RtFrameType::Msg,
            priority: Priority::High,
            sender: 0x40,
            target: 0x00,
        };
        assert!(matches!(build_rt(&fields), Err(CanError::Argument(_))));
    }

    #[test]
    fn unrecognized_protocol_tag_rejected() {
        let id = 0x01u32 << 26;
        assert!(Protocol::from_can_id(id).is_err());
    }
}
