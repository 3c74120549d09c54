//! The wire-level unit every [`crate::transport::FrameTransport`] moves:
//! a 29-bit extended CAN identifier plus up to 8 data bytes.

use crate::error::CanError;
use crate::ident::Protocol;

/// Maximum payload a single CAN frame can carry.
pub const MAX_DATA_SIZE: usize = 8;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CanFrame {
    pub can_id: u32,
    dlc: usize,
    data: [u8; MAX_DATA_SIZE],
}

impl CanFrame {
    pub fn new(can_id: u32, data: &[u8]) -> Result<Self, CanError> {
        if data.len() > MAX_DATA_SIZE {
            return Err(CanError::Argument("frame data exceeds 8 bytes"));
        }
        let mut buf = [0u8; MAX_DATA_SIZE];
        buf[..data.len()].copy_from_slice(data);
        Ok(Self {
            can_id,
            dlc: data.len(),
            data: buf,
        })
    }

    #[inline]
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data[..self.dlc]
    }

    #[inline]
    #[must_use]
    pub fn dlc(&self) -> usize {
        self.dlc
    }

    #[inline]
    pub fn protocol(&self) -> Result<Protocol, CanError> {
        Protocol::from_can_id(self.can_id)
    }
}

impl serde::Serialize for CanFrame {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;
        let mut state = serializer.serialize_struct("CanFrame", 3)?;
        state.serialize_field("can_id", &format!("{:#010X}", self.can_id))?;
        state.serialize_field("dlc", &self.dlc)?;
        state.serialize_field("data", &hex::encode_upper(self.data()))?;
        state.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_oversize_data() {
        let data = [0u8; 9];
        assert!(matches!(
            CanFrame::new(0, &data),
            Err(CanError::Argument(_))
        ));
    }

    #[test]
    fn exposes_only_dlc_bytes() {
        let frame = CanFrame::new(0x1234, &[1, 2, 3]).unwrap();
        assert_eq!(frame.data(), &[1, 2, 3]);
        assert_eq!(frame.dlc(), 3);
    }
}
