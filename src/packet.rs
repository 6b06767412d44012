//! Zero-copy views over HCI packet buffers.
//!
//! All multi-byte fields are little endian. A view is only created when the buffer holds the
//! whole header plus the parameter or payload length declared in it, so field accesses within
//! the declared length cannot go out of bounds.
use crate::Error;

pub(crate) const COMMAND_HEADER_LEN: usize = 3;
pub(crate) const EVENT_HEADER_LEN: usize = 2;
pub(crate) const ACL_HEADER_LEN: usize = 4;

fn read_u16(buf: &[u8], pos: usize) -> Result<u16, Error> {
    match buf.get(pos..pos + 2) {
        Some(b) => Ok(u16::from_le_bytes([b[0], b[1]])),
        None => Err(Error::Truncated),
    }
}

fn write_u16(buf: &mut [u8], pos: usize, value: u16) -> Result<(), Error> {
    match buf.get_mut(pos..pos + 2) {
        Some(b) => {
            b.copy_from_slice(&value.to_le_bytes());
            Ok(())
        }
        None => Err(Error::Truncated),
    }
}

/// A Host to Controller command: opcode, parameter length, parameters.
pub struct CommandPacket<'d> {
    data: &'d mut [u8],
}

impl<'d> CommandPacket<'d> {
    pub fn new(data: &'d mut [u8]) -> Result<Self, Error> {
        if data.len() < COMMAND_HEADER_LEN || data.len() < COMMAND_HEADER_LEN + data[2] as usize {
            return Err(Error::Truncated);
        }
        Ok(Self { data })
    }

    pub fn opcode(&self) -> u16 {
        u16::from_le_bytes([self.data[0], self.data[1]])
    }

    pub fn param_len(&self) -> usize {
        self.data[2] as usize
    }

    pub fn params(&self) -> &[u8] {
        &self.data[COMMAND_HEADER_LEN..COMMAND_HEADER_LEN + self.param_len()]
    }

    /// Read a 16-bit parameter at `offset` from the start of the parameters.
    pub fn read_u16(&self, offset: usize) -> Result<u16, Error> {
        read_u16(self.params(), offset)
    }

    pub fn write_u16(&mut self, offset: usize, value: u16) -> Result<(), Error> {
        let len = self.param_len();
        write_u16(&mut self.data[COMMAND_HEADER_LEN..COMMAND_HEADER_LEN + len], offset, value)
    }

    /// Header plus declared parameters, the span to flush after a rewrite.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data[..COMMAND_HEADER_LEN + self.param_len()]
    }
}

/// A Controller to Host event: event code, parameter length, parameters.
pub struct EventPacket<'d> {
    data: &'d mut [u8],
}

impl<'d> EventPacket<'d> {
    pub fn new(data: &'d mut [u8]) -> Result<Self, Error> {
        if data.len() < EVENT_HEADER_LEN || data.len() < EVENT_HEADER_LEN + data[1] as usize {
            return Err(Error::Truncated);
        }
        Ok(Self { data })
    }

    pub fn code(&self) -> u8 {
        self.data[0]
    }

    pub fn param_len(&self) -> usize {
        self.data[1] as usize
    }

    pub fn params(&self) -> &[u8] {
        &self.data[EVENT_HEADER_LEN..EVENT_HEADER_LEN + self.param_len()]
    }

    pub fn read_u8(&self, offset: usize) -> Result<u8, Error> {
        self.params().get(offset).copied().ok_or(Error::Truncated)
    }

    pub fn read_u16(&self, offset: usize) -> Result<u16, Error> {
        read_u16(self.params(), offset)
    }

    pub fn write_u16(&mut self, offset: usize, value: u16) -> Result<(), Error> {
        let len = self.param_len();
        write_u16(&mut self.data[EVENT_HEADER_LEN..EVENT_HEADER_LEN + len], offset, value)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data[..EVENT_HEADER_LEN + self.param_len()]
    }
}

/// An ACL data packet: packed handle and flags, payload length, payload.
pub struct AclPacket<'d> {
    data: &'d mut [u8],
}

impl<'d> AclPacket<'d> {
    pub fn new(data: &'d mut [u8]) -> Result<Self, Error> {
        if data.len() < ACL_HEADER_LEN {
            return Err(Error::Truncated);
        }
        let len = u16::from_le_bytes([data[2], data[3]]) as usize;
        if data.len() < ACL_HEADER_LEN + len {
            return Err(Error::Truncated);
        }
        Ok(Self { data })
    }

    fn raw_handle(&self) -> u16 {
        u16::from_le_bytes([self.data[0], self.data[1]])
    }

    /// The 12-bit connection handle.
    pub fn handle(&self) -> u16 {
        self.raw_handle() & 0x0FFF
    }

    /// Packet boundary and broadcast flags, still in bit positions 12..16.
    pub fn flags(&self) -> u16 {
        self.raw_handle() & 0xF000
    }

    pub fn boundary_flag(&self) -> u8 {
        ((self.raw_handle() >> 12) & 0b11) as u8
    }

    pub fn broadcast_flag(&self) -> u8 {
        ((self.raw_handle() >> 14) & 0b11) as u8
    }

    /// Replace the connection handle, keeping both flags.
    pub fn set_handle(&mut self, handle: u16) {
        let raw = (handle & 0x0FFF) | self.flags();
        self.data[..2].copy_from_slice(&raw.to_le_bytes());
    }

    pub fn payload_len(&self) -> usize {
        u16::from_le_bytes([self.data[2], self.data[3]]) as usize
    }

    pub fn payload(&self) -> &[u8] {
        &self.data[ACL_HEADER_LEN..ACL_HEADER_LEN + self.payload_len()]
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data[..ACL_HEADER_LEN + self.payload_len()]
    }
}
