use byteorder::{BigEndian, ByteOrder, WriteBytesExt};

use crate::error::{Error, Result};
use crate::openflow0x01::MsgCode;

/// OpenFlow Header
///
/// The first fields of every OpenFlow message, no matter the protocol version.
/// This is parsed to determine version and length of the remaining message, so that
/// it can be properly handled.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct OfpHeader {
    version: u8,
    typ: u8,
    length: u16,
    xid: u32,
}

impl OfpHeader {
    /// Create an `OfpHeader` out of the arguments.
    pub fn new(version: u8, typ: u8, length: u16, xid: u32) -> OfpHeader {
        OfpHeader {
            version,
            typ,
            length,
            xid,
        }
    }

    /// Return the byte-size of an `OfpHeader`.
    pub fn size() -> usize {
        8
    }

    /// Fills a message buffer with the header fields of an `OfpHeader`.
    pub fn marshal(bytes: &mut Vec<u8>, header: OfpHeader) -> Result<()> {
        bytes.write_u8(header.version)?;
        bytes.write_u8(header.typ)?;
        bytes.write_u16::<BigEndian>(header.length)?;
        bytes.write_u32::<BigEndian>(header.xid)?;
        Ok(())
    }

    /// Takes a message buffer (sized for an `OfpHeader`) and returns an `OfpHeader`.
    pub fn parse(buf: [u8; 8]) -> Self {
        OfpHeader {
            version: buf[0],
            typ: buf[1],
            length: BigEndian::read_u16(&buf[2..4]),
            xid: BigEndian::read_u32(&buf[4..8]),
        }
    }

    /// Return the `version` field of a header.
    pub fn version(&self) -> u8 {
        self.version
    }

    /// Return the OpenFlow message type code of a header.
    pub fn type_code(&self) -> Result<MsgCode> {
        MsgCode::try_from(self.typ)
    }

    /// Return the `length` field of a header. Includes the length of the header itself.
    pub fn length(&self) -> usize {
        self.length as usize
    }

    /// Length of the message body following the header.
    pub fn body_length(&self) -> Result<usize> {
        self.length()
            .checked_sub(Self::size())
            .ok_or(Error::InvalidField {
                field: "header length",
                value: self.length as u32,
            })
    }

    /// Return the `xid` field of a header, the transaction id associated with this packet.
    ///  Replies use the same id to facilitate pairing.
    pub fn xid(&self) -> u32 {
        self.xid
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_network_order_fields() {
        let hdr = OfpHeader::parse([0x01, 10, 0x00, 0x20, 0x00, 0x00, 0x01, 0x02]);
        assert_eq!(hdr.version(), 0x01);
        assert_eq!(hdr.type_code().unwrap(), MsgCode::PacketIn);
        assert_eq!(hdr.length(), 32);
        assert_eq!(hdr.body_length().unwrap(), 24);
        assert_eq!(hdr.xid(), 0x0102);
    }

    #[test]
    fn short_length_is_rejected() {
        let hdr = OfpHeader::new(0x01, 0, 4, 0);
        assert!(hdr.body_length().is_err());
    }

    #[test]
    fn unknown_type_code_is_an_error() {
        let hdr = OfpHeader::new(0x01, 200, 8, 0);
        assert!(matches!(hdr.type_code(), Err(Error::UnknownMessageType(200))));
    }
}
