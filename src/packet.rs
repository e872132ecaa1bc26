//! Ethernet frames as carried in PACKET_IN and PACKET_OUT payloads.
//!
//! Parsing is layered: the Ethernet (and optional 802.1Q) header must be
//! complete or the frame is rejected, while network and transport headers
//! that fail to parse are kept as raw bytes in an `Unparsable` variant.

use std::io::{Cursor, Read, Write};
use std::net::Ipv4Addr;

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use crate::bits::test_bit;
use crate::error::{ensure_len, Result};

/// Broadcast hardware address.
pub const MAC_BROADCAST: u64 = 0xffff_ffff_ffff;

pub fn bytes_of_mac(addr: u64) -> [u8; 6] {
    let mut arr = [0; 6];
    for (i, b) in arr.iter_mut().enumerate() {
        *b = ((addr >> (8 * (5 - i))) & 0xff) as u8;
    }
    arr
}

pub fn mac_of_bytes(addr: [u8; 6]) -> u64 {
    addr.iter().fold(0, |acc, b| (acc << 8) | (*b as u64))
}

/// Colon-separated lower-case hex, e.g. `00:1b:21:3a:4f:10`.
pub fn format_mac(addr: u64) -> String {
    let b = bytes_of_mac(addr);
    format!(
        "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
        b[0], b[1], b[2], b[3], b[4], b[5]
    )
}

/// TCP Header flags.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct TcpFlags {
    /// ECN-nonce concealment protection.
    pub ns: bool,
    /// Congestion window reduced.
    pub cwr: bool,
    /// ECN-Echo.
    pub ece: bool,
    /// Indicates the Urgent pointer field is significant.
    pub urg: bool,
    /// Indicates that the Acknowledgment field is significant.
    pub ack: bool,
    /// Asks to push the buffered data to the receiving application.
    pub psh: bool,
    /// Reset the connection.
    pub rst: bool,
    /// Synchronize sequence numbers.
    pub syn: bool,
    /// No more data from sender.
    pub fin: bool,
}

impl TcpFlags {
    fn of_int(d: u16) -> TcpFlags {
        let d = d as u64;
        TcpFlags {
            fin: test_bit(0, d),
            syn: test_bit(1, d),
            rst: test_bit(2, d),
            psh: test_bit(3, d),
            ack: test_bit(4, d),
            urg: test_bit(5, d),
            ece: test_bit(6, d),
            cwr: test_bit(7, d),
            ns: test_bit(8, d),
        }
    }

    fn to_int(&self) -> u16 {
        [
            self.fin, self.syn, self.rst, self.psh, self.ack, self.urg, self.ece, self.cwr,
            self.ns,
        ]
        .iter()
        .enumerate()
        .fold(0, |acc, (i, set)| if *set { acc | (1 << i) } else { acc })
    }
}

/// TCP frame of a packet. Options are not retained.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Tcp {
    pub src: u16,
    pub dst: u16,
    pub seq: u32,
    pub ack: u32,
    pub offset: u8,
    pub flags: TcpFlags,
    pub window: u16,
    pub chksum: u16,
    pub urgent: u16,
    pub payload: Vec<u8>,
}

impl Tcp {
    const HEADER_LEN: usize = 20;

    fn parse(buf: &[u8]) -> Option<Tcp> {
        if buf.len() < Self::HEADER_LEN {
            return None;
        }
        let mut bytes = Cursor::new(buf);
        let src = bytes.read_u16::<BigEndian>().ok()?;
        let dst = bytes.read_u16::<BigEndian>().ok()?;
        let seq = bytes.read_u32::<BigEndian>().ok()?;
        let ack = bytes.read_u32::<BigEndian>().ok()?;
        let offset = bytes.read_u16::<BigEndian>().ok()?;
        let flags = TcpFlags::of_int(offset & 0x01ff);
        let offset = (offset >> 12) as u8 & 0x0f;
        let window = bytes.read_u16::<BigEndian>().ok()?;
        let chksum = bytes.read_u16::<BigEndian>().ok()?;
        let urgent = bytes.read_u16::<BigEndian>().ok()?;
        let data_start = offset as usize * 4;
        if data_start < Self::HEADER_LEN || data_start > buf.len() {
            return None;
        }
        Some(Tcp {
            src,
            dst,
            seq,
            ack,
            offset,
            flags,
            window,
            chksum,
            urgent,
            payload: buf[data_start..].to_vec(),
        })
    }

    fn marshal(&self, bytes: &mut Vec<u8>) -> Result<()> {
        bytes.write_u16::<BigEndian>(self.src)?;
        bytes.write_u16::<BigEndian>(self.dst)?;
        bytes.write_u32::<BigEndian>(self.seq)?;
        bytes.write_u32::<BigEndian>(self.ack)?;
        bytes.write_u16::<BigEndian>((5 << 12) | self.flags.to_int())?;
        bytes.write_u16::<BigEndian>(self.window)?;
        bytes.write_u16::<BigEndian>(self.chksum)?;
        bytes.write_u16::<BigEndian>(self.urgent)?;
        bytes.write_all(&self.payload)?;
        Ok(())
    }
}

/// UDP frame of a packet.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Udp {
    pub src: u16,
    pub dst: u16,
    pub chksum: u16,
    pub payload: Vec<u8>,
}

impl Udp {
    fn size_of() -> usize {
        8
    }

    fn parse(buf: &[u8]) -> Option<Udp> {
        if buf.len() < Self::size_of() {
            return None;
        }
        let mut bytes = Cursor::new(buf);
        let src = bytes.read_u16::<BigEndian>().ok()?;
        let dst = bytes.read_u16::<BigEndian>().ok()?;
        let _len = bytes.read_u16::<BigEndian>().ok()?;
        let chksum = bytes.read_u16::<BigEndian>().ok()?;
        Some(Udp {
            src,
            dst,
            chksum,
            payload: buf[Self::size_of()..].to_vec(),
        })
    }

    fn marshal(&self, bytes: &mut Vec<u8>) -> Result<()> {
        bytes.write_u16::<BigEndian>(self.src)?;
        bytes.write_u16::<BigEndian>(self.dst)?;
        bytes.write_u16::<BigEndian>((Self::size_of() + self.payload.len()) as u16)?;
        bytes.write_u16::<BigEndian>(self.chksum)?;
        bytes.write_all(&self.payload)?;
        Ok(())
    }
}

/// ICMP frame of a packet.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Icmp {
    pub typ: u8,
    pub code: u8,
    pub chksum: u16,
    pub payload: Vec<u8>,
}

impl Icmp {
    fn size_of() -> usize {
        4
    }

    fn parse(buf: &[u8]) -> Option<Icmp> {
        if buf.len() < Self::size_of() {
            return None;
        }
        let mut bytes = Cursor::new(buf);
        let typ = bytes.read_u8().ok()?;
        let code = bytes.read_u8().ok()?;
        let chksum = bytes.read_u16::<BigEndian>().ok()?;
        Some(Icmp {
            typ,
            code,
            chksum,
            payload: buf[Self::size_of()..].to_vec(),
        })
    }

    fn marshal(&self, bytes: &mut Vec<u8>) -> Result<()> {
        bytes.write_u8(self.typ)?;
        bytes.write_u8(self.code)?;
        bytes.write_u16::<BigEndian>(self.chksum)?;
        bytes.write_all(&self.payload)?;
        Ok(())
    }
}

/// Represents packets at the transport protocol level, which are encapsulated
/// within the IPv4 payload. At present, we only support TCP, UDP, and ICMP
/// explicitly; otherwise, the raw bytes and IPv4 protocol number are provided.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Tp {
    Tcp(Tcp),
    Udp(Udp),
    Icmp(Icmp),
    Unparsable(u8, Vec<u8>),
}

/// The type of IPv4 flags.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Flags {
    pub dont_fragment: bool,
    pub more_fragments: bool,
}

impl Flags {
    fn of_int(flags: u16) -> Flags {
        Flags {
            dont_fragment: test_bit(1, flags as u64),
            more_fragments: test_bit(0, flags as u64),
        }
    }

    fn to_int(&self) -> u16 {
        (if self.dont_fragment { 0b010 } else { 0 }) | (if self.more_fragments { 0b001 } else { 0 })
    }
}

/// IPv4 frame of a packet.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Ip {
    pub tos: u8,
    pub ident: u16,
    pub flags: Flags,
    pub frag: u16,
    pub ttl: u8,
    pub chksum: u16,
    pub src: u32,
    pub dst: u32,
    pub options: Vec<u8>,
    pub tp: Tp,
}

#[repr(u8)]
enum IpProto {
    IpICMP = 0x01,
    IpTCP = 0x06,
    IpUDP = 0x11,
}

impl Ip {
    const HEADER_LEN: usize = 20;

    /// Protocol number carried in the IPv4 header.
    pub fn proto(&self) -> u8 {
        match self.tp {
            Tp::Tcp(_) => IpProto::IpTCP as u8,
            Tp::Udp(_) => IpProto::IpUDP as u8,
            Tp::Icmp(_) => IpProto::IpICMP as u8,
            Tp::Unparsable(proto, _) => proto,
        }
    }

    pub fn src_addr(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.src)
    }

    pub fn dst_addr(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.dst)
    }

    fn parse(buf: &[u8]) -> Option<Ip> {
        if buf.len() < Self::HEADER_LEN {
            return None;
        }
        let mut bytes = Cursor::new(buf);
        let vhl = bytes.read_u8().ok()?;
        if (vhl >> 4) != 4 {
            return None;
        }
        let header_len = (vhl & 0x0f) as usize * 4;
        if header_len < Self::HEADER_LEN || header_len > buf.len() {
            return None;
        }
        let tos = bytes.read_u8().ok()?;
        let total_len = bytes.read_u16::<BigEndian>().ok()? as usize;
        if total_len < header_len {
            return None;
        }
        let ident = bytes.read_u16::<BigEndian>().ok()?;
        let frag = bytes.read_u16::<BigEndian>().ok()?;
        let flags = Flags::of_int(frag >> 13);
        let ttl = bytes.read_u8().ok()?;
        let proto = bytes.read_u8().ok()?;
        let chksum = bytes.read_u16::<BigEndian>().ok()?;
        let src = bytes.read_u32::<BigEndian>().ok()?;
        let dst = bytes.read_u32::<BigEndian>().ok()?;
        let options = buf[Self::HEADER_LEN..header_len].to_vec();
        // Ethernet minimum-size padding sits beyond the IPv4 total length.
        let body = &buf[header_len..total_len.min(buf.len())];
        let tp = match proto {
            t if t == (IpProto::IpICMP as u8) => Icmp::parse(body).map(Tp::Icmp),
            t if t == (IpProto::IpTCP as u8) => Tcp::parse(body).map(Tp::Tcp),
            t if t == (IpProto::IpUDP as u8) => Udp::parse(body).map(Tp::Udp),
            _ => None,
        }
        .unwrap_or_else(|| Tp::Unparsable(proto, body.to_vec()));
        Some(Ip {
            tos,
            ident,
            flags,
            frag: frag & 0x1fff,
            ttl,
            chksum,
            src,
            dst,
            options,
            tp,
        })
    }

    fn marshal(&self, bytes: &mut Vec<u8>) -> Result<()> {
        let mut body = vec![];
        match self.tp {
            Tp::Tcp(ref tcp) => tcp.marshal(&mut body)?,
            Tp::Udp(ref udp) => udp.marshal(&mut body)?,
            Tp::Icmp(ref icmp) => icmp.marshal(&mut body)?,
            Tp::Unparsable(_, ref raw) => body.write_all(raw)?,
        }
        let mut options = self.options.clone();
        options.resize((options.len() + 3) / 4 * 4, 0);
        let header_len = Self::HEADER_LEN + options.len();

        let mut header = Vec::with_capacity(header_len);
        header.write_u8(0x40 | (header_len / 4) as u8)?;
        header.write_u8(self.tos)?;
        header.write_u16::<BigEndian>((header_len + body.len()) as u16)?;
        header.write_u16::<BigEndian>(self.ident)?;
        header.write_u16::<BigEndian>((self.flags.to_int() << 13) | (self.frag & 0x1fff))?;
        header.write_u8(self.ttl)?;
        header.write_u8(self.proto())?;
        header.write_u16::<BigEndian>(0)?;
        header.write_u32::<BigEndian>(self.src)?;
        header.write_u32::<BigEndian>(self.dst)?;
        header.write_all(&options)?;
        let chksum = ipv4_checksum(&header);
        header[10..12].copy_from_slice(&chksum.to_be_bytes());

        bytes.write_all(&header)?;
        bytes.write_all(&body)?;
        Ok(())
    }
}

/// One's-complement checksum over an IPv4 header.
pub fn ipv4_checksum(header: &[u8]) -> u16 {
    let mut sum: u32 = header
        .chunks(2)
        .map(|c| ((c[0] as u32) << 8) | (*c.get(1).unwrap_or(&0) as u32))
        .sum();
    while sum > 0xffff {
        sum = (sum & 0xffff) + (sum >> 16);
    }
    !(sum as u16)
}

/// Address resolution protocol (ARP) packet payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Arp {
    pub oper: u16,
    pub sha: u64,
    pub spa: u32,
    pub tha: u64,
    pub tpa: u32,
}

impl Arp {
    const SIZE: usize = 28;

    fn parse(buf: &[u8]) -> Option<Arp> {
        if buf.len() < Self::SIZE {
            return None;
        }
        let mut bytes = Cursor::new(buf);
        bytes.set_position(6);
        let oper = bytes.read_u16::<BigEndian>().ok()?;
        let mut sha = [0; 6];
        bytes.read_exact(&mut sha).ok()?;
        let spa = bytes.read_u32::<BigEndian>().ok()?;
        let mut tha = [0; 6];
        bytes.read_exact(&mut tha).ok()?;
        let tpa = bytes.read_u32::<BigEndian>().ok()?;
        Some(Arp {
            oper,
            sha: mac_of_bytes(sha),
            spa,
            tha: mac_of_bytes(tha),
            tpa,
        })
    }

    fn marshal(&self, bytes: &mut Vec<u8>) -> Result<()> {
        bytes.write_u16::<BigEndian>(1)?;
        bytes.write_u16::<BigEndian>(EthTyp::EthTypIP as u16)?;
        bytes.write_u8(6)?;
        bytes.write_u8(4)?;
        bytes.write_u16::<BigEndian>(self.oper)?;
        bytes.write_all(&bytes_of_mac(self.sha))?;
        bytes.write_u32::<BigEndian>(self.spa)?;
        bytes.write_all(&bytes_of_mac(self.tha))?;
        bytes.write_u32::<BigEndian>(self.tpa)?;
        Ok(())
    }
}

/// Represents a packet at the network protocol level.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Nw {
    Ip(Ip),
    Arp(Arp),
    Unparsable(u16, Vec<u8>),
}

/// Represents a packet at the ethernet protocol level.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Packet {
    pub dl_src: u64,
    pub dl_dst: u64,
    /// Ethertype of the payload, after any 802.1Q tag.
    pub dl_typ: u16,
    pub dl_vlan: Option<u16>,
    pub dl_vlan_dei: bool,
    pub dl_vlan_pcp: u8,
    pub nw: Nw,
}

#[repr(u16)]
enum EthTyp {
    EthTypIP = 0x0800,
    EthTypARP = 0x0806,
    EthTypVLAN = 0x8100,
}

pub const ETH_TYPE_IP: u16 = EthTyp::EthTypIP as u16;
pub const ETH_TYPE_ARP: u16 = EthTyp::EthTypARP as u16;

impl Packet {
    const ETH_HEADER_LEN: usize = 14;
    const VLAN_TAG_LEN: usize = 4;

    /// Decode an Ethernet frame. Fails only when the link-layer header itself is
    /// incomplete; inner headers that do not parse are kept as `Unparsable`.
    pub fn parse(buf: &[u8]) -> Result<Packet> {
        ensure_len("ethernet header", buf, Self::ETH_HEADER_LEN)?;
        let mut bytes = Cursor::new(buf);
        let mut dst = [0; 6];
        let mut src = [0; 6];
        bytes.read_exact(&mut dst)?;
        bytes.read_exact(&mut src)?;
        let typ = bytes.read_u16::<BigEndian>()?;
        let (tag, dei, pcp, typ) = match typ {
            t if t == (EthTyp::EthTypVLAN as u16) => {
                ensure_len("802.1Q tag", buf, Self::ETH_HEADER_LEN + Self::VLAN_TAG_LEN)?;
                let tag_and_pcp = bytes.read_u16::<BigEndian>()?;
                let tag = tag_and_pcp & 0xfff;
                let dei = (tag_and_pcp & 0x1000) > 0;
                let pcp = tag_and_pcp >> 13;
                let typ = bytes.read_u16::<BigEndian>()?;
                (Some(tag), dei, pcp as u8, typ)
            }
            _ => (None, false, 0x0, typ),
        };
        let rest = &buf[bytes.position() as usize..];
        let nw = match typ {
            t if t == (EthTyp::EthTypIP as u16) => Ip::parse(rest).map(Nw::Ip),
            t if t == (EthTyp::EthTypARP as u16) => Arp::parse(rest).map(Nw::Arp),
            _ => None,
        }
        .unwrap_or_else(|| Nw::Unparsable(typ, rest.to_vec()));
        Ok(Packet {
            dl_src: mac_of_bytes(src),
            dl_dst: mac_of_bytes(dst),
            dl_typ: typ,
            dl_vlan: tag,
            dl_vlan_dei: dei,
            dl_vlan_pcp: pcp,
            nw,
        })
    }

    /// Encode the frame, recomputing IPv4 header checksum and lengths.
    pub fn marshal(&self) -> Result<Vec<u8>> {
        let mut bytes = vec![];
        bytes.write_all(&bytes_of_mac(self.dl_dst))?;
        bytes.write_all(&bytes_of_mac(self.dl_src))?;
        if let Some(tag) = self.dl_vlan {
            bytes.write_u16::<BigEndian>(EthTyp::EthTypVLAN as u16)?;
            let tci = ((self.dl_vlan_pcp as u16 & 0x7) << 13)
                | (if self.dl_vlan_dei { 0x1000 } else { 0 })
                | (tag & 0xfff);
            bytes.write_u16::<BigEndian>(tci)?;
        }
        bytes.write_u16::<BigEndian>(self.dl_typ)?;
        match self.nw {
            Nw::Ip(ref ip) => ip.marshal(&mut bytes)?,
            Nw::Arp(ref arp) => arp.marshal(&mut bytes)?,
            Nw::Unparsable(_, ref raw) => bytes.write_all(raw)?,
        }
        Ok(bytes)
    }

    /// A bare IPv4 datagram (no transport payload) between `src` and `dst`,
    /// framed with all-zero hardware addresses.
    pub fn ipv4_probe(src: Ipv4Addr, dst: Ipv4Addr) -> Packet {
        Packet {
            dl_src: 0,
            dl_dst: 0,
            dl_typ: EthTyp::EthTypIP as u16,
            dl_vlan: None,
            dl_vlan_dei: false,
            dl_vlan_pcp: 0,
            nw: Nw::Ip(Ip {
                tos: 0,
                ident: 0,
                flags: Flags::default(),
                frag: 0,
                ttl: 64,
                chksum: 0,
                src: src.into(),
                dst: dst.into(),
                options: vec![],
                tp: Tp::Unparsable(0, vec![]),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn eth_header(dst: [u8; 6], src: [u8; 6], typ: u16) -> Vec<u8> {
        let mut v = dst.to_vec();
        v.extend_from_slice(&src);
        v.extend_from_slice(&typ.to_be_bytes());
        v
    }

    #[test]
    fn mac_conversions_agree() {
        let bytes = [0x00, 0x1b, 0x21, 0x3a, 0x4f, 0x10];
        let mac = mac_of_bytes(bytes);
        assert_eq!(mac, 0x001b_213a_4f10);
        assert_eq!(bytes_of_mac(mac), bytes);
        assert_eq!(format_mac(mac), "00:1b:21:3a:4f:10");
    }

    #[test]
    fn short_frame_is_rejected() {
        assert!(Packet::parse(&[0xff; 13]).is_err());
    }

    #[test]
    fn truncated_vlan_tag_is_rejected() {
        let buf = eth_header([0xff; 6], [0x02; 6], 0x8100);
        assert!(Packet::parse(&buf).is_err());
    }

    #[test]
    fn parses_arp_request() {
        let mut buf = eth_header([0xff; 6], [0, 0, 0, 0, 0, 0x0a], 0x0806);
        buf.extend_from_slice(&[0x00, 0x01, 0x08, 0x00, 6, 4, 0x00, 0x01]);
        buf.extend_from_slice(&[0, 0, 0, 0, 0, 0x0a, 10, 0, 0, 1]);
        buf.extend_from_slice(&[0, 0, 0, 0, 0, 0, 10, 0, 0, 2]);
        let pkt = Packet::parse(&buf).unwrap();
        assert_eq!(pkt.dl_dst, MAC_BROADCAST);
        assert_eq!(pkt.dl_src, 0x0a);
        assert_eq!(
            pkt.nw,
            Nw::Arp(Arp {
                oper: 1,
                sha: 0x0a,
                spa: u32::from(Ipv4Addr::new(10, 0, 0, 1)),
                tha: 0,
                tpa: u32::from(Ipv4Addr::new(10, 0, 0, 2)),
            })
        );
    }

    #[test]
    fn truncated_arp_body_stays_unparsable() {
        let mut buf = eth_header([0xff; 6], [0x02; 6], 0x0806);
        buf.extend_from_slice(&[0x00, 0x01, 0x08, 0x00]);
        let pkt = Packet::parse(&buf).unwrap();
        assert_eq!(pkt.nw, Nw::Unparsable(0x0806, vec![0x00, 0x01, 0x08, 0x00]));
    }

    #[test]
    fn parses_vlan_tagged_udp_and_drops_padding() {
        let udp = Packet {
            dl_src: 0x02,
            dl_dst: 0x04,
            dl_typ: ETH_TYPE_IP,
            dl_vlan: Some(42),
            dl_vlan_dei: false,
            dl_vlan_pcp: 5,
            nw: Nw::Ip(Ip {
                tos: 0x10,
                ident: 7,
                flags: Flags {
                    dont_fragment: true,
                    more_fragments: false,
                },
                frag: 0,
                ttl: 64,
                chksum: 0,
                src: u32::from(Ipv4Addr::new(10, 0, 0, 1)),
                dst: u32::from(Ipv4Addr::new(10, 0, 0, 2)),
                options: vec![],
                tp: Tp::Udp(Udp {
                    src: 5353,
                    dst: 53,
                    chksum: 0,
                    payload: vec![1, 2, 3],
                }),
            }),
        };
        let mut buf = udp.marshal().unwrap();
        buf.extend_from_slice(&[0; 10]);
        let parsed = Packet::parse(&buf).unwrap();
        assert_eq!(parsed.dl_vlan, Some(42));
        assert_eq!(parsed.dl_vlan_pcp, 5);
        assert_eq!(parsed.dl_typ, ETH_TYPE_IP);
        match parsed.nw {
            Nw::Ip(ref ip) => {
                assert!(ip.flags.dont_fragment);
                assert_eq!(ip.proto(), 17);
                assert_eq!(ipv4_checksum(&buf[18..38]), 0);
                match ip.tp {
                    Tp::Udp(ref u) => {
                        assert_eq!((u.src, u.dst), (5353, 53));
                        assert_eq!(u.payload, vec![1, 2, 3]);
                    }
                    ref other => panic!("expected UDP, got {:?}", other),
                }
            }
            ref other => panic!("expected IPv4, got {:?}", other),
        }
    }

    #[test]
    fn tcp_flags_use_wire_bit_order() {
        let flags = TcpFlags::of_int(0x012);
        assert!(flags.syn && flags.ack);
        assert!(!flags.fin && !flags.ns);
        assert_eq!(flags.to_int(), 0x012);
    }

    #[test]
    fn ipv4_probe_has_valid_header() {
        let probe = Packet::ipv4_probe(Ipv4Addr::new(10, 0, 0, 1), Ipv4Addr::new(10, 0, 0, 3));
        let buf = probe.marshal().unwrap();
        assert_eq!(buf.len(), 14 + 20);
        assert_eq!(&buf[12..14], &[0x08, 0x00]);
        assert_eq!(buf[14], 0x45);
        assert_eq!(ipv4_checksum(&buf[14..]), 0);
        let parsed = Packet::parse(&buf).unwrap();
        match parsed.nw {
            Nw::Ip(ref ip) => {
                assert_eq!(ip.src_addr(), Ipv4Addr::new(10, 0, 0, 1));
                assert_eq!(ip.dst_addr(), Ipv4Addr::new(10, 0, 0, 3));
                assert_eq!(ip.ttl, 64);
                assert_eq!(ip.tp, Tp::Unparsable(0, vec![]));
            }
            ref other => panic!("expected IPv4, got {:?}", other),
        }
    }
}
