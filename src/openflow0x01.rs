use std::io::{Cursor, Read, Write};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use crate::bits::{bit, pack_bits, test_bit};
use crate::error::{ensure_len, Error, Result};
use crate::packet::{bytes_of_mac, mac_of_bytes, Nw, Packet, Tp};

/// Protocol version byte for OpenFlow 1.0.
pub const OFP_VERSION: u8 = 0x01;

/// Priority used by flows that do not ask for one (`OFP_DEFAULT_PRIORITY`).
pub const DEFAULT_PRIORITY: u16 = 0x8000;

/// OpenFlow 1.0 message type codes, used by headers to identify meaning of the rest of a message.
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MsgCode {
    Hello,
    Error,
    EchoReq,
    EchoResp,
    Vendor,
    FeaturesReq,
    FeaturesResp,
    GetConfigReq,
    GetConfigResp,
    SetConfig,
    PacketIn,
    FlowRemoved,
    PortStatus,
    PacketOut,
    FlowMod,
    PortMod,
    StatsReq,
    StatsResp,
    BarrierReq,
    BarrierResp,
    QueueGetConfigReq,
    QueueGetConfigResp,
}

impl TryFrom<u8> for MsgCode {
    type Error = Error;

    fn try_from(typ: u8) -> Result<MsgCode> {
        const CODES: [MsgCode; 22] = [
            MsgCode::Hello,
            MsgCode::Error,
            MsgCode::EchoReq,
            MsgCode::EchoResp,
            MsgCode::Vendor,
            MsgCode::FeaturesReq,
            MsgCode::FeaturesResp,
            MsgCode::GetConfigReq,
            MsgCode::GetConfigResp,
            MsgCode::SetConfig,
            MsgCode::PacketIn,
            MsgCode::FlowRemoved,
            MsgCode::PortStatus,
            MsgCode::PacketOut,
            MsgCode::FlowMod,
            MsgCode::PortMod,
            MsgCode::StatsReq,
            MsgCode::StatsResp,
            MsgCode::BarrierReq,
            MsgCode::BarrierResp,
            MsgCode::QueueGetConfigReq,
            MsgCode::QueueGetConfigResp,
        ];
        CODES
            .get(typ as usize)
            .copied()
            .ok_or(Error::UnknownMessageType(typ))
    }
}

/// Common API for message types implementing OpenFlow Message Codes (see `MsgCode` enum).
pub trait MessageType: Sized {
    /// Return the byte-size of a message.
    fn size_of(msg: &Self) -> usize;
    /// Parse a buffer into a message.
    fn parse(buf: &[u8]) -> Result<Self>;
    /// Marshal a message into a `u8` buffer.
    fn marshal(msg: Self, bytes: &mut Vec<u8>) -> Result<()>;
}

/// A value with an optional count of wildcarded low-order bits.
///
/// `mask: None` is an exact match.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Mask<T> {
    pub value: T,
    pub mask: Option<T>,
}

/// Fields to match against flows. `None` wildcards a field.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Pattern {
    pub dl_src: Option<u64>,
    pub dl_dst: Option<u64>,
    pub dl_typ: Option<u16>,
    /// `Some(None)` matches untagged frames only.
    pub dl_vlan: Option<Option<u16>>,
    pub dl_vlan_pcp: Option<u8>,
    pub nw_src: Option<Mask<u32>>,
    pub nw_dst: Option<Mask<u32>>,
    pub nw_proto: Option<u8>,
    pub nw_tos: Option<u8>,
    pub tp_src: Option<u16>,
    pub tp_dst: Option<u16>,
    pub in_port: Option<u16>,
}

#[repr(u32)]
enum OfpFlowWildcards {
    InPort = 0,
    DlVlan = 1,
    DlSrc = 2,
    DlDst = 3,
    DlType = 4,
    NwProto = 5,
    TpSrc = 6,
    TpDst = 7,
    NwSrcShift = 8,
    NwDstShift = 14,
    DlVlanPcp = 20,
    NwTos = 21,
}

const OFP_VLAN_NONE: u16 = 0xffff;

impl Pattern {
    /// A pattern matching every packet.
    pub fn match_all() -> Pattern {
        Pattern::default()
    }

    /// Exact match on every header field decoded from `pkt`. The ingress port
    /// is left wildcarded.
    pub fn from_packet(pkt: &Packet) -> Pattern {
        let mut pat = Pattern {
            dl_src: Some(pkt.dl_src),
            dl_dst: Some(pkt.dl_dst),
            dl_typ: Some(pkt.dl_typ),
            dl_vlan: Some(pkt.dl_vlan),
            dl_vlan_pcp: Some(pkt.dl_vlan_pcp),
            ..Pattern::default()
        };
        let exact = |value| Some(Mask { value, mask: None });
        match pkt.nw {
            Nw::Ip(ref ip) => {
                pat.nw_src = exact(ip.src);
                pat.nw_dst = exact(ip.dst);
                pat.nw_proto = Some(ip.proto());
                pat.nw_tos = Some(ip.tos);
                match ip.tp {
                    Tp::Tcp(ref tcp) => {
                        pat.tp_src = Some(tcp.src);
                        pat.tp_dst = Some(tcp.dst);
                    }
                    Tp::Udp(ref udp) => {
                        pat.tp_src = Some(udp.src);
                        pat.tp_dst = Some(udp.dst);
                    }
                    Tp::Icmp(ref icmp) => {
                        pat.tp_src = Some(icmp.typ as u16);
                        pat.tp_dst = Some(icmp.code as u16);
                    }
                    Tp::Unparsable(..) => (),
                }
            }
            Nw::Arp(ref arp) => {
                if arp.oper <= 0xff {
                    pat.nw_proto = Some(arp.oper as u8);
                }
                pat.nw_src = exact(arp.spa);
                pat.nw_dst = exact(arp.tpa);
            }
            Nw::Unparsable(..) => (),
        }
        pat
    }

    pub fn size_of() -> usize {
        40
    }

    fn nw_wildcard_bits(m: &Option<Mask<u32>>) -> u32 {
        match *m {
            None => 32,
            Some(Mask { mask, .. }) => mask.unwrap_or(0).min(32),
        }
    }

    fn nw_of_wildcard_bits(value: u32, bits: u32) -> Option<Mask<u32>> {
        match bits {
            0 => Some(Mask { value, mask: None }),
            n if n >= 32 => None,
            n => Some(Mask {
                value,
                mask: Some(n),
            }),
        }
    }

    fn wildcards(&self) -> u32 {
        use OfpFlowWildcards::*;
        let mut w = 0u64;
        w = bit(InPort as u64, w, self.in_port.is_none());
        w = bit(DlVlan as u64, w, self.dl_vlan.is_none());
        w = bit(DlSrc as u64, w, self.dl_src.is_none());
        w = bit(DlDst as u64, w, self.dl_dst.is_none());
        w = bit(DlType as u64, w, self.dl_typ.is_none());
        w = bit(NwProto as u64, w, self.nw_proto.is_none());
        w = bit(TpSrc as u64, w, self.tp_src.is_none());
        w = bit(TpDst as u64, w, self.tp_dst.is_none());
        w = bit(DlVlanPcp as u64, w, self.dl_vlan_pcp.is_none());
        w = bit(NwTos as u64, w, self.nw_tos.is_none());
        w |= (Self::nw_wildcard_bits(&self.nw_src) as u64) << (NwSrcShift as u64);
        w |= (Self::nw_wildcard_bits(&self.nw_dst) as u64) << (NwDstShift as u64);
        w as u32
    }

    pub fn marshal(pattern: &Pattern, bytes: &mut Vec<u8>) -> Result<()> {
        bytes.write_u32::<BigEndian>(pattern.wildcards())?;
        bytes.write_u16::<BigEndian>(pattern.in_port.unwrap_or(0))?;
        bytes.write_all(&bytes_of_mac(pattern.dl_src.unwrap_or(0)))?;
        bytes.write_all(&bytes_of_mac(pattern.dl_dst.unwrap_or(0)))?;
        bytes.write_u16::<BigEndian>(match pattern.dl_vlan {
            Some(Some(vid)) => vid,
            Some(None) => OFP_VLAN_NONE,
            None => 0,
        })?;
        bytes.write_u8(pattern.dl_vlan_pcp.unwrap_or(0))?;
        bytes.write_u8(0)?;
        bytes.write_u16::<BigEndian>(pattern.dl_typ.unwrap_or(0))?;
        bytes.write_u8(pattern.nw_tos.unwrap_or(0))?;
        bytes.write_u8(pattern.nw_proto.unwrap_or(0))?;
        bytes.write_u16::<BigEndian>(0)?;
        bytes.write_u32::<BigEndian>(pattern.nw_src.map_or(0, |m| m.value))?;
        bytes.write_u32::<BigEndian>(pattern.nw_dst.map_or(0, |m| m.value))?;
        bytes.write_u16::<BigEndian>(pattern.tp_src.unwrap_or(0))?;
        bytes.write_u16::<BigEndian>(pattern.tp_dst.unwrap_or(0))?;
        Ok(())
    }

    pub fn parse(bytes: &mut Cursor<&[u8]>) -> Result<Pattern> {
        use OfpFlowWildcards::*;
        let w = bytes.read_u32::<BigEndian>()? as u64;
        let wild = |b: OfpFlowWildcards| test_bit(b as u64, w);
        let in_port = bytes.read_u16::<BigEndian>()?;
        let mut dl_src = [0; 6];
        bytes.read_exact(&mut dl_src)?;
        let mut dl_dst = [0; 6];
        bytes.read_exact(&mut dl_dst)?;
        let dl_vlan = bytes.read_u16::<BigEndian>()?;
        let dl_vlan_pcp = bytes.read_u8()?;
        let _pad = bytes.read_u8()?;
        let dl_typ = bytes.read_u16::<BigEndian>()?;
        let nw_tos = bytes.read_u8()?;
        let nw_proto = bytes.read_u8()?;
        let _pad = bytes.read_u16::<BigEndian>()?;
        let nw_src = bytes.read_u32::<BigEndian>()?;
        let nw_dst = bytes.read_u32::<BigEndian>()?;
        let tp_src = bytes.read_u16::<BigEndian>()?;
        let tp_dst = bytes.read_u16::<BigEndian>()?;
        let keep = |wildcarded: bool| if wildcarded { None } else { Some(()) };
        Ok(Pattern {
            dl_src: keep(wild(DlSrc)).map(|_| mac_of_bytes(dl_src)),
            dl_dst: keep(wild(DlDst)).map(|_| mac_of_bytes(dl_dst)),
            dl_typ: keep(wild(DlType)).map(|_| dl_typ),
            dl_vlan: keep(wild(DlVlan)).map(|_| {
                if dl_vlan == OFP_VLAN_NONE {
                    None
                } else {
                    Some(dl_vlan)
                }
            }),
            dl_vlan_pcp: keep(wild(DlVlanPcp)).map(|_| dl_vlan_pcp),
            nw_src: Self::nw_of_wildcard_bits(nw_src, ((w >> NwSrcShift as u64) & 0x3f) as u32),
            nw_dst: Self::nw_of_wildcard_bits(nw_dst, ((w >> NwDstShift as u64) & 0x3f) as u32),
            nw_proto: keep(wild(NwProto)).map(|_| nw_proto),
            nw_tos: keep(wild(NwTos)).map(|_| nw_tos),
            tp_src: keep(wild(TpSrc)).map(|_| tp_src),
            tp_dst: keep(wild(TpDst)).map(|_| tp_dst),
            in_port: keep(wild(InPort)).map(|_| in_port),
        })
    }
}

/// Port behavior.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PseudoPort {
    PhysicalPort(u16),
    InPort,
    Table,
    Normal,
    Flood,
    AllPorts,
    Controller(u64),
    Local,
}

#[repr(u16)]
enum OfpPort {
    OFPPMax = 0xff00,
    OFPPInPort = 0xfff8,
    OFPPTable = 0xfff9,
    OFPPNormal = 0xfffa,
    OFPPFlood = 0xfffb,
    OFPPAll = 0xfffc,
    OFPPController = 0xfffd,
    OFPPLocal = 0xfffe,
    OFPPNone = 0xffff,
}

impl PseudoPort {
    fn of_int(p: u16) -> Result<Option<PseudoPort>> {
        if (OfpPort::OFPPNone as u16) == p {
            Ok(None)
        } else {
            PseudoPort::make(p, 0).map(Some)
        }
    }

    fn make(p: u16, len: u64) -> Result<PseudoPort> {
        match p {
            p if p == (OfpPort::OFPPInPort as u16) => Ok(PseudoPort::InPort),
            p if p == (OfpPort::OFPPTable as u16) => Ok(PseudoPort::Table),
            p if p == (OfpPort::OFPPNormal as u16) => Ok(PseudoPort::Normal),
            p if p == (OfpPort::OFPPFlood as u16) => Ok(PseudoPort::Flood),
            p if p == (OfpPort::OFPPAll as u16) => Ok(PseudoPort::AllPorts),
            p if p == (OfpPort::OFPPController as u16) => Ok(PseudoPort::Controller(len)),
            p if p == (OfpPort::OFPPLocal as u16) => Ok(PseudoPort::Local),
            p if p <= (OfpPort::OFPPMax as u16) => Ok(PseudoPort::PhysicalPort(p)),
            p => Err(Error::UnsupportedPort(p)),
        }
    }

    fn to_int(pp: PseudoPort) -> u16 {
        match pp {
            PseudoPort::PhysicalPort(p) => p,
            PseudoPort::InPort => OfpPort::OFPPInPort as u16,
            PseudoPort::Table => OfpPort::OFPPTable as u16,
            PseudoPort::Normal => OfpPort::OFPPNormal as u16,
            PseudoPort::Flood => OfpPort::OFPPFlood as u16,
            PseudoPort::AllPorts => OfpPort::OFPPAll as u16,
            PseudoPort::Controller(_) => OfpPort::OFPPController as u16,
            PseudoPort::Local => OfpPort::OFPPLocal as u16,
        }
    }

    fn marshal(pp: PseudoPort, bytes: &mut Vec<u8>) -> Result<()> {
        bytes.write_u16::<BigEndian>(Self::to_int(pp))?;
        Ok(())
    }
}

/// Actions associated with flows and packets.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Action {
    Output(PseudoPort),
}

#[repr(u16)]
enum OfpActionType {
    OFPATOutput,
}

impl Action {
    fn type_code(a: &Action) -> OfpActionType {
        match *a {
            Action::Output(_) => OfpActionType::OFPATOutput,
        }
    }

    fn size_of(a: &Action) -> usize {
        match *a {
            Action::Output(_) => 8,
        }
    }

    fn size_of_sequence(actions: &[Action]) -> usize {
        actions.iter().fold(0, |acc, x| Action::size_of(x) + acc)
    }

    fn parse_sequence(buf: &[u8]) -> Result<Vec<Action>> {
        let mut actions = vec![];
        let mut rest = buf;
        while !rest.is_empty() {
            ensure_len("action header", rest, 4)?;
            let mut bytes = Cursor::new(rest);
            let action_code = bytes.read_u16::<BigEndian>()?;
            let len = bytes.read_u16::<BigEndian>()? as usize;
            if len < 8 || len % 8 != 0 {
                return Err(Error::InvalidField {
                    field: "action length",
                    value: len as u32,
                });
            }
            ensure_len("action", rest, len)?;
            let action = match action_code {
                t if t == (OfpActionType::OFPATOutput as u16) => {
                    let port_code = bytes.read_u16::<BigEndian>()?;
                    let max_len = bytes.read_u16::<BigEndian>()?;
                    Action::Output(PseudoPort::make(port_code, max_len as u64)?)
                }
                t => {
                    return Err(Error::InvalidField {
                        field: "action type",
                        value: t as u32,
                    })
                }
            };
            actions.push(action);
            rest = &rest[len..];
        }
        Ok(actions)
    }

    fn move_controller_last(acts: Vec<Action>) -> Vec<Action> {
        let (mut to_ctrl, mut not_to_ctrl): (Vec<Action>, Vec<Action>) = acts
            .into_iter()
            .partition(|act| matches!(*act, Action::Output(PseudoPort::Controller(_))));
        not_to_ctrl.append(&mut to_ctrl);
        not_to_ctrl
    }

    fn marshal(act: Action, bytes: &mut Vec<u8>) -> Result<()> {
        bytes.write_u16::<BigEndian>(Action::type_code(&act) as u16)?;
        bytes.write_u16::<BigEndian>(Action::size_of(&act) as u16)?;
        match act {
            Action::Output(pp) => {
                PseudoPort::marshal(pp, bytes)?;
                bytes.write_u16::<BigEndian>(match pp {
                    PseudoPort::Controller(w) => w as u16,
                    _ => 0,
                })?;
            }
        }
        Ok(())
    }
}

/// How long before a flow entry expires.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Timeout {
    Permanent,
    ExpiresAfter(u16),
}

impl Timeout {
    pub fn of_int(tm: u16) -> Timeout {
        match tm {
            0 => Timeout::Permanent,
            d => Timeout::ExpiresAfter(d),
        }
    }

    pub fn to_int(tm: Timeout) -> u16 {
        match tm {
            Timeout::Permanent => 0,
            Timeout::ExpiresAfter(d) => d,
        }
    }
}

/// Capabilities supported by the datapath.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Capabilities {
    pub flow_stats: bool,
    pub table_stats: bool,
    pub port_stats: bool,
    pub stp: bool,
    pub ip_reasm: bool,
    pub queue_stats: bool,
    pub arp_match_ip: bool,
}

/// Actions supported by the datapath.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SupportedActions {
    pub output: bool,
    pub set_vlan_id: bool,
    pub set_vlan_pcp: bool,
    pub strip_vlan: bool,
    pub set_dl_src: bool,
    pub set_dl_dst: bool,
    pub set_nw_src: bool,
    pub set_nw_dst: bool,
    pub set_nw_tos: bool,
    pub set_tp_src: bool,
    pub set_tp_dst: bool,
    pub enqueue: bool,
    pub vendor: bool,
}

/// Switch features.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SwitchFeatures {
    pub datapath_id: u64,
    pub num_buffers: u32,
    pub num_tables: u8,
    pub supported_capabilities: Capabilities,
    pub supported_actions: SupportedActions,
    pub ports: Vec<PortDesc>,
}

impl SwitchFeatures {
    const FIXED_LEN: usize = 24;
}

impl MessageType for SwitchFeatures {
    fn size_of(sf: &SwitchFeatures) -> usize {
        Self::FIXED_LEN + sf.ports.len() * PortDesc::SIZE
    }

    fn parse(buf: &[u8]) -> Result<SwitchFeatures> {
        ensure_len("features reply", buf, Self::FIXED_LEN)?;
        let mut bytes = Cursor::new(buf);
        let datapath_id = bytes.read_u64::<BigEndian>()?;
        let num_buffers = bytes.read_u32::<BigEndian>()?;
        let num_tables = bytes.read_u8()?;
        bytes.set_position(bytes.position() + 3);
        let supported_capabilities = {
            let d = bytes.read_u32::<BigEndian>()? as u64;
            Capabilities {
                flow_stats: test_bit(0, d),
                table_stats: test_bit(1, d),
                port_stats: test_bit(2, d),
                stp: test_bit(3, d),
                ip_reasm: test_bit(5, d),
                queue_stats: test_bit(6, d),
                arp_match_ip: test_bit(7, d),
            }
        };
        let supported_actions = {
            let d = bytes.read_u32::<BigEndian>()? as u64;
            SupportedActions {
                output: test_bit(0, d),
                set_vlan_id: test_bit(1, d),
                set_vlan_pcp: test_bit(2, d),
                strip_vlan: test_bit(3, d),
                set_dl_src: test_bit(4, d),
                set_dl_dst: test_bit(5, d),
                set_nw_src: test_bit(6, d),
                set_nw_dst: test_bit(7, d),
                set_nw_tos: test_bit(8, d),
                set_tp_src: test_bit(9, d),
                set_tp_dst: test_bit(10, d),
                enqueue: test_bit(11, d),
                vendor: test_bit(12, d),
            }
        };
        let ports = buf[Self::FIXED_LEN..]
            .chunks_exact(PortDesc::SIZE)
            .map(PortDesc::parse)
            .collect::<Result<Vec<_>>>()?;
        Ok(SwitchFeatures {
            datapath_id,
            num_buffers,
            num_tables,
            supported_capabilities,
            supported_actions,
            ports,
        })
    }

    fn marshal(sf: SwitchFeatures, bytes: &mut Vec<u8>) -> Result<()> {
        let caps = sf.supported_capabilities;
        let acts = sf.supported_actions;
        let caps = [
            (0, caps.flow_stats),
            (1, caps.table_stats),
            (2, caps.port_stats),
            (3, caps.stp),
            (5, caps.ip_reasm),
            (6, caps.queue_stats),
            (7, caps.arp_match_ip),
        ]
        .iter()
        .fold(0, |acc, &(b, set)| bit(b, acc, set));
        let acts = [
            (0, acts.output),
            (1, acts.set_vlan_id),
            (2, acts.set_vlan_pcp),
            (3, acts.strip_vlan),
            (4, acts.set_dl_src),
            (5, acts.set_dl_dst),
            (6, acts.set_nw_src),
            (7, acts.set_nw_dst),
            (8, acts.set_nw_tos),
            (9, acts.set_tp_src),
            (10, acts.set_tp_dst),
            (11, acts.enqueue),
            (12, acts.vendor),
        ]
        .iter()
        .fold(0, |acc, &(b, set)| bit(b, acc, set));
        bytes.write_u64::<BigEndian>(sf.datapath_id)?;
        bytes.write_u32::<BigEndian>(sf.num_buffers)?;
        bytes.write_u8(sf.num_tables)?;
        bytes.write_all(&[0; 3])?;
        bytes.write_u32::<BigEndian>(caps as u32)?;
        bytes.write_u32::<BigEndian>(acts as u32)?;
        for port in sf.ports {
            PortDesc::marshal(&port, bytes)?;
        }
        Ok(())
    }
}

/// Type of modification to perform on a flow table.
#[repr(u16)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FlowModCmd {
    AddFlow,
    ModFlow,
    ModStrictFlow,
    DeleteFlow,
    DeleteStrictFlow,
}

impl TryFrom<u16> for FlowModCmd {
    type Error = Error;

    fn try_from(d: u16) -> Result<FlowModCmd> {
        match d {
            0 => Ok(FlowModCmd::AddFlow),
            1 => Ok(FlowModCmd::ModFlow),
            2 => Ok(FlowModCmd::ModStrictFlow),
            3 => Ok(FlowModCmd::DeleteFlow),
            4 => Ok(FlowModCmd::DeleteStrictFlow),
            d => Err(Error::InvalidField {
                field: "flow mod command",
                value: d as u32,
            }),
        }
    }
}

/// Represents modifications to a flow table from the controller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FlowMod {
    pub command: FlowModCmd,
    pub pattern: Pattern,
    pub priority: u16,
    pub actions: Vec<Action>,
    pub cookie: u64,
    pub idle_timeout: Timeout,
    pub hard_timeout: Timeout,
    pub notify_when_removed: bool,
    pub apply_to_packet: Option<u32>,
    pub out_port: Option<PseudoPort>,
    pub check_overlap: bool,
}

impl FlowMod {
    const FIXED_LEN: usize = 24;

    fn flags_to_int(check_overlap: bool, notify_when_removed: bool) -> u16 {
        (if check_overlap { 1 << 1 } else { 0 }) | (if notify_when_removed { 1 << 0 } else { 0 })
    }

    fn check_overlap_of_flags(flags: u16) -> bool {
        2 & flags != 0
    }

    fn notify_when_removed_of_flags(flags: u16) -> bool {
        1 & flags != 0
    }
}

impl MessageType for FlowMod {
    fn size_of(msg: &FlowMod) -> usize {
        Pattern::size_of() + Self::FIXED_LEN + Action::size_of_sequence(&msg.actions)
    }

    fn parse(buf: &[u8]) -> Result<FlowMod> {
        ensure_len("flow mod", buf, Pattern::size_of() + Self::FIXED_LEN)?;
        let mut bytes = Cursor::new(buf);
        let pattern = Pattern::parse(&mut bytes)?;
        let cookie = bytes.read_u64::<BigEndian>()?;
        let command = FlowModCmd::try_from(bytes.read_u16::<BigEndian>()?)?;
        let idle = Timeout::of_int(bytes.read_u16::<BigEndian>()?);
        let hard = Timeout::of_int(bytes.read_u16::<BigEndian>()?);
        let prio = bytes.read_u16::<BigEndian>()?;
        let buffer_id = bytes.read_i32::<BigEndian>()?;
        let out_port = PseudoPort::of_int(bytes.read_u16::<BigEndian>()?)?;
        let flags = bytes.read_u16::<BigEndian>()?;
        let actions = Action::parse_sequence(&buf[bytes.position() as usize..])?;
        Ok(FlowMod {
            command,
            pattern,
            priority: prio,
            actions,
            cookie,
            idle_timeout: idle,
            hard_timeout: hard,
            notify_when_removed: FlowMod::notify_when_removed_of_flags(flags),
            apply_to_packet: match buffer_id {
                -1 => None,
                n => Some(n as u32),
            },
            out_port,
            check_overlap: FlowMod::check_overlap_of_flags(flags),
        })
    }

    fn marshal(fm: FlowMod, bytes: &mut Vec<u8>) -> Result<()> {
        if fm
            .actions
            .iter()
            .any(|act| *act == Action::Output(PseudoPort::Table))
        {
            return Err(Error::InvalidAction("OFPP_TABLE not allowed in installed flow"));
        }
        Pattern::marshal(&fm.pattern, bytes)?;
        bytes.write_u64::<BigEndian>(fm.cookie)?;
        bytes.write_u16::<BigEndian>(fm.command as u16)?;
        bytes.write_u16::<BigEndian>(Timeout::to_int(fm.idle_timeout))?;
        bytes.write_u16::<BigEndian>(Timeout::to_int(fm.hard_timeout))?;
        bytes.write_u16::<BigEndian>(fm.priority)?;
        bytes.write_i32::<BigEndian>(match fm.apply_to_packet {
            None => -1,
            Some(buf_id) => buf_id as i32,
        })?;
        match fm.out_port {
            None => bytes.write_u16::<BigEndian>(OfpPort::OFPPNone as u16)?,
            Some(x) => PseudoPort::marshal(x, bytes)?,
        }
        bytes.write_u16::<BigEndian>(FlowMod::flags_to_int(
            fm.check_overlap,
            fm.notify_when_removed,
        ))?;
        for act in Action::move_controller_last(fm.actions) {
            Action::marshal(act, bytes)?;
        }
        Ok(())
    }
}

/// The data associated with a packet received by the controller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Payload {
    Buffered(u32, Vec<u8>),
    NotBuffered(Vec<u8>),
}

impl Payload {
    pub fn size_of(payload: &Payload) -> usize {
        payload.bytes().len()
    }

    /// The frame bytes carried with the message.
    pub fn bytes(&self) -> &[u8] {
        match *self {
            Payload::Buffered(_, ref buf) | Payload::NotBuffered(ref buf) => buf,
        }
    }

    pub fn buffer_id(&self) -> Option<u32> {
        match *self {
            Payload::Buffered(id, _) => Some(id),
            Payload::NotBuffered(_) => None,
        }
    }
}

/// The reason a packet arrives at the controller.
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PacketInReason {
    NoMatch,
    ExplicitSend,
}

impl TryFrom<u8> for PacketInReason {
    type Error = Error;

    fn try_from(d: u8) -> Result<PacketInReason> {
        match d {
            0 => Ok(PacketInReason::NoMatch),
            1 => Ok(PacketInReason::ExplicitSend),
            d => Err(Error::InvalidField {
                field: "packet in reason",
                value: d as u32,
            }),
        }
    }
}

/// Represents packets received by the datapath and sent to the controller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PacketIn {
    pub input_payload: Payload,
    pub total_len: u16,
    pub port: u16,
    pub reason: PacketInReason,
}

impl PacketIn {
    const FIXED_LEN: usize = 10;
}

impl MessageType for PacketIn {
    fn size_of(pi: &PacketIn) -> usize {
        Self::FIXED_LEN + Payload::size_of(&pi.input_payload)
    }

    fn parse(buf: &[u8]) -> Result<PacketIn> {
        ensure_len("packet in", buf, Self::FIXED_LEN)?;
        let mut bytes = Cursor::new(buf);
        let buf_id = match bytes.read_i32::<BigEndian>()? {
            -1 => None,
            n => Some(n as u32),
        };
        let total_len = bytes.read_u16::<BigEndian>()?;
        let port = bytes.read_u16::<BigEndian>()?;
        let reason = PacketInReason::try_from(bytes.read_u8()?)?;
        let data = buf[Self::FIXED_LEN..].to_vec();
        let payload = match buf_id {
            None => Payload::NotBuffered(data),
            Some(n) => Payload::Buffered(n, data),
        };
        Ok(PacketIn {
            input_payload: payload,
            total_len,
            port,
            reason,
        })
    }

    fn marshal(pi: PacketIn, bytes: &mut Vec<u8>) -> Result<()> {
        bytes.write_i32::<BigEndian>(pi.input_payload.buffer_id().map_or(-1, |id| id as i32))?;
        bytes.write_u16::<BigEndian>(pi.total_len)?;
        bytes.write_u16::<BigEndian>(pi.port)?;
        bytes.write_u8(pi.reason as u8)?;
        bytes.write_u8(0)?;
        bytes.write_all(pi.input_payload.bytes())?;
        Ok(())
    }
}

/// Represents packets sent from the controller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PacketOut {
    pub output_payload: Payload,
    /// Port the packet is treated as having arrived on; `None` for `OFPP_NONE`.
    pub port_id: Option<u16>,
    pub apply_actions: Vec<Action>,
}

impl PacketOut {
    const FIXED_LEN: usize = 8;
}

impl MessageType for PacketOut {
    fn size_of(po: &PacketOut) -> usize {
        let data = match po.output_payload {
            Payload::Buffered(..) => 0,
            Payload::NotBuffered(ref buf) => buf.len(),
        };
        Self::FIXED_LEN + Action::size_of_sequence(&po.apply_actions) + data
    }

    fn parse(buf: &[u8]) -> Result<PacketOut> {
        ensure_len("packet out", buf, Self::FIXED_LEN)?;
        let mut bytes = Cursor::new(buf);
        let buf_id = bytes.read_i32::<BigEndian>()?;
        let port_id = match bytes.read_u16::<BigEndian>()? {
            p if p == OfpPort::OFPPNone as u16 => None,
            p => Some(p),
        };
        let actions_len = bytes.read_u16::<BigEndian>()? as usize;
        ensure_len("packet out actions", buf, Self::FIXED_LEN + actions_len)?;
        let actions_end = Self::FIXED_LEN + actions_len;
        let apply_actions = Action::parse_sequence(&buf[Self::FIXED_LEN..actions_end])?;
        let data = buf[actions_end..].to_vec();
        Ok(PacketOut {
            output_payload: match buf_id {
                -1 => Payload::NotBuffered(data),
                n => Payload::Buffered(n as u32, data),
            },
            port_id,
            apply_actions,
        })
    }

    fn marshal(po: PacketOut, bytes: &mut Vec<u8>) -> Result<()> {
        bytes.write_i32::<BigEndian>(po.output_payload.buffer_id().map_or(-1, |id| id as i32))?;
        bytes.write_u16::<BigEndian>(po.port_id.unwrap_or(OfpPort::OFPPNone as u16))?;
        bytes.write_u16::<BigEndian>(Action::size_of_sequence(&po.apply_actions) as u16)?;
        for act in Action::move_controller_last(po.apply_actions) {
            Action::marshal(act, bytes)?;
        }
        // A buffered packet is already held by the switch.
        if let Payload::NotBuffered(buf) = po.output_payload {
            bytes.write_all(&buf)?;
        }
        Ok(())
    }
}

/// STP state of a port.
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum StpState {
    Listen,
    Learn,
    Forward,
    Block,
}

/// Current state of a physical port. Not configurable by the controller.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PortState {
    pub down: bool,
    pub stp_state: StpState,
}

/// Features of physical ports available in a datapath.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct PortFeatures {
    pub f_10mbhd: bool,
    pub f_10mbfd: bool,
    pub f_100mbhd: bool,
    pub f_100mbfd: bool,
    pub f_1gbhd: bool,
    pub f_1gbfd: bool,
    pub f_10gbfd: bool,
    pub copper: bool,
    pub fiber: bool,
    pub autoneg: bool,
    pub pause: bool,
    pub pause_asym: bool,
}

impl PortFeatures {
    fn of_int(d: u32) -> PortFeatures {
        let d = d as u64;
        PortFeatures {
            f_10mbhd: test_bit(0, d),
            f_10mbfd: test_bit(1, d),
            f_100mbhd: test_bit(2, d),
            f_100mbfd: test_bit(3, d),
            f_1gbhd: test_bit(4, d),
            f_1gbfd: test_bit(5, d),
            f_10gbfd: test_bit(6, d),
            copper: test_bit(7, d),
            fiber: test_bit(8, d),
            autoneg: test_bit(9, d),
            pause: test_bit(10, d),
            pause_asym: test_bit(11, d),
        }
    }

    fn to_int(&self) -> u32 {
        pack_bits(&[
            self.f_10mbhd,
            self.f_10mbfd,
            self.f_100mbhd,
            self.f_100mbfd,
            self.f_1gbhd,
            self.f_1gbfd,
            self.f_10gbfd,
            self.copper,
            self.fiber,
            self.autoneg,
            self.pause,
            self.pause_asym,
        ]) as u32
    }
}

/// Flags to indicate behavior of the physical port.
///
/// These flags are used both to describe the current configuration of a physical port,
/// and to configure a port's behavior.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct PortConfig {
    pub down: bool,
    pub no_stp: bool,
    pub no_recv: bool,
    pub no_recv_stp: bool,
    pub no_flood: bool,
    pub no_fwd: bool,
    pub no_packet_in: bool,
}

/// Description of a physical port.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PortDesc {
    pub port_no: u16,
    pub hw_addr: u64,
    pub name: String,
    pub config: PortConfig,
    pub state: PortState,
    pub curr: PortFeatures,
    pub advertised: PortFeatures,
    pub supported: PortFeatures,
    pub peer: PortFeatures,
}

impl PortDesc {
    const SIZE: usize = 48;

    fn parse(buf: &[u8]) -> Result<PortDesc> {
        ensure_len("port description", buf, Self::SIZE)?;
        let mut bytes = Cursor::new(buf);
        let port_no = bytes.read_u16::<BigEndian>()?;
        let mut hw_addr = [0; 6];
        bytes.read_exact(&mut hw_addr)?;
        let mut name = [0; 16];
        bytes.read_exact(&mut name)?;
        let name_len = name.iter().position(|b| *b == 0).unwrap_or(name.len());
        let config = {
            let d = bytes.read_u32::<BigEndian>()? as u64;
            PortConfig {
                down: test_bit(0, d),
                no_stp: test_bit(1, d),
                no_recv: test_bit(2, d),
                no_recv_stp: test_bit(3, d),
                no_flood: test_bit(4, d),
                no_fwd: test_bit(5, d),
                no_packet_in: test_bit(6, d),
            }
        };
        let state = {
            let d = bytes.read_u32::<BigEndian>()?;
            PortState {
                down: test_bit(0, d as u64),
                stp_state: match (d >> 8) & 3 {
                    0 => StpState::Listen,
                    1 => StpState::Learn,
                    2 => StpState::Forward,
                    _ => StpState::Block,
                },
            }
        };
        let curr = PortFeatures::of_int(bytes.read_u32::<BigEndian>()?);
        let advertised = PortFeatures::of_int(bytes.read_u32::<BigEndian>()?);
        let supported = PortFeatures::of_int(bytes.read_u32::<BigEndian>()?);
        let peer = PortFeatures::of_int(bytes.read_u32::<BigEndian>()?);
        Ok(PortDesc {
            port_no,
            hw_addr: mac_of_bytes(hw_addr),
            name: String::from_utf8_lossy(&name[..name_len]).into_owned(),
            config,
            state,
            curr,
            advertised,
            supported,
            peer,
        })
    }

    fn marshal(pd: &PortDesc, bytes: &mut Vec<u8>) -> Result<()> {
        let c = pd.config;
        let config = pack_bits(&[
            c.down,
            c.no_stp,
            c.no_recv,
            c.no_recv_stp,
            c.no_flood,
            c.no_fwd,
            c.no_packet_in,
        ]);
        let state = bit(0, (pd.state.stp_state as u64) << 8, pd.state.down);
        let mut name = [0u8; 16];
        for (dst, src) in name.iter_mut().take(15).zip(pd.name.bytes()) {
            *dst = src;
        }
        bytes.write_u16::<BigEndian>(pd.port_no)?;
        bytes.write_all(&bytes_of_mac(pd.hw_addr))?;
        bytes.write_all(&name)?;
        bytes.write_u32::<BigEndian>(config as u32)?;
        bytes.write_u32::<BigEndian>(state as u32)?;
        for features in [pd.curr, pd.advertised, pd.supported, pd.peer] {
            bytes.write_u32::<BigEndian>(features.to_int())?;
        }
        Ok(())
    }
}

/// What changed about a physical port.
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PortReason {
    PortAdd,
    PortDelete,
    PortModify,
}

/// A physical port has changed in the datapath.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PortStatus {
    pub reason: PortReason,
    pub desc: PortDesc,
}

impl MessageType for PortStatus {
    fn size_of(_: &PortStatus) -> usize {
        8 + PortDesc::SIZE
    }

    fn parse(buf: &[u8]) -> Result<PortStatus> {
        ensure_len("port status", buf, 8 + PortDesc::SIZE)?;
        let reason = match buf[0] {
            0 => PortReason::PortAdd,
            1 => PortReason::PortDelete,
            2 => PortReason::PortModify,
            d => {
                return Err(Error::InvalidField {
                    field: "port status reason",
                    value: d as u32,
                })
            }
        };
        let desc = PortDesc::parse(&buf[8..])?;
        Ok(PortStatus { reason, desc })
    }

    fn marshal(sts: PortStatus, bytes: &mut Vec<u8>) -> Result<()> {
        bytes.write_u8(sts.reason as u8)?;
        bytes.write_all(&[0; 7])?;
        PortDesc::marshal(&sts.desc, bytes)
    }
}

/// Error message (datapath -> controller). Type and code are kept numeric.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ErrorMsg {
    pub typ: u16,
    pub code: u16,
    pub data: Vec<u8>,
}

impl MessageType for ErrorMsg {
    fn size_of(err: &ErrorMsg) -> usize {
        4 + err.data.len()
    }

    fn parse(buf: &[u8]) -> Result<ErrorMsg> {
        ensure_len("error message", buf, 4)?;
        let mut bytes = Cursor::new(buf);
        let typ = bytes.read_u16::<BigEndian>()?;
        let code = bytes.read_u16::<BigEndian>()?;
        Ok(ErrorMsg {
            typ,
            code,
            data: buf[4..].to_vec(),
        })
    }

    fn marshal(err: ErrorMsg, bytes: &mut Vec<u8>) -> Result<()> {
        bytes.write_u16::<BigEndian>(err.typ)?;
        bytes.write_u16::<BigEndian>(err.code)?;
        bytes.write_all(&err.data)?;
        Ok(())
    }
}

/// Encapsulates handling of messages implementing `MessageType` trait.
pub mod message {
    use super::*;
    use crate::ofp_header::OfpHeader;
    use crate::ofp_message::OfpMessage;

    /// Abstractions of OpenFlow 1.0 messages mapping to message codes.
    #[derive(Clone, Debug, PartialEq, Eq)]
    pub enum Message {
        Hello,
        Error(ErrorMsg),
        EchoRequest(Vec<u8>),
        EchoReply(Vec<u8>),
        FeaturesReq,
        FeaturesReply(SwitchFeatures),
        FlowMod(FlowMod),
        PacketIn(PacketIn),
        PortStatus(PortStatus),
        PacketOut(PacketOut),
        BarrierRequest,
        BarrierReply,
        /// A message this controller does not interpret, with its raw body.
        Other(MsgCode, Vec<u8>),
    }

    impl Message {
        /// Map `Message` to associated OpenFlow message type code `MsgCode`.
        fn msg_code_of_message(msg: &Message) -> MsgCode {
            match *msg {
                Message::Hello => MsgCode::Hello,
                Message::Error(_) => MsgCode::Error,
                Message::EchoRequest(_) => MsgCode::EchoReq,
                Message::EchoReply(_) => MsgCode::EchoResp,
                Message::FeaturesReq => MsgCode::FeaturesReq,
                Message::FeaturesReply(_) => MsgCode::FeaturesResp,
                Message::FlowMod(_) => MsgCode::FlowMod,
                Message::PacketIn(_) => MsgCode::PacketIn,
                Message::PortStatus(_) => MsgCode::PortStatus,
                Message::PacketOut(_) => MsgCode::PacketOut,
                Message::BarrierRequest => MsgCode::BarrierReq,
                Message::BarrierReply => MsgCode::BarrierResp,
                Message::Other(code, _) => code,
            }
        }

        /// Marshal the OpenFlow message `msg`.
        fn marshal_body(msg: Message, bytes: &mut Vec<u8>) -> Result<()> {
            match msg {
                Message::Hello
                | Message::FeaturesReq
                | Message::BarrierRequest
                | Message::BarrierReply => Ok(()),
                Message::EchoRequest(buf) | Message::EchoReply(buf) | Message::Other(_, buf) => {
                    bytes.write_all(&buf)?;
                    Ok(())
                }
                Message::Error(err) => ErrorMsg::marshal(err, bytes),
                Message::FeaturesReply(features) => SwitchFeatures::marshal(features, bytes),
                Message::FlowMod(flow_mod) => FlowMod::marshal(flow_mod, bytes),
                Message::PacketIn(packet_in) => PacketIn::marshal(packet_in, bytes),
                Message::PortStatus(sts) => PortStatus::marshal(sts, bytes),
                Message::PacketOut(po) => PacketOut::marshal(po, bytes),
            }
        }
    }

    impl OfpMessage for Message {
        fn size_of(msg: &Message) -> usize {
            OfpHeader::size()
                + match *msg {
                    Message::Hello
                    | Message::FeaturesReq
                    | Message::BarrierRequest
                    | Message::BarrierReply => 0,
                    Message::EchoRequest(ref buf)
                    | Message::EchoReply(ref buf)
                    | Message::Other(_, ref buf) => buf.len(),
                    Message::Error(ref err) => ErrorMsg::size_of(err),
                    Message::FeaturesReply(ref sf) => SwitchFeatures::size_of(sf),
                    Message::FlowMod(ref flow_mod) => FlowMod::size_of(flow_mod),
                    Message::PacketIn(ref packet_in) => PacketIn::size_of(packet_in),
                    Message::PortStatus(ref ps) => PortStatus::size_of(ps),
                    Message::PacketOut(ref po) => PacketOut::size_of(po),
                }
        }

        fn header_of(xid: u32, msg: &Message) -> Result<OfpHeader> {
            let sizeof_buf = Self::size_of(msg);
            let length = u16::try_from(sizeof_buf).map_err(|_| Error::InvalidField {
                field: "message length",
                value: sizeof_buf as u32,
            })?;
            Ok(OfpHeader::new(
                OFP_VERSION,
                Self::msg_code_of_message(msg) as u8,
                length,
                xid,
            ))
        }

        fn marshal(xid: u32, msg: Message) -> Result<Vec<u8>> {
            let hdr = Self::header_of(xid, &msg)?;
            let mut bytes = Vec::with_capacity(hdr.length());
            OfpHeader::marshal(&mut bytes, hdr)?;
            Message::marshal_body(msg, &mut bytes)?;
            Ok(bytes)
        }

        fn parse(header: &OfpHeader, buf: &[u8]) -> Result<(u32, Message)> {
            if header.version() != OFP_VERSION {
                return Err(Error::UnsupportedVersion(header.version()));
            }
            let msg = match header.type_code()? {
                MsgCode::Hello => Message::Hello,
                MsgCode::Error => Message::Error(ErrorMsg::parse(buf)?),
                MsgCode::EchoReq => Message::EchoRequest(buf.to_vec()),
                MsgCode::EchoResp => Message::EchoReply(buf.to_vec()),
                MsgCode::FeaturesReq => Message::FeaturesReq,
                MsgCode::FeaturesResp => Message::FeaturesReply(SwitchFeatures::parse(buf)?),
                MsgCode::FlowMod => Message::FlowMod(FlowMod::parse(buf)?),
                MsgCode::PacketIn => Message::PacketIn(PacketIn::parse(buf)?),
                MsgCode::PortStatus => Message::PortStatus(PortStatus::parse(buf)?),
                MsgCode::PacketOut => Message::PacketOut(PacketOut::parse(buf)?),
                MsgCode::BarrierReq => Message::BarrierRequest,
                MsgCode::BarrierResp => Message::BarrierReply,
                code => Message::Other(code, buf.to_vec()),
            };
            Ok((header.xid(), msg))
        }
    }

    /// Return a `FlowMod` adding a flow parameterized by the given `priority`, `pattern`,
    /// and `actions`.
    pub fn add_flow(prio: u16, pattern: Pattern, actions: Vec<Action>) -> FlowMod {
        FlowMod {
            command: FlowModCmd::AddFlow,
            pattern,
            priority: prio,
            actions,
            cookie: 0,
            idle_timeout: Timeout::Permanent,
            hard_timeout: Timeout::Permanent,
            notify_when_removed: false,
            out_port: None,
            apply_to_packet: None,
            check_overlap: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::message::{add_flow, Message};
    use super::*;
    use crate::ofp_header::OfpHeader;
    use crate::ofp_message::OfpMessage;
    use pretty_assertions::assert_eq;

    fn reparse(xid: u32, msg: Message) -> (u32, Message) {
        let bytes = Message::marshal(xid, msg).unwrap();
        let mut hdr = [0; 8];
        hdr.copy_from_slice(&bytes[..8]);
        let header = OfpHeader::parse(hdr);
        assert_eq!(header.length(), bytes.len());
        Message::parse(&header, &bytes[8..]).unwrap()
    }

    #[test]
    fn hello_is_a_bare_header() {
        let bytes = Message::marshal(7, Message::Hello).unwrap();
        assert_eq!(bytes, vec![0x01, 0x00, 0x00, 0x08, 0x00, 0x00, 0x00, 0x07]);
    }

    #[test]
    fn flow_mod_layout() {
        let mut fm = add_flow(
            DEFAULT_PRIORITY,
            Pattern::match_all(),
            vec![Action::Output(PseudoPort::PhysicalPort(3))],
        );
        fm.idle_timeout = Timeout::ExpiresAfter(10);
        fm.hard_timeout = Timeout::ExpiresAfter(30);
        let bytes = Message::marshal(0, Message::FlowMod(fm)).unwrap();
        assert_eq!(bytes.len(), 8 + 40 + 24 + 8);
        assert_eq!(bytes[1], MsgCode::FlowMod as u8);
        // everything wildcarded, both nw masks at 32 bits
        assert_eq!(&bytes[8..12], &0x0038_20ffu32.to_be_bytes());
        // idle, hard, priority
        assert_eq!(&bytes[58..64], &[0, 10, 0, 30, 0x80, 0x00]);
        // buffer id none, out port none
        assert_eq!(&bytes[64..70], &[0xff, 0xff, 0xff, 0xff, 0xff, 0xff]);
        // output action to port 3
        assert_eq!(&bytes[72..80], &[0, 0, 0, 8, 0, 3, 0, 0]);
    }

    #[test]
    fn flow_mod_survives_the_wire() {
        let pattern = Pattern {
            dl_src: Some(0x0a),
            dl_dst: Some(0x0b),
            dl_typ: Some(0x0800),
            dl_vlan: Some(None),
            dl_vlan_pcp: Some(0),
            nw_src: Some(Mask {
                value: 0x0a00_0001,
                mask: None,
            }),
            nw_dst: Some(Mask {
                value: 0x0a00_0000,
                mask: Some(8),
            }),
            nw_proto: Some(6),
            nw_tos: Some(0),
            tp_src: Some(1234),
            tp_dst: Some(80),
            in_port: None,
        };
        let mut fm = add_flow(10, pattern, vec![Action::Output(PseudoPort::AllPorts)]);
        fm.notify_when_removed = true;
        let (xid, msg) = reparse(9, Message::FlowMod(fm.clone()));
        assert_eq!(xid, 9);
        assert_eq!(msg, Message::FlowMod(fm));
    }

    #[test]
    fn table_output_is_refused_in_flow_mod() {
        let fm = add_flow(1, Pattern::match_all(), vec![Action::Output(PseudoPort::Table)]);
        assert!(matches!(
            Message::marshal(0, Message::FlowMod(fm)),
            Err(Error::InvalidAction(_))
        ));
    }

    #[test]
    fn packet_in_skips_pad_byte() {
        let mut body = vec![0xff, 0xff, 0xff, 0xff, 0x00, 0x03, 0x00, 0x02, 0x00, 0x00];
        body.extend_from_slice(&[0xaa, 0xbb, 0xcc]);
        let pi = PacketIn::parse(&body).unwrap();
        assert_eq!(pi.port, 2);
        assert_eq!(pi.total_len, 3);
        assert_eq!(pi.reason, PacketInReason::NoMatch);
        assert_eq!(pi.input_payload, Payload::NotBuffered(vec![0xaa, 0xbb, 0xcc]));
    }

    #[test]
    fn buffered_packet_out_omits_data() {
        let po = PacketOut {
            output_payload: Payload::Buffered(77, vec![1, 2, 3, 4]),
            port_id: Some(1),
            apply_actions: vec![Action::Output(PseudoPort::PhysicalPort(2))],
        };
        let bytes = Message::marshal(0, Message::PacketOut(po)).unwrap();
        assert_eq!(bytes.len(), 8 + 8 + 8);
        assert_eq!(&bytes[8..16], &[0, 0, 0, 77, 0, 1, 0, 8]);
    }

    #[test]
    fn unbuffered_packet_out_carries_frame() {
        let po = PacketOut {
            output_payload: Payload::NotBuffered(vec![9, 8, 7]),
            port_id: Some(4),
            apply_actions: vec![Action::Output(PseudoPort::AllPorts)],
        };
        let (_, msg) = reparse(3, Message::PacketOut(po.clone()));
        assert_eq!(msg, Message::PacketOut(po));
    }

    #[test]
    fn features_reply_with_ports() {
        let port = PortDesc {
            port_no: 1,
            hw_addr: 0x0200_0000_0001,
            name: "s1-eth1".to_string(),
            config: PortConfig::default(),
            state: PortState {
                down: false,
                stp_state: StpState::Forward,
            },
            curr: PortFeatures {
                f_10gbfd: true,
                copper: true,
                ..PortFeatures::default()
            },
            advertised: PortFeatures::default(),
            supported: PortFeatures::default(),
            peer: PortFeatures::default(),
        };
        let sf = SwitchFeatures {
            datapath_id: 0x1,
            num_buffers: 256,
            num_tables: 254,
            supported_capabilities: Capabilities {
                flow_stats: true,
                table_stats: true,
                port_stats: true,
                stp: false,
                ip_reasm: false,
                queue_stats: true,
                arp_match_ip: true,
            },
            supported_actions: SupportedActions {
                output: true,
                set_vlan_id: true,
                set_vlan_pcp: true,
                strip_vlan: true,
                set_dl_src: true,
                set_dl_dst: true,
                set_nw_src: true,
                set_nw_dst: true,
                set_nw_tos: true,
                set_tp_src: true,
                set_tp_dst: true,
                enqueue: true,
                vendor: false,
            },
            ports: vec![port],
        };
        let (_, msg) = reparse(1, Message::FeaturesReply(sf.clone()));
        assert_eq!(msg, Message::FeaturesReply(sf));
    }

    #[test]
    fn reserved_port_numbers_are_rejected() {
        assert!(matches!(
            PseudoPort::make(0xff01, 0),
            Err(Error::UnsupportedPort(0xff01))
        ));
        assert_eq!(PseudoPort::of_int(0xffff).unwrap(), None);
    }

    #[test]
    fn wrong_version_is_rejected() {
        let header = OfpHeader::new(0x04, 0, 8, 0);
        assert!(matches!(
            Message::parse(&header, &[]),
            Err(Error::UnsupportedVersion(0x04))
        ));
    }

    #[test]
    fn uninterpreted_messages_keep_their_body() {
        let header = OfpHeader::new(OFP_VERSION, MsgCode::FlowRemoved as u8, 11, 5);
        let (xid, msg) = Message::parse(&header, &[1, 2, 3]).unwrap();
        assert_eq!(xid, 5);
        assert_eq!(msg, Message::Other(MsgCode::FlowRemoved, vec![1, 2, 3]));
    }
}
