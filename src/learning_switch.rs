use std::collections::HashMap;
use std::fmt;
use std::net::Ipv4Addr;

use tracing::{debug, info, warn};

use crate::error::Result;
use crate::openflow0x01::message::{add_flow, Message};
use crate::openflow0x01::{
    Action, FlowMod, PacketIn, PacketOut, Pattern, Payload, PseudoPort, Timeout, DEFAULT_PRIORITY,
};
use crate::packet::{format_mac, Nw, Packet};

/// Identifies one switch session. Unique for the life of the process.
pub type ConnectionId = u64;

/// Capability to send commands to exactly one switch.
pub trait SwitchConnection {
    fn connection_id(&self) -> ConnectionId;

    /// Datapath id reported by the switch in its FEATURES_REPLY.
    fn datapath_id(&self) -> u64;

    /// Send a message to the switch under transaction id `xid`.
    fn send_message(&mut self, xid: u32, msg: Message) -> Result<()>;

    fn send_flow_mod(&mut self, xid: u32, flow_mod: FlowMod) -> Result<()> {
        self.send_message(xid, Message::FlowMod(flow_mod))
    }

    fn send_packet_out(&mut self, xid: u32, pkt: PacketOut) -> Result<()> {
        self.send_message(xid, Message::PacketOut(pkt))
    }
}

/// Flow parameters for rules installed by a `SwitchAgent`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct LearningConfig {
    /// Seconds of inactivity before an installed rule expires.
    pub idle_timeout: u16,
    /// Seconds after installation before a rule expires regardless of traffic.
    pub hard_timeout: u16,
    pub priority: u16,
}

impl Default for LearningConfig {
    fn default() -> Self {
        LearningConfig {
            idle_timeout: 10,
            hard_timeout: 30,
            priority: DEFAULT_PRIORITY,
        }
    }
}

/// A PACKET_IN together with the result of decoding its frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PacketInEvent {
    pub packet_in: PacketIn,
    /// `None` when the frame could not be decoded.
    pub frame: Option<Packet>,
}

impl PacketInEvent {
    pub fn decode(packet_in: PacketIn) -> PacketInEvent {
        let frame = match Packet::parse(packet_in.input_payload.bytes()) {
            Ok(pkt) => Some(pkt),
            Err(e) => {
                debug!(error = %e, port = packet_in.port, "frame did not decode");
                None
            }
        };
        PacketInEvent { packet_in, frame }
    }

    pub fn is_decoded(&self) -> bool {
        self.frame.is_some()
    }
}

pub fn arp_opcode_name(oper: u16) -> Option<&'static str> {
    match oper {
        1 => Some("REQUEST"),
        2 => Some("REPLY"),
        3 => Some("REV_REQUEST"),
        4 => Some("REV_REPLY"),
        _ => None,
    }
}

pub fn ipv4_protocol_name(proto: u8) -> Option<&'static str> {
    match proto {
        1 => Some("ICMP_PROTOCOL"),
        2 => Some("IGMP_PROTOCOL"),
        4 => Some("IPv4"),
        6 => Some("TCP_PROTOCOL"),
        17 => Some("UDP_PROTOCOL"),
        _ => None,
    }
}

/// Render a datapath id as dash-separated hex of its low six bytes, with
/// the upper 16 bits appended as `|<decimal>` when they are non-zero.
pub fn dpid_to_string(dpid: u64) -> String {
    let bytes = dpid.to_be_bytes();
    let mut s = bytes[2..]
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect::<Vec<_>>()
        .join("-");
    let high = (dpid >> 48) as u16;
    if high != 0 {
        s.push_str(&format!("|{}", high));
    }
    s
}

/// Snapshot of one agent for operator tooling.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SwitchStatus {
    pub connection_id: ConnectionId,
    pub dpid: String,
    /// Learned `(mac, port)` pairs sorted by MAC.
    pub learned: Vec<(u64, u16)>,
}

impl fmt::Display for SwitchStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "connection {} dpid {} ({} hosts)",
            self.connection_id,
            self.dpid,
            self.learned.len()
        )?;
        for &(mac, port) in &self.learned {
            write!(f, "\n  {} -> port {}", format_mac(mac), port)?;
        }
        Ok(())
    }
}

/// Implements L2 learning switch functionality for one connected switch.
///
/// Every PACKET_IN first teaches the agent which port the frame's source
/// address lives behind. If the destination is already known, a flow
/// matching the frame's headers is pushed to the switch and the frame is
/// resent out the learned port; otherwise the frame is flooded.
pub struct SwitchAgent<C> {
    connection: C,
    known_hosts: HashMap<u64, u16>,
    config: LearningConfig,
}

impl<C: SwitchConnection> SwitchAgent<C> {
    pub fn new(connection: C, config: LearningConfig) -> SwitchAgent<C> {
        info!(
            connection = connection.connection_id(),
            dpid = %dpid_to_string(connection.datapath_id()),
            "Switch Active"
        );
        SwitchAgent {
            connection,
            known_hosts: HashMap::new(),
            config,
        }
    }

    pub fn connection(&self) -> &C {
        &self.connection
    }

    pub fn known_hosts(&self) -> &HashMap<u64, u16> {
        &self.known_hosts
    }

    /// Port on which `mac` was last seen as a source.
    pub fn lookup(&self, mac: u64) -> Option<u16> {
        self.known_hosts.get(&mac).copied()
    }

    pub fn dpid_string(&self) -> String {
        let dpid = dpid_to_string(self.connection.datapath_id());
        debug!(dpid = %dpid, "DPID");
        dpid
    }

    pub fn status(&self) -> SwitchStatus {
        let mut learned: Vec<(u64, u16)> =
            self.known_hosts.iter().map(|(m, p)| (*m, *p)).collect();
        learned.sort_unstable();
        SwitchStatus {
            connection_id: self.connection.connection_id(),
            dpid: self.dpid_string(),
            learned,
        }
    }

    /// Learn from and forward a frame the switch could not match.
    pub fn handle_packet_in(&mut self, event: &PacketInEvent) {
        let pkt = match event.frame {
            Some(ref pkt) => pkt,
            None => {
                warn!(
                    connection = self.connection.connection_id(),
                    port = event.packet_in.port,
                    "Ignoring incomplete packet"
                );
                return;
            }
        };
        Self::log_frame(pkt);
        self.learning_packet_in(pkt, event.packet_in.port);
        self.routing_packet_in(pkt, &event.packet_in);
    }

    fn log_frame(pkt: &Packet) {
        match pkt.nw {
            Nw::Ip(ref ip) => {
                let proto = ip.proto();
                let protocol = ipv4_protocol_name(proto)
                    .map_or_else(|| proto.to_string(), str::to_string);
                info!(
                    protocol = %protocol,
                    src = %ip.src_addr(),
                    dst = %ip.dst_addr(),
                    "IP Packet detected"
                );
            }
            Nw::Arp(ref arp) => {
                let opcode = arp_opcode_name(arp.oper)
                    .map_or_else(|| arp.oper.to_string(), str::to_string);
                info!(
                    opcode = %opcode,
                    src = %format_mac(arp.sha),
                    dst = %format_mac(arp.tha),
                    "ARP Packet detected"
                );
            }
            Nw::Unparsable(..) => (),
        }
    }

    fn learning_packet_in(&mut self, pkt: &Packet, port: u16) {
        self.known_hosts.insert(pkt.dl_src, port);
    }

    fn routing_packet_in(&mut self, pkt: &Packet, packet_in: &PacketIn) {
        match self.lookup(pkt.dl_dst) {
            Some(dst_port) => {
                debug!(
                    "Installing {}.{} -> {}.{}",
                    format_mac(pkt.dl_src),
                    packet_in.port,
                    format_mac(pkt.dl_dst),
                    dst_port
                );
                let mut flow = add_flow(
                    self.config.priority,
                    Pattern::from_packet(pkt),
                    vec![Action::Output(PseudoPort::PhysicalPort(dst_port))],
                );
                flow.idle_timeout = Timeout::of_int(self.config.idle_timeout);
                flow.hard_timeout = Timeout::of_int(self.config.hard_timeout);
                if let Err(e) = self.connection.send_flow_mod(0, flow) {
                    warn!(error = %e, "failed to install flow");
                }
                self.resend_packet(packet_in, PseudoPort::PhysicalPort(dst_port));
            }
            None => {
                debug!(dst = %format_mac(pkt.dl_dst), "Flooding");
                self.resend_packet(packet_in, PseudoPort::AllPorts);
            }
        }
    }

    /// Instruct the switch to resend a frame it sent us, out `out_port`.
    fn resend_packet(&mut self, packet_in: &PacketIn, out_port: PseudoPort) {
        let pkt_out = PacketOut {
            output_payload: packet_in.input_payload.clone(),
            port_id: Some(packet_in.port),
            apply_actions: vec![Action::Output(out_port)],
        };
        if let Err(e) = self.connection.send_packet_out(0, pkt_out) {
            warn!(error = %e, "failed to send packet out");
        }
    }

    /// Flood a bare IPv4 datagram from `src` to `dst`, independent of the
    /// learned table. Used to test connectivity without hosts generating traffic.
    pub fn send_ip_probe(&mut self, src: Ipv4Addr, dst: Ipv4Addr) -> Result<()> {
        let frame = Packet::ipv4_probe(src, dst).marshal()?;
        let pkt_out = PacketOut {
            output_payload: Payload::NotBuffered(frame),
            port_id: None,
            apply_actions: vec![Action::Output(PseudoPort::AllPorts)],
        };
        self.connection.send_packet_out(0, pkt_out)
    }

    pub fn handle_echo_request(&mut self, xid: u32, payload: Vec<u8>) {
        if let Err(e) = self.connection.send_message(xid, Message::EchoReply(payload)) {
            warn!(error = %e, "failed to answer echo request");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::openflow0x01::{PacketInReason, Mask};
    use crate::packet::{bytes_of_mac, Arp, ETH_TYPE_ARP};
    use pretty_assertions::assert_eq;

    struct Recorder {
        sent: Vec<(u32, Message)>,
        fail: bool,
    }

    impl SwitchConnection for Recorder {
        fn connection_id(&self) -> ConnectionId {
            1
        }

        fn datapath_id(&self) -> u64 {
            0x1
        }

        fn send_message(&mut self, xid: u32, msg: Message) -> Result<()> {
            if self.fail {
                return Err(Error::Io(std::io::ErrorKind::BrokenPipe.into()));
            }
            self.sent.push((xid, msg));
            Ok(())
        }
    }

    fn agent() -> SwitchAgent<Recorder> {
        SwitchAgent::new(
            Recorder {
                sent: vec![],
                fail: false,
            },
            LearningConfig::default(),
        )
    }

    fn frame(src: u64, dst: u64) -> Vec<u8> {
        let mut v = bytes_of_mac(dst).to_vec();
        v.extend_from_slice(&bytes_of_mac(src));
        v.extend_from_slice(&[0x88, 0xb5, 0xde, 0xad]);
        v
    }

    fn event(src: u64, dst: u64, port: u16) -> PacketInEvent {
        let data = frame(src, dst);
        PacketInEvent::decode(PacketIn {
            total_len: data.len() as u16,
            input_payload: Payload::NotBuffered(data),
            port,
            reason: PacketInReason::NoMatch,
        })
    }

    #[test]
    fn unknown_destination_floods() {
        let mut sw = agent();
        let ev = event(0xaa, 0xbb, 1);
        sw.handle_packet_in(&ev);
        assert_eq!(sw.lookup(0xaa), Some(1));
        assert_eq!(
            sw.connection().sent,
            vec![(
                0,
                Message::PacketOut(PacketOut {
                    output_payload: ev.packet_in.input_payload.clone(),
                    port_id: Some(1),
                    apply_actions: vec![Action::Output(PseudoPort::AllPorts)],
                })
            )]
        );
    }

    #[test]
    fn known_destination_installs_and_resends() {
        let mut sw = agent();
        sw.handle_packet_in(&event(0xaa, 0xbb, 1));
        let ev = event(0xbb, 0xaa, 2);
        sw.handle_packet_in(&ev);
        let sent = &sw.connection().sent[1..];
        assert_eq!(sent.len(), 2);
        match sent[0].1 {
            Message::FlowMod(ref fm) => {
                assert_eq!(fm.idle_timeout, Timeout::ExpiresAfter(10));
                assert_eq!(fm.hard_timeout, Timeout::ExpiresAfter(30));
                assert_eq!(fm.priority, DEFAULT_PRIORITY);
                assert_eq!(fm.actions, vec![Action::Output(PseudoPort::PhysicalPort(1))]);
                assert_eq!(fm.pattern.dl_src, Some(0xbb));
                assert_eq!(fm.pattern.dl_dst, Some(0xaa));
                assert_eq!(fm.pattern.dl_typ, Some(0x88b5));
                assert_eq!(fm.pattern.dl_vlan, Some(None));
                assert_eq!(fm.pattern.in_port, None);
            }
            ref other => panic!("expected flow mod, got {:?}", other),
        }
        assert_eq!(
            sent[1].1,
            Message::PacketOut(PacketOut {
                output_payload: ev.packet_in.input_payload.clone(),
                port_id: Some(2),
                apply_actions: vec![Action::Output(PseudoPort::PhysicalPort(1))],
            })
        );
    }

    #[test]
    fn same_port_destination_still_installs() {
        let mut sw = agent();
        sw.handle_packet_in(&event(0xaa, 0xbb, 3));
        sw.handle_packet_in(&event(0xbb, 0xaa, 3));
        assert!(matches!(sw.connection().sent[1].1, Message::FlowMod(ref fm)
            if fm.actions == vec![Action::Output(PseudoPort::PhysicalPort(3))]));
    }

    #[test]
    fn source_equal_to_destination_sees_fresh_entry() {
        let mut sw = agent();
        sw.handle_packet_in(&event(0xcc, 0xcc, 4));
        assert_eq!(sw.connection().sent.len(), 2);
        assert!(matches!(sw.connection().sent[0].1, Message::FlowMod(_)));
    }

    #[test]
    fn relearning_overwrites_port() {
        let mut sw = agent();
        sw.handle_packet_in(&event(0xaa, 0xbb, 1));
        sw.handle_packet_in(&event(0xaa, 0xbb, 1));
        assert_eq!(sw.known_hosts().len(), 1);
        assert_eq!(sw.lookup(0xaa), Some(1));
        sw.handle_packet_in(&event(0xaa, 0xbb, 5));
        assert_eq!(sw.known_hosts().len(), 1);
        assert_eq!(sw.lookup(0xaa), Some(5));
    }

    #[test]
    fn incomplete_frame_is_ignored() {
        let mut sw = agent();
        let ev = PacketInEvent::decode(PacketIn {
            input_payload: Payload::NotBuffered(vec![0xff; 6]),
            total_len: 6,
            port: 1,
            reason: PacketInReason::NoMatch,
        });
        assert!(!ev.is_decoded());
        sw.handle_packet_in(&ev);
        assert!(sw.known_hosts().is_empty());
        assert!(sw.connection().sent.is_empty());
    }

    #[test]
    fn buffered_frames_are_resent_by_buffer_id() {
        let mut sw = agent();
        let data = frame(0xaa, 0xbb);
        let ev = PacketInEvent::decode(PacketIn {
            total_len: data.len() as u16,
            input_payload: Payload::Buffered(42, data),
            port: 7,
            reason: PacketInReason::NoMatch,
        });
        sw.handle_packet_in(&ev);
        match sw.connection().sent[0].1 {
            Message::PacketOut(ref po) => assert_eq!(po.output_payload.buffer_id(), Some(42)),
            ref other => panic!("expected packet out, got {:?}", other),
        }
    }

    #[test]
    fn send_failures_do_not_stop_learning() {
        let mut sw = SwitchAgent::new(
            Recorder {
                sent: vec![],
                fail: true,
            },
            LearningConfig::default(),
        );
        sw.handle_packet_in(&event(0xaa, 0xbb, 1));
        assert_eq!(sw.lookup(0xaa), Some(1));
    }

    #[test]
    fn unknown_arp_opcode_still_forwards() {
        let mut sw = agent();
        let pkt = Packet {
            dl_src: 0x0a,
            dl_dst: 0x0b,
            dl_typ: ETH_TYPE_ARP,
            dl_vlan: None,
            dl_vlan_dei: false,
            dl_vlan_pcp: 0,
            nw: Nw::Arp(Arp {
                oper: 0x0109,
                sha: 0x0a,
                spa: 0x0a00_0001,
                tha: 0x0b,
                tpa: 0x0a00_0002,
            }),
        };
        let data = pkt.marshal().unwrap();
        sw.handle_packet_in(&event(0x0b, 0x0c, 2));
        sw.handle_packet_in(&PacketInEvent::decode(PacketIn {
            total_len: data.len() as u16,
            input_payload: Payload::NotBuffered(data),
            port: 1,
            reason: PacketInReason::NoMatch,
        }));
        match sw.connection().sent[1].1 {
            Message::FlowMod(ref fm) => {
                assert_eq!(fm.pattern.nw_proto, None);
                assert_eq!(
                    fm.pattern.nw_src,
                    Some(Mask {
                        value: 0x0a00_0001,
                        mask: None
                    })
                );
            }
            ref other => panic!("expected flow mod, got {:?}", other),
        }
    }

    #[test]
    fn ip_probe_floods_without_learning() {
        let mut sw = agent();
        sw.send_ip_probe(Ipv4Addr::new(10, 0, 0, 1), Ipv4Addr::new(10, 0, 0, 2))
            .unwrap();
        assert!(sw.known_hosts().is_empty());
        match sw.connection().sent[0].1 {
            Message::PacketOut(ref po) => {
                assert_eq!(po.port_id, None);
                assert_eq!(po.apply_actions, vec![Action::Output(PseudoPort::AllPorts)]);
                let pkt = Packet::parse(po.output_payload.bytes()).unwrap();
                assert!(matches!(pkt.nw, Nw::Ip(ref ip) if ip.dst_addr() == Ipv4Addr::new(10, 0, 0, 2)));
            }
            ref other => panic!("expected packet out, got {:?}", other),
        }
    }

    #[test]
    fn echo_request_gets_matching_reply() {
        let mut sw = agent();
        sw.handle_echo_request(9, vec![1, 2]);
        assert_eq!(sw.connection().sent, vec![(9, Message::EchoReply(vec![1, 2]))]);
    }

    #[test]
    fn dpid_formatting() {
        assert_eq!(dpid_to_string(1), "00-00-00-00-00-01");
        assert_eq!(dpid_to_string(0x0001_0000_0000_00ff), "00-00-00-00-00-ff|1");
    }

    #[test]
    fn lookup_tables_fall_back_to_none() {
        assert_eq!(ipv4_protocol_name(6), Some("TCP_PROTOCOL"));
        assert_eq!(ipv4_protocol_name(89), None);
        assert_eq!(arp_opcode_name(4), Some("REV_REPLY"));
        assert_eq!(arp_opcode_name(9), None);
    }

    #[test]
    fn status_lists_hosts_in_order() {
        let mut sw = agent();
        sw.handle_packet_in(&event(0x0c, 0xff, 3));
        sw.handle_packet_in(&event(0x0a, 0xff, 1));
        let status = sw.status();
        assert_eq!(status.learned, vec![(0x0a, 1), (0x0c, 3)]);
        assert_eq!(status.dpid, "00-00-00-00-00-01");
        assert!(status.to_string().contains("00:00:00:00:00:0a -> port 1"));
    }
}
