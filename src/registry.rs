//! The set of live switch agents and the sequential dispatcher that feeds them.

use crossbeam_channel::Receiver;
use tracing::{debug, info, warn};

use crate::learning_switch::{
    ConnectionId, LearningConfig, PacketInEvent, SwitchAgent, SwitchConnection, SwitchStatus,
};
use crate::openflow0x01::message::Message;

/// Notifications delivered by the transport layer.
pub enum ControllerEvent<C> {
    /// A switch finished its handshake.
    ConnectionUp(C),
    PacketIn(ConnectionId, PacketInEvent),
    /// Any other message, with its transaction id.
    Message(ConnectionId, u32, Message),
    ConnectionDown(ConnectionId),
}

/// Owns one `SwitchAgent` per switch connection, in connection order.
///
/// Agents are never removed: a switch that disconnects and comes back gets
/// a second, independent agent.
pub struct ControllerRegistry<C> {
    agents: Vec<SwitchAgent<C>>,
    config: LearningConfig,
}

impl<C: SwitchConnection> ControllerRegistry<C> {
    pub fn new(config: LearningConfig) -> ControllerRegistry<C> {
        ControllerRegistry {
            agents: Vec::new(),
            config,
        }
    }

    /// Every agent created so far, oldest first.
    pub fn agents(&self) -> &[SwitchAgent<C>] {
        &self.agents
    }

    pub fn statuses(&self) -> Vec<SwitchStatus> {
        self.agents.iter().map(SwitchAgent::status).collect()
    }

    pub fn on_connection_established(&mut self, connection: C) -> &SwitchAgent<C> {
        debug!(connection = connection.connection_id(), "Controlling switch");
        let idx = self.agents.len();
        self.agents.push(SwitchAgent::new(connection, self.config));
        info!(switches = self.agents.len(), "registry updated");
        &self.agents[idx]
    }

    fn agent_mut(&mut self, id: ConnectionId) -> Option<&mut SwitchAgent<C>> {
        self.agents
            .iter_mut()
            .rev()
            .find(|agent| agent.connection().connection_id() == id)
    }

    /// Hand a packet-in to the agent bound to `id`. Returns false when no
    /// agent owns that connection.
    pub fn on_packet_in(&mut self, id: ConnectionId, event: &PacketInEvent) -> bool {
        match self.agent_mut(id) {
            Some(agent) => {
                agent.handle_packet_in(event);
                true
            }
            None => {
                warn!(connection = id, "packet in for unknown connection");
                false
            }
        }
    }

    fn on_message(&mut self, id: ConnectionId, xid: u32, msg: Message) {
        match msg {
            Message::PacketIn(packet_in) => {
                self.on_packet_in(id, &PacketInEvent::decode(packet_in));
            }
            Message::EchoRequest(payload) => match self.agent_mut(id) {
                Some(agent) => agent.handle_echo_request(xid, payload),
                None => warn!(connection = id, "echo request for unknown connection"),
            },
            Message::PortStatus(sts) => {
                info!(
                    connection = id,
                    port = sts.desc.port_no,
                    name = %sts.desc.name,
                    reason = ?sts.reason,
                    down = sts.desc.state.down,
                    "port status"
                );
            }
            Message::Error(err) => {
                warn!(
                    connection = id,
                    xid,
                    typ = err.typ,
                    code = err.code,
                    "switch reported error"
                );
            }
            other => debug!(connection = id, xid, message = ?other, "ignoring message"),
        }
    }

    /// Process one transport notification to completion.
    pub fn dispatch(&mut self, event: ControllerEvent<C>) {
        match event {
            ControllerEvent::ConnectionUp(connection) => {
                self.on_connection_established(connection);
            }
            ControllerEvent::PacketIn(id, event) => {
                self.on_packet_in(id, &event);
            }
            ControllerEvent::Message(id, xid, msg) => self.on_message(id, xid, msg),
            ControllerEvent::ConnectionDown(id) => {
                info!(connection = id, "switch disconnected, agent retained");
            }
        }
    }

    /// Dispatch events one at a time until every sender has hung up.
    pub fn run(&mut self, events: &Receiver<ControllerEvent<C>>) {
        for event in events.iter() {
            self.dispatch(event);
        }
        info!(switches = self.agents.len(), "event source closed");
    }
}
