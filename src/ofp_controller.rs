use std::net::TcpStream;

use crossbeam_channel::Sender;

use crate::error::Result;
use crate::learning_switch::ConnectionId;
use crate::ofp_message::OfpMessage;
use crate::registry::ControllerEvent;

/// OpenFlow Controller
///
/// Version-agnostic API for the transport side of an OpenFlow controller.
pub trait OfpController {
    /// OpenFlow message type supporting the same protocol version as the controller.
    type Message: OfpMessage;
    /// Connection capability handed to the registry once a switch is up.
    type Connection;

    /// Send a message to the node associated with the given `TcpStream`.
    fn send_message(xid: u32, msg: Self::Message, stream: &mut TcpStream) -> Result<()>;
    /// Perform handshake and loop reading incoming messages from client stream,
    /// publishing them as `ControllerEvent`s until the connection closes.
    fn handle_client_connected(
        id: ConnectionId,
        stream: TcpStream,
        events: Sender<ControllerEvent<Self::Connection>>,
    ) -> Result<()>;
}

pub mod openflow0x01 {
    use std::io::{ErrorKind, Read, Write};
    use std::net::TcpStream;

    use crossbeam_channel::Sender;
    use tracing::{debug, info, warn};

    use super::OfpController;
    use crate::error::{Error, Result};
    use crate::learning_switch::{dpid_to_string, ConnectionId, PacketInEvent, SwitchConnection};
    use crate::ofp_header::OfpHeader;
    use crate::ofp_message::OfpMessage;
    use crate::openflow0x01::message::Message;
    use crate::openflow0x01::{MsgCode, SwitchFeatures, OFP_VERSION};
    use crate::registry::ControllerEvent;

    /// Transaction ids used during the handshake.
    const HELLO_XID: u32 = 0;
    const FEATURES_XID: u32 = 1;

    /// Writer half of a switch session, owned by that switch's agent.
    pub struct TcpConnection {
        id: ConnectionId,
        datapath_id: u64,
        stream: TcpStream,
    }

    impl SwitchConnection for TcpConnection {
        fn connection_id(&self) -> ConnectionId {
            self.id
        }

        fn datapath_id(&self) -> u64 {
            self.datapath_id
        }

        fn send_message(&mut self, xid: u32, msg: Message) -> Result<()> {
            OF0x01Controller::send_message(xid, msg, &mut self.stream)
        }
    }

    /// Marshal `msg` and write it to `stream`.
    pub fn write_message<W: Write>(stream: &mut W, xid: u32, msg: Message) -> Result<()> {
        let bytes = Message::marshal(xid, msg)?;
        stream.write_all(&bytes)?;
        Ok(())
    }

    /// Read one framed message: its header and body bytes.
    pub fn read_frame<R: Read>(stream: &mut R) -> Result<(OfpHeader, Vec<u8>)> {
        let mut buf = [0u8; 8];
        stream.read_exact(&mut buf)?;
        let header = OfpHeader::parse(buf);
        let mut body = vec![0; header.body_length()?];
        stream.read_exact(&mut body)?;
        Ok((header, body))
    }

    /// Exchange HELLO and FEATURES with a freshly connected switch.
    pub fn handshake<S: Read + Write>(stream: &mut S) -> Result<SwitchFeatures> {
        write_message(stream, HELLO_XID, Message::Hello)?;
        let (header, _) = read_frame(stream)?;
        if header.type_code()? != MsgCode::Hello {
            return Err(Error::Handshake(format!(
                "expected HELLO, got {:?}",
                header.type_code()?
            )));
        }
        if header.version() < OFP_VERSION {
            return Err(Error::UnsupportedVersion(header.version()));
        }
        write_message(stream, FEATURES_XID, Message::FeaturesReq)?;
        loop {
            let (header, body) = read_frame(stream)?;
            match Message::parse(&header, &body)? {
                (_, Message::FeaturesReply(features)) => return Ok(features),
                (xid, Message::EchoRequest(payload)) => {
                    write_message(stream, xid, Message::EchoReply(payload))?
                }
                (_, Message::Error(err)) => {
                    return Err(Error::Handshake(format!(
                        "switch error type {} code {}",
                        err.typ, err.code
                    )))
                }
                (_, other) => debug!(message = ?other, "ignored during handshake"),
            }
        }
    }

    pub struct OF0x01Controller;

    impl OfpController for OF0x01Controller {
        type Message = Message;
        type Connection = TcpConnection;

        fn send_message(xid: u32, msg: Message, stream: &mut TcpStream) -> Result<()> {
            write_message(stream, xid, msg)
        }

        fn handle_client_connected(
            id: ConnectionId,
            mut stream: TcpStream,
            events: Sender<ControllerEvent<TcpConnection>>,
        ) -> Result<()> {
            let features = handshake(&mut stream)?;
            info!(
                connection = id,
                dpid = %dpid_to_string(features.datapath_id),
                ports = features.ports.len(),
                "switch connected"
            );
            let writer = TcpConnection {
                id,
                datapath_id: features.datapath_id,
                stream: stream.try_clone()?,
            };
            if events.send(ControllerEvent::ConnectionUp(writer)).is_err() {
                return Ok(());
            }
            loop {
                let (header, body) = match read_frame(&mut stream) {
                    Ok(frame) => frame,
                    Err(Error::Io(ref e)) if e.kind() == ErrorKind::UnexpectedEof => break,
                    Err(e) => {
                        warn!(connection = id, error = %e, "read failed");
                        break;
                    }
                };
                let event = match Message::parse(&header, &body) {
                    Ok((_, Message::PacketIn(packet_in))) => {
                        ControllerEvent::PacketIn(id, PacketInEvent::decode(packet_in))
                    }
                    Ok((xid, msg)) => ControllerEvent::Message(id, xid, msg),
                    Err(e) => {
                        warn!(connection = id, error = %e, "skipping unparsable message");
                        continue;
                    }
                };
                if events.send(event).is_err() {
                    return Ok(());
                }
            }
            let _ = events.send(ControllerEvent::ConnectionDown(id));
            Ok(())
        }
    }

}
