use crate::Error;
use log::{debug, warn};
use netlink_packet_route::{
    NetlinkHeader, NetlinkMessage, NetlinkPayload, RtnlMessage, NLM_F_ACK, NLM_F_DUMP,
    NLM_F_REQUEST,
};
use netlink_sys::constants::NETLINK_ROUTE;
use netlink_sys::{Socket, SocketAddr};
use std::io;

const RECEIVE_BUFFER_SIZE: usize = 32 * 1024;

/// Synchronous rtnetlink channel. One is opened per verb.
pub(super) struct RouteSocket {
    socket: Socket,
    sequence: u32,
}

impl RouteSocket {
    pub(super) fn connect() -> Result<Self, Error> {
        let mut socket = Socket::new(NETLINK_ROUTE)?;
        socket.bind_auto()?;
        socket.connect(&SocketAddr::new(0, 0))?;
        Ok(Self {
            socket,
            sequence: 0,
        })
    }

    /// Dumps a kernel table and returns every entry.
    pub(super) fn dump(&mut self, message: RtnlMessage) -> Result<Vec<RtnlMessage>, Error> {
        self.request(message, NLM_F_REQUEST | NLM_F_DUMP)
    }

    /// Sends a modification and waits for the kernel's acknowledgement.
    ///
    /// A negative acknowledgement is returned as [`Error::Os`] carrying the
    /// errno reported by the kernel.
    pub(super) fn execute(&mut self, message: RtnlMessage, flags: u16) -> Result<(), Error> {
        self.request(message, NLM_F_REQUEST | NLM_F_ACK | flags)
            .map(|_| ())
    }

    fn request(&mut self, message: RtnlMessage, flags: u16) -> Result<Vec<RtnlMessage>, Error> {
        self.sequence = self.sequence.wrapping_add(1);

        let mut req = NetlinkMessage {
            header: NetlinkHeader {
                flags,
                sequence_number: self.sequence,
                ..Default::default()
            },
            payload: NetlinkPayload::from(message),
        };
        req.finalize();

        let mut buf = vec![0; req.header.length as usize];
        req.serialize(&mut buf[..]);

        debug!(">>> {:?}", req);
        self.socket.send(&buf[..], 0)?;

        let mut replies = vec![];
        let mut receive_buffer = vec![0; RECEIVE_BUFFER_SIZE];

        loop {
            let size = self.socket.recv(&mut &mut receive_buffer[..], 0)?;
            let mut offset = 0;

            while offset < size {
                let msg: NetlinkMessage<RtnlMessage> =
                    NetlinkMessage::deserialize(&receive_buffer[offset..size])
                        .map_err(|_| Error::UnexpectedMetadata)?;
                let length = msg.header.length as usize;

                if msg.header.sequence_number != self.sequence {
                    warn!("Skipping reply to another request: {:?}", msg.header);
                } else {
                    match msg.payload {
                        NetlinkPayload::Done => return Ok(replies),
                        NetlinkPayload::Ack(_) => return Ok(replies),
                        NetlinkPayload::Error(err) if err.code == 0 => return Ok(replies),
                        NetlinkPayload::Error(err) => {
                            return Err(io::Error::from_raw_os_error(-err.code).into())
                        }
                        NetlinkPayload::InnerMessage(inner) => replies.push(inner),
                        other => warn!("Unexpected message: {:?}", other),
                    }
                }

                if length == 0 {
                    break;
                }
                // Messages in one datagram are 4-byte aligned.
                offset += (length + 3) & !3;
            }
        }
    }
}

/// Errno carried by a negative acknowledgement, if that is what `e` is.
pub(super) fn errno(e: &Error) -> Option<i32> {
    match e {
        Error::Os(e) => e.raw_os_error(),
        _ => None,
    }
}
