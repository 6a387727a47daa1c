//! Query-port messages.
//!
//! Every datagram in either direction starts with a [`Header`]. Requests are
//! just the header; responses follow it with a payload whose shape depends on
//! the command echoed back in the header.

use bytes::Bytes;
use std::net::SocketAddr;
use ue2::{wire_struct, CodecResult, ColorizedString};

/// Protocol version sent in every request header.
pub const VERSION: i32 = 128;

/// Command byte of a query header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Command {
    /// Server info (name, map, player counts).
    Ping = 0,
    Rules = 1,
    Players = 2,
    /// Asks for rules and players in one go. The server still answers with
    /// separate `Rules` and `Players` datagrams.
    RulesAndPlayers = 3,
}

impl TryFrom<u8> for Command {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Command::Ping),
            1 => Ok(Command::Rules),
            2 => Ok(Command::Players),
            3 => Ok(Command::RulesAndPlayers),
            other => Err(other),
        }
    }
}

wire_struct! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Header {
        pub version: i32,
        pub command: u8,
    }
}

impl Header {
    pub fn request(command: Command) -> Self {
        Self {
            version: VERSION,
            command: command as u8,
        }
    }

    pub fn command(&self) -> Option<Command> {
        Command::try_from(self.command).ok()
    }
}

wire_struct! {
    /// Payload of a `Ping` response.
    #[derive(Debug, Clone, Default, PartialEq, Eq)]
    pub struct ServerInfo {
        pub server_id: i32,
        pub ip: String,
        pub port: i32,
        pub query_port: i32,
        pub server_name: ColorizedString,
        pub map_name: ColorizedString,
        pub game_type: ColorizedString,
        pub current_players: i32,
        pub max_players: i32,
        pub ping: i32,
        pub flags: i32,
        pub skill_level: String,
    }
}

wire_struct! {
    /// One key/value pair of a `Rules` response. A response carries as many
    /// as fit in the datagram.
    #[derive(Debug, Clone, Default, PartialEq, Eq)]
    pub struct Rule {
        pub key: ColorizedString,
        pub value: ColorizedString,
    }
}

wire_struct! {
    /// One entry of a `Players` response, as sent.
    ///
    /// `stats_id` doubles as a team marker; see [`crate::roster`].
    #[derive(Debug, Clone, Default, PartialEq, Eq)]
    pub struct PlayerRecord {
        pub index: i32,
        pub name: ColorizedString,
        pub ping: i32,
        pub score: i32,
        pub stats_id: i32,
    }
}

/// Encodes the request datagram for `command`.
pub fn request(command: Command) -> CodecResult<Bytes> {
    ue2::to_bytes(&Header::request(command))
}

/// A datagram received on the session socket, split into header and payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub from: SocketAddr,
    pub header: Header,
    pub payload: Bytes,
}

impl Response {
    pub fn parse(from: SocketAddr, datagram: &[u8]) -> CodecResult<Self> {
        let mut buf = datagram;
        let header: Header = ue2::Decode::decode(&mut buf)?;

        Ok(Self {
            from,
            header,
            payload: Bytes::copy_from_slice(buf),
        })
    }
}

/// Servers answer queries on the port after their game port. `None` when the
/// game port is the last one.
pub fn query_addr(game_addr: SocketAddr) -> Option<SocketAddr> {
    let port = game_addr.port().checked_add(1)?;
    let mut addr = game_addr;
    addr.set_port(port);
    Some(addr)
}
