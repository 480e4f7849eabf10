//! # Packets
//!
//! The closed set of packet variants and their payload schemas.
//!
//! Every string field is written as a `u16` little-endian length followed by
//! UTF-8 bytes. Field order on the wire is the declaration order below.
//!
//! | Type | Byte | Payload |
//! |------|------|---------|
//! | `Register` | 0 | username, password, first_name, last_name |
//! | `Auth` | 1 | username, password |
//! | `Message` | 2 | first_name, last_name, from, text, chat_name, timestamp (i64 LE, ms) |
//! | `ServerResponse` | 3 | response_type (u8), status (u8), salt or message |
//! | `ChatList` | 4 | count (u32 LE), names |

use crate::core::cursor::ByteCursor;
use crate::core::frame;
use crate::error::{ProtocolError, Result};
use crate::protocol::dispatcher::{HandlerContext, Handling, PacketHandler};
use serde::{Deserialize, Serialize};

/// Wire tag selecting a payload schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum PacketType {
    Register = 0,
    Auth = 1,
    Message = 2,
    ServerResponse = 3,
    ChatList = 4,
}

impl PacketType {
    pub fn as_byte(self) -> u8 {
        self as u8
    }

    pub fn from_byte(byte: u8) -> Result<Self> {
        match byte {
            0 => Ok(PacketType::Register),
            1 => Ok(PacketType::Auth),
            2 => Ok(PacketType::Message),
            3 => Ok(PacketType::ServerResponse),
            4 => Ok(PacketType::ChatList),
            other => Err(ProtocolError::UnknownPacketType(other)),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            PacketType::Register => "Register",
            PacketType::Auth => "Auth",
            PacketType::Message => "Message",
            PacketType::ServerResponse => "ServerResponse",
            PacketType::ChatList => "ChatList",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Register {
    pub username: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
}

/// Login request. `password` is empty on the first round and carries the
/// salted hash on the second.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Auth {
    pub username: String,
    pub password: String,
}

impl Auth {
    /// First-round request asking the server for the user's salt.
    pub fn request_salt(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: String::new(),
        }
    }

    pub fn with_hash(username: impl Into<String>, hash: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: hash.into(),
        }
    }

    pub fn is_salt_request(&self) -> bool {
        self.password.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub first_name: String,
    pub last_name: String,
    pub from: String,
    pub text: String,
    pub chat_name: String,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatList {
    pub chat_names: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum ResponseType {
    Auth = 0,
    Register = 1,
}

impl ResponseType {
    fn from_byte(byte: u8) -> Result<Self> {
        match byte {
            0 => Ok(ResponseType::Auth),
            1 => Ok(ResponseType::Register),
            value => Err(ProtocolError::InvalidValue {
                field: "response_type",
                value,
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum ResponseStatus {
    Success = 0,
    SuccessWithSalt = 1,
    Failed = 2,
}

impl ResponseStatus {
    fn from_byte(byte: u8) -> Result<Self> {
        match byte {
            0 => Ok(ResponseStatus::Success),
            1 => Ok(ResponseStatus::SuccessWithSalt),
            2 => Ok(ResponseStatus::Failed),
            value => Err(ProtocolError::InvalidValue {
                field: "status",
                value,
            }),
        }
    }
}

/// Server reply to `Auth` and `Register`.
///
/// Only one of `salt` and `message` is on the wire: `salt` for
/// `(Auth, SuccessWithSalt)`, `message` otherwise. The inactive field is
/// left empty by the constructors and by decoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerResponse {
    pub response_type: ResponseType,
    pub status: ResponseStatus,
    pub message: String,
    pub salt: String,
}

impl ServerResponse {
    pub fn new(response_type: ResponseType, status: ResponseStatus, message: impl Into<String>) -> Self {
        Self {
            response_type,
            status,
            message: message.into(),
            salt: String::new(),
        }
    }

    /// First-round login reply carrying the stored salt.
    pub fn auth_salt(salt: impl Into<String>) -> Self {
        Self {
            response_type: ResponseType::Auth,
            status: ResponseStatus::SuccessWithSalt,
            message: String::new(),
            salt: salt.into(),
        }
    }

    pub fn auth_success() -> Self {
        Self::new(ResponseType::Auth, ResponseStatus::Success, "")
    }

    pub fn auth_failed(message: impl Into<String>) -> Self {
        Self::new(ResponseType::Auth, ResponseStatus::Failed, message)
    }

    pub fn register_success() -> Self {
        Self::new(ResponseType::Register, ResponseStatus::Success, "")
    }

    pub fn register_failed(message: impl Into<String>) -> Self {
        Self::new(ResponseType::Register, ResponseStatus::Failed, message)
    }

    /// Whether the payload carries the salt instead of a message.
    pub fn carries_salt(&self) -> bool {
        self.response_type == ResponseType::Auth && self.status == ResponseStatus::SuccessWithSalt
    }

    /// Implied by `(Register, Success)`; never transmitted.
    pub fn register_succeeded(&self) -> bool {
        self.response_type == ResponseType::Register && self.status == ResponseStatus::Success
    }
}

/// One decoded packet. Packets are plain values with no cross-references.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Packet {
    Register(Register),
    Auth(Auth),
    Message(Message),
    ServerResponse(ServerResponse),
    ChatList(ChatList),
}

impl Packet {
    pub fn packet_type(&self) -> PacketType {
        match self {
            Packet::Register(_) => PacketType::Register,
            Packet::Auth(_) => PacketType::Auth,
            Packet::Message(_) => PacketType::Message,
            Packet::ServerResponse(_) => PacketType::ServerResponse,
            Packet::ChatList(_) => PacketType::ChatList,
        }
    }

    /// Serialize the payload fields in schema order.
    pub fn encode_payload(&self, out: &mut ByteCursor) -> Result<()> {
        match self {
            Packet::Register(p) => {
                out.write_string(&p.username)?;
                out.write_string(&p.password)?;
                out.write_string(&p.first_name)?;
                out.write_string(&p.last_name)?;
            }
            Packet::Auth(p) => {
                out.write_string(&p.username)?;
                out.write_string(&p.password)?;
            }
            Packet::Message(p) => {
                out.write_string(&p.first_name)?;
                out.write_string(&p.last_name)?;
                out.write_string(&p.from)?;
                out.write_string(&p.text)?;
                out.write_string(&p.chat_name)?;
                out.write_i64_le(p.timestamp);
            }
            Packet::ServerResponse(p) => {
                out.write_u8(p.response_type as u8);
                out.write_u8(p.status as u8);
                if p.carries_salt() {
                    out.write_string(&p.salt)?;
                } else {
                    out.write_string(&p.message)?;
                }
            }
            Packet::ChatList(p) => {
                let count = u32::try_from(p.chat_names.len())
                    .map_err(|_| ProtocolError::OversizedPacket(p.chat_names.len()))?;
                out.write_u32_le(count);
                for name in &p.chat_names {
                    out.write_string(name)?;
                }
            }
        }
        Ok(())
    }

    /// Parse a payload according to the schema selected by `packet_type`.
    pub fn decode_payload(packet_type: PacketType, payload: &mut ByteCursor) -> Result<Self> {
        let packet = match packet_type {
            PacketType::Register => Packet::Register(Register {
                username: payload.read_string()?,
                password: payload.read_string()?,
                first_name: payload.read_string()?,
                last_name: payload.read_string()?,
            }),
            PacketType::Auth => Packet::Auth(Auth {
                username: payload.read_string()?,
                password: payload.read_string()?,
            }),
            PacketType::Message => Packet::Message(Message {
                first_name: payload.read_string()?,
                last_name: payload.read_string()?,
                from: payload.read_string()?,
                text: payload.read_string()?,
                chat_name: payload.read_string()?,
                timestamp: payload.read_i64_le()?,
            }),
            PacketType::ServerResponse => {
                let response_type = ResponseType::from_byte(payload.read_u8()?)?;
                let status = ResponseStatus::from_byte(payload.read_u8()?)?;
                let mut response = ServerResponse::new(response_type, status, "");
                if response.carries_salt() {
                    response.salt = payload.read_string()?;
                } else {
                    response.message = payload.read_string()?;
                }
                Packet::ServerResponse(response)
            }
            PacketType::ChatList => {
                let count = payload.read_u32_le()? as usize;
                // Each name needs at least its two-byte length prefix.
                let mut chat_names = Vec::with_capacity(count.min(payload.available_bytes() / 2));
                for _ in 0..count {
                    chat_names.push(payload.read_string()?);
                }
                Packet::ChatList(ChatList { chat_names })
            }
        };
        Ok(packet)
    }

    /// Encode into a complete frame: header followed by payload.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        frame::encode(self)
    }

    /// Decode one complete frame.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        frame::decode(bytes)
    }

    /// Double dispatch into the handler method for this variant.
    pub fn accept(&self, handler: &dyn PacketHandler, ctx: &mut HandlerContext<'_>) -> Result<Handling> {
        match self {
            Packet::Register(p) => handler.on_register(ctx, p),
            Packet::Auth(p) => handler.on_auth(ctx, p),
            Packet::Message(p) => handler.on_message(ctx, p),
            Packet::ServerResponse(p) => handler.on_server_response(ctx, p),
            Packet::ChatList(p) => handler.on_chat_list(ctx, p),
        }
    }
}

impl From<Register> for Packet {
    fn from(p: Register) -> Self {
        Packet::Register(p)
    }
}

impl From<Auth> for Packet {
    fn from(p: Auth) -> Self {
        Packet::Auth(p)
    }
}

impl From<Message> for Packet {
    fn from(p: Message) -> Self {
        Packet::Message(p)
    }
}

impl From<ServerResponse> for Packet {
    fn from(p: ServerResponse) -> Self {
        Packet::ServerResponse(p)
    }
}

impl From<ChatList> for Packet {
    fn from(p: ChatList) -> Self {
        Packet::ChatList(p)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn payload_of(packet: &Packet) -> ByteCursor {
        let mut cursor = ByteCursor::new();
        packet.encode_payload(&mut cursor).unwrap();
        cursor
    }

    #[test]
    fn test_packet_type_bytes() {
        for (byte, ty) in [
            (0, PacketType::Register),
            (1, PacketType::Auth),
            (2, PacketType::Message),
            (3, PacketType::ServerResponse),
            (4, PacketType::ChatList),
        ] {
            assert_eq!(ty.as_byte(), byte);
            assert_eq!(PacketType::from_byte(byte).unwrap(), ty);
        }
        assert!(matches!(
            PacketType::from_byte(99),
            Err(ProtocolError::UnknownPacketType(99))
        ));
    }

    #[test]
    fn test_auth_payload_layout() {
        let packet = Packet::Auth(Auth::request_salt("al"));
        let cursor = payload_of(&packet);
        assert_eq!(cursor.as_slice(), &[2, 0, b'a', b'l', 0, 0]);
    }

    #[test]
    fn test_salt_response_omits_message() {
        let mut response = ServerResponse::auth_salt("s1");
        response.message = "ignored".into();
        let cursor = payload_of(&Packet::ServerResponse(response));
        assert_eq!(cursor.as_slice(), &[0, 1, 2, 0, b's', b'1']);
    }

    #[test]
    fn test_register_success_spends_no_flag_byte() {
        let response = ServerResponse::register_success();
        assert!(response.register_succeeded());
        let cursor = payload_of(&Packet::ServerResponse(response.clone()));
        // type, status, empty message
        assert_eq!(cursor.as_slice(), &[1, 0, 0, 0]);

        let mut cursor = cursor;
        let decoded = Packet::decode_payload(PacketType::ServerResponse, &mut cursor).unwrap();
        assert_eq!(decoded, Packet::ServerResponse(response));
    }

    #[test]
    fn test_register_failed_is_not_success() {
        assert!(!ServerResponse::register_failed("username taken").register_succeeded());
        assert!(!ServerResponse::auth_success().register_succeeded());
    }

    #[test]
    fn test_message_payload_roundtrip() {
        let packet = Packet::Message(Message {
            first_name: "Алиса".into(),
            last_name: "B".into(),
            from: "alice".into(),
            text: "hi 👋".into(),
            chat_name: "general".into(),
            timestamp: 1_700_000_000_123,
        });
        let mut cursor = payload_of(&packet);
        let decoded = Packet::decode_payload(PacketType::Message, &mut cursor).unwrap();
        assert_eq!(decoded, packet);
        assert!(cursor.is_end());
    }

    #[test]
    fn test_chat_list_roundtrip_preserves_order() {
        let packet = Packet::ChatList(ChatList {
            chat_names: vec!["zeta".into(), "".into(), "alpha".into()],
        });
        let mut cursor = payload_of(&packet);
        let decoded = Packet::decode_payload(PacketType::ChatList, &mut cursor).unwrap();
        assert_eq!(decoded, packet);
    }

    #[test]
    fn test_chat_list_count_larger_than_payload() {
        let mut cursor = ByteCursor::new();
        cursor.write_u32_le(u32::MAX);
        cursor.write_string("only one").unwrap();
        assert!(matches!(
            Packet::decode_payload(PacketType::ChatList, &mut cursor),
            Err(ProtocolError::OutOfBounds { .. })
        ));
    }

    #[test]
    fn test_invalid_response_status() {
        let mut cursor = ByteCursor::from_bytes(vec![0, 7, 0, 0]);
        assert!(matches!(
            Packet::decode_payload(PacketType::ServerResponse, &mut cursor),
            Err(ProtocolError::InvalidValue {
                field: "status",
                value: 7
            })
        ));
    }

    #[test]
    fn test_short_register_payload() {
        let mut cursor = payload_of(&Packet::Auth(Auth::with_hash("bob", "h")));
        assert!(Packet::decode_payload(PacketType::Register, &mut cursor).is_err());
    }
}
