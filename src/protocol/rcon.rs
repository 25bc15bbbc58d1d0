//! Source RCON packet codec, as spoken by Minecraft servers.
//!
//! Wire layout, all integers little-endian:
//! `length: i32 | id: i32 | type: i32 | body | 0x00 | 0x00`
//! where `length` counts everything after itself.

use bytes::{Buf, BufMut, BytesMut};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::{Decoder, Encoder, Framed};

use crate::common::error::ProtocolError;

/// Client login request.
pub const SERVERDATA_AUTH: i32 = 3;
/// Server reply to a login request. Shares its value with `SERVERDATA_EXECCOMMAND`.
pub const SERVERDATA_AUTH_RESPONSE: i32 = 2;
/// Client command request.
pub const SERVERDATA_EXECCOMMAND: i32 = 2;
/// Server command output.
pub const SERVERDATA_RESPONSE_VALUE: i32 = 0;

/// Request id the server answers a failed login with.
pub const AUTH_FAILED_ID: i32 = -1;

/// id + type + two terminating NULs.
const HEADER_LEN: usize = 10;
/// Minecraft rejects client bodies longer than this.
pub const MAX_REQUEST_BODY: usize = 1446;
/// Minecraft splits responses into fragments of at most 4096 body bytes.
const MAX_RESPONSE_BODY: usize = 4096;

/// One RCON packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RconPacket {
    pub id: i32,
    pub kind: i32,
    pub body: String,
}

impl RconPacket {
    pub fn new(id: i32, kind: i32, body: impl Into<String>) -> Self {
        Self {
            id,
            kind,
            body: body.into(),
        }
    }

    pub fn login(id: i32, password: &str) -> Self {
        Self::new(id, SERVERDATA_AUTH, password)
    }

    pub fn exec(id: i32, command: &str) -> Self {
        Self::new(id, SERVERDATA_EXECCOMMAND, command)
    }

    /// A packet type the server does not handle. The server answers it with a
    /// single response carrying the same id, after any pending output, which
    /// makes it usable as an end-of-response marker.
    pub fn end_marker(id: i32) -> Self {
        Self::new(id, SERVERDATA_RESPONSE_VALUE, "")
    }
}

/// Codec for RCON packets.
#[derive(Debug, Default)]
pub struct RconCodec;

impl Decoder for RconCodec {
    type Item = RconPacket;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < 4 {
            return Ok(None);
        }

        let length = i32::from_le_bytes([src[0], src[1], src[2], src[3]]);
        if length < HEADER_LEN as i32 {
            return Err(ProtocolError::PacketTooShort {
                needed: HEADER_LEN,
                got: length.max(0) as usize,
            });
        }
        let length = length as usize;
        if length > HEADER_LEN + MAX_RESPONSE_BODY {
            return Err(ProtocolError::PacketTooLarge { size: length });
        }

        if src.len() < 4 + length {
            src.reserve(4 + length - src.len());
            return Ok(None);
        }

        src.advance(4);
        let id = src.get_i32_le();
        let kind = src.get_i32_le();
        let body = src.split_to(length - HEADER_LEN);
        let terminator = src.split_to(2);

        if terminator[..] != [0, 0] {
            return Err(ProtocolError::InvalidPacket {
                message: format!("packet {} is not NUL terminated", id),
            });
        }

        Ok(Some(RconPacket {
            id,
            kind,
            body: String::from_utf8_lossy(&body).into_owned(),
        }))
    }
}

impl Encoder<RconPacket> for RconCodec {
    type Error = ProtocolError;

    fn encode(&mut self, item: RconPacket, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let body = item.body.as_bytes();
        if body.len() > MAX_REQUEST_BODY {
            return Err(ProtocolError::PacketTooLarge {
                size: body.len() + HEADER_LEN,
            });
        }

        let length = body.len() + HEADER_LEN;
        dst.reserve(4 + length);
        dst.put_i32_le(length as i32);
        dst.put_i32_le(item.id);
        dst.put_i32_le(item.kind);
        dst.put_slice(body);
        dst.put_u8(0);
        dst.put_u8(0);

        Ok(())
    }
}

/// A framed RCON connection.
pub type RconConnection<S> = Framed<S, RconCodec>;

/// Create a new RCON connection from a stream.
pub fn new_rcon_connection<S: AsyncRead + AsyncWrite>(stream: S) -> RconConnection<S> {
    Framed::new(stream, RconCodec)
}
