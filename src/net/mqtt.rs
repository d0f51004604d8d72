//! Minimal MQTT client frames: CONNECT, CONNACK, PUBLISH (QoS 0) and
//! DISCONNECT.

use core::fmt::{
    self,
    Write as _,
};

use heapless::String;

use super::transport::{
    NetError,
    Transport,
};

const CONNECT: u8 = 0x10;
const CONNACK: u8 = 0x20;
const PUBLISH: u8 = 0x30;
const DISCONNECT: u8 = 0xE0;

const FLAG_USERNAME: u8 = 0x80;
const FLAG_PASSWORD: u8 = 0x40;
const FLAG_CLEAN_SESSION: u8 = 0x02;

/// Largest remaining length this client accepts from a broker.
pub const MAX_INCOMING: usize = 128;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Version {
    /// MQTT 3.1, protocol name `MQIsdp`.
    #[default]
    V31,
    /// MQTT 3.1.1, protocol name `MQTT`.
    V311,
}

impl Version {
    const fn name(self) -> &'static str {
        match self {
            Self::V31 => "MQIsdp",
            Self::V311 => "MQTT",
        }
    }

    const fn level(self) -> u8 {
        match self {
            Self::V31 => 3,
            Self::V311 => 4,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MqttError {
    BufferTooSmall,
    /// A frame violated the wire format.
    Malformed,
    /// CONNACK with a non-zero return code.
    Refused(u8),
    Net(NetError),
}

impl From<NetError> for MqttError {
    fn from(e: NetError) -> Self {
        Self::Net(e)
    }
}

impl fmt::Display for MqttError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BufferTooSmall => f.write_str("frame does not fit the buffer"),
            Self::Malformed => f.write_str("malformed frame"),
            Self::Refused(code) => write!(f, "connection refused, code {code}"),
            Self::Net(e) => write!(f, "transport: {e}"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Connect<'a> {
    pub client_id: &'a str,
    pub username: Option<&'a str>,
    pub password: Option<&'a str>,
    pub keep_alive_secs: u16,
}

/// Sequential writer over an output buffer.
struct Writer<'a> {
    buf: &'a mut [u8],
    at: usize,
}

impl<'a> Writer<'a> {
    fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, at: 0 }
    }

    fn byte(&mut self, b: u8) -> Result<(), MqttError> {
        *self.buf.get_mut(self.at).ok_or(MqttError::BufferTooSmall)? = b;
        self.at += 1;
        Ok(())
    }

    fn bytes(&mut self, data: &[u8]) -> Result<(), MqttError> {
        let end = self.at + data.len();
        self.buf
            .get_mut(self.at..end)
            .ok_or(MqttError::BufferTooSmall)?
            .copy_from_slice(data);
        self.at = end;
        Ok(())
    }

    fn u16(&mut self, v: u16) -> Result<(), MqttError> {
        self.bytes(&v.to_be_bytes())
    }

    /// Length-prefixed UTF-8 string.
    fn string(&mut self, s: &str) -> Result<(), MqttError> {
        let len = u16::try_from(s.len()).map_err(|_| MqttError::Malformed)?;
        self.u16(len)?;
        self.bytes(s.as_bytes())
    }

    fn remaining_length(&mut self, mut len: usize) -> Result<(), MqttError> {
        if len > 268_435_455 {
            return Err(MqttError::Malformed);
        }
        loop {
            let mut digit = (len % 128) as u8;
            len /= 128;
            if len > 0 {
                digit |= 0x80;
            }
            self.byte(digit)?;
            if len == 0 {
                return Ok(());
            }
        }
    }
}

fn string_len(s: &str) -> usize {
    2 + s.len()
}

pub fn encode_connect(c: &Connect<'_>, version: Version, out: &mut [u8]) -> Result<usize, MqttError> {
    let mut flags = FLAG_CLEAN_SESSION;
    let mut remaining = string_len(version.name()) + 1 + 1 + 2 + string_len(c.client_id);
    if let Some(user) = c.username {
        flags |= FLAG_USERNAME;
        remaining += string_len(user);
    }
    if let Some(pass) = c.password {
        flags |= FLAG_PASSWORD;
        remaining += string_len(pass);
    }

    let mut w = Writer::new(out);
    w.byte(CONNECT)?;
    w.remaining_length(remaining)?;
    w.string(version.name())?;
    w.byte(version.level())?;
    w.byte(flags)?;
    w.u16(c.keep_alive_secs)?;
    w.string(c.client_id)?;
    if let Some(user) = c.username {
        w.string(user)?;
    }
    if let Some(pass) = c.password {
        w.string(pass)?;
    }
    Ok(w.at)
}

/// QoS 0 publish, not retained.
pub fn encode_publish(topic: &str, payload: &[u8], out: &mut [u8]) -> Result<usize, MqttError> {
    let mut w = Writer::new(out);
    w.byte(PUBLISH)?;
    w.remaining_length(string_len(topic) + payload.len())?;
    w.string(topic)?;
    w.bytes(payload)?;
    Ok(w.at)
}

pub fn encode_disconnect(out: &mut [u8]) -> Result<usize, MqttError> {
    let mut w = Writer::new(out);
    w.byte(DISCONNECT)?;
    w.byte(0)?;
    Ok(w.at)
}

/// Decode a remaining-length field from the start of `bytes`. Returns the
/// value and the number of bytes it took.
pub fn decode_remaining_length(bytes: &[u8]) -> Result<(usize, usize), MqttError> {
    let mut value = 0usize;
    for (i, &b) in bytes.iter().take(4).enumerate() {
        value |= usize::from(b & 0x7F) << (7 * i);
        if b & 0x80 == 0 {
            return Ok((value, i + 1));
        }
    }
    Err(MqttError::Malformed)
}

/// A received frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Packet {
    ConnAck { session_present: bool, code: u8 },
    /// Any frame this client does not act on, by its type nibble.
    Other(u8),
}

pub fn decode_packet(header: u8, body: &[u8]) -> Result<Packet, MqttError> {
    match header & 0xF0 {
        CONNACK => match body {
            [flags, code] => Ok(Packet::ConnAck {
                session_present: flags & 0x01 != 0,
                code: *code,
            }),
            _ => Err(MqttError::Malformed),
        },
        t => Ok(Packet::Other(t >> 4)),
    }
}

/// Read one whole frame from `transport`.
pub async fn read_packet<T: Transport>(transport: &mut T) -> Result<Packet, MqttError> {
    let mut header = [0u8; 1];
    transport.receive_exact(&mut header).await?;

    let mut len_bytes = [0u8; 4];
    let mut used = 0;
    let remaining = loop {
        if used == len_bytes.len() {
            return Err(MqttError::Malformed);
        }
        transport.receive_exact(&mut len_bytes[used..=used]).await?;
        used += 1;
        if len_bytes[used - 1] & 0x80 == 0 {
            break decode_remaining_length(&len_bytes[..used])?.0;
        }
    };
    if remaining > MAX_INCOMING {
        return Err(MqttError::Malformed);
    }

    let mut body = [0u8; MAX_INCOMING];
    transport.receive_exact(&mut body[..remaining]).await?;
    decode_packet(header[0], &body[..remaining])
}

/// JSON telemetry payload for one finished game.
pub fn score_payload(group: u16, score: u32) -> String<48> {
    let mut out = String::new();
    let _ = write!(out, "{{\"group\":{group}, \"score\":{score}}}");
    out
}
