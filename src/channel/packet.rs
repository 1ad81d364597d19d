//! Engine.IO v4 / Socket.IO v5 text packet codec.
//!
//! Only the text encoding used by the HTTP long-polling transport is
//! supported. A polling payload is a list of Engine.IO packets joined with
//! the ASCII record separator; each Engine.IO `message` packet carries one
//! Socket.IO packet for the default namespace.

use serde::Deserialize;
use serde_json::Value;

use crate::error::ChannelError;

/// Separator between packets in a polling payload.
pub const RECORD_SEPARATOR: char = '\u{1e}';

#[derive(Debug, Clone, PartialEq)]
pub enum EnginePacket {
    /// Handshake; carries the JSON session descriptor.
    Open(String),
    Close,
    Ping,
    Pong,
    Message(String),
    Upgrade,
    Noop,
}

impl EnginePacket {
    pub fn decode(text: &str) -> Result<EnginePacket, ChannelError> {
        let mut chars = text.chars();
        let kind = chars.next().ok_or_else(|| ChannelError::Packet("empty packet".into()))?;
        let body = chars.as_str();
        Ok(match kind {
            '0' => EnginePacket::Open(body.to_owned()),
            '1' => EnginePacket::Close,
            '2' => EnginePacket::Ping,
            '3' => EnginePacket::Pong,
            '4' => EnginePacket::Message(body.to_owned()),
            '5' => EnginePacket::Upgrade,
            '6' => EnginePacket::Noop,
            'b' => return Err(ChannelError::Packet("binary packets are not supported".into())),
            other => return Err(ChannelError::Packet(format!("unknown packet type '{other}'"))),
        })
    }

    pub fn encode(&self) -> String {
        match self {
            EnginePacket::Open(body) => format!("0{body}"),
            EnginePacket::Close => "1".to_owned(),
            EnginePacket::Ping => "2".to_owned(),
            EnginePacket::Pong => "3".to_owned(),
            EnginePacket::Message(body) => format!("4{body}"),
            EnginePacket::Upgrade => "5".to_owned(),
            EnginePacket::Noop => "6".to_owned(),
        }
    }
}

/// Splits a polling response body into its packets. Empty records are skipped.
pub fn decode_payload(body: &str) -> Result<Vec<EnginePacket>, ChannelError> {
    body.split(RECORD_SEPARATOR)
        .filter(|record| !record.is_empty())
        .map(EnginePacket::decode)
        .collect()
}

pub fn encode_payload(packets: &[EnginePacket]) -> String {
    packets
        .iter()
        .map(EnginePacket::encode)
        .collect::<Vec<_>>()
        .join(&RECORD_SEPARATOR.to_string())
}

/// Session parameters returned by the Engine.IO handshake.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Handshake {
    pub sid: String,
    #[serde(default)]
    pub upgrades: Vec<String>,
    #[serde(default = "default_ping_interval")]
    pub ping_interval: u64,
    #[serde(default = "default_ping_timeout")]
    pub ping_timeout: u64,
    #[serde(default)]
    pub max_payload: Option<u64>,
}

fn default_ping_interval() -> u64 {
    25_000
}

fn default_ping_timeout() -> u64 {
    20_000
}

impl Handshake {
    pub fn parse(body: &str) -> Result<Handshake, ChannelError> {
        serde_json::from_str(body).map_err(|e| ChannelError::Handshake(e.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SocketPacket {
    Connect(Option<Value>),
    Disconnect,
    Event { name: String, args: Vec<Value>, ack: Option<u64> },
    Ack { id: u64, args: Vec<Value> },
    ConnectError(Value),
}

impl SocketPacket {
    pub fn event(name: &str, payload: Value) -> SocketPacket {
        SocketPacket::Event { name: name.to_owned(), args: vec![payload], ack: None }
    }

    /// Decodes a Socket.IO packet (the body of an Engine.IO message).
    ///
    /// Layout: `<type>[/<namespace>,][<ack id>][<json>]`.
    pub fn decode(text: &str) -> Result<SocketPacket, ChannelError> {
        let mut chars = text.chars();
        let kind = chars.next().ok_or_else(|| ChannelError::Packet("empty socket packet".into()))?;
        let mut rest = chars.as_str();

        if rest.starts_with('/') {
            let end = rest.find(',').unwrap_or(rest.len());
            let namespace = &rest[..end];
            if namespace != "/" {
                log::debug!("packet for namespace {namespace} handled as default namespace");
            }
            rest = rest.get(end + 1..).unwrap_or("");
        }

        let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
        let ack = if digits > 0 {
            Some(rest[..digits].parse::<u64>().map_err(|e| ChannelError::Packet(e.to_string()))?)
        } else {
            None
        };
        let json = &rest[digits..];
        let data = if json.is_empty() {
            None
        } else {
            Some(serde_json::from_str::<Value>(json).map_err(|e| ChannelError::Packet(e.to_string()))?)
        };

        match kind {
            '0' => Ok(SocketPacket::Connect(data)),
            '1' => Ok(SocketPacket::Disconnect),
            '2' => {
                let mut args = match data {
                    Some(Value::Array(items)) => items,
                    _ => return Err(ChannelError::Packet("event without argument array".into())),
                };
                if args.is_empty() {
                    return Err(ChannelError::Packet("event without a name".into()));
                }
                let name = match args.remove(0) {
                    Value::String(name) => name,
                    other => return Err(ChannelError::Packet(format!("event name {other} is not a string"))),
                };
                Ok(SocketPacket::Event { name, args, ack })
            }
            '3' => {
                let id = ack.ok_or_else(|| ChannelError::Packet("ack without id".into()))?;
                let args = match data {
                    Some(Value::Array(items)) => items,
                    _ => Vec::new(),
                };
                Ok(SocketPacket::Ack { id, args })
            }
            '4' => Ok(SocketPacket::ConnectError(data.unwrap_or(Value::Null))),
            '5' | '6' => Err(ChannelError::Packet("binary socket packets are not supported".into())),
            other => Err(ChannelError::Packet(format!("unknown socket packet type '{other}'"))),
        }
    }

    pub fn encode(&self) -> String {
        match self {
            SocketPacket::Connect(None) => "0".to_owned(),
            SocketPacket::Connect(Some(auth)) => format!("0{auth}"),
            SocketPacket::Disconnect => "1".to_owned(),
            SocketPacket::Event { name, args, ack } => {
                let mut items = Vec::with_capacity(args.len() + 1);
                items.push(Value::String(name.clone()));
                items.extend(args.iter().cloned());
                let ack = ack.map(|id| id.to_string()).unwrap_or_default();
                format!("2{ack}{}", Value::Array(items))
            }
            SocketPacket::Ack { id, args } => format!("3{id}{}", Value::Array(args.clone())),
            SocketPacket::ConnectError(data) => format!("4{data}"),
        }
    }

    /// Wraps the packet in an Engine.IO message.
    pub fn into_engine(self) -> EnginePacket {
        EnginePacket::Message(self.encode())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn handshake_payload_decodes() {
        let body = r#"0{"sid":"lv_VI97HAXpY6yYWAAAC","upgrades":["websocket"],"pingInterval":25000,"pingTimeout":5000,"maxPayload":1000000}"#;
        let packets = decode_payload(body).unwrap();
        let EnginePacket::Open(json) = &packets[0] else {
            panic!("expected open, got {packets:?}");
        };
        let hs = Handshake::parse(json).unwrap();
        assert_eq!(hs.sid, "lv_VI97HAXpY6yYWAAAC");
        assert_eq!(hs.ping_timeout, 5000);
    }

    #[test]
    fn batched_payload_splits_on_record_separator() {
        let body = "40{\"sid\":\"x\"}\u{1e}2\u{1e}42[\"trainingComplete\"]";
        let packets = decode_payload(body).unwrap();
        assert_eq!(packets.len(), 3);
        assert_eq!(packets[1], EnginePacket::Ping);
        let EnginePacket::Message(msg) = &packets[2] else { panic!() };
        assert_eq!(
            SocketPacket::decode(msg).unwrap(),
            SocketPacket::Event { name: "trainingComplete".into(), args: vec![], ack: None }
        );
    }

    #[test]
    fn event_encoding_matches_wire_format() {
        let packet = SocketPacket::event("startTraining", json!({"epochs": 5}));
        assert_eq!(packet.into_engine().encode(), r#"42["startTraining",{"epochs":5}]"#);
        assert_eq!(
            encode_payload(&[EnginePacket::Pong, EnginePacket::Message("0".into())]),
            "3\u{1e}40"
        );
    }

    #[test]
    fn namespace_and_ack_id_are_parsed() {
        let packet = SocketPacket::decode(r#"2/admin,12["ping",1]"#).unwrap();
        assert_eq!(
            packet,
            SocketPacket::Event { name: "ping".into(), args: vec![json!(1)], ack: Some(12) }
        );
        assert_eq!(SocketPacket::decode("3/admin,7[]").unwrap(), SocketPacket::Ack { id: 7, args: vec![] });
    }

    #[test]
    fn connect_error_and_garbage() {
        assert_eq!(
            SocketPacket::decode(r#"4{"message":"Not authorized"}"#).unwrap(),
            SocketPacket::ConnectError(json!({"message": "Not authorized"}))
        );
        assert!(EnginePacket::decode("9").is_err());
        assert!(EnginePacket::decode("bAAEC").is_err());
        assert!(SocketPacket::decode("2{}").is_err());
    }
}
