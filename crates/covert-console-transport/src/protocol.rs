//! Wire protocol for console-engine communication.
//!
//! One JSON object per message. Requests and responses share no envelope
//! beyond the `OpCode` member.

use std::collections::BTreeMap;

use covert_console_core::{Catalog, ConfigObject, Pipeline, TransportError};
use covert_console_session::{EngineEvent, EngineRequest, SessionError};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Protocol error.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("Malformed message from engine: {0}")]
    MalformedWireMessage(String),
    #[error("Engine reported: {0}")]
    EngineReportedError(String),
    #[error("Transport failure: {0}")]
    TransportFailure(#[from] TransportError),
    #[error("Not permitted: {0}")]
    NotPermitted(#[from] SessionError),
    #[error("Failed to encode request: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Channel part of an open request: the type and `{type: config}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelRequest {
    #[serde(rename = "Type")]
    pub kind: String,
    #[serde(rename = "Data")]
    pub data: BTreeMap<String, ConfigObject>,
}

impl ChannelRequest {
    #[must_use]
    pub fn new(kind: impl Into<String>, config: ConfigObject) -> Self {
        let kind = kind.into();
        let data = BTreeMap::from([(kind.clone(), config)]);
        Self { kind, data }
    }
}

/// Message from console to engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "OpCode", rename_all = "lowercase")]
pub enum ClientMessage {
    /// Request the catalogs.
    Config,
    Open {
        #[serde(rename = "Processors")]
        processors: Pipeline,
        #[serde(rename = "Channel")]
        channel: ChannelRequest,
    },
    Close,
    /// Covert payload to send.
    Write {
        #[serde(rename = "Message")]
        message: String,
    },
}

impl ClientMessage {
    /// Encode as one wire message.
    ///
    /// # Errors
    /// Returns error if serialization fails.
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl From<EngineRequest> for ClientMessage {
    fn from(request: EngineRequest) -> Self {
        match request {
            EngineRequest::Catalog => Self::Config,
            EngineRequest::Open {
                channel_type,
                config,
                pipeline,
            } => Self::Open {
                processors: pipeline,
                channel: ChannelRequest::new(channel_type, config),
            },
            EngineRequest::Close => Self::Close,
            EngineRequest::Write(message) => Self::Write { message },
        }
    }
}

/// Catalogs carried by a `config` response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Defaults {
    #[serde(rename = "Channel")]
    pub channel: Catalog,
    #[serde(rename = "Processor")]
    pub processor: Catalog,
}

/// Message from engine to console.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "OpCode", rename_all = "lowercase")]
pub enum ServerMessage {
    Config {
        #[serde(rename = "Default")]
        defaults: Defaults,
    },
    Open,
    Close,
    Write,
    /// Inbound covert payload.
    Read {
        #[serde(rename = "Message")]
        message: String,
    },
    Error {
        #[serde(rename = "Message")]
        message: String,
    },
}

const KNOWN_OPCODES: [&str; 6] = ["config", "open", "close", "write", "read", "error"];

/// Result of decoding one inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    Message(ServerMessage),
    /// Well-formed, but the opcode is not one we handle.
    Unrecognized(String),
}

impl ServerMessage {
    /// Decode one wire message.
    ///
    /// The opcode is read first so an unknown opcode is told apart from a
    /// known one with a bad body.
    ///
    /// # Errors
    /// Returns error if the text is not a JSON object with a string `OpCode`,
    /// or its body does not match the opcode.
    pub fn decode(text: &str) -> Result<Inbound, ProtocolError> {
        let value: Value = serde_json::from_str(text)
            .map_err(|e| ProtocolError::MalformedWireMessage(e.to_string()))?;
        let missing = || ProtocolError::MalformedWireMessage("missing OpCode".to_string());
        let opcode = value
            .get("OpCode")
            .and_then(Value::as_str)
            .ok_or_else(missing)?;
        if !KNOWN_OPCODES.contains(&opcode) {
            return Ok(Inbound::Unrecognized(opcode.to_string()));
        }
        serde_json::from_value(value)
            .map(Inbound::Message)
            .map_err(|e| ProtocolError::MalformedWireMessage(e.to_string()))
    }
}

impl From<ServerMessage> for EngineEvent {
    fn from(message: ServerMessage) -> Self {
        match message {
            ServerMessage::Config { defaults } => Self::Catalog {
                channel: defaults.channel,
                processor: defaults.processor,
            },
            ServerMessage::Open => Self::Opened,
            ServerMessage::Close => Self::Closed,
            ServerMessage::Write => Self::Written,
            ServerMessage::Read { message } => Self::Received(message),
            ServerMessage::Error { message } => Self::EngineError(message),
        }
    }
}

/// Turn raw inbound text into the event it represents. Never fails.
#[must_use]
pub fn inbound_event(text: &str) -> EngineEvent {
    match ServerMessage::decode(text) {
        Ok(Inbound::Message(message)) => message.into(),
        Ok(Inbound::Unrecognized(opcode)) => EngineEvent::Unrecognized(opcode),
        Err(ProtocolError::MalformedWireMessage(reason)) => EngineEvent::Malformed(reason),
        Err(other) => EngineEvent::Malformed(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use covert_console_core::{FieldSpec, FieldValue, ProcessorEntry, field::DisplayInfo};
    use serde_json::json;

    use super::*;

    fn friend_ip() -> ConfigObject {
        ConfigObject::new().with(
            "FriendIP",
            FieldSpec::new(
                FieldValue::Ipv4("10.0.0.5".to_string()),
                DisplayInfo::default(),
            ),
        )
    }

    #[test]
    fn test_bodyless_requests() {
        assert_eq!(ClientMessage::Config.encode().unwrap(), r#"{"OpCode":"config"}"#);
        assert_eq!(ClientMessage::Close.encode().unwrap(), r#"{"OpCode":"close"}"#);
        let write: Value = serde_json::to_value(ClientMessage::Write {
            message: "hi".to_string(),
        })
        .unwrap();
        assert_eq!(write, json!({"OpCode": "write", "Message": "hi"}));
    }

    #[test]
    fn test_open_request_shape() {
        let pipeline: Pipeline = vec![ProcessorEntry::unselected()].into();
        let request = ClientMessage::from(EngineRequest::Open {
            channel_type: "TcpSyn".to_string(),
            config: friend_ip(),
            pipeline,
        });

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["OpCode"], "open");
        assert_eq!(value["Channel"]["Type"], "TcpSyn");
        let friend_ip = &value["Channel"]["Data"]["TcpSyn"]["FriendIP"];
        assert_eq!(friend_ip["Type"], "ipv4");
        assert_eq!(friend_ip["Value"], "10.0.0.5");
        assert_eq!(value["Processors"], json!([{"Type": null, "Data": null}]));
    }

    #[test]
    fn test_decode_config_response() {
        let text = json!({
            "OpCode": "config",
            "Default": {
                "Channel": {
                    "TcpSyn": {
                        "FriendIP": {"Type": "ipv4", "Value": "127.0.0.1", "Display": {"Name": "Friend IP"}}
                    }
                },
                "Processor": {}
            }
        })
        .to_string();

        match inbound_event(&text) {
            EngineEvent::Catalog { channel, processor } => {
                assert!(channel.contains("TcpSyn"));
                assert!(processor.is_empty());
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_decode_simple_responses() {
        assert_eq!(inbound_event(r#"{"OpCode":"open"}"#), EngineEvent::Opened);
        assert_eq!(inbound_event(r#"{"OpCode":"close"}"#), EngineEvent::Closed);
        assert_eq!(inbound_event(r#"{"OpCode":"write"}"#), EngineEvent::Written);
        assert_eq!(
            inbound_event(r#"{"OpCode":"read","Message":"hello"}"#),
            EngineEvent::Received("hello".to_string())
        );
        assert_eq!(
            inbound_event(r#"{"OpCode":"error","Message":"no such device"}"#),
            EngineEvent::EngineError("no such device".to_string())
        );
    }

    #[test]
    fn test_unknown_opcode_is_unrecognized() {
        assert_eq!(
            inbound_event(r#"{"OpCode":"ping"}"#),
            EngineEvent::Unrecognized("ping".to_string())
        );
    }

    #[test]
    fn test_bad_shapes_are_malformed() {
        for text in [
            "not json",
            r#"{"Message":"no opcode"}"#,
            r#"{"OpCode":7}"#,
            r#"{"OpCode":"read"}"#,
            r#"{"OpCode":"config","Default":{"Channel":{"X":{"F":{"Type":"warp","Value":1}}},"Processor":{}}}"#,
        ] {
            assert!(
                matches!(inbound_event(text), EngineEvent::Malformed(_)),
                "{text} should be malformed"
            );
        }
    }
}
