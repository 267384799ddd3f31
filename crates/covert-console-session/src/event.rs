//! Requests to the engine, events from it, and operator commands.

use covert_console_core::{Catalog, ConfigObject, FieldSpec, Pipeline};

/// A request the console wants sent to the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineRequest {
    /// Ask for the channel and processor catalogs.
    Catalog,
    /// Open a channel with the given configuration.
    Open {
        channel_type: String,
        config: ConfigObject,
        pipeline: Pipeline,
    },
    Close,
    /// Send a covert payload over the open channel.
    Write(String),
}

/// Something the engine told us.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    Catalog {
        channel: Catalog,
        processor: Catalog,
    },
    Opened,
    Closed,
    Written,
    /// A covert payload arrived.
    Received(String),
    /// The engine reported a failure.
    EngineError(String),
    /// A well-formed message with an opcode we do not know.
    Unrecognized(String),
    /// A message that could not be decoded.
    Malformed(String),
}

/// Operator action against the console.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    SelectChannel(String),
    SetChannelField { key: String, raw: String },
    /// Store the result of a finished field edit.
    PutChannelField { key: String, field: FieldSpec },
    AddProcessor,
    SelectProcessor { index: usize, name: String },
    SetProcessorField {
        index: usize,
        key: String,
        raw: String,
    },
    PutProcessorField {
        index: usize,
        key: String,
        field: FieldSpec,
    },
    RemoveProcessor(usize),
    MoveProcessor { from: usize, to: usize },
    OpenChannel,
    CloseChannel,
    Send(String),
    SaveConfig,
    LoadConfig,
    Disconnect,
}
