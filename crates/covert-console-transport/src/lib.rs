//! Engine connection for the covert channel console.
//!
//! Provides:
//! - Wire protocol (JSON, dispatched by `OpCode`)
//! - `ProtocolClient` owning one engine connection
//! - WebSocket transport (feature: websocket)
//! - In-memory transport pair
//! - TUI key mapping (feature: tui)

pub mod client;
pub mod memory;
pub mod protocol;

#[cfg(feature = "websocket")]
pub mod websocket;

#[cfg(feature = "tui")]
pub mod tui;

pub use client::ProtocolClient;
pub use memory::MemoryTransport;
pub use protocol::{ClientMessage, ProtocolError, ServerMessage};

#[cfg(feature = "websocket")]
pub use websocket::WsTransport;
