//! Channel session orchestration and snapshot storage for the console.
//!
//! Provides:
//! - `ChannelSession` - Open/close state machine for the covert channel
//! - `ConsoleSession` - Applies operator commands and engine events
//! - Storage implementations (memory, file)

pub mod event;
pub mod manager;
pub mod state;
pub mod storage;

pub use event::{ConsoleCommand, EngineEvent, EngineRequest};
pub use manager::{ConsoleSession, SessionError};
pub use state::{ChannelError, ChannelSession, ChannelState, Pending, SessionPhase};
