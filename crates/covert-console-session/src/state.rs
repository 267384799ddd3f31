//! Open/close state machine for the covert channel.

use std::fmt;

/// Whether the engine has confirmed an open channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ChannelState {
    #[default]
    Closed,
    Open,
}

/// A request sent to the engine that has not been answered yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pending {
    Open,
    Close,
}

/// Coarse phase of a console session, for the status line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Disconnected,
    /// Connected, waiting for the catalogs.
    AwaitingCatalog,
    /// Catalogs received; channel closed.
    Idle,
    ChannelOpen,
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Disconnected => "disconnected",
            Self::AwaitingCatalog => "awaiting catalog",
            Self::Idle => "idle",
            Self::ChannelOpen => "channel open",
        };
        f.write_str(label)
    }
}

/// Why a channel request was refused locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ChannelError {
    #[error("No channel type selected")]
    NotSelected,
    #[error("Channel is already open")]
    AlreadyOpen,
    #[error("Channel is not open")]
    NotOpen,
}

/// Tracks the channel state the engine has confirmed.
///
/// Requests never change the state; only engine responses do. A request
/// records itself as pending until the matching response arrives.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChannelSession {
    state: ChannelState,
    pending: Option<Pending>,
}

impl ChannelSession {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn state(&self) -> ChannelState {
        self.state
    }

    #[must_use]
    pub const fn is_open(&self) -> bool {
        matches!(self.state, ChannelState::Open)
    }

    #[must_use]
    pub const fn pending(&self) -> Option<Pending> {
        self.pending
    }

    /// Permit an open request.
    ///
    /// # Errors
    /// Returns error if the channel is open or no type is selected.
    pub fn request_open(&mut self, channel_selected: bool) -> Result<(), ChannelError> {
        if self.is_open() {
            return Err(ChannelError::AlreadyOpen);
        }
        if !channel_selected {
            return Err(ChannelError::NotSelected);
        }
        if self.pending == Some(Pending::Open) {
            tracing::debug!("Open already pending; sending again");
        }
        self.pending = Some(Pending::Open);
        Ok(())
    }

    /// Permit a close request.
    ///
    /// # Errors
    /// Returns error if the channel is not open.
    pub fn request_close(&mut self) -> Result<(), ChannelError> {
        if !self.is_open() {
            return Err(ChannelError::NotOpen);
        }
        self.pending = Some(Pending::Close);
        Ok(())
    }

    /// Permit a write request.
    ///
    /// # Errors
    /// Returns error if the channel is not open.
    pub const fn request_send(&self) -> Result<(), ChannelError> {
        if self.is_open() {
            Ok(())
        } else {
            Err(ChannelError::NotOpen)
        }
    }

    /// The engine reported the channel open. Returns whether the state changed.
    pub fn confirm_open(&mut self) -> bool {
        if self.pending != Some(Pending::Open) {
            tracing::debug!("Open confirmed without a pending request");
        }
        self.pending = None;
        let changed = !self.is_open();
        self.state = ChannelState::Open;
        changed
    }

    /// The engine reported the channel closed. Returns whether the state changed.
    pub fn confirm_close(&mut self) -> bool {
        self.pending = None;
        let changed = self.is_open();
        self.state = ChannelState::Closed;
        changed
    }

    /// The engine rejected whatever was pending; the state stays as confirmed.
    pub fn reject_pending(&mut self) {
        self.pending = None;
    }

    /// Forget everything, as after a lost connection.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
