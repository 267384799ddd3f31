//! Protocol client: one engine connection driving one console session.

use covert_console_core::traits::{Transport, TransportError};
use covert_console_session::{ConsoleCommand, ConsoleSession, EngineEvent, EngineRequest};
use tokio::sync::mpsc;

use crate::protocol::{ClientMessage, ProtocolError, inbound_event};

/// Owns the engine connection and the console state behind it.
///
/// Created connected by [`ProtocolClient::connect`] and torn down by
/// [`ProtocolClient::disconnect`]. Inbound messages and operator commands
/// are each processed to completion before the next one.
pub struct ProtocolClient<T: Transport> {
    transport: Option<T>,
    session: ConsoleSession,
}

impl<T: Transport> ProtocolClient<T> {
    /// Take over a connected transport and request the catalogs.
    ///
    /// # Errors
    /// Returns error if the catalog request cannot be sent.
    pub async fn connect(transport: T, session: ConsoleSession) -> Result<Self, ProtocolError> {
        let mut client = Self::detached(session);
        client.attach(transport).await?;
        Ok(client)
    }

    /// Start using `transport`, replacing any current one, and request the catalogs.
    ///
    /// # Errors
    /// Returns error if the catalog request cannot be sent.
    pub async fn attach(&mut self, transport: T) -> Result<(), ProtocolError> {
        self.transport = Some(transport);
        let request = self.session.on_connected();
        self.request(request).await
    }

    /// A client with no connection, for showing state before connecting.
    #[must_use]
    pub const fn detached(session: ConsoleSession) -> Self {
        Self {
            transport: None,
            session,
        }
    }

    #[must_use]
    pub const fn session(&self) -> &ConsoleSession {
        &self.session
    }

    #[must_use]
    pub const fn is_connected(&self) -> bool {
        self.transport.is_some()
    }

    /// Encode and send one request.
    ///
    /// # Errors
    /// Returns error if there is no connection or the send fails; a failed
    /// send also drops the connection.
    pub async fn request(&mut self, request: EngineRequest) -> Result<(), ProtocolError> {
        let text = ClientMessage::from(request).encode()?;
        let Some(transport) = self.transport.as_mut() else {
            self.session.on_transport_failure(&TransportError::Closed);
            return Err(TransportError::Closed.into());
        };
        tracing::debug!(%text, "Sending request");
        if let Err(e) = transport.send(text).await {
            self.session.on_transport_failure(&e);
            self.transport = None;
            return Err(e.into());
        }
        Ok(())
    }

    /// Dispatch one inbound message.
    ///
    /// The event is always applied to the session (which logs it); malformed
    /// messages and engine errors are also returned as errors.
    ///
    /// # Errors
    /// Returns error if the message is malformed or reports an engine error.
    pub fn handle_text(&mut self, text: &str) -> Result<(), ProtocolError> {
        let event = inbound_event(text);
        let outcome = match &event {
            EngineEvent::Malformed(reason) => {
                Err(ProtocolError::MalformedWireMessage(reason.clone()))
            }
            EngineEvent::EngineError(message) => {
                Err(ProtocolError::EngineReportedError(message.clone()))
            }
            _ => Ok(()),
        };
        self.session.handle_event(event);
        outcome
    }

    /// Wait for and dispatch the next inbound message.
    ///
    /// Returns `None` once the connection is gone. Cancel-safe.
    pub async fn next_inbound(&mut self) -> Option<Result<(), ProtocolError>> {
        let transport = self.transport.as_mut()?;
        match transport.recv().await {
            Some(Ok(text)) => Some(self.handle_text(&text)),
            Some(Err(e)) => {
                self.session.on_transport_failure(&e);
                self.transport = None;
                Some(Err(e.into()))
            }
            None => {
                self.transport = None;
                self.session.on_disconnected();
                None
            }
        }
    }

    /// Apply an operator command and send whatever request it produces.
    ///
    /// Refusals are reported on the system log as well as returned.
    ///
    /// # Errors
    /// Returns error if the command is not permitted or its request cannot be sent.
    pub async fn command(&mut self, command: ConsoleCommand) -> Result<(), ProtocolError> {
        if command == ConsoleCommand::Disconnect {
            return self.disconnect().await;
        }
        match self.session.execute(command).await {
            Ok(Some(request)) => self.request(request).await,
            Ok(None) => Ok(()),
            Err(e) => {
                self.session.report(&e);
                Err(e.into())
            }
        }
    }

    /// Process inbound messages and operator commands until either side ends.
    ///
    /// Stops when the connection is lost, the command channel closes, or a
    /// `Disconnect` command arrives.
    ///
    /// # Errors
    /// Returns error if the connection fails.
    pub async fn run(
        &mut self,
        mut commands: mpsc::UnboundedReceiver<ConsoleCommand>,
    ) -> Result<(), ProtocolError> {
        loop {
            tokio::select! {
                inbound = self.next_inbound(), if self.is_connected() => match inbound {
                    None => return Ok(()),
                    Some(Err(ProtocolError::TransportFailure(e))) => return Err(e.into()),
                    Some(Err(e)) => tracing::debug!("Inbound message: {e}"),
                    Some(Ok(())) => {}
                },
                command = commands.recv() => match command {
                    Some(ConsoleCommand::Disconnect) | None => return self.disconnect().await,
                    Some(command) => match self.command(command).await {
                        Err(ProtocolError::TransportFailure(e)) => return Err(e.into()),
                        Err(e) => tracing::debug!("Command refused: {e}"),
                        Ok(()) => {}
                    },
                },
            }
        }
    }

    /// Close the connection. Safe to call when already disconnected.
    ///
    /// # Errors
    /// Returns error if the transport fails to close cleanly.
    pub async fn disconnect(&mut self) -> Result<(), ProtocolError> {
        let Some(mut transport) = self.transport.take() else {
            return Ok(());
        };
        let closed = transport.close().await;
        self.session.on_disconnected();
        closed.map_err(Into::into)
    }
}
