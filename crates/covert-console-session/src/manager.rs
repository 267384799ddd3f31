//! Console session: applies operator commands and engine events to the
//! configuration store and the channel state machine.

use std::sync::Arc;

use covert_console_core::{
    ConfigStore, MessageLog, StoreError,
    traits::{SnapshotStorage, StorageError, TransportError},
};

use crate::{
    event::{ConsoleCommand, EngineEvent, EngineRequest},
    state::{ChannelError, ChannelSession, SessionPhase},
};

/// Session error.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Channel(#[from] ChannelError),
    #[error("Engine is not ready ({0})")]
    NotReady(SessionPhase),
    #[error("Cannot load a configuration while the channel is open")]
    LoadWhileOpen,
    #[error("No snapshot storage configured")]
    NoStorage,
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("Could not parse file {location}: {source}")]
    Snapshot {
        location: String,
        #[source]
        source: StoreError,
    },
    #[error("Could not serialize configuration: {0}")]
    Export(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Connection {
    Disconnected,
    AwaitingCatalog,
    Ready,
}

/// All state behind one operator console.
///
/// Mutated only from the single event-processing path: engine events via
/// [`ConsoleSession::handle_event`] and operator actions via
/// [`ConsoleSession::execute`].
pub struct ConsoleSession {
    store: ConfigStore,
    channel: ChannelSession,
    connection: Connection,
    log: Arc<MessageLog>,
    storage: Option<Arc<dyn SnapshotStorage>>,
}

impl ConsoleSession {
    /// Create a disconnected session writing to `log`.
    #[must_use]
    pub fn new(log: Arc<MessageLog>) -> Self {
        Self {
            store: ConfigStore::new(),
            channel: ChannelSession::new(),
            connection: Connection::Disconnected,
            log,
            storage: None,
        }
    }

    /// Attach snapshot storage for save/load.
    #[must_use]
    pub fn with_storage(mut self, storage: Arc<dyn SnapshotStorage>) -> Self {
        self.storage = Some(storage);
        self
    }

    #[must_use]
    pub const fn store(&self) -> &ConfigStore {
        &self.store
    }

    #[must_use]
    pub const fn channel(&self) -> &ChannelSession {
        &self.channel
    }

    #[must_use]
    pub const fn log(&self) -> &Arc<MessageLog> {
        &self.log
    }

    #[must_use]
    pub const fn phase(&self) -> SessionPhase {
        match self.connection {
            Connection::Disconnected => SessionPhase::Disconnected,
            Connection::AwaitingCatalog => SessionPhase::AwaitingCatalog,
            Connection::Ready if self.channel.is_open() => SessionPhase::ChannelOpen,
            Connection::Ready => SessionPhase::Idle,
        }
    }

    /// Whether the console is still waiting for catalogs.
    #[must_use]
    pub const fn is_loading(&self) -> bool {
        !matches!(self.connection, Connection::Ready)
    }

    /// The transport is up; returns the catalog request to send.
    pub fn on_connected(&mut self) -> EngineRequest {
        tracing::info!("Connected to engine");
        self.connection = Connection::AwaitingCatalog;
        self.channel.reset();
        self.log.system("Connection to server established.");
        EngineRequest::Catalog
    }

    /// The transport went away or was closed by us.
    pub fn on_disconnected(&mut self) {
        if self.connection == Connection::Disconnected {
            return;
        }
        tracing::info!("Disconnected from engine");
        self.connection = Connection::Disconnected;
        self.channel.reset();
        self.log.system("Connection to server closed.");
    }

    /// Surface a transport fault; the connection is considered lost.
    pub fn on_transport_failure(&mut self, err: &TransportError) {
        tracing::error!(error = %err, "Transport failure");
        self.log.system(format!("[TRANSPORT]: {err}"));
        self.connection = Connection::Disconnected;
        self.channel.reset();
    }

    /// Apply one engine event. Dispatch depends only on the event kind.
    pub fn handle_event(&mut self, event: EngineEvent) {
        tracing::debug!(?event, "Engine event");
        match event {
            EngineEvent::Catalog { channel, processor } => {
                self.store.set_catalogs(channel, processor);
                self.connection = Connection::Ready;
            }
            EngineEvent::Opened => {
                self.channel.confirm_open();
                self.log.system("Covert channel successfully opened.");
            }
            EngineEvent::Closed => {
                self.channel.confirm_close();
                self.log.system("Covert channel closed.");
            }
            EngineEvent::Written => self.log.system("Covert message sent."),
            EngineEvent::Received(payload) => {
                self.log.covert(payload);
                self.log.system("Covert message received.");
            }
            EngineEvent::EngineError(message) => {
                tracing::warn!(%message, "Engine reported an error");
                self.channel.reject_pending();
                self.log.system(format!("[ERROR]: {message}"));
            }
            EngineEvent::Unrecognized(opcode) => {
                tracing::warn!(%opcode, "Unrecognized message from engine");
                self.log
                    .system(format!("Unrecognized message from engine: {opcode}"));
            }
            EngineEvent::Malformed(reason) => {
                tracing::warn!(%reason, "Malformed message from engine");
                self.log
                    .system(format!("Malformed message from engine: {reason}"));
            }
        }
    }

    /// Build an open request from the current configuration.
    ///
    /// Fields the engine would reject are logged as warnings; the request is
    /// still built so the engine's own answer is what the operator sees.
    ///
    /// # Errors
    /// Returns error if the engine is not ready, the channel is open, or no
    /// channel type is selected.
    pub fn open_channel(&mut self) -> Result<EngineRequest, SessionError> {
        self.ensure_ready()?;
        self.channel
            .request_open(self.store.channel_type().is_some())?;
        for issue in self.store.validate() {
            self.log.system(format!("[WARNING]: {issue}"));
        }
        let channel_type = self
            .store
            .channel_type()
            .map(str::to_string)
            .ok_or(ChannelError::NotSelected)?;
        Ok(EngineRequest::Open {
            channel_type,
            config: self.store.active_config().clone(),
            pipeline: self.store.pipeline().clone(),
        })
    }

    /// # Errors
    /// Returns error if the channel is not open.
    pub fn close_channel(&mut self) -> Result<EngineRequest, SessionError> {
        self.ensure_ready()?;
        self.channel.request_close()?;
        Ok(EngineRequest::Close)
    }

    /// # Errors
    /// Returns error if the channel is not open.
    pub fn send_message(&self, message: impl Into<String>) -> Result<EngineRequest, SessionError> {
        self.ensure_ready()?;
        self.channel.request_send()?;
        Ok(EngineRequest::Write(message.into()))
    }

    /// Apply an operator command, returning the request to send, if any.
    ///
    /// `Disconnect` is handled by whoever owns the connection and yields nothing here.
    /// Everything else waits for the catalogs, since edits and snapshots are
    /// only meaningful against them.
    ///
    /// # Errors
    /// Returns error if the command is not permitted in the current state.
    pub async fn execute(
        &mut self,
        command: ConsoleCommand,
    ) -> Result<Option<EngineRequest>, SessionError> {
        if !matches!(command, ConsoleCommand::Disconnect) {
            self.ensure_ready()?;
        }
        match command {
            ConsoleCommand::SelectChannel(name) => self.store.select_channel_type(&name)?,
            ConsoleCommand::SetChannelField { key, raw } => {
                self.store.set_channel_field(&key, &raw)?;
            }
            ConsoleCommand::PutChannelField { key, field } => {
                self.store.put_channel_field(&key, field)?;
            }
            ConsoleCommand::AddProcessor => self.store.add_processor(),
            ConsoleCommand::SelectProcessor { index, name } => {
                self.store.select_processor_type(index, &name)?;
            }
            ConsoleCommand::SetProcessorField { index, key, raw } => {
                self.store.set_processor_field(index, &key, &raw)?;
            }
            ConsoleCommand::PutProcessorField { index, key, field } => {
                self.store.put_processor_field(index, &key, field)?;
            }
            ConsoleCommand::RemoveProcessor(index) => {
                self.store.remove_processor(index)?;
            }
            ConsoleCommand::MoveProcessor { from, to } => self.store.move_processor(from, to)?,
            ConsoleCommand::OpenChannel => return self.open_channel().map(Some),
            ConsoleCommand::CloseChannel => return self.close_channel().map(Some),
            ConsoleCommand::Send(message) => return self.send_message(message).map(Some),
            ConsoleCommand::SaveConfig => self.save_config().await?,
            ConsoleCommand::LoadConfig => self.load_config().await?,
            ConsoleCommand::Disconnect => {}
        }
        Ok(None)
    }

    /// Write the current configuration to storage.
    ///
    /// # Errors
    /// Returns error if no storage is attached or writing fails.
    pub async fn save_config(&self) -> Result<(), SessionError> {
        let storage = self.storage()?;
        let blob = self.store.export_snapshot()?;
        storage.save(&blob).await?;
        tracing::info!(location = %storage.location(), "Configuration saved");
        self.log.system("Saved current configuration");
        Ok(())
    }

    /// Replace the configuration from storage, or keep it on any failure.
    ///
    /// # Errors
    /// Returns error if the channel is open, reading fails, or the stored
    /// blob is not a snapshot.
    pub async fn load_config(&mut self) -> Result<(), SessionError> {
        if self.channel.is_open() {
            return Err(SessionError::LoadWhileOpen);
        }
        let storage = self.storage()?;
        let location = storage.location();
        self.log
            .system(format!("Loading configuration from {location}..."));
        let blob = storage.load().await?;
        self.store
            .import_snapshot(&blob)
            .map_err(|source| SessionError::Snapshot {
                location: location.clone(),
                source,
            })?;
        self.log
            .system(format!("Successfully loaded configuration from {location}"));
        Ok(())
    }

    /// Put a refused command on the operator log.
    pub fn report(&self, err: &SessionError) {
        tracing::warn!(error = %err, "Command refused");
        self.log.system(format!("[ERROR]: {err}"));
    }

    fn storage(&self) -> Result<Arc<dyn SnapshotStorage>, SessionError> {
        self.storage.clone().ok_or(SessionError::NoStorage)
    }

    fn ensure_ready(&self) -> Result<(), SessionError> {
        if self.connection == Connection::Ready {
            Ok(())
        } else {
            Err(SessionError::NotReady(self.phase()))
        }
    }
}
