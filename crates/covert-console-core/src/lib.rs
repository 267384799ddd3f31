//! Core building blocks for the covert channel console.
//!
//! This crate provides:
//! - `FieldSpec` - Typed configuration field and its edit rules
//! - `ConfigObject`, `Catalog`, `Pipeline` - Schema trees pushed by the engine
//! - `ConfigStore` - Selected channel config and processor pipeline
//! - `MessageLog` - System and covert message logs
//! - `ConsoleConfig` - Runtime settings
//! - Transport and snapshot storage traits

pub mod config;
pub mod field;
pub mod log;
pub mod schema;
pub mod store;
pub mod traits;

pub use config::ConsoleConfig;
pub use field::{FieldEditor, FieldKind, FieldSpec, FieldValue, Validity};
pub use log::{LogEntry, LogStream, MessageLog};
pub use schema::{Catalog, ConfigObject, Pipeline, ProcessorEntry};
pub use store::{ConfigStore, StoreError};
pub use traits::{SnapshotStorage, StorageError, Transport, TransportError};
