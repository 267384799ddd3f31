//! Configuration store: the selected channel config and the processor pipeline.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    field::{FieldError, FieldSpec},
    schema::{Catalog, ConfigObject, Pipeline, ProcessorEntry},
};

/// Store error.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Unknown channel type: {0}")]
    UnknownChannelType(String),
    #[error("Unknown processor type: {0}")]
    UnknownProcessorType(String),
    #[error("Unknown field key: {0}")]
    UnknownFieldKey(String),
    #[error("Processor index {index} out of range (pipeline has {len})")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("Processor #{0} has no type selected")]
    ProcessorNotSelected(usize),
    #[error("Malformed snapshot: {0}")]
    MalformedSnapshot(String),
}

/// Persisted layout of the editable state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Snapshot {
    pub config: ConfigObject,
    pub processors: Pipeline,
}

/// Where a field lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldLocation {
    Channel,
    Processor(usize),
}

impl fmt::Display for FieldLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Channel => f.write_str("channel"),
            Self::Processor(i) => write!(f, "processor #{i}"),
        }
    }
}

/// A field whose current value the engine would reject.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldIssue {
    pub location: FieldLocation,
    pub key: String,
    pub error: FieldError,
}

impl fmt::Display for FieldIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}: {}", self.location, self.key, self.error)
    }
}

/// Owns the catalogs, the active channel config and the pipeline.
///
/// Every edit replaces only the edited path; untouched fields and entries
/// remain shared with earlier copies of the store's trees.
#[derive(Debug, Clone, Default)]
pub struct ConfigStore {
    channel_catalog: Catalog,
    processor_catalog: Catalog,
    channel_type: Option<String>,
    active: ConfigObject,
    pipeline: Pipeline,
}

impl ConfigStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Install catalogs received from the engine, replacing earlier ones.
    pub fn set_catalogs(&mut self, channel: Catalog, processor: Catalog) {
        tracing::debug!(
            channels = channel.len(),
            processors = processor.len(),
            "Installing catalogs"
        );
        self.channel_catalog = channel;
        self.processor_catalog = processor;
    }

    #[must_use]
    pub const fn channel_catalog(&self) -> &Catalog {
        &self.channel_catalog
    }

    #[must_use]
    pub const fn processor_catalog(&self) -> &Catalog {
        &self.processor_catalog
    }

    /// Name of the selected channel type.
    #[must_use]
    pub fn channel_type(&self) -> Option<&str> {
        self.channel_type.as_deref()
    }

    #[must_use]
    pub const fn active_config(&self) -> &ConfigObject {
        &self.active
    }

    #[must_use]
    pub const fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Select a channel type; the active config becomes a fresh copy of its template.
    ///
    /// # Errors
    /// Returns error if `name` is not in the channel catalog.
    pub fn select_channel_type(&mut self, name: &str) -> Result<(), StoreError> {
        self.active = self
            .channel_catalog
            .get(name)
            .ok_or_else(|| StoreError::UnknownChannelType(name.to_string()))?
            .clone();
        self.channel_type = Some(name.to_string());
        Ok(())
    }

    /// Apply operator input to a field of the active channel config.
    ///
    /// # Errors
    /// Returns error if the key is absent.
    pub fn set_channel_field(&mut self, key: &str, raw: &str) -> Result<(), StoreError> {
        self.active = self
            .active
            .update(key, |f| f.apply(raw))
            .ok_or_else(|| StoreError::UnknownFieldKey(key.to_string()))?;
        Ok(())
    }

    /// Replace a channel field with an already-edited value of the same kind.
    ///
    /// # Errors
    /// Returns error if the key is absent.
    pub fn put_channel_field(&mut self, key: &str, field: FieldSpec) -> Result<(), StoreError> {
        self.active = replace_field(&self.active, key, field)?;
        Ok(())
    }

    pub fn add_processor(&mut self) {
        self.pipeline.push(ProcessorEntry::unselected());
    }

    /// Give the processor at `index` a type, storing the whole catalog with it.
    ///
    /// # Errors
    /// Returns error if the index or type is unknown.
    pub fn select_processor_type(&mut self, index: usize, name: &str) -> Result<(), StoreError> {
        self.check_index(index)?;
        if !self.processor_catalog.contains(name) {
            return Err(StoreError::UnknownProcessorType(name.to_string()));
        }
        let entry = ProcessorEntry::selected(name, self.processor_catalog.clone());
        self.pipeline.replace(index, entry);
        Ok(())
    }

    /// Apply operator input to a field of the processor at `index`.
    ///
    /// # Errors
    /// Returns error if the index or key is unknown.
    pub fn set_processor_field(
        &mut self,
        index: usize,
        key: &str,
        raw: &str,
    ) -> Result<(), StoreError> {
        self.edit_processor(index, key, |config| config.update(key, |f| f.apply(raw)))
    }

    /// Replace a processor field with an already-edited value.
    ///
    /// # Errors
    /// Returns error if the index or key is unknown.
    pub fn put_processor_field(
        &mut self,
        index: usize,
        key: &str,
        field: FieldSpec,
    ) -> Result<(), StoreError> {
        self.edit_processor(index, key, |config| replace_field(config, key, field).ok())
    }

    /// Remove the processor at `index`; later entries shift down.
    ///
    /// # Errors
    /// Returns error if the index is out of range.
    pub fn remove_processor(&mut self, index: usize) -> Result<ProcessorEntry, StoreError> {
        let len = self.pipeline.len();
        self.pipeline
            .remove(index)
            .ok_or(StoreError::IndexOutOfRange { index, len })
    }

    /// Move the processor at `from` to position `to`.
    ///
    /// # Errors
    /// Returns error if either index is out of range.
    pub fn move_processor(&mut self, from: usize, to: usize) -> Result<(), StoreError> {
        self.check_index(from)?;
        self.check_index(to)?;
        self.pipeline.reorder(from, to);
        Ok(())
    }

    /// Fields the engine would reject, channel first then processors in order.
    #[must_use]
    pub fn validate(&self) -> Vec<FieldIssue> {
        let channel = issues(FieldLocation::Channel, &self.active);
        let processors = self
            .pipeline
            .iter()
            .enumerate()
            .filter_map(|(i, entry)| Some((i, entry.active_config()?)))
            .flat_map(|(i, config)| issues(FieldLocation::Processor(i), config));
        channel.chain(processors).collect()
    }

    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            config: self.active.clone(),
            processors: self.pipeline.clone(),
        }
    }

    /// Serialize the active config and pipeline.
    ///
    /// # Errors
    /// Returns error if serialization fails.
    pub fn export_snapshot(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.snapshot())
    }

    /// Replace the active config and pipeline from a blob, or leave both untouched.
    ///
    /// # Errors
    /// Returns error if the blob is not exactly a snapshot.
    pub fn import_snapshot(&mut self, blob: &str) -> Result<(), StoreError> {
        let snapshot: Snapshot =
            serde_json::from_str(blob).map_err(|e| StoreError::MalformedSnapshot(e.to_string()))?;
        if let Some(i) = snapshot.processors.iter().position(|e| !e.is_consistent()) {
            return Err(StoreError::MalformedSnapshot(format!(
                "processor #{i} has inconsistent type and data"
            )));
        }
        self.active = snapshot.config;
        self.pipeline = snapshot.processors;
        Ok(())
    }

    fn check_index(&self, index: usize) -> Result<(), StoreError> {
        let len = self.pipeline.len();
        if index < len {
            Ok(())
        } else {
            Err(StoreError::IndexOutOfRange { index, len })
        }
    }

    fn edit_processor(
        &mut self,
        index: usize,
        key: &str,
        edit: impl FnOnce(&ConfigObject) -> Option<ConfigObject>,
    ) -> Result<(), StoreError> {
        self.check_index(index)?;
        let entry = self
            .pipeline
            .get(index)
            .ok_or(StoreError::ProcessorNotSelected(index))?;
        let (Some(kind), Some(data)) = (&entry.kind, &entry.data) else {
            return Err(StoreError::ProcessorNotSelected(index));
        };
        let config = data
            .get(kind)
            .ok_or_else(|| StoreError::UnknownProcessorType(kind.clone()))?;
        let edited = edit(config).ok_or_else(|| StoreError::UnknownFieldKey(key.to_string()))?;

        let mut data = data.clone();
        data.set(kind.clone(), edited);
        let entry = ProcessorEntry::selected(kind.clone(), data);
        self.pipeline.replace(index, entry);
        Ok(())
    }
}

fn replace_field(
    config: &ConfigObject,
    key: &str,
    field: FieldSpec,
) -> Result<ConfigObject, StoreError> {
    config
        .update(key, |_| field)
        .ok_or_else(|| StoreError::UnknownFieldKey(key.to_string()))
}

fn issues(location: FieldLocation, config: &ConfigObject) -> impl Iterator<Item = FieldIssue> + '_ {
    config.iter().filter_map(move |(key, field)| {
        field.validate().err().map(|error| FieldIssue {
            location,
            key: key.to_string(),
            error,
        })
    })
}
