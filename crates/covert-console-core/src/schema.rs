//! Configuration objects, catalogs and the processor pipeline.
//!
//! Trees are persistent: cloning shares every field, and edits replace only
//! the path down to the edited field.

use std::{collections::BTreeMap, sync::Arc};

use serde::{Deserialize, Serialize};

use crate::field::{FieldSpec, FieldValue};

/// Mapping from option name to field; one channel's or processor's config.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfigObject(BTreeMap<String, Arc<FieldSpec>>);

impl ConfigObject {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&FieldSpec> {
        self.0.get(key).map(AsRef::as_ref)
    }

    /// Shared handle to a field, for identity checks.
    #[must_use]
    pub fn get_shared(&self, key: &str) -> Option<&Arc<FieldSpec>> {
        self.0.get(key)
    }

    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldSpec)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_ref()))
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, field: FieldSpec) -> Self {
        self.0.insert(key.into(), Arc::new(field));
        self
    }

    /// Copy of this object with `key` replaced by `edit(old)`.
    ///
    /// Returns `None` if `key` is absent. Every other field stays shared.
    #[must_use]
    pub fn update(&self, key: &str, edit: impl FnOnce(&FieldSpec) -> FieldSpec) -> Option<Self> {
        let current = self.0.get(key)?;
        let mut next = self.0.clone();
        next.insert(key.to_string(), Arc::new(edit(current)));
        Some(Self(next))
    }

    /// Whether a field should be shown, honouring group toggles.
    ///
    /// A boolean field flagged as its group's toggle hides the rest of the
    /// group while it is false.
    #[must_use]
    pub fn is_visible(&self, key: &str) -> bool {
        let Some(field) = self.get(key) else {
            return false;
        };
        let Some(group) = field.display.group() else {
            return true;
        };
        self.0
            .iter()
            .filter(|(k, _)| k.as_str() != key)
            .filter(|(_, f)| f.display.toggles(group))
            .all(|(_, toggle)| toggle.value != FieldValue::Boolean(false))
    }

    /// Visible `(key, field)` pairs in key order.
    pub fn visible_fields(&self) -> impl Iterator<Item = (&str, &FieldSpec)> {
        self.iter().filter(|(k, _)| self.is_visible(k))
    }
}

impl FromIterator<(String, FieldSpec)> for ConfigObject {
    fn from_iter<I: IntoIterator<Item = (String, FieldSpec)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, f)| (k, Arc::new(f))).collect())
    }
}

/// Server-supplied map from type name to its default configuration.
///
/// Cheap to clone; processor entries each hold one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Catalog(Arc<BTreeMap<String, ConfigObject>>);

impl Catalog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ConfigObject> {
        self.0.get(name)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether two catalogs are the same allocation.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Replace one entry, cloning the map only if it is shared.
    pub fn set(&mut self, name: impl Into<String>, config: ConfigObject) {
        Arc::make_mut(&mut self.0).insert(name.into(), config);
    }
}

impl FromIterator<(String, ConfigObject)> for Catalog {
    fn from_iter<I: IntoIterator<Item = (String, ConfigObject)>>(iter: I) -> Self {
        Self(Arc::new(iter.into_iter().collect()))
    }
}

/// One slot of the processor pipeline.
///
/// `data` carries the whole processor catalog so the type can be switched
/// without a round trip; only `data[type]` is active.
///
/// Both keys must be present when deserializing; an unselected entry is
/// written as `{"Type": null, "Data": null}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProcessorEntry {
    #[serde(rename = "Type", deserialize_with = "Option::deserialize")]
    pub kind: Option<String>,
    #[serde(rename = "Data", deserialize_with = "Option::deserialize")]
    pub data: Option<Catalog>,
}

impl ProcessorEntry {
    /// An entry with no type selected yet.
    #[must_use]
    pub const fn unselected() -> Self {
        Self {
            kind: None,
            data: None,
        }
    }

    #[must_use]
    pub fn selected(kind: impl Into<String>, catalog: Catalog) -> Self {
        Self {
            kind: Some(kind.into()),
            data: Some(catalog),
        }
    }

    /// Configuration of the selected type.
    #[must_use]
    pub fn active_config(&self) -> Option<&ConfigObject> {
        self.data.as_ref()?.get(self.kind.as_deref()?)
    }

    /// Type and data are either both absent, or data holds the type.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        match (&self.kind, &self.data) {
            (None, None) => true,
            (Some(kind), Some(data)) => data.contains(kind),
            _ => false,
        }
    }
}

/// Ordered sequence of processors; order is the order transforms apply.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Pipeline(Vec<ProcessorEntry>);

impl Pipeline {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&ProcessorEntry> {
        self.0.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ProcessorEntry> {
        self.0.iter()
    }

    #[must_use]
    pub fn entries(&self) -> &[ProcessorEntry] {
        &self.0
    }

    pub(crate) fn push(&mut self, entry: ProcessorEntry) {
        self.0.push(entry);
    }

    pub(crate) fn replace(
        &mut self,
        index: usize,
        entry: ProcessorEntry,
    ) -> Option<ProcessorEntry> {
        let slot = self.0.get_mut(index)?;
        Some(std::mem::replace(slot, entry))
    }

    pub(crate) fn remove(&mut self, index: usize) -> Option<ProcessorEntry> {
        (index < self.0.len()).then(|| self.0.remove(index))
    }

    /// Move the entry at `from` so it ends up at `to`.
    pub(crate) fn reorder(&mut self, from: usize, to: usize) -> bool {
        if from >= self.0.len() || to >= self.0.len() {
            return false;
        }
        let entry = self.0.remove(from);
        self.0.insert(to, entry);
        true
    }
}

impl From<Vec<ProcessorEntry>> for Pipeline {
    fn from(entries: Vec<ProcessorEntry>) -> Self {
        Self(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::DisplayInfo;

    fn flag(value: bool, group: &str, toggle: bool) -> FieldSpec {
        FieldSpec::new(
            FieldValue::Boolean(value),
            DisplayInfo {
                group: Some(group.to_string()),
                group_toggle: Some(toggle),
                ..DisplayInfo::default()
            },
        )
    }

    fn ip(value: &str, group: Option<&str>) -> FieldSpec {
        FieldSpec::new(
            FieldValue::Ipv4(value.to_string()),
            DisplayInfo {
                group: group.map(str::to_string),
                ..DisplayInfo::default()
            },
        )
    }

    #[test]
    fn test_update_shares_untouched_fields() {
        let config = ConfigObject::new()
            .with("FriendIP", ip("127.0.0.1", None))
            .with("OriginIP", ip("127.0.0.1", None));
        let edited = config.update("FriendIP", |f| f.apply("10.0.0.5")).unwrap();

        let before = config.get_shared("OriginIP").unwrap();
        let after = edited.get_shared("OriginIP").unwrap();
        assert!(Arc::ptr_eq(before, after));
        assert_eq!(edited.get("FriendIP").unwrap().display_text(), "10.0.0.5");
        assert_eq!(config.get("FriendIP").unwrap().display_text(), "127.0.0.1");
        assert!(config.update("Missing", Clone::clone).is_none());
    }

    #[test]
    fn test_group_toggle_hides_members() {
        let config = ConfigObject::new()
            .with("Bounce", flag(false, "Bounce", true))
            .with("BounceIP", ip("127.0.0.1", Some("Bounce")))
            .with("FriendIP", ip("127.0.0.1", None));

        let visible: Vec<&str> = config.visible_fields().map(|(k, _)| k).collect();
        assert_eq!(visible, vec!["Bounce", "FriendIP"]);

        let on = config.update("Bounce", |f| f.apply("true")).unwrap();
        assert!(on.is_visible("BounceIP"));
    }

    #[test]
    fn test_processor_entry_consistency() {
        let mut catalog = Catalog::new();
        catalog.set("Caesar", ConfigObject::new());
        let selected = ProcessorEntry::selected("Caesar", catalog.clone());
        assert!(ProcessorEntry::unselected().is_consistent());
        assert!(selected.is_consistent());
        assert!(!ProcessorEntry::selected("None", catalog).is_consistent());

        let mismatched = ProcessorEntry {
            kind: None,
            data: Some(Catalog::new()),
        };
        assert!(!mismatched.is_consistent());
    }

    #[test]
    fn test_processor_entry_wire_shape() {
        let json = serde_json::to_value(ProcessorEntry::unselected()).unwrap();
        assert_eq!(json, serde_json::json!({"Type": null, "Data": null}));

        let back: ProcessorEntry = serde_json::from_value(json).unwrap();
        assert_eq!(back, ProcessorEntry::unselected());
    }

    #[test]
    fn test_processor_entry_requires_both_keys() {
        for json in [
            "{}",
            r#"{"Type": null}"#,
            r#"{"Data": null}"#,
            r#"{"Kind": "Caesar", "Settings": {}}"#,
            r#"{"Type": null, "Data": null, "Extra": 1}"#,
        ] {
            let parsed = serde_json::from_str::<ProcessorEntry>(json);
            assert!(parsed.is_err(), "{json}");
        }
    }

    #[test]
    fn test_reorder_keeps_relative_order() {
        let mut pipeline: Pipeline = ["A", "B", "C", "D"]
            .into_iter()
            .map(|k| ProcessorEntry::selected(k, Catalog::new()))
            .collect::<Vec<_>>()
            .into();
        assert!(pipeline.reorder(0, 2));
        let order: Vec<_> = pipeline.iter().map(|e| e.kind.clone().unwrap()).collect();
        assert_eq!(order, ["B", "C", "A", "D"]);
        assert!(!pipeline.reorder(1, 4));
    }
}
