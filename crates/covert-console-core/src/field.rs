//! Typed configuration fields and their edit rules.
//!
//! A [`FieldSpec`] is one configurable option pushed by the engine. Each
//! kind carries its own value and range representation, so a value can
//! never disagree with its kind. Edits go through [`FieldSpec::apply`],
//! which never fails: numeric input is clamped, and input a kind cannot
//! accept leaves the value unchanged.

use std::{fmt, num::IntErrorKind};

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use thiserror::Error;

/// Presentation metadata attached to a field.
///
/// Not interpreted beyond grouping, but always sent back as received.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DisplayInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    /// A boolean field with this flag shows or hides the rest of its group.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_toggle: Option<bool>,
}

impl DisplayInfo {
    /// Label to show for a field stored under `key`.
    #[must_use]
    pub fn label<'a>(&'a self, key: &'a str) -> &'a str {
        match self.name.as_deref() {
            Some(name) if !name.is_empty() => name,
            _ => key,
        }
    }

    /// Group name, if the field belongs to a non-empty group.
    #[must_use]
    pub fn group(&self) -> Option<&str> {
        self.group.as_deref().filter(|g| !g.is_empty())
    }

    /// Whether this field shows and hides the rest of `group`.
    #[must_use]
    pub fn toggles(&self, group: &str) -> bool {
        self.group() == Some(group) && self.group_toggle == Some(true)
    }
}

/// The kinds of value a field can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    Ipv4,
    Signed8,
    Unsigned16,
    Unsigned64,
    /// A 64-bit integer carried as a decimal string.
    ExactUnsigned64,
    Boolean,
    EnumSelect,
    HexKey,
    /// Free-form key material such as a PEM block.
    OpaqueKey,
}

impl FieldKind {
    const ALL: [Self; 9] = [
        Self::Ipv4,
        Self::Signed8,
        Self::Unsigned16,
        Self::Unsigned64,
        Self::ExactUnsigned64,
        Self::Boolean,
        Self::EnumSelect,
        Self::HexKey,
        Self::OpaqueKey,
    ];

    /// Wire tag used by the engine.
    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            Self::Ipv4 => "ipv4",
            Self::Signed8 => "i8",
            Self::Unsigned16 => "u16",
            Self::Unsigned64 => "u64",
            Self::ExactUnsigned64 => "exactu64",
            Self::Boolean => "bool",
            Self::EnumSelect => "select",
            Self::HexKey => "hexkey",
            Self::OpaqueKey => "key",
        }
    }

    #[must_use]
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.tag() == tag)
    }

    #[must_use]
    pub const fn is_numeric(self) -> bool {
        matches!(self, Self::Signed8 | Self::Unsigned16 | Self::Unsigned64)
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Inclusive numeric bounds, stored as received.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bounds<T> {
    pub min: T,
    pub max: T,
}

impl<T: Integer> Bounds<T> {
    #[must_use]
    pub const fn new(min: T, max: T) -> Self {
        Self { min, max }
    }

    /// Bounds as an ordered `(low, high)` pair, tolerating an inverted range.
    fn ordered(self) -> (i128, i128) {
        let (a, b): (i128, i128) = (self.min.into(), self.max.into());
        if a <= b { (a, b) } else { (b, a) }
    }
}

/// Integer representations a numeric field can use.
pub trait Integer: Copy + Into<i128> + TryFrom<i128> + fmt::Display {
    const LOWEST: Self;
    const HIGHEST: Self;
}

impl Integer for i8 {
    const LOWEST: Self = Self::MIN;
    const HIGHEST: Self = Self::MAX;
}

impl Integer for u16 {
    const LOWEST: Self = Self::MIN;
    const HIGHEST: Self = Self::MAX;
}

impl Integer for u64 {
    const LOWEST: Self = Self::MIN;
    const HIGHEST: Self = Self::MAX;
}

fn limits<T: Integer>(range: Option<Bounds<T>>) -> (i128, i128) {
    range.map_or((T::LOWEST.into(), T::HIGHEST.into()), Bounds::ordered)
}

/// Parse leniently: overflow saturates, anything unparseable becomes zero.
fn parse_lenient(raw: &str) -> i128 {
    match raw.trim().parse::<i128>() {
        Ok(n) => n,
        Err(e) => match e.kind() {
            IntErrorKind::PosOverflow => i128::MAX,
            IntErrorKind::NegOverflow => i128::MIN,
            _ => 0,
        },
    }
}

fn coerce<T: Integer>(raw: &str, range: Option<Bounds<T>>) -> T {
    let (lo, hi) = limits(range);
    T::try_from(parse_lenient(raw).clamp(lo, hi)).unwrap_or(T::LOWEST)
}

fn in_limits<T: Integer>(value: T, range: Option<Bounds<T>>) -> bool {
    let (lo, hi) = limits(range);
    let value: i128 = value.into();
    (lo..=hi).contains(&value)
}

fn parses_within<T: Integer>(text: &str, range: Option<Bounds<T>>) -> bool {
    let (lo, hi) = limits(range);
    text.trim()
        .parse::<i128>()
        .is_ok_and(|n| (lo..=hi).contains(&n))
}

/// Dotted-quad grammar: four groups of one to three digits.
#[must_use]
pub fn is_dotted_quad(text: &str) -> bool {
    let groups: Vec<&str> = text.split('.').collect();
    groups.len() == 4 && groups.iter().all(|g| is_octet_text(g))
}

fn is_octet_text(group: &str) -> bool {
    (1..=3).contains(&group.len()) && group.bytes().all(|b| b.is_ascii_digit())
}

/// Parse a dotted quad whose octets all fit in a byte.
#[must_use]
pub fn parse_ipv4(text: &str) -> Option<[u8; 4]> {
    if !is_dotted_quad(text) {
        return None;
    }
    let mut octets = [0u8; 4];
    for (slot, group) in octets.iter_mut().zip(text.split('.')) {
        *slot = group.parse().ok()?;
    }
    Some(octets)
}

/// Decode hex pairs, ignoring whitespace between them.
#[must_use]
pub fn decode_hex(text: &str) -> Option<Vec<u8>> {
    let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    hex::decode(compact).ok()
}

fn parse_exact_u64(text: &str) -> Option<u64> {
    let text = text.trim();
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    text.parse().ok()
}

fn length_allowed(lengths: Option<&Vec<usize>>, len: usize) -> bool {
    lengths.is_none_or(|l| l.contains(&len))
}

fn parse_bool(text: &str) -> Option<bool> {
    let text = text.trim();
    if text.eq_ignore_ascii_case("true") {
        Some(true)
    } else if text.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

/// A field value together with its kind-specific constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Ipv4(String),
    Signed8 {
        value: i8,
        range: Option<Bounds<i8>>,
    },
    Unsigned16 {
        value: u16,
        range: Option<Bounds<u16>>,
    },
    Unsigned64 {
        value: u64,
        range: Option<Bounds<u64>>,
    },
    ExactUnsigned64(String),
    Boolean(bool),
    EnumSelect {
        value: String,
        options: Option<Vec<String>>,
    },
    HexKey {
        value: Vec<u8>,
        lengths: Option<Vec<usize>>,
    },
    OpaqueKey(String),
}

impl FieldValue {
    /// The default, unconstrained value for `kind`.
    #[must_use]
    pub fn default_for(kind: FieldKind) -> Self {
        match kind {
            FieldKind::Ipv4 => Self::Ipv4(String::new()),
            FieldKind::Signed8 => Self::Signed8 {
                value: 0,
                range: None,
            },
            FieldKind::Unsigned16 => Self::Unsigned16 {
                value: 0,
                range: None,
            },
            FieldKind::Unsigned64 => Self::Unsigned64 {
                value: 0,
                range: None,
            },
            FieldKind::ExactUnsigned64 => Self::ExactUnsigned64("0".to_string()),
            FieldKind::Boolean => Self::Boolean(false),
            FieldKind::EnumSelect => Self::EnumSelect {
                value: String::new(),
                options: None,
            },
            FieldKind::HexKey => Self::HexKey {
                value: Vec::new(),
                lengths: None,
            },
            FieldKind::OpaqueKey => Self::OpaqueKey(String::new()),
        }
    }

    #[must_use]
    pub const fn kind(&self) -> FieldKind {
        match self {
            Self::Ipv4(_) => FieldKind::Ipv4,
            Self::Signed8 { .. } => FieldKind::Signed8,
            Self::Unsigned16 { .. } => FieldKind::Unsigned16,
            Self::Unsigned64 { .. } => FieldKind::Unsigned64,
            Self::ExactUnsigned64(_) => FieldKind::ExactUnsigned64,
            Self::Boolean(_) => FieldKind::Boolean,
            Self::EnumSelect { .. } => FieldKind::EnumSelect,
            Self::HexKey { .. } => FieldKind::HexKey,
            Self::OpaqueKey(_) => FieldKind::OpaqueKey,
        }
    }
}

/// Why a field value would be rejected by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FieldError {
    #[error("value {value} is outside [{min}, {max}]")]
    OutOfRange {
        value: String,
        min: String,
        max: String,
    },
    #[error("`{0}` is not one of the allowed options")]
    NotAnOption(String),
    #[error("`{0}` is not a valid IPv4 address")]
    InvalidIpv4(String),
    #[error("key is {len} bytes, expected one of {accepted:?}")]
    KeyLength { len: usize, accepted: Vec<usize> },
    #[error("`{0}` is not an unsigned 64-bit integer")]
    NotAnExactU64(String),
}

fn check_range<T: Integer>(value: T, range: Option<Bounds<T>>) -> Result<(), FieldError> {
    if in_limits(value, range) {
        return Ok(());
    }
    let (lo, hi) = limits(range);
    Err(FieldError::OutOfRange {
        value: value.to_string(),
        min: lo.to_string(),
        max: hi.to_string(),
    })
}

/// Validity of an edit buffer, as last determined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Validity {
    #[default]
    Valid,
    Invalid,
}

/// One configurable option.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawField", into = "RawField")]
pub struct FieldSpec {
    pub value: FieldValue,
    pub display: DisplayInfo,
}

impl FieldSpec {
    #[must_use]
    pub const fn new(value: FieldValue, display: DisplayInfo) -> Self {
        Self { value, display }
    }

    #[must_use]
    pub const fn kind(&self) -> FieldKind {
        self.value.kind()
    }

    /// Apply operator input, returning the edited field.
    ///
    /// Numeric kinds always produce a value inside their range. Other kinds
    /// keep their current value when `raw` is not acceptable.
    #[must_use]
    pub fn apply(&self, raw: &str) -> Self {
        let value = match &self.value {
            FieldValue::Ipv4(current) => FieldValue::Ipv4(if is_dotted_quad(raw) {
                raw.to_string()
            } else {
                current.clone()
            }),
            FieldValue::Signed8 { range, .. } => FieldValue::Signed8 {
                value: coerce(raw, *range),
                range: *range,
            },
            FieldValue::Unsigned16 { range, .. } => FieldValue::Unsigned16 {
                value: coerce(raw, *range),
                range: *range,
            },
            FieldValue::Unsigned64 { range, .. } => FieldValue::Unsigned64 {
                value: coerce(raw, *range),
                range: *range,
            },
            FieldValue::ExactUnsigned64(current) => FieldValue::ExactUnsigned64(
                parse_exact_u64(raw).map_or_else(|| current.clone(), |n| n.to_string()),
            ),
            FieldValue::Boolean(current) => {
                FieldValue::Boolean(parse_bool(raw).unwrap_or(*current))
            }
            FieldValue::EnumSelect { value, options } => {
                let allowed = options.as_ref().is_none_or(|o| o.iter().any(|v| v == raw));
                let value = if allowed { raw } else { value.as_str() };
                FieldValue::EnumSelect {
                    value: value.to_string(),
                    options: options.clone(),
                }
            }
            FieldValue::HexKey { value, lengths } => FieldValue::HexKey {
                value: decode_hex(raw).unwrap_or_else(|| value.clone()),
                lengths: lengths.clone(),
            },
            FieldValue::OpaqueKey(_) => FieldValue::OpaqueKey(raw.to_string()),
        };
        Self {
            value,
            display: self.display.clone(),
        }
    }

    /// Continuous gate: may `text` be applied while the operator is typing?
    #[must_use]
    pub fn accepts_keystroke(&self, text: &str) -> bool {
        match &self.value {
            FieldValue::Ipv4(_) => is_dotted_quad(text),
            FieldValue::Signed8 { .. }
            | FieldValue::Unsigned16 { .. }
            | FieldValue::Unsigned64 { .. }
            | FieldValue::OpaqueKey(_) => true,
            FieldValue::ExactUnsigned64(_) => parse_exact_u64(text).is_some(),
            FieldValue::Boolean(_) => parse_bool(text).is_some(),
            FieldValue::EnumSelect { options, .. } => {
                options.as_ref().is_none_or(|o| o.iter().any(|v| v == text))
            }
            FieldValue::HexKey { .. } => decode_hex(text).is_some(),
        }
    }

    /// Deferred check run when the operator leaves the field.
    #[must_use]
    pub fn is_finally_valid(&self, text: &str) -> bool {
        match &self.value {
            FieldValue::Ipv4(_) => parse_ipv4(text).is_some(),
            FieldValue::Signed8 { range, .. } => parses_within(text, *range),
            FieldValue::Unsigned16 { range, .. } => parses_within(text, *range),
            FieldValue::Unsigned64 { range, .. } => parses_within(text, *range),
            FieldValue::HexKey { lengths, .. } => {
                decode_hex(text).is_some_and(|key| length_allowed(lengths.as_ref(), key.len()))
            }
            FieldValue::ExactUnsigned64(_)
            | FieldValue::Boolean(_)
            | FieldValue::EnumSelect { .. }
            | FieldValue::OpaqueKey(_) => self.accepts_keystroke(text),
        }
    }

    /// Check the current value against the rules the engine enforces.
    ///
    /// # Errors
    /// Returns the first rule the value breaks.
    pub fn validate(&self) -> Result<(), FieldError> {
        match &self.value {
            FieldValue::Ipv4(v) => parse_ipv4(v)
                .map(|_| ())
                .ok_or_else(|| FieldError::InvalidIpv4(v.clone())),
            FieldValue::Signed8 { value, range } => check_range(*value, *range),
            FieldValue::Unsigned16 { value, range } => check_range(*value, *range),
            FieldValue::Unsigned64 { value, range } => check_range(*value, *range),
            FieldValue::ExactUnsigned64(v) => parse_exact_u64(v)
                .map(|_| ())
                .ok_or_else(|| FieldError::NotAnExactU64(v.clone())),
            FieldValue::Boolean(_) | FieldValue::OpaqueKey(_) => Ok(()),
            FieldValue::EnumSelect { value, options } => match options {
                Some(o) if !o.contains(value) => Err(FieldError::NotAnOption(value.clone())),
                _ => Ok(()),
            },
            FieldValue::HexKey { value, lengths } => {
                if length_allowed(lengths.as_ref(), value.len()) {
                    Ok(())
                } else {
                    Err(FieldError::KeyLength {
                        len: value.len(),
                        accepted: lengths.clone().unwrap_or_default(),
                    })
                }
            }
        }
    }

    /// Change the field's kind, resetting its value to that kind's default.
    #[must_use]
    pub fn reset_kind(&self, kind: FieldKind) -> Self {
        if kind == self.kind() {
            return self.clone();
        }
        Self {
            value: FieldValue::default_for(kind),
            display: self.display.clone(),
        }
    }

    /// Text shown in an edit box for the current value.
    #[must_use]
    pub fn display_text(&self) -> String {
        match &self.value {
            FieldValue::Ipv4(v) | FieldValue::ExactUnsigned64(v) | FieldValue::OpaqueKey(v) => {
                v.clone()
            }
            FieldValue::EnumSelect { value, .. } => value.clone(),
            FieldValue::Signed8 { value, .. } => value.to_string(),
            FieldValue::Unsigned16 { value, .. } => value.to_string(),
            FieldValue::Unsigned64 { value, .. } => value.to_string(),
            FieldValue::Boolean(v) => v.to_string(),
            FieldValue::HexKey { value, .. } => hex::encode(value),
        }
    }

    /// Allowed options of a select field.
    #[must_use]
    pub fn options(&self) -> Option<&[String]> {
        match &self.value {
            FieldValue::EnumSelect { options, .. } => options.as_deref(),
            _ => None,
        }
    }

    /// Message explaining what the final check expects.
    #[must_use]
    pub fn hint(&self) -> String {
        match &self.value {
            FieldValue::Ipv4(_) => "Please enter a dotted-quad IPv4 address".to_string(),
            FieldValue::HexKey {
                lengths: Some(l), ..
            } => {
                let lengths: Vec<String> = l.iter().map(ToString::to_string).collect();
                format!(
                    "Please enter a hex key with one of the following lengths: {}",
                    lengths.join(", ")
                )
            }
            FieldValue::HexKey { lengths: None, .. } => {
                "Please enter pairs of hex digits".to_string()
            }
            FieldValue::Signed8 { range, .. } => range_hint(*range),
            FieldValue::Unsigned16 { range, .. } => range_hint(*range),
            FieldValue::Unsigned64 { range, .. } => range_hint(*range),
            FieldValue::ExactUnsigned64(_) => "Please enter an unsigned 64-bit integer".to_string(),
            FieldValue::Boolean(_) => "Please enter true or false".to_string(),
            FieldValue::EnumSelect { options, .. } => options.as_ref().map_or_else(
                || "Please enter a value".to_string(),
                |o| format!("Please choose one of: {}", o.join(", ")),
            ),
            FieldValue::OpaqueKey(_) => "Please enter the key text".to_string(),
        }
    }
}

fn range_hint<T: Integer>(range: Option<Bounds<T>>) -> String {
    let (lo, hi) = limits(range);
    format!("Please enter a number between {lo} and {hi}")
}

/// Edit buffer for one field, modelling typing and blur separately.
///
/// The raw text is always kept so the operator can continue typing, while
/// the field value only changes when the text passes the keystroke gate.
#[derive(Debug, Clone)]
pub struct FieldEditor {
    field: FieldSpec,
    text: String,
    validity: Validity,
}

impl FieldEditor {
    #[must_use]
    pub fn new(field: FieldSpec) -> Self {
        let text = field.display_text();
        Self {
            field,
            text,
            validity: Validity::Valid,
        }
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub const fn field(&self) -> &FieldSpec {
        &self.field
    }

    #[must_use]
    pub const fn validity(&self) -> Validity {
        self.validity
    }

    /// Replace the buffer text. Returns true if the field value took it.
    pub fn input(&mut self, text: impl Into<String>) -> bool {
        self.text = text.into();
        if !self.field.accepts_keystroke(&self.text) {
            return false;
        }
        self.field = self.field.apply(&self.text);
        // Fixing the input clears an earlier error right away; new errors wait for blur.
        if self.field.is_finally_valid(&self.text) {
            self.validity = Validity::Valid;
        }
        true
    }

    pub fn push(&mut self, c: char) -> bool {
        let mut text = std::mem::take(&mut self.text);
        text.push(c);
        self.input(text)
    }

    pub fn pop(&mut self) -> bool {
        let mut text = std::mem::take(&mut self.text);
        text.pop();
        self.input(text)
    }

    /// Leave the field and run the deferred check.
    pub fn blur(&mut self) -> Validity {
        if self.field.kind().is_numeric() {
            // Numeric input was already clamped into range.
            self.text = self.field.display_text();
            self.validity = Validity::Valid;
        } else {
            self.validity = if self.field.is_finally_valid(&self.text) {
                Validity::Valid
            } else {
                Validity::Invalid
            };
        }
        self.validity
    }

    /// Hint to show while the buffer is flagged invalid.
    #[must_use]
    pub fn error_hint(&self) -> Option<String> {
        (self.validity == Validity::Invalid).then(|| self.field.hint())
    }
}

/// Decode error for an engine-supplied field.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("unknown field type `{0}`")]
    UnknownKind(String),
    #[error("`{kind}` field has an invalid value: {found}")]
    InvalidValue { kind: FieldKind, found: Value },
    #[error("`{kind}` field has an invalid range: {found}")]
    InvalidRange { kind: FieldKind, found: Value },
}

/// Field layout as the engine sends it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawField {
    #[serde(rename = "Type")]
    kind: String,
    #[serde(default)]
    value: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    range: Option<Value>,
    #[serde(default)]
    display: DisplayInfo,
}

fn as_int<T: TryFrom<i128>>(value: &Value) -> Option<T> {
    let n = value
        .as_i64()
        .map(i128::from)
        .or_else(|| value.as_u64().map(i128::from))?;
    T::try_from(n).ok()
}

fn decode_bounds<T: Integer>(
    kind: FieldKind,
    range: Option<Value>,
) -> Result<Option<Bounds<T>>, SchemaError> {
    let Some(found) = range else {
        return Ok(None);
    };
    let parsed = found.as_array().and_then(|pair| match pair.as_slice() {
        [min, max] => Some(Bounds::new(as_int(min)?, as_int(max)?)),
        _ => None,
    });
    parsed
        .map(Some)
        .ok_or(SchemaError::InvalidRange { kind, found })
}

fn decode_list<T>(
    kind: FieldKind,
    range: Option<Value>,
    item: impl Fn(&Value) -> Option<T>,
) -> Result<Option<Vec<T>>, SchemaError> {
    let Some(found) = range else {
        return Ok(None);
    };
    let parsed = found
        .as_array()
        .and_then(|items| items.iter().map(&item).collect::<Option<Vec<T>>>());
    parsed
        .map(Some)
        .ok_or(SchemaError::InvalidRange { kind, found })
}

fn decode_key_bytes(value: &Value) -> Option<Vec<u8>> {
    match value {
        Value::Null => Some(Vec::new()),
        Value::String(s) => BASE64.decode(s).ok(),
        // Byte arrays appear in snapshots written by older consoles.
        Value::Array(items) => items.iter().map(as_int::<u8>).collect(),
        _ => None,
    }
}

impl TryFrom<RawField> for FieldSpec {
    type Error = SchemaError;

    fn try_from(raw: RawField) -> Result<Self, Self::Error> {
        let kind = FieldKind::from_tag(&raw.kind).ok_or(SchemaError::UnknownKind(raw.kind))?;
        let RawField {
            value: found,
            range,
            display,
            ..
        } = raw;
        let invalid = |found: &Value| SchemaError::InvalidValue {
            kind,
            found: found.clone(),
        };
        let string = |found: &Value| {
            found
                .as_str()
                .map(str::to_string)
                .ok_or_else(|| invalid(found))
        };

        let value = match kind {
            FieldKind::Ipv4 => FieldValue::Ipv4(string(&found)?),
            FieldKind::ExactUnsigned64 => FieldValue::ExactUnsigned64(string(&found)?),
            FieldKind::OpaqueKey => FieldValue::OpaqueKey(string(&found)?),
            FieldKind::Signed8 => FieldValue::Signed8 {
                value: as_int(&found).ok_or_else(|| invalid(&found))?,
                range: decode_bounds(kind, range)?,
            },
            FieldKind::Unsigned16 => FieldValue::Unsigned16 {
                value: as_int(&found).ok_or_else(|| invalid(&found))?,
                range: decode_bounds(kind, range)?,
            },
            FieldKind::Unsigned64 => FieldValue::Unsigned64 {
                value: as_int(&found).ok_or_else(|| invalid(&found))?,
                range: decode_bounds(kind, range)?,
            },
            FieldKind::Boolean => {
                FieldValue::Boolean(found.as_bool().ok_or_else(|| invalid(&found))?)
            }
            FieldKind::EnumSelect => FieldValue::EnumSelect {
                value: string(&found)?,
                options: decode_list(kind, range, |v| v.as_str().map(str::to_string))?,
            },
            FieldKind::HexKey => FieldValue::HexKey {
                value: decode_key_bytes(&found).ok_or_else(|| invalid(&found))?,
                lengths: decode_list(kind, range, as_int::<usize>)?,
            },
        };
        Ok(Self { value, display })
    }
}

fn encode_bounds<T: Integer + Serialize>(range: Option<Bounds<T>>) -> Option<Value> {
    range.map(|b| json!([b.min, b.max]))
}

impl From<FieldSpec> for RawField {
    fn from(field: FieldSpec) -> Self {
        let kind = field.kind().tag().to_string();
        let (value, range) = match field.value {
            FieldValue::Ipv4(v) | FieldValue::ExactUnsigned64(v) | FieldValue::OpaqueKey(v) => {
                (Value::String(v), None)
            }
            FieldValue::Signed8 { value, range } => (json!(value), encode_bounds(range)),
            FieldValue::Unsigned16 { value, range } => (json!(value), encode_bounds(range)),
            FieldValue::Unsigned64 { value, range } => (json!(value), encode_bounds(range)),
            FieldValue::Boolean(v) => (Value::Bool(v), None),
            FieldValue::EnumSelect { value, options } => {
                (Value::String(value), options.map(|o| json!(o)))
            }
            FieldValue::HexKey { value, lengths } => {
                (Value::String(BASE64.encode(value)), lengths.map(|l| json!(l)))
            }
        };
        Self {
            kind,
            value,
            range,
            display: field.display,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn u16_field(value: u16, min: u16, max: u16) -> FieldSpec {
        FieldSpec::new(
            FieldValue::Unsigned16 {
                value,
                range: Some(Bounds::new(min, max)),
            },
            DisplayInfo::default(),
        )
    }

    fn hex_field(lengths: Vec<usize>) -> FieldSpec {
        FieldSpec::new(
            FieldValue::HexKey {
                value: Vec::new(),
                lengths: Some(lengths),
            },
            DisplayInfo::default(),
        )
    }

    fn ipv4_field(value: &str) -> FieldSpec {
        FieldSpec::new(FieldValue::Ipv4(value.to_string()), DisplayInfo::default())
    }

    #[test]
    fn test_numeric_apply_stays_in_range() {
        let field = u16_field(8123, 100, 9000);
        let huge = "9".repeat(41);
        for raw in [
            "", "abc", "-5", "0", "99", "100", "4242", "9000", "9001", "70000", &huge,
        ] {
            let FieldValue::Unsigned16 { value, .. } = field.apply(raw).value else {
                panic!("kind changed");
            };
            assert!((100..=9000).contains(&value), "{raw} produced {value}");
        }
    }

    #[test]
    fn test_numeric_apply_clamps_to_bounds() {
        let field = FieldSpec::new(
            FieldValue::Signed8 {
                value: 49,
                range: Some(Bounds::new(-10, 10)),
            },
            DisplayInfo::default(),
        );
        assert_eq!(field.apply("-300").display_text(), "-10");
        assert_eq!(field.apply("300").display_text(), "10");
        assert_eq!(field.apply(" 7 ").display_text(), "7");
        assert_eq!(field.apply("seven").display_text(), "0");
    }

    #[test]
    fn test_unparseable_input_clamps_zero_into_range() {
        let field = u16_field(500, 100, 9000);
        assert_eq!(field.apply("port").display_text(), "100");
    }

    #[test]
    fn test_inverted_range_is_tolerated() {
        let field = u16_field(5, 10, 1);
        assert_eq!(field.apply("50").display_text(), "10");
        assert_eq!(field.apply("0").display_text(), "1");
    }

    #[test]
    fn test_unbounded_u64_saturates() {
        let field = FieldSpec::new(
            FieldValue::Unsigned64 {
                value: 0,
                range: None,
            },
            DisplayInfo::default(),
        );
        let saturated = field.apply("18446744073709551616");
        assert_eq!(saturated.display_text(), u64::MAX.to_string());
        assert_eq!(field.apply("-1").display_text(), "0");
    }

    #[test]
    fn test_ipv4_apply_only_on_dotted_quad() {
        let field = ipv4_field("127.0.0.1");
        assert_eq!(field.apply("10.0.0.5").display_text(), "10.0.0.5");
        assert_eq!(field.apply("10.0.0.").display_text(), "127.0.0.1");
        assert_eq!(field.apply("1.2.3.4.5").display_text(), "127.0.0.1");
        assert_eq!(field.apply("1234.0.0.1").display_text(), "127.0.0.1");
    }

    #[test]
    fn test_ipv4_blur_checks_octets() {
        let mut editor = FieldEditor::new(ipv4_field("127.0.0.1"));
        assert!(editor.input("999.0.0.1"));
        assert_eq!(editor.blur(), Validity::Invalid);
        assert!(editor.input("192.168.1.1"));
        assert_eq!(editor.validity(), Validity::Valid);

        assert!(!editor.input("192.168."));
        assert_eq!(editor.text(), "192.168.");
        assert_eq!(editor.field().display_text(), "192.168.1.1");
        assert_eq!(editor.blur(), Validity::Invalid);
    }

    #[test]
    fn test_hex_key_two_phase_validation() {
        let mut editor = FieldEditor::new(hex_field(vec![16]));

        assert!(editor.input("ab"));
        assert_eq!(editor.validity(), Validity::Valid);
        assert_eq!(editor.blur(), Validity::Invalid);

        assert!(editor.input("ab cd"));
        assert_eq!(editor.text(), "ab cd");
        let FieldValue::HexKey { value, .. } = &editor.field().value else {
            panic!("kind changed");
        };
        assert_eq!(*value, [0xab, 0xcd]);
        assert_eq!(editor.blur(), Validity::Invalid);

        assert!(editor.input("00112233445566778899aabbccddeeff"));
        assert_eq!(editor.validity(), Validity::Valid);
        assert_eq!(editor.blur(), Validity::Valid);
    }

    #[test]
    fn test_hex_key_rejects_bad_pairs_but_keeps_text() {
        let mut editor = FieldEditor::new(hex_field(vec![2]));
        assert!(editor.input("abcd"));
        assert!(!editor.push('e'));
        assert_eq!(editor.text(), "abcde");
        let FieldValue::HexKey { value, .. } = &editor.field().value else {
            panic!("kind changed");
        };
        assert_eq!(value.len(), 2);
        assert!(!editor.input("zz"));
        assert_eq!(editor.blur(), Validity::Invalid);
        assert!(editor.error_hint().is_some_and(|h| h.contains('2')));
    }

    #[test]
    fn test_select_only_accepts_options() {
        let field = FieldSpec::new(
            FieldValue::EnumSelect {
                value: "protocol".to_string(),
                options: Some(vec!["buffer".to_string(), "protocol".to_string()]),
            },
            DisplayInfo::default(),
        );
        assert_eq!(field.apply("buffer").display_text(), "buffer");
        assert_eq!(field.apply("stream").display_text(), "protocol");
        assert!(!field.accepts_keystroke("stream"));
    }

    #[test]
    fn test_boolean_accepts_only_true_false() {
        let field = FieldSpec::new(FieldValue::Boolean(false), DisplayInfo::default());
        assert_eq!(field.apply("true").value, FieldValue::Boolean(true));
        assert_eq!(field.apply("TRUE").value, FieldValue::Boolean(true));
        assert_eq!(field.apply("yes").value, FieldValue::Boolean(false));
    }

    #[test]
    fn test_exact_u64_keeps_digits_only() {
        let field = FieldSpec::new(
            FieldValue::ExactUnsigned64("42".to_string()),
            DisplayInfo::default(),
        );
        let max = u64::MAX.to_string();
        assert_eq!(field.apply(&max).display_text(), max);
        assert_eq!(field.apply("18446744073709551616").display_text(), "42");
        assert_eq!(field.apply("+7").display_text(), "42");
    }

    #[test]
    fn test_reset_kind_resets_value() {
        let field = ipv4_field("10.1.1.1");
        let reset = field.reset_kind(FieldKind::Unsigned16);
        assert_eq!(reset.kind(), FieldKind::Unsigned16);
        assert_eq!(reset.display_text(), "0");
        assert_eq!(reset.display, field.display);
        assert_eq!(field.reset_kind(FieldKind::Ipv4), field);
    }

    #[test]
    fn test_validate_matches_engine_rules() {
        assert!(ipv4_field("127.0.0.1").validate().is_ok());
        assert!(matches!(
            ipv4_field("300.0.0.1").validate(),
            Err(FieldError::InvalidIpv4(_))
        ));
        assert!(matches!(
            hex_field(vec![8, 16]).validate(),
            Err(FieldError::KeyLength { len: 0, .. })
        ));
        assert!(u16_field(9001, 0, 9000).validate().is_err());
    }

    #[test]
    fn test_decode_engine_field() {
        let json = r#"{"Type":"u16","Value":8123,"Range":[0,65535],"Display":{"Description":"Your friends Port.","Name":"","Group":"","GroupToggle":false}}"#;
        let field: FieldSpec = serde_json::from_str(json).unwrap();
        assert_eq!(field.kind(), FieldKind::Unsigned16);
        assert_eq!(field.display_text(), "8123");
        assert_eq!(field.display.label("FriendPort"), "FriendPort");

        let back = serde_json::to_value(&field).unwrap();
        let expected: Value = serde_json::from_str(json).unwrap();
        assert_eq!(back, expected);
    }

    #[test]
    fn test_hex_key_travels_as_base64() {
        let json = r#"{"Type":"hexkey","Value":"AAECAw==","Range":[4,8],"Display":{}}"#;
        let field: FieldSpec = serde_json::from_str(json).unwrap();
        assert_eq!(field.display_text(), "00010203");
        let back = serde_json::to_value(&field).unwrap();
        assert_eq!(back["Value"], "AAECAw==");
        assert_eq!(back["Range"], json!([4, 8]));

        let legacy = r#"{"Type":"hexkey","Value":[1,2],"Range":null,"Display":{}}"#;
        let legacy: FieldSpec = serde_json::from_str(legacy).unwrap();
        assert_eq!(legacy.display_text(), "0102");
    }

    #[test]
    fn test_decode_rejects_mismatched_value() {
        for json in [
            r#"{"Type":"bool","Value":"yes","Display":{}}"#,
            r#"{"Type":"i8","Value":300,"Range":[-128,127]}"#,
            r#"{"Type":"float","Value":1.5}"#,
        ] {
            assert!(serde_json::from_str::<FieldSpec>(json).is_err(), "{json}");
        }
    }
}
