// ============================================================================
// SETTINGS STORE - flat key/value document with a default layer
// ============================================================================
//
// Every filter and encoder mapper reads and writes its configuration through
// this store.  Keys are dotted strings ("Filter.Blur.Size",
// "RateControl.Mode", ...).  Reads fall back from the user layer to the
// default layer to a zero value, with int <-> double coercion, so callers can
// treat every key as always present.
//
// On disk a store is a bincode document behind a 4-byte magic and a version
// stamp, in the same spirit as a versioned project file.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::version::Version;

/// Magic header of a persisted settings document.
const SETTINGS_MAGIC: &str = "BFX1";

/// A single stored value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum SettingValue {
    Int(i64),
    Double(f64),
    String(String),
    Bool(bool),
}

impl SettingValue {
    fn as_int(&self) -> Option<i64> {
        match self {
            SettingValue::Int(v) => Some(*v),
            SettingValue::Double(v) => Some(*v as i64),
            SettingValue::Bool(v) => Some(*v as i64),
            SettingValue::String(_) => None,
        }
    }

    fn as_double(&self) -> Option<f64> {
        match self {
            SettingValue::Int(v) => Some(*v as f64),
            SettingValue::Double(v) => Some(*v),
            SettingValue::Bool(v) => Some(if *v { 1.0 } else { 0.0 }),
            SettingValue::String(_) => None,
        }
    }

    fn as_bool(&self) -> Option<bool> {
        match self {
            SettingValue::Bool(v) => Some(*v),
            SettingValue::Int(v) => Some(*v != 0),
            _ => None,
        }
    }

    fn as_str(&self) -> Option<&str> {
        match self {
            SettingValue::String(v) => Some(v),
            _ => None,
        }
    }

    /// Short type name used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            SettingValue::Int(_) => "int",
            SettingValue::Double(_) => "double",
            SettingValue::String(_) => "string",
            SettingValue::Bool(_) => "bool",
        }
    }
}

/// Error type for settings persistence and parsing.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialize(#[from] Box<bincode::ErrorKind>),
    #[error("invalid settings file: {0}")]
    InvalidFormat(String),
    #[error("cannot parse '{value}' as {expected} for key '{key}'")]
    TypeMismatch {
        key: String,
        value: String,
        expected: &'static str,
    },
}

#[derive(Serialize, Deserialize)]
struct SettingsFile {
    magic: String,
    version: u64,
    values: BTreeMap<String, SettingValue>,
}

/// Layered settings document.  Defaults are never persisted.
#[derive(Clone, Debug, Default)]
pub struct SettingsStore {
    defaults: BTreeMap<String, SettingValue>,
    values: BTreeMap<String, SettingValue>,
}

impl SettingsStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lookup(&self, key: &str) -> Option<&SettingValue> {
        self.values.get(key).or_else(|| self.defaults.get(key))
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    pub fn get_int(&self, key: &str) -> i64 {
        self.lookup(key).and_then(SettingValue::as_int).unwrap_or(0)
    }

    pub fn get_double(&self, key: &str) -> f64 {
        self.lookup(key).and_then(SettingValue::as_double).unwrap_or(0.0)
    }

    pub fn get_bool(&self, key: &str) -> bool {
        self.lookup(key).and_then(SettingValue::as_bool).unwrap_or(false)
    }

    pub fn get_string(&self, key: &str) -> String {
        self.lookup(key)
            .and_then(SettingValue::as_str)
            .unwrap_or_default()
            .to_string()
    }

    pub fn get_default_int(&self, key: &str) -> i64 {
        self.defaults.get(key).and_then(SettingValue::as_int).unwrap_or(0)
    }

    pub fn get_default_double(&self, key: &str) -> f64 {
        self.defaults
            .get(key)
            .and_then(SettingValue::as_double)
            .unwrap_or(0.0)
    }

    pub fn get_default_bool(&self, key: &str) -> bool {
        self.defaults
            .get(key)
            .and_then(SettingValue::as_bool)
            .unwrap_or(false)
    }

    pub fn get_default_string(&self, key: &str) -> String {
        self.defaults
            .get(key)
            .and_then(SettingValue::as_str)
            .unwrap_or_default()
            .to_string()
    }

    /// Raw user-layer value, without default fallback or coercion.
    pub fn user_value(&self, key: &str) -> Option<&SettingValue> {
        self.values.get(key)
    }

    pub fn has_user_value(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// True when the key exists in either layer.
    pub fn contains(&self, key: &str) -> bool {
        self.lookup(key).is_some()
    }

    /// Keys that carry a user value, in sorted order.
    pub fn user_keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    // ------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------

    pub fn set_int(&mut self, key: &str, value: i64) {
        self.values.insert(key.to_string(), SettingValue::Int(value));
    }

    pub fn set_double(&mut self, key: &str, value: f64) {
        self.values.insert(key.to_string(), SettingValue::Double(value));
    }

    pub fn set_bool(&mut self, key: &str, value: bool) {
        self.values.insert(key.to_string(), SettingValue::Bool(value));
    }

    pub fn set_string(&mut self, key: &str, value: &str) {
        self.values
            .insert(key.to_string(), SettingValue::String(value.to_string()));
    }

    pub fn set_default_int(&mut self, key: &str, value: i64) {
        self.defaults.insert(key.to_string(), SettingValue::Int(value));
    }

    pub fn set_default_double(&mut self, key: &str, value: f64) {
        self.defaults.insert(key.to_string(), SettingValue::Double(value));
    }

    pub fn set_default_bool(&mut self, key: &str, value: bool) {
        self.defaults.insert(key.to_string(), SettingValue::Bool(value));
    }

    pub fn set_default_string(&mut self, key: &str, value: &str) {
        self.defaults
            .insert(key.to_string(), SettingValue::String(value.to_string()));
    }

    /// Remove the user value; reads fall back to the default again.
    pub fn unset(&mut self, key: &str) {
        self.values.remove(key);
    }

    /// Parse a textual `value` for `key` and store it as a user value.
    ///
    /// The type is taken from the key's default when one exists; otherwise it
    /// is inferred (int, then double, then bool, then string).
    pub fn set_parsed(&mut self, key: &str, value: &str) -> Result<(), SettingsError> {
        let mismatch = |expected: &'static str| SettingsError::TypeMismatch {
            key: key.to_string(),
            value: value.to_string(),
            expected,
        };
        let parsed = match self.defaults.get(key) {
            Some(SettingValue::Int(_)) => SettingValue::Int(
                value.trim().parse::<i64>().map_err(|_| mismatch("int"))?,
            ),
            Some(SettingValue::Double(_)) => SettingValue::Double(
                value.trim().parse::<f64>().map_err(|_| mismatch("double"))?,
            ),
            Some(SettingValue::Bool(_)) => SettingValue::Bool(
                parse_bool(value).ok_or_else(|| mismatch("bool"))?,
            ),
            Some(SettingValue::String(_)) => SettingValue::String(value.to_string()),
            None => infer_value(value),
        };
        self.values.insert(key.to_string(), parsed);
        Ok(())
    }

    /// Apply a `key=value` assignment (as given on the command line).
    pub fn apply_assignment(&mut self, assignment: &str) -> Result<(), SettingsError> {
        let (key, value) = assignment.split_once('=').ok_or_else(|| {
            SettingsError::InvalidFormat(format!("expected key=value, got '{}'", assignment))
        })?;
        self.set_parsed(key.trim(), value)
    }

    /// Copy every user value of `other` over this store.
    pub fn merge_user_values(&mut self, other: &SettingsStore) {
        for (k, v) in &other.values {
            self.values.insert(k.clone(), v.clone());
        }
    }

    // ------------------------------------------------------------------
    // Persistence
    // ------------------------------------------------------------------

    /// Serialize the user layer (defaults are re-applied by their owners).
    pub fn to_bytes(&self, version: Version) -> Result<Vec<u8>, SettingsError> {
        let file = SettingsFile {
            magic: SETTINGS_MAGIC.to_string(),
            version: version.raw(),
            values: self.values.clone(),
        };
        Ok(bincode::serialize(&file)?)
    }

    /// Parse a document produced by [`to_bytes`](Self::to_bytes).  Returns the
    /// store and the version it was written with.
    pub fn from_bytes(raw: &[u8]) -> Result<(Self, Version), SettingsError> {
        // bincode encodes a String as: 8-byte length prefix + UTF-8 data.
        if raw.len() < 12 {
            return Err(SettingsError::InvalidFormat("file too small".into()));
        }
        let magic = std::str::from_utf8(&raw[8..12]).unwrap_or("");
        if magic != SETTINGS_MAGIC {
            return Err(SettingsError::InvalidFormat(format!(
                "unknown magic '{}'",
                magic
            )));
        }
        let file: SettingsFile = bincode::deserialize(raw)?;
        Ok((
            Self {
                defaults: BTreeMap::new(),
                values: file.values,
            },
            Version::from_raw(file.version),
        ))
    }

    pub fn save(&self, path: &Path, version: Version) -> Result<(), SettingsError> {
        let file = SettingsFile {
            magic: SETTINGS_MAGIC.to_string(),
            version: version.raw(),
            values: self.values.clone(),
        };
        let writer = BufWriter::new(File::create(path)?);
        bincode::serialize_into(writer, &file)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<(Self, Version), SettingsError> {
        let raw = std::fs::read(path)?;
        Self::from_bytes(&raw)
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "on" | "yes" | "1" => Some(true),
        "false" | "off" | "no" | "0" => Some(false),
        _ => None,
    }
}

fn infer_value(value: &str) -> SettingValue {
    let trimmed = value.trim();
    if let Ok(v) = trimmed.parse::<i64>() {
        return SettingValue::Int(v);
    }
    if let Ok(v) = trimmed.parse::<f64>() {
        return SettingValue::Double(v);
    }
    match trimmed {
        "true" => SettingValue::Bool(true),
        "false" => SettingValue::Bool(false),
        _ => SettingValue::String(value.to_string()),
    }
}

// ============================================================================
// Tri-state helpers (-1 = leave the native default alone)
// ============================================================================

pub mod tristate {
    pub const DEFAULT: i64 = -1;
    pub const DISABLED: i64 = 0;
    pub const ENABLED: i64 = 1;

    pub fn is_default(v: i64) -> bool {
        v == DEFAULT
    }

    pub fn is_enabled(v: i64) -> bool {
        v == ENABLED
    }

    pub fn is_disabled(v: i64) -> bool {
        v == DISABLED
    }

    /// Anything other than the default counts as explicitly set.
    pub fn is_set(v: i64) -> bool {
        v != DEFAULT
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_fall_back_to_defaults() {
        let mut s = SettingsStore::new();
        s.set_default_int("A", 7);
        assert_eq!(s.get_int("A"), 7);
        assert!(!s.has_user_value("A"));
        s.set_int("A", 3);
        assert_eq!(s.get_int("A"), 3);
        assert_eq!(s.get_default_int("A"), 7);
        s.unset("A");
        assert_eq!(s.get_int("A"), 7);
        assert_eq!(s.get_int("missing"), 0);
        assert_eq!(s.get_string("missing"), "");
    }

    #[test]
    fn int_and_double_coerce() {
        let mut s = SettingsStore::new();
        s.set_double("D", 12.75);
        s.set_int("I", 4);
        assert_eq!(s.get_int("D"), 12);
        assert!((s.get_double("I") - 4.0).abs() < 1e-12);
        // Strings never coerce to numbers
        s.set_string("S", "42");
        assert_eq!(s.get_int("S"), 0);
    }

    #[test]
    fn parsed_values_follow_default_type() {
        let mut s = SettingsStore::new();
        s.set_default_double("Scale", 100.0);
        s.set_default_bool("On", false);
        s.apply_assignment("Scale=5").unwrap();
        s.apply_assignment("On=true").unwrap();
        s.apply_assignment("Name=hello").unwrap();
        assert_eq!(s.user_value("Scale"), Some(&SettingValue::Double(5.0)));
        assert!(s.get_bool("On"));
        assert_eq!(s.get_string("Name"), "hello");
        assert!(s.apply_assignment("On=maybe").is_err());
        assert!(s.apply_assignment("no-equals-sign").is_err());
    }

    #[test]
    fn bytes_preserve_user_layer_and_version() {
        let mut s = SettingsStore::new();
        s.set_default_int("Default.Only", 1);
        s.set_int("RateControl.Mode", 2);
        s.set_string("Filter.Blur.Type", "gaussian");
        let bytes = s.to_bytes(Version::new(0, 11, 1, 0)).unwrap();

        let (loaded, version) = SettingsStore::from_bytes(&bytes).unwrap();
        assert_eq!(version, Version::new(0, 11, 1, 0));
        assert_eq!(loaded.get_int("RateControl.Mode"), 2);
        assert_eq!(loaded.get_string("Filter.Blur.Type"), "gaussian");
        assert!(!loaded.contains("Default.Only"));
    }

    #[test]
    fn bad_magic_is_rejected() {
        let mut bytes = SettingsStore::new().to_bytes(Version::new(0, 1, 0, 0)).unwrap();
        bytes[8] = b'X';
        assert!(matches!(
            SettingsStore::from_bytes(&bytes),
            Err(SettingsError::InvalidFormat(_))
        ));
        assert!(SettingsStore::from_bytes(&[0u8; 4]).is_err());
    }
}
