//! Label sets partitioning a single metric into series.
//!
//! Labels are flattened into a key-sorted vector so two sets with the same
//! pairs hash and compare equal regardless of the order callers passed them.

use std::fmt::Write;

use crate::error::{Result, TelemetryError};

/// Label reserved for histogram bucket bounds.
pub const HISTOGRAM_BUCKET_LABEL: &str = "le";

/// Label-name syntax: `[a-zA-Z_][a-zA-Z0-9_]*`.
pub fn is_valid_label_key(key: &str) -> bool {
    let mut chars = key.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Unordered key/value tags, stored sorted by key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LabelSet(Vec<(String, String)>);

impl LabelSet {
    /// The empty label set.
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    /// Build from borrowed pairs. A repeated key keeps its last value.
    pub fn from_pairs(labels: &[(&str, &str)]) -> Self {
        let mut pairs: Vec<(String, String)> = Vec::with_capacity(labels.len());
        for (k, v) in labels {
            match pairs.iter_mut().find(|(pk, _)| pk == k) {
                Some(slot) => slot.1 = v.to_string(),
                None => pairs.push((k.to_string(), v.to_string())),
            }
        }
        pairs.sort();
        Self(pairs)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Reject keys that break the exposition line syntax or collide with
    /// `reserved`.
    pub fn check_keys(&self, reserved: &[&str]) -> Result<()> {
        for (k, _) in &self.0 {
            if !is_valid_label_key(k) {
                return Err(TelemetryError::InvalidDescriptor(format!("invalid label key {k:?}")));
            }
            if reserved.contains(&k.as_str()) {
                return Err(TelemetryError::InvalidDescriptor(format!("reserved label key {k:?}")));
            }
        }
        Ok(())
    }

    /// Render as `k="v",k2="v2"` (no braces), escaping values.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for (i, (k, v)) in self.0.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            let _ = write!(out, "{}=\"{}\"", k, escape_label(v));
        }
        out
    }
}

impl From<&[(&str, &str)]> for LabelSet {
    fn from(labels: &[(&str, &str)]) -> Self {
        Self::from_pairs(labels)
    }
}

impl<const N: usize> From<[(&str, &str); N]> for LabelSet {
    fn from(labels: [(&str, &str); N]) -> Self {
        Self::from_pairs(&labels)
    }
}

/// Helper to escape label values.
fn escape_label(v: &str) -> String {
    v.replace('\\', "\\\\").replace('"', "\\\"").replace('\n', "\\n")
}
