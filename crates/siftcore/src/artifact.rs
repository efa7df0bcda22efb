use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Fixed-length content fingerprint identifying a node's effective inputs.
///
/// Two nodes with identical type, parameters, and upstream fingerprints
/// always carry the same fingerprint, independent of process or machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Hex form, used as the disk-tier keyspace name.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(s: &str) -> Option<Self> {
        let bytes = hex::decode(s).ok()?;
        let arr: [u8; 32] = bytes.try_into().ok()?;
        Some(Self(arr))
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for Fingerprint {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Fingerprint {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Fingerprint::from_hex(&s)
            .ok_or_else(|| serde::de::Error::custom("invalid fingerprint hex"))
    }
}

/// Columnar table payload flowing between nodes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct TableData {
    pub columns: Vec<String>,
    /// Row-major cells; each row has one cell per column.
    pub rows: Vec<Vec<serde_json::Value>>,
}

impl TableData {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

/// Output payload produced by a node's computation.
///
/// Immutable once stored in the cache: updates always happen under a new
/// fingerprint, never in place.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind")]
pub enum Artifact {
    Table(TableData),
    Metadata(BTreeMap<String, serde_json::Value>),
    Model { format: String, blob: Vec<u8> },
    Visualization(serde_json::Value),
}

impl Artifact {
    pub fn kind(&self) -> &'static str {
        match self {
            Artifact::Table(_) => "table",
            Artifact::Metadata(_) => "metadata",
            Artifact::Model { .. } => "model",
            Artifact::Visualization(_) => "visualization",
        }
    }

    /// Rough in-memory size estimate, used to pick a cache tier.
    pub fn size_bytes(&self) -> u64 {
        match self {
            Artifact::Table(table) => {
                let header: u64 = table.columns.iter().map(|c| c.len() as u64).sum();
                let cells: u64 = table
                    .rows
                    .iter()
                    .flat_map(|row| row.iter())
                    .map(json_size)
                    .sum();
                header + cells
            }
            Artifact::Metadata(map) => map
                .iter()
                .map(|(k, v)| k.len() as u64 + json_size(v))
                .sum(),
            Artifact::Model { format, blob } => format.len() as u64 + blob.len() as u64,
            Artifact::Visualization(value) => json_size(value),
        }
    }

    pub fn as_table(&self) -> Option<&TableData> {
        match self {
            Artifact::Table(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_metadata(&self) -> Option<&BTreeMap<String, serde_json::Value>> {
        match self {
            Artifact::Metadata(m) => Some(m),
            _ => None,
        }
    }
}

fn json_size(value: &serde_json::Value) -> u64 {
    match value {
        serde_json::Value::Null => 4,
        serde_json::Value::Bool(_) => 1,
        serde_json::Value::Number(_) => 8,
        serde_json::Value::String(s) => s.len() as u64,
        serde_json::Value::Array(items) => items.iter().map(json_size).sum(),
        serde_json::Value::Object(map) => {
            map.iter().map(|(k, v)| k.len() as u64 + json_size(v)).sum()
        }
    }
}
