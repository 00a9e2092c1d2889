//! Metric data and definition types.
//!
//! Definitions travel as JSON produced by several generations of senders.
//! The monitor-state enum arrives either as its integer code or its string
//! name, and senders attach fields this crate has never heard of; both are
//! accepted — unknown keys are kept in `extra` so they round-trip.

use crate::{Error, Result};
use serde::de::{self, Deserializer, Visitor};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;

/// Fields a definition document must carry. Enumerated statically so a
/// malformed document is rejected with the full list of what is missing
/// instead of serde's first-miss error.
pub const REQUIRED_FIELDS: &[&str] = &["name", "metric", "org_id", "interval", "mtype"];

/// Monitor state attached to a definition.
///
/// Serialized as its string name; deserialized from either the legacy
/// integer code or the name.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MonitorState {
    #[default]
    Ok,
    Warn,
    Crit,
}

impl MonitorState {
    pub fn as_str(self) -> &'static str {
        match self {
            MonitorState::Ok => "ok",
            MonitorState::Warn => "warning",
            MonitorState::Crit => "critical",
        }
    }

    fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(MonitorState::Ok),
            1 => Some(MonitorState::Warn),
            2 => Some(MonitorState::Crit),
            _ => None,
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        match name {
            "ok" => Some(MonitorState::Ok),
            "warning" => Some(MonitorState::Warn),
            "critical" => Some(MonitorState::Crit),
            _ => None,
        }
    }
}

impl Serialize for MonitorState {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for MonitorState {
    fn deserialize<D: Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Self, D::Error> {
        struct StateVisitor;

        impl Visitor<'_> for StateVisitor {
            type Value = MonitorState;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a monitor state code (0-2) or name (ok/warning/critical)")
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> std::result::Result<MonitorState, E> {
                MonitorState::from_code(v)
                    .ok_or_else(|| E::custom(format!("unrecognized monitor state code {v}")))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<MonitorState, E> {
                self.visit_i64(v as i64)
            }

            fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<MonitorState, E> {
                MonitorState::from_name(v)
                    .ok_or_else(|| E::custom(format!("unrecognized monitor state {v:?}")))
            }
        }

        deserializer.deserialize_any(StateVisitor)
    }
}

/// One ingested sample plus the identifying fields of its series.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricData {
    #[serde(default)]
    pub id: String,
    pub org_id: i32,
    pub name: String,
    pub metric: String,
    pub interval: u32,
    #[serde(default)]
    pub unit: String,
    pub mtype: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub value: f64,
    #[serde(default)]
    pub time: i64,
}

impl MetricData {
    /// Derive the stable series id from the identifying fields. Tags are
    /// sorted first so producers don't have to agree on an order.
    pub fn set_id(&mut self) {
        let mut tags = self.tags.clone();
        tags.sort_unstable();

        let mut hasher = Sha256::new();
        hasher.update(self.name.as_bytes());
        hasher.update([0]);
        hasher.update(self.unit.as_bytes());
        hasher.update([0]);
        hasher.update(self.mtype.as_bytes());
        hasher.update([0]);
        hasher.update(self.interval.to_le_bytes());
        for tag in &tags {
            hasher.update([0]);
            hasher.update(tag.as_bytes());
        }
        let digest = hasher.finalize();

        let mut hex = String::with_capacity(32);
        for byte in &digest[..16] {
            hex.push_str(&format!("{byte:02x}"));
        }
        self.id = format!("{}.{}", self.org_id, hex);
    }
}

/// An indexed series definition.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricDefinition {
    #[serde(default)]
    pub id: String,
    pub org_id: i32,
    pub name: String,
    pub metric: String,
    pub interval: u32,
    #[serde(default)]
    pub unit: String,
    pub mtype: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub last_update: i64,
    #[serde(default)]
    pub state: MonitorState,
    /// Fields from newer senders this build doesn't model, preserved
    /// verbatim.
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl MetricDefinition {
    /// Parse a definition document, validating the statically known
    /// required fields up front.
    pub fn from_json(raw: &str) -> Result<MetricDefinition> {
        let doc: serde_json::Value = serde_json::from_str(raw)?;
        let Some(obj) = doc.as_object() else {
            return Err(Error::BadRequest(
                "metric definition must be a JSON object".to_string(),
            ));
        };
        let missing: Vec<&str> = REQUIRED_FIELDS
            .iter()
            .filter(|f| !obj.contains_key(**f))
            .copied()
            .collect();
        if !missing.is_empty() {
            return Err(Error::BadRequest(format!(
                "metric definition missing required fields: {}",
                missing.join(", ")
            )));
        }
        let mut def: MetricDefinition = serde_json::from_value(doc)?;
        if def.id.is_empty() {
            def.id = MetricData::from(&def).idized();
        }
        Ok(def)
    }

    /// The value of tag `key`, with the series name reachable as the
    /// pseudo tag `name`. Missing tags read as empty.
    pub fn tag_value(&self, key: &str) -> &str {
        if key == "name" {
            return &self.name;
        }
        for tag in &self.tags {
            if let Some((k, v)) = tag.split_once('=') {
                if k == key {
                    return v;
                }
            }
        }
        ""
    }
}

impl From<&MetricData> for MetricDefinition {
    fn from(data: &MetricData) -> Self {
        MetricDefinition {
            id: data.id.clone(),
            org_id: data.org_id,
            name: data.name.clone(),
            metric: data.metric.clone(),
            interval: data.interval,
            unit: data.unit.clone(),
            mtype: data.mtype.clone(),
            tags: data.tags.clone(),
            last_update: data.time,
            state: MonitorState::Ok,
            extra: HashMap::new(),
        }
    }
}

impl From<&MetricDefinition> for MetricData {
    fn from(def: &MetricDefinition) -> Self {
        MetricData {
            id: def.id.clone(),
            org_id: def.org_id,
            name: def.name.clone(),
            metric: def.metric.clone(),
            interval: def.interval,
            unit: def.unit.clone(),
            mtype: def.mtype.clone(),
            tags: def.tags.clone(),
            value: 0.0,
            time: def.last_update,
        }
    }
}

impl MetricData {
    fn idized(mut self) -> String {
        self.set_id();
        self.id
    }
}
