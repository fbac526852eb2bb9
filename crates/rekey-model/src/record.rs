//! Legacy and transformed key snapshots.

use serde::{Deserialize, Serialize};

/// One V1 key snapshot as written by the upstream dump producer.
///
/// `objid`/`extid` are attached by the enrichment pass and may be absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegacyRecord {
    pub key: String,
    #[serde(with = "payload_base64")]
    pub dump: Vec<u8>,
    #[serde(default)]
    pub ttl_ms: Option<i64>,
    #[serde(default)]
    pub db: Option<i64>,
    #[serde(default)]
    pub created: Option<f64>,
    #[serde(default)]
    pub objid: Option<String>,
    #[serde(default)]
    pub extid: Option<String>,
}

impl LegacyRecord {
    pub fn new(key: impl Into<String>, dump: Vec<u8>) -> Self {
        Self {
            key: key.into(),
            dump,
            ttl_ms: None,
            db: None,
            created: None,
            objid: None,
            extid: None,
        }
    }

    /// Enrichment-provided canonical id, ignoring empty strings.
    pub fn enriched_objid(&self) -> Option<&str> {
        non_empty(self.objid.as_deref())
    }

    /// Enrichment-provided external id, ignoring empty strings.
    pub fn enriched_extid(&self) -> Option<&str> {
        non_empty(self.extid.as_deref())
    }
}

/// A re-keyed V2 snapshot.
///
/// One primary record exists per entity; renamed sub-records share its
/// canonical id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformedRecord {
    pub key: String,
    #[serde(with = "payload_base64")]
    pub dump: Vec<u8>,
    #[serde(default)]
    pub ttl_ms: Option<i64>,
    #[serde(default)]
    pub db: Option<i64>,
    #[serde(default)]
    pub created: Option<f64>,
    pub objid: String,
    #[serde(default)]
    pub extid: Option<String>,
    #[serde(default)]
    pub org_id: Option<String>,
}

impl TransformedRecord {
    /// Creation time if it is usable as an index score.
    pub fn score(&self) -> Option<f64> {
        self.created.filter(|c| c.is_finite() && *c > 0.0)
    }

    pub fn extid(&self) -> Option<&str> {
        non_empty(self.extid.as_deref())
    }

    pub fn org_id(&self) -> Option<&str> {
        non_empty(self.org_id.as_deref())
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

/// Serde adapter storing binary payloads as standard base64 strings.
pub mod payload_base64 {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(deserializer)?;
        STANDARD
            .decode(text.as_bytes())
            .map_err(|e| serde::de::Error::custom(format!("invalid base64 dump: {e}")))
    }
}
