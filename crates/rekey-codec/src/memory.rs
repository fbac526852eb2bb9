//! In-process scratch store.
//!
//! Mirrors the parts of the real store the codec relies on, with its own
//! self-describing payload format so dumps can be produced and checked
//! without a server:
//!
//! ```text
//! "RKMS" | version (1 byte) | CBOR(StoredValue) | SHA-256(CBOR)[..8]
//! ```
//!
//! Payloads from this store are not interchangeable with real server dumps.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{CodecError, ScratchStore};

pub const MAGIC: [u8; 4] = *b"RKMS";
pub const VERSION: u8 = 1;
const CHECKSUM_LEN: usize = 8;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum StoredValue {
    Hash(BTreeMap<String, String>),
    SortedSet(Vec<(String, f64)>),
}

impl StoredValue {
    fn type_name(&self) -> &'static str {
        match self {
            StoredValue::Hash(_) => "hash",
            StoredValue::SortedSet(_) => "zset",
        }
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    values: HashMap<String, StoredValue>,
    failing_deletes: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every delete fail (for exercising cleanup error handling).
    pub fn with_failing_deletes(mut self) -> Self {
        self.failing_deletes = true;
        self
    }

    pub fn key_count(&self) -> usize {
        self.values.len()
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.values.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Serialized hash payload, as `DUMP` on this store would return it.
    pub fn hash_payload<'a, I>(fields: I) -> Result<Vec<u8>, CodecError>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let map = fields
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        serialize(&StoredValue::Hash(map))
    }

    /// Serialized sorted-set payload.
    pub fn sorted_set_payload(members: &[(String, f64)]) -> Result<Vec<u8>, CodecError> {
        let mut members = members.to_vec();
        members.sort_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
        serialize(&StoredValue::SortedSet(members))
    }
}

fn serialize(value: &StoredValue) -> Result<Vec<u8>, CodecError> {
    let mut body = Vec::new();
    ciborium::into_writer(value, &mut body)
        .map_err(|e| CodecError::CorruptPayload(format!("cannot serialize payload: {e}")))?;
    let mut out = Vec::with_capacity(MAGIC.len() + 1 + body.len() + CHECKSUM_LEN);
    out.extend_from_slice(&MAGIC);
    out.push(VERSION);
    out.extend_from_slice(&body);
    out.extend_from_slice(&checksum(&body));
    Ok(out)
}

fn deserialize(payload: &[u8]) -> Result<StoredValue, CodecError> {
    let header = MAGIC.len() + 1;
    if payload.len() < header + CHECKSUM_LEN || payload[..MAGIC.len()] != MAGIC {
        return Err(CodecError::CorruptPayload("bad magic".to_string()));
    }
    if payload[MAGIC.len()] != VERSION {
        return Err(CodecError::CorruptPayload(format!(
            "unsupported payload version {}",
            payload[MAGIC.len()]
        )));
    }
    let (body, sum) = payload[header..].split_at(payload.len() - header - CHECKSUM_LEN);
    if checksum(body) != sum {
        return Err(CodecError::CorruptPayload("checksum mismatch".to_string()));
    }
    ciborium::from_reader(body).map_err(|e| CodecError::CorruptPayload(e.to_string()))
}

fn checksum(body: &[u8]) -> [u8; CHECKSUM_LEN] {
    let mut hasher = Sha256::new();
    hasher.update(body);
    let digest = hasher.finalize();
    let mut out = [0u8; CHECKSUM_LEN];
    out.copy_from_slice(&digest[..CHECKSUM_LEN]);
    out
}

impl ScratchStore for MemoryStore {
    fn restore(&mut self, key: &str, payload: &[u8]) -> Result<(), CodecError> {
        let value = deserialize(payload)?;
        self.values.insert(key.to_string(), value);
        Ok(())
    }

    fn hash_entries(&mut self, key: &str) -> Result<Vec<(String, String)>, CodecError> {
        match self.values.get(key) {
            None => Ok(Vec::new()),
            Some(StoredValue::Hash(map)) => Ok(map.clone().into_iter().collect()),
            Some(other) => Err(CodecError::WrongType {
                expected: "hash",
                found: other.type_name(),
            }),
        }
    }

    fn sorted_set_entries(&mut self, key: &str) -> Result<Vec<(String, f64)>, CodecError> {
        match self.values.get(key) {
            None => Ok(Vec::new()),
            Some(StoredValue::SortedSet(members)) => Ok(members.clone()),
            Some(other) => Err(CodecError::WrongType {
                expected: "zset",
                found: other.type_name(),
            }),
        }
    }

    fn write_hash(&mut self, key: &str, entries: &[(String, String)]) -> Result<(), CodecError> {
        let slot = self
            .values
            .entry(key.to_string())
            .or_insert_with(|| StoredValue::Hash(BTreeMap::new()));
        match slot {
            StoredValue::Hash(map) => {
                map.extend(entries.iter().cloned());
                Ok(())
            }
            other => Err(CodecError::WrongType {
                expected: "hash",
                found: other.type_name(),
            }),
        }
    }

    fn dump(&mut self, key: &str) -> Result<Option<Vec<u8>>, CodecError> {
        self.values.get(key).map(serialize).transpose()
    }

    fn delete(&mut self, key: &str) -> Result<(), CodecError> {
        if self.failing_deletes {
            return Err(CodecError::Store(format!("DEL {key} refused")));
        }
        self.values.remove(key);
        Ok(())
    }
}
