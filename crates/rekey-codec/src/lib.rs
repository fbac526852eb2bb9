//! Binary payload codec
//!
//! Legacy and V2 records are stored as the store's native serialized payload
//! (what `DUMP` returns). Rather than re-implementing that format, the codec
//! uses the store itself as the serialization engine:
//!
//! ```text
//! decode:  RESTORE <scratch> 0 <payload>  →  HGETALL <scratch>  →  DEL <scratch>
//! encode:  HSET <scratch> <fields...>     →  DUMP <scratch>     →  DEL <scratch>
//! ```
//!
//! Every call takes a fresh, process-namespaced, uuid-suffixed scratch key, so
//! concurrent callers never collide. The key is released by a guard on every
//! exit path; a failed release is logged and swallowed.

pub mod memory;
pub mod redis_store;

pub use memory::MemoryStore;
pub use redis_store::{RedisStore, StoreConfig};

use rekey_model::FieldMap;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("store error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("store error: {0}")]
    Store(String),

    #[error("scratch key {0} vanished before it could be dumped")]
    MissingPayload(String),

    #[error("wrong payload type: expected {expected}, found {found}")]
    WrongType {
        expected: &'static str,
        found: &'static str,
    },

    #[error("corrupt payload: {0}")]
    CorruptPayload(String),

    #[error("cannot encode an empty field map")]
    EmptyFieldMap,
}

/// Minimal store surface the codec needs.
pub trait ScratchStore {
    /// Load a serialized payload under `key`, replacing anything there.
    fn restore(&mut self, key: &str, payload: &[u8]) -> Result<(), CodecError>;

    fn hash_entries(&mut self, key: &str) -> Result<Vec<(String, String)>, CodecError>;

    /// Sorted set members in ascending score order.
    fn sorted_set_entries(&mut self, key: &str) -> Result<Vec<(String, f64)>, CodecError>;

    fn write_hash(&mut self, key: &str, entries: &[(String, String)]) -> Result<(), CodecError>;

    fn dump(&mut self, key: &str) -> Result<Option<Vec<u8>>, CodecError>;

    fn delete(&mut self, key: &str) -> Result<(), CodecError>;
}

/// A scratch key that is deleted when the guard goes out of scope.
struct ScratchKey<'s, S: ScratchStore> {
    store: &'s mut S,
    key: String,
}

impl<S: ScratchStore> Drop for ScratchKey<'_, S> {
    fn drop(&mut self) {
        if let Err(err) = self.store.delete(&self.key) {
            tracing::warn!(key = %self.key, error = %err, "failed to release scratch key");
        }
    }
}

pub struct PayloadCodec<S> {
    store: S,
    namespace: String,
}

impl<S: ScratchStore> PayloadCodec<S> {
    pub fn new(store: S) -> Self {
        Self::with_namespace(store, format!("rekey:scratch:{}", std::process::id()))
    }

    pub fn with_namespace(store: S, namespace: impl Into<String>) -> Self {
        Self {
            store,
            namespace: namespace.into(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    fn scratch(&mut self) -> ScratchKey<'_, S> {
        let key = format!("{}:{}", self.namespace, Uuid::new_v4().simple());
        ScratchKey {
            store: &mut self.store,
            key,
        }
    }

    /// Decode a hash payload into its field map.
    pub fn decode(&mut self, payload: &[u8]) -> Result<FieldMap, CodecError> {
        let mut slot = self.scratch();
        slot.store.restore(&slot.key, payload)?;
        let entries = slot.store.hash_entries(&slot.key)?;
        Ok(entries.into_iter().collect())
    }

    /// Decode a sorted-set payload into `(member, score)` pairs.
    pub fn decode_sorted_set(&mut self, payload: &[u8]) -> Result<Vec<(String, f64)>, CodecError> {
        let mut slot = self.scratch();
        slot.store.restore(&slot.key, payload)?;
        let entries = slot.store.sorted_set_entries(&slot.key)?;
        Ok(entries)
    }

    /// Encode a field map as a hash payload.
    pub fn encode(&mut self, fields: &FieldMap) -> Result<Vec<u8>, CodecError> {
        if fields.is_empty() {
            return Err(CodecError::EmptyFieldMap);
        }
        let entries: Vec<(String, String)> = fields
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        let mut slot = self.scratch();
        slot.store.write_hash(&slot.key, &entries)?;
        let payload = slot.store.dump(&slot.key)?;
        payload.ok_or_else(|| CodecError::MissingPayload(slot.key.clone()))
    }
}
