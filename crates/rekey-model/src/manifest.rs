//! Per-stage run manifest: counts plus a SHA-256 of every artifact written.
//!
//! Manifests contain no wall-clock fields, so two runs over the same inputs
//! (with a pinned migration timestamp) produce identical manifests.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::ModelError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunManifest {
    pub entity: String,
    pub stage: String,
    pub counts: BTreeMap<String, u64>,
    pub artifacts: Vec<ArtifactDigest>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactDigest {
    pub file: String,
    pub bytes: u64,
    pub sha256: String,
}

impl RunManifest {
    pub fn new(entity: &str, stage: &str) -> Self {
        Self {
            entity: entity.to_string(),
            stage: stage.to_string(),
            counts: BTreeMap::new(),
            artifacts: Vec::new(),
        }
    }

    pub fn count(&mut self, name: &str, value: u64) {
        self.counts.insert(name.to_string(), value);
    }

    /// Record an artifact by file name (not full path) and content digest.
    pub fn add_artifact(&mut self, path: &Path) -> Result<(), ModelError> {
        let bytes = fs::read(path).map_err(|e| ModelError::file(path, e))?;
        let file = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        self.artifacts.push(ArtifactDigest {
            file,
            bytes: bytes.len() as u64,
            sha256: sha256_hex(&bytes),
        });
        Ok(())
    }
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    let mut out = String::with_capacity(64);
    for b in digest.iter() {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}
