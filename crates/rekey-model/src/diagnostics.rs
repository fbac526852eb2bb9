//! Recoverable per-record findings.
//!
//! Stages never abort on a bad record. They push a [`Diagnostic`] with enough
//! context to act on later and move on to the next entity. Each category is
//! exported to its own follow-up file for manual remediation.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "category", rename_all = "snake_case")]
pub enum Diagnostic {
    MalformedLine {
        line: usize,
        error: String,
    },
    DuplicateRecord {
        key: String,
    },
    UnrecognizedKey {
        key: String,
    },
    MissingObject {
        legacy_id: String,
        related_keys: Vec<String>,
    },
    DecodeFailed {
        key: String,
        error: String,
    },
    UnresolvedId {
        key: String,
    },
    InvalidId {
        key: String,
        objid: String,
    },
    DuplicateId {
        key: String,
        objid: String,
    },
    TranscodeFailed {
        key: String,
        error: String,
    },
    MissingCreated {
        key: String,
        objid: String,
    },
    UnresolvedOwner {
        objid: String,
        extid: Option<String>,
        display_key: Option<String>,
        created: Option<f64>,
        owner_ref: Option<String>,
        legacy_key: String,
    },
    EncodeFailed {
        key: String,
        error: String,
    },
    SubRecordFailed {
        key: String,
        error: String,
    },
}

impl Diagnostic {
    pub fn category(&self) -> &'static str {
        match self {
            Diagnostic::MalformedLine { .. } => "malformed_line",
            Diagnostic::DuplicateRecord { .. } => "duplicate_record",
            Diagnostic::UnrecognizedKey { .. } => "unrecognized_key",
            Diagnostic::MissingObject { .. } => "missing_object",
            Diagnostic::DecodeFailed { .. } => "decode_failed",
            Diagnostic::UnresolvedId { .. } => "unresolved_id",
            Diagnostic::InvalidId { .. } => "invalid_id",
            Diagnostic::DuplicateId { .. } => "duplicate_id",
            Diagnostic::TranscodeFailed { .. } => "transcode_failed",
            Diagnostic::MissingCreated { .. } => "missing_created",
            Diagnostic::UnresolvedOwner { .. } => "unresolved_owner",
            Diagnostic::EncodeFailed { .. } => "encode_failed",
            Diagnostic::SubRecordFailed { .. } => "sub_record_failed",
        }
    }

    /// One-line description for summaries.
    pub fn describe(&self) -> String {
        match self {
            Diagnostic::MalformedLine { line, error } => format!("line {line}: {error}"),
            Diagnostic::DuplicateRecord { key } => format!("{key} appears more than once"),
            Diagnostic::UnrecognizedKey { key } => key.clone(),
            Diagnostic::MissingObject {
                legacy_id,
                related_keys,
            } => format!(
                "{legacy_id}: no object record (related: {})",
                related_keys.join(", ")
            ),
            Diagnostic::DecodeFailed { key, error }
            | Diagnostic::TranscodeFailed { key, error }
            | Diagnostic::EncodeFailed { key, error }
            | Diagnostic::SubRecordFailed { key, error } => format!("{key}: {error}"),
            Diagnostic::UnresolvedId { key } => format!("{key}: no canonical id"),
            Diagnostic::InvalidId { key, objid } => {
                format!("{key}: canonical id {objid:?} cannot form a V2 key")
            }
            Diagnostic::DuplicateId { key, objid } => {
                format!("{key}: canonical id {objid} already emitted")
            }
            Diagnostic::MissingCreated { key, objid } => {
                format!("{key} ({objid}): no creation timestamp")
            }
            Diagnostic::UnresolvedOwner {
                objid,
                display_key,
                owner_ref,
                ..
            } => format!(
                "{objid} ({}): owner {} has no organization",
                display_key.as_deref().unwrap_or("-"),
                owner_ref.as_deref().unwrap_or("<none>")
            ),
        }
    }
}

/// Ordered collection of diagnostics, grouped by category on demand.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.entries.push(diagnostic);
    }

    pub fn merge(&mut self, other: Diagnostics) {
        self.entries.extend(other.entries);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter()
    }

    pub fn count(&self, category: &str) -> usize {
        self.entries
            .iter()
            .filter(|d| d.category() == category)
            .count()
    }

    pub fn by_category(&self) -> BTreeMap<&'static str, Vec<&Diagnostic>> {
        let mut out: BTreeMap<&'static str, Vec<&Diagnostic>> = BTreeMap::new();
        for d in &self.entries {
            out.entry(d.category()).or_default().push(d);
        }
        out
    }
}
