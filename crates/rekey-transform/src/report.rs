use serde::Serialize;

use rekey_model::Diagnostics;

use crate::extract::ExtractStats;

/// Per-outcome transform counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TransformCounts {
    pub groups: u64,
    pub transformed: u64,
    pub sub_records: u64,
    pub skipped_missing_object: u64,
    pub skipped_decode: u64,
    pub skipped_unresolved_id: u64,
    pub skipped_invalid_id: u64,
    pub skipped_duplicate_id: u64,
    pub skipped_transcode: u64,
    pub skipped_missing_created: u64,
    pub skipped_encode: u64,
    pub sub_record_failures: u64,
    pub unresolved_owner: u64,
    pub created_fallback: u64,
}

impl TransformCounts {
    pub fn skipped(&self) -> u64 {
        self.skipped_missing_object
            + self.skipped_decode
            + self.skipped_unresolved_id
            + self.skipped_invalid_id
            + self.skipped_duplicate_id
            + self.skipped_transcode
            + self.skipped_missing_created
            + self.skipped_encode
    }

    pub fn merge(&mut self, other: &TransformCounts) {
        self.groups += other.groups;
        self.transformed += other.transformed;
        self.sub_records += other.sub_records;
        self.skipped_missing_object += other.skipped_missing_object;
        self.skipped_decode += other.skipped_decode;
        self.skipped_unresolved_id += other.skipped_unresolved_id;
        self.skipped_invalid_id += other.skipped_invalid_id;
        self.skipped_duplicate_id += other.skipped_duplicate_id;
        self.skipped_transcode += other.skipped_transcode;
        self.skipped_missing_created += other.skipped_missing_created;
        self.skipped_encode += other.skipped_encode;
        self.sub_record_failures += other.sub_record_failures;
        self.unresolved_owner += other.unresolved_owner;
        self.created_fallback += other.created_fallback;
    }

    /// `(name, value)` pairs for manifests and summaries.
    pub fn entries(&self) -> [(&'static str, u64); 15] {
        [
            ("groups", self.groups),
            ("transformed", self.transformed),
            ("sub_records", self.sub_records),
            ("skipped", self.skipped()),
            ("skipped_missing_object", self.skipped_missing_object),
            ("skipped_decode", self.skipped_decode),
            ("skipped_unresolved_id", self.skipped_unresolved_id),
            ("skipped_invalid_id", self.skipped_invalid_id),
            ("skipped_duplicate_id", self.skipped_duplicate_id),
            ("skipped_transcode", self.skipped_transcode),
            ("skipped_missing_created", self.skipped_missing_created),
            ("skipped_encode", self.skipped_encode),
            ("sub_record_failures", self.sub_record_failures),
            ("unresolved_owner", self.unresolved_owner),
            ("created_fallback", self.created_fallback),
        ]
    }
}

/// Report builder threaded through the transform stage.
#[derive(Debug, Clone, Default)]
pub struct TransformReport {
    pub extract: ExtractStats,
    pub counts: TransformCounts,
    pub diagnostics: Diagnostics,
}

impl TransformReport {
    pub fn merge(&mut self, other: TransformReport) {
        self.counts.merge(&other.counts);
        self.diagnostics.merge(other.diagnostics);
    }
}
