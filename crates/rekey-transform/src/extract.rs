//! Dump extraction and grouping.
//!
//! Streams a legacy dump line by line, classifies each key against the
//! entity profile and groups object and sub-record keys by legacy id.
//! Groups live in a `BTreeMap`, so downstream output order depends only on
//! the input's legacy ids.

use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use serde::Serialize;

use rekey_model::jsonl::JsonlReader;
use rekey_model::{Diagnostic, Diagnostics, EntityProfile, KeyShape, LegacyRecord, ModelError};

/// Every record sharing one legacy id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntityGroup {
    pub legacy_id: String,
    pub object: Option<LegacyRecord>,
    /// Sub-records in input order.
    pub related: Vec<LegacyRecord>,
}

impl EntityGroup {
    pub fn related_keys(&self) -> Vec<String> {
        self.related.iter().map(|r| r.key.clone()).collect()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ExtractStats {
    pub lines: u64,
    pub records: u64,
    pub aggregate: u64,
    pub objects: u64,
    pub sub_records: u64,
    pub global: u64,
    pub unrecognized: u64,
    pub malformed: u64,
    pub duplicates: u64,
}

#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub groups: BTreeMap<String, EntityGroup>,
    /// The legacy aggregate index record, when the dump carries one.
    pub aggregate: Option<LegacyRecord>,
    pub stats: ExtractStats,
    pub diagnostics: Diagnostics,
}

impl Extraction {
    pub fn legacy_ids(&self) -> impl Iterator<Item = &str> {
        self.groups
            .values()
            .filter(|g| g.object.is_some())
            .map(|g| g.legacy_id.as_str())
    }
}

pub fn extract_file(path: &Path, profile: &EntityProfile) -> Result<Extraction, ModelError> {
    let file = File::open(path).map_err(|e| ModelError::file(path, e))?;
    extract(BufReader::new(file), profile)
}

/// Group a dump. Malformed lines and repeated keys are diagnostics; only
/// I/O failures abort.
pub fn extract<R: BufRead>(reader: R, profile: &EntityProfile) -> Result<Extraction, ModelError> {
    let mut out = Extraction::default();
    let mut seen: BTreeSet<String> = BTreeSet::new();

    for item in JsonlReader::<R, LegacyRecord>::new(reader) {
        let record = match item {
            Ok((line, record)) => {
                out.stats.lines = line as u64;
                record
            }
            Err(ModelError::BadLine { line, message }) => {
                out.stats.lines = line as u64;
                out.stats.malformed += 1;
                tracing::warn!(line, error = %message, "skipping malformed dump line");
                out.diagnostics.push(Diagnostic::MalformedLine {
                    line,
                    error: message,
                });
                continue;
            }
            Err(other) => return Err(other),
        };
        out.stats.records += 1;

        if !seen.insert(record.key.clone()) {
            out.stats.duplicates += 1;
            out.diagnostics.push(Diagnostic::DuplicateRecord {
                key: record.key.clone(),
            });
            continue;
        }

        match profile.classify(&record.key) {
            KeyShape::AggregateIndex => {
                out.stats.aggregate += 1;
                out.aggregate = Some(record);
            }
            KeyShape::Global => out.stats.global += 1,
            KeyShape::Unrecognized => {
                out.stats.unrecognized += 1;
                tracing::debug!(key = %record.key, "unrecognized key");
                out.diagnostics.push(Diagnostic::UnrecognizedKey {
                    key: record.key.clone(),
                });
            }
            KeyShape::Object { legacy_id } => {
                out.stats.objects += 1;
                let legacy_id = legacy_id.to_string();
                group_for(&mut out.groups, &legacy_id).object = Some(record);
            }
            KeyShape::SubRecord { legacy_id, .. } => {
                out.stats.sub_records += 1;
                let legacy_id = legacy_id.to_string();
                group_for(&mut out.groups, &legacy_id).related.push(record);
            }
        }
    }

    tracing::info!(
        entity = profile.name,
        records = out.stats.records,
        groups = out.groups.len(),
        malformed = out.stats.malformed,
        "dump extracted"
    );
    Ok(out)
}

fn group_for<'g>(groups: &'g mut BTreeMap<String, EntityGroup>, legacy_id: &str) -> &'g mut EntityGroup {
    groups
        .entry(legacy_id.to_string())
        .or_insert_with(|| EntityGroup {
            legacy_id: legacy_id.to_string(),
            ..EntityGroup::default()
        })
}
