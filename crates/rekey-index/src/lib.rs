//! Secondary-index derivation
//!
//! Reads transformed records and emits the ZADD/HSET commands that rebuild
//! every V2 index for the primary objects. Commands are data: nothing is
//! applied here.
//!
//! Per primary object:
//!
//! | index            | command | when                  |
//! |------------------|---------|-----------------------|
//! | ordering         | ZADD    | created is present    |
//! | display lookups  | HSET ×2 | display key non-empty |
//! | extid lookup     | HSET    | extid present         |
//! | objid lookup     | HSET    | always                |
//! | ownership        | HSET    | org id present        |
//! | participation    | ZADD    | org id present        |
//!
//! Sub-records never produce index entries.

use serde::Serialize;

use rekey_codec::{PayloadCodec, ScratchStore};
use rekey_model::{Diagnostic, Diagnostics, EntityProfile, EntityView, IndexCommand, TransformedRecord};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IndexCounts {
    pub records: u64,
    pub primaries: u64,
    pub sub_records: u64,
    pub ordering: u64,
    pub display_lookup: u64,
    pub extid_lookup: u64,
    pub objid_lookup: u64,
    pub ownership: u64,
    pub participation: u64,
    pub missing_created: u64,
    pub missing_display: u64,
    pub decode_failures: u64,
    pub commands: u64,
}

impl IndexCounts {
    pub fn entries(&self) -> [(&'static str, u64); 13] {
        [
            ("records", self.records),
            ("primaries", self.primaries),
            ("sub_records", self.sub_records),
            ("ordering", self.ordering),
            ("display_lookup", self.display_lookup),
            ("extid_lookup", self.extid_lookup),
            ("objid_lookup", self.objid_lookup),
            ("ownership", self.ownership),
            ("participation", self.participation),
            ("missing_created", self.missing_created),
            ("missing_display", self.missing_display),
            ("decode_failures", self.decode_failures),
            ("commands", self.commands),
        ]
    }
}

#[derive(Debug, Clone, Default)]
pub struct IndexReport {
    pub counts: IndexCounts,
    pub diagnostics: Diagnostics,
}

#[derive(Debug, Clone, Default)]
pub struct IndexOutput {
    pub commands: Vec<IndexCommand>,
    pub report: IndexReport,
}

/// Accumulates commands for one entity profile.
pub struct IndexBuilder<'p> {
    profile: &'p EntityProfile,
    commands: Vec<IndexCommand>,
    report: IndexReport,
}

impl<'p> IndexBuilder<'p> {
    pub fn new(profile: &'p EntityProfile) -> Self {
        Self {
            profile,
            commands: Vec::new(),
            report: IndexReport::default(),
        }
    }

    pub fn is_primary(&self, record: &TransformedRecord) -> bool {
        self.profile.v2_primary_objid(&record.key).is_some()
    }

    /// Emit the commands for one record. `display_key` is `None` when it
    /// was not looked up (dry run) or the object has none.
    pub fn add(&mut self, record: &TransformedRecord, display_key: Option<&str>) {
        self.report.counts.records += 1;
        if !self.is_primary(record) {
            self.report.counts.sub_records += 1;
            return;
        }
        self.report.counts.primaries += 1;

        let keys = self.profile.indexes;
        let objid = record.objid.as_str();

        match record.score() {
            Some(score) => {
                self.push(IndexCommand::zadd(keys.ordering, score, objid));
                self.report.counts.ordering += 1;
            }
            None => self.report.counts.missing_created += 1,
        }

        match display_key.filter(|d| !d.is_empty()) {
            Some(display) => {
                self.push(IndexCommand::hset(keys.display_lookup, display, objid));
                self.push(IndexCommand::hset(keys.display_lookup_compat, display, objid));
                self.report.counts.display_lookup += 2;
            }
            None => self.report.counts.missing_display += 1,
        }

        if let Some(extid) = record.extid() {
            self.push(IndexCommand::hset(keys.extid_lookup, extid, objid));
            self.report.counts.extid_lookup += 1;
        }

        self.push(IndexCommand::hset(keys.objid_lookup, objid, objid));
        self.report.counts.objid_lookup += 1;

        if let (Some(owner), Some(org_id)) = (self.profile.owner, record.org_id()) {
            self.push(IndexCommand::hset(owner.ownership_index, objid, org_id));
            self.push(IndexCommand::zadd(
                owner.participation_key(org_id),
                record.score().unwrap_or(0.0),
                objid,
            ));
            self.report.counts.ownership += 1;
            self.report.counts.participation += 1;
        }
    }

    pub fn record_decode_failure(&mut self, record: &TransformedRecord, error: String) {
        self.report.counts.decode_failures += 1;
        self.report.diagnostics.push(Diagnostic::DecodeFailed {
            key: record.key.clone(),
            error,
        });
    }

    pub fn finish(mut self) -> IndexOutput {
        self.report.counts.commands = self.commands.len() as u64;
        IndexOutput {
            commands: self.commands,
            report: self.report,
        }
    }

    fn push(&mut self, command: IndexCommand) {
        self.commands.push(command);
    }
}

/// Build every index command, decoding each primary payload for its
/// display key.
pub fn build_indexes<S: ScratchStore>(
    records: &[TransformedRecord],
    profile: &EntityProfile,
    codec: &mut PayloadCodec<S>,
) -> IndexOutput {
    let mut builder = IndexBuilder::new(profile);
    for record in records {
        if !builder.is_primary(record) {
            builder.add(record, None);
            continue;
        }
        match codec.decode(&record.dump) {
            Ok(fields) => {
                let view = EntityView::from_v2(&fields, profile);
                builder.add(record, view.display_key.as_deref());
            }
            Err(err) => {
                tracing::warn!(key = %record.key, error = %err, "cannot decode transformed object");
                builder.record_decode_failure(record, err.to_string());
                builder.add(record, None);
            }
        }
    }
    let output = builder.finish();
    tracing::info!(
        entity = profile.name,
        primaries = output.report.counts.primaries,
        commands = output.report.counts.commands,
        "indexes built"
    );
    output
}

/// Dry run: no decoding, so display lookups are never emitted.
pub fn plan_indexes(records: &[TransformedRecord], profile: &EntityProfile) -> IndexOutput {
    let mut builder = IndexBuilder::new(profile);
    for record in records {
        builder.add(record, None);
    }
    builder.finish()
}
