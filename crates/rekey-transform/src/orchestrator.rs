//! Per-entity transform driver.
//!
//! For every extracted group:
//!
//! ```text
//! object? → decode → resolve ids → unique? → transcode (strict)
//!         → created time → owner → stamp → encode as <v2>:<objid>:object
//!         → sub-records: decode → transcode (lenient) → encode as <v2>:<objid>:<suffix>
//! ```
//!
//! Any failure before the primary object is encoded skips the whole entity
//! with a diagnostic. A canonical id belongs to the first entity that is
//! actually emitted under it. Sub-record failures never drop the primary.

use std::collections::BTreeSet;

use chrono::Utc;
use serde::Serialize;

use rekey_codec::{PayloadCodec, ScratchStore};
use rekey_model::{
    Diagnostic, Diagnostics, EntityProfile, EntityView, KeyShape, LegacyRecord, TransformedRecord,
    V2Value,
};

use crate::extract::{EntityGroup, Extraction};
use crate::identifiers;
use crate::relationships::{OwnerContext, RelationshipMap};
use crate::report::TransformReport;
use crate::transcode::{self, Policy, V2FieldMap};

pub const MIGRATION_STATUS: &str = "completed";

/// What to do with an entity that has no usable creation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MissingCreatedPolicy {
    /// Use the run's migration timestamp and record a diagnostic.
    #[default]
    UseMigrationTime,
    /// Skip the entity and record a diagnostic.
    Skip,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransformOptions {
    /// Stamped as `migrated_at`; also the created-time fallback.
    pub migrated_at: f64,
    pub missing_created: MissingCreatedPolicy,
}

impl TransformOptions {
    pub fn at(migrated_at: f64) -> Self {
        Self {
            migrated_at,
            missing_created: MissingCreatedPolicy::default(),
        }
    }

    pub fn now() -> Self {
        Self::at(Utc::now().timestamp_millis() as f64 / 1000.0)
    }
}

impl Default for TransformOptions {
    fn default() -> Self {
        Self::now()
    }
}

#[derive(Debug, Clone, Default)]
pub struct TransformOutput {
    pub records: Vec<TransformedRecord>,
    pub report: TransformReport,
}

pub struct Transformer<'a, S> {
    profile: &'a EntityProfile,
    codec: &'a mut PayloadCodec<S>,
    relationships: Option<&'a RelationshipMap>,
    options: TransformOptions,
}

impl<'a, S: ScratchStore> Transformer<'a, S> {
    pub fn new(
        profile: &'a EntityProfile,
        codec: &'a mut PayloadCodec<S>,
        options: TransformOptions,
    ) -> Self {
        Self {
            profile,
            codec,
            relationships: None,
            options,
        }
    }

    /// Without a relationship map, owner resolution is skipped and no
    /// `org_id` is assigned.
    pub fn with_relationships(mut self, relationships: &'a RelationshipMap) -> Self {
        self.relationships = Some(relationships);
        self
    }

    pub fn transform_all(&mut self, extraction: &Extraction) -> TransformOutput {
        let mut report = TransformReport {
            extract: extraction.stats,
            ..TransformReport::default()
        };
        report.diagnostics.merge(extraction.diagnostics.clone());

        let mut records = Vec::new();
        let mut seen = BTreeSet::new();
        for group in extraction.groups.values() {
            report.counts.groups += 1;
            self.transform_group(group, &mut seen, &mut records, &mut report);
        }

        tracing::info!(
            entity = self.profile.name,
            transformed = report.counts.transformed,
            sub_records = report.counts.sub_records,
            skipped = report.counts.skipped(),
            unresolved_owner = report.counts.unresolved_owner,
            "transform complete"
        );
        TransformOutput { records, report }
    }

    fn transform_group(
        &mut self,
        group: &EntityGroup,
        seen: &mut BTreeSet<String>,
        out: &mut Vec<TransformedRecord>,
        report: &mut TransformReport,
    ) {
        let profile = self.profile;
        let Some(object) = &group.object else {
            tracing::warn!(legacy_id = %group.legacy_id, "group has no object record");
            report.counts.skipped_missing_object += 1;
            report.diagnostics.push(Diagnostic::MissingObject {
                legacy_id: group.legacy_id.clone(),
                related_keys: group.related_keys(),
            });
            return;
        };

        let fields = match self.codec.decode(&object.dump) {
            Ok(fields) => fields,
            Err(err) => {
                tracing::warn!(key = %object.key, error = %err, "cannot decode object");
                report.counts.skipped_decode += 1;
                report.diagnostics.push(Diagnostic::DecodeFailed {
                    key: object.key.clone(),
                    error: err.to_string(),
                });
                return;
            }
        };
        let view = EntityView::from_legacy(&fields, profile);

        let Some(ids) = identifiers::resolve(object, &view, profile) else {
            report.counts.skipped_unresolved_id += 1;
            report.diagnostics.push(Diagnostic::UnresolvedId {
                key: object.key.clone(),
            });
            return;
        };
        if !EntityProfile::is_valid_objid(&ids.objid) {
            tracing::warn!(key = %object.key, objid = %ids.objid, "canonical id is not a key segment");
            report.counts.skipped_invalid_id += 1;
            report.diagnostics.push(Diagnostic::InvalidId {
                key: object.key.clone(),
                objid: ids.objid,
            });
            return;
        }
        // Ids are claimed in `seen` only after the primary is emitted.
        if seen.contains(&ids.objid) {
            tracing::warn!(key = %object.key, objid = %ids.objid, "duplicate canonical id");
            report.counts.skipped_duplicate_id += 1;
            report.diagnostics.push(Diagnostic::DuplicateId {
                key: object.key.clone(),
                objid: ids.objid,
            });
            return;
        }

        let mut typed = match transcode::transcode(&fields, &profile.fields, Policy::Strict) {
            Ok(typed) => typed,
            Err(err) => {
                tracing::warn!(key = %object.key, error = %err, "transcode failed");
                report.counts.skipped_transcode += 1;
                report.diagnostics.push(Diagnostic::TranscodeFailed {
                    key: object.key.clone(),
                    error: err.to_string(),
                });
                return;
            }
        };

        let record_created = object.created.filter(|c| c.is_finite() && *c > 0.0);
        let created = match view.created.or(record_created) {
            Some(created) => created,
            None => {
                report.diagnostics.push(Diagnostic::MissingCreated {
                    key: object.key.clone(),
                    objid: ids.objid.clone(),
                });
                match self.options.missing_created {
                    MissingCreatedPolicy::UseMigrationTime => {
                        report.counts.created_fallback += 1;
                        self.options.migrated_at
                    }
                    MissingCreatedPolicy::Skip => {
                        report.counts.skipped_missing_created += 1;
                        return;
                    }
                }
            }
        };

        let org_id = match (profile.owner, self.relationships) {
            (Some(_), Some(map)) => {
                let ctx = OwnerContext {
                    objid: &ids.objid,
                    extid: ids.extid.as_deref(),
                    display_key: view.display_key.as_deref(),
                    created: Some(created),
                    legacy_key: &object.key,
                };
                match map.resolve(view.owner_ref.as_deref(), ctx) {
                    Ok(org_id) => Some(org_id),
                    Err(diagnostic) => {
                        tracing::debug!(objid = %ids.objid, "owner unresolved");
                        report.counts.unresolved_owner += 1;
                        report.diagnostics.push(diagnostic);
                        None
                    }
                }
            }
            _ => None,
        };

        self.stamp(&mut typed, object, &ids, created, org_id.as_deref());

        let key = profile.v2_object_key(&ids.objid);
        let dump = match self.codec.encode(&transcode::serialize(&typed)) {
            Ok(dump) => dump,
            Err(err) => {
                report.counts.skipped_encode += 1;
                report.diagnostics.push(Diagnostic::EncodeFailed {
                    key: object.key.clone(),
                    error: err.to_string(),
                });
                return;
            }
        };
        tracing::debug!(from = %object.key, to = %key, "object transformed");
        seen.insert(ids.objid.clone());
        out.push(TransformedRecord {
            key,
            dump,
            ttl_ms: object.ttl_ms,
            db: object.db,
            created: Some(created),
            objid: ids.objid.clone(),
            extid: ids.extid.clone(),
            org_id: org_id.clone(),
        });
        report.counts.transformed += 1;

        for related in &group.related {
            match self.transform_sub_record(related, &ids.objid) {
                Ok((key, dump)) => {
                    out.push(TransformedRecord {
                        key,
                        dump,
                        ttl_ms: related.ttl_ms,
                        db: related.db,
                        created: Some(created),
                        objid: ids.objid.clone(),
                        extid: ids.extid.clone(),
                        org_id: org_id.clone(),
                    });
                    report.counts.sub_records += 1;
                }
                Err(error) => {
                    tracing::warn!(key = %related.key, %error, "sub-record dropped");
                    report.counts.sub_record_failures += 1;
                    report.diagnostics.push(Diagnostic::SubRecordFailed {
                        key: related.key.clone(),
                        error,
                    });
                }
            }
        }
    }

    fn stamp(
        &self,
        typed: &mut V2FieldMap,
        object: &LegacyRecord,
        ids: &identifiers::ResolvedIds,
        created: f64,
        org_id: Option<&str>,
    ) {
        let text = |v: Option<&str>| v.map_or(V2Value::Null, |s| V2Value::String(s.to_string()));
        let profile = self.profile;
        typed.insert(profile.id_field.to_string(), V2Value::String(ids.objid.clone()));
        typed.insert(profile.extid_field.to_string(), text(ids.extid.as_deref()));
        typed.insert(profile.created_field.to_string(), V2Value::Float(created));
        if profile.owner.is_some() {
            typed.insert("org_id".to_string(), text(org_id));
        }
        typed.insert(
            "migration_status".to_string(),
            V2Value::String(MIGRATION_STATUS.to_string()),
        );
        typed.insert(
            "migrated_at".to_string(),
            V2Value::Float(self.options.migrated_at),
        );
        typed.insert(
            "v1_identifier".to_string(),
            V2Value::String(object.key.clone()),
        );
    }

    fn transform_sub_record(
        &mut self,
        record: &LegacyRecord,
        objid: &str,
    ) -> Result<(String, Vec<u8>), String> {
        let KeyShape::SubRecord { def, .. } = self.profile.classify(&record.key) else {
            return Err("not a sub-record key".to_string());
        };
        let fields = self.codec.decode(&record.dump).map_err(|e| e.to_string())?;
        let typed =
            transcode::transcode(&fields, &def.fields, Policy::Lenient).map_err(|e| e.to_string())?;
        let dump = self
            .codec
            .encode(&transcode::serialize(&typed))
            .map_err(|e| e.to_string())?;
        Ok((self.profile.v2_sub_key(objid, def), dump))
    }
}

/// Dry-run summary: classification and enrichment-only id checks, no
/// decoding.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TransformPlan {
    pub groups: u64,
    pub with_object: u64,
    pub missing_object: u64,
    pub sub_records: u64,
    /// Objects whose canonical id is already known from enrichment.
    pub enriched_ids: u64,
    pub duplicate_enriched_ids: u64,
    pub invalid_enriched_ids: u64,
    #[serde(skip)]
    pub diagnostics: Diagnostics,
}

pub fn plan(extraction: &Extraction) -> TransformPlan {
    let mut plan = TransformPlan {
        diagnostics: extraction.diagnostics.clone(),
        ..TransformPlan::default()
    };
    let mut seen = BTreeSet::new();
    for group in extraction.groups.values() {
        plan.groups += 1;
        plan.sub_records += group.related.len() as u64;
        let Some(object) = &group.object else {
            plan.missing_object += 1;
            plan.diagnostics.push(Diagnostic::MissingObject {
                legacy_id: group.legacy_id.clone(),
                related_keys: group.related_keys(),
            });
            continue;
        };
        plan.with_object += 1;
        if let Some(objid) = object.enriched_objid() {
            plan.enriched_ids += 1;
            if !EntityProfile::is_valid_objid(objid) {
                plan.invalid_enriched_ids += 1;
                plan.diagnostics.push(Diagnostic::InvalidId {
                    key: object.key.clone(),
                    objid: objid.to_string(),
                });
            } else if !seen.insert(objid.to_string()) {
                plan.duplicate_enriched_ids += 1;
                plan.diagnostics.push(Diagnostic::DuplicateId {
                    key: object.key.clone(),
                    objid: objid.to_string(),
                });
            }
        }
    }
    plan
}
