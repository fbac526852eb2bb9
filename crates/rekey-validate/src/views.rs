//! The four independent views the validator reconciles.
//!
//! Each view is built from an artifact on its own terms: the legacy dump,
//! the index command stream as actually written, the transformed objects
//! and the organization sources. None of them is re-derived from another.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use rekey_codec::{CodecError, PayloadCodec, ScratchStore};
use rekey_model::{EntityProfile, EntityView, IndexCommand, TransformedRecord, V2Value};
use rekey_transform::transcode;
use rekey_transform::{Extraction, RelationshipMap};

#[derive(Debug, thiserror::Error)]
pub enum ViewError {
    #[error("cannot decode legacy aggregate index {key}: {source}")]
    Aggregate {
        key: String,
        #[source]
        source: CodecError,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LegacySource {
    AggregateIndex,
    ObjectKeys,
}

/// (a) Which entities existed before the migration.
#[derive(Debug, Clone, PartialEq)]
pub struct LegacyMembership {
    pub members: BTreeSet<String>,
    pub source: LegacySource,
}

impl LegacyMembership {
    /// Members of the decoded aggregate index, or the legacy object ids when
    /// the dump carries no aggregate record.
    pub fn from_extraction<S: ScratchStore>(
        extraction: &Extraction,
        codec: &mut PayloadCodec<S>,
    ) -> Result<Self, ViewError> {
        match &extraction.aggregate {
            Some(record) => {
                let members = codec
                    .decode_sorted_set(&record.dump)
                    .map_err(|source| ViewError::Aggregate {
                        key: record.key.clone(),
                        source,
                    })?;
                Ok(Self {
                    members: members.into_iter().map(|(member, _)| member).collect(),
                    source: LegacySource::AggregateIndex,
                })
            }
            None => {
                tracing::warn!("legacy dump has no aggregate index, counting object keys");
                Ok(Self {
                    members: extraction.legacy_ids().map(str::to_string).collect(),
                    source: LegacySource::ObjectKeys,
                })
            }
        }
    }
}

/// A lookup-index HSET entry, for referential checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LookupEntry {
    pub index: String,
    pub field: String,
    pub objid: String,
}

/// (b) Index membership as written in the command stream.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndexMembership {
    /// Ordering-index member → score.
    pub ordering: BTreeMap<String, f64>,
    /// HSET entries whose value must name a canonical id.
    pub lookups: Vec<LookupEntry>,
}

impl IndexMembership {
    pub fn from_commands(commands: &[IndexCommand], profile: &EntityProfile) -> Self {
        let keys = profile.indexes;
        let id_valued = [
            keys.display_lookup,
            keys.display_lookup_compat,
            keys.extid_lookup,
            keys.objid_lookup,
        ];
        let mut out = Self::default();
        for command in commands {
            if command.key == keys.ordering {
                if let Some((score, member)) = command.as_zadd() {
                    out.ordering.insert(member.to_string(), score);
                }
            } else if id_valued.iter().any(|k| *k == command.key) {
                if let Some((field, objid)) = command.as_hset() {
                    out.lookups.push(LookupEntry {
                        index: command.key.clone(),
                        field: field.to_string(),
                        objid,
                    });
                }
            } else if let Some(owner) = profile.owner {
                // Ownership hashes are keyed by canonical id.
                if command.key == owner.ownership_index {
                    if let Some((field, _)) = command.as_hset() {
                        out.lookups.push(LookupEntry {
                            index: command.key.clone(),
                            field: field.to_string(),
                            objid: field.to_string(),
                        });
                    }
                }
            }
        }
        out
    }
}

/// (c) One transformed primary object.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjectView {
    pub objid: String,
    pub created: Option<f64>,
    pub org_id: Option<String>,
    /// Fields carrying a non-null, non-empty value.
    pub present: BTreeSet<String>,
    pub decoded: bool,
}

/// Decode every primary record. An undecodable payload still counts as an
/// object, with only its line-level metadata.
pub fn object_views<S: ScratchStore>(
    records: &[TransformedRecord],
    profile: &EntityProfile,
    codec: &mut PayloadCodec<S>,
) -> Vec<ObjectView> {
    records
        .iter()
        .filter(|r| profile.v2_primary_objid(&r.key).is_some())
        .map(|record| {
            let mut view = ObjectView {
                objid: record.objid.clone(),
                created: record.score(),
                org_id: record.org_id().map(str::to_string),
                ..ObjectView::default()
            };
            match codec.decode(&record.dump) {
                Ok(fields) => {
                    let entity = EntityView::from_v2(&fields, profile);
                    view.created = entity.created.or(view.created);
                    view.present = transcode::deserialize(&fields)
                        .into_iter()
                        .filter(|(_, value)| value.is_present())
                        .map(|(name, _)| name)
                        .collect();
                    if view.org_id.is_none() {
                        view.org_id = fields
                            .get("org_id")
                            .map(|v| V2Value::from_serialized(v))
                            .and_then(|v| v.as_str().map(str::to_string));
                    }
                    view.decoded = true;
                }
                Err(err) => {
                    tracing::warn!(key = %record.key, error = %err, "cannot decode transformed object");
                }
            }
            view
        })
        .collect()
}

/// (d) Organization ids an object may legitimately reference.
///
/// `None` when no organization source was supplied, in which case validity
/// is not checked.
pub fn valid_org_ids(
    relationships: Option<&RelationshipMap>,
    org_commands: Option<&[IndexCommand]>,
    profile: &EntityProfile,
) -> Option<BTreeSet<String>> {
    if relationships.is_none() && org_commands.is_none() {
        return None;
    }
    let mut valid: BTreeSet<String> = relationships.map(|m| m.org_ids()).unwrap_or_default();
    if let (Some(commands), Some(owner)) = (org_commands, profile.owner) {
        valid.extend(
            commands
                .iter()
                .filter(|c| c.key == owner.org_ordering_index)
                .filter_map(IndexCommand::as_zadd)
                .map(|(_, member)| member.to_string()),
        );
    }
    Some(valid)
}
