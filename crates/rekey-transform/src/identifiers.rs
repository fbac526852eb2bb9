//! Canonical and external id resolution.
//!
//! Priority for the canonical id:
//! 1. enrichment-provided `objid` on the legacy record
//! 2. the id field inside the decoded object
//! 3. the id segment embedded in the legacy key
//!
//! The external id comes from enrichment, else from the decoded object.

use serde::Serialize;

use rekey_model::{EntityProfile, EntityView, KeyShape, LegacyRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IdSource {
    Enrichment,
    ObjectField,
    LegacyKey,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedIds {
    pub objid: String,
    pub extid: Option<String>,
    pub source: IdSource,
}

pub fn resolve(
    record: &LegacyRecord,
    view: &EntityView,
    profile: &EntityProfile,
) -> Option<ResolvedIds> {
    let (objid, source) = if let Some(id) = record.enriched_objid() {
        (id.to_string(), IdSource::Enrichment)
    } else if let Some(id) = &view.objid {
        (id.clone(), IdSource::ObjectField)
    } else {
        match profile.classify(&record.key) {
            KeyShape::Object { legacy_id } | KeyShape::SubRecord { legacy_id, .. } => {
                (legacy_id.to_string(), IdSource::LegacyKey)
            }
            _ => return None,
        }
    };

    let extid = record
        .enriched_extid()
        .map(str::to_string)
        .or_else(|| view.extid.clone());

    Some(ResolvedIds {
        objid,
        extid,
        source,
    })
}
