//! Reconciliation of the views into a [`ValidationReport`].

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use rekey_model::EntityProfile;

use crate::views::{IndexMembership, LegacyMembership, LegacySource, LookupEntry, ObjectView};

/// Largest score/created difference still considered equal, in seconds.
pub const TIMESTAMP_TOLERANCE: f64 = 1e-3;

/// Which findings gate the verdict.
///
/// Set differences, dangling lookups, duplicate canonical ids and missing org
/// ids always fail a run.
/// The remaining findings are always reported and gate only when enabled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct VerdictPolicy {
    pub strict_counts: bool,
    pub strict_timestamps: bool,
    pub strict_orgs: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimestampMismatch {
    pub objid: String,
    pub index_score: f64,
    pub created: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvalidOrg {
    pub objid: String,
    pub org_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldCoverage {
    pub field: String,
    pub present: usize,
    pub total: usize,
    pub percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationReport {
    pub entity: String,
    pub legacy_count: usize,
    pub legacy_source: LegacySource,
    pub transformed_count: usize,
    pub index_count: usize,
    /// `transformed_count - legacy_count`.
    pub count_delta: i64,
    /// Canonical ids carried by more than one transformed primary.
    pub duplicate_objids: Vec<String>,
    pub in_index_missing_object: Vec<String>,
    pub in_objects_missing_index: Vec<String>,
    pub dangling_lookups: Vec<LookupEntry>,
    pub timestamp_mismatches: Vec<TimestampMismatch>,
    pub missing_org_ids: Vec<String>,
    pub invalid_org_ids: Vec<InvalidOrg>,
    /// False when no organization source was supplied.
    pub org_validity_checked: bool,
    pub undecodable_objects: Vec<String>,
    pub coverage: Vec<FieldCoverage>,
    pub policy: VerdictPolicy,
    pub failures: Vec<String>,
    pub passed: bool,
}

/// Compare the four views and decide the verdict.
pub fn cross_validate(
    profile: &EntityProfile,
    legacy: &LegacyMembership,
    index: &IndexMembership,
    objects: &[ObjectView],
    valid_orgs: Option<&BTreeSet<String>>,
    policy: VerdictPolicy,
) -> ValidationReport {
    let mut by_id: BTreeMap<&str, &ObjectView> = BTreeMap::new();
    let mut duplicate_objids: BTreeSet<String> = BTreeSet::new();
    for object in objects {
        if by_id.insert(object.objid.as_str(), object).is_some() {
            duplicate_objids.insert(object.objid.clone());
        }
    }
    let duplicate_objids: Vec<String> = duplicate_objids.into_iter().collect();

    let in_index_missing_object: Vec<String> = index
        .ordering
        .keys()
        .filter(|id| !by_id.contains_key(id.as_str()))
        .cloned()
        .collect();
    let in_objects_missing_index: Vec<String> = by_id
        .keys()
        .filter(|id| !index.ordering.contains_key(**id))
        .map(|id| id.to_string())
        .collect();
    let dangling_lookups: Vec<LookupEntry> = index
        .lookups
        .iter()
        .filter(|l| !by_id.contains_key(l.objid.as_str()))
        .cloned()
        .collect();

    let timestamp_mismatches: Vec<TimestampMismatch> = index
        .ordering
        .iter()
        .filter_map(|(id, score)| {
            let object = by_id.get(id.as_str())?;
            let equal = object
                .created
                .is_some_and(|c| (c - score).abs() <= TIMESTAMP_TOLERANCE);
            (!equal).then(|| TimestampMismatch {
                objid: id.clone(),
                index_score: *score,
                created: object.created,
            })
        })
        .collect();

    let missing_org_ids: Vec<String> = if profile.owner.is_some() {
        by_id
            .values()
            .filter(|o| o.org_id.is_none())
            .map(|o| o.objid.clone())
            .collect()
    } else {
        Vec::new()
    };
    let invalid_org_ids: Vec<InvalidOrg> = match valid_orgs {
        Some(valid) => by_id
            .values()
            .filter_map(|o| {
                let org_id = o.org_id.as_ref()?;
                (!valid.contains(org_id)).then(|| InvalidOrg {
                    objid: o.objid.clone(),
                    org_id: org_id.clone(),
                })
            })
            .collect(),
        None => Vec::new(),
    };

    let undecodable_objects: Vec<String> = by_id
        .values()
        .filter(|o| !o.decoded)
        .map(|o| o.objid.clone())
        .collect();
    let coverage = coverage(profile, objects);

    let legacy_count = legacy.members.len();
    let transformed_count = by_id.len();
    let count_delta = transformed_count as i64 - legacy_count as i64;

    let mut failures = Vec::new();
    if !in_index_missing_object.is_empty() {
        failures.push(format!(
            "{} index entries reference missing objects",
            in_index_missing_object.len()
        ));
    }
    if !in_objects_missing_index.is_empty() {
        failures.push(format!(
            "{} objects missing from the ordering index",
            in_objects_missing_index.len()
        ));
    }
    if !dangling_lookups.is_empty() {
        failures.push(format!(
            "{} lookup entries reference missing objects",
            dangling_lookups.len()
        ));
    }
    if !duplicate_objids.is_empty() {
        failures.push(format!(
            "{} canonical ids used by more than one object",
            duplicate_objids.len()
        ));
    }
    if !missing_org_ids.is_empty() {
        failures.push(format!("{} objects without org_id", missing_org_ids.len()));
    }
    if policy.strict_counts && count_delta != 0 {
        failures.push(format!(
            "count delta {count_delta:+} ({legacy_count} legacy, {transformed_count} transformed)"
        ));
    }
    if policy.strict_timestamps && !timestamp_mismatches.is_empty() {
        failures.push(format!(
            "{} timestamp mismatches",
            timestamp_mismatches.len()
        ));
    }
    if policy.strict_orgs && !invalid_org_ids.is_empty() {
        failures.push(format!("{} invalid org ids", invalid_org_ids.len()));
    }

    let passed = failures.is_empty();
    tracing::info!(entity = profile.name, passed, failures = failures.len(), "validation complete");

    ValidationReport {
        entity: profile.name.to_string(),
        legacy_count,
        legacy_source: legacy.source,
        transformed_count,
        index_count: index.ordering.len(),
        count_delta,
        duplicate_objids,
        in_index_missing_object,
        in_objects_missing_index,
        dangling_lookups,
        timestamp_mismatches,
        missing_org_ids,
        invalid_org_ids,
        org_validity_checked: valid_orgs.is_some(),
        undecodable_objects,
        coverage,
        policy,
        failures,
        passed,
    }
}

fn coverage(profile: &EntityProfile, objects: &[ObjectView]) -> Vec<FieldCoverage> {
    let total = objects.len();
    profile
        .coverage_fields
        .iter()
        .map(|field| {
            let present = objects.iter().filter(|o| o.present.contains(*field)).count();
            let percent = if total == 0 {
                0.0
            } else {
                present as f64 * 100.0 / total as f64
            };
            FieldCoverage {
                field: field.to_string(),
                present,
                total,
                percent,
            }
        })
        .collect()
}
