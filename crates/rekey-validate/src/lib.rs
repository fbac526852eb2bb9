//! Cross-validation of a migration run
//!
//! ```text
//!   legacy dump ──► (a) legacy membership ──┐
//!   index file  ──► (b) index membership  ──┤
//!   transformed ──► (c) object views      ──┼──► cross_validate ──► ValidationReport
//!   org sources ──► (d) valid org ids     ──┘         ▲
//!                                               VerdictPolicy
//! ```
//!
//! The validator only reads artifacts; it never writes to the store beyond
//! scratch keys used for decoding.

pub mod report;
pub mod views;

pub use report::{
    cross_validate, FieldCoverage, InvalidOrg, TimestampMismatch, ValidationReport, VerdictPolicy,
    TIMESTAMP_TOLERANCE,
};
pub use views::{
    object_views, valid_org_ids, IndexMembership, LegacyMembership, LegacySource, LookupEntry,
    ObjectView, ViewError,
};

use rekey_codec::{PayloadCodec, ScratchStore};
use rekey_model::{EntityProfile, IndexCommand, TransformedRecord};
use rekey_transform::{Extraction, RelationshipMap};

/// Every artifact a validation run reads.
pub struct Artifacts<'a> {
    pub legacy: &'a Extraction,
    pub transformed: &'a [TransformedRecord],
    pub indexes: &'a [IndexCommand],
    pub relationships: Option<&'a RelationshipMap>,
    pub org_indexes: Option<&'a [IndexCommand]>,
}

/// Build the four views and reconcile them.
pub fn validate<S: ScratchStore>(
    profile: &EntityProfile,
    artifacts: &Artifacts<'_>,
    codec: &mut PayloadCodec<S>,
    policy: VerdictPolicy,
) -> Result<ValidationReport, ViewError> {
    let legacy = LegacyMembership::from_extraction(artifacts.legacy, codec)?;
    let index = IndexMembership::from_commands(artifacts.indexes, profile);
    let objects = object_views(artifacts.transformed, profile, codec);
    let valid = valid_org_ids(artifacts.relationships, artifacts.org_indexes, profile);
    Ok(cross_validate(
        profile,
        &legacy,
        &index,
        &objects,
        valid.as_ref(),
        policy,
    ))
}
