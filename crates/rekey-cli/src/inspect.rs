use std::path::Path;

use anyhow::{Context, Result};

use rekey_model::EntityProfile;
use rekey_transform::extract_file;

use crate::summary;

/// Pre-flight look at a dump: classification only, no store access.
pub fn cmd_inspect(profile: &EntityProfile, input: &Path) -> Result<bool> {
    summary::header("Inspecting", &format!("{} ({})", input.display(), profile.name));

    let extraction = extract_file(input, profile)
        .with_context(|| format!("cannot read dump {}", input.display()))?;
    let stats = extraction.stats;
    let orphans = extraction
        .groups
        .values()
        .filter(|g| g.object.is_none())
        .count() as u64;
    let enriched = extraction
        .groups
        .values()
        .filter_map(|g| g.object.as_ref())
        .filter(|o| o.enriched_objid().is_some())
        .count() as u64;

    summary::counts([
        ("lines", stats.lines),
        ("records", stats.records),
        ("aggregate", stats.aggregate),
        ("objects", stats.objects),
        ("sub_records", stats.sub_records),
        ("global", stats.global),
        ("unrecognized", stats.unrecognized),
        ("malformed", stats.malformed),
        ("duplicates", stats.duplicates),
        ("groups", extraction.groups.len() as u64),
        ("groups_without_object", orphans),
        ("enriched_objids", enriched),
    ]);
    summary::diagnostics(&extraction.diagnostics);
    Ok(true)
}
