use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};

use rekey_model::{jsonl, EntityProfile};
use rekey_transform::{
    extract_file, plan, MissingCreatedPolicy, RelationshipMap, TransformOptions, Transformer,
};

use crate::artifacts::OutputDir;
use crate::summary;
use crate::GlobalArgs;

#[derive(Args, Debug, Clone)]
pub struct TransformArgs {
    /// Legacy dump (JSON lines)
    pub input: PathBuf,

    /// Directory for transformed records, follow-ups and the manifest
    #[arg(long)]
    pub out_dir: PathBuf,

    /// Flat JSON object mapping owner reference → org id
    #[arg(long, conflicts_with = "org_index")]
    pub relationships: Option<PathBuf>,

    /// Organization index-commands file to read owner → org id from
    #[arg(long)]
    pub org_index: Option<PathBuf>,

    /// Migration timestamp in epoch seconds (default: now); pin it for
    /// reproducible output
    #[arg(long)]
    pub migrated_at: Option<f64>,

    /// What to do with entities lacking a creation time
    #[arg(long, value_enum, default_value_t = MissingCreatedArg::Fallback)]
    pub missing_created: MissingCreatedArg,

    /// Classify and count only: no store round trips, no files written
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum MissingCreatedArg {
    /// Use the migration timestamp
    Fallback,
    /// Skip the entity
    Skip,
}

impl TransformArgs {
    fn options(&self) -> TransformOptions {
        let mut options = match self.migrated_at {
            Some(at) => TransformOptions::at(at),
            None => TransformOptions::now(),
        };
        options.missing_created = match self.missing_created {
            MissingCreatedArg::Fallback => MissingCreatedPolicy::UseMigrationTime,
            MissingCreatedArg::Skip => MissingCreatedPolicy::Skip,
        };
        options
    }
}

/// Load whichever relationship source was requested. A requested source
/// that cannot be read is fatal.
pub fn load_relationships(
    profile: &EntityProfile,
    relationships: Option<&Path>,
    org_index: Option<&Path>,
) -> Result<Option<RelationshipMap>> {
    let map = match (relationships, org_index, profile.owner) {
        (Some(path), _, _) => RelationshipMap::from_json_file(path)
            .with_context(|| format!("cannot load relationships from {}", path.display()))?,
        (None, Some(path), Some(owner)) => {
            RelationshipMap::from_index_file(path, owner.relationship_index)
                .with_context(|| format!("cannot load organization index {}", path.display()))?
        }
        _ => return Ok(None),
    };
    tracing::info!(entries = map.len(), "relationship table loaded");
    Ok(Some(map))
}

pub fn cmd_transform(global: &GlobalArgs, args: &TransformArgs) -> Result<bool> {
    let profile = global.profile();
    summary::header("Transforming", &format!("{} ({})", args.input.display(), profile.name));

    let relationships = load_relationships(
        profile,
        args.relationships.as_deref(),
        args.org_index.as_deref(),
    )?;
    if profile.owner.is_some() && relationships.is_none() {
        tracing::warn!("no relationship source given, org ids will not be assigned");
    }

    let extraction = extract_file(&args.input, profile)
        .with_context(|| format!("cannot read dump {}", args.input.display()))?;

    if args.dry_run {
        let plan = plan(&extraction);
        summary::counts([
            ("lines", extraction.stats.lines),
            ("groups", plan.groups),
            ("with_object", plan.with_object),
            ("missing_object", plan.missing_object),
            ("sub_records", plan.sub_records),
            ("enriched_ids", plan.enriched_ids),
            ("duplicate_enriched_ids", plan.duplicate_enriched_ids),
            ("invalid_enriched_ids", plan.invalid_enriched_ids),
            ("malformed", extraction.stats.malformed),
        ]);
        summary::diagnostics(&plan.diagnostics);
        println!("  (dry run: nothing decoded, nothing written)");
        return Ok(true);
    }

    let mut codec = global.connect()?;
    let mut transformer = Transformer::new(profile, &mut codec, args.options());
    if let Some(map) = &relationships {
        transformer = transformer.with_relationships(map);
    }
    let output = transformer.transform_all(&extraction);

    let out = OutputDir::create(&args.out_dir, profile)?;
    let transformed = out.transformed();
    let written = jsonl::write_all(&transformed, &output.records)
        .with_context(|| format!("cannot write {}", transformed.display()))?;
    summary::wrote(&transformed, &format!("{written} records"));

    let report = &output.report;
    let followups = out.finish_stage(
        "transform",
        report.counts.entries(),
        &[transformed],
        &report.diagnostics,
    )?;
    for path in &followups {
        summary::wrote(path, "follow-up");
    }

    summary::counts(report.counts.entries());
    summary::diagnostics(&report.diagnostics);
    Ok(true)
}
