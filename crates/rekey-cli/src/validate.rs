use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use rekey_model::{jsonl, IndexCommand, TransformedRecord};
use rekey_transform::extract_file;
use rekey_validate::{validate, Artifacts, VerdictPolicy};

use crate::summary;
use crate::transform::load_relationships;
use crate::GlobalArgs;

#[derive(Args, Debug, Clone)]
pub struct ValidateArgs {
    /// Original legacy dump
    #[arg(long)]
    pub legacy: PathBuf,

    /// Transformed records
    #[arg(long)]
    pub transformed: PathBuf,

    /// Index commands
    #[arg(long)]
    pub indexes: PathBuf,

    /// Flat JSON relationship table (owner reference → org id)
    #[arg(long)]
    pub relationships: Option<PathBuf>,

    /// Organization index-commands file (relationship hash + ordering index)
    #[arg(long)]
    pub org_index: Option<PathBuf>,

    /// Fail when legacy and transformed counts differ
    #[arg(long)]
    pub strict_counts: bool,

    /// Fail on index score / created mismatches
    #[arg(long)]
    pub strict_timestamps: bool,

    /// Fail on org ids outside the known organizations
    #[arg(long)]
    pub strict_orgs: bool,

    /// Write the full report as JSON
    #[arg(long)]
    pub report: Option<PathBuf>,
}

impl ValidateArgs {
    pub fn policy(&self) -> VerdictPolicy {
        VerdictPolicy {
            strict_counts: self.strict_counts,
            strict_timestamps: self.strict_timestamps,
            strict_orgs: self.strict_orgs,
        }
    }
}

pub fn cmd_validate(global: &GlobalArgs, args: &ValidateArgs) -> Result<bool> {
    let profile = global.profile();
    summary::header("Validating", profile.name);

    let legacy = extract_file(&args.legacy, profile)
        .with_context(|| format!("cannot read dump {}", args.legacy.display()))?;
    let transformed: Vec<TransformedRecord> = jsonl::read_all(&args.transformed)
        .with_context(|| format!("cannot read {}", args.transformed.display()))?;
    let indexes: Vec<IndexCommand> = jsonl::read_all(&args.indexes)
        .with_context(|| format!("cannot read {}", args.indexes.display()))?;
    let org_indexes: Option<Vec<IndexCommand>> = args
        .org_index
        .as_ref()
        .map(|path| {
            jsonl::read_all(path).with_context(|| format!("cannot read {}", path.display()))
        })
        .transpose()?;
    let relationships = load_relationships(
        profile,
        args.relationships.as_deref(),
        args.org_index.as_deref(),
    )?;

    let mut codec = global.connect()?;
    let artifacts = Artifacts {
        legacy: &legacy,
        transformed: &transformed,
        indexes: &indexes,
        relationships: relationships.as_ref(),
        org_indexes: org_indexes.as_deref(),
    };
    let report = validate(profile, &artifacts, &mut codec, args.policy())
        .context("cannot build validation views")?;

    if let Some(path) = &args.report {
        jsonl::write_pretty(path, &report)
            .with_context(|| format!("cannot write {}", path.display()))?;
        summary::wrote(path, "report");
    }
    summary::validation(&report);
    Ok(report.passed)
}
