use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use rekey_index::{build_indexes, plan_indexes};
use rekey_model::{jsonl, TransformedRecord};

use crate::artifacts::OutputDir;
use crate::summary;
use crate::GlobalArgs;

#[derive(Args, Debug, Clone)]
pub struct IndexArgs {
    /// Transformed records produced by `rekey transform`
    pub transformed: PathBuf,

    /// Directory for the index-commands file and manifest
    #[arg(long)]
    pub out_dir: PathBuf,

    /// Count commands without decoding (display lookups are not emitted)
    #[arg(long)]
    pub dry_run: bool,
}

pub fn cmd_index(global: &GlobalArgs, args: &IndexArgs) -> Result<bool> {
    let profile = global.profile();
    summary::header(
        "Indexing",
        &format!("{} ({})", args.transformed.display(), profile.name),
    );

    let records: Vec<TransformedRecord> = jsonl::read_all(&args.transformed)
        .with_context(|| format!("cannot read {}", args.transformed.display()))?;

    if args.dry_run {
        let output = plan_indexes(&records, profile);
        summary::counts(output.report.counts.entries());
        println!("  (dry run: display lookups skipped, nothing written)");
        return Ok(true);
    }

    let mut codec = global.connect()?;
    let output = build_indexes(&records, profile, &mut codec);

    let out = OutputDir::create(&args.out_dir, profile)?;
    let path = out.indexes();
    let written = jsonl::write_all(&path, &output.commands)
        .with_context(|| format!("cannot write {}", path.display()))?;
    summary::wrote(&path, &format!("{written} commands"));

    let report = &output.report;
    for followup in out.finish_stage("index", report.counts.entries(), &[path], &report.diagnostics)? {
        summary::wrote(&followup, "follow-up");
    }

    summary::counts(report.counts.entries());
    summary::diagnostics(&report.diagnostics);
    Ok(true)
}
