//! Human-readable stage summaries.

use std::path::Path;

use colored::Colorize;

use rekey_model::Diagnostics;
use rekey_validate::ValidationReport;

/// Samples printed per diagnostic category; full lists go to follow-up files.
pub const MAX_SAMPLES: usize = 10;

pub fn header(verb: &str, subject: &str) {
    println!("{} {}", verb.green().bold(), subject);
}

pub fn wrote(path: &Path, detail: &str) {
    println!("  {} {} ({detail})", "→".cyan(), path.display());
}

pub fn counts<'a>(entries: impl IntoIterator<Item = (&'a str, u64)>) {
    for (name, value) in entries {
        if value == 0 {
            continue;
        }
        println!("  {:<24} {}", name, value.to_string().bold());
    }
}

pub fn diagnostics(diagnostics: &Diagnostics) {
    if diagnostics.is_empty() {
        return;
    }
    println!("  {}", "Diagnostics:".yellow().bold());
    for (category, entries) in diagnostics.by_category() {
        println!("    {} {}", category.yellow(), entries.len());
        for d in entries.iter().take(MAX_SAMPLES) {
            println!("      - {}", d.describe());
        }
        if entries.len() > MAX_SAMPLES {
            println!("      … {} more", entries.len() - MAX_SAMPLES);
        }
    }
}

fn samples<T, F>(title: &str, items: &[T], show: F)
where
    F: Fn(&T) -> String,
{
    if items.is_empty() {
        return;
    }
    println!("  {} {}", title.yellow(), items.len());
    for item in items.iter().take(MAX_SAMPLES) {
        println!("      - {}", show(item));
    }
    if items.len() > MAX_SAMPLES {
        println!("      … {} more", items.len() - MAX_SAMPLES);
    }
}

pub fn validation(report: &ValidationReport) {
    println!(
        "  {:<24} {} ({:?})",
        "legacy",
        report.legacy_count,
        report.legacy_source
    );
    println!("  {:<24} {}", "transformed", report.transformed_count);
    println!("  {:<24} {}", "indexed", report.index_count);
    println!("  {:<24} {:+}", "count delta", report.count_delta);

    samples("duplicate canonical ids:", &report.duplicate_objids, String::clone);
    samples(
        "in index, missing object:",
        &report.in_index_missing_object,
        String::clone,
    );
    samples(
        "object, missing from index:",
        &report.in_objects_missing_index,
        String::clone,
    );
    samples("dangling lookups:", &report.dangling_lookups, |l| {
        format!("{} {} → {}", l.index, l.field, l.objid)
    });
    samples("timestamp mismatches:", &report.timestamp_mismatches, |m| {
        format!(
            "{}: index {} vs created {}",
            m.objid,
            m.index_score,
            m.created.map_or("-".to_string(), |c| c.to_string())
        )
    });
    samples("missing org_id:", &report.missing_org_ids, String::clone);
    samples("invalid org_id:", &report.invalid_org_ids, |o| {
        format!("{} → {}", o.objid, o.org_id)
    });
    samples("undecodable objects:", &report.undecodable_objects, String::clone);
    if !report.org_validity_checked {
        println!("  {}", "org validity not checked (no organization source)".dimmed());
    }

    println!("  {}", "Coverage:".cyan());
    for c in &report.coverage {
        println!(
            "    {:<22} {:>6.1}% ({}/{})",
            c.field, c.percent, c.present, c.total
        );
    }

    if report.passed {
        println!("{}", "PASS".green().bold());
    } else {
        println!("{}", "FAIL".red().bold());
        for failure in &report.failures {
            println!("  {} {}", "✗".red(), failure);
        }
    }
}
