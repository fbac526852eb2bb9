//! Integration tests for the complete rekey pipeline
//!
//! These tests run extract → transform → index → validate end to end on the
//! in-memory scratch store:
//! - the four reference scenarios (owned object, unresolved owner, orphan
//!   sub-records, dangling index entry)
//! - identifier uniqueness and referential integrity across artifacts
//! - byte-identical outputs for a pinned migration timestamp
//! - organization indexes feeding the custom-domain owner lookup
//!
//! Run with: cargo test --test integration_tests

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::tempdir;

use rekey_codec::{MemoryStore, PayloadCodec};
use rekey_index::{build_indexes, IndexOutput};
use rekey_model::profile::{CUSTOM_DOMAIN, ORGANIZATION};
use rekey_model::{jsonl, IndexCommand, LegacyRecord, TransformedRecord};
use rekey_transform::{
    extract_file, Extraction, RelationshipMap, TransformOptions, TransformOutput, Transformer,
};
use rekey_validate::{validate, Artifacts, ValidationReport, VerdictPolicy};

const MIGRATED_AT: f64 = 1_700_000_000.0;

// ============================================================================
// Fixtures
// ============================================================================

fn codec() -> PayloadCodec<MemoryStore> {
    PayloadCodec::with_namespace(MemoryStore::new(), "it:scratch")
}

fn hash_record(key: &str, fields: &[(&str, &str)]) -> LegacyRecord {
    LegacyRecord::new(key, MemoryStore::hash_payload(fields.iter().copied()).unwrap())
}

fn domain(legacy_id: &str, objid: &str, custid: &str, display: &str, created: &str) -> LegacyRecord {
    let mut record = hash_record(
        &format!("customdomain:{legacy_id}:object"),
        &[
            ("custid", custid),
            ("display_domain", display),
            ("created", created),
            ("verified", "1"),
            ("status", "active"),
        ],
    );
    record.objid = Some(objid.to_string());
    record.extid = Some(format!("cd_{objid}"));
    record
}

fn aggregate(ids: &[&str]) -> LegacyRecord {
    let members: Vec<(String, f64)> = ids
        .iter()
        .enumerate()
        .map(|(i, id)| (id.to_string(), i as f64))
        .collect();
    LegacyRecord::new("customdomain:values", MemoryStore::sorted_set_payload(&members).unwrap())
}

fn write_dump(dir: &Path, records: &[LegacyRecord]) -> PathBuf {
    let path = dir.join("customdomain_dump.jsonl");
    jsonl::write_all(&path, records).unwrap();
    path
}

struct Run {
    extraction: Extraction,
    transform: TransformOutput,
    index: IndexOutput,
}

fn run_pipeline(dump: &Path, relationships: Option<&RelationshipMap>) -> Run {
    let extraction = extract_file(dump, &CUSTOM_DOMAIN).unwrap();
    let mut codec = codec();
    let transform = {
        let mut transformer =
            Transformer::new(&CUSTOM_DOMAIN, &mut codec, TransformOptions::at(MIGRATED_AT));
        if let Some(map) = relationships {
            transformer = transformer.with_relationships(map);
        }
        transformer.transform_all(&extraction)
    };
    let index = build_indexes(&transform.records, &CUSTOM_DOMAIN, &mut codec);
    assert_eq!(codec.store().key_count(), 0, "scratch keys leaked");
    Run {
        extraction,
        transform,
        index,
    }
}

fn validate_run(
    run: &Run,
    records: &[TransformedRecord],
    commands: &[IndexCommand],
    relationships: Option<&RelationshipMap>,
) -> ValidationReport {
    let artifacts = Artifacts {
        legacy: &run.extraction,
        transformed: records,
        indexes: commands,
        relationships,
        org_indexes: None,
    };
    validate(&CUSTOM_DOMAIN, &artifacts, &mut codec(), VerdictPolicy::default()).unwrap()
}

fn on_key<'a>(commands: &'a [IndexCommand], key: &str) -> Vec<&'a IndexCommand> {
    commands.iter().filter(|c| c.key == key).collect()
}

// ============================================================================
// Reference scenarios
// ============================================================================

#[test]
fn test_scenario_owned_object_gets_every_index() {
    let dir = tempdir().unwrap();
    let dump = write_dump(
        dir.path(),
        &[domain("l1", "o1", "a@example.com", "x.example", "1000")],
    );
    let map = RelationshipMap::from_pairs([("a@example.com", "org1")]);
    let run = run_pipeline(&dump, Some(&map));
    let cmds = &run.index.commands;

    let ordering = on_key(cmds, "custom_domain:instances");
    assert_eq!(ordering.len(), 1);
    assert_eq!(ordering[0].as_zadd(), Some((1000.0, "o1")));

    assert_eq!(on_key(cmds, "custom_domain:display_domain_index").len(), 1);
    assert_eq!(on_key(cmds, "custom_domain:display_domains").len(), 1);
    assert_eq!(
        on_key(cmds, "custom_domain:display_domain_index")[0].as_hset(),
        Some(("x.example", "o1".to_string()))
    );

    let owners = on_key(cmds, "custom_domain:owners");
    assert_eq!(owners.len(), 1);
    assert_eq!(owners[0].as_hset(), Some(("o1", "org1".to_string())));

    let participation = on_key(cmds, "organization:org1:domains");
    assert_eq!(participation.len(), 1);
    assert_eq!(participation[0].as_zadd().map(|(_, m)| m), Some("o1"));
}

#[test]
fn test_scenario_unresolved_owner() {
    let dir = tempdir().unwrap();
    let dump = write_dump(
        dir.path(),
        &[domain("l1", "o1", "a@example.com", "x.example", "1000")],
    );
    let map = RelationshipMap::from_pairs([("other@example.com", "org2")]);
    let run = run_pipeline(&dump, Some(&map));

    assert!(on_key(&run.index.commands, "custom_domain:owners").is_empty());
    assert!(run
        .index
        .commands
        .iter()
        .all(|c| !c.key.starts_with("organization:")));
    assert_eq!(run.transform.report.diagnostics.count("unresolved_owner"), 1);
    assert_eq!(run.transform.records.len(), 1);
    assert_eq!(run.transform.records[0].org_id, None);
}

#[test]
fn test_scenario_sub_records_without_object() {
    let dir = tempdir().unwrap();
    let dump = write_dump(
        dir.path(),
        &[
            hash_record("customdomain:l9:brand", &[("primary_color", "#000")]),
            hash_record("customdomain:l9:icon", &[("filename", "i.png")]),
        ],
    );
    let run = run_pipeline(&dump, None);

    assert!(run.transform.records.is_empty());
    assert_eq!(run.transform.report.counts.skipped_missing_object, 1);
    let related = run
        .transform
        .report
        .diagnostics
        .iter()
        .find_map(|d| match d {
            rekey_model::Diagnostic::MissingObject {
                legacy_id,
                related_keys,
            } if legacy_id == "l9" => Some(related_keys.clone()),
            _ => None,
        })
        .unwrap();
    assert_eq!(
        related,
        vec!["customdomain:l9:brand".to_string(), "customdomain:l9:icon".to_string()]
    );
}

#[test]
fn test_scenario_dangling_index_entry_fails_validation() {
    let dir = tempdir().unwrap();
    let dump = write_dump(
        dir.path(),
        &[
            aggregate(&["l1"]),
            domain("l1", "o1", "a@example.com", "x.example", "1000"),
        ],
    );
    let map = RelationshipMap::from_pairs([("a@example.com", "org1")]);
    let run = run_pipeline(&dump, Some(&map));

    let mut commands = run.index.commands.clone();
    commands.push(IndexCommand::zadd("custom_domain:instances", 5.0, "Z"));
    let report = validate_run(&run, &run.transform.records, &commands, Some(&map));

    assert_eq!(report.in_index_missing_object, vec!["Z".to_string()]);
    assert!(!report.passed);
}

// ============================================================================
// Cross-artifact properties
// ============================================================================

fn mixed_dump(dir: &Path) -> PathBuf {
    write_dump(
        dir,
        &[
            aggregate(&["l1", "l2", "l3", "l4"]),
            domain("l1", "o1", "a@example.com", "a.example", "1000"),
            hash_record("customdomain:l1:brand", &[("primary_color", "#fff")]),
            domain("l2", "o2", "b@example.com", "b.example", "2000"),
            hash_record("customdomain:l2:logo", &[("filename", "b.png"), ("bytes", "42")]),
            domain("l3", "o3", "a@example.com", "c.example", "3000"),
            domain("l4", "o4", "c@example.com", "d.example", ""),
            hash_record("customdomain:display_domains", &[("a.example", "l1")]),
        ],
    )
}

fn mixed_relationships() -> RelationshipMap {
    RelationshipMap::from_pairs([
        ("a@example.com", "org1"),
        ("b@example.com", "org2"),
        ("c@example.com", "org3"),
    ])
}

#[test]
fn test_full_pipeline_validates() {
    let dir = tempdir().unwrap();
    let map = mixed_relationships();
    let run = run_pipeline(&mixed_dump(dir.path()), Some(&map));

    assert_eq!(run.transform.report.counts.transformed, 4);
    assert_eq!(run.transform.report.counts.sub_records, 2);
    assert_eq!(run.transform.report.counts.created_fallback, 1);

    let report = validate_run(&run, &run.transform.records, &run.index.commands, Some(&map));
    assert!(report.passed, "{:?}", report.failures);
    assert_eq!(report.count_delta, 0);
    assert!(report.timestamp_mismatches.is_empty());
    let org = report.coverage.iter().find(|c| c.field == "org_id").unwrap();
    assert_eq!(org.present, 4);
}

#[test]
fn test_canonical_ids_unique_and_index_references_resolve() {
    let dir = tempdir().unwrap();
    let mut records = vec![
        domain("l1", "o1", "a@example.com", "a.example", "1000"),
        domain("l2", "o1", "b@example.com", "b.example", "2000"),
        domain("l3", "o3", "a@example.com", "c.example", "3000"),
    ];
    records[2].objid = None;
    let dump = write_dump(dir.path(), &records);
    let run = run_pipeline(&dump, Some(&mixed_relationships()));

    let primaries: Vec<&str> = run
        .transform
        .records
        .iter()
        .filter(|r| r.key.ends_with(":object"))
        .map(|r| r.objid.as_str())
        .collect();
    let mut unique = primaries.clone();
    unique.sort();
    unique.dedup();
    assert_eq!(unique.len(), primaries.len());
    assert_eq!(run.transform.report.counts.skipped_duplicate_id, 1);
    // Without enrichment the legacy id segment becomes the canonical id.
    assert!(primaries.contains(&"l3"));

    for command in &run.index.commands {
        let referenced = match command.as_zadd() {
            Some((_, member)) => member.to_string(),
            None => match command.key.as_str() {
                "custom_domain:owners" | "custom_domain:objid_lookup" => {
                    command.as_hset().unwrap().0.to_string()
                }
                _ => command.as_hset().unwrap().1,
            },
        };
        assert!(primaries.contains(&referenced.as_str()), "{command:?}");
    }
}

#[test]
fn test_every_primary_is_indexed() {
    let dir = tempdir().unwrap();
    let map = mixed_relationships();
    let run = run_pipeline(&mixed_dump(dir.path()), Some(&map));

    for record in run.transform.records.iter().filter(|r| r.key.ends_with(":object")) {
        let objid = record.objid.as_str();
        let in_ordering = on_key(&run.index.commands, "custom_domain:instances")
            .iter()
            .any(|c| c.as_zadd().map(|(_, m)| m) == Some(objid));
        let in_objid_lookup = on_key(&run.index.commands, "custom_domain:objid_lookup")
            .iter()
            .any(|c| c.as_hset().map(|(f, _)| f == objid).unwrap_or(false));
        assert!(in_ordering && in_objid_lookup, "{objid} not indexed");
    }
    // Sub-records produce nothing.
    assert_eq!(run.index.report.counts.sub_records, 2);
    assert_eq!(run.index.report.counts.primaries, 4);
}

#[test]
fn test_pinned_runs_are_byte_identical() {
    let dir = tempdir().unwrap();
    let dump = mixed_dump(dir.path());
    let map = mixed_relationships();

    let mut outputs = Vec::new();
    for attempt in 0..2 {
        let run = run_pipeline(&dump, Some(&map));
        let out = dir.path().join(format!("run{attempt}"));
        let transformed = out.join("custom_domain_transformed.jsonl");
        let indexes = out.join("custom_domain_indexes.jsonl");
        jsonl::write_all(&transformed, &run.transform.records).unwrap();
        jsonl::write_all(&indexes, &run.index.commands).unwrap();
        outputs.push((fs::read(transformed).unwrap(), fs::read(indexes).unwrap()));
    }
    assert_eq!(outputs[0], outputs[1]);
}

#[test]
fn test_transformed_file_round_trips_through_validation() {
    let dir = tempdir().unwrap();
    let map = mixed_relationships();
    let run = run_pipeline(&mixed_dump(dir.path()), Some(&map));

    let transformed = dir.path().join("t.jsonl");
    let indexes = dir.path().join("i.jsonl");
    jsonl::write_all(&transformed, &run.transform.records).unwrap();
    jsonl::write_all(&indexes, &run.index.commands).unwrap();

    let records: Vec<TransformedRecord> = jsonl::read_all(&transformed).unwrap();
    let commands: Vec<IndexCommand> = jsonl::read_all(&indexes).unwrap();
    assert_eq!(records, run.transform.records);

    let org_index = vec![
        IndexCommand::hset("organization:contact_email_index", "a@example.com", "org1"),
        IndexCommand::hset("organization:contact_email_index", "b@example.com", "org2"),
        IndexCommand::hset("organization:contact_email_index", "c@example.com", "org3"),
        IndexCommand::zadd("organization:instances", 1.0, "org1"),
    ];
    let from_index = RelationshipMap::from_index_commands(&org_index, "organization:contact_email_index");
    assert_eq!(from_index, map);

    let artifacts = Artifacts {
        legacy: &run.extraction,
        transformed: &records,
        indexes: &commands,
        relationships: Some(&from_index),
        org_indexes: Some(&org_index),
    };
    let strict = VerdictPolicy {
        strict_counts: true,
        strict_timestamps: true,
        strict_orgs: true,
    };
    let report = validate(&CUSTOM_DOMAIN, &artifacts, &mut codec(), strict).unwrap();
    assert!(report.passed, "{:?}", report.failures);
    assert!(report.org_validity_checked);
}

// ============================================================================
// Organization phase
// ============================================================================

fn organization(legacy_id: &str, objid: &str, email: &str, created: &str) -> LegacyRecord {
    let mut record = hash_record(
        &format!("organization:{legacy_id}:object"),
        &[
            ("contact_email", email),
            ("display_name", legacy_id),
            ("is_default", "true"),
            ("created", created),
        ],
    );
    record.objid = Some(objid.to_string());
    record
}

#[test]
fn test_organization_indexes_drive_owner_resolution() {
    let dir = tempdir().unwrap();

    // Phase one: organizations.
    let org_dump = dir.path().join("organization_dump.jsonl");
    jsonl::write_all(
        &org_dump,
        &[
            organization("g1", "org1", "a@example.com", "100"),
            organization("g2", "org2", "b@example.com", "200"),
            organization("g3", "org3", "c@example.com", "300"),
        ],
    )
    .unwrap();
    let org_extraction = extract_file(&org_dump, &ORGANIZATION).unwrap();
    let mut org_codec = codec();
    let orgs = Transformer::new(&ORGANIZATION, &mut org_codec, TransformOptions::at(MIGRATED_AT))
        .transform_all(&org_extraction);
    assert_eq!(orgs.report.counts.transformed, 3);
    let org_index = build_indexes(&orgs.records, &ORGANIZATION, &mut org_codec);
    let org_index_path = dir.path().join("organization_indexes.jsonl");
    jsonl::write_all(&org_index_path, &org_index.commands).unwrap();
    assert_eq!(on_key(&org_index.commands, "organization:instances").len(), 3);

    // Phase two: custom domains resolve owners through that file.
    let owner = CUSTOM_DOMAIN.owner.unwrap();
    let map = RelationshipMap::from_index_file(&org_index_path, owner.relationship_index).unwrap();
    assert_eq!(map, mixed_relationships());

    let run = run_pipeline(&mixed_dump(dir.path()), Some(&map));
    assert_eq!(run.transform.report.counts.unresolved_owner, 0);
    let owners = on_key(&run.index.commands, "custom_domain:owners");
    assert_eq!(owners.len(), 4);
    assert!(owners
        .iter()
        .any(|c| c.as_hset() == Some(("o2", "org2".to_string()))));

    let org_commands: Vec<IndexCommand> = jsonl::read_all(&org_index_path).unwrap();
    let artifacts = Artifacts {
        legacy: &run.extraction,
        transformed: &run.transform.records,
        indexes: &run.index.commands,
        relationships: Some(&map),
        org_indexes: Some(&org_commands),
    };
    let strict = VerdictPolicy {
        strict_counts: true,
        strict_timestamps: true,
        strict_orgs: true,
    };
    let report = validate(&CUSTOM_DOMAIN, &artifacts, &mut codec(), strict).unwrap();
    assert!(report.passed, "{:?}", report.failures);
    assert!(report.invalid_org_ids.is_empty());
}
