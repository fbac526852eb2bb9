//! Legacy → V2 transform stage
//!
//! ```text
//! dump.jsonl ──► extract ──► groups ──► Transformer ──► transformed.jsonl
//!                                         │    │
//!                          identifiers ◄──┘    └──► relationships
//!                          transcode                (owner → org id)
//! ```
//!
//! The stage is single-threaded and deterministic for a pinned
//! `migrated_at`: groups are visited in legacy-id order and every field map
//! is ordered.

pub mod extract;
pub mod identifiers;
pub mod orchestrator;
pub mod relationships;
pub mod report;
pub mod transcode;

pub use extract::{extract, extract_file, EntityGroup, ExtractStats, Extraction};
pub use identifiers::{IdSource, ResolvedIds};
pub use orchestrator::{
    plan, MissingCreatedPolicy, TransformOptions, TransformOutput, TransformPlan, Transformer,
};
pub use relationships::{OwnerContext, RelationshipError, RelationshipMap};
pub use report::{TransformCounts, TransformReport};
pub use transcode::{Policy, TranscodeError, V2FieldMap};
