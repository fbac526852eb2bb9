//! Shared data model for the rekey migration toolchain
//!
//! Every stage of the pipeline (transform, index, validate) reads and writes
//! the line-delimited formats defined here:
//! - [`LegacyRecord`]: one V1 key snapshot from the upstream dump
//! - [`TransformedRecord`]: the re-keyed V2 snapshot
//! - [`IndexCommand`]: a declarative ZADD/HSET mutation for cutover
//!
//! Entity-specific knowledge (key shapes, field types, index key names) lives
//! in [`profile::EntityProfile`] so the stages themselves stay generic.

pub mod command;
pub mod diagnostics;
pub mod error;
pub mod jsonl;
pub mod manifest;
pub mod profile;
pub mod record;
pub mod value;
pub mod view;

pub use command::{CommandKind, IndexCommand};
pub use diagnostics::{Diagnostic, Diagnostics};
pub use error::ModelError;
pub use profile::{EntityProfile, FieldKind, FieldTable, KeyShape, OwnerDef, SubRecordDef};
pub use record::{LegacyRecord, TransformedRecord};
pub use value::V2Value;
pub use view::EntityView;

use std::collections::BTreeMap;

/// Decoded hash payload: field name → raw string value.
///
/// A `BTreeMap` keeps iteration (and therefore re-encoding) deterministic.
pub type FieldMap = BTreeMap<String, String>;
