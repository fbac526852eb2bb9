//! Legacy owner reference → organization id.
//!
//! The table is built before a run (from a flat JSON file or from a prior
//! organization migration's index commands) and is read-only afterwards.
//! A miss is never fatal: it becomes an `UnresolvedOwner` follow-up entry.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use rekey_model::{jsonl, Diagnostic, IndexCommand, ModelError};

#[derive(Debug, thiserror::Error)]
pub enum RelationshipError {
    #[error("cannot read relationship table {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("relationship table {path} is not a flat JSON object of strings: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("cannot load organization index file: {0}")]
    IndexFile(#[from] ModelError),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelationshipMap {
    entries: BTreeMap<String, String>,
}

/// Context recorded for an owner reference that could not be resolved.
#[derive(Debug, Clone, Copy)]
pub struct OwnerContext<'a> {
    pub objid: &'a str,
    pub extid: Option<&'a str>,
    pub display_key: Option<&'a str>,
    pub created: Option<f64>,
    pub legacy_key: &'a str,
}

impl RelationshipMap {
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            entries: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Load `{"owner_ref": "org_id", ...}`.
    pub fn from_json_file(path: &Path) -> Result<Self, RelationshipError> {
        let text = fs::read_to_string(path).map_err(|source| RelationshipError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let entries: BTreeMap<String, String> =
            serde_json::from_str(&text).map_err(|source| RelationshipError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(Self { entries })
    }

    /// Collect `HSET <hash_key> <owner_ref> <json org id>` entries from a
    /// sibling entity's index-commands file.
    pub fn from_index_file(path: &Path, hash_key: &str) -> Result<Self, RelationshipError> {
        let commands: Vec<IndexCommand> = jsonl::read_all(path)?;
        Ok(Self::from_index_commands(&commands, hash_key))
    }

    pub fn from_index_commands(commands: &[IndexCommand], hash_key: &str) -> Self {
        let entries = commands
            .iter()
            .filter(|c| c.key == hash_key)
            .filter_map(IndexCommand::as_hset)
            .map(|(field, value)| (field.to_string(), value))
            .collect();
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, owner_ref: &str) -> Option<&str> {
        self.entries.get(owner_ref).map(String::as_str)
    }

    /// Every org id the table can produce.
    pub fn org_ids(&self) -> BTreeSet<String> {
        self.entries.values().cloned().collect()
    }

    /// Resolve an owner reference, or describe the miss for follow-up.
    pub fn resolve(
        &self,
        owner_ref: Option<&str>,
        ctx: OwnerContext<'_>,
    ) -> Result<String, Diagnostic> {
        match owner_ref.filter(|r| !r.is_empty()).and_then(|r| self.get(r)) {
            Some(org_id) if !org_id.is_empty() => Ok(org_id.to_string()),
            _ => Err(Diagnostic::UnresolvedOwner {
                objid: ctx.objid.to_string(),
                extid: ctx.extid.map(str::to_string),
                display_key: ctx.display_key.map(str::to_string),
                created: ctx.created,
                owner_ref: owner_ref.map(str::to_string),
                legacy_key: ctx.legacy_key.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn ctx() -> OwnerContext<'static> {
        OwnerContext {
            objid: "o1",
            extid: Some("cd_1"),
            display_key: Some("x.example"),
            created: Some(1000.0),
            legacy_key: "customdomain:abc:object",
        }
    }

    #[test]
    fn test_hit_and_miss() {
        let map = RelationshipMap::from_pairs([("a@example.com", "org1")]);
        assert_eq!(map.resolve(Some("a@example.com"), ctx()).unwrap(), "org1");

        let miss = map.resolve(Some("b@example.com"), ctx()).unwrap_err();
        match miss {
            Diagnostic::UnresolvedOwner {
                objid,
                owner_ref,
                display_key,
                created,
                ..
            } => {
                assert_eq!(objid, "o1");
                assert_eq!(owner_ref.as_deref(), Some("b@example.com"));
                assert_eq!(display_key.as_deref(), Some("x.example"));
                assert_eq!(created, Some(1000.0));
            }
            other => panic!("unexpected {other:?}"),
        }

        assert!(map.resolve(None, ctx()).is_err());
    }

    #[test]
    fn test_json_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("rel.json");
        fs::write(&path, r#"{"a@example.com": "org1", "b@example.com": "org2"}"#).unwrap();
        let map = RelationshipMap::from_json_file(&path).unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(
            map.org_ids().into_iter().collect::<Vec<_>>(),
            vec!["org1".to_string(), "org2".to_string()]
        );

        fs::write(&path, r#"{"a@example.com": 5}"#).unwrap();
        assert!(matches!(
            RelationshipMap::from_json_file(&path),
            Err(RelationshipError::Parse { .. })
        ));
        assert!(matches!(
            RelationshipMap::from_json_file(&dir.path().join("missing.json")),
            Err(RelationshipError::Read { .. })
        ));
    }

    #[test]
    fn test_from_index_commands() {
        let commands = vec![
            IndexCommand::hset("organization:contact_email_index", "a@example.com", "org1"),
            IndexCommand::hset("organization:other", "b@example.com", "org9"),
            IndexCommand::zadd("organization:instances", 1.0, "org1"),
        ];
        let map = RelationshipMap::from_index_commands(&commands, "organization:contact_email_index");
        assert_eq!(map.len(), 1);
        assert_eq!(map.get("a@example.com"), Some("org1"));
    }
}
