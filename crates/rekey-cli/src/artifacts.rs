//! Output-directory layout and per-stage manifests.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use rekey_model::jsonl;
use rekey_model::manifest::RunManifest;
use rekey_model::{Diagnostics, EntityProfile};

pub struct OutputDir {
    dir: PathBuf,
    entity: &'static str,
}

impl OutputDir {
    pub fn create(dir: &Path, profile: &EntityProfile) -> Result<Self> {
        fs::create_dir_all(dir)
            .with_context(|| format!("cannot create output directory {}", dir.display()))?;
        Ok(Self::at(dir, profile))
    }

    /// Layout only; nothing is created.
    pub fn at(dir: &Path, profile: &EntityProfile) -> Self {
        Self {
            dir: dir.to_path_buf(),
            entity: profile.name,
        }
    }

    pub fn transformed(&self) -> PathBuf {
        self.dir.join(format!("{}_transformed.jsonl", self.entity))
    }

    pub fn indexes(&self) -> PathBuf {
        self.dir.join(format!("{}_indexes.jsonl", self.entity))
    }

    pub fn manifest(&self, stage: &str) -> PathBuf {
        self.dir.join(format!("{}_{stage}_manifest.json", self.entity))
    }

    /// Write follow-up files and the stage manifest covering `primary`
    /// plus every follow-up. Returns the follow-up paths.
    pub fn finish_stage<'a>(
        &self,
        stage: &str,
        counts: impl IntoIterator<Item = (&'a str, u64)>,
        primary: &[PathBuf],
        diagnostics: &Diagnostics,
    ) -> Result<Vec<PathBuf>> {
        let followups = jsonl::write_followups(&self.dir, self.entity, diagnostics)
            .context("cannot write follow-up files")?;

        let mut manifest = RunManifest::new(self.entity, stage);
        for (name, value) in counts {
            manifest.count(name, value);
        }
        manifest.count("diagnostics", diagnostics.len() as u64);
        for path in primary.iter().chain(&followups) {
            manifest
                .add_artifact(path)
                .with_context(|| format!("cannot digest {}", path.display()))?;
        }
        let manifest_path = self.manifest(stage);
        jsonl::write_pretty(&manifest_path, &manifest)
            .with_context(|| format!("cannot write {}", manifest_path.display()))?;
        Ok(followups)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rekey_model::profile::CUSTOM_DOMAIN;
    use rekey_model::Diagnostic;
    use tempfile::tempdir;

    #[test]
    fn test_layout() {
        let out = OutputDir::at(Path::new("/tmp/run"), &CUSTOM_DOMAIN);
        assert_eq!(
            out.transformed(),
            PathBuf::from("/tmp/run/custom_domain_transformed.jsonl")
        );
        assert_eq!(
            out.manifest("index"),
            PathBuf::from("/tmp/run/custom_domain_index_manifest.json")
        );
    }

    #[test]
    fn test_finish_stage_writes_followups_and_manifest() {
        let dir = tempdir().unwrap();
        let out = OutputDir::create(&dir.path().join("nested"), &CUSTOM_DOMAIN).unwrap();
        fs::write(out.transformed(), "{}\n").unwrap();

        let mut diagnostics = Diagnostics::new();
        diagnostics.push(Diagnostic::UnresolvedId { key: "k".into() });
        let followups = out
            .finish_stage("transform", [("transformed", 1)], &[out.transformed()], &diagnostics)
            .unwrap();
        assert_eq!(followups.len(), 1);
        assert!(followups[0].ends_with("custom_domain_unresolved_id.json"));

        let manifest: RunManifest =
            serde_json::from_str(&fs::read_to_string(out.manifest("transform")).unwrap()).unwrap();
        assert_eq!(manifest.counts["transformed"], 1);
        assert_eq!(manifest.counts["diagnostics"], 1);
        assert_eq!(manifest.artifacts.len(), 2);
    }
}
