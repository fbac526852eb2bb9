//! Line-delimited JSON input and whole-file output.
//!
//! Inputs are streamed one line at a time. Outputs are always full rewrites:
//! content goes to a sibling temp file which is renamed into place, so a
//! crashed run never leaves a truncated artifact behind.

use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Lines, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::diagnostics::Diagnostics;
use crate::error::ModelError;

/// Streaming reader yielding `(line_number, parsed)` for each non-blank line.
///
/// Parse failures are yielded as [`ModelError::BadLine`] so callers can
/// decide whether a malformed line is fatal.
pub struct JsonlReader<R, T> {
    lines: Lines<R>,
    line_no: usize,
    _marker: PhantomData<T>,
}

impl<T: DeserializeOwned> JsonlReader<BufReader<File>, T> {
    pub fn open(path: &Path) -> Result<Self, ModelError> {
        let file = File::open(path).map_err(|e| ModelError::file(path, e))?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: BufRead, T: DeserializeOwned> JsonlReader<R, T> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line_no: 0,
            _marker: PhantomData,
        }
    }
}

impl<R: BufRead, T: DeserializeOwned> Iterator for JsonlReader<R, T> {
    type Item = Result<(usize, T), ModelError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(e) => return Some(Err(ModelError::Io(e))),
            };
            self.line_no += 1;
            if line.trim().is_empty() {
                continue;
            }
            let parsed = serde_json::from_str::<T>(&line).map_err(|e| ModelError::BadLine {
                line: self.line_no,
                message: e.to_string(),
            });
            return Some(parsed.map(|value| (self.line_no, value)));
        }
    }
}

/// Read every line of a file, failing on the first malformed one.
///
/// Used for artifacts this toolchain produced itself, where a bad line means
/// the file is not what it claims to be.
pub fn read_all<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, ModelError> {
    JsonlReader::<BufReader<File>, T>::open(path)?
        .map(|item| item.map(|(_, value)| value))
        .collect()
}

/// Write `items` as JSON lines, replacing `path` atomically.
pub fn write_all<'a, T, I>(path: &Path, items: I) -> Result<usize, ModelError>
where
    T: Serialize + 'a,
    I: IntoIterator<Item = &'a T>,
{
    let mut count = 0usize;
    replace_file(path, |out| {
        for item in items {
            serde_json::to_writer(&mut *out, item)?;
            out.write_all(b"\n")?;
            count += 1;
        }
        Ok(())
    })?;
    Ok(count)
}

/// Write a pretty-printed JSON document, replacing `path` atomically.
pub fn write_pretty<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), ModelError> {
    replace_file(path, |out| {
        serde_json::to_writer_pretty(&mut *out, value)?;
        out.write_all(b"\n")?;
        Ok(())
    })
}

/// Export each diagnostic category to `<dir>/<entity>_<category>.json`.
///
/// Returns the written paths in category order.
pub fn write_followups(
    dir: &Path,
    entity: &str,
    diagnostics: &Diagnostics,
) -> Result<Vec<PathBuf>, ModelError> {
    let mut written = Vec::new();
    for (category, entries) in diagnostics.by_category() {
        let path = dir.join(format!("{entity}_{category}.json"));
        write_pretty(&path, &entries)?;
        written.push(path);
    }
    Ok(written)
}

fn replace_file<F>(path: &Path, write: F) -> Result<(), ModelError>
where
    F: FnOnce(&mut BufWriter<File>) -> Result<(), ModelError>,
{
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| ModelError::file(parent, e))?;
    }
    let tmp = tmp_path(path);
    let file = File::create(&tmp).map_err(|e| ModelError::file(&tmp, e))?;
    let mut out = BufWriter::new(file);
    let result = write(&mut out).and_then(|()| out.flush().map_err(ModelError::Io));
    if let Err(err) = result {
        let _ = fs::remove_file(&tmp);
        return Err(err);
    }
    drop(out);
    fs::rename(&tmp, path).map_err(|e| ModelError::file(path, e))
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::Diagnostic;
    use crate::record::LegacyRecord;
    use std::io::Cursor;
    use tempfile::tempdir;

    #[test]
    fn test_reader_skips_blank_lines_and_reports_line_numbers() {
        let input = "{\"key\":\"a\",\"dump\":\"\"}\n\n not json\n{\"key\":\"b\",\"dump\":\"\"}\n";
        let items: Vec<_> = JsonlReader::<_, LegacyRecord>::new(Cursor::new(input)).collect();
        assert_eq!(items.len(), 3);
        assert_eq!(items[0].as_ref().unwrap().0, 1);
        match &items[1] {
            Err(ModelError::BadLine { line, .. }) => assert_eq!(*line, 3),
            other => panic!("expected bad line, got {other:?}"),
        }
        assert_eq!(items[2].as_ref().unwrap().1.key, "b");
    }

    #[test]
    fn test_write_then_read() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("out.jsonl");
        let records = vec![
            LegacyRecord::new("a", vec![1, 2]),
            LegacyRecord::new("b", vec![3]),
        ];
        let n = write_all(&path, &records).unwrap();
        assert_eq!(n, 2);
        let back: Vec<LegacyRecord> = read_all(&path).unwrap();
        assert_eq!(back, records);
        assert!(!dir.path().join("nested").join("out.jsonl.tmp").exists());
    }

    #[test]
    fn test_rewrite_replaces_previous_content() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.jsonl");
        write_all(&path, &vec![LegacyRecord::new("a", vec![])]).unwrap();
        write_all(&path, &Vec::<LegacyRecord>::new()).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "");
    }

    #[test]
    fn test_followups_one_file_per_category() {
        let dir = tempdir().unwrap();
        let mut diags = Diagnostics::new();
        diags.push(Diagnostic::UnresolvedId { key: "k".into() });
        diags.push(Diagnostic::MalformedLine {
            line: 1,
            error: "x".into(),
        });
        let written = write_followups(dir.path(), "custom_domain", &diags).unwrap();
        assert_eq!(written.len(), 2);
        assert!(dir
            .path()
            .join("custom_domain_unresolved_id.json")
            .exists());
    }

    #[test]
    fn test_missing_file_names_path() {
        let err = read_all::<LegacyRecord>(Path::new("/definitely/not/here.jsonl")).unwrap_err();
        assert!(err.to_string().contains("/definitely/not/here.jsonl"));
    }
}
