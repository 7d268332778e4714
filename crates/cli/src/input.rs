//! Local input files: JSON-lines record files and upload manifests.

use std::io::{BufRead, Lines};
use std::iter::Enumerate;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde_json::Value;

use cheapo_core::table_name_from_value;

/// One JSON document per non-blank line, read on demand.
///
/// The first unreadable or malformed line ends the sequence; its error is
/// kept until [`JsonLines::finish`].
pub struct JsonLines<R> {
    lines: Enumerate<Lines<R>>,
    error: Option<anyhow::Error>,
}

impl<R: BufRead> JsonLines<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines().enumerate(),
            error: None,
        }
    }

    pub fn finish(self) -> Result<()> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn parse_line(n: usize, line: std::io::Result<String>) -> Result<Option<Value>> {
        let line = line.with_context(|| format!("line {}", n + 1))?;
        if line.trim().is_empty() {
            return Ok(None);
        }
        serde_json::from_str(&line)
            .map(Some)
            .with_context(|| format!("line {}", n + 1))
    }
}

impl<R: BufRead> Iterator for JsonLines<R> {
    type Item = Value;

    fn next(&mut self) -> Option<Value> {
        if self.error.is_some() {
            return None;
        }
        for (n, line) in self.lines.by_ref() {
            match Self::parse_line(n, line) {
                Ok(Some(value)) => return Some(value),
                Ok(None) => continue,
                Err(err) => {
                    self.error = Some(err);
                    return None;
                }
            }
        }
        None
    }
}

/// One file to upload, as listed in a manifest.
#[derive(Debug, PartialEq)]
pub struct ManifestEntry {
    pub table: String,
    pub file: PathBuf,
    pub tags: Vec<(String, String)>,
}

/// Parse an upload manifest: a JSON array of
/// `{"table": "...", "file": "...", "tags": {"k": "v"}}` objects.
///
/// Relative file paths resolve against `base`, the manifest's directory.
pub fn parse_manifest(doc: &Value, base: &Path) -> Result<Vec<ManifestEntry>> {
    let Some(entries) = doc.as_array() else {
        bail!("manifest must be a JSON array");
    };

    entries
        .iter()
        .enumerate()
        .map(|(i, entry)| {
            let table = table_name_from_value(&entry["table"])
                .with_context(|| format!("manifest entry {i}"))?;
            let Some(file) = entry["file"].as_str() else {
                bail!("manifest entry {i}: file must be a string");
            };
            let tags = match &entry["tags"] {
                Value::Null => Vec::new(),
                Value::Object(map) => map
                    .iter()
                    .map(|(k, v)| {
                        let v = match v {
                            Value::String(s) => s.clone(),
                            other => other.to_string(),
                        };
                        (k.clone(), v)
                    })
                    .collect(),
                _ => bail!("manifest entry {i}: tags must be an object"),
            };
            Ok(ManifestEntry {
                table,
                file: base.join(file),
                tags,
            })
        })
        .collect()
}
