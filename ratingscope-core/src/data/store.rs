//! Crash-safe CSV store for the rating dataset.
//!
//! Layout, next to each other in one directory:
//! - `{name}.csv`: canonical dataset, header `Rating`, one integer per row
//! - `{name}.csv.<random>.tmp`: in-flight write, one per writer, renamed over
//!   the canonical file
//! - `{name}.csv.meta.json`: metadata sidecar (count, range, hash, timestamp)
//!
//! The canonical file is only ever replaced by a single `rename`, so a reader
//! sees the previous dataset or the new one and never a truncated mixture.
//! Concurrent writers each get their own temp file; the last rename wins. A
//! writer that dies mid-write leaves only its `.tmp` file behind.

use super::bootstrap::bootstrap_samples;
use crate::sample::SampleSet;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;

/// Column header of the dataset file.
pub const RATING_HEADER: &str = "Rating";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("unexpected header in {}: expected 'Rating', found '{found}'", path.display())]
    BadHeader { path: PathBuf, found: String },

    #[error("invalid rating '{value}' on line {line}")]
    BadValue { line: u64, value: String },

    #[error("refusing to persist an empty sample set")]
    Empty,

    #[error("metadata error: {0}")]
    Meta(String),
}

impl StoreError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Metadata sidecar written after each successful replace.
///
/// The sidecar is refreshed after the dataset rename, so a crash between the
/// two leaves it describing the previous dataset. Check it with `describes`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetMeta {
    pub sample_count: usize,
    pub min: u32,
    pub max: u32,
    pub data_hash: String,
    pub written_at: DateTime<Utc>,
}

impl DatasetMeta {
    /// Whether this sidecar was written for exactly `samples`.
    pub fn describes(&self, samples: &[u32]) -> bool {
        self.sample_count == samples.len() && self.data_hash == data_hash(samples)
    }
}

/// The on-disk rating dataset.
#[derive(Debug, Clone)]
pub struct RatingStore {
    path: PathBuf,
}

impl RatingStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Canonical dataset path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory holding the dataset, its temp files and its sidecar.
    pub fn dir(&self) -> &Path {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        }
    }

    /// In-flight or abandoned temp files next to the dataset.
    pub fn temp_paths(&self) -> Vec<PathBuf> {
        let prefix = temp_prefix(&self.path);
        let meta_prefix = temp_prefix(&self.meta_path());
        let Ok(entries) = fs::read_dir(self.dir()) else {
            return Vec::new();
        };
        let mut paths: Vec<PathBuf> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| {
                let name = p.file_name().and_then(|n| n.to_str()).unwrap_or("");
                name.starts_with(&prefix) && !name.starts_with(&meta_prefix) && name.ends_with(".tmp")
            })
            .collect();
        paths.sort();
        paths
    }

    /// Path to the metadata sidecar.
    pub fn meta_path(&self) -> PathBuf {
        sibling(&self.path, "meta.json")
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Replace the dataset with `samples`.
    ///
    /// Writes to a fresh temp file in the same directory, fsyncs, then renames
    /// onto `path()`. On any failure the temp file is removed and the
    /// canonical file is untouched.
    pub fn write(&self, samples: &[u32]) -> Result<(), StoreError> {
        if samples.is_empty() {
            return Err(StoreError::Empty);
        }

        let dir = self.dir();
        fs::create_dir_all(dir).map_err(|e| StoreError::io(dir, e))?;

        let mut tmp = new_temp_file(&self.path)?;
        write_csv(&mut tmp, samples)?;

        // Atomic rename; a failed persist drops and deletes the temp file.
        tmp.persist(&self.path)
            .map_err(|e| StoreError::io(&self.path, e.error))?;
        sync_dir(dir);

        if let Err(e) = self.write_meta(samples) {
            tracing::warn!(path = %self.meta_path().display(), error = %e, "metadata sidecar not updated");
        }

        tracing::info!(path = %self.path.display(), samples = samples.len(), "dataset replaced");
        Ok(())
    }

    /// Load the dataset.
    ///
    /// A missing file, or one holding only the header, yields the bootstrap
    /// sample set. A malformed file is an error.
    pub fn read(&self) -> Result<SampleSet, StoreError> {
        if !self.path.exists() {
            tracing::info!(path = %self.path.display(), "no dataset yet, serving bootstrap samples");
            return Ok(bootstrap_samples());
        }

        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_path(&self.path)?;

        let headers = rdr.headers()?.clone();
        if headers.len() != 1 || headers.get(0) != Some(RATING_HEADER) {
            // A zero-length file has no header row at all.
            if headers.is_empty() {
                tracing::warn!(path = %self.path.display(), "dataset file is empty, serving bootstrap samples");
                return Ok(bootstrap_samples());
            }
            return Err(StoreError::BadHeader {
                path: self.path.clone(),
                found: headers.iter().collect::<Vec<_>>().join(","),
            });
        }

        let mut values = Vec::new();
        for record in rdr.records() {
            let record = record?;
            let line = record.position().map(|p| p.line()).unwrap_or(0);
            let field = record.get(0).unwrap_or("");
            let value = field.parse::<u32>().map_err(|_| StoreError::BadValue {
                line,
                value: field.to_string(),
            })?;
            values.push(value);
        }

        if values.is_empty() {
            tracing::warn!(path = %self.path.display(), "dataset has no rows, serving bootstrap samples");
            return Ok(bootstrap_samples());
        }

        Ok(SampleSet::collected(values))
    }

    /// Metadata of the current dataset, if a sidecar exists and parses.
    pub fn meta(&self) -> Option<DatasetMeta> {
        let content = fs::read_to_string(self.meta_path()).ok()?;
        serde_json::from_str(&content).ok()
    }

    fn write_meta(&self, samples: &[u32]) -> Result<(), StoreError> {
        let meta = DatasetMeta {
            sample_count: samples.len(),
            min: samples.iter().copied().min().unwrap_or(0),
            max: samples.iter().copied().max().unwrap_or(0),
            data_hash: data_hash(samples),
            written_at: Utc::now(),
        };
        let json = serde_json::to_string_pretty(&meta)
            .map_err(|e| StoreError::Meta(format!("serialization: {e}")))?;

        let meta_path = self.meta_path();
        let mut tmp = new_temp_file(&meta_path)?;
        tmp.write_all(json.as_bytes())
            .map_err(|e| StoreError::io(tmp.path(), e))?;
        tmp.persist(&meta_path)
            .map_err(|e| StoreError::io(&meta_path, e.error))?;
        Ok(())
    }
}

/// BLAKE3 over the little-endian bytes of every value, in order.
pub fn data_hash(samples: &[u32]) -> String {
    let mut hasher = blake3::Hasher::new();
    for v in samples {
        hasher.update(&v.to_le_bytes());
    }
    hasher.finalize().to_hex().to_string()
}

/// `{path}.{suffix}` in the same directory.
fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".");
    name.push(suffix);
    path.with_file_name(name)
}

/// File-name prefix shared by every temp file for `target`.
fn temp_prefix(target: &Path) -> String {
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    format!("{name}.")
}

/// Uniquely named `{name}.<random>.tmp` next to `target`.
fn new_temp_file(target: &Path) -> Result<NamedTempFile, StoreError> {
    let dir = match target.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    tempfile::Builder::new()
        .prefix(&temp_prefix(target))
        .suffix(".tmp")
        .tempfile_in(dir)
        .map_err(|e| StoreError::io(dir, e))
}

fn write_csv(tmp: &mut NamedTempFile, samples: &[u32]) -> Result<(), StoreError> {
    let path = tmp.path().to_path_buf();
    let mut wtr = csv::Writer::from_writer(tmp.as_file_mut());
    wtr.write_record([RATING_HEADER])?;
    for v in samples {
        wtr.write_record([v.to_string()])?;
    }
    let file = wtr
        .into_inner()
        .map_err(|e| StoreError::io(&path, e.into_error()))?;
    file.flush().map_err(|e| StoreError::io(&path, e))?;
    file.sync_all().map_err(|e| StoreError::io(&path, e))
}

/// Persist the rename itself. Best-effort: not every platform can open a
/// directory for syncing.
#[cfg(unix)]
fn sync_dir(dir: &Path) {
    if let Ok(handle) = fs::File::open(dir) {
        let _ = handle.sync_all();
    }
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) {}
