//! Parallel snapshot writer

use super::codec::BinaryWriter;
use super::manifest::{index_file_name, partition_file_name, partition_ranges, Manifest};
use super::record::write_record;
use super::{build_pool, PersistenceError, PersistenceResult};
use crate::config::PersistenceConfig;
use crate::graph::GraphElement;
use crate::index::Index;
use rayon::prelude::*;
use std::collections::HashMap;
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Outcome of a successful save
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveReport {
    /// Path the manifest was actually written to
    pub manifest_path: PathBuf,
    /// Partition file names in completion order
    pub partition_files: Vec<String>,
    /// Index file names in completion order
    pub index_files: Vec<String>,
    pub elapsed: Duration,
}

/// Writes a graph snapshot as a manifest plus partition and index files
#[derive(Debug, Clone, Default)]
pub struct SnapshotWriter {
    config: PersistenceConfig,
}

impl SnapshotWriter {
    pub fn new(config: PersistenceConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PersistenceConfig {
        &self.config
    }

    /// Save `elements` (one entry per slot, `None` for holes) and every
    /// index to `path`.
    ///
    /// The caller must keep the table structurally unchanged for the
    /// duration of the save. If `path` already exists a time suffix is
    /// appended; the path actually used is in the returned report.
    pub fn save(
        &self,
        next_id: i32,
        elements: &[Option<GraphElement>],
        indices: &HashMap<String, Box<dyn Index>>,
        path: impl AsRef<Path>,
    ) -> PersistenceResult<SaveReport> {
        let started = Instant::now();
        let path = available_path(path.as_ref());
        for name in indices.keys() {
            validate_index_name(name)?;
        }

        let base = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| PersistenceError::Manifest(format!("invalid snapshot path {:?}", path)))?
            .to_string();
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let tmp_path = with_suffix(&path, ".tmp");

        info!(
            "Saving snapshot to {:?}: {} slots, {} indices",
            path,
            elements.len(),
            indices.len()
        );

        let written = Mutex::new(Vec::new());
        let result = self.write_all(next_id, elements, indices, &dir, &base, &tmp_path, &written);
        let (partition_files, index_files) = match result {
            Ok(names) => names,
            Err(e) => {
                let _ = fs::remove_file(&tmp_path);
                for name in written.into_inner().unwrap_or_else(PoisonError::into_inner) {
                    let _ = fs::remove_file(dir.join(name));
                }
                return Err(e);
            }
        };

        fs::rename(&tmp_path, &path)?;

        let report = SaveReport {
            manifest_path: path,
            partition_files,
            index_files,
            elapsed: started.elapsed(),
        };
        info!(
            "Snapshot saved to {:?}: {} partitions, {} index files in {:?}",
            report.manifest_path,
            report.partition_files.len(),
            report.index_files.len(),
            report.elapsed
        );
        Ok(report)
    }

    /// Everything up to and including the synced temporary manifest
    #[allow(clippy::too_many_arguments)]
    fn write_all(
        &self,
        next_id: i32,
        elements: &[Option<GraphElement>],
        indices: &HashMap<String, Box<dyn Index>>,
        dir: &Path,
        base: &str,
        tmp_path: &Path,
        written: &Mutex<Vec<String>>,
    ) -> PersistenceResult<(Vec<String>, Vec<String>)> {
        let mut manifest = BinaryWriter::new(BufWriter::new(File::create(tmp_path)?));
        Manifest::write_header(&mut manifest, next_id, elements.len())?;

        let ranges = partition_ranges(elements.len(), self.config.partition_size);
        let partition_names = Mutex::new(Vec::with_capacity(ranges.len()));
        let index_names = Mutex::new(Vec::with_capacity(indices.len()));

        let pool = build_pool(self.config.worker_threads)?;
        let (partitions, saved_indices) = pool.install(|| {
            rayon::join(
                || {
                    ranges.par_iter().try_for_each(|range| {
                        // registered before the file exists so a failed write is cleaned up
                        let name = partition_file_name(base, range);
                        completed(written, &name);
                        self.write_partition(dir, &name, elements, range)?;
                        completed(&partition_names, &name);
                        Ok::<_, PersistenceError>(())
                    })
                },
                || {
                    indices.par_iter().try_for_each(|(name, index)| {
                        let file = index_file_name(base, name);
                        completed(written, &file);
                        self.write_index(dir, &file, name, index.as_ref())?;
                        completed(&index_names, &file);
                        Ok::<_, PersistenceError>(())
                    })
                },
            )
        });
        partitions?;
        saved_indices?;

        let partition_names = partition_names.into_inner().unwrap_or_else(PoisonError::into_inner);
        let index_names = index_names.into_inner().unwrap_or_else(PoisonError::into_inner);

        Manifest::write_names(&mut manifest, &partition_names)?;
        Manifest::write_names(&mut manifest, &index_names)?;
        manifest.flush()?;
        if self.config.sync_files {
            manifest.get_mut().get_ref().sync_all()?;
        }
        Ok((partition_names, index_names))
    }

    fn write_partition(
        &self,
        dir: &Path,
        name: &str,
        elements: &[Option<GraphElement>],
        range: &Range<usize>,
    ) -> PersistenceResult<()> {
        let mut writer = BinaryWriter::new(BufWriter::new(File::create(dir.join(name))?));
        for slot in &elements[range.clone()] {
            write_record(&mut writer, slot.as_ref())?;
        }
        writer.flush()?;
        if self.config.sync_files {
            writer.get_mut().get_ref().sync_all()?;
        }
        debug!("Wrote partition {} ({} slots)", name, range.len());
        Ok(())
    }

    fn write_index(&self, dir: &Path, file_name: &str, name: &str, index: &dyn Index) -> PersistenceResult<()> {
        let mut writer = BufWriter::new(File::create(dir.join(file_name))?);
        index
            .save(&mut writer)
            .map_err(|source| PersistenceError::Index {
                name: name.to_string(),
                source,
            })?;
        writer.flush()?;
        if self.config.sync_files {
            writer.get_ref().sync_all()?;
        }
        debug!("Wrote {} index {} to {}", index.kind(), name, file_name);
        Ok(())
    }
}

fn completed(names: &Mutex<Vec<String>>, name: &str) {
    names
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .push(name.to_string());
}

/// `path`, or `path_<yyyymmddHHMMSSmmm>` when `path` is taken
fn available_path(path: &Path) -> PathBuf {
    if !path.exists() {
        return path.to_path_buf();
    }
    let stamp = chrono::Local::now().format("%Y%m%d%H%M%S%3f").to_string();
    let suffixed = with_suffix(path, &format!("_{}", stamp));
    warn!("Snapshot path {:?} already exists, saving to {:?}", path, suffixed);
    suffixed
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

/// Index names become part of a file name
fn validate_index_name(name: &str) -> PersistenceResult<()> {
    let valid = !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\', '\0']);
    if valid {
        Ok(())
    } else {
        Err(PersistenceError::InvalidIndexName(name.to_string()))
    }
}
