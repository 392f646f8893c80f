//! Snapshot manifest and file naming
//!
//! ```text
//! next_id  element_count
//! partition_count  partition_name*
//! index_count      index_name*
//! ```
//!
//! Names are stored relative to the manifest's directory:
//! `<base>_graphElements_<start>_to_<end>` (end exclusive) for partitions and
//! `<base>_index_<name>` for indices, where `<base>` is the manifest's own
//! file name.

use super::codec::{prealloc, BinaryReader, BinaryWriter};
use super::{PersistenceError, PersistenceResult};
use std::io::{Read, Write};
use std::ops::Range;

const PARTITION_INFIX: &str = "_graphElements_";
const INDEX_INFIX: &str = "_index_";

/// Decoded manifest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    pub next_id: i32,
    pub element_count: usize,
    pub partition_files: Vec<String>,
    pub index_files: Vec<String>,
}

impl Manifest {
    pub fn write_header<W: Write>(
        writer: &mut BinaryWriter<W>,
        next_id: i32,
        element_count: usize,
    ) -> PersistenceResult<()> {
        writer.write_i32(next_id)?;
        writer.write_len(element_count)
    }

    pub fn write_names<W: Write>(writer: &mut BinaryWriter<W>, names: &[String]) -> PersistenceResult<()> {
        writer.write_len(names.len())?;
        for name in names {
            writer.write_str(name)?;
        }
        Ok(())
    }

    pub fn write_to<W: Write>(&self, writer: &mut BinaryWriter<W>) -> PersistenceResult<()> {
        Self::write_header(writer, self.next_id, self.element_count)?;
        Self::write_names(writer, &self.partition_files)?;
        Self::write_names(writer, &self.index_files)
    }

    pub fn read_from<R: Read>(reader: &mut BinaryReader<R>) -> PersistenceResult<Self> {
        let next_id = reader.read_i32()?;
        let element_count = reader.read_len()?;
        let partition_files = read_names(reader)?;
        let index_files = read_names(reader)?;
        Ok(Manifest {
            next_id,
            element_count,
            partition_files,
            index_files,
        })
    }

    /// Partition ranges sorted by start, checked to tile `[0, element_count)`
    pub fn partition_layout(&self, base: &str) -> PersistenceResult<Vec<(Range<usize>, &str)>> {
        let mut layout = Vec::with_capacity(self.partition_files.len());
        for name in &self.partition_files {
            let range = parse_partition_range(base, name).ok_or_else(|| {
                PersistenceError::Manifest(format!("unrecognised partition file name {}", name))
            })?;
            layout.push((range, name.as_str()));
        }
        layout.sort_by_key(|(range, _)| range.start);

        let mut expected = 0;
        for (range, name) in &layout {
            if range.start != expected {
                return Err(PersistenceError::Manifest(format!(
                    "partition {} starts at {}, expected {}",
                    name, range.start, expected
                )));
            }
            expected = range.end;
        }
        if expected != self.element_count {
            return Err(PersistenceError::Manifest(format!(
                "partitions cover {} slots, manifest declares {}",
                expected, self.element_count
            )));
        }
        Ok(layout)
    }

    /// `(index name, file name)` pairs
    pub fn index_layout(&self, base: &str) -> PersistenceResult<Vec<(&str, &str)>> {
        self.index_files
            .iter()
            .map(|file| {
                index_name(base, file)
                    .map(|name| (name, file.as_str()))
                    .ok_or_else(|| {
                        PersistenceError::Manifest(format!("unrecognised index file name {}", file))
                    })
            })
            .collect()
    }
}

fn read_names<R: Read>(reader: &mut BinaryReader<R>) -> PersistenceResult<Vec<String>> {
    let count = reader.read_len()?;
    let mut names = Vec::with_capacity(prealloc(count));
    for _ in 0..count {
        names.push(reader.read_string()?);
    }
    Ok(names)
}

pub fn partition_file_name(base: &str, range: &Range<usize>) -> String {
    format!("{}{}{}_to_{}", base, PARTITION_INFIX, range.start, range.end)
}

pub fn index_file_name(base: &str, index: &str) -> String {
    format!("{}{}{}", base, INDEX_INFIX, index)
}

/// Inverse of [`partition_file_name`]; empty or reversed ranges are rejected
pub fn parse_partition_range(base: &str, file: &str) -> Option<Range<usize>> {
    let rest = file.strip_prefix(base)?.strip_prefix(PARTITION_INFIX)?;
    let (start, end) = rest.split_once("_to_")?;
    let start: usize = start.parse().ok()?;
    let end: usize = end.parse().ok()?;
    (start < end).then_some(start..end)
}

/// Inverse of [`index_file_name`]
pub fn index_name<'a>(base: &str, file: &'a str) -> Option<&'a str> {
    let name = file.strip_prefix(base)?.strip_prefix(INDEX_INFIX)?;
    (!name.is_empty()).then_some(name)
}

/// Contiguous `[start, end)` ranges of at most `size` slots covering `[0, count)`
pub fn partition_ranges(count: usize, size: usize) -> Vec<Range<usize>> {
    let size = size.max(1);
    (0..count)
        .step_by(size)
        .map(|start| start..(start + size).min(count))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_manifest_encoding() {
        let manifest = Manifest {
            next_id: 12,
            element_count: 12,
            partition_files: vec!["g_graphElements_0_to_12".to_string()],
            index_files: vec!["g_index_age".to_string()],
        };
        let mut writer = BinaryWriter::new(Vec::new());
        manifest.write_to(&mut writer).unwrap();

        let mut reader = BinaryReader::new(Cursor::new(writer.into_inner()));
        assert_eq!(Manifest::read_from(&mut reader).unwrap(), manifest);
    }

    #[test]
    fn test_partition_ranges() {
        assert_eq!(partition_ranges(10, 4), vec![0..4, 4..8, 8..10]);
        assert_eq!(partition_ranges(4, 4), vec![0..4]);
        assert!(partition_ranges(0, 4).is_empty());
        assert_eq!(partition_ranges(2, 0), vec![0..1, 1..2]);
    }

    #[test]
    fn test_file_names() {
        let name = partition_file_name("snap", &(5..9));
        assert_eq!(name, "snap_graphElements_5_to_9");
        assert_eq!(parse_partition_range("snap", &name), Some(5..9));
        assert_eq!(parse_partition_range("other", &name), None);
        assert_eq!(parse_partition_range("snap", "snap_graphElements_9_to_5"), None);

        let index = index_file_name("snap", "by_name");
        assert_eq!(index_name("snap", &index), Some("by_name"));
        assert_eq!(index_name("snap", "snap_index_"), None);
    }

    #[test]
    fn test_layout_detects_gaps() {
        let manifest = Manifest {
            next_id: 0,
            element_count: 10,
            partition_files: vec![
                "s_graphElements_6_to_10".to_string(),
                "s_graphElements_0_to_4".to_string(),
            ],
            index_files: vec![],
        };
        assert!(matches!(
            manifest.partition_layout("s"),
            Err(PersistenceError::Manifest(_))
        ));

        let complete = Manifest {
            partition_files: vec![
                "s_graphElements_4_to_10".to_string(),
                "s_graphElements_0_to_4".to_string(),
            ],
            ..manifest
        };
        let layout = complete.partition_layout("s").unwrap();
        assert_eq!(layout[0].0, 0..4);
        assert_eq!(layout[1].0, 4..10);
    }
}
