//! Two-phase snapshot reader
//!
//! Phase one parses every partition in parallel into [`PendingElement`]s that
//! still hold raw ids. Phase two runs once all partitions are in: every id is
//! checked against the complete slot table and the live elements are built.
//! Edge records carry no type; an edge takes the type of the group its source
//! vertex lists it under.

use super::codec::{prealloc, BinaryReader};
use super::manifest::Manifest;
use super::record::{read_record, PendingElement, PendingHeader};
use super::{
    build_pool, DanglingReference, PersistenceError, PersistenceResult, ReferenceKind,
    StructuralLoadError,
};
use crate::config::{DanglingPolicy, LatchConfig, PersistenceConfig};
use crate::graph::{Adjacency, Edge, EdgeTypeId, ElementId, ElementTable, GraphElement, Vertex};
use crate::index::{Index, IndexFactory};
use rayon::prelude::*;
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

/// A fully resolved snapshot
#[derive(Debug)]
pub struct Snapshot {
    pub next_id: i32,
    pub elements: ElementTable,
    pub indices: HashMap<String, Box<dyn Index>>,
    /// References dropped under [`DanglingPolicy::Prune`]
    pub pruned: Vec<DanglingReference>,
}

/// Loads snapshots written by [`SnapshotWriter`](super::SnapshotWriter)
#[derive(Debug, Clone, Default)]
pub struct SnapshotReader {
    config: PersistenceConfig,
    latch: LatchConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SlotKind {
    Hole,
    Vertex,
    Edge,
}

impl SnapshotReader {
    /// `latch` configures the latches of every rebuilt element
    pub fn new(config: PersistenceConfig, latch: LatchConfig) -> Self {
        Self { config, latch }
    }

    /// Load the snapshot whose manifest is at `path`.
    ///
    /// Returns `Ok(None)` when there is nothing at `path`.
    pub fn load(&self, path: &Path, factory: &dyn IndexFactory) -> PersistenceResult<Option<Snapshot>> {
        if !path.exists() {
            debug!("No snapshot manifest at {:?}", path);
            return Ok(None);
        }
        let started = Instant::now();

        let manifest = read_manifest(path)?;
        let base = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| PersistenceError::Manifest(format!("invalid snapshot path {:?}", path)))?;
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let partitions = manifest.partition_layout(base)?;
        let index_files = manifest.index_layout(base)?;

        let pool = build_pool(self.config.worker_threads)?;
        let (parsed, indices) = pool.install(|| {
            rayon::join(
                || {
                    partitions
                        .par_iter()
                        .map(|(range, name)| parse_partition(&dir, name, range.clone()))
                        .collect::<PersistenceResult<Vec<_>>>()
                },
                || {
                    index_files
                        .par_iter()
                        .map(|(name, file)| restore_index(&dir, name, file, factory))
                        .collect::<PersistenceResult<HashMap<_, _>>>()
                },
            )
        });

        let mut pending = Vec::with_capacity(prealloc(manifest.element_count));
        for partition in parsed? {
            pending.extend(partition);
        }
        let indices = indices?;

        let (elements, pruned) = self.resolve(pending)?;

        let mut next_id = manifest.next_id;
        let floor = i32::try_from(elements.len()).unwrap_or(i32::MAX);
        if next_id < floor {
            warn!("Snapshot next_id {} is below its slot count {}, raising it", next_id, floor);
            next_id = floor;
        }

        info!(
            "Loaded snapshot {:?}: {} slots, {} indices, {} pruned references in {:?}",
            path,
            elements.len(),
            indices.len(),
            pruned.len(),
            started.elapsed()
        );
        Ok(Some(Snapshot {
            next_id,
            elements,
            indices,
            pruned,
        }))
    }

    /// Bind every raw id against the complete slot table and build the
    /// live elements
    fn resolve(
        &self,
        mut pending: Vec<Option<PendingElement>>,
    ) -> PersistenceResult<(ElementTable, Vec<DanglingReference>)> {
        let kinds: Vec<SlotKind> = pending
            .iter()
            .map(|slot| match slot {
                None => SlotKind::Hole,
                Some(PendingElement::Vertex { .. }) => SlotKind::Vertex,
                Some(PendingElement::Edge { .. }) => SlotKind::Edge,
            })
            .collect();
        let kind_of = |id: ElementId| {
            id.slot()
                .and_then(|slot| kinds.get(slot).copied())
                .unwrap_or(SlotKind::Hole)
        };

        // (source, edge) -> type of the outgoing group listing the edge
        let mut listed = FxHashMap::default();
        for element in pending.iter().flatten() {
            if let PendingElement::Vertex { header, outgoing, .. } = element {
                for (edge_type, edges) in outgoing {
                    for &edge in edges {
                        listed.entry((header.id, edge)).or_insert(*edge_type);
                    }
                }
            }
        }

        let mut dangling = Vec::new();
        let mut broken_edges = FxHashSet::default();
        let mut edge_types = FxHashMap::default();

        for element in pending.iter().flatten() {
            if let PendingElement::Edge {
                header,
                source,
                target,
            } = element
            {
                let mut endpoints_live = true;
                for (to, kind) in [
                    (*source, ReferenceKind::EdgeSource),
                    (*target, ReferenceKind::EdgeTarget),
                ] {
                    if kind_of(to) != SlotKind::Vertex {
                        dangling.push(DanglingReference {
                            from: header.id,
                            to,
                            kind,
                        });
                        endpoints_live = false;
                    }
                }
                let edge_type = if endpoints_live {
                    listed.get(&(*source, header.id)).copied()
                } else {
                    None
                };
                match edge_type {
                    Some(edge_type) => {
                        edge_types.insert(header.id, edge_type);
                    }
                    None => {
                        if endpoints_live {
                            dangling.push(DanglingReference {
                                from: header.id,
                                to: *source,
                                kind: ReferenceKind::SourceAdjacency,
                            });
                        }
                        broken_edges.insert(header.id);
                    }
                }
            }
        }

        let is_live_edge = |id: ElementId| kind_of(id) == SlotKind::Edge && !broken_edges.contains(&id);
        for element in pending.iter_mut().flatten() {
            if let PendingElement::Vertex {
                header,
                outgoing,
                incoming,
            } = element
            {
                retain_edges(header.id, outgoing, ReferenceKind::OutgoingEdge, &is_live_edge, &mut dangling);
                retain_edges(header.id, incoming, ReferenceKind::IncomingEdge, &is_live_edge, &mut dangling);
            }
        }

        if !dangling.is_empty() {
            match self.config.dangling_policy {
                DanglingPolicy::Strict => {
                    return Err(StructuralLoadError { references: dangling }.into());
                }
                DanglingPolicy::Prune => {
                    for reference in &dangling {
                        warn!("Pruned dangling reference {}", reference);
                    }
                }
            }
        }

        let mut slots = Vec::with_capacity(pending.len());
        for element in pending {
            let element = match element {
                Some(PendingElement::Vertex {
                    header,
                    outgoing,
                    incoming,
                }) => Some(self.build_vertex(header, outgoing, incoming)?),
                // broken edges have no resolved type and become holes
                Some(PendingElement::Edge {
                    header,
                    source,
                    target,
                }) => edge_types
                    .get(&header.id)
                    .map(|&edge_type| self.build_edge(header, source, target, edge_type)),
                None => None,
            };
            slots.push(element);
        }
        Ok((ElementTable::from_slots(slots), dangling))
    }

    fn build_vertex(
        &self,
        header: PendingHeader,
        outgoing: Adjacency,
        incoming: Adjacency,
    ) -> PersistenceResult<GraphElement> {
        let PendingHeader {
            id,
            created_at,
            modified_at,
            properties,
        } = header;
        let vertex = Vertex::from_parts(id, created_at, modified_at, properties, self.latch);
        vertex.replace_outgoing_edges(outgoing)?;
        vertex.replace_incoming_edges(incoming)?;
        Ok(vertex.into())
    }

    fn build_edge(
        &self,
        header: PendingHeader,
        source: ElementId,
        target: ElementId,
        edge_type: EdgeTypeId,
    ) -> GraphElement {
        Edge::from_parts(
            header.id,
            header.created_at,
            header.modified_at,
            header.properties,
            source,
            target,
            edge_type,
            self.latch,
        )
        .into()
    }
}

/// Drop group entries that are not live edges, recording each one
fn retain_edges(
    from: ElementId,
    groups: &mut Adjacency,
    kind: fn(EdgeTypeId) -> ReferenceKind,
    is_live_edge: &impl Fn(ElementId) -> bool,
    dangling: &mut Vec<DanglingReference>,
) {
    for (edge_type, edges) in groups.iter_mut() {
        edges.retain(|&to| {
            let live = is_live_edge(to);
            if !live {
                dangling.push(DanglingReference {
                    from,
                    to,
                    kind: kind(*edge_type),
                });
            }
            live
        });
    }
    groups.retain(|_, edges| !edges.is_empty());
}

fn read_manifest(path: &Path) -> PersistenceResult<Manifest> {
    let mut reader = BinaryReader::new(BufReader::new(File::open(path)?));
    let manifest = Manifest::read_from(&mut reader)?;
    if !reader.at_end()? {
        return Err(PersistenceError::Manifest(format!(
            "trailing bytes after manifest {:?}",
            path
        )));
    }
    Ok(manifest)
}

fn parse_partition(dir: &Path, name: &str, range: Range<usize>) -> PersistenceResult<Vec<Option<PendingElement>>> {
    let mut reader = BinaryReader::new(BufReader::new(File::open(dir.join(name))?));
    let mut records = Vec::with_capacity(prealloc(range.len()));
    for slot in range.clone() {
        let record = read_record(&mut reader, slot)?;
        if let Some(element) = &record {
            if element.id().slot() != Some(slot) {
                return Err(PersistenceError::Corrupt {
                    slot,
                    reason: format!("record carries id {}", element.id()),
                });
            }
        }
        records.push(record);
    }
    if !reader.at_end()? {
        return Err(PersistenceError::Corrupt {
            slot: range.end,
            reason: format!("trailing bytes in partition {}", name),
        });
    }
    debug!("Parsed partition {} ({} slots)", name, range.len());
    Ok(records)
}

fn restore_index(
    dir: &Path,
    name: &str,
    file: &str,
    factory: &dyn IndexFactory,
) -> PersistenceResult<(String, Box<dyn Index>)> {
    let mut reader = BufReader::new(File::open(dir.join(file))?);
    let index = factory
        .restore(name, &mut reader)
        .map_err(|source| PersistenceError::Index {
            name: name.to_string(),
            source,
        })?;
    debug!("Restored {} index {} from {}", index.kind(), name, file);
    Ok((name.to_string(), index))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Element, PropertyId, PropertyValue};
    use crate::index::PropertyIndexFactory;
    use crate::persistence::codec::BinaryWriter;
    use crate::persistence::record::TAG_VERTEX;
    use crate::persistence::SnapshotWriter;
    use tempfile::TempDir;

    fn config(policy: DanglingPolicy) -> PersistenceConfig {
        PersistenceConfig {
            partition_size: 2,
            worker_threads: 2,
            dangling_policy: policy,
            ..PersistenceConfig::default()
        }
    }

    fn save(dir: &TempDir, slots: &[Option<GraphElement>]) -> PathBuf {
        let path = dir.path().join("graph");
        SnapshotWriter::new(config(DanglingPolicy::Strict))
            .save(slots.len() as i32, slots, &HashMap::new(), &path)
            .unwrap();
        path
    }

    fn load(path: &Path, policy: DanglingPolicy) -> PersistenceResult<Option<Snapshot>> {
        SnapshotReader::new(config(policy), LatchConfig::default()).load(path, &PropertyIndexFactory)
    }

    #[test]
    fn test_missing_manifest_is_none() {
        let temp_dir = TempDir::new().unwrap();
        assert!(load(&temp_dir.path().join("nothing"), DanglingPolicy::Strict)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_load_resolves_cycles_across_partitions() {
        let temp_dir = TempDir::new().unwrap();
        let t = EdgeTypeId::new(3);
        let a = Vertex::new(ElementId::new(0), 5);
        let b = Vertex::new(ElementId::new(1), 5);
        a.set_property(PropertyId::new(1), 42i64).unwrap();
        // 0 -> 1 via edge 2, 1 -> 0 via edge 4
        a.add_outgoing_edge(t, ElementId::new(2)).unwrap();
        b.add_incoming_edge(t, ElementId::new(2)).unwrap();
        b.add_outgoing_edge(t, ElementId::new(4)).unwrap();
        a.add_incoming_edge(t, ElementId::new(4)).unwrap();
        let e1 = Edge::new(ElementId::new(2), 6, ElementId::new(0), ElementId::new(1), t);
        let e2 = Edge::new(ElementId::new(4), 6, ElementId::new(1), ElementId::new(0), t);
        let path = save(&temp_dir, &[Some(a.into()), Some(b.into()), Some(e1.into()), None, Some(e2.into())]);

        let snapshot = load(&path, DanglingPolicy::Strict).unwrap().unwrap();
        assert_eq!(snapshot.next_id, 5);
        assert!(snapshot.pruned.is_empty());
        let elements = &snapshot.elements;
        assert_eq!(elements.len(), 5);
        assert!(elements.get(ElementId::new(3)).is_none());

        let a = elements.vertex(ElementId::new(0)).unwrap();
        assert_eq!(a.get_property(PropertyId::new(1)).unwrap(), Some(PropertyValue::Integer(42)));
        assert_eq!(a.try_get_outgoing_edges(t).unwrap(), Some(vec![ElementId::new(2)]));
        assert_eq!(a.try_get_incoming_edges(t).unwrap(), Some(vec![ElementId::new(4)]));
        let e2 = elements.edge(ElementId::new(4)).unwrap();
        assert_eq!(e2.source(), ElementId::new(1));
        assert_eq!(e2.target(), ElementId::new(0));
    }

    fn dangling_table() -> Vec<Option<GraphElement>> {
        let t = EdgeTypeId::new(7);
        let a = Vertex::new(ElementId::new(0), 1);
        a.add_outgoing_edge(t, ElementId::new(1)).unwrap();
        a.add_outgoing_edge(EdgeTypeId::new(8), ElementId::new(9)).unwrap();
        // target 2 is a hole
        let e = Edge::new(ElementId::new(1), 1, ElementId::new(0), ElementId::new(2), t);
        vec![Some(a.into()), Some(e.into()), None]
    }

    #[test]
    fn test_strict_policy_reports_every_dangling_reference() {
        let temp_dir = TempDir::new().unwrap();
        let path = save(&temp_dir, &dangling_table());

        match load(&path, DanglingPolicy::Strict) {
            Err(PersistenceError::Structural(err)) => {
                assert_eq!(err.references.len(), 3);
                assert!(err.references.contains(&DanglingReference {
                    from: ElementId::new(1),
                    to: ElementId::new(2),
                    kind: ReferenceKind::EdgeTarget,
                }));
                assert!(err.references.contains(&DanglingReference {
                    from: ElementId::new(0),
                    to: ElementId::new(9),
                    kind: ReferenceKind::OutgoingEdge(EdgeTypeId::new(8)),
                }));
            }
            other => panic!("expected structural error, got {:?}", other),
        }
    }

    #[test]
    fn test_prune_policy_drops_references() {
        let temp_dir = TempDir::new().unwrap();
        let path = save(&temp_dir, &dangling_table());

        let snapshot = load(&path, DanglingPolicy::Prune).unwrap().unwrap();
        assert_eq!(snapshot.pruned.len(), 3);
        assert!(snapshot.elements.get(ElementId::new(1)).is_none());
        let a = snapshot.elements.vertex(ElementId::new(0)).unwrap();
        assert!(a.get_outgoing_edges().unwrap().is_empty());
    }

    /// Edge 1 from 0 to 0 that vertex 0 lists only as incoming
    fn unlisted_edge_table() -> Vec<Option<GraphElement>> {
        let t = EdgeTypeId::new(7);
        let a = Vertex::new(ElementId::new(0), 1);
        a.add_incoming_edge(t, ElementId::new(1)).unwrap();
        let e = Edge::new(ElementId::new(1), 1, ElementId::new(0), ElementId::new(0), t);
        vec![Some(a.into()), Some(e.into())]
    }

    #[test]
    fn test_edge_missing_from_source_adjacency_is_dangling() {
        let temp_dir = TempDir::new().unwrap();
        let path = save(&temp_dir, &unlisted_edge_table());

        match load(&path, DanglingPolicy::Strict) {
            Err(PersistenceError::Structural(err)) => {
                assert_eq!(
                    err.references,
                    vec![
                        DanglingReference {
                            from: ElementId::new(1),
                            to: ElementId::new(0),
                            kind: ReferenceKind::SourceAdjacency,
                        },
                        DanglingReference {
                            from: ElementId::new(0),
                            to: ElementId::new(1),
                            kind: ReferenceKind::IncomingEdge(EdgeTypeId::new(7)),
                        },
                    ]
                );
            }
            other => panic!("expected structural error, got {:?}", other),
        }

        let snapshot = load(&path, DanglingPolicy::Prune).unwrap().unwrap();
        assert!(snapshot.elements.get(ElementId::new(1)).is_none());
        let a = snapshot.elements.vertex(ElementId::new(0)).unwrap();
        assert!(a.get_incoming_edges().unwrap().is_empty());
    }

    #[test]
    fn test_edge_type_comes_from_source_group() {
        let temp_dir = TempDir::new().unwrap();
        let a = Vertex::new(ElementId::new(0), 1);
        let b = Vertex::new(ElementId::new(1), 1);
        a.add_outgoing_edge(EdgeTypeId::new(4), ElementId::new(2)).unwrap();
        b.add_incoming_edge(EdgeTypeId::new(4), ElementId::new(2)).unwrap();
        let e = Edge::new(ElementId::new(2), 1, ElementId::new(0), ElementId::new(1), EdgeTypeId::new(4));
        let path = save(&temp_dir, &[Some(a.into()), Some(b.into()), Some(e.into())]);

        let snapshot = load(&path, DanglingPolicy::Strict).unwrap().unwrap();
        let e = snapshot.elements.edge(ElementId::new(2)).unwrap();
        assert_eq!(e.edge_type(), EdgeTypeId::new(4));
    }

    #[test]
    fn test_huge_declared_property_count_fails_cleanly() {
        let temp_dir = TempDir::new().unwrap();
        let path = save(&temp_dir, &[Some(Vertex::new(ElementId::new(0), 1).into())]);

        // vertex header promising i32::MAX properties with no payload
        let file = File::create(temp_dir.path().join("graph_graphElements_0_to_1")).unwrap();
        let mut writer = BinaryWriter::new(file);
        writer.write_u8(TAG_VERTEX).unwrap();
        writer.write_i32(0).unwrap();
        writer.write_i64(0).unwrap();
        writer.write_i64(0).unwrap();
        writer.write_i32(i32::MAX).unwrap();
        writer.flush().unwrap();

        assert!(load(&path, DanglingPolicy::Strict).is_err());
    }

    #[test]
    fn test_misplaced_record_is_corruption() {
        let temp_dir = TempDir::new().unwrap();
        // vertex 5 stored in slot 0
        let path = save(&temp_dir, &[Some(Vertex::new(ElementId::new(5), 1).into())]);
        let err = load(&path, DanglingPolicy::Strict).unwrap_err();
        assert!(matches!(err, PersistenceError::Corrupt { slot: 0, .. }));
    }

    #[test]
    fn test_missing_partition_file_fails() {
        let temp_dir = TempDir::new().unwrap();
        let path = save(&temp_dir, &dangling_table());
        std::fs::remove_file(temp_dir.path().join("graph_graphElements_2_to_3")).unwrap();
        assert!(matches!(
            load(&path, DanglingPolicy::Strict),
            Err(PersistenceError::Io(_))
        ));
    }
}
