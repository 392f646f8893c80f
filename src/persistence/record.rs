//! Element records of a partition file
//!
//! One record per table slot:
//!
//! ```text
//! hole:   tag=2
//! edge:   tag=0 id created modified nprops (pid value)* source target
//! vertex: tag=1 id created modified nprops (pid value)*
//!         nout (type n edge_id*)* nin (type n edge_id*)*
//! ```
//!
//! Edges inside adjacency groups and edge endpoints are written as ids only.
//! An edge's type is implied by the outgoing group of its source vertex.
//! Decoding yields a [`PendingElement`], which still holds raw ids; binding
//! them to live elements happens once every partition has been read.

use super::codec::{prealloc, BinaryReader, BinaryWriter};
use super::{PersistenceError, PersistenceResult};
use crate::graph::{
    Adjacency, Edge, EdgeTypeId, Element, ElementId, ElementState, GraphElement, PropertyId,
    PropertyMap, Vertex,
};
use std::io::{Read, Write};

pub const TAG_EDGE: u8 = 0;
pub const TAG_VERTEX: u8 = 1;
pub const TAG_HOLE: u8 = 2;

/// Fields every element record starts with
#[derive(Debug, Clone, PartialEq)]
pub struct PendingHeader {
    pub id: ElementId,
    pub created_at: i64,
    pub modified_at: i64,
    pub properties: PropertyMap,
}

/// An element parsed from disk whose references are not yet resolved
#[derive(Debug, Clone, PartialEq)]
pub enum PendingElement {
    Vertex {
        header: PendingHeader,
        outgoing: Adjacency,
        incoming: Adjacency,
    },
    Edge {
        header: PendingHeader,
        source: ElementId,
        target: ElementId,
    },
}

impl PendingElement {
    pub fn id(&self) -> ElementId {
        match self {
            PendingElement::Vertex { header, .. } | PendingElement::Edge { header, .. } => header.id,
        }
    }

    pub fn is_vertex(&self) -> bool {
        matches!(self, PendingElement::Vertex { .. })
    }

    pub fn is_edge(&self) -> bool {
        matches!(self, PendingElement::Edge { .. })
    }
}

/// Write one slot. Each element is read-latched while it is encoded.
pub fn write_record<W: Write>(
    writer: &mut BinaryWriter<W>,
    slot: Option<&GraphElement>,
) -> PersistenceResult<()> {
    match slot {
        None => writer.write_u8(TAG_HOLE),
        Some(GraphElement::Vertex(vertex)) => write_vertex(writer, vertex),
        Some(GraphElement::Edge(edge)) => write_edge(writer, edge),
    }
}

fn write_vertex<W: Write>(writer: &mut BinaryWriter<W>, vertex: &Vertex) -> PersistenceResult<()> {
    let state = vertex.read_state()?;
    writer.write_u8(TAG_VERTEX)?;
    write_header(writer, vertex.id(), vertex.created_at(), &state.base)?;
    write_adjacency(writer, &state.outgoing)?;
    write_adjacency(writer, &state.incoming)
}

fn write_edge<W: Write>(writer: &mut BinaryWriter<W>, edge: &Edge) -> PersistenceResult<()> {
    let state = edge.read_state()?;
    writer.write_u8(TAG_EDGE)?;
    write_header(writer, edge.id(), edge.created_at(), &state)?;
    writer.write_i32(edge.source().as_i32())?;
    writer.write_i32(edge.target().as_i32())
}

fn write_header<W: Write>(
    writer: &mut BinaryWriter<W>,
    id: ElementId,
    created_at: i64,
    state: &ElementState,
) -> PersistenceResult<()> {
    writer.write_i32(id.as_i32())?;
    writer.write_i64(created_at)?;
    writer.write_i64(state.modified_at)?;
    writer.write_len(state.properties.len())?;
    for (key, value) in &state.properties {
        writer.write_i32(key.as_i32())?;
        writer.write_value(value)?;
    }
    Ok(())
}

fn write_adjacency<W: Write>(writer: &mut BinaryWriter<W>, groups: &Adjacency) -> PersistenceResult<()> {
    writer.write_len(groups.len())?;
    for (edge_type, edges) in groups {
        writer.write_i32(edge_type.as_i32())?;
        writer.write_len(edges.len())?;
        for edge in edges {
            writer.write_i32(edge.as_i32())?;
        }
    }
    Ok(())
}

/// Read one slot written by [`write_record`]; `slot` is only used to label
/// corruption errors
pub fn read_record<R: Read>(
    reader: &mut BinaryReader<R>,
    slot: usize,
) -> PersistenceResult<Option<PendingElement>> {
    match reader.read_u8()? {
        TAG_HOLE => Ok(None),
        TAG_VERTEX => {
            let header = read_header(reader, slot)?;
            let outgoing = read_adjacency(reader, slot)?;
            let incoming = read_adjacency(reader, slot)?;
            Ok(Some(PendingElement::Vertex {
                header,
                outgoing,
                incoming,
            }))
        }
        TAG_EDGE => {
            let header = read_header(reader, slot)?;
            let source = ElementId::new(reader.read_i32()?);
            let target = ElementId::new(reader.read_i32()?);
            Ok(Some(PendingElement::Edge { header, source, target }))
        }
        tag => Err(PersistenceError::Corrupt {
            slot,
            reason: format!("unknown record tag {}", tag),
        }),
    }
}

fn read_header<R: Read>(reader: &mut BinaryReader<R>, slot: usize) -> PersistenceResult<PendingHeader> {
    let id = ElementId::new(reader.read_i32()?);
    let created_at = reader.read_i64()?;
    let modified_at = reader.read_i64()?;
    let count = reader.read_len()?;
    let mut properties = PropertyMap::with_capacity(prealloc(count));
    for _ in 0..count {
        let key = PropertyId::new(reader.read_i32()?);
        let value = reader.read_value()?;
        if properties.insert(key, value).is_some() {
            return Err(PersistenceError::Corrupt {
                slot,
                reason: format!("duplicate property {}", key),
            });
        }
    }
    Ok(PendingHeader {
        id,
        created_at,
        modified_at,
        properties,
    })
}

fn read_adjacency<R: Read>(reader: &mut BinaryReader<R>, slot: usize) -> PersistenceResult<Adjacency> {
    let groups = reader.read_len()?;
    let mut adjacency = Adjacency::with_capacity(prealloc(groups));
    for _ in 0..groups {
        let edge_type = EdgeTypeId::new(reader.read_i32()?);
        let count = reader.read_len()?;
        let mut edges = Vec::with_capacity(prealloc(count));
        for _ in 0..count {
            edges.push(ElementId::new(reader.read_i32()?));
        }
        if adjacency.insert(edge_type, edges).is_some() {
            return Err(PersistenceError::Corrupt {
                slot,
                reason: format!("duplicate adjacency group {}", edge_type),
            });
        }
    }
    Ok(adjacency)
}
