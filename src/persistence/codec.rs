//! Binary primitives shared by manifest, partition and record encoding
//!
//! Integers are zig-zag varints and strings are length-prefixed UTF-8, both
//! produced by `bincode`'s default options. Property values go through the
//! same options and are otherwise opaque to the persistence layer.

use super::PersistenceResult;
use crate::graph::PropertyValue;
use bincode::Options;
use std::io::{self, Read, Write};

/// Largest encoded size of a single primitive or property value
pub const VALUE_LIMIT: u64 = 1 << 28;

/// Most entries reserved up front for a count read from disk; larger
/// collections grow as their entries actually arrive
const PREALLOC_LIMIT: usize = 4096;

fn options() -> impl Options {
    bincode::DefaultOptions::new().with_limit(VALUE_LIMIT)
}

/// Capacity to reserve for `count` entries declared by untrusted input
pub fn prealloc(count: usize) -> usize {
    count.min(PREALLOC_LIMIT)
}

/// Streaming encoder over any writer
pub struct BinaryWriter<W: Write> {
    inner: W,
}

impl<W: Write> BinaryWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    pub fn write_u8(&mut self, value: u8) -> PersistenceResult<()> {
        self.inner.write_all(&[value])?;
        Ok(())
    }

    pub fn write_i32(&mut self, value: i32) -> PersistenceResult<()> {
        options().serialize_into(&mut self.inner, &value)?;
        Ok(())
    }

    pub fn write_i64(&mut self, value: i64) -> PersistenceResult<()> {
        options().serialize_into(&mut self.inner, &value)?;
        Ok(())
    }

    /// Length as an i32 varint; lengths beyond `i32::MAX` are rejected
    pub fn write_len(&mut self, len: usize) -> PersistenceResult<()> {
        let len = i32::try_from(len).map_err(|_| {
            io::Error::new(io::ErrorKind::InvalidInput, format!("length {} exceeds i32", len))
        })?;
        self.write_i32(len)
    }

    pub fn write_str(&mut self, value: &str) -> PersistenceResult<()> {
        options().serialize_into(&mut self.inner, value)?;
        Ok(())
    }

    pub fn write_value(&mut self, value: &PropertyValue) -> PersistenceResult<()> {
        options().serialize_into(&mut self.inner, value)?;
        Ok(())
    }

    pub fn flush(&mut self) -> PersistenceResult<()> {
        self.inner.flush()?;
        Ok(())
    }

    pub fn get_mut(&mut self) -> &mut W {
        &mut self.inner
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

/// Streaming decoder over any reader
pub struct BinaryReader<R: Read> {
    inner: R,
}

impl<R: Read> BinaryReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    pub fn read_u8(&mut self) -> PersistenceResult<u8> {
        let mut byte = [0u8; 1];
        self.inner.read_exact(&mut byte)?;
        Ok(byte[0])
    }

    pub fn read_i32(&mut self) -> PersistenceResult<i32> {
        Ok(options().deserialize_from(&mut self.inner)?)
    }

    pub fn read_i64(&mut self) -> PersistenceResult<i64> {
        Ok(options().deserialize_from(&mut self.inner)?)
    }

    /// Counterpart of [`BinaryWriter::write_len`]; negative lengths are an error
    pub fn read_len(&mut self) -> PersistenceResult<usize> {
        let len = self.read_i32()?;
        usize::try_from(len).map_err(|_| {
            io::Error::new(io::ErrorKind::InvalidData, format!("negative length {}", len)).into()
        })
    }

    pub fn read_string(&mut self) -> PersistenceResult<String> {
        Ok(options().deserialize_from(&mut self.inner)?)
    }

    pub fn read_value(&mut self) -> PersistenceResult<PropertyValue> {
        Ok(options().deserialize_from(&mut self.inner)?)
    }

    /// True when the underlying stream has no bytes left
    pub fn at_end(&mut self) -> PersistenceResult<bool> {
        let mut byte = [0u8; 1];
        loop {
            match self.inner.read(&mut byte) {
                Ok(0) => return Ok(true),
                Ok(_) => return Ok(false),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}
