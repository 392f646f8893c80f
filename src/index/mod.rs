//! Index collaborator boundary
//!
//! The snapshot engine never looks inside an index. It asks each named index
//! to [`save`](Index::save) itself into its own file and, on load, hands that
//! file back to an [`IndexFactory`].

pub mod property_index;

pub use property_index::{IndexKey, PropertyIndex, PropertyIndexFactory};

use std::any::Any;
use std::fmt;
use std::io::{Read, Write};
use thiserror::Error;

/// Index errors
#[derive(Error, Debug)]
pub enum IndexError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("Unknown index: {0}")]
    Unknown(String),
}

pub type IndexResult<T> = Result<T, IndexError>;

/// A named, persistable index
pub trait Index: Send + Sync + fmt::Debug {
    /// Serialize the whole index into `writer`
    fn save(&self, writer: &mut dyn Write) -> IndexResult<()>;

    /// Short type name, for logs
    fn kind(&self) -> &'static str;

    fn as_any(&self) -> &dyn Any;
}

/// Rebuilds indices from the bytes their `save` produced
pub trait IndexFactory: Send + Sync {
    fn restore(&self, name: &str, reader: &mut dyn Read) -> IndexResult<Box<dyn Index>>;
}
