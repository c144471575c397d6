//! Index store and block index.
//!
//! An htsnexus index database registers each file under a namespace,
//! accession and format, with the URL it is served from and, optionally, a
//! block-level range index: the file's header text, header/footer byte
//! slices, and one row per compressed block giving the genomic span of the
//! records it holds.
//!
//! # Implementations
//!
//! - [`SqliteIndexStore`] - reads the SQLite database written by the indexers
//! - [`CachedIndexStore`] - single-flight cache in front of another store
//!
//! # Example
//!
//! ```no_run
//! use htsnexus::index::{AccessionKey, BinningStrategy, CachedIndexStore, IndexStore, SqliteIndexStore};
//! use htsnexus::types::Format;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn run() -> htsnexus::Result<()> {
//! let store = SqliteIndexStore::open("htsnexus.db", BinningStrategy::Hierarchical)?;
//! let store = CachedIndexStore::new(Arc::new(store), None, Duration::from_secs(5));
//! let key = AccessionKey::new("ENCODE", "ENCFF904PIO", Format::Bam);
//! let accession = store.get_accession(&key).await?;
//! # Ok(())
//! # }
//! ```

mod binning;
mod blocks;
mod cache;
mod header;
mod sqlite;

pub use binning::{Binning, BinningStrategy, FixedBinning, HierarchicalBinning};
pub use blocks::{BlockIndex, BlockOffsetEntry, IndexedBlock};
pub use cache::CachedIndexStore;
pub use header::reference_sequences;
pub use sqlite::{SCHEMA, SqliteIndexStore};

use crate::location::StorageDescriptor;
use crate::{Result, types::Format};
use async_trait::async_trait;
use bytes::Bytes;
use std::fmt;
use std::sync::Arc;

/// Identifies one indexed file.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AccessionKey {
    pub namespace: String,
    pub accession: String,
    pub format: Format,
}

impl AccessionKey {
    pub fn new(namespace: impl Into<String>, accession: impl Into<String>, format: Format) -> Self {
        Self {
            namespace: namespace.into(),
            accession: accession.into(),
            format,
        }
    }
}

impl fmt::Display for AccessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.namespace, self.accession, self.format)
    }
}

/// A reference sequence declared in the file header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceSequence {
    pub name: String,
    /// Length in bases; VCF contigs may omit it.
    pub length: Option<u64>,
    /// Position in the header.
    pub ordinal: usize,
}

/// Block-level range index for one file.
#[derive(Debug)]
pub struct RangeIndex {
    /// Server-specific reference genome id the file was indexed against.
    pub reference_genome: String,
    pub blocks: BlockIndex,
    /// Bytes a client decoder needs before any slice of the body.
    pub slice_prefix: Option<Bytes>,
    /// Bytes terminating a slice (EOF marker).
    pub slice_suffix: Option<Bytes>,
}

/// One indexed file and everything needed to resolve ranges within it.
#[derive(Debug)]
pub struct Accession {
    pub key: AccessionKey,
    /// Size in bytes, when the indexer could determine it.
    pub file_size: Option<u64>,
    pub location: StorageDescriptor,
    /// `None` when the file was registered without a block-level index.
    pub index: Option<RangeIndex>,
}

impl Accession {
    pub fn format(&self) -> Format {
        self.key.format
    }

    pub fn references(&self) -> &[ReferenceSequence] {
        self.index
            .as_ref()
            .map(|index| index.blocks.references())
            .unwrap_or_default()
    }
}

/// Read-only lookup of accessions.
#[async_trait]
pub trait IndexStore: Send + Sync {
    /// Load an accession's index metadata.
    ///
    /// Fails with [`crate::Error::UnknownAccession`] when nothing is registered
    /// under `key` and [`crate::Error::IndexCorrupt`] when the stored index is
    /// structurally invalid.
    async fn get_accession(&self, key: &AccessionKey) -> Result<Arc<Accession>>;
}
