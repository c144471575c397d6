//! Index store over the htsnexus SQLite database.
//!
//! The database is written by the out-of-band indexers and only ever read
//! here. Each load opens its own read-only connection on the blocking pool,
//! so concurrent loads never share a connection.

use super::{
    Accession, AccessionKey, BinningStrategy, BlockIndex, BlockOffsetEntry, IndexStore,
    IndexedBlock, RangeIndex, header,
};
use crate::location::StorageDescriptor;
use crate::{Error, Result};
use async_trait::async_trait;
use bytes::Bytes;
use rusqlite::{Connection, OpenFlags, OptionalExtension, params};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Tables written by the htsnexus indexers.
pub const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS htsfiles (
        _dbid TEXT PRIMARY KEY, format TEXT NOT NULL,
        namespace TEXT NOT NULL, accession TEXT NOT NULL, url TEXT NOT NULL,
        file_size INTEGER CHECK(file_size IS NULL OR file_size > 0));
    CREATE UNIQUE INDEX IF NOT EXISTS htsfiles_namespace_accession
        ON htsfiles(namespace, accession, format);
    CREATE TABLE IF NOT EXISTS htsfiles_blocks_meta (
        _dbid TEXT PRIMARY KEY, reference TEXT NOT NULL,
        header TEXT NOT NULL, slice_prefix BLOB, slice_suffix BLOB,
        FOREIGN KEY(_dbid) REFERENCES htsfiles(_dbid));
    CREATE TABLE IF NOT EXISTS htsfiles_blocks (
        _dbid TEXT NOT NULL, byteLo INTEGER NOT NULL, byteHi INTEGER NOT NULL,
        seq TEXT, seqLo INTEGER, seqHi INTEGER,
        block_prefix BLOB, block_suffix BLOB,
        FOREIGN KEY(_dbid) REFERENCES htsfiles(_dbid));
    CREATE INDEX IF NOT EXISTS htsfiles_blocks_index1 ON htsfiles_blocks(_dbid, seq, seqLo, seqHi);
    CREATE INDEX IF NOT EXISTS htsfiles_blocks_index2 ON htsfiles_blocks(_dbid, seq, seqHi);
";

#[derive(Debug, Clone)]
pub struct SqliteIndexStore {
    path: PathBuf,
    binning: BinningStrategy,
}

struct FileRow {
    dbid: String,
    url: String,
    file_size: Option<i64>,
}

struct MetaRow {
    reference: String,
    header: String,
    slice_prefix: Option<Vec<u8>>,
    slice_suffix: Option<Vec<u8>>,
}

struct BlockRow {
    byte_lo: i64,
    byte_hi: i64,
    seq: Option<String>,
    seq_lo: Option<i64>,
    seq_hi: Option<i64>,
}

impl SqliteIndexStore {
    /// Open the database at `path`, checking that it is readable and carries
    /// the htsnexus tables.
    pub fn open(path: impl Into<PathBuf>, binning: BinningStrategy) -> Result<Self> {
        let store = Self {
            path: path.into(),
            binning,
        };
        let conn = store.connect()?;
        let files: i64 = conn.query_row("SELECT COUNT(*) FROM htsfiles", [], |row| row.get(0))?;
        tracing::info!(path = %store.path.display(), files, "opened index database");
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn connect(&self) -> Result<Connection> {
        let flags = OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        Connection::open_with_flags(&self.path, flags).map_err(|e| {
            Error::IndexCorrupt(format!(
                "failed to open index database {}: {}",
                self.path.display(),
                e
            ))
        })
    }

    /// Number of registered files stored in S3, which need blob credentials.
    pub async fn count_blob_accessions(&self) -> Result<u64> {
        let store = self.clone();
        tokio::task::spawn_blocking(move || {
            let conn = store.connect()?;
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM htsfiles WHERE url LIKE 's3://%'",
                [],
                |row| row.get(0),
            )?;
            Ok(count as u64)
        })
        .await?
    }

    /// Load and validate one accession. Blocking.
    pub fn load(&self, key: &AccessionKey) -> Result<Accession> {
        let conn = self.connect()?;

        let file = conn
            .query_row(
                "SELECT _dbid, url, file_size FROM htsfiles
                 WHERE namespace = ?1 AND accession = ?2 AND lower(format) = ?3",
                params![key.namespace, key.accession, key.format.as_str()],
                |row| {
                    Ok(FileRow {
                        dbid: row.get(0)?,
                        url: row.get(1)?,
                        file_size: row.get(2)?,
                    })
                },
            )
            .optional()?
            .ok_or_else(|| Error::UnknownAccession(key.to_string()))?;

        let file_size = file
            .file_size
            .map(|size| non_negative(size, "file_size"))
            .transpose()?;
        let location = StorageDescriptor::parse(&file.url)?;

        let meta = conn
            .query_row(
                "SELECT reference, header, slice_prefix, slice_suffix
                 FROM htsfiles_blocks_meta WHERE _dbid = ?1",
                params![file.dbid],
                |row| {
                    Ok(MetaRow {
                        reference: row.get(0)?,
                        header: row.get(1)?,
                        slice_prefix: row.get(2)?,
                        slice_suffix: row.get(3)?,
                    })
                },
            )
            .optional()?;

        let mut stmt = conn.prepare(
            "SELECT byteLo, byteHi, seq, seqLo, seqHi FROM htsfiles_blocks
             WHERE _dbid = ?1 ORDER BY byteLo, byteHi",
        )?;
        let rows = stmt
            .query_map(params![file.dbid], |row| {
                Ok(BlockRow {
                    byte_lo: row.get(0)?,
                    byte_hi: row.get(1)?,
                    seq: row.get(2)?,
                    seq_lo: row.get(3)?,
                    seq_hi: row.get(4)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let index = match meta {
            Some(meta) => Some(self.range_index(key, meta, rows, file_size)?),
            None if rows.is_empty() => None,
            None => {
                return Err(Error::IndexCorrupt(format!(
                    "{} has block entries but no block index metadata",
                    key
                )));
            }
        };

        Ok(Accession {
            key: key.clone(),
            file_size,
            location,
            index,
        })
    }

    fn range_index(
        &self,
        key: &AccessionKey,
        meta: MetaRow,
        rows: Vec<BlockRow>,
        file_size: Option<u64>,
    ) -> Result<RangeIndex> {
        let references = header::reference_sequences(key.format, &meta.header)?;
        let blocks = rows
            .into_iter()
            .map(BlockRow::into_block)
            .collect::<Result<Vec<_>>>()?;
        let blocks = BlockIndex::build(references, blocks, self.binning, file_size)?;

        Ok(RangeIndex {
            reference_genome: meta.reference,
            blocks,
            slice_prefix: non_empty(meta.slice_prefix),
            slice_suffix: non_empty(meta.slice_suffix),
        })
    }
}

impl BlockRow {
    fn into_block(self) -> Result<IndexedBlock> {
        let byte_start = non_negative(self.byte_lo, "byteLo")?;
        let byte_end = non_negative(self.byte_hi, "byteHi")?;
        let (seq_start, seq_end) = match (&self.seq, self.seq_lo, self.seq_hi) {
            (Some(_), Some(lo), Some(hi)) => (non_negative(lo, "seqLo")?, non_negative(hi, "seqHi")?),
            (Some(seq), _, _) => {
                return Err(Error::IndexCorrupt(format!(
                    "block on {} at byte {} has no coordinate range",
                    seq, byte_start
                )));
            }
            (None, _, _) => (0, 0),
        };

        Ok(IndexedBlock {
            reference: self.seq,
            entry: BlockOffsetEntry {
                seq_start,
                seq_end,
                byte_start,
                byte_end,
            },
        })
    }
}

fn non_negative(value: i64, column: &str) -> Result<u64> {
    u64::try_from(value)
        .map_err(|_| Error::IndexCorrupt(format!("negative {} in index: {}", column, value)))
}

fn non_empty(blob: Option<Vec<u8>>) -> Option<Bytes> {
    blob.filter(|b| !b.is_empty()).map(Bytes::from)
}

#[async_trait]
impl IndexStore for SqliteIndexStore {
    async fn get_accession(&self, key: &AccessionKey) -> Result<Arc<Accession>> {
        let store = self.clone();
        let key = key.clone();
        let accession = tokio::task::spawn_blocking(move || store.load(&key))
            .await?
            .inspect_err(|e| {
                if let Error::IndexCorrupt(_) = e {
                    tracing::error!(error = %e, "failed to load accession index");
                }
            })?;
        Ok(Arc::new(accession))
    }
}
