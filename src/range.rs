//! Range resolution: genomic query to ordered byte ranges.

use crate::index::{Accession, AccessionKey, IndexStore, RangeIndex};
use crate::types::{DataClass, Format};
use crate::{Error, Result};
use bytes::Bytes;
use std::sync::Arc;

/// Reference name selecting unplaced, unmapped records.
pub const UNPLACED: &str = "*";

const BGZF_EOF: &[u8] = b"\x1f\x8b\x08\x04\x00\x00\x00\x00\x00\xff\x06\x00\x42\x43\x02\x00\x1b\x00\x03\x00\x00\x00\x00\x00\x00\x00\x00\x00";

const CRAM_EOF: &[u8] = b"\x0f\x00\x00\x00\xff\xff\xff\xff\x0f\xe0\x45\x4f\x46\x00\x00\x00\x00\x01\x00\x05\xbd\xd9\x4f\x00\x01\x00\x06\x06\x01\x00\x01\x00\x01\x00\xee\x63\x01\x4b";

/// Half-open byte range `[start, end)` within a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    pub fn new(start: u64, end: u64) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// HTTP `Range` header value (inclusive end).
    pub fn range_header(&self) -> String {
        format!("bytes={}-{}", self.start, self.end - 1)
    }
}

/// One ticket request against one accession.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeQuery {
    pub accession: AccessionKey,
    /// `None` requests the whole file, [`UNPLACED`] the unplaced records.
    pub reference_name: Option<String>,
    pub start: Option<u64>,
    pub end: Option<u64>,
    /// `None` requests header and body.
    pub class: Option<DataClass>,
}

impl RangeQuery {
    pub fn whole_file(accession: AccessionKey) -> Self {
        Self {
            accession,
            reference_name: None,
            start: None,
            end: None,
            class: None,
        }
    }

    pub fn region(
        accession: AccessionKey,
        reference_name: impl Into<String>,
        start: Option<u64>,
        end: Option<u64>,
    ) -> Self {
        Self {
            accession,
            reference_name: Some(reference_name.into()),
            start,
            end,
            class: None,
        }
    }

    pub fn with_class(mut self, class: Option<DataClass>) -> Self {
        self.class = class;
        self
    }

    /// Checks that need no index.
    pub fn validate(&self) -> Result<()> {
        if let (Some(start), Some(end)) = (self.start, self.end) {
            if start > end {
                return Err(Error::InvalidQuery(format!(
                    "start {} is greater than end {}",
                    start, end
                )));
            }
        }
        let has_coordinates = self.start.is_some() || self.end.is_some();
        match self.reference_name.as_deref() {
            None if has_coordinates => Err(Error::InvalidQuery(
                "start and end require referenceName".to_string(),
            )),
            Some(UNPLACED) if has_coordinates => Err(Error::InvalidQuery(
                "start and end cannot be combined with referenceName=*".to_string(),
            )),
            Some(_) if self.class == Some(DataClass::Header) => Err(Error::InvalidQuery(
                "class=header cannot be combined with a genomic range".to_string(),
            )),
            _ => Ok(()),
        }
    }
}

/// Header bytes a client needs before any body range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderSlice {
    /// Served inline, as stored by the indexer.
    Inline(Bytes),
    /// Read from the file itself.
    Range(ByteRange),
}

/// The bytes covering one query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedRange {
    WholeFile,
    Slice {
        header: Option<HeaderSlice>,
        /// Ordered, non-overlapping, each non-empty.
        ranges: Vec<ByteRange>,
        footer: Option<Bytes>,
    },
}

impl ResolvedRange {
    /// Body ranges; empty for a whole-file ticket.
    pub fn ranges(&self) -> &[ByteRange] {
        match self {
            ResolvedRange::WholeFile => &[],
            ResolvedRange::Slice { ranges, .. } => ranges,
        }
    }
}

/// A resolved query together with the accession it was resolved against.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub accession: Arc<Accession>,
    pub range: ResolvedRange,
}

/// Sort and coalesce byte ranges.
///
/// Ranges are merged when one ends at or after the next one starts, so the
/// result is strictly increasing with gaps between consecutive ranges.
/// Empty ranges are dropped.
pub fn merge_ranges(mut ranges: Vec<ByteRange>) -> Vec<ByteRange> {
    ranges.retain(|r| !r.is_empty());
    ranges.sort_by_key(|r| r.start);

    let mut merged: Vec<ByteRange> = Vec::with_capacity(ranges.len());
    for range in ranges {
        match merged.last_mut() {
            Some(current) if current.end >= range.start => {
                current.end = current.end.max(range.end);
            }
            _ => merged.push(range),
        }
    }
    merged
}

fn eof_marker(format: Format) -> Bytes {
    match format {
        Format::Cram => Bytes::from_static(CRAM_EOF),
        Format::Bam | Format::Vcf | Format::Bcf => Bytes::from_static(BGZF_EOF),
    }
}

impl RangeIndex {
    /// Header slice: the stored prefix, else the bytes before the first block.
    pub fn header_slice(&self) -> Option<HeaderSlice> {
        if let Some(prefix) = &self.slice_prefix {
            return Some(HeaderSlice::Inline(prefix.clone()));
        }
        match self.blocks.data_start() {
            Some(start) if start > 0 => Some(HeaderSlice::Range(ByteRange::new(0, start))),
            _ => None,
        }
    }

    pub fn footer(&self, format: Format) -> Bytes {
        self.slice_suffix
            .clone()
            .unwrap_or_else(|| eof_marker(format))
    }
}

/// Resolve `query` against an already loaded accession.
pub fn resolve_in(accession: &Accession, query: &RangeQuery) -> Result<ResolvedRange> {
    query.validate()?;

    let index = accession.index.as_ref();
    let Some(reference_name) = query.reference_name.as_deref() else {
        if query.class != Some(DataClass::Header) {
            return Ok(ResolvedRange::WholeFile);
        }
        let index = index.ok_or_else(|| {
            Error::InvalidQuery(format!(
                "{} has no block-level index; header slices are unavailable",
                accession.key
            ))
        })?;
        return Ok(ResolvedRange::Slice {
            header: index.header_slice(),
            ranges: Vec::new(),
            footer: None,
        });
    };

    let index = index.ok_or_else(|| {
        Error::InvalidQuery(format!(
            "{} has no block-level index; genomic range queries are unavailable",
            accession.key
        ))
    })?;

    let reference = if reference_name == UNPLACED {
        None
    } else {
        if index.blocks.reference(reference_name).is_none() {
            return Err(Error::UnknownReference(format!(
                "{} in {}",
                reference_name, accession.key
            )));
        }
        Some(reference_name)
    };

    let start = query.start.unwrap_or(0);
    let end = query.end.unwrap_or(u64::MAX);
    let entries = index.blocks.query_blocks(reference, start, end)?;
    let ranges = merge_ranges(entries.iter().map(|e| e.byte_range()).collect());

    let header = match query.class {
        Some(DataClass::Body) => None,
        _ => index.header_slice(),
    };

    Ok(ResolvedRange::Slice {
        header,
        ranges,
        footer: Some(index.footer(accession.format())),
    })
}

/// Resolves queries against accessions from an [`IndexStore`].
#[derive(Clone)]
pub struct RangeResolver {
    store: Arc<dyn IndexStore>,
}

impl RangeResolver {
    pub fn new(store: Arc<dyn IndexStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn IndexStore> {
        &self.store
    }

    pub async fn resolve(&self, query: &RangeQuery) -> Result<Resolution> {
        // malformed queries never reach the store
        query.validate()?;
        let accession = self.store.get_accession(&query.accession).await?;
        let range = resolve_in(&accession, query)?;
        Ok(Resolution { accession, range })
    }
}
