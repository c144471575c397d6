//! Per-accession block index.
//!
//! Maps genomic coordinates to the byte ranges of the compressed blocks (BGZF
//! blocks, CRAM containers) holding records in those coordinates. Entries for
//! each reference are filed into coordinate bins (see [`super::binning`]);
//! entries with no reference position form the unplaced region.

use super::ReferenceSequence;
use super::binning::{Binning, BinningStrategy};
use crate::range::ByteRange;
use crate::{Error, Result};
use std::collections::{BTreeMap, HashMap};

/// One indexed block: genomic span `[seq_start, seq_end)` and byte span
/// `[byte_start, byte_end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockOffsetEntry {
    pub seq_start: u64,
    pub seq_end: u64,
    pub byte_start: u64,
    pub byte_end: u64,
}

impl BlockOffsetEntry {
    pub fn byte_range(&self) -> ByteRange {
        ByteRange::new(self.byte_start, self.byte_end)
    }

    // A block whose records all start and end at one position still covers it.
    fn span_end(&self) -> u64 {
        self.seq_end.max(self.seq_start + 1)
    }

    fn overlaps(&self, start: u64, end: u64) -> bool {
        self.seq_start < end && self.span_end() > start
    }
}

/// A block row as stored by the indexer, before it is filed by reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedBlock {
    /// `None` for blocks of unplaced, unmapped records.
    pub reference: Option<String>,
    pub entry: BlockOffsetEntry,
}

#[derive(Debug)]
struct ReferenceBlocks {
    binning: Box<dyn Binning>,
    // coordinate order
    entries: Vec<BlockOffsetEntry>,
    bins: BTreeMap<u64, Vec<usize>>,
    // end of the last indexed position, 0 when empty
    max_end: u64,
}

impl ReferenceBlocks {
    fn new(mut entries: Vec<BlockOffsetEntry>, strategy: BinningStrategy) -> Self {
        entries.sort_by_key(|e| (e.seq_start, e.byte_start, e.byte_end));
        let max_end = entries.iter().map(|e| e.span_end()).max().unwrap_or(0);
        let max_span = entries
            .iter()
            .map(|e| e.span_end() - e.seq_start)
            .max()
            .unwrap_or(1);
        let binning = strategy.for_reference(max_end.max(1), max_span);

        let mut bins: BTreeMap<u64, Vec<usize>> = BTreeMap::new();
        for (i, entry) in entries.iter().enumerate() {
            let bin = binning.bin_for_entry(entry.seq_start, entry.span_end());
            bins.entry(bin).or_default().push(i);
        }

        Self {
            binning,
            entries,
            bins,
            max_end,
        }
    }

    fn query(&self, start: u64, end: u64) -> Vec<BlockOffsetEntry> {
        let mut hits: Vec<usize> = self
            .binning
            .candidate_bins(start, end)
            .into_iter()
            .flat_map(|run| self.bins.range(run))
            .flat_map(|(_, members)| members)
            .copied()
            .filter(|&i| self.entries[i].overlaps(start, end))
            .collect();
        hits.sort_unstable();
        hits.dedup();
        hits.into_iter().map(|i| self.entries[i]).collect()
    }
}

/// Binned block index for one accession.
#[derive(Debug)]
pub struct BlockIndex {
    references: Vec<ReferenceSequence>,
    by_name: HashMap<String, usize>,
    blocks: Vec<ReferenceBlocks>,
    unplaced: Vec<BlockOffsetEntry>,
    data_start: Option<u64>,
}

impl BlockIndex {
    /// Validate the stored rows and file them by reference.
    ///
    /// Fails with [`Error::IndexCorrupt`] when a row has an empty or inverted
    /// byte range, an inverted coordinate range, names a reference missing
    /// from `references`, lies past `file_size`, or when a reference's blocks
    /// are not coordinate-sorted in file order.
    pub fn build(
        references: Vec<ReferenceSequence>,
        rows: Vec<IndexedBlock>,
        strategy: BinningStrategy,
        file_size: Option<u64>,
    ) -> Result<Self> {
        let mut by_name = HashMap::with_capacity(references.len());
        for (i, reference) in references.iter().enumerate() {
            if by_name.insert(reference.name.clone(), i).is_some() {
                return Err(Error::IndexCorrupt(format!(
                    "duplicate reference sequence name: {}",
                    reference.name
                )));
            }
        }

        let mut per_reference: Vec<Vec<BlockOffsetEntry>> = vec![Vec::new(); references.len()];
        let mut unplaced = Vec::new();
        let mut data_start: Option<u64> = None;

        for row in rows {
            let entry = row.entry;
            if entry.byte_end <= entry.byte_start {
                return Err(Error::IndexCorrupt(format!(
                    "block byte range {}..{} is empty or inverted",
                    entry.byte_start, entry.byte_end
                )));
            }
            if entry.seq_end < entry.seq_start {
                return Err(Error::IndexCorrupt(format!(
                    "block coordinate range {}..{} is inverted",
                    entry.seq_start, entry.seq_end
                )));
            }
            if let Some(size) = file_size {
                if entry.byte_end > size {
                    return Err(Error::IndexCorrupt(format!(
                        "block ends at byte {} past end of {}-byte file",
                        entry.byte_end, size
                    )));
                }
            }
            data_start = Some(data_start.map_or(entry.byte_start, |s| s.min(entry.byte_start)));

            match row.reference {
                Some(name) => {
                    let i = *by_name.get(&name).ok_or_else(|| {
                        Error::IndexCorrupt(format!("block names unknown reference sequence: {}", name))
                    })?;
                    per_reference[i].push(entry);
                }
                None => unplaced.push(entry),
            }
        }

        for (reference, entries) in references.iter().zip(per_reference.iter_mut()) {
            entries.sort_by_key(|e| (e.byte_start, e.byte_end));
            if entries.windows(2).any(|w| w[1].seq_start < w[0].seq_start) {
                return Err(Error::IndexCorrupt(format!(
                    "blocks for {} are not coordinate-sorted",
                    reference.name
                )));
            }
        }
        unplaced.sort_by_key(|e| (e.byte_start, e.byte_end));

        let blocks = per_reference
            .into_iter()
            .map(|entries| ReferenceBlocks::new(entries, strategy))
            .collect();

        Ok(Self {
            references,
            by_name,
            blocks,
            unplaced,
            data_start,
        })
    }

    pub fn references(&self) -> &[ReferenceSequence] {
        &self.references
    }

    pub fn reference(&self, name: &str) -> Option<&ReferenceSequence> {
        self.by_name.get(name).map(|&i| &self.references[i])
    }

    /// Offset of the first indexed block; bytes before it are the file header.
    pub fn data_start(&self) -> Option<u64> {
        self.data_start
    }

    /// Number of indexed blocks across all references.
    pub fn len(&self) -> usize {
        self.blocks.iter().map(|b| b.entries.len()).sum::<usize>() + self.unplaced.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Entries whose coordinates intersect `[start, end)` on `reference`, in
    /// coordinate order. `None` selects the unplaced region.
    ///
    /// `start == end` is treated as the single position `start`. Intervals at
    /// or past the reference length yield no entries. References without a
    /// declared length end at their last indexed position.
    pub fn query_blocks(
        &self,
        reference: Option<&str>,
        start: u64,
        end: u64,
    ) -> Result<Vec<BlockOffsetEntry>> {
        let Some(name) = reference else {
            return Ok(self.unplaced.clone());
        };
        let i = *self
            .by_name
            .get(name)
            .ok_or_else(|| Error::UnknownReference(name.to_string()))?;

        let length = self.references[i]
            .length
            .unwrap_or(self.blocks[i].max_end);
        if start >= length {
            return Ok(Vec::new());
        }
        let end = if start == end { start + 1 } else { end.min(length) };
        if end <= start {
            return Ok(Vec::new());
        }

        Ok(self.blocks[i].query(start, end))
    }
}
