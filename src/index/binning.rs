//! Coordinate binning schemes for the block index.
//!
//! A [`Binning`] decides which bins a block entry is filed under and which
//! runs of bins must be visited to find every entry overlapping a query
//! interval. Candidate runs are walked against the populated bins only, so
//! query cost depends on the number of populated bins in the runs and the
//! number of hits, never on the width of the interval.
//!
//! All intervals are 0-based and half-open, and callers guarantee
//! `end > start`.

use std::fmt;
use std::ops::RangeInclusive;

/// Binning scheme used when building a reference's block index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BinningStrategy {
    /// UCSC/BAI/CSI-style hierarchical bins.
    #[default]
    Hierarchical,
    /// Fixed-width bins of `width` bases.
    Fixed { width: u64 },
}

impl BinningStrategy {
    /// Build the binning for a reference whose entries end at or before
    /// `max_end` and span at most `max_span` bases each.
    pub fn for_reference(&self, max_end: u64, max_span: u64) -> Box<dyn Binning> {
        match *self {
            BinningStrategy::Hierarchical => Box::new(HierarchicalBinning::covering(max_end)),
            BinningStrategy::Fixed { width } => Box::new(FixedBinning::new(width, max_span)),
        }
    }
}

pub trait Binning: Send + Sync + fmt::Debug {
    /// Bin an entry spanning `[start, end)` is filed under.
    fn bin_for_entry(&self, start: u64, end: u64) -> u64;

    /// Inclusive runs of bins that may hold entries overlapping `[start, end)`.
    fn candidate_bins(&self, start: u64, end: u64) -> Vec<RangeInclusive<u64>>;
}

/// Hierarchical binning as used by BAI and CSI indexes.
///
/// Level 0 is a single bin covering the whole addressable range; each further
/// level splits every bin into eight. An entry is filed in the smallest bin
/// that fully contains it, so a query visits one contiguous run of bins per
/// level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HierarchicalBinning {
    min_shift: u32,
    depth: u32,
}

impl HierarchicalBinning {
    pub const MIN_SHIFT: u32 = 14;
    pub const MIN_DEPTH: u32 = 5;
    const MAX_DEPTH: u32 = 16;

    pub fn new(min_shift: u32, depth: u32) -> Self {
        Self { min_shift, depth }
    }

    /// Smallest BAI-compatible scheme addressing coordinates up to `max_end`.
    pub fn covering(max_end: u64) -> Self {
        let mut depth = Self::MIN_DEPTH;
        while depth < Self::MAX_DEPTH && (1u64 << (Self::MIN_SHIFT + 3 * depth)) < max_end {
            depth += 1;
        }
        Self::new(Self::MIN_SHIFT, depth)
    }

    fn max_coordinate(&self) -> u64 {
        1u64 << (self.min_shift + 3 * self.depth)
    }

    // Coordinates past the addressable range collapse onto its last position.
    fn clamp(&self, start: u64, end: u64) -> (u64, u64) {
        let max = self.max_coordinate();
        let start = start.min(max - 1);
        let end = end.clamp(start + 1, max);
        (start, end)
    }

    pub fn reg2bin(&self, start: u64, end: u64) -> u64 {
        let (start, end) = self.clamp(start, end);
        let last = end - 1;
        let mut shift = self.min_shift;
        let mut offset = ((1u64 << (3 * self.depth)) - 1) / 7;
        let mut level = self.depth;
        while level > 0 {
            if start >> shift == last >> shift {
                return offset + (start >> shift);
            }
            level -= 1;
            shift += 3;
            offset -= 1u64 << (3 * level);
        }
        0
    }

    /// One run of overlapping bins per level, coarsest first.
    pub fn reg2bins(&self, start: u64, end: u64) -> Vec<RangeInclusive<u64>> {
        let (start, end) = self.clamp(start, end);
        let last = end - 1;
        let mut runs = Vec::with_capacity(self.depth as usize + 1);
        let mut shift = self.min_shift + 3 * self.depth;
        let mut offset = 0u64;
        for level in 0..=self.depth {
            runs.push((offset + (start >> shift))..=(offset + (last >> shift)));
            offset += 1u64 << (3 * level);
            shift = shift.saturating_sub(3);
        }
        runs
    }
}

impl Binning for HierarchicalBinning {
    fn bin_for_entry(&self, start: u64, end: u64) -> u64 {
        self.reg2bin(start, end)
    }

    fn candidate_bins(&self, start: u64, end: u64) -> Vec<RangeInclusive<u64>> {
        self.reg2bins(start, end)
    }
}

/// Fixed-width bins. Entries are filed under the bin holding their start, so
/// a query also looks back over the longest entry span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedBinning {
    width: u64,
    max_span: u64,
}

impl FixedBinning {
    pub fn new(width: u64, max_span: u64) -> Self {
        Self {
            width: width.max(1),
            max_span,
        }
    }
}

impl Binning for FixedBinning {
    fn bin_for_entry(&self, start: u64, _end: u64) -> u64 {
        start / self.width
    }

    fn candidate_bins(&self, start: u64, end: u64) -> Vec<RangeInclusive<u64>> {
        let first = start.saturating_sub(self.max_span) / self.width;
        vec![first..=(end - 1) / self.width]
    }
}
