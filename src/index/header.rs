//! Reference sequence lists from stored header text.
//!
//! The indexer stores the file's textual header alongside the block index:
//! SAM header text for BAM/CRAM, the VCF meta-information lines for VCF/BCF.
//! Reference names, lengths and order come from the `@SQ` records and the
//! `##contig` lines respectively.

use super::ReferenceSequence;
use crate::types::Format;
use crate::{Error, Result};
use noodles::{sam, vcf};

pub fn reference_sequences(format: Format, text: &str) -> Result<Vec<ReferenceSequence>> {
    // BAM header text may carry NUL padding
    let text = text.trim_end_matches('\0');
    match format {
        Format::Bam | Format::Cram => sam_reference_sequences(text),
        Format::Vcf | Format::Bcf => vcf_reference_sequences(text),
    }
}

fn sam_reference_sequences(text: &str) -> Result<Vec<ReferenceSequence>> {
    let header: sam::Header = text
        .parse()
        .map_err(|e| Error::IndexCorrupt(format!("failed to parse SAM header: {}", e)))?;

    Ok(header
        .reference_sequences()
        .iter()
        .enumerate()
        .map(|(ordinal, (name, reference_sequence))| ReferenceSequence {
            name: name.to_string(),
            length: Some(reference_sequence.length().get() as u64),
            ordinal,
        })
        .collect())
}

fn vcf_reference_sequences(text: &str) -> Result<Vec<ReferenceSequence>> {
    let header: vcf::Header = text
        .parse()
        .map_err(|e| Error::IndexCorrupt(format!("failed to parse VCF header: {}", e)))?;

    Ok(header
        .contigs()
        .iter()
        .enumerate()
        .map(|(ordinal, (name, contig))| ReferenceSequence {
            name: name.to_string(),
            length: contig.length().map(|n| n as u64),
            ordinal,
        })
        .collect())
}
