//! CIGAR normalisation
//!
//! Alignments arrive with a compact `=`/`X`/`I`/`D` CIGAR (minimap2 `--eqx`).
//! Everything downstream works on an expanded form with one byte per
//! alignment column, optionally with indels removed or compressed, plus a
//! parallel map from each column back to a contig position.

use anyhow::{bail, Result};

pub const MATCH: u8 = b'=';
pub const MISMATCH: u8 = b'X';
pub const INSERTION: u8 = b'I';
pub const DELETION: u8 = b'D';

/// Alignment strand, from the PAF strand column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strand {
    Forward,
    Reverse,
}

impl Strand {
    pub fn from_char(c: char) -> Result<Self> {
        match c {
            '+' => Ok(Strand::Forward),
            '-' => Ok(Strand::Reverse),
            _ => bail!("Invalid strand '{c}'"),
        }
    }

    pub fn as_char(&self) -> char {
        match self {
            Strand::Forward => '+',
            Strand::Reverse => '-',
        }
    }
}

/// How indels are simplified before windowing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndelMode {
    /// Drop every insertion and deletion column
    Remove,
    /// Collapse each run of insertions (or deletions) to a single column
    Compress,
}

impl IndelMode {
    pub fn from_ignore_indels(ignore_indels: bool) -> Self {
        if ignore_indels {
            IndelMode::Remove
        } else {
            IndelMode::Compress
        }
    }

    /// Simplify an expanded CIGAR and its contig map together.
    pub fn simplify(&self, cigar: &[u8], cigar_to_contig: &[u64]) -> Result<(Vec<u8>, Vec<u64>)> {
        if cigar.len() != cigar_to_contig.len() {
            bail!(
                "CIGAR length {} does not match contig map length {}",
                cigar.len(),
                cigar_to_contig.len()
            );
        }
        let (simplified, map) = match self {
            IndelMode::Remove => remove_indels(cigar, cigar_to_contig),
            IndelMode::Compress => compress_indels(cigar, cigar_to_contig),
        };
        if simplified.len() != map.len() {
            bail!("simplified CIGAR and contig map are out of step");
        }
        Ok((simplified, map))
    }
}

/// Expand a run-length CIGAR into one byte per column, e.g. `3=1X2I` ->
/// `===XII`.
pub fn expand_cigar(cigar: &str) -> Result<Vec<u8>> {
    let mut expanded = Vec::new();
    let mut count: Option<usize> = None;

    for ch in cigar.bytes() {
        if ch.is_ascii_digit() {
            let digit = (ch - b'0') as usize;
            count = Some(count.unwrap_or(0) * 10 + digit);
            continue;
        }
        let n = match count.take() {
            Some(n) => n,
            None => bail!("CIGAR operation '{}' has no length in {cigar}", ch as char),
        };
        match ch {
            MATCH | MISMATCH | INSERTION | DELETION => {
                expanded.extend(std::iter::repeat(ch).take(n));
            }
            _ => bail!(
                "Unsupported CIGAR operation '{}' (alignments need =/X/I/D operations)",
                ch as char
            ),
        }
    }
    if count.is_some() {
        bail!("CIGAR {cigar} ends with a dangling length");
    }

    Ok(expanded)
}

/// Number of mismatches and indels in a stretch of expanded CIGAR
pub fn difference_count(cigar: &[u8]) -> usize {
    cigar
        .iter()
        .filter(|&&c| c == MISMATCH || c == INSERTION || c == DELETION)
        .count()
}

/// Swap `I` and `D`, turning a query-oriented CIGAR into a target-oriented one
pub fn swap_insertions_and_deletions(cigar: &[u8]) -> Vec<u8> {
    cigar
        .iter()
        .map(|&c| match c {
            INSERTION => DELETION,
            DELETION => INSERTION,
            other => other,
        })
        .collect()
}

/// Contig position of every column of an expanded CIGAR.
///
/// Indels are read from the contig's point of view: an insertion is an extra
/// contig base and consumes a position, a deletion does not. On the reverse
/// strand positions run down from `end - 1`. Fails if the consumed length
/// disagrees with `end - start`.
pub fn cigar_to_contig_pos(cigar: &[u8], start: u64, end: u64, strand: Strand) -> Result<Vec<u64>> {
    let mut cigar_to_contig = Vec::with_capacity(cigar.len());
    let (mut pos, step, finish) = match strand {
        Strand::Forward => (start as i64, 1i64, end as i64),
        Strand::Reverse => (end as i64 - 1, -1i64, start as i64 - 1),
    };

    for &c in cigar {
        cigar_to_contig.push(pos.max(0) as u64);
        if c == MATCH || c == MISMATCH || c == INSERTION {
            pos += step;
        }
    }

    if pos != finish {
        bail!(
            "CIGAR does not fit alignment span {}-{} (walk ended at {}, expected {})",
            start,
            end,
            pos,
            finish
        );
    }
    Ok(cigar_to_contig)
}

/// Remove all indel columns, e.g. `===X=IIII==XX==DDDD==` -> `===X===XX====`.
pub fn remove_indels(cigar: &[u8], cigar_to_contig: &[u64]) -> (Vec<u8>, Vec<u64>) {
    cigar
        .iter()
        .zip(cigar_to_contig)
        .filter(|(&c, _)| c == MATCH || c == MISMATCH)
        .map(|(&c, &p)| (c, p))
        .unzip()
}

/// Compress indel runs to one column, e.g. `===X=IIII==XX==DDDD==` ->
/// `===X=I==XX==D==`. The last column of each run is the one kept.
pub fn compress_indels(cigar: &[u8], cigar_to_contig: &[u64]) -> (Vec<u8>, Vec<u64>) {
    let mut new_cigar: Vec<u8> = Vec::with_capacity(cigar.len());
    let mut new_map: Vec<u64> = Vec::with_capacity(cigar.len());

    for (&c, &p) in cigar.iter().zip(cigar_to_contig) {
        if (c == INSERTION || c == DELETION) && new_cigar.last() == Some(&c) {
            new_cigar.pop();
            new_map.pop();
        }
        new_cigar.push(c);
        new_map.push(p);
    }

    (new_cigar, new_map)
}

/// Expanded and simplified CIGARs of one alignment with their contig maps
#[derive(Debug, Clone)]
pub struct NormalizedCigar {
    pub expanded: Vec<u8>,
    pub simplified: Vec<u8>,
    pub to_query: Vec<u64>,
    pub to_target: Vec<u64>,
}

impl NormalizedCigar {
    /// Build every CIGAR view of an alignment. The query map follows the
    /// alignment strand; the target is always forward.
    pub fn new(
        cigar: &str,
        query_range: (u64, u64),
        target_range: (u64, u64),
        strand: Strand,
        mode: IndelMode,
    ) -> Result<Self> {
        let expanded = expand_cigar(cigar)?;
        let query_map = cigar_to_contig_pos(&expanded, query_range.0, query_range.1, strand)?;
        let flipped = swap_insertions_and_deletions(&expanded);
        let target_map =
            cigar_to_contig_pos(&flipped, target_range.0, target_range.1, Strand::Forward)?;

        let (simplified, to_query) = mode.simplify(&expanded, &query_map)?;
        let (_, to_target) = mode.simplify(&expanded, &target_map)?;

        if simplified.len() != to_query.len() || simplified.len() != to_target.len() {
            bail!(
                "simplified CIGAR length {} does not match contig maps ({} query, {} target)",
                simplified.len(),
                to_query.len(),
                to_target.len()
            );
        }

        Ok(NormalizedCigar {
            expanded,
            simplified,
            to_query,
            to_target,
        })
    }
}
