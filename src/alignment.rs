//! Assembly-vs-assembly alignments and their windows
//!
//! An `Alignment` is built from one PAF record in two phases: construction
//! normalises the CIGAR and builds the coordinate maps, then
//! `set_up_sliding_windows` lays out overlapping sampling windows and
//! overlap-free painting windows. `paint_sliding_windows` later labels each
//! window for a given threshold set.

use anyhow::{Context, Result};
use indexmap::IndexMap;
use std::fmt;

use crate::cigar::{difference_count, IndelMode, NormalizedCigar, Strand};
use crate::paf::PafRecord;
use crate::paint::{get_blocks, AlignmentRole, Paint};
use crate::peaks::{Threshold, Thresholds};
use crate::ranges::RangeSet;
use crate::window::{window_count, window_coverage, WindowParams};

#[derive(Debug, Clone)]
pub struct Alignment {
    pub query_name: String,
    pub query_length: u64,
    pub query_start: u64,
    pub query_end: u64,
    pub strand: Strand,
    pub target_name: String,
    pub target_length: u64,
    pub target_start: u64,
    pub target_end: u64,
    pub matches: u64,
    pub alignment_length: u64,
    pub percent_identity: f64,
    pub alignment_score: i64,

    /// One byte per alignment column (`===X==I===`)
    pub expanded_cigar: Vec<u8>,
    /// Expanded CIGAR with indels compressed or removed
    pub simplified_cigar: Vec<u8>,
    pub cigar_to_query: Vec<u64>,
    pub cigar_to_target: Vec<u64>,

    /// Sampling windows in simplified CIGAR space
    pub windows: Vec<(usize, usize)>,
    /// Painting windows, one per sampling window, tiling the whole alignment
    pub windows_no_overlap: Vec<(usize, usize)>,
    pub window_differences: Vec<usize>,
    /// Labels before ambiguous runs are resolved
    pub window_class_with_ambiguous: Vec<Paint>,
    pub window_classifications: Vec<Paint>,
}

impl Alignment {
    pub fn from_paf(record: &PafRecord, mode: IndelMode) -> Result<Self> {
        let cigar = record
            .cigar
            .as_deref()
            .with_context(|| format!("PAF record {} has no cg:Z: CIGAR tag", record.query_name))?;
        let strand = Strand::from_char(record.strand)?;
        let norm = NormalizedCigar::new(
            cigar,
            (record.query_start, record.query_end),
            (record.target_start, record.target_end),
            strand,
            mode,
        )
        .with_context(|| {
            format!(
                "Bad alignment {}:{}-{} vs {}:{}-{}",
                record.query_name,
                record.query_start,
                record.query_end,
                record.target_name,
                record.target_start,
                record.target_end
            )
        })?;

        Ok(Alignment {
            query_name: record.query_name.clone(),
            query_length: record.query_len,
            query_start: record.query_start,
            query_end: record.query_end,
            strand,
            target_name: record.target_name.clone(),
            target_length: record.target_len,
            target_start: record.target_start,
            target_end: record.target_end,
            matches: record.matches,
            alignment_length: record.block_len,
            percent_identity: record.percent_identity(),
            alignment_score: record.alignment_score,
            expanded_cigar: norm.expanded,
            simplified_cigar: norm.simplified,
            cigar_to_query: norm.to_query,
            cigar_to_target: norm.to_target,
            windows: Vec::new(),
            windows_no_overlap: Vec::new(),
            window_differences: Vec::new(),
            window_class_with_ambiguous: Vec::new(),
            window_classifications: Vec::new(),
        })
    }

    pub fn as_query(&self) -> AlignmentRole<'_> {
        AlignmentRole::Query {
            contig: &self.query_name,
            cigar_to_contig: &self.cigar_to_query,
        }
    }

    pub fn as_target(&self) -> AlignmentRole<'_> {
        AlignmentRole::Target {
            contig: &self.target_name,
            cigar_to_contig: &self.cigar_to_target,
        }
    }

    pub fn query_covered_bases(&self) -> u64 {
        self.query_end - self.query_start
    }

    /// Same query contig and overlapping query spans. `allowed_overlap`
    /// shrinks this alignment at both ends first; a negative value grows it.
    pub fn overlaps_on_query(&self, other: &Alignment, allowed_overlap: i64) -> bool {
        self.query_name == other.query_name
            && ranges_overlap(
                (self.query_start, self.query_end),
                (other.query_start, other.query_end),
                allowed_overlap,
            )
    }

    /// Lay out sampling windows (centred, trimming the remainder evenly from
    /// both ends) and matching painting windows of length `step`. The first
    /// and last painting windows stretch to the alignment ends. Alignments
    /// shorter than one window get no windows.
    pub fn set_up_sliding_windows(&mut self, params: &WindowParams) {
        self.windows.clear();
        self.windows_no_overlap.clear();
        self.window_differences.clear();
        self.window_class_with_ambiguous.clear();
        self.window_classifications.clear();

        let (size, step) = (params.size, params.step);
        let len = self.simplified_cigar.len();
        if size > len {
            return;
        }
        let count = window_count(len, size, step);

        let mut start = (len - window_coverage(size, step, count)) / 2;
        let mut start_no_overlap = (len - window_coverage(step, step, count)) / 2;
        for _ in 0..count {
            let end = start + size;
            self.windows.push((start, end));
            self.windows_no_overlap.push((start_no_overlap, start_no_overlap + step));
            self.window_differences
                .push(difference_count(&self.simplified_cigar[start..end]));
            start += step;
            start_no_overlap += step;
        }

        if let Some(first) = self.windows_no_overlap.first_mut() {
            first.0 = 0;
        }
        if let Some(last) = self.windows_no_overlap.last_mut() {
            last.1 = len;
        }
    }

    /// Label every window for `thresholds`, then resolve ambiguous runs.
    pub fn paint_sliding_windows(&mut self, thresholds: &Thresholds) {
        self.window_class_with_ambiguous = self
            .window_differences
            .iter()
            .map(|&d| classify_window(d, thresholds))
            .collect();
        self.window_classifications = remove_ambiguous(&self.window_class_with_ambiguous);
    }

    pub fn vertical_distances(&self) -> Vec<usize> {
        self.distances_with_label(Paint::Vertical)
    }

    pub fn horizontal_distances(&self) -> Vec<usize> {
        self.distances_with_label(Paint::Horizontal)
    }

    fn distances_with_label(&self, label: Paint) -> Vec<usize> {
        self.window_differences
            .iter()
            .zip(&self.window_classifications)
            .filter(|(_, &c)| c == label)
            .map(|(&d, _)| d)
            .collect()
    }

    /// Largest difference count over all sampling windows (0 without windows)
    pub fn max_differences(&self) -> usize {
        self.window_differences.iter().copied().max().unwrap_or(0)
    }

    pub fn vertical_blocks(&self, include_ambiguous: bool) -> Vec<(usize, usize)> {
        get_blocks(&self.column_labels(include_ambiguous), Paint::Vertical)
    }

    pub fn horizontal_blocks(&self, include_ambiguous: bool) -> Vec<(usize, usize)> {
        get_blocks(&self.column_labels(include_ambiguous), Paint::Horizontal)
    }

    pub fn ambiguous_blocks(&self, include_ambiguous: bool) -> Vec<(usize, usize)> {
        get_blocks(&self.column_labels(include_ambiguous), Paint::Ambiguous)
    }

    /// Label of every simplified CIGAR column, taken from the painting window
    /// that covers it. `include_ambiguous` selects the unresolved labels.
    fn column_labels(&self, include_ambiguous: bool) -> Vec<Paint> {
        let labels = if include_ambiguous {
            &self.window_class_with_ambiguous
        } else {
            &self.window_classifications
        };
        let mut columns = vec![Paint::Unaligned; self.simplified_cigar.len()];
        for (&(start, end), &label) in self.windows_no_overlap.iter().zip(labels) {
            columns[start..end].fill(label);
        }
        columns
    }
}

impl fmt::Display for Alignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}-{}({}), {}:{}-{} ({:.3}%)",
            self.query_name,
            self.query_start,
            self.query_end,
            self.strand.as_char(),
            self.target_name,
            self.target_start,
            self.target_end,
            self.percent_identity
        )
    }
}

/// Half-open overlap test after shrinking `this` by `allowed_overlap` at each
/// end. A range shrunk to nothing overlaps nothing.
fn ranges_overlap(this: (u64, u64), other: (u64, u64), allowed_overlap: i64) -> bool {
    let this_start = this.0 as i64 + allowed_overlap;
    let this_end = this.1 as i64 - allowed_overlap;
    if this_start >= this_end {
        return false;
    }
    this_start < other.1 as i64 && (other.0 as i64) < this_end
}

/// Window label from its difference count. An unbounded `very_low` also
/// disables `low`, and an unbounded `very_high` also disables `high`.
pub fn classify_window(differences: usize, thresholds: &Thresholds) -> Paint {
    let (very_low, low) = match thresholds.very_low {
        Threshold::Unbounded => (f64::NEG_INFINITY, f64::NEG_INFINITY),
        Threshold::Bounded(v) => (v, thresholds.low.or_infinite(f64::NEG_INFINITY)),
    };
    let (high, very_high) = match thresholds.very_high {
        Threshold::Unbounded => (f64::INFINITY, f64::INFINITY),
        Threshold::Bounded(v) => (thresholds.high.or_infinite(f64::INFINITY), v),
    };

    let d = differences as f64;
    if d < very_low {
        Paint::Horizontal
    } else if d < low {
        Paint::Ambiguous
    } else if d > very_high {
        Paint::Horizontal
    } else if d > high {
        Paint::Ambiguous
    } else {
        Paint::Vertical
    }
}

/// Half-open index runs of ambiguous labels
pub fn find_ambiguous_runs(classifications: &[Paint]) -> Vec<(usize, usize)> {
    get_blocks(classifications, Paint::Ambiguous)
}

/// Replace every ambiguous run using its neighbours.
///
/// A run covering everything becomes horizontal. A run at either end takes
/// its one neighbour's label. An interior run takes the label its two
/// neighbours share, or horizontal when they differ.
pub fn remove_ambiguous(classifications: &[Paint]) -> Vec<Paint> {
    let n = classifications.len();
    let mut resolved = classifications.to_vec();
    for (start, end) in find_ambiguous_runs(classifications) {
        let label = if start == 0 && end == n {
            Paint::Horizontal
        } else if start == 0 {
            classifications[end]
        } else if end == n {
            classifications[start - 1]
        } else {
            let preceding = classifications[start - 1];
            let following = classifications[end];
            if preceding == following {
                preceding
            } else {
                Paint::Horizontal
            }
        };
        resolved[start..end].fill(label);
    }
    resolved
}

/// Sort by alignment score (best first, stable) and drop every alignment
/// whose query span overlaps any better-scoring one, including ones already
/// dropped. Target spans are not compared, so two query regions that both
/// align to one target region are both kept.
pub fn cull_redundant_alignments(mut alignments: Vec<Alignment>, allowed_overlap: i64) -> Vec<Alignment> {
    alignments.sort_by_key(|a| std::cmp::Reverse(a.alignment_score));
    let keep: Vec<bool> = (0..alignments.len())
        .map(|i| {
            !alignments[..i]
                .iter()
                .any(|seen| alignments[i].overlaps_on_query(seen, allowed_overlap))
        })
        .collect();
    alignments
        .into_iter()
        .zip(keep)
        .filter_map(|(a, keep)| keep.then_some(a))
        .collect()
}

/// Fraction of assembly A covered by alignment queries, overlaps counted once
pub fn query_coverage(alignments: &[Alignment], assembly_length: u64) -> f64 {
    if assembly_length == 0 {
        return 0.0;
    }
    let mut by_contig: IndexMap<&str, RangeSet> = IndexMap::new();
    for a in alignments {
        by_contig
            .entry(a.query_name.as_str())
            .or_default()
            .add(a.query_start, a.query_end);
    }
    let aligned: u64 = by_contig.values().map(|r| r.total_length()).sum();
    aligned as f64 / assembly_length as f64
}

/// Length `L` such that lengths `>= L` hold at least half the total
pub fn n50(mut lengths: Vec<usize>) -> usize {
    lengths.sort_unstable_by(|a, b| b.cmp(a));
    let total: usize = lengths.iter().sum();
    let target = total as f64 * 0.5;
    let mut so_far = 0usize;
    for length in lengths {
        so_far += length;
        if so_far as f64 >= target {
            return length;
        }
    }
    0
}

/// N50 of expanded CIGAR lengths
pub fn n50_alignment_length(alignments: &[Alignment]) -> usize {
    n50(alignments.iter().map(|a| a.expanded_cigar.len()).collect())
}
