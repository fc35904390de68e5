//! Painting alignments and assemblies
//!
//! Window calls are projected from alignment space onto per-base label
//! arrays, one per contig. Vertical paint covers horizontal paint, and both
//! cover unaligned bases. Contiguous runs of one label are reported as
//! half-open `[start, end)` blocks.

use anyhow::{bail, Result};
use indexmap::IndexMap;
use log::debug;
use std::cell::OnceCell;
use std::fmt;

use crate::alignment::Alignment;
use crate::cigar::difference_count;
use crate::contigs::ContigIndex;
use crate::distribution::{get_distance, vertical_horizontal_distributions, DistanceMethod};
use crate::peaks::Thresholds;
use crate::ranges::RangeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Paint {
    Unaligned,
    Vertical,
    Horizontal,
    Ambiguous,
}

impl fmt::Display for Paint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let c = match self {
            Paint::Unaligned => 'U',
            Paint::Vertical => 'V',
            Paint::Horizontal => 'H',
            Paint::Ambiguous => '?',
        };
        write!(f, "{c}")
    }
}

/// Which side of an alignment is being painted, carrying that side's contig
/// and its map from simplified CIGAR columns to contig positions.
#[derive(Debug, Clone, Copy)]
pub enum AlignmentRole<'a> {
    Query {
        contig: &'a str,
        cigar_to_contig: &'a [u64],
    },
    Target {
        contig: &'a str,
        cigar_to_contig: &'a [u64],
    },
}

impl<'a> AlignmentRole<'a> {
    pub fn contig(&self) -> &'a str {
        match self {
            AlignmentRole::Query { contig, .. } | AlignmentRole::Target { contig, .. } => contig,
        }
    }

    pub fn cigar_to_contig(&self) -> &'a [u64] {
        match self {
            AlignmentRole::Query { cigar_to_contig, .. }
            | AlignmentRole::Target { cigar_to_contig, .. } => cigar_to_contig,
        }
    }
}

/// Half-open runs of `label` in a label array
pub fn get_blocks(paint: &[Paint], label: Paint) -> Vec<(usize, usize)> {
    let mut blocks = Vec::new();
    let mut start: Option<usize> = None;
    for (i, &p) in paint.iter().enumerate() {
        match (p == label, start) {
            (true, None) => start = Some(i),
            (false, Some(s)) => {
                blocks.push((s, i));
                start = None;
            }
            _ => {}
        }
    }
    if let Some(s) = start {
        blocks.push((s, paint.len()));
    }
    blocks
}

#[derive(Debug, Clone, Default)]
struct ContigBlocks {
    vertical: Vec<(u64, u64)>,
    horizontal: Vec<(u64, u64)>,
    unaligned: Vec<(u64, u64)>,
}

/// Per-base labels for one contig
#[derive(Debug, Clone)]
pub struct PaintedContig {
    length: u64,
    paint: Vec<Paint>,
    blocks: OnceCell<ContigBlocks>,
}

impl PaintedContig {
    pub fn new(length: u64) -> Self {
        PaintedContig {
            length,
            paint: vec![Paint::Unaligned; length as usize],
            blocks: OnceCell::new(),
        }
    }

    pub fn length(&self) -> u64 {
        self.length
    }

    pub fn label_at(&self, pos: usize) -> Option<Paint> {
        self.paint.get(pos).copied()
    }

    /// Paint every classified painting window of `alignment` on this contig.
    ///
    /// Windows are mapped to contig coordinates through the role's map (so a
    /// reverse-strand window is flipped back into forward order) and clamped
    /// to the contig.
    pub fn add_alignment(&mut self, alignment: &Alignment, role: AlignmentRole<'_>) -> Result<()> {
        let cigar_to_contig = role.cigar_to_contig();
        if alignment.windows_no_overlap.len() != alignment.window_classifications.len() {
            bail!(
                "alignment {} has {} painting windows but {} classifications",
                alignment,
                alignment.windows_no_overlap.len(),
                alignment.window_classifications.len()
            );
        }

        let mut vertical = RangeSet::new();
        let mut horizontal = RangeSet::new();
        for (&(a_start, a_end), &label) in alignment
            .windows_no_overlap
            .iter()
            .zip(&alignment.window_classifications)
        {
            let (mut seq_start, mut seq_end) = (cigar_to_contig[a_start], cigar_to_contig[a_end - 1]);
            if seq_end < seq_start {
                std::mem::swap(&mut seq_start, &mut seq_end);
            }
            seq_end += 1;
            let (seq_start, seq_end) = (seq_start.min(self.length), seq_end.min(self.length));

            match label {
                Paint::Vertical => vertical.add(seq_start, seq_end),
                Paint::Horizontal => horizontal.add(seq_start, seq_end),
                other => bail!("window of {} left unresolved as {}", alignment, other),
            }
        }

        for (start, end) in horizontal.merged() {
            self.paint_range(start, end, Paint::Horizontal);
        }
        for (start, end) in vertical.merged() {
            self.paint_range(start, end, Paint::Vertical);
        }
        self.blocks = OnceCell::new();
        Ok(())
    }

    /// Vertical always wins; horizontal only covers unaligned or horizontal bases
    fn paint_range(&mut self, start: u64, end: u64, label: Paint) {
        for p in &mut self.paint[start as usize..end as usize] {
            if *p != Paint::Vertical {
                *p = label;
            }
        }
    }

    fn blocks(&self) -> &ContigBlocks {
        self.blocks.get_or_init(|| {
            let as_u64 = |blocks: Vec<(usize, usize)>| {
                blocks
                    .into_iter()
                    .map(|(s, e)| (s as u64, e as u64))
                    .collect::<Vec<_>>()
            };
            ContigBlocks {
                vertical: as_u64(get_blocks(&self.paint, Paint::Vertical)),
                horizontal: as_u64(get_blocks(&self.paint, Paint::Horizontal)),
                unaligned: as_u64(get_blocks(&self.paint, Paint::Unaligned)),
            }
        })
    }

    pub fn vertical_blocks(&self) -> &[(u64, u64)] {
        &self.blocks().vertical
    }

    pub fn horizontal_blocks(&self) -> &[(u64, u64)] {
        &self.blocks().horizontal
    }

    pub fn unaligned_blocks(&self) -> &[(u64, u64)] {
        &self.blocks().unaligned
    }
}

/// Fractions of an assembly's bases under each label
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PaintFractions {
    pub vertical: f64,
    pub horizontal: f64,
    pub unaligned: f64,
}

/// `contig:start-end` lists, comma-joined, one per label
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PaintRegions {
    pub vertical: String,
    pub horizontal: String,
    pub unaligned: String,
}

/// All contigs of one assembly, in contig index order
#[derive(Debug, Clone)]
pub struct PaintedAssembly {
    contigs: IndexMap<String, PaintedContig>,
}

impl PaintedAssembly {
    pub fn new(index: &ContigIndex) -> Self {
        let contigs = index
            .iter()
            .map(|(name, length)| (name.to_string(), PaintedContig::new(length)))
            .collect();
        PaintedAssembly { contigs }
    }

    pub fn add_alignment(&mut self, alignment: &Alignment, role: AlignmentRole<'_>) -> Result<()> {
        let name = role.contig();
        match self.contigs.get_mut(name) {
            Some(contig) => contig.add_alignment(alignment, role),
            None => bail!("alignment {} names unknown contig {}", alignment, name),
        }
    }

    pub fn contig(&self, name: &str) -> Option<&PaintedContig> {
        self.contigs.get(name)
    }

    pub fn fractions(&self) -> PaintFractions {
        let mut total = 0u64;
        let mut vertical = 0u64;
        let mut horizontal = 0u64;
        for c in self.contigs.values() {
            total += c.length();
            vertical += c.vertical_blocks().iter().map(|(s, e)| e - s).sum::<u64>();
            horizontal += c.horizontal_blocks().iter().map(|(s, e)| e - s).sum::<u64>();
        }
        if total == 0 {
            return PaintFractions::default();
        }
        let unaligned = total - vertical - horizontal;
        PaintFractions {
            vertical: vertical as f64 / total as f64,
            horizontal: horizontal as f64 / total as f64,
            unaligned: unaligned as f64 / total as f64,
        }
    }

    pub fn regions(&self) -> PaintRegions {
        let mut vertical = Vec::new();
        let mut horizontal = Vec::new();
        let mut unaligned = Vec::new();
        for (name, c) in &self.contigs {
            let push = |blocks: &[(u64, u64)], out: &mut Vec<String>| {
                out.extend(blocks.iter().map(|(s, e)| format!("{name}:{s}-{e}")));
            };
            push(c.vertical_blocks(), &mut vertical);
            push(c.horizontal_blocks(), &mut horizontal);
            push(c.unaligned_blocks(), &mut unaligned);
        }
        PaintRegions {
            vertical: vertical.join(","),
            horizontal: horizontal.join(","),
            unaligned: unaligned.join(","),
        }
    }
}

/// Paint both assemblies of a pair: alignment queries on A, targets on B
pub fn paint_assemblies(
    contigs_a: &ContigIndex,
    contigs_b: &ContigIndex,
    alignments: &[Alignment],
) -> Result<(PaintedAssembly, PaintedAssembly)> {
    let mut painted_a = PaintedAssembly::new(contigs_a);
    let mut painted_b = PaintedAssembly::new(contigs_b);
    for a in alignments {
        painted_a.add_alignment(a, a.as_query())?;
        painted_b.add_alignment(a, a.as_target())?;
    }
    Ok((painted_a, painted_b))
}

/// Alignment-level painting results for one threshold set
#[derive(Debug, Clone)]
pub struct AlignmentPaintSummary {
    pub vertical_masses: Vec<f64>,
    pub horizontal_masses: Vec<f64>,
    pub vertical_fraction: f64,
    pub horizontal_fraction: f64,
    pub mean_vertical_window_distance: f64,
    pub median_vertical_window_distance: f64,
    pub mean_vertical_distance: f64,
    /// Horizontal over vertical differences; `None` without any differences
    pub r_over_m: Option<f64>,
}

/// Classify every window of every alignment and summarise the result.
pub fn paint_alignments(
    alignments: &mut [Alignment],
    thresholds: &Thresholds,
    window_size: usize,
) -> AlignmentPaintSummary {
    for a in alignments.iter_mut() {
        a.paint_sliding_windows(thresholds);
    }
    let (vertical_masses, horizontal_masses) = vertical_horizontal_distributions(alignments);

    let summary = AlignmentPaintSummary {
        vertical_fraction: vertical_masses.iter().sum(),
        horizontal_fraction: horizontal_masses.iter().sum(),
        mean_vertical_window_distance: get_distance(&vertical_masses, window_size, DistanceMethod::Mean),
        median_vertical_window_distance: get_distance(
            &vertical_masses,
            window_size,
            DistanceMethod::Median,
        ),
        mean_vertical_distance: mean_vertical_distance(alignments),
        r_over_m: r_over_m(alignments),
        vertical_masses,
        horizontal_masses,
    };
    debug!(
        "painted alignments: {:.2}% vertical, {:.2}% horizontal, mean vertical distance {:.9}",
        100.0 * summary.vertical_fraction,
        100.0 * summary.horizontal_fraction,
        summary.mean_vertical_distance
    );
    summary
}

/// Differences per column over the vertically painted parts of the alignments
pub fn mean_vertical_distance(alignments: &[Alignment]) -> f64 {
    let mut total_size = 0usize;
    let mut differences = 0usize;
    for a in alignments {
        for (start, end) in a.vertical_blocks(false) {
            total_size += end - start;
            differences += difference_count(&a.simplified_cigar[start..end]);
        }
    }
    if total_size == 0 {
        return 0.0;
    }
    differences as f64 / total_size as f64
}

/// Ratio of differences in horizontal blocks to differences in vertical blocks.
/// Infinite when only horizontal blocks hold differences, `None` when no
/// block does.
pub fn r_over_m(alignments: &[Alignment]) -> Option<f64> {
    let mut vertical = 0usize;
    let mut horizontal = 0usize;
    for a in alignments {
        for (start, end) in a.vertical_blocks(false) {
            vertical += difference_count(&a.simplified_cigar[start..end]);
        }
        for (start, end) in a.horizontal_blocks(false) {
            horizontal += difference_count(&a.simplified_cigar[start..end]);
        }
    }
    match (horizontal, vertical) {
        (0, 0) => None,
        (_, 0) => Some(f64::INFINITY),
        _ => Some(horizontal as f64 / vertical as f64),
    }
}
