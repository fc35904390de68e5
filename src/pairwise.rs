//! One assembly pair, from PAF records to table rows
//!
//! Every pair runs the same pipeline: build and cull alignments, sample
//! window distances, smooth the distribution and find its peaks, then paint
//! alignments and both assemblies once per reported peak.

use anyhow::{Context, Result};
use log::{debug, info};

use crate::alignment::{cull_redundant_alignments, n50_alignment_length, query_coverage, Alignment};
use crate::config::PairwiseConfig;
use crate::contigs::ContigIndex;
use crate::distribution::{build_distribution, smooth_distribution};
use crate::paf::PafRecord;
use crate::paint::{paint_alignments, paint_assemblies, AlignmentPaintSummary, PaintFractions, PaintRegions};
use crate::peaks::{get_peak_distance, PeakResult, PeakRole, Thresholds};
use crate::window::WindowParams;

/// Two assemblies and the alignments between them (A is the query side)
#[derive(Debug, Clone)]
pub struct AssemblyPair {
    pub name_a: String,
    pub name_b: String,
    pub records: Vec<PafRecord>,
    pub contigs_a: ContigIndex,
    pub contigs_b: ContigIndex,
}

impl AssemblyPair {
    pub fn label(&self) -> String {
        format!("{} vs {}", self.name_a, self.name_b)
    }
}

#[derive(Debug, Clone)]
pub enum PairOutcome {
    /// One row per reported peak, primary first
    Results(Vec<PairResult>),
    /// The pair produced nothing to report
    NoResult { note: String },
}

/// Everything written in one table row
#[derive(Debug, Clone)]
pub struct PairResult {
    pub name_a: String,
    pub name_b: String,
    pub role: PeakRole,
    pub peak_mass: f64,
    pub alignment_count: usize,
    pub n50_alignment_length: usize,
    pub aligned_fraction: f64,
    pub window: WindowParams,
    pub window_count: usize,
    pub mean_distance: f64,
    pub median_distance: f64,
    pub mass_peaks: String,
    pub peak_distance: f64,
    pub thresholds: Thresholds,
    pub alignments: AlignmentPaintSummary,
    pub fractions_a: PaintFractions,
    pub fractions_b: PaintFractions,
    pub regions_a: PaintRegions,
    pub regions_b: PaintRegions,
}

const TABLE_COLUMNS: &[&str] = &[
    "assembly_a",
    "assembly_b",
    "result_level",
    "peak_mass",
    "alignment_count",
    "n50_alignment_length",
    "aligned_fraction",
    "window_size",
    "window_step",
    "window_count",
    "mean_distance",
    "median_distance",
    "mass_peaks",
    "peak_distance",
    "alignments_vertical_fraction",
    "alignments_horizontal_fraction",
    "mean_vertical_window_distance",
    "median_vertical_window_distance",
    "mean_vertical_distance",
    "r/m",
    "assembly_a_vertical_fraction",
    "assembly_a_horizontal_fraction",
    "assembly_a_unaligned_fraction",
    "assembly_b_vertical_fraction",
    "assembly_b_horizontal_fraction",
    "assembly_b_unaligned_fraction",
    "assembly_a_vertical_regions",
    "assembly_a_horizontal_regions",
    "assembly_a_unaligned_regions",
    "assembly_b_vertical_regions",
    "assembly_b_horizontal_regions",
    "assembly_b_unaligned_regions",
];

pub fn table_header() -> String {
    TABLE_COLUMNS.join("\t")
}

/// `undef` with no differences at all, `inf` with only horizontal ones
fn format_r_over_m(r_over_m: Option<f64>) -> String {
    match r_over_m {
        Some(r) => format!("{r:.9}"),
        None => "undef".to_string(),
    }
}

fn percent(fraction: f64) -> String {
    format!("{:.2}%", 100.0 * fraction)
}

impl PairResult {
    /// Tab-separated row matching `table_header`, without a trailing newline
    pub fn to_table_line(&self) -> String {
        let r_over_m = format_r_over_m(self.alignments.r_over_m);
        let fields = [
            self.name_a.clone(),
            self.name_b.clone(),
            self.role.to_string(),
            format!("{:.9}", self.peak_mass),
            self.alignment_count.to_string(),
            self.n50_alignment_length.to_string(),
            format!("{:.9}", self.aligned_fraction),
            self.window.size.to_string(),
            self.window.step.to_string(),
            self.window_count.to_string(),
            format!("{:.9}", self.mean_distance),
            format!("{:.9}", self.median_distance),
            self.mass_peaks.clone(),
            format!("{:.9}", self.peak_distance),
            percent(self.alignments.vertical_fraction),
            percent(self.alignments.horizontal_fraction),
            format!("{:.9}", self.alignments.mean_vertical_window_distance),
            format!("{:.9}", self.alignments.median_vertical_window_distance),
            format!("{:.9}", self.alignments.mean_vertical_distance),
            r_over_m,
            percent(self.fractions_a.vertical),
            percent(self.fractions_a.horizontal),
            percent(self.fractions_a.unaligned),
            percent(self.fractions_b.vertical),
            percent(self.fractions_b.horizontal),
            percent(self.fractions_b.unaligned),
            self.regions_a.vertical.clone(),
            self.regions_a.horizontal.clone(),
            self.regions_a.unaligned.clone(),
            self.regions_b.vertical.clone(),
            self.regions_b.horizontal.clone(),
            self.regions_b.unaligned.clone(),
        ];
        fields.join("\t")
    }
}

/// Build alignments from a pair's records and drop redundant ones
pub fn culled_alignments(pair: &AssemblyPair, config: &PairwiseConfig) -> Result<Vec<Alignment>> {
    let mode = config.indel_mode();
    let alignments = pair
        .records
        .iter()
        .map(|r| Alignment::from_paf(r, mode))
        .collect::<Result<Vec<_>>>()
        .with_context(|| format!("{}: failed to build alignments", pair.label()))?;
    let before = alignments.len();
    let culled = cull_redundant_alignments(alignments, config.allowed_overlap);
    debug!(
        "{}: kept {} of {} alignments after culling",
        pair.label(),
        culled.len(),
        before
    );
    Ok(culled)
}

/// Simplified CIGAR lengths of the culled alignments, for window selection
pub fn sample_alignment_lengths(pair: &AssemblyPair, config: &PairwiseConfig) -> Result<Vec<usize>> {
    Ok(culled_alignments(pair, config)?
        .iter()
        .map(|a| a.simplified_cigar.len())
        .collect())
}

/// Run the full analysis for one pair
pub fn process_pair(
    pair: &AssemblyPair,
    window: &WindowParams,
    config: &PairwiseConfig,
) -> Result<PairOutcome> {
    let label = pair.label();
    let mut alignments = culled_alignments(pair, config)?;
    if alignments.is_empty() {
        return Ok(no_result(&label, "no alignments found"));
    }

    let n50 = n50_alignment_length(&alignments);
    let aligned_fraction = query_coverage(&alignments, pair.contigs_a.total_length());
    info!(
        "{label}: {} alignments, N50 {} bp, {:.2}% of {} aligned",
        alignments.len(),
        n50,
        100.0 * aligned_fraction,
        pair.name_a
    );

    for a in alignments.iter_mut() {
        a.set_up_sliding_windows(window);
    }
    let distribution = match build_distribution(&alignments, window.size) {
        Some(d) => d,
        None => return Ok(no_result(&label, "no distances sampled")),
    };

    let smoothed = smooth_distribution(&distribution.masses, config.smoothing_factor);
    let peaks = get_peak_distance(&smoothed, window.size, config.secondary_ratio);
    if peaks.results.is_empty() {
        return Ok(no_result(&label, "no peaks found in distance distribution"));
    }

    let mut results = Vec::with_capacity(peaks.results.len());
    for peak in &peaks.results {
        let (summary, fractions, regions) = paint_for_peak(pair, &alignments, peak, window)
            .with_context(|| format!("{label}: failed to paint {} result", peak.role))?;
        results.push(PairResult {
            name_a: pair.name_a.clone(),
            name_b: pair.name_b.clone(),
            role: peak.role,
            peak_mass: peak.mass,
            alignment_count: alignments.len(),
            n50_alignment_length: n50,
            aligned_fraction,
            window: *window,
            window_count: distribution.window_count,
            mean_distance: distribution.mean_distance,
            median_distance: distribution.median_distance,
            mass_peaks: peaks.mass_peaks.clone(),
            peak_distance: peak.peak_distance,
            thresholds: peak.thresholds,
            alignments: summary,
            fractions_a: fractions.0,
            fractions_b: fractions.1,
            regions_a: regions.0,
            regions_b: regions.1,
        });
    }
    Ok(PairOutcome::Results(results))
}

type PaintOutput = (
    AlignmentPaintSummary,
    (PaintFractions, PaintFractions),
    (PaintRegions, PaintRegions),
);

/// Each peak paints its own copy of the alignments
fn paint_for_peak(
    pair: &AssemblyPair,
    alignments: &[Alignment],
    peak: &PeakResult,
    window: &WindowParams,
) -> Result<PaintOutput> {
    let mut painted = alignments.to_vec();
    let summary = paint_alignments(&mut painted, &peak.thresholds, window.size);
    let (painted_a, painted_b) = paint_assemblies(&pair.contigs_a, &pair.contigs_b, &painted)?;
    Ok((
        summary,
        (painted_a.fractions(), painted_b.fractions()),
        (painted_a.regions(), painted_b.regions()),
    ))
}

fn no_result(label: &str, note: &str) -> PairOutcome {
    info!("{label}: {note}");
    PairOutcome::NoResult {
        note: note.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paf::parse_paf_line;

    fn pair(lines: &[&str]) -> AssemblyPair {
        let records: Vec<PafRecord> = lines.iter().map(|l| parse_paf_line(l).unwrap()).collect();
        AssemblyPair {
            name_a: "A".to_string(),
            name_b: "B".to_string(),
            contigs_a: ContigIndex::from_query_records(&records).unwrap(),
            contigs_b: ContigIndex::from_target_records(&records).unwrap(),
            records,
        }
    }

    fn results(outcome: PairOutcome) -> Vec<PairResult> {
        match outcome {
            PairOutcome::Results(r) => r,
            PairOutcome::NoResult { note } => panic!("expected results, got '{note}'"),
        }
    }

    #[test]
    fn test_header_matches_line_width() {
        let p = pair(&["a\t1000\t0\t1000\t+\tb\t1000\t0\t1000\t1000\t1000\t60\tcg:Z:1000="]);
        let window = WindowParams { size: 100, step: 10 };
        let r = results(process_pair(&p, &window, &PairwiseConfig::default()).unwrap());
        let header = table_header();
        let line = r[0].to_table_line();
        assert_eq!(header.split('\t').count(), line.split('\t').count());
        assert!(header.starts_with("assembly_a\tassembly_b\tresult_level"));
    }

    #[test]
    fn test_identical_pair() {
        let p = pair(&["a\t1000\t0\t1000\t+\tb\t1000\t0\t1000\t1000\t1000\t60\tcg:Z:1000="]);
        let window = WindowParams { size: 100, step: 10 };
        let r = results(process_pair(&p, &window, &PairwiseConfig::default()).unwrap());
        assert_eq!(r.len(), 1);
        let r = &r[0];
        assert_eq!(r.role, PeakRole::Primary);
        assert_eq!(r.alignment_count, 1);
        assert_eq!(r.n50_alignment_length, 1000);
        assert!((r.aligned_fraction - 1.0).abs() < 1e-9);
        assert!((r.peak_mass - 1.0).abs() < 1e-6);
        assert_eq!(r.alignments.r_over_m, None);
        assert_eq!(r.regions_a.vertical, "a:0-1000");
        assert_eq!(r.regions_b.vertical, "b:0-1000");
        assert_eq!(r.regions_a.unaligned, "");

        let fields: Vec<String> = r.to_table_line().split('\t').map(String::from).collect();
        assert_eq!(fields[2], "primary");
        assert_eq!(fields[19], "undef");
        assert_eq!(fields[20], "100.00%");
    }

    #[test]
    fn test_r_over_m_column() {
        assert_eq!(format_r_over_m(None), "undef");
        assert_eq!(format_r_over_m(Some(f64::INFINITY)), "inf");
        assert_eq!(format_r_over_m(Some(1.5)), "1.500000000");
    }

    #[test]
    fn test_no_alignments() {
        let p = pair(&[]);
        let window = WindowParams { size: 100, step: 10 };
        match process_pair(&p, &window, &PairwiseConfig::default()).unwrap() {
            PairOutcome::NoResult { note } => assert_eq!(note, "no alignments found"),
            PairOutcome::Results(_) => panic!("expected no result"),
        }
    }

    #[test]
    fn test_alignments_shorter_than_window() {
        let p = pair(&["a\t1000\t0\t50\t+\tb\t1000\t0\t50\t50\t50\t60\tcg:Z:50="]);
        let window = WindowParams { size: 100, step: 10 };
        match process_pair(&p, &window, &PairwiseConfig::default()).unwrap() {
            PairOutcome::NoResult { note } => assert_eq!(note, "no distances sampled"),
            PairOutcome::Results(_) => panic!("expected no result"),
        }
    }

    #[test]
    fn test_missing_cigar_is_an_error() {
        let p = pair(&["a\t1000\t0\t1000\t+\tb\t1000\t0\t1000\t1000\t1000\t60"]);
        let window = WindowParams { size: 100, step: 10 };
        assert!(process_pair(&p, &window, &PairwiseConfig::default()).is_err());
    }

    #[test]
    fn test_sample_lengths_follow_culling() {
        let p = pair(&[
            "a\t1000\t0\t500\t+\tb\t1000\t0\t500\t500\t500\t60\tcg:Z:500=",
            "a\t1000\t0\t400\t+\tb\t1000\t0\t400\t400\t400\t60\tcg:Z:400=",
            "a\t1000\t600\t900\t+\tb\t1000\t600\t900\t300\t300\t60\tcg:Z:300=",
        ]);
        let mut lengths = sample_alignment_lengths(&p, &PairwiseConfig::default()).unwrap();
        lengths.sort_unstable();
        assert_eq!(lengths, vec![300, 500]);
    }
}
