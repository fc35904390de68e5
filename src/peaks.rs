//! Peak detection and classification thresholds
//!
//! Peaks of the smoothed distance distribution are candidate "clonal"
//! distances. The most massive peak gives the primary result; other peaks
//! with comparable basin mass give secondary results. Each kept peak yields
//! a set of thresholds that bound the vertical zone around it.

use log::debug;
use ordered_float::OrderedFloat;
use std::fmt;

/// One side of a threshold set: a position in difference-count space, or no
/// bound at all when the distribution never turns back up on that side.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Threshold {
    Bounded(f64),
    Unbounded,
}

impl Threshold {
    /// Value used for comparisons, with `Unbounded` mapped to the given infinity
    pub fn or_infinite(self, infinity: f64) -> f64 {
        match self {
            Threshold::Bounded(v) => v,
            Threshold::Unbounded => infinity,
        }
    }
}

impl fmt::Display for Threshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Threshold::Bounded(v) => write!(f, "{v}"),
            Threshold::Unbounded => write!(f, "none"),
        }
    }
}

/// `very_low <= low <= peak <= high <= very_high`, in difference counts
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub very_low: Threshold,
    pub low: Threshold,
    pub high: Threshold,
    pub very_high: Threshold,
}

impl Thresholds {
    pub fn new(very_low: Option<f64>, low: Option<f64>, high: Option<f64>, very_high: Option<f64>) -> Self {
        let t = |v: Option<f64>| v.map_or(Threshold::Unbounded, Threshold::Bounded);
        Thresholds {
            very_low: t(very_low),
            low: t(low),
            high: t(high),
            very_high: t(very_high),
        }
    }

    /// Thresholds derived from the local geometry around `peak`
    pub fn from_peak(masses: &[f64], peak: usize) -> Self {
        let (low, very_low) = low_thresholds(masses, peak);
        let (high, very_high) = high_thresholds(masses, peak);
        Thresholds::new(very_low, low, high, very_high)
    }
}

impl fmt::Display for Thresholds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "very_low={}, low={}, high={}, very_high={}",
            self.very_low, self.low, self.high, self.very_high
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeakRole {
    Primary,
    Secondary,
}

impl PeakRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            PeakRole::Primary => "primary",
            PeakRole::Secondary => "secondary",
        }
    }
}

impl fmt::Display for PeakRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A retained peak with everything needed to paint alignments for it
#[derive(Debug, Clone)]
pub struct PeakResult {
    pub index: usize,
    pub mass: f64,
    pub role: PeakRole,
    pub peak_distance: f64,
    pub thresholds: Thresholds,
}

/// All peaks found in a distribution plus the retained ones
#[derive(Debug, Clone)]
pub struct PeakSummary {
    /// Every peak as a per-base distance, 9 decimals, comma-joined, index order
    pub mass_peaks: String,
    /// Retained peaks, most massive first
    pub results: Vec<PeakResult>,
}

/// Indices of all local maxima.
///
/// A flat top is reported once, at the floor of its midpoint, and only if
/// the values fall away on its right (or it reaches the end).
pub fn find_peaks(masses: &[f64]) -> Vec<usize> {
    let n = masses.len();
    let mut peaks = Vec::new();
    for (i, &m) in masses.iter().enumerate() {
        if i > 0 && m <= masses[i - 1] {
            continue;
        }
        if i == n - 1 || m > masses[i + 1] {
            peaks.push(i);
            continue;
        }
        if m == masses[i + 1] {
            let mut j = i;
            while j < n && masses[j] == m {
                j += 1;
            }
            if j == n || m > masses[j] {
                peaks.push((i + j - 1) / 2);
            }
        }
    }
    peaks
}

/// Mass of a peak's basin: the peak plus everything reachable by walking
/// outward while the masses do not rise.
pub fn peak_total_mass(masses: &[f64], peak: usize) -> f64 {
    let mut total = masses[peak];

    let mut previous = masses[peak];
    for &m in masses[..peak].iter().rev() {
        if m > previous {
            break;
        }
        total += m;
        previous = m;
    }

    previous = masses[peak];
    for &m in &masses[peak + 1..] {
        if m > previous {
            break;
        }
        total += m;
        previous = m;
    }

    total
}

/// Sub-index offset of a peak from its neighbours' masses, in [-0.5, 0.5].
/// Zero when the three masses are flat.
pub fn interpolate(low: f64, peak: f64, high: f64) -> f64 {
    let denominator = 2.0 * (peak - low.min(peak).min(high));
    if denominator == 0.0 {
        return 0.0;
    }
    (high - low) / denominator
}

/// Peak position refined by its neighbours, as a per-base distance
pub fn interpolated_peak_distance(masses: &[f64], peak: usize, window_size: usize) -> f64 {
    let below = if peak > 0 { masses[peak - 1] } else { 0.0 };
    let above = masses.get(peak + 1).copied().unwrap_or(0.0);
    (peak as f64 + interpolate(below, masses[peak], above)) / window_size as f64
}

/// Find the peaks of a smoothed distribution and keep the primary one plus
/// any secondary peaks with at least `secondary_ratio` of its basin mass.
pub fn get_peak_distance(masses: &[f64], window_size: usize, secondary_ratio: f64) -> PeakSummary {
    let peaks_with_mass: Vec<(f64, usize)> = find_peaks(masses)
        .into_iter()
        .map(|p| (peak_total_mass(masses, p), p))
        .collect();

    // Largest mass wins; equal masses go to the higher index
    let primary = peaks_with_mass
        .iter()
        .max_by_key(|(mass, peak)| (OrderedFloat(*mass), *peak))
        .copied();

    let mass_peaks = peaks_with_mass
        .iter()
        .map(|(_, p)| format!("{:.9}", *p as f64 / window_size as f64))
        .collect::<Vec<_>>()
        .join(",");

    let (largest_mass, primary_peak) = match primary {
        Some(p) => p,
        None => {
            return PeakSummary {
                mass_peaks,
                results: Vec::new(),
            }
        }
    };
    let secondary_threshold = secondary_ratio * largest_mass;

    let mut results: Vec<PeakResult> = Vec::new();
    for &(mass, peak) in &peaks_with_mass {
        let role = if peak == primary_peak {
            PeakRole::Primary
        } else if mass >= secondary_threshold {
            PeakRole::Secondary
        } else {
            debug!("  peak {} ({:.1}%) dropped", peak, 100.0 * mass);
            continue;
        };
        let result = PeakResult {
            index: peak,
            mass,
            role,
            peak_distance: interpolated_peak_distance(masses, peak, window_size),
            thresholds: Thresholds::from_peak(masses, peak),
        };
        debug!(
            "  peak {} ({:.1}%) {}: distance {:.9}, thresholds {}",
            peak,
            100.0 * mass,
            role,
            result.peak_distance,
            result.thresholds
        );
        results.push(result);
    }

    // Largest mass first; on a tie the primary leads, so a pair's first row
    // is always its primary result
    results.sort_by_key(|r| {
        (
            std::cmp::Reverse(OrderedFloat(r.mass)),
            r.role != PeakRole::Primary,
        )
    });

    PeakSummary { mass_peaks, results }
}

/// Walk right while masses do not rise. `None` if the walk hits the end.
pub fn find_local_minimum_to_right(masses: &[f64], mut i: usize) -> Option<usize> {
    let last = masses.len().checked_sub(1)?;
    if i >= last {
        return None;
    }
    while masses[i + 1] <= masses[i] {
        i += 1;
        if i == last {
            return None;
        }
    }
    Some(i)
}

/// Walk left while masses do not rise. `None` if the walk hits index 0.
pub fn find_local_minimum_to_left(masses: &[f64], mut i: usize) -> Option<usize> {
    if i == 0 {
        return None;
    }
    while masses[i - 1] <= masses[i] {
        i -= 1;
        if i == 0 {
            return None;
        }
    }
    Some(i)
}

/// Walk right while masses strictly rise. `None` if the walk hits the end.
pub fn find_local_maximum_to_right(masses: &[f64], mut i: usize) -> Option<usize> {
    let last = masses.len().checked_sub(1)?;
    if i >= last {
        return None;
    }
    while masses[i + 1] > masses[i] {
        i += 1;
        if i == last {
            return None;
        }
    }
    Some(i)
}

/// Walk left while masses strictly rise. `None` if the walk hits index 0.
pub fn find_local_maximum_to_left(masses: &[f64], mut i: usize) -> Option<usize> {
    if i == 0 {
        return None;
    }
    while masses[i - 1] > masses[i] {
        i -= 1;
        if i == 0 {
            return None;
        }
    }
    Some(i)
}

/// `(low, very_low)` for a peak, both `None` without a minimum on the left
fn low_thresholds(masses: &[f64], peak: usize) -> (Option<f64>, Option<f64>) {
    let minimum = match find_local_minimum_to_left(masses, peak) {
        Some(m) => m,
        None => return (None, None),
    };
    let low_peak = find_local_maximum_to_left(masses, minimum).unwrap_or(0);
    let low = (peak + minimum) as f64 / 2.0;
    let very_low = (minimum + low_peak) as f64 / 2.0;
    (Some(low), Some(very_low))
}

/// `(high, very_high)` for a peak, both `None` without a minimum on the right
fn high_thresholds(masses: &[f64], peak: usize) -> (Option<f64>, Option<f64>) {
    let minimum = match find_local_minimum_to_right(masses, peak) {
        Some(m) => m,
        None => return (None, None),
    };
    let high_peak = find_local_maximum_to_right(masses, minimum).unwrap_or(masses.len() - 1);
    let high = (peak + minimum) as f64 / 2.0;
    let very_high = (minimum + high_peak) as f64 / 2.0;
    (Some(high), Some(very_high))
}
