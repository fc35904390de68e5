//! Windowed distance distributions
//!
//! Every sliding window of every alignment contributes its difference count
//! to a histogram, which is normalised into a probability mass function
//! indexed by difference count. Distances are reported as differences per
//! base, i.e. a statistic of the PMF divided by the window size.

use log::debug;

use crate::alignment::Alignment;

/// Summary of the windowed distance distribution for one assembly pair
#[derive(Debug, Clone)]
pub struct Distribution {
    pub masses: Vec<f64>,
    pub window_count: usize,
    pub mean_distance: f64,
    pub median_distance: f64,
}

/// Which statistic of a PMF to report as a distance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistanceMethod {
    Mean,
    Median,
    Mode,
}

/// Normalise a list of per-window difference counts into a PMF.
///
/// Index `i` holds the fraction of windows with exactly `i` differences. An
/// empty input gives an empty PMF.
pub fn masses_from_counts(counts: &[usize]) -> Vec<f64> {
    let max = match counts.iter().max() {
        Some(&m) => m,
        None => return Vec::new(),
    };
    let mut histogram = vec![0usize; max + 1];
    for &c in counts {
        histogram[c] += 1;
    }
    let total = counts.len() as f64;
    histogram.iter().map(|&n| n as f64 / total).collect()
}

/// Build the distance distribution from alignments whose sliding windows are
/// already set up. Returns `None` when no windows were sampled.
pub fn build_distribution(alignments: &[Alignment], window_size: usize) -> Option<Distribution> {
    let counts: Vec<usize> = alignments
        .iter()
        .flat_map(|a| a.window_differences.iter().copied())
        .collect();
    if counts.is_empty() {
        return None;
    }

    let masses = masses_from_counts(&counts);
    let mean_distance = get_distance(&masses, window_size, DistanceMethod::Mean);
    let median_distance = get_distance(&masses, window_size, DistanceMethod::Median);

    debug!(
        "sampled {} windows of {} bp: mean distance {:.9}, median distance {:.9}",
        counts.len(),
        window_size,
        mean_distance,
        median_distance
    );

    Some(Distribution {
        masses,
        window_count: counts.len(),
        mean_distance,
        median_distance,
    })
}

/// Separate PMFs for vertical and horizontal windows of painted alignments.
///
/// Both arrays share one length and are normalised by the total number of
/// classified windows, so together they sum to 1.
pub fn vertical_horizontal_distributions(alignments: &[Alignment]) -> (Vec<f64>, Vec<f64>) {
    let mut vertical = Vec::new();
    let mut horizontal = Vec::new();
    for a in alignments {
        vertical.extend(a.vertical_distances());
        horizontal.extend(a.horizontal_distances());
    }

    let max_distance = vertical
        .iter()
        .chain(horizontal.iter())
        .copied()
        .max()
        .unwrap_or(0);
    let total = (vertical.len() + horizontal.len()) as f64;

    let to_masses = |counts: &[usize]| -> Vec<f64> {
        let mut histogram = vec![0usize; max_distance + 1];
        for &c in counts {
            histogram[c] += 1;
        }
        histogram
            .iter()
            .map(|&n| if n == 0 { 0.0 } else { n as f64 / total })
            .collect()
    };

    (to_masses(&vertical), to_masses(&horizontal))
}

pub fn get_distance(masses: &[f64], window_size: usize, method: DistanceMethod) -> f64 {
    let d = match method {
        DistanceMethod::Mean => get_mean(masses),
        DistanceMethod::Median => get_interpolated_median(masses),
        DistanceMethod::Mode => get_mode(masses),
    };
    d / window_size as f64
}

/// Mass-weighted mean index. Zero when there is no mass at all.
pub fn get_mean(masses: &[f64]) -> f64 {
    let total: f64 = masses.iter().sum();
    if total == 0.0 {
        return 0.0;
    }
    masses
        .iter()
        .enumerate()
        .map(|(i, m)| i as f64 * m)
        .sum::<f64>()
        / total
}

/// First index at which the cumulative mass reaches half the total
pub fn get_median(masses: &[f64]) -> usize {
    let half_total: f64 = masses.iter().sum::<f64>() / 2.0;
    let mut cumulative = 0.0;
    for (i, m) in masses.iter().enumerate() {
        cumulative += m;
        if cumulative >= half_total {
            return i;
        }
    }
    0
}

/// Median interpolated within the median bin:
/// `median + (above - below) / (2 * equal)`
pub fn get_interpolated_median(masses: &[f64]) -> f64 {
    let median = get_median(masses);
    let (mut below, mut equal, mut above) = (0.0, 0.0, 0.0);
    for (i, &m) in masses.iter().enumerate() {
        match i.cmp(&median) {
            std::cmp::Ordering::Less => below += m,
            std::cmp::Ordering::Equal => equal += m,
            std::cmp::Ordering::Greater => above += m,
        }
    }
    if equal == 0.0 {
        median as f64
    } else {
        median as f64 + (above - below) / (2.0 * equal)
    }
}

/// Index with the highest mass; ties give the mean of the tied indices.
pub fn get_mode(masses: &[f64]) -> f64 {
    let max_mass = masses.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let tied: Vec<usize> = masses
        .iter()
        .enumerate()
        .filter(|(_, &m)| m == max_mass)
        .map(|(i, _)| i)
        .collect();
    if tied.is_empty() {
        return 0.0;
    }
    tied.iter().sum::<usize>() as f64 / tied.len() as f64
}

/// Smooth a PMF with a variable-width Epanechnikov kernel.
///
/// The kernel half-width at index `i` is `i^smoothing_factor`, so index 0 is
/// left untouched and the tail is smoothed hardest. The result is
/// renormalised to sum to 1.
pub fn smooth_distribution(masses: &[f64], smoothing_factor: f64) -> Vec<f64> {
    let smoothed: Vec<f64> = (0..masses.len())
        .map(|i| {
            let kernel_width = (i as f64).powf(smoothing_factor);
            get_smoothed_mass(masses, i, kernel_width)
        })
        .collect();

    let total: f64 = smoothed.iter().sum();
    if total == 0.0 {
        return smoothed;
    }
    smoothed.iter().map(|s| s / total).collect()
}

/// Kernel-weighted average around index `i`; positions past the end count
/// as zero mass.
pub fn get_smoothed_mass(masses: &[f64], i: usize, kernel_width: f64) -> f64 {
    let centre = i as f64;
    let low = (centre - kernel_width).floor().max(0.0) as usize;
    let high = (centre + kernel_width).ceil() as usize;

    let mut weighted_sum = 0.0;
    let mut weight_total = 0.0;
    for j in low..=high {
        let weight = epanechnikov_weight(kernel_width, j as f64 - centre);
        weighted_sum += weight * masses.get(j).copied().unwrap_or(0.0);
        weight_total += weight;
    }
    if weight_total == 0.0 {
        return 0.0;
    }
    weighted_sum / weight_total
}

/// Relative (unnormalised) Epanechnikov kernel weight
pub fn epanechnikov_weight(kernel_width: f64, offset: f64) -> f64 {
    if kernel_width == 0.0 {
        return if offset == 0.0 { 1.0 } else { 0.0 };
    }
    (1.0 - (offset / kernel_width).powi(2)).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_masses_from_counts() {
        let masses = masses_from_counts(&[0, 1, 1, 3]);
        assert_eq!(masses, vec![0.25, 0.5, 0.0, 0.25]);
        assert!(masses_from_counts(&[]).is_empty());
        assert_eq!(masses_from_counts(&[0, 0]), vec![1.0]);
    }

    #[test]
    fn test_get_mean() {
        assert!(approx(get_mean(&[1.0, 0.0, 0.0, 0.0]), 0.0));
        assert!(approx(get_mean(&[0.0, 0.0, 0.0, 1.0]), 3.0));
        assert!(approx(get_mean(&[0.0, 0.5, 0.5, 0.0]), 1.5));
        assert!(approx(get_mean(&[0.25, 0.25, 0.25, 0.25]), 1.5));
        assert!(approx(get_mean(&[0.1, 0.2, 0.3, 0.4]), 2.0));
        assert!(approx(get_mean(&[0.4, 0.3, 0.2, 0.1]), 1.0));
    }

    #[test]
    fn test_get_median() {
        assert_eq!(get_median(&[1.0, 0.0, 0.0, 0.0]), 0);
        assert_eq!(get_median(&[0.0, 0.0, 0.0, 1.0]), 3);
        assert_eq!(get_median(&[0.6, 0.0, 0.0, 0.4]), 0);
        assert_eq!(get_median(&[0.4, 0.0, 0.0, 0.6]), 3);
        assert_eq!(get_median(&[0.1, 0.2, 0.3, 0.4]), 2);
        assert_eq!(get_median(&[0.4, 0.3, 0.2, 0.1]), 1);
        assert_eq!(get_median(&[]), 0);
    }

    #[test]
    fn test_get_interpolated_median() {
        assert!(approx(get_interpolated_median(&[0.0, 1.0, 0.0, 0.0]), 1.0));
        assert!(approx(get_interpolated_median(&[0.5, 0.5, 0.0, 0.0]), 0.5));
        assert!(approx(get_interpolated_median(&[0.0, 0.0, 0.5, 0.5]), 2.5));
        assert!(approx(get_interpolated_median(&[0.0, 0.0, 1.0, 0.0, 10.0, 9.0]), 4.4));
        assert!(approx(get_interpolated_median(&[0.0, 2.0, 1.0, 6.0, 10.0, 1.0]), 3.6));

        let a = get_interpolated_median(&[0.0, 0.999, 0.001, 0.0]);
        let b = get_interpolated_median(&[0.0, 0.501, 0.499, 0.0]);
        let c = get_interpolated_median(&[0.0, 0.499, 0.501, 0.0]);
        assert!(1.0 < a && a < b && b < c && c < 2.0);
    }

    #[test]
    fn test_get_mode() {
        assert!(approx(get_mode(&[0.0, 0.0, 1.0, 0.0]), 2.0));
        assert!(approx(get_mode(&[0.3, 0.4, 0.1, 0.2]), 1.0));
        assert!(approx(get_mode(&[0.5, 0.5, 0.0, 0.0]), 0.5));
        assert!(approx(get_mode(&[0.25, 0.25, 0.25, 0.25]), 1.5));
        assert!(approx(get_mode(&[0.26, 0.24, 0.26, 0.24]), 1.0));
        assert!(approx(get_mode(&[0.24, 0.26, 0.24, 0.26]), 2.0));
    }

    #[test]
    fn test_get_distance_divides_by_window_size() {
        let masses = [0.0, 0.0, 1.0];
        assert!(approx(get_distance(&masses, 100, DistanceMethod::Mean), 0.02));
        assert!(approx(get_distance(&masses, 100, DistanceMethod::Median), 0.02));
        assert!(approx(get_distance(&masses, 1000, DistanceMethod::Mode), 0.002));
    }

    #[test]
    fn test_epanechnikov_weight() {
        assert!(approx(epanechnikov_weight(0.0, 0.0), 1.0));
        assert!(approx(epanechnikov_weight(0.0, 0.5), 0.0));
        assert!(approx(epanechnikov_weight(0.0, -5.0), 0.0));
        assert!(approx(epanechnikov_weight(1.0, 0.5), 0.75));
        assert!(approx(epanechnikov_weight(1.0, -1.0), 0.0));
        assert!(approx(epanechnikov_weight(5.0, 2.5), 0.75));
        assert!(approx(epanechnikov_weight(5.0, -10.0), 0.0));
    }

    #[test]
    fn test_get_smoothed_mass_flat() {
        let masses = vec![0.1; 11];
        for (i, w) in [(0, 0.0), (0, 1.0), (0, 5.0), (3, 0.0), (3, 1.0), (3, 5.0)] {
            assert!(approx(get_smoothed_mass(&masses, i, w), 0.1));
        }
    }

    #[test]
    fn test_smoothing_reduces_roughness() {
        let masses = [
            0.0000, 0.0006, 0.0009, 0.0012, 0.0017, 0.0023, 0.0033, 0.0044, 0.0056, 0.0059,
            0.0084, 0.0110, 0.0127, 0.0170, 0.0194, 0.0241, 0.0298, 0.0257, 0.0386, 0.0378,
            0.0448, 0.0401, 0.0536, 0.0429, 0.0447, 0.0503, 0.0508, 0.0477, 0.0533, 0.0401,
            0.0481, 0.0360, 0.0341, 0.0280, 0.0224, 0.0199, 0.0186, 0.0166, 0.0145, 0.0092,
            0.0097, 0.0060, 0.0060, 0.0040, 0.0026, 0.0023, 0.0014, 0.0010, 0.0009, 0.0000,
        ];
        let roughness =
            |d: &[f64]| -> f64 { d.windows(2).map(|w| (w[1] - w[0]).abs()).sum() };

        let s1 = smooth_distribution(&masses, 0.1);
        let s3 = smooth_distribution(&masses, 0.3);
        let s5 = smooth_distribution(&masses, 0.5);
        assert!(roughness(&masses) > roughness(&s1));
        assert!(roughness(&s1) > roughness(&s3));
        assert!(roughness(&s3) > roughness(&s5));
        assert!(approx(s5.iter().sum::<f64>(), 1.0));

        assert!(smooth_distribution(&[], 0.5).is_empty());
    }
}
