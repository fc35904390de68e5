/// Window size and step selection
///
/// Larger windows give finer distance resolution (more possible difference
/// counts per window), smaller windows give more samples. The search picks
/// the largest window that still yields the requested number of samples.
use log::debug;

/// Largest step tried; window size is always `step * WINDOW_SIZE_FACTOR`
pub const MAX_WINDOW_STEP: usize = 1000;
pub const WINDOW_SIZE_FACTOR: usize = 100;

/// Run-wide sliding window parameters, shared read-only by every pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowParams {
    pub size: usize,
    pub step: usize,
}

impl WindowParams {
    pub fn from_step(step: usize) -> Self {
        WindowParams {
            size: step * WINDOW_SIZE_FACTOR,
            step,
        }
    }

    /// Choose parameters from a sample of pairs: each pair picks its own
    /// step and the median step is used for the whole run.
    pub fn from_sample(pair_lengths: &[Vec<usize>], target_window_count: usize) -> Self {
        let mut steps: Vec<usize> = pair_lengths
            .iter()
            .map(|lengths| choose_window_size_and_step(lengths, target_window_count).step)
            .collect();
        if steps.is_empty() {
            return WindowParams::from_step(1);
        }
        steps.sort_unstable();
        let step = steps[steps.len() / 2];
        debug!(
            "window steps from {} sampled pairs: min {}, median {}, max {}",
            steps.len(),
            steps[0],
            step,
            steps[steps.len() - 1]
        );
        WindowParams::from_step(step)
    }
}

/// Number of windows that fit in a sequence.
///
/// For example, full_length=50, window_size=10, window_step=8 gives 5:
/// ```text
/// ----------      ----------      ----------
///         ----------      ----------
/// XXXXXXXXXXXXXXXXXXXXXXXXXXXXXXXXXXXXXXXXXXXXXXXXXX
/// ```
pub fn window_count(full_length: usize, window_size: usize, window_step: usize) -> usize {
    if full_length < window_size {
        return 0;
    }
    1 + (full_length - window_size) / window_step
}

/// Number of bases covered by `window_count` windows (which must be > 0).
///
/// window_size=10, window_step=8, window_count=5 covers 42 bases.
pub fn window_coverage(window_size: usize, window_step: usize, window_count: usize) -> usize {
    window_size + (window_count - 1) * window_step
}

/// Total sliding windows across a set of simplified CIGAR lengths
pub fn sliding_window_count(lengths: &[usize], window_size: usize, window_step: usize) -> usize {
    lengths
        .iter()
        .map(|&len| window_count(len, window_size, window_step))
        .sum()
}

/// Walk the step down from 1000 and return the first window (size = step *
/// 100) giving more than `target_window_count` windows. Falls back to a
/// step of 1 if none does.
pub fn choose_window_size_and_step(lengths: &[usize], target_window_count: usize) -> WindowParams {
    let mut step = MAX_WINDOW_STEP;
    while step > 1 {
        let params = WindowParams::from_step(step);
        if sliding_window_count(lengths, params.size, params.step) > target_window_count {
            return params;
        }
        step -= 1;
    }
    WindowParams::from_step(step)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_count() {
        assert_eq!(window_count(50, 10, 8), 5);
        assert_eq!(window_count(10, 10, 8), 1);
        assert_eq!(window_count(9, 10, 8), 0);
        assert_eq!(window_count(0, 10, 8), 0);
        assert_eq!(window_count(100, 10, 10), 10);
    }

    #[test]
    fn test_window_coverage() {
        assert_eq!(window_coverage(10, 8, 5), 42);
        assert_eq!(window_coverage(10, 8, 1), 10);
        assert_eq!(window_coverage(5, 5, 9), 45);
    }

    #[test]
    fn test_sliding_window_count() {
        let lengths = vec![1000, 100, 10];
        assert_eq!(sliding_window_count(&lengths, 1000, 100), 1);
        assert_eq!(sliding_window_count(&lengths, 500, 100), 6);
        assert_eq!(sliding_window_count(&lengths, 100, 100), 11);
        assert_eq!(sliding_window_count(&lengths, 100, 10), 92);
        assert_eq!(sliding_window_count(&lengths, 10, 10), 111);
    }

    #[test]
    fn test_choose_window_size_and_step() {
        // 500 kbp: step 10 gives 49901 windows, step 9 gives 55456
        let params = choose_window_size_and_step(&[500_000], 50_000);
        assert_eq!(params, WindowParams { size: 900, step: 9 });
        assert!(sliding_window_count(&[500_000], params.size, params.step) > 50_000);

        // A long alignment easily reaches a small target with the largest step
        let params = choose_window_size_and_step(&[10_000_000], 10);
        assert_eq!(params, WindowParams { size: 100_000, step: 1000 });
    }

    #[test]
    fn test_choose_window_falls_back_to_smallest() {
        assert_eq!(
            choose_window_size_and_step(&[150], 1_000_000),
            WindowParams { size: 100, step: 1 }
        );
        assert_eq!(
            choose_window_size_and_step(&[], 1),
            WindowParams { size: 100, step: 1 }
        );
    }

    #[test]
    fn test_from_sample_uses_median_step() {
        let sample = vec![vec![500_000], vec![10_000_000], vec![150]];
        let params = WindowParams::from_sample(&sample, 50_000);
        // Per-pair steps are 9, 199 and 1, so the median is 9
        assert_eq!(params, WindowParams { size: 900, step: 9 });
        assert_eq!(WindowParams::from_sample(&[], 50_000), WindowParams::from_step(1));
    }
}
