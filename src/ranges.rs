/// Set of half-open integer ranges, merged on demand.
///
/// Overlapping and touching ranges collapse into one, so `[0,5)` and `[5,9)`
/// become `[0,9)`.
#[derive(Debug, Clone, Default)]
pub struct RangeSet {
    ranges: Vec<(u64, u64)>,
}

impl RangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `[start, end)`. Empty ranges are ignored.
    pub fn add(&mut self, start: u64, end: u64) {
        if start < end {
            self.ranges.push((start, end));
        }
    }

    /// Sorted, non-overlapping, non-touching ranges
    pub fn merged(&self) -> Vec<(u64, u64)> {
        let mut sorted = self.ranges.clone();
        sorted.sort_unstable();

        let mut merged: Vec<(u64, u64)> = Vec::with_capacity(sorted.len());
        for (start, end) in sorted {
            match merged.last_mut() {
                Some(current) if start <= current.1 => current.1 = current.1.max(end),
                _ => merged.push((start, end)),
            }
        }
        merged
    }

    /// Number of positions covered by at least one range
    pub fn total_length(&self) -> u64 {
        self.merged().iter().map(|(s, e)| e - s).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }
}
