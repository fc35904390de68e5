use crate::cigar::IndelMode;

/// Per-pair analysis settings, shared by every pair in a run
#[derive(Debug, Clone)]
pub struct PairwiseConfig {
    pub window_count: usize,    // --window-count: target number of sliding windows
    pub ignore_indels: bool,    // --ignore-indels: remove rather than compress indels
    pub smoothing_factor: f64,  // --smoothing-factor: kernel width exponent
    pub secondary_ratio: f64,   // --secondary: basin mass fraction for secondary peaks
    pub allowed_overlap: i64,   // --allowed-overlap: query/target overlap before culling
}

impl Default for PairwiseConfig {
    fn default() -> Self {
        PairwiseConfig {
            window_count: 50_000,
            ignore_indels: false,
            smoothing_factor: 0.8,
            secondary_ratio: 0.7,
            allowed_overlap: 100,
        }
    }
}

impl PairwiseConfig {
    pub fn indel_mode(&self) -> IndelMode {
        IndelMode::from_ignore_indels(self.ignore_indels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PairwiseConfig::default();
        assert_eq!(config.window_count, 50_000);
        assert_eq!(config.allowed_overlap, 100);
        assert_eq!(config.indel_mode(), IndelMode::Compress);

        let config = PairwiseConfig {
            ignore_indels: true,
            ..PairwiseConfig::default()
        };
        assert_eq!(config.indel_mode(), IndelMode::Remove);
    }
}
