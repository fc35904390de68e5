/// Property-based tests for window layout, classification and painting
///
/// Uses proptest to check invariants that must hold for any input.
use proptest::prelude::*;
use vertipaint::alignment::{remove_ambiguous, Alignment};
use vertipaint::cigar::{cigar_to_contig_pos, IndelMode, Strand};
use vertipaint::distribution::{masses_from_counts, smooth_distribution};
use vertipaint::paf::parse_paf_line;
use vertipaint::paint::Paint;
use vertipaint::peaks::{find_peaks, Threshold, Thresholds};
use vertipaint::ranges::RangeSet;
use vertipaint::window::WindowParams;

fn paint_strategy() -> impl Strategy<Value = Paint> {
    prop_oneof![
        Just(Paint::Vertical),
        Just(Paint::Horizontal),
        Just(Paint::Ambiguous),
    ]
}

/// Property: resolving ambiguous calls keeps every definite call and leaves
/// no ambiguous ones behind
#[test]
fn prop_remove_ambiguous_resolves_everything() {
    proptest!(|(calls in prop::collection::vec(paint_strategy(), 0..60))| {
        let resolved = remove_ambiguous(&calls);
        prop_assert_eq!(resolved.len(), calls.len());
        for (before, after) in calls.iter().zip(&resolved) {
            prop_assert!(*after != Paint::Ambiguous);
            if *before != Paint::Ambiguous {
                prop_assert_eq!(before, after);
            }
        }
    });
}

/// Property: painting windows tile the alignment exactly, and every sliding
/// window lies inside it
#[test]
fn prop_painting_windows_tile_alignment() {
    proptest!(|(
        length in 1usize..5_000,
        step in 1usize..20,
    )| {
        let line = format!(
            "q\t{length}\t0\t{length}\t+\tt\t{length}\t0\t{length}\t{length}\t{length}\t60\tcg:Z:{length}="
        );
        let mut a = Alignment::from_paf(&parse_paf_line(&line).unwrap(), IndelMode::Compress).unwrap();
        let params = WindowParams::from_step(step);
        a.set_up_sliding_windows(&params);

        prop_assert_eq!(a.windows.len(), a.windows_no_overlap.len());
        prop_assert_eq!(a.windows.len(), a.window_differences.len());
        if length < params.size {
            prop_assert!(a.windows.is_empty());
        } else {
            prop_assert_eq!(a.windows_no_overlap[0].0, 0);
            prop_assert_eq!(a.windows_no_overlap[a.windows_no_overlap.len() - 1].1, length);
            for pair in a.windows_no_overlap.windows(2) {
                prop_assert_eq!(pair[0].1, pair[1].0);
            }
            for &(s, e) in &a.windows {
                prop_assert_eq!(e - s, params.size);
                prop_assert!(e <= length);
            }
        }
    });
}

/// Property: a forward map walks up from the start and a reverse map walks
/// down from the end, over the same contig positions
#[test]
fn prop_reverse_map_mirrors_forward() {
    proptest!(|(
        start in 0u64..10_000,
        matches in 1u64..500,
    )| {
        let cigar = vec![b'='; matches as usize];
        let end = start + matches;
        let forward = cigar_to_contig_pos(&cigar, start, end, Strand::Forward).unwrap();
        let reverse = cigar_to_contig_pos(&cigar, start, end, Strand::Reverse).unwrap();
        prop_assert_eq!(forward[0], start);
        prop_assert_eq!(reverse[0], end - 1);
        let mut mirrored = reverse.clone();
        mirrored.reverse();
        prop_assert_eq!(forward, mirrored);
    });
}

/// Property: smoothing keeps a distribution normalised
#[test]
fn prop_smoothing_preserves_total_mass() {
    proptest!(|(
        counts in prop::collection::vec(0usize..200, 1..500),
        factor in 0.0f64..1.0,
    )| {
        let masses = masses_from_counts(&counts);
        prop_assert!((masses.iter().sum::<f64>() - 1.0).abs() < 1e-9);
        let smoothed = smooth_distribution(&masses, factor);
        prop_assert_eq!(smoothed.len(), masses.len());
        prop_assert!((smoothed.iter().sum::<f64>() - 1.0).abs() < 1e-9);
        prop_assert!(smoothed.iter().all(|&m| m >= 0.0));
    });
}

/// Property: merged ranges are sorted, disjoint and cover no more than the input
#[test]
fn prop_range_merge_is_disjoint() {
    proptest!(|(spans in prop::collection::vec((0u64..1000, 0u64..100), 0..50))| {
        let mut set = RangeSet::new();
        for &(start, len) in &spans {
            set.add(start, start + len);
        }
        let merged = set.merged();
        for pair in merged.windows(2) {
            prop_assert!(pair[0].1 < pair[1].0);
        }
        let raw: u64 = spans.iter().map(|(_, len)| len).sum();
        prop_assert!(set.total_length() <= raw);
        for &(start, len) in spans.iter().filter(|(_, len)| *len > 0) {
            prop_assert!(merged.iter().any(|&(s, e)| s <= start && start + len <= e));
        }
    });
}

/// Property: thresholds depend only on the distribution and the peak, and
/// bounded ones are ordered around it
#[test]
fn prop_thresholds_idempotent_and_ordered() {
    proptest!(|(counts in prop::collection::vec(0usize..60, 1..300))| {
        let masses = smooth_distribution(&masses_from_counts(&counts), 0.8);
        for peak in find_peaks(&masses) {
            let first = Thresholds::from_peak(&masses, peak);
            let second = Thresholds::from_peak(&masses, peak);
            prop_assert_eq!(first, second);

            let p = peak as f64;
            if let (Threshold::Bounded(very_low), Threshold::Bounded(low)) = (first.very_low, first.low) {
                prop_assert!(very_low <= low && low <= p);
            }
            if let (Threshold::Bounded(high), Threshold::Bounded(very_high)) = (first.high, first.very_high) {
                prop_assert!(p <= high && high <= very_high);
            }
        }
    });
}
