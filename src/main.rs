use anyhow::{bail, Context, Result};
use clap::Parser;
use log::{error, info, warn};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use std::fs::File;
use std::io::{self, BufWriter, Write};

use vertipaint::config::PairwiseConfig;
use vertipaint::manifest::read_manifest;
use vertipaint::pairwise::{
    process_pair, sample_alignment_lengths, table_header, AssemblyPair, PairOutcome,
};
use vertipaint::window::WindowParams;

/// Parse a number that may have metric suffix (k/K=1000, m/M=1e6)
fn parse_metric_number(s: &str) -> Result<usize, String> {
    if s.is_empty() {
        return Err("Empty string".to_string());
    }

    let (num_part, multiplier) = match s.chars().last() {
        Some('k') | Some('K') => (&s[..s.len() - 1], 1000.0),
        Some('m') | Some('M') => (&s[..s.len() - 1], 1_000_000.0),
        Some(c) if c.is_ascii_alphabetic() => {
            return Err(format!("Unknown suffix '{c}'. Use k/K (1000) or m/M (1e6)"))
        }
        _ => (s, 1.0),
    };

    let base: f64 = num_part
        .parse()
        .map_err(|e| format!("Invalid number: {e}"))?;
    let result = base * multiplier;
    if result < 1.0 {
        return Err(format!("Value {result} must be at least 1"));
    }
    Ok(result as usize)
}

fn default_threads() -> usize {
    num_cpus::get().min(16)
}

/// vertipaint - vertical and horizontal inheritance painting
///
/// Compares pairs of assemblies through their alignments (PAF with cg:Z:
/// CIGARs), estimates the vertical distance of each pair from a windowed
/// difference distribution and paints every aligned region as vertical or
/// horizontal.
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Tab-separated manifest: assembly_a, assembly_b, PAF [, contigs_a, contigs_b]
    #[clap(value_name = "MANIFEST")]
    manifest: String,

    /// Output table (stdout if not specified)
    #[clap(short = 'o', long = "output")]
    output: Option<String>,

    /// Target number of sliding windows per pair, used to choose window size
    #[clap(long = "window-count", default_value = "50k", value_parser = parse_metric_number)]
    window_count: usize,

    /// Remove indels from alignments instead of compressing them to one column
    #[clap(long = "ignore-indels")]
    ignore_indels: bool,

    /// Degree of smoothing for the distance distribution
    #[clap(long = "smoothing-factor", default_value = "0.8")]
    smoothing_factor: f64,

    /// Report secondary peaks holding at least this fraction of the primary peak's mass
    #[clap(long = "secondary", default_value = "0.7")]
    secondary: f64,

    /// Alignments overlapping a better one by more than this are culled
    #[clap(long = "allowed-overlap", default_value = "100")]
    allowed_overlap: i64,

    /// Number of randomly sampled pairs used to choose window size
    #[clap(long = "window-sample", default_value = "100")]
    window_sample: usize,

    /// Fail on the first pair that cannot be processed
    #[clap(long = "strict")]
    strict: bool,

    /// Number of threads for parallel processing
    #[clap(short = 't', long = "threads", default_value_t = default_threads())]
    threads: usize,

    /// Verbosity level (0 = error, 1 = info, 2 = debug)
    #[clap(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Args {
    fn pairwise_config(&self) -> Result<PairwiseConfig> {
        if self.smoothing_factor.is_nan() || self.smoothing_factor < 0.0 {
            bail!("--smoothing-factor must be non-negative");
        }
        if !(0.0..=1.0).contains(&self.secondary) {
            bail!("--secondary must be between 0 and 1");
        }
        Ok(PairwiseConfig {
            window_count: self.window_count,
            ignore_indels: self.ignore_indels,
            smoothing_factor: self.smoothing_factor,
            secondary_ratio: self.secondary,
            allowed_overlap: self.allowed_overlap,
        })
    }
}

/// Choose window parameters from a random (but reproducible) sample of pairs
fn sample_window_params(
    pairs: &[AssemblyPair],
    sample_size: usize,
    config: &PairwiseConfig,
) -> WindowParams {
    let mut rng = StdRng::seed_from_u64(0);
    let sample: Vec<&AssemblyPair> = pairs.choose_multiple(&mut rng, sample_size).collect();
    let lengths: Vec<Vec<usize>> = sample
        .par_iter()
        .filter_map(|p| match sample_alignment_lengths(p, config) {
            Ok(lengths) => Some(lengths),
            Err(e) => {
                warn!("{} left out of window sample: {:#}", p.label(), e);
                None
            }
        })
        .collect();
    let params = WindowParams::from_sample(&lengths, config.window_count);
    info!(
        "Window size {} bp, step {} bp (from {} sampled pairs)",
        params.size,
        params.step,
        lengths.len()
    );
    params
}

fn main() -> Result<()> {
    let args = Args::parse();

    env_logger::Builder::new()
        .filter_level(match args.verbose {
            0 => log::LevelFilter::Error,
            1 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        })
        .init();

    if args.threads == 0 {
        bail!("--threads must be at least 1");
    }
    ThreadPoolBuilder::new()
        .num_threads(args.threads)
        .build_global()
        .context("Failed to build thread pool")?;

    let config = args.pairwise_config()?;
    let entries = read_manifest(&args.manifest)?;
    info!("Loaded {} pairs from {}", entries.len(), args.manifest);

    let mut pairs = Vec::with_capacity(entries.len());
    for (entry, loaded) in entries
        .iter()
        .zip(entries.par_iter().map(|e| e.load()).collect::<Vec<_>>())
    {
        match loaded {
            Ok(pair) => pairs.push(pair),
            Err(e) if args.strict => return Err(e),
            Err(e) => warn!("Skipping {} vs {}: {:#}", entry.name_a, entry.name_b, e),
        }
    }
    if pairs.is_empty() {
        bail!("No assembly pairs to process");
    }

    let window = sample_window_params(&pairs, args.window_sample, &config);

    let outcomes: Vec<Result<PairOutcome>> = pairs
        .par_iter()
        .map(|p| process_pair(p, &window, &config))
        .collect();

    let output: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(
            File::create(path).with_context(|| format!("Failed to create {path}"))?,
        ),
        None => Box::new(io::stdout()),
    };
    let mut output = BufWriter::new(output);
    writeln!(output, "{}", table_header())?;

    let mut row_count = 0usize;
    let mut failed = 0usize;
    for (pair, outcome) in pairs.iter().zip(outcomes) {
        match outcome {
            Ok(PairOutcome::Results(results)) => {
                for r in &results {
                    writeln!(output, "{}", r.to_table_line())?;
                }
                row_count += results.len();
            }
            Ok(PairOutcome::NoResult { .. }) => {}
            Err(e) if args.strict => return Err(e),
            Err(e) => {
                error!("{}: {:#}", pair.label(), e);
                failed += 1;
            }
        }
    }
    output.flush()?;

    info!(
        "Wrote {} rows for {} pairs ({} failed)",
        row_count,
        pairs.len(),
        failed
    );
    Ok(())
}
