// Library exports for vertipaint
pub mod alignment;
pub mod cigar;
pub mod config;
pub mod contigs;
pub mod distribution;
pub mod manifest;
pub mod paf;
pub mod paint;
pub mod pairwise;
pub mod peaks;
pub mod ranges;
pub mod window;
