//! Pair manifest: which assemblies to compare and where their alignments are
//!
//! One pair per line, tab-separated:
//!
//! ```text
//! assembly_a  assembly_b  paf  [contigs_a  contigs_b]
//! ```
//!
//! Contig sources are FASTA files (plain or gzipped) or `.fai` indexes. When
//! they are left out, contig names and lengths are taken from the PAF records.
//! Relative paths are resolved against the manifest's directory.

use anyhow::{bail, Context, Result};
use log::debug;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use crate::contigs::ContigIndex;
use crate::paf::read_paf_file;
use crate::pairwise::AssemblyPair;

#[derive(Debug, Clone, PartialEq)]
pub struct ManifestEntry {
    pub name_a: String,
    pub name_b: String,
    pub paf: PathBuf,
    pub contigs: Option<(PathBuf, PathBuf)>,
}

impl ManifestEntry {
    /// Read the PAF and contig lengths for this pair
    pub fn load(&self) -> Result<AssemblyPair> {
        let records = read_paf_file(&self.paf)
            .with_context(|| format!("Failed to read alignments from {}", self.paf.display()))?;
        let (contigs_a, contigs_b) = match &self.contigs {
            Some((a, b)) => (ContigIndex::from_path(a)?, ContigIndex::from_path(b)?),
            None => (
                ContigIndex::from_query_records(&records)?,
                ContigIndex::from_target_records(&records)?,
            ),
        };
        debug!(
            "{} vs {}: {} PAF records, {} + {} contigs",
            self.name_a,
            self.name_b,
            records.len(),
            contigs_a.len(),
            contigs_b.len()
        );
        Ok(AssemblyPair {
            name_a: self.name_a.clone(),
            name_b: self.name_b.clone(),
            records,
            contigs_a,
            contigs_b,
        })
    }
}

pub fn read_manifest<P: AsRef<Path>>(path: P) -> Result<Vec<ManifestEntry>> {
    let path = path.as_ref();
    let file =
        File::open(path).with_context(|| format!("Failed to open manifest {}", path.display()))?;
    let base = path.parent().unwrap_or_else(|| Path::new(""));
    parse_manifest(BufReader::new(file), base)
        .with_context(|| format!("Invalid manifest {}", path.display()))
}

pub fn parse_manifest<R: BufRead>(reader: R, base: &Path) -> Result<Vec<ManifestEntry>> {
    let resolve = |p: &str| -> PathBuf {
        let p = Path::new(p);
        if p.is_absolute() {
            p.to_path_buf()
        } else {
            base.join(p)
        }
    };

    let mut entries = Vec::new();
    for (line_number, line) in reader.lines().enumerate() {
        let line = line?;
        // Skip comments and empty lines
        if line.starts_with('#') || line.trim().is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.trim_end().split('\t').collect();
        let contigs = match fields.len() {
            3 => None,
            5 => Some((resolve(fields[3]), resolve(fields[4]))),
            n => bail!(
                "line {}: expected 3 or 5 tab-separated fields, found {}",
                line_number + 1,
                n
            ),
        };
        if fields[0] == fields[1] {
            bail!("line {}: assembly {} paired with itself", line_number + 1, fields[0]);
        }
        entries.push(ManifestEntry {
            name_a: fields[0].to_string(),
            name_b: fields[1].to_string(),
            paf: resolve(fields[2]),
            contigs,
        });
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_parse_manifest() {
        let text = "# pairs\nA\tB\tab.paf\n\nA\tC\t/data/ac.paf\ta.fa\tc.fa.fai\n";
        let entries = parse_manifest(text.as_bytes(), Path::new("/runs")).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].paf, PathBuf::from("/runs/ab.paf"));
        assert_eq!(entries[0].contigs, None);
        assert_eq!(entries[1].paf, PathBuf::from("/data/ac.paf"));
        assert_eq!(
            entries[1].contigs,
            Some((PathBuf::from("/runs/a.fa"), PathBuf::from("/runs/c.fa.fai")))
        );
    }

    #[test]
    fn test_parse_manifest_errors() {
        assert!(parse_manifest("A\tB\n".as_bytes(), Path::new("")).is_err());
        assert!(parse_manifest("A\tB\tp.paf\ta.fa\n".as_bytes(), Path::new("")).is_err());
        assert!(parse_manifest("A\tA\tp.paf\n".as_bytes(), Path::new("")).is_err());
    }

    #[test]
    fn test_load_with_contig_files() {
        let dir = TempDir::new().unwrap();
        let mut paf = File::create(dir.path().join("ab.paf")).unwrap();
        writeln!(paf, "a1\t100\t0\t100\t+\tb1\t100\t0\t100\t100\t100\t60\tcg:Z:100=").unwrap();
        let mut fasta = File::create(dir.path().join("a.fa")).unwrap();
        write!(fasta, ">a1\n{}\n>a2\n{}\n", "A".repeat(100), "C".repeat(20)).unwrap();
        let mut fai = File::create(dir.path().join("b.fa.fai")).unwrap();
        writeln!(fai, "b1\t100\t4\t100\t101").unwrap();

        let manifest_path = dir.path().join("pairs.tsv");
        std::fs::write(&manifest_path, "A\tB\tab.paf\ta.fa\tb.fa.fai\n").unwrap();

        let entries = read_manifest(&manifest_path).unwrap();
        let pair = entries[0].load().unwrap();
        assert_eq!(pair.records.len(), 1);
        assert_eq!(pair.contigs_a.total_length(), 120);
        assert_eq!(pair.contigs_b.length("b1"), Some(100));
    }
}
