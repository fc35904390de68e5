/// Contig lengths of one assembly, in file order
use anyhow::{bail, Context, Result};
use flate2::read::MultiGzDecoder;
use indexmap::IndexMap;
use noodles::fasta::{self, fai};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::paf::{detect_compression, Compression, PafRecord};

#[derive(Debug, Clone, Default)]
pub struct ContigIndex {
    lengths: IndexMap<String, u64>,
}

impl ContigIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a contig, failing if the name is already present with a different length
    pub fn insert(&mut self, name: &str, length: u64) -> Result<()> {
        match self.lengths.get(name) {
            Some(&existing) if existing != length => {
                bail!("Contig {name} listed with lengths {existing} and {length}")
            }
            Some(_) => Ok(()),
            None => {
                self.lengths.insert(name.to_string(), length);
                Ok(())
            }
        }
    }

    pub fn length(&self, name: &str) -> Option<u64> {
        self.lengths.get(name).copied()
    }

    pub fn total_length(&self) -> u64 {
        self.lengths.values().sum()
    }

    pub fn len(&self) -> usize {
        self.lengths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lengths.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.lengths.iter().map(|(name, &len)| (name.as_str(), len))
    }

    /// Load from a `.fai` index or a FASTA file (plain or gzipped)
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let is_fai = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext == "fai")
            .unwrap_or(false);
        if is_fai {
            Self::from_fai(path)
        } else {
            Self::from_fasta(path)
        }
    }

    /// Read names and lengths from a samtools faidx index
    pub fn from_fai<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("Failed to open FASTA index {}", path.display()))?;
        let fai_index = fai::io::Reader::new(BufReader::new(file))
            .read_index()
            .with_context(|| format!("Failed to parse FASTA index {}", path.display()))?;
        let records: &[fai::Record] = fai_index.as_ref();

        let mut index = ContigIndex::new();
        for record in records {
            let name = std::str::from_utf8(record.name())
                .with_context(|| format!("{}: contig name is not UTF-8", path.display()))?;
            index.insert(name, record.length())?;
        }
        Ok(index)
    }

    /// Measure every record of a FASTA file. Gzip input is detected from the
    /// magic bytes, not the extension.
    pub fn from_fasta<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut file =
            File::open(path).with_context(|| format!("Failed to open FASTA {}", path.display()))?;
        // bgzip is multi-member gzip, so one decoder reads both
        let reader: Box<dyn BufRead> = match detect_compression(&mut file)? {
            Compression::Gzip | Compression::Bgzf => Box::new(BufReader::new(MultiGzDecoder::new(file))),
            Compression::None => Box::new(BufReader::new(file)),
        };
        Self::from_fasta_reader(reader).with_context(|| format!("Failed to read {}", path.display()))
    }

    pub fn from_fasta_reader<R: BufRead>(reader: R) -> Result<Self> {
        let mut reader = fasta::io::Reader::new(reader);
        let mut index = ContigIndex::new();
        for result in reader.records() {
            let record = result.context("Malformed FASTA record")?;
            let name = std::str::from_utf8(record.name()).context("FASTA name is not UTF-8")?;
            index.insert(name, record.sequence().len() as u64)?;
        }
        Ok(index)
    }

    /// Query contigs named by PAF records (assembly A in a pair)
    pub fn from_query_records(records: &[PafRecord]) -> Result<Self> {
        let mut index = ContigIndex::new();
        for r in records {
            index.insert(&r.query_name, r.query_len)?;
        }
        Ok(index)
    }

    /// Target contigs named by PAF records (assembly B in a pair)
    pub fn from_target_records(records: &[PafRecord]) -> Result<Self> {
        let mut index = ContigIndex::new();
        for r in records {
            index.insert(&r.target_name, r.target_len)?;
        }
        Ok(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paf::parse_paf_line;

    #[test]
    fn test_fasta_reader() {
        let fasta = ">chr1 some description\nACGT\nACG\n>plasmid\nAC\n";
        let index = ContigIndex::from_fasta_reader(fasta.as_bytes()).unwrap();
        let contigs: Vec<(&str, u64)> = index.iter().collect();
        assert_eq!(contigs, vec![("chr1", 7), ("plasmid", 2)]);
        assert_eq!(index.total_length(), 9);
    }

    #[test]
    fn test_fasta_reader_rejects_headerless_sequence() {
        assert!(ContigIndex::from_fasta_reader("ACGT\n>a\nAC\n".as_bytes()).is_err());
    }

    #[test]
    fn test_fai_index() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("asm.fa.fai");
        std::fs::write(&path, "chr1\t7\t23\t4\t5\nplasmid\t2\t43\t2\t3\n").unwrap();

        let index = ContigIndex::from_path(&path).unwrap();
        let contigs: Vec<(&str, u64)> = index.iter().collect();
        assert_eq!(contigs, vec![("chr1", 7), ("plasmid", 2)]);
    }

    #[test]
    fn test_gzipped_fasta() {
        use flate2::write::GzEncoder;
        use std::io::Write;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("asm.fasta");
        let mut encoder = GzEncoder::new(File::create(&path).unwrap(), flate2::Compression::default());
        encoder.write_all(b">chr1\nACGTACGT\nAC\n").unwrap();
        encoder.finish().unwrap();

        let index = ContigIndex::from_path(&path).unwrap();
        assert_eq!(index.length("chr1"), Some(10));
    }

    #[test]
    fn test_conflicting_lengths() {
        let mut index = ContigIndex::new();
        index.insert("a", 10).unwrap();
        index.insert("a", 10).unwrap();
        assert!(index.insert("a", 11).is_err());
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_from_records() {
        let records = vec![
            parse_paf_line("q1\t100\t0\t10\t+\tt1\t200\t0\t10\t10\t10\t60\tcg:Z:10=").unwrap(),
            parse_paf_line("q2\t50\t0\t10\t-\tt1\t200\t50\t60\t10\t10\t60\tcg:Z:10=").unwrap(),
        ];
        let a = ContigIndex::from_query_records(&records).unwrap();
        let b = ContigIndex::from_target_records(&records).unwrap();
        assert_eq!(a.total_length(), 150);
        assert_eq!(b.len(), 1);
        assert_eq!(b.length("t1"), Some(200));
        assert_eq!(b.length("q1"), None);
    }
}
