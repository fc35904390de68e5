use anyhow::{bail, Context, Result};
use flate2::read::MultiGzDecoder;
use noodles::bgzf;
use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    None,
    Gzip,
    /// Blocked gzip: gzip members carrying a `BC` extra subfield
    Bgzf,
}

/// Look at the first bytes of a file, then rewind it
pub fn detect_compression<R: Read + Seek>(reader: &mut R) -> Result<Compression> {
    let mut header = Vec::with_capacity(BGZF_HEADER_LEN);
    reader.by_ref().take(BGZF_HEADER_LEN as u64).read_to_end(&mut header)?;
    reader.seek(SeekFrom::Start(0))?;

    if header.len() < 2 || header[..2] != GZIP_MAGIC {
        return Ok(Compression::None);
    }
    // FEXTRA set and the first extra subfield is `BC`
    let is_bgzf = header.len() == BGZF_HEADER_LEN
        && header[2] == 8
        && header[3] & 0x04 != 0
        && &header[12..14] == b"BC";
    Ok(if is_bgzf { Compression::Bgzf } else { Compression::Gzip })
}

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
const BGZF_HEADER_LEN: usize = 18;

/// Open a PAF file, plain, gzip or bgzip. Compression is read from the
/// magic bytes, so a `.gz` written by plain gzip opens too.
pub fn open_paf_input<P: AsRef<Path>>(path: P) -> Result<Box<dyn BufRead>> {
    let path = path.as_ref();
    let mut file =
        File::open(path).with_context(|| format!("Failed to open PAF {}", path.display()))?;

    match detect_compression(&mut file)
        .with_context(|| format!("Failed to read {}", path.display()))?
    {
        Compression::Bgzf => Ok(Box::new(BufReader::new(bgzf::io::reader::Reader::new(file)))),
        Compression::Gzip => Ok(Box::new(BufReader::new(MultiGzDecoder::new(file)))),
        Compression::None => Ok(Box::new(BufReader::new(file))),
    }
}

/// One line of aligner output (PAF with `cg:Z:` and `AS:i:` tags)
#[derive(Debug, Clone, PartialEq)]
pub struct PafRecord {
    pub query_name: String,
    pub query_len: u64,
    pub query_start: u64,
    pub query_end: u64,
    pub strand: char,
    pub target_name: String,
    pub target_len: u64,
    pub target_start: u64,
    pub target_end: u64,
    pub matches: u64,
    pub block_len: u64,
    pub cigar: Option<String>,
    pub alignment_score: i64,
    pub tags: Vec<(String, String)>,
}

impl PafRecord {
    /// Percent identity from the PAF match/block columns
    pub fn percent_identity(&self) -> f64 {
        if self.block_len == 0 {
            return 0.0;
        }
        100.0 * self.matches as f64 / self.block_len as f64
    }
}

/// Parse a single PAF line. Requires the 11 positional columns; the mapping
/// quality column and any tags are optional.
pub fn parse_paf_line(line: &str) -> Result<PafRecord> {
    let fields: Vec<&str> = line.trim_end_matches(&['\n', '\r'][..]).split('\t').collect();

    if fields.len() < 11 {
        bail!(
            "PAF line has {} fields, at least 11 are required: {}",
            fields.len(),
            line.trim()
        );
    }

    let strand = match fields[4] {
        "+" => '+',
        "-" => '-',
        other => bail!("Invalid strand '{other}' in PAF line"),
    };

    let mut paf = PafRecord {
        query_name: fields[0].to_string(),
        query_len: fields[1].parse().context("Invalid query length")?,
        query_start: fields[2].parse().context("Invalid query start")?,
        query_end: fields[3].parse().context("Invalid query end")?,
        strand,
        target_name: fields[5].to_string(),
        target_len: fields[6].parse().context("Invalid target length")?,
        target_start: fields[7].parse().context("Invalid target start")?,
        target_end: fields[8].parse().context("Invalid target end")?,
        matches: fields[9].parse().context("Invalid match count")?,
        block_len: fields[10].parse().context("Invalid block length")?,
        cigar: None,
        alignment_score: 0,
        tags: Vec::new(),
    };

    // Parse optional tags
    for field in fields.iter().skip(11) {
        if let Some((tag, rest)) = field.split_once(':') {
            if let Some((typ, val)) = rest.split_once(':') {
                match (tag, typ) {
                    ("cg", "Z") => paf.cigar = Some(val.to_string()),
                    ("AS", "i") => {
                        paf.alignment_score = val
                            .parse()
                            .with_context(|| format!("Invalid alignment score '{val}'"))?
                    }
                    _ => paf.tags.push((format!("{tag}:{typ}"), val.to_string())),
                }
            }
        }
    }

    Ok(paf)
}

pub struct PafReader<R: Read> {
    reader: BufReader<R>,
    line_number: usize,
}

impl<R: Read> PafReader<R> {
    pub fn new(reader: R) -> Self {
        PafReader {
            reader: BufReader::new(reader),
            line_number: 0,
        }
    }

    pub fn read_record(&mut self) -> Result<Option<PafRecord>> {
        let mut line = String::new();
        loop {
            line.clear();
            if self.reader.read_line(&mut line)? == 0 {
                return Ok(None);
            }
            self.line_number += 1;
            // Header lines and blank lines carry no alignment
            if line.starts_with('@') || line.trim().is_empty() {
                continue;
            }
            let record = parse_paf_line(&line)
                .with_context(|| format!("PAF line {}", self.line_number))?;
            return Ok(Some(record));
        }
    }

    pub fn read_all(&mut self) -> Result<Vec<PafRecord>> {
        let mut records = Vec::new();
        while let Some(record) = self.read_record()? {
            records.push(record);
        }
        Ok(records)
    }
}

/// Read PAF from file (gzip and bgzip detected from the magic bytes)
pub fn read_paf_file<P: AsRef<Path>>(path: P) -> Result<Vec<PafRecord>> {
    let path = path.as_ref();
    let input = open_paf_input(path)?;
    let mut reader = PafReader::new(input);
    reader
        .read_all()
        .with_context(|| format!("Failed to read {}", path.display()))
}

impl fmt::Display for PafRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
            self.query_name,
            self.query_len,
            self.query_start,
            self.query_end,
            self.strand,
            self.target_name,
            self.target_len,
            self.target_start,
            self.target_end,
            self.matches,
            self.block_len,
        )?;

        write!(f, "\tAS:i:{}", self.alignment_score)?;

        if let Some(ref cigar) = self.cigar {
            write!(f, "\tcg:Z:{}", cigar)?;
        }

        for (key, val) in &self.tags {
            write!(f, "\t{}:{}", key, val)?;
        }

        Ok(())
    }
}
