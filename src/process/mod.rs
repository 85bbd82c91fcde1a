// src/process/mod.rs
use anyhow::{Context, Result};
use csv::{QuoteStyle, ReaderBuilder, StringRecord, Terminator, WriterBuilder};
use rand::Rng;
use serde::Serialize;
use std::{
    borrow::Cow,
    fs,
    io::{self, Read, Write},
    path::Path,
};
use thiserror::Error;
use tracing::{debug, info};

pub mod geo;
pub mod hash;

pub use geo::{pick_region, REGIONS};
pub use hash::{hex_digits_to_decimal, HashCache};

pub const OUTPUT_HEADER: [&str; 4] = ["from", "to", "txHash", "geo"];
const REQUIRED_COLUMNS: [&str; 3] = ["from", "to", "txHash"];

#[derive(Debug, Error)]
pub enum NormalizeError {
    /// Header lacks one or more of `from`, `to`, `txHash`.
    #[error("CSV is missing required column(s): {}", .missing.join(", "))]
    MissingColumns { missing: Vec<&'static str> },

    #[error("CSV parse error at line {line}")]
    Csv {
        line: u64,
        #[source]
        source: csv::Error,
    },
}

/// One analysis-ready row.
#[derive(Debug, Serialize, PartialEq, Clone, Eq)]
pub struct NormalizedRecord {
    pub from: String,
    pub to: String,
    /// Decimal numeral, or empty when the source hash was not hex.
    #[serde(rename = "txHash")]
    pub tx_hash: String,
    pub geo: String,
}

/// Positions of the columns the normalizer reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnLayout {
    pub from: usize,
    pub to: usize,
    pub tx_hash: usize,
    /// Located only so it is known to be dropped.
    pub block_number: Option<usize>,
}

impl ColumnLayout {
    /// Match header names exactly; order and extra columns don't matter.
    pub fn from_header(header: &StringRecord) -> Result<Self, NormalizeError> {
        let find = |name: &str| header.iter().position(|h| h == name);

        let missing: Vec<&'static str> = REQUIRED_COLUMNS
            .into_iter()
            .filter(|name| find(*name).is_none())
            .collect();

        match (find("from"), find("to"), find("txHash")) {
            (Some(from), Some(to), Some(tx_hash)) => Ok(Self {
                from,
                to,
                tx_hash,
                block_number: find("blockNumber"),
            }),
            _ => Err(NormalizeError::MissingColumns { missing }),
        }
    }
}

/// Whole-line blank check: a record from a blank or whitespace-only line.
fn is_blank(record: &StringRecord) -> bool {
    record.len() <= 1 && record.iter().all(|f| f.trim().is_empty())
}

/// Drop the `\r` of every `\r\n` pair so records end only at `\n`.
///
/// A lone `\r` is ordinary field content, and so is a `\r` at the very end of
/// input that no `\n` follows.
fn strip_crlf(input: &str) -> Cow<'_, str> {
    if !input.contains("\r\n") {
        return Cow::Borrowed(input);
    }
    let mut pieces = input.split('\n').peekable();
    let mut out = String::with_capacity(input.len());
    while let Some(piece) = pieces.next() {
        if pieces.peek().is_some() {
            out.push_str(piece.strip_suffix('\r').unwrap_or(piece));
            out.push('\n');
        } else {
            out.push_str(piece);
        }
    }
    Cow::Owned(out)
}

/// Turns raw transfer CSV into `from,to,txHash,geo` rows.
///
/// Input is split on bare commas: there is no quoting or escaping, so field
/// values must not contain commas.
pub struct Normalizer<R> {
    cache: HashCache,
    rng: R,
}

impl<R: Rng> Normalizer<R> {
    pub fn new(rng: R) -> Self {
        Self {
            cache: HashCache::new(),
            rng,
        }
    }

    pub fn cache(&self) -> &HashCache {
        &self.cache
    }

    /// Normalize every data row of `input`, in order.
    ///
    /// Returns `Ok(None)` when the input holds no non-blank line at all.
    /// The header is validated before any row is touched.
    pub fn normalize_str(
        &mut self,
        input: &str,
    ) -> Result<Option<Vec<NormalizedRecord>>, NormalizeError> {
        let input = strip_crlf(input);
        let mut rdr = ReaderBuilder::new()
            .has_headers(false)
            .quoting(false)
            .flexible(true)
            .terminator(Terminator::Any(b'\n'))
            .from_reader(input.as_bytes());

        let mut records = rdr.records().filter(|r| match r {
            Ok(rec) => !is_blank(rec),
            Err(_) => true,
        });

        let header = match records.next() {
            Some(r) => r.map_err(csv_error)?,
            None => return Ok(None),
        };
        let layout = ColumnLayout::from_header(&header)?;
        debug!(?layout, "header validated");

        let mut out = Vec::new();
        for rec in records {
            let rec = rec.map_err(csv_error)?;
            out.push(self.normalize_record(&rec, &layout));
        }
        Ok(Some(out))
    }

    fn normalize_record(&mut self, rec: &StringRecord, layout: &ColumnLayout) -> NormalizedRecord {
        let field = |idx: usize| rec.get(idx).unwrap_or("");
        NormalizedRecord {
            from: field(layout.from).to_string(),
            to: field(layout.to).to_string(),
            tx_hash: self.cache.decimal_for(field(layout.tx_hash)),
            geo: pick_region(&mut self.rng).to_string(),
        }
    }

    /// Full pass: parse `input`, write the normalized CSV to `out`.
    ///
    /// Writes nothing for empty input. Returns the number of data rows written.
    pub fn normalize_to_writer<W: Write>(&mut self, input: &str, out: W) -> Result<usize> {
        let Some(records) = self.normalize_str(input)? else {
            debug!("empty input; nothing to write");
            return Ok(0);
        };
        write_normalized(out, &records)?;
        info!(
            rows = records.len(),
            distinct_hashes = self.cache.len(),
            cache_hits = self.cache.hits(),
            "normalized transfers"
        );
        Ok(records.len())
    }
}

fn csv_error(err: csv::Error) -> NormalizeError {
    let line = err.position().map(|p| p.line()).unwrap_or(0);
    NormalizeError::Csv { line, source: err }
}

/// Header `from,to,txHash,geo`, then one unquoted line per record.
pub fn write_normalized<W: Write>(out: W, records: &[NormalizedRecord]) -> Result<()> {
    let mut wtr = WriterBuilder::new()
        .has_headers(false)
        .quote_style(QuoteStyle::Never)
        .from_writer(out);

    wtr.write_record(OUTPUT_HEADER)
        .context("writing output header")?;
    for rec in records {
        wtr.serialize(rec).context("writing output row")?;
    }
    wtr.flush().context("flushing output")?;
    Ok(())
}

/// Whole input as text: the file at `path`, or stdin when `path` is `None`.
pub fn read_input(path: Option<&Path>) -> Result<String> {
    match path {
        Some(p) => fs::read_to_string(p).with_context(|| format!("reading input file {:?}", p)),
        None => {
            let mut buf = String::new();
            io::stdin()
                .lock()
                .read_to_string(&mut buf)
                .context("reading standard input")?;
            Ok(buf)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};
    use tempfile::NamedTempFile;

    fn normalizer() -> Normalizer<StdRng> {
        Normalizer::new(StdRng::seed_from_u64(42))
    }

    fn run(input: &str) -> Result<String> {
        let mut buf = Vec::new();
        normalizer().normalize_to_writer(input, &mut buf)?;
        Ok(String::from_utf8(buf)?)
    }

    /// Output with the random geo column stripped, for comparisons.
    fn without_geo(output: &str) -> Vec<String> {
        output
            .lines()
            .map(|l| l.rsplitn(2, ',').nth(1).unwrap_or("").to_string())
            .collect()
    }

    #[test]
    fn end_to_end_example() -> Result<()> {
        let out = run("from,to,txHash,blockNumber\n0xAAA,0xBBB,0xff,100")?;
        let lines: Vec<&str> = out.lines().collect();

        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "from,to,txHash,geo");

        let fields: Vec<&str> = lines[1].split(',').collect();
        assert_eq!(&fields[..3], &["0xAAA", "0xBBB", "255"]);
        assert!(REGIONS.contains(&fields[3]), "unexpected geo {}", fields[3]);
        assert!(out.ends_with('\n'));
        Ok(())
    }

    #[test]
    fn columns_are_found_by_name_in_any_order() -> Result<()> {
        let input = "blockNumber,memo,txHash,to,from\n7,hi,0x10,0xT,0xF\n";
        let records = normalizer().normalize_str(input)?.expect("header present");

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].from, "0xF");
        assert_eq!(records[0].to, "0xT");
        assert_eq!(records[0].tx_hash, "16");
        Ok(())
    }

    #[test]
    fn block_number_is_optional() -> Result<()> {
        let records = normalizer()
            .normalize_str("from,to,txHash\na,b,0x1\n")?
            .expect("header present");
        assert_eq!(records[0].tx_hash, "1");
        Ok(())
    }

    #[test]
    fn missing_columns_fail_before_any_output() {
        let mut buf = Vec::new();
        let err = normalizer()
            .normalize_to_writer("from,txHash,blockNumber\na,0x1,2\n", &mut buf)
            .unwrap_err();

        assert!(buf.is_empty());
        match err.downcast_ref::<NormalizeError>() {
            Some(NormalizeError::MissingColumns { missing }) => assert_eq!(missing, &vec!["to"]),
            other => panic!("expected MissingColumns, got {:?}", other),
        }
    }

    #[test]
    fn every_missing_column_is_named() {
        let err = normalizer().normalize_str("a,b,c\n1,2,3\n").unwrap_err();
        assert_eq!(
            err.to_string(),
            "CSV is missing required column(s): from, to, txHash"
        );
    }

    #[test]
    fn header_names_are_case_sensitive() {
        let err = normalizer().normalize_str("from,to,TxHash\n1,2,3\n").unwrap_err();
        assert!(matches!(err, NormalizeError::MissingColumns { ref missing } if missing == &vec!["txHash"]));
    }

    #[test]
    fn empty_input_writes_nothing() -> Result<()> {
        assert_eq!(run("")?, "");
        assert_eq!(run("\n\n   \n")?, "");
        assert!(normalizer().normalize_str("\r\n")?.is_none());
        Ok(())
    }

    #[test]
    fn header_only_input_writes_header_only() -> Result<()> {
        assert_eq!(run("from,to,txHash,blockNumber\n")?, "from,to,txHash,geo\n");
        Ok(())
    }

    #[test]
    fn blank_lines_are_ignored_everywhere() -> Result<()> {
        let dense = "from,to,txHash,blockNumber\na,b,0x1,1\nc,d,0x2,2\ne,f,0x3,3\n";
        let sparse = "\n  \nfrom,to,txHash,blockNumber\n\na,b,0x1,1\n\t\nc,d,0x2,2\n\n\ne,f,0x3,3\n\n\n";

        assert_eq!(without_geo(&run(dense)?), without_geo(&run(sparse)?));
        assert_eq!(run(sparse)?.lines().count(), 4);
        Ok(())
    }

    #[test]
    fn crlf_input_is_accepted() -> Result<()> {
        let records = normalizer()
            .normalize_str("from,to,txHash\r\na,b,0xA\r\n\r\n")?
            .expect("header present");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].tx_hash, "10");
        Ok(())
    }

    #[test]
    fn lone_carriage_return_stays_inside_its_field() -> Result<()> {
        let records = normalizer()
            .normalize_str("from,to,txHash\na,b\rc,0x1\n")?
            .expect("header present");

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].from, "a");
        assert_eq!(records[0].to, "b\rc");
        assert_eq!(records[0].tx_hash, "1");
        Ok(())
    }

    #[test]
    fn trailing_carriage_return_without_newline_is_kept() -> Result<()> {
        let records = normalizer()
            .normalize_str("from,to,txHash\r\na,b,0x1\r\nc,d,0x2\r")?
            .expect("header present");

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].tx_hash, "1");
        // "0x2\r" is not a hex number
        assert_eq!(records[1].tx_hash, "");
        Ok(())
    }

    #[test]
    fn output_header_matches_record_fields() -> Result<()> {
        let rec = NormalizedRecord {
            from: "f".into(),
            to: "t".into(),
            tx_hash: "255".into(),
            geo: "上海".into(),
        };
        let mut buf = Vec::new();
        write_normalized(&mut buf, &[rec])?;
        assert_eq!(String::from_utf8(buf)?, "from,to,txHash,geo\nf,t,255,上海\n");
        Ok(())
    }

    #[test]
    fn row_order_is_preserved() -> Result<()> {
        let mut input = String::from("from,to,txHash,blockNumber\n");
        for i in 0..50u32 {
            input.push_str(&format!("f{},t{},0x{:x},{}\n", i, i, i, i));
        }
        let records = normalizer().normalize_str(&input)?.expect("header present");

        assert_eq!(records.len(), 50);
        for (i, rec) in records.iter().enumerate() {
            assert_eq!(rec.from, format!("f{}", i));
            assert_eq!(rec.tx_hash, i.to_string());
        }
        Ok(())
    }

    #[test]
    fn short_rows_yield_empty_fields() -> Result<()> {
        let records = normalizer()
            .normalize_str("txHash,from,to\n0x2\n0x3,onlyfrom\n")?
            .expect("header present");

        assert_eq!(records[0].tx_hash, "2");
        assert_eq!(records[0].from, "");
        assert_eq!(records[0].to, "");
        assert_eq!(records[1].from, "onlyfrom");
        assert_eq!(records[1].to, "");
        Ok(())
    }

    #[test]
    fn malformed_hashes_do_not_stop_the_run() -> Result<()> {
        let out = run("from,to,txHash\na,b,0xzz\nc,d,\ne,f,0x20\n")?;
        assert_eq!(
            without_geo(&out),
            vec!["from,to,txHash", "a,b,", "c,d,", "e,f,32"]
        );
        Ok(())
    }

    #[test]
    fn quotes_are_not_interpreted() -> Result<()> {
        let records = normalizer()
            .normalize_str("from,to,txHash\n\"a\",b,0x1\n")?
            .expect("header present");
        assert_eq!(records[0].from, "\"a\"");

        let out = run("from,to,txHash\n\"a\",b,0x1\n")?;
        assert!(out.lines().nth(1).unwrap_or("").starts_with("\"a\",b,1,"));
        Ok(())
    }

    #[test]
    fn repeated_hashes_hit_the_cache() -> Result<()> {
        let mut n = normalizer();
        let records = n
            .normalize_str("from,to,txHash\na,b,0xAB\nc,d,0xab\ne,f,ab\ng,h,0xAB\n")?
            .expect("header present");

        assert!(records.iter().all(|r| r.tx_hash == "171"));
        // "0xab" and "ab" are distinct keys
        assert_eq!(n.cache().len(), 2);
        assert_eq!(n.cache().misses(), 2);
        assert_eq!(n.cache().hits(), 2);
        Ok(())
    }

    #[test]
    fn output_schema_is_stable_when_fed_back() -> Result<()> {
        let first = run("from,to,txHash,blockNumber\na,b,0x1,1\n")?;
        let second = run(&first)?;

        assert_eq!(second.lines().next(), Some("from,to,txHash,geo"));
        assert_eq!(second.lines().count(), first.lines().count());
        Ok(())
    }

    #[test]
    fn reads_input_from_file() -> Result<()> {
        let mut tmp = NamedTempFile::new()?;
        write!(tmp, "from,to,txHash\nx,y,0xff\n")?;

        let text = read_input(Some(tmp.path()))?;
        assert_eq!(text, "from,to,txHash\nx,y,0xff\n");
        Ok(())
    }

    #[test]
    fn unreadable_input_is_an_error() {
        let err = read_input(Some(Path::new("/definitely/not/here.csv"))).unwrap_err();
        assert!(err.to_string().contains("reading input file"));
    }
}
