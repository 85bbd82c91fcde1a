use anyhow::{Context, Result};
use csv::{QuoteStyle, WriterBuilder};
use std::{fs, io::Write, path::Path};
use tempfile::NamedTempFile;

use super::TransferRecord;

pub const EXPORT_HEADER: [&str; 4] = ["from", "to", "txHash", "blockNumber"];

/// Write `rows` as `from,to,txHash,blockNumber` CSV, header first, in order.
///
/// Fields are emitted verbatim: no quoting, one `\n`-terminated line per row.
pub fn write_transfers<W: Write>(out: W, rows: &[TransferRecord]) -> Result<()> {
    let mut wtr = WriterBuilder::new()
        .has_headers(false)
        .quote_style(QuoteStyle::Never)
        .from_writer(out);

    wtr.write_record(EXPORT_HEADER)
        .context("writing export header")?;
    for (idx, row) in rows.iter().enumerate() {
        wtr.serialize(row)
            .with_context(|| format!("writing export row {}", idx))?;
    }
    wtr.flush().context("flushing export CSV")?;
    Ok(())
}

/// Create or overwrite `path` with the exported rows.
///
/// The CSV goes to a temporary file in the target directory and is persisted
/// over `path` only once fully written. On any failure the temporary file is
/// removed and an existing export is left untouched.
pub fn write_transfers_csv<P: AsRef<Path>>(path: P, rows: &[TransferRecord]) -> Result<()> {
    let path = path.as_ref();
    let dir = match path.parent().filter(|p| !p.as_os_str().is_empty()) {
        Some(parent) => {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating output directory {:?}", parent))?;
            parent
        }
        None => Path::new("."),
    };

    let mut tmp = NamedTempFile::new_in(dir)
        .with_context(|| format!("creating temporary export file in {:?}", dir))?;
    write_transfers(&mut tmp, rows)
        .with_context(|| format!("writing {:?}", tmp.path()))?;

    // the temp file is deleted together with the PersistError
    tmp.persist(path)
        .map_err(|e| e.error)
        .with_context(|| format!("replacing {:?}", path))?;
    Ok(())
}
