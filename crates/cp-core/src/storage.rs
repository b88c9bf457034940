//! Read/write labeled-pair CSV files.

use crate::model::PairRecord;
use anyhow::{Context, Result};
use std::fs;
use std::io::Write;
use std::path::Path;

/// Column order of every pairs CSV, input and output alike.
pub const PAIR_COLUMNS: [&str; 3] = ["uid", "groundtruth_index", "expert_label"];

/// A data row that could not be turned into a [`PairRecord`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedRow {
    /// 1-based data row number (the header is not counted).
    pub row: usize,
    /// Line in the file where the row starts, when the reader knows it.
    pub line: Option<u64>,
    pub reason: String,
}

/// Rows of a pairs CSV read one at a time: bad rows are set aside instead of
/// ending the read.
#[derive(Debug, Clone, Default)]
pub struct PairRows {
    pub records: Vec<PairRecord>,
    pub rejected: Vec<RejectedRow>,
}

impl PairRows {
    /// Every data row seen, good or bad.
    pub fn total(&self) -> usize {
        self.records.len() + self.rejected.len()
    }
}

fn open_pairs(path: &Path) -> Result<csv::Reader<fs::File>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("failed to open pairs CSV {}", path.display()))?;

    let headers = reader
        .headers()
        .with_context(|| format!("failed to read header of {}", path.display()))?
        .clone();
    for column in PAIR_COLUMNS {
        if !headers.iter().any(|h| h == column) {
            anyhow::bail!("{} is missing the `{}` column", path.display(), column);
        }
    }
    Ok(reader)
}

/// Read all rows of a pairs CSV. A header row naming all [`PAIR_COLUMNS`] is required;
/// column order and extra columns are tolerated. The first bad row fails the read.
pub fn read_pairs(path: &Path) -> Result<Vec<PairRecord>> {
    let mut reader = open_pairs(path)?;
    let mut records = Vec::new();
    for (idx, row) in reader.deserialize::<PairRecord>().enumerate() {
        let record =
            row.with_context(|| format!("failed to read row {} of {}", idx + 1, path.display()))?;
        records.push(record);
    }
    Ok(records)
}

/// Like [`read_pairs`], but a row with the wrong number of fields or invalid
/// UTF-8 is recorded in [`PairRows::rejected`] and reading goes on. Only an
/// unopenable file, a bad header, or an I/O error fails.
pub fn read_pairs_lenient(path: &Path) -> Result<PairRows> {
    let mut reader = open_pairs(path)?;
    let mut rows = PairRows::default();
    for (idx, row) in reader.deserialize::<PairRecord>().enumerate() {
        match row {
            Ok(record) => rows.records.push(record),
            Err(e) if matches!(e.kind(), csv::ErrorKind::Io(_)) => {
                return Err(e).with_context(|| format!("failed to read {}", path.display()));
            }
            Err(e) => rows.rejected.push(RejectedRow {
                row: idx + 1,
                line: e.position().map(csv::Position::line),
                reason: e.to_string(),
            }),
        }
    }
    Ok(rows)
}

/// Write rows to a pairs CSV, creating parent directories as needed.
/// The header is always written, even for an empty partition.
pub fn write_pairs(path: &Path, records: &[PairRecord]) -> Result<()> {
    if let Some(dir) = path.parent()
        && !dir.as_os_str().is_empty()
    {
        fs::create_dir_all(dir)
            .with_context(|| format!("failed to create output directory {}", dir.display()))?;
    }

    let file =
        fs::File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    write_pairs_to(file, records).with_context(|| format!("failed to write {}", path.display()))
}

/// Write the header and `records` to any writer.
pub fn write_pairs_to<W: Write>(out: W, records: &[PairRecord]) -> Result<()> {
    let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(out);
    writer.write_record(PAIR_COLUMNS)?;
    for record in records {
        writer.serialize(record).context("failed to write row")?;
    }
    writer.flush().context("failed to flush")?;
    Ok(())
}
