// CSV loading for the survey dataset

use crate::data::RowStore;
use anyhow::{Context, Result};
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

/// Read CSV data from any reader. The first record is the header row.
pub fn read_csv<R: Read>(reader: R) -> Result<RowStore> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_reader(reader);

    let headers: Vec<String> = csv_reader
        .headers()
        .context("Failed to read CSV headers")?
        .iter()
        .map(|h| h.to_string())
        .collect();

    if headers.is_empty() {
        anyhow::bail!("CSV input has no header row");
    }

    let mut records = Vec::new();
    for (idx, result) in csv_reader.records().enumerate() {
        let record = result.with_context(|| format!("Failed to read CSV record {}", idx + 1))?;
        records.push(record.iter().map(|field| field.to_string()).collect());
    }

    Ok(RowStore::from_records(headers, records))
}

/// Read CSV data from a file on disk
pub fn read_csv_from_path(path: &Path) -> Result<RowStore> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open CSV file '{}'", path.display()))?;
    read_csv(file)
}

/// Read CSV data from stdin
pub fn read_csv_from_stdin() -> Result<RowStore> {
    read_csv(io::stdin().lock())
}
