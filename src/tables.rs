use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result};
use csv::{ReaderBuilder, Writer, WriterBuilder};

use crate::parser::TranslationRow;

/// Read a tab-delimited input table, dropping rows with no content at all.
pub fn read_input_rows(path: &str) -> Result<Vec<Vec<String>>> {
    let mut reader = ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("Cannot read {}", path))?;
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let row: Vec<String> = record.iter().map(str::to_string).collect();
        if row.iter().all(|cell| cell.trim().is_empty()) {
            continue;
        }
        rows.push(row);
    }
    Ok(rows)
}

pub fn open_output_writer(path: &str) -> Result<Writer<File>> {
    if let Some(dir) = Path::new(path).parent() {
        if !dir.as_os_str().is_empty() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Cannot create {}", dir.display()))?;
        }
    }
    WriterBuilder::new()
        .delimiter(b'\t')
        .quote_style(csv::QuoteStyle::Always)
        .from_path(path)
        .with_context(|| format!("Cannot create {}", path))
}

/// One output row: the input row verbatim, the parsed fields, then an X/O
/// recommendation marker when non-recommended rows are kept too.
pub fn output_record(
    input_row: &[String],
    row: &TranslationRow,
    with_marker: bool,
) -> Vec<String> {
    let mut record: Vec<String> = input_row.to_vec();
    record.push(row.phrase.clone());
    record.push(row.dictionary.clone());
    record.push(row.block_number.to_string());
    record.push(row.block_name.clone());
    record.push(row.author_name.clone());
    record.push(row.author_link.clone());
    record.push(row.comment.clone());
    if with_marker {
        record.push(if row.recommended { "X" } else { "O" }.to_string());
    }
    record
}
