//! CSV / TSV source

use std::path::Path;
use crate::Result;
use super::{Cell, Frame};

const UTF8_BOM: &str = "\u{feff}";

/// Read a delimited file. Every non-empty field is kept as text;
/// typing happens in the loader.
pub fn read_csv(path: &Path, delimiter: u8) -> Result<Frame> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .has_headers(true)
        .from_path(path)?;

    let columns: Vec<String> = reader
        .headers()?
        .iter()
        .enumerate()
        .map(|(i, h)| {
            let h = if i == 0 { h.trim_start_matches(UTF8_BOM) } else { h };
            h.trim().to_string()
        })
        .collect();

    let mut frame = Frame::new(columns);
    for record in reader.records() {
        let record = record?;
        let row = record
            .iter()
            .map(|field| {
                if field.trim().is_empty() {
                    Cell::Null
                } else {
                    Cell::Text(field.to_string())
                }
            })
            .collect();
        frame.push_row(row);
    }
    Ok(frame)
}
