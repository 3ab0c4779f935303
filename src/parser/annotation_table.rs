//! Module to read and write annotation tables, e.g. from BioMart
//!
//! The table is tab separated and must have a header row that contains at
//! least the columns `entrez_id`, `gene_name` and `go_id`. Other columns
//! are ignored.
//!
//! ```text
//! entrez_id   gene_name   go_id
//! 7157        TP53        GO:0006915
//! 672         BRCA1
//! ```
use std::io::{BufRead, Write};

use crate::background::{AnnotationRow, AnnotationTable};
use crate::parser::column_indices;
use crate::{EnrichError, EnrichResult};

const COLUMNS: [&str; 3] = ["entrez_id", "gene_name", "go_id"];

/// Returns `None` for empty or missing values
fn non_null(value: Option<&str>) -> Option<&str> {
    match value.map(str::trim) {
        None | Some("" | "NA" | "NaN" | "nan" | "None") => None,
        Some(value) => Some(value),
    }
}

/// Parses an Entrez ID
///
/// Tables with missing values often store the IDs as floats, e.g. `7157.0`
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn entrez_id(value: &str) -> EnrichResult<u32> {
    if let Ok(id) = value.parse::<u32>() {
        return Ok(id);
    }
    match value.parse::<f64>() {
        // `id` is a non-negative integer within range
        Ok(id) if id.fract() == 0.0 && (0.0..=f64::from(u32::MAX)).contains(&id) => Ok(id as u32),
        _ => Err(EnrichError::InvalidInput(format!("invalid entrez_id {value}"))),
    }
}

fn parse_line(line: &str, indices: &[usize; 3]) -> EnrichResult<AnnotationRow> {
    let cols: Vec<&str> = line.trim_end_matches(['\r', '\n']).split('\t').collect();
    let [entrez_idx, name_idx, go_idx] = *indices;

    let entrez = non_null(cols.get(entrez_idx).copied())
        .map(entrez_id)
        .transpose()?;
    Ok(AnnotationRow::new(
        entrez,
        non_null(cols.get(name_idx).copied()),
        non_null(cols.get(go_idx).copied()),
    ))
}

/// Reads an [`AnnotationTable`]
///
/// # Errors
///
/// [`EnrichError::InvalidInput`] if the header is missing a required column
/// or an `entrez_id` is not numeric
pub fn read<R: BufRead>(reader: R) -> EnrichResult<AnnotationTable> {
    let mut lines = reader.lines();
    let header = match lines.next() {
        Some(Ok(header)) => header,
        _ => {
            return Err(EnrichError::InvalidInput(
                "annotation table must contain a header".to_string(),
            ))
        }
    };
    let indices = column_indices(&header, COLUMNS)?;

    let mut rows = Vec::new();
    for line in lines {
        let line = line
            .map_err(|_| EnrichError::InvalidInput("Invalid data in annotation table".to_string()))?;
        if line.trim().is_empty() {
            continue;
        }
        rows.push(parse_line(&line, &indices)?);
    }
    Ok(AnnotationTable::new(rows))
}

/// Writes an [`AnnotationTable`] in the format understood by [`read`]
///
/// # Errors
///
/// If writing fails
pub fn write<W: Write>(writer: &mut W, table: &AnnotationTable) -> std::io::Result<()> {
    writeln!(writer, "{}", COLUMNS.join("\t"))?;
    for row in table.rows() {
        writeln!(
            writer,
            "{}\t{}\t{}",
            row.entrez_id.map(|id| id.to_string()).unwrap_or_default(),
            row.gene_name.as_deref().unwrap_or_default(),
            row.go_id.as_deref().unwrap_or_default()
        )?;
    }
    Ok(())
}
