//! Module to parse the result table exported by the Enrichr web service
//!
//! # Example lines
//!
//! ```text
//! Term    Overlap  P-value  Adjusted P-value  Old P-value  Old Adjusted P-value  Odds Ratio  Combined Score  Genes
//! Apoptosis  3/87  0.00012  0.0043  0  0  17.1  154.3  TP53;CASP3;BAX
//! ```
//!
//! Only `Term`, `Overlap`, `P-value`, `Adjusted P-value` and `Genes` are used.
use std::io::BufRead;

use crate::parser::column_indices;
use crate::report::EnrichmentRow;
use crate::{EnrichError, EnrichResult};

const COLUMNS: [&str; 5] = ["Term", "Overlap", "P-value", "Adjusted P-value", "Genes"];

/// Parses `k/K`
fn overlap(value: &str) -> EnrichResult<(u64, u64)> {
    let Some((k, big_k)) = value.trim().split_once('/') else {
        return Err(EnrichError::InvalidInput(format!("invalid overlap {value}")));
    };
    Ok((k.trim().parse()?, big_k.trim().parse()?))
}

fn pvalue(value: &str) -> EnrichResult<f64> {
    match value.trim().parse::<f64>() {
        Ok(p) if (0.0..=1.0).contains(&p) => Ok(p),
        _ => Err(EnrichError::InvalidInput(format!("invalid p-value {value}"))),
    }
}

fn parse_line(
    line: &str,
    indices: &[usize; 5],
    gene_set: &str,
    cutoff: f64,
) -> EnrichResult<EnrichmentRow> {
    let cols: Vec<&str> = line.trim_end_matches(['\r', '\n']).split('\t').collect();
    let col = |idx: usize| {
        cols.get(idx)
            .copied()
            .ok_or_else(|| EnrichError::InvalidInput(line.to_string()))
    };
    let [term_idx, overlap_idx, pvalue_idx, adjusted_idx, genes_idx] = *indices;

    let adjusted = pvalue(col(adjusted_idx)?)?;
    let genes = col(genes_idx)?
        .split(';')
        .map(str::trim)
        .filter(|gene| !gene.is_empty())
        .map(ToString::to_string)
        .collect();

    Ok(EnrichmentRow::new(
        gene_set,
        col(term_idx)?.trim(),
        overlap(col(overlap_idx)?)?,
        pvalue(col(pvalue_idx)?)?,
        adjusted,
        adjusted <= cutoff,
        genes,
    ))
}

/// Parses the exported results of `gene_set`
///
/// The reject flag of every row is set based on `cutoff`.
///
/// # Errors
///
/// [`EnrichError::InvalidInput`] if a required column is missing or a value
/// can not be parsed
pub fn read<R: BufRead>(reader: R, gene_set: &str, cutoff: f64) -> EnrichResult<Vec<EnrichmentRow>> {
    let mut lines = reader.lines();
    let header = match lines.next() {
        Some(Ok(header)) => header,
        _ => {
            return Err(EnrichError::InvalidInput(
                "Enrichr results must contain a header".to_string(),
            ))
        }
    };
    let indices = column_indices(&header, COLUMNS)?;

    let mut rows = Vec::new();
    for line in lines {
        let line = line
            .map_err(|_| EnrichError::InvalidInput("Invalid data in Enrichr results".to_string()))?;
        if line.trim().is_empty() {
            continue;
        }
        rows.push(parse_line(&line, &indices, gene_set, cutoff)?);
    }
    Ok(rows)
}

#[cfg(test)]
mod test {
    use super::*;

    const HEADER: &str = "Term\tOverlap\tP-value\tAdjusted P-value\tOld P-value\tOld Adjusted P-value\tOdds Ratio\tCombined Score\tGenes";

    #[test]
    fn parse_overlap() {
        assert_eq!(overlap("3/87").unwrap(), (3, 87));
        assert_eq!(overlap(" 0 / 5 ").unwrap(), (0, 5));
        assert!(overlap("3").is_err());
        assert!(overlap("a/5").is_err());
    }

    #[test]
    fn parse_export() {
        let data = format!(
            "{HEADER}\n\
            Apoptosis\t3/87\t0.00012\t0.0043\t0\t0\t17.1\t154.3\tTP53;CASP3;BAX\n\
            Cell cycle\t1/124\t0.2\t0.3\t0\t0\t2.1\t3.2\tTP53\n"
        );
        let rows = read(data.as_bytes(), "KEGG_2021_Human", 0.05).unwrap();
        assert_eq!(rows.len(), 2);

        let first = &rows[0];
        assert_eq!(first.gene_set(), "KEGG_2021_Human");
        assert_eq!(first.term(), "Apoptosis");
        assert_eq!(first.overlap_label(), "3/87");
        assert!((first.pvalue() - 0.00012).abs() < f64::EPSILON);
        assert!(first.reject());
        assert_eq!(first.genes(), &["TP53", "CASP3", "BAX"]);

        assert!(!rows[1].reject());
    }

    #[test]
    fn missing_column() {
        let data = "Term\tOverlap\tP-value\tGenes\nA\t1/2\t0.1\tX\n";
        assert!(read(data.as_bytes(), "lib", 0.05).is_err());
    }

    #[test]
    fn short_line() {
        let data = format!("{HEADER}\nApoptosis\t3/87\n");
        assert!(read(data.as_bytes(), "lib", 0.05).is_err());
    }

    #[test]
    fn empty_body() {
        let rows = read(HEADER.as_bytes(), "lib", 0.05).unwrap();
        assert!(rows.is_empty());
    }
}
