//! Parsing of gene lists, gene set libraries and annotation tables

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::{EnrichError, EnrichResult};

pub mod annotation_table;
pub mod enrichr_export;

/// Module to parse plain gene lists, one gene per line
pub mod gene_list {
    use super::{open, BufRead, EnrichError, EnrichResult, Path};

    /// Reads one gene per line, skipping empty lines
    ///
    /// # Errors
    ///
    /// If the data can not be read
    pub fn read<R: BufRead>(reader: R) -> EnrichResult<Vec<String>> {
        let mut genes = Vec::new();
        for line in reader.lines() {
            let line = line
                .map_err(|_| EnrichError::InvalidInput("Invalid data in gene list".to_string()))?;
            let gene = line.trim();
            if !gene.is_empty() {
                genes.push(gene.to_string());
            }
        }
        Ok(genes)
    }

    /// Reads a gene list file
    ///
    /// # Errors
    ///
    /// - [`EnrichError::CannotOpenFile`]: Source file not present or can't be opened
    /// - [`EnrichError::InvalidInput`]: The file contains invalid data
    pub fn read_file<P: AsRef<Path>>(file: P) -> EnrichResult<Vec<String>> {
        read(open(file)?)
    }

    #[cfg(test)]
    mod test_gene_list {
        use super::*;

        #[test]
        fn skips_empty_lines() {
            let data = "TP53\n\n  KRAS \r\nBRCA1".as_bytes();
            assert_eq!(read(data).unwrap(), vec!["TP53", "KRAS", "BRCA1"]);
        }

        #[test]
        fn missing_file() {
            assert!(matches!(
                read_file("/does/not/exist.txt"),
                Err(EnrichError::CannotOpenFile(_))
            ));
        }
    }
}

/// Module to parse gene set libraries in `GMT` format
///
/// Each line describes one term:
///
/// ```text
/// term<TAB>description<TAB>gene1<TAB>gene2<TAB>...
/// ```
///
/// The description is ignored.
pub mod gmt {
    use tracing::trace;

    use super::{open, BufRead, EnrichError, EnrichResult, Path};
    use crate::genes::IdKind;
    use crate::geneset::GeneSetCollection;

    struct ParsedTerm<'a> {
        name: &'a str,
        genes: Vec<&'a str>,
    }

    fn parse_line(line: &str) -> EnrichResult<Option<ParsedTerm<'_>>> {
        let line = line.trim_end_matches(['\r', '\n']);
        if line.trim().is_empty() {
            return Ok(None);
        }
        let mut cols = line.split('\t');

        // Column 1 is the term name
        let name = match cols.next().map(str::trim) {
            Some(name) if !name.is_empty() => name,
            _ => return Err(EnrichError::InvalidInput(line.to_string())),
        };

        // Column 2 is the description
        if cols.next().is_none() {
            return Err(EnrichError::InvalidInput(line.to_string()));
        }

        let genes = cols
            .map(str::trim)
            .filter(|gene| !gene.is_empty())
            .collect();
        Ok(Some(ParsedTerm { name, genes }))
    }

    /// Parses a `GMT` library, coercing all genes to `kind`
    ///
    /// # Errors
    ///
    /// [`EnrichError::InvalidInput`] if a line has no description column
    pub fn read<R: BufRead>(reader: R, kind: IdKind) -> EnrichResult<GeneSetCollection> {
        let mut collection = GeneSetCollection::new();
        for line in reader.lines() {
            let line =
                line.map_err(|_| EnrichError::InvalidInput("Invalid data in GMT file".to_string()))?;
            match parse_line(&line)? {
                Some(term) => {
                    collection.insert_raw(term.name, term.genes, kind);
                }
                None => trace!("Ignoring empty line"),
            }
        }
        Ok(collection)
    }

    /// Parses a `GMT` file, coercing all genes to `kind`
    ///
    /// # Errors
    ///
    /// - [`EnrichError::CannotOpenFile`]: Source file not present or can't be opened
    /// - [`EnrichError::InvalidInput`]: A line has no description column
    pub fn read_file<P: AsRef<Path>>(file: P, kind: IdKind) -> EnrichResult<GeneSetCollection> {
        read(open(file)?, kind)
    }

}

fn open<P: AsRef<Path>>(file: P) -> EnrichResult<BufReader<File>> {
    let filename = file.as_ref().display().to_string();
    let file = File::open(file).map_err(|_| EnrichError::CannotOpenFile(filename))?;
    Ok(BufReader::new(file))
}

/// Returns the index of every `names` column in the tab separated `header`
fn column_indices<const N: usize>(header: &str, names: [&str; N]) -> EnrichResult<[usize; N]> {
    let cols: Vec<&str> = header
        .trim_end_matches(['\r', '\n'])
        .split('\t')
        .map(str::trim)
        .collect();
    let mut indices = [0; N];
    for (idx, name) in indices.iter_mut().zip(names) {
        *idx = cols
            .iter()
            .position(|col| *col == name)
            .ok_or_else(|| EnrichError::InvalidInput(format!("missing column {name}")))?;
    }
    Ok(indices)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn find_columns() {
        let idx = column_indices("a\tb\tc\r\n", ["c", "a"]).unwrap();
        assert_eq!(idx, [2, 0]);
        assert!(column_indices("a\tb", ["x"]).is_err());
    }
}
