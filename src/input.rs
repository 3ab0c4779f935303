//! The accepted forms of gene lists and gene set libraries
use std::path::{Path, PathBuf};

use crate::parser::gene_list;
use crate::{EnrichError, EnrichResult};

/// A list of query genes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GeneListInput {
    /// Gene identifiers
    Genes(Vec<String>),
    /// Table rows
    ///
    /// Rows with one column contain the gene, rows with two columns are
    /// joined with `,` and rows with more columns are reduced to the first
    /// three, joined with tabs.
    Rows(Vec<Vec<String>>),
    /// A file with one gene per line
    File(PathBuf),
}

impl GeneListInput {
    /// Returns the gene identifiers
    ///
    /// # Errors
    ///
    /// - [`EnrichError::CannotOpenFile`]: The gene list file can not be opened
    /// - [`EnrichError::InvalidInput`]: A row has no columns or the file contains invalid data
    pub fn load(&self) -> EnrichResult<Vec<String>> {
        match self {
            GeneListInput::Genes(genes) => Ok(genes.clone()),
            GeneListInput::Rows(rows) => rows.iter().map(|row| join_row(row)).collect(),
            GeneListInput::File(path) => gene_list::read_file(path),
        }
    }
}

fn join_row(row: &[String]) -> EnrichResult<String> {
    match row {
        [] => Err(EnrichError::InvalidInput("empty gene list row".to_string())),
        [gene] => Ok(gene.clone()),
        [gene, weight] => Ok(format!("{gene},{weight}")),
        [first, second, third, ..] => Ok(format!("{first}\t{second}\t{third}")),
    }
}

impl From<Vec<String>> for GeneListInput {
    fn from(genes: Vec<String>) -> Self {
        GeneListInput::Genes(genes)
    }
}

impl From<&[&str]> for GeneListInput {
    fn from(genes: &[&str]) -> Self {
        GeneListInput::Genes(genes.iter().map(ToString::to_string).collect())
    }
}

impl From<&Path> for GeneListInput {
    fn from(path: &Path) -> Self {
        GeneListInput::File(path.to_path_buf())
    }
}

/// A gene set library
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GeneSetInput {
    /// The name of a library, hosted by Enrichr or a local `GMT` file
    Library(String),
    /// In-memory terms and their genes
    Mapping(Vec<(String, Vec<String>)>),
    /// A local `GMT` file
    Gmt(PathBuf),
}

impl GeneSetInput {
    /// Parses a comma separated list of libraries
    ///
    /// Entries ending with `.gmt` are treated as files
    ///
    /// # Examples
    ///
    /// ```
    /// use gsenrich::GeneSetInput;
    ///
    /// let libraries = GeneSetInput::parse_list("KEGG_2021_Human, data/my.gmt");
    /// assert_eq!(libraries.len(), 2);
    /// assert_eq!(libraries[0], GeneSetInput::Library("KEGG_2021_Human".to_string()));
    /// assert_eq!(libraries[1], GeneSetInput::Gmt("data/my.gmt".into()));
    /// ```
    pub fn parse_list(value: &str) -> Vec<GeneSetInput> {
        value
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(GeneSetInput::from)
            .collect()
    }
}

impl From<&str> for GeneSetInput {
    fn from(name: &str) -> Self {
        if name.to_lowercase().ends_with(".gmt") {
            GeneSetInput::Gmt(PathBuf::from(name))
        } else {
            GeneSetInput::Library(name.to_string())
        }
    }
}
