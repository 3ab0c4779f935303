//! Enrichment results and their tabular output
//!
//! Every row of a report follows the same schema, regardless of whether the
//! statistics were calculated locally or retrieved from a remote service:
//!
//! | Column | Content |
//! | --- | --- |
//! | `Gene_set` | Name of the gene set library |
//! | `Term` | Name of the term |
//! | `Overlap` | `k/K`, overlapping genes / term genes in the background |
//! | `P-value` | Raw p-value of the hypergeometric test |
//! | `Adjusted P-value` | Benjamini-Hochberg adjusted p-value |
//! | `Reject (FDR<alpha)` | `True` if the adjusted p-value is `<= alpha` |
//! | `Genes` | Overlapping genes, separated by `;` |
//!
//! p-values below `1e-4` are written in scientific notation, e.g. `1e-60`.
use std::io::Write;

use crate::genes::{GeneId, Query};
use crate::stats::correction::{correct, CorrectionMethod};
use crate::stats::TermTest;
use crate::EnrichResult;

/// p-values below this threshold are written in scientific notation
const SCIENTIFIC_BELOW: f64 = 1e-4;

fn format_pvalue(pvalue: f64) -> String {
    if pvalue > 0.0 && pvalue < SCIENTIFIC_BELOW {
        format!("{pvalue:e}")
    } else {
        format!("{pvalue}")
    }
}

/// A single term of an [`EnrichmentReport`]
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichmentRow {
    gene_set: String,
    term: String,
    overlap: u64,
    term_size: u64,
    pvalue: f64,
    adjusted_pvalue: f64,
    reject: bool,
    genes: Vec<String>,
}

impl EnrichmentRow {
    /// Constructs a new [`EnrichmentRow`]
    ///
    /// `overlap` is the tuple `(k, K)`
    pub fn new(
        gene_set: &str,
        term: &str,
        overlap: (u64, u64),
        pvalue: f64,
        adjusted_pvalue: f64,
        reject: bool,
        genes: Vec<String>,
    ) -> Self {
        Self {
            gene_set: gene_set.to_string(),
            term: term.to_string(),
            overlap: overlap.0,
            term_size: overlap.1,
            pvalue,
            adjusted_pvalue,
            reject,
            genes,
        }
    }

    fn from_test<F>(
        gene_set: &str,
        test: TermTest,
        adjusted_pvalue: f64,
        reject: bool,
        label: &F,
    ) -> Self
    where
        F: Fn(&GeneId) -> String,
    {
        Self {
            gene_set: gene_set.to_string(),
            term: test.term().to_string(),
            overlap: test.overlap(),
            term_size: test.term_size(),
            pvalue: test.pvalue(),
            adjusted_pvalue,
            reject,
            genes: test.genes().iter().map(label).collect(),
        }
    }

    /// The name of the gene set library
    pub fn gene_set(&self) -> &str {
        &self.gene_set
    }

    /// The name of the term
    pub fn term(&self) -> &str {
        &self.term
    }

    /// The number of overlapping genes (`k`)
    pub fn overlap(&self) -> u64 {
        self.overlap
    }

    /// The number of term genes in the background (`K`)
    pub fn term_size(&self) -> u64 {
        self.term_size
    }

    /// The overlap formatted as `k/K`
    pub fn overlap_label(&self) -> String {
        format!("{}/{}", self.overlap, self.term_size)
    }

    /// The raw p-value
    pub fn pvalue(&self) -> f64 {
        self.pvalue
    }

    /// The FDR adjusted p-value
    pub fn adjusted_pvalue(&self) -> f64 {
        self.adjusted_pvalue
    }

    /// `true` if the term is significantly enriched
    pub fn reject(&self) -> bool {
        self.reject
    }

    /// The overlapping genes
    pub fn genes(&self) -> &[String] {
        &self.genes
    }

    fn write_tsv<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        writeln!(
            writer,
            "{}\t{}\t{}\t{}\t{}\t{}\t{}",
            self.gene_set,
            self.term,
            self.overlap_label(),
            format_pvalue(self.pvalue),
            format_pvalue(self.adjusted_pvalue),
            if self.reject { "True" } else { "False" },
            self.genes.join(";")
        )
    }
}

/// The column names of a report with the significance threshold `cutoff`
pub fn columns(cutoff: f64) -> [String; 7] {
    [
        "Gene_set".to_string(),
        "Term".to_string(),
        "Overlap".to_string(),
        "P-value".to_string(),
        "Adjusted P-value".to_string(),
        format!("Reject (FDR<{cutoff})"),
        "Genes".to_string(),
    ]
}

fn write_header<W: Write>(writer: &mut W, cutoff: f64) -> std::io::Result<()> {
    writeln!(writer, "{}", columns(cutoff).join("\t"))
}

/// The enrichment of all terms of one gene set library
///
/// The rows are sorted by ascending raw p-value. Terms with the same p-value
/// stay in the order of the library.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichmentReport {
    gene_set: String,
    cutoff: f64,
    rows: Vec<EnrichmentRow>,
}

impl EnrichmentReport {
    /// Assembles the report from the raw tests of one library
    ///
    /// All p-values are corrected together with the Benjamini-Hochberg
    /// procedure, using the number of terms of this library only.
    ///
    /// # Errors
    ///
    /// [`crate::EnrichError::InvalidInput`] if a p-value is not within `[0, 1]`
    pub fn assemble(gene_set: &str, tests: Vec<TermTest>, cutoff: f64) -> EnrichResult<Self> {
        Self::build(gene_set, tests, cutoff, CorrectionMethod::default(), &|gene: &GeneId| {
            gene.to_string()
        })
    }

    /// Assembles the report with the correction `method`
    ///
    /// The overlapping genes are reported as they were provided to `query`.
    ///
    /// # Errors
    ///
    /// [`crate::EnrichError::InvalidInput`] if a p-value is not within `[0, 1]`
    pub fn assemble_with(
        gene_set: &str,
        tests: Vec<TermTest>,
        cutoff: f64,
        method: CorrectionMethod,
        query: &Query,
    ) -> EnrichResult<Self> {
        Self::build(gene_set, tests, cutoff, method, &|gene: &GeneId| {
            query.label(gene).into_owned()
        })
    }

    fn build<F>(
        gene_set: &str,
        tests: Vec<TermTest>,
        cutoff: f64,
        method: CorrectionMethod,
        label: &F,
    ) -> EnrichResult<Self>
    where
        F: Fn(&GeneId) -> String,
    {
        let pvalues: Vec<f64> = tests.iter().map(TermTest::pvalue).collect();
        let (adjusted, reject) = correct(&pvalues, cutoff, method)?.into_parts();

        let rows = tests
            .into_iter()
            .zip(adjusted)
            .zip(reject)
            .map(|((test, adj), rej)| EnrichmentRow::from_test(gene_set, test, adj, rej, label))
            .collect();
        Ok(Self::from_rows(gene_set, rows, cutoff))
    }

    /// Constructs a report from precomputed rows
    pub fn from_rows(gene_set: &str, mut rows: Vec<EnrichmentRow>, cutoff: f64) -> Self {
        rows.sort_by(|a, b| a.pvalue.total_cmp(&b.pvalue));
        Self {
            gene_set: gene_set.to_string(),
            cutoff,
            rows,
        }
    }

    /// The name of the gene set library
    pub fn gene_set(&self) -> &str {
        &self.gene_set
    }

    /// The significance threshold of the adjusted p-value
    pub fn cutoff(&self) -> f64 {
        self.cutoff
    }

    /// All rows, sorted by p-value
    pub fn rows(&self) -> &[EnrichmentRow] {
        &self.rows
    }

    /// Returns the number of terms
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns `true` if the report contains no terms
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Iterates all significantly enriched terms
    pub fn significant(&self) -> impl Iterator<Item = &EnrichmentRow> {
        self.rows.iter().filter(|row| row.reject)
    }

    /// Writes the report as tab separated table, including the header
    ///
    /// # Errors
    ///
    /// If writing fails
    pub fn write_tsv<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        write_header(writer, self.cutoff)?;
        for row in &self.rows {
            row.write_tsv(writer)?;
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a EnrichmentReport {
    type Item = &'a EnrichmentRow;
    type IntoIter = std::slice::Iter<'a, EnrichmentRow>;
    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

/// The reports of all gene set libraries of one run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnrichmentResults {
    reports: Vec<EnrichmentReport>,
}

impl EnrichmentResults {
    /// Constructs a new, empty [`EnrichmentResults`]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a report
    pub fn push(&mut self, report: EnrichmentReport) {
        self.reports.push(report);
    }

    /// All reports, in the order of the requested libraries
    pub fn reports(&self) -> &[EnrichmentReport] {
        &self.reports
    }

    /// The most recent report
    pub fn last(&self) -> Option<&EnrichmentReport> {
        self.reports.last()
    }

    /// Iterates the rows of all reports
    ///
    /// Each report keeps its own ranking
    pub fn rows(&self) -> impl Iterator<Item = &EnrichmentRow> {
        self.reports.iter().flat_map(|report| report.rows.iter())
    }

    /// Returns the total number of rows
    pub fn len(&self) -> usize {
        self.reports.iter().map(EnrichmentReport::len).sum()
    }

    /// Returns `true` if there are no rows
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Writes all reports as one tab separated table
    ///
    /// # Errors
    ///
    /// If writing fails
    pub fn write_tsv<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        let Some(first) = self.reports.first() else {
            return Ok(());
        };
        write_header(writer, first.cutoff)?;
        for row in self.rows() {
            row.write_tsv(writer)?;
        }
        Ok(())
    }
}
