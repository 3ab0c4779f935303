//! Statistical analyses for gene set over-representation
//!
//! This module contains the per-term hypergeometric test ([`hypergeom`]) and
//! the multiple testing correction ([`correction`]) that turns the raw
//! p-values of one gene set library into FDR-adjusted p-values.
//!
//! At the moment, `gsenrich` provides only the one-sided hypergeometric test
//! (Fisher's exact test for over-representation).

use smallvec::SmallVec;

use crate::genes::GeneId;
use crate::DEFAULT_NUM_OVERLAP_GENES;

pub mod correction;
pub mod hypergeom;

/// The genes of a term that overlap with the query, in query order
pub type OverlapGenes = SmallVec<[GeneId; DEFAULT_NUM_OVERLAP_GENES]>;

/// The overlap and p-value of a single term
///
/// [`TermTest`] is returned from [`hypergeom::term_enrichment`]
#[derive(Debug, Clone, PartialEq)]
pub struct TermTest {
    term: String,
    overlap: u64,
    term_size: u64,
    genes: OverlapGenes,
    pvalue: f64,
}

impl TermTest {
    /// Constructs a new [`TermTest`]
    pub fn new(term: &str, term_size: u64, genes: OverlapGenes, pvalue: f64) -> Self {
        Self {
            term: term.to_string(),
            overlap: crate::u64_from_usize(genes.len()),
            term_size,
            genes,
            pvalue,
        }
    }

    /// The name of the term
    pub fn term(&self) -> &str {
        &self.term
    }

    /// The number of query genes in the term (`k`)
    pub fn overlap(&self) -> u64 {
        self.overlap
    }

    /// The number of term genes that are part of the background (`K`)
    pub fn term_size(&self) -> u64 {
        self.term_size
    }

    /// The overlapping genes, in the order of the query
    pub fn genes(&self) -> &[GeneId] {
        &self.genes
    }

    /// Returns the p-value of the enrichment
    ///
    /// The p-value indicates the probability to observe at least
    /// [`TermTest::overlap`] genes by chance
    pub fn pvalue(&self) -> f64 {
        self.pvalue
    }
}
