#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

use std::num::ParseIntError;

use thiserror::Error;

pub mod background;
pub mod genes;
pub mod geneset;
pub mod input;
pub mod parser;
pub mod remote;
pub mod report;
pub mod retry;
pub mod stats;

mod enrichr;

pub use background::{Background, BackgroundSpec};
pub use enrichr::{Enrichr, EnrichrConfig};
pub use genes::{GeneId, IdKind, Query};
pub use geneset::{GeneSet, GeneSetCollection};
pub use input::{GeneListInput, GeneSetInput};
pub use report::{EnrichmentReport, EnrichmentResults, EnrichmentRow};
pub use retry::RetryPolicy;

/// Default significance threshold for the adjusted p-value
pub const DEFAULT_CUTOFF: f64 = 0.05;

/// Default annotation dataset used as background universe
pub const DEFAULT_BACKGROUND: &str = "hsapiens_gene_ensembl";

/// Collection name for gene sets that were provided in-memory
pub const CUSTOM_GENE_SET: &str = "custom";

const DEFAULT_NUM_OVERLAP_GENES: usize = 8;

/// Main Error type for this crate
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum EnrichError {
    /// A gene set library can not be resolved to any source
    #[error("unable to resolve gene set library: {0}")]
    UnresolvedLibrary(String),
    /// The background annotation can not be retrieved
    #[error("unable to retrieve background annotation: {0}")]
    BackgroundFetch(String),
    /// The remote enrichment service failed to deliver results
    #[error("remote results for {library} failed after {attempts} attempts: {reason}")]
    RemoteResult {
        /// The requested gene set library
        library: String,
        /// Number of attempts until giving up
        attempts: u32,
        /// The error message of the last attempt
        reason: String,
    },
    /// Failed to open a file
    #[error("cannot open file {0}")]
    CannotOpenFile(String),
    /// Invalid data
    #[error("invalid input data: {0}")]
    InvalidInput(String),
    /// Failed to parse an Integer
    #[error("unable to parse Integer")]
    ParseIntError,
    /// Failed to read or write data
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<ParseIntError> for EnrichError {
    fn from(_: ParseIntError) -> Self {
        EnrichError::ParseIntError
    }
}

/// Shortcut for `Result<T, EnrichError>`
pub type EnrichResult<T> = Result<T, EnrichError>;

/// We frequently convert counts to `f64` for the statistics.
/// Counts are bounded by the number of genes, which never comes
/// close to the 2^53 precision limit.
fn f64_from_usize(n: usize) -> f64 {
    let intermediate: u32 = n
        .try_into()
        .expect("gene counts must fit into u32");
    intermediate.into()
}

fn u64_from_usize(n: usize) -> u64 {
    n.try_into().expect("usize always fits into u64")
}
