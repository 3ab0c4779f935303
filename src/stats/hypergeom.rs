//! Calculate the overlap of every term of a [`GeneSetCollection`] with the
//! [`Query`] and the probability of the overlap within the hypergeometric
//! distribution.
//!
//! Both the query and the terms are restricted to the genes of the
//! [`Background`] before anything is counted, so genes outside of the
//! universe never contribute to the overlap, the term size or the query size.
//!
//! # Examples
//!
//! ```
//! use gsenrich::{Background, GeneSetCollection, IdKind, Query};
//! use gsenrich::stats::hypergeom::term_enrichment;
//!
//! let background = Background::from_genes((1..=20).map(|i| i.to_string()), IdKind::Entrez);
//! let query = Query::new(["1", "2", "3", "6"]);
//!
//! let mut collection = GeneSetCollection::new();
//! collection.insert_raw("term A", ["1", "2", "3", "4", "5"], IdKind::Entrez);
//! collection.insert_raw("term B", ["18", "19"], IdKind::Entrez);
//!
//! let tests = term_enrichment(&background, &query, &collection).unwrap();
//!
//! // the results are in the order of the collection
//! assert_eq!(tests[0].term(), "term A");
//! assert_eq!(tests[0].overlap(), 3);
//! assert_eq!(tests[0].term_size(), 5);
//! assert!((tests[0].pvalue() - 155.0 / 4845.0).abs() < 1e-12);
//!
//! // no overlap, no enrichment
//! assert_eq!(tests[1].overlap(), 0);
//! assert_eq!(tests[1].pvalue(), 1.0);
//! ```

use std::collections::HashSet;

use tracing::{debug, warn};

use crate::background::Background;
use crate::genes::{GeneId, Query};
use crate::geneset::{GeneSet, GeneSetCollection};
use crate::stats::{OverlapGenes, TermTest};
use crate::{u64_from_usize, EnrichError, EnrichResult};

mod distribution;
pub use distribution::Hypergeometric;

/// Calculates the hypergeometric enrichment of every term of `collection`
/// in the `query` compared to the `background`
///
/// Every term of the collection is part of the result, in the order of the
/// collection. Terms without overlap have a p-value of `1.0`.
///
/// With the `rayon` feature enabled, terms are tested in parallel.
///
/// # Errors
///
/// [`EnrichError::InvalidInput`] if the query or a term contains more genes
/// than the background. This can only happen if the background is given as
/// [`Background::Size`].
pub fn term_enrichment(
    background: &Background,
    query: &Query,
    collection: &GeneSetCollection,
) -> EnrichResult<Vec<TermTest>> {
    if let Some(kind) = background.kind() {
        if !query.is_empty() && kind != query.kind() {
            warn!(
                "Query uses {} but the background uses {}. No gene will overlap",
                query.kind(),
                kind
            );
        }
    }

    let population = background.len();
    let draws = u64_from_usize(query.iter().filter(|gene| background.contains(gene)).count());
    if draws > population {
        return Err(EnrichError::InvalidInput(format!(
            "the query contains {draws} genes, but the background only {population}"
        )));
    }
    debug!("Population: {}, Draws: {}", population, draws);

    evaluate(collection.as_slice(), |term| {
        test_term(background, query, population, draws, term)
    })
}

#[cfg(not(feature = "rayon"))]
fn evaluate<F>(terms: &[GeneSet], f: F) -> EnrichResult<Vec<TermTest>>
where
    F: Fn(&GeneSet) -> EnrichResult<TermTest>,
{
    terms.iter().map(f).collect()
}

#[cfg(feature = "rayon")]
fn evaluate<F>(terms: &[GeneSet], f: F) -> EnrichResult<Vec<TermTest>>
where
    F: Fn(&GeneSet) -> EnrichResult<TermTest> + Sync + Send,
{
    use rayon::prelude::*;
    // indexed parallel iterators keep the order of the input
    terms.par_iter().map(f).collect()
}

fn test_term(
    background: &Background,
    query: &Query,
    population: u64,
    draws: u64,
    term: &GeneSet,
) -> EnrichResult<TermTest> {
    let members: HashSet<&GeneId> = term
        .genes()
        .iter()
        .filter(|gene| background.contains(gene))
        .collect();
    let successes = u64_from_usize(members.len());

    let genes: OverlapGenes = query
        .iter()
        .filter(|gene| background.contains(gene) && members.contains(gene))
        .cloned()
        .collect();
    let observed = u64_from_usize(genes.len());

    let hyper = Hypergeometric::new(population, successes, draws).map_err(|_| {
        EnrichError::InvalidInput(format!(
            "{} contains {} genes, but the background only {}",
            term.name(),
            successes,
            population
        ))
    })?;
    let pvalue = hyper.pvalue(observed);

    debug!(
        "Term:{}\tPopulation: {}, Successes: {}, Draws: {}, Observed: {}",
        term.name(),
        population,
        successes,
        draws,
        observed
    );
    Ok(TermTest::new(term.name(), successes, genes, pvalue))
}
