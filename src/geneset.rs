//! Named gene sets (terms) and collections of them
use std::collections::{HashMap, HashSet};

use tracing::{trace, warn};

use crate::genes::{GeneId, IdKind};

/// A single term, e.g. a pathway, with its member genes
///
/// Each gene occurs only once, the order of insertion is kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneSet {
    name: String,
    genes: Vec<GeneId>,
}

impl GeneSet {
    /// Constructs a new [`GeneSet`], removing duplicated genes
    pub fn new<I: IntoIterator<Item = GeneId>>(name: &str, genes: I) -> Self {
        let mut seen = HashSet::new();
        let genes = genes
            .into_iter()
            .filter(|gene| seen.insert(gene.clone()))
            .collect();
        Self {
            name: name.to_string(),
            genes,
        }
    }

    /// The name of the term
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The member genes of the term
    pub fn genes(&self) -> &[GeneId] {
        &self.genes
    }

    /// Returns the number of member genes
    pub fn len(&self) -> usize {
        self.genes.len()
    }

    /// Returns `true` if the term has no genes
    pub fn is_empty(&self) -> bool {
        self.genes.is_empty()
    }
}

/// A library of [`GeneSet`]s, e.g. all KEGG pathways
///
/// Term names are unique within the collection and the terms are
/// kept in the order they were added.
///
/// # Examples
///
/// ```
/// use gsenrich::{GeneSetCollection, IdKind};
///
/// let mut collection = GeneSetCollection::new();
/// collection.insert_raw("Pathway A", ["TP53", "MDM2"], IdKind::Symbol);
/// collection.insert_raw("Pathway B", ["KRAS"], IdKind::Symbol);
///
/// assert_eq!(collection.len(), 2);
/// assert_eq!(collection.get("Pathway A").unwrap().len(), 2);
/// ```
#[derive(Debug, Clone, Default)]
pub struct GeneSetCollection {
    terms: Vec<GeneSet>,
    index: HashMap<String, usize>,
}

impl GeneSetCollection {
    /// Constructs a new, empty [`GeneSetCollection`]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a [`GeneSet`] to the collection
    ///
    /// If a term with the same name exists already, its genes are replaced
    /// but it keeps its original position.
    ///
    /// Returns `true` if the term was newly inserted.
    pub fn insert(&mut self, term: GeneSet) -> bool {
        if let Some(idx) = self.index.get(term.name()) {
            warn!("Duplicate term {}, replacing its genes", term.name());
            self.terms[*idx] = term;
            false
        } else {
            self.index.insert(term.name().to_string(), self.terms.len());
            self.terms.push(term);
            true
        }
    }

    /// Adds a term from raw identifiers, coercing them to `kind`
    ///
    /// Identifiers that are not valid for `kind` (e.g. symbols in an
    /// Entrez collection) can never be part of the background and are skipped.
    pub fn insert_raw<I, S>(&mut self, name: &str, genes: I, kind: IdKind) -> bool
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let genes = genes.into_iter().filter_map(|gene| {
            let gene = gene.as_ref();
            if gene.trim().is_empty() {
                return None;
            }
            match GeneId::parse(gene, kind) {
                Ok(id) => Some(id),
                Err(_) => {
                    trace!("Skipping {} in {}, it is not an {}", gene, name, kind);
                    None
                }
            }
        });
        self.insert(GeneSet::new(name, genes))
    }

    /// Returns the term with the given name
    pub fn get(&self, name: &str) -> Option<&GeneSet> {
        self.index.get(name).map(|idx| &self.terms[*idx])
    }

    /// Returns the number of terms
    pub fn len(&self) -> usize {
        self.terms.len()
    }

    /// Returns `true` if the collection has no terms
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Iterates all terms in insertion order
    pub fn iter(&self) -> std::slice::Iter<'_, GeneSet> {
        self.terms.iter()
    }

    /// The terms as a slice, in insertion order
    pub fn as_slice(&self) -> &[GeneSet] {
        &self.terms
    }
}

impl<'a> IntoIterator for &'a GeneSetCollection {
    type Item = &'a GeneSet;
    type IntoIter = std::slice::Iter<'a, GeneSet>;
    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl FromIterator<GeneSet> for GeneSetCollection {
    fn from_iter<T: IntoIterator<Item = GeneSet>>(iter: T) -> Self {
        let mut collection = GeneSetCollection::new();
        for term in iter {
            collection.insert(term);
        }
        collection
    }
}
