//! Gene identifiers and the query gene list
//!
//! Genes are either identified by their NCBI Entrez ID or by their symbol.
//! A [`Query`] decides which of the two it uses based on the supplied
//! identifiers, and every other input (gene sets, background) must be
//! coerced to the same [`IdKind`] before any statistics are calculated.

use std::borrow::Cow;
use std::collections::{HashMap, HashSet};
use std::fmt::Display;

use crate::EnrichResult;

/// The type of identifier used for genes
#[derive(Clone, Copy, Debug, Default, Hash, PartialEq, Eq)]
pub enum IdKind {
    /// NCBI Entrez gene IDs, e.g. `7157`
    Entrez,
    /// Gene symbols, e.g. `TP53`
    #[default]
    Symbol,
}

impl IdKind {
    /// Returns [`IdKind::Entrez`] if every identifier is an unsigned integer
    ///
    /// An empty list is treated as [`IdKind::Symbol`]
    ///
    /// # Examples
    ///
    /// ```
    /// use gsenrich::IdKind;
    ///
    /// assert_eq!(IdKind::detect(["7157", "672"]), IdKind::Entrez);
    /// assert_eq!(IdKind::detect(["7157", "BRCA1"]), IdKind::Symbol);
    /// ```
    pub fn detect<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut any = false;
        for id in ids {
            any = true;
            if id.as_ref().trim().parse::<u32>().is_err() {
                return IdKind::Symbol;
            }
        }
        if any {
            IdKind::Entrez
        } else {
            IdKind::Symbol
        }
    }
}

impl Display for IdKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IdKind::Entrez => write!(f, "entrez_id"),
            IdKind::Symbol => write!(f, "gene_name"),
        }
    }
}

/// A single gene identifier
#[derive(Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub enum GeneId {
    /// NCBI Entrez gene ID
    Entrez(u32),
    /// Gene symbol, kept with the casing it was provided in
    Symbol(String),
}

impl GeneId {
    /// Parses `value` into a [`GeneId`] of the given kind
    ///
    /// # Errors
    ///
    /// [`crate::EnrichError::ParseIntError`] if an Entrez ID is not an integer
    pub fn parse(value: &str, kind: IdKind) -> EnrichResult<Self> {
        match kind {
            IdKind::Entrez => Ok(GeneId::Entrez(value.trim().parse::<u32>()?)),
            IdKind::Symbol => Ok(GeneId::Symbol(value.trim().to_string())),
        }
    }

    /// The [`IdKind`] of the identifier
    pub fn kind(&self) -> IdKind {
        match self {
            GeneId::Entrez(_) => IdKind::Entrez,
            GeneId::Symbol(_) => IdKind::Symbol,
        }
    }
}

impl From<u32> for GeneId {
    fn from(id: u32) -> Self {
        GeneId::Entrez(id)
    }
}

impl From<&str> for GeneId {
    fn from(symbol: &str) -> Self {
        GeneId::Symbol(symbol.to_string())
    }
}

impl Display for GeneId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GeneId::Entrez(id) => write!(f, "{id}"),
            GeneId::Symbol(symbol) => write!(f, "{symbol}"),
        }
    }
}

/// The genes of interest that are tested for enrichment
///
/// The query keeps the order in which the genes were provided. Duplicated
/// genes are only kept at their first position.
///
/// Entrez IDs are compared as integers, but [`Query::label`] returns them
/// as they were provided, e.g. `0012` instead of `12`.
///
/// # Examples
///
/// ```
/// use gsenrich::{GeneId, IdKind, Query};
///
/// let query = Query::new(["TP53", "BRCA1", "TP53", "KRAS"]);
/// assert_eq!(query.len(), 3);
/// assert_eq!(query.kind(), IdKind::Symbol);
/// assert!(query.contains(&GeneId::from("KRAS")));
/// ```
#[derive(Debug, Clone, Default)]
pub struct Query {
    genes: Vec<GeneId>,
    lookup: HashSet<GeneId>,
    labels: HashMap<GeneId, String>,
    kind: IdKind,
}

impl Query {
    /// Constructs a new [`Query`], detecting the [`IdKind`] from the input
    ///
    /// Empty identifiers are ignored.
    pub fn new<I, S>(genes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let raw: Vec<String> = genes
            .into_iter()
            .map(|gene| gene.as_ref().trim().to_string())
            .filter(|gene| !gene.is_empty())
            .collect();
        let kind = IdKind::detect(&raw);

        let mut query = Query {
            genes: Vec::with_capacity(raw.len()),
            lookup: HashSet::with_capacity(raw.len()),
            labels: HashMap::new(),
            kind,
        };
        for gene in raw {
            let id = match kind {
                IdKind::Entrez => match gene.parse::<u32>() {
                    Ok(id) => GeneId::Entrez(id),
                    // `detect` only returns `Entrez` if every id parses
                    Err(_) => GeneId::Symbol(gene.clone()),
                },
                IdKind::Symbol => GeneId::Symbol(gene.clone()),
            };
            if matches!(id, GeneId::Entrez(_)) && id.to_string() != gene && !query.contains(&id) {
                query.labels.insert(id.clone(), gene);
            }
            query.insert(id);
        }
        query
    }

    /// Constructs a [`Query`] from already typed identifiers
    pub fn from_ids<I: IntoIterator<Item = GeneId>>(genes: I, kind: IdKind) -> Self {
        let mut query = Query {
            kind,
            ..Default::default()
        };
        for gene in genes {
            query.insert(gene);
        }
        query
    }

    fn insert(&mut self, gene: GeneId) -> bool {
        if self.lookup.insert(gene.clone()) {
            self.genes.push(gene);
            true
        } else {
            false
        }
    }

    /// The [`IdKind`] of all genes in the query
    pub fn kind(&self) -> IdKind {
        self.kind
    }

    /// Returns the number of unique genes
    pub fn len(&self) -> usize {
        self.genes.len()
    }

    /// Returns `true` if the query contains no genes
    pub fn is_empty(&self) -> bool {
        self.genes.is_empty()
    }

    /// Returns `true` if the gene is part of the query
    pub fn contains(&self, gene: &GeneId) -> bool {
        self.lookup.contains(gene)
    }

    /// The identifier of `gene` as it was provided to the query
    ///
    /// # Examples
    ///
    /// ```
    /// use gsenrich::{GeneId, Query};
    ///
    /// let query = Query::new(["0012", "7"]);
    /// assert_eq!(query.label(&GeneId::Entrez(12)), "0012");
    /// assert_eq!(query.label(&GeneId::Entrez(7)), "7");
    /// ```
    pub fn label<'a>(&'a self, gene: &'a GeneId) -> Cow<'a, str> {
        match (self.labels.get(gene), gene) {
            (Some(label), _) => Cow::Borrowed(label.as_str()),
            (None, GeneId::Symbol(symbol)) => Cow::Borrowed(symbol.as_str()),
            (None, GeneId::Entrez(id)) => Cow::Owned(id.to_string()),
        }
    }

    /// Iterates the genes in their original order
    pub fn iter(&self) -> std::slice::Iter<'_, GeneId> {
        self.genes.iter()
    }
}

impl<'a> IntoIterator for &'a Query {
    type Item = &'a GeneId;
    type IntoIter = std::slice::Iter<'a, GeneId>;
    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
