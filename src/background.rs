//! The background universe of genes
//!
//! Over-representation is always judged relative to a [`Background`], the
//! population of all genes that could have been part of the query.
//! The background is specified via [`BackgroundSpec`] and resolved by the
//! [`BackgroundResolver`].
use std::collections::HashSet;

use tracing::{info, warn};

use crate::genes::{GeneId, IdKind};
use crate::retry::RetryPolicy;
use crate::{u64_from_usize, EnrichError, EnrichResult, DEFAULT_BACKGROUND};

mod cache;
pub use cache::BackgroundCache;

/// Describes which genes form the background universe
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackgroundSpec {
    /// All genes with a GO annotation in the named annotation dataset
    Named(String),
    /// Only the number of genes in the universe, e.g. all expressed genes
    Size(u64),
    /// An explicit list of genes
    Genes(Vec<String>),
}

impl Default for BackgroundSpec {
    fn default() -> Self {
        BackgroundSpec::Named(DEFAULT_BACKGROUND.to_string())
    }
}

impl From<u64> for BackgroundSpec {
    fn from(size: u64) -> Self {
        BackgroundSpec::Size(size)
    }
}

impl From<&str> for BackgroundSpec {
    fn from(name: &str) -> Self {
        BackgroundSpec::Named(name.to_string())
    }
}

/// The resolved universe of genes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Background {
    /// A set of genes of the same [`IdKind`]
    Genes {
        /// The genes of the universe
        genes: HashSet<GeneId>,
        /// The identifier type of all genes
        kind: IdKind,
    },
    /// Only the cardinality of the universe is known
    ///
    /// Query and terms can not be restricted to the universe
    Size(u64),
}

impl Background {
    /// Constructs a [`Background`] from a gene list, coercing to `kind`
    ///
    /// Identifiers that are not valid for `kind` are dropped.
    pub fn from_genes<I, S>(genes: I, kind: IdKind) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let genes = genes
            .into_iter()
            .filter_map(|gene| {
                let gene = gene.as_ref();
                if gene.trim().is_empty() {
                    None
                } else {
                    GeneId::parse(gene, kind).ok()
                }
            })
            .collect();
        Background::Genes { genes, kind }
    }

    /// Constructs a [`Background`] from all genes of the [`AnnotationTable`]
    /// that have a GO annotation
    ///
    /// The identifier column is selected based on `kind`.
    pub fn from_annotation(table: &AnnotationTable, kind: IdKind) -> Self {
        let genes = table
            .rows()
            .iter()
            .filter(|row| row.go_id.is_some())
            .filter_map(|row| match kind {
                IdKind::Entrez => row.entrez_id.map(GeneId::Entrez),
                IdKind::Symbol => row.gene_name.as_deref().map(GeneId::from),
            })
            .collect();
        Background::Genes { genes, kind }
    }

    /// The size of the universe (`N`)
    pub fn len(&self) -> u64 {
        match self {
            Background::Genes { genes, .. } => u64_from_usize(genes.len()),
            Background::Size(size) => *size,
        }
    }

    /// Returns `true` if the universe has no genes
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `true` if the gene is part of the universe
    ///
    /// A [`Background::Size`] contains every gene
    pub fn contains(&self, gene: &GeneId) -> bool {
        match self {
            Background::Genes { genes, .. } => genes.contains(gene),
            Background::Size(_) => true,
        }
    }

    /// Returns `true` if genes are restricted to the universe
    pub fn is_restricting(&self) -> bool {
        matches!(self, Background::Genes { .. })
    }

    /// The [`IdKind`] of the genes, if a gene set is present
    pub fn kind(&self) -> Option<IdKind> {
        match self {
            Background::Genes { kind, .. } => Some(*kind),
            Background::Size(_) => None,
        }
    }
}

/// One gene of an annotation dataset
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnnotationRow {
    /// NCBI Entrez gene ID
    pub entrez_id: Option<u32>,
    /// Gene symbol
    pub gene_name: Option<String>,
    /// Gene ontology term ID
    pub go_id: Option<String>,
}

impl AnnotationRow {
    /// Constructs a new [`AnnotationRow`]
    pub fn new(entrez_id: Option<u32>, gene_name: Option<&str>, go_id: Option<&str>) -> Self {
        Self {
            entrez_id,
            gene_name: gene_name.map(ToString::to_string),
            go_id: go_id.map(ToString::to_string),
        }
    }
}

/// A table of annotated genes, e.g. downloaded from BioMart
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnnotationTable {
    rows: Vec<AnnotationRow>,
}

impl AnnotationTable {
    /// Constructs a new [`AnnotationTable`]
    pub fn new(rows: Vec<AnnotationRow>) -> Self {
        Self { rows }
    }

    /// All rows of the table
    pub fn rows(&self) -> &[AnnotationRow] {
        &self.rows
    }

    /// Returns the number of rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns `true` if the table has no rows
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl FromIterator<AnnotationRow> for AnnotationTable {
    fn from_iter<T: IntoIterator<Item = AnnotationRow>>(iter: T) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// A source of annotated genes
///
/// Implementations usually query a remote service, such as Ensembl BioMart,
/// which can take several minutes.
pub trait AnnotationSource: Send + Sync {
    /// Fetches the full annotation table of `dataset`
    ///
    /// # Errors
    ///
    /// Implementations return an error if the dataset can not be retrieved
    fn fetch(&self, dataset: &str) -> EnrichResult<AnnotationTable>;
}

#[cfg_attr(doc, aquamarine::aquamarine)]
/// Resolves a [`BackgroundSpec`] into a [`Background`]
///
/// Named backgrounds are looked up in the [`BackgroundCache`] first and
/// only fetched from the [`AnnotationSource`] if they are not cached yet.
///
/// ```mermaid
/// graph LR
///     Spec[BackgroundSpec] -->|Size| B(Background::Size)
///     Spec -->|Genes| G(Background::Genes)
///     Spec -->|Named| C{BackgroundCache}
///     C -->|hit| T[AnnotationTable]
///     C -->|miss| S[AnnotationSource] -->|store| C
///     T -->|go_id not null| G
/// ```
#[derive(Debug, Clone)]
pub struct BackgroundResolver {
    cache: BackgroundCache,
    retry: RetryPolicy,
}

impl BackgroundResolver {
    /// Constructs a new [`BackgroundResolver`]
    pub fn new(cache: BackgroundCache, retry: RetryPolicy) -> Self {
        Self { cache, retry }
    }

    /// Resolves `spec` to a [`Background`] with identifiers of `kind`
    ///
    /// # Errors
    ///
    /// [`EnrichError::BackgroundFetch`] if a named background is neither
    /// cached nor available from `source`
    pub fn resolve(
        &self,
        spec: &BackgroundSpec,
        kind: IdKind,
        source: Option<&dyn AnnotationSource>,
    ) -> EnrichResult<Background> {
        match spec {
            BackgroundSpec::Size(size) => {
                info!("Using a background of {} genes", size);
                Ok(Background::Size(*size))
            }
            BackgroundSpec::Genes(genes) => {
                let background = Background::from_genes(genes, kind);
                info!("Using {} user provided background genes", background.len());
                Ok(background)
            }
            BackgroundSpec::Named(name) => {
                let table = self.cache.lookup_or_fetch(name, source, &self.retry)?;
                info!("Using all annotated genes with GO_ID as background genes");
                let background = Background::from_annotation(&table, kind);
                warn!(
                    "Background genes used: all {} genes with GO_IDs ({}). \
                    If this is not intended, provide the background size or gene list",
                    background.len(),
                    kind
                );
                if background.is_empty() {
                    return Err(EnrichError::BackgroundFetch(format!(
                        "{name} contains no genes with a GO annotation"
                    )));
                }
                Ok(background)
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::time::Duration;

    fn table() -> AnnotationTable {
        AnnotationTable::new(vec![
            AnnotationRow::new(Some(1), Some("A"), Some("GO:0001")),
            AnnotationRow::new(Some(1), Some("A"), Some("GO:0002")),
            AnnotationRow::new(Some(2), Some("B"), None),
            AnnotationRow::new(Some(3), None, Some("GO:0003")),
            AnnotationRow::new(None, Some("D"), Some("GO:0004")),
        ])
    }

    struct StaticSource;

    impl AnnotationSource for StaticSource {
        fn fetch(&self, _: &str) -> EnrichResult<AnnotationTable> {
            Ok(table())
        }
    }

    #[test]
    fn from_annotation_entrez() {
        let bg = Background::from_annotation(&table(), IdKind::Entrez);
        assert_eq!(bg.len(), 2);
        assert!(bg.contains(&GeneId::Entrez(1)));
        assert!(!bg.contains(&GeneId::Entrez(2)));
        assert!(bg.contains(&GeneId::Entrez(3)));
        assert_eq!(bg.kind(), Some(IdKind::Entrez));
    }

    #[test]
    fn from_annotation_symbol() {
        let bg = Background::from_annotation(&table(), IdKind::Symbol);
        assert_eq!(bg.len(), 2);
        assert!(bg.contains(&GeneId::from("A")));
        assert!(!bg.contains(&GeneId::from("B")));
        assert!(bg.contains(&GeneId::from("D")));
    }

    #[test]
    fn size_contains_everything() {
        let bg = Background::Size(100);
        assert_eq!(bg.len(), 100);
        assert!(bg.contains(&GeneId::from("anything")));
        assert!(!bg.is_restricting());
        assert!(bg.kind().is_none());
    }

    #[test]
    fn from_genes_dedup() {
        let bg = Background::from_genes(["1", "2", "2", "x", ""], IdKind::Entrez);
        assert_eq!(bg.len(), 2);
        assert!(bg.is_restricting());
    }

    #[test]
    fn resolve_size_and_genes() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = BackgroundResolver::new(BackgroundCache::new(dir.path()), RetryPolicy::once());

        let bg = resolver
            .resolve(&BackgroundSpec::Size(20_000), IdKind::Symbol, None)
            .unwrap();
        assert_eq!(bg, Background::Size(20_000));

        let spec = BackgroundSpec::Genes(vec!["A".into(), "B".into()]);
        let bg = resolver.resolve(&spec, IdKind::Symbol, None).unwrap();
        assert_eq!(bg.len(), 2);
    }

    #[test]
    fn resolve_named_fetches_and_caches() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = BackgroundResolver::new(
            BackgroundCache::new(dir.path()),
            RetryPolicy::new(2, Duration::ZERO),
        );
        let spec = BackgroundSpec::from("test_dataset");

        let bg = resolver
            .resolve(&spec, IdKind::Symbol, Some(&StaticSource))
            .unwrap();
        assert_eq!(bg.len(), 2);

        // second run works without a source, using the cache
        let bg = resolver.resolve(&spec, IdKind::Entrez, None).unwrap();
        assert_eq!(bg.len(), 2);
    }

    #[test]
    fn resolve_named_without_source_fails() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = BackgroundResolver::new(BackgroundCache::new(dir.path()), RetryPolicy::once());
        let res = resolver.resolve(&BackgroundSpec::default(), IdKind::Symbol, None);
        assert!(matches!(res, Err(EnrichError::BackgroundFetch(_))));
    }
}
