use std::collections::{HashMap, HashSet};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::background::{AnnotationSource, Background, BackgroundCache, BackgroundResolver};
use crate::genes::Query;
use crate::geneset::GeneSetCollection;
use crate::input::{GeneListInput, GeneSetInput};
use crate::parser::gmt;
use crate::remote::{self, RemoteSource};
use crate::report::{EnrichmentReport, EnrichmentResults};
use crate::retry::RetryPolicy;
use crate::stats::correction::CorrectionMethod;
use crate::stats::hypergeom::term_enrichment;
use crate::{BackgroundSpec, EnrichError, EnrichResult, CUSTOM_GENE_SET, DEFAULT_CUTOFF};

/// Settings of an enrichment run
///
/// # Examples
///
/// ```
/// use gsenrich::{BackgroundSpec, EnrichrConfig};
///
/// let config = EnrichrConfig::default()
///     .cutoff(0.01)
///     .background(BackgroundSpec::Size(20_000))
///     .description("my_genes");
///
/// assert_eq!(config.get_cutoff(), 0.01);
/// assert_eq!(config.get_description(), "my_genes");
/// assert!(config.get_outdir().is_none());
/// ```
#[derive(Debug, Clone)]
pub struct EnrichrConfig {
    cutoff: f64,
    correction: CorrectionMethod,
    background: BackgroundSpec,
    description: String,
    outdir: Option<PathBuf>,
    cache_dir: PathBuf,
    retry: RetryPolicy,
}

impl Default for EnrichrConfig {
    fn default() -> Self {
        let cache_dir = std::env::var_os("HOME").map_or_else(
            || std::env::temp_dir().join("gsenrich"),
            |home| PathBuf::from(home).join(".cache").join("gsenrich"),
        );
        Self {
            cutoff: DEFAULT_CUTOFF,
            correction: CorrectionMethod::default(),
            background: BackgroundSpec::default(),
            description: String::new(),
            outdir: None,
            cache_dir,
            retry: RetryPolicy::default(),
        }
    }
}

impl EnrichrConfig {
    /// Sets the significance threshold of the adjusted p-value
    #[must_use]
    pub fn cutoff(mut self, cutoff: f64) -> Self {
        self.cutoff = cutoff;
        self
    }

    /// Sets the multiple testing correction of locally tested libraries
    ///
    /// Results of hosted libraries are always corrected by the remote service.
    #[must_use]
    pub fn correction(mut self, correction: CorrectionMethod) -> Self {
        self.correction = correction;
        self
    }

    /// Sets the background universe
    #[must_use]
    pub fn background<B: Into<BackgroundSpec>>(mut self, background: B) -> Self {
        self.background = background.into();
        self
    }

    /// Sets the description that is used in output file names
    #[must_use]
    pub fn description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    /// Writes one report file per gene set library into `outdir`
    #[must_use]
    pub fn outdir<P: AsRef<Path>>(mut self, outdir: P) -> Self {
        self.outdir = Some(outdir.as_ref().to_path_buf());
        self
    }

    /// Sets the directory of the background cache
    #[must_use]
    pub fn cache_dir<P: AsRef<Path>>(mut self, cache_dir: P) -> Self {
        self.cache_dir = cache_dir.as_ref().to_path_buf();
        self
    }

    /// Sets the retry policy of all remote calls
    #[must_use]
    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// The significance threshold of the adjusted p-value
    pub fn get_cutoff(&self) -> f64 {
        self.cutoff
    }

    /// The multiple testing correction of locally tested libraries
    pub fn get_correction(&self) -> CorrectionMethod {
        self.correction
    }

    /// The background universe
    pub fn get_background(&self) -> &BackgroundSpec {
        &self.background
    }

    /// The description of the run
    pub fn get_description(&self) -> &str {
        &self.description
    }

    /// The output directory, if reports are written to disk
    pub fn get_outdir(&self) -> Option<&Path> {
        self.outdir.as_deref()
    }

    /// The directory of the background cache
    pub fn get_cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// The retry policy of all remote calls
    pub fn get_retry(&self) -> &RetryPolicy {
        &self.retry
    }

    /// The report file of `gene_set` within `outdir`
    fn report_path(&self, outdir: &Path, gene_set: &str) -> PathBuf {
        if self.description.is_empty() {
            outdir.join(format!("{gene_set}.enrichr.reports.txt"))
        } else {
            outdir.join(format!(
                "{gene_set}.{}.enrichr.reports.txt",
                self.description
            ))
        }
    }
}

/// A gene set library after resolving its source
enum Library {
    Local(String, GeneSetCollection),
    Remote(String),
}

impl Library {
    fn name_mut(&mut self) -> &mut String {
        match self {
            Library::Local(name, _) | Library::Remote(name) => name,
        }
    }
}

/// Appends `_2`, `_3`, ... to every repeated library name
fn unique_names(mut libraries: Vec<Library>) -> Vec<Library> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut taken: HashSet<String> = libraries
        .iter_mut()
        .map(|library| library.name_mut().clone())
        .collect();
    for library in &mut libraries {
        let name = library.name_mut();
        let count = seen.entry(name.clone()).or_insert(0);
        *count += 1;
        if *count == 1 {
            continue;
        }
        let mut suffix = *count;
        let mut renamed = format!("{name}_{suffix}");
        while taken.contains(&renamed) {
            suffix += 1;
            renamed = format!("{name}_{suffix}");
        }
        *count = suffix;
        warn!("Gene set library {} is used more than once, renaming to {}", name, renamed);
        taken.insert(renamed.clone());
        *name = renamed;
    }
    libraries
}

/// Gene set over-representation analysis
///
/// Each gene set library is either tested locally, using the hypergeometric
/// test against the background, or its precomputed results are retrieved
/// from the Enrichr web service.
///
/// # Examples
///
/// ```
/// use gsenrich::{BackgroundSpec, Enrichr, EnrichrConfig, GeneListInput, GeneSetInput};
///
/// let enrichr = Enrichr::new(EnrichrConfig::default().background(BackgroundSpec::Size(100)));
///
/// let genes = GeneListInput::from(&["TP53", "KRAS", "BRCA1"][..]);
/// let library = GeneSetInput::Mapping(vec![
///     ("Cancer".to_string(), vec!["TP53".to_string(), "KRAS".to_string(), "MYC".to_string()]),
///     ("Other".to_string(), vec!["ACTB".to_string()]),
/// ]);
///
/// let results = enrichr.run(&genes, &[library]).unwrap();
/// let report = results.last().unwrap();
///
/// assert_eq!(report.gene_set(), "custom");
/// assert_eq!(report.rows()[0].term(), "Cancer");
/// assert_eq!(report.rows()[0].overlap_label(), "2/3");
/// ```
pub struct Enrichr {
    config: EnrichrConfig,
    annotation: Option<Box<dyn AnnotationSource>>,
    remote: Option<Box<dyn RemoteSource>>,
}

impl Enrichr {
    /// Constructs a new [`Enrichr`] without any remote collaborators
    pub fn new(config: EnrichrConfig) -> Self {
        Self {
            config,
            annotation: None,
            remote: None,
        }
    }

    /// Uses `source` to download named backgrounds that are not cached yet
    #[must_use]
    pub fn with_annotation_source<S: AnnotationSource + 'static>(mut self, source: S) -> Self {
        self.annotation = Some(Box::new(source));
        self
    }

    /// Uses `source` to retrieve the results of hosted gene set libraries
    #[must_use]
    pub fn with_remote_source<S: RemoteSource + 'static>(mut self, source: S) -> Self {
        self.remote = Some(Box::new(source));
        self
    }

    /// The configuration of the run
    pub fn config(&self) -> &EnrichrConfig {
        &self.config
    }

    /// Runs the enrichment of `genes` for every library of `gene_sets`
    ///
    /// All libraries are resolved before any calculation starts.
    /// The background is only resolved if at least one library is tested
    /// locally.
    ///
    /// Libraries that share a name, e.g. several in-memory mappings, are
    /// renamed to `<name>_2`, `<name>_3`, ... Report files are only written
    /// once every library succeeded.
    ///
    /// # Errors
    ///
    /// - [`EnrichError::InvalidInput`]: Empty gene list, no libraries or an invalid cutoff
    /// - [`EnrichError::UnresolvedLibrary`]: A library is neither hosted nor a local file
    /// - [`EnrichError::BackgroundFetch`]: The background can not be resolved
    /// - [`EnrichError::RemoteResult`]: The remote service failed for a library
    /// - [`EnrichError::Io`]: A report can not be written
    pub fn run(
        &self,
        genes: &GeneListInput,
        gene_sets: &[GeneSetInput],
    ) -> EnrichResult<EnrichmentResults> {
        let cutoff = self.config.cutoff;
        if !(0.0..=1.0).contains(&cutoff) {
            return Err(EnrichError::InvalidInput(format!(
                "cutoff must be within [0, 1]: {cutoff}"
            )));
        }

        let gene_list = genes.load()?;
        let query = Query::new(&gene_list);
        if query.is_empty() {
            return Err(EnrichError::InvalidInput("gene list is empty".to_string()));
        }
        info!("Query contains {} unique genes ({})", query.len(), query.kind());

        let libraries = self.resolve_libraries(gene_sets, &query)?;

        let mut background: Option<Background> = None;
        let mut results = EnrichmentResults::new();
        for library in libraries {
            let report = match library {
                Library::Local(name, collection) => {
                    if background.is_none() {
                        background = Some(self.resolve_background(&query)?);
                    }
                    let background = background.as_ref().ok_or_else(|| {
                        EnrichError::BackgroundFetch("background is not available".to_string())
                    })?;
                    info!("Run: {}", name);
                    let tests = term_enrichment(background, &query, &collection)?;
                    EnrichmentReport::assemble_with(
                        &name,
                        tests,
                        cutoff,
                        self.config.correction,
                        &query,
                    )?
                }
                Library::Remote(name) => {
                    info!("Connecting to Enrichr: {}", name);
                    let source = self
                        .remote
                        .as_deref()
                        .ok_or_else(|| EnrichError::UnresolvedLibrary(name.clone()))?;
                    remote::fetch_report(
                        source,
                        &self.config.retry,
                        &gene_list,
                        &self.config.description,
                        &name,
                        cutoff,
                    )?
                }
            };
            info!(
                "{}: {} of {} terms significant",
                report.gene_set(),
                report.significant().count(),
                report.len()
            );
            results.push(report);
        }
        if let Some(outdir) = self.config.outdir.as_deref() {
            for report in results.reports() {
                self.write_report(outdir, report)?;
            }
        }
        info!("Done.");
        Ok(results)
    }

    fn resolve_libraries(
        &self,
        gene_sets: &[GeneSetInput],
        query: &Query,
    ) -> EnrichResult<Vec<Library>> {
        if gene_sets.is_empty() {
            return Err(EnrichError::InvalidInput(
                "at least one gene set library is required".to_string(),
            ));
        }

        let mut hosted: Option<HashSet<String>> = None;
        let mut libraries = Vec::with_capacity(gene_sets.len());
        for input in gene_sets {
            let library = match input {
                GeneSetInput::Mapping(terms) => {
                    let mut collection = GeneSetCollection::new();
                    for (term, genes) in terms {
                        collection.insert_raw(term, genes, query.kind());
                    }
                    Library::Local(CUSTOM_GENE_SET.to_string(), collection)
                }
                GeneSetInput::Gmt(path) => Self::read_gmt(path, query)?,
                GeneSetInput::Library(name) => {
                    let path = Path::new(name);
                    if path.is_file() {
                        Self::read_gmt(path, query)?
                    } else {
                        if hosted.is_none() {
                            hosted = Some(self.hosted_libraries()?);
                        }
                        match hosted.as_ref() {
                            Some(names) if names.contains(name) => Library::Remote(name.clone()),
                            _ => return Err(EnrichError::UnresolvedLibrary(name.clone())),
                        }
                    }
                }
            };
            libraries.push(library);
        }
        Ok(unique_names(libraries))
    }

    fn read_gmt(path: &Path, query: &Query) -> EnrichResult<Library> {
        if !path.is_file() {
            return Err(EnrichError::UnresolvedLibrary(path.display().to_string()));
        }
        let name = path
            .file_stem()
            .map_or_else(|| CUSTOM_GENE_SET.to_string(), |stem| stem.to_string_lossy().to_string());
        let collection = gmt::read_file(path, query.kind())?;
        debug!("Parsed {} terms from {}", collection.len(), path.display());
        Ok(Library::Local(name, collection))
    }

    /// The names of all libraries hosted by the remote service
    fn hosted_libraries(&self) -> EnrichResult<HashSet<String>> {
        let Some(source) = self.remote.as_deref() else {
            return Ok(HashSet::new());
        };
        let names = self
            .config
            .retry
            .call("list libraries", || source.library_names())
            .map_err(|err| EnrichError::RemoteResult {
                library: "library names".to_string(),
                attempts: err.attempts,
                reason: err.last_error.to_string(),
            })?;
        Ok(names.into_iter().collect())
    }

    fn resolve_background(&self, query: &Query) -> EnrichResult<Background> {
        let resolver = BackgroundResolver::new(
            BackgroundCache::new(&self.config.cache_dir),
            self.config.retry,
        );
        resolver.resolve(&self.config.background, query.kind(), self.annotation.as_deref())
    }

    fn write_report(&self, outdir: &Path, report: &EnrichmentReport) -> EnrichResult<()> {
        fs::create_dir_all(outdir)?;
        let path = self.config.report_path(outdir, report.gene_set());
        let mut writer = BufWriter::new(File::create(&path)?);
        report.write_tsv(&mut writer)?;
        writer.flush()?;
        debug!("Wrote report to {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::background::{AnnotationRow, AnnotationTable};
    use crate::remote::RemoteJob;
    use std::time::Duration;

    fn symbols(genes: &[&str]) -> Vec<String> {
        genes.iter().map(ToString::to_string).collect()
    }

    fn mapping(terms: usize) -> GeneSetInput {
        GeneSetInput::Mapping(
            (0..terms)
                .map(|i| (format!("term{i}"), symbols(&["A", "B", "C"])))
                .collect(),
        )
    }

    fn query() -> GeneListInput {
        GeneListInput::Genes(symbols(&["A", "B", "Z"]))
    }

    fn config() -> EnrichrConfig {
        EnrichrConfig::default()
            .background(BackgroundSpec::Size(100))
            .retry(RetryPolicy::new(2, Duration::ZERO))
    }

    struct Annotation;

    impl AnnotationSource for Annotation {
        fn fetch(&self, _: &str) -> EnrichResult<AnnotationTable> {
            Ok(["A", "B", "C", "D", "E", "F", "Z"]
                .iter()
                .map(|gene| AnnotationRow::new(None, Some(*gene), Some("GO:0000001")))
                .collect())
        }
    }

    struct Remote {
        fail: bool,
    }

    impl RemoteSource for Remote {
        fn library_names(&self) -> EnrichResult<Vec<String>> {
            Ok(vec!["KEGG_2021_Human".to_string()])
        }

        fn submit(&self, _: &str, _: &str) -> EnrichResult<RemoteJob> {
            Ok(RemoteJob {
                user_list_id: 1,
                short_id: "x".to_string(),
            })
        }

        fn export(&self, _: &RemoteJob, _: &str) -> EnrichResult<String> {
            if self.fail {
                return Err(EnrichError::InvalidInput("unavailable".to_string()));
            }
            Ok("Term\tOverlap\tP-value\tAdjusted P-value\tGenes\n\
                Pathway\t2/20\t0.001\t0.01\tA;B\n"
                .to_string())
        }
    }

    #[test]
    fn default_config() {
        let config = EnrichrConfig::default();
        assert!((config.get_cutoff() - 0.05).abs() < f64::EPSILON);
        assert_eq!(config.get_background(), &BackgroundSpec::default());
        assert_eq!(config.get_retry(), &RetryPolicy::default());
        assert!(config.get_cache_dir().ends_with("gsenrich"));
    }

    #[test]
    fn independent_libraries() {
        let enrichr = Enrichr::new(config());
        let results = enrichr.run(&query(), &[mapping(3), mapping(5)]).unwrap();
        assert_eq!(results.reports().len(), 2);
        assert_eq!(results.reports()[0].len(), 3);
        assert_eq!(results.reports()[1].len(), 5);
        // identical terms, every adjusted p-value equals the raw p-value
        for row in results.rows() {
            assert!((row.adjusted_pvalue() - row.pvalue()).abs() < 1e-12);
            assert_eq!(row.overlap_label(), "2/3");
            assert_eq!(row.genes(), &["A", "B"]);
        }
    }

    #[test]
    fn named_background_from_source() {
        let dir = tempfile::tempdir().unwrap();
        let enrichr = Enrichr::new(
            EnrichrConfig::default()
                .cache_dir(dir.path())
                .retry(RetryPolicy::once()),
        )
        .with_annotation_source(Annotation);
        let results = enrichr.run(&query(), &[mapping(1)]).unwrap();
        assert_eq!(results.len(), 1);
        assert!(dir
            .path()
            .join("hsapiens_gene_ensembl.background.genes.txt")
            .exists());
    }

    #[test]
    fn unresolved_library_before_computation() {
        let dir = tempfile::tempdir().unwrap();
        let enrichr = Enrichr::new(config().outdir(dir.path()));
        let res = enrichr.run(
            &query(),
            &[mapping(2), GeneSetInput::Library("Not_A_Library".to_string())],
        );
        assert!(matches!(res, Err(EnrichError::UnresolvedLibrary(_))));
        // no report was written for the first library
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn missing_gmt_file() {
        let enrichr = Enrichr::new(config());
        let res = enrichr.run(&query(), &[GeneSetInput::from("/does/not/exist.gmt")]);
        assert!(matches!(res, Err(EnrichError::UnresolvedLibrary(_))));
    }

    #[test]
    fn gmt_library() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pathways.gmt");
        fs::write(&path, "P1\tdesc\tA\tB\tC\nP2\tdesc\tX\n").unwrap();

        let enrichr = Enrichr::new(config().outdir(dir.path()).description("test"));
        let results = enrichr.run(&query(), &[GeneSetInput::Gmt(path)]).unwrap();
        let report = results.last().unwrap();
        assert_eq!(report.gene_set(), "pathways");
        assert_eq!(report.rows()[0].term(), "P1");

        let written = fs::read_to_string(dir.path().join("pathways.test.enrichr.reports.txt")).unwrap();
        assert_eq!(written.lines().count(), 3);
        assert!(written.starts_with("Gene_set\tTerm\tOverlap"));
    }

    #[test]
    fn remote_library() {
        let enrichr = Enrichr::new(config()).with_remote_source(Remote { fail: false });
        let results = enrichr
            .run(
                &query(),
                &[GeneSetInput::Library("KEGG_2021_Human".to_string())],
            )
            .unwrap();
        let row = &results.reports()[0].rows()[0];
        assert_eq!(row.gene_set(), "KEGG_2021_Human");
        assert_eq!(row.term(), "Pathway");
        assert!(row.reject());
    }

    #[test]
    fn remote_failure_aborts_run() {
        let enrichr = Enrichr::new(config()).with_remote_source(Remote { fail: true });
        let res = enrichr.run(
            &query(),
            &[
                mapping(2),
                GeneSetInput::Library("KEGG_2021_Human".to_string()),
            ],
        );
        assert!(matches!(
            res,
            Err(EnrichError::RemoteResult { attempts: 2, .. })
        ));
    }

    #[test]
    fn invalid_inputs() {
        let enrichr = Enrichr::new(config());
        assert!(enrichr.run(&query(), &[]).is_err());
        assert!(enrichr
            .run(&GeneListInput::Genes(Vec::new()), &[mapping(1)])
            .is_err());

        let enrichr = Enrichr::new(config().cutoff(1.5));
        assert!(enrichr.run(&query(), &[mapping(1)]).is_err());
    }

    #[test]
    fn repeated_names_keep_all_reports() {
        let dir = tempfile::tempdir().unwrap();
        let first = GeneSetInput::Mapping(vec![("first".to_string(), symbols(&["A", "C"]))]);
        let second = GeneSetInput::Mapping(vec![("second".to_string(), symbols(&["B", "C"]))]);

        let enrichr = Enrichr::new(config().outdir(dir.path()));
        let results = enrichr.run(&query(), &[first, second]).unwrap();
        let names: Vec<&str> = results.reports().iter().map(EnrichmentReport::gene_set).collect();
        assert_eq!(names, vec!["custom", "custom_2"]);

        let first_file = fs::read_to_string(dir.path().join("custom.enrichr.reports.txt")).unwrap();
        let second_file =
            fs::read_to_string(dir.path().join("custom_2.enrichr.reports.txt")).unwrap();
        assert!(first_file.contains("\tfirst\t"));
        assert!(second_file.contains("\tsecond\t"));
    }

    #[test]
    fn unique_names_skip_taken() {
        let libraries = vec![
            Library::Remote("lib".to_string()),
            Library::Remote("lib".to_string()),
            Library::Remote("lib_2".to_string()),
        ];
        let names: Vec<String> = unique_names(libraries)
            .iter_mut()
            .map(|library| library.name_mut().clone())
            .collect();
        assert_eq!(names, vec!["lib", "lib_3", "lib_2"]);
    }

    #[test]
    fn failed_run_writes_no_reports() {
        let dir = tempfile::tempdir().unwrap();
        let enrichr =
            Enrichr::new(config().outdir(dir.path())).with_remote_source(Remote { fail: true });
        let res = enrichr.run(
            &query(),
            &[
                mapping(2),
                GeneSetInput::Library("KEGG_2021_Human".to_string()),
            ],
        );
        assert!(res.is_err());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn configured_correction() {
        let enrichr = Enrichr::new(config().correction(CorrectionMethod::Bonferroni));
        assert_eq!(enrichr.config().get_correction(), CorrectionMethod::Bonferroni);
        let library = GeneSetInput::Mapping(vec![
            ("hit".to_string(), symbols(&["A", "B", "C"])),
            ("miss".to_string(), symbols(&["X"])),
        ]);
        let results = enrichr.run(&query(), &[library]).unwrap();
        let rows = results.reports()[0].rows();
        // Bonferroni: p * m with m = 2
        assert!((rows[0].adjusted_pvalue() - (rows[0].pvalue() * 2.0).min(1.0)).abs() < 1e-12);
    }

    #[test]
    fn entrez_genes_keep_query_spelling() {
        let enrichr = Enrichr::new(config());
        let library = GeneSetInput::Mapping(vec![("t".to_string(), symbols(&["12", "7", "8"]))]);
        let genes = GeneListInput::Genes(symbols(&["0012", "7"]));
        let results = enrichr.run(&genes, &[library]).unwrap();
        assert_eq!(results.reports()[0].rows()[0].genes(), &["0012", "7"]);
    }
}
