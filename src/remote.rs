//! Precomputed enrichment results from the Enrichr web service
//!
//! Named gene set libraries that are hosted by Enrichr are not tested locally.
//! Instead, the query is submitted once per library and the exported result
//! table is parsed into an [`EnrichmentReport`].
//!
//! The network transport is abstracted by [`RemoteSource`], so that any HTTP
//! client can be used.
use tracing::{debug, info, warn};

use crate::parser::enrichr_export;
use crate::report::EnrichmentReport;
use crate::retry::RetryPolicy;
use crate::{EnrichError, EnrichResult};

/// Identifies a submitted gene list at the remote service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteJob {
    /// Numeric ID of the uploaded list
    pub user_list_id: u64,
    /// Short ID used for sharing the results
    pub short_id: String,
}

/// A remote enrichment service
pub trait RemoteSource: Send + Sync {
    /// The names of all libraries hosted by the service
    ///
    /// # Errors
    ///
    /// If the service is unavailable
    fn library_names(&self) -> EnrichResult<Vec<String>>;

    /// Uploads the newline separated `genes`
    ///
    /// # Errors
    ///
    /// If the upload is rejected or the service is unavailable
    fn submit(&self, genes: &str, description: &str) -> EnrichResult<RemoteJob>;

    /// Returns the tab separated result table of `job` for `library`
    ///
    /// # Errors
    ///
    /// If the service is unavailable or has no results
    fn export(&self, job: &RemoteJob, library: &str) -> EnrichResult<String>;

    /// The genes of `job` that the service recognized
    ///
    /// Returns `None` if the service does not provide this information
    ///
    /// # Errors
    ///
    /// If the service is unavailable
    fn recognized_genes(&self, _job: &RemoteJob) -> EnrichResult<Option<Vec<String>>> {
        Ok(None)
    }
}

fn remote_error(library: &str, attempts: u32, reason: &EnrichError) -> EnrichError {
    EnrichError::RemoteResult {
        library: library.to_string(),
        attempts,
        reason: reason.to_string(),
    }
}

/// Retrieves the results of `genes` for `library` from the remote service
///
/// Every request is retried according to `retry`.
///
/// # Errors
///
/// [`EnrichError::RemoteResult`] if the gene list can not be submitted or
/// no results can be retrieved
pub fn fetch_report(
    source: &dyn RemoteSource,
    retry: &RetryPolicy,
    genes: &[String],
    description: &str,
    library: &str,
    cutoff: f64,
) -> EnrichResult<EnrichmentReport> {
    let payload = genes.join("\n");
    let job = retry
        .call("submit gene list", || source.submit(&payload, description))
        .map_err(|err| remote_error(library, err.attempts, &err.last_error))?;
    debug!("Submitted gene list as {}", job.user_list_id);

    match source.recognized_genes(&job) {
        Ok(Some(recognized)) => info!(
            "{} of {} genes recognized by Enrichr",
            recognized.len(),
            genes.len()
        ),
        Ok(None) => debug!("Enrichr did not report recognized genes"),
        Err(err) => warn!("Unable to retrieve recognized genes: {}", err),
    }

    let rows = retry
        .call("export results", || {
            let text = source.export(&job, library)?;
            if text.trim().is_empty() {
                return Err(EnrichError::InvalidInput(format!(
                    "empty results for {library}"
                )));
            }
            enrichr_export::read(text.as_bytes(), library, cutoff)
        })
        .map_err(|err| remote_error(library, err.attempts, &err.last_error))?;

    info!("Retrieved {} terms of {} from Enrichr", rows.len(), library);
    Ok(EnrichmentReport::from_rows(library, rows, cutoff))
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    const EXPORT: &str = "Term\tOverlap\tP-value\tAdjusted P-value\tOdds Ratio\tCombined Score\tGenes\n\
        Term B\t1/50\t0.3\t0.3\t1.2\t1.5\tKRAS\n\
        Term A\t2/10\t0.001\t0.002\t20.1\t120.3\tTP53;KRAS\n";

    struct MockSource {
        failures: u32,
        exports: AtomicU32,
        submitted: Mutex<Vec<String>>,
    }

    impl MockSource {
        fn new(failures: u32) -> Self {
            Self {
                failures,
                exports: AtomicU32::new(0),
                submitted: Mutex::new(Vec::new()),
            }
        }
    }

    impl RemoteSource for MockSource {
        fn library_names(&self) -> EnrichResult<Vec<String>> {
            Ok(vec!["KEGG_2021_Human".to_string()])
        }

        fn submit(&self, genes: &str, _: &str) -> EnrichResult<RemoteJob> {
            self.submitted.lock().unwrap().push(genes.to_string());
            Ok(RemoteJob {
                user_list_id: 42,
                short_id: "abc".to_string(),
            })
        }

        fn export(&self, job: &RemoteJob, _: &str) -> EnrichResult<String> {
            assert_eq!(job.user_list_id, 42);
            let call = self.exports.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                Err(EnrichError::InvalidInput("service unavailable".to_string()))
            } else {
                Ok(EXPORT.to_string())
            }
        }
    }

    fn genes() -> Vec<String> {
        vec!["TP53".to_string(), "KRAS".to_string()]
    }

    #[test]
    fn fetch_sorted_report() {
        let source = MockSource::new(0);
        let report = fetch_report(
            &source,
            &RetryPolicy::once(),
            &genes(),
            "test",
            "KEGG_2021_Human",
            0.05,
        )
        .unwrap();
        assert_eq!(report.gene_set(), "KEGG_2021_Human");
        assert_eq!(report.len(), 2);
        assert_eq!(report.rows()[0].term(), "Term A");
        assert!(report.rows()[0].reject());
        assert!(!report.rows()[1].reject());
        assert_eq!(source.submitted.lock().unwrap()[0], "TP53\nKRAS");
    }

    #[test]
    fn retries_failed_exports() {
        let source = MockSource::new(2);
        let retry = RetryPolicy::new(3, Duration::ZERO);
        let report =
            fetch_report(&source, &retry, &genes(), "test", "KEGG_2021_Human", 0.05).unwrap();
        assert_eq!(report.len(), 2);
        assert_eq!(source.exports.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn gives_up() {
        let source = MockSource::new(10);
        let retry = RetryPolicy::new(3, Duration::ZERO);
        let res = fetch_report(&source, &retry, &genes(), "test", "KEGG_2021_Human", 0.05);
        match res {
            Err(EnrichError::RemoteResult {
                library, attempts, ..
            }) => {
                assert_eq!(library, "KEGG_2021_Human");
                assert_eq!(attempts, 3);
            }
            other => panic!("unexpected result {other:?}"),
        }
        assert_eq!(source.exports.load(Ordering::SeqCst), 3);
    }
}
