use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::background::{AnnotationSource, AnnotationTable};
use crate::parser::annotation_table;
use crate::retry::RetryPolicy;
use crate::{EnrichError, EnrichResult};

/// On-disk cache of [`AnnotationTable`]s, keyed by dataset name
///
/// Each dataset is stored as a tab separated file
/// `<dir>/<name>.background.genes.txt`.
#[derive(Debug, Clone)]
pub struct BackgroundCache {
    dir: PathBuf,
}

impl BackgroundCache {
    /// Constructs a new [`BackgroundCache`] in the given directory
    ///
    /// The directory is only created once a table is stored.
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    /// The directory of the cache
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The cache file for the dataset `name`
    pub fn path_for(&self, name: &str) -> PathBuf {
        let name: String = name
            .chars()
            .map(|c| if c == '/' || c == '\\' { '_' } else { c })
            .collect();
        self.dir.join(format!("{name}.background.genes.txt"))
    }

    /// Returns the cached table of `name`, if present
    ///
    /// # Errors
    ///
    /// If the cached file exists but can not be read or parsed
    pub fn lookup(&self, name: &str) -> EnrichResult<Option<AnnotationTable>> {
        let path = self.path_for(name);
        if !path.exists() {
            return Ok(None);
        }
        debug!("Reading cached background {}", path.display());
        let file = File::open(&path)
            .map_err(|_| EnrichError::CannotOpenFile(path.display().to_string()))?;
        annotation_table::read(BufReader::new(file)).map(Some)
    }

    /// Writes `table` to the cache under `name`
    ///
    /// The table is written to a temporary file first and then moved in place,
    /// so that concurrent readers never see a partial file.
    ///
    /// # Errors
    ///
    /// If the cache directory or file can not be written
    pub fn store(&self, name: &str, table: &AnnotationTable) -> EnrichResult<()> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(name);
        let tmp = path.with_extension("txt.partial");
        {
            let mut writer = BufWriter::new(File::create(&tmp)?);
            annotation_table::write(&mut writer, table)?;
            writer.flush()?;
        }
        fs::rename(&tmp, &path)?;
        debug!("Stored background {} at {}", name, path.display());
        Ok(())
    }

    /// Returns the cached table of `name` or fetches and stores it
    ///
    /// # Errors
    ///
    /// [`EnrichError::BackgroundFetch`] if the table is not cached and
    /// `source` is missing or fails on every attempt of `retry`
    pub fn lookup_or_fetch(
        &self,
        name: &str,
        source: Option<&dyn AnnotationSource>,
        retry: &RetryPolicy,
    ) -> EnrichResult<AnnotationTable> {
        if let Some(table) = self.lookup(name)? {
            return Ok(table);
        }
        let Some(source) = source else {
            return Err(EnrichError::BackgroundFetch(format!(
                "{name} is not cached and no annotation source is configured"
            )));
        };

        warn!(
            "Downloading {} for the first time. It might take a couple of minutes.",
            name
        );
        let table = retry
            .call("fetch background", || source.fetch(name))
            .map_err(|err| {
                EnrichError::BackgroundFetch(format!(
                    "{name} after {} attempts: {}",
                    err.attempts, err.last_error
                ))
            })?;
        self.store(name, &table)?;
        Ok(table)
    }
}
