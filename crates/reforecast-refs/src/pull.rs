//! End-to-end pull: enumerate, fetch, resolve, fill, write and merge.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::config::ArchiveConfig;
use crate::error::{RefsError, Result};
use crate::fetch::{FetchOutcome, IndexFetcher};
use crate::index::resolve_message;
use crate::local::ReferenceStore;
use crate::merge::{CombinedReference, DatasetLoader, ReferenceSetMerger};
use crate::request::AnchorRequest;
use crate::store::ArchiveReader;
use crate::template::{output_name, ReferenceTemplate};
use crate::uri::{ArchiveUri, UriEnumerator};
use crate::window::{day_patterns, DayPattern};

/// Name of the persisted combined document.
pub const COMBINED_NAME: &str = "combined.json";

/// Pipeline stage at which a file was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureStage {
    Fetch,
    Resolve,
    Write,
}

impl fmt::Display for FailureStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Fetch => "fetch",
            Self::Resolve => "resolve",
            Self::Write => "write",
        };
        f.write_str(name)
    }
}

/// An archive file excluded from the combined document.
#[derive(Debug)]
pub struct FileFailure {
    /// Index URI of the file
    pub uri: String,
    pub stage: FailureStage,
    pub error: RefsError,
}

/// Result of a pull.
#[derive(Debug)]
pub struct PullReport {
    pub combined: CombinedReference,
    /// Locations of the per-file documents, in enumeration order
    pub manifest: Vec<String>,
    pub failures: Vec<FileFailure>,
    /// Number of archive files enumerated
    pub enumerated: usize,
}

/// Builds the combined reference document for one anchor request.
#[derive(Debug)]
pub struct RetrospectivePull {
    config: ArchiveConfig,
    request: AnchorRequest,
    template: ReferenceTemplate,
    patterns: BTreeSet<DayPattern>,
    uris: Vec<ArchiveUri>,
    merger: ReferenceSetMerger,
}

impl RetrospectivePull {
    /// Prepare a pull using the bundled template for the request's variable.
    pub fn new(config: ArchiveConfig, request: AnchorRequest) -> Result<Self> {
        let template = ReferenceTemplate::bundled(request.variable())?;
        Self::with_template(config, request, template)
    }

    pub fn with_template(
        config: ArchiveConfig,
        request: AnchorRequest,
        template: ReferenceTemplate,
    ) -> Result<Self> {
        config.validate()?;

        let patterns = day_patterns(request.date(), request.window_days());
        let uris = UriEnumerator::new(&config).for_request(&patterns, &request);

        info!(
            date = %request.date(),
            forecast_hour = request.forecast_hour(),
            patterns = patterns.len(),
            files = uris.len(),
            "Prepared retrospective pull"
        );

        Ok(Self {
            config,
            request,
            template,
            patterns,
            uris,
            merger: ReferenceSetMerger::new()?,
        })
    }

    pub fn request(&self) -> &AnchorRequest {
        &self.request
    }

    pub fn patterns(&self) -> &BTreeSet<DayPattern> {
        &self.patterns
    }

    pub fn uris(&self) -> &[ArchiveUri] {
        &self.uris
    }

    /// Fetch every index and binary size.
    pub async fn fetch(&self, reader: Arc<dyn ArchiveReader>) -> Result<FetchOutcome> {
        IndexFetcher::new(
            reader,
            self.config.max_concurrent_requests,
            self.config.failure_policy,
        )
        .fetch(&self.uris)
        .await
    }

    /// Resolve, fill and write one document per fetched file.
    ///
    /// Returns the written locations and the files that were dropped,
    /// including those that already failed to fetch.
    pub fn write_references(
        &self,
        outcome: FetchOutcome,
        store: &dyn ReferenceStore,
    ) -> (Vec<String>, Vec<FileFailure>) {
        let ordinal = self.request.message_ordinal();
        let mut manifest = Vec::with_capacity(outcome.files.len());
        let mut failures: Vec<FileFailure> = outcome
            .failures
            .into_iter()
            .map(|failure| FileFailure {
                uri: failure.uri.index_uri(),
                stage: FailureStage::Fetch,
                error: failure.error,
            })
            .collect();

        for uri in &self.uris {
            let key = uri.index_uri();
            let Some(file) = outcome.files.get(&key) else {
                continue;
            };

            let message = match resolve_message(uri, &file.index, ordinal, file.size) {
                Ok(message) => message,
                Err(error) => {
                    warn!(uri = %key, error = %error, "Skipping file");
                    failures.push(FileFailure {
                        uri: key,
                        stage: FailureStage::Resolve,
                        error,
                    });
                    continue;
                }
            };

            let written = self
                .template
                .fill_message(&message)
                .to_vec()
                .and_then(|bytes| store.write(&output_name(&message), &bytes));

            match written {
                Ok(location) => manifest.push(location),
                Err(error) => {
                    warn!(uri = %key, error = %error, "Failed to write reference document");
                    failures.push(FileFailure {
                        uri: key,
                        stage: FailureStage::Write,
                        error,
                    });
                }
            }
        }

        (manifest, failures)
    }

    /// Run the whole pipeline and merge the written documents.
    #[instrument(skip(self, reader, store), fields(date = %self.request.date(), fhour = self.request.forecast_hour()))]
    pub async fn run(
        &self,
        reader: Arc<dyn ArchiveReader>,
        store: &dyn ReferenceStore,
    ) -> Result<PullReport> {
        let outcome = self.fetch(reader).await?;
        let (manifest, failures) = self.write_references(outcome, store);

        if manifest.is_empty() {
            return Err(RefsError::NothingToMerge {
                failed: failures.len(),
            });
        }

        let combined = self.merger.merge(store, &manifest)?;

        info!(
            written = manifest.len(),
            failed = failures.len(),
            members = combined.axes.member.len(),
            times = combined.axes.time.len(),
            "Retrospective pull complete"
        );

        Ok(PullReport {
            combined,
            manifest,
            failures,
            enumerated: self.uris.len(),
        })
    }
}

impl PullReport {
    /// Persist the combined document next to the per-file documents.
    pub fn persist(&self, store: &dyn ReferenceStore) -> Result<String> {
        store.write(COMBINED_NAME, &self.combined.to_vec()?)
    }

    /// Hand the combined document to a dataset loader.
    pub fn open_dataset<L: DatasetLoader>(&self, loader: &L) -> Result<L::Dataset> {
        loader.open(&self.combined)
    }
}
