//! Concurrent fetch of index files and binary file sizes.
//!
//! Both batches are issued from the calling task and collected at a single
//! gather point. Each request produces its own result, so one missing object
//! never hides the others.

use bytes::Bytes;
use futures::stream::{self, StreamExt};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tracing::{debug, info, instrument, warn};

use crate::config::FailurePolicy;
use crate::error::{RefsError, Result};
use crate::store::ArchiveReader;
use crate::uri::ArchiveUri;

/// Index text and binary size for one archive file.
#[derive(Debug, Clone)]
pub struct FetchedFile {
    pub uri: ArchiveUri,
    pub index: Bytes,
    pub size: u64,
}

/// A request that did not succeed.
#[derive(Debug)]
pub struct FetchFailure {
    pub uri: ArchiveUri,
    pub error: RefsError,
}

/// Partitioned result of the fetch stage.
#[derive(Debug, Default)]
pub struct FetchOutcome {
    /// Files whose index and size were both fetched, keyed by index URI
    pub files: BTreeMap<String, FetchedFile>,
    pub failures: Vec<FetchFailure>,
}

/// Request budget held for the duration of one fetch stage.
///
/// Dropping the session closes it, so it is released on every exit path.
struct FetchSession {
    permits: Arc<Semaphore>,
    opened: Instant,
}

impl FetchSession {
    fn open(max_requests: usize) -> Self {
        debug!(max_requests, "Opening fetch session");
        Self {
            permits: Arc::new(Semaphore::new(max_requests.max(1))),
            opened: Instant::now(),
        }
    }

    async fn run<T, F>(&self, request: F) -> Result<T>
    where
        F: std::future::Future<Output = Result<T>>,
    {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|e| RefsError::Other(anyhow::anyhow!("fetch session closed: {}", e)))?;
        request.await
    }
}

impl Drop for FetchSession {
    fn drop(&mut self) {
        self.permits.close();
        debug!(
            elapsed_ms = self.opened.elapsed().as_millis() as u64,
            "Closed fetch session"
        );
    }
}

/// Fetches every index file and the size of every binary file.
pub struct IndexFetcher<R: ?Sized> {
    reader: Arc<R>,
    max_concurrent: usize,
    policy: FailurePolicy,
}

impl<R: ArchiveReader + ?Sized> IndexFetcher<R> {
    pub fn new(reader: Arc<R>, max_concurrent: usize, policy: FailurePolicy) -> Self {
        Self {
            reader,
            max_concurrent: max_concurrent.max(1),
            policy,
        }
    }

    /// Fetch index contents and binary sizes for `uris`.
    ///
    /// With [`FailurePolicy::Isolate`] failed URIs are reported in the outcome;
    /// with [`FailurePolicy::AbortOnFirst`] the first failure is returned as
    /// the error once all requests have completed.
    #[instrument(skip(self, uris), fields(files = uris.len()))]
    pub async fn fetch(&self, uris: &[ArchiveUri]) -> Result<FetchOutcome> {
        let session = FetchSession::open(self.max_concurrent);

        let indexes = stream::iter(uris.iter().map(|uri| {
            let index_uri = uri.index_uri();
            let session = &session;
            async move {
                let result = session.run(self.reader.fetch(&index_uri)).await;
                (index_uri, result)
            }
        }))
        .buffer_unordered(self.max_concurrent)
        .collect::<HashMap<_, _>>();

        let sizes = stream::iter(uris.iter().map(|uri| {
            let index_uri = uri.index_uri();
            let binary_uri = uri.binary_uri();
            let session = &session;
            async move {
                let result = session.run(self.reader.size(&binary_uri)).await;
                (index_uri, result)
            }
        }))
        .buffer_unordered(self.max_concurrent)
        .collect::<HashMap<_, _>>();

        let (mut indexes, mut sizes) = futures::join!(indexes, sizes);
        drop(session);

        let mut outcome = FetchOutcome::default();
        for uri in uris {
            let key = uri.index_uri();
            let index = indexes.remove(&key);
            let size = sizes.remove(&key);

            match (index, size) {
                (Some(Ok(index)), Some(Ok(size))) => {
                    outcome.files.insert(
                        key,
                        FetchedFile {
                            uri: uri.clone(),
                            index,
                            size,
                        },
                    );
                }
                (index, size) => {
                    // index error wins over size error
                    let error = match (index, size) {
                        (Some(Err(e)), _) | (_, Some(Err(e))) => e,
                        // same URI enumerated twice; the first copy was kept
                        _ => continue,
                    };
                    warn!(uri = %key, error = %error, "Fetch failed");
                    outcome.failures.push(FetchFailure {
                        uri: uri.clone(),
                        error,
                    });
                }
            }
        }

        info!(
            fetched = outcome.files.len(),
            failed = outcome.failures.len(),
            "Fetch stage complete"
        );

        if self.policy == FailurePolicy::AbortOnFirst {
            if let Some(failure) = std::mem::take(&mut outcome.failures).into_iter().next() {
                return Err(failure.error);
            }
        }

        Ok(outcome)
    }
}
