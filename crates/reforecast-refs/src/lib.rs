//! Byte-range reference documents for the GEFSv12 reforecast archive.
//!
//! Builds a virtual zarr store over the archived GRIB2 files without
//! downloading them: only the small index files and the binary file sizes
//! are read.
//!
//! # Pipeline
//!
//! - Expand an anchor date into calendar days of the year (`window`)
//! - Enumerate archive files for every year, day and member (`uri`)
//! - Fetch indexes and binary sizes concurrently (`fetch`)
//! - Resolve the byte range of the requested message (`index`)
//! - Fill the reference template once per file (`template`)
//! - Merge the per-file documents along member, step and time (`merge`)
//!
//! [`RetrospectivePull`] runs all stages for one [`AnchorRequest`].

pub mod config;
pub mod error;
pub mod fetch;
pub mod index;
pub mod local;
pub mod merge;
pub mod pull;
pub mod request;
pub mod store;
pub mod template;
pub mod uri;
pub mod window;

// Re-exports
pub use config::{ArchiveConfig, FailurePolicy, DEFAULT_ARCHIVE_ROOT};
pub use error::{RefsError, Result};
pub use fetch::{FetchOutcome, FetchedFile, IndexFetcher};
pub use index::{message_ordinal, resolve_message, MessageRange, MessageTimes, ResolvedMessage};
pub use local::{DirectoryStore, MemoryStore, ReferenceStore};
pub use merge::{CombinedReference, DatasetLoader, MergedAxes, ReferenceSetMerger};
pub use pull::{FailureStage, FileFailure, PullReport, RetrospectivePull};
pub use request::AnchorRequest;
pub use store::{ArchiveReader, ArchiveStore};
pub use template::{RefEntry, ReferenceDocument, ReferenceTemplate};
pub use uri::{ArchiveUri, UriEnumerator};
pub use window::{day_patterns, DayPattern};
