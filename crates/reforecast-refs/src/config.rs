//! Archive configuration.

use serde::{Deserialize, Serialize};
use std::env;
use std::ops::RangeInclusive;
use std::path::Path;

use crate::error::{RefsError, Result};

/// Root of the GEFSv12 reforecast archive on AWS Open Data.
pub const DEFAULT_ARCHIVE_ROOT: &str = "s3://noaa-gefs-retrospective/GEFSv12/reforecast";

/// What to do when a single index or size request fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Keep going with the files that were fetched and report the rest.
    #[default]
    Isolate,
    /// Fail the whole batch on the first failed request.
    AbortOnFirst,
}

/// Where the archive lives and how it is read.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveConfig {
    /// Archive root URI, `s3://{bucket}/{prefix}`
    pub root: String,
    /// AWS region of the bucket
    pub region: String,
    /// Custom endpoint (MinIO, localstack); `None` uses AWS
    pub endpoint: Option<String>,
    /// Read without credentials (public bucket)
    pub anonymous: bool,
    /// First archive year (inclusive)
    pub first_year: i32,
    /// Last archive year (inclusive)
    pub last_year: i32,
    /// Suffix of the archival binary files
    pub binary_suffix: String,
    /// Suffix appended to a binary file to get its index
    pub index_suffix: String,
    /// Maximum number of in-flight requests during the fetch stage
    pub max_concurrent_requests: usize,
    pub failure_policy: FailurePolicy,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            root: DEFAULT_ARCHIVE_ROOT.to_string(),
            region: "us-east-1".to_string(),
            endpoint: None,
            anonymous: true,
            first_year: 2000,
            last_year: 2019,
            binary_suffix: "grib2".to_string(),
            index_suffix: "idx".to_string(),
            max_concurrent_requests: 64,
            failure_policy: FailurePolicy::Isolate,
        }
    }
}

impl ArchiveConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let config = Self {
            root: env::var("GEFS_ARCHIVE_ROOT").unwrap_or(defaults.root),
            region: env::var("GEFS_ARCHIVE_REGION").unwrap_or(defaults.region),
            endpoint: env::var("GEFS_ARCHIVE_ENDPOINT").ok(),
            anonymous: env::var("GEFS_ARCHIVE_ANONYMOUS")
                .map(|v| v.to_lowercase() == "true" || v == "1")
                .unwrap_or(defaults.anonymous),
            first_year: parse_env("GEFS_FIRST_YEAR")?.unwrap_or(defaults.first_year),
            last_year: parse_env("GEFS_LAST_YEAR")?.unwrap_or(defaults.last_year),
            binary_suffix: defaults.binary_suffix,
            index_suffix: defaults.index_suffix,
            max_concurrent_requests: parse_env("GEFS_MAX_CONCURRENT_REQUESTS")?
                .unwrap_or(defaults.max_concurrent_requests),
            failure_policy: match env::var("GEFS_FAILURE_POLICY").ok().as_deref() {
                None | Some("isolate") => FailurePolicy::Isolate,
                Some("abort_on_first") => FailurePolicy::AbortOnFirst,
                Some(other) => {
                    return Err(RefsError::Config(format!(
                        "unknown failure policy '{}'",
                        other
                    )))
                }
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML file.
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&text)
            .map_err(|e| RefsError::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.first_year > self.last_year {
            return Err(RefsError::Config(format!(
                "first_year {} is after last_year {}",
                self.first_year, self.last_year
            )));
        }
        if self.max_concurrent_requests == 0 {
            return Err(RefsError::Config(
                "max_concurrent_requests must be at least 1".to_string(),
            ));
        }
        if self.bucket().is_none() {
            return Err(RefsError::Config(format!(
                "archive root '{}' is not an s3:// uri",
                self.root
            )));
        }
        Ok(())
    }

    /// Archive years, inclusive on both ends.
    pub fn years(&self) -> RangeInclusive<i32> {
        self.first_year..=self.last_year
    }

    /// Bucket name taken from the archive root.
    pub fn bucket(&self) -> Option<&str> {
        self.root
            .strip_prefix("s3://")
            .and_then(|rest| rest.split('/').next())
            .filter(|bucket| !bucket.is_empty())
    }

    /// Root without a trailing slash.
    pub fn root(&self) -> &str {
        self.root.trim_end_matches('/')
    }
}

fn parse_env<T: std::str::FromStr>(key: &str) -> Result<Option<T>> {
    match env::var(key) {
        Ok(value) => value
            .parse()
            .map(Some)
            .map_err(|_| RefsError::Config(format!("{} has invalid value '{}'", key, value))),
        Err(_) => Ok(None),
    }
}
