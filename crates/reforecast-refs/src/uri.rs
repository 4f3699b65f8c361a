//! Archive URI enumeration.
//!
//! Layout of the reforecast archive:
//!
//! ```text
//! {root}/{year}/{year}{MMDD}00/{member}/{horizon}/{variable}_{year}{MMDD}00_{member}.grib2.idx
//! ```
//!
//! The file name repeats the date code and member from the directory path.
//! They are copied positionally from the path segments so that
//! [`ArchiveUri::parse`] can recover every token from a URI string alone.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use std::collections::BTreeSet;
use std::fmt;
use std::ops::RangeInclusive;

use crate::config::ArchiveConfig;
use crate::error::{RefsError, Result};
use crate::request::AnchorRequest;
use crate::window::DayPattern;

/// Initialization hour of every reforecast run.
const CYCLE: &str = "00";

/// One index file in the archive, identified by year, day, member and variable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArchiveUri {
    root: String,
    year: String,
    datecode: String,
    member: String,
    horizon: String,
    variable: String,
    binary_suffix: String,
    index_suffix: String,
}

impl ArchiveUri {
    /// Recover an archive URI from its index-file form.
    pub fn parse(uri: &str) -> Result<Self> {
        let invalid = || RefsError::InvalidUri(uri.to_string());

        let mut segments = uri.rsplitn(6, '/');
        let file_name = segments.next().ok_or_else(invalid)?;
        let horizon = segments.next().ok_or_else(invalid)?;
        let member = segments.next().ok_or_else(invalid)?;
        let datecode = segments.next().ok_or_else(invalid)?;
        let year = segments.next().ok_or_else(invalid)?;
        let root = segments.next().ok_or_else(invalid)?;

        if datecode.len() != 10 || !datecode.starts_with(year) {
            return Err(invalid());
        }

        let marker = format!("_{}_{}.", datecode, member);
        let (variable, suffixes) = file_name.split_once(marker.as_str()).ok_or_else(invalid)?;
        let (binary_suffix, index_suffix) = suffixes.rsplit_once('.').ok_or_else(invalid)?;

        if variable.is_empty() || binary_suffix.is_empty() || index_suffix.is_empty() {
            return Err(invalid());
        }

        let parsed = Self {
            root: root.to_string(),
            year: year.to_string(),
            datecode: datecode.to_string(),
            member: member.to_string(),
            horizon: horizon.to_string(),
            variable: variable.to_string(),
            binary_suffix: binary_suffix.to_string(),
            index_suffix: index_suffix.to_string(),
        };
        parsed.reference_time()?;
        Ok(parsed)
    }

    /// URI of the companion index file.
    pub fn index_uri(&self) -> String {
        format!("{}.{}", self.binary_uri(), self.index_suffix)
    }

    /// URI of the archival binary file (the index URI minus its suffix).
    pub fn binary_uri(&self) -> String {
        format!("{}{}.{}", self.directory(), self.file_stem(), self.binary_suffix)
    }

    /// File name without any suffix, e.g. `pres_msl_2000011200_c00`.
    pub fn file_stem(&self) -> String {
        format!("{}_{}_{}", self.variable, self.datecode, self.member)
    }

    fn directory(&self) -> String {
        format!(
            "{}/{}/{}/{}/{}/",
            self.root, self.year, self.datecode, self.member, self.horizon
        )
    }

    /// Date-hour code of the initialization, `YYYYMMDDHH`.
    pub fn datecode(&self) -> &str {
        &self.datecode
    }

    pub fn member(&self) -> &str {
        &self.member
    }

    pub fn variable(&self) -> &str {
        &self.variable
    }

    pub fn horizon(&self) -> &str {
        &self.horizon
    }

    /// Forecast reference time encoded in the file identifier.
    pub fn reference_time(&self) -> Result<NaiveDateTime> {
        parse_datecode(&self.datecode)
            .ok_or_else(|| RefsError::InvalidUri(format!("bad date code in {}", self.index_uri())))
    }
}

impl fmt::Display for ArchiveUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.index_uri())
    }
}

/// Parse a `YYYYMMDDHH` token.
pub fn parse_datecode(code: &str) -> Option<NaiveDateTime> {
    if code.len() != 10 || !code.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let date = NaiveDate::parse_from_str(&code[..8], "%Y%m%d").ok()?;
    let hour: u32 = code[8..].parse().ok()?;
    Some(date.and_time(NaiveTime::from_hms_opt(hour, 0, 0)?))
}

/// Expands day patterns, years and members into index-file URIs.
#[derive(Debug, Clone)]
pub struct UriEnumerator {
    root: String,
    years: RangeInclusive<i32>,
    binary_suffix: String,
    index_suffix: String,
}

impl UriEnumerator {
    pub fn new(config: &ArchiveConfig) -> Self {
        Self {
            root: config.root().to_string(),
            years: config.years(),
            binary_suffix: config.binary_suffix.clone(),
            index_suffix: config.index_suffix.clone(),
        }
    }

    /// Every index URI for the request's members, horizon and variable.
    pub fn for_request(
        &self,
        patterns: &BTreeSet<DayPattern>,
        request: &AnchorRequest,
    ) -> Vec<ArchiveUri> {
        self.enumerate(
            patterns,
            request.members(),
            request.horizon(),
            request.variable(),
        )
    }

    /// Cartesian product of years, patterns and members.
    ///
    /// Ordered by year, then pattern, then member in the given order.
    pub fn enumerate(
        &self,
        patterns: &BTreeSet<DayPattern>,
        members: &[String],
        horizon: &str,
        variable: &str,
    ) -> Vec<ArchiveUri> {
        let mut uris = Vec::with_capacity(
            self.years.clone().count() * patterns.len() * members.len(),
        );

        for year in self.years.clone() {
            for pattern in patterns {
                for member in members {
                    let prefix = format!(
                        "{}/{}/{}{}{}/{}/{}/",
                        self.root, year, year, pattern, CYCLE, member, horizon
                    );
                    uris.push(self.from_prefix(&prefix, variable));
                }
            }
        }

        uris
    }

    /// Build a URI from its directory prefix, taking the file-name tokens from
    /// the prefix's segments.
    fn from_prefix(&self, prefix: &str, variable: &str) -> ArchiveUri {
        let relative = prefix[self.root.len()..].trim_matches('/');
        let segments: Vec<&str> = relative.split('/').collect();
        let segment = |i: usize| segments.get(i).copied().unwrap_or_default().to_string();

        ArchiveUri {
            root: self.root.clone(),
            year: segment(0),
            datecode: segment(1),
            member: segment(2),
            horizon: segment(3),
            variable: variable.to_string(),
            binary_suffix: self.binary_suffix.clone(),
            index_suffix: self.index_suffix.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::window::day_patterns;

    const SAMPLE: &str = "s3://noaa-gefs-retrospective/GEFSv12/reforecast/2000/2000011200/c00/Days:1-10/pres_msl_2000011200_c00.grib2.idx";

    fn enumerator() -> UriEnumerator {
        UriEnumerator::new(&ArchiveConfig::default())
    }

    #[test]
    fn test_uri_layout() {
        let patterns = day_patterns(NaiveDate::from_ymd_opt(2023, 1, 12).unwrap(), 0);
        let uris = enumerator().enumerate(&patterns, &["c00".to_string()], "Days:1-10", "pres_msl");

        assert_eq!(uris.len(), 20);
        assert_eq!(uris[0].index_uri(), SAMPLE);
        assert_eq!(
            uris[0].binary_uri(),
            "s3://noaa-gefs-retrospective/GEFSv12/reforecast/2000/2000011200/c00/Days:1-10/pres_msl_2000011200_c00.grib2"
        );
        assert!(uris[19].index_uri().contains("/2019/2019011200/"));
    }

    #[test]
    fn test_parse_round_trip() {
        let uri = ArchiveUri::parse(SAMPLE).unwrap();
        assert_eq!(uri.datecode(), "2000011200");
        assert_eq!(uri.member(), "c00");
        assert_eq!(uri.horizon(), "Days:1-10");
        assert_eq!(uri.variable(), "pres_msl");
        assert_eq!(uri.file_stem(), "pres_msl_2000011200_c00");
        assert_eq!(uri.to_string(), SAMPLE);
    }

    #[test]
    fn test_parse_rejects_foreign_paths() {
        assert!(ArchiveUri::parse("s3://bucket/some/file.grib2.idx").is_err());
        assert!(ArchiveUri::parse("pres_msl_2000011200_c00.grib2.idx").is_err());
    }

    #[test]
    fn test_reference_time() {
        let uri = ArchiveUri::parse(SAMPLE).unwrap();
        let time = uri.reference_time().unwrap();
        assert_eq!(time.to_string(), "2000-01-12 00:00:00");
    }

    #[test]
    fn test_member_order_within_day() {
        let patterns = day_patterns(NaiveDate::from_ymd_opt(2023, 6, 1).unwrap(), 0);
        let members = vec!["p02".to_string(), "c00".to_string()];
        let uris = enumerator().enumerate(&patterns, &members, "Days:1-10", "tmp_2m");

        assert_eq!(uris.len(), 40);
        assert_eq!(uris[0].member(), "p02");
        assert_eq!(uris[1].member(), "c00");
        assert_eq!(uris[1].file_stem(), "tmp_2m_2000060100_c00");
    }
}
