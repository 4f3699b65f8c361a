//! GRIB2 index parsing and message byte-range resolution.
//!
//! Index lines are colon delimited, one per message:
//!
//! ```text
//! 1:0:d=2000011200:PRMSL:mean sea level:3 hour fcst:ENS=low-res ctl
//! 2:1061203:d=2000011200:PRMSL:mean sea level:6 hour fcst:ENS=low-res ctl
//! ```
//!
//! Field 0 is the 1-based message number, field 1 the byte offset and field 5
//! the step descriptor. The end of the last message is not in the index; it
//! is the size of the binary file.

use chrono::{Duration, NaiveDateTime};
use tracing::warn;

use crate::error::{RefsError, Result};
use crate::uri::ArchiveUri;

/// Hours between consecutive messages in a reforecast file.
pub const STEP_HOURS: u32 = 3;

/// Placeholder for the binary URL, bound late through the document's templates.
pub const URL_PLACEHOLDER: &str = "{{u}}";

/// Convert a forecast hour into the 0-based message ordinal.
///
/// The reforecast files start at hour 3, so hour 0 has no message.
pub fn message_ordinal(forecast_hour: u32) -> Result<usize> {
    if forecast_hour == 0 {
        return Err(RefsError::InvalidForecastHour {
            hour: forecast_hour,
            reason: "no hour 0 forecast available",
        });
    }
    if forecast_hour % STEP_HOURS != 0 {
        return Err(RefsError::InvalidForecastHour {
            hour: forecast_hour,
            reason: "forecast hour must be divisible by 3",
        });
    }
    Ok((forecast_hour / STEP_HOURS - 1) as usize)
}

/// One message entry of an index file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexRecord {
    /// 0-based position of the line in the index
    pub ordinal: usize,
    /// Message number as written, e.g. `3` or `3.1` for a sub-message
    pub message: String,
    /// Byte offset of the message within the binary file
    pub offset: u64,
    /// Date code without the `d=` prefix
    pub date: String,
    pub parameter: String,
    pub level: String,
    pub step: String,
}

/// Parse index text into records.
///
/// `uri` is only used to label errors.
pub fn parse_index(uri: &str, text: &str) -> Result<Vec<IndexRecord>> {
    let mut lines: Vec<&str> = text.split('\n').collect();
    if lines.last().is_some_and(|line| line.trim().is_empty()) {
        lines.pop();
    }

    let records = lines
        .into_iter()
        .enumerate()
        .map(|(line_no, line)| parse_line(uri, line_no, line.trim_end_matches('\r')))
        .collect::<Result<Vec<_>>>()?;

    if records.is_empty() {
        return Err(RefsError::malformed(uri, "index has no records"));
    }
    Ok(records)
}

/// Records are ordered by line position; the message number is only checked
/// for shape, so wgrib2 sub-message numbers such as `3.1` are accepted.
fn parse_line(uri: &str, line_no: usize, line: &str) -> Result<IndexRecord> {
    let fields: Vec<&str> = line.split(':').collect();
    if fields.len() < 6 {
        return Err(RefsError::malformed(
            uri,
            format!("line {} has {} fields: '{}'", line_no + 1, fields.len(), line),
        ));
    }

    let message = fields[0].trim();
    let well_formed = message
        .split('.')
        .all(|part| !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit()));
    if !well_formed || message.split('.').count() > 2 {
        return Err(RefsError::malformed(
            uri,
            format!("line {}: bad message number '{}'", line_no + 1, fields[0]),
        ));
    }
    let offset: u64 = fields[1].trim().parse().map_err(|_| {
        RefsError::malformed(uri, format!("line {}: bad offset '{}'", line_no + 1, fields[1]))
    })?;

    Ok(IndexRecord {
        ordinal: line_no,
        message: message.to_string(),
        offset,
        date: fields[2].trim_start_matches("d=").to_string(),
        parameter: fields[3].to_string(),
        level: fields[4].to_string(),
        step: fields[5].to_string(),
    })
}

/// Byte range of one message within its binary file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageRange {
    /// URL or placeholder token for it
    pub url: String,
    pub start: u64,
    pub length: u64,
}

impl MessageRange {
    pub fn end(&self) -> u64 {
        self.start + self.length
    }
}

/// Locate message `ordinal` and compute its byte range.
///
/// The first message starts at 0 and ends at the next offset, the last one
/// runs to the end of the file, and every other message runs from its own
/// offset to the next one.
pub fn resolve_range(
    uri: &str,
    records: &[IndexRecord],
    ordinal: usize,
    file_size: u64,
) -> Result<MessageRange> {
    let position = records
        .iter()
        .position(|record| record.ordinal == ordinal)
        .ok_or_else(|| {
            RefsError::malformed(
                uri,
                format!("message {} not in index of {} records", ordinal, records.len()),
            )
        })?;

    let start = if position == 0 {
        0
    } else {
        records[position].offset
    };
    let end = match records.get(position + 1) {
        Some(next) => next.offset,
        None => file_size,
    };

    if end < start || end > file_size {
        return Err(RefsError::malformed(
            uri,
            format!(
                "message {} spans {}..{} outside file of {} bytes",
                ordinal, start, end, file_size
            ),
        ));
    }

    Ok(MessageRange {
        url: URL_PLACEHOLDER.to_string(),
        start,
        length: end - start,
    })
}

/// Lead time in hours from a step descriptor such as `"6 hour fcst"`.
///
/// Uses the last run of digits, so an accumulation window like
/// `"0-6 hour acc fcst"` resolves to its end hour.
// TODO: descriptors in minutes or days are read as hours; check the archive for them.
pub fn lead_hours(uri: &str, step: &str) -> Result<i64> {
    let digits: String = step
        .rsplit(|c: char| !c.is_ascii_digit())
        .find(|run| !run.is_empty())
        .unwrap_or_default()
        .to_string();

    if digits.is_empty() {
        return Err(RefsError::malformed(
            uri,
            format!("no lead time in step '{}'", step),
        ));
    }
    if !step.contains("hour") {
        warn!(uri = %uri, step = %step, "Step descriptor has no hour unit; reading it as hours");
    }

    digits
        .parse()
        .map_err(|_| RefsError::malformed(uri, format!("lead time out of range in '{}'", step)))
}

/// Time coordinates of one message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageTimes {
    /// Forecast initialization time
    pub reference: NaiveDateTime,
    pub lead: Duration,
    pub valid: NaiveDateTime,
}

impl MessageTimes {
    /// `None` when the lead time or the valid time is outside chrono's range.
    pub fn new(reference: NaiveDateTime, lead_hours: i64) -> Option<Self> {
        let lead = Duration::try_hours(lead_hours)?;
        Some(Self {
            reference,
            lead,
            valid: reference.checked_add_signed(lead)?,
        })
    }

    pub fn reference_seconds(&self) -> i64 {
        self.reference.and_utc().timestamp()
    }

    pub fn valid_seconds(&self) -> i64 {
        self.valid.and_utc().timestamp()
    }

    pub fn lead_hours(&self) -> i64 {
        self.lead.num_hours()
    }
}

/// Everything needed to reference one message of one archive file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedMessage {
    pub uri: ArchiveUri,
    pub ordinal: usize,
    pub range: MessageRange,
    pub times: MessageTimes,
}

/// Resolve message `ordinal` of one archive file from its index and size.
pub fn resolve_message(
    uri: &ArchiveUri,
    index: &[u8],
    ordinal: usize,
    file_size: u64,
) -> Result<ResolvedMessage> {
    let label = uri.index_uri();
    let text = std::str::from_utf8(index)
        .map_err(|e| RefsError::malformed(&label, format!("index is not UTF-8: {}", e)))?;

    let records = parse_index(&label, text)?;
    let range = resolve_range(&label, &records, ordinal, file_size)?;

    let record = records
        .iter()
        .find(|record| record.ordinal == ordinal)
        .ok_or_else(|| RefsError::malformed(&label, format!("message {} not in index", ordinal)))?;

    let reference = uri.reference_time()?;
    let hours = lead_hours(&label, &record.step)?;
    let times = MessageTimes::new(reference, hours).ok_or_else(|| {
        RefsError::malformed(
            &label,
            format!("lead time {} hours out of range in '{}'", hours, record.step),
        )
    })?;

    Ok(ResolvedMessage {
        uri: uri.clone(),
        ordinal,
        range,
        times,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const URI: &str = "s3://noaa-gefs-retrospective/GEFSv12/reforecast/2000/2000011200/c00/Days:1-10/pres_msl_2000011200_c00.grib2.idx";

    fn index_text(offsets: &[u64]) -> String {
        offsets
            .iter()
            .enumerate()
            .map(|(i, offset)| {
                format!(
                    "{}:{}:d=2000011200:PRMSL:mean sea level:{} hour fcst:ENS=low-res ctl\n",
                    i + 1,
                    offset,
                    (i + 1) * 3
                )
            })
            .collect()
    }

    #[test]
    fn test_message_ordinal() {
        assert_eq!(message_ordinal(3).unwrap(), 0);
        assert_eq!(message_ordinal(6).unwrap(), 1);
        assert_eq!(message_ordinal(9).unwrap(), 2);
        assert_eq!(message_ordinal(12).unwrap(), 3);
    }

    #[test]
    fn test_message_ordinal_hour_zero() {
        let err = message_ordinal(0).unwrap_err();
        assert!(err.to_string().contains("no hour 0 forecast available"));
    }

    #[test]
    fn test_message_ordinal_not_multiple() {
        let err = message_ordinal(4).unwrap_err();
        assert!(err.to_string().contains("divisible by 3"));
    }

    #[test]
    fn test_parse_index() {
        let records = parse_index(URI, &index_text(&[0, 100, 250])).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[1].ordinal, 1);
        assert_eq!(records[1].offset, 100);
        assert_eq!(records[1].date, "2000011200");
        assert_eq!(records[1].parameter, "PRMSL");
        assert_eq!(records[1].level, "mean sea level");
        assert_eq!(records[1].step, "6 hour fcst");
    }

    #[test]
    fn test_parse_empty_index() {
        assert!(matches!(
            parse_index(URI, ""),
            Err(RefsError::MalformedIndex { .. })
        ));
        assert!(parse_index(URI, "\n").is_err());
    }

    #[test]
    fn test_parse_bad_offset() {
        let err = parse_index(URI, "1:abc:d=2000011200:PRMSL:msl:3 hour fcst:\n").unwrap_err();
        assert!(err.to_string().contains("bad offset"));
    }

    #[test]
    fn test_range_rules() {
        let offsets = [0, 100, 250, 600];
        let records = parse_index(URI, &index_text(&offsets)).unwrap();
        let size = 1000;

        let first = resolve_range(URI, &records, 0, size).unwrap();
        assert_eq!((first.start, first.length), (0, 100));

        let middle = resolve_range(URI, &records, 2, size).unwrap();
        assert_eq!((middle.start, middle.length), (250, 350));

        let last = resolve_range(URI, &records, 3, size).unwrap();
        assert_eq!((last.start, last.length), (600, 400));
        assert_eq!(last.url, URL_PLACEHOLDER);
    }

    #[test]
    fn test_lengths_cover_file() {
        let offsets = [0, 17, 4096, 5000, 5001, 90210];
        let records = parse_index(URI, &index_text(&offsets)).unwrap();
        let size = 100_000;

        let total: u64 = (0..offsets.len())
            .map(|i| resolve_range(URI, &records, i, size).unwrap())
            .inspect(|range| assert!(range.end() <= size))
            .map(|range| range.length)
            .sum();
        assert_eq!(total, size);
    }

    #[test]
    fn test_single_message_index() {
        let records = parse_index(URI, &index_text(&[0])).unwrap();
        let range = resolve_range(URI, &records, 0, 512).unwrap();
        assert_eq!((range.start, range.length), (0, 512));
    }

    #[test]
    fn test_missing_ordinal() {
        let records = parse_index(URI, &index_text(&[0, 100])).unwrap();
        let err = resolve_range(URI, &records, 5, 200).unwrap_err();
        assert!(matches!(err, RefsError::MalformedIndex { .. }));
    }

    #[test]
    fn test_offset_beyond_file() {
        let records = parse_index(URI, &index_text(&[0, 100, 900])).unwrap();
        assert!(resolve_range(URI, &records, 1, 500).is_err());
    }

    #[test]
    fn test_lead_hours() {
        assert_eq!(lead_hours(URI, "3 hour fcst").unwrap(), 3);
        assert_eq!(lead_hours(URI, "240 hour fcst").unwrap(), 240);
        assert_eq!(lead_hours(URI, "0-6 hour acc fcst").unwrap(), 6);
        assert!(lead_hours(URI, "anl").is_err());
    }

    #[test]
    fn test_sub_message_numbers() {
        let text = "\
1:0:d=2000011200:UGRD:10 m above ground:3 hour fcst:
1.1:0:d=2000011200:VGRD:10 m above ground:3 hour fcst:
2:500:d=2000011200:UGRD:10 m above ground:6 hour fcst:
";
        let records = parse_index(URI, text).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[1].message, "1.1");
        assert_eq!(records[2].ordinal, 2);

        let range = resolve_range(URI, &records, 2, 800).unwrap();
        assert_eq!((range.start, range.length), (500, 300));
    }

    #[test]
    fn test_bad_message_number() {
        for number in ["x", "1.", "1.2.3", ""] {
            let text = format!("{}:0:d=2000011200:PRMSL:msl:3 hour fcst:\n", number);
            let err = parse_index(URI, &text).unwrap_err();
            assert!(err.to_string().contains("bad message number"), "{}", number);
        }
    }

    #[test]
    fn test_sample_index_offsets() {
        use test_utils::sample;

        let uri = ArchiveUri::parse(sample::INDEX_URI).unwrap();
        assert_eq!(uri.binary_uri(), sample::BINARY_URI);

        let message = resolve_message(&uri, sample::INDEX.as_bytes(), 1, sample::FILE_SIZE).unwrap();
        assert_eq!((message.range.start, message.range.length), (1_061_203, 1_049_876));

        let last = resolve_message(&uri, sample::INDEX.as_bytes(), 3, sample::FILE_SIZE).unwrap();
        assert_eq!(last.range.end(), sample::FILE_SIZE);
        assert_eq!(last.times.lead_hours(), 12);
    }

    #[test]
    fn test_lead_time_out_of_range() {
        let uri = ArchiveUri::parse(URI).unwrap();

        // valid time past the end of the calendar
        let text = "1:0:d=2000011200:PRMSL:msl:3000000000 hour fcst:\n";
        let err = resolve_message(&uri, text.as_bytes(), 0, 100).unwrap_err();
        assert!(matches!(err, RefsError::MalformedIndex { .. }));

        // lead time beyond what a duration can hold
        let text = "1:0:d=2000011200:PRMSL:msl:9999999999999999 hour fcst:\n";
        let err = resolve_message(&uri, text.as_bytes(), 0, 100).unwrap_err();
        assert!(err.to_string().contains("out of range"));
    }

    #[test]
    fn test_message_times_overflow() {
        let reference = NaiveDateTime::MAX;
        assert!(MessageTimes::new(reference, 1).is_none());
        assert!(MessageTimes::new(reference, i64::MAX).is_none());
    }

    #[test]
    fn test_resolve_message() {
        let uri = ArchiveUri::parse(URI).unwrap();
        let text = index_text(&[0, 100, 250]);
        let message = resolve_message(&uri, text.as_bytes(), 1, 400).unwrap();

        assert_eq!(message.range.start, 100);
        assert_eq!(message.range.length, 150);
        assert_eq!(message.times.lead_hours(), 6);
        assert_eq!(message.times.reference.to_string(), "2000-01-12 00:00:00");
        assert_eq!(message.times.valid.to_string(), "2000-01-12 06:00:00");
        assert_eq!(message.times.reference_seconds(), 947_635_200);
        assert_eq!(message.times.valid_seconds(), 947_635_200 + 6 * 3600);
    }
}
