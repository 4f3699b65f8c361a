//! Generators for synthetic archive files.
//!
//! Index text and binary files are consistent with each other: the offsets
//! in the index are the running sum of the message sizes and the binary is
//! exactly as long as all messages together.

use bytes::Bytes;
use object_store::{memory::InMemory, path::Path, ObjectStore};

use crate::fixtures::{HORIZON, MESSAGE_SIZES, ROOT_PREFIX, VARIABLE};

/// Creates GRIB2 index text for messages of the given sizes.
///
/// Message `n` (1-based) is the `3 * n` hour forecast.
///
/// # Example
///
/// ```
/// use test_utils::index_text;
///
/// let text = index_text("2000011200", &[10, 20]);
/// assert_eq!(
///     text,
///     "1:0:d=2000011200:PRMSL:mean sea level:3 hour fcst:ENS=low-res ctl\n\
///      2:10:d=2000011200:PRMSL:mean sea level:6 hour fcst:ENS=low-res ctl\n"
/// );
/// ```
pub fn index_text(datecode: &str, sizes: &[u64]) -> String {
    let mut offset = 0;
    let mut text = String::new();
    for (i, size) in sizes.iter().enumerate() {
        text.push_str(&format!(
            "{}:{}:d={}:PRMSL:mean sea level:{} hour fcst:ENS=low-res ctl\n",
            i + 1,
            offset,
            datecode,
            (i + 1) * 3
        ));
        offset += size;
    }
    text
}

/// Byte offset where message `ordinal` (0-based) starts.
pub fn message_offset(sizes: &[u64], ordinal: usize) -> u64 {
    sizes.iter().take(ordinal).sum()
}

/// Object keys `(index, binary)` of one archive file.
pub fn archive_keys(year: i32, mmdd: &str, member: &str) -> (String, String) {
    let datecode = format!("{}{}00", year, mmdd);
    let binary = format!(
        "{}/{}/{}/{}/{}/{}_{}_{}.grib2",
        ROOT_PREFIX, year, datecode, member, HORIZON, VARIABLE, datecode, member
    );
    (format!("{}.idx", binary), binary)
}

/// Write one index file and its binary file into `store`.
pub async fn seed_file(store: &InMemory, year: i32, mmdd: &str, member: &str, sizes: &[u64]) {
    let (index_key, binary_key) = archive_keys(year, mmdd, member);
    let datecode = format!("{}{}00", year, mmdd);
    let total: u64 = sizes.iter().sum();

    store
        .put(
            &Path::from(index_key),
            Bytes::from(index_text(&datecode, sizes)).into(),
        )
        .await
        .expect("failed to seed index");
    store
        .put(
            &Path::from(binary_key),
            Bytes::from(vec![0u8; total as usize]).into(),
        )
        .await
        .expect("failed to seed binary");
}

/// Seed every combination of years, day patterns and members.
pub async fn seed_archive(store: &InMemory, years: &[i32], patterns: &[&str], members: &[&str]) {
    for year in years {
        for mmdd in patterns {
            for member in members {
                seed_file(store, *year, mmdd, member, &MESSAGE_SIZES).await;
            }
        }
    }
}
