//! Reference documents and the per-file template fill.
//!
//! A reference document (version 1) maps zarr v2 store keys to either inline
//! content or a byte range of a remote file:
//!
//! ```json
//! {
//!   "version": 1,
//!   "templates": {"u": "s3://.../pres_msl_2000011200_c00.grib2"},
//!   "refs": {
//!     "msl/.zarray": "{\"shape\":[721,1440],...}",
//!     "msl/0.0": ["{{u}}", 1061203, 1049876],
//!     "time/0": "base64:AMR7OAAAAAA="
//!   }
//! }
//! ```

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

use crate::error::{RefsError, Result};
use crate::index::{MessageRange, MessageTimes, ResolvedMessage, URL_PLACEHOLDER};

/// Prefix marking inline binary content.
pub const BASE64_PREFIX: &str = "base64:";

/// Template key bound to the binary file URL.
pub const URL_TEMPLATE_KEY: &str = "u";

pub const TIME_KEY: &str = "time/0";
pub const VALID_TIME_KEY: &str = "valid_time/0";
pub const STEP_KEY: &str = "step/0";

const SCALAR_KEYS: [&str; 3] = [TIME_KEY, VALID_TIME_KEY, STEP_KEY];

const PRES_MSL_TEMPLATE: &str = include_str!("../assets/representative_pres_msl.json");

/// One value in a reference document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RefEntry {
    /// Inline text, or binary content behind [`BASE64_PREFIX`]
    Inline(String),
    /// `[url, offset, length]`
    Range(String, u64, u64),
    /// `[url]`, the whole file
    Whole((String,)),
}

impl RefEntry {
    pub fn is_reference(&self) -> bool {
        !matches!(self, Self::Inline(_))
    }

    /// Decode inline content; binary content is base64 decoded.
    pub fn inline_bytes(&self) -> Option<Vec<u8>> {
        match self {
            Self::Inline(text) => match text.strip_prefix(BASE64_PREFIX) {
                Some(encoded) => STANDARD.decode(encoded).ok(),
                None => Some(text.as_bytes().to_vec()),
            },
            _ => None,
        }
    }

    pub fn inline_binary(bytes: &[u8]) -> Self {
        Self::Inline(format!("{}{}", BASE64_PREFIX, STANDARD.encode(bytes)))
    }
}

/// A reference document: a virtual zarr store over remote byte ranges.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceDocument {
    pub version: u32,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub templates: BTreeMap<String, String>,
    pub refs: BTreeMap<String, RefEntry>,
}

impl ReferenceDocument {
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    pub fn to_vec(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Scalar `i64` stored inline under `key`.
    pub fn scalar_i64(&self, key: &str) -> Option<i64> {
        let bytes = self.refs.get(key)?.inline_bytes()?;
        decode_i64(&bytes)
    }

    /// Payload reference with its URL template resolved.
    pub fn resolved_range(&self, key: &str) -> Option<MessageRange> {
        match self.refs.get(key)? {
            RefEntry::Range(url, start, length) => Some(MessageRange {
                url: self.expand_url(url),
                start: *start,
                length: *length,
            }),
            _ => None,
        }
    }

    /// Replace `{{name}}` placeholders with their template values.
    pub fn expand_url(&self, url: &str) -> String {
        self.templates
            .iter()
            .fold(url.to_string(), |url, (name, value)| {
                url.replace(&format!("{{{{{}}}}}", name), value)
            })
    }
}

/// Encode a scalar as 8 little-endian bytes, base64 text.
pub fn encode_i64(value: i64) -> RefEntry {
    RefEntry::inline_binary(&value.to_le_bytes())
}

pub fn decode_i64(bytes: &[u8]) -> Option<i64> {
    let array: [u8; 8] = bytes.try_into().ok()?;
    Some(i64::from_le_bytes(array))
}

/// Read-only reference skeleton for one variable.
///
/// Holds exactly one payload reference and the `time`, `valid_time` and
/// `step` scalars; [`ReferenceTemplate::fill`] returns a new document per file.
#[derive(Debug, Clone)]
pub struct ReferenceTemplate {
    document: ReferenceDocument,
    payload_key: String,
}

impl ReferenceTemplate {
    /// Template bundled with the crate for `variable`.
    pub fn bundled(variable: &str) -> Result<Self> {
        let text = match variable {
            "pres_msl" => PRES_MSL_TEMPLATE,
            other => {
                return Err(RefsError::Template(format!(
                    "no bundled template for variable '{}'",
                    other
                )))
            }
        };
        Self::from_json(text.as_bytes())
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| {
            RefsError::Template(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_json(&bytes)
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        let document: ReferenceDocument = serde_json::from_slice(bytes)
            .map_err(|e| RefsError::Template(format!("invalid reference document: {}", e)))?;
        Self::new(document)
    }

    pub fn new(document: ReferenceDocument) -> Result<Self> {
        let payloads: Vec<&String> = document
            .refs
            .iter()
            .filter(|(_, entry)| entry.is_reference())
            .map(|(key, _)| key)
            .collect();

        let payload_key = match payloads.as_slice() {
            [key] => (*key).clone(),
            keys => {
                return Err(RefsError::Template(format!(
                    "expected exactly one payload reference, found {}",
                    keys.len()
                )))
            }
        };

        for key in SCALAR_KEYS {
            match document.refs.get(key) {
                Some(RefEntry::Inline(_)) => {}
                _ => {
                    return Err(RefsError::Template(format!(
                        "missing inline scalar '{}'",
                        key
                    )))
                }
            }
        }

        debug!(payload = %payload_key, keys = document.refs.len(), "Loaded reference template");
        Ok(Self {
            document,
            payload_key,
        })
    }

    /// Key of the payload chunk, e.g. `msl/0.0`.
    pub fn payload_key(&self) -> &str {
        &self.payload_key
    }

    pub fn document(&self) -> &ReferenceDocument {
        &self.document
    }

    /// Produce the reference document for one message of one binary file.
    pub fn fill(
        &self,
        range: &MessageRange,
        binary_url: &str,
        times: &MessageTimes,
    ) -> ReferenceDocument {
        let mut document = self.document.clone();

        document.refs.insert(
            self.payload_key.clone(),
            RefEntry::Range(URL_PLACEHOLDER.to_string(), range.start, range.length),
        );
        document.templates = BTreeMap::from([(
            URL_TEMPLATE_KEY.to_string(),
            binary_url.to_string(),
        )]);

        document
            .refs
            .insert(TIME_KEY.to_string(), encode_i64(times.reference_seconds()));
        document
            .refs
            .insert(VALID_TIME_KEY.to_string(), encode_i64(times.valid_seconds()));
        document
            .refs
            .insert(STEP_KEY.to_string(), encode_i64(times.lead_hours()));

        document
    }

    /// Fill the template for a resolved message.
    pub fn fill_message(&self, message: &ResolvedMessage) -> ReferenceDocument {
        self.fill(&message.range, &message.uri.binary_uri(), &message.times)
    }
}

/// Output file name: `{file stem}_{ordinal:02}.json`.
pub fn output_name(message: &ResolvedMessage) -> String {
    format!("{}_{:02}.json", message.uri.file_stem(), message.ordinal)
}
