//! Merge per-file reference documents into one combined document.
//!
//! Every input describes a single message: a data variable over
//! `latitude, longitude` plus scalar `time`, `step` and `valid_time`. The
//! combined document stacks the data variable along new leading `member`,
//! `step` and `time` dimensions, keeps one copy of the grid coordinates, and
//! turns the remaining scalars into `[step, time]` arrays.

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::Path;
use tracing::{debug, info, instrument};

use crate::error::{RefsError, Result};
use crate::local::ReferenceStore;
use crate::template::{RefEntry, ReferenceDocument};

pub const MEMBER_DIM: &str = "member";
pub const STEP_DIM: &str = "step";
pub const TIME_DIM: &str = "time";
pub const LATITUDE_DIM: &str = "latitude";
pub const LONGITUDE_DIM: &str = "longitude";

/// A letter followed by two digits, e.g. `c00` or `p04`.
pub const MEMBER_PATTERN: &str = r"[A-Za-z]\d\d";

const DIMENSIONS_ATTR: &str = "_ARRAY_DIMENSIONS";

/// NaT in numpy's datetime64 encoding; used where a `[step, time]` cell has no input.
const MISSING_I64: i64 = i64::MIN;

/// zarr v2 array metadata (`.zarray`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct ArrayMeta {
    shape: Vec<u64>,
    chunks: Vec<u64>,
    dtype: String,
    #[serde(flatten)]
    rest: Map<String, Value>,
}

impl ArrayMeta {
    fn coordinate(len: usize, dtype: &str) -> Self {
        let rest = json!({
            "compressor": null,
            "fill_value": null,
            "filters": null,
            "order": "C",
            "zarr_format": 2,
        });
        Self {
            shape: vec![len as u64],
            chunks: vec![len as u64],
            dtype: dtype.to_string(),
            rest: match rest {
                Value::Object(map) => map,
                _ => Map::new(),
            },
        }
    }
}

/// Coordinate values of the combined document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergedAxes {
    pub member: Vec<String>,
    /// Lead times in hours
    pub step: Vec<i64>,
    /// Reference times in seconds since the epoch
    pub time: Vec<i64>,
}

/// The combined reference document and its axes.
#[derive(Debug, Clone)]
pub struct CombinedReference {
    pub document: ReferenceDocument,
    pub axes: MergedAxes,
}

impl CombinedReference {
    pub fn to_vec(&self) -> Result<Vec<u8>> {
        self.document.to_vec()
    }
}

/// Materializes a lazily-readable dataset from a combined document.
pub trait DatasetLoader {
    type Dataset;

    fn open(&self, reference: &CombinedReference) -> Result<Self::Dataset>;
}

/// One parsed input with its coordinates.
struct Input {
    location: String,
    member: String,
    step: i64,
    time: i64,
    document: ReferenceDocument,
}

/// How each variable of the inputs is combined.
#[derive(Debug, Clone)]
enum VariableKind {
    /// Grid coordinate shared by every input
    Identical,
    /// `step` or `time`, rebuilt from the scalar values
    Axis,
    /// Array with dimensions, stacked along member, step and time
    Data { meta: ArrayMeta, dims: Vec<String> },
    /// Other scalar, stacked along step and time
    Scalar { meta: ArrayMeta },
}

/// Combines per-file reference documents along member, step and time.
#[derive(Debug, Clone)]
pub struct ReferenceSetMerger {
    member_pattern: Regex,
    identical_dims: Vec<String>,
}

impl ReferenceSetMerger {
    pub fn new() -> Result<Self> {
        let member_pattern = Regex::new(MEMBER_PATTERN)
            .map_err(|e| RefsError::Other(anyhow::anyhow!("bad member pattern: {}", e)))?;
        Ok(Self {
            member_pattern,
            identical_dims: vec![LATITUDE_DIM.to_string(), LONGITUDE_DIM.to_string()],
        })
    }

    /// Member token from a location's base name.
    ///
    /// The last match wins so that a variable name such as `hgt_abv700mb`
    /// does not shadow the member token that follows the date code.
    pub fn member_token(&self, location: &str) -> Option<String> {
        let base = Path::new(location).file_name()?.to_str()?;
        self.member_pattern
            .find_iter(base)
            .last()
            .map(|m| m.as_str().to_string())
    }

    /// Read every document in `manifest` from `store` and merge them.
    #[instrument(skip(self, store, manifest), fields(inputs = manifest.len()))]
    pub fn merge(&self, store: &dyn ReferenceStore, manifest: &[String]) -> Result<CombinedReference> {
        let documents = manifest
            .iter()
            .map(|location| {
                let bytes = store.read(location)?;
                let document = ReferenceDocument::from_slice(&bytes)
                    .map_err(|e| RefsError::merge(location, e.to_string()))?;
                Ok((location.clone(), document))
            })
            .collect::<Result<Vec<_>>>()?;

        self.merge_documents(documents)
    }

    /// Merge already-parsed documents, each labelled with its location.
    pub fn merge_documents(
        &self,
        documents: Vec<(String, ReferenceDocument)>,
    ) -> Result<CombinedReference> {
        if documents.is_empty() {
            return Err(RefsError::NothingToMerge { failed: 0 });
        }

        let inputs = documents
            .into_iter()
            .map(|(location, document)| self.input(location, document))
            .collect::<Result<Vec<_>>>()?;

        let axes = MergedAxes {
            member: inputs
                .iter()
                .map(|i| i.member.clone())
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect(),
            step: sorted_unique(inputs.iter().map(|i| i.step)),
            time: sorted_unique(inputs.iter().map(|i| i.time)),
        };

        let positions: Vec<(usize, usize, usize)> = inputs
            .iter()
            .map(|input| {
                (
                    position(&axes.member, &input.member),
                    position(&axes.step, &input.step),
                    position(&axes.time, &input.time),
                )
            })
            .collect();

        let mut seen = HashSet::new();
        for (input, pos) in inputs.iter().zip(&positions) {
            if !seen.insert(*pos) {
                return Err(RefsError::merge(
                    &input.location,
                    format!(
                        "duplicate entry for member {} step {} time {}",
                        input.member, input.step, input.time
                    ),
                ));
            }
        }

        let first = &inputs[0];
        let variables = self.classify(first)?;
        for input in &inputs[1..] {
            check_compatible(first, input, &variables)?;
        }

        let mut refs = BTreeMap::new();
        for (key, entry) in &first.document.refs {
            if !key.contains('/') {
                refs.insert(key.clone(), entry.clone());
            }
        }

        for (name, kind) in &variables {
            match kind {
                VariableKind::Identical => {
                    let prefix = format!("{}/", name);
                    for (key, entry) in first.document.refs.range(prefix.clone()..) {
                        if !key.starts_with(&prefix) {
                            break;
                        }
                        refs.insert(key.clone(), resolve_entry(&first.document, entry));
                    }
                }
                VariableKind::Axis => {
                    let values = if name == STEP_DIM { &axes.step } else { &axes.time };
                    write_axis(&mut refs, first, name, values)?;
                }
                VariableKind::Data { meta, dims } => {
                    write_data(&mut refs, name, meta, dims, &inputs, &positions, &axes)?;
                }
                VariableKind::Scalar { meta } => {
                    write_scalar(&mut refs, name, meta, &inputs, &positions, &axes)?;
                }
            }
        }

        write_members(&mut refs, &axes.member)?;

        info!(
            members = axes.member.len(),
            steps = axes.step.len(),
            times = axes.time.len(),
            refs = refs.len(),
            "Merged reference documents"
        );

        Ok(CombinedReference {
            document: ReferenceDocument {
                version: 1,
                templates: BTreeMap::new(),
                refs,
            },
            axes,
        })
    }

    fn input(&self, location: String, document: ReferenceDocument) -> Result<Input> {
        let member = self
            .member_token(&location)
            .ok_or_else(|| RefsError::merge(&location, "no member token in file name"))?;
        let step = document
            .scalar_i64(&format!("{}/0", STEP_DIM))
            .ok_or_else(|| RefsError::merge(&location, "missing step scalar"))?;
        let time = document
            .scalar_i64(&format!("{}/0", TIME_DIM))
            .ok_or_else(|| RefsError::merge(&location, "missing time scalar"))?;

        debug!(location = %location, member = %member, step, time, "Merge input");
        Ok(Input {
            location,
            member,
            step,
            time,
            document,
        })
    }

    fn classify(&self, input: &Input) -> Result<BTreeMap<String, VariableKind>> {
        let mut variables = BTreeMap::new();

        for name in variable_names(&input.document) {
            let kind = if self.identical_dims.contains(&name) {
                VariableKind::Identical
            } else if name == STEP_DIM || name == TIME_DIM {
                VariableKind::Axis
            } else if name == MEMBER_DIM {
                return Err(RefsError::merge(
                    &input.location,
                    "input already has a member variable",
                ));
            } else {
                let meta = array_meta(input, &name)?;
                let dims = dimensions(input, &name)?;
                if dims.is_empty() {
                    VariableKind::Scalar { meta }
                } else {
                    VariableKind::Data { meta, dims }
                }
            };
            variables.insert(name, kind);
        }

        for dim in &self.identical_dims {
            if !variables.contains_key(dim) {
                return Err(RefsError::merge(
                    &input.location,
                    format!("missing grid coordinate '{}'", dim),
                ));
            }
        }

        Ok(variables)
    }
}

fn write_axis(
    refs: &mut BTreeMap<String, RefEntry>,
    first: &Input,
    name: &str,
    values: &[i64],
) -> Result<()> {
    let mut meta = array_meta(first, name)?;
    if meta.dtype != "<i8" {
        return Err(RefsError::merge(
            &first.location,
            format!("{} has dtype {}, expected <i8", name, meta.dtype),
        ));
    }
    meta.shape = vec![values.len() as u64];
    meta.chunks = vec![values.len() as u64];

    let mut attrs = attributes(first, name)?;
    attrs.insert(DIMENSIONS_ATTR.to_string(), json!([name]));

    let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
    insert_array(refs, name, &meta, &attrs)?;
    refs.insert(format!("{}/0", name), RefEntry::inline_binary(&bytes));
    Ok(())
}

fn write_data(
    refs: &mut BTreeMap<String, RefEntry>,
    name: &str,
    meta: &ArrayMeta,
    dims: &[String],
    inputs: &[Input],
    positions: &[(usize, usize, usize)],
    axes: &MergedAxes,
) -> Result<()> {
    let mut combined = meta.clone();
    combined.shape = [
        axes.member.len() as u64,
        axes.step.len() as u64,
        axes.time.len() as u64,
    ]
    .into_iter()
    .chain(meta.shape.iter().copied())
    .collect();
    combined.chunks = [1, 1, 1].into_iter().chain(meta.chunks.iter().copied()).collect();

    let mut attrs = attributes(&inputs[0], name)?;
    let combined_dims: Vec<&str> = [MEMBER_DIM, STEP_DIM, TIME_DIM]
        .into_iter()
        .chain(dims.iter().map(String::as_str))
        .collect();
    attrs.insert(DIMENSIONS_ATTR.to_string(), json!(combined_dims));
    insert_array(refs, name, &combined, &attrs)?;

    let prefix = format!("{}/", name);
    for (input, (m, s, t)) in inputs.iter().zip(positions) {
        for (key, entry) in input.document.refs.range(prefix.clone()..) {
            let Some(chunk) = key.strip_prefix(&prefix) else {
                break;
            };
            if chunk.starts_with('.') {
                continue;
            }
            refs.insert(
                format!("{}{}.{}.{}.{}", prefix, m, s, t, chunk),
                resolve_entry(&input.document, entry),
            );
        }
    }
    Ok(())
}

fn write_scalar(
    refs: &mut BTreeMap<String, RefEntry>,
    name: &str,
    meta: &ArrayMeta,
    inputs: &[Input],
    positions: &[(usize, usize, usize)],
    axes: &MergedAxes,
) -> Result<()> {
    let (steps, times) = (axes.step.len(), axes.time.len());
    let mut values: Vec<Option<i64>> = vec![None; steps * times];

    for (input, (_, s, t)) in inputs.iter().zip(positions) {
        let value = input
            .document
            .scalar_i64(&format!("{}/0", name))
            .ok_or_else(|| RefsError::merge(&input.location, format!("{} is not an 8-byte scalar", name)))?;
        match values[s * times + t] {
            Some(existing) if existing != value => {
                return Err(RefsError::merge(
                    &input.location,
                    format!("{} is {} but another member has {}", name, value, existing),
                ));
            }
            _ => values[s * times + t] = Some(value),
        }
    }

    let mut combined = meta.clone();
    combined.shape = vec![steps as u64, times as u64];
    combined.chunks = vec![steps as u64, times as u64];
    let fill = combined
        .rest
        .get("fill_value")
        .and_then(Value::as_i64)
        .unwrap_or(MISSING_I64);
    combined.rest.insert("fill_value".to_string(), json!(fill));

    let mut attrs = attributes(&inputs[0], name)?;
    attrs.insert(DIMENSIONS_ATTR.to_string(), json!([STEP_DIM, TIME_DIM]));
    insert_array(refs, name, &combined, &attrs)?;

    let bytes: Vec<u8> = values
        .into_iter()
        .flat_map(|v| v.unwrap_or(fill).to_le_bytes())
        .collect();
    refs.insert(format!("{}/0.0", name), RefEntry::inline_binary(&bytes));
    Ok(())
}

/// Member coordinate as fixed-width unicode (`<U{n}`, UTF-32LE).
fn write_members(refs: &mut BTreeMap<String, RefEntry>, members: &[String]) -> Result<()> {
    let width = members.iter().map(|m| m.chars().count()).max().unwrap_or(1).max(1);

    let mut bytes = Vec::with_capacity(members.len() * width * 4);
    for member in members {
        let mut chars: Vec<u32> = member.chars().map(u32::from).collect();
        chars.resize(width, 0);
        bytes.extend(chars.into_iter().flat_map(u32::to_le_bytes));
    }

    let meta = ArrayMeta::coordinate(members.len(), &format!("<U{}", width));
    let mut attrs = Map::new();
    attrs.insert(DIMENSIONS_ATTR.to_string(), json!([MEMBER_DIM]));
    insert_array(refs, MEMBER_DIM, &meta, &attrs)?;
    refs.insert(format!("{}/0", MEMBER_DIM), RefEntry::inline_binary(&bytes));
    Ok(())
}

fn check_compatible(
    first: &Input,
    other: &Input,
    variables: &BTreeMap<String, VariableKind>,
) -> Result<()> {
    let names = variable_names(&other.document);
    if names != variables.keys().cloned().collect::<BTreeSet<_>>() {
        return Err(RefsError::merge(
            &other.location,
            format!(
                "variables {:?} differ from {:?} in {}",
                names,
                variables.keys().collect::<Vec<_>>(),
                first.location
            ),
        ));
    }

    for (name, kind) in variables {
        let expected = match kind {
            VariableKind::Identical => array_meta(first, name)?,
            VariableKind::Data { meta, .. } => meta.clone(),
            VariableKind::Axis | VariableKind::Scalar { .. } => continue,
        };
        let actual = array_meta(other, name)?;
        if actual.shape != expected.shape || actual.chunks != expected.chunks {
            return Err(RefsError::merge(
                &other.location,
                format!(
                    "{} has shape {:?} chunks {:?}, expected shape {:?} chunks {:?} as in {}",
                    name, actual.shape, actual.chunks, expected.shape, expected.chunks, first.location
                ),
            ));
        }
    }
    Ok(())
}

fn variable_names(document: &ReferenceDocument) -> BTreeSet<String> {
    document
        .refs
        .keys()
        .filter_map(|key| key.strip_suffix("/.zarray"))
        .map(str::to_string)
        .collect()
}

fn inline_json<T: serde::de::DeserializeOwned>(input: &Input, key: &str) -> Result<T> {
    let bytes = input
        .document
        .refs
        .get(key)
        .and_then(RefEntry::inline_bytes)
        .ok_or_else(|| RefsError::merge(&input.location, format!("missing inline '{}'", key)))?;
    serde_json::from_slice(&bytes)
        .map_err(|e| RefsError::merge(&input.location, format!("bad '{}': {}", key, e)))
}

fn array_meta(input: &Input, name: &str) -> Result<ArrayMeta> {
    inline_json(input, &format!("{}/.zarray", name))
}

fn attributes(input: &Input, name: &str) -> Result<Map<String, Value>> {
    let key = format!("{}/.zattrs", name);
    if input.document.refs.contains_key(&key) {
        inline_json(input, &key)
    } else {
        Ok(Map::new())
    }
}

fn dimensions(input: &Input, name: &str) -> Result<Vec<String>> {
    let attrs = attributes(input, name)?;
    match attrs.get(DIMENSIONS_ATTR) {
        Some(dims) => serde_json::from_value(dims.clone()).map_err(|e| {
            RefsError::merge(&input.location, format!("bad dimensions of {}: {}", name, e))
        }),
        None => Err(RefsError::merge(
            &input.location,
            format!("{} has no {}", name, DIMENSIONS_ATTR),
        )),
    }
}

fn insert_array(
    refs: &mut BTreeMap<String, RefEntry>,
    name: &str,
    meta: &ArrayMeta,
    attrs: &Map<String, Value>,
) -> Result<()> {
    refs.insert(
        format!("{}/.zarray", name),
        RefEntry::Inline(serde_json::to_string(meta)?),
    );
    refs.insert(
        format!("{}/.zattrs", name),
        RefEntry::Inline(serde_json::to_string(attrs)?),
    );
    Ok(())
}

/// Inline the document's URL templates into a reference entry.
fn resolve_entry(document: &ReferenceDocument, entry: &RefEntry) -> RefEntry {
    match entry {
        RefEntry::Range(url, start, length) => {
            RefEntry::Range(document.expand_url(url), *start, *length)
        }
        RefEntry::Whole((url,)) => RefEntry::Whole((document.expand_url(url),)),
        RefEntry::Inline(_) => entry.clone(),
    }
}

fn sorted_unique(values: impl Iterator<Item = i64>) -> Vec<i64> {
    values.collect::<BTreeSet<_>>().into_iter().collect()
}

fn position<T: Ord>(sorted: &[T], value: &T) -> usize {
    // every value was collected into the axis before lookup
    sorted.binary_search(value).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{MessageRange, MessageTimes, URL_PLACEHOLDER};
    use crate::template::{ReferenceTemplate, TIME_KEY};
    use chrono::NaiveDate;

    fn document(day: u32, step: i64, start: u64) -> ReferenceDocument {
        let template = ReferenceTemplate::bundled("pres_msl").unwrap();
        let reference = NaiveDate::from_ymd_opt(2000, 1, day)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let range = MessageRange {
            url: URL_PLACEHOLDER.to_string(),
            start,
            length: 100,
        };
        template.fill(
            &range,
            &format!("s3://bucket/2000/200001{:02}00/pres_msl_200001{:02}00.grib2", day, day),
            &MessageTimes::new(reference, step).unwrap(),
        )
    }

    fn merger() -> ReferenceSetMerger {
        ReferenceSetMerger::new().unwrap()
    }

    fn decode_i64s(entry: &RefEntry) -> Vec<i64> {
        entry
            .inline_bytes()
            .unwrap()
            .chunks(8)
            .map(|c| i64::from_le_bytes(c.try_into().unwrap()))
            .collect()
    }

    #[test]
    fn test_member_token() {
        let m = merger();
        assert_eq!(
            m.member_token("/tmp/refs/pres_msl_2000011200_c00_01.json").as_deref(),
            Some("c00")
        );
        assert_eq!(
            m.member_token("/tmp/p99/hgt_abv700mb_2000011200_p03_01.json").as_deref(),
            Some("p03")
        );
        assert_eq!(m.member_token("/tmp/c00/combined.json"), None);
    }

    #[test]
    fn test_distinct_members() {
        let inputs = ["c00", "p01", "p02", "p03"]
            .iter()
            .enumerate()
            .map(|(i, member)| {
                (
                    format!("pres_msl_2000011200_{}_01.json", member),
                    document(12, 6, 1000 * i as u64),
                )
            })
            .collect();

        let combined = merger().merge_documents(inputs).unwrap();
        assert_eq!(combined.axes.member, ["c00", "p01", "p02", "p03"]);
        assert_eq!(combined.axes.step, [6]);
        assert_eq!(combined.axes.time.len(), 1);

        let refs = &combined.document.refs;
        assert_eq!(
            refs["msl/2.0.0.0.0"],
            RefEntry::Range("s3://bucket/2000/2000011200/pres_msl_2000011200.grib2".to_string(), 2000, 100)
        );
        assert!(combined.document.templates.is_empty());

        let meta: ArrayMeta =
            serde_json::from_slice(&refs["msl/.zarray"].inline_bytes().unwrap()).unwrap();
        assert_eq!(meta.shape, [4, 1, 1, 721, 1440]);
        assert_eq!(meta.chunks, [1, 1, 1, 721, 1440]);

        let attrs: Value =
            serde_json::from_slice(&refs["msl/.zattrs"].inline_bytes().unwrap()).unwrap();
        assert_eq!(
            attrs[DIMENSIONS_ATTR],
            json!(["member", "step", "time", "latitude", "longitude"])
        );
    }

    #[test]
    fn test_member_coordinate_encoding() {
        let inputs = vec![
            ("x_p01_01.json".to_string(), document(12, 6, 0)),
            ("x_c00_01.json".to_string(), document(12, 6, 0)),
        ];
        let combined = merger().merge_documents(inputs).unwrap();
        let bytes = combined.document.refs["member/0"].inline_bytes().unwrap();

        assert_eq!(bytes.len(), 2 * 3 * 4);
        assert_eq!(&bytes[..4], &u32::from('c').to_le_bytes());
        assert_eq!(&bytes[12..16], &u32::from('p').to_le_bytes());
    }

    #[test]
    fn test_concat_step_and_time() {
        let inputs = vec![
            ("a_c00_01.json".to_string(), document(13, 6, 0)),
            ("a_c00_02.json".to_string(), document(12, 9, 0)),
            ("b_c00_01.json".to_string(), document(12, 6, 0)),
        ];
        let combined = merger().merge_documents(inputs).unwrap();
        let refs = &combined.document.refs;

        assert_eq!(combined.axes.step, [6, 9]);
        assert_eq!(decode_i64s(&refs["step/0"]), [6, 9]);
        assert_eq!(decode_i64s(&refs["time/0"]), combined.axes.time);
        assert_eq!(combined.axes.time, [947_635_200, 947_721_600]);

        // valid_time is [step, time]; step 9 from the 13th is missing
        let valid = decode_i64s(&refs["valid_time/0.0"]);
        assert_eq!(
            valid,
            [947_635_200 + 6 * 3600, 947_721_600 + 6 * 3600, 947_635_200 + 9 * 3600, MISSING_I64]
        );
        assert!(refs.contains_key("msl/0.1.0.0.0"));
        assert!(refs.contains_key("msl/0.0.1.0.0"));
        assert!(!refs.contains_key("msl/0.1.1.0.0"));
    }

    #[test]
    fn test_grid_copied_once() {
        let inputs = vec![
            ("a_c00_01.json".to_string(), document(12, 6, 0)),
            ("a_p01_01.json".to_string(), document(12, 6, 0)),
        ];
        let first = inputs[0].1.clone();
        let combined = merger().merge_documents(inputs).unwrap();
        assert_eq!(combined.document.refs["latitude/0"], first.refs["latitude/0"]);
        assert_eq!(combined.document.refs[".zgroup"], first.refs[".zgroup"]);
    }

    #[test]
    fn test_duplicate_entry() {
        let inputs = vec![
            ("/a/x_c00_01.json".to_string(), document(12, 6, 0)),
            ("/b/x_c00_01.json".to_string(), document(12, 6, 0)),
        ];
        let err = merger().merge_documents(inputs).unwrap_err();
        assert!(matches!(err, RefsError::Merge { ref file, .. } if file == "/b/x_c00_01.json"));
    }

    #[test]
    fn test_mismatched_grid() {
        let mut other = document(12, 6, 0);
        other.refs.insert(
            "latitude/.zarray".to_string(),
            RefEntry::Inline(
                r#"{"chunks":[361],"compressor":null,"dtype":"<f8","fill_value":null,"filters":null,"order":"C","shape":[361],"zarr_format":2}"#
                    .to_string(),
            ),
        );
        let inputs = vec![
            ("x_c00_01.json".to_string(), document(12, 6, 0)),
            ("x_p01_01.json".to_string(), other),
        ];

        let err = merger().merge_documents(inputs).unwrap_err();
        match err {
            RefsError::Merge { file, reason } => {
                assert_eq!(file, "x_p01_01.json");
                assert!(reason.contains("latitude"));
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_missing_member_token() {
        let inputs = vec![("combined.json".to_string(), document(12, 6, 0))];
        assert!(merger().merge_documents(inputs).is_err());
    }

    #[test]
    fn test_missing_time_scalar() {
        let mut doc = document(12, 6, 0);
        doc.refs.remove(TIME_KEY);
        let err = merger()
            .merge_documents(vec![("x_c00_01.json".to_string(), doc)])
            .unwrap_err();
        assert!(err.to_string().contains("time"));
    }

    #[test]
    fn test_empty_manifest() {
        assert!(matches!(
            merger().merge_documents(Vec::new()),
            Err(RefsError::NothingToMerge { .. })
        ));
    }
}
