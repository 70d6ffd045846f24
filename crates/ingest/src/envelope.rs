//! Document stream splitting and envelope decoding.
//!
//! The envelope is the `{apiVersion, kind, metadata}` portion of a document,
//! decodable without knowing the body's type. Unknown `kind` or `apiVersion`
//! values are never an error here; only malformed YAML is.

use serde::Deserialize;
use serde_json::Value as Json;

use oslo_model::Metadata;

use crate::IngestError;

pub(crate) fn max_yaml_bytes() -> usize {
    std::env::var("OSLO_MAX_YAML_BYTES")
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .unwrap_or(1_000_000) // 1 MiB default
}

pub(crate) fn max_yaml_nodes() -> usize {
    std::env::var("OSLO_MAX_YAML_NODES")
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .unwrap_or(100_000)
}

fn node_budget_exceeded(v: &Json, max: usize) -> bool {
    // Running counter with early bail so huge documents stay cheap to reject
    fn walk(v: &Json, cur: &mut usize, max: usize) {
        if *cur >= max {
            return;
        }
        *cur += 1;
        match v {
            Json::Object(map) => {
                for (_k, vv) in map.iter() {
                    if *cur >= max {
                        break;
                    }
                    walk(vv, cur, max);
                }
            }
            Json::Array(arr) => {
                for vv in arr.iter() {
                    if *cur >= max {
                        break;
                    }
                    walk(vv, cur, max);
                }
            }
            _ => {}
        }
    }
    let mut count = 0usize;
    walk(v, &mut count, max);
    count >= max
}

/// Lazily walk the `---`-separated documents of `input`, yielding each as a
/// JSON value. Empty documents come through as `Null`; a syntax error ends
/// the stream.
pub fn documents(input: &str) -> impl Iterator<Item = Result<Json, IngestError>> + '_ {
    let node_limit = max_yaml_nodes();
    serde_yaml::Deserializer::from_str(input).map(move |doc| {
        let value = serde_yaml::Value::deserialize(doc).map_err(IngestError::Syntax)?;
        let json = serde_json::to_value(value).map_err(IngestError::Representation)?;
        if node_budget_exceeded(&json, node_limit) {
            return Err(IngestError::DocumentTooComplex { limit: node_limit });
        }
        Ok(json)
    })
}

/// The common envelope of every document. All fields are defaulted so a
/// document missing any of them still classifies (and then warns or fails
/// at dispatch, not here).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Envelope {
    pub api_version: String,
    pub kind: String,
    pub metadata: Metadata,
}

impl Envelope {
    /// Decode only the envelope of `doc`, ignoring the body entirely.
    pub fn from_document(doc: &Json) -> Result<Self, IngestError> {
        serde_json::from_value(doc.clone()).map_err(IngestError::Envelope)
    }
}
