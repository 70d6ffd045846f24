//! OpenSLO ingest engine: splits a YAML stream into documents, classifies
//! each by its envelope, dispatches to the matching kind registry, and runs
//! a single batch-wide reference resolution pass over the result.
//!
//! Decode and resolution are deliberately two phases: every document in the
//! batch is registered before any reference is looked up, so forward
//! references always succeed if the name exists anywhere in the batch.

#![forbid(unsafe_code)]

use serde_json::Value as Json;
use tracing::warn;

use oslo_model::Catalog;

pub mod decode;
pub mod envelope;
pub mod resolve;

pub use decode::decode_spec;
pub use envelope::Envelope;
pub use resolve::link;

/// API family identifier for the core OpenSLO kinds.
pub const OPENSLO_API_VERSION: &str = "openslo/v1";

/// Errors that abort an ingest invocation. Resolution errors name both the
/// target kind and the missing reference so the input can be corrected.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("invalid YAML document: {0}")]
    Syntax(#[source] serde_yaml::Error),
    #[error("document not representable as JSON: {0}")]
    Representation(#[source] serde_json::Error),
    #[error("input too large (>{limit} bytes)")]
    InputTooLarge { limit: usize },
    #[error("document too complex (>{limit} nodes)")]
    DocumentTooComplex { limit: usize },
    #[error("invalid document envelope: {0}")]
    Envelope(#[source] serde_json::Error),
    #[error("unknown kind: {0}")]
    UnknownKind(String),
    #[error("decoding {kind} {name:?}: {source}")]
    Decode {
        kind: String,
        name: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("bad reference: no {kind} named {name:?}")]
    BadReference { kind: &'static str, name: String },
}

/// A non-fatal diagnostic: the document was skipped, the batch continued.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Warning {
    pub api_version: String,
    pub kind: String,
    pub name: String,
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "unsupported apiVersion {:?}; skipping {} {:?}",
            self.api_version, self.kind, self.name
        )
    }
}

/// An independently registered document family (e.g. the synthetics
/// extension). Families own their entity maps, decode their own kinds, and
/// may read the core catalog to resolve cross-family references.
pub trait Family {
    /// The `apiVersion` value this family claims.
    fn api_version(&self) -> &str;

    /// Decode one document whose envelope matched [`Family::api_version`].
    fn decode(&mut self, envelope: &Envelope, doc: &Json) -> Result<(), IngestError>;

    /// Post-decode resolution, run once after the whole batch, after the
    /// core resolution pass.
    fn resolve(&mut self, core: &Catalog) -> Result<(), IngestError>;
}

/// Result of a successful ingest: the resolved core catalog plus any
/// documents skipped along the way. Extension catalogs are owned by the
/// caller-registered families.
#[derive(Debug, Default)]
pub struct Outcome {
    pub catalog: Catalog,
    pub warnings: Vec<Warning>,
}

/// Drives one decode + resolve invocation. Extension families are borrowed
/// for the duration of the run so the caller keeps their catalogs.
#[derive(Default)]
pub struct Ingestor<'a> {
    extensions: Vec<&'a mut dyn Family>,
}

impl<'a> Ingestor<'a> {
    pub fn new() -> Self {
        Self { extensions: Vec::new() }
    }

    pub fn with_extension(mut self, family: &'a mut dyn Family) -> Self {
        self.extensions.push(family);
        self
    }

    /// Decode every document in `input`, then resolve references across the
    /// whole batch. The first fatal error aborts; callers must treat any
    /// error as "the whole result is invalid".
    pub fn run(mut self, input: &str) -> Result<Outcome, IngestError> {
        let byte_limit = envelope::max_yaml_bytes();
        if input.len() > byte_limit {
            return Err(IngestError::InputTooLarge { limit: byte_limit });
        }

        let mut catalog = Catalog::default();
        let mut warnings = Vec::new();

        for doc in envelope::documents(input) {
            let doc = doc?;
            if doc.is_null() {
                continue;
            }
            let envelope = Envelope::from_document(&doc)?;
            if envelope.api_version == OPENSLO_API_VERSION {
                decode::decode_core(&envelope, &doc, &mut catalog)?;
            } else if let Some(family) = self
                .extensions
                .iter_mut()
                .find(|f| f.api_version() == envelope.api_version)
            {
                family.decode(&envelope, &doc)?;
            } else {
                warn!(
                    api_version = %envelope.api_version,
                    kind = %envelope.kind,
                    name = %envelope.metadata.name,
                    "unsupported apiVersion; skipping document"
                );
                warnings.push(Warning {
                    api_version: envelope.api_version,
                    kind: envelope.kind,
                    name: envelope.metadata.name,
                });
            }
        }

        resolve::resolve_catalog(&mut catalog)?;
        for family in self.extensions.iter_mut() {
            family.resolve(&catalog)?;
        }

        Ok(Outcome { catalog, warnings })
    }
}

/// Convenience for the common case: core kinds only, no extensions.
pub fn ingest(input: &str) -> Result<Outcome, IngestError> {
    Ingestor::new().run(input)
}
