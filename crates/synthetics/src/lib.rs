//! Synthetics extension family (`openslo_synthetics/v1`): HTTP and browser
//! monitor declarations layered on top of the core kinds.
//!
//! This crate is the reference consumer of the extension seam: it registers
//! its own kind set, owns its own maps, and resolves `serviceRef` fields
//! against the core Service map without ever writing to the core catalog.

#![forbid(unsafe_code)]

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

use oslo_ingest::{decode_spec, link, Envelope, Family, IngestError};
use oslo_model::{Catalog, Linked, Metadata, Service};

/// API family identifier for the synthetics kinds.
pub const SYNTHETICS_API_VERSION: &str = "openslo_synthetics/v1";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
    Put,
    Delete,
    Head,
    Options,
    Patch,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Header {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExpectedResponse {
    #[serde(rename = "code")]
    pub codes: Vec<u16>,
    pub payload_contains: String,
    pub payload_not_contains: String,
    #[serde(rename = "dynatrace_postprocessing")]
    pub dynatrace_postprocessing: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Request {
    pub name: String,
    pub description: String,
    pub headers: Vec<Header>,
    pub body: String,
    pub method: HttpMethod,
    pub path: String,
    pub expected_response: ExpectedResponse,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpMonitor {
    pub url: String,
    pub requests: Vec<Request>,
    pub service: Option<Linked<Service>>,
    pub metadata: Metadata,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BrowserMonitor {
    pub url: String,
    pub script: String,
    pub service: Option<Linked<Service>>,
    pub metadata: Metadata,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawHttpMonitorSpec {
    url: String,
    requests: Vec<Request>,
    service: Option<Service>,
    service_ref: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawBrowserMonitorSpec {
    url: String,
    script: String,
    service: Option<Service>,
    service_ref: String,
}

/// The extension's own accumulation maps, registered with the ingestor for
/// one run and kept by the caller afterwards.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SyntheticsCatalog {
    pub http_monitors: BTreeMap<String, HttpMonitor>,
    pub browser_monitors: BTreeMap<String, BrowserMonitor>,
}

impl SyntheticsCatalog {
    pub fn len(&self) -> usize {
        self.http_monitors.len() + self.browser_monitors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Family for SyntheticsCatalog {
    fn api_version(&self) -> &str {
        SYNTHETICS_API_VERSION
    }

    fn decode(&mut self, envelope: &Envelope, doc: &Json) -> Result<(), IngestError> {
        let name = envelope.metadata.name.clone();
        match envelope.kind.as_str() {
            "HTTPMonitor" => {
                let raw: RawHttpMonitorSpec = decode_spec(envelope, doc)?;
                self.http_monitors.insert(
                    name,
                    HttpMonitor {
                        url: raw.url,
                        requests: raw.requests,
                        service: Linked::from_parts(raw.service, raw.service_ref),
                        metadata: envelope.metadata.clone(),
                    },
                );
            }
            "BrowserMonitor" => {
                let raw: RawBrowserMonitorSpec = decode_spec(envelope, doc)?;
                self.browser_monitors.insert(
                    name,
                    BrowserMonitor {
                        url: raw.url,
                        script: raw.script,
                        service: Linked::from_parts(raw.service, raw.service_ref),
                        metadata: envelope.metadata.clone(),
                    },
                );
            }
            unknown => return Err(IngestError::UnknownKind(unknown.to_string())),
        }
        Ok(())
    }

    fn resolve(&mut self, core: &Catalog) -> Result<(), IngestError> {
        for monitor in self.http_monitors.values_mut() {
            if let Some(slot) = &mut monitor.service {
                link(slot, "Service", &core.services)?;
            }
        }
        for monitor in self.browser_monitors.values_mut() {
            if let Some(slot) = &mut monitor.service {
                link(slot, "Service", &core.services)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oslo_ingest::{Ingestor, IngestError};
    use pretty_assertions::assert_eq;

    fn run(input: &str) -> Result<(oslo_ingest::Outcome, SyntheticsCatalog), IngestError> {
        let mut synthetics = SyntheticsCatalog::default();
        let outcome = Ingestor::new().with_extension(&mut synthetics).run(input)?;
        Ok((outcome, synthetics))
    }

    #[test]
    fn http_monitor_decodes_requests() {
        let input = "\
apiVersion: openslo_synthetics/v1
kind: HTTPMonitor
metadata:
  name: my-monitor
  displayName: My Monitor
spec:
  url: https://my-host.com
  requests:
  - name: my-request
    description: This is a request
    headers:
    - name: my-header
      value: my-value
    body: test body
    method: POST
    path: /my-path
    expectedResponse:
      code: [200, 201]
      payloadContains: ok
  - name: my-other-request
    method: GET
    path: /my-other-path
";
        let (_, synthetics) = run(input).unwrap();
        let monitor = &synthetics.http_monitors["my-monitor"];
        assert_eq!(monitor.url, "https://my-host.com");
        assert_eq!(monitor.metadata.display_name, "My Monitor");
        assert_eq!(monitor.requests.len(), 2);
        let request = &monitor.requests[0];
        assert_eq!(request.method, HttpMethod::Post);
        assert_eq!(request.headers[0].name, "my-header");
        assert_eq!(request.expected_response.codes, vec![200, 201]);
        assert_eq!(request.expected_response.payload_contains, "ok");
        assert_eq!(monitor.requests[1].method, HttpMethod::Get);
    }

    #[test]
    fn browser_monitor_resolves_service_ref_against_core() {
        let input = "\
apiVersion: openslo/v1
kind: Service
metadata:
  name: web
spec:
  description: frontend
---
apiVersion: openslo_synthetics/v1
kind: BrowserMonitor
metadata:
  name: checkout-flow
spec:
  url: https://shop.example.com
  script: open-cart-and-pay
  serviceRef: web
";
        let (outcome, synthetics) = run(input).unwrap();
        assert_eq!(outcome.catalog.services.len(), 1);
        let monitor = &synthetics.browser_monitors["checkout-flow"];
        assert_eq!(monitor.script, "open-cart-and-pay");
        let service = monitor.service.as_ref().unwrap();
        assert_eq!(service.ref_name(), Some("web"));
        assert_eq!(service.entity().unwrap().description, "frontend");
    }

    #[test]
    fn missing_service_ref_fails_precisely() {
        let input = "\
apiVersion: openslo_synthetics/v1
kind: HTTPMonitor
metadata:
  name: lonely
spec:
  url: https://nowhere.example.com
  serviceRef: ghost
";
        match run(input).unwrap_err() {
            IngestError::BadReference { kind, name } => {
                assert_eq!(kind, "Service");
                assert_eq!(name, "ghost");
            }
            other => panic!("expected BadReference, got {other}"),
        }
    }

    #[test]
    fn unknown_synthetics_kind_is_fatal() {
        let input = "\
apiVersion: openslo_synthetics/v1
kind: PingMonitor
metadata:
  name: x
spec: {}
";
        match run(input).unwrap_err() {
            IngestError::UnknownKind(kind) => assert_eq!(kind, "PingMonitor"),
            other => panic!("expected UnknownKind, got {other}"),
        }
    }

    #[test]
    fn core_and_extension_kinds_mix_in_one_batch() {
        let input = "\
apiVersion: openslo_synthetics/v1
kind: HTTPMonitor
metadata:
  name: api-check
spec:
  url: https://api.example.com
  serviceRef: api
---
apiVersion: openslo/v1
kind: Service
metadata:
  name: api
spec:
  description: backend
---
apiVersion: unknown/v1
kind: Whatever
metadata:
  name: skipped
spec: {}
";
        let (outcome, synthetics) = run(input).unwrap();
        assert_eq!(outcome.warnings.len(), 1);
        assert_eq!(outcome.warnings[0].api_version, "unknown/v1");
        assert_eq!(synthetics.http_monitors.len(), 1);
        let monitor = &synthetics.http_monitors["api-check"];
        assert_eq!(monitor.service.as_ref().unwrap().entity().unwrap().description, "backend");
    }
}
