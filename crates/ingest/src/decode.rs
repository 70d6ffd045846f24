//! Core kind registry and typed decoders.
//!
//! Given an envelope whose family matched, decode the document body into the
//! matching entity type, stamp the envelope metadata onto it, normalize any
//! inline-vs-reference child fields, and store it in the catalog keyed by
//! name (last write wins).

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value as Json;

use oslo_model::{
    AlertCondition, AlertNotificationTarget, AlertPolicy, Catalog, DataSource, Linked, Metadata,
    Objective, Service, Sli, Slo, TimeWindow,
};

use crate::{Envelope, IngestError};

/// Decode the `spec` body of `doc` into `T`. A missing or null body decodes
/// to the type's default; a malformed body is fatal and names the document.
pub fn decode_spec<T>(envelope: &Envelope, doc: &Json) -> Result<T, IngestError>
where
    T: DeserializeOwned + Default,
{
    let spec = doc.get("spec").cloned().unwrap_or(Json::Null);
    if spec.is_null() {
        return Ok(T::default());
    }
    serde_json::from_value(spec).map_err(|source| IngestError::Decode {
        kind: envelope.kind.clone(),
        name: envelope.metadata.name.clone(),
        source,
    })
}

/// Dispatch one core-family document to its typed decoder. An unrecognized
/// kind is fatal for the whole batch.
pub(crate) fn decode_core(
    envelope: &Envelope,
    doc: &Json,
    catalog: &mut Catalog,
) -> Result<(), IngestError> {
    let name = envelope.metadata.name.clone();
    match envelope.kind.as_str() {
        "DataSource" => {
            let mut entity: DataSource = decode_spec(envelope, doc)?;
            entity.metadata = envelope.metadata.clone();
            catalog.data_sources.insert(name, entity);
        }
        "Service" => {
            let mut entity: Service = decode_spec(envelope, doc)?;
            entity.metadata = envelope.metadata.clone();
            catalog.services.insert(name, entity);
        }
        "AlertCondition" => {
            let mut entity: AlertCondition = decode_spec(envelope, doc)?;
            entity.metadata = envelope.metadata.clone();
            catalog.alert_conditions.insert(name, entity);
        }
        "AlertNotificationTarget" => {
            let mut entity: AlertNotificationTarget = decode_spec(envelope, doc)?;
            entity.metadata = envelope.metadata.clone();
            catalog.alert_notification_targets.insert(name, entity);
        }
        "AlertPolicy" => {
            let raw: RawAlertPolicySpec = decode_spec(envelope, doc)?;
            catalog
                .alert_policies
                .insert(name, raw.into_policy(envelope.metadata.clone()));
        }
        "SLI" => {
            let mut entity: Sli = decode_spec(envelope, doc)?;
            entity.metadata = envelope.metadata.clone();
            catalog.slis.insert(name, entity);
        }
        "SLO" => {
            let raw: RawSloSpec = decode_spec(envelope, doc)?;
            catalog.slos.insert(name, raw.into_slo(envelope.metadata.clone()));
        }
        unknown => return Err(IngestError::UnknownKind(unknown.to_string())),
    }
    Ok(())
}

/// A nested complete sub-document: its own kind tag, metadata, and body.
/// A child with an empty `kind` is not inline; only its ref string counts.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawNested<T: Default> {
    kind: String,
    metadata: Metadata,
    spec: T,
}

impl<T: Default> RawNested<T> {
    fn is_inline(&self) -> bool {
        !self.kind.is_empty()
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawConditionEntry {
    kind: String,
    metadata: Metadata,
    spec: AlertCondition,
    condition_ref: String,
}

impl RawConditionEntry {
    fn into_slot(self) -> Linked<AlertCondition> {
        if self.kind.is_empty() {
            Linked::reference(self.condition_ref)
        } else {
            let mut condition = self.spec;
            condition.metadata = self.metadata;
            Linked::inline(condition)
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawTargetEntry {
    kind: String,
    metadata: Metadata,
    spec: AlertNotificationTarget,
    target_ref: String,
}

impl RawTargetEntry {
    fn into_slot(self) -> Linked<AlertNotificationTarget> {
        if self.kind.is_empty() {
            Linked::reference(self.target_ref)
        } else {
            let mut target = self.spec;
            target.metadata = self.metadata;
            Linked::inline(target)
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawAlertPolicySpec {
    description: String,
    alert_when_no_data: bool,
    alert_when_resolved: bool,
    alert_when_breaching: bool,
    conditions: Vec<RawConditionEntry>,
    notification_targets: Vec<RawTargetEntry>,
}

impl RawAlertPolicySpec {
    fn into_policy(self, metadata: Metadata) -> AlertPolicy {
        AlertPolicy {
            description: self.description,
            alert_when_no_data: self.alert_when_no_data,
            alert_when_resolved: self.alert_when_resolved,
            alert_when_breaching: self.alert_when_breaching,
            conditions: self.conditions.into_iter().map(RawConditionEntry::into_slot).collect(),
            notification_targets: self
                .notification_targets
                .into_iter()
                .map(RawTargetEntry::into_slot)
                .collect(),
            metadata,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawAlertPolicyEntry {
    kind: String,
    metadata: Metadata,
    spec: RawAlertPolicySpec,
    alert_policy_ref: String,
}

impl RawAlertPolicyEntry {
    fn into_slot(self) -> Linked<AlertPolicy> {
        if self.kind.is_empty() {
            Linked::reference(self.alert_policy_ref)
        } else {
            Linked::inline(self.spec.into_policy(self.metadata))
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawObjective {
    display_name: String,
    op: String,
    value: f64,
    target: f64,
    target_percent: f64,
    time_slice_target: f64,
    time_slice_window: String,
    indicator: Option<RawNested<Sli>>,
    indicator_ref: String,
    composite_weight: f64,
}

impl RawObjective {
    fn into_objective(self) -> Objective {
        Objective {
            display_name: self.display_name,
            op: self.op,
            value: self.value,
            target: self.target,
            target_percent: self.target_percent,
            time_slice_target: self.time_slice_target,
            time_slice_window: self.time_slice_window,
            indicator: indicator_slot(self.indicator, self.indicator_ref),
            composite_weight: self.composite_weight,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawSloSpec {
    description: String,
    service: Option<Service>,
    service_ref: String,
    indicator: Option<RawNested<Sli>>,
    indicator_ref: String,
    time_window: Vec<TimeWindow>,
    budgeting_method: String,
    objectives: Vec<RawObjective>,
    alert_policies: Vec<RawAlertPolicyEntry>,
}

impl RawSloSpec {
    fn into_slo(self, metadata: Metadata) -> Slo {
        Slo {
            description: self.description,
            service: Linked::from_parts(self.service, self.service_ref),
            indicator: indicator_slot(self.indicator, self.indicator_ref),
            time_window: self.time_window,
            budgeting_method: self.budgeting_method,
            objectives: self.objectives.into_iter().map(RawObjective::into_objective).collect(),
            alert_policies: self
                .alert_policies
                .into_iter()
                .map(RawAlertPolicyEntry::into_slot)
                .collect(),
            metadata,
        }
    }
}

fn indicator_slot(nested: Option<RawNested<Sli>>, ref_name: String) -> Option<Linked<Sli>> {
    match nested {
        Some(nested) if nested.is_inline() => {
            let mut sli = nested.spec;
            sli.metadata = nested.metadata;
            Some(Linked::inline(sli))
        }
        _ => Linked::from_parts(None, ref_name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest;
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;

    #[test]
    fn data_source_decodes_with_connection_details() {
        let input = "\
apiVersion: openslo/v1
kind: DataSource
metadata:
  name: my-datasource
  displayName: My DataSource
spec:
  type: datasource-type
  description: Datasource description
  connectionDetails:
    host: my-host
    port: my-port
";
        let outcome = ingest(input).unwrap();
        let ds = &outcome.catalog.data_sources["my-datasource"];
        assert_eq!(ds.r#type, "datasource-type");
        assert_eq!(ds.description, "Datasource description");
        assert_eq!(ds.metadata.display_name, "My DataSource");
        let details: BTreeMap<String, String> = [
            ("host".to_string(), "my-host".to_string()),
            ("port".to_string(), "my-port".to_string()),
        ]
        .into_iter()
        .collect();
        assert_eq!(ds.connection_details, details);
    }

    #[test]
    fn service_gets_envelope_metadata() {
        let input = "\
apiVersion: openslo/v1
kind: Service
metadata:
  name: my-service
  displayName: My Service
spec:
  description: This service does blablabla
";
        let outcome = ingest(input).unwrap();
        let svc = &outcome.catalog.services["my-service"];
        assert_eq!(svc.description, "This service does blablabla");
        assert_eq!(svc.metadata.name, "my-service");
    }

    #[test]
    fn sli_decodes_metric_sources() {
        let input = "\
apiVersion: openslo/v1
kind: DataSource
metadata:
  name: main
spec:
  type: datadog
---
apiVersion: openslo/v1
kind: SLI
metadata:
  name: success-rate
spec:
  description: ratio of good requests
  ratioMetric:
    counter: true
    good:
      metricSource:
        type: prometheus
        spec:
          query: sum(rate(http_requests_ok[5m]))
    total:
      metricSource:
        metricSourceRef: main
";
        let outcome = ingest(input).unwrap();
        let sli = &outcome.catalog.slis["success-rate"];
        assert!(sli.ratio_metric.counter);
        assert_eq!(sli.ratio_metric.good.metric_source.r#type, "prometheus");
        assert_eq!(
            sli.ratio_metric.good.metric_source.spec["query"],
            "sum(rate(http_requests_ok[5m]))"
        );
        let total = &sli.ratio_metric.total.metric_source;
        assert_eq!(total.metric_source_ref, "main");
        assert_eq!(total.data_source.as_ref().unwrap().metadata.name, "main");
        // the referenced DataSource supplies a default type to its referrers
        assert_eq!(total.r#type, "datadog");
    }

    #[test]
    fn alert_policy_normalizes_inline_and_ref_conditions() {
        let input = "\
apiVersion: openslo/v1
kind: AlertCondition
metadata:
  name: cpu-high
spec:
  severity: page
---
apiVersion: openslo/v1
kind: AlertPolicy
metadata:
  name: default
spec:
  alertWhenBreaching: true
  conditions:
  - conditionRef: cpu-high
  - kind: AlertCondition
    metadata:
      name: inline-cond
    spec:
      severity: ticket
      condition:
        op: gt
        threshold: 0.5
";
        let outcome = ingest(input).unwrap();
        let policy = &outcome.catalog.alert_policies["default"];
        assert!(policy.alert_when_breaching);
        assert_eq!(policy.conditions.len(), 2);
        assert_eq!(policy.conditions[0].ref_name(), Some("cpu-high"));
        assert_eq!(policy.conditions[0].entity().unwrap().severity, "page");
        assert!(policy.conditions[1].is_inline());
        let inline = policy.conditions[1].entity().unwrap();
        assert_eq!(inline.metadata.name, "inline-cond");
        assert_eq!(inline.severity, "ticket");
        assert_eq!(inline.condition.threshold, 0.5);
    }

    #[test]
    fn inline_detection_is_per_child() {
        // A by-ref entry first must not drag later entries into by-ref mode.
        let input = "\
apiVersion: openslo/v1
kind: AlertCondition
metadata:
  name: first
spec: {}
---
apiVersion: openslo/v1
kind: AlertPolicy
metadata:
  name: mixed
spec:
  conditions:
  - conditionRef: first
  - kind: AlertCondition
    metadata:
      name: second
    spec:
      severity: low
";
        let outcome = ingest(input).unwrap();
        let policy = &outcome.catalog.alert_policies["mixed"];
        assert!(!policy.conditions[0].is_inline());
        assert!(policy.conditions[1].is_inline());
    }

    #[test]
    fn slo_folds_inline_indicator() {
        let input = "\
apiVersion: openslo/v1
kind: SLO
metadata:
  name: my-slo
spec:
  budgetingMethod: Occurrences
  indicator:
    kind: SLI
    metadata:
      name: embedded
    spec:
      description: inline indicator
  timeWindow:
  - duration: 30d
    isRolling: true
  objectives:
  - target: 0.999
";
        let outcome = ingest(input).unwrap();
        let slo = &outcome.catalog.slos["my-slo"];
        assert_eq!(slo.budgeting_method, "Occurrences");
        let indicator = slo.indicator.as_ref().unwrap();
        assert!(indicator.is_inline());
        assert_eq!(indicator.entity().unwrap().metadata.name, "embedded");
        assert_eq!(slo.time_window[0].duration, "30d");
        assert!(slo.time_window[0].is_rolling);
    }

    #[test]
    fn unknown_kind_is_fatal() {
        let input = "\
apiVersion: openslo/v1
kind: Unsupported
metadata:
  name: x
spec:
  description: whatever
";
        let err = ingest(input).unwrap_err();
        match err {
            IngestError::UnknownKind(kind) => assert_eq!(kind, "Unsupported"),
            other => panic!("expected UnknownKind, got {other}"),
        }
    }

    #[test]
    fn bad_body_shape_is_fatal_and_names_document() {
        let input = "\
apiVersion: openslo/v1
kind: DataSource
metadata:
  name: broken
spec:
  connectionDetails: not-a-map
";
        let err = ingest(input).unwrap_err();
        match err {
            IngestError::Decode { kind, name, .. } => {
                assert_eq!(kind, "DataSource");
                assert_eq!(name, "broken");
            }
            other => panic!("expected Decode, got {other}"),
        }
    }

    #[test]
    fn unsupported_api_version_warns_and_skips() {
        let input = "\
apiVersion: other/v1
kind: Service
metadata:
  name: my-service
spec:
  description: not ours
";
        let outcome = ingest(input).unwrap();
        assert!(outcome.catalog.services.is_empty());
        assert_eq!(outcome.warnings.len(), 1);
        assert_eq!(outcome.warnings[0].api_version, "other/v1");
        assert_eq!(outcome.warnings[0].kind, "Service");
        assert_eq!(outcome.warnings[0].name, "my-service");
    }

    #[test]
    fn missing_spec_decodes_to_default() {
        let input = "\
apiVersion: openslo/v1
kind: Service
metadata:
  name: bare
";
        let outcome = ingest(input).unwrap();
        assert_eq!(outcome.catalog.services["bare"].description, "");
    }
}
