//! OpenSLO entity model: typed records for every document kind, plus the
//! reference-or-inline slot type that resolution operates on.

#![forbid(unsafe_code)]

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

mod slot;

pub use slot::{Linked, NamedRef};

/// Common metadata block shared by every kind. `name` is the map key within
/// a kind; everything else is descriptive.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Metadata {
    pub name: String,
    pub display_name: String,
    pub namespace: String,
    pub labels: BTreeMap<String, String>,
    pub annotations: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Service {
    pub description: String,
    #[serde(skip_deserializing)]
    pub metadata: Metadata,
}

/// A metric backend declaration. `spec` is opaque vendor configuration and
/// is carried through untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DataSource {
    pub r#type: String,
    pub description: String,
    pub connection_details: BTreeMap<String, String>,
    pub spec: serde_json::Value,
    #[serde(skip_deserializing)]
    pub metadata: Metadata,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AlertCondition {
    pub description: String,
    pub severity: String,
    pub condition: ConditionDetail,
    #[serde(skip_deserializing)]
    pub metadata: Metadata,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConditionDetail {
    pub kind: String,
    pub op: String,
    pub threshold: f64,
    pub lookback_window: String,
    pub alert_after: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AlertNotificationTarget {
    pub description: String,
    pub target: String,
    #[serde(skip_deserializing)]
    pub metadata: Metadata,
}

/// An alerting policy. Conditions and notification targets are either
/// inlined sub-documents or by-name references; the decode step settles
/// which, the resolution pass fills in referenced copies.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertPolicy {
    pub description: String,
    pub alert_when_no_data: bool,
    pub alert_when_resolved: bool,
    pub alert_when_breaching: bool,
    pub conditions: Vec<Linked<AlertCondition>>,
    pub notification_targets: Vec<Linked<AlertNotificationTarget>>,
    pub metadata: Metadata,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Sli {
    pub description: String,
    pub threshold_metric: Metric,
    pub ratio_metric: RatioMetric,
    #[serde(skip_deserializing)]
    pub metadata: Metadata,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Metric {
    pub metric_source: MetricSource,
}

/// Where a metric comes from: either an inline `{type, spec}` block or a
/// `metricSourceRef` naming a [`DataSource`]. The resolver attaches the
/// referenced DataSource as a backlink and lets its `type` fill in an empty
/// local `type`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MetricSource {
    pub metric_source_ref: String,
    pub r#type: String,
    pub spec: serde_json::Value,
    #[serde(skip_deserializing)]
    pub data_source: Option<DataSource>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RatioMetric {
    pub counter: bool,
    pub good: Metric,
    pub bad: Metric,
    pub total: Metric,
    pub raw_type: String,
    pub raw: Metric,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Slo {
    pub description: String,
    pub service: Option<Linked<Service>>,
    pub indicator: Option<Linked<Sli>>,
    pub time_window: Vec<TimeWindow>,
    pub budgeting_method: String,
    pub objectives: Vec<Objective>,
    pub alert_policies: Vec<Linked<AlertPolicy>>,
    pub metadata: Metadata,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Objective {
    pub display_name: String,
    pub op: String,
    pub value: f64,
    pub target: f64,
    pub target_percent: f64,
    pub time_slice_target: f64,
    pub time_slice_window: String,
    pub indicator: Option<Linked<Sli>>,
    /// Normalized to `1.0` by the resolution pass when absent or zero.
    pub composite_weight: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TimeWindow {
    pub duration: String,
    pub calendar: Option<Calendar>,
    pub is_rolling: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Calendar {
    pub start_time: String,
    pub time_zone: String,
}

/// Accumulated output of one decode invocation: one name-keyed map per core
/// kind. Owned by the caller; never shared across invocations.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Catalog {
    pub data_sources: BTreeMap<String, DataSource>,
    pub services: BTreeMap<String, Service>,
    pub alert_conditions: BTreeMap<String, AlertCondition>,
    pub alert_notification_targets: BTreeMap<String, AlertNotificationTarget>,
    pub alert_policies: BTreeMap<String, AlertPolicy>,
    pub slis: BTreeMap<String, Sli>,
    pub slos: BTreeMap<String, Slo>,
}

impl Catalog {
    /// Total entity count across all kinds.
    pub fn len(&self) -> usize {
        self.data_sources.len()
            + self.services.len()
            + self.alert_conditions.len()
            + self.alert_notification_targets.len()
            + self.alert_policies.len()
            + self.slis.len()
            + self.slos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
