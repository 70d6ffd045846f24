//! Batch-wide reference resolution.
//!
//! Runs exactly once, after every document in the batch has been decoded, so
//! a document may reference a name declared later in the stream. Resolution
//! is one level deep per field; copies attached here are the post-resolution
//! copies of their own kind (alert policies are resolved before SLOs embed
//! them). The first unresolved reference aborts the pass.

use std::collections::BTreeMap;

use oslo_model::{Catalog, DataSource, Linked, Metric};

use crate::IngestError;

/// Resolve one reference-or-inline slot against the map of `kind` entities.
/// Inline slots and empty reference names are left untouched; a non-empty
/// name that is absent from the map fails the whole pass.
pub fn link<T: Clone>(
    slot: &mut Linked<T>,
    kind: &'static str,
    targets: &BTreeMap<String, T>,
) -> Result<(), IngestError> {
    if let Linked::Ref(named) = slot {
        if named.name.is_empty() {
            return Ok(());
        }
        match targets.get(&named.name) {
            Some(target) => named.resolved = Some(target.clone()),
            None => {
                return Err(IngestError::BadReference { kind, name: named.name.clone() });
            }
        }
    }
    Ok(())
}

/// Attach the referenced DataSource to a metric's source, if it names one.
/// A DataSource that declares a `type` supplies it to referrers whose own
/// `type` would otherwise be empty (and overrides one that is not).
fn attach_data_source(
    metric: &mut Metric,
    data_sources: &BTreeMap<String, DataSource>,
) -> Result<(), IngestError> {
    let source = &mut metric.metric_source;
    if source.metric_source_ref.is_empty() {
        return Ok(());
    }
    let data_source = data_sources.get(&source.metric_source_ref).ok_or_else(|| {
        IngestError::BadReference { kind: "DataSource", name: source.metric_source_ref.clone() }
    })?;
    if !data_source.r#type.is_empty() {
        source.r#type = data_source.r#type.clone();
    }
    source.data_source = Some(data_source.clone());
    Ok(())
}

/// The core resolution pass, in fixed order: alert policies, then SLIs, then
/// SLOs. Extension families resolve after this, against the same catalog.
pub(crate) fn resolve_catalog(catalog: &mut Catalog) -> Result<(), IngestError> {
    let Catalog {
        data_sources,
        services,
        alert_conditions,
        alert_notification_targets,
        alert_policies,
        slis,
        slos,
    } = catalog;

    for policy in alert_policies.values_mut() {
        for slot in &mut policy.conditions {
            link(slot, "AlertCondition", alert_conditions)?;
        }
        for slot in &mut policy.notification_targets {
            link(slot, "AlertNotificationTarget", alert_notification_targets)?;
        }
    }

    for sli in slis.values_mut() {
        attach_data_source(&mut sli.threshold_metric, data_sources)?;
        attach_data_source(&mut sli.ratio_metric.good, data_sources)?;
        attach_data_source(&mut sli.ratio_metric.bad, data_sources)?;
        attach_data_source(&mut sli.ratio_metric.total, data_sources)?;
        attach_data_source(&mut sli.ratio_metric.raw, data_sources)?;
    }

    for slo in slos.values_mut() {
        if let Some(slot) = &mut slo.indicator {
            link(slot, "SLI", slis)?;
        }
        if let Some(slot) = &mut slo.service {
            link(slot, "Service", services)?;
        }
        for slot in &mut slo.alert_policies {
            link(slot, "AlertPolicy", alert_policies)?;
        }
        for objective in &mut slo.objectives {
            if let Some(slot) = &mut objective.indicator {
                link(slot, "SLI", slis)?;
            }
            if objective.composite_weight == 0.0 {
                objective.composite_weight = 1.0;
            }
        }
    }

    Ok(())
}
