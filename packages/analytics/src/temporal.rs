//! Hour-of-day crash frequency.

use std::collections::BTreeMap;

use crash_risk_analytics_models::TemporalWeights;
use crash_risk_crash_models::{CrashRecord, normalize_hour};

use crate::AnalyticsError;

/// Fraction of `records` that occurred in each hour of day.
///
/// # Errors
///
/// Returns [`AnalyticsError::InsufficientData`] for an empty slice.
#[allow(clippy::cast_precision_loss)]
pub fn weights(records: &[CrashRecord]) -> Result<TemporalWeights, AnalyticsError> {
    if records.is_empty() {
        return Err(AnalyticsError::InsufficientData {
            what: "temporal weights",
            required: 1,
            found: 0,
        });
    }

    let mut counts: BTreeMap<u8, usize> = BTreeMap::new();
    for record in records {
        *counts
            .entry(normalize_hour(i64::from(record.hour_of_day)))
            .or_default() += 1;
    }

    let total = records.len() as f64;
    let weights = TemporalWeights::new(
        counts
            .into_iter()
            .map(|(hour, count)| (hour, count as f64 / total))
            .collect(),
    );

    log::debug!(
        "Computed temporal weights over {} hours from {} records",
        weights.len(),
        records.len()
    );

    Ok(weights)
}
