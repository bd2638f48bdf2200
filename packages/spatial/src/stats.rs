//! Per-cluster descriptive statistics.

use std::collections::BTreeMap;

use crash_risk_analytics_models::{Cluster, GeoPoint};
use crash_risk_crash_models::{TimeOfDay, normalize_hour};

use crate::CrashPoint;

/// Kilometers per degree, the flat approximation used for cluster radii.
pub const KM_PER_DEGREE: f64 = 111.0;

/// Share of each key among `n` observations.
#[allow(clippy::cast_precision_loss)]
fn fractions<K: Ord>(keys: impl Iterator<Item = K>, n: usize) -> BTreeMap<K, f64> {
    let mut counts: BTreeMap<K, usize> = BTreeMap::new();
    for key in keys {
        *counts.entry(key).or_default() += 1;
    }
    counts
        .into_iter()
        .map(|(k, c)| (k, c as f64 / n as f64))
        .collect()
}

fn hour<P: CrashPoint>(point: &P) -> u8 {
    normalize_hour(i64::from(point.hour_of_day()))
}

/// Builds the [`Cluster`] summary for one label's members.
///
/// `members` must be non-empty.
#[allow(clippy::cast_precision_loss)]
pub fn summarize<P: CrashPoint>(cluster_id: usize, members: &[&P]) -> Cluster {
    let n = members.len();
    let count = n.max(1) as f64;

    let latitude = members.iter().map(|p| p.latitude()).sum::<f64>() / count;
    let longitude = members.iter().map(|p| p.longitude()).sum::<f64>() / count;

    let radius_deg = members
        .iter()
        .map(|p| (p.latitude() - latitude).hypot(p.longitude() - longitude))
        .fold(0.0, f64::max);

    Cluster {
        cluster_id,
        crash_count: n,
        fatal_count: members.iter().map(|p| u64::from(p.fatal_count())).sum(),
        injury_count: members.iter().map(|p| u64::from(p.injury_count())).sum(),
        center: GeoPoint {
            latitude,
            longitude,
        },
        radius_km: radius_deg * KM_PER_DEGREE,
        weather_patterns: fractions(members.iter().map(|p| p.weather().trim().to_string()), n),
        road_conditions: fractions(
            members.iter().map(|p| p.road_condition().trim().to_string()),
            n,
        ),
        time_patterns: fractions(members.iter().map(|p| hour(*p)), n),
        period_patterns: fractions(members.iter().map(|p| TimeOfDay::from_hour(hour(*p))), n),
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use crash_risk_crash_models::CrashRecord;

    use super::*;

    fn crash(hour_of_day: u8) -> CrashRecord {
        CrashRecord {
            id: format!("h{hour_of_day}"),
            timestamp: NaiveDate::from_ymd_opt(2023, 3, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
            hour_of_day,
            weather: "1".to_string(),
            road_condition: "1".to_string(),
            fatal_count: 0,
            injury_count: 1,
            longitude: -77.0,
            latitude: 40.0,
            estimated_location: false,
        }
    }

    #[test]
    fn out_of_range_hours_are_normalized_like_temporal_weights() {
        let records = [crash(24), crash(30), crash(6)];
        let members: Vec<&CrashRecord> = records.iter().collect();
        let cluster = summarize(0, &members);

        let hours: Vec<u8> = cluster.time_patterns.keys().copied().collect();
        assert_eq!(hours, vec![0, 6]);
        assert!((cluster.time_patterns[&6] - 2.0 / 3.0).abs() < 1e-12);
        assert!((cluster.period_patterns[&TimeOfDay::Night] - 1.0 / 3.0).abs() < 1e-12);
        assert!((cluster.period_patterns[&TimeOfDay::Morning] - 2.0 / 3.0).abs() < 1e-12);
    }
}
