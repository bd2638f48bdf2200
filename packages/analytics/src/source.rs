//! Read contract for the crash data store.

use chrono::NaiveDateTime;
use crash_risk_crash_models::CrashRecord;
use thiserror::Error;

/// Errors raised by a [`CrashSource`].
#[derive(Debug, Error)]
pub enum SourceError {
    /// I/O failure reading the backing data.
    #[error("I/O error on {path}: {source}")]
    Io {
        /// Path that caused the error.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The data could not be turned into [`CrashRecord`]s.
    #[error("Malformed crash data at row {row}: {message}")]
    Malformed {
        /// 1-based data row number.
        row: u64,
        /// Description of what went wrong.
        message: String,
    },
}

/// Half-open `[start, end)` time filter. A missing bound is unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeRange {
    /// Inclusive lower bound.
    pub start: Option<NaiveDateTime>,
    /// Exclusive upper bound.
    pub end: Option<NaiveDateTime>,
}

impl TimeRange {
    /// Creates a range from optional bounds.
    #[must_use]
    pub const fn new(start: Option<NaiveDateTime>, end: Option<NaiveDateTime>) -> Self {
        Self { start, end }
    }

    /// Whether `timestamp` falls inside the range.
    #[must_use]
    pub fn contains(&self, timestamp: NaiveDateTime) -> bool {
        self.start.is_none_or(|start| timestamp >= start)
            && self.end.is_none_or(|end| timestamp < end)
    }
}

/// Anything that can hand over historical crash records.
pub trait CrashSource: Send + Sync {
    /// Fetches every crash, optionally restricted to a time range.
    ///
    /// # Errors
    ///
    /// Returns a [`SourceError`] if the backing store cannot be read.
    fn fetch_crashes(&self, range: Option<&TimeRange>) -> Result<Vec<CrashRecord>, SourceError>;
}

/// In-memory crash source.
#[derive(Debug, Clone, Default)]
pub struct VecCrashSource {
    records: Vec<CrashRecord>,
}

impl VecCrashSource {
    /// Wraps already-loaded records.
    #[must_use]
    pub const fn new(records: Vec<CrashRecord>) -> Self {
        Self { records }
    }
}

impl From<Vec<CrashRecord>> for VecCrashSource {
    fn from(records: Vec<CrashRecord>) -> Self {
        Self::new(records)
    }
}

impl CrashSource for VecCrashSource {
    fn fetch_crashes(&self, range: Option<&TimeRange>) -> Result<Vec<CrashRecord>, SourceError> {
        Ok(match range {
            Some(range) => self
                .records
                .iter()
                .filter(|r| range.contains(r.timestamp))
                .cloned()
                .collect(),
            None => self.records.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn record(day: u32) -> CrashRecord {
        CrashRecord {
            id: format!("c{day}"),
            timestamp: NaiveDate::from_ymd_opt(2023, 5, day)
                .unwrap()
                .and_hms_opt(12, 0, 0)
                .unwrap(),
            hour_of_day: 12,
            weather: "1".to_string(),
            road_condition: "1".to_string(),
            fatal_count: 0,
            injury_count: 0,
            longitude: -77.0,
            latitude: 40.0,
            estimated_location: false,
        }
    }

    #[test]
    fn range_is_half_open() {
        let source = VecCrashSource::new((1..=5).map(record).collect());
        let range = TimeRange::new(
            Some(record(2).timestamp),
            Some(record(4).timestamp),
        );
        let ids: Vec<String> = source
            .fetch_crashes(Some(&range))
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec!["c2", "c3"]);
        assert_eq!(source.fetch_crashes(None).unwrap().len(), 5);
        assert_eq!(
            source
                .fetch_crashes(Some(&TimeRange::default()))
                .unwrap()
                .len(),
            5
        );
    }
}
