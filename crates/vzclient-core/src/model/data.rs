// ── Measurement windows ──

use std::time::Duration;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};
use vzclient_api::Grouping;

const HOUR_MS: i64 = 60 * 60 * 1000;
const DAY_MS: i64 = 24 * HOUR_MS;

/// One `(timestamp, value)` sample. Timestamps are epoch milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DataTuple {
    pub timestamp: i64,
    pub value: f64,
}

impl DataTuple {
    pub fn new(timestamp: i64, value: f64) -> Self {
        Self { timestamp, value }
    }
}

/// Summary figures for a window. `min`/`max` are values only; the
/// timestamps the server sends alongside them are dropped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub average: Option<f64>,
    pub consumption: Option<f64>,
    pub rows: u64,
}

/// A time-series window for one channel, identified by `(uuid, from, to)`.
///
/// Tuples are chronological as delivered, possibly downsampled by the
/// server, and never assumed complete or deduplicated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelData {
    pub uuid: String,
    /// Inclusive window start, epoch milliseconds.
    pub from: i64,
    /// Exclusive window end, epoch milliseconds.
    pub to: i64,
    pub tuples: Vec<DataTuple>,
    /// Server-provided statistics; any of them may be missing.
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub average: Option<f64>,
    pub consumption: Option<f64>,
    pub rows: Option<u64>,
}

impl ChannelData {
    pub fn last_tuple(&self) -> Option<&DataTuple> {
        self.tuples.last()
    }

    pub fn is_empty(&self) -> bool {
        self.tuples.is_empty()
    }

    /// Window length in milliseconds.
    pub fn span_ms(&self) -> i64 {
        self.to.saturating_sub(self.from)
    }

    /// Server statistics, with gaps filled from the tuples.
    ///
    /// Consumption cannot be derived without the channel's resolution and
    /// stays `None` unless the server reports it.
    #[allow(clippy::cast_precision_loss, clippy::as_conversions)]
    pub fn statistics(&self) -> Statistics {
        let values = || self.tuples.iter().map(|t| t.value);
        let computed_avg = if self.tuples.is_empty() {
            None
        } else {
            Some(values().sum::<f64>() / self.tuples.len() as f64)
        };

        Statistics {
            min: self.min.or_else(|| values().reduce(f64::min)),
            max: self.max.or_else(|| values().reduce(f64::max)),
            average: self.average.or(computed_avg),
            consumption: self.consumption,
            rows: self
                .rows
                .unwrap_or_else(|| u64::try_from(self.tuples.len()).unwrap_or(u64::MAX)),
        }
    }
}

// ── Time ranges ──────────────────────────────────────────────────────

/// Span presets offered for charting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum TimeRange {
    Hour,
    Day,
    Week,
    /// 30 days.
    Month,
    /// 365 days.
    Year,
}

impl TimeRange {
    pub fn span_ms(self) -> i64 {
        match self {
            Self::Hour => HOUR_MS,
            Self::Day => DAY_MS,
            Self::Week => 7 * DAY_MS,
            Self::Month => 30 * DAY_MS,
            Self::Year => 365 * DAY_MS,
        }
    }

    pub fn duration(self) -> Duration {
        Duration::from_millis(self.span_ms().unsigned_abs())
    }

    /// Grouping requested for this preset.
    pub fn grouping(self) -> Option<Grouping> {
        grouping_for_span(self.span_ms())
    }

    /// `(from, to)` ending at `now_ms`.
    pub fn window_ending_at(self, now_ms: i64) -> (i64, i64) {
        (now_ms.saturating_sub(self.span_ms()), now_ms)
    }
}

/// Server-side aggregation for a window of `span_ms` milliseconds.
///
/// Up to an hour is fetched raw, up to a day by hour, up to 30 days by day,
/// anything longer by week.
pub fn grouping_for_span(span_ms: i64) -> Option<Grouping> {
    match span_ms {
        s if s <= HOUR_MS => None,
        s if s <= DAY_MS => Some(Grouping::Hour),
        s if s <= 30 * DAY_MS => Some(Grouping::Day),
        _ => Some(Grouping::Week),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data(tuples: &[(i64, f64)]) -> ChannelData {
        ChannelData {
            uuid: "c1".into(),
            from: 0,
            to: 10_000,
            tuples: tuples.iter().map(|&(t, v)| DataTuple::new(t, v)).collect(),
            min: None,
            max: None,
            average: None,
            consumption: None,
            rows: None,
        }
    }

    #[test]
    fn presets_map_to_groupings() {
        assert_eq!(TimeRange::Hour.grouping(), None);
        assert_eq!(TimeRange::Day.grouping(), Some(Grouping::Hour));
        assert_eq!(TimeRange::Week.grouping(), Some(Grouping::Day));
        assert_eq!(TimeRange::Month.grouping(), Some(Grouping::Day));
        assert_eq!(TimeRange::Year.grouping(), Some(Grouping::Week));
    }

    #[test]
    fn span_boundaries_are_inclusive() {
        assert_eq!(grouping_for_span(HOUR_MS), None);
        assert_eq!(grouping_for_span(HOUR_MS + 1), Some(Grouping::Hour));
        assert_eq!(grouping_for_span(30 * DAY_MS), Some(Grouping::Day));
        assert_eq!(grouping_for_span(30 * DAY_MS + 1), Some(Grouping::Week));
    }

    #[test]
    fn window_ends_at_now() {
        let (from, to) = TimeRange::Day.window_ending_at(2 * DAY_MS);
        assert_eq!((from, to), (DAY_MS, 2 * DAY_MS));
    }

    #[test]
    fn statistics_fall_back_to_tuples() {
        let stats = data(&[(1, 4.0), (2, 8.0), (3, 6.0)]).statistics();
        assert_eq!(stats.min, Some(4.0));
        assert_eq!(stats.max, Some(8.0));
        assert_eq!(stats.average, Some(6.0));
        assert_eq!(stats.consumption, None);
        assert_eq!(stats.rows, 3);
    }

    #[test]
    fn server_statistics_win() {
        let mut d = data(&[(1, 4.0), (2, 8.0)]);
        d.min = Some(1.0);
        d.average = Some(2.5);
        d.rows = Some(120);
        let stats = d.statistics();
        assert_eq!(stats.min, Some(1.0));
        assert_eq!(stats.max, Some(8.0));
        assert_eq!(stats.average, Some(2.5));
        assert_eq!(stats.rows, 120);
    }

    #[test]
    fn empty_window_has_no_statistics() {
        let stats = data(&[]).statistics();
        assert_eq!(stats, Statistics::default());
    }
}
