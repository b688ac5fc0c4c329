//! Notable-event projection of the reading history.
//!
//! The chart and the review list only show readings at or above the warn
//! threshold. Ordering is chosen by the consumer: the chart wants oldest
//! first, the review list newest first.

use gasmon_types::Reading;
use serde::Serialize;

/// Number of history entries the dashboard chart subscribes to.
pub const CHART_HISTORY_LIMIT: usize = 200;

/// Presentation order of a filtered series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    /// Oldest first (chart).
    #[default]
    Ascending,
    /// Newest first (review list).
    Descending,
}

/// Keep readings whose index is at or above `warn`, sorted by timestamp.
///
/// An empty or not-yet-loaded series yields an empty result. The sort is
/// stable, so readings sharing a timestamp keep their store order.
///
/// ```
/// use gasmon_core::history::{filter_notable, SortOrder};
/// use gasmon_types::Reading;
///
/// let series: Vec<Reading> = [10.0, 40.0, 60.0, 20.0]
///     .iter()
///     .enumerate()
///     .map(|(i, &index)| Reading::builder().timestamp(i as i64).index(index).build())
///     .collect();
///
/// let notable = filter_notable(&series, 35.0, SortOrder::Ascending);
/// let indices: Vec<f64> = notable.iter().map(|r| r.index).collect();
/// assert_eq!(indices, vec![40.0, 60.0]);
/// ```
pub fn filter_notable(series: &[Reading], warn: f64, order: SortOrder) -> Vec<Reading> {
    let mut notable: Vec<Reading> = series
        .iter()
        .filter(|r| r.severity() >= warn)
        .cloned()
        .collect();
    match order {
        SortOrder::Ascending => notable.sort_by_key(|r| r.timestamp),
        SortOrder::Descending => notable.sort_by_key(|r| std::cmp::Reverse(r.timestamp)),
    }
    notable
}

/// A single chart point.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartPoint {
    /// Seconds since epoch, used as the x-axis label.
    pub label: i64,
    /// Severity index, 0-100.
    pub value: f64,
}

/// Chart-ready projection of the history.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ChartSeries {
    /// Points in ascending time order.
    pub points: Vec<ChartPoint>,
}

impl ChartSeries {
    /// Build the chart series for a history and warn threshold.
    pub fn from_history(series: &[Reading], warn: f64) -> Self {
        let points = filter_notable(series, warn, SortOrder::Ascending)
            .iter()
            .map(|r| ChartPoint {
                label: r.timestamp_secs(),
                value: r.severity(),
            })
            .collect();
        Self { points }
    }

    /// Whether there is nothing to plot.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Highest plotted value, if any.
    pub fn peak(&self) -> Option<f64> {
        self.points.iter().map(|p| p.value).reduce(f64::max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(indices: &[f64]) -> Vec<Reading> {
        indices
            .iter()
            .enumerate()
            .map(|(i, &index)| {
                Reading::builder()
                    .timestamp(1_000 * (i as i64 + 1))
                    .index(index)
                    .build()
            })
            .collect()
    }

    #[test]
    fn test_filter_keeps_warn_and_above() {
        let filtered = filter_notable(&series(&[10.0, 40.0, 60.0, 20.0]), 35.0, SortOrder::Ascending);
        assert_eq!(filtered.len(), 2);
        assert_eq!(filtered[0].index, 40.0);
        assert_eq!(filtered[1].index, 60.0);
        assert!(filtered[0].timestamp < filtered[1].timestamp);
    }

    #[test]
    fn test_filter_inclusive_at_threshold() {
        let filtered = filter_notable(&series(&[35.0, 34.99]), 35.0, SortOrder::Ascending);
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].index, 35.0);
    }

    #[test]
    fn test_filter_descending_for_review_list() {
        let filtered = filter_notable(&series(&[50.0, 10.0, 70.0]), 35.0, SortOrder::Descending);
        let indices: Vec<f64> = filtered.iter().map(|r| r.index).collect();
        assert_eq!(indices, vec![70.0, 50.0]);
    }

    #[test]
    fn test_filter_sorts_unordered_input() {
        let mut input = series(&[40.0, 50.0, 60.0]);
        input.reverse();
        let filtered = filter_notable(&input, 35.0, SortOrder::Ascending);
        let ts: Vec<i64> = filtered.iter().map(|r| r.timestamp).collect();
        assert_eq!(ts, vec![1_000, 2_000, 3_000]);
    }

    #[test]
    fn test_filter_empty_series() {
        assert!(filter_notable(&[], 35.0, SortOrder::Ascending).is_empty());
    }

    #[test]
    fn test_chart_series_labels_in_seconds() {
        let mut input = series(&[40.0, 10.0]);
        input[0].timestamp = 1_700_000_000_750;
        let chart = ChartSeries::from_history(&input, 35.0);
        assert_eq!(
            chart.points,
            vec![ChartPoint {
                label: 1_700_000_000,
                value: 40.0
            }]
        );
        assert_eq!(chart.peak(), Some(40.0));
        assert!(ChartSeries::from_history(&[], 35.0).is_empty());
    }
}
