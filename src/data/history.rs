//! Rolling telemetry history for trend series and the live feed.

use std::collections::VecDeque;
use std::sync::Arc;

use obdwatch_types::{Metric, TelemetryRecord, UnknownMetric};

/// Default length of the detail window used for trend series.
pub const DEFAULT_DETAIL_CAPACITY: usize = 120;
/// Default length of the raw feed window.
pub const DEFAULT_FEED_CAPACITY: usize = 20;

/// A FIFO buffer that never holds more than its capacity.
///
/// The oldest entry is evicted before a new one is inserted, so the length
/// never exceeds the capacity, not even between the two steps.
#[derive(Debug, Clone)]
pub struct RollingBuffer<T> {
    items: VecDeque<T>,
    capacity: usize,
}

impl<T> RollingBuffer<T> {
    /// Create a buffer holding at most `capacity` items (at least 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append an item, returning the one evicted to make room, if any.
    pub fn push(&mut self, item: T) -> Option<T> {
        let evicted = if self.items.len() >= self.capacity {
            self.items.pop_front()
        } else {
            None
        };
        self.items.push_back(item);
        evicted
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Oldest to newest.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> + ExactSizeIterator + '_ {
        self.items.iter()
    }

    pub fn back(&self) -> Option<&T> {
        self.items.back()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}

/// Two bounded windows over the accepted telemetry records.
///
/// The detail window feeds trend series; the shorter feed window backs a
/// live log. Both hold the same shared, immutable record.
///
/// # Example
///
/// ```
/// use obdwatch::HistoryStore;
/// use obdwatch_types::{Metric, TelemetryRecord};
///
/// let mut store = HistoryStore::with_capacity(3, 2);
/// for (ts, rpm) in [(1, 800.0), (2, 900.0), (3, 1000.0), (4, 1100.0)] {
///     store.append(TelemetryRecord::new(ts).with(Metric::Rpm, rpm));
/// }
///
/// assert_eq!(store.series(Metric::Rpm), vec![Some(900.0), Some(1000.0), Some(1100.0)]);
/// assert_eq!(store.recent(5).len(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct HistoryStore {
    detail: RollingBuffer<Arc<TelemetryRecord>>,
    feed: RollingBuffer<Arc<TelemetryRecord>>,
    /// Newest value of every metric seen since the last `clear`.
    readings: Option<TelemetryRecord>,
}

impl Default for HistoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl HistoryStore {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_DETAIL_CAPACITY, DEFAULT_FEED_CAPACITY)
    }

    /// Create a store with explicit window sizes (each clamped to at least 1).
    pub fn with_capacity(detail: usize, feed: usize) -> Self {
        Self {
            detail: RollingBuffer::new(detail),
            feed: RollingBuffer::new(feed),
            readings: None,
        }
    }

    /// Record a new telemetry reading in both windows.
    pub fn append(&mut self, record: TelemetryRecord) {
        match self.readings.as_mut() {
            Some(readings) => readings.merge_from(&record),
            None => self.readings = Some(record.clone()),
        }
        let record = Arc::new(record);
        self.detail.push(Arc::clone(&record));
        self.feed.push(record);
    }

    /// One metric across the detail window, oldest first.
    ///
    /// The result is as long as the window; records that did not report the
    /// metric contribute `None`.
    pub fn series(&self, metric: Metric) -> Vec<Option<f64>> {
        self.detail.iter().map(|record| record.get(metric)).collect()
    }

    /// [`series`](Self::series) looked up by wire field name.
    pub fn series_by_name(&self, field: &str) -> Result<Vec<Option<f64>>, UnknownMetric> {
        Ok(self.series(field.parse()?))
    }

    /// The most recently appended record.
    pub fn latest(&self) -> Option<&TelemetryRecord> {
        self.detail.back().map(|record| record.as_ref())
    }

    /// The newest reported value of every metric, merged across records.
    ///
    /// Group messages each carry only part of the metrics, so this is what
    /// "current" means for a reading: a coolant value stays current until
    /// another record reports coolant, however many other records arrive in
    /// between. It survives eviction from both windows.
    pub fn readings(&self) -> Option<&TelemetryRecord> {
        self.readings.as_ref()
    }

    /// Up to `n` records from the feed window, newest first.
    pub fn recent(&self, n: usize) -> Vec<&TelemetryRecord> {
        self.feed.iter().rev().take(n).map(|record| record.as_ref()).collect()
    }

    /// Every record in the detail window, oldest first.
    pub fn records(&self) -> impl Iterator<Item = &TelemetryRecord> + '_ {
        self.detail.iter().map(|record| record.as_ref())
    }

    /// Number of records in the detail window.
    pub fn len(&self) -> usize {
        self.detail.len()
    }

    pub fn is_empty(&self) -> bool {
        self.detail.is_empty()
    }

    pub fn detail_capacity(&self) -> usize {
        self.detail.capacity()
    }

    pub fn feed_capacity(&self) -> usize {
        self.feed.capacity()
    }

    pub fn clear(&mut self) {
        self.detail.clear();
        self.feed.clear();
        self.readings = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rpm(ts: u64, value: f64) -> TelemetryRecord {
        TelemetryRecord::new(ts).with(Metric::Rpm, value)
    }

    #[test]
    fn test_buffer_evicts_oldest_first() {
        let mut buffer = RollingBuffer::new(3);
        for i in 0..3 {
            assert_eq!(buffer.push(i), None);
        }
        assert_eq!(buffer.push(3), Some(0));
        assert_eq!(buffer.push(4), Some(1));

        assert_eq!(buffer.len(), 3);
        assert_eq!(buffer.iter().copied().collect::<Vec<_>>(), vec![2, 3, 4]);
    }

    #[test]
    fn test_buffer_zero_capacity_is_clamped() {
        let mut buffer = RollingBuffer::new(0);
        buffer.push("a");
        buffer.push("b");
        assert_eq!(buffer.capacity(), 1);
        assert_eq!(buffer.back(), Some(&"b"));
    }

    #[test]
    fn test_append_beyond_capacity_keeps_most_recent() {
        let mut store = HistoryStore::new();
        for ts in 0..150 {
            store.append(rpm(ts, ts as f64));
            assert!(store.len() <= DEFAULT_DETAIL_CAPACITY);
        }

        assert_eq!(store.len(), 120);
        let timestamps: Vec<u64> = store.records().map(|r| r.ts).collect();
        assert_eq!(timestamps, (30..150).collect::<Vec<_>>());
        assert_eq!(store.latest().map(|r| r.ts), Some(149));
    }

    #[test]
    fn test_small_capacities_keep_last_appends_in_order() {
        for capacity in 1..=5usize {
            for count in 0..=3 * capacity {
                let mut store = HistoryStore::with_capacity(capacity, capacity);
                for ts in 0..count as u64 {
                    store.append(rpm(ts, ts as f64));
                    assert!(store.len() <= capacity);
                }

                let expected: Vec<u64> = (count.saturating_sub(capacity) as u64..count as u64).collect();
                let timestamps: Vec<u64> = store.records().map(|r| r.ts).collect();
                assert_eq!(timestamps, expected, "capacity {} after {} appends", capacity, count);

                let newest_first: Vec<u64> = store.recent(capacity).iter().map(|r| r.ts).collect();
                assert_eq!(newest_first, expected.iter().rev().copied().collect::<Vec<_>>());
            }
        }
    }

    #[test]
    fn test_readings_keep_newest_value_per_metric() {
        let mut store = HistoryStore::with_capacity(2, 2);
        assert!(store.readings().is_none());

        store.append(TelemetryRecord::new(1).with(Metric::CoolantTemp, 118.0));
        store.append(rpm(2, 900.0));
        store.append(rpm(3, 950.0));
        store.append(TelemetryRecord::new(4).with(Metric::FuelLevel, 40.0));

        let readings = store.readings().unwrap();
        assert_eq!(readings.ts, 4);
        assert_eq!(readings.get(Metric::CoolantTemp), Some(118.0));
        assert_eq!(readings.get(Metric::Rpm), Some(950.0));
        assert_eq!(readings.get(Metric::FuelLevel), Some(40.0));
        assert_eq!(store.latest().and_then(|r| r.get(Metric::CoolantTemp)), None);

        store.clear();
        assert!(store.readings().is_none());
    }

    #[test]
    fn test_series_is_aligned_with_nulls_for_absent() {
        let mut store = HistoryStore::new();
        store.append(rpm(1, 800.0));
        store.append(TelemetryRecord::new(2).with(Metric::CoolantTemp, 90.0));
        store.append(rpm(3, 950.0));

        assert_eq!(store.series(Metric::Rpm), vec![Some(800.0), None, Some(950.0)]);
        assert_eq!(store.series(Metric::CoolantTemp), vec![None, Some(90.0), None]);
        assert_eq!(store.series(Metric::FuelLevel).len(), store.len());
    }

    #[test]
    fn test_series_by_name() {
        let mut store = HistoryStore::new();
        store.append(TelemetryRecord::new(1).with(Metric::ShortTermFuelTrimBank1, -1.5));

        assert_eq!(store.series_by_name("short_term_fuel_trim_B1").unwrap(), vec![Some(-1.5)]);
        assert!(store.series_by_name("boost_psi").is_err());
    }

    #[test]
    fn test_recent_is_newest_first_and_capped() {
        let mut store = HistoryStore::new();
        for ts in 0..30 {
            store.append(rpm(ts, 1000.0));
        }

        let recent: Vec<u64> = store.recent(3).iter().map(|r| r.ts).collect();
        assert_eq!(recent, vec![29, 28, 27]);
        assert_eq!(store.recent(100).len(), DEFAULT_FEED_CAPACITY);
        assert_eq!(store.recent(100).last().map(|r| r.ts), Some(10));
    }

    #[test]
    fn test_windows_share_records() {
        let mut store = HistoryStore::with_capacity(5, 2);
        store.append(rpm(1, 700.0));

        let detail = store.detail.back().unwrap();
        let feed = store.feed.back().unwrap();
        assert!(Arc::ptr_eq(detail, feed));
    }

    #[test]
    fn test_clear() {
        let mut store = HistoryStore::with_capacity(4, 2);
        store.append(rpm(1, 700.0));
        store.clear();

        assert!(store.is_empty());
        assert!(store.latest().is_none());
        assert!(store.recent(5).is_empty());
        assert_eq!(store.detail_capacity(), 4);
        assert_eq!(store.feed_capacity(), 2);
    }
}
