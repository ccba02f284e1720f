/// Counters kept by a `LoaderWorker` over its lifetime.
///
/// A snapshot can be requested with [`Loader::stats`](crate::Loader::stats); the final values are
/// logged at debug level when the worker shuts down.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct WorkerStats {
    /// Human readable name used to identify this worker stats when it is reported.
    tag: &'static str,
    /// Number of `LoaderOp::Load` that were received by the worker.
    load_requests: u64,
    /// The total number of keys that were requested for loading (not necessarily unique).
    items_requested: u64,
    /// The number of keys that were immediately found in the loader cache.
    cache_hits: u64,
    /// Number of execution frames that fired a fetch.
    loads: u64,
    /// Number of calls made to the batch function. Exceeds `loads` when batches are chunked.
    fetch_calls: u64,
    /// Number of execution frames whose fetch failed.
    failed_loads: u64,
    /// The average number of keys (not-unique) that were fetched during load operations.
    average_batch_size: f32,
    /// The max number of keys (not-unique) that were fetched during a single load.
    max_batch_size: u64,
    /// The min number of keys (not-unique) that were fetched during a single load.
    min_batch_size: u64,

    /// The max number of unique keys fetched during a single load.
    max_batch_unique: u64,
    /// The min number of unique keys fetched during a single load.
    min_batch_unique: u64,
    /// The total number of child rows that were actually loaded.
    items_loaded: u64,
}

impl WorkerStats {
    pub(crate) fn new(tag: &'static str) -> Self {
        Self { tag, ..Default::default() }
    }

    pub(crate) fn record_load_request(&mut self, items_requested: u64) {
        self.load_requests = self.load_requests.saturating_add(1);
        self.items_requested = self.items_requested.saturating_add(items_requested);
    }

    pub(crate) fn record_cache_hits(&mut self, hits: u64) {
        self.cache_hits = self.cache_hits.saturating_add(hits);
    }

    pub(crate) fn record_load_exec(&mut self, batch_size: u64) {
        let new_total_load = self.loads.saturating_add(1);
        self.average_batch_size = (((self.average_batch_size as f64 * self.loads as f64)
            + batch_size as f64)
            / new_total_load as f64) as f32;
        if self.loads == 0 || batch_size < self.min_batch_size {
            self.min_batch_size = batch_size;
        }
        if batch_size > self.max_batch_size {
            self.max_batch_size = batch_size;
        }
        self.loads = new_total_load;
    }

    pub(crate) fn record_fetch_calls(&mut self, calls: u64) {
        self.fetch_calls = self.fetch_calls.saturating_add(calls);
    }

    pub(crate) fn record_load_exec_completed(
        &mut self,
        unique_batch_size: u64,
        loaded_item_count: u64,
    ) {
        self.items_loaded = self.items_loaded.saturating_add(loaded_item_count);

        if self.max_batch_unique == 0 || unique_batch_size > self.max_batch_unique {
            self.max_batch_unique = unique_batch_size;
        }
        if self.min_batch_unique == 0 || unique_batch_size < self.min_batch_unique {
            self.min_batch_unique = unique_batch_size;
        }
    }

    pub(crate) fn record_load_exec_failed(&mut self) {
        self.failed_loads = self.failed_loads.saturating_add(1);
    }

    pub fn tag(&self) -> &'static str {
        self.tag
    }

    pub fn load_requests(&self) -> u64 {
        self.load_requests
    }

    pub fn items_requested(&self) -> u64 {
        self.items_requested
    }

    pub fn cache_hits(&self) -> u64 {
        self.cache_hits
    }

    /// Number of execution frames that fired a fetch.
    pub fn loads(&self) -> u64 {
        self.loads
    }

    pub fn fetch_calls(&self) -> u64 {
        self.fetch_calls
    }

    pub fn failed_loads(&self) -> u64 {
        self.failed_loads
    }

    pub fn average_batch_size(&self) -> f32 {
        self.average_batch_size
    }

    pub fn max_batch_size(&self) -> u64 {
        self.max_batch_size
    }

    pub fn min_batch_size(&self) -> u64 {
        self.min_batch_size
    }

    pub fn max_batch_unique(&self) -> u64 {
        self.max_batch_unique
    }

    pub fn min_batch_unique(&self) -> u64 {
        self.min_batch_unique
    }

    pub fn items_loaded(&self) -> u64 {
        self.items_loaded
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_size_bounds_and_average() {
        let mut stats = WorkerStats::new("orders");
        stats.record_load_exec(4);
        stats.record_load_exec(2);
        stats.record_load_exec(6);

        assert_eq!(stats.loads(), 3);
        assert_eq!(stats.min_batch_size(), 2);
        assert_eq!(stats.max_batch_size(), 6);
        assert!((stats.average_batch_size() - 4.0).abs() < f32::EPSILON);
    }

    #[test]
    fn unique_bounds_track_completed_loads() {
        let mut stats = WorkerStats::new("orders");
        stats.record_load_exec_completed(3, 5);
        stats.record_load_exec_completed(1, 0);
        stats.record_load_exec_completed(7, 2);

        assert_eq!(stats.min_batch_unique(), 1);
        assert_eq!(stats.max_batch_unique(), 7);
        assert_eq!(stats.items_loaded(), 7);
    }

    #[test]
    fn requests_and_hits() {
        let mut stats = WorkerStats::new("orders");
        stats.record_load_request(3);
        stats.record_load_request(1);
        stats.record_cache_hits(2);
        stats.record_load_exec_failed();

        assert_eq!(stats.tag(), "orders");
        assert_eq!(stats.load_requests(), 2);
        assert_eq!(stats.items_requested(), 4);
        assert_eq!(stats.cache_hits(), 2);
        assert_eq!(stats.failed_loads(), 1);
    }

    #[test]
    fn counters_saturate() {
        let mut stats = WorkerStats::new("orders");
        stats.load_requests = u64::MAX;
        stats.items_requested = u64::MAX - 1;
        stats.items_loaded = u64::MAX;
        stats.record_load_request(5);
        stats.record_load_exec_completed(1, 3);

        assert_eq!(stats.load_requests(), u64::MAX);
        assert_eq!(stats.items_requested(), u64::MAX);
        assert_eq!(stats.items_loaded(), u64::MAX);
    }
}
