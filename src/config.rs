/// Tuning knobs for a [`Loader`](crate::Loader).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoaderConfig {
    /// Number of times the worker yields to the scheduler after the first op of an execution
    /// frame arrives, before it drains the queue and fires the fetch. Each yield gives sibling
    /// resolvers one more chance to register their keys in the same batch.
    pub yield_count: usize,
    /// Upper bound on keys per downstream fetch. `None` sends every key of a frame in one fetch;
    /// `Some(n)` splits the frame into chunks of at most `n` keys that are fetched concurrently.
    /// `Some(0)` is treated like `None`.
    pub max_batch_size: Option<usize>,
    /// Label used for the worker's tracing span and stats. Defaults to the `(K, V)` type name.
    pub name: Option<&'static str>,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self { yield_count: 1, max_batch_size: None, name: None }
    }
}

impl LoaderConfig {
    pub fn with_yield_count(mut self, yield_count: usize) -> Self {
        self.yield_count = yield_count;
        self
    }

    /// A size of zero is treated as "no limit".
    pub fn with_max_batch_size(mut self, max_batch_size: usize) -> Self {
        self.max_batch_size = if max_batch_size == 0 { None } else { Some(max_batch_size) };
        self
    }

    pub fn with_name(mut self, name: &'static str) -> Self {
        self.name = Some(name);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = LoaderConfig::default();
        assert_eq!(config.yield_count, 1);
        assert_eq!(config.max_batch_size, None);
        assert_eq!(config.name, None);
    }

    #[test]
    fn zero_batch_size_means_unbounded() {
        let config = LoaderConfig::default().with_max_batch_size(0);
        assert_eq!(config.max_batch_size, None);

        let config = config.with_max_batch_size(25).with_yield_count(3).with_name("orders");
        assert_eq!(config.max_batch_size, Some(25));
        assert_eq!(config.yield_count, 3);
        assert_eq!(config.name, Some("orders"));
    }
}
