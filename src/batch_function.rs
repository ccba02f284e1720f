use async_trait::async_trait;

/// A `BatchFunction` defines how a `Loader` fetches the children of a set of parent keys from
/// some resource. The `BatchFunction` receives the keys that were requested during the `Loader`'s
/// most recent execution frame, and the request context the loader was created with.
///
/// The function returns child rows paired with the parent key they belong to, in whatever order
/// the resource naturally produces them. The loader partitions the rows by key on its side and
/// keeps the returned order within each parent. Keys with no rows resolve to an empty `Vec`;
/// there is no need to emit anything for them.
///
/// Returning an `Err` fails every load that is waiting on this batch. The loader does not retry.
///
/// Multiple `BatchFunctions` (and therefore loaders) can share the same context (likely through an
/// `Arc`).
#[async_trait]
pub trait BatchFunction<K, V> {
    type Context;
    type Error: std::error::Error + Send + Sync + 'static;

    /// Fetches all children of `keys` in a single call.
    ///
    /// `keys` is never empty, is sorted, and contains no duplicates.
    async fn load(keys: &[K], context: &Self::Context) -> Result<Vec<(K, V)>, Self::Error>;

    /// Rejects keys that can never identify a parent, before they are queued.
    fn check_key(_key: &K) -> Result<(), String> {
        Ok(())
    }
}
