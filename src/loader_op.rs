use std::slice;

use tokio::sync::oneshot;

use crate::{error::LoadError, worker_stats::WorkerStats};

pub type LoadResponse<T> = oneshot::Sender<Result<T, LoadError>>;

/// Set of possible requests that can be sent to the [`LoaderWorker`]
///
/// The three categories of commands are Load, Prime, and Clear; each of which has a single and
/// many variant for convenience. Stats reads the worker's counters.
#[derive(Debug)]
pub enum LoaderOp<K, V> {
    /// Fetch children from the resource wrapped by this loader (or the cache).
    Load(LoadRequest<K, V>),
    /// Add children to the cache that were fetched from elsewhere.
    Prime(K, Vec<V>),
    PrimeMany(Vec<(K, Vec<V>)>),
    /// Remove keys from the cache so that they will be reloaded when they are next requested.
    Clear(K),
    ClearMany(Vec<K>),
    Stats(oneshot::Sender<WorkerStats>),
}

#[derive(Debug)]
pub enum LoadRequest<K, V> {
    One(K, LoadResponse<Vec<V>>),
    Many(Vec<K>, LoadResponse<Vec<Vec<V>>>),
}

impl<K, V> LoadRequest<K, V>
where
    K: std::fmt::Debug,
    V: Send + Clone + std::fmt::Debug,
{
    pub fn keys(&self) -> &[K] {
        match self {
            LoadRequest::One(ref key, _) => slice::from_ref(key),
            LoadRequest::Many(ref keys, _) => keys,
        }
    }

    /// Answers the request with one cached slice per key, in key order.
    ///
    /// A key without a cached slice was never resolved; the request then fails instead of being
    /// answered with an empty slice.
    pub fn send_response<'a, I>(self, values: I)
    where
        I: IntoIterator<Item = Option<&'a Vec<V>>>,
        V: Send + 'a,
    {
        match self {
            LoadRequest::One(key, response_tx) => {
                let response = values
                    .into_iter()
                    .next()
                    .flatten()
                    .cloned()
                    .ok_or_else(|| unresolved(slice::from_ref(&key)));
                if let Err(e) = response_tx.send(response) {
                    tracing::error!(?e, "receiver dropped");
                }
            }
            LoadRequest::Many(keys, response_tx) => {
                let response = values
                    .into_iter()
                    .map(|opt| opt.cloned())
                    .collect::<Option<Vec<_>>>()
                    .ok_or_else(|| unresolved(&keys));
                if let Err(e) = response_tx.send(response) {
                    tracing::error!(?e, "receiver dropped");
                }
            }
        }
    }

    pub fn send_error(self, error: LoadError) {
        let sent = match self {
            LoadRequest::One(_, response_tx) => response_tx.send(Err(error)).is_ok(),
            LoadRequest::Many(_, response_tx) => response_tx.send(Err(error)).is_ok(),
        };
        if !sent {
            tracing::error!("receiver dropped before error could be delivered");
        }
    }
}

fn unresolved<K: std::fmt::Debug>(keys: &[K]) -> LoadError {
    tracing::error!(?keys, "load answered before all of its keys were resolved");
    LoadError::Unresolved(format!("{:?}", keys))
}
