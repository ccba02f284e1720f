use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::ops::Drop;

use tokio::sync::{mpsc, oneshot};
use tracing_futures::Instrument;

use crate::{
    batch_function::BatchFunction,
    config::LoaderConfig,
    error::LoadError,
    loader_op::{LoadRequest, LoaderOp},
    loader_worker::LoaderWorker,
    worker_stats::WorkerStats,
};

/// Batch loads the children of parent keys from some expensive resource, primarily intended for
/// mitigating GraphQL's N+1 problem when resolving one-to-many relations.
///
/// A `Loader` is scoped to one logical request. The API layer creates one per incoming request,
/// passes it (usually behind an `Arc`) to every resolver of that request, and drops it when the
/// response is done. Results are never shared between two loaders.
///
/// Users call [`Loader::load`] and [`Loader::load_many`] to fetch children from the underlying
/// resource or cache. Every key requested during one execution frame goes out in a single call
/// to the [`BatchFunction`], and each caller receives only the rows for its own key, in the order
/// the resource returned them. Keys are cleared with [`Loader::clear`] and [`Loader::clear_many`],
/// and children can be added to the cache out-of-band through [`Loader::prime`] and
/// [`Loader::prime_many`].
///
/// The `Loader` struct acts as an intermediary between the async domain in which `load` calls are
/// invoked and the pseudo-single-threaded domain of the `LoaderWorker`. Callers can invoke the
/// `Loader` from multiple parallel tasks, and the loader will enqueue the requested operations on
/// the request queue for processing by its `LoaderWorker`. The worker processes the requests
/// sequentially and provides results via response oneshot channels back to the Loader.
///
/// Dropping the `Loader`, or calling [`Loader::cancel`], aborts the worker together with any
/// fetch it has in flight. Outstanding loads then fail with [`LoadError::Cancelled`].
pub struct Loader<K, V>
where
    K: 'static + Eq + Hash + Ord + Clone + Debug + Send + Sync,
    V: 'static + Send + Debug + Clone,
{
    request_tx: mpsc::UnboundedSender<LoaderOp<K, V>>,
    load_task_handle: tokio::task::JoinHandle<()>,
    check_key: fn(&K) -> Result<(), String>,
}

impl<K, V> Drop for Loader<K, V>
where
    K: 'static + Eq + Hash + Ord + Clone + Debug + Send + Sync,
    V: 'static + Send + Debug + Clone,
{
    fn drop(&mut self) {
        self.load_task_handle.abort();
    }
}

impl<K, V> Loader<K, V>
where
    K: 'static + Eq + Hash + Ord + Clone + Debug + Send + Sync,
    V: 'static + Send + Debug + Clone,
{
    /// Creates a new Loader for the provided BatchFunction and Context type.
    ///
    /// Note: the batch function is passed in as a marker for type inference.
    ///
    /// Must be called from within a tokio runtime; the worker is spawned immediately.
    pub fn new<F, ContextT>(batch_function: F, context: ContextT) -> Self
    where
        ContextT: Send + Sync + 'static,
        F: 'static + BatchFunction<K, V, Context = ContextT> + Send,
    {
        Self::with_config(batch_function, context, LoaderConfig::default())
    }

    /// Creates a new Loader with explicit [`LoaderConfig`].
    pub fn with_config<F, ContextT>(_: F, context: ContextT, config: LoaderConfig) -> Self
    where
        ContextT: Send + Sync + 'static,
        F: 'static + BatchFunction<K, V, Context = ContextT> + Send,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let worker = LoaderWorker::<K, V, F, HashMap<K, Vec<V>>, ContextT>::new(
            HashMap::new(),
            rx,
            context,
            config.clone(),
        );
        let span = tracing::trace_span!(
            "LoaderWorker",
            kv = config.name.unwrap_or_else(std::any::type_name::<(K, V)>)
        );
        Self {
            request_tx: tx,
            load_task_handle: tokio::task::spawn(worker.start().instrument(span)),
            check_key: F::check_key,
        }
    }

    /// Loads the children of `key` from the underlying resource.
    ///
    /// Returns an empty `Vec` when the resource has no children for `key`.
    ///
    /// If the key is already in the loader cache, its children are returned as soon as the
    /// request is processed. Otherwise, the requested key is enqueued for batch loading in the
    /// next loader execution frame.
    pub async fn load(&self, key: K) -> Result<Vec<V>, LoadError> {
        (self.check_key)(&key).map_err(LoadError::InvalidKey)?;
        let (response_tx, response_rx) = oneshot::channel();
        self.send(LoaderOp::Load(LoadRequest::One(key, response_tx)))?;
        response_rx.await.map_err(|_| LoadError::Cancelled)?
    }

    /// Loads the children of many keys at once.
    ///
    /// The returned `Vec` has one entry per requested key, in the same order.
    ///
    /// If all the keys are already present in the loader cache, they are returned as soon as the
    /// request is processed by the worker. Otherwise, the missing keys are enqueued for batch
    /// loading in the next loader execution frame.
    pub async fn load_many(&self, keys: Vec<K>) -> Result<Vec<Vec<V>>, LoadError> {
        for key in keys.iter() {
            (self.check_key)(key).map_err(LoadError::InvalidKey)?;
        }
        let (response_tx, response_rx) = oneshot::channel();
        self.send(LoaderOp::Load(LoadRequest::Many(keys, response_tx)))?;
        response_rx.await.map_err(|_| LoadError::Cancelled)?
    }

    /// Adds the children of a key to the cache.
    pub async fn prime(&self, key: K, children: Vec<V>) -> Result<(), LoadError> {
        self.send(LoaderOp::Prime(key, children))
    }

    /// Adds the children of many keys to the cache at once.
    pub async fn prime_many(&self, key_vals: Vec<(K, Vec<V>)>) -> Result<(), LoadError> {
        self.send(LoaderOp::PrimeMany(key_vals))
    }

    /// Removes a key from the cache.
    ///
    /// This key will be reloaded when it is next requested.
    pub async fn clear(&self, key: K) -> Result<(), LoadError> {
        self.send(LoaderOp::Clear(key))
    }

    /// Removes multiple keys from the cache at once.
    ///
    /// These keys will be reloaded when requested.
    pub async fn clear_many(&self, keys: Vec<K>) -> Result<(), LoadError> {
        self.send(LoaderOp::ClearMany(keys))
    }

    /// Returns a snapshot of the worker's counters.
    pub async fn stats(&self) -> Result<WorkerStats, LoadError> {
        let (response_tx, response_rx) = oneshot::channel();
        self.send(LoaderOp::Stats(response_tx))?;
        response_rx.await.map_err(|_| LoadError::Cancelled)
    }

    /// Cancels the request this loader belongs to.
    ///
    /// The worker is aborted along with any fetch in flight; its results are never cached.
    /// Outstanding and later loads fail with [`LoadError::Cancelled`].
    pub fn cancel(&self) {
        tracing::debug!("cancelling loader");
        self.load_task_handle.abort();
    }

    fn send(&self, op: LoaderOp<K, V>) -> Result<(), LoadError> {
        self.request_tx.send(op).map_err(|_| LoadError::Cancelled)
    }
}
