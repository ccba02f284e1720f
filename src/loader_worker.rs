use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::marker::PhantomData;
use std::slice;
use std::sync::Arc;

use futures::future::{self, FutureExt};
use tokio::sync::mpsc;

use crate::{
    batch_function::BatchFunction,
    cache::Cache,
    config::LoaderConfig,
    error::{LoadError, SharedError},
    loader_op::{LoadRequest, LoaderOp},
    worker_stats::WorkerStats,
};

/// A `LoaderWorker` is the "single-thread" worker task that actually does the loading work.
///
/// Once started, it runs in a loop until the parent Loader aborts it's `JoinHandle` or drops the
/// request queue tx channel. The worker owns the cache and the set of pending keys; nothing else
/// touches them, so no locking is needed.
///
/// The worker can be in one of four states during its lifetime:
///
/// 1. Idle, waiting for requests.
/// 2. Collecting: yielding to the scheduler, then flushing the request queue and staging keys for
///    loading.
/// 3. Executing its batch function.
/// 4. Resolved: children are cached and every pending request has been answered.
///
/// One cycle through this loop may be called an "execution frame", or a round.
///
/// In state (1), the worker awaits any messages on the request queue channel, idling until work
/// arrives.
///
/// In state (2), the worker first yields `LoaderConfig::yield_count` times so that sibling tasks
/// of the same request get to register their keys, then synchronously pulls requests from the
/// queue until there are no more pending requests. Prime and Clear requests are resolved
/// immediately against the cache. For Load requests, the worker checks if the request can be
/// resolved immediately from the cache. If so, it immediately sends the children on the load
/// request's response channel, otherwise it stages the missing keys for loading.
///
/// In state (3), the worker recomputes which keys of the held requests are still missing from the
/// cache (a Clear drained in (2) can evict a key that was cached when its request arrived, and a
/// Prime can fill one), then invokes its `BatchFunction` once with the deduplicated set of those
/// keys (or once per chunk when `max_batch_size` is set). The returned rows are
/// grouped by key, preserving their order, and every fetched key is cached, with an empty `Vec`
/// when no rows came back. Outstanding Load requests are then resolved from the cache.
///
/// If the fetch fails, every Load request of the round receives the same shared error and the
/// worker is poisoned: the cache is discarded and later Load requests fail straight away with that
/// error.
pub struct LoaderWorker<K, V, F, CacheT, ContextT>
where
    K: 'static + Eq + Hash + Ord + Clone + Debug + Send + Sync,
    V: 'static + Send + Debug + Clone,
    F: 'static + BatchFunction<K, V, Context = ContextT> + Send,
    CacheT: Cache<K = K, V = Vec<V>>,
    ContextT: Send + Sync + 'static,
{
    cache: CacheT,
    request_rx: mpsc::UnboundedReceiver<LoaderOp<K, V>>,
    pending_request: Vec<LoadRequest<K, V>>,
    context: ContextT,
    config: LoaderConfig,
    failure: Option<SharedError>,
    stats: WorkerStats,
    phantom_batch_function: PhantomData<F>,
    debug_name: &'static str,
}

impl<K, V, F, CacheT, ContextT> LoaderWorker<K, V, F, CacheT, ContextT>
where
    K: 'static + Eq + Hash + Ord + Clone + Debug + Send + Sync,
    V: 'static + Send + Debug + Clone,
    F: 'static + BatchFunction<K, V, Context = ContextT> + Send,
    CacheT: Cache<K = K, V = Vec<V>>,
    ContextT: Send + Sync + 'static,
{
    pub fn new(
        cache: CacheT,
        request_rx: mpsc::UnboundedReceiver<LoaderOp<K, V>>,
        context: ContextT,
        config: LoaderConfig,
    ) -> Self {
        let debug_name = config.name.unwrap_or_else(std::any::type_name::<(K, V)>);
        Self {
            cache,
            request_rx,
            pending_request: Vec::new(),
            context,
            config,
            failure: None,
            stats: WorkerStats::new(debug_name),
            phantom_batch_function: PhantomData,
            debug_name,
        }
    }

    pub async fn start(mut self) {
        loop {
            // Async await until we receive the first op.
            match self.request_rx.recv().await {
                None => {
                    tracing::info!("Tx channel closed. Terminating LoaderWorker.");
                    return;
                }
                Some(op) => self.mux_op(op),
            }
            if !self.pending_request.is_empty() {
                // Give the other resolvers of this request a chance to enqueue their keys.
                for _ in 0..self.config.yield_count {
                    tokio::task::yield_now().await;
                }
            }
            // Flush remainder of the op queue before executing load.
            while let Some(Some(op)) = self.request_rx.recv().now_or_never() {
                self.mux_op(op);
            }
            if !self.pending_request.is_empty() {
                self.execute_load().await;
            }
        }
    }

    #[tracing::instrument(skip(self))]
    fn mux_op(&mut self, op: LoaderOp<K, V>) {
        if self.failure.is_some() && !matches!(op, LoaderOp::Load(_) | LoaderOp::Stats(_)) {
            tracing::debug!("ignoring cache update on poisoned loader");
            return;
        }
        match op {
            LoaderOp::Load(request) => {
                self.stats.record_load_request(request.keys().len() as u64);
                if let Some(failure) = &self.failure {
                    tracing::debug!(requested_keys = ?request.keys(), "loader is poisoned");
                    request.send_error(LoadError::Poisoned(failure.clone()));
                    return;
                }
                let cached = self.cache.get_key_vals(request.keys());
                let keys_to_load = cached
                    .iter()
                    .filter_map(|(k, v)| if v.is_none() { Some((*k).clone()) } else { None })
                    .collect::<Vec<_>>();
                self.stats.record_cache_hits((cached.len() - keys_to_load.len()) as u64);
                tracing::debug!(requested_keys = ?request.keys(), ?keys_to_load);
                if keys_to_load.is_empty() {
                    let values = cached.into_iter().map(|(_k, v)| v).collect::<Vec<_>>();
                    request.send_response(values);
                } else {
                    self.pending_request.push(request);
                }
            }
            LoaderOp::Prime(key, value) => self.cache.insert(key, value),
            LoaderOp::PrimeMany(key_vals) => self.cache.insert_many(key_vals),
            LoaderOp::Clear(key) => self.cache.remove(slice::from_ref(&key)),
            LoaderOp::ClearMany(keys) => self.cache.remove(&keys),
            LoaderOp::Stats(response_tx) => {
                if response_tx.send(self.stats.clone()).is_err() {
                    tracing::error!("stats receiver dropped");
                }
            }
        }
    }

    #[tracing::instrument(skip(self), fields(name = self.debug_name))]
    async fn execute_load(&mut self) {
        // Prime and Clear ops drained in this frame may have changed which keys are missing, so
        // the fetch set is taken from the held requests as they stand now.
        let mut keys = self
            .pending_request
            .iter()
            .flat_map(|request| request.keys())
            .filter(|key| self.cache.get(slice::from_ref(*key))[0].is_none())
            .cloned()
            .collect::<Vec<_>>();
        if keys.is_empty() {
            self.answer_pending();
            return;
        }
        self.stats.record_load_exec(keys.len() as u64);
        keys.sort();
        keys.dedup();

        let result = match self.config.max_batch_size {
            Some(max) if max > 0 && keys.len() > max => {
                let chunks =
                    keys.chunks(max).map(|chunk| F::load(chunk, &self.context)).collect::<Vec<_>>();
                self.stats.record_fetch_calls(chunks.len() as u64);
                future::try_join_all(chunks)
                    .await
                    .map(|chunk_rows| chunk_rows.into_iter().flatten().collect::<Vec<_>>())
            }
            _ => {
                self.stats.record_fetch_calls(1);
                F::load(&keys, &self.context).await
            }
        };

        match result {
            Ok(rows) => {
                let loaded_count = rows.len();
                let mut grouped: HashMap<K, Vec<V>> =
                    keys.iter().map(|k| (k.clone(), Vec::new())).collect();
                for (key, value) in rows {
                    match grouped.get_mut(&key) {
                        Some(children) => children.push(value),
                        None => tracing::warn!(?key, "batch function returned an unrequested key"),
                    }
                }
                tracing::debug!(unique_keys = keys.len(), loaded_count);
                self.cache.insert_many(grouped);
                self.stats.record_load_exec_completed(keys.len() as u64, loaded_count as u64);
                self.answer_pending();
            }
            Err(e) => {
                let shared: SharedError = Arc::new(e);
                tracing::error!(error = %shared, ?keys, "batch fetch failed");
                self.stats.record_load_exec_failed();
                for request in self.pending_request.drain(..) {
                    request.send_error(LoadError::Fetch(shared.clone()));
                }
                self.cache.flush();
                self.failure = Some(shared);
            }
        }
    }

    fn answer_pending(&mut self) {
        for request in self.pending_request.drain(..) {
            let values = self.cache.get(request.keys());
            request.send_response(values);
        }
    }
}

impl<K, V, F, CacheT, ContextT> Drop for LoaderWorker<K, V, F, CacheT, ContextT>
where
    K: 'static + Eq + Hash + Ord + Clone + Debug + Send + Sync,
    V: 'static + Send + Debug + Clone,
    F: 'static + BatchFunction<K, V, Context = ContextT> + Send,
    CacheT: Cache<K = K, V = Vec<V>>,
    ContextT: Send + Sync + 'static,
{
    fn drop(&mut self) {
        tracing::debug!(worker_stats = ?self.stats, cached_keys = self.cache.len());
    }
}
