//! Single-flight request cache.
//!
//! The first caller for a key performs the fetch. Concurrent callers for the same key wait for
//! that fetch and receive its outcome, success or failure. Successful values are kept for the
//! lifetime of the cache; failures are handed to the callers waiting at the time and then
//! forgotten.

use hashbrown::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{watch, RwLock};

/// Outcome of a fetch, shared with every caller waiting on it.
type Outcome<V, E> = Option<Result<V, Arc<E>>>;

/// The state of a single key.
#[derive(Debug)]
enum Entry<V, E> {
    /// A fetch is running. Waiters subscribe to its outcome.
    Retrieving(watch::Receiver<Outcome<V, E>>),
    /// The fetch succeeded.
    Resolved(V),
}

/// How a caller takes part in a fetch.
enum Role<V, E> {
    Leader(watch::Sender<Outcome<V, E>>),
    Waiter(watch::Receiver<Outcome<V, E>>),
}

/// A cache guaranteeing at most one concurrent fetch per key.
///
/// Failed fetches are not cached: the key returns to the absent state and the next caller
/// retries. There is no eviction.
#[derive(Debug)]
pub struct RequestCache<V, E> {
    /// A read-write lock synchronises access to the map, optimised for reads.
    entries: RwLock<HashMap<String, Entry<V, E>>>,
}

impl<V, E> Default for RequestCache<V, E> {
    fn default() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }
}

impl<V: Clone, E> RequestCache<V, E> {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if a value has been resolved for `key`.
    pub async fn has(&self, key: &str) -> bool {
        let entries = self.entries.read().await;
        matches!(entries.get(key), Some(Entry::Resolved(_)))
    }

    /// Returns the resolved value for `key`, if any.
    pub async fn get(&self, key: &str) -> Option<V> {
        let entries = self.entries.read().await;
        match entries.get(key) {
            Some(Entry::Resolved(value)) => Some(value.clone()),
            _ => None,
        }
    }

    /// Returns true if a fetch for `key` is in flight.
    pub async fn is_retrieving(&self, key: &str) -> bool {
        let entries = self.entries.read().await;
        matches!(entries.get(key), Some(Entry::Retrieving(_)))
    }

    /// Resolve `key` to `value`.
    ///
    /// Returns false, leaving the cache unchanged, if `key` is already resolved or being fetched.
    pub async fn set(&self, key: &str, value: V) -> bool {
        let mut entries = self.entries.write().await;
        if entries.contains_key(key) {
            return false;
        }
        entries.insert(key.to_string(), Entry::Resolved(value));
        true
    }

    /// Number of resolved keys.
    pub async fn len(&self) -> usize {
        let entries = self.entries.read().await;
        entries
            .values()
            .filter(|entry| matches!(entry, Entry::Resolved(_)))
            .count()
    }

    /// Returns true if no key has been resolved.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Return the resolved value for `key`, or join or start a fetch for it.
    async fn role(&self, key: &str) -> Result<V, Role<V, E>> {
        // Common case: the value is already resolved.
        {
            let entries = self.entries.read().await;
            if let Some(Entry::Resolved(value)) = entries.get(key) {
                return Ok(value.clone());
            }
        }
        // Less common case: join or start a fetch. Allow for a race since we dropped the read lock.
        let mut entries = self.entries.write().await;
        match entries.get(key) {
            Some(Entry::Resolved(value)) => Ok(value.clone()),
            Some(Entry::Retrieving(receiver)) => Err(Role::Waiter(receiver.clone())),
            None => {
                let (sender, receiver) = watch::channel(None);
                entries.insert(key.to_string(), Entry::Retrieving(receiver));
                Err(Role::Leader(sender))
            }
        }
    }

    /// Remove the entry for `key` if it still refers to the fetch behind `receiver`.
    async fn remove_stale(&self, key: &str, receiver: &watch::Receiver<Outcome<V, E>>) {
        let mut entries = self.entries.write().await;
        if let Some(Entry::Retrieving(current)) = entries.get(key) {
            if current.same_channel(receiver) {
                entries.remove(key);
            }
        }
    }

    /// Return the value for `key`, fetching it if necessary.
    ///
    /// If another caller is already fetching `key`, wait for that fetch instead of starting a new
    /// one. Every caller waiting on a fetch receives its outcome. Errors are shared, so they are
    /// returned behind an [Arc].
    ///
    /// # Arguments
    ///
    /// * `key`: Cache key
    /// * `fetch`: Produces the value on a cache miss
    pub async fn get_or_try_fetch<F, Fut>(&self, key: &str, fetch: F) -> Result<V, Arc<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        loop {
            match self.role(key).await {
                Ok(value) => {
                    tracing::debug!(key, "request cache hit");
                    return Ok(value);
                }
                Err(Role::Leader(sender)) => {
                    tracing::debug!(key, "request cache miss");
                    let result = fetch().await.map_err(Arc::new);
                    let mut entries = self.entries.write().await;
                    match &result {
                        Ok(value) => {
                            entries.insert(key.to_string(), Entry::Resolved(value.clone()));
                        }
                        Err(_) => {
                            entries.remove(key);
                        }
                    }
                    drop(entries);
                    sender.send_replace(Some(result.clone()));
                    return result;
                }
                Err(Role::Waiter(mut receiver)) => {
                    tracing::debug!(key, "waiting for request in flight");
                    let outcome = receiver
                        .wait_for(Option::is_some)
                        .await
                        .map(|outcome| Option::clone(&outcome));
                    match outcome {
                        Ok(Some(result)) => return result,
                        // The leader was dropped before completing. Retry.
                        _ => self.remove_stale(key, &receiver).await,
                    }
                }
            }
        }
    }
}
