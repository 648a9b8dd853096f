//! Keyed query cache with per-key fetch deduplication.
//!
//! Each query key owns a slot holding the last good value, the time it was
//! fetched, the policy it was read with and at most one in-flight fetch. The
//! check for an existing fetch and the registration of a new one happen under
//! the same lock, so a burst of readers still produces one backend call.
//!
//! Fetches run on their own task. A reader that gives up does not cancel the
//! fetch; it still settles into the cache for everyone else.
//!
//! Author: kelexine (<https://github.com/kelexine>)

use super::invalidation::{Mutation, PushEvent};
use super::key::{QueryKey, Resource};
use super::models::{CacheStats, EntryState};
use super::policy::QueryPolicy;
use crate::auth::{AuthGate, SessionContext};
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, warn};

/// A fetch task ended without producing a result (it panicked or was aborted).
#[derive(Debug, Clone, Error)]
#[error("fetch for {key} ended without a result")]
pub struct FetchAborted {
    pub key: String,
}

type Fetcher<V, E> = Arc<dyn Fn() -> BoxFuture<'static, Result<V, E>> + Send + Sync>;
type SharedFetch<V, E> = Shared<BoxFuture<'static, Result<V, E>>>;

struct Entry<V> {
    value: V,
    fetched_at: Instant,
    invalidated: bool,
}

struct InFlight<V, E> {
    id: u64,
    /// Slot epoch when the fetch started. A later invalidation supersedes it.
    epoch: u64,
    future: SharedFetch<V, E>,
}

struct Slot<V, E> {
    entry: Option<Entry<V>>,
    in_flight: Option<InFlight<V, E>>,
    policy: QueryPolicy,
    fetcher: Option<Fetcher<V, E>>,
    /// Bumped on every invalidation; a fetch started under an older epoch
    /// settles as already stale.
    epoch: u64,
}

impl<V, E> Slot<V, E> {
    fn new(policy: QueryPolicy) -> Self {
        Self {
            entry: None,
            in_flight: None,
            policy,
            fetcher: None,
            epoch: 0,
        }
    }

    /// State of the stored value alone, ignoring any fetch in flight.
    fn entry_state(&self, now: Instant) -> EntryState {
        match &self.entry {
            None => EntryState::Empty,
            Some(entry) => {
                let age = now.saturating_duration_since(entry.fetched_at);
                if age >= self.policy.gc_time {
                    EntryState::Evicted
                } else if entry.invalidated || age >= self.policy.stale_time {
                    EntryState::Stale
                } else {
                    EntryState::Fresh
                }
            }
        }
    }
}

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    stale_hits: AtomicU64,
    deduplicated: AtomicU64,
    gated: AtomicU64,
    invalidations: AtomicU64,
    evictions: AtomicU64,
}

impl Counters {
    fn bump(&self, counter: &AtomicU64, operation: &str) {
        counter.fetch_add(1, Ordering::Relaxed);
        crate::metrics::record_cache_operation(operation);
    }
}

struct Inner<V, E> {
    slots: Mutex<HashMap<QueryKey, Slot<V, E>>>,
    next_fetch_id: AtomicU64,
    counters: Counters,
}

/// Clears a fetch's in-flight marker if its task dies before settling.
struct SettleGuard<V, E> {
    inner: Arc<Inner<V, E>>,
    key: QueryKey,
    id: u64,
}

impl<V, E> Drop for SettleGuard<V, E> {
    fn drop(&mut self) {
        let mut slots = self.inner.slots.lock();
        if let Some(slot) = slots.get_mut(&self.key) {
            if slot.in_flight.as_ref().map(|f| f.id) == Some(self.id) {
                warn!("Fetch for {} ended without settling", self.key);
                slot.in_flight = None;
            }
        }
    }
}

/// Client-side cache of server data.
///
/// Cheap to clone; clones share the same store.
pub struct QueryCache<V, E> {
    inner: Arc<Inner<V, E>>,
}

impl<V, E> Clone for QueryCache<V, E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V, E> Default for QueryCache<V, E>
where
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + From<FetchAborted> + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<V, E> QueryCache<V, E>
where
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + From<FetchAborted> + 'static,
{
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                slots: Mutex::new(HashMap::new()),
                next_fetch_id: AtomicU64::new(1),
                counters: Counters::default(),
            }),
        }
    }

    /// Read path.
    ///
    /// Returns `Ok(None)` without fetching when the policy needs a credential
    /// the session does not have. Otherwise serves a fresh value, or joins or
    /// starts the single fetch for `key`. Fetch errors are returned unchanged
    /// and never cached; a previous value stays in place.
    pub async fn get<F, Fut>(
        &self,
        key: QueryKey,
        policy: &QueryPolicy,
        session: &SessionContext,
        fetcher: F,
    ) -> Result<Option<V>, E>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
    {
        let counters = &self.inner.counters;
        if !AuthGate::check_session(policy.access, session).is_allowed() {
            debug!("Skipping {}: session cannot pass the Auth Gate", key);
            counters.bump(&counters.gated, "gated");
            return Ok(None);
        }

        let fetcher: Fetcher<V, E> = Arc::new(move || fetcher().boxed());

        let pending = {
            let mut slots = self.inner.slots.lock();
            let slot = slots
                .entry(key.clone())
                .or_insert_with(|| Slot::new(policy.clone()));
            slot.policy = policy.clone();
            slot.fetcher = Some(fetcher);

            match slot.entry_state(Instant::now()) {
                EntryState::Fresh => {
                    counters.bump(&counters.hits, "hit");
                    return Ok(slot.entry.as_ref().map(|e| e.value.clone()));
                }
                EntryState::Stale
                    if policy.background_refresh
                        && slot.entry.as_ref().is_some_and(|e| !e.invalidated) =>
                {
                    counters.bump(&counters.stale_hits, "stale");
                    let value = slot.entry.as_ref().map(|e| e.value.clone());
                    self.ensure_fetch(&key, slot);
                    return Ok(value);
                }
                EntryState::Evicted => {
                    debug!("Evicting {} on read", key);
                    slot.entry = None;
                    counters.bump(&counters.evictions, "evict");
                    self.ensure_fetch(&key, slot)
                }
                _ => self.ensure_fetch(&key, slot),
            }
        };

        pending.await.map(Some)
    }

    /// Joins the slot's in-flight fetch, or starts one. Caller holds the lock.
    fn ensure_fetch(&self, key: &QueryKey, slot: &mut Slot<V, E>) -> SharedFetch<V, E> {
        let counters = &self.inner.counters;
        if let Some(in_flight) = &slot.in_flight {
            if in_flight.epoch == slot.epoch {
                counters.bump(&counters.deduplicated, "dedup");
                return in_flight.future.clone();
            }
            // Started before an invalidation; its result must not reach this reader
            debug!("Superseding fetch #{} for {}", in_flight.id, key);
        }
        counters.bump(&counters.misses, "miss");

        let id = self.inner.next_fetch_id.fetch_add(1, Ordering::Relaxed);
        let started_epoch = slot.epoch;
        let fetcher = match &slot.fetcher {
            Some(fetcher) => Arc::clone(fetcher),
            None => {
                let aborted = FetchAborted {
                    key: key.to_string(),
                };
                return futures::future::ready(Err(E::from(aborted))).boxed().shared();
            }
        };

        debug!("Starting fetch #{} for {}", id, key);
        let guard = SettleGuard {
            inner: Arc::clone(&self.inner),
            key: key.clone(),
            id,
        };
        let handle = tokio::spawn(async move {
            let result = fetcher().await;
            settle(&guard.inner, &guard.key, id, started_epoch, &result);
            drop(guard);
            result
        });

        let key_label = key.to_string();
        let future = async move {
            match handle.await {
                Ok(result) => result,
                Err(join_error) => {
                    warn!("Fetch task for {} failed: {}", key_label, join_error);
                    Err(E::from(FetchAborted { key: key_label }))
                }
            }
        }
        .boxed()
        .shared();

        slot.in_flight = Some(InFlight {
            id,
            epoch: started_epoch,
            future: future.clone(),
        });
        future
    }

    /// Write path with an explicit invalidation set. On success every listed
    /// resource is marked stale; on failure nothing changes.
    pub async fn mutate_with<T, ME, Fut>(
        &self,
        invalidates: &[Resource],
        operation: Fut,
    ) -> Result<T, ME>
    where
        Fut: Future<Output = Result<T, ME>>,
    {
        let result = operation.await;
        if result.is_ok() {
            self.invalidate_resources(invalidates);
        }
        result
    }

    /// Write path driven by the invalidation graph.
    pub async fn mutate<T, ME, Fut>(&self, mutation: Mutation, operation: Fut) -> Result<T, ME>
    where
        Fut: Future<Output = Result<T, ME>>,
    {
        let result = self.mutate_with(mutation.invalidates(), operation).await;
        if result.is_ok() {
            debug!("Mutation {} succeeded", mutation.as_str());
        }
        result
    }

    /// Marks every key of the given resources stale. Never refetches.
    /// Returns how many keys were touched.
    pub fn invalidate_resources(&self, resources: &[Resource]) -> usize {
        if resources.is_empty() {
            return 0;
        }
        let mut slots = self.inner.slots.lock();
        let mut touched = 0;
        for (key, slot) in slots.iter_mut() {
            if resources.contains(&key.resource) {
                mark_stale(slot);
                touched += 1;
            }
        }
        drop(slots);

        let counters = &self.inner.counters;
        for _ in 0..touched {
            counters.bump(&counters.invalidations, "invalidate");
        }
        debug!("Invalidated {} keys across {:?}", touched, resources);
        touched
    }

    /// Marks one exact key stale.
    pub fn invalidate(&self, key: &QueryKey) -> bool {
        let mut slots = self.inner.slots.lock();
        let Some(slot) = slots.get_mut(key) else {
            return false;
        };
        mark_stale(slot);
        drop(slots);

        let counters = &self.inner.counters;
        counters.bump(&counters.invalidations, "invalidate");
        true
    }

    /// Push channel hook.
    pub fn handle_push(&self, event: &PushEvent) -> usize {
        debug!("Push event {:?}", event);
        self.invalidate_resources(event.invalidates())
    }

    /// Refocus hook: starts a background refresh for every stale entry whose
    /// policy asks for it. Returns how many fetches were started.
    pub fn on_focus(&self) -> usize {
        let now = Instant::now();
        let mut slots = self.inner.slots.lock();
        let mut started = 0;
        for (key, slot) in slots.iter_mut() {
            if slot.policy.refetch_on_focus
                && slot.in_flight.is_none()
                && slot.fetcher.is_some()
                && slot.entry_state(now) == EntryState::Stale
            {
                self.ensure_fetch(key, slot);
                started += 1;
            }
        }
        started
    }

    /// Drops evicted values and forgets keys with nothing left in them.
    pub fn collect_garbage(&self) -> usize {
        let now = Instant::now();
        let mut slots = self.inner.slots.lock();
        let mut evicted = 0;
        for slot in slots.values_mut() {
            if slot.entry_state(now) == EntryState::Evicted {
                slot.entry = None;
                evicted += 1;
            }
        }
        slots.retain(|_, slot| slot.entry.is_some() || slot.in_flight.is_some());
        drop(slots);

        let counters = &self.inner.counters;
        for _ in 0..evicted {
            counters.bump(&counters.evictions, "evict");
        }
        crate::metrics::update_cache_entries(self.len());
        evicted
    }

    /// Current state of `key`. A fetch in flight reports `Fetching`.
    pub fn state_of(&self, key: &QueryKey) -> EntryState {
        let slots = self.inner.slots.lock();
        match slots.get(key) {
            None => EntryState::Empty,
            Some(slot) if slot.in_flight.is_some() => EntryState::Fetching,
            Some(slot) => slot.entry_state(Instant::now()),
        }
    }

    /// Stored value if it has not been evicted. Never fetches.
    pub fn peek(&self, key: &QueryKey) -> Option<V> {
        let slots = self.inner.slots.lock();
        let slot = slots.get(key)?;
        match slot.entry_state(Instant::now()) {
            EntryState::Fresh | EntryState::Stale => slot.entry.as_ref().map(|e| e.value.clone()),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.inner.slots.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forgets everything, e.g. on logout. Fetches in flight still finish
    /// but their results are discarded.
    pub fn clear(&self) {
        self.inner.slots.lock().clear();
    }

    pub fn stats(&self) -> CacheStats {
        let c = &self.inner.counters;
        CacheStats {
            hits: c.hits.load(Ordering::Relaxed),
            misses: c.misses.load(Ordering::Relaxed),
            stale_hits: c.stale_hits.load(Ordering::Relaxed),
            deduplicated: c.deduplicated.load(Ordering::Relaxed),
            gated: c.gated.load(Ordering::Relaxed),
            invalidations: c.invalidations.load(Ordering::Relaxed),
            evictions: c.evictions.load(Ordering::Relaxed),
        }
    }
}

fn mark_stale<V, E>(slot: &mut Slot<V, E>) {
    slot.epoch += 1;
    if let Some(entry) = slot.entry.as_mut() {
        entry.invalidated = true;
    }
}

/// Stores a fetch's result and releases its in-flight marker. Failures leave
/// the previous value untouched.
fn settle<V: Clone, E>(
    inner: &Inner<V, E>,
    key: &QueryKey,
    id: u64,
    started_epoch: u64,
    result: &Result<V, E>,
) {
    let mut slots = inner.slots.lock();
    let Some(slot) = slots.get_mut(key) else {
        return;
    };
    if slot.in_flight.as_ref().map(|f| f.id) != Some(id) {
        return;
    }
    slot.in_flight = None;

    match result {
        Ok(value) => {
            slot.entry = Some(Entry {
                value: value.clone(),
                fetched_at: Instant::now(),
                invalidated: slot.epoch != started_epoch,
            });
            debug!("Fetch #{} for {} settled", id, key);
        }
        Err(_) => debug!("Fetch #{} for {} failed; keeping previous value", id, key),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GatewayError;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;
    use tokio::sync::Semaphore;

    type Cache = QueryCache<u32, GatewayError>;

    fn policy() -> QueryPolicy {
        QueryPolicy::for_resource(Resource::PurchasedPlans)
    }

    fn session() -> SessionContext {
        SessionContext::with_token("tok")
    }

    fn key() -> QueryKey {
        QueryKey::new(Resource::PurchasedPlans)
    }

    /// Fetcher returning 1, 2, 3, ... and counting its calls.
    fn counting(
        calls: Arc<AtomicUsize>,
    ) -> impl Fn() -> BoxFuture<'static, Result<u32, GatewayError>> + Send + Sync + 'static {
        move || {
            let n = calls.fetch_add(1, Ordering::SeqCst) as u32 + 1;
            async move { Ok(n) }.boxed()
        }
    }

    #[tokio::test]
    async fn test_fresh_entry_is_served_without_fetching() {
        let cache = Cache::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let first = cache.get(key(), &policy(), &session(), counting(calls.clone())).await;
        let second = cache.get(key(), &policy(), &session(), counting(calls.clone())).await;

        assert_eq!(first.unwrap(), Some(1));
        assert_eq!(second.unwrap(), Some(1));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.state_of(&key()), EntryState::Fresh);
        assert_eq!(cache.stats().hits, 1);
    }

    #[tokio::test]
    async fn test_concurrent_reads_share_one_fetch() {
        let cache = Cache::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let gate = Arc::new(Semaphore::new(0));
        let (p, s) = (policy(), session());

        let readers = (0..8).map(|_| {
            let calls = calls.clone();
            let gate = gate.clone();
            cache.get(key(), &p, &s, move || {
                let calls = calls.clone();
                let gate = gate.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    let _permit = gate.acquire().await.expect("semaphore open");
                    Ok(42)
                }
            })
        });

        let (results, _) = tokio::join!(futures::future::join_all(readers), async {
            tokio::task::yield_now().await;
            gate.add_permits(8);
        });

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(results.iter().all(|r| r == &Ok(Some(42))));
        assert_eq!(cache.stats().deduplicated, 7);
    }

    #[tokio::test]
    async fn test_failure_is_not_cached() {
        let cache = Cache::new();
        let err = cache
            .get(key(), &policy(), &session(), || async {
                Err(GatewayError::Upstream {
                    status: 503,
                    message: "down".into(),
                })
            })
            .await
            .unwrap_err();

        assert_eq!(err.status_code(), 503);
        assert_eq!(cache.state_of(&key()), EntryState::Empty);

        let ok = cache.get(key(), &policy(), &session(), || async { Ok(7) }).await;
        assert_eq!(ok.unwrap(), Some(7));
    }

    #[tokio::test]
    async fn test_failed_refetch_keeps_previous_value() {
        let cache = Cache::new();
        cache
            .get(key(), &policy(), &session(), || async { Ok(1) })
            .await
            .unwrap();
        cache.invalidate(&key());

        let result = cache
            .get(key(), &policy(), &session(), || async {
                Err(GatewayError::transport("refused"))
            })
            .await;

        assert!(result.is_err());
        assert_eq!(cache.peek(&key()), Some(1));
        assert_eq!(cache.state_of(&key()), EntryState::Stale);
    }

    #[tokio::test(start_paused = true)]
    async fn test_evicted_entry_is_never_returned() {
        let cache = Cache::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let p = policy();

        cache.get(key(), &p, &session(), counting(calls.clone())).await.unwrap();
        tokio::time::advance(p.gc_time + Duration::from_secs(1)).await;

        assert_eq!(cache.state_of(&key()), EntryState::Evicted);
        assert_eq!(cache.peek(&key()), None);

        let value = cache.get(key(), &p, &session(), counting(calls.clone())).await;
        assert_eq!(value.unwrap(), Some(2));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_entry_with_background_refresh_is_served_immediately() {
        let cache = Cache::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let p = QueryPolicy::for_resource(Resource::ActiveSubscription);
        assert!(p.background_refresh);
        let k = QueryKey::new(Resource::ActiveSubscription);

        cache.get(k.clone(), &p, &session(), counting(calls.clone())).await.unwrap();
        tokio::time::advance(p.stale_time + Duration::from_secs(1)).await;

        let stale = cache.get(k.clone(), &p, &session(), counting(calls.clone())).await;
        assert_eq!(stale.unwrap(), Some(1));

        // let the background refresh settle
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.peek(&k), Some(2));
        assert_eq!(cache.stats().stale_hits, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_entry_without_background_refresh_blocks() {
        let cache = Cache::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let p = policy();
        assert!(!p.background_refresh);

        cache.get(key(), &p, &session(), counting(calls.clone())).await.unwrap();
        tokio::time::advance(p.stale_time + Duration::from_secs(1)).await;

        let value = cache.get(key(), &p, &session(), counting(calls.clone())).await;
        assert_eq!(value.unwrap(), Some(2));
    }

    #[tokio::test]
    async fn test_mutation_invalidates_dependents_despite_freshness() {
        let cache = Cache::new();
        let plans_calls = Arc::new(AtomicUsize::new(0));
        let sub_calls = Arc::new(AtomicUsize::new(0));
        let sub_key = QueryKey::new(Resource::ActiveSubscription);
        let sub_policy = QueryPolicy::for_resource(Resource::ActiveSubscription);

        cache.get(key(), &policy(), &session(), counting(plans_calls.clone())).await.unwrap();
        cache
            .get(sub_key.clone(), &sub_policy, &session(), counting(sub_calls.clone()))
            .await
            .unwrap();

        let result: Result<&str, GatewayError> = cache
            .mutate(Mutation::ActivatePurchasedPlan, async { Ok("activated") })
            .await;
        assert_eq!(result.unwrap(), "activated");
        assert_eq!(cache.state_of(&key()), EntryState::Stale);
        assert_eq!(plans_calls.load(Ordering::SeqCst), 1, "invalidation must not refetch");

        let plans = cache.get(key(), &policy(), &session(), counting(plans_calls.clone())).await;
        let sub = cache
            .get(sub_key, &sub_policy, &session(), counting(sub_calls.clone()))
            .await;
        assert_eq!(plans.unwrap(), Some(2));
        assert_eq!(sub.unwrap(), Some(2));
    }

    #[tokio::test]
    async fn test_failed_mutation_leaves_cache_untouched() {
        let cache = Cache::new();
        cache.get(key(), &policy(), &session(), || async { Ok(1) }).await.unwrap();

        let result: Result<(), GatewayError> = cache
            .mutate(Mutation::ActivatePurchasedPlan, async {
                Err(GatewayError::Upstream {
                    status: 409,
                    message: "already active".into(),
                })
            })
            .await;

        assert_eq!(result.unwrap_err().status_code(), 409);
        assert_eq!(cache.state_of(&key()), EntryState::Fresh);
        assert_eq!(cache.stats().invalidations, 0);
    }

    #[tokio::test]
    async fn test_anonymous_session_never_fetches_protected_keys() {
        let cache = Cache::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let result = cache
            .get(key(), &policy(), &SessionContext::anonymous(), counting(calls.clone()))
            .await;

        assert_eq!(result.unwrap(), None);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(cache.state_of(&key()), EntryState::Empty);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_abandoned_reader_does_not_cancel_shared_fetch() {
        let cache = Cache::new();
        let gate = Arc::new(Semaphore::new(0));
        let fetch_gate = gate.clone();

        let abandoned = tokio::time::timeout(
            Duration::from_millis(10),
            cache.get(key(), &policy(), &session(), move || {
                let gate = fetch_gate.clone();
                async move {
                    let _permit = gate.acquire().await.expect("semaphore open");
                    Ok(9)
                }
            }),
        )
        .await;
        assert!(abandoned.is_err());
        assert_eq!(cache.state_of(&key()), EntryState::Fetching);

        gate.add_permits(1);
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert_eq!(cache.state_of(&key()), EntryState::Fresh);
        assert_eq!(cache.peek(&key()), Some(9));
    }

    #[tokio::test]
    async fn test_invalidation_during_fetch_settles_stale() {
        let cache = Cache::new();
        let gate = Arc::new(Semaphore::new(0));
        let fetch_gate = gate.clone();
        let (p, s) = (policy(), session());

        let reader = cache.get(key(), &p, &s, move || {
            let gate = fetch_gate.clone();
            async move {
                let _permit = gate.acquire().await.expect("semaphore open");
                Ok(5)
            }
        });

        let (value, _) = tokio::join!(reader, async {
            tokio::task::yield_now().await;
            cache.invalidate_resources(&[Resource::PurchasedPlans]);
            gate.add_permits(1);
        });

        assert_eq!(value.unwrap(), Some(5));
        assert_eq!(cache.state_of(&key()), EntryState::Stale);
    }

    #[tokio::test]
    async fn test_read_after_mutation_skips_fetch_started_before_it() {
        let cache = Cache::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let gate = Arc::new(Semaphore::new(0));
        let (p, s) = (policy(), session());

        let fetch_calls = calls.clone();
        let fetch_gate = gate.clone();
        let fetcher = move || {
            let n = fetch_calls.fetch_add(1, Ordering::SeqCst) as u32 + 1;
            let gate = fetch_gate.clone();
            async move {
                // Only the first fetch is held back
                if n == 1 {
                    let _permit = gate.acquire().await.expect("semaphore open");
                }
                Ok(n)
            }
        };

        let before = cache.get(key(), &p, &s, fetcher.clone());
        let (first, second) = tokio::join!(before, async {
            tokio::task::yield_now().await;
            let activated: Result<&str, GatewayError> = cache
                .mutate(Mutation::ActivatePurchasedPlan, async { Ok("activated") })
                .await;
            assert!(activated.is_ok());
            let after = cache.get(key(), &p, &s, fetcher.clone()).await;
            gate.add_permits(1);
            after
        });

        assert_eq!(first.unwrap(), Some(1));
        assert_eq!(second.unwrap(), Some(2));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        // The superseded fetch settled after the fresh one and was discarded
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert_eq!(cache.peek(&key()), Some(2));
        assert_eq!(cache.state_of(&key()), EntryState::Fresh);
    }

    #[tokio::test]
    async fn test_focus_refetches_only_opted_in_stale_entries() {
        let cache = Cache::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let sub_key = QueryKey::new(Resource::ActiveSubscription);
        let sub_policy = QueryPolicy::for_resource(Resource::ActiveSubscription);

        cache.get(key(), &policy(), &session(), counting(calls.clone())).await.unwrap();
        cache
            .get(sub_key.clone(), &sub_policy, &session(), counting(calls.clone()))
            .await
            .unwrap();
        cache.handle_push(&PushEvent::SubscriptionChanged);

        // purchasedPlans refetches on focus, activeSubscription does not
        assert_eq!(cache.on_focus(), 1);
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert_eq!(cache.state_of(&key()), EntryState::Fresh);
        assert_eq!(cache.state_of(&sub_key), EntryState::Stale);
    }

    #[tokio::test(start_paused = true)]
    async fn test_collect_garbage_drops_evicted_keys() {
        let cache = Cache::new();
        cache.get(key(), &policy(), &session(), || async { Ok(1) }).await.unwrap();
        tokio::time::advance(policy().gc_time).await;

        assert_eq!(cache.collect_garbage(), 1);
        assert!(cache.is_empty());
    }
}
