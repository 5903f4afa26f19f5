// (c) Copyright 2025 Helsing GmbH. All rights reserved.
//! A filtered view over a concurrent collection.
//!
//! A [`FilterableCollection`] exposes the items of a backing collection for which a predicate
//! holds against the current filter value. While both a predicate and a filter are set, reads
//! are served from a cached projection. The cache is built on first read, under an upgradeable
//! read lock so that concurrent readers wait for one build instead of each building their
//! own. Without a predicate or without a filter, reads go straight to the backing collection.
//!
//! The cache is invalidated on the thread that changed the backing collection, before that
//! change's mutating call returns, so a read following a mutation never sees a stale
//! projection. Invalidation bumps a generation counter rather than taking the cache lock, so
//! mutations of the backing collection never wait for a cache build.
//!
//! Changes of the backing collection are relayed to observers of the view. While a filter is
//! active, they are relayed as `Reset`, since the position of a change within the projection
//! is not known.

use crate::{
    adapters::CollectionAdapter,
    concurrent::ConcurrentObservableCollection,
    error::Result,
    events::{Notifiable, Notifier, SubscriptionId},
    locker::SyncLock,
    notification::PropertyName,
    observable::Collection,
    options::CollectionOptions,
};
use parking_lot::Mutex;
use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

type Predicate<T, F> = Arc<dyn Fn(&T, &F) -> bool + Send + Sync>;

const PROPERTIES: &[PropertyName] = &[PropertyName::Count, PropertyName::Items];

struct FilterState<T, F> {
    predicate: Mutex<Option<Predicate<T, F>>>,
    filter: Mutex<Option<Arc<F>>>,
    // bumped on every invalidation; a cached projection is valid only for the generation it
    // was built in
    generation: AtomicU64,
    cache: SyncLock<Option<(u64, Arc<Vec<T>>)>>,
    notifier: Notifier<T>,
}

impl<T, F> FilterState<T, F>
where
    T: Send + 'static,
{
    fn invalidate(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
    }

    /// The predicate and filter, if filtering is active.
    fn active(&self) -> Option<(Predicate<T, F>, Arc<F>)> {
        let predicate = self.predicate.lock().clone()?;
        let filter = self.filter.lock().clone()?;
        Some((predicate, filter))
    }

    fn is_active(&self) -> bool {
        self.predicate.lock().is_some() && self.filter.lock().is_some()
    }
}

/// A filtered, cached view over a shared [`ConcurrentObservableCollection`].
///
/// ```rust
/// use observable_collections::{
///     CollectionOptions, ConcurrentObservableList, FilterableCollection, prelude::*,
/// };
/// use std::sync::Arc;
///
/// let numbers: Arc<ConcurrentObservableList<u32>> = Arc::new((1..=4).collect());
/// let view = FilterableCollection::with_predicate(
///     Arc::clone(&numbers),
///     |n: &u32, modulus: &u32| n % modulus == 0,
///     CollectionOptions::default(),
/// );
///
/// assert_eq!(view.to_vec()?, vec![1, 2, 3, 4]);
/// view.set_filter(Some(2));
/// assert_eq!(view.to_vec()?, vec![2, 4]);
/// numbers.add(6)?;
/// assert_eq!(view.to_vec()?, vec![2, 4, 6]);
/// # Ok::<_, observable_collections::Error>(())
/// ```
pub struct FilterableCollection<A, F>
where
    A: CollectionAdapter,
{
    backing: Arc<ConcurrentObservableCollection<A>>,
    state: Arc<FilterState<A::Item, F>>,
    subscription: SubscriptionId,
}

impl<A, F> FilterableCollection<A, F>
where
    A: CollectionAdapter,
    F: Send + Sync + 'static,
{
    /// Creates a view without a predicate, which shows every item until
    /// [`set_predicate`](Self::set_predicate) is called.
    pub fn new(
        backing: Arc<ConcurrentObservableCollection<A>>,
        options: CollectionOptions,
    ) -> Self {
        let state = Arc::new(FilterState {
            predicate: Mutex::new(None),
            filter: Mutex::new(None),
            generation: AtomicU64::new(0),
            cache: SyncLock::with_timeout(None, options.lock_timeout),
            notifier: Notifier::new(options.dispatcher()),
        });
        let relay = Arc::downgrade(&state);
        let subscription = backing.notifier().hook(move |change| {
            let Some(state) = relay.upgrade() else {
                return;
            };
            state.invalidate();
            if state.is_active() {
                state.notifier.post_reset(PROPERTIES);
            } else {
                state.notifier.post(change.clone(), PROPERTIES);
            }
        });
        Self {
            backing,
            state,
            subscription,
        }
    }

    pub fn with_predicate(
        backing: Arc<ConcurrentObservableCollection<A>>,
        predicate: impl Fn(&A::Item, &F) -> bool + Send + Sync + 'static,
        options: CollectionOptions,
    ) -> Self {
        let view = Self::new(backing, options);
        *view.state.predicate.lock() = Some(Arc::new(predicate));
        view
    }

    pub fn backing(&self) -> &Arc<ConcurrentObservableCollection<A>> {
        &self.backing
    }

    /// Replaces the predicate, invalidating the cache and posting `Reset`.
    pub fn set_predicate(
        &self,
        predicate: impl Fn(&A::Item, &F) -> bool + Send + Sync + 'static,
    ) {
        *self.state.predicate.lock() = Some(Arc::new(predicate));
        self.state.invalidate();
        tracing::debug!("filter predicate replaced");
        self.state.notifier.post_reset(PROPERTIES);
    }

    /// Sets the filter value, or clears it with `None`.
    ///
    /// Invalidates the cache and posts `Reset` along with a [`PropertyName::Filter`] signal.
    pub fn set_filter(&self, filter: Option<F>) {
        *self.state.filter.lock() = filter.map(Arc::new);
        self.state.invalidate();
        tracing::debug!(active = self.state.is_active(), "filter changed");
        self.state.notifier.post_reset(&[
            PropertyName::Count,
            PropertyName::Items,
            PropertyName::Filter,
        ]);
    }

    pub fn filter(&self) -> Option<Arc<F>> {
        self.state.filter.lock().clone()
    }

    pub fn is_filtering(&self) -> bool {
        self.state.is_active()
    }

    /// The cached projection, rebuilding it if needed. `None` when no filter is active.
    fn projection(&self) -> Result<Option<Arc<Vec<A::Item>>>> {
        if !self.state.is_active() {
            return Ok(None);
        }
        let token = self.state.cache.upgradeable_read()?;
        if let Some((built, items)) = &*token {
            if *built == self.state.generation.load(Ordering::Acquire) {
                return Ok(Some(Arc::clone(items)));
            }
        }
        let mut token = token.upgrade()?;

        // load the generation before the filter: a filter change racing with the build then
        // leaves the result already stale
        let generation = self.state.generation.load(Ordering::Acquire);
        let Some((predicate, filter)) = self.state.active() else {
            return Ok(None);
        };
        let items: Vec<_> = self
            .backing
            .iter()?
            .filter(|item| predicate(item, &filter))
            .collect();
        tracing::debug!(items = items.len(), generation, "rebuilt filter cache");
        let items = Arc::new(items);
        *token = Some((generation, Arc::clone(&items)));
        Ok(Some(items))
    }

    pub fn count(&self) -> Result<usize> {
        match self.projection()? {
            Some(items) => Ok(items.len()),
            None => self.backing.count(),
        }
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.count()? == 0)
    }

    pub fn contains(&self, item: &A::Item) -> Result<bool> {
        match self.projection()? {
            Some(items) => Ok(items.contains(item)),
            None => self.backing.contains(item),
        }
    }

    pub fn to_vec(&self) -> Result<Vec<A::Item>> {
        match self.projection()? {
            Some(items) => Ok(items.as_ref().clone()),
            None => self.backing.to_vec(),
        }
    }

    /// Iterates over a snapshot of the visible items.
    pub fn iter(&self) -> Result<std::vec::IntoIter<A::Item>> {
        Ok(self.to_vec()?.into_iter())
    }

    /// Adds to the backing collection. The item is visible only if it passes the filter.
    pub fn add(&self, item: A::Item) -> Result<()> {
        self.backing.add(item)
    }

    pub fn remove(&self, item: &A::Item) -> Result<bool> {
        self.backing.remove(item)
    }

    /// Clears the backing collection, not just the visible items.
    pub fn clear(&self) -> Result<()> {
        self.backing.clear()
    }
}

impl<A, F> Notifiable for FilterableCollection<A, F>
where
    A: CollectionAdapter,
{
    type Item = A::Item;

    fn notifier(&self) -> &Notifier<A::Item> {
        &self.state.notifier
    }
}

impl<A, F> Drop for FilterableCollection<A, F>
where
    A: CollectionAdapter,
{
    fn drop(&mut self) {
        self.backing.notifier().unsubscribe(self.subscription);
    }
}

impl<A, F> fmt::Debug for FilterableCollection<A, F>
where
    A: CollectionAdapter,
    F: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterableCollection")
            .field("backing", &self.backing)
            .field("filter", &*self.state.filter.lock())
            .field("generation", &self.state.generation.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ConcurrentObservableList, ListAdapter, ListLike, MasterSlaveList,
        notification::{ChangeKind, CollectionChange},
        observable::tests::{Recorder, queued_options},
    };

    fn even(n: &u32, divisor: &u32) -> bool {
        n % divisor == 0
    }

    fn numbers(items: Vec<u32>, options: &CollectionOptions) -> Arc<ConcurrentObservableList<u32>> {
        let adapter = ListAdapter::from(items);
        Arc::new(ConcurrentObservableList::from_adapter(adapter, options.clone()))
    }

    #[test]
    fn cache_follows_the_backing_collection() {
        let (_queue, options) = queued_options();
        let backing = numbers(vec![1, 2, 3, 4], &options);
        let view = FilterableCollection::with_predicate(Arc::clone(&backing), even, options);

        assert_eq!(view.to_vec().unwrap(), vec![1, 2, 3, 4]);
        view.set_filter(Some(2));
        assert_eq!(view.to_vec().unwrap(), vec![2, 4]);
        assert_eq!(view.count().unwrap(), 2);

        backing.add(6).unwrap();
        assert_eq!(view.iter().unwrap().collect::<Vec<_>>(), vec![2, 4, 6]);
        view.add(7).unwrap();
        assert!(!view.contains(&7).unwrap());
        assert!(backing.contains(&7).unwrap());

        view.set_filter(None);
        assert_eq!(view.count().unwrap(), 6);
    }

    #[test]
    fn cached_projection_is_reused_until_invalidated() {
        let (_queue, options) = queued_options();
        let backing = numbers(vec![2, 4], &options);
        let view = FilterableCollection::with_predicate(Arc::clone(&backing), even, options);
        view.set_filter(Some(2));

        let first = view.projection().unwrap().unwrap();
        let second = view.projection().unwrap().unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        backing.remove_at(0).unwrap();
        let third = view.projection().unwrap().unwrap();
        assert!(!Arc::ptr_eq(&first, &third));
        assert_eq!(*third, vec![4]);
    }

    #[test]
    fn active_filter_collapses_changes_into_resets() {
        let (queue, options) = queued_options();
        let backing = numbers(vec![], &options);
        let view = FilterableCollection::new(Arc::clone(&backing), options);
        let recorder = Recorder::attach(&view);

        backing.add(1).unwrap();
        queue.run_pending();
        assert_eq!(recorder.take_changes(), vec![CollectionChange::added(1, Some(0))]);

        view.set_predicate(even);
        view.set_filter(Some(2));
        queue.run_pending();
        assert_eq!(recorder.kinds(), vec![ChangeKind::Reset, ChangeKind::Reset]);
        assert!(recorder.properties.lock().contains(&PropertyName::Filter));
        recorder.take_changes();

        backing.add(2).unwrap();
        backing.set(0, 8).unwrap();
        queue.run_pending();
        assert_eq!(recorder.kinds(), vec![ChangeKind::Reset, ChangeKind::Reset]);
        assert_eq!(view.to_vec().unwrap(), vec![8, 2]);
    }

    #[test]
    fn slave_changes_invalidate_a_filtered_composite() {
        let (_queue, options) = queued_options();
        let master = numbers(vec![2], &options);
        let slave = numbers(vec![3, 4], &options);
        let composite = Arc::new(MasterSlaveList::with_options(options.clone()));
        composite.set_master(master).unwrap();
        composite.set_slave(Arc::clone(&slave)).unwrap();

        let view = FilterableCollection::with_predicate(Arc::clone(&composite), even, options);
        view.set_filter(Some(2));
        assert_eq!(view.to_vec().unwrap(), vec![2, 4]);

        slave.add(10).unwrap();
        assert_eq!(view.to_vec().unwrap(), vec![2, 4, 10]);
    }

    #[test]
    fn dropping_the_view_unsubscribes() {
        let backing = numbers(vec![], &CollectionOptions::default());
        let view: FilterableCollection<_, u32> =
            FilterableCollection::new(Arc::clone(&backing), CollectionOptions::default());
        assert_eq!(backing.notifier().hooks().len(), 1);
        drop(view);
        assert!(backing.notifier().hooks().is_empty());
    }
}
