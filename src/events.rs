// (c) Copyright 2025 Helsing GmbH. All rights reserved.
//! Observer registries and the notification pipeline of a collection.
//!
//! Every observable collection owns a [`Notifier`], which bundles three channels:
//!
//! - *collection changed*, carrying [`CollectionChange`]s,
//! - *property changed*, carrying [`PropertyName`]s,
//! - *delivery failed*, carrying a [`DeliveryFailure`] whenever an observer on one of the other
//!   two channels panicked.
//!
//! Notifications are posted through the collection's [`Dispatcher`] and therefore always run
//! after the mutating call has returned (or at least released its locks). Each observer is
//! isolated: one panicking observer neither prevents delivery to the others nor affects the
//! collection.

use crate::{
    dispatch::{Dispatcher, panic_message},
    notification::{CollectionChange, PropertyName, properties_for},
};
use parking_lot::Mutex;
use smallvec::SmallVec;
use std::{
    fmt,
    panic::{AssertUnwindSafe, catch_unwind},
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

/// Identifies one observer registration.
///
/// Identifiers are unique across all channels and collections of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// The channel on which an observer failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    CollectionChanged,
    PropertyChanged,
}

/// Report of an observer that panicked while receiving a notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryFailure {
    pub channel: Channel,
    pub subscription: SubscriptionId,
    /// The panic message, if the payload carried one.
    pub message: String,
}

impl fmt::Display for DeliveryFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "observer {:?} on {:?} failed: {}",
            self.subscription, self.channel, self.message
        )
    }
}

impl std::error::Error for DeliveryFailure {}

type Handler<E> = Arc<dyn Fn(&E) + Send + Sync>;

/// A set of observers for events of type `E`.
pub struct EventRegistry<E> {
    handlers: Mutex<Vec<(SubscriptionId, Handler<E>)>>,
}

impl<E> EventRegistry<E> {
    pub fn new() -> Self {
        Self {
            handlers: Mutex::new(Vec::new()),
        }
    }

    pub fn subscribe(&self, handler: impl Fn(&E) + Send + Sync + 'static) -> SubscriptionId {
        let id = SubscriptionId::next();
        self.handlers.lock().push((id, Arc::new(handler)));
        id
    }

    /// Removes the observer registered as `id`. Returns `false` if there was none.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut handlers = self.handlers.lock();
        let before = handlers.len();
        handlers.retain(|(existing, _)| *existing != id);
        handlers.len() != before
    }

    pub fn len(&self) -> usize {
        self.handlers.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.lock().is_empty()
    }

    fn clear(&self) {
        self.handlers.lock().clear();
    }

    // NOTE: handlers are called on a copy of the list so that they may (un)subscribe.
    fn snapshot(&self) -> SmallVec<[(SubscriptionId, Handler<E>); 4]> {
        self.handlers.lock().iter().cloned().collect()
    }
}

impl<E> Default for EventRegistry<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for EventRegistry<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventRegistry")
            .field("observers", &self.len())
            .finish()
    }
}

struct Channels<T> {
    dispatcher: Dispatcher,
    // run synchronously by `post`, before anything is dispatched
    hooks: EventRegistry<CollectionChange<T>>,
    collection_changed: EventRegistry<CollectionChange<T>>,
    property_changed: EventRegistry<PropertyName>,
    delivery_failed: EventRegistry<DeliveryFailure>,
}

impl<T> Channels<T> {
    fn deliver(&self, change: &CollectionChange<T>, properties: &[PropertyName]) {
        for (id, handler) in self.collection_changed.snapshot() {
            if let Err(panic) = catch_unwind(AssertUnwindSafe(|| handler(change))) {
                self.report(DeliveryFailure {
                    channel: Channel::CollectionChanged,
                    subscription: id,
                    message: panic_message(panic.as_ref()),
                });
            }
        }
        for property in properties {
            for (id, handler) in self.property_changed.snapshot() {
                if let Err(panic) = catch_unwind(AssertUnwindSafe(|| handler(property))) {
                    self.report(DeliveryFailure {
                        channel: Channel::PropertyChanged,
                        subscription: id,
                        message: panic_message(panic.as_ref()),
                    });
                }
            }
        }
    }

    fn report(&self, failure: DeliveryFailure) {
        tracing::warn!(%failure, "notification delivery failed");
        for (id, handler) in self.delivery_failed.snapshot() {
            if catch_unwind(AssertUnwindSafe(|| handler(&failure))).is_err() {
                tracing::error!(subscription = ?id, "delivery-failed observer panicked");
            }
        }
    }
}

/// The notification pipeline of one collection.
///
/// Cloning a `Notifier` yields a handle to the same channels.
pub struct Notifier<T> {
    channels: Arc<Channels<T>>,
}

impl<T> Clone for Notifier<T> {
    fn clone(&self) -> Self {
        Self {
            channels: Arc::clone(&self.channels),
        }
    }
}

impl<T> fmt::Debug for Notifier<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Notifier")
            .field("collection_changed", &self.channels.collection_changed)
            .field("property_changed", &self.channels.property_changed)
            .field("delivery_failed", &self.channels.delivery_failed)
            .finish()
    }
}

impl<T> Notifier<T>
where
    T: Send + 'static,
{
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self {
            channels: Arc::new(Channels {
                dispatcher,
                hooks: EventRegistry::new(),
                collection_changed: EventRegistry::new(),
                property_changed: EventRegistry::new(),
                delivery_failed: EventRegistry::new(),
            }),
        }
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.channels.dispatcher
    }

    pub fn collection_changed(&self) -> &EventRegistry<CollectionChange<T>> {
        &self.channels.collection_changed
    }

    pub fn property_changed(&self) -> &EventRegistry<PropertyName> {
        &self.channels.property_changed
    }

    pub fn delivery_failed(&self) -> &EventRegistry<DeliveryFailure> {
        &self.channels.delivery_failed
    }

    /// Removes the observer registered as `id` from whichever channel holds it.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.channels.collection_changed.unsubscribe(id)
            || self.channels.property_changed.unsubscribe(id)
            || self.channels.delivery_failed.unsubscribe(id)
            || self.channels.hooks.unsubscribe(id)
    }

    /// Registers `hook` to run on the posting thread for every change, before the change is
    /// dispatched to observers.
    ///
    /// Hooks run after the collection's lock has been released but before the mutating call
    /// returns. They must be cheap and must not block.
    pub(crate) fn hook(
        &self,
        hook: impl Fn(&CollectionChange<T>) + Send + Sync + 'static,
    ) -> SubscriptionId {
        self.channels.hooks.subscribe(hook)
    }

    #[cfg(test)]
    pub(crate) fn hooks(&self) -> &EventRegistry<CollectionChange<T>> {
        &self.channels.hooks
    }

    /// Runs the hooks only, without dispatching anything to observers.
    pub(crate) fn run_hooks(&self, change: &CollectionChange<T>) {
        for (_, hook) in self.channels.hooks.snapshot() {
            hook(change);
        }
    }

    /// Posts `change`, followed by the subset of `properties` it affects.
    ///
    /// Returns immediately; delivery happens on the dispatcher's context.
    pub fn post(&self, change: CollectionChange<T>, properties: &[PropertyName]) {
        self.run_hooks(&change);
        if self.channels.collection_changed.is_empty() && self.channels.property_changed.is_empty()
        {
            return;
        }
        let properties = properties_for(&change, properties);
        tracing::trace!(kind = ?change.kind(), ?properties, "posting collection change");
        let channels = Arc::clone(&self.channels);
        self.channels
            .dispatcher
            .post(move || channels.deliver(&change, &properties));
    }

    /// Posts a [`CollectionChange::Reset`].
    pub fn post_reset(&self, properties: &[PropertyName]) {
        self.post(CollectionChange::Reset, properties);
    }

    /// Posts property signals that are not tied to a structural change.
    pub fn post_properties(&self, properties: &[PropertyName]) {
        if self.channels.property_changed.is_empty() {
            return;
        }
        let properties: SmallVec<[PropertyName; 4]> = properties.iter().copied().collect();
        let channels = Arc::clone(&self.channels);
        self.channels.dispatcher.post(move || {
            for property in &properties {
                for (id, handler) in channels.property_changed.snapshot() {
                    if let Err(panic) = catch_unwind(AssertUnwindSafe(|| handler(property))) {
                        channels.report(DeliveryFailure {
                            channel: Channel::PropertyChanged,
                            subscription: id,
                            message: panic_message(panic.as_ref()),
                        });
                    }
                }
            }
        });
    }

    /// Drops every observer on every channel.
    pub(crate) fn clear_subscriptions(&self) {
        self.channels.hooks.clear();
        self.channels.collection_changed.clear();
        self.channels.property_changed.clear();
        self.channels.delivery_failed.clear();
    }
}

/// Types that emit change notifications.
pub trait Notifiable {
    type Item: Send + 'static;

    fn notifier(&self) -> &Notifier<Self::Item>;

    /// Registers `handler` for structural changes.
    fn on_collection_changed(
        &self,
        handler: impl Fn(&CollectionChange<Self::Item>) + Send + Sync + 'static,
    ) -> SubscriptionId {
        self.notifier().collection_changed().subscribe(handler)
    }

    /// Registers `handler` for property signals such as [`PropertyName::Count`].
    fn on_property_changed(
        &self,
        handler: impl Fn(&PropertyName) + Send + Sync + 'static,
    ) -> SubscriptionId {
        self.notifier().property_changed().subscribe(handler)
    }

    /// Registers `handler` for observers that panicked during delivery.
    fn on_delivery_failed(
        &self,
        handler: impl Fn(&DeliveryFailure) + Send + Sync + 'static,
    ) -> SubscriptionId {
        self.notifier().delivery_failed().subscribe(handler)
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.notifier().unsubscribe(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::QueueContext;

    fn queued() -> (Arc<QueueContext>, Notifier<u32>) {
        let queue = QueueContext::new();
        let notifier = Notifier::new(Dispatcher::with_context(queue.clone()));
        (queue, notifier)
    }

    #[test]
    fn change_precedes_its_properties() {
        let (queue, notifier) = queued();
        let log = Arc::new(Mutex::new(Vec::new()));
        let l = Arc::clone(&log);
        notifier
            .collection_changed()
            .subscribe(move |c| l.lock().push(format!("{:?}", c.kind())));
        let l = Arc::clone(&log);
        notifier
            .property_changed()
            .subscribe(move |p| l.lock().push(p.to_string()));

        notifier.post(CollectionChange::added(1, Some(0)), &[
            PropertyName::Count,
            PropertyName::Items,
        ]);
        assert!(log.lock().is_empty());
        queue.run_pending();
        assert_eq!(*log.lock(), vec!["Add", "Count", "Item[]"]);
    }

    #[test]
    fn panicking_observer_is_isolated_and_reported() {
        let (queue, notifier) = queued();
        let failing = notifier
            .collection_changed()
            .subscribe(|_| panic!("observer exploded"));
        let delivered = Arc::new(Mutex::new(0));
        let d = Arc::clone(&delivered);
        notifier
            .collection_changed()
            .subscribe(move |_| *d.lock() += 1);
        let failures = Arc::new(Mutex::new(Vec::new()));
        let f = Arc::clone(&failures);
        notifier
            .delivery_failed()
            .subscribe(move |failure| f.lock().push(failure.clone()));

        notifier.post_reset(&[PropertyName::Count]);
        queue.run_pending();

        assert_eq!(*delivered.lock(), 1);
        assert_eq!(*failures.lock(), vec![DeliveryFailure {
            channel: Channel::CollectionChanged,
            subscription: failing,
            message: "observer exploded".to_string(),
        }]);
    }

    #[test]
    fn unsubscribe_finds_the_right_channel() {
        let (_queue, notifier) = queued();
        let a = notifier.collection_changed().subscribe(|_| {});
        let b = notifier.property_changed().subscribe(|_| {});
        let c = notifier.delivery_failed().subscribe(|_| {});
        assert_ne!(a, b);
        assert!(notifier.unsubscribe(b));
        assert!(!notifier.unsubscribe(b));
        assert!(notifier.unsubscribe(c));
        assert_eq!(notifier.collection_changed().len(), 1);
        assert!(notifier.property_changed().is_empty());
    }

    #[test]
    fn nothing_is_posted_without_observers() {
        let (queue, notifier) = queued();
        notifier.post_reset(&[PropertyName::Count]);
        assert_eq!(queue.pending(), 0);
    }

    #[test]
    fn hooks_run_before_post_returns() {
        let (queue, notifier) = queued();
        let hooked = Arc::new(Mutex::new(Vec::new()));
        let h = Arc::clone(&hooked);
        let id = notifier.hook(move |change| h.lock().push(change.kind()));

        notifier.post_reset(&[PropertyName::Count]);
        assert_eq!(*hooked.lock(), vec![crate::notification::ChangeKind::Reset]);
        assert_eq!(queue.pending(), 0, "hooks are not observers");

        assert!(notifier.unsubscribe(id));
        notifier.post_reset(&[]);
        assert_eq!(hooked.lock().len(), 1);
    }

    #[test]
    fn observers_may_unsubscribe_themselves() {
        let (queue, notifier) = queued();
        let slot: Arc<Mutex<Option<SubscriptionId>>> = Arc::default();
        let calls = Arc::new(Mutex::new(0));
        let (n, s, c) = (notifier.clone(), Arc::clone(&slot), Arc::clone(&calls));
        let id = notifier.collection_changed().subscribe(move |_| {
            *c.lock() += 1;
            if let Some(id) = *s.lock() {
                n.unsubscribe(id);
            }
        });
        *slot.lock() = Some(id);
        notifier.post_reset(&[]);
        notifier.post_reset(&[]);
        queue.run_pending();
        assert_eq!(*calls.lock(), 1);
    }
}
