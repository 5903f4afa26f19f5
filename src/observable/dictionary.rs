// (c) Copyright 2025 Helsing GmbH. All rights reserved.
use super::{CollectionStorage, properties};
use crate::{adapters::DictionaryAdapter, error::Result, notification::CollectionChange};
use std::hash::{BuildHasher, Hash};

/// Keyed operations. Items of a dictionary are `(key, value)` pairs.
///
/// Entries have no position, so notifications carry no index and removals are reported as
/// `Reset`.
pub trait DictionaryLike<K, V>: CollectionStorage<Item = (K, V)> {
    /// Inserts a new entry. Fails with [`Error::DuplicateKey`](crate::Error::DuplicateKey) if
    /// `key` is already present.
    fn insert(&self, key: K, value: V) -> Result<()>;

    /// Inserts or overwrites, returning the previous value.
    ///
    /// Posts `Add` for a new key and `Replace` for an existing one.
    fn set(&self, key: K, value: V) -> Result<Option<V>>;

    fn get(&self, key: &K) -> Result<Option<V>>;

    fn remove_key(&self, key: &K) -> Result<Option<V>>;

    fn contains_key(&self, key: &K) -> Result<bool>;

    fn keys(&self) -> Result<Vec<K>>;

    fn values(&self) -> Result<Vec<V>>;
}

impl<C, K, V, S> DictionaryLike<K, V> for C
where
    C: CollectionStorage<Item = (K, V), Adapter = DictionaryAdapter<K, V, S>> + ?Sized,
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Clone + PartialEq + Send + Sync + 'static,
    S: BuildHasher + Clone + Send + 'static,
{
    fn insert(&self, key: K, value: V) -> Result<()> {
        self.write(|adapter| adapter.try_insert(key.clone(), value.clone()))?;
        self.notifier().post(
            CollectionChange::added((key, value), None),
            properties::<Self>(),
        );
        Ok(())
    }

    fn set(&self, key: K, value: V) -> Result<Option<V>> {
        let old = self.write(|adapter| Ok(adapter.set(key.clone(), value.clone())))?;
        let change = match &old {
            Some(old) => {
                CollectionChange::replaced((key.clone(), old.clone()), (key, value), None)
            }
            None => CollectionChange::added((key, value), None),
        };
        self.notifier().post(change, properties::<Self>());
        Ok(old)
    }

    fn get(&self, key: &K) -> Result<Option<V>> {
        self.read(|adapter| Ok(adapter.get(key).cloned()))
    }

    fn remove_key(&self, key: &K) -> Result<Option<V>> {
        let removed = self.write(|adapter| Ok(adapter.remove_key(key)))?;
        if removed.is_some() {
            self.notifier().post_reset(properties::<Self>());
        }
        Ok(removed)
    }

    fn contains_key(&self, key: &K) -> Result<bool> {
        self.read(|adapter| Ok(adapter.contains_key(key)))
    }

    fn keys(&self) -> Result<Vec<K>> {
        self.read(|adapter| Ok(adapter.keys().cloned().collect()))
    }

    fn values(&self) -> Result<Vec<V>> {
        self.read(|adapter| Ok(adapter.values().cloned().collect()))
    }
}
