// (c) Copyright 2025 Helsing GmbH. All rights reserved.
use super::{AddOutcome, CollectionAdapter, RemoveOutcome, retire_if_nonempty};
use crate::{
    CollectionRandomState,
    dispatch::Retired,
    error::{Error, Result},
    notification::PropertyName,
};
use std::{
    collections::HashMap,
    fmt,
    hash::{BuildHasher, Hash},
};

/// Adapter over a `HashMap`. Items are `(key, value)` pairs.
///
/// Key equality is defined by `K: Eq` together with the hasher `S`; supply a custom
/// [`BuildHasher`] with [`DictionaryAdapter::with_hasher`] to change how keys are hashed.
///
/// A hash map has no stable positions, so every add and remove is unpositioned.
pub struct DictionaryAdapter<K, V, S = CollectionRandomState> {
    map: HashMap<K, V, S>,
}

impl<K, V> DictionaryAdapter<K, V> {
    pub fn new() -> Self {
        Self {
            map: crate::create_map(),
        }
    }
}

impl<K, V, S> DictionaryAdapter<K, V, S> {
    pub fn with_hasher(hasher: S) -> Self {
        Self {
            map: HashMap::with_hasher(hasher),
        }
    }

    pub fn iter(&self) -> std::collections::hash_map::Iter<'_, K, V> {
        self.map.iter()
    }
}

impl<K, V, S> DictionaryAdapter<K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher,
{
    pub fn get(&self, key: &K) -> Option<&V> {
        self.map.get(key)
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.map.contains_key(key)
    }

    /// Inserts a new entry, failing with [`Error::DuplicateKey`] if `key` is present.
    pub fn try_insert(&mut self, key: K, value: V) -> Result<()> {
        if self.map.contains_key(&key) {
            return Err(Error::DuplicateKey);
        }
        self.map.insert(key, value);
        Ok(())
    }

    /// Inserts or overwrites, returning the previous value.
    pub fn set(&mut self, key: K, value: V) -> Option<V> {
        self.map.insert(key, value)
    }

    pub fn remove_key(&mut self, key: &K) -> Option<V> {
        self.map.remove(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.map.keys()
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.map.values()
    }
}

impl<K, V> Default for DictionaryAdapter<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> FromIterator<(K, V)> for DictionaryAdapter<K, V>
where
    K: Hash + Eq,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut adapter = Self::new();
        adapter.map.extend(iter);
        adapter
    }
}

impl<K, V, S> fmt::Debug for DictionaryAdapter<K, V, S>
where
    K: fmt::Debug,
    V: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.map.iter()).finish()
    }
}

impl<K, V, S> CollectionAdapter for DictionaryAdapter<K, V, S>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Clone + PartialEq + Send + Sync + 'static,
    S: BuildHasher + Clone + Send + 'static,
{
    type Item = (K, V);

    const PROPERTIES: &'static [PropertyName] = &[
        PropertyName::Count,
        PropertyName::Items,
        PropertyName::Keys,
        PropertyName::Values,
    ];

    fn len(&self) -> Result<usize> {
        Ok(self.map.len())
    }

    fn contains(&self, (key, value): &(K, V)) -> Result<bool> {
        Ok(self.map.get(key) == Some(value))
    }

    fn add(&mut self, (key, value): (K, V)) -> Result<AddOutcome> {
        self.try_insert(key, value)?;
        Ok(AddOutcome::Unpositioned)
    }

    fn remove(&mut self, (key, value): &(K, V)) -> Result<RemoveOutcome> {
        if self.map.get(key) != Some(value) {
            return Ok(RemoveOutcome::NotFound);
        }
        self.map.remove(key);
        Ok(RemoveOutcome::Unpositioned)
    }

    fn clear(&mut self) -> Result<Option<Retired>> {
        let fresh = HashMap::with_hasher(self.map.hasher().clone());
        let is_empty = self.map.is_empty();
        Ok(retire_if_nonempty(&mut self.map, is_empty, fresh))
    }

    fn to_vec(&self) -> Result<Vec<(K, V)>> {
        Ok(self
            .map
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }
}
