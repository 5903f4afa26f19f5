// (c) Copyright 2025 Helsing GmbH. All rights reserved.
use super::{
    AddOutcome, CollectionAdapter, RemoveOutcome, SequenceAdapter, check_index,
    check_insert_index, retire_if_nonempty,
};
use crate::{dispatch::Retired, error::Result};

/// Adapter over a `Vec`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListAdapter<T> {
    items: Vec<T>,
}

impl<T> ListAdapter<T> {
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.items
    }
}

impl<T> Default for ListAdapter<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> From<Vec<T>> for ListAdapter<T> {
    fn from(items: Vec<T>) -> Self {
        Self { items }
    }
}

impl<T> FromIterator<T> for ListAdapter<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}

impl<T> CollectionAdapter for ListAdapter<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    type Item = T;

    const SUPPORTS_UNDO: bool = true;

    fn len(&self) -> Result<usize> {
        Ok(self.items.len())
    }

    fn contains(&self, item: &T) -> Result<bool> {
        Ok(self.items.contains(item))
    }

    fn add(&mut self, item: T) -> Result<AddOutcome> {
        self.items.push(item);
        Ok(AddOutcome::At(self.items.len() - 1))
    }

    fn remove(&mut self, item: &T) -> Result<RemoveOutcome> {
        Ok(match self.items.iter().position(|existing| existing == item) {
            Some(index) => {
                self.items.remove(index);
                RemoveOutcome::At(index)
            }
            None => RemoveOutcome::NotFound,
        })
    }

    fn clear(&mut self) -> Result<Option<Retired>> {
        let is_empty = self.items.is_empty();
        Ok(retire_if_nonempty(&mut self.items, is_empty, Vec::new()))
    }

    fn to_vec(&self) -> Result<Vec<T>> {
        Ok(self.items.clone())
    }
}

impl<T> SequenceAdapter for ListAdapter<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn get(&self, index: usize) -> Result<T> {
        check_index(index, self.items.len())?;
        Ok(self.items[index].clone())
    }

    fn set(&mut self, index: usize, item: T) -> Result<T> {
        check_index(index, self.items.len())?;
        Ok(std::mem::replace(&mut self.items[index], item))
    }

    fn insert(&mut self, index: usize, item: T) -> Result<()> {
        check_insert_index(index, self.items.len())?;
        self.items.insert(index, item);
        Ok(())
    }

    fn remove_at(&mut self, index: usize) -> Result<T> {
        check_index(index, self.items.len())?;
        Ok(self.items.remove(index))
    }

    fn extend(&mut self, items: Vec<T>) -> Result<usize> {
        let start = self.items.len();
        self.items.extend(items);
        Ok(start)
    }

    fn index_of(&self, item: &T) -> Result<Option<usize>> {
        Ok(self.items.iter().position(|existing| existing == item))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn add_and_remove_report_positions() {
        let mut list: ListAdapter<_> = ["a", "b"].into_iter().collect();
        assert_eq!(list.add("c").unwrap(), AddOutcome::At(2));
        assert_eq!(list.remove(&"b").unwrap(), RemoveOutcome::At(1));
        assert_eq!(list.remove(&"b").unwrap(), RemoveOutcome::NotFound);
        assert_eq!(list.as_slice(), &["a", "c"]);
    }

    #[test]
    fn clear_hands_back_the_old_storage() {
        let mut list = ListAdapter::from(vec![1, 2, 3]);
        let retired = list.clear().unwrap();
        assert!(retired.is_some());
        assert!(list.is_empty().unwrap());
        assert!(list.clear().unwrap().is_none(), "nothing to retire");
    }

    #[test]
    fn positional_access_is_bounds_checked() {
        let mut list = ListAdapter::from(vec![1]);
        assert_eq!(
            list.get(1).unwrap_err(),
            Error::IndexOutOfRange { index: 1, len: 1 }
        );
        list.insert(1, 2).unwrap();
        assert!(list.insert(5, 9).is_err());
        assert_eq!(list.set(0, 10).unwrap(), 1);
        assert_eq!(list.remove_at(1).unwrap(), 2);
        assert_eq!(list.index_of(&10).unwrap(), Some(0));
    }

    #[test]
    fn extend_reports_where_the_batch_starts() {
        let mut list = ListAdapter::from(vec!['a']);
        assert_eq!(list.extend(vec!['b', 'c']).unwrap(), 1);
        assert_eq!(list.extend(Vec::new()).unwrap(), 3);
        assert_eq!(list.as_slice(), &['a', 'b', 'c']);
    }
}
