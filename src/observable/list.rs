// (c) Copyright 2025 Helsing GmbH. All rights reserved.
use super::{CollectionStorage, properties, record};
use crate::{
    adapters::{AddOutcome, CollectionAdapter, SequenceAdapter},
    error::{Error, Result},
    notification::CollectionChange,
    undo::{Applied, UndoLevel},
};

/// Positional operations.
///
/// Indices are positions in enumeration order; out-of-range indices fail with
/// [`Error::IndexOutOfRange`].
pub trait ListLike: CollectionStorage<Adapter: SequenceAdapter> {
    fn get(&self, index: usize) -> Result<Self::Item>;

    /// Replaces the item at `index`, posting `Replace`, and returns the previous item.
    fn set(&self, index: usize, item: Self::Item) -> Result<Self::Item>;

    /// Inserts `item` at `index`, which may equal the length.
    fn insert(&self, index: usize, item: Self::Item) -> Result<()>;

    fn remove_at(&self, index: usize) -> Result<Self::Item>;

    fn index_of(&self, item: &Self::Item) -> Result<Option<usize>>;

    /// Removes the first occurrence of `item`, returning the position it was removed from.
    fn remove_item(&self, item: &Self::Item) -> Result<Option<usize>>;

    /// Appends `item` and returns the position it ended up at.
    fn push(&self, item: Self::Item) -> Result<usize>;

    /// Appends all of `items` under one lock acquisition, posting a single `Add` that carries
    /// the whole batch, and returns the position of the first one.
    ///
    /// Either every item is appended or none is. An empty batch changes nothing and returns
    /// the current length.
    fn extend_from(&self, items: impl IntoIterator<Item = Self::Item>) -> Result<usize>;

    /// Reverts the most recent recorded mutation. Returns `false` if there was none, or if
    /// undo is disabled.
    fn undo(&self) -> Result<bool>;

    /// Re-applies the most recently undone mutation.
    fn redo(&self) -> Result<bool>;

    fn can_undo(&self) -> bool;

    fn can_redo(&self) -> bool;
}

impl<C> ListLike for C
where
    C: CollectionStorage + ?Sized,
    C::Adapter: SequenceAdapter,
{
    fn get(&self, index: usize) -> Result<Self::Item> {
        self.read(|adapter| adapter.get(index))
    }

    fn set(&self, index: usize, item: Self::Item) -> Result<Self::Item> {
        let old = self.write(|adapter| {
            let old = adapter.set(index, item.clone())?;
            record(self, || UndoLevel::ChangeAt {
                index,
                old: old.clone(),
                new: item.clone(),
            });
            Ok(old)
        })?;
        self.notifier().post(
            CollectionChange::replaced(old.clone(), item, Some(index)),
            properties::<Self>(),
        );
        Ok(old)
    }

    fn insert(&self, index: usize, item: Self::Item) -> Result<()> {
        self.write(|adapter| {
            adapter.insert(index, item.clone())?;
            record(self, || UndoLevel::Add {
                index,
                item: item.clone(),
            });
            Ok(())
        })?;
        self.notifier().post(
            CollectionChange::added(item, Some(index)),
            properties::<Self>(),
        );
        Ok(())
    }

    fn remove_at(&self, index: usize) -> Result<Self::Item> {
        let removed = self.write(|adapter| {
            let removed = adapter.remove_at(index)?;
            record(self, || UndoLevel::Remove {
                index,
                item: removed.clone(),
            });
            Ok(removed)
        })?;
        self.notifier().post(
            CollectionChange::removed(removed.clone(), index),
            properties::<Self>(),
        );
        Ok(removed)
    }

    fn index_of(&self, item: &Self::Item) -> Result<Option<usize>> {
        self.read(|adapter| adapter.index_of(item))
    }

    fn remove_item(&self, item: &Self::Item) -> Result<Option<usize>> {
        let removed = self.write(|adapter| {
            let Some(index) = adapter.index_of(item)? else {
                return Ok(None);
            };
            let removed = adapter.remove_at(index)?;
            record(self, || UndoLevel::Remove {
                index,
                item: removed.clone(),
            });
            Ok(Some((index, removed)))
        })?;
        Ok(removed.map(|(index, removed)| {
            self.notifier()
                .post(CollectionChange::removed(removed, index), properties::<Self>());
            index
        }))
    }

    fn push(&self, item: Self::Item) -> Result<usize> {
        let index = self.write(|adapter| {
            let AddOutcome::At(index) = adapter.add(item.clone())? else {
                return Err(Error::InvalidArgument("sequence storage lost an item's position"));
            };
            record(self, || UndoLevel::Add {
                index,
                item: item.clone(),
            });
            Ok(index)
        })?;
        self.notifier().post(
            CollectionChange::added(item, Some(index)),
            properties::<Self>(),
        );
        Ok(index)
    }

    fn extend_from(&self, items: impl IntoIterator<Item = Self::Item>) -> Result<usize> {
        let items: Vec<_> = items.into_iter().collect();
        if items.is_empty() {
            return self.read(|adapter| adapter.len());
        }
        let start = self.write(|adapter| {
            let start = adapter.extend(items.clone())?;
            for (offset, item) in items.iter().enumerate() {
                record(self, || UndoLevel::Add {
                    index: start + offset,
                    item: item.clone(),
                });
            }
            Ok(start)
        })?;
        self.notifier().post(
            CollectionChange::Add {
                items: items.into_iter().collect(),
                index: Some(start),
            },
            properties::<Self>(),
        );
        Ok(start)
    }

    fn undo(&self) -> Result<bool> {
        let Some(history) = self.history() else {
            return Ok(false);
        };
        let applied = self.write(|adapter| history.lock().undo_on(adapter))?;
        Ok(publish(self, applied, "undo"))
    }

    fn redo(&self) -> Result<bool> {
        let Some(history) = self.history() else {
            return Ok(false);
        };
        let applied = self.write(|adapter| history.lock().redo_on(adapter))?;
        Ok(publish(self, applied, "redo"))
    }

    fn can_undo(&self) -> bool {
        self.history()
            .is_some_and(|history| history.lock().can_undo())
    }

    fn can_redo(&self) -> bool {
        self.history()
            .is_some_and(|history| history.lock().can_redo())
    }
}

fn publish<C>(collection: &C, applied: Option<Applied<C::Item>>, action: &'static str) -> bool
where
    C: CollectionStorage + ?Sized,
{
    let Some(Applied { change, retired }) = applied else {
        return false;
    };
    tracing::debug!(action, kind = ?change.kind(), "applied undo level");
    if let Some(storage) = retired {
        collection.notifier().dispatcher().retire(storage);
    }
    collection.notifier().post(change, properties::<C>());
    true
}
