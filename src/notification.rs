// (c) Copyright 2025 Helsing GmbH. All rights reserved.
//! Change notifications emitted by observable collections.
//!
//! A [`CollectionChange`] describes one structural change. It is always delivered together with
//! a set of [`PropertyName`] signals, most notably [`PropertyName::Count`] whenever the number of
//! items may have changed and [`PropertyName::Items`] for every change to the contents.

use smallvec::SmallVec;
use std::fmt;

/// The items affected by a change, in order.
///
/// Most changes affect a single item, so one item is stored inline.
pub type ItemBatch<T> = SmallVec<[T; 1]>;

/// A structural change to an observable collection.
///
/// An index of `None` means the position of the change is unknown or not applicable (for
/// example, adding to a dictionary). Removals of unknown position are never reported as
/// [`CollectionChange::Remove`]; they are reported as [`CollectionChange::Reset`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(::serde::Deserialize, ::serde::Serialize))]
pub enum CollectionChange<T> {
    /// `items` were added, starting at `index`.
    Add {
        items: ItemBatch<T>,
        index: Option<usize>,
    },
    /// `items` were removed, starting at `index`.
    Remove {
        items: ItemBatch<T>,
        index: Option<usize>,
    },
    /// `old` was replaced by `new` at `index`.
    Replace {
        old: ItemBatch<T>,
        new: ItemBatch<T>,
        index: Option<usize>,
    },
    /// The whole collection may have changed. Observers should discard any incremental view
    /// and re-read the collection.
    Reset,
}

impl<T> CollectionChange<T> {
    pub fn added(item: T, index: Option<usize>) -> Self {
        Self::Add {
            items: smallvec::smallvec![item],
            index,
        }
    }

    pub fn removed(item: T, index: usize) -> Self {
        Self::Remove {
            items: smallvec::smallvec![item],
            index: Some(index),
        }
    }

    pub fn replaced(old: T, new: T, index: Option<usize>) -> Self {
        Self::Replace {
            old: smallvec::smallvec![old],
            new: smallvec::smallvec![new],
            index,
        }
    }

    pub fn kind(&self) -> ChangeKind {
        match self {
            Self::Add { .. } => ChangeKind::Add,
            Self::Remove { .. } => ChangeKind::Remove,
            Self::Replace { .. } => ChangeKind::Replace,
            Self::Reset => ChangeKind::Reset,
        }
    }

    /// Returns `true` if this change may alter the number of items.
    pub fn changes_count(&self) -> bool {
        !matches!(self, Self::Replace { .. })
    }

    /// Maps the carried items, keeping kind and indices.
    pub fn map<U>(self, mut f: impl FnMut(T) -> U) -> CollectionChange<U> {
        let mut batch =
            |items: ItemBatch<T>| -> ItemBatch<U> { items.into_iter().map(&mut f).collect() };
        match self {
            Self::Add { items, index } => CollectionChange::Add {
                items: batch(items),
                index,
            },
            Self::Remove { items, index } => CollectionChange::Remove {
                items: batch(items),
                index,
            },
            Self::Replace { old, new, index } => CollectionChange::Replace {
                old: batch(old),
                new: batch(new),
                index,
            },
            Self::Reset => CollectionChange::Reset,
        }
    }
}

/// The data-less discriminant of a [`CollectionChange`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Add,
    Remove,
    Replace,
    Reset,
}

/// A named property of a collection whose value changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(::serde::Deserialize, ::serde::Serialize))]
pub enum PropertyName {
    /// The number of items.
    Count,
    /// The contents as a whole ("Item[]").
    Items,
    /// The keys of a dictionary.
    Keys,
    /// The values of a dictionary.
    Values,
    /// The filter value of a filterable collection.
    Filter,
}

impl PropertyName {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Count => "Count",
            Self::Items => "Item[]",
            Self::Keys => "Keys",
            Self::Values => "Values",
            Self::Filter => "Filter",
        }
    }
}

impl fmt::Display for PropertyName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The property signals accompanying `change` for a collection exposing `properties`.
///
/// `properties` lists what a collection kind reports on a count-changing mutation; `Count` is
/// dropped for changes that cannot alter the count.
pub(crate) fn properties_for<T>(
    change: &CollectionChange<T>,
    properties: &[PropertyName],
) -> SmallVec<[PropertyName; 4]> {
    properties
        .iter()
        .copied()
        .filter(|p| change.changes_count() || *p != PropertyName::Count)
        .collect()
}
