use std::{cmp::Ordering, fmt::Debug, sync::Arc};

use crate::{KeyError, StoreError};

/// Derives the key of an object. Implementations should be deterministic.
pub type KeyFunc<T> = Arc<dyn Fn(&T) -> anyhow::Result<String> + Send + Sync>;

/// Three-way ordering of two objects. [`Ordering::Less`] means the first
/// argument should leave the heap before the second one (for [`Direction::Min`]).
pub type Comparator<T> = Arc<dyn Fn(&T, &T) -> Ordering + Send + Sync>;

/// Which end of the [`Comparator`] order is popped first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Direction {
    #[default]
    Min,
    Max,
}

impl Direction {
    /// Whether `a` belongs in front of `b` under `cmp` and this direction.
    /// `Max` is `Min` with the operands swapped.
    pub fn precedes<T>(self, cmp: &Comparator<T>, a: &T, b: &T) -> bool {
        match self {
            Direction::Min => cmp(a, b) == Ordering::Less,
            Direction::Max => cmp(b, a) == Ordering::Less,
        }
    }
}

/// Derives the key of `obj`, wrapping a failure into a [`KeyError`].
pub fn derive_key<T: Debug + Clone>(key_fn: &KeyFunc<T>, obj: &T) -> Result<String, KeyError<T>> {
    key_fn(obj).map_err(|err| KeyError {
        obj: obj.clone(),
        err,
    })
}

/// A map from string keys to accumulators. Each accumulator is the most
/// recently provided object for its key.
///
/// All operations are safe to call concurrently from multiple threads.
pub trait Store<T: Debug>: Send + Sync {
    /// Stores `obj` under its key. An already pending key keeps its place.
    fn add(&self, obj: T) -> Result<(), StoreError<T>>;

    /// Like [`Store::add`], but a no-op if the key already has an accumulator.
    ///
    /// Lets a consumer retry an item without overwriting a newer version a
    /// producer enqueued in the meantime.
    fn add_if_not_present(&self, obj: T) -> Result<(), StoreError<T>>;

    /// Same as [`Store::add`].
    fn update(&self, obj: T) -> Result<(), StoreError<T>> {
        self.add(obj)
    }

    fn delete(&self, obj: &T) -> Result<(), StoreError<T>>;

    /// Snapshot of all accumulators, in no particular order.
    fn list(&self) -> Vec<T>;

    /// Snapshot of all keys, in no particular order.
    fn list_keys(&self) -> Vec<String>;

    /// Looks up the accumulator for the key of `obj`.
    fn get(&self, obj: &T) -> Result<Option<T>, StoreError<T>>;

    fn get_by_key(&self, key: &str) -> Option<T>;

    /// Marks the store closed and wakes every blocked consumer.
    fn close(&self);

    fn is_closed(&self) -> bool;
}

/// A [`Store`] that consumers block on.
pub trait Queue<T: Debug>: Store<T> {
    /// Blocks until an item is pending and removes it, or fails with the
    /// queue's closed error once the queue is closed and drained.
    fn dequeue(&self) -> Result<T, StoreError<T>>;
}
