use std::{
    fmt::Debug,
    sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError},
};

use store::{Comparator, Direction, KeyFunc, Queue, Store, StoreError, derive_key};

use crate::index::OrderedIndex;

struct Inner<T> {
    data: OrderedIndex<T>,
    /// Gates new insertions and lets `pop` stop waiting.
    closed: bool,
}

/// A thread-safe producer/consumer queue ordered by a [`Comparator`].
///
/// Like [`Store`] it keeps one accumulator per key: adding an object whose
/// key is pending replaces the pending object and moves it to its new place
/// in the order.
pub struct Heap<T> {
    inner: Mutex<Inner<T>>,
    cond: Condvar,
    key_fn: KeyFunc<T>,
}

impl<T: Debug + Clone + Send> Heap<T> {
    /// A heap that pops the smallest item under `cmp` first.
    pub fn new(
        key_fn: impl Fn(&T) -> anyhow::Result<String> + Send + Sync + 'static,
        cmp: impl Fn(&T, &T) -> std::cmp::Ordering + Send + Sync + 'static,
    ) -> Self {
        Self::with_direction(key_fn, cmp, Direction::Min)
    }

    pub fn with_direction(
        key_fn: impl Fn(&T) -> anyhow::Result<String> + Send + Sync + 'static,
        cmp: impl Fn(&T, &T) -> std::cmp::Ordering + Send + Sync + 'static,
        direction: Direction,
    ) -> Self {
        let compare: Comparator<T> = Arc::new(cmp);
        Self {
            inner: Mutex::new(Inner {
                data: OrderedIndex::new(compare, direction),
                closed: false,
            }),
            cond: Condvar::new(),
            key_fn: Arc::new(key_fn),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner<T>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn key_of(&self, obj: &T) -> Result<String, StoreError<T>> {
        Ok(derive_key(&self.key_fn, obj)?)
    }

    pub fn len(&self) -> usize {
        self.lock().data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Adds or updates every item of `list` and only then wakes consumers,
    /// so all of them are ordered before the first one is popped.
    ///
    /// Keys are derived up front: a key error leaves the heap untouched.
    pub fn bulk_add(&self, list: Vec<T>) -> Result<(), StoreError<T>> {
        let keyed = list
            .into_iter()
            .map(|obj| -> Result<(String, T), StoreError<T>> { Ok((self.key_of(&obj)?, obj)) })
            .collect::<Result<Vec<_>, _>>()?;

        let mut inner = self.lock();
        if inner.closed {
            return Err(StoreError::HeapClosed);
        }
        for (key, obj) in keyed {
            inner.data.upsert(key, obj);
        }
        self.cond.notify_all();
        Ok(())
    }

    /// Waits until an item is pending and removes the front one.
    pub fn pop(&self) -> Result<T, StoreError<T>> {
        let mut inner = self.lock();
        while inner.data.is_empty() {
            if inner.closed {
                return Err(StoreError::HeapClosed);
            }
            inner = self
                .cond
                .wait(inner)
                .unwrap_or_else(PoisonError::into_inner);
        }
        match inner.data.pop() {
            Some(obj) => Ok(obj),
            None => {
                tracing::error!("heap index yielded no object although it was not empty");
                Err(StoreError::Inconsistent)
            }
        }
    }
}

impl<T: Debug + Clone + Send + Ord + 'static> Heap<T> {
    /// A heap ordered by `T`'s own [`Ord`].
    pub fn with_ord(
        key_fn: impl Fn(&T) -> anyhow::Result<String> + Send + Sync + 'static,
        direction: Direction,
    ) -> Self {
        Self::with_direction(key_fn, <T as Ord>::cmp, direction)
    }
}

impl<T: Debug + Clone + Send> Store<T> for Heap<T> {
    fn add(&self, obj: T) -> Result<(), StoreError<T>> {
        let key = self.key_of(&obj)?;
        let mut inner = self.lock();
        if inner.closed {
            return Err(StoreError::HeapClosed);
        }
        inner.data.upsert(key, obj);
        self.cond.notify_all();
        Ok(())
    }

    fn add_if_not_present(&self, obj: T) -> Result<(), StoreError<T>> {
        let key = self.key_of(&obj)?;
        let mut inner = self.lock();
        if inner.closed {
            return Err(StoreError::HeapClosed);
        }
        if !inner.data.contains(&key) {
            inner.data.push(key, obj);
        }
        self.cond.notify_all();
        Ok(())
    }

    /// Fails with [`StoreError::NotFound`] if the key is not pending.
    fn delete(&self, obj: &T) -> Result<(), StoreError<T>> {
        let key = self.key_of(obj)?;
        let mut inner = self.lock();
        let Some(index) = inner.data.index_of(&key) else {
            return Err(StoreError::NotFound);
        };
        inner.data.remove(index);
        Ok(())
    }

    fn list(&self) -> Vec<T> {
        self.lock().data.values()
    }

    fn list_keys(&self) -> Vec<String> {
        self.lock().data.keys()
    }

    fn get(&self, obj: &T) -> Result<Option<T>, StoreError<T>> {
        let key = self.key_of(obj)?;
        Ok(self.get_by_key(&key))
    }

    fn get_by_key(&self, key: &str) -> Option<T> {
        self.lock().data.get(key).cloned()
    }

    fn close(&self) {
        let mut inner = self.lock();
        inner.closed = true;
        tracing::debug!(pending = inner.data.len(), "heap closed");
        self.cond.notify_all();
    }

    fn is_closed(&self) -> bool {
        self.lock().closed
    }
}

impl<T: Debug + Clone + Send> Queue<T> for Heap<T> {
    fn dequeue(&self) -> Result<T, StoreError<T>> {
        self.pop()
    }
}
