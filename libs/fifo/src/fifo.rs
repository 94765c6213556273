use std::{
    collections::{HashMap, HashSet, VecDeque},
    fmt::Debug,
    sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError},
};

use store::{KeyFunc, Queue, Store, StoreError, derive_key};

use crate::Requeue;

#[derive(Debug)]
struct Inner<T> {
    /// Every key in `items` is also in `queue`. `queue` may additionally hold
    /// keys deleted after they were enqueued; `pop` skips those.
    items: HashMap<String, T>,
    queue: VecDeque<String>,

    /// Set by the first mutation of any kind.
    populated: bool,
    /// Items of the first `replace` (if it was the first mutation) not yet popped.
    initial_population_count: usize,

    /// Only stops `pop` from waiting. Mutations are still accepted.
    closed: bool,
}

impl<T> Inner<T> {
    /// Adds `obj` under `key` unless the key is already pending.
    /// Returns whether anything was inserted.
    fn add_if_not_present(&mut self, key: String, obj: T) -> bool {
        self.populated = true;
        if self.items.contains_key(&key) {
            return false;
        }
        self.queue.push_back(key.clone());
        self.items.insert(key, obj);
        true
    }
}

/// A queue in which (a) each accumulator is simply the most recently
/// provided object and (b) the collection of keys to process is a FIFO.
///
/// If an object is added several times while its key waits in the queue, it
/// is processed once, in its most recent version, at the position of the
/// first add. Deleted objects are not processed at all.
///
/// Pops block until an item is pending or the queue is closed and drained.
pub struct Fifo<T> {
    inner: Mutex<Inner<T>>,
    cond: Condvar,
    key_fn: KeyFunc<T>,
}

impl<T: Debug + Clone + Send> Fifo<T> {
    /// `key_fn` derives the key used for insertion and retrieval and must be
    /// deterministic.
    pub fn new(key_fn: impl Fn(&T) -> anyhow::Result<String> + Send + Sync + 'static) -> Self {
        Self {
            inner: Mutex::new(Inner {
                items: HashMap::new(),
                queue: VecDeque::new(),
                populated: false,
                initial_population_count: 0,
                closed: false,
            }),
            cond: Condvar::new(),
            key_fn: Arc::new(key_fn),
        }
    }

    /// The guarded state is consistent at every point a pop callback can
    /// panic, so a poisoned lock is safe to keep using.
    fn lock(&self) -> MutexGuard<'_, Inner<T>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn key_of(&self, obj: &T) -> Result<String, StoreError<T>> {
        Ok(derive_key(&self.key_fn, obj)?)
    }

    /// True once a non-`replace` mutation came first, or once every item of
    /// the first `replace` has been popped.
    pub fn has_synced(&self) -> bool {
        let inner = self.lock();
        inner.populated && inner.initial_population_count == 0
    }

    /// Number of pending items.
    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Waits until an item is pending and hands it to `process`.
    ///
    /// Items come out in the order their keys were enqueued. The item is
    /// removed before `process` runs, and `process` runs under the queue's
    /// lock, so it may update state that must stay in sync with the queue.
    ///
    /// If `process` fails with a [`Requeue`], the item is put back (unless
    /// its key was meanwhile re-added) and the requeue's inner error, if any,
    /// is returned. Any other error is returned as is and the item is dropped
    /// from the queue. Either way the failing item travels in
    /// [`StoreError::Process`].
    pub fn pop<F>(&self, process: F) -> Result<T, StoreError<T>>
    where
        F: FnOnce(&T) -> anyhow::Result<()>,
    {
        let mut inner = self.lock();
        loop {
            while inner.queue.is_empty() {
                if inner.closed {
                    return Err(StoreError::FifoClosed);
                }
                inner = self
                    .cond
                    .wait(inner)
                    .unwrap_or_else(PoisonError::into_inner);
            }
            let Some(key) = inner.queue.pop_front() else {
                continue;
            };
            if inner.initial_population_count > 0 {
                inner.initial_population_count -= 1;
            }
            let Some(item) = inner.items.remove(&key) else {
                tracing::trace!(key = %key, "skipping key deleted while queued");
                continue;
            };

            let Err(err) = process(&item) else {
                return Ok(item);
            };
            return match err.downcast::<Requeue>() {
                Ok(Requeue(inner_err)) => {
                    tracing::trace!(key = %key, "requeueing popped item");
                    if inner.add_if_not_present(key, item.clone()) {
                        self.cond.notify_all();
                    }
                    match inner_err {
                        Some(err) => Err(StoreError::Process { item, err }),
                        None => Ok(item),
                    }
                }
                Err(err) => Err(StoreError::Process { item, err }),
            };
        }
    }

    /// Drops the whole content and uses `list` instead. Keys are queued in
    /// the order of their first occurrence in `list`; a later occurrence of
    /// a key replaces the object of an earlier one.
    ///
    /// Nothing changes if a key cannot be derived for any element.
    pub fn replace(&self, list: Vec<T>, resource_version: &str) -> Result<(), StoreError<T>> {
        let mut items = HashMap::with_capacity(list.len());
        let mut queue = VecDeque::with_capacity(list.len());
        for obj in list {
            let key = self.key_of(&obj)?;
            if items.insert(key.clone(), obj).is_none() {
                queue.push_back(key);
            }
        }

        let mut inner = self.lock();
        if !inner.populated {
            inner.populated = true;
            inner.initial_population_count = items.len();
        }
        tracing::debug!(items = items.len(), resource_version, "replacing fifo content");

        inner.items = items;
        inner.queue = queue;
        if !inner.queue.is_empty() {
            self.cond.notify_all();
        }
        Ok(())
    }

    /// Makes sure every stored item has its key in the queue. All other
    /// operations keep that property, so this is normally a no-op.
    pub fn resync(&self) {
        let mut inner = self.lock();
        let inner = &mut *inner;

        let in_queue: HashSet<&String> = inner.queue.iter().collect();
        let missing: Vec<String> = inner
            .items
            .keys()
            .filter(|key| !in_queue.contains(key))
            .cloned()
            .collect();
        if !missing.is_empty() {
            tracing::debug!(missing = missing.len(), "resync re-enqueued keys");
        }
        inner.queue.extend(missing);

        if !inner.queue.is_empty() {
            self.cond.notify_all();
        }
    }
}

#[cfg(test)]
impl<T> Inner<T> {
    /// Panics if a stored key has no entry in the queue.
    fn assert_invariants(&self) {
        let queued: HashSet<&String> = self.queue.iter().collect();
        for key in self.items.keys() {
            assert!(queued.contains(key), "stored key {key} is not queued");
        }
    }
}

impl<T: Debug + Clone + Send> Store<T> for Fifo<T> {
    /// A key that is already pending keeps its position; only its object is
    /// replaced.
    fn add(&self, obj: T) -> Result<(), StoreError<T>> {
        let key = self.key_of(&obj)?;
        let mut inner = self.lock();
        inner.populated = true;
        if !inner.items.contains_key(&key) {
            inner.queue.push_back(key.clone());
        }
        inner.items.insert(key, obj);
        self.cond.notify_all();
        Ok(())
    }

    fn add_if_not_present(&self, obj: T) -> Result<(), StoreError<T>> {
        let key = self.key_of(&obj)?;
        if self.lock().add_if_not_present(key, obj) {
            self.cond.notify_all();
        }
        Ok(())
    }

    /// Deleting an absent key is a no-op. The key stays in the queue until
    /// a pop skips it.
    fn delete(&self, obj: &T) -> Result<(), StoreError<T>> {
        let key = self.key_of(obj)?;
        let mut inner = self.lock();
        inner.populated = true;
        inner.items.remove(&key);
        Ok(())
    }

    fn list(&self) -> Vec<T> {
        self.lock().items.values().cloned().collect()
    }

    fn list_keys(&self) -> Vec<String> {
        self.lock().items.keys().cloned().collect()
    }

    fn get(&self, obj: &T) -> Result<Option<T>, StoreError<T>> {
        let key = self.key_of(obj)?;
        Ok(self.get_by_key(&key))
    }

    fn get_by_key(&self, key: &str) -> Option<T> {
        self.lock().items.get(key).cloned()
    }

    fn close(&self) {
        let mut inner = self.lock();
        inner.closed = true;
        tracing::debug!(pending = inner.items.len(), "fifo closed");
        self.cond.notify_all();
    }

    fn is_closed(&self) -> bool {
        self.lock().closed
    }
}

impl<T: Debug + Clone + Send> Queue<T> for Fifo<T> {
    fn dequeue(&self) -> Result<T, StoreError<T>> {
        self.pop(|_| Ok(()))
    }
}
