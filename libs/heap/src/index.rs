use std::collections::HashMap;

use store::{Comparator, Direction};

#[derive(Debug)]
struct HeapItem<T> {
    obj: T,
    /// Position of the item's key in `OrderedIndex::queue`.
    index: usize,
}

/// Binary heap of keys plus a side table from key to object and position.
///
/// Every key in `items` is in `queue` exactly once and vice versa, and
/// `items[queue[i]].index == i` holds after every operation, which makes
/// removing or re-ordering an arbitrary key O(log n).
pub(crate) struct OrderedIndex<T> {
    items: HashMap<String, HeapItem<T>>,
    queue: Vec<String>,
    compare: Comparator<T>,
    direction: Direction,
}

impl<T> OrderedIndex<T> {
    pub fn new(compare: Comparator<T>, direction: Direction) -> Self {
        Self {
            items: HashMap::new(),
            queue: Vec::new(),
            compare,
            direction,
        }
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.items.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&T> {
        self.items.get(key).map(|item| &item.obj)
    }

    pub fn index_of(&self, key: &str) -> Option<usize> {
        self.items.get(key).map(|item| item.index)
    }

    /// Whether the item at `i` belongs in front of the item at `j`.
    fn less(&self, i: usize, j: usize) -> bool {
        let (Some(a), Some(b)) = (self.items.get(&self.queue[i]), self.items.get(&self.queue[j]))
        else {
            return false;
        };
        self.direction.precedes(&self.compare, &a.obj, &b.obj)
    }

    fn swap(&mut self, i: usize, j: usize) {
        self.queue.swap(i, j);
        for idx in [i, j] {
            if let Some(item) = self.items.get_mut(&self.queue[idx]) {
                item.index = idx;
            }
        }
    }

    fn up(&mut self, mut j: usize) {
        while j > 0 {
            let parent = (j - 1) / 2;
            if !self.less(j, parent) {
                break;
            }
            self.swap(parent, j);
            j = parent;
        }
    }

    /// Sifts the item at `i0` down within the first `n` slots. Returns
    /// whether it moved.
    fn down(&mut self, i0: usize, n: usize) -> bool {
        let mut i = i0;
        loop {
            let left = 2 * i + 1;
            if left >= n {
                break;
            }
            let mut child = left;
            let right = left + 1;
            if right < n && self.less(right, left) {
                child = right;
            }
            if !self.less(child, i) {
                break;
            }
            self.swap(i, child);
            i = child;
        }
        i > i0
    }

    /// Inserts a key that is not in the index yet.
    pub fn push(&mut self, key: String, obj: T) {
        let n = self.queue.len();
        self.items.insert(key.clone(), HeapItem { obj, index: n });
        self.queue.push(key);
        self.up(n);
    }

    /// Removes and returns the front item.
    pub fn pop(&mut self) -> Option<T> {
        let n = self.queue.len().checked_sub(1)?;
        self.swap(0, n);
        self.down(0, n);
        self.pop_last()
    }

    /// Removes and returns the item at position `i`.
    pub fn remove(&mut self, i: usize) -> Option<T> {
        let n = self.queue.len().checked_sub(1)?;
        if i > n {
            return None;
        }
        if n != i {
            self.swap(i, n);
            if !self.down(i, n) {
                self.up(i);
            }
        }
        self.pop_last()
    }

    /// Re-establishes heap order after the item at position `i` changed.
    pub fn fix(&mut self, i: usize) {
        if i >= self.queue.len() {
            return;
        }
        if !self.down(i, self.queue.len()) {
            self.up(i);
        }
    }

    fn pop_last(&mut self) -> Option<T> {
        let key = self.queue.pop()?;
        self.items.remove(&key).map(|item| item.obj)
    }

    /// Replaces the object of `key` and moves it to its new place.
    /// Returns `obj` back if the key is absent.
    pub fn update(&mut self, key: &str, obj: T) -> Result<(), T> {
        let Some(item) = self.items.get_mut(key) else {
            return Err(obj);
        };
        item.obj = obj;
        let index = item.index;
        self.fix(index);
        Ok(())
    }

    /// Stores `obj` under `key`, replacing and re-ordering an existing entry.
    pub fn upsert(&mut self, key: String, obj: T) {
        if let Err(obj) = self.update(&key, obj) {
            self.push(key, obj);
        }
    }

    pub fn keys(&self) -> Vec<String> {
        self.items.keys().cloned().collect()
    }
}

impl<T: Clone> OrderedIndex<T> {
    pub fn values(&self) -> Vec<T> {
        self.items.values().map(|item| item.obj.clone()).collect()
    }
}

#[cfg(test)]
impl<T> OrderedIndex<T> {
    /// Panics if the key/position bijection or the heap order is broken.
    pub fn assert_invariants(&self) {
        assert_eq!(self.items.len(), self.queue.len());
        for (i, key) in self.queue.iter().enumerate() {
            assert_eq!(self.items[key].index, i, "stale position for {key}");
            if i > 0 {
                assert!(!self.less(i, (i - 1) / 2), "heap order broken at {i}");
            }
        }
    }

    pub fn front_key(&self) -> Option<&str> {
        self.queue.first().map(String::as_str)
    }
}
