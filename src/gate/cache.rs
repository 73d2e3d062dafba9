use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use ndarray::Array2;

/// Padded chunk reads keyed by their exact padded bounds.
///
/// The waveform never changes during a session, so entries never go stale.
/// Without a capacity the cache keeps every read until cleared; with one,
/// the oldest entry is evicted first. A capacity of 0 disables caching.
#[derive(Debug, Default)]
pub struct ReadCache {
    entries: HashMap<(isize, isize), Arc<Array2<f64>>>,
    order: VecDeque<(isize, isize)>,
    capacity: Option<usize>,
}

impl ReadCache {
    pub fn new(capacity: Option<usize>) -> Self {
        Self {
            capacity,
            ..Default::default()
        }
    }

    pub fn get(&self, key: &(isize, isize)) -> Option<Arc<Array2<f64>>> {
        self.entries.get(key).cloned()
    }

    pub fn insert(&mut self, key: (isize, isize), read: Arc<Array2<f64>>) {
        if self.capacity == Some(0) || self.entries.contains_key(&key) {
            return;
        }
        if let Some(capacity) = self.capacity {
            while self.entries.len() >= capacity {
                match self.order.pop_front() {
                    Some(oldest) => {
                        self.entries.remove(&oldest);
                    }
                    None => break,
                }
            }
        }
        self.order.push_back(key);
        self.entries.insert(key, read);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }
}
