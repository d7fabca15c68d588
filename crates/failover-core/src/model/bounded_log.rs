// # Bounded Log
//
// Fixed-capacity, append-only FIFO used for the sample history and the
// failover event log. Appending at capacity evicts the oldest entry, so the
// log always holds the most recent `N` entries in chronological order.
//
// Serialized as a plain JSON array. Deserializing an array longer than `N`
// keeps only the newest `N` entries.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::VecDeque;

/// Fixed-capacity FIFO log
#[derive(Debug, Clone, PartialEq)]
pub struct BoundedLog<T, const N: usize> {
    entries: VecDeque<T>,
}

impl<T, const N: usize> BoundedLog<T, N> {
    /// Maximum number of retained entries
    pub const CAPACITY: usize = N;

    /// Create an empty log
    pub fn new() -> Self {
        Self {
            entries: VecDeque::with_capacity(N),
        }
    }

    /// Append an entry, returning the evicted oldest entry if the log was full
    pub fn push(&mut self, entry: T) -> Option<T> {
        if N == 0 {
            return Some(entry);
        }

        let evicted = if self.entries.len() == N {
            self.entries.pop_front()
        } else {
            None
        };
        self.entries.push_back(entry);
        evicted
    }

    /// Number of entries currently held
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the log holds no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The most recently appended entry
    pub fn latest(&self) -> Option<&T> {
        self.entries.back()
    }

    /// Iterate from oldest to newest
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> + ExactSizeIterator {
        self.entries.iter()
    }
}

impl<T, const N: usize> Default for BoundedLog<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, const N: usize> FromIterator<T> for BoundedLog<T, N> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut log = Self::new();
        for entry in iter {
            log.push(entry);
        }
        log
    }
}

impl<T: Serialize, const N: usize> Serialize for BoundedLog<T, N> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.entries.iter())
    }
}

impl<'de, T: Deserialize<'de>, const N: usize> Deserialize<'de> for BoundedLog<T, N> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let entries = Vec::<T>::deserialize(deserializer)?;
        Ok(entries.into_iter().collect())
    }
}
