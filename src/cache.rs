use std::collections::{HashMap, VecDeque};
use tracing::debug;

/// Everything that determines a completion result besides the chunk itself
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ParamsSnapshot {
    pub model: String,
    pub temperature_bits: u32,
    pub top_p_bits: u32,
    pub max_output_tokens: u32,
    pub retries: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub chunk: String,
    pub params: ParamsSnapshot,
}

/// Memoized dispatcher results. Unbounded unless a capacity is given, in which
/// case the oldest entry is evicted first.
#[derive(Debug, Default)]
pub struct ResultCache {
    entries: HashMap<CacheKey, String>,
    order: VecDeque<CacheKey>,
    capacity: Option<usize>,
}

impl ResultCache {
    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: Option<usize>) -> Self {
        Self {
            capacity,
            ..Self::default()
        }
    }

    pub fn get(&self, key: &CacheKey) -> Option<&String> {
        self.entries.get(key)
    }

    pub fn insert(&mut self, key: CacheKey, value: String) {
        if self.entries.insert(key.clone(), value).is_some() {
            return;
        }
        self.order.push_back(key);

        if let Some(capacity) = self.capacity {
            while self.order.len() > capacity {
                if let Some(oldest) = self.order.pop_front() {
                    self.entries.remove(&oldest);
                    debug!("Evicted oldest cached result ({} entries kept)", capacity);
                }
            }
        }
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
