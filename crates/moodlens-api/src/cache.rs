//! Memoized image analyses keyed by content hash.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use moodlens_models::{FaceResult, Taxonomy};
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;

/// Cache key: SHA-256 of the upload bytes plus the taxonomy it was
/// classified under.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(bytes: &[u8], taxonomy: Taxonomy) -> Self {
        let digest = Sha256::digest(bytes);
        let hex: String = digest.iter().map(|b| format!("{:02x}", b)).collect();
        Self(format!("{}:{}", hex, taxonomy.as_str()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// What detection produced for an image.
#[derive(Debug, Clone)]
pub struct CachedAnalysis {
    pub width: u32,
    pub height: u32,
    pub faces: Vec<FaceResult>,
}

struct Inner {
    entries: HashMap<CacheKey, Arc<CachedAnalysis>>,
    /// Least recently used at the front
    order: VecDeque<CacheKey>,
}

/// Bounded LRU of analyses. A capacity of 0 disables caching.
pub struct AnalysisCache {
    inner: Mutex<Inner>,
    capacity: usize,
}

impl AnalysisCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: HashMap::with_capacity(capacity),
                order: VecDeque::with_capacity(capacity),
            }),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.entries.len()
    }

    pub async fn get(&self, key: &CacheKey) -> Option<Arc<CachedAnalysis>> {
        let mut inner = self.inner.lock().await;
        let hit = inner.entries.get(key).cloned()?;
        touch(&mut inner.order, key);
        Some(hit)
    }

    pub async fn insert(&self, key: CacheKey, analysis: CachedAnalysis) -> Arc<CachedAnalysis> {
        let analysis = Arc::new(analysis);
        if self.capacity == 0 {
            return analysis;
        }

        let mut inner = self.inner.lock().await;
        if inner.entries.insert(key.clone(), Arc::clone(&analysis)).is_some() {
            touch(&mut inner.order, &key);
        } else {
            inner.order.push_back(key);
        }

        while inner.entries.len() > self.capacity {
            let Some(oldest) = inner.order.pop_front() else {
                break;
            };
            inner.entries.remove(&oldest);
        }
        analysis
    }
}

fn touch(order: &mut VecDeque<CacheKey>, key: &CacheKey) {
    if let Some(pos) = order.iter().position(|k| k == key) {
        if let Some(k) = order.remove(pos) {
            order.push_back(k);
        }
    }
}
