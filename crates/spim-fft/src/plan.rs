use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{Normalization, TransformKind};

/// Admission mode controlling what enters the plan cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CacheAdmissionPolicy {
    Disabled,
    /// Evict the least recently used entry once `capacity` is reached.
    #[default]
    Lru,
    /// Never evict; `capacity` is ignored.
    AlwaysInsert,
}

/// Stable cache key for FFT planning decisions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlanKey {
    pub kind: TransformKind,
    pub shape: Vec<usize>,
    pub normalization: Normalization,
}

impl PlanKey {
    #[must_use]
    pub fn new(kind: TransformKind, shape: Vec<usize>, normalization: Normalization) -> Self {
        Self {
            kind,
            shape,
            normalization,
        }
    }
}

/// Fingerprint describing how a concrete plan decomposes the transform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanFingerprint {
    /// Prime factorization of each axis length, in axis order.
    pub radix_paths: Vec<Vec<usize>>,
    pub estimated_flops: u64,
    pub scratch_bytes: usize,
}

impl PlanFingerprint {
    #[must_use]
    pub fn estimate(shape: &[usize]) -> Self {
        let total = shape.iter().product::<usize>();
        let radix_paths = shape.iter().map(|&n| factorize_radix_path(n)).collect();
        // n log2 n per full pass, summed over axes.
        let estimated_flops = shape
            .iter()
            .map(|&n| {
                let log = usize::BITS - n.max(1).leading_zeros();
                (total as u64).saturating_mul(u64::from(log))
            })
            .fold(0u64, u64::saturating_add);
        let scratch_bytes = shape
            .iter()
            .copied()
            .max()
            .unwrap_or(0)
            .saturating_mul(std::mem::size_of::<crate::Complex64>());
        Self {
            radix_paths,
            estimated_flops,
            scratch_bytes,
        }
    }
}

/// Persistent metadata associated with a cache entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanMetadata {
    pub key: PlanKey,
    pub fingerprint: PlanFingerprint,
}

/// Configuration for plan caching.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanCacheConfig {
    pub capacity: usize,
    pub admission_policy: CacheAdmissionPolicy,
}

impl Default for PlanCacheConfig {
    fn default() -> Self {
        Self {
            capacity: 32,
            admission_policy: CacheAdmissionPolicy::Lru,
        }
    }
}

/// Storage interface to decouple planning from cache implementation details.
pub trait PlanCacheBackend {
    fn lookup(&mut self, key: &PlanKey) -> Option<PlanMetadata>;
    fn store(&mut self, metadata: PlanMetadata) -> bool;
    fn config(&self) -> &PlanCacheConfig;
}

/// Plan cache owned by a single [`crate::FftContext`].
///
/// Nothing is shared between contexts; a context and its cache are created
/// for one reconstruction run (or one ensemble) and dropped with it.
#[derive(Debug, Clone, Default)]
pub struct LocalPlanCache {
    config: PlanCacheConfig,
    entries: HashMap<PlanKey, (PlanMetadata, u64)>,
    tick: u64,
}

impl LocalPlanCache {
    #[must_use]
    pub fn new(config: PlanCacheConfig) -> Self {
        Self {
            config,
            entries: HashMap::new(),
            tick: 0,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    fn next_tick(&mut self) -> u64 {
        self.tick = self.tick.wrapping_add(1);
        self.tick
    }

    fn evict_least_recent(&mut self) {
        let victim = self
            .entries
            .iter()
            .min_by_key(|(_, (_, last_used))| *last_used)
            .map(|(key, _)| key.clone());
        if let Some(key) = victim {
            let _ = self.entries.remove(&key);
        }
    }
}

impl PlanCacheBackend for LocalPlanCache {
    fn lookup(&mut self, key: &PlanKey) -> Option<PlanMetadata> {
        let tick = self.next_tick();
        self.entries.get_mut(key).map(|(metadata, last_used)| {
            *last_used = tick;
            metadata.clone()
        })
    }

    fn store(&mut self, metadata: PlanMetadata) -> bool {
        match self.config.admission_policy {
            CacheAdmissionPolicy::Disabled => return false,
            CacheAdmissionPolicy::Lru => {
                if self.config.capacity == 0 {
                    return false;
                }
                if !self.entries.contains_key(&metadata.key)
                    && self.entries.len() >= self.config.capacity
                {
                    self.evict_least_recent();
                }
            }
            CacheAdmissionPolicy::AlwaysInsert => {}
        }
        let tick = self.next_tick();
        self.entries.insert(metadata.key.clone(), (metadata, tick));
        true
    }

    fn config(&self) -> &PlanCacheConfig {
        &self.config
    }
}

pub(crate) fn factorize_radix_path(mut n: usize) -> Vec<usize> {
    if n <= 1 {
        return vec![1];
    }

    let mut factors = Vec::new();
    let mut p = 2usize;
    while p * p <= n {
        while n.is_multiple_of(p) {
            factors.push(p);
            n /= p;
        }
        p += if p == 2 { 1 } else { 2 };
    }
    if n > 1 {
        factors.push(n);
    }
    factors
}
