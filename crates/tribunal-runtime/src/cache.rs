//! Vote cache.
//!
//! Identical submissions (same text and context) reuse counted votes per
//! role for the configured TTL. Sentinel votes and neutral votes from
//! unreadable responses are never stored, so the seat is retried on the
//! next request.

use moka::future::Cache;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::time::Duration;
use tribunal_core::{EvaluatorRole, Vote, VoteOutcome};

use crate::agents::UNSTRUCTURED_REASONING;
use crate::config::CacheConfig;

/// Cache key for one seat's vote on one submission.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct VoteKey {
    role: EvaluatorRole,
    text_hash: u64,
    context_hash: u64,
}

impl VoteKey {
    pub fn new(role: EvaluatorRole, text: &str, context: Option<&str>) -> Self {
        Self {
            role,
            text_hash: hash_str(text),
            context_hash: context.map(hash_str).unwrap_or(0),
        }
    }
}

fn hash_str(value: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

/// Vote cache using moka.
pub struct VoteCache {
    cache: Cache<VoteKey, Vote>,
}

impl VoteCache {
    pub fn new(max_entries: u64, ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_entries)
            .time_to_live(ttl)
            .build();

        Self { cache }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.max_entries, config.ttl)
    }

    pub async fn get(&self, key: &VoteKey) -> Option<Vote> {
        self.cache.get(key).await
    }

    /// Store the vote if it was counted from a readable response.
    /// Returns whether it was stored.
    pub async fn insert(&self, key: VoteKey, outcome: &VoteOutcome) -> bool {
        match outcome {
            VoteOutcome::Counted(vote) if vote.reasoning == UNSTRUCTURED_REASONING => false,
            VoteOutcome::Counted(vote) => {
                self.cache.insert(key, vote.clone()).await;
                true
            }
            VoteOutcome::Sentinel { .. } => false,
        }
    }

    pub fn invalidate_all(&self) {
        self.cache.invalidate_all();
    }

    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }
}

impl Default for VoteCache {
    fn default() -> Self {
        Self::from_config(&CacheConfig::default())
    }
}

impl std::fmt::Debug for VoteCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VoteCache")
            .field("entries", &self.cache.entry_count())
            .finish()
    }
}
