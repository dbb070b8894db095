//! Cache TTL générique pour les métriques dérivées (OEE).
//!
//! Une lecture à l'instant `t` sert la valeur sans appel réseau ssi
//! `t - fetched_at < ttl`, sinon elle se comporte comme absente et le
//! consommateur refetch puis `put` avant de résoudre. Pas d'éviction
//! au-delà de la péremption : la mémoire est bornée par le nombre de clés.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    pub value: T,
    pub fetched_at: Instant,
    pub ttl: Duration,
}

impl<T> CacheEntry<T> {
    fn is_fresh(&self, now: Instant) -> bool {
        now.duration_since(self.fetched_at) < self.ttl
    }
}

#[derive(Debug, Default)]
pub struct TtlCache<K, V> {
    entries: HashMap<K, CacheEntry<V>>,
}

impl<K: Eq + Hash, V: Clone> TtlCache<K, V> {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Valeur encore fraîche, sinon absent.
    pub fn get(&self, key: &K) -> Option<V> {
        self.entries
            .get(key)
            .filter(|entry| entry.is_fresh(Instant::now()))
            .map(|entry| entry.value.clone())
    }

    /// Écrasement inconditionnel, `fetched_at` remis à maintenant.
    pub fn put(&mut self, key: K, value: V, ttl: Duration) {
        self.entries.insert(
            key,
            CacheEntry {
                value,
                fetched_at: Instant::now(),
                ttl,
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TTL: Duration = Duration::from_millis(30_000);

    #[tokio::test(start_paused = true)]
    async fn test_round_trip_within_ttl() {
        let mut cache: TtlCache<String, u32> = TtlCache::new();
        cache.put("CNC-01".to_string(), 42, TTL);
        assert_eq!(cache.get(&"CNC-01".to_string()), Some(42));
    }

    #[tokio::test(start_paused = true)]
    async fn test_expires_after_ttl() {
        let mut cache: TtlCache<String, u32> = TtlCache::new();
        cache.put("CNC-01".to_string(), 42, TTL);

        tokio::time::advance(Duration::from_millis(29_999)).await;
        assert_eq!(cache.get(&"CNC-01".to_string()), Some(42));

        tokio::time::advance(Duration::from_millis(1)).await;
        assert_eq!(cache.get(&"CNC-01".to_string()), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_put_resets_age() {
        let mut cache: TtlCache<String, u32> = TtlCache::new();
        cache.put("CNC-01".to_string(), 1, TTL);

        tokio::time::advance(Duration::from_millis(20_000)).await;
        cache.put("CNC-01".to_string(), 2, TTL);

        tokio::time::advance(Duration::from_millis(20_000)).await;
        // 40s après le premier put, mais 20s après le second
        assert_eq!(cache.get(&"CNC-01".to_string()), Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_keys_are_independent() {
        let mut cache: TtlCache<String, u32> = TtlCache::new();
        cache.put("CNC-01".to_string(), 1, Duration::from_millis(1_000));
        cache.put("CNC-02".to_string(), 2, TTL);

        tokio::time::advance(Duration::from_millis(2_000)).await;
        assert_eq!(cache.get(&"CNC-01".to_string()), None);
        assert_eq!(cache.get(&"CNC-02".to_string()), Some(2));
    }
}
