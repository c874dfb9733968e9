//! Property tests over the cache, broker, and key encoding.

use jotdb_core::{keys, CacheConfig, EvictionPolicy, MemoryLimitedCache, MessageBroker, Store};
use jotdb_storage::MemoryBackend;
use jotdb_testkit::prelude::*;
use proptest::prelude::*;

proptest! {
    #[test]
    fn b64url_roundtrips_what_the_encoder_produces(name in name_strategy()) {
        let encoded = keys::b64url_encode(&name);
        prop_assert!(!encoded.contains('='));
        prop_assert_eq!(keys::b64url_decode(&encoded), Some(name));
    }

    #[test]
    fn store_set_then_get_returns_the_value(
        key in key_strategy(),
        value in value_strategy(),
    ) {
        let mut store = Store::new();
        prop_assert!(store.set(&key, value.clone()));
        prop_assert_eq!(store.get(&key), Some(value));
    }

    #[test]
    fn repeated_set_of_the_same_entry_is_byte_stable(
        key in key_strategy(),
        value in value_strategy(),
    ) {
        let mut cache =
            MemoryLimitedCache::new(MemoryBackend::new(), CacheConfig::default());
        cache.set(&key, value.clone()).unwrap();
        let once = cache.bytes_used();
        cache.set(&key, value).unwrap();
        prop_assert_eq!(cache.bytes_used(), once);
    }

    #[test]
    fn unpinned_cache_never_ends_a_write_over_budget(
        entries in proptest::collection::vec(
            (key_strategy(), value_strategy()),
            1..40,
        ),
    ) {
        let config = CacheConfig::new()
            .max_memory_mb(2048.0 / (1024.0 * 1024.0))
            .policy(EvictionPolicy::Lru);
        let mut cache = MemoryLimitedCache::new(MemoryBackend::new(), config);

        for (key, value) in entries {
            cache.set(&key, value).unwrap();
            prop_assert!(cache.bytes_used() <= cache.budget_bytes());
        }
    }

    #[test]
    fn queue_pops_in_push_order(
        messages in proptest::collection::vec(value_strategy(), 0..20),
        queue in name_strategy(),
    ) {
        let mut broker = MessageBroker::default();
        for message in &messages {
            broker.push(message.clone(), &queue).unwrap();
        }
        prop_assert_eq!(broker.queue_size(&queue).unwrap() as usize, messages.len());

        let mut popped = Vec::new();
        while let Some(message) = broker.pop(&queue).unwrap() {
            popped.push(message);
        }
        prop_assert_eq!(popped, messages);
    }
}
