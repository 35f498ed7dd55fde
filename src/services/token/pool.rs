/*
 * Responsibility
 * - One lazily-created TokenCodec per OS thread per pool
 * - Codec instances never cross threads; the shared, read-only key store is
 *   the only thing the threads have in common
 */
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::TokenError;
use crate::services::token::codec::TokenCodec;
use crate::services::token::keystore::KeyMaterialStore;
use crate::services::token::{AlgorithmId, Claims};

static NEXT_POOL_ID: AtomicU64 = AtomicU64::new(0);

thread_local! {
    // Slot map keyed by pool id; a thread touching two pools gets two codecs.
    static CODECS: RefCell<HashMap<u64, Rc<TokenCodec>>> = RefCell::new(HashMap::new());
}

/// Hands out per-thread [`TokenCodec`] instances.
///
/// The codec is `!Sync` (engine handle cache), so the pool is the mandatory
/// isolation mechanism: each calling thread lazily builds its own codec from
/// the shared immutable store and reuses it for the thread's lifetime.
/// Creation is idempotent per thread by construction (thread-local slot).
///
/// Pools are expected to be process-scoped. Dropping a pool releases the
/// dropping thread's slot; slots on other threads are reclaimed when those
/// threads exit.
pub struct PerThreadCodecPool {
    id: u64,
    store: Arc<KeyMaterialStore>,
    default_algorithm: AlgorithmId,
}

impl PerThreadCodecPool {
    pub fn new(store: Arc<KeyMaterialStore>, default_algorithm: AlgorithmId) -> Self {
        Self {
            id: NEXT_POOL_ID.fetch_add(1, Ordering::Relaxed),
            store,
            default_algorithm,
        }
    }

    /// Run `f` against this thread's codec, creating it on first use.
    pub fn with<R>(&self, f: impl FnOnce(&TokenCodec) -> R) -> R {
        let codec = CODECS.with(|slots| {
            slots
                .borrow_mut()
                .entry(self.id)
                .or_insert_with(|| {
                    Rc::new(TokenCodec::new(self.store.clone(), self.default_algorithm))
                })
                .clone()
        });
        f(&codec)
    }

    pub fn sign(
        &self,
        claims: &Claims,
        ttl_seconds: Option<u64>,
        algorithm: Option<AlgorithmId>,
    ) -> Result<String, TokenError> {
        self.with(|codec| codec.sign(claims, ttl_seconds, algorithm))
    }

    pub fn decode(&self, token: &str) -> Result<Claims, TokenError> {
        self.with(|codec| codec.decode(token))
    }
}

impl Drop for PerThreadCodecPool {
    fn drop(&mut self) {
        // Only the dropping thread's slot is reachable here; try_with
        // because the thread-local may already be gone during teardown.
        let _ = CODECS.try_with(|slots| {
            slots.borrow_mut().remove(&self.id);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::token::container::ContainerBuilder;

    fn pool() -> PerThreadCodecPool {
        let document = ContainerBuilder::new()
            .secret(AlgorithmId::HS256, &[3u8; 32])
            .seal("pw")
            .unwrap();
        let store = Arc::new(KeyMaterialStore::open(&document, "pw").unwrap());
        PerThreadCodecPool::new(store, AlgorithmId::HS256)
    }

    #[test]
    fn codec_is_reused_within_a_thread() {
        let pool = pool();
        let first = pool.with(|codec| codec as *const TokenCodec as usize);
        let second = pool.with(|codec| codec as *const TokenCodec as usize);
        assert_eq!(first, second);
    }

    #[test]
    fn distinct_pools_get_distinct_codecs_on_one_thread() {
        let a = pool();
        let b = pool();
        let pa = a.with(|codec| codec as *const TokenCodec as usize);
        let pb = b.with(|codec| codec as *const TokenCodec as usize);
        assert_ne!(pa, pb);
    }

    #[test]
    fn dropping_a_pool_releases_this_threads_slot() {
        let pool = pool();
        let id = pool.id;
        pool.with(|_| ());
        assert!(CODECS.with(|slots| slots.borrow().contains_key(&id)));

        drop(pool);
        assert!(CODECS.with(|slots| !slots.borrow().contains_key(&id)));
    }

    #[test]
    fn concurrent_round_trips_do_not_interfere() {
        let pool = Arc::new(pool());
        let threads = 8;
        let iterations = 1000;

        let handles: Vec<_> = (0..threads)
            .map(|t| {
                let pool = pool.clone();
                std::thread::spawn(move || {
                    for i in 0..iterations {
                        let mut claims = Claims::new();
                        claims.user_id = Some(format!("user-{t}-{i}"));
                        let token = pool.sign(&claims, Some(60), None).unwrap();
                        let decoded = pool.decode(&token).unwrap();
                        assert_eq!(decoded.user_id.as_deref(), Some(format!("user-{t}-{i}").as_str()));
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
    }

    #[test]
    #[ignore = "soak test, run with --ignored"]
    fn soak_ten_thousand_round_trips_per_thread() {
        let pool = Arc::new(pool());

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let pool = pool.clone();
                std::thread::spawn(move || {
                    for i in 0..10_000 {
                        let mut claims = Claims::new();
                        claims.user_id = Some(format!("user-{t}-{i}"));
                        let token = pool.sign(&claims, Some(60), None).unwrap();
                        let decoded = pool.decode(&token).unwrap();
                        assert_eq!(decoded.user_id, claims.user_id);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
    }
}
