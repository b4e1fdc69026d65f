//! Helper functions for common cache operations.

use crate::error::{CacheError, CacheResult};
use crate::store::TaggedCache;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use std::future::Future;
use std::time::Duration;

/// Return the cached value for `key`, or run `factory`, cache its output
/// for `ttl` under `tags`, and return it.
///
/// A failing factory caches nothing and its error is returned as is.
///
/// # Examples
///
/// ```
/// use licita_cache::{TaggedCache, remember};
/// use std::time::Duration;
///
/// # tokio_test::block_on(async {
/// let cache: TaggedCache<u64> = TaggedCache::new();
/// let total = remember(&cache, "count:clientes", Duration::from_secs(60), &["clientes"], || async {
///     Ok::<_, std::io::Error>(42)
/// })
/// .await
/// .unwrap();
/// assert_eq!(total, 42);
/// # });
/// ```
pub async fn remember<V, E, F, Fut>(
    cache: &TaggedCache<V>,
    key: &str,
    ttl: Duration,
    tags: &[&str],
    factory: F,
) -> Result<V, E>
where
    V: Clone,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<V, E>>,
{
    if let Some(value) = cache.get(key) {
        return Ok(value);
    }

    let value = factory().await?;
    cache.set(key, value.clone(), ttl, tags);
    Ok(value)
}

/// [`remember`] with the cache's default TTL.
pub async fn remember_with<V, E, F, Fut>(
    cache: &TaggedCache<V>,
    key: &str,
    tags: &[&str],
    factory: F,
) -> Result<V, E>
where
    V: Clone,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<V, E>>,
{
    let ttl = cache.config().default_ttl;
    remember(cache, key, ttl, tags, factory).await
}

/// Get a typed value from a JSON cache.
pub fn get_json<T: DeserializeOwned>(
    cache: &TaggedCache<Value>,
    key: &str,
) -> CacheResult<Option<T>> {
    match cache.get(key) {
        Some(value) => serde_json::from_value(value)
            .map(Some)
            .map_err(|e| CacheError::Deserialization(e.to_string())),
        None => Ok(None),
    }
}

/// Set a typed value in a JSON cache.
pub fn set_json<T: Serialize>(
    cache: &TaggedCache<Value>,
    key: &str,
    value: &T,
    ttl: Duration,
    tags: &[&str],
) -> CacheResult<()> {
    let json = serde_json::to_value(value).map_err(|e| CacheError::Serialization(e.to_string()))?;
    cache.set(key, json, ttl, tags);
    Ok(())
}

/// Typed [`remember`] over a JSON cache.
pub async fn remember_json<T, F, Fut>(
    cache: &TaggedCache<Value>,
    key: &str,
    ttl: Duration,
    tags: &[&str],
    factory: F,
) -> CacheResult<T>
where
    T: Serialize + DeserializeOwned,
    F: FnOnce() -> Fut,
    Fut: Future<Output = CacheResult<T>>,
{
    if let Some(value) = get_json(cache, key)? {
        return Ok(value);
    }

    let value = factory().await?;
    set_json(cache, key, &value, ttl, tags)?;
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Cliente {
        id: u32,
        nome: String,
    }

    #[tokio::test]
    async fn test_remember_calls_factory_once() {
        let cache: TaggedCache<u32> = TaggedCache::new();
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let value = remember(&cache, "k", Duration::from_secs(60), &["t"], || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, CacheError>(7)
            })
            .await
            .unwrap();
            assert_eq!(value, 7);
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.keys_for_tag("t"), vec!["k"]);
    }

    #[tokio::test]
    async fn test_remember_error_not_cached() {
        let cache: TaggedCache<u32> = TaggedCache::new();
        let result = remember(&cache, "k", Duration::from_secs(60), &[], || async {
            Err::<u32, _>(CacheError::Config("boom".into()))
        })
        .await;

        assert!(result.is_err());
        assert!(!cache.contains_key("k"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_remember_with_uses_default_ttl() {
        let cache: TaggedCache<&'static str> = TaggedCache::new();
        remember_with(&cache, "k", &[], || async { Ok::<_, CacheError>("v") })
            .await
            .unwrap();

        assert_eq!(cache.ttl("k"), Some(Duration::from_secs(300)));
    }

    #[tokio::test]
    async fn test_typed_roundtrip_through_json_cache() {
        let cache = TaggedCache::new();
        let cliente = Cliente {
            id: 1,
            nome: "ACME".into(),
        };
        set_json(&cache, "cliente:1", &cliente, Duration::from_secs(60), &["clientes"]).unwrap();

        let loaded: Option<Cliente> = get_json(&cache, "cliente:1").unwrap();
        assert_eq!(loaded, Some(cliente));

        let wrong: CacheResult<Option<Vec<u8>>> = get_json(&cache, "cliente:1");
        assert!(matches!(wrong, Err(CacheError::Deserialization(_))));
    }

    #[tokio::test]
    async fn test_remember_json() {
        let cache = TaggedCache::new();
        let first: Cliente = remember_json(&cache, "c", Duration::from_secs(60), &[], || async {
            Ok(Cliente {
                id: 2,
                nome: "Beta".into(),
            })
        })
        .await
        .unwrap();
        assert_eq!(first.id, 2);

        let second: Cliente = remember_json(&cache, "c", Duration::from_secs(60), &[], || async {
            Err(CacheError::Config("should not run".into()))
        })
        .await
        .unwrap();
        assert_eq!(second, first);
    }
}
