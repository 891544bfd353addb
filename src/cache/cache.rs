use std::{fmt::Debug, future::Future};

use redis::{aio::MultiplexedConnection, AsyncCommands, FromRedisValue, ToRedisArgs};
use redis_macros::{FromRedisValue, ToRedisArgs};
use serde::{Deserialize, Serialize};

use crate::{constants::RECIPE_CACHE_BIND_KEY, error::Error};

// Caching - keys

#[derive(Serialize, Clone, Debug)]
pub struct CacheKey<T: ToString + Serialize> {
    _value: T,
    _type: CacheKeyType,
}

impl<T: ToString + Serialize> CacheKey<T> {
    pub fn from(r#type: CacheKeyType, key: T) -> Self {
        Self {
            _value: key,
            _type: r#type,
        }
    }

    pub fn to_string(&self) -> String {
        self.into()
    }
}

impl<T: ToString + Serialize> From<&CacheKey<T>> for String {
    fn from(key: &CacheKey<T>) -> String {
        match key._type {
            CacheKeyType::Recipe => format!("recipe-{}", key._value.to_string()),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum CacheKeyType {
    Recipe,
}

impl CacheKeyType {
    pub fn new<T: ToString + Serialize>(self, key: T) -> CacheKey<T> {
        CacheKey::from(self, key)
    }
}

impl<T: ToString + Serialize> From<CacheKey<T>> for CacheLifetime {
    fn from(key: CacheKey<T>) -> CacheLifetime {
        match key._type {
            CacheKeyType::Recipe => CacheLifetime::BindRecipeCache,
        }
    }
}

// Cache - wrappers

/// How long a cached value stays valid.
///
/// Bound values remember the generation of their bind key when written and
/// go stale once the bind key is rotated.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum CacheLifetime {
    Infinite,
    BindRecipeCache,
}

impl CacheLifetime {
    fn bind_key(&self) -> Option<&'static str> {
        match self {
            CacheLifetime::Infinite => None,
            CacheLifetime::BindRecipeCache => Some(RECIPE_CACHE_BIND_KEY),
        }
    }

    pub async fn get_cache_bind(
        &self,
        cache: &mut MultiplexedConnection,
    ) -> Result<Option<String>, Error> {
        match self.bind_key() {
            Some(key) => get_cache_value::<&str, String>(key, cache).await,
            None => Ok(None),
        }
    }

    pub async fn validate_cache_bind(
        &self,
        bind: &Option<String>,
        lifetime: Self,
        cache: &mut MultiplexedConnection,
    ) -> Result<bool, Error> {
        if *self != lifetime {
            log::error!("Found conflicting bindings");
            return Err(Error::internal("Conflicting cache bindings"));
        }
        Ok(is_current(bind, &self.get_cache_bind(cache).await?))
    }

    /// Starts a new generation, staling every value bound to this lifetime.
    pub async fn rotate(&self, cache: &mut MultiplexedConnection) -> Result<(), Error> {
        if let Some(key) = self.bind_key() {
            let generation = uuid::Uuid::new_v4().to_string();
            log::trace!("> Rotating {key} to {generation}");
            set_cache_value(key, generation, cache).await?;
        }
        Ok(())
    }
}

fn is_current(bind: &Option<String>, generation: &Option<String>) -> bool {
    bind == generation
}

#[derive(Serialize, serde::Deserialize, FromRedisValue, ToRedisArgs, Clone)]
pub struct RedisValue<T: serde::Serialize + Send + Sync + Clone> {
    pub value: T,
    _lifetime: CacheLifetime,
    _bind: Option<String>,
}

impl<T: serde::Serialize + Send + Sync + Clone + for<'a> Deserialize<'a>> RedisValue<T> {
    /// `bind` must be the generation read before `value` was loaded, so a
    /// rotation racing the load leaves the entry stale instead of fresh.
    fn new(value: T, lifetime: CacheLifetime, bind: Option<String>) -> Self {
        Self {
            value,
            _lifetime: lifetime,
            _bind: bind,
        }
    }

    async fn validate<K: ToString + Serialize>(
        &self,
        key: CacheKey<K>,
        cache: &mut MultiplexedConnection,
    ) -> Result<bool, Error> {
        self._lifetime
            .validate_cache_bind(&self._bind, key.into(), cache)
            .await
    }

    /// Returns the cached value under `key` while its binding holds, otherwise
    /// runs `callback` and caches what it found. `None` is never cached.
    pub async fn get_or_optional<'a, F, Fut, K>(
        key: CacheKey<K>,
        cache: &mut MultiplexedConnection,
        callback: F,
    ) -> Result<Option<RedisValue<T>>, Error>
    where
        K: ToString + Serialize + Clone + Send + Sync,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<Option<T>, Error>> + Send + 'a,
    {
        let value = get_cache_value::<String, RedisValue<T>>((&key).into(), cache)
            .await
            .unwrap_or_else(|_| {
                let mut c = cache.clone();
                let k = key.to_string();
                tokio::spawn(async move {
                    log::error!("> Failed to deserialize cached value. Deleting {}", &k);
                    if let Err(e) = delete_cache_value(k, &mut c).await {
                        log::error!("> Failed to delete cached value! {e}");
                    }
                });
                None
            });

        let value = match value {
            Some(value) => {
                log::trace!("> Found {:?}", key.to_string());
                match value.validate(key.to_owned(), cache).await? {
                    true => Some(value),
                    false => {
                        log::trace!("> Invalidated {}", key.to_string());
                        None
                    }
                }
            }
            None => None,
        };

        if let Some(value) = value {
            return Ok(Some(value));
        }

        log::trace!("> Fetching {:?}", key.to_string());
        let lifetime: CacheLifetime = key.to_owned().into();
        let bind = lifetime.get_cache_bind(cache).await?;

        match callback().await? {
            Some(value) => {
                let value = RedisValue::new(value, lifetime, bind);

                if let Err(e) =
                    set_cache_value::<String, RedisValue<T>>((&key).into(), value.clone(), cache)
                        .await
                {
                    log::error!("{e:?}");
                }

                Ok(Some(value))
            }
            None => Ok(None),
        }
    }
}

// Cache - raw handlers

pub async fn set_cache_value<K: ToRedisArgs + Send + Sync, V: ToRedisArgs + Send + Sync>(
    key: K,
    value: V,
    cache: &mut MultiplexedConnection,
) -> Result<(), Error> {
    let _: () = cache.set(key, value).await?;

    Ok(())
}

pub async fn delete_cache_value<K: ToRedisArgs + Send + Sync>(
    key: K,
    cache: &mut MultiplexedConnection,
) -> Result<(), Error> {
    let _: () = cache.del(key).await?;

    Ok(())
}

pub async fn get_cache_value<K: ToRedisArgs + Send + Sync, V: FromRedisValue>(
    key: K,
    cache: &mut MultiplexedConnection,
) -> Result<Option<V>, Error> {
    let value: Option<V> = cache.get(key).await?;

    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recipe_keys_bind_to_recipe_generation() {
        let key = CacheKeyType::Recipe.new(42);
        assert_eq!(key.to_string(), "recipe-42");

        let lifetime: CacheLifetime = key.into();
        assert_eq!(lifetime, CacheLifetime::BindRecipeCache);
        assert_eq!(lifetime.bind_key(), Some(RECIPE_CACHE_BIND_KEY));
        assert_eq!(CacheLifetime::Infinite.bind_key(), None);
    }

    #[test]
    fn test_redis_value_serializes_bind() {
        let value = RedisValue {
            value: vec![1, 2, 3],
            _lifetime: CacheLifetime::BindRecipeCache,
            _bind: Some("generation".to_string()),
        };
        let json = serde_json::to_string(&value).unwrap();
        let back: RedisValue<Vec<i32>> = serde_json::from_str(&json).unwrap();

        assert_eq!(back.value, vec![1, 2, 3]);
        assert_eq!(back._bind.as_deref(), Some("generation"));
    }

    #[test]
    fn test_value_loaded_across_rotation_is_stale() {
        // Generation read before the load, then a writer rotates
        let before = Some("generation-1".to_string());
        let value = RedisValue::new(vec![1], CacheLifetime::BindRecipeCache, before.clone());
        let after = Some("generation-2".to_string());

        assert!(is_current(&value._bind, &before));
        assert!(!is_current(&value._bind, &after));
    }
}
