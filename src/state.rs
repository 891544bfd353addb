use std::sync::Arc;

use chrono::Duration;
use redis::aio::MultiplexedConnection;

use crate::{
    actions::recipes::{get_recipe_aggregate, RecipeAggregate},
    cache::cache::{CacheKeyType, CacheLifetime, RedisValue},
    config::Config,
    error::Error,
    images::ImageStore,
    jwt::SessionKeys,
    memory::MemoryStore,
    postgres::PgStore,
    schema::Id,
    store::Store,
};

/// Shared by every request handler.
pub struct Context {
    pub store: Arc<dyn Store>,
    pub keys: SessionKeys,
    pub images: ImageStore,
    pub cache: Option<MultiplexedConnection>,
}

impl Context {
    pub fn new(store: Arc<dyn Store>, keys: SessionKeys, images: ImageStore) -> Self {
        Self {
            store,
            keys,
            images,
            cache: None,
        }
    }

    pub fn with_cache(mut self, cache: MultiplexedConnection) -> Self {
        self.cache = Some(cache);
        self
    }

    pub async fn from_config(config: &Config) -> Result<Arc<Self>, Error> {
        let store: Arc<dyn Store> = match &config.database_url {
            Some(url) => {
                log::info!("Connecting to database...");
                Arc::new(PgStore::connect(url, config.db_max_connections).await?)
            }
            None => {
                log::warn!("DATABASE_URL not set, using in-memory store; data is lost on exit");
                Arc::new(MemoryStore::new())
            }
        };

        let keys = SessionKeys::new(
            &config.jwt_secret,
            Duration::hours(config.token_lifetime_hours),
        )?;
        let images = ImageStore::new(&config.media_root, config.media_url.to_owned());
        let context = Self::new(store, keys, images);

        let context = match &config.redis_url {
            Some(url) => {
                log::info!("Connecting to redis...");
                let client = redis::Client::open(url.as_str())?;
                context.with_cache(client.get_multiplexed_async_connection().await?)
            }
            None => {
                log::info!("REDIS_URL not set, recipe cache disabled");
                context
            }
        };

        Ok(Arc::new(context))
    }

    pub fn store(&self) -> &dyn Store {
        self.store.as_ref()
    }

    /// Loads a recipe aggregate, through the cache when one is configured.
    ///
    /// Cache failures are logged and answered from the store.
    pub async fn recipe_aggregate(&self, id: Id) -> Result<Option<RecipeAggregate>, Error> {
        let Some(cache) = &self.cache else {
            return get_recipe_aggregate(id, self.store()).await;
        };

        let mut cache = cache.clone();
        let store = self.store.clone();
        let cached = RedisValue::get_or_optional(
            CacheKeyType::Recipe.new(id),
            &mut cache,
            move || async move { get_recipe_aggregate(id, store.as_ref()).await },
        )
        .await;

        match cached {
            Ok(value) => Ok(value.map(|v| v.value)),
            Err(Error::NotFound(e)) => Err(Error::NotFound(e)),
            Err(e) => {
                log::error!("> Recipe cache unavailable: {e}");
                get_recipe_aggregate(id, self.store()).await
            }
        }
    }

    /// Marks every cached recipe aggregate stale.
    pub async fn invalidate_recipes(&self) {
        if let Some(cache) = &self.cache {
            let mut cache = cache.clone();
            if let Err(e) = CacheLifetime::BindRecipeCache.rotate(&mut cache).await {
                log::error!("> Failed to invalidate recipe cache: {e}");
            }
        }
    }
}
