use std::{env, fmt::Display, str::FromStr};

use rand::RngCore;

use crate::error::Error;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub redis_url: Option<String>,
    pub jwt_secret: Vec<u8>,
    pub token_lifetime_hours: i64,
    pub media_root: String,
    pub media_url: String,
}

impl Config {
    /// Reads the environment, after loading `.env` when one exists.
    pub fn load() -> Result<Self, Error> {
        dotenv::dotenv().ok();

        let jwt_secret = match var("JWT_SECRET") {
            Some(secret) => secret.into_bytes(),
            None => {
                log::warn!("JWT_SECRET not set, sessions will not survive a restart");
                let mut secret = vec![0u8; 32];
                rand::thread_rng().fill_bytes(&mut secret);
                secret
            }
        };

        Ok(Self {
            port: try_load("FOODGRAM_PORT", "8000")?,
            database_url: var("DATABASE_URL"),
            db_max_connections: try_load("DB_MAX_CONNECTIONS", "5")?,
            redis_url: var("REDIS_URL"),
            jwt_secret,
            token_lifetime_hours: try_load("TOKEN_LIFETIME_HOURS", "24")?,
            media_root: try_load("MEDIA_ROOT", "media")?,
            media_url: try_load("MEDIA_URL", "/media/")?,
        })
    }
}

fn var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn try_load<T: FromStr>(key: &str, default: &str) -> Result<T, Error>
where
    T::Err: Display,
{
    var(key)
        .unwrap_or_else(|| {
            log::info!("{key} not set, using default: {default}");
            default.to_string()
        })
        .parse()
        .map_err(|e| Error::internal(format!("Invalid {key} value: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_try_load_default_and_parse_error() {
        let port: u16 = try_load("FOODGRAM_TEST_UNSET_PORT", "8000").unwrap();
        assert_eq!(port, 8000);

        let result: Result<u16, Error> = try_load("FOODGRAM_TEST_UNSET_PORT", "not-a-port");
        assert!(result.is_err());
    }
}
