use chrono::Duration;
use chrono::Utc;
use hmac::{Hmac, Mac};
use jwt::SignWithKey;
use jwt::VerifyWithKey;
use serde::Deserialize;
use serde::Serialize;
use sha2::Sha256;

use crate::error::Error;
use crate::schema::{Id, User};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct JwtSessionData {
    pub user_id: Id,
    pub username: String,
    iat: i64,
    exp: i64,
}

impl JwtSessionData {
    pub fn new(id: Id, username: String, lifetime: Duration) -> Self {
        let now = Utc::now();
        let iat = now.timestamp();
        let exp = (now + lifetime).timestamp();

        Self {
            user_id: id,
            username,
            iat,
            exp,
        }
    }
}

/// The authenticated caller of a request.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct SessionData {
    pub user_id: Id,
    pub username: String,
}

impl From<JwtSessionData> for SessionData {
    fn from(value: JwtSessionData) -> Self {
        SessionData {
            user_id: value.user_id,
            username: value.username,
        }
    }
}

/// Signs and verifies session tokens with a process-wide secret.
#[derive(Clone)]
pub struct SessionKeys {
    key: Hmac<Sha256>,
    lifetime: Duration,
}

impl SessionKeys {
    pub fn new(secret: &[u8], lifetime: Duration) -> Result<Self, Error> {
        let key = Hmac::new_from_slice(secret)
            .map_err(|_| Error::internal("Invalid session secret"))?;

        Ok(Self { key, lifetime })
    }

    pub fn generate_session(&self, user: &User) -> Result<String, Error> {
        let claims = JwtSessionData::new(user.id, user.username.to_owned(), self.lifetime);

        claims
            .sign_with_key(&self.key)
            .map_err(|e| Error::internal(format!("Failed to sign session: {e}")))
    }

    pub fn verify_session(&self, token: &str) -> Result<SessionData, Error> {
        let session: JwtSessionData = token
            .verify_with_key(&self.key)
            .map_err(|_| Error::unauthorized("Invalid session; Invalid token"))?;

        let now = Utc::now().timestamp();
        if (session.exp - now).is_negative() {
            return Err(Error::unauthorized("Invalid session; Token expired"));
        }

        Ok(session.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> User {
        User {
            id: 7,
            email: "a@b.c".to_string(),
            username: "chef".to_string(),
            first_name: "A".to_string(),
            last_name: "B".to_string(),
            password: String::new(),
        }
    }

    #[test]
    fn test_session_round_trip() {
        let keys = SessionKeys::new(b"secret", Duration::hours(1)).unwrap();
        let token = keys.generate_session(&user()).unwrap();
        let session = keys.verify_session(&token).unwrap();

        assert_eq!(session.user_id, 7);
        assert_eq!(session.username, "chef");
    }

    #[test]
    fn test_expired_and_foreign_tokens_are_rejected() {
        let expired = SessionKeys::new(b"secret", Duration::hours(-1)).unwrap();
        let token = expired.generate_session(&user()).unwrap();
        assert!(matches!(
            expired.verify_session(&token),
            Err(Error::Unauthorized(_))
        ));

        let keys = SessionKeys::new(b"secret", Duration::hours(1)).unwrap();
        let other = SessionKeys::new(b"other", Duration::hours(1)).unwrap();
        let token = other.generate_session(&user()).unwrap();
        assert!(keys.verify_session(&token).is_err());
        assert!(keys.verify_session("garbage").is_err());
    }
}
