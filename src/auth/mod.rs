use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::user::User;
use crate::store::Store;

const KEY_CONTEXT: &str = "delivery-tracker v1 bearer token";

/// The identity a bearer credential resolves to. Anything that fails
/// validation degrades to `Anonymous`; authentication never errors.
#[derive(Debug, Clone)]
pub enum Identity {
    Anonymous,
    User(User),
}

impl Identity {
    pub fn is_anonymous(&self) -> bool {
        matches!(self, Identity::Anonymous)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: Uuid,
    exp: i64,
}

/// Validates signed bearer tokens of the form
/// `base64url(claims).hex(keyed-hash)`. The signing key is derived from the
/// configured secret.
#[derive(Clone)]
pub struct TokenAuthenticator {
    key: [u8; 32],
}

impl TokenAuthenticator {
    pub fn new(secret: &str) -> Self {
        Self {
            key: blake3::derive_key(KEY_CONTEXT, secret.as_bytes()),
        }
    }

    /// Mints a token for a user id. Token refresh and revocation are out of
    /// scope; callers pick the lifetime.
    pub fn issue(&self, user_id: Uuid, ttl: Duration) -> String {
        let claims = Claims {
            sub: user_id,
            exp: (Utc::now() + ttl).timestamp(),
        };
        let encoded = serde_json::to_vec(&claims).expect("claims serialize");
        let payload = URL_SAFE_NO_PAD.encode(encoded);
        let tag = blake3::keyed_hash(&self.key, payload.as_bytes());
        format!("{payload}.{}", tag.to_hex())
    }

    /// Resolves a bearer token to an identity. Malformed, tampered, or
    /// expired tokens, and tokens for unknown users, all resolve to
    /// `Identity::Anonymous`.
    pub fn resolve(&self, token: Option<&str>, store: &Store) -> Identity {
        let Some(token) = token else {
            return Identity::Anonymous;
        };

        match self.verify(token) {
            Some(user_id) => match store.get_user(user_id) {
                Some(user) => Identity::User(user),
                None => Identity::Anonymous,
            },
            None => Identity::Anonymous,
        }
    }

    fn verify(&self, token: &str) -> Option<Uuid> {
        let (payload, tag_hex) = token.split_once('.')?;

        let expected = blake3::keyed_hash(&self.key, payload.as_bytes());
        let presented = blake3::Hash::from_hex(tag_hex).ok()?;
        // blake3::Hash equality is constant-time.
        if expected != presented {
            return None;
        }

        let decoded = URL_SAFE_NO_PAD.decode(payload).ok()?;
        let claims: Claims = serde_json::from_slice(&decoded).ok()?;
        if claims.exp < Utc::now().timestamp() {
            return None;
        }

        Some(claims.sub)
    }
}
