//! Access and refresh credentials.
//!
//! Access tokens are HS256 JWTs carrying `{userId, email, role}`. They are
//! verified by signature and expiry only, so a token stays valid until it
//! expires even after the user logs out or the refresh token is rotated.
//!
//! Refresh tokens are opaque random strings. Only their SHA-256 digest is
//! stored, next to the user row, so at most one refresh token per user is live.

pub mod claims;
pub mod cookies;
mod error;

pub use claims::{Claims, Identity, Role};
pub use error::Error;

use base64ct::{Base64UrlUnpadded, Encoding};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::{rngs::OsRng, RngCore};
use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};
use tracing::debug;

/// Default access-token lifetime (15 minutes).
pub const DEFAULT_ACCESS_TOKEN_TTL_SECONDS: i64 = 15 * 60;
/// Default refresh-token lifetime (7 days).
pub const DEFAULT_REFRESH_TOKEN_TTL_SECONDS: i64 = 7 * 24 * 60 * 60;
/// Clock skew tolerated when checking `exp`.
pub const VALIDATION_LEEWAY_SECONDS: u64 = 5;
/// HS256 secrets shorter than this are rejected at startup.
pub const MIN_SECRET_LEN: usize = 32;

const REFRESH_TOKEN_BYTES: usize = 32;

/// Signs and verifies access tokens with a shared HMAC secret.
pub struct TokenAuthority {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    access_ttl_seconds: i64,
}

impl TokenAuthority {
    /// # Errors
    /// Returns [`Error::WeakSecret`] if the secret is shorter than [`MIN_SECRET_LEN`].
    pub fn new(secret: &SecretString, access_ttl_seconds: i64) -> Result<Self, Error> {
        let secret = secret.expose_secret().as_bytes();
        if secret.len() < MIN_SECRET_LEN {
            return Err(Error::WeakSecret(MIN_SECRET_LEN));
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = VALIDATION_LEEWAY_SECONDS;

        Ok(Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
            access_ttl_seconds,
        })
    }

    #[must_use]
    pub fn access_ttl_seconds(&self) -> i64 {
        self.access_ttl_seconds
    }

    /// Mint a short-lived access token for `identity`.
    ///
    /// # Errors
    /// Returns an error if the claims cannot be signed.
    pub fn issue_access_token(&self, identity: &Identity) -> Result<String, Error> {
        self.sign(&Claims::new(identity, now_unix(), self.access_ttl_seconds))
    }

    /// Check signature and expiry. Never touches storage.
    ///
    /// # Errors
    /// Returns the internal failure reason; callers must not forward it.
    pub fn verify_access_token(&self, token: &str) -> Result<Identity, Error> {
        jsonwebtoken::decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims.into_identity())
            .map_err(|err| {
                let err = Error::from_verification(&err);
                debug!("access token rejected: {err}");
                err
            })
    }

    fn sign(&self, claims: &Claims) -> Result<String, Error> {
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
            .map_err(Error::Sign)
    }
}

impl std::fmt::Debug for TokenAuthority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenAuthority")
            .field("secret", &"***")
            .field("access_ttl_seconds", &self.access_ttl_seconds)
            .finish()
    }
}

/// Create a new opaque refresh token for the `refreshToken` cookie.
///
/// # Errors
/// Returns an error if the OS RNG fails.
pub fn generate_refresh_token() -> Result<String, Error> {
    let mut bytes = [0u8; REFRESH_TOKEN_BYTES];
    OsRng.try_fill_bytes(&mut bytes).map_err(Error::Entropy)?;
    Ok(Base64UrlUnpadded::encode_string(&bytes))
}

/// Digest stored in place of the raw refresh token.
#[must_use]
pub fn hash_refresh_token(token: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hasher.finalize().to_vec()
}

fn now_unix() -> i64 {
    i64::try_from(jsonwebtoken::get_current_timestamp()).unwrap_or(i64::MAX)
}
