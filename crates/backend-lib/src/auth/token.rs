// ============================
// backend-lib/src/auth/token.rs
// ============================
/** Signed bearer tokens.
Tokens are compact JWTs (`header.claims.signature`, base64url without
padding) signed with HMAC-SHA256. Expiry lives in the claims; the session
list in `session.rs` adds server-side revocation on top. */
use std::{
    fs,
    path::Path,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use hmac::{Hmac, Mac};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Minimum signing secret size in bytes
pub const MIN_SECRET_LEN: usize = 32;

/// File inside the data directory holding a generated secret
pub const SECRET_FILE: &str = "jwt_secret";

const HEADER: &str = r#"{"alg":"HS256","typ":"JWT"}"#;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("token secret is too short (min {MIN_SECRET_LEN} bytes)")]
    SecretTooShort,

    #[error("invalid token format")]
    InvalidFormat,

    #[error("unsupported token algorithm")]
    UnsupportedAlgorithm,

    #[error("token signature is invalid")]
    InvalidSignature,

    #[error("token is expired")]
    Expired,

    #[error("failed to decode token payload")]
    PayloadDecode,
}

#[derive(Debug, Deserialize)]
struct Header {
    alg: String,
}

/// Claims carried by an admin token
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    pub user_id: u64,
    pub username: String,
    pub role: String,
    /// Issued at, seconds since the epoch
    pub iat: u64,
    /// Expires at, seconds since the epoch
    pub exp: u64,
    /// Unique token id
    pub jti: String,
}

impl Claims {
    pub fn is_expired(&self, now_secs: u64) -> bool {
        now_secs >= self.exp
    }
}

/// Issues and verifies HS256 tokens
#[derive(Clone)]
pub struct TokenSigner {
    mac: HmacSha256,
}

impl std::fmt::Debug for TokenSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSigner").finish_non_exhaustive()
    }
}

impl TokenSigner {
    pub fn new(secret: Vec<u8>) -> Result<Self, TokenError> {
        if secret.len() < MIN_SECRET_LEN {
            return Err(TokenError::SecretTooShort);
        }
        let mac = HmacSha256::new_from_slice(&secret).map_err(|_| TokenError::SecretTooShort)?;
        Ok(Self { mac })
    }

    /** Use the configured secret, or load the persisted one from
    `data_dir`, generating and saving it on first start. */
    pub fn load_or_create(configured: Option<&str>, data_dir: &Path) -> anyhow::Result<Self> {
        if let Some(secret) = configured {
            return Ok(Self::new(secret.as_bytes().to_vec())?);
        }

        fs::create_dir_all(data_dir)?;
        let key_path = data_dir.join(SECRET_FILE);
        let secret = if key_path.exists() {
            let key_data = fs::read(&key_path)?;
            if key_data.len() < MIN_SECRET_LEN {
                return Err(anyhow::anyhow!("Invalid token secret length in {}", key_path.display()));
            }
            key_data
        } else {
            let mut key = vec![0u8; MIN_SECRET_LEN];
            rand::rng().fill_bytes(&mut key);
            fs::write(&key_path, &key)?;
            tracing::info!(path = %key_path.display(), "generated token signing secret");
            key
        };
        Ok(Self::new(secret)?)
    }

    /// Build claims for a user, valid for `ttl` from now
    pub fn claims_for(&self, user_id: u64, username: &str, role: &str, ttl: Duration) -> Claims {
        let iat = now_secs();
        Claims {
            user_id,
            username: username.to_string(),
            role: role.to_string(),
            iat,
            exp: iat.saturating_add(ttl.as_secs()),
            jti: uuid::Uuid::new_v4().to_string(),
        }
    }

    /// Sign claims into a compact token
    pub fn issue(&self, claims: &Claims) -> Result<String, TokenError> {
        let payload = serde_json::to_vec(claims).map_err(|_| TokenError::PayloadDecode)?;
        let signing_input = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(HEADER),
            URL_SAFE_NO_PAD.encode(payload)
        );
        let signature = self.sign(signing_input.as_bytes());
        Ok(format!("{signing_input}.{}", URL_SAFE_NO_PAD.encode(signature)))
    }

    /// Check signature and expiry, returning the claims
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        self.verify_at(token, now_secs())
    }

    fn verify_at(&self, token: &str, now: u64) -> Result<Claims, TokenError> {
        let mut parts = token.split('.');
        let (Some(header), Some(payload), Some(signature), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(TokenError::InvalidFormat);
        };

        let header_bytes = URL_SAFE_NO_PAD
            .decode(header)
            .map_err(|_| TokenError::InvalidFormat)?;
        let header: Header =
            serde_json::from_slice(&header_bytes).map_err(|_| TokenError::InvalidFormat)?;
        if header.alg != "HS256" {
            return Err(TokenError::UnsupportedAlgorithm);
        }

        let signature = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| TokenError::InvalidFormat)?;
        let signing_input_len = token.len() - signature_len(token);
        let mut mac = self.mac.clone();
        mac.update(&token.as_bytes()[..signing_input_len]);
        mac.verify_slice(&signature)
            .map_err(|_| TokenError::InvalidSignature)?;

        let payload = URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|_| TokenError::PayloadDecode)?;
        let claims: Claims =
            serde_json::from_slice(&payload).map_err(|_| TokenError::PayloadDecode)?;

        if claims.is_expired(now) {
            return Err(TokenError::Expired);
        }
        Ok(claims)
    }

    fn sign(&self, input: &[u8]) -> Vec<u8> {
        let mut mac = self.mac.clone();
        mac.update(input);
        mac.finalize().into_bytes().to_vec()
    }
}

/// Length of the signature segment plus its leading dot
fn signature_len(token: &str) -> usize {
    token.rfind('.').map_or(0, |idx| token.len() - idx)
}

pub(crate) fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}
