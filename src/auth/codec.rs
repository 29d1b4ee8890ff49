//! Signed, self-expiring session tokens.
//!
//! Wire format: `base64url(json claims) "." base64url(hmac_sha256(first part))`,
//! both unpadded. The claims are only parsed after a MAC check succeeds.

use base64ct::{Base64UrlUnpadded, Encoding};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("at least one signing secret is required")]
    NoSecrets,
    #[error("invalid signing key")]
    Key,
    #[error("failed to serialize session claims")]
    Json(#[from] serde_json::Error),
}

/// The only data a session token carries.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionPayload {
    pub user_id: String,
}

impl SessionPayload {
    #[must_use]
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
        }
    }
}

#[derive(Serialize, Deserialize)]
struct Claims {
    uid: String,
    exp: i64,
}

/// Sign `payload` with the first secret, expiring `max_age_seconds` from now.
///
/// # Errors
/// Returns an error if `secrets` is empty.
pub fn encode(
    payload: &SessionPayload,
    secrets: &[SecretString],
    max_age_seconds: i64,
) -> Result<String, CodecError> {
    encode_at(payload, secrets, max_age_seconds, unix_now())
}

/// Verify and decode a token against every trusted secret.
///
/// Returns `None` for a malformed, forged, tampered or expired token.
#[must_use]
pub fn decode(token: &str, secrets: &[SecretString]) -> Option<SessionPayload> {
    decode_at(token, secrets, unix_now())
}

pub(crate) fn encode_at(
    payload: &SessionPayload,
    secrets: &[SecretString],
    max_age_seconds: i64,
    now: i64,
) -> Result<String, CodecError> {
    // Newest secret first: it is the only one used for signing.
    let secret = secrets.first().ok_or(CodecError::NoSecrets)?;

    let claims = Claims {
        uid: payload.user_id.clone(),
        exp: now.saturating_add(max_age_seconds),
    };
    let body = Base64UrlUnpadded::encode_string(&serde_json::to_vec(&claims)?);
    let signature = Base64UrlUnpadded::encode_string(&sign(secret, body.as_bytes())?);

    Ok(format!("{body}.{signature}"))
}

pub(crate) fn decode_at(token: &str, secrets: &[SecretString], now: i64) -> Option<SessionPayload> {
    let (body, encoded_signature) = token.split_once('.')?;
    if body.is_empty() || encoded_signature.contains('.') {
        return None;
    }
    let signature = Base64UrlUnpadded::decode_vec(encoded_signature).ok()?;
    // Reject non-canonical encodings so every byte of the token is significant.
    if Base64UrlUnpadded::encode_string(&signature) != encoded_signature {
        return None;
    }

    if !secrets
        .iter()
        .any(|secret| verify(secret, body.as_bytes(), &signature))
    {
        return None;
    }

    let claims: Claims = serde_json::from_slice(&Base64UrlUnpadded::decode_vec(body).ok()?).ok()?;
    if now >= claims.exp || claims.uid.is_empty() {
        return None;
    }

    Some(SessionPayload { user_id: claims.uid })
}

fn mac(secret: &SecretString, message: &[u8]) -> Option<HmacSha256> {
    let mut mac = HmacSha256::new_from_slice(secret.expose_secret().as_bytes()).ok()?;
    mac.update(message);
    Some(mac)
}

fn sign(secret: &SecretString, message: &[u8]) -> Result<Vec<u8>, CodecError> {
    let mac = mac(secret, message).ok_or(CodecError::Key)?;
    Ok(mac.finalize().into_bytes().to_vec())
}

// Constant-time comparison via `verify_slice`.
fn verify(secret: &SecretString, message: &[u8], signature: &[u8]) -> bool {
    mac(secret, message).is_some_and(|mac| mac.verify_slice(signature).is_ok())
}

pub(crate) fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| i64::try_from(elapsed.as_secs()).unwrap_or(i64::MAX))
}
