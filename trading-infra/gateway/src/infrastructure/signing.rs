//! HMAC-SHA256 request signing for authenticated REST calls

use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

#[derive(Error, Debug)]
#[error("invalid signing key: {0}")]
pub struct SignError(#[from] hmac::digest::InvalidLength);

/// Canonical signed query string.
///
/// `timestamp=<ms>` is appended to `query` (joined with `&` unless the
/// query is empty), the signature is HMAC-SHA256 over that extended query
/// immediately followed by `body`, and `&signature=<hex>` is appended.
/// The byte layout must match exactly or the exchange rejects the request.
pub fn sign_query(
    secret: &str,
    query: &str,
    body: &str,
    timestamp_ms: i64,
) -> Result<String, SignError> {
    let mut signed = String::with_capacity(query.len() + 96);
    signed.push_str(query);
    if !signed.is_empty() {
        signed.push('&');
    }
    signed.push_str("timestamp=");
    signed.push_str(&timestamp_ms.to_string());

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())?;
    mac.update(signed.as_bytes());
    mac.update(body.as_bytes());
    let signature = hex::encode(mac.finalize().into_bytes());

    signed.push_str("&signature=");
    signed.push_str(&signature);
    Ok(signed)
}
