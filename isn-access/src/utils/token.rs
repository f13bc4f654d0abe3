//! Opaque token generation and digests.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha512};
use subtle::ConstantTimeEq;

/// Refresh tokens and client secrets carry 256 bits of entropy.
pub const OPAQUE_TOKEN_BYTES: usize = 32;

/// Generate `byte_length` random bytes from the OS CSPRNG, URL-safe base64 encoded.
///
/// An RNG failure is returned to the caller; there is no fallback source.
pub fn generate_secure_token(byte_length: usize) -> Result<String, anyhow::Error> {
    if byte_length == 0 {
        return Err(anyhow::anyhow!("Token length must be positive"));
    }

    let mut buf = vec![0u8; byte_length];
    OsRng
        .try_fill_bytes(&mut buf)
        .map_err(|e| anyhow::anyhow!("Failed to read from OS random source: {}", e))?;

    Ok(URL_SAFE_NO_PAD.encode(buf))
}

/// Deterministic one-way digest used to store refresh tokens and client secrets.
pub fn hash_opaque_token(token: &str) -> String {
    let digest = Sha512::digest(token.as_bytes());
    URL_SAFE_NO_PAD.encode(digest)
}

/// Constant-time equality of two stored digests.
pub fn digests_match(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}
