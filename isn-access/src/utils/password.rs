use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use std::fmt;
use std::sync::OnceLock;

/// Argon2id memory cost in KiB.
const ARGON2_MEMORY_KIB: u32 = 19_456;
/// Argon2id iteration count.
const ARGON2_ITERATIONS: u32 = 2;
/// Argon2id degree of parallelism.
const ARGON2_PARALLELISM: u32 = 1;

/// Newtype for password to prevent accidental logging
#[derive(Clone)]
pub struct Password(String);

impl Password {
    pub fn new(password: String) -> Self {
        Self(password)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Password(***)")
    }
}

/// Newtype for password hash
#[derive(Debug, Clone)]
pub struct PasswordHashString(String);

impl PasswordHashString {
    pub fn new(hash: String) -> Self {
        Self(hash)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

fn hasher() -> Result<Argon2<'static>, anyhow::Error> {
    let params = Params::new(
        ARGON2_MEMORY_KIB,
        ARGON2_ITERATIONS,
        ARGON2_PARALLELISM,
        None,
    )
    .map_err(|e| anyhow::anyhow!("Invalid Argon2 parameters: {}", e))?;
    Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
}

/// Hash a password using Argon2id
///
/// Salt is generated from the OS RNG and embedded in the PHC string along
/// with the cost parameters.
pub fn hash_password(password: &Password) -> Result<PasswordHashString, anyhow::Error> {
    let salt = SaltString::generate(&mut OsRng);

    let password_hash = hasher()?
        .hash_password(password.as_str().as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))?
        .to_string();

    Ok(PasswordHashString::new(password_hash))
}

/// Verify a password against a hash
///
/// Returns Ok(()) if password matches, Err otherwise, including when the
/// stored hash is not a valid PHC string. Comparison is done by the Argon2
/// verifier in constant time.
pub fn verify_password(
    password: &Password,
    password_hash: &PasswordHashString,
) -> Result<(), anyhow::Error> {
    let parsed_hash = PasswordHash::new(password_hash.as_str())
        .map_err(|e| anyhow::anyhow!("Invalid password hash format: {}", e))?;

    hasher()?
        .verify_password(password.as_str().as_bytes(), &parsed_hash)
        .map_err(|_| anyhow::anyhow!("Password verification failed"))
}

static DUMMY_HASH: OnceLock<Option<PasswordHashString>> = OnceLock::new();

/// Hash with the live cost parameters, built on first use.
fn dummy_hash() -> Option<&'static PasswordHashString> {
    DUMMY_HASH
        .get_or_init(|| {
            hash_password(&Password::new("isn-access-dummy".to_string()))
                .map_err(|e| tracing::error!(error = %e, "Failed to build dummy password hash"))
                .ok()
        })
        .as_ref()
}

/// Run one Argon2 verification against a throwaway hash, so a login for an
/// unknown email costs the same as one with a wrong password.
pub fn verify_dummy_password(password: &Password) {
    if let Some(hash) = dummy_hash() {
        let _ = verify_password(password, hash);
    }
}
