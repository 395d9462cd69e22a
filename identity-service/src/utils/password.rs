use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use std::fmt;
use std::sync::{Arc, OnceLock};

/// Newtype for password to prevent accidental logging
#[derive(Clone)]
pub struct Password(String);

impl Password {
    pub fn new(password: impl Into<String>) -> Self {
        Self(password.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Password(<redacted>)")
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

/// Argon2id hasher with configurable cost.
///
/// Verification always uses the parameters embedded in the stored PHC string,
/// so changing the cost only affects hashes produced afterwards.
#[derive(Clone)]
pub struct CredentialHasher {
    argon2: Arc<Argon2<'static>>,
    dummy_hash: Arc<OnceLock<String>>,
}

impl Default for CredentialHasher {
    fn default() -> Self {
        Self::from_argon2(Argon2::default())
    }
}

impl CredentialHasher {
    /// Build a hasher from explicit Argon2id costs (memory in KiB).
    pub fn with_cost(
        memory_kib: u32,
        iterations: u32,
        parallelism: u32,
    ) -> Result<Self, anyhow::Error> {
        let params = Params::new(memory_kib, iterations, parallelism, None)
            .map_err(|e| anyhow::anyhow!("Invalid Argon2 parameters: {}", e))?;
        Ok(Self::from_argon2(Argon2::new(
            Algorithm::Argon2id,
            Version::V0x13,
            params,
        )))
    }

    fn from_argon2(argon2: Argon2<'static>) -> Self {
        Self {
            argon2: Arc::new(argon2),
            dummy_hash: Arc::new(OnceLock::new()),
        }
    }

    /// Hash a password using Argon2id.
    ///
    /// Salt is generated per call and included in the hash.
    pub fn hash(&self, password: &Password) -> Result<PasswordHashString, anyhow::Error> {
        let salt = SaltString::generate(&mut OsRng);

        let password_hash = self
            .argon2
            .hash_password(password.as_str().as_bytes(), &salt)
            .map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))?
            .to_string();

        Ok(PasswordHashString::new(password_hash))
    }

    /// Verify a password against a stored hash.
    ///
    /// Malformed hashes verify as `false`; the comparison inside argon2 is
    /// constant-time.
    pub fn verify(&self, password: &Password, password_hash: &str) -> bool {
        let Ok(parsed_hash) = PasswordHash::new(password_hash) else {
            tracing::error!("Stored password hash is not a valid PHC string");
            return false;
        };

        self.argon2
            .verify_password(password.as_str().as_bytes(), &parsed_hash)
            .is_ok()
    }

    /// Run a verification that can never succeed, so that unknown accounts
    /// cost the same as known ones.
    pub fn verify_dummy(&self, password: &Password) {
        let hash = self.dummy_hash.get_or_init(|| {
            self.hash(&Password::new("dummy-password-for-timing"))
                .map(PasswordHashString::into_string)
                .unwrap_or_default()
        });
        let _ = self.verify(password, hash);
    }
}
