//! Argon2id password hashing.
//!
//! Hashing and verification run on the blocking pool. `verify` always performs
//! exactly one Argon2 verification, even when there is no usable digest, so
//! "unknown account" and "wrong password" cost the same.

use anyhow::anyhow;
use argon2::{
    Algorithm, Argon2, Params, PasswordHash, PasswordHasher as _, PasswordVerifier, Version,
    password_hash::SaltString,
};
use base64::Engine;
use once_cell::sync::OnceCell;
use rand::{RngCore, rngs::OsRng};
use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;

use super::error::AuthError;

/// Stored in place of a digest for accounts that may only log in through a
/// federated provider. PHC strings start with `$`, so this never parses and
/// never verifies.
pub const FEDERATED_ONLY_DIGEST: &str = "!federated-only";

#[derive(Clone, Debug)]
pub struct PasswordHasher {
    params: Params,
    dummy_digest: Arc<OnceCell<String>>,
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self::with_params(Params::default())
    }
}

impl PasswordHasher {
    #[must_use]
    pub fn with_params(params: Params) -> Self {
        Self {
            params,
            dummy_digest: Arc::new(OnceCell::new()),
        }
    }

    /// Produce a salted PHC digest for `password`.
    ///
    /// # Errors
    /// Returns [`AuthError::Hashing`] if Argon2 or the blocking pool fails.
    pub async fn hash(&self, password: &SecretString) -> Result<String, AuthError> {
        let password = password.clone();
        let params = self.params.clone();
        tokio::task::spawn_blocking(move || hash_blocking(&params, password.expose_secret()))
            .await
            .map_err(|err| AuthError::Hashing(anyhow!("hashing task failed: {err}")))?
    }

    /// Check `password` against `digest`. A missing, sentinel or malformed
    /// digest yields `false`.
    ///
    /// # Errors
    /// Returns [`AuthError::Hashing`] only on resource failures.
    pub async fn verify(
        &self,
        password: &SecretString,
        digest: Option<&str>,
    ) -> Result<bool, AuthError> {
        let password = password.clone();
        let digest = digest.map(str::to_owned);
        let params = self.params.clone();
        let dummy = Arc::clone(&self.dummy_digest);
        tokio::task::spawn_blocking(move || {
            verify_blocking(&params, &dummy, password.expose_secret(), digest.as_deref())
        })
        .await
        .map_err(|err| AuthError::Hashing(anyhow!("verification task failed: {err}")))?
    }
}

fn argon2(params: &Params) -> Argon2<'static> {
    Argon2::new(Algorithm::Argon2id, Version::V0x13, params.clone())
}

fn hash_blocking(params: &Params, password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    argon2(params)
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| AuthError::Hashing(anyhow!("failed to hash password: {err}")))
}

fn verify_blocking(
    params: &Params,
    dummy: &OnceCell<String>,
    password: &str,
    digest: Option<&str>,
) -> Result<bool, AuthError> {
    let argon2 = argon2(params);

    if let Some(parsed) = digest.and_then(|digest| PasswordHash::new(digest).ok()) {
        return Ok(argon2.verify_password(password.as_bytes(), &parsed).is_ok());
    }

    let dummy = dummy.get_or_try_init(|| hash_blocking(params, &unguessable_secret()))?;
    if let Ok(parsed) = PasswordHash::new(dummy) {
        let _ = argon2.verify_password(password.as_bytes(), &parsed);
    }

    Ok(false)
}

fn unguessable_secret() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) fn test_hasher() -> PasswordHasher {
    PasswordHasher::with_params(Params::new(8, 1, 1, None).unwrap())
}
