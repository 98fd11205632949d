use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::SaltString;
use argon2::{Algorithm, Argon2, Params, PasswordHash, PasswordHasher, PasswordVerifier, Version};

/// Argon2id hashing of user passwords, optionally keyed with a server-side pepper.
#[derive(Clone, Default)]
pub struct PasswordHasherService {
    pepper: Option<String>,
}

impl std::fmt::Debug for PasswordHasherService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasswordHasherService")
            .field("peppered", &self.pepper.is_some())
            .finish()
    }
}

impl PasswordHasherService {
    pub fn new(pepper: Option<String>) -> Self {
        Self { pepper }
    }

    fn argon2(&self) -> Result<Argon2<'_>, CredentialError> {
        match &self.pepper {
            Some(pepper) => Argon2::new_with_secret(
                pepper.as_bytes(),
                Algorithm::Argon2id,
                Version::V0x13,
                Params::default(),
            )
            .map_err(|err| CredentialError::Hashing(err.to_string())),
            None => Ok(Argon2::default()),
        }
    }

    /// Hash `password` into a PHC string.
    pub fn hash(&self, password: &str) -> Result<String, CredentialError> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2()?
            .hash_password(password.as_bytes(), &salt)
            .map_err(|err| CredentialError::Hashing(err.to_string()))?;
        Ok(hash.to_string())
    }

    /// Returns `Ok(false)` on a mismatch; malformed stored hashes are errors.
    pub fn verify(&self, password: &str, stored_hash: &str) -> Result<bool, CredentialError> {
        let parsed = PasswordHash::new(stored_hash)
            .map_err(|err| CredentialError::MalformedHash(err.to_string()))?;
        match self.argon2()?.verify_password(password.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(err) => Err(CredentialError::Hashing(err.to_string())),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("password hashing failed: {0}")]
    Hashing(String),
    #[error("stored password hash is malformed: {0}")]
    MalformedHash(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashes_are_salted_phc_strings() {
        let hasher = PasswordHasherService::default();
        let first = hasher.hash("contraseña-segura").expect("hash");
        let second = hasher.hash("contraseña-segura").expect("hash");

        assert!(first.starts_with("$argon2id$"));
        assert_ne!(first, second);
        assert!(hasher.verify("contraseña-segura", &first).expect("verify"));
        assert!(!hasher.verify("otra-clave", &first).expect("verify"));
    }

    #[test]
    fn pepper_is_required_to_verify_peppered_hashes() {
        let peppered = PasswordHasherService::new(Some("pimienta".to_string()));
        let hash = peppered.hash("clave-larga-1").expect("hash");

        assert!(peppered.verify("clave-larga-1", &hash).expect("verify"));
        assert!(!PasswordHasherService::default()
            .verify("clave-larga-1", &hash)
            .expect("verify"));
    }

    #[test]
    fn malformed_hash_is_an_error() {
        let hasher = PasswordHasherService::default();
        assert!(matches!(
            hasher.verify("x", "not-a-phc-string"),
            Err(CredentialError::MalformedHash(_))
        ));
    }
}
