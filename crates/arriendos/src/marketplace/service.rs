use std::sync::Arc;

use chrono::Duration;

use super::credentials::{CredentialError, PasswordHasherService};
use super::repository::{MarketplaceRepository, RepositoryError};
use super::sessions::SessionStore;
use super::validation::FormErrors;

/// Facade composing the repository, credential hashing and session tracking.
///
/// Operations are grouped by concern in sibling modules: `accounts`, `listings`, `lifecycle`
/// and `queries`. Each one receives the authenticated user, or a role capability derived from
/// it, as an explicit argument.
pub struct Marketplace<R> {
    pub(crate) repository: Arc<R>,
    pub(crate) sessions: SessionStore,
    pub(crate) passwords: PasswordHasherService,
}

impl<R> Marketplace<R>
where
    R: MarketplaceRepository + 'static,
{
    pub fn new(repository: Arc<R>, passwords: PasswordHasherService) -> Self {
        Self {
            repository,
            sessions: SessionStore::default(),
            passwords,
        }
    }

    /// Replace the session store with one whose tokens expire after `ttl`.
    pub fn with_session_ttl(mut self, ttl: Duration) -> Self {
        self.sessions = SessionStore::with_ttl(ttl);
        self
    }

    pub fn repository(&self) -> &Arc<R> {
        &self.repository
    }
}

/// Why an authenticated user may not perform an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Forbidden {
    #[error("solo los arrendatarios pueden realizar esta acción")]
    TenantsOnly,
    #[error("solo los arrendadores pueden realizar esta acción")]
    LandlordsOnly,
    #[error("el inmueble pertenece a otro arrendador")]
    NotPropertyOwner,
    #[error("la solicitud pertenece a otro arrendatario")]
    NotRequestOwner,
}

impl Forbidden {
    /// Page the caller is sent back to.
    pub fn redirect_to(&self) -> &'static str {
        match self {
            Forbidden::TenantsOnly | Forbidden::LandlordsOnly => "/",
            Forbidden::NotPropertyOwner | Forbidden::NotRequestOwner => "/dashboard",
        }
    }
}

/// Error raised by the marketplace services.
#[derive(Debug, thiserror::Error)]
pub enum MarketplaceError {
    #[error("{0}")]
    Validation(FormErrors),
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: u64 },
    #[error(transparent)]
    Forbidden(#[from] Forbidden),
    #[error("authentication required")]
    Unauthenticated,
    #[error("invalid username or password")]
    InvalidCredentials,
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Credential(#[from] CredentialError),
}

impl From<FormErrors> for MarketplaceError {
    fn from(errors: FormErrors) -> Self {
        Self::Validation(errors)
    }
}

impl MarketplaceError {
    pub(crate) fn not_found(entity: &'static str, id: u64) -> Self {
        Self::NotFound { entity, id }
    }
}
