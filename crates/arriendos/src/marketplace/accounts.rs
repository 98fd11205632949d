use tracing::{info, warn};

use super::domain::{NewUser, User};
use super::repository::{MarketplaceRepository, RepositoryError};
use super::service::{Marketplace, MarketplaceError};
use super::sessions::SessionToken;
use super::validation::{
    FormErrors, LoginForm, ProfileForm, RegistrationForm, PASSWORD_MAX_LEN,
};
use super::views::{SessionView, UserView};

impl<R> Marketplace<R>
where
    R: MarketplaceRepository + 'static,
{
    /// Register a tenant or landlord and log them in.
    pub fn register(&self, form: RegistrationForm) -> Result<SessionView, MarketplaceError> {
        let registration = form.validate()?;
        let password_hash = self.passwords.hash(&registration.password)?;

        let user = self
            .repository
            .insert_user(NewUser {
                username: registration.username,
                password_hash,
                first_names: registration.first_names,
                last_names: registration.last_names,
                rut: registration.rut,
                address: registration.address,
                phone: registration.phone,
                email: registration.email,
                role: registration.role,
            })
            .map_err(|err| match err {
                RepositoryError::Conflict => MarketplaceError::Validation(FormErrors::single(
                    "username",
                    "ya existe un usuario con este nombre",
                )),
                other => other.into(),
            })?;

        info!(user_id = %user.id, role = user.role.label(), "user registered");
        self.open_session(&user)
    }

    pub fn login(&self, form: LoginForm) -> Result<SessionView, MarketplaceError> {
        if form.password.chars().count() > PASSWORD_MAX_LEN {
            return Err(MarketplaceError::InvalidCredentials);
        }
        let Some(user) = self.repository.user_by_username(form.username.trim())? else {
            return Err(MarketplaceError::InvalidCredentials);
        };
        if !self.passwords.verify(&form.password, &user.password_hash)? {
            warn!(user_id = %user.id, "rejected login attempt");
            return Err(MarketplaceError::InvalidCredentials);
        }
        self.open_session(&user)
    }

    pub fn logout(&self, token: &SessionToken) -> Result<(), MarketplaceError> {
        self.sessions.revoke(token)?;
        Ok(())
    }

    /// Resolve a bearer token to the user it was issued for.
    pub fn authenticate(&self, token: &SessionToken) -> Result<User, MarketplaceError> {
        let user_id = self
            .sessions
            .resolve(token)?
            .ok_or(MarketplaceError::Unauthenticated)?;
        self.repository
            .user(user_id)?
            .ok_or(MarketplaceError::Unauthenticated)
    }

    /// Update the editable profile subset: names and e-mail.
    pub fn update_profile(
        &self,
        user: &User,
        form: ProfileForm,
    ) -> Result<UserView, MarketplaceError> {
        let profile = form.validate()?;
        let mut updated = user.clone();
        updated.first_names = profile.first_names;
        updated.last_names = profile.last_names;
        updated.email = profile.email;

        self.repository.update_user(updated.clone())?;
        info!(user_id = %updated.id, "profile updated");
        Ok(UserView::from(&updated))
    }

    fn open_session(&self, user: &User) -> Result<SessionView, MarketplaceError> {
        let token = self.sessions.issue(user.id)?;
        Ok(SessionView {
            token,
            user: UserView::from(user),
        })
    }
}
