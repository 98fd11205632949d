//! Property rental marketplace: listings, rental requests and the availability flag they drive.
//!
//! [`Marketplace`] is the facade used by the HTTP layer. Every operation takes the
//! authenticated user, or the role capability derived from it, explicitly.

mod accounts;
pub mod credentials;
pub mod domain;
mod lifecycle;
mod listings;
pub mod memory;
mod queries;
pub mod reference;
pub mod repository;
pub mod router;
pub mod service;
pub mod sessions;
pub mod validation;
pub mod views;

#[cfg(test)]
mod tests;

pub use credentials::{CredentialError, PasswordHasherService};
pub use domain::{
    Comuna, ComunaId, Landlord, Property, PropertyDetails, PropertyId, PropertyKind, Region,
    RegionId, RentalRequest, RentalRequestId, RequestState, Role, Tenant, User, UserId, UserRole,
};
pub use memory::InMemoryMarketplace;
pub use queries::LocationFilter;
pub use reference::{ReferenceDataError, ReferenceDataLoader, ReferenceDataSummary};
pub use repository::{
    MarketplaceRepository, PropertyFilter, RentalRequestFilter, RepositoryError, UnitOfWork,
};
pub use router::marketplace_router;
pub use service::{Forbidden, Marketplace, MarketplaceError};
pub use sessions::{SessionStore, SessionToken};
pub use validation::{
    FormErrors, LoginForm, ProfileForm, PropertyForm, RegistrationForm, RentalRequestForm,
    StateChangeForm,
};
pub use views::{
    Cancellation, Dashboard, LandlordDashboard, PropertyFormContext, PropertyRemoval,
    PropertyView, RentalRequestView, SessionView, StateChange, TenantDashboard, UserView,
};
