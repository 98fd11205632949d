use super::domain::{
    Comuna, ComunaId, NewProperty, NewRentalRequest, NewUser, Property, PropertyId, Region,
    RegionId, RentalRequest, RentalRequestId, RequestState, User, UserId,
};

/// Narrowing applied to property listings. Every populated field must match.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PropertyFilter {
    pub available: Option<bool>,
    pub owner: Option<UserId>,
    /// Matched through the property's comuna.
    pub region: Option<RegionId>,
    pub comuna: Option<ComunaId>,
}

/// Narrowing applied to rental requests. Every populated field must match.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RentalRequestFilter {
    pub tenant: Option<UserId>,
    /// Matched through the requested property's owner.
    pub landlord: Option<UserId>,
    pub property: Option<PropertyId>,
    pub state: Option<RequestState>,
}

/// Storage abstraction so the marketplace services can be exercised in isolation.
pub trait MarketplaceRepository: Send + Sync {
    fn insert_region(&self, name: &str) -> Result<Region, RepositoryError>;
    fn insert_comuna(&self, region: RegionId, name: &str) -> Result<Comuna, RepositoryError>;
    fn regions(&self) -> Result<Vec<Region>, RepositoryError>;
    fn comunas(&self) -> Result<Vec<Comuna>, RepositoryError>;
    fn comuna(&self, id: ComunaId) -> Result<Option<Comuna>, RepositoryError>;
    fn comunas_in_region(&self, region: RegionId) -> Result<Vec<Comuna>, RepositoryError>;

    fn insert_user(&self, user: NewUser) -> Result<User, RepositoryError>;
    fn user(&self, id: UserId) -> Result<Option<User>, RepositoryError>;
    fn user_by_username(&self, username: &str) -> Result<Option<User>, RepositoryError>;
    fn update_user(&self, user: User) -> Result<(), RepositoryError>;

    fn insert_property(&self, property: NewProperty) -> Result<Property, RepositoryError>;
    fn property(&self, id: PropertyId) -> Result<Option<Property>, RepositoryError>;
    fn properties(&self, filter: &PropertyFilter) -> Result<Vec<Property>, RepositoryError>;

    fn insert_rental_request(
        &self,
        request: NewRentalRequest,
    ) -> Result<RentalRequest, RepositoryError>;
    fn rental_request(&self, id: RentalRequestId)
        -> Result<Option<RentalRequest>, RepositoryError>;
    fn rental_requests(
        &self,
        filter: &RentalRequestFilter,
    ) -> Result<Vec<RentalRequest>, RepositoryError>;

    /// Run `work` as a single unit: either every change it stages is committed or none is.
    fn atomically<T, E, F>(&self, work: F) -> Result<T, E>
    where
        F: FnOnce(&mut dyn UnitOfWork) -> Result<T, E>,
        E: From<RepositoryError>;
}

/// Staged reads and writes available inside [`MarketplaceRepository::atomically`].
pub trait UnitOfWork {
    fn comuna(&self, id: ComunaId) -> Result<Option<Comuna>, RepositoryError>;
    fn property(&self, id: PropertyId) -> Result<Option<Property>, RepositoryError>;
    fn save_property(&mut self, property: Property) -> Result<(), RepositoryError>;
    /// Removes the property together with its rental requests, returning the removed requests.
    fn delete_property(&mut self, id: PropertyId) -> Result<Vec<RentalRequest>, RepositoryError>;
    fn rental_request(&self, id: RentalRequestId)
        -> Result<Option<RentalRequest>, RepositoryError>;
    fn save_rental_request(&mut self, request: RentalRequest) -> Result<(), RepositoryError>;
    fn delete_rental_request(&mut self, id: RentalRequestId) -> Result<(), RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}
