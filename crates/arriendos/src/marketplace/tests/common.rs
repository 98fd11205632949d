use std::sync::{Arc, Mutex};

use axum::response::Response;
use serde_json::{json, Value};

use crate::marketplace::domain::{
    Comuna, ComunaId, NewProperty, NewRentalRequest, NewUser, Property, PropertyId, Region,
    RegionId, RentalRequest, RentalRequestId, User, UserId, UserRole,
};
use crate::marketplace::repository::{
    MarketplaceRepository, PropertyFilter, RentalRequestFilter, RepositoryError, UnitOfWork,
};
use crate::marketplace::{
    marketplace_router, InMemoryMarketplace, Marketplace, PasswordHasherService, PropertyForm,
    RegistrationForm, RentalRequestForm,
};

pub(super) type TestMarketplace = Marketplace<InMemoryMarketplace>;

/// Marketplace seeded with two regions and three comunas.
pub(super) struct Fixture {
    pub marketplace: Arc<TestMarketplace>,
    pub metropolitana: RegionId,
    pub valparaiso: RegionId,
    pub nunoa: ComunaId,
    pub providencia: ComunaId,
    pub vina: ComunaId,
}

pub(super) fn fixture() -> Fixture {
    let repository = Arc::new(InMemoryMarketplace::new());
    let metropolitana = repository
        .insert_region("Metropolitana de Santiago")
        .expect("region")
        .id;
    let valparaiso = repository.insert_region("Valparaíso").expect("region").id;
    let nunoa = repository
        .insert_comuna(metropolitana, "Ñuñoa")
        .expect("comuna")
        .id;
    let providencia = repository
        .insert_comuna(metropolitana, "Providencia")
        .expect("comuna")
        .id;
    let vina = repository
        .insert_comuna(valparaiso, "Viña del Mar")
        .expect("comuna")
        .id;

    Fixture {
        marketplace: Arc::new(Marketplace::new(
            repository,
            PasswordHasherService::new(None),
        )),
        metropolitana,
        valparaiso,
        nunoa,
        providencia,
        vina,
    }
}

pub(super) fn registration(username: &str, role: UserRole) -> RegistrationForm {
    RegistrationForm {
        username: username.to_string(),
        password: "clave-segura-1".to_string(),
        first_names: "Camila Andrea".to_string(),
        last_names: "Muñoz Soto".to_string(),
        rut: "12.345.678-5".to_string(),
        address: "Av. Irarrázaval 2100".to_string(),
        phone: "+56 9 1234 5678".to_string(),
        email: format!("{username}@correo.cl"),
        role: role.label().to_string(),
    }
}

/// Registers a user and returns the stored record.
pub(super) fn register(marketplace: &TestMarketplace, username: &str, role: UserRole) -> User {
    let session = marketplace
        .register(registration(username, role))
        .expect("registration succeeds");
    marketplace
        .authenticate(&session.token)
        .expect("session resolves")
}

pub(super) fn property_form(comuna: ComunaId) -> PropertyForm {
    PropertyForm {
        name: "Departamento en Ñuñoa".to_string(),
        description: "Dos dormitorios, cerca del metro".to_string(),
        built_m2: Some(json!(62)),
        total_m2: Some(json!(70)),
        parking_spots: Some(json!(1)),
        bedrooms: Some(json!(2)),
        bathrooms: Some(json!(1)),
        address: "Av. Grecia 1450".to_string(),
        comuna: Some(comuna.0.into()),
        kind: "departamento".to_string(),
        monthly_rent: Some(json!(520_000)),
        image: Some("fachada.jpg".to_string()),
        available: None,
    }
}

pub(super) fn list_property(
    marketplace: &TestMarketplace,
    owner: &User,
    comuna: ComunaId,
) -> Property {
    let landlord = owner.as_landlord().expect("landlord");
    marketplace
        .create_property(landlord, property_form(comuna))
        .expect("property listed")
}

pub(super) fn request_form(message: &str) -> RentalRequestForm {
    RentalRequestForm {
        message: message.to_string(),
    }
}

pub(super) fn stored_property(fixture: &Fixture, property: &Property) -> Property {
    fixture
        .marketplace
        .repository()
        .property(property.id)
        .expect("lookup")
        .expect("property exists")
}

pub(super) fn router(fixture: &Fixture) -> axum::Router {
    marketplace_router(fixture.marketplace.clone())
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("body readable");
    serde_json::from_slice(&body).expect("valid json")
}

pub(super) async fn read_text_body(response: Response) -> String {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("body readable");
    String::from_utf8(body.to_vec()).expect("utf-8 body")
}

type Interleaved = Box<dyn FnOnce(&InMemoryMarketplace) + Send>;

/// In-memory store that lets a second writer commit exactly once: right after the next
/// single-row property read, or right before the next unit of work starts.
#[derive(Default)]
pub(super) struct InterleavingStore {
    pub inner: InMemoryMarketplace,
    pending: Mutex<Option<Interleaved>>,
}

impl InterleavingStore {
    pub fn arm(&self, action: impl FnOnce(&InMemoryMarketplace) + Send + 'static) {
        *self.pending.lock().expect("pending lock") = Some(Box::new(action));
    }

    fn interleave(&self) {
        let action = self.pending.lock().expect("pending lock").take();
        if let Some(action) = action {
            action(&self.inner);
        }
    }
}

impl MarketplaceRepository for InterleavingStore {
    fn insert_region(&self, name: &str) -> Result<Region, RepositoryError> {
        self.inner.insert_region(name)
    }

    fn insert_comuna(&self, region: RegionId, name: &str) -> Result<Comuna, RepositoryError> {
        self.inner.insert_comuna(region, name)
    }

    fn regions(&self) -> Result<Vec<Region>, RepositoryError> {
        self.inner.regions()
    }

    fn comunas(&self) -> Result<Vec<Comuna>, RepositoryError> {
        self.inner.comunas()
    }

    fn comuna(&self, id: ComunaId) -> Result<Option<Comuna>, RepositoryError> {
        self.inner.comuna(id)
    }

    fn comunas_in_region(&self, region: RegionId) -> Result<Vec<Comuna>, RepositoryError> {
        self.inner.comunas_in_region(region)
    }

    fn insert_user(&self, user: NewUser) -> Result<User, RepositoryError> {
        self.inner.insert_user(user)
    }

    fn user(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        self.inner.user(id)
    }

    fn user_by_username(&self, username: &str) -> Result<Option<User>, RepositoryError> {
        self.inner.user_by_username(username)
    }

    fn update_user(&self, user: User) -> Result<(), RepositoryError> {
        self.inner.update_user(user)
    }

    fn insert_property(&self, property: NewProperty) -> Result<Property, RepositoryError> {
        self.inner.insert_property(property)
    }

    fn property(&self, id: PropertyId) -> Result<Option<Property>, RepositoryError> {
        let property = self.inner.property(id);
        self.interleave();
        property
    }

    fn properties(&self, filter: &PropertyFilter) -> Result<Vec<Property>, RepositoryError> {
        self.inner.properties(filter)
    }

    fn insert_rental_request(
        &self,
        request: NewRentalRequest,
    ) -> Result<RentalRequest, RepositoryError> {
        self.inner.insert_rental_request(request)
    }

    fn rental_request(
        &self,
        id: RentalRequestId,
    ) -> Result<Option<RentalRequest>, RepositoryError> {
        self.inner.rental_request(id)
    }

    fn rental_requests(
        &self,
        filter: &RentalRequestFilter,
    ) -> Result<Vec<RentalRequest>, RepositoryError> {
        self.inner.rental_requests(filter)
    }

    fn atomically<T, E, F>(&self, work: F) -> Result<T, E>
    where
        F: FnOnce(&mut dyn UnitOfWork) -> Result<T, E>,
        E: From<RepositoryError>,
    {
        self.interleave();
        self.inner.atomically(work)
    }
}

/// Marketplace over an [`InterleavingStore`] seeded with a single comuna.
pub(super) fn interleaving_marketplace() -> (Arc<Marketplace<InterleavingStore>>, ComunaId) {
    let store = Arc::new(InterleavingStore::default());
    let region = store.insert_region("Valparaíso").expect("region").id;
    let comuna = store.insert_comuna(region, "Viña del Mar").expect("comuna").id;
    let marketplace = Marketplace::new(store, PasswordHasherService::new(None));
    (Arc::new(marketplace), comuna)
}
