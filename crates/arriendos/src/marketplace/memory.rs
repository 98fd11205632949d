use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;

use super::domain::{
    Comuna, ComunaId, NewProperty, NewRentalRequest, NewUser, Property, PropertyId, Region,
    RegionId, RentalRequest, RentalRequestId, RequestState, User, UserId,
};
use super::repository::{
    MarketplaceRepository, PropertyFilter, RentalRequestFilter, RepositoryError, UnitOfWork,
};

/// Process-local store backing the marketplace. Rows are kept in id order.
#[derive(Debug, Default)]
pub struct InMemoryMarketplace {
    tables: Mutex<Tables>,
}

#[derive(Debug, Default, Clone)]
struct Tables {
    regions: BTreeMap<RegionId, Region>,
    comunas: BTreeMap<ComunaId, Comuna>,
    users: BTreeMap<UserId, User>,
    properties: BTreeMap<PropertyId, Property>,
    requests: BTreeMap<RentalRequestId, RentalRequest>,
    sequence: Sequences,
}

#[derive(Debug, Default, Clone)]
struct Sequences {
    region: u64,
    comuna: u64,
    user: u64,
    property: u64,
    request: u64,
}

fn next(counter: &mut u64) -> u64 {
    *counter += 1;
    *counter
}

impl InMemoryMarketplace {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>, RepositoryError> {
        self.tables
            .lock()
            .map_err(|_| RepositoryError::Unavailable("store lock poisoned".to_string()))
    }
}

impl Tables {
    fn region_of(&self, comuna: ComunaId) -> Option<RegionId> {
        self.comunas.get(&comuna).map(|comuna| comuna.region_id)
    }

    fn property_matches(&self, property: &Property, filter: &PropertyFilter) -> bool {
        if let Some(available) = filter.available {
            if property.available != available {
                return false;
            }
        }
        if let Some(owner) = filter.owner {
            if property.owner_id != owner {
                return false;
            }
        }
        if let Some(region) = filter.region {
            if self.region_of(property.details.comuna_id) != Some(region) {
                return false;
            }
        }
        if let Some(comuna) = filter.comuna {
            if property.details.comuna_id != comuna {
                return false;
            }
        }
        true
    }

    fn request_matches(&self, request: &RentalRequest, filter: &RentalRequestFilter) -> bool {
        if let Some(tenant) = filter.tenant {
            if request.tenant_id != tenant {
                return false;
            }
        }
        if let Some(landlord) = filter.landlord {
            let owner = self
                .properties
                .get(&request.property_id)
                .map(|property| property.owner_id);
            if owner != Some(landlord) {
                return false;
            }
        }
        if let Some(property) = filter.property {
            if request.property_id != property {
                return false;
            }
        }
        if let Some(state) = filter.state {
            if request.state != state {
                return false;
            }
        }
        true
    }
}

impl UnitOfWork for Tables {
    fn comuna(&self, id: ComunaId) -> Result<Option<Comuna>, RepositoryError> {
        Ok(self.comunas.get(&id).cloned())
    }

    fn property(&self, id: PropertyId) -> Result<Option<Property>, RepositoryError> {
        Ok(self.properties.get(&id).cloned())
    }

    fn save_property(&mut self, property: Property) -> Result<(), RepositoryError> {
        match self.properties.get_mut(&property.id) {
            Some(slot) => {
                *slot = property;
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        }
    }

    fn delete_property(&mut self, id: PropertyId) -> Result<Vec<RentalRequest>, RepositoryError> {
        self.properties
            .remove(&id)
            .ok_or(RepositoryError::NotFound)?;

        let orphaned: Vec<RentalRequestId> = self
            .requests
            .values()
            .filter(|request| request.property_id == id)
            .map(|request| request.id)
            .collect();

        Ok(orphaned
            .into_iter()
            .filter_map(|request_id| self.requests.remove(&request_id))
            .collect())
    }

    fn rental_request(
        &self,
        id: RentalRequestId,
    ) -> Result<Option<RentalRequest>, RepositoryError> {
        Ok(self.requests.get(&id).cloned())
    }

    fn save_rental_request(&mut self, request: RentalRequest) -> Result<(), RepositoryError> {
        match self.requests.get_mut(&request.id) {
            Some(slot) => {
                *slot = request;
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        }
    }

    fn delete_rental_request(&mut self, id: RentalRequestId) -> Result<(), RepositoryError> {
        self.requests
            .remove(&id)
            .map(|_| ())
            .ok_or(RepositoryError::NotFound)
    }
}

impl MarketplaceRepository for InMemoryMarketplace {
    fn insert_region(&self, name: &str) -> Result<Region, RepositoryError> {
        let mut tables = self.lock()?;
        if tables.regions.values().any(|region| region.name == name) {
            return Err(RepositoryError::Conflict);
        }
        let region = Region {
            id: RegionId(next(&mut tables.sequence.region)),
            name: name.to_string(),
        };
        tables.regions.insert(region.id, region.clone());
        Ok(region)
    }

    fn insert_comuna(&self, region: RegionId, name: &str) -> Result<Comuna, RepositoryError> {
        let mut tables = self.lock()?;
        if !tables.regions.contains_key(&region) {
            return Err(RepositoryError::NotFound);
        }
        if tables
            .comunas
            .values()
            .any(|comuna| comuna.region_id == region && comuna.name == name)
        {
            return Err(RepositoryError::Conflict);
        }
        let comuna = Comuna {
            id: ComunaId(next(&mut tables.sequence.comuna)),
            name: name.to_string(),
            region_id: region,
        };
        tables.comunas.insert(comuna.id, comuna.clone());
        Ok(comuna)
    }

    fn regions(&self) -> Result<Vec<Region>, RepositoryError> {
        Ok(self.lock()?.regions.values().cloned().collect())
    }

    fn comunas(&self) -> Result<Vec<Comuna>, RepositoryError> {
        Ok(self.lock()?.comunas.values().cloned().collect())
    }

    fn comuna(&self, id: ComunaId) -> Result<Option<Comuna>, RepositoryError> {
        Ok(self.lock()?.comunas.get(&id).cloned())
    }

    fn comunas_in_region(&self, region: RegionId) -> Result<Vec<Comuna>, RepositoryError> {
        Ok(self
            .lock()?
            .comunas
            .values()
            .filter(|comuna| comuna.region_id == region)
            .cloned()
            .collect())
    }

    fn insert_user(&self, user: NewUser) -> Result<User, RepositoryError> {
        let mut tables = self.lock()?;
        if tables
            .users
            .values()
            .any(|existing| existing.username == user.username)
        {
            return Err(RepositoryError::Conflict);
        }
        let NewUser {
            username,
            password_hash,
            first_names,
            last_names,
            rut,
            address,
            phone,
            email,
            role,
        } = user;
        let stored = User {
            id: UserId(next(&mut tables.sequence.user)),
            username,
            password_hash,
            first_names,
            last_names,
            rut,
            address,
            phone,
            email,
            role,
        };
        tables.users.insert(stored.id, stored.clone());
        Ok(stored)
    }

    fn user(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        Ok(self.lock()?.users.get(&id).cloned())
    }

    fn user_by_username(&self, username: &str) -> Result<Option<User>, RepositoryError> {
        Ok(self
            .lock()?
            .users
            .values()
            .find(|user| user.username == username)
            .cloned())
    }

    fn update_user(&self, user: User) -> Result<(), RepositoryError> {
        let mut tables = self.lock()?;
        match tables.users.get_mut(&user.id) {
            Some(slot) => {
                *slot = user;
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        }
    }

    fn insert_property(&self, property: NewProperty) -> Result<Property, RepositoryError> {
        let mut tables = self.lock()?;
        if !tables.comunas.contains_key(&property.details.comuna_id)
            || !tables.users.contains_key(&property.owner_id)
        {
            return Err(RepositoryError::NotFound);
        }
        let stored = Property {
            id: PropertyId(next(&mut tables.sequence.property)),
            owner_id: property.owner_id,
            details: property.details,
            available: property.available,
            listed_at: Utc::now(),
        };
        tables.properties.insert(stored.id, stored.clone());
        Ok(stored)
    }

    fn property(&self, id: PropertyId) -> Result<Option<Property>, RepositoryError> {
        Ok(self.lock()?.properties.get(&id).cloned())
    }

    fn properties(&self, filter: &PropertyFilter) -> Result<Vec<Property>, RepositoryError> {
        let tables = self.lock()?;
        Ok(tables
            .properties
            .values()
            .filter(|property| tables.property_matches(property, filter))
            .cloned()
            .collect())
    }

    fn insert_rental_request(
        &self,
        request: NewRentalRequest,
    ) -> Result<RentalRequest, RepositoryError> {
        let mut tables = self.lock()?;
        if !tables.properties.contains_key(&request.property_id)
            || !tables.users.contains_key(&request.tenant_id)
        {
            return Err(RepositoryError::NotFound);
        }
        let stored = RentalRequest {
            id: RentalRequestId(next(&mut tables.sequence.request)),
            property_id: request.property_id,
            tenant_id: request.tenant_id,
            message: request.message,
            state: RequestState::Pendiente,
            created_at: Utc::now(),
        };
        tables.requests.insert(stored.id, stored.clone());
        Ok(stored)
    }

    fn rental_request(
        &self,
        id: RentalRequestId,
    ) -> Result<Option<RentalRequest>, RepositoryError> {
        Ok(self.lock()?.requests.get(&id).cloned())
    }

    fn rental_requests(
        &self,
        filter: &RentalRequestFilter,
    ) -> Result<Vec<RentalRequest>, RepositoryError> {
        let tables = self.lock()?;
        Ok(tables
            .requests
            .values()
            .filter(|request| tables.request_matches(request, filter))
            .cloned()
            .collect())
    }

    fn atomically<T, E, F>(&self, work: F) -> Result<T, E>
    where
        F: FnOnce(&mut dyn UnitOfWork) -> Result<T, E>,
        E: From<RepositoryError>,
    {
        let mut tables = self.lock()?;
        let mut staged = tables.clone();
        let value = work(&mut staged as &mut dyn UnitOfWork)?;
        *tables = staged;
        Ok(value)
    }
}
