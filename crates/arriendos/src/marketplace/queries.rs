use std::collections::HashMap;

use tracing::debug;

use super::domain::{
    Comuna, ComunaId, Landlord, Property, PropertyId, Region, RegionId, RentalRequest,
    RequestState, Role, Tenant, User,
};
use super::repository::{MarketplaceRepository, PropertyFilter, RentalRequestFilter};
use super::service::{Marketplace, MarketplaceError};
use super::views::{
    Dashboard, LandlordDashboard, PropertyView, RentalRequestView, TenantDashboard,
};

/// Optional narrowing of the available-property listing. Both filters compose with AND.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LocationFilter {
    pub region: Option<RegionId>,
    pub comuna: Option<ComunaId>,
}

impl<R> Marketplace<R>
where
    R: MarketplaceRepository + 'static,
{
    /// Every listed property, available or not.
    pub fn all_properties(&self) -> Result<Vec<PropertyView>, MarketplaceError> {
        let properties = self.repository.properties(&PropertyFilter::default())?;
        self.present_properties(properties)
    }

    pub fn property_detail(&self, id: PropertyId) -> Result<PropertyView, MarketplaceError> {
        let property = self
            .repository
            .property(id)?
            .ok_or_else(|| MarketplaceError::not_found("property", id.0))?;
        self.present_properties(vec![property])?
            .pop()
            .ok_or_else(|| MarketplaceError::not_found("property", id.0))
    }

    pub fn available_properties(
        &self,
        filter: LocationFilter,
    ) -> Result<Vec<Property>, MarketplaceError> {
        let properties = self.repository.properties(&PropertyFilter {
            available: Some(true),
            owner: None,
            region: filter.region,
            comuna: filter.comuna,
        })?;
        debug!(?filter, count = properties.len(), "available properties listed");
        Ok(properties)
    }

    pub fn requests_for_tenant(
        &self,
        tenant: Tenant<'_>,
    ) -> Result<Vec<RentalRequest>, MarketplaceError> {
        Ok(self.repository.rental_requests(&RentalRequestFilter {
            tenant: Some(tenant.id()),
            ..RentalRequestFilter::default()
        })?)
    }

    /// Requests received on the landlord's properties, optionally only the pending ones.
    pub fn requests_for_landlord(
        &self,
        landlord: Landlord<'_>,
        pending_only: bool,
    ) -> Result<Vec<RentalRequest>, MarketplaceError> {
        Ok(self.repository.rental_requests(&RentalRequestFilter {
            landlord: Some(landlord.id()),
            state: pending_only.then_some(RequestState::Pendiente),
            ..RentalRequestFilter::default()
        })?)
    }

    pub fn properties_of(&self, landlord: Landlord<'_>) -> Result<Vec<Property>, MarketplaceError> {
        Ok(self.repository.properties(&PropertyFilter {
            owner: Some(landlord.id()),
            ..PropertyFilter::default()
        })?)
    }

    pub fn regions(&self) -> Result<Vec<Region>, MarketplaceError> {
        Ok(self.repository.regions()?)
    }

    /// Comunas whose region is exactly `region`.
    pub fn comunas_for_region(&self, region: RegionId) -> Result<Vec<Comuna>, MarketplaceError> {
        Ok(self.repository.comunas_in_region(region)?)
    }

    pub fn dashboard(
        &self,
        user: &User,
        filter: LocationFilter,
    ) -> Result<Dashboard, MarketplaceError> {
        match user.role() {
            Role::Tenant(tenant) => {
                let requests = self.requests_for_tenant(tenant)?;
                let available = self.available_properties(filter)?;
                Ok(Dashboard::Tenant(TenantDashboard {
                    requests: self.present_requests(requests)?,
                    regions: self.repository.regions()?,
                    comunas: self.repository.comunas()?,
                    available_properties: self.present_properties(available)?,
                }))
            }
            Role::Landlord(landlord) => {
                let pending = self.requests_for_landlord(landlord, true)?;
                let properties = self.properties_of(landlord)?;
                Ok(Dashboard::Landlord(LandlordDashboard {
                    pending_requests: self.present_requests(pending)?,
                    properties: self.present_properties(properties)?,
                }))
            }
        }
    }

    pub fn present_properties(
        &self,
        properties: Vec<Property>,
    ) -> Result<Vec<PropertyView>, MarketplaceError> {
        let regions: HashMap<RegionId, String> = self
            .repository
            .regions()?
            .into_iter()
            .map(|region| (region.id, region.name))
            .collect();
        let comunas: HashMap<ComunaId, Comuna> = self
            .repository
            .comunas()?
            .into_iter()
            .map(|comuna| (comuna.id, comuna))
            .collect();

        Ok(properties
            .into_iter()
            .map(|property| {
                let comuna = comunas.get(&property.details.comuna_id);
                let region = comuna
                    .and_then(|comuna| regions.get(&comuna.region_id))
                    .cloned()
                    .unwrap_or_default();
                PropertyView {
                    comuna: comuna.map(|comuna| comuna.name.clone()).unwrap_or_default(),
                    region,
                    property,
                }
            })
            .collect())
    }

    pub fn present_requests(
        &self,
        requests: Vec<RentalRequest>,
    ) -> Result<Vec<RentalRequestView>, MarketplaceError> {
        let mut names: HashMap<PropertyId, String> = HashMap::new();
        let mut views = Vec::with_capacity(requests.len());
        for request in requests {
            let property_name = match names.get(&request.property_id) {
                Some(name) => name.clone(),
                None => {
                    let name = self
                        .repository
                        .property(request.property_id)?
                        .map(|property| property.details.name)
                        .unwrap_or_default();
                    names.insert(request.property_id, name.clone());
                    name
                }
            };
            views.push(RentalRequestView {
                request,
                property_name,
            });
        }
        Ok(views)
    }
}
