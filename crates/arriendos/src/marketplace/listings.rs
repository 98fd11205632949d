use tracing::{info, warn};

use super::domain::{
    ComunaId, Landlord, NewProperty, Property, PropertyId, RentalRequest, RequestState,
};
use super::repository::{MarketplaceRepository, UnitOfWork};
use super::service::{Forbidden, Marketplace, MarketplaceError};
use super::validation::{FormErrors, PropertyForm};
use super::views::{PropertyFormContext, PropertyRemoval};

impl<R> Marketplace<R>
where
    R: MarketplaceRepository + 'static,
{
    fn ensure_comuna(&self, comuna: ComunaId) -> Result<(), MarketplaceError> {
        match self.repository.comuna(comuna)? {
            Some(_) => Ok(()),
            None => Err(unknown_comuna()),
        }
    }

    fn owned_property(
        &self,
        landlord: Landlord<'_>,
        id: PropertyId,
    ) -> Result<Property, MarketplaceError> {
        let property = self
            .repository
            .property(id)?
            .ok_or_else(|| MarketplaceError::not_found("property", id.0))?;
        ensure_owner(landlord, &property)?;
        Ok(property)
    }

    /// Regions and comunas offered by the property form, plus the property when editing.
    pub fn property_form(
        &self,
        landlord: Landlord<'_>,
        editing: Option<PropertyId>,
    ) -> Result<PropertyFormContext, MarketplaceError> {
        let property = match editing {
            Some(id) => {
                let property = self.owned_property(landlord, id)?;
                self.present_properties(vec![property])?.pop()
            }
            None => None,
        };
        Ok(PropertyFormContext {
            regions: self.repository.regions()?,
            comunas: self.repository.comunas()?,
            property,
        })
    }

    pub fn create_property(
        &self,
        landlord: Landlord<'_>,
        form: PropertyForm,
    ) -> Result<Property, MarketplaceError> {
        let listing = form.validate()?;
        self.ensure_comuna(listing.details.comuna_id)?;

        let property = self.repository.insert_property(NewProperty {
            owner_id: landlord.id(),
            details: listing.details,
            available: listing.available.unwrap_or(true),
        })?;
        info!(property_id = %property.id, owner_id = %property.owner_id, "property listed");
        Ok(property)
    }

    /// Replace the editable attributes of a property owned by `landlord`. Read, checks and
    /// write share one unit of work so a concurrent state change is never overwritten.
    pub fn update_property(
        &self,
        landlord: Landlord<'_>,
        id: PropertyId,
        form: PropertyForm,
    ) -> Result<Property, MarketplaceError> {
        let property = self
            .repository
            .atomically(|work| -> Result<Property, MarketplaceError> {
                let mut property = stored_owned_property(work, landlord, id)?;
                let listing = form.validate()?;
                if work.comuna(listing.details.comuna_id)?.is_none() {
                    return Err(unknown_comuna());
                }

                property.details = listing.details;
                if let Some(available) = listing.available {
                    property.available = available;
                }
                work.save_property(property.clone())?;
                Ok(property)
            })?;

        info!(property_id = %property.id, available = property.available, "property updated");
        Ok(property)
    }

    /// Delete a property and every rental request made against it. Open requests do not
    /// block the deletion.
    pub fn delete_property(
        &self,
        landlord: Landlord<'_>,
        id: PropertyId,
    ) -> Result<PropertyRemoval, MarketplaceError> {
        let (property, removed_requests) = self.repository.atomically(
            |work| -> Result<(Property, Vec<RentalRequest>), MarketplaceError> {
                let property = stored_owned_property(work, landlord, id)?;
                let removed = work.delete_property(property.id)?;
                Ok((property, removed))
            },
        )?;

        let pending = removed_requests
            .iter()
            .filter(|request| request.state == RequestState::Pendiente)
            .count();
        if pending > 0 {
            warn!(property_id = %id, pending, "deleted property had pending rental requests");
        }
        info!(property_id = %id, removed = removed_requests.len(), "property deleted");

        Ok(PropertyRemoval {
            property,
            removed_requests,
        })
    }
}

fn unknown_comuna() -> MarketplaceError {
    FormErrors::single("comuna", "seleccione una comuna válida").into()
}

fn ensure_owner(landlord: Landlord<'_>, property: &Property) -> Result<(), MarketplaceError> {
    if landlord.owns(property) {
        return Ok(());
    }
    warn!(property_id = %property.id, user_id = %landlord.id(), "property belongs to another landlord");
    Err(Forbidden::NotPropertyOwner.into())
}

fn stored_owned_property(
    work: &dyn UnitOfWork,
    landlord: Landlord<'_>,
    id: PropertyId,
) -> Result<Property, MarketplaceError> {
    let property = work
        .property(id)?
        .ok_or_else(|| MarketplaceError::not_found("property", id.0))?;
    ensure_owner(landlord, &property)?;
    Ok(property)
}
