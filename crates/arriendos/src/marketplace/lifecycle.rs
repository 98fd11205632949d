//! Rental request lifecycle and the property availability flag it drives.
//!
//! `available` is a memoized flag, never recomputed from the full set of requests:
//! any state change by the owner clears it, a cancellation by the tenant sets it again.
//! Both two-step mutations run inside a single repository unit of work.

use tracing::{info, warn};

use super::domain::{
    Landlord, NewRentalRequest, PropertyId, RentalRequest, RentalRequestId, Tenant,
};
use super::repository::MarketplaceRepository;
use super::service::{Forbidden, Marketplace, MarketplaceError};
use super::validation::{RentalRequestForm, StateChangeForm};
use super::views::{Cancellation, StateChange};

impl<R> Marketplace<R>
where
    R: MarketplaceRepository + 'static,
{
    /// Submit a pending rental request. Properties currently marked unavailable still accept
    /// requests.
    pub fn create_request(
        &self,
        tenant: Tenant<'_>,
        property_id: PropertyId,
        form: RentalRequestForm,
    ) -> Result<RentalRequest, MarketplaceError> {
        if self.repository.property(property_id)?.is_none() {
            return Err(MarketplaceError::not_found("property", property_id.0));
        }
        let message = form.validate()?;

        let request = self.repository.insert_rental_request(NewRentalRequest {
            property_id,
            tenant_id: tenant.id(),
            message,
        })?;
        info!(
            request_id = %request.id,
            property_id = %property_id,
            tenant_id = %tenant.id(),
            "rental request submitted"
        );
        Ok(request)
    }

    /// Move a request to the posted state. The property is marked unavailable whatever the new
    /// state is.
    pub fn change_request_state(
        &self,
        landlord: Landlord<'_>,
        request_id: RentalRequestId,
        form: &StateChangeForm,
    ) -> Result<StateChange, MarketplaceError> {
        let change = self
            .repository
            .atomically(|work| -> Result<StateChange, MarketplaceError> {
                let mut request = work
                    .rental_request(request_id)?
                    .ok_or_else(|| MarketplaceError::not_found("rental request", request_id.0))?;
                let mut property = work
                    .property(request.property_id)?
                    .ok_or_else(|| MarketplaceError::not_found("property", request.property_id.0))?;

                if !landlord.owns(&property) {
                    warn!(
                        request_id = %request_id,
                        user_id = %landlord.id(),
                        "state change attempted by a landlord who does not own the property"
                    );
                    return Err(MarketplaceError::from(Forbidden::NotPropertyOwner));
                }

                request.state = form.validate()?;
                property.available = false;
                work.save_rental_request(request.clone())?;
                work.save_property(property)?;

                Ok(StateChange {
                    request_id,
                    state: request.state,
                    property_available: false,
                })
            })?;

        info!(
            request_id = %change.request_id,
            state = %change.state,
            "rental request state changed, property marked unavailable"
        );
        Ok(change)
    }

    /// Withdraw a request made by `tenant`, restoring the property's availability.
    pub fn cancel_request(
        &self,
        tenant: Tenant<'_>,
        request_id: RentalRequestId,
    ) -> Result<Cancellation, MarketplaceError> {
        let cancellation = self
            .repository
            .atomically(|work| -> Result<Cancellation, MarketplaceError> {
                let request = work
                    .rental_request(request_id)?
                    .ok_or_else(|| MarketplaceError::not_found("rental request", request_id.0))?;

                if request.tenant_id != tenant.id() {
                    warn!(
                        request_id = %request_id,
                        user_id = %tenant.id(),
                        "cancellation attempted by a tenant who did not submit the request"
                    );
                    return Err(MarketplaceError::from(Forbidden::NotRequestOwner));
                }

                let mut property = work
                    .property(request.property_id)?
                    .ok_or_else(|| MarketplaceError::not_found("property", request.property_id.0))?;
                property.available = true;
                work.save_property(property)?;
                work.delete_rental_request(request.id)?;

                Ok(Cancellation {
                    request,
                    property_available: true,
                })
            })?;

        info!(
            request_id = %cancellation.request.id,
            property_id = %cancellation.request.property_id,
            "rental request cancelled, property available again"
        );
        Ok(cancellation)
    }
}
