use serde::Serialize;

use super::domain::{
    Comuna, Property, Region, RentalRequest, RentalRequestId, RequestState, User, UserId,
    UserRole,
};
use super::sessions::SessionToken;

/// Public projection of a user. The password hash never leaves the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserView {
    pub id: UserId,
    pub username: String,
    pub nombres: String,
    pub apellidos: String,
    pub rut: String,
    pub direccion: String,
    pub telefono: String,
    pub correo_electronico: String,
    pub tipo_usuario: UserRole,
}

impl From<&User> for UserView {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            nombres: user.first_names.clone(),
            apellidos: user.last_names.clone(),
            rut: user.rut.clone(),
            direccion: user.address.clone(),
            telefono: user.phone.clone(),
            correo_electronico: user.email.clone(),
            tipo_usuario: user.role,
        }
    }
}

/// Session handed back after registration or login.
#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub token: SessionToken,
    pub user: UserView,
}

/// Property together with the names of its comuna and region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PropertyView {
    #[serde(flatten)]
    pub property: Property,
    #[serde(rename = "comuna_nombre")]
    pub comuna: String,
    #[serde(rename = "region_nombre")]
    pub region: String,
}

/// Rental request together with the requested property's name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RentalRequestView {
    #[serde(flatten)]
    pub request: RentalRequest,
    pub property_name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TenantDashboard {
    pub requests: Vec<RentalRequestView>,
    pub regions: Vec<Region>,
    pub comunas: Vec<Comuna>,
    pub available_properties: Vec<PropertyView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LandlordDashboard {
    pub pending_requests: Vec<RentalRequestView>,
    pub properties: Vec<PropertyView>,
}

/// Role-specific dashboard.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "tipo_usuario")]
pub enum Dashboard {
    #[serde(rename = "arrendatario")]
    Tenant(TenantDashboard),
    #[serde(rename = "arrendador")]
    Landlord(LandlordDashboard),
}

/// Choices needed to fill the property form.
#[derive(Debug, Clone, Serialize)]
pub struct PropertyFormContext {
    pub regions: Vec<Region>,
    pub comunas: Vec<Comuna>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub property: Option<PropertyView>,
}

/// Outcome of a state change posted by the owning landlord.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StateChange {
    pub request_id: RentalRequestId,
    pub state: RequestState,
    pub property_available: bool,
}

/// Outcome of a rental request cancellation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Cancellation {
    pub request: RentalRequest,
    pub property_available: bool,
}

/// Outcome of a property deletion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PropertyRemoval {
    pub property: Property,
    pub removed_requests: Vec<RentalRequest>,
}
