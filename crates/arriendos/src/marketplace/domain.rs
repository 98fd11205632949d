use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

entity_id!(
    /// Identifier of a region.
    RegionId
);
entity_id!(
    /// Identifier of a comuna.
    ComunaId
);
entity_id!(
    /// Identifier of a registered user.
    UserId
);
entity_id!(
    /// Identifier of a property listing (inmueble).
    PropertyId
);
entity_id!(
    /// Identifier of a rental request (solicitud de arriendo).
    RentalRequestId
);

/// Top-level administrative region. Immutable reference data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub id: RegionId,
    pub name: String,
}

/// Sub-region grouped under exactly one [`Region`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comuna {
    pub id: ComunaId,
    pub name: String,
    pub region_id: RegionId,
}

/// Role chosen at registration. It never changes afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UserRole {
    #[serde(rename = "arrendatario")]
    Tenant,
    #[serde(rename = "arrendador")]
    Landlord,
}

impl UserRole {
    pub fn label(&self) -> &'static str {
        match self {
            UserRole::Tenant => "arrendatario",
            UserRole::Landlord => "arrendador",
        }
    }
}

impl FromStr for UserRole {
    type Err = UnknownVariant;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "arrendatario" => Ok(UserRole::Tenant),
            "arrendador" => Ok(UserRole::Landlord),
            other => Err(UnknownVariant(other.to_string())),
        }
    }
}

/// Registered marketplace user. The password is only ever held as an Argon2 PHC string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub password_hash: String,
    pub first_names: String,
    pub last_names: String,
    pub rut: String,
    pub address: String,
    pub phone: String,
    pub email: String,
    pub role: UserRole,
}

impl User {
    /// Resolve the role-specific capability of this user.
    pub fn role(&self) -> Role<'_> {
        match self.role {
            UserRole::Tenant => Role::Tenant(Tenant(self)),
            UserRole::Landlord => Role::Landlord(Landlord(self)),
        }
    }

    pub fn as_tenant(&self) -> Option<Tenant<'_>> {
        match self.role() {
            Role::Tenant(tenant) => Some(tenant),
            Role::Landlord(_) => None,
        }
    }

    pub fn as_landlord(&self) -> Option<Landlord<'_>> {
        match self.role() {
            Role::Landlord(landlord) => Some(landlord),
            Role::Tenant(_) => None,
        }
    }
}

/// Capability of an authenticated user, split by role so handlers match exhaustively.
#[derive(Debug, Clone, Copy)]
pub enum Role<'a> {
    Tenant(Tenant<'a>),
    Landlord(Landlord<'a>),
}

/// Proof that the wrapped user registered as an arrendatario.
#[derive(Debug, Clone, Copy)]
pub struct Tenant<'a>(&'a User);

impl<'a> Tenant<'a> {
    pub fn id(&self) -> UserId {
        self.0.id
    }

    pub fn user(&self) -> &'a User {
        self.0
    }
}

/// Proof that the wrapped user registered as an arrendador.
#[derive(Debug, Clone, Copy)]
pub struct Landlord<'a>(&'a User);

impl<'a> Landlord<'a> {
    pub fn id(&self) -> UserId {
        self.0.id
    }

    pub fn user(&self) -> &'a User {
        self.0
    }

    pub fn owns(&self, property: &Property) -> bool {
        property.owner_id == self.0.id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyKind {
    Casa,
    Departamento,
    Parcela,
}

impl FromStr for PropertyKind {
    type Err = UnknownVariant;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "casa" => Ok(PropertyKind::Casa),
            "departamento" => Ok(PropertyKind::Departamento),
            "parcela" => Ok(PropertyKind::Parcela),
            other => Err(UnknownVariant(other.to_string())),
        }
    }
}

/// Property listing (inmueble) owned by a landlord. Serialized with the property form's
/// field names so a rendered listing can be posted back unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Property {
    pub id: PropertyId,
    #[serde(rename = "propietario")]
    pub owner_id: UserId,
    #[serde(flatten)]
    pub details: PropertyDetails,
    /// Memoized flag flipped by the rental request lifecycle.
    #[serde(rename = "disponible")]
    pub available: bool,
    #[serde(rename = "fecha_publicacion")]
    pub listed_at: DateTime<Utc>,
}

/// Owner-editable attributes of a property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyDetails {
    #[serde(rename = "nombre")]
    pub name: String,
    #[serde(rename = "descripcion")]
    pub description: String,
    #[serde(rename = "m2_construidos")]
    pub built_m2: u32,
    #[serde(rename = "m2_totales")]
    pub total_m2: u32,
    #[serde(rename = "estacionamientos")]
    pub parking_spots: u8,
    #[serde(rename = "habitaciones")]
    pub bedrooms: u8,
    #[serde(rename = "banos")]
    pub bathrooms: u8,
    #[serde(rename = "direccion")]
    pub address: String,
    #[serde(rename = "comuna")]
    pub comuna_id: ComunaId,
    #[serde(rename = "tipo_inmueble")]
    pub kind: PropertyKind,
    #[serde(rename = "precio_mensual")]
    pub monthly_rent: u32,
    #[serde(rename = "imagen")]
    pub image: Option<String>,
}

/// State of a rental request. Labels outside this set are rejected at the form boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestState {
    Pendiente,
    Aceptada,
    Rechazada,
}

impl RequestState {
    pub fn label(&self) -> &'static str {
        match self {
            RequestState::Pendiente => "pendiente",
            RequestState::Aceptada => "aceptada",
            RequestState::Rechazada => "rechazada",
        }
    }
}

impl FromStr for RequestState {
    type Err = UnknownVariant;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "pendiente" => Ok(RequestState::Pendiente),
            "aceptada" => Ok(RequestState::Aceptada),
            "rechazada" => Ok(RequestState::Rechazada),
            other => Err(UnknownVariant(other.to_string())),
        }
    }
}

impl fmt::Display for RequestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Rental request (solicitud de arriendo) submitted by a tenant against a property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RentalRequest {
    pub id: RentalRequestId,
    pub property_id: PropertyId,
    pub tenant_id: UserId,
    pub message: String,
    pub state: RequestState,
    pub created_at: DateTime<Utc>,
}

/// Validated user ready to be persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub username: String,
    pub password_hash: String,
    pub first_names: String,
    pub last_names: String,
    pub rut: String,
    pub address: String,
    pub phone: String,
    pub email: String,
    pub role: UserRole,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewProperty {
    pub owner_id: UserId,
    pub details: PropertyDetails,
    pub available: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRentalRequest {
    pub property_id: PropertyId,
    pub tenant_id: UserId,
    pub message: String,
}

/// Raised when a closed set of labels does not contain the supplied value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown value '{0}'")]
pub struct UnknownVariant(pub String);
