//! Form payloads accepted at the HTTP boundary and their validation into domain values.
//!
//! Field names on the wire follow the marketplace's Spanish form vocabulary. Validation never
//! stops at the first problem: every offending field is reported in a single [`FormErrors`].

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::domain::{ComunaId, PropertyDetails, PropertyKind, RequestState, UserRole};

const USERNAME_MAX_LEN: usize = 150;
const PASSWORD_MIN_LEN: usize = 8;
pub(crate) const PASSWORD_MAX_LEN: usize = 128;
const NAME_MAX_LEN: usize = 100;
const PHONE_MAX_LEN: usize = 20;
const MESSAGE_MAX_LEN: usize = 2_000;

/// Field-keyed validation messages, rendered back to the submitter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FormErrors(BTreeMap<String, Vec<String>>);

impl FormErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn field(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    fn into_result<T>(self, value: T) -> Result<T, FormErrors> {
        if self.is_empty() {
            Ok(value)
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for FormErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields: Vec<&str> = self.0.keys().map(String::as_str).collect();
        write!(f, "invalid fields: {}", fields.join(", "))
    }
}

fn required<'a>(errors: &mut FormErrors, field: &str, value: &'a str) -> &'a str {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        errors.add(field, "este campo es obligatorio");
    }
    trimmed
}

fn bounded_name(errors: &mut FormErrors, field: &str, value: &str) -> String {
    let value = required(errors, field, value);
    if value.chars().count() > NAME_MAX_LEN {
        errors.add(
            field,
            format!("no puede superar {NAME_MAX_LEN} caracteres"),
        );
    }
    value.to_string()
}

fn email(errors: &mut FormErrors, field: &str, value: &str) -> String {
    let value = required(errors, field, value);
    if !value.is_empty() && !is_valid_email(value) {
        errors.add(field, "ingrese un correo electrónico válido");
    }
    value.to_ascii_lowercase()
}

pub(crate) fn is_valid_email(value: &str) -> bool {
    if value.chars().any(char::is_whitespace) {
        return false;
    }
    let mut parts = value.split('@');
    let (Some(local), Some(domain), None) = (parts.next(), parts.next(), parts.next()) else {
        return false;
    };
    !local.is_empty()
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !domain.contains("..")
}

/// Normalizes a Chilean RUT to `<body>-<dv>` and checks its modulo-11 verifier digit.
pub(crate) fn normalize_rut(raw: &str) -> Option<String> {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| *c != '.')
        .map(|c| c.to_ascii_uppercase())
        .collect();
    let (body, dv) = cleaned.split_once('-')?;
    if body.is_empty() || body.len() > 8 || !body.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let mut dv_chars = dv.chars();
    let (Some(dv), None) = (dv_chars.next(), dv_chars.next()) else {
        return None;
    };

    let sum: u32 = body
        .chars()
        .rev()
        .filter_map(|c| c.to_digit(10))
        .zip([2, 3, 4, 5, 6, 7].into_iter().cycle())
        .map(|(digit, factor)| digit * factor)
        .sum();
    let expected = match 11 - (sum % 11) {
        11 => '0',
        10 => 'K',
        n => char::from_digit(n, 10)?,
    };

    (dv == expected).then(|| format!("{body}-{dv}"))
}

fn is_valid_username(value: &str) -> bool {
    value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '@' | '.' | '+' | '-' | '_'))
}

fn is_valid_phone(value: &str) -> bool {
    let digits = value.strip_prefix('+').unwrap_or(value);
    !digits.is_empty()
        && digits.chars().all(|c| c.is_ascii_digit() || c == ' ')
        && digits.chars().any(|c| c.is_ascii_digit())
}

/// Self-registration form (`/registro`).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RegistrationForm {
    pub username: String,
    pub password: String,
    #[serde(rename = "nombres")]
    pub first_names: String,
    #[serde(rename = "apellidos")]
    pub last_names: String,
    pub rut: String,
    #[serde(rename = "direccion")]
    pub address: String,
    #[serde(rename = "telefono")]
    pub phone: String,
    #[serde(rename = "correo_electronico")]
    pub email: String,
    #[serde(rename = "tipo_usuario")]
    pub role: String,
}

/// Registration data that passed validation. The password is still plain text here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidRegistration {
    pub username: String,
    pub password: String,
    pub first_names: String,
    pub last_names: String,
    pub rut: String,
    pub address: String,
    pub phone: String,
    pub email: String,
    pub role: UserRole,
}

impl RegistrationForm {
    pub fn validate(self) -> Result<ValidRegistration, FormErrors> {
        let mut errors = FormErrors::new();

        let username = required(&mut errors, "username", &self.username).to_string();
        if !username.is_empty() {
            if username.chars().count() > USERNAME_MAX_LEN {
                errors.add(
                    "username",
                    format!("no puede superar {USERNAME_MAX_LEN} caracteres"),
                );
            }
            if !is_valid_username(&username) {
                errors.add(
                    "username",
                    "solo se permiten letras, dígitos y los caracteres @/./+/-/_",
                );
            }
        }

        let password_len = self.password.chars().count();
        if password_len < PASSWORD_MIN_LEN {
            errors.add(
                "password",
                format!("debe tener al menos {PASSWORD_MIN_LEN} caracteres"),
            );
        } else if password_len > PASSWORD_MAX_LEN {
            errors.add(
                "password",
                format!("no puede superar {PASSWORD_MAX_LEN} caracteres"),
            );
        }

        let first_names = bounded_name(&mut errors, "nombres", &self.first_names);
        let last_names = bounded_name(&mut errors, "apellidos", &self.last_names);

        let rut_raw = required(&mut errors, "rut", &self.rut);
        let rut = if rut_raw.is_empty() {
            String::new()
        } else {
            normalize_rut(rut_raw).unwrap_or_else(|| {
                errors.add("rut", "RUT inválido");
                String::new()
            })
        };

        let address = required(&mut errors, "direccion", &self.address).to_string();

        let phone = required(&mut errors, "telefono", &self.phone).to_string();
        if !phone.is_empty() && (phone.len() > PHONE_MAX_LEN || !is_valid_phone(&phone)) {
            errors.add("telefono", "ingrese un número de teléfono válido");
        }

        let email = email(&mut errors, "correo_electronico", &self.email);

        let role = match self.role.parse::<UserRole>() {
            Ok(role) => Some(role),
            Err(_) => {
                errors.add(
                    "tipo_usuario",
                    "debe ser 'arrendatario' o 'arrendador'",
                );
                None
            }
        };

        match role {
            Some(role) => errors.into_result(ValidRegistration {
                username,
                password: self.password,
                first_names,
                last_names,
                rut,
                address,
                phone,
                email,
                role,
            }),
            None => Err(errors),
        }
    }
}

/// Credentials posted to `/login`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

/// Editable profile subset (`/usuario/perfil`).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProfileForm {
    #[serde(rename = "nombres")]
    pub first_names: String,
    #[serde(rename = "apellidos")]
    pub last_names: String,
    #[serde(rename = "correo_electronico")]
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidProfile {
    pub first_names: String,
    pub last_names: String,
    pub email: String,
}

impl ProfileForm {
    pub fn validate(self) -> Result<ValidProfile, FormErrors> {
        let mut errors = FormErrors::new();
        let first_names = bounded_name(&mut errors, "nombres", &self.first_names);
        let last_names = bounded_name(&mut errors, "apellidos", &self.last_names);
        let email = email(&mut errors, "correo_electronico", &self.email);
        errors.into_result(ValidProfile {
            first_names,
            last_names,
            email,
        })
    }
}

/// Property listing form used for both creation and edition.
///
/// Numeric fields are kept as raw JSON so a number posted as text, or a malformed one, is
/// reported against its own field instead of rejecting the whole body.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PropertyForm {
    #[serde(rename = "nombre")]
    pub name: String,
    #[serde(rename = "descripcion")]
    pub description: String,
    #[serde(rename = "m2_construidos")]
    pub built_m2: Option<Value>,
    #[serde(rename = "m2_totales")]
    pub total_m2: Option<Value>,
    #[serde(rename = "estacionamientos")]
    pub parking_spots: Option<Value>,
    #[serde(rename = "habitaciones")]
    pub bedrooms: Option<Value>,
    #[serde(rename = "banos")]
    pub bathrooms: Option<Value>,
    #[serde(rename = "direccion")]
    pub address: String,
    pub comuna: Option<Value>,
    #[serde(rename = "tipo_inmueble")]
    pub kind: String,
    #[serde(rename = "precio_mensual")]
    pub monthly_rent: Option<Value>,
    #[serde(rename = "imagen")]
    pub image: Option<String>,
    #[serde(rename = "disponible")]
    pub available: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidProperty {
    pub details: PropertyDetails,
    /// `None` keeps the current flag on edits and means available on creation.
    pub available: Option<bool>,
}

/// Integer posted either as a JSON number or as text.
fn integer(errors: &mut FormErrors, field: &str, value: Option<&Value>) -> Option<i64> {
    let parsed = match value {
        None | Some(Value::Null) => {
            errors.add(field, "este campo es obligatorio");
            return None;
        }
        Some(Value::String(text)) if text.trim().is_empty() => {
            errors.add(field, "este campo es obligatorio");
            return None;
        }
        Some(Value::Number(number)) => number.as_i64(),
        Some(Value::String(text)) => text.trim().parse::<i64>().ok(),
        Some(_) => None,
    };
    if parsed.is_none() {
        errors.add(field, "ingrese un número entero");
    }
    parsed
}

fn count<T>(errors: &mut FormErrors, field: &str, value: Option<&Value>) -> T
where
    T: TryFrom<i64> + Default,
{
    match integer(errors, field, value) {
        None => T::default(),
        Some(raw) if raw < 0 => {
            errors.add(field, "no puede ser negativo");
            T::default()
        }
        Some(raw) => T::try_from(raw).unwrap_or_else(|_| {
            errors.add(field, "valor fuera de rango");
            T::default()
        }),
    }
}

/// Optional checkbox. Accepts JSON booleans and the usual HTML form spellings.
fn flag(errors: &mut FormErrors, field: &str, value: Option<&Value>) -> Option<bool> {
    match value {
        None | Some(Value::Null) => None,
        Some(Value::Bool(flag)) => Some(*flag),
        Some(Value::String(text)) => match text.trim().to_ascii_lowercase().as_str() {
            "" => None,
            "true" | "on" | "1" => Some(true),
            "false" | "off" | "0" => Some(false),
            _ => {
                errors.add(field, "valor inválido");
                None
            }
        },
        Some(_) => {
            errors.add(field, "valor inválido");
            None
        }
    }
}

impl PropertyForm {
    pub fn validate(self) -> Result<ValidProperty, FormErrors> {
        let mut errors = FormErrors::new();

        let name = bounded_name(&mut errors, "nombre", &self.name);
        let description = required(&mut errors, "descripcion", &self.description).to_string();
        let built_m2: u32 = count(&mut errors, "m2_construidos", self.built_m2.as_ref());
        let total_m2: u32 = count(&mut errors, "m2_totales", self.total_m2.as_ref());
        if built_m2 > total_m2 {
            errors.add(
                "m2_construidos",
                "no puede superar los metros cuadrados totales",
            );
        }
        let parking_spots: u8 =
            count(&mut errors, "estacionamientos", self.parking_spots.as_ref());
        let bedrooms: u8 = count(&mut errors, "habitaciones", self.bedrooms.as_ref());
        let bathrooms: u8 = count(&mut errors, "banos", self.bathrooms.as_ref());
        let address = required(&mut errors, "direccion", &self.address).to_string();

        let comuna_id = match integer(&mut errors, "comuna", self.comuna.as_ref()) {
            Some(id) if id > 0 => ComunaId(id.unsigned_abs()),
            Some(_) => {
                errors.add("comuna", "seleccione una comuna válida");
                ComunaId(0)
            }
            None => ComunaId(0),
        };

        let kind = self.kind.parse::<PropertyKind>().ok();
        if kind.is_none() {
            errors.add(
                "tipo_inmueble",
                "debe ser 'casa', 'departamento' o 'parcela'",
            );
        }

        let monthly_rent: u32 = count(&mut errors, "precio_mensual", self.monthly_rent.as_ref());
        if monthly_rent == 0 && errors.field("precio_mensual").is_none() {
            errors.add("precio_mensual", "debe ser mayor que cero");
        }

        let image = self
            .image
            .map(|path| path.trim().to_string())
            .filter(|path| !path.is_empty());
        if let Some(path) = &image {
            let is_image = mime_guess::from_path(path)
                .first()
                .map(|guess| guess.type_() == mime::IMAGE)
                .unwrap_or(false);
            if !is_image {
                errors.add("imagen", "el archivo debe ser una imagen");
            }
        }

        let available = flag(&mut errors, "disponible", self.available.as_ref());

        let Some(kind) = kind else {
            return Err(errors);
        };

        errors.into_result(ValidProperty {
            details: PropertyDetails {
                name,
                description,
                built_m2,
                total_m2,
                parking_spots,
                bedrooms,
                bathrooms,
                address,
                comuna_id,
                kind,
                monthly_rent,
                image,
            },
            available,
        })
    }
}

/// Rental request form (`/inmueble/<id>/solicitar`). The target comes from the path.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RentalRequestForm {
    #[serde(rename = "mensaje")]
    pub message: String,
}

impl RentalRequestForm {
    pub fn validate(self) -> Result<String, FormErrors> {
        let mut errors = FormErrors::new();
        let message = required(&mut errors, "mensaje", &self.message).to_string();
        if message.chars().count() > MESSAGE_MAX_LEN {
            errors.add(
                "mensaje",
                format!("no puede superar {MESSAGE_MAX_LEN} caracteres"),
            );
        }
        errors.into_result(message)
    }
}

/// State transition posted by the owning landlord (`/solicitud/<id>/estado`).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StateChangeForm {
    pub nuevo_estado: String,
}

impl StateChangeForm {
    pub fn validate(&self) -> Result<RequestState, FormErrors> {
        self.nuevo_estado.parse::<RequestState>().map_err(|_| {
            FormErrors::single(
                "nuevo_estado",
                "debe ser 'pendiente', 'aceptada' o 'rechazada'",
            )
        })
    }
}
