use std::sync::Arc;

use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequest, Path, Query, Request, State},
    http::{header, HeaderMap, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, error};

use super::domain::{
    ComunaId, Landlord, PropertyId, RegionId, RentalRequestId, Tenant, User, UserRole,
};
use super::queries::LocationFilter;
use super::repository::{MarketplaceRepository, RepositoryError};
use super::service::{Forbidden, Marketplace, MarketplaceError};
use super::sessions::SessionToken;
use super::validation::{
    FormErrors, LoginForm, ProfileForm, PropertyForm, RegistrationForm, RentalRequestForm,
    StateChangeForm,
};
use super::views::UserView;

type Shared<R> = State<Arc<Marketplace<R>>>;

/// Router builder exposing the marketplace pages as JSON endpoints.
pub fn marketplace_router<R>(marketplace: Arc<Marketplace<R>>) -> Router
where
    R: MarketplaceRepository + 'static,
{
    Router::new()
        .route("/", get(home_handler::<R>))
        .route(
            "/registro",
            get(registration_form_handler).post(register_handler::<R>),
        )
        .route("/login", post(login_handler::<R>))
        .route("/logout", post(logout_handler::<R>))
        .route(
            "/usuario/perfil",
            get(profile_handler::<R>).post(update_profile_handler::<R>),
        )
        .route("/dashboard", get(dashboard_handler::<R>))
        .route("/comunas", get(comunas_handler::<R>))
        .route(
            "/inmueble/nuevo",
            get(new_property_form_handler::<R>).post(create_property_handler::<R>),
        )
        .route("/inmueble/:id", get(property_detail_handler::<R>))
        .route(
            "/inmueble/:id/editar",
            get(edit_property_form_handler::<R>).post(update_property_handler::<R>),
        )
        .route(
            "/inmueble/:id/eliminar",
            get(delete_property_form_handler::<R>).post(delete_property_handler::<R>),
        )
        .route(
            "/inmueble/:id/solicitar",
            get(request_form_handler::<R>).post(create_request_handler::<R>),
        )
        .route(
            "/solicitudes/arrendador",
            get(landlord_requests_handler::<R>),
        )
        .route("/solicitud/:id/estado", post(change_state_handler::<R>))
        .route("/solicitud/:id/cancelar", post(cancel_request_handler::<R>))
        .with_state(marketplace)
}

impl IntoResponse for MarketplaceError {
    fn into_response(self) -> Response {
        match self {
            MarketplaceError::Validation(errors) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(json!({ "errors": errors })),
            )
                .into_response(),
            MarketplaceError::Forbidden(reason) => {
                debug!(%reason, location = reason.redirect_to(), "redirecting unauthorized caller");
                (
                    StatusCode::SEE_OTHER,
                    [(header::LOCATION, reason.redirect_to())],
                    Json(json!({
                        "error": reason.to_string(),
                        "redirect": reason.redirect_to(),
                    })),
                )
                    .into_response()
            }
            MarketplaceError::NotFound { .. }
            | MarketplaceError::Repository(RepositoryError::NotFound) => {
                (StatusCode::NOT_FOUND, Json(json!({ "error": self.to_string() }))).into_response()
            }
            MarketplaceError::Unauthenticated | MarketplaceError::InvalidCredentials => {
                (StatusCode::UNAUTHORIZED, Json(json!({ "error": self.to_string() })))
                    .into_response()
            }
            MarketplaceError::Repository(RepositoryError::Conflict) => {
                (StatusCode::CONFLICT, Json(json!({ "error": self.to_string() }))).into_response()
            }
            other => {
                error!(error = %other, "marketplace request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": other.to_string() })),
                )
                    .into_response()
            }
        }
    }
}

/// Key used for problems that belong to the body as a whole rather than to one field.
const NON_FIELD_ERRORS: &str = "__all__";

/// JSON form body. A body that cannot be read into the form is answered like any other
/// invalid submission: an `errors` map with the rejection's status.
struct FormJson<T>(T);

#[async_trait]
impl<T, S> FromRequest<S> for FormJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(form)) => Ok(Self(form)),
            Err(rejection) => Err(form_rejection(rejection)),
        }
    }
}

fn form_rejection(rejection: JsonRejection) -> Response {
    debug!(error = %rejection.body_text(), "form body rejected");
    let errors = FormErrors::single(NON_FIELD_ERRORS, rejection.body_text());
    (rejection.status(), Json(json!({ "errors": errors }))).into_response()
}

fn bearer_token(headers: &HeaderMap) -> Option<SessionToken> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    (!token.is_empty()).then(|| SessionToken(token.to_string()))
}

fn current_user<R>(
    marketplace: &Marketplace<R>,
    headers: &HeaderMap,
) -> Result<User, MarketplaceError>
where
    R: MarketplaceRepository + 'static,
{
    let token = bearer_token(headers).ok_or(MarketplaceError::Unauthenticated)?;
    marketplace.authenticate(&token)
}

fn tenant(user: &User) -> Result<Tenant<'_>, MarketplaceError> {
    user.as_tenant()
        .ok_or(MarketplaceError::Forbidden(Forbidden::TenantsOnly))
}

fn landlord(user: &User) -> Result<Landlord<'_>, MarketplaceError> {
    user.as_landlord()
        .ok_or(MarketplaceError::Forbidden(Forbidden::LandlordsOnly))
}

async fn home_handler<R>(State(marketplace): Shared<R>) -> Result<Response, MarketplaceError>
where
    R: MarketplaceRepository + 'static,
{
    Ok(Json(marketplace.all_properties()?).into_response())
}

async fn registration_form_handler() -> Response {
    Json(json!({
        "tipo_usuario": [UserRole::Tenant.label(), UserRole::Landlord.label()],
    }))
    .into_response()
}

async fn register_handler<R>(
    State(marketplace): Shared<R>,
    FormJson(form): FormJson<RegistrationForm>,
) -> Result<Response, MarketplaceError>
where
    R: MarketplaceRepository + 'static,
{
    let session = marketplace.register(form)?;
    Ok((StatusCode::CREATED, Json(session)).into_response())
}

async fn login_handler<R>(
    State(marketplace): Shared<R>,
    FormJson(form): FormJson<LoginForm>,
) -> Result<Response, MarketplaceError>
where
    R: MarketplaceRepository + 'static,
{
    Ok(Json(marketplace.login(form)?).into_response())
}

async fn logout_handler<R>(
    State(marketplace): Shared<R>,
    headers: HeaderMap,
) -> Result<Response, MarketplaceError>
where
    R: MarketplaceRepository + 'static,
{
    let token = bearer_token(&headers).ok_or(MarketplaceError::Unauthenticated)?;
    marketplace.logout(&token)?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

async fn profile_handler<R>(
    State(marketplace): Shared<R>,
    headers: HeaderMap,
) -> Result<Response, MarketplaceError>
where
    R: MarketplaceRepository + 'static,
{
    let user = current_user(&marketplace, &headers)?;
    Ok(Json(UserView::from(&user)).into_response())
}

async fn update_profile_handler<R>(
    State(marketplace): Shared<R>,
    headers: HeaderMap,
    FormJson(form): FormJson<ProfileForm>,
) -> Result<Response, MarketplaceError>
where
    R: MarketplaceRepository + 'static,
{
    let user = current_user(&marketplace, &headers)?;
    let profile = marketplace.update_profile(&user, form)?;
    Ok(Json(json!({
        "message": "perfil actualizado correctamente",
        "user": profile,
    }))
    .into_response())
}

/// Raw dashboard filters, kept as text so empty values and the `0` region can mean
/// "no filter".
#[derive(Debug, Default, Deserialize)]
struct DashboardQuery {
    region: Option<String>,
    comuna: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ComunasQuery {
    region: Option<String>,
}

/// Missing or empty values are absent. Anything else must be a numeric id.
fn optional_id(field: &str, raw: Option<&str>) -> Result<Option<u64>, Response> {
    let raw = raw.map(str::trim).unwrap_or_default();
    if raw.is_empty() {
        return Ok(None);
    }
    raw.parse::<u64>().map(Some).map_err(|_| {
        (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": format!("{field} must be a numeric id") })),
        )
            .into_response()
    })
}

/// Region selector: `0` is the "all regions" entry of the dropdown.
fn optional_region(raw: Option<&str>) -> Result<Option<RegionId>, Response> {
    Ok(optional_id("region", raw)?
        .filter(|id| *id != 0)
        .map(RegionId))
}

async fn dashboard_handler<R>(
    State(marketplace): Shared<R>,
    headers: HeaderMap,
    Query(query): Query<DashboardQuery>,
) -> Result<Response, MarketplaceError>
where
    R: MarketplaceRepository + 'static,
{
    let user = current_user(&marketplace, &headers)?;
    let region = match optional_region(query.region.as_deref()) {
        Ok(region) => region,
        Err(response) => return Ok(response),
    };
    let comuna = match optional_id("comuna", query.comuna.as_deref()) {
        Ok(comuna) => comuna.map(ComunaId),
        Err(response) => return Ok(response),
    };

    let dashboard = marketplace.dashboard(&user, LocationFilter { region, comuna })?;
    Ok(Json(dashboard).into_response())
}

/// `<option>` fragment for the dependent comuna dropdown.
async fn comunas_handler<R>(
    State(marketplace): Shared<R>,
    Query(query): Query<ComunasQuery>,
) -> Result<Response, MarketplaceError>
where
    R: MarketplaceRepository + 'static,
{
    let region = match optional_region(query.region.as_deref()) {
        Ok(Some(region)) => region,
        Ok(None) => return Ok(Html(String::new()).into_response()),
        Err(response) => return Ok(response),
    };

    let fragment = marketplace
        .comunas_for_region(region)?
        .iter()
        .map(|comuna| {
            format!(
                "<option value=\"{}\">{}</option>",
                comuna.id,
                escape_html(&comuna.name)
            )
        })
        .collect::<Vec<_>>()
        .join("\n");
    Ok(Html(fragment).into_response())
}

fn escape_html(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}

async fn property_detail_handler<R>(
    State(marketplace): Shared<R>,
    headers: HeaderMap,
    Path(id): Path<u64>,
) -> Result<Response, MarketplaceError>
where
    R: MarketplaceRepository + 'static,
{
    current_user(&marketplace, &headers)?;
    Ok(Json(marketplace.property_detail(PropertyId(id))?).into_response())
}

async fn new_property_form_handler<R>(
    State(marketplace): Shared<R>,
    headers: HeaderMap,
) -> Result<Response, MarketplaceError>
where
    R: MarketplaceRepository + 'static,
{
    let user = current_user(&marketplace, &headers)?;
    let context = marketplace.property_form(landlord(&user)?, None)?;
    Ok(Json(context).into_response())
}

async fn create_property_handler<R>(
    State(marketplace): Shared<R>,
    headers: HeaderMap,
    FormJson(form): FormJson<PropertyForm>,
) -> Result<Response, MarketplaceError>
where
    R: MarketplaceRepository + 'static,
{
    let user = current_user(&marketplace, &headers)?;
    let property = marketplace.create_property(landlord(&user)?, form)?;
    Ok((StatusCode::CREATED, Json(property)).into_response())
}

async fn edit_property_form_handler<R>(
    State(marketplace): Shared<R>,
    headers: HeaderMap,
    Path(id): Path<u64>,
) -> Result<Response, MarketplaceError>
where
    R: MarketplaceRepository + 'static,
{
    let user = current_user(&marketplace, &headers)?;
    let context = marketplace.property_form(landlord(&user)?, Some(PropertyId(id)))?;
    Ok(Json(context).into_response())
}

async fn update_property_handler<R>(
    State(marketplace): Shared<R>,
    headers: HeaderMap,
    Path(id): Path<u64>,
    FormJson(form): FormJson<PropertyForm>,
) -> Result<Response, MarketplaceError>
where
    R: MarketplaceRepository + 'static,
{
    let user = current_user(&marketplace, &headers)?;
    let property = marketplace.update_property(landlord(&user)?, PropertyId(id), form)?;
    Ok(Json(property).into_response())
}

/// Confirmation page: the property about to be removed.
async fn delete_property_form_handler<R>(
    State(marketplace): Shared<R>,
    headers: HeaderMap,
    Path(id): Path<u64>,
) -> Result<Response, MarketplaceError>
where
    R: MarketplaceRepository + 'static,
{
    let user = current_user(&marketplace, &headers)?;
    let context = marketplace.property_form(landlord(&user)?, Some(PropertyId(id)))?;
    Ok(Json(json!({ "property": context.property })).into_response())
}

async fn delete_property_handler<R>(
    State(marketplace): Shared<R>,
    headers: HeaderMap,
    Path(id): Path<u64>,
) -> Result<Response, MarketplaceError>
where
    R: MarketplaceRepository + 'static,
{
    let user = current_user(&marketplace, &headers)?;
    let removal = marketplace.delete_property(landlord(&user)?, PropertyId(id))?;
    Ok(Json(removal).into_response())
}

async fn request_form_handler<R>(
    State(marketplace): Shared<R>,
    headers: HeaderMap,
    Path(id): Path<u64>,
) -> Result<Response, MarketplaceError>
where
    R: MarketplaceRepository + 'static,
{
    let user = current_user(&marketplace, &headers)?;
    tenant(&user)?;
    Ok(Json(json!({ "property": marketplace.property_detail(PropertyId(id))? })).into_response())
}

async fn create_request_handler<R>(
    State(marketplace): Shared<R>,
    headers: HeaderMap,
    Path(id): Path<u64>,
    FormJson(form): FormJson<RentalRequestForm>,
) -> Result<Response, MarketplaceError>
where
    R: MarketplaceRepository + 'static,
{
    let user = current_user(&marketplace, &headers)?;
    let request = marketplace.create_request(tenant(&user)?, PropertyId(id), form)?;
    Ok((StatusCode::CREATED, Json(request)).into_response())
}

async fn landlord_requests_handler<R>(
    State(marketplace): Shared<R>,
    headers: HeaderMap,
) -> Result<Response, MarketplaceError>
where
    R: MarketplaceRepository + 'static,
{
    let user = current_user(&marketplace, &headers)?;
    let requests = marketplace.requests_for_landlord(landlord(&user)?, false)?;
    Ok(Json(marketplace.present_requests(requests)?).into_response())
}

async fn change_state_handler<R>(
    State(marketplace): Shared<R>,
    headers: HeaderMap,
    Path(id): Path<u64>,
    FormJson(form): FormJson<StateChangeForm>,
) -> Result<Response, MarketplaceError>
where
    R: MarketplaceRepository + 'static,
{
    let user = current_user(&marketplace, &headers)?;
    let change = marketplace.change_request_state(landlord(&user)?, RentalRequestId(id), &form)?;
    Ok(Json(change).into_response())
}

async fn cancel_request_handler<R>(
    State(marketplace): Shared<R>,
    headers: HeaderMap,
    Path(id): Path<u64>,
) -> Result<Response, MarketplaceError>
where
    R: MarketplaceRepository + 'static,
{
    let user = current_user(&marketplace, &headers)?;
    let cancellation = marketplace.cancel_request(tenant(&user)?, RentalRequestId(id))?;
    Ok(Json(cancellation).into_response())
}
