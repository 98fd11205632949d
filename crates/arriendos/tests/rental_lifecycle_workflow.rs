//! End-to-end rental request scenarios driven through the public marketplace facade and router.

mod common {
    use std::sync::Arc;

    use arriendos::marketplace::{
        ComunaId, InMemoryMarketplace, LoginForm, Marketplace, MarketplaceRepository,
        PasswordHasherService, PropertyForm, ReferenceDataLoader, RegistrationForm, User,
        UserRole,
    };
    use serde_json::json;

    pub(super) type Service = Marketplace<InMemoryMarketplace>;

    pub(super) fn marketplace() -> Arc<Service> {
        let repository = Arc::new(InMemoryMarketplace::new());
        ReferenceDataLoader::built_in(repository.as_ref()).expect("reference data loads");
        Arc::new(Marketplace::new(repository, PasswordHasherService::new(None)))
    }

    pub(super) fn comuna_named(service: &Service, name: &str) -> ComunaId {
        service
            .repository()
            .comunas()
            .expect("comunas")
            .into_iter()
            .find(|comuna| comuna.name == name)
            .map(|comuna| comuna.id)
            .expect("comuna seeded")
    }

    pub(super) fn register(service: &Service, username: &str, role: UserRole) -> User {
        let session = service
            .register(RegistrationForm {
                username: username.to_string(),
                password: "contraseña-larga".to_string(),
                first_names: "Nombre".to_string(),
                last_names: "Apellido".to_string(),
                rut: "22.222.222-2".to_string(),
                address: "Calle Larga 10".to_string(),
                phone: "+56955554444".to_string(),
                email: format!("{username}@ejemplo.cl"),
                role: role.label().to_string(),
            })
            .expect("registration succeeds");
        service.authenticate(&session.token).expect("session")
    }

    pub(super) fn login(service: &Service, username: &str) -> String {
        service
            .login(LoginForm {
                username: username.to_string(),
                password: "contraseña-larga".to_string(),
            })
            .expect("login succeeds")
            .token
            .0
    }

    pub(super) fn listing(comuna: ComunaId) -> PropertyForm {
        PropertyForm {
            name: "Parcela con vista".to_string(),
            description: "Media hectárea con pozo propio".to_string(),
            built_m2: Some(json!(80)),
            total_m2: Some(json!(5_000)),
            parking_spots: Some(json!(3)),
            bedrooms: Some(json!(3)),
            bathrooms: Some(json!(2)),
            address: "Camino Interior km 4".to_string(),
            comuna: Some(comuna.0.into()),
            kind: "parcela".to_string(),
            monthly_rent: Some(json!(650_000)),
            image: Some("vista.png".to_string()),
            available: None,
        }
    }
}

use std::sync::Arc;

use arriendos::marketplace::{
    marketplace_router, LocationFilter, MarketplaceRepository, RentalRequestFilter,
    RentalRequestForm, RequestState, StateChangeForm, UserRole,
};
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use common::*;
use serde_json::Value;
use tower::ServiceExt;

#[test]
fn listing_request_acceptance_and_cancellation_round_trip_availability() {
    let service = marketplace();
    let comuna = comuna_named(&service, "Ñuñoa");
    let landlord_user = register(&service, "lorena", UserRole::Landlord);
    let tenant_user = register(&service, "tomas", UserRole::Tenant);
    let landlord = landlord_user.as_landlord().expect("landlord");
    let tenant = tenant_user.as_tenant().expect("tenant");

    let property = service
        .create_property(landlord, listing(comuna))
        .expect("listed");
    assert!(property.available);

    let request = service
        .create_request(
            tenant,
            property.id,
            RentalRequestForm {
                message: "Quisiera arrendar".to_string(),
            },
        )
        .expect("requested");
    assert_eq!(request.state, RequestState::Pendiente);

    let change = service
        .change_request_state(
            landlord,
            request.id,
            &StateChangeForm {
                nuevo_estado: "aceptada".to_string(),
            },
        )
        .expect("accepted");
    assert_eq!(change.state, RequestState::Aceptada);
    let stored = service
        .repository()
        .property(property.id)
        .expect("lookup")
        .expect("exists");
    assert!(!stored.available);

    service.cancel_request(tenant, request.id).expect("cancelled");
    let stored = service
        .repository()
        .property(property.id)
        .expect("lookup")
        .expect("exists");
    assert!(stored.available);
    assert!(service
        .repository()
        .rental_request(request.id)
        .expect("lookup")
        .is_none());
}

#[test]
fn two_tenants_request_the_same_property_before_any_acceptance() {
    let service = marketplace();
    let comuna = comuna_named(&service, "Viña del Mar");
    let landlord_user = register(&service, "lorena", UserRole::Landlord);
    let first = register(&service, "tomas", UserRole::Tenant);
    let second = register(&service, "valentina", UserRole::Tenant);

    let property = service
        .create_property(landlord_user.as_landlord().expect("landlord"), listing(comuna))
        .expect("listed");

    for tenant in [&first, &second] {
        service
            .create_request(
                tenant.as_tenant().expect("tenant"),
                property.id,
                RentalRequestForm {
                    message: format!("Solicitud de {}", tenant.username),
                },
            )
            .expect("requested");
    }

    let requests = service
        .repository()
        .rental_requests(&RentalRequestFilter {
            property: Some(property.id),
            ..RentalRequestFilter::default()
        })
        .expect("requests");
    assert_eq!(requests.len(), 2);
    assert!(requests
        .iter()
        .all(|request| request.state == RequestState::Pendiente));
    let tenants: Vec<_> = requests.iter().map(|request| request.tenant_id).collect();
    assert_eq!(tenants, vec![first.id, second.id]);

    let available = service
        .available_properties(LocationFilter::default())
        .expect("listing");
    assert!(available.iter().any(|listed| listed.id == property.id));
}

#[test]
fn region_filter_matches_only_the_selected_region() {
    let service = marketplace();
    let landlord_user = register(&service, "lorena", UserRole::Landlord);
    let landlord = landlord_user.as_landlord().expect("landlord");
    for name in ["Ñuñoa", "Providencia", "Viña del Mar", "Valparaíso"] {
        service
            .create_property(landlord, listing(comuna_named(&service, name)))
            .expect("listed");
    }

    let regions = service.regions().expect("regions");
    let repository = service.repository();
    for region in regions {
        let listed = service
            .available_properties(LocationFilter {
                region: Some(region.id),
                comuna: None,
            })
            .expect("listing");
        for property in listed {
            let comuna = repository
                .comuna(property.details.comuna_id)
                .expect("lookup")
                .expect("comuna exists");
            assert_eq!(comuna.region_id, region.id);
        }
    }
}

#[tokio::test]
async fn http_flow_redirects_tenant_away_from_state_changes() {
    let service = marketplace();
    let comuna = comuna_named(&service, "Providencia");
    let landlord_user = register(&service, "lorena", UserRole::Landlord);
    let property = service
        .create_property(landlord_user.as_landlord().expect("landlord"), listing(comuna))
        .expect("listed");
    let tenant_user = register(&service, "tomas", UserRole::Tenant);
    let request = service
        .create_request(
            tenant_user.as_tenant().expect("tenant"),
            property.id,
            RentalRequestForm {
                message: "Hola".to_string(),
            },
        )
        .expect("requested");
    let landlord_token = login(&service, "lorena");
    let tenant_token = login(&service, "tomas");

    let router = marketplace_router(Arc::clone(&service));
    let response = router
        .clone()
        .oneshot(
            Request::post(format!("/solicitud/{}/estado", request.id))
                .header(header::AUTHORIZATION, format!("Bearer {tenant_token}"))
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"nuevo_estado":"aceptada"}"#))
                .expect("request"),
        )
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    let response = router
        .oneshot(
            Request::post(format!("/solicitud/{}/estado", request.id))
                .header(header::AUTHORIZATION, format!("Bearer {landlord_token}"))
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"nuevo_estado":"rechazada"}"#))
                .expect("request"),
        )
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), 16 * 1024)
        .await
        .expect("body");
    let payload: Value = serde_json::from_slice(&body).expect("json");
    assert_eq!(payload["state"], Value::from("rechazada"));
    assert_eq!(payload["property_available"], Value::from(false));
}
