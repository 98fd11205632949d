use crate::infra::{build_marketplace, SharedMarketplace};
use arriendos::config::MarketplaceConfig;
use arriendos::error::AppError;
use arriendos::marketplace::{
    Forbidden, MarketplaceError, MarketplaceRepository, PropertyForm, PropertyId,
    RegistrationForm, RentalRequestFilter, RentalRequestForm, RentalRequestId, RequestState,
    StateChangeForm, User, UserRole,
};
use chrono::SecondsFormat;
use clap::Args;
use serde::Serialize;
use serde_json::json;
use std::path::PathBuf;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Optional `region,comuna` CSV used instead of the bundled reference data.
    #[arg(long)]
    pub(crate) reference_data: Option<PathBuf>,
    /// Print every step as a JSON document instead of plain text.
    #[arg(long)]
    pub(crate) json: bool,
}

#[derive(Debug, Serialize)]
struct StepSnapshot {
    step: &'static str,
    property_id: PropertyId,
    property_available: bool,
    requests: Vec<RequestLine>,
}

#[derive(Debug, Serialize)]
struct RequestLine {
    id: RentalRequestId,
    tenant: String,
    state: RequestState,
    created_at: String,
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        reference_data,
        json,
    } = args;

    let marketplace = build_marketplace(&MarketplaceConfig {
        reference_data,
        ..MarketplaceConfig::default()
    })?;
    let comuna = marketplace
        .repository()
        .comunas()
        .map_err(MarketplaceError::from)?
        .into_iter()
        .next();
    let Some(comuna) = comuna else {
        println!("No comunas available; load reference data to run the demo.");
        return Ok(());
    };

    println!("Rental request lifecycle demo");
    println!("Listing located in comuna {} ({})", comuna.name, comuna.id);

    let landlord = register(&marketplace, "lorena", UserRole::Landlord, "11111111-1")?;
    let first_tenant = register(&marketplace, "tomas", UserRole::Tenant, "22222222-2")?;
    let second_tenant = register(&marketplace, "valentina", UserRole::Tenant, "12345678-5")?;
    let owner = landlord
        .as_landlord()
        .ok_or(MarketplaceError::Forbidden(Forbidden::LandlordsOnly))?;
    let tomas = first_tenant
        .as_tenant()
        .ok_or(MarketplaceError::Forbidden(Forbidden::TenantsOnly))?;
    let valentina = second_tenant
        .as_tenant()
        .ok_or(MarketplaceError::Forbidden(Forbidden::TenantsOnly))?;

    let property = marketplace.create_property(
        owner,
        PropertyForm {
            name: "Departamento luminoso".to_string(),
            description: "Dos dormitorios con balcón".to_string(),
            built_m2: Some(json!(58)),
            total_m2: Some(json!(64)),
            parking_spots: Some(json!(1)),
            bedrooms: Some(json!(2)),
            bathrooms: Some(json!(1)),
            address: "Av. Principal 123".to_string(),
            comuna: Some(comuna.id.0.into()),
            kind: "departamento".to_string(),
            monthly_rent: Some(json!(480_000)),
            image: None,
            available: None,
        },
    )?;
    report(&marketplace, "property listed", property.id, json)?;

    let first_request = marketplace.create_request(
        tomas,
        property.id,
        RentalRequestForm {
            message: "Me gustaría arrendarlo desde el próximo mes".to_string(),
        },
    )?;
    marketplace.create_request(
        valentina,
        property.id,
        RentalRequestForm {
            message: "¿Se aceptan mascotas?".to_string(),
        },
    )?;
    report(&marketplace, "two tenants requested", property.id, json)?;

    marketplace.change_request_state(
        owner,
        first_request.id,
        &StateChangeForm {
            nuevo_estado: RequestState::Aceptada.label().to_string(),
        },
    )?;
    report(&marketplace, "first request accepted", property.id, json)?;

    marketplace.cancel_request(tomas, first_request.id)?;
    report(&marketplace, "accepted request cancelled", property.id, json)?;

    Ok(())
}

fn register(
    marketplace: &SharedMarketplace,
    username: &str,
    role: UserRole,
    rut: &str,
) -> Result<User, AppError> {
    let session = marketplace.register(RegistrationForm {
        username: username.to_string(),
        password: format!("{username}-demo-password"),
        first_names: username.to_string(),
        last_names: "Demo".to_string(),
        rut: rut.to_string(),
        address: "Calle Demo 1".to_string(),
        phone: "+56900000000".to_string(),
        email: format!("{username}@demo.cl"),
        role: role.label().to_string(),
    })?;
    Ok(marketplace.authenticate(&session.token)?)
}

fn snapshot(
    marketplace: &SharedMarketplace,
    step: &'static str,
    property_id: PropertyId,
) -> Result<StepSnapshot, AppError> {
    let repository = marketplace.repository();
    let property_available = repository
        .property(property_id)
        .map_err(MarketplaceError::from)?
        .map(|property| property.available)
        .unwrap_or(false);

    let requests = repository
        .rental_requests(&RentalRequestFilter {
            property: Some(property_id),
            ..RentalRequestFilter::default()
        })
        .map_err(MarketplaceError::from)?
        .into_iter()
        .map(|request| {
            let tenant = repository
                .user(request.tenant_id)
                .ok()
                .flatten()
                .map(|user| user.username)
                .unwrap_or_else(|| request.tenant_id.to_string());
            RequestLine {
                id: request.id,
                tenant,
                state: request.state,
                created_at: request.created_at.to_rfc3339_opts(SecondsFormat::Secs, true),
            }
        })
        .collect();

    Ok(StepSnapshot {
        step,
        property_id,
        property_available,
        requests,
    })
}

fn report(
    marketplace: &SharedMarketplace,
    step: &'static str,
    property_id: PropertyId,
    json: bool,
) -> Result<(), AppError> {
    let snapshot = snapshot(marketplace, step, property_id)?;

    if json {
        match serde_json::to_string_pretty(&snapshot) {
            Ok(rendered) => println!("{rendered}"),
            Err(err) => println!("  Snapshot unavailable: {}", err),
        }
        return Ok(());
    }

    println!("\n{}", snapshot.step);
    println!(
        "  Property {} available: {}",
        snapshot.property_id,
        if snapshot.property_available { "yes" } else { "no" }
    );
    if snapshot.requests.is_empty() {
        println!("  Requests: none");
    } else {
        println!("  Requests:");
        for request in &snapshot.requests {
            println!(
                "    #{} by {} is {} (submitted {})",
                request.id, request.tenant, request.state, request.created_at
            );
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demo_runs_against_built_in_reference_data() {
        run_demo(DemoArgs::default()).expect("demo completes");
    }

    #[test]
    fn snapshot_reflects_the_lifecycle() {
        let marketplace = build_marketplace(&MarketplaceConfig::default()).expect("seeded");
        let owner = register(&marketplace, "lorena", UserRole::Landlord, "11111111-1")
            .expect("landlord");
        let tenant = register(&marketplace, "tomas", UserRole::Tenant, "22222222-2")
            .expect("tenant");
        let comuna = marketplace
            .repository()
            .comunas()
            .expect("comunas")
            .remove(0);

        let property = marketplace
            .create_property(
                owner.as_landlord().expect("landlord"),
                PropertyForm {
                    name: "Casa".to_string(),
                    description: "Casa con patio".to_string(),
                    built_m2: Some(json!(90)),
                    total_m2: Some(json!(200)),
                    parking_spots: Some(json!(2)),
                    bedrooms: Some(json!(3)),
                    bathrooms: Some(json!(2)),
                    address: "Pasaje Uno 5".to_string(),
                    comuna: Some(comuna.id.0.into()),
                    kind: "casa".to_string(),
                    monthly_rent: Some(json!(700_000)),
                    image: None,
                    available: None,
                },
            )
            .expect("listed");
        let request = marketplace
            .create_request(
                tenant.as_tenant().expect("tenant"),
                property.id,
                RentalRequestForm {
                    message: "Interesado".to_string(),
                },
            )
            .expect("requested");
        marketplace
            .change_request_state(
                owner.as_landlord().expect("landlord"),
                request.id,
                &StateChangeForm {
                    nuevo_estado: "aceptada".to_string(),
                },
            )
            .expect("accepted");

        let snapshot = snapshot(&marketplace, "accepted", property.id).expect("snapshot");
        assert!(!snapshot.property_available);
        assert_eq!(snapshot.requests.len(), 1);
        assert_eq!(snapshot.requests[0].tenant, "tomas");
        assert_eq!(snapshot.requests[0].state, RequestState::Aceptada);
    }
}
