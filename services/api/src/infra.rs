use arriendos::config::MarketplaceConfig;
use arriendos::error::AppError;
use arriendos::marketplace::{
    InMemoryMarketplace, Marketplace, PasswordHasherService, ReferenceDataLoader,
};
use chrono::Duration;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

pub(crate) type SharedMarketplace = Arc<Marketplace<InMemoryMarketplace>>;

/// Build the in-memory marketplace and seed its regions and comunas.
pub(crate) fn build_marketplace(config: &MarketplaceConfig) -> Result<SharedMarketplace, AppError> {
    let repository = Arc::new(InMemoryMarketplace::new());
    let summary = match &config.reference_data {
        Some(path) => {
            info!(path = %path.display(), "loading reference data from file");
            ReferenceDataLoader::from_path(repository.as_ref(), path)?
        }
        None => ReferenceDataLoader::built_in(repository.as_ref())?,
    };
    info!(
        regions = summary.regions,
        comunas = summary.comunas,
        "marketplace seeded"
    );

    let passwords = PasswordHasherService::new(config.password_pepper.clone());
    let mut marketplace = Marketplace::new(repository, passwords);
    if let Some(hours) = config.session_ttl_hours {
        info!(hours, "session lifetime configured");
        marketplace = marketplace.with_session_ttl(Duration::hours(i64::from(hours)));
    }
    Ok(Arc::new(marketplace))
}

#[cfg(test)]
mod tests {
    use super::*;
    use arriendos::marketplace::MarketplaceRepository;
    use std::io::Write;

    #[test]
    fn built_in_reference_data_seeds_the_store() {
        let marketplace = build_marketplace(&MarketplaceConfig::default()).expect("seeded");
        let regions = marketplace.repository().regions().expect("regions");
        assert!(regions
            .iter()
            .any(|region| region.name == "Metropolitana de Santiago"));
        assert!(!marketplace.repository().comunas().expect("comunas").is_empty());
    }

    #[test]
    fn reference_data_file_overrides_the_built_in_set() {
        let path = std::env::temp_dir().join(format!(
            "arriendos-reference-{}.csv",
            std::process::id()
        ));
        let mut file = std::fs::File::create(&path).expect("temp file");
        writeln!(file, "region,comuna\nAraucanía,Temuco\nAraucanía,Pucón").expect("write");

        let config = MarketplaceConfig {
            reference_data: Some(path.clone()),
            ..MarketplaceConfig::default()
        };
        let marketplace = build_marketplace(&config).expect("seeded");
        std::fs::remove_file(&path).ok();

        let regions = marketplace.repository().regions().expect("regions");
        assert_eq!(regions.len(), 1);
        assert_eq!(marketplace.repository().comunas().expect("comunas").len(), 2);
    }
}
