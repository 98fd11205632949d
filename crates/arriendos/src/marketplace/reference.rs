use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use serde::Deserialize;
use tracing::info;

use super::domain::RegionId;
use super::repository::{MarketplaceRepository, RepositoryError};

const BUILT_IN_COMUNAS: &str = include_str!("../../data/comunas.csv");

#[derive(Debug)]
pub enum ReferenceDataError {
    Io(std::io::Error),
    Csv(csv::Error),
    EmptyName { line: u64 },
    Repository(RepositoryError),
}

impl std::fmt::Display for ReferenceDataError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReferenceDataError::Io(err) => write!(f, "failed to read reference data: {}", err),
            ReferenceDataError::Csv(err) => write!(f, "invalid reference data CSV: {}", err),
            ReferenceDataError::EmptyName { line } => {
                write!(f, "reference data line {} has an empty region or comuna", line)
            }
            ReferenceDataError::Repository(err) => {
                write!(f, "could not store reference data: {}", err)
            }
        }
    }
}

impl std::error::Error for ReferenceDataError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ReferenceDataError::Io(err) => Some(err),
            ReferenceDataError::Csv(err) => Some(err),
            ReferenceDataError::EmptyName { .. } => None,
            ReferenceDataError::Repository(err) => Some(err),
        }
    }
}

impl From<std::io::Error> for ReferenceDataError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<csv::Error> for ReferenceDataError {
    fn from(err: csv::Error) -> Self {
        Self::Csv(err)
    }
}

impl From<RepositoryError> for ReferenceDataError {
    fn from(err: RepositoryError) -> Self {
        Self::Repository(err)
    }
}

#[derive(Debug, Deserialize)]
struct ReferenceRow {
    region: String,
    comuna: String,
}

/// Counts of rows created by a reference data load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReferenceDataSummary {
    pub regions: usize,
    pub comunas: usize,
}

/// Seeds regions and comunas from `region,comuna` CSV rows.
pub struct ReferenceDataLoader;

impl ReferenceDataLoader {
    pub fn built_in<R: MarketplaceRepository>(
        repository: &R,
    ) -> Result<ReferenceDataSummary, ReferenceDataError> {
        Self::from_reader(repository, BUILT_IN_COMUNAS.as_bytes())
    }

    pub fn from_path<R: MarketplaceRepository, P: AsRef<Path>>(
        repository: &R,
        path: P,
    ) -> Result<ReferenceDataSummary, ReferenceDataError> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(repository, file)
    }

    pub fn from_reader<R: MarketplaceRepository, T: Read>(
        repository: &R,
        reader: T,
    ) -> Result<ReferenceDataSummary, ReferenceDataError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut regions: HashMap<String, RegionId> = repository
            .regions()?
            .into_iter()
            .map(|region| (region.name, region.id))
            .collect();
        let mut summary = ReferenceDataSummary::default();

        let headers = csv_reader.headers()?.clone();
        let mut record = csv::StringRecord::new();
        while csv_reader.read_record(&mut record)? {
            let row: ReferenceRow = record.deserialize(Some(&headers))?;
            if row.region.is_empty() || row.comuna.is_empty() {
                // line where the record starts, so quoted multi-line names count correctly
                let line = record.position().map(csv::Position::line).unwrap_or_default();
                return Err(ReferenceDataError::EmptyName { line });
            }

            let region_id = match regions.get(&row.region) {
                Some(id) => *id,
                None => {
                    let region = repository.insert_region(&row.region)?;
                    summary.regions += 1;
                    regions.insert(region.name, region.id);
                    region.id
                }
            };

            match repository.insert_comuna(region_id, &row.comuna) {
                Ok(_) => summary.comunas += 1,
                Err(RepositoryError::Conflict) => {}
                Err(err) => return Err(err.into()),
            }
        }

        info!(
            regions = summary.regions,
            comunas = summary.comunas,
            "reference data loaded"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::marketplace::memory::InMemoryMarketplace;

    #[test]
    fn built_in_dataset_groups_comunas_under_regions() {
        let store = InMemoryMarketplace::new();
        let summary = ReferenceDataLoader::built_in(&store).expect("built-in data loads");

        assert!(summary.regions >= 10);
        assert_eq!(store.comunas().expect("comunas").len(), summary.comunas);

        let metropolitana = store
            .regions()
            .expect("regions")
            .into_iter()
            .find(|region| region.name == "Metropolitana de Santiago")
            .expect("metropolitan region present");
        let names: Vec<String> = store
            .comunas_in_region(metropolitana.id)
            .expect("comunas")
            .into_iter()
            .map(|comuna| comuna.name)
            .collect();
        assert!(names.contains(&"Ñuñoa".to_string()));
        assert!(!names.contains(&"Viña del Mar".to_string()));
    }

    #[test]
    fn duplicate_rows_are_ignored_and_regions_reused() {
        let store = InMemoryMarketplace::new();
        let csv = "region,comuna\nMaule,Talca\nMaule,Talca\nMaule,Curicó\n";
        let summary =
            ReferenceDataLoader::from_reader(&store, csv.as_bytes()).expect("csv loads");

        assert_eq!(
            summary,
            ReferenceDataSummary {
                regions: 1,
                comunas: 2
            }
        );
    }

    #[test]
    fn empty_names_are_rejected() {
        let store = InMemoryMarketplace::new();
        let csv = "region,comuna\nMaule,\n";
        let err = ReferenceDataLoader::from_reader(&store, csv.as_bytes())
            .expect_err("empty comuna rejected");
        assert!(matches!(err, ReferenceDataError::EmptyName { line: 2 }));
    }

    #[test]
    fn empty_name_line_accounts_for_multi_line_quoted_fields() {
        let store = InMemoryMarketplace::new();
        let csv = "region,comuna\n\"Los\nRíos\",Valdivia\nMaule,\n";
        let err = ReferenceDataLoader::from_reader(&store, csv.as_bytes())
            .expect_err("empty comuna rejected");
        assert!(
            matches!(err, ReferenceDataError::EmptyName { line: 4 }),
            "unexpected error: {err:?}"
        );
    }
}
