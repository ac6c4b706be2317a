use crate::correction::CORRECTION_COLUMN;
use crate::dataset::{Dataset, Record};
use crate::error::{DashboardError, Result};
use crate::schema::DatasetSchema;
use chrono::NaiveDate;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};

const DIVISIONS: [&str; 4] = ["North", "South", "East", "West"];
const TYPES: [&str; 3] = ["Type A", "Type B", "Type C"];
const ITEMS: [&str; 4] = ["Item 1", "Item 2", "Item 3", "Item 4"];
const FUNCTIONS: [&str; 4] = ["Sales", "Marketing", "Operations", "Support"];

/// (column, mean, standard deviation)
const METRIC_DISTRIBUTIONS: [(&str, f64, f64); 8] = [
    ("Amount_total", 1000.0, 200.0),
    ("Amount_1", 300.0, 50.0),
    ("Amount_2", 400.0, 60.0),
    ("Amount_3", 300.0, 40.0),
    ("Income_total", 1200.0, 250.0),
    ("Income_1", 400.0, 80.0),
    ("Income_2", 500.0, 90.0),
    ("Income_3", 300.0, 50.0),
];

#[derive(Debug, Clone, PartialEq)]
pub struct SampleConfig {
    pub seed: u64,
    pub start_year: i32,
    pub end_year: i32,
    pub records_per_month: usize,
}

impl Default for SampleConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            start_year: 2020,
            end_year: 2024,
            records_per_month: 10,
        }
    }
}

/// Seeded synthetic dataset in the standard schema, used when no input table is available.
pub fn sample_dataset(config: &SampleConfig) -> Result<Dataset> {
    let mut rng = StdRng::seed_from_u64(config.seed);
    let distributions = METRIC_DISTRIBUTIONS
        .iter()
        .map(|(column, mean, sd)| normal(*mean, *sd).map(|distribution| (*column, distribution)))
        .collect::<Result<Vec<_>>>()?;

    let mut records = Vec::new();
    for year in config.start_year..=config.end_year {
        for month in 1..=12 {
            let date = month_start(year, month)?;
            for _ in 0..config.records_per_month {
                let mut record = Record::new(date)
                    .with_dimension("Division", pick(&DIVISIONS, &mut rng))
                    .with_dimension("Type", pick(&TYPES, &mut rng))
                    .with_dimension("Item", pick(&ITEMS, &mut rng))
                    .with_dimension("Function", pick(&FUNCTIONS, &mut rng));

                for (column, distribution) in &distributions {
                    record = record.with_metric(column, distribution.sample(&mut rng));
                }
                records.push(record);
            }
        }
    }

    Dataset::new(DatasetSchema::standard(), records)
}

/// Correction table mirroring `primary`: each record's income scaled by noise around 1.0.
pub fn sample_correction_dataset(primary: &Dataset, seed: u64, noise_factor: f64) -> Result<Dataset> {
    let mut rng = StdRng::seed_from_u64(seed);
    let noise = normal(1.0, noise_factor)?;

    let records = primary
        .records()
        .iter()
        .map(|source| {
            let mut record = Record::new(source.date);
            record.dimensions = source.dimensions.clone();
            record.with_metric(
                CORRECTION_COLUMN,
                source.metric("Income_total") * noise.sample(&mut rng),
            )
        })
        .collect();

    Dataset::new(
        DatasetSchema::correction(&primary.schema().dimensions),
        records,
    )
}

fn normal(mean: f64, sd: f64) -> Result<Normal<f64>> {
    Normal::new(mean, sd).map_err(|e| DashboardError::SampleError(e.to_string()))
}

fn month_start(year: i32, month: u32) -> Result<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| DashboardError::DateError(format!("Invalid month {}-{}", year, month)))
}

fn pick<'a>(options: &[&'a str], rng: &mut StdRng) -> &'a str {
    options.choose(rng).copied().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_dataset_shape() {
        let config = SampleConfig {
            start_year: 2022,
            end_year: 2023,
            records_per_month: 3,
            ..SampleConfig::default()
        };
        let dataset = sample_dataset(&config).unwrap();

        assert_eq!(dataset.len(), 2 * 12 * 3);
        assert_eq!(dataset.year_bounds(), (2022, 2023));
        assert_eq!(dataset.months().len(), 24);
        assert!(dataset.categories("Division").len() <= 4);
    }

    #[test]
    fn test_sample_dataset_is_seeded() {
        let config = SampleConfig::default();
        assert_eq!(sample_dataset(&config).unwrap(), sample_dataset(&config).unwrap());
    }

    #[test]
    fn test_sample_correction_dataset() {
        let primary = sample_dataset(&SampleConfig {
            records_per_month: 2,
            ..SampleConfig::default()
        })
        .unwrap();
        let correction = sample_correction_dataset(&primary, 7, 0.0).unwrap();

        assert_eq!(correction.len(), primary.len());
        for (p, c) in primary.records().iter().zip(correction.records()) {
            assert_eq!(p.metric("Income_total"), c.metric(CORRECTION_COLUMN));
        }
    }
}
