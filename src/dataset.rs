use crate::error::{DashboardError, Result};
use crate::schema::{DatasetSchema, MetricSelector};
use crate::utils::MonthKey;
use chrono::{Datelike, NaiveDate};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub date: NaiveDate,
    /// Dimension name -> category label
    pub dimensions: BTreeMap<String, String>,
    /// Metric name -> value
    pub metrics: BTreeMap<String, f64>,
}

impl Record {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            dimensions: BTreeMap::new(),
            metrics: BTreeMap::new(),
        }
    }

    pub fn with_dimension(mut self, name: &str, value: &str) -> Self {
        self.dimensions.insert(name.to_string(), value.to_string());
        self
    }

    pub fn with_metric(mut self, name: &str, value: f64) -> Self {
        self.metrics.insert(name.to_string(), value);
        self
    }

    pub fn month(&self) -> MonthKey {
        MonthKey::from_date(self.date)
    }

    pub fn year(&self) -> i32 {
        self.date.year()
    }

    pub fn dimension(&self, name: &str) -> Option<&str> {
        self.dimensions.get(name).map(String::as_str)
    }

    /// Missing metrics read as zero.
    pub fn metric(&self, name: &str) -> f64 {
        self.metrics.get(name).copied().unwrap_or(0.0)
    }
}

/// An immutable, validated table of records sorted by date.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    schema: DatasetSchema,
    records: Vec<Record>,
    min_date: NaiveDate,
    max_date: NaiveDate,
}

impl Dataset {
    pub fn new(schema: DatasetSchema, mut records: Vec<Record>) -> Result<Self> {
        schema.validate()?;

        if records.is_empty() {
            return Err(DashboardError::EmptyDataset);
        }

        let metric_columns = schema.metric_columns();
        for (row, record) in records.iter().enumerate() {
            for dimension in &schema.dimensions {
                if !record.dimensions.contains_key(dimension) {
                    return Err(DashboardError::MissingColumn {
                        row,
                        column: dimension.clone(),
                    });
                }
            }

            for metric in &metric_columns {
                match record.metrics.get(metric) {
                    None => {
                        return Err(DashboardError::MissingColumn {
                            row,
                            column: metric.clone(),
                        })
                    }
                    Some(value) if !value.is_finite() => {
                        return Err(DashboardError::InvalidValue {
                            row,
                            column: metric.clone(),
                            value: value.to_string(),
                        })
                    }
                    Some(_) => {}
                }
            }
        }

        records.sort_by_key(|r| r.date);

        let min_date = records.first().map(|r| r.date).unwrap_or(NaiveDate::MIN);
        let max_date = records.last().map(|r| r.date).unwrap_or(NaiveDate::MIN);

        info!(
            "Loaded dataset with {} records from {} to {}",
            records.len(),
            min_date,
            max_date
        );
        debug!(
            "Dataset dimensions: {:?}, metrics: {:?}",
            schema.dimensions, metric_columns
        );

        Ok(Self {
            schema,
            records,
            min_date,
            max_date,
        })
    }

    pub fn schema(&self) -> &DatasetSchema {
        &self.schema
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn year_bounds(&self) -> (i32, i32) {
        (self.min_date.year(), self.max_date.year())
    }

    /// Distinct months present in the data, oldest first.
    pub fn months(&self) -> Vec<MonthKey> {
        self.records
            .iter()
            .map(Record::month)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Distinct category labels of a dimension in ordinal order. Unknown dimensions yield nothing.
    pub fn categories(&self, dimension: &str) -> Vec<String> {
        if !self.schema.has_dimension(dimension) {
            return Vec::new();
        }

        self.records
            .iter()
            .filter_map(|r| r.dimension(dimension))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .map(str::to_string)
            .collect()
    }
}

/// The read-only data every engine call runs against: the primary table plus
/// an optional correction table for the tool comparison.
#[derive(Debug, Clone)]
pub struct DataContext {
    primary: Arc<Dataset>,
    correction: Option<Arc<Dataset>>,
}

impl DataContext {
    pub fn new(primary: Dataset) -> Result<Self> {
        if primary.schema().metric_set(MetricSelector::Total).is_none() {
            return Err(DashboardError::SchemaError(
                "Primary dataset must map the Total metric selector".to_string(),
            ));
        }

        Ok(Self {
            primary: Arc::new(primary),
            correction: None,
        })
    }

    pub fn with_correction(mut self, correction: Dataset) -> Result<Self> {
        for dimension in &self.primary.schema().dimensions {
            if !correction.schema().has_dimension(dimension) {
                return Err(DashboardError::SchemaError(format!(
                    "Correction table is missing dimension '{}'",
                    dimension
                )));
            }
        }

        if !correction
            .schema()
            .has_metric(crate::correction::CORRECTION_COLUMN)
        {
            return Err(DashboardError::SchemaError(format!(
                "Correction table is missing metric '{}'",
                crate::correction::CORRECTION_COLUMN
            )));
        }

        self.correction = Some(Arc::new(correction));
        Ok(self)
    }

    pub fn primary(&self) -> &Dataset {
        &self.primary
    }

    pub fn correction(&self) -> Option<&Dataset> {
        self.correction.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(date: (i32, u32, u32), division: &str, amount: f64) -> Record {
        let mut record = Record::new(NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap())
            .with_dimension("Division", division)
            .with_dimension("Type", "Type A")
            .with_dimension("Item", "Item 1")
            .with_dimension("Function", "Sales");
        for column in DatasetSchema::standard().metric_columns() {
            record = record.with_metric(&column, 0.0);
        }
        record.with_metric("Amount_total", amount)
    }

    #[test]
    fn test_dataset_sorts_and_bounds() {
        let dataset = Dataset::new(
            DatasetSchema::standard(),
            vec![
                record((2023, 5, 1), "North", 10.0),
                record((2021, 2, 1), "South", 20.0),
                record((2022, 7, 1), "North", 30.0),
            ],
        )
        .unwrap();

        assert_eq!(dataset.len(), 3);
        assert_eq!(dataset.year_bounds(), (2021, 2023));
        assert_eq!(dataset.records()[0].metric("Amount_total"), 20.0);
        assert_eq!(dataset.months().len(), 3);
        assert_eq!(dataset.categories("Division"), vec!["North", "South"]);
        assert!(dataset.categories("Region").is_empty());
    }

    #[test]
    fn test_dataset_rejects_missing_column() {
        let mut broken = record((2023, 1, 1), "North", 1.0);
        broken.metrics.remove("Income_3");

        let result = Dataset::new(DatasetSchema::standard(), vec![broken]);
        assert!(matches!(
            result,
            Err(DashboardError::MissingColumn { row: 0, ref column }) if column == "Income_3"
        ));
    }

    #[test]
    fn test_dataset_rejects_empty_and_non_finite() {
        assert!(matches!(
            Dataset::new(DatasetSchema::standard(), vec![]),
            Err(DashboardError::EmptyDataset)
        ));

        let nan = record((2023, 1, 1), "North", f64::NAN);
        assert!(matches!(
            Dataset::new(DatasetSchema::standard(), vec![nan]),
            Err(DashboardError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_context_requires_total_selector() {
        let mut schema = DatasetSchema::standard();
        schema.metric_sets.retain(|m| m.selector != MetricSelector::Total);
        let mut rec = record((2023, 1, 1), "North", 1.0);
        rec.metrics.remove("Amount_total");
        rec.metrics.remove("Income_total");

        let dataset = Dataset::new(schema, vec![rec]).unwrap();
        assert!(DataContext::new(dataset).is_err());
    }
}
