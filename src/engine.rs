use crate::dataset::{Dataset, Record};
use crate::error::{DashboardError, Result};
use crate::query::{BreakdownMode, ResolvedQuery};
use crate::schema::QueryParameters;
use crate::utils::MonthKey;
use log::debug;
use std::collections::{BTreeMap, BTreeSet};

/// A month, optionally split by a category label. `None` sorts before every label.
pub type AggregateKey = (MonthKey, Option<String>);

/// Summed metric values per (month, category) bucket, one map per metric column.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateTable {
    breakdown: BreakdownMode,
    metrics: Vec<String>,
    cells: BTreeMap<String, BTreeMap<AggregateKey, f64>>,
}

impl AggregateTable {
    fn empty(breakdown: BreakdownMode, metrics: Vec<String>) -> Self {
        let cells = metrics
            .iter()
            .map(|m| (m.clone(), BTreeMap::new()))
            .collect();
        Self {
            breakdown,
            metrics,
            cells,
        }
    }

    pub fn breakdown(&self) -> &BreakdownMode {
        &self.breakdown
    }

    pub fn metrics(&self) -> &[String] {
        &self.metrics
    }

    pub fn is_empty(&self) -> bool {
        self.cells.values().all(BTreeMap::is_empty)
    }

    pub fn cells(&self, metric: &str) -> Option<&BTreeMap<AggregateKey, f64>> {
        self.cells.get(metric)
    }

    /// Months with at least one contributing record, oldest first.
    pub fn months(&self) -> Vec<MonthKey> {
        self.cells
            .values()
            .flat_map(|cells| cells.keys().map(|(month, _)| *month))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Category labels of the breakdown dimension in ordinal order.
    pub fn categories(&self) -> Vec<String> {
        self.cells
            .values()
            .flat_map(|cells| cells.keys().filter_map(|(_, category)| category.clone()))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn value(&self, metric: &str, month: MonthKey, category: Option<&str>) -> f64 {
        self.cells
            .get(metric)
            .and_then(|cells| cells.get(&(month, category.map(str::to_string))))
            .copied()
            .unwrap_or(0.0)
    }

    /// One value per month of the table, zero where the category had no records.
    pub fn dense_series(&self, metric: &str, category: Option<&str>) -> Vec<(MonthKey, f64)> {
        self.months()
            .into_iter()
            .map(|month| (month, self.value(metric, month, category)))
            .collect()
    }

    /// Per-month totals with categories collapsed.
    pub fn totals(&self, metric: &str) -> BTreeMap<MonthKey, f64> {
        let mut totals = BTreeMap::new();
        if let Some(cells) = self.cells.get(metric) {
            for ((month, _), value) in cells {
                *totals.entry(*month).or_insert(0.0) += value;
            }
        }
        totals
    }

    /// Copy of the table keeping only the buckets of `months`.
    pub fn restricted_to(&self, months: &[MonthKey]) -> Self {
        let cells = self
            .cells
            .iter()
            .map(|(metric, cells)| {
                let kept = cells
                    .iter()
                    .filter(|((month, _), _)| months.contains(month))
                    .map(|(key, value)| (key.clone(), *value))
                    .collect();
                (metric.clone(), kept)
            })
            .collect();

        Self {
            breakdown: self.breakdown.clone(),
            metrics: self.metrics.clone(),
            cells,
        }
    }

    /// Sum over the whole window.
    pub fn grand_total(&self, metric: &str) -> f64 {
        self.cells
            .get(metric)
            .map(|cells| cells.values().sum())
            .unwrap_or(0.0)
    }
}

pub struct Aggregator<'a> {
    dataset: &'a Dataset,
}

impl<'a> Aggregator<'a> {
    pub fn new(dataset: &'a Dataset) -> Self {
        Self { dataset }
    }

    /// Records inside the year window that pass the categorical filter, in dataset order.
    pub fn filtered_records(&self, query: &ResolvedQuery) -> Vec<&'a Record> {
        self.dataset
            .records()
            .iter()
            .filter(|record| query.includes(record))
            .collect()
    }

    /// Buckets the active amount/income pair.
    pub fn aggregate(&self, query: &ResolvedQuery) -> AggregateTable {
        let columns = vec![
            query.metric.amount_column.clone(),
            query.metric.income_column.clone(),
        ];
        self.bucket(query, columns)
    }

    /// Buckets arbitrary metric columns (e.g. a single display variable).
    pub fn aggregate_columns(
        &self,
        query: &ResolvedQuery,
        columns: &[String],
    ) -> Result<AggregateTable> {
        let schema = self.dataset.schema();
        if let Some(unknown) = columns.iter().find(|c| !schema.has_metric(c)) {
            return Err(DashboardError::UnknownMetric(unknown.clone()));
        }
        Ok(self.bucket(query, columns.to_vec()))
    }

    fn bucket(&self, query: &ResolvedQuery, columns: Vec<String>) -> AggregateTable {
        let breakdown = query.breakdown();
        let mut table = AggregateTable::empty(breakdown.clone(), columns);
        let records = self.filtered_records(query);

        for record in &records {
            let category = breakdown
                .dimension()
                .and_then(|d| record.dimension(d))
                .map(str::to_string);
            let key = (record.month(), category);

            for metric in &table.metrics {
                if let Some(cells) = table.cells.get_mut(metric) {
                    *cells.entry(key.clone()).or_insert(0.0) += record.metric(metric);
                }
            }
        }

        debug!(
            "Aggregated {} of {} records into {} buckets ({:?})",
            records.len(),
            self.dataset.len(),
            table
                .cells
                .values()
                .next()
                .map(BTreeMap::len)
                .unwrap_or(0),
            table.breakdown
        );

        table
    }
}

/// Filters and buckets the dataset for the selected metric pair.
pub fn aggregate(dataset: &Dataset, params: &QueryParameters) -> Result<AggregateTable> {
    let query = ResolvedQuery::resolve(params, dataset.schema())?;
    Ok(Aggregator::new(dataset).aggregate(&query))
}

pub fn aggregate_columns(
    dataset: &Dataset,
    params: &QueryParameters,
    columns: &[String],
) -> Result<AggregateTable> {
    let query = ResolvedQuery::resolve(params, dataset.schema())?;
    Aggregator::new(dataset).aggregate_columns(&query, columns)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{DatasetSchema, FilterSpec, MetricSelector};
    use chrono::NaiveDate;

    fn record(year: i32, month: u32, division: &str, function: &str, amount: f64, income: f64) -> Record {
        let mut record = Record::new(NaiveDate::from_ymd_opt(year, month, 1).unwrap())
            .with_dimension("Division", division)
            .with_dimension("Type", "Type A")
            .with_dimension("Item", "Item 1")
            .with_dimension("Function", function);
        for column in DatasetSchema::standard().metric_columns() {
            record = record.with_metric(&column, 1.0);
        }
        record
            .with_metric("Amount_total", amount)
            .with_metric("Income_total", income)
    }

    fn dataset() -> Dataset {
        Dataset::new(
            DatasetSchema::standard(),
            vec![
                record(2022, 12, "North", "Sales", 5.0, 1.0),
                record(2023, 1, "North", "Sales", 100.0, 50.0),
                record(2023, 1, "South", "Support", 40.0, 10.0),
                record(2023, 2, "North", "Support", 150.0, 75.0),
                record(2023, 2, "West", "Sales", 10.0, 2.0),
                record(2024, 1, "South", "Sales", 7.0, 3.0),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_time_window_and_monthly_buckets() {
        let table = aggregate(&dataset(), &QueryParameters::for_years(2023, 2023)).unwrap();

        assert_eq!(table.months().len(), 2);
        let jan = MonthKey::new(2023, 1).unwrap();
        let feb = MonthKey::new(2023, 2).unwrap();
        assert_eq!(table.value("Amount_total", jan, None), 140.0);
        assert_eq!(table.value("Income_total", feb, None), 77.0);
        assert_eq!(table.grand_total("Amount_total"), 300.0);
        assert!(table.categories().is_empty());
    }

    #[test]
    fn test_categorical_filter() {
        let params = QueryParameters::for_years(2022, 2024)
            .with_filter(FilterSpec::new("Division", &["North", "West"]));
        let table = aggregate(&dataset(), &params).unwrap();

        assert_eq!(table.grand_total("Amount_total"), 265.0);
        assert_eq!(table.months().len(), 3);
    }

    #[test]
    fn test_empty_filter_values_apply_no_filter() {
        let params = QueryParameters::for_years(2022, 2024)
            .with_filter(FilterSpec::new("Division", &[]));
        let table = aggregate(&dataset(), &params).unwrap();
        assert_eq!(table.grand_total("Amount_total"), 312.0);
    }

    #[test]
    fn test_stack_breakdown_with_dense_series() {
        let params = QueryParameters::for_years(2023, 2023)
            .with_stack("Division")
            .with_group("Function");
        let table = aggregate(&dataset(), &params).unwrap();

        assert_eq!(table.breakdown(), &BreakdownMode::Stacked("Division".to_string()));
        assert_eq!(table.categories(), vec!["North", "South", "West"]);

        let south = table.dense_series("Amount_total", Some("South"));
        assert_eq!(south.len(), 2);
        assert_eq!(south[0].1, 40.0);
        assert_eq!(south[1].1, 0.0);

        let totals = table.totals("Amount_total");
        assert_eq!(totals.values().copied().collect::<Vec<_>>(), vec![140.0, 160.0]);
    }

    #[test]
    fn test_group_breakdown() {
        let params = QueryParameters::for_years(2023, 2023).with_group("Function");
        let table = aggregate(&dataset(), &params).unwrap();

        let feb = MonthKey::new(2023, 2).unwrap();
        assert_eq!(table.value("Amount_total", feb, Some("Support")), 150.0);
        assert_eq!(table.value("Amount_total", feb, Some("Sales")), 10.0);
    }

    #[test]
    fn test_unknown_breakdown_dimension_is_ignored() {
        let params = QueryParameters::for_years(2023, 2023).with_stack("Region");
        let table = aggregate(&dataset(), &params).unwrap();
        assert_eq!(table.breakdown(), &BreakdownMode::None);
        assert_eq!(table.grand_total("Amount_total"), 300.0);
    }

    #[test]
    fn test_aggregate_is_idempotent() {
        let data = dataset();
        let params = QueryParameters::for_years(2022, 2024)
            .with_group("Division")
            .with_metric(MetricSelector::Type1);

        let first = aggregate(&data, &params).unwrap();
        let second = aggregate(&data, &params).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.metrics(), ["Amount_1", "Income_1"]);
    }

    #[test]
    fn test_restricted_to_months() {
        let table = aggregate(&dataset(), &QueryParameters::for_years(2022, 2024)).unwrap();
        let jan = MonthKey::new(2023, 1).unwrap();
        let restricted = table.restricted_to(&[jan, MonthKey::new(2024, 1).unwrap()]);

        assert_eq!(restricted.months().len(), 2);
        assert_eq!(restricted.grand_total("Amount_total"), 147.0);
        assert_eq!(restricted.value("Amount_total", jan, None), 140.0);
    }

    #[test]
    fn test_aggregate_columns_rejects_unknown_metric() {
        let params = QueryParameters::for_years(2023, 2023);
        let data = dataset();

        let table = aggregate_columns(&data, &params, &["Amount_2".to_string()]).unwrap();
        assert_eq!(table.grand_total("Amount_2"), 4.0);

        let result = aggregate_columns(&data, &params, &["Profit".to_string()]);
        assert!(matches!(result, Err(DashboardError::UnknownMetric(_))));
    }
}
