use crate::dataset::{Dataset, Record};
use crate::query::ActiveFilter;
use crate::schema::FilterSpec;
use crate::utils::{parse_month_key, MonthKey};
use log::warn;
use std::collections::BTreeMap;

/// The records of a single month that pass the active filter.
#[derive(Debug, Clone)]
pub struct Snapshot<'a> {
    month: MonthKey,
    records: Vec<&'a Record>,
}

impl<'a> Snapshot<'a> {
    pub fn new(month: MonthKey, records: Vec<&'a Record>) -> Self {
        Self { month, records }
    }

    pub fn month(&self) -> MonthKey {
        self.month
    }

    pub fn records(&self) -> &[&'a Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Sum of a metric column; zero for an empty snapshot.
    pub fn total(&self, column: &str) -> f64 {
        self.records.iter().map(|r| r.metric(column)).sum()
    }

    /// Per-category sums of a metric column. Records without the dimension are skipped.
    pub fn totals_by(&self, dimension: &str, column: &str) -> BTreeMap<String, f64> {
        let mut totals = BTreeMap::new();
        for record in &self.records {
            if let Some(category) = record.dimension(dimension) {
                *totals.entry(category.to_string()).or_insert(0.0) += record.metric(column);
            }
        }
        totals
    }
}

/// Records of `month` passing `filter`. Unknown filter dimensions are ignored.
pub fn extract_snapshot<'a>(dataset: &'a Dataset, month: MonthKey, filter: &FilterSpec) -> Snapshot<'a> {
    let filter = ActiveFilter::resolve(filter, dataset.schema());
    extract_with_filter(dataset, month, &filter)
}

pub fn extract_with_filter<'a>(
    dataset: &'a Dataset,
    month: MonthKey,
    filter: &ActiveFilter,
) -> Snapshot<'a> {
    let records = dataset
        .records()
        .iter()
        .filter(|r| r.month() == month && filter.matches(r))
        .collect();
    Snapshot::new(month, records)
}

/// The two months picked in comparison mode, or why they cannot be compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeriodSelection {
    Pair { older: MonthKey, newer: MonthKey },
    Insufficient { selected: usize },
}

impl PeriodSelection {
    /// Exactly two keys, both parseable, are required. They are returned oldest
    /// first regardless of the order they were picked in. Otherwise `selected`
    /// counts the keys that parsed.
    pub fn resolve<S: AsRef<str>>(keys: &[S]) -> Self {
        let mut months: Vec<MonthKey> = keys
            .iter()
            .filter_map(|key| match parse_month_key(key.as_ref()) {
                Ok(month) => Some(month),
                Err(e) => {
                    warn!("Ignoring comparison period selection: {}", e);
                    None
                }
            })
            .collect();

        if keys.len() != 2 || months.len() != 2 {
            return Self::Insufficient {
                selected: months.len(),
            };
        }

        months.sort();
        Self::Pair {
            older: months[0],
            newer: months[1],
        }
    }

    pub fn pair(&self) -> Option<(MonthKey, MonthKey)> {
        match self {
            Self::Pair { older, newer } => Some((*older, *newer)),
            Self::Insufficient { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::DatasetSchema;
    use chrono::NaiveDate;

    fn dataset() -> Dataset {
        let schema = DatasetSchema {
            date_column: "Date".to_string(),
            dimensions: vec!["Division".to_string()],
            metric_sets: vec![crate::schema::MetricSet::new(
                crate::schema::MetricSelector::Total,
                "Amount_total",
                "Income_total",
            )],
            extra_metrics: vec![],
        };
        let row = |month: u32, division: &str, amount: f64| {
            Record::new(NaiveDate::from_ymd_opt(2023, month, 1).unwrap())
                .with_dimension("Division", division)
                .with_metric("Amount_total", amount)
                .with_metric("Income_total", amount / 2.0)
        };
        Dataset::new(
            schema,
            vec![
                row(1, "North", 70.0),
                row(1, "South", 30.0),
                row(2, "North", 40.0),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_extract_snapshot_applies_month_and_filter() {
        let data = dataset();
        let jan = MonthKey::new(2023, 1).unwrap();

        let all = extract_snapshot(&data, jan, &FilterSpec::none());
        assert_eq!(all.len(), 2);
        assert_eq!(all.total("Amount_total"), 100.0);
        assert_eq!(all.totals_by("Division", "Amount_total")["South"], 30.0);

        let south = extract_snapshot(&data, jan, &FilterSpec::new("Division", &["South"]));
        assert_eq!(south.total("Amount_total"), 30.0);
    }

    #[test]
    fn test_empty_snapshot_sums_to_zero() {
        let data = dataset();
        let missing = extract_snapshot(&data, MonthKey::new(2023, 9).unwrap(), &FilterSpec::none());
        assert!(missing.is_empty());
        assert_eq!(missing.total("Amount_total"), 0.0);
        assert!(missing.totals_by("Division", "Amount_total").is_empty());
    }

    #[test]
    fn test_period_selection_orders_chronologically() {
        let selection = PeriodSelection::resolve(&["2023-05", "2023-01"]);
        let (older, newer) = selection.pair().unwrap();
        assert_eq!(older.to_string(), "2023-01");
        assert_eq!(newer.to_string(), "2023-05");
        assert_eq!(selection, PeriodSelection::resolve(&["2023-01", "2023-05"]));
    }

    #[test]
    fn test_period_selection_requires_two_valid_keys() {
        assert_eq!(
            PeriodSelection::resolve::<&str>(&[]),
            PeriodSelection::Insufficient { selected: 0 }
        );
        assert_eq!(
            PeriodSelection::resolve(&["2023-01", "2023-02", "2023-03"]),
            PeriodSelection::Insufficient { selected: 3 }
        );
        assert!(PeriodSelection::resolve(&["2023-01", "not-a-month"]).pair().is_none());
    }

    #[test]
    fn test_period_selection_counts_every_valid_key() {
        assert_eq!(
            PeriodSelection::resolve(&["bogus", "2023-01"]),
            PeriodSelection::Insufficient { selected: 1 }
        );
        assert_eq!(
            PeriodSelection::resolve(&["2023-01", "bogus"]),
            PeriodSelection::Insufficient { selected: 1 }
        );
        assert_eq!(
            PeriodSelection::resolve(&["bogus", "also-bogus"]),
            PeriodSelection::Insufficient { selected: 0 }
        );
    }
}
