use crate::error::{DashboardError, Result};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Literal sentinel the dashboard controls send for "no dimension selected".
pub const NONE_SENTINEL: &str = "none";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "PascalCase")]
pub enum MetricSelector {
    #[schemars(description = "Aggregate columns covering every sub-type (Amount_total / Income_total)")]
    Total,

    #[schemars(description = "First sub-type columns (Amount_1 / Income_1)")]
    Type1,

    #[schemars(description = "Second sub-type columns (Amount_2 / Income_2)")]
    Type2,

    #[schemars(description = "Third sub-type columns (Amount_3 / Income_3)")]
    Type3,
}

impl Default for MetricSelector {
    fn default() -> Self {
        Self::Total
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct MetricSet {
    #[schemars(description = "Selector value the dashboard control sends for this column pair")]
    pub selector: MetricSelector,

    #[schemars(description = "Column holding the amount figure (e.g. 'Amount_total')")]
    pub amount_column: String,

    #[schemars(description = "Column holding the income figure (e.g. 'Income_total')")]
    pub income_column: String,
}

impl MetricSet {
    pub fn new(selector: MetricSelector, amount: &str, income: &str) -> Self {
        Self {
            selector,
            amount_column: amount.to_string(),
            income_column: income.to_string(),
        }
    }

    pub fn columns(&self) -> [&str; 2] {
        [&self.amount_column, &self.income_column]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DatasetSchema {
    #[schemars(description = "Name of the timestamp column, formatted YYYY-MM or YYYY-MM-DD")]
    pub date_column: String,

    #[schemars(
        description = "Categorical columns that can be used for filtering, stacking and grouping (e.g. Division, Type, Item, Function)"
    )]
    pub dimensions: Vec<String>,

    #[schemars(description = "Amount/income column pairs addressable by a metric selector")]
    pub metric_sets: Vec<MetricSet>,

    #[serde(default)]
    #[schemars(
        description = "Additional numeric columns that are not part of a selector pair (e.g. Income_corr in a correction table)"
    )]
    pub extra_metrics: Vec<String>,
}

impl DatasetSchema {
    /// Division/Type/Item/Function dimensions with Total and three sub-type pairs.
    pub fn standard() -> Self {
        Self {
            date_column: "Date".to_string(),
            dimensions: vec![
                "Division".to_string(),
                "Type".to_string(),
                "Item".to_string(),
                "Function".to_string(),
            ],
            metric_sets: vec![
                MetricSet::new(MetricSelector::Total, "Amount_total", "Income_total"),
                MetricSet::new(MetricSelector::Type1, "Amount_1", "Income_1"),
                MetricSet::new(MetricSelector::Type2, "Amount_2", "Income_2"),
                MetricSet::new(MetricSelector::Type3, "Amount_3", "Income_3"),
            ],
            extra_metrics: Vec::new(),
        }
    }

    /// The daily var1..var6 layout: var3/var4 categorical, var1/var2 and var5/var6 numeric pairs.
    pub fn generic() -> Self {
        Self {
            date_column: "date".to_string(),
            dimensions: vec!["var3".to_string(), "var4".to_string()],
            metric_sets: vec![
                MetricSet::new(MetricSelector::Total, "var1", "var2"),
                MetricSet::new(MetricSelector::Type1, "var5", "var6"),
            ],
            extra_metrics: Vec::new(),
        }
    }

    /// Auxiliary correction table keyed by the same date and dimension columns.
    pub fn correction(dimensions: &[String]) -> Self {
        Self {
            date_column: "Date".to_string(),
            dimensions: dimensions.to_vec(),
            metric_sets: Vec::new(),
            extra_metrics: vec![crate::correction::CORRECTION_COLUMN.to_string()],
        }
    }

    pub fn has_dimension(&self, name: &str) -> bool {
        self.dimensions.iter().any(|d| d == name)
    }

    pub fn has_metric(&self, name: &str) -> bool {
        self.metric_columns().iter().any(|m| m == name)
    }

    pub fn metric_set(&self, selector: MetricSelector) -> Option<&MetricSet> {
        self.metric_sets.iter().find(|m| m.selector == selector)
    }

    /// Every numeric column, in declaration order without duplicates.
    pub fn metric_columns(&self) -> Vec<String> {
        let mut seen = BTreeSet::new();
        self.metric_sets
            .iter()
            .flat_map(|set| [set.amount_column.clone(), set.income_column.clone()])
            .chain(self.extra_metrics.iter().cloned())
            .filter(|column| seen.insert(column.clone()))
            .collect()
    }

    pub fn validate(&self) -> Result<()> {
        if self.date_column.trim().is_empty() {
            return Err(DashboardError::SchemaError(
                "Date column name must not be empty".to_string(),
            ));
        }

        let mut dimension_names = BTreeSet::new();
        for dimension in &self.dimensions {
            if dimension.eq_ignore_ascii_case(NONE_SENTINEL) {
                return Err(DashboardError::SchemaError(format!(
                    "Dimension name '{}' collides with the '{}' sentinel",
                    dimension, NONE_SENTINEL
                )));
            }
            if !dimension_names.insert(dimension.as_str()) {
                return Err(DashboardError::SchemaError(format!(
                    "Dimension '{}' is declared twice",
                    dimension
                )));
            }
        }

        let metrics = self.metric_columns();
        if metrics.is_empty() {
            return Err(DashboardError::SchemaError(
                "Schema declares no metric columns".to_string(),
            ));
        }

        if let Some(clash) = metrics.iter().find(|m| dimension_names.contains(m.as_str())) {
            return Err(DashboardError::SchemaError(format!(
                "Column '{}' is declared both as a dimension and as a metric",
                clash
            )));
        }

        let mut selectors = BTreeSet::new();
        for set in &self.metric_sets {
            if !selectors.insert(set.selector) {
                return Err(DashboardError::SchemaError(format!(
                    "Metric selector {:?} is mapped more than once",
                    set.selector
                )));
            }
        }

        Ok(())
    }
}

impl Default for DatasetSchema {
    fn default() -> Self {
        Self::standard()
    }
}

/// A dimension control value: either the literal `"none"` or a dimension name.
///
/// Whether a named dimension actually exists is decided later, against a
/// concrete schema, by [`crate::query::DimensionResolution`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DimensionChoice {
    None,
    Named(String),
}

impl DimensionChoice {
    pub fn named(name: &str) -> Self {
        Self::from(name.to_string())
    }

    pub fn as_named(&self) -> Option<&str> {
        match self {
            Self::None => None,
            Self::Named(name) => Some(name),
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }
}

impl Default for DimensionChoice {
    fn default() -> Self {
        Self::None
    }
}

impl From<String> for DimensionChoice {
    fn from(value: String) -> Self {
        let trimmed = value.trim();
        if trimmed.is_empty() || trimmed == NONE_SENTINEL {
            Self::None
        } else {
            Self::Named(trimmed.to_string())
        }
    }
}

impl From<DimensionChoice> for String {
    fn from(choice: DimensionChoice) -> Self {
        match choice {
            DimensionChoice::None => NONE_SENTINEL.to_string(),
            DimensionChoice::Named(name) => name,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FilterSpec {
    #[serde(default)]
    #[schemars(
        with = "String",
        description = "Dimension to filter on, or 'none'. Unknown names are ignored."
    )]
    pub dimension: DimensionChoice,

    #[serde(default)]
    #[schemars(
        description = "Category labels to keep. An empty list applies no filtering at all."
    )]
    pub values: Vec<String>,
}

impl FilterSpec {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn new(dimension: &str, values: &[&str]) -> Self {
        Self {
            dimension: DimensionChoice::named(dimension),
            values: values.iter().map(|v| v.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct QueryParameters {
    #[schemars(description = "First calendar year of the window (inclusive)")]
    pub start_year: i32,

    #[schemars(description = "Last calendar year of the window (inclusive)")]
    pub end_year: i32,

    #[serde(default)]
    #[schemars(description = "Categorical filter applied before bucketing")]
    pub filter: FilterSpec,

    #[serde(default)]
    #[schemars(
        with = "String",
        description = "Dimension whose categories make up the segments of each monthly bar, or 'none'. Takes precedence over group_by."
    )]
    pub stack_by: DimensionChoice,

    #[serde(default)]
    #[schemars(
        with = "String",
        description = "Dimension whose categories are shown side by side and used for proportion analysis, or 'none'"
    )]
    pub group_by: DimensionChoice,

    #[serde(default)]
    #[schemars(description = "Which amount/income column pair is active")]
    pub metric: MetricSelector,
}

impl QueryParameters {
    pub fn for_years(start_year: i32, end_year: i32) -> Self {
        Self {
            start_year,
            end_year,
            filter: FilterSpec::none(),
            stack_by: DimensionChoice::None,
            group_by: DimensionChoice::None,
            metric: MetricSelector::Total,
        }
    }

    pub fn with_filter(mut self, filter: FilterSpec) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_stack(mut self, dimension: &str) -> Self {
        self.stack_by = DimensionChoice::named(dimension);
        self
    }

    pub fn with_group(mut self, dimension: &str) -> Self {
        self.group_by = DimensionChoice::named(dimension);
        self
    }

    pub fn with_metric(mut self, metric: MetricSelector) -> Self {
        self.metric = metric;
        self
    }

    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(QueryParameters)
    }

    pub fn schema_as_json() -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&Self::generate_json_schema())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "PascalCase")]
pub enum AmountFormat {
    #[schemars(description = "Plain one-decimal figures (e.g. 1234.5)")]
    Plain,

    #[schemars(description = "Magnitude-suffixed figures with two decimals (e.g. 1.23K, 4.50M)")]
    Magnitude,
}

impl Default for AmountFormat {
    fn default() -> Self {
        Self::Magnitude
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct NarrativeOptions {
    #[serde(default)]
    #[schemars(description = "How absolute amounts are printed in per-category lines")]
    pub amount_format: AmountFormat,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct EngineConfig {
    #[serde(default)]
    #[schemars(description = "Column layout of the primary dataset")]
    pub schema: DatasetSchema,

    #[serde(default)]
    #[schemars(
        description = "Dimension used for proportion analysis when group_by is 'none'. Leave empty to respect the literal selection."
    )]
    pub proportion_fallback: Option<String>,

    #[serde(default)]
    pub narrative: NarrativeOptions,
}

impl EngineConfig {
    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(EngineConfig)
    }

    pub fn schema_as_json() -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&Self::generate_json_schema())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_generation() {
        let schema_json = QueryParameters::schema_as_json().unwrap();
        assert!(schema_json.contains("start_year"));
        assert!(schema_json.contains("stack_by"));
        assert!(schema_json.contains("metric"));

        let config_json = EngineConfig::schema_as_json().unwrap();
        assert!(config_json.contains("proportion_fallback"));
    }

    #[test]
    fn test_dimension_choice_sentinel() {
        assert_eq!(DimensionChoice::from("none".to_string()), DimensionChoice::None);
        assert_eq!(DimensionChoice::from("".to_string()), DimensionChoice::None);
        assert_eq!(
            DimensionChoice::named("Division").as_named(),
            Some("Division")
        );
        assert_eq!(String::from(DimensionChoice::None), "none");
    }

    #[test]
    fn test_query_parameters_deserialization() {
        let json = r#"{
            "start_year": 2021,
            "end_year": 2023,
            "filter": { "dimension": "Division", "values": ["North"] },
            "stack_by": "none",
            "group_by": "Function",
            "metric": "Type2"
        }"#;

        let params: QueryParameters = serde_json::from_str(json).unwrap();
        assert_eq!(params.filter.dimension, DimensionChoice::named("Division"));
        assert!(params.stack_by.is_none());
        assert_eq!(params.group_by.as_named(), Some("Function"));
        assert_eq!(params.metric, MetricSelector::Type2);

        let round_trip = serde_json::to_string(&params).unwrap();
        assert!(round_trip.contains("\"stack_by\":\"none\""));
    }

    #[test]
    fn test_standard_schema_is_valid() {
        let schema = DatasetSchema::standard();
        assert!(schema.validate().is_ok());
        assert_eq!(schema.metric_columns().len(), 8);
        assert_eq!(
            schema.metric_set(MetricSelector::Type3).unwrap().columns(),
            ["Amount_3", "Income_3"]
        );
        assert!(DatasetSchema::generic().validate().is_ok());
    }

    #[test]
    fn test_schema_rejects_overlapping_columns() {
        let mut schema = DatasetSchema::standard();
        schema.dimensions.push("Amount_total".to_string());
        assert!(schema.validate().is_err());

        let mut schema = DatasetSchema::standard();
        schema.dimensions.push("none".to_string());
        assert!(schema.validate().is_err());
    }
}
