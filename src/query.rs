//! Validation layer between raw dashboard controls and the engines.
//!
//! Dimension names that the schema does not declare do not fail the query:
//! they resolve to [`DimensionResolution::Unknown`] and behave exactly like
//! `"none"`. The branch is explicit so callers can surface it.

use crate::dataset::Record;
use crate::error::{DashboardError, Result};
use crate::schema::{DatasetSchema, DimensionChoice, FilterSpec, MetricSelector, MetricSet, QueryParameters};
use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DimensionResolution {
    /// The control was set to "none".
    Unset,
    /// A dimension declared by the schema.
    Known(String),
    /// A name the schema does not declare; treated as "none".
    Unknown(String),
}

impl DimensionResolution {
    pub fn resolve(choice: &DimensionChoice, schema: &DatasetSchema) -> Self {
        match choice.as_named() {
            None => Self::Unset,
            Some(name) if schema.has_dimension(name) => Self::Known(name.to_string()),
            Some(name) => {
                warn!(
                    "Dimension '{}' is not part of the dataset schema; treating it as 'none'",
                    name
                );
                Self::Unknown(name.to_string())
            }
        }
    }

    pub fn active(&self) -> Option<&str> {
        match self {
            Self::Known(name) => Some(name),
            Self::Unset | Self::Unknown(_) => None,
        }
    }

    pub fn ignored(&self) -> Option<&str> {
        match self {
            Self::Unknown(name) => Some(name),
            Self::Unset | Self::Known(_) => None,
        }
    }
}

/// A categorical filter checked against a schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveFilter {
    pub dimension: DimensionResolution,
    pub values: BTreeSet<String>,
}

impl ActiveFilter {
    pub fn resolve(spec: &FilterSpec, schema: &DatasetSchema) -> Self {
        Self {
            dimension: DimensionResolution::resolve(&spec.dimension, schema),
            values: spec.values.iter().cloned().collect(),
        }
    }

    pub fn pass_through() -> Self {
        Self {
            dimension: DimensionResolution::Unset,
            values: BTreeSet::new(),
        }
    }

    /// An empty value list applies no filtering.
    pub fn is_active(&self) -> bool {
        self.dimension.active().is_some() && !self.values.is_empty()
    }

    pub fn matches(&self, record: &Record) -> bool {
        match self.dimension.active() {
            Some(dimension) if !self.values.is_empty() => record
                .dimension(dimension)
                .map(|value| self.values.contains(value))
                .unwrap_or(false),
            _ => true,
        }
    }
}

/// How the categories of each monthly bucket are broken down.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BreakdownMode {
    None,
    Stacked(String),
    Grouped(String),
}

impl BreakdownMode {
    pub fn dimension(&self) -> Option<&str> {
        match self {
            Self::None => None,
            Self::Stacked(d) | Self::Grouped(d) => Some(d),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedQuery {
    pub start_year: i32,
    pub end_year: i32,
    pub filter: ActiveFilter,
    pub stack: DimensionResolution,
    pub group: DimensionResolution,
    pub metric: MetricSet,
}

impl ResolvedQuery {
    pub fn resolve(params: &QueryParameters, schema: &DatasetSchema) -> Result<Self> {
        if params.start_year > params.end_year {
            return Err(DashboardError::InvalidYearRange {
                start: params.start_year,
                end: params.end_year,
            });
        }

        let metric = resolve_metric(params.metric, schema)?;

        Ok(Self {
            start_year: params.start_year,
            end_year: params.end_year,
            filter: ActiveFilter::resolve(&params.filter, schema),
            stack: DimensionResolution::resolve(&params.stack_by, schema),
            group: DimensionResolution::resolve(&params.group_by, schema),
            metric,
        })
    }

    /// Stacking wins over grouping when both are set.
    pub fn breakdown(&self) -> BreakdownMode {
        if let Some(stack) = self.stack.active() {
            BreakdownMode::Stacked(stack.to_string())
        } else if let Some(group) = self.group.active() {
            BreakdownMode::Grouped(group.to_string())
        } else {
            BreakdownMode::None
        }
    }

    pub fn in_window(&self, record: &Record) -> bool {
        (self.start_year..=self.end_year).contains(&record.year())
    }

    pub fn includes(&self, record: &Record) -> bool {
        self.in_window(record) && self.filter.matches(record)
    }

    /// Names from the controls that were dropped because the schema lacks them.
    pub fn ignored_dimensions(&self) -> Vec<&str> {
        [&self.filter.dimension, &self.stack, &self.group]
            .into_iter()
            .filter_map(DimensionResolution::ignored)
            .collect()
    }
}

/// Resolves a selector to its column pair, falling back to Total when the
/// schema does not map the requested selector.
pub fn resolve_metric(selector: MetricSelector, schema: &DatasetSchema) -> Result<MetricSet> {
    if let Some(set) = schema.metric_set(selector) {
        return Ok(set.clone());
    }

    warn!(
        "Metric selector {:?} is not mapped by the schema; falling back to Total",
        selector
    );

    schema
        .metric_set(MetricSelector::Total)
        .cloned()
        .ok_or_else(|| {
            DashboardError::SchemaError("Schema does not map the Total metric selector".to_string())
        })
}
