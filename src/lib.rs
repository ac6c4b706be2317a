//! # Financial Dashboard Engine
//!
//! Analytics behind an interactive financial dashboard: a read-only table of
//! monthly records is filtered, bucketed by month and optionally broken down by
//! a categorical dimension, and any two months can be compared with templated
//! narrative text describing what changed.
//!
//! ## Core Concepts
//!
//! - **Dataset**: Records with a date, categorical dimensions (Division, Type, Item, Function)
//!   and numeric metric columns, loaded once and never mutated
//! - **Query Parameters**: Year window, categorical filter, stacking and grouping dimensions,
//!   and the metric selector choosing an amount/income column pair
//! - **History view**: Monthly aggregates over the window, stacked or grouped by category
//! - **Comparison view**: Two month snapshots compared by totals, ratio and per-category shares
//! - **Tool view**: Reported income checked against an optional table of corrected income
//!
//! ## Example
//!
//! ```rust,ignore
//! use financial_dashboard_engine::*;
//!
//! let dataset = sample_dataset(&SampleConfig::default())?;
//! let dashboard = Dashboard::from_dataset(dataset, EngineConfig::default())?;
//!
//! let params = QueryParameters::for_years(2023, 2024)
//!     .with_filter(FilterSpec::new("Division", &["North", "South"]))
//!     .with_group("Function");
//!
//! let history = dashboard.history(&params)?;
//! println!("{}", history.narrative);
//!
//! if let ComparisonOutcome::Ready(report) = dashboard.compare_periods(&params, &["2023-01", "2024-06"])? {
//!     println!("{}", report.narrative);
//! }
//! ```

pub mod comparison;
pub mod correction;
pub mod dataset;
pub mod engine;
pub mod error;
pub mod export;
pub mod ingestion;
pub mod narrative;
pub mod query;
pub mod sample;
pub mod schema;
pub mod snapshot;
pub mod utils;

pub use comparison::{
    ChangeDirection, ComparativeAnalyzer, ComparisonResult, MetricComparison, ProportionBreakdown,
    ProportionRow, RatioComparison, RatioTrend, ValueBox,
};
pub use correction::{compare_corrections, CorrectionReport, CorrectionSummary, CORRECTION_COLUMN};
pub use dataset::{DataContext, Dataset, Record};
pub use engine::{AggregateKey, AggregateTable, Aggregator};
pub use error::{DashboardError, Result};
pub use export::{ExportRow, ExportTable};
pub use ingestion::*;
pub use narrative::{
    history_placeholder_text, insufficient_selection_text, render_comparison_narrative,
    render_comparison_narrative_with, render_correction_narrative, render_history_narrative,
};
pub use query::{ActiveFilter, BreakdownMode, DimensionResolution, ResolvedQuery};
pub use sample::{sample_correction_dataset, sample_dataset, SampleConfig};
pub use schema::*;
pub use snapshot::{extract_snapshot, PeriodSelection, Snapshot};
pub use utils::*;

use log::{debug, info, warn};
use snapshot::extract_with_filter;

/// Result of a call that needs exactly two comparison periods.
#[derive(Debug, Clone, PartialEq)]
pub enum ComparisonOutcome<T> {
    Ready(T),
    /// Fewer or more than two valid periods were picked; `prompt` is the
    /// placeholder text to show instead of an analysis.
    InsufficientSelection { selected: usize, prompt: String },
}

impl<T> ComparisonOutcome<T> {
    pub fn ready(self) -> Option<T> {
        match self {
            Self::Ready(value) => Some(value),
            Self::InsufficientSelection { .. } => None,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }

    fn insufficient(selected: usize) -> Self {
        Self::InsufficientSelection {
            selected,
            prompt: insufficient_selection_text().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HistoryView {
    pub table: AggregateTable,
    pub narrative: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonReport {
    pub result: ComparisonResult,
    pub value_boxes: Vec<ValueBox>,
    /// Buckets of the two compared months, broken down like the history chart.
    pub chart: AggregateTable,
    pub narrative: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ToolReport {
    pub report: CorrectionReport,
    pub narrative: String,
}

/// Entry point for a presentation layer: every view is recomputed from the
/// injected, read-only data for each set of control values.
#[derive(Debug, Clone)]
pub struct Dashboard {
    context: DataContext,
    config: EngineConfig,
}

impl Dashboard {
    /// Fails when the configured column layout differs from the loaded dataset's.
    pub fn new(context: DataContext, config: EngineConfig) -> Result<Self> {
        let loaded = context.primary().schema();
        if &config.schema != loaded {
            return Err(DashboardError::SchemaError(format!(
                "Configured schema (date '{}', dimensions {:?}) does not match the loaded dataset (date '{}', dimensions {:?})",
                config.schema.date_column,
                config.schema.dimensions,
                loaded.date_column,
                loaded.dimensions
            )));
        }

        if let Some(fallback) = &config.proportion_fallback {
            if !context.primary().schema().has_dimension(fallback) {
                warn!(
                    "Proportion fallback dimension '{}' is not part of the dataset schema and will never apply",
                    fallback
                );
            }
        }

        info!(
            "Dashboard ready over {} records (correction table: {})",
            context.primary().len(),
            context.correction().is_some()
        );

        Ok(Self { context, config })
    }

    pub fn from_dataset(dataset: Dataset, config: EngineConfig) -> Result<Self> {
        Self::new(DataContext::new(dataset)?, config)
    }

    pub fn context(&self) -> &DataContext {
        &self.context
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn year_bounds(&self) -> (i32, i32) {
        self.context.primary().year_bounds()
    }

    /// Months offered by the period picker, oldest first, as `YYYY-MM`.
    pub fn comparison_dates(&self) -> Vec<String> {
        self.context
            .primary()
            .months()
            .into_iter()
            .map(|month| month.to_string())
            .collect()
    }

    /// Category labels selectable for a filter dimension; empty for "none" or unknown names.
    pub fn filter_options(&self, dimension: &DimensionChoice) -> Vec<String> {
        dimension
            .as_named()
            .map(|name| self.context.primary().categories(name))
            .unwrap_or_default()
    }

    pub fn history(&self, params: &QueryParameters) -> Result<HistoryView> {
        let dataset = self.context.primary();
        let query = ResolvedQuery::resolve(params, dataset.schema())?;

        info!(
            "Building history view for {}-{} ({:?})",
            query.start_year,
            query.end_year,
            query.breakdown()
        );

        let table = Aggregator::new(dataset).aggregate(&query);
        let narrative = render_history_narrative(&table, &effective_params(params, &query));

        Ok(HistoryView { table, narrative })
    }

    /// Buckets a single metric column under the same filter and breakdown as the history view.
    pub fn display_variable(&self, params: &QueryParameters, column: &str) -> Result<AggregateTable> {
        let dataset = self.context.primary();
        let query = ResolvedQuery::resolve(params, dataset.schema())?;
        Aggregator::new(dataset).aggregate_columns(&query, &[column.to_string()])
    }

    pub fn compare_periods<S: AsRef<str>>(
        &self,
        params: &QueryParameters,
        keys: &[S],
    ) -> Result<ComparisonOutcome<ComparisonReport>> {
        let dataset = self.context.primary();
        let query = ResolvedQuery::resolve(params, dataset.schema())?;

        let (older, newer) = match PeriodSelection::resolve(keys) {
            PeriodSelection::Pair { older, newer } => (older, newer),
            PeriodSelection::Insufficient { selected } => {
                debug!("Comparison needs two periods, got {}", selected);
                return Ok(ComparisonOutcome::insufficient(selected));
            }
        };

        let old = extract_with_filter(dataset, older, &query.filter);
        let new = extract_with_filter(dataset, newer, &query.filter);
        debug!(
            "Snapshots hold {} ({}) and {} ({}) records",
            old.len(),
            older,
            new.len(),
            newer
        );

        let group = self.proportion_dimension(&query);
        let result = ComparativeAnalyzer::new(&query.metric).compare(&old, &new, group.as_deref());

        let mut window = query.clone();
        window.start_year = older.year();
        window.end_year = newer.year();
        let chart = Aggregator::new(dataset)
            .aggregate(&window)
            .restricted_to(&[older, newer]);

        let narrative = render_comparison_narrative_with(
            &result,
            &effective_params(params, &query),
            &self.config.narrative,
        );

        Ok(ComparisonOutcome::Ready(ComparisonReport {
            value_boxes: result.value_boxes(),
            result,
            chart,
            narrative,
        }))
    }

    /// Reported vs corrected income for the two periods. `None` when no
    /// correction table was loaded.
    pub fn tool_comparison<S: AsRef<str>>(
        &self,
        params: &QueryParameters,
        keys: &[S],
    ) -> Result<Option<ComparisonOutcome<ToolReport>>> {
        let correction = match self.context.correction() {
            Some(correction) => correction,
            None => {
                debug!("Tool comparison requested without a correction table");
                return Ok(None);
            }
        };

        let primary = self.context.primary();
        let query = ResolvedQuery::resolve(params, primary.schema())?;

        let (older, newer) = match PeriodSelection::resolve(keys) {
            PeriodSelection::Pair { older, newer } => (older, newer),
            PeriodSelection::Insufficient { selected } => {
                return Ok(Some(ComparisonOutcome::insufficient(selected)));
            }
        };

        let correction_filter = ActiveFilter::resolve(&params.filter, correction.schema());
        let reported = (
            extract_with_filter(primary, older, &query.filter),
            extract_with_filter(primary, newer, &query.filter),
        );
        let corrected = (
            extract_with_filter(correction, older, &correction_filter),
            extract_with_filter(correction, newer, &correction_filter),
        );

        let group = self.proportion_dimension(&query);
        let report = compare_corrections(
            (&reported.0, &reported.1),
            (&corrected.0, &corrected.1),
            &query.metric.income_column,
            group.as_deref(),
        );

        info!(
            "Tool comparison {} vs {}: corrected income {:?}",
            older, newer, report.corrected_change.direction
        );

        let narrative = render_correction_narrative(&report);
        Ok(Some(ComparisonOutcome::Ready(ToolReport { report, narrative })))
    }

    pub fn export_rows(&self, params: &QueryParameters) -> Result<ExportTable> {
        let dataset = self.context.primary();
        let query = ResolvedQuery::resolve(params, dataset.schema())?;
        let table = Aggregator::new(dataset).aggregate(&query);
        Ok(ExportTable::from_aggregate(&table))
    }

    /// The selected group dimension, else the configured fallback when the schema has it.
    fn proportion_dimension(&self, query: &ResolvedQuery) -> Option<String> {
        if let Some(group) = query.group.active() {
            return Some(group.to_string());
        }

        let fallback = self.config.proportion_fallback.as_deref()?;
        if self.context.primary().schema().has_dimension(fallback) {
            debug!("No group selected; using fallback dimension '{}'", fallback);
            Some(fallback.to_string())
        } else {
            None
        }
    }
}

/// Parameters as they were applied: a filter on an unknown dimension is dropped
/// so the narrative does not claim it.
fn effective_params(params: &QueryParameters, query: &ResolvedQuery) -> QueryParameters {
    let mut effective = params.clone();
    if !query.filter.is_active() {
        effective.filter = FilterSpec::none();
    }
    effective
}
