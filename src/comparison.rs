use crate::schema::MetricSet;
use crate::snapshot::Snapshot;
use crate::utils::{display_label, MonthKey};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Relative change below which two values count as essentially equal.
pub const RELATIVE_STABILITY_THRESHOLD: f64 = 0.01;
/// Absolute threshold used instead when the old value is zero.
pub const ABSOLUTE_STABILITY_THRESHOLD: f64 = 0.01;
/// Ratio deltas below this are reported as stable.
pub const RATIO_STABILITY_THRESHOLD: f64 = 0.01;
/// Percentage reported for any change away from zero.
pub const FROM_ZERO_PERCENT: f64 = 100.0;

const SHARE_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeDirection {
    Increased,
    Decreased,
    Stable,
}

impl ChangeDirection {
    pub fn classify(old: f64, new: f64) -> Self {
        let stable = if old != 0.0 {
            ((new - old) / old).abs() < RELATIVE_STABILITY_THRESHOLD
        } else {
            new.abs() < ABSOLUTE_STABILITY_THRESHOLD
        };

        if stable {
            Self::Stable
        } else if new > old {
            Self::Increased
        } else {
            Self::Decreased
        }
    }

    pub fn verb(&self) -> &'static str {
        match self {
            Self::Increased => "increased",
            Self::Decreased => "decreased",
            Self::Stable => "remained essentially equal",
        }
    }

    pub fn noun(&self) -> Option<&'static str> {
        match self {
            Self::Increased => Some("increase"),
            Self::Decreased => Some("decrease"),
            Self::Stable => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RatioTrend {
    Stable,
    Improved,
    Declined,
}

impl RatioTrend {
    pub fn classify(delta: f64) -> Self {
        if delta.abs() < RATIO_STABILITY_THRESHOLD {
            Self::Stable
        } else if delta > 0.0 {
            Self::Improved
        } else {
            Self::Declined
        }
    }
}

/// Signed percentage change. Growth from zero is reported as ±100 by direction.
pub fn percent_change(old: f64, new: f64) -> f64 {
    if old != 0.0 {
        (new - old) / old * 100.0
    } else if new > 0.0 {
        FROM_ZERO_PERCENT
    } else if new < 0.0 {
        -FROM_ZERO_PERCENT
    } else {
        0.0
    }
}

/// `numerator / denominator`, or zero when the denominator is zero.
pub fn safe_ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator != 0.0 {
        numerator / denominator
    } else {
        0.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricComparison {
    pub column: String,
    pub label: String,
    pub old: f64,
    pub new: f64,
    pub percent_change: f64,
    pub direction: ChangeDirection,
}

impl MetricComparison {
    pub fn new(column: &str, old: f64, new: f64) -> Self {
        Self {
            column: column.to_string(),
            label: display_label(column),
            old,
            new,
            percent_change: percent_change(old, new),
            direction: ChangeDirection::classify(old, new),
        }
    }

    pub fn absolute_change(&self) -> f64 {
        self.new - self.old
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatioComparison {
    /// e.g. "Income/Amount"
    pub label: String,
    pub old: f64,
    pub new: f64,
    pub delta: f64,
    pub trend: RatioTrend,
}

impl RatioComparison {
    /// Ratio of income to amount for both periods.
    pub fn new(amount: &MetricComparison, income: &MetricComparison) -> Self {
        let old = safe_ratio(income.old, amount.old);
        let new = safe_ratio(income.new, amount.new);
        let delta = new - old;

        Self {
            label: format!(
                "{}/{}",
                column_stem(&income.column),
                column_stem(&amount.column)
            ),
            old,
            new,
            delta,
            trend: RatioTrend::classify(delta),
        }
    }
}

fn column_stem(column: &str) -> String {
    display_label(column.split('_').next().unwrap_or(column))
}

/// One category's share of a snapshot total in both periods.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProportionRow {
    pub category: String,
    pub old_amount: f64,
    pub new_amount: f64,
    /// Percent of the older snapshot's total
    pub old_share: f64,
    /// Percent of the newer snapshot's total
    pub new_share: f64,
    /// Percentage points
    pub share_delta: f64,
}

impl ProportionRow {
    pub fn share_direction(&self) -> ChangeDirection {
        if self.share_delta > SHARE_EPSILON {
            ChangeDirection::Increased
        } else if self.share_delta < -SHARE_EPSILON {
            ChangeDirection::Decreased
        } else {
            ChangeDirection::Stable
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProportionBreakdown {
    pub dimension: String,
    pub column: String,
    pub label: String,
    pub rows: Vec<ProportionRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonResult {
    pub older: MonthKey,
    pub newer: MonthKey,
    pub amount: MetricComparison,
    pub income: MetricComparison,
    pub ratio: RatioComparison,
    /// Present when a group dimension was resolved; one breakdown per metric.
    pub group_dimension: Option<String>,
    pub proportions: Vec<ProportionBreakdown>,
}

/// Headline figure for a dashboard value box.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueBox {
    pub title: String,
    pub headline: String,
    pub detail: String,
    pub non_negative: bool,
}

impl ComparisonResult {
    pub fn value_boxes(&self) -> Vec<ValueBox> {
        let metric_box = |metric: &MetricComparison| ValueBox {
            title: format!("{} Change", column_stem(&metric.column)),
            headline: format!("{:+.1}%", metric.percent_change),
            detail: format!("{:.1} → {:.1}", metric.old, metric.new),
            non_negative: metric.percent_change >= 0.0,
        };

        vec![
            metric_box(&self.amount),
            metric_box(&self.income),
            ValueBox {
                title: format!("{} Ratio Change", self.ratio.label),
                headline: format!("{:+.2}", self.ratio.delta),
                detail: format!("{:.2} → {:.2}", self.ratio.old, self.ratio.new),
                non_negative: self.ratio.delta >= 0.0,
            },
        ]
    }
}

pub struct ComparativeAnalyzer<'a> {
    metric: &'a MetricSet,
}

impl<'a> ComparativeAnalyzer<'a> {
    pub fn new(metric: &'a MetricSet) -> Self {
        Self { metric }
    }

    /// Compares two snapshots. The older month is always treated as "old",
    /// whichever order the snapshots are passed in.
    pub fn compare(
        &self,
        first: &Snapshot<'_>,
        second: &Snapshot<'_>,
        group_dimension: Option<&str>,
    ) -> ComparisonResult {
        let (old, new) = if first.month() <= second.month() {
            (first, second)
        } else {
            (second, first)
        };

        info!("Comparing {} against {}", old.month(), new.month());

        let amount_column = &self.metric.amount_column;
        let income_column = &self.metric.income_column;

        let amount = MetricComparison::new(
            amount_column,
            old.total(amount_column),
            new.total(amount_column),
        );
        let income = MetricComparison::new(
            income_column,
            old.total(income_column),
            new.total(income_column),
        );
        let ratio = RatioComparison::new(&amount, &income);

        debug!(
            "Amount {:?} ({:.2}%), income {:?} ({:.2}%), ratio {:?}",
            amount.direction,
            amount.percent_change,
            income.direction,
            income.percent_change,
            ratio.trend
        );

        let proportions = match group_dimension {
            Some(dimension) => self
                .metric
                .columns()
                .iter()
                .map(|column| proportion_breakdown(old, new, column, dimension))
                .collect(),
            None => Vec::new(),
        };

        ComparisonResult {
            older: old.month(),
            newer: new.month(),
            amount,
            income,
            ratio,
            group_dimension: group_dimension.map(str::to_string),
            proportions,
        }
    }
}

pub fn compare(
    first: &Snapshot<'_>,
    second: &Snapshot<'_>,
    metric: &MetricSet,
    group_dimension: Option<&str>,
) -> ComparisonResult {
    ComparativeAnalyzer::new(metric).compare(first, second, group_dimension)
}

/// Per-category absolute values and shares for the union of categories seen in
/// either snapshot, in ordinal label order. Absent categories count as zero.
pub fn compare_breakdown(
    old: &Snapshot<'_>,
    new: &Snapshot<'_>,
    column: &str,
    dimension: &str,
) -> Vec<ProportionRow> {
    let old_totals = old.totals_by(dimension, column);
    let new_totals = new.totals_by(dimension, column);
    let old_sum = old.total(column);
    let new_sum = new.total(column);

    let categories: BTreeSet<&String> = old_totals.keys().chain(new_totals.keys()).collect();

    categories
        .into_iter()
        .map(|category| {
            let old_amount = old_totals.get(category).copied().unwrap_or(0.0);
            let new_amount = new_totals.get(category).copied().unwrap_or(0.0);
            let old_share = safe_ratio(old_amount, old_sum) * 100.0;
            let new_share = safe_ratio(new_amount, new_sum) * 100.0;

            ProportionRow {
                category: category.clone(),
                old_amount,
                new_amount,
                old_share,
                new_share,
                share_delta: new_share - old_share,
            }
        })
        .collect()
}

pub fn proportion_breakdown(
    old: &Snapshot<'_>,
    new: &Snapshot<'_>,
    column: &str,
    dimension: &str,
) -> ProportionBreakdown {
    ProportionBreakdown {
        dimension: dimension.to_string(),
        column: column.to_string(),
        label: display_label(column),
        rows: compare_breakdown(old, new, column, dimension),
    }
}
