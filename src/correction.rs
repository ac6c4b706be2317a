use crate::comparison::{proportion_breakdown, ChangeDirection, MetricComparison, ProportionBreakdown};
use crate::snapshot::Snapshot;
use crate::utils::MonthKey;
use log::debug;
use serde::{Deserialize, Serialize};

/// Corrected income column carried by the auxiliary correction table.
pub const CORRECTION_COLUMN: &str = "Income_corr";

/// Reported vs corrected income for one month.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrectionSummary {
    pub month: MonthKey,
    pub reported: f64,
    pub corrected: f64,
    /// corrected - reported
    pub adjustment: f64,
    pub adjustment_percent: f64,
    pub direction: ChangeDirection,
}

impl CorrectionSummary {
    pub fn new(month: MonthKey, reported: f64, corrected: f64) -> Self {
        let change = MetricComparison::new(CORRECTION_COLUMN, reported, corrected);
        Self {
            month,
            reported,
            corrected,
            adjustment: change.absolute_change(),
            adjustment_percent: change.percent_change,
            direction: change.direction,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrectionReport {
    pub reported_column: String,
    pub older: CorrectionSummary,
    pub newer: CorrectionSummary,
    pub reported_change: MetricComparison,
    pub corrected_change: MetricComparison,
    /// Shares of corrected income per category, when a group dimension is active.
    pub breakdown: Option<ProportionBreakdown>,
}

/// Compares reported income (primary table) with corrected income (correction
/// table) in each month, and the corrected figures across the two months.
pub fn compare_corrections(
    reported: (&Snapshot<'_>, &Snapshot<'_>),
    corrected: (&Snapshot<'_>, &Snapshot<'_>),
    income_column: &str,
    group_dimension: Option<&str>,
) -> CorrectionReport {
    let (reported_old, reported_new, corrected_old, corrected_new) =
        if reported.0.month() <= reported.1.month() {
            (reported.0, reported.1, corrected.0, corrected.1)
        } else {
            (reported.1, reported.0, corrected.1, corrected.0)
        };

    let older = CorrectionSummary::new(
        reported_old.month(),
        reported_old.total(income_column),
        corrected_old.total(CORRECTION_COLUMN),
    );
    let newer = CorrectionSummary::new(
        reported_new.month(),
        reported_new.total(income_column),
        corrected_new.total(CORRECTION_COLUMN),
    );

    debug!(
        "Correction adjustments: {} {:+.2}, {} {:+.2}",
        older.month, older.adjustment, newer.month, newer.adjustment
    );

    CorrectionReport {
        reported_column: income_column.to_string(),
        reported_change: MetricComparison::new(income_column, older.reported, newer.reported),
        corrected_change: MetricComparison::new(CORRECTION_COLUMN, older.corrected, newer.corrected),
        breakdown: group_dimension.map(|dimension| {
            proportion_breakdown(corrected_old, corrected_new, CORRECTION_COLUMN, dimension)
        }),
        older,
        newer,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Record;
    use chrono::NaiveDate;

    fn reported(month: u32, income: f64) -> Record {
        Record::new(NaiveDate::from_ymd_opt(2023, month, 1).unwrap())
            .with_dimension("Division", "North")
            .with_metric("Income_total", income)
    }

    fn corrected(month: u32, division: &str, income: f64) -> Record {
        Record::new(NaiveDate::from_ymd_opt(2023, month, 1).unwrap())
            .with_dimension("Division", division)
            .with_metric(CORRECTION_COLUMN, income)
    }

    fn snapshot(month: u32, records: &[Record]) -> Snapshot<'_> {
        Snapshot::new(MonthKey::new(2023, month).unwrap(), records.iter().collect())
    }

    #[test]
    fn test_correction_summary_per_month() {
        let summary = CorrectionSummary::new(MonthKey::new(2023, 1).unwrap(), 200.0, 180.0);
        assert_eq!(summary.adjustment, -20.0);
        assert!((summary.adjustment_percent + 10.0).abs() < 1e-9);
        assert_eq!(summary.direction, ChangeDirection::Decreased);

        let from_zero = CorrectionSummary::new(MonthKey::new(2023, 1).unwrap(), 0.0, 5.0);
        assert_eq!(from_zero.adjustment_percent, 100.0);
    }

    #[test]
    fn test_compare_corrections_orders_and_breaks_down() {
        let rep_jan = [reported(1, 100.0)];
        let rep_mar = [reported(3, 120.0)];
        let cor_jan = [corrected(1, "North", 60.0), corrected(1, "South", 40.0)];
        let cor_mar = [corrected(3, "North", 90.0), corrected(3, "South", 30.0)];

        let report = compare_corrections(
            (&snapshot(3, &rep_mar), &snapshot(1, &rep_jan)),
            (&snapshot(3, &cor_mar), &snapshot(1, &cor_jan)),
            "Income_total",
            Some("Division"),
        );

        assert_eq!(report.older.month.to_string(), "2023-01");
        assert_eq!(report.older.reported, 100.0);
        assert_eq!(report.older.corrected, 100.0);
        assert_eq!(report.older.direction, ChangeDirection::Stable);
        assert!((report.corrected_change.percent_change - 20.0).abs() < 1e-9);

        let breakdown = report.breakdown.unwrap();
        assert_eq!(breakdown.rows.len(), 2);
        assert!((breakdown.rows[0].new_share - 75.0).abs() < 1e-9);
    }
}
