//! Templated analysis text for the comparison, history and tool views.
//!
//! Every function here is a deterministic rendering of already computed
//! figures. The bracketed prompts in the summary footer are scaffolding for the
//! analyst to overwrite and are emitted verbatim.

use crate::comparison::{
    ChangeDirection, ComparisonResult, MetricComparison, ProportionBreakdown, ProportionRow,
    RatioComparison, RatioTrend,
};
use crate::correction::CorrectionReport;
use crate::engine::AggregateTable;
use crate::schema::{AmountFormat, FilterSpec, NarrativeOptions, QueryParameters};
use crate::utils::{display_label, format_magnitude, MonthKey};
use std::fmt::Write;

const RULE_WIDTH: usize = 30;

const SUMMARY_PROMPTS: [&str; 3] = [
    "• [Add your key insights here]",
    "• [Note any significant patterns]",
    "• [Record actionable findings]",
];

pub fn insufficient_selection_text() -> &'static str {
    "Comparison Analysis:\n\n\
     • Select exactly 2 dates to compare data\n\
     • Use filters and grouping to focus analysis\n\
     • Monitor value changes and ratios\n\
     • Identify significant trends between periods\n\n\
     Key Observations:\n\
     • [Record changes in Amount and Income]\n\
     • [Note ratio changes and their implications]\n\
     • [Highlight significant variations]\n\
     • [Document insights for decision making]"
}

pub fn history_placeholder_text() -> &'static str {
    "Chart Analysis:\n\n\
     • Use the controls on the left to modify the visualization\n\
     • Switch between metric selections for different column pairs\n\
     • Apply filters to focus on specific data subsets\n\
     • Use stacking to show composition\n\
     • Group data for comparative analysis\n\n\
     Key Insights:\n\
     • [Add your observations here]\n\
     • [Identify trends and patterns]\n\
     • [Note any anomalies or interesting findings]"
}

pub fn render_comparison_narrative(result: &ComparisonResult, params: &QueryParameters) -> String {
    render_comparison_narrative_with(result, params, &NarrativeOptions::default())
}

pub fn render_comparison_narrative_with(
    result: &ComparisonResult,
    params: &QueryParameters,
    options: &NarrativeOptions,
) -> String {
    let mut text = String::new();

    if let Some(preamble) = filter_preamble(&params.filter) {
        text.push_str(&preamble);
    }

    push_heading(&mut text, "COMPARISON ANALYSIS:");
    for metric in [&result.amount, &result.income] {
        text.push_str(&change_sentence(metric, result.older, result.newer));
        text.push_str("\n\n");
    }

    text.push_str(&ratio_sentence(&result.ratio));
    text.push_str("\n\n");

    if !result.proportions.is_empty() {
        push_heading(&mut text, "PROPORTION ANALYSIS BY GROUPS:");
        for breakdown in &result.proportions {
            push_breakdown(&mut text, breakdown, options);
        }
    }

    push_summary(&mut text);
    text
}

/// `<Metric> amount was <old> in <p1> and <verb> <to|at> <new> in <p2>[, ...]`
pub fn change_sentence(metric: &MetricComparison, older: MonthKey, newer: MonthKey) -> String {
    match metric.direction.noun() {
        None => format!(
            "{} amount was {:.1} in {} and {} at {:.1} in {}.",
            metric.label,
            metric.old,
            older,
            metric.direction.verb(),
            metric.new,
            newer
        ),
        Some(noun) => format!(
            "{} amount was {:.1} in {} and {} to {:.1} in {}, which corresponds to a relative {} of {:.1}%.",
            metric.label,
            metric.old,
            older,
            metric.direction.verb(),
            metric.new,
            newer,
            noun,
            metric.percent_change.abs()
        ),
    }
}

pub fn ratio_sentence(ratio: &RatioComparison) -> String {
    match ratio.trend {
        RatioTrend::Stable => format!(
            "The {} ratio remained stable at approximately {:.2} (from {:.2} to {:.2}, a change of {:.2}).",
            ratio.label,
            ratio.old,
            ratio.old,
            ratio.new,
            ratio.delta.abs()
        ),
        RatioTrend::Improved => format!(
            "The {} ratio improved from {:.2} to {:.2}, representing an increase of {:.2}.",
            ratio.label,
            ratio.old,
            ratio.new,
            ratio.delta.abs()
        ),
        RatioTrend::Declined => format!(
            "The {} ratio declined from {:.2} to {:.2}, representing a decrease of {:.2}.",
            ratio.label,
            ratio.old,
            ratio.new,
            ratio.delta.abs()
        ),
    }
}

pub fn proportion_line(row: &ProportionRow, format: AmountFormat) -> String {
    let verb = match row.share_direction() {
        ChangeDirection::Increased => "increased",
        ChangeDirection::Decreased => "decreased",
        ChangeDirection::Stable => "remained stable",
    };

    format!(
        "• {}: {:.1}% → {:.1}% ({} by {:.1}pp), amounts: {} → {}",
        row.category,
        row.old_share,
        row.new_share,
        verb,
        row.share_delta.abs(),
        format_amount(row.old_amount, format),
        format_amount(row.new_amount, format)
    )
}

/// Window summary for the history view: first vs last month per metric.
pub fn render_history_narrative(table: &AggregateTable, params: &QueryParameters) -> String {
    let mut text = String::new();

    if let Some(preamble) = filter_preamble(&params.filter) {
        text.push_str(&preamble);
    }

    push_heading(&mut text, "HISTORY ANALYSIS:");

    let months = table.months();
    let (first, last) = match (months.first(), months.last()) {
        (Some(first), Some(last)) => (*first, *last),
        _ => {
            let _ = write!(
                text,
                "No records match the selected window ({}-{}) and filters.\n\n",
                params.start_year, params.end_year
            );
            push_summary(&mut text);
            return text;
        }
    };

    let _ = write!(
        text,
        "The window {}-{} covers {} month(s) with data, from {} to {}.\n\n",
        params.start_year,
        params.end_year,
        months.len(),
        first,
        last
    );

    for metric in table.metrics() {
        let totals = table.totals(metric);
        let opening = totals.get(&first).copied().unwrap_or(0.0);
        let closing = totals.get(&last).copied().unwrap_or(0.0);
        let comparison = MetricComparison::new(metric, opening, closing);

        text.push_str(&change_sentence(&comparison, first, last));
        let _ = write!(
            text,
            " The total over the window is {}.",
            format_magnitude(table.grand_total(metric))
        );

        if let Some(dimension) = table.breakdown().dimension() {
            if let Some((category, share)) = largest_contributor(table, metric) {
                let _ = write!(
                    text,
                    " The largest {} contributor is {} with {:.1}% of the total.",
                    dimension, category, share
                );
            }
        }
        text.push_str("\n\n");
    }

    push_summary(&mut text);
    text
}

pub fn render_correction_narrative(report: &CorrectionReport) -> String {
    let mut text = String::new();
    push_heading(&mut text, "CORRECTION ANALYSIS:");

    for summary in [&report.older, &report.newer] {
        let _ = write!(
            text,
            "In {}, reported {} was {:.1} and corrected income was {:.1}",
            summary.month,
            display_label(&report.reported_column),
            summary.reported,
            summary.corrected
        );
        match summary.direction {
            ChangeDirection::Stable => text.push_str(", essentially unchanged by the correction.\n\n"),
            _ => {
                let _ = write!(
                    text,
                    ", an adjustment of {:+.1} ({:+.1}%).\n\n",
                    summary.adjustment, summary.adjustment_percent
                );
            }
        }
    }

    text.push_str(&change_sentence(
        &report.corrected_change,
        report.older.month,
        report.newer.month,
    ));
    text.push_str("\n\n");

    if let Some(breakdown) = &report.breakdown {
        push_heading(&mut text, "PROPORTION ANALYSIS BY GROUPS:");
        push_breakdown(&mut text, breakdown, &NarrativeOptions::default());
    }

    push_summary(&mut text);
    text
}

fn filter_preamble(filter: &FilterSpec) -> Option<String> {
    let dimension = filter.dimension.as_named()?;
    if filter.values.is_empty() {
        return None;
    }
    Some(format!(
        "Analysis filtered by {}: {}.\n\n",
        dimension,
        filter.values.join(", ")
    ))
}

fn push_heading(text: &mut String, title: &str) {
    text.push_str(title);
    text.push('\n');
    text.push_str(&"=".repeat(RULE_WIDTH));
    text.push_str("\n\n");
}

fn push_breakdown(text: &mut String, breakdown: &ProportionBreakdown, options: &NarrativeOptions) {
    let _ = writeln!(text, "{} Proportion Changes:", breakdown.label);
    if breakdown.rows.is_empty() {
        let _ = writeln!(text, "• No {} data in either period", breakdown.dimension);
    }
    for row in &breakdown.rows {
        text.push_str(&proportion_line(row, options.amount_format));
        text.push('\n');
    }
    text.push('\n');
}

fn push_summary(text: &mut String) {
    text.push_str("SUMMARY:\n");
    text.push_str(&"=".repeat(RULE_WIDTH));
    text.push('\n');
    text.push_str(&SUMMARY_PROMPTS.join("\n"));
}

fn format_amount(value: f64, format: AmountFormat) -> String {
    match format {
        AmountFormat::Magnitude => format_magnitude(value),
        AmountFormat::Plain => format!("{:.1}", value),
    }
}

fn largest_contributor(table: &AggregateTable, metric: &str) -> Option<(String, f64)> {
    let total = table.grand_total(metric);
    let cells = table.cells(metric)?;

    let mut by_category: Vec<(String, f64)> = table
        .categories()
        .into_iter()
        .map(|category| {
            let sum: f64 = cells
                .iter()
                .filter(|((_, c), _)| c.as_deref() == Some(category.as_str()))
                .map(|(_, v)| *v)
                .sum();
            (category, sum)
        })
        .collect();

    // Ties resolve to the lexicographically first label.
    by_category.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    by_category
        .into_iter()
        .next()
        .map(|(category, sum)| (category, crate::comparison::safe_ratio(sum, total) * 100.0))
}
