use financial_dashboard_engine::{
    sample_correction_dataset, sample_dataset, ComparisonOutcome, Dashboard, DataContext,
    DimensionChoice, EngineConfig, FilterSpec, QueryParameters, SampleConfig,
};
use std::error::Error;

fn main() -> Result<(), Box<dyn Error>> {
    let primary = sample_dataset(&SampleConfig::default())?;
    let correction = sample_correction_dataset(&primary, 7, 0.05)?;
    let context = DataContext::new(primary)?.with_correction(correction)?;
    let dashboard = Dashboard::new(context, EngineConfig::default())?;

    let (first_year, last_year) = dashboard.year_bounds();
    println!("Sample data covers {}-{}", first_year, last_year);
    println!(
        "Divisions: {:?}",
        dashboard.filter_options(&DimensionChoice::named("Division"))
    );

    let params = QueryParameters::for_years(2023, 2024)
        .with_filter(FilterSpec::new("Division", &["North", "South"]))
        .with_group("Function");

    let history = dashboard.history(&params)?;
    println!("\n{}\n", history.narrative);

    match dashboard.compare_periods(&params, &["2024-06", "2023-06"])? {
        ComparisonOutcome::Ready(report) => {
            for value_box in &report.value_boxes {
                println!(
                    "[{}] {} ({})",
                    value_box.title, value_box.headline, value_box.detail
                );
            }
            println!("\n{}\n", report.narrative);
        }
        ComparisonOutcome::InsufficientSelection { prompt, .. } => println!("{}", prompt),
    }

    if let Some(ComparisonOutcome::Ready(tool)) =
        dashboard.tool_comparison(&params, &["2023-06", "2024-06"])?
    {
        println!("{}\n", tool.narrative);
    }

    let export = dashboard.export_rows(&params)?;
    println!("Export preview:");
    for line in export.to_csv()?.lines().take(6) {
        println!("{}", line);
    }

    Ok(())
}
