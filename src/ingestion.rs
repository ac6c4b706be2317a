use crate::dataset::{Dataset, Record};
use crate::error::{DashboardError, Result};
use crate::schema::DatasetSchema;
use crate::utils::parse_date;
use log::debug;
use std::collections::BTreeMap;
use std::io::Read;

/// One input row as column name -> raw cell text.
pub type RawRow = BTreeMap<String, String>;

/// Builds a dataset from string cells. Blank metric cells count as zero.
pub fn dataset_from_rows(schema: DatasetSchema, rows: &[RawRow]) -> Result<Dataset> {
    let metric_columns = schema.metric_columns();
    let mut records = Vec::with_capacity(rows.len());

    for (index, row) in rows.iter().enumerate() {
        let raw_date = cell(row, &schema.date_column, index)?;
        let mut record = Record::new(parse_date(raw_date)?);

        for dimension in &schema.dimensions {
            let value = cell(row, dimension, index)?;
            record = record.with_dimension(dimension, value.trim());
        }

        for metric in &metric_columns {
            let raw = cell(row, metric, index)?.trim();
            let value = if raw.is_empty() {
                debug!("Row {} has an empty '{}' cell; using 0", index, metric);
                0.0
            } else {
                raw.parse::<f64>()
                    .ok()
                    .filter(|v| v.is_finite())
                    .ok_or_else(|| DashboardError::InvalidValue {
                        row: index,
                        column: metric.clone(),
                        value: raw.to_string(),
                    })?
            };
            record = record.with_metric(metric, value);
        }

        records.push(record);
    }

    Dataset::new(schema, records)
}

/// Reads a headed CSV table. Columns the schema does not declare are ignored.
pub fn dataset_from_csv<R: Read>(schema: DatasetSchema, reader: R) -> Result<Dataset> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::Headers)
        .from_reader(reader);

    let rows = csv_reader
        .deserialize::<RawRow>()
        .collect::<std::result::Result<Vec<_>, _>>()?;

    debug!("Read {} CSV rows", rows.len());
    dataset_from_rows(schema, &rows)
}

fn cell<'a>(row: &'a RawRow, column: &str, index: usize) -> Result<&'a str> {
    row.get(column)
        .map(String::as_str)
        .ok_or_else(|| DashboardError::MissingColumn {
            row: index,
            column: column.to_string(),
        })
}
