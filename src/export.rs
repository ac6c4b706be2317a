use crate::engine::AggregateTable;
use crate::error::Result;
use crate::utils::MonthKey;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportRow {
    pub month: MonthKey,
    pub category: Option<String>,
    pub values: BTreeMap<String, f64>,
}

/// Row-form view of an aggregate, one row per (month, category) bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportTable {
    pub breakdown_dimension: Option<String>,
    pub metrics: Vec<String>,
    pub rows: Vec<ExportRow>,
}

impl ExportTable {
    pub fn from_aggregate(table: &AggregateTable) -> Self {
        let mut rows: BTreeMap<(MonthKey, Option<String>), BTreeMap<String, f64>> = BTreeMap::new();

        for metric in table.metrics() {
            if let Some(cells) = table.cells(metric) {
                for (key, value) in cells {
                    rows.entry(key.clone())
                        .or_default()
                        .insert(metric.clone(), *value);
                }
            }
        }

        Self {
            breakdown_dimension: table.breakdown().dimension().map(str::to_string),
            metrics: table.metrics().to_vec(),
            rows: rows
                .into_iter()
                .map(|((month, category), values)| ExportRow {
                    month,
                    category,
                    values,
                })
                .collect(),
        }
    }

    pub fn headers(&self) -> Vec<String> {
        let mut headers = vec!["Month".to_string()];
        if let Some(dimension) = &self.breakdown_dimension {
            headers.push(dimension.clone());
        }
        headers.extend(self.metrics.iter().cloned());
        headers
    }

    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut csv_writer = csv::Writer::from_writer(writer);
        csv_writer.write_record(self.headers())?;

        for row in &self.rows {
            let mut record = vec![row.month.to_string()];
            if self.breakdown_dimension.is_some() {
                record.push(row.category.clone().unwrap_or_default());
            }
            for metric in &self.metrics {
                let value = row.values.get(metric).copied().unwrap_or(0.0);
                record.push(format!("{:.2}", value));
            }
            csv_writer.write_record(&record)?;
        }

        csv_writer.flush()?;
        Ok(())
    }

    pub fn to_csv(&self) -> Result<String> {
        let mut buffer = Vec::new();
        self.write_csv(&mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
