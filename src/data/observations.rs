//! Historical observation table

use chrono::NaiveDateTime;

use crate::features::encoding::{default_for, FeatureEncoder, SIGNIFICANT_WEATHER_CODES};
use crate::{Observation, Result, WeatherError};

const TIMESTAMP_COLUMN: &str = "timestamp";

/// Numeric table of hourly observations, one row per hour, sorted by
/// timestamp ascending.
///
/// Loading runs the same preparation the models were selected on: sort by
/// timestamp where present, impute missing cells with the column mean, clip
/// windspeed/radiation outliers, then derive `wind_x`/`wind_y` and the
/// weather-code indicators (dropping the raw angular and categorical
/// columns).
#[derive(Debug, Clone)]
pub struct ObservationTable {
    columns: Vec<String>,
    rows: Vec<Vec<f64>>,
}

impl ObservationTable {
    /// Build a table from already-prepared columns. Rows are assumed to be
    /// time-ordered.
    pub fn from_columns(columns: Vec<String>, rows: Vec<Vec<f64>>) -> Self {
        ObservationTable { columns, rows }
    }

    /// Load and prepare a CSV of hourly observations.
    pub fn load_csv(path: &str) -> Result<Self> {
        let mut reader = csv::Reader::from_path(path)?;
        let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
        let timestamp_idx = headers.iter().position(|h| h == TIMESTAMP_COLUMN);

        let mut raw: Vec<(Option<NaiveDateTime>, Vec<f64>)> = Vec::new();
        for record in reader.records() {
            let record = record?;
            let timestamp = timestamp_idx
                .and_then(|i| record.get(i))
                .and_then(parse_timestamp);
            let values: Vec<f64> = (0..headers.len())
                .filter(|i| Some(*i) != timestamp_idx)
                .map(|i| {
                    record
                        .get(i)
                        .and_then(|cell| cell.trim().parse::<f64>().ok())
                        .unwrap_or(f64::NAN)
                })
                .collect();
            raw.push((timestamp, values));
        }

        // Best-effort chronological ordering; unparsable timestamps sort
        // first and keep their relative order.
        if timestamp_idx.is_some() {
            raw.sort_by_key(|(timestamp, _)| *timestamp);
        }

        let columns: Vec<String> = headers
            .into_iter()
            .filter(|h| h != TIMESTAMP_COLUMN)
            .collect();
        let rows: Vec<Vec<f64>> = raw.into_iter().map(|(_, values)| values).collect();

        let mut table = ObservationTable { columns, rows };
        table.impute_missing();
        table.clip_outliers("windspeed", 0.01, 0.99);
        table.clip_outliers("radiation", 0.01, 0.99);
        table.expand_derived();

        log::info!(
            "Loaded {} observations with {} columns",
            table.len(),
            table.columns.len()
        );
        Ok(table)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// All values of one column, in row order.
    pub fn column(&self, name: &str) -> Option<Vec<f64>> {
        let index = self.column_index(name)?;
        Some(self.rows.iter().map(|row| row[index]).collect())
    }

    /// Row-major matrix of the named columns, in the given order.
    pub fn select_rows(&self, names: &[String]) -> Result<Vec<Vec<f64>>> {
        let indices: Vec<usize> = names
            .iter()
            .map(|name| {
                self.column_index(name)
                    .ok_or_else(|| WeatherError::MissingColumn(name.clone()))
            })
            .collect::<Result<_>>()?;
        Ok(self
            .rows
            .iter()
            .map(|row| indices.iter().map(|&i| row[i]).collect())
            .collect())
    }

    fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Replace non-finite cells with the column mean.
    fn impute_missing(&mut self) {
        for index in 0..self.columns.len() {
            let finite: Vec<f64> = self
                .rows
                .iter()
                .map(|row| row[index])
                .filter(|v| v.is_finite())
                .collect();
            let missing = self.rows.len() - finite.len();
            if missing == 0 {
                continue;
            }
            let fill = if finite.is_empty() {
                log::warn!("column {} has no numeric values, filling with 0", self.columns[index]);
                0.0
            } else {
                finite.iter().sum::<f64>() / finite.len() as f64
            };
            for row in &mut self.rows {
                if !row[index].is_finite() {
                    row[index] = fill;
                }
            }
            log::debug!(
                "imputed {} missing cells in {} with {:.4}",
                missing,
                self.columns[index],
                fill
            );
        }
    }

    /// Clip a column to its [lower, upper] quantile range.
    fn clip_outliers(&mut self, name: &str, lower: f64, upper: f64) {
        let Some(index) = self.column_index(name) else {
            return;
        };
        let mut sorted: Vec<f64> = self.rows.iter().map(|row| row[index]).collect();
        if sorted.len() < 2 {
            return;
        }
        sorted.sort_by(|a, b| a.total_cmp(b));
        let low = quantile(&sorted, lower);
        let high = quantile(&sorted, upper);
        for row in &mut self.rows {
            row[index] = row[index].clamp(low, high);
        }
        log::debug!("{}: clipped to [{:.2}, {:.2}]", name, low, high);
    }

    /// Derive wind and weather-code feature columns, dropping the raw
    /// `winddirection`/`weathercode` columns. Row-wise through the encoder
    /// so training data and online requests share one encoding path.
    fn expand_derived(&mut self) {
        let has_wind = self.has_column("winddirection");
        let has_code = self.has_column("weathercode");
        if !has_wind && !has_code {
            return;
        }

        let mut columns: Vec<String> = self
            .columns
            .iter()
            .filter(|c| c.as_str() != "winddirection" && c.as_str() != "weathercode")
            .cloned()
            .collect();
        if has_wind {
            columns.push("wind_x".to_string());
            columns.push("wind_y".to_string());
        }
        if has_code {
            for code in SIGNIFICANT_WEATHER_CODES {
                columns.push(format!("w_{}", code));
            }
        }

        let rows: Vec<Vec<f64>> = self
            .rows
            .iter()
            .map(|row| {
                let observation: Observation = self
                    .columns
                    .iter()
                    .cloned()
                    .zip(row.iter().copied())
                    .collect();
                let expanded = FeatureEncoder::expand(&observation);
                columns
                    .iter()
                    .map(|name| expanded.get(name).unwrap_or_else(|| default_for(name)))
                    .collect()
            })
            .collect();

        self.columns = columns;
        self.rows = rows;
    }
}

/// Linear-interpolation quantile of an ascending-sorted slice.
fn quantile(sorted: &[f64], q: f64) -> f64 {
    let position = q * (sorted.len() - 1) as f64;
    let low = position.floor() as usize;
    let high = position.ceil() as usize;
    if low == high {
        sorted[low]
    } else {
        let weight = position - low as f64;
        sorted[low] * (1.0 - weight) + sorted[high] * weight
    }
}

fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M"))
        .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S"))
        .ok()
}
