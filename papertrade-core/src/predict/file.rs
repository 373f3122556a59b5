//! Prediction file reader.
//!
//! Reads the model pipeline's output file. CSV (one row per asset, header
//! `asset,prediction,confidence,up_probability,down_probability,timestamp`)
//! or JSON (an array of the same rows). Format is chosen by extension.

use super::prediction::{Direction, Prediction, PredictionError, PredictionSource};
use serde::Deserialize;
use std::io::Read;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize)]
struct PredictionRow {
    #[serde(alias = "symbol")]
    asset: String,
    #[serde(alias = "direction")]
    prediction: String,
    confidence: f64,
    #[serde(default)]
    up_probability: Option<f64>,
    #[serde(default)]
    down_probability: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Csv,
    Json,
}

#[derive(Debug, Clone)]
pub struct PredictionFile {
    path: PathBuf,
}

impl PredictionFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn format(&self) -> Result<Format, PredictionError> {
        let ext = self
            .path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();
        match ext.as_str() {
            "csv" => Ok(Format::Csv),
            "json" => Ok(Format::Json),
            other => Err(PredictionError::UnsupportedFormat(other.to_string())),
        }
    }

    fn read_rows(&self) -> Result<Vec<PredictionRow>, PredictionError> {
        let format = self.format()?;
        let mut file = match std::fs::File::open(&self.path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(PredictionError::NotFound(self.path.clone()))
            }
            Err(e) => {
                return Err(PredictionError::Io {
                    path: self.path.clone(),
                    source: e,
                })
            }
        };

        match format {
            Format::Csv => parse_csv(file),
            Format::Json => {
                let mut text = String::new();
                file.read_to_string(&mut text)
                    .map_err(|e| PredictionError::Io {
                        path: self.path.clone(),
                        source: e,
                    })?;
                parse_json(&text)
            }
        }
    }
}

fn parse_csv<R: Read>(reader: R) -> Result<Vec<PredictionRow>, PredictionError> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);
    let mut rows = Vec::new();
    for (i, record) in rdr.deserialize().enumerate() {
        match record {
            Ok(row) => rows.push(row),
            Err(e) => log::warn!("skipping malformed prediction row {}: {e}", i + 1),
        }
    }
    Ok(rows)
}

fn parse_json(text: &str) -> Result<Vec<PredictionRow>, PredictionError> {
    let values: Vec<serde_json::Value> = serde_json::from_str(text)?;
    let mut rows = Vec::with_capacity(values.len());
    for (i, value) in values.into_iter().enumerate() {
        match serde_json::from_value(value) {
            Ok(row) => rows.push(row),
            Err(e) => log::warn!("skipping malformed prediction row {}: {e}", i + 1),
        }
    }
    Ok(rows)
}

/// Validate rows, skipping (with a warning) any that are unusable.
fn into_predictions(rows: Vec<PredictionRow>) -> Vec<(String, Prediction)> {
    rows.into_iter()
        .filter_map(|row| {
            let symbol = row.asset.trim().to_ascii_uppercase();
            if symbol.is_empty() {
                log::warn!("skipping prediction row with empty asset");
                return None;
            }
            let direction = match row.prediction.parse::<Direction>() {
                Ok(d) => d,
                Err(e) => {
                    log::warn!("skipping prediction for {symbol}: {e}");
                    return None;
                }
            };
            if !(0.0..=1.0).contains(&row.confidence) {
                log::warn!(
                    "skipping prediction for {symbol}: confidence {} outside [0, 1]",
                    row.confidence
                );
                return None;
            }
            Some((
                symbol,
                Prediction {
                    direction,
                    confidence: row.confidence,
                    up_probability: row.up_probability,
                    down_probability: row.down_probability,
                },
            ))
        })
        .collect()
}

impl PredictionSource for PredictionFile {
    fn name(&self) -> &str {
        "prediction_file"
    }

    fn predict_all(&self) -> Result<Vec<(String, Prediction)>, PredictionError> {
        let rows = self.read_rows()?;
        let total = rows.len();
        let predictions = into_predictions(rows);
        log::debug!(
            "read {}/{} predictions from {}",
            predictions.len(),
            total,
            self.path.display()
        );
        Ok(predictions)
    }
}
