//! Prediction types and the prediction source contract.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Up,
    Down,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Up => f.write_str("UP"),
            Direction::Down => f.write_str("DOWN"),
        }
    }
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "UP" => Ok(Direction::Up),
            "DOWN" => Ok(Direction::Down),
            other => Err(format!("unknown direction '{other}' (expected UP or DOWN)")),
        }
    }
}

/// One model output for one asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub direction: Direction,
    /// Probability of the predicted direction, in `[0, 1]`.
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub up_probability: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub down_probability: Option<f64>,
}

impl Prediction {
    pub fn new(direction: Direction, confidence: f64) -> Self {
        Self {
            direction,
            confidence,
            up_probability: None,
            down_probability: None,
        }
    }

    pub fn up(confidence: f64) -> Self {
        Self::new(Direction::Up, confidence)
    }

    pub fn down(confidence: f64) -> Self {
        Self::new(Direction::Down, confidence)
    }
}

#[derive(Debug, Error)]
pub enum PredictionError {
    #[error("prediction file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("I/O error reading {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unsupported prediction format '{0}' (expected .csv or .json)")]
    UnsupportedFormat(String),
}

/// Anything that yields the current predictions for all tracked assets.
///
/// Order is preserved: the decision loop walks predictions in the order
/// returned here.
pub trait PredictionSource {
    fn name(&self) -> &str;

    fn predict_all(&self) -> Result<Vec<(String, Prediction)>, PredictionError>;
}

/// A fixed, in-memory prediction set.
#[derive(Debug, Clone, Default)]
pub struct StaticPredictions {
    predictions: Vec<(String, Prediction)>,
}

impl StaticPredictions {
    pub fn new(predictions: Vec<(String, Prediction)>) -> Self {
        Self { predictions }
    }

    pub fn with(mut self, symbol: &str, prediction: Prediction) -> Self {
        self.predictions.push((symbol.to_string(), prediction));
        self
    }
}

impl PredictionSource for StaticPredictions {
    fn name(&self) -> &str {
        "static"
    }

    fn predict_all(&self) -> Result<Vec<(String, Prediction)>, PredictionError> {
        Ok(self.predictions.clone())
    }
}

/// Predictions at or above `min_confidence`, most confident first.
pub fn top_predictions(
    predictions: &[(String, Prediction)],
    min_confidence: f64,
) -> Vec<(String, Prediction)> {
    let mut top: Vec<_> = predictions
        .iter()
        .filter(|(_, p)| p.confidence >= min_confidence)
        .cloned()
        .collect();
    top.sort_by(|a, b| b.1.confidence.total_cmp(&a.1.confidence));
    top
}
