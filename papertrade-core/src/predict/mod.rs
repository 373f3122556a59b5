//! Prediction sources: the model pipeline's output file and a static set.

pub mod file;
pub mod prediction;

pub use file::PredictionFile;
pub use prediction::{
    top_predictions, Direction, Prediction, PredictionError, PredictionSource, StaticPredictions,
};
