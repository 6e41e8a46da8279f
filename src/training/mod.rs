//! Model training and chronological evaluation

pub mod trainer;

pub use trainer::{QuantileModelTrainer, TrainingConfig};
