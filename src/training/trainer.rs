//! Fits the per-target quantile estimators
//!
//! Each target gets three boosters sharing one set of hyperparameters: a
//! low-quantile bound, a squared-error point estimate and a high-quantile
//! bound. The nine fits are independent and run on the rayon pool.

use crate::data::Target;
use crate::error::{Error, Result};
use crate::features::FeatureTable;
use crate::models::{
    Estimator, EvaluationReport, GbmParams, GbmRegressor, ModelMetrics, ModelSet, QuantileLevels,
    QuantileRole,
};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Training configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Fraction of rows (chronologically first) used for fitting during evaluation
    pub split_fraction: f64,
    /// Quantile level of the lower bound estimator
    pub low_quantile: f64,
    /// Quantile level of the upper bound estimator
    pub high_quantile: f64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            split_fraction: 0.8,
            low_quantile: 0.1,
            high_quantile: 0.9,
        }
    }
}

impl TrainingConfig {
    pub fn levels(&self) -> QuantileLevels {
        QuantileLevels {
            low: self.low_quantile,
            high: self.high_quantile,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.split_fraction > 0.0 && self.split_fraction < 1.0) {
            return Err(Error::Config(format!(
                "split_fraction must lie in (0, 1), got {}",
                self.split_fraction
            )));
        }
        self.levels().validate()
    }
}

/// Trains complete model sets from feature tables
#[derive(Debug, Clone, Default)]
pub struct QuantileModelTrainer {
    params: GbmParams,
    config: TrainingConfig,
}

impl QuantileModelTrainer {
    pub fn new(params: GbmParams, config: TrainingConfig) -> Self {
        Self { params, config }
    }

    pub fn params(&self) -> &GbmParams {
        &self.params
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Fit all (target, role) estimators on every row of `table`
    pub fn train(&self, table: &FeatureTable) -> Result<ModelSet> {
        self.params.validate()?;
        self.config.validate()?;
        if table.is_empty() {
            return Err(Error::data("cannot train on an empty feature table"));
        }

        let levels = self.config.levels();
        let x = table.input_matrix()?;
        let targets: Vec<Vec<f64>> = Target::ALL.iter().map(|t| table.targets(*t)).collect();

        info!(
            "Training {} estimators on {} rows x {} features",
            Target::ALL.len() * QuantileRole::ALL.len(),
            x.nrows(),
            x.ncols()
        );

        let jobs: Vec<(Target, QuantileRole)> = Target::ALL
            .iter()
            .flat_map(|&t| QuantileRole::ALL.iter().map(move |&r| (t, r)))
            .collect();

        let fitted: Vec<(Target, QuantileRole, GbmRegressor)> = jobs
            .into_par_iter()
            .map(|(target, role)| -> Result<(Target, QuantileRole, GbmRegressor)> {
                let mut model = GbmRegressor::with_params(self.params.clone(), role.loss(&levels));
                model.fit(&x, &targets[target.index()])?;
                debug!("Fitted {} estimator for {}", role, target);
                Ok((target, role, model))
            })
            .collect::<Result<Vec<_>>>()?;

        let mut set = ModelSet::new(table.schema().clone(), levels);
        for (target, role, model) in fitted {
            set.insert(target, role, model);
        }
        set.ensure_complete()?;

        info!("Model set trained ({} estimators)", set.len());
        Ok(set)
    }

    /// Score the central estimator of every target in `models` against `table`
    pub fn evaluate(&self, models: &ModelSet, table: &FeatureTable) -> Result<EvaluationReport> {
        if table.is_empty() {
            return Err(Error::data("cannot evaluate on an empty feature table"));
        }
        models.ensure_complete()?;
        let x = table.input_matrix()?;

        Target::ALL
            .into_par_iter()
            .map(|target| -> Result<(Target, ModelMetrics)> {
                let predictions = models.get(target, QuantileRole::Central)?.predict(&x)?;
                let metrics = ModelMetrics::regression(&table.targets(target), &predictions)
                    .ok_or_else(|| {
                        Error::Training(format!("no held-out predictions for {}", target))
                    })?;
                Ok((target, metrics))
            })
            .collect()
    }

    /// Fit the model set on the chronological head and score it on the tail
    ///
    /// The returned set is the one the report describes; the tail never
    /// reaches the estimators.
    pub fn train_and_evaluate(&self, table: &FeatureTable) -> Result<(ModelSet, EvaluationReport)> {
        self.config.validate()?;
        if table.is_empty() {
            return Err(Error::data("cannot evaluate on an empty feature table"));
        }

        let split = (table.len() as f64 * self.config.split_fraction).floor() as usize;
        let (head, tail) = table.split_at(split);
        if head.len() < 2 || tail.is_empty() {
            return Err(Error::data(format!(
                "{} feature rows are too few for a {:.0}% evaluation split",
                table.len(),
                self.config.split_fraction * 100.0
            )));
        }

        let set = self.train(&head)?;
        let report = self.evaluate(&set, &tail)?;
        for (target, m) in &report {
            info!(
                "{}: MAE={:.3}, RMSE={:.3}, R2={:.3} ({} train / {} test rows)",
                target,
                m.mae,
                m.rmse,
                m.r2,
                head.len(),
                tail.len()
            );
        }

        Ok((set, report))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Reading;
    use crate::features::FeatureBuilder;
    use chrono::{Duration, TimeZone, Utc};

    fn feature_table(days: usize) -> FeatureTable {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let readings: Vec<Reading> = (0..days)
            .map(|i| {
                let t = i as f64;
                Reading::new(
                    start + Duration::days(i as i64),
                    10.0 + 0.2 * t,
                    70.0 + 5.0 * (t * 0.4).sin(),
                    1015.0 + 3.0 * (t * 0.3).cos(),
                )
            })
            .collect();
        FeatureBuilder::new().build_from_readings(&readings)
    }

    fn fast_trainer() -> QuantileModelTrainer {
        let params = GbmParams {
            n_estimators: 30,
            max_depth: 3,
            ..Default::default()
        };
        QuantileModelTrainer::new(params, TrainingConfig::default())
    }

    #[test]
    fn test_train_produces_complete_set() {
        let table = feature_table(25);
        let set = fast_trainer().train(&table).unwrap();

        assert_eq!(set.len(), 9);
        set.ensure_complete().unwrap();
        assert_eq!(set.schema(), table.schema());
        assert_eq!(set.params().unwrap().n_estimators, 30);
    }

    #[test]
    fn test_training_is_deterministic() {
        let table = feature_table(25);
        let a = fast_trainer().train(&table).unwrap();
        let b = fast_trainer().train(&table).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_evaluate_reports_every_target() {
        let table = feature_table(30);
        let (_, report) = fast_trainer().train_and_evaluate(&table).unwrap();

        assert_eq!(report.len(), 3);
        for m in report.values() {
            assert!(m.mae.is_finite() && m.mae >= 0.0);
            assert!(m.rmse >= m.mae - 1e-12);
        }
    }

    #[test]
    fn test_report_describes_returned_set() {
        let table = feature_table(30);
        let trainer = fast_trainer();
        let (set, report) = trainer.train_and_evaluate(&table).unwrap();

        // 29 rows: the first 23 fit the set, the last 6 score it
        let (head, tail) = table.split_at(23);
        assert_eq!(set, trainer.train(&head).unwrap());

        let x = tail.input_matrix().unwrap();
        for target in Target::ALL {
            let predictions = set
                .get(target, QuantileRole::Central)
                .unwrap()
                .predict(&x)
                .unwrap();
            let expected = ModelMetrics::regression(&tail.targets(target), &predictions).unwrap();
            assert_eq!(report[&target], expected);
        }
        assert_eq!(trainer.evaluate(&set, &tail).unwrap(), report);
    }

    #[test]
    fn test_too_few_rows() {
        let trainer = fast_trainer();
        let empty = feature_table(1);
        assert!(empty.is_empty());
        assert!(trainer.train(&empty).unwrap_err().is_data_error());

        // 2 rows: floor(2 * 0.8) = 1 training row
        let tiny = feature_table(3);
        assert!(trainer.train_and_evaluate(&tiny).unwrap_err().is_data_error());
        assert!(trainer.train_and_evaluate(&empty).unwrap_err().is_data_error());
    }

    #[test]
    fn test_invalid_levels_rejected() {
        let config = TrainingConfig {
            low_quantile: 0.7,
            ..Default::default()
        };
        let trainer = QuantileModelTrainer::new(GbmParams::default(), config);
        assert!(matches!(trainer.train(&feature_table(10)), Err(Error::Config(_))));
    }
}
