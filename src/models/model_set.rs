//! Trained estimators keyed by target and quantile role

use super::estimator::Estimator;
use super::gbm::{GbmParams, GbmRegressor, Loss};
use crate::data::Target;
use crate::error::{Error, Result};
use crate::features::FeatureSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Which part of the predictive distribution an estimator targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuantileRole {
    /// Lower interval bound
    Low,
    /// Point prediction
    Central,
    /// Upper interval bound
    High,
}

impl QuantileRole {
    pub const ALL: [QuantileRole; 3] = [QuantileRole::Low, QuantileRole::Central, QuantileRole::High];

    /// Loss an estimator in this role is trained with
    pub fn loss(&self, levels: &QuantileLevels) -> Loss {
        match self {
            QuantileRole::Low => Loss::Quantile { alpha: levels.low },
            QuantileRole::Central => Loss::SquaredError,
            QuantileRole::High => Loss::Quantile { alpha: levels.high },
        }
    }

    /// Suffix of the forecast output column for this role
    pub fn column_suffix(&self) -> &'static str {
        match self {
            QuantileRole::Low => "low",
            QuantileRole::Central => "pred",
            QuantileRole::High => "high",
        }
    }
}

impl fmt::Display for QuantileRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            QuantileRole::Low => "low",
            QuantileRole::Central => "central",
            QuantileRole::High => "high",
        };
        f.write_str(name)
    }
}

/// Quantile levels of the interval estimators
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QuantileLevels {
    pub low: f64,
    pub high: f64,
}

impl Default for QuantileLevels {
    fn default() -> Self {
        Self { low: 0.1, high: 0.9 }
    }
}

impl QuantileLevels {
    pub fn validate(&self) -> Result<()> {
        if !(self.low > 0.0 && self.low < 0.5) {
            return Err(Error::Config(format!(
                "low quantile must lie in (0, 0.5), got {}",
                self.low
            )));
        }
        if !(self.high > 0.5 && self.high < 1.0) {
            return Err(Error::Config(format!(
                "high quantile must lie in (0.5, 1), got {}",
                self.high
            )));
        }
        Ok(())
    }
}

/// Low, central and high prediction for one target
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuantilePrediction {
    pub low: f64,
    pub central: f64,
    pub high: f64,
}

/// Every (target, role) estimator plus the schema they were trained on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSet<E = GbmRegressor> {
    schema: FeatureSchema,
    levels: QuantileLevels,
    estimators: BTreeMap<Target, BTreeMap<QuantileRole, E>>,
}

impl<E: Estimator> ModelSet<E> {
    /// Empty model set for a feature schema
    pub fn new(schema: FeatureSchema, levels: QuantileLevels) -> Self {
        Self {
            schema,
            levels,
            estimators: BTreeMap::new(),
        }
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn levels(&self) -> &QuantileLevels {
        &self.levels
    }

    /// Store an estimator, replacing any previous one for the same key
    pub fn insert(&mut self, target: Target, role: QuantileRole, estimator: E) {
        self.estimators
            .entry(target)
            .or_default()
            .insert(role, estimator);
    }

    pub fn get(&self, target: Target, role: QuantileRole) -> Result<&E> {
        self.estimators
            .get(&target)
            .and_then(|roles| roles.get(&role))
            .ok_or(Error::ModelSetIncomplete { target, role })
    }

    /// Number of stored estimators
    pub fn len(&self) -> usize {
        self.estimators.values().map(|roles| roles.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fails on the first missing (target, role) pair
    pub fn ensure_complete(&self) -> Result<()> {
        for target in Target::ALL {
            for role in QuantileRole::ALL {
                self.get(target, role)?;
            }
        }
        Ok(())
    }

    /// Raw outputs of the three estimators of `target`
    pub fn predict(&self, target: Target, inputs: &[f64]) -> Result<QuantilePrediction> {
        Ok(QuantilePrediction {
            low: self.get(target, QuantileRole::Low)?.predict_one(inputs)?,
            central: self.get(target, QuantileRole::Central)?.predict_one(inputs)?,
            high: self.get(target, QuantileRole::High)?.predict_one(inputs)?,
        })
    }
}

impl ModelSet<GbmRegressor> {
    /// Check a deserialized set: complete, and every booster well formed and
    /// fitted on the set's schema width
    pub fn validate(&self) -> Result<()> {
        self.ensure_complete()?;
        for (target, roles) in &self.estimators {
            for (role, estimator) in roles {
                estimator
                    .validate()
                    .map_err(|e| Error::data(format!("{}/{}: {}", target, role, e)))?;
                if estimator.n_features() != Some(self.schema.len()) {
                    return Err(Error::data(format!(
                        "{}/{}: fitted on {:?} features, schema has {}",
                        target,
                        role,
                        estimator.n_features(),
                        self.schema.len()
                    )));
                }
            }
        }
        Ok(())
    }

    /// Hyperparameters shared by the stored estimators
    pub fn params(&self) -> Option<&GbmParams> {
        self.estimators
            .values()
            .flat_map(|roles| roles.values())
            .next()
            .map(|e| e.params())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    /// Estimator returning a fixed value
    #[derive(Debug, Clone, PartialEq)]
    struct Constant(f64);

    impl Estimator for Constant {
        fn fit(&mut self, _x: &Array2<f64>, _y: &[f64]) -> Result<()> {
            Ok(())
        }

        fn predict_one(&self, _x: &[f64]) -> Result<f64> {
            Ok(self.0)
        }
    }

    fn full_set() -> ModelSet<Constant> {
        let mut set = ModelSet::new(FeatureSchema::new(7), QuantileLevels::default());
        for target in Target::ALL {
            set.insert(target, QuantileRole::Low, Constant(1.0));
            set.insert(target, QuantileRole::Central, Constant(2.0));
            set.insert(target, QuantileRole::High, Constant(3.0));
        }
        set
    }

    #[test]
    fn test_complete_set_predicts() {
        let set = full_set();
        assert_eq!(set.len(), 9);
        set.ensure_complete().unwrap();

        let p = set.predict(Target::Humidity, &[0.0; 19]).unwrap();
        assert_eq!(p, QuantilePrediction { low: 1.0, central: 2.0, high: 3.0 });
    }

    #[test]
    fn test_missing_estimator_reported() {
        let mut set = full_set();
        set.estimators
            .get_mut(&Target::Pressure)
            .unwrap()
            .remove(&QuantileRole::High);

        match set.ensure_complete() {
            Err(Error::ModelSetIncomplete { target, role }) => {
                assert_eq!(target, Target::Pressure);
                assert_eq!(role, QuantileRole::High);
            }
            other => panic!("expected ModelSetIncomplete, got {:?}", other),
        }
        assert!(set.predict(Target::Pressure, &[0.0; 19]).is_err());
        assert!(set.predict(Target::Temperature, &[0.0; 19]).is_ok());
    }

    #[test]
    fn test_role_dispatch() {
        let levels = QuantileLevels { low: 0.05, high: 0.95 };
        assert_eq!(QuantileRole::Low.loss(&levels), Loss::Quantile { alpha: 0.05 });
        assert_eq!(QuantileRole::Central.loss(&levels), Loss::SquaredError);
        assert_eq!(QuantileRole::High.loss(&levels), Loss::Quantile { alpha: 0.95 });
        assert_eq!(QuantileRole::Central.column_suffix(), "pred");
        assert_eq!(QuantileRole::Central.to_string(), "central");
    }

    #[test]
    fn test_levels_validation() {
        assert!(QuantileLevels::default().validate().is_ok());
        assert!(QuantileLevels { low: 0.6, high: 0.9 }.validate().is_err());
        assert!(QuantileLevels { low: 0.1, high: 1.0 }.validate().is_err());
    }
}
