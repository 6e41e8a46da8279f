//! Persistence of the active model set and its evaluation metrics
//!
//! A registry holds at most one model set. Saving replaces the previous set;
//! loading returns `None` when nothing has been stored yet.

use crate::error::Result;
use crate::models::{EvaluationReport, ModelSet};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// File holding the serialized model set
pub const MODEL_SET_FILE: &str = "model_set.json";

/// File holding the evaluation metrics of the stored set
pub const METRICS_FILE: &str = "metrics.json";

/// Storage for the single active model set
pub trait ModelStore {
    /// Persist `models`, and `metrics` when given
    fn save(&self, models: &ModelSet, metrics: Option<&EvaluationReport>) -> Result<()>;

    /// Stored model set, if any; a loaded set is always complete and well formed
    fn load(&self) -> Result<Option<ModelSet>>;

    /// Metrics recorded with the stored set, if any
    fn load_metrics(&self) -> Result<Option<EvaluationReport>>;
}

/// JSON files in a model directory
#[derive(Debug, Clone)]
pub struct FileModelRegistry {
    dir: PathBuf,
}

impl FileModelRegistry {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn model_path(&self) -> PathBuf {
        self.dir.join(MODEL_SET_FILE)
    }

    pub fn metrics_path(&self) -> PathBuf {
        self.dir.join(METRICS_FILE)
    }

    /// Whether a model set has been saved
    pub fn exists(&self) -> bool {
        self.model_path().is_file()
    }

    fn read_if_present(path: &Path) -> Result<Option<String>> {
        match std::fs::read_to_string(path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

impl Default for FileModelRegistry {
    fn default() -> Self {
        Self::new("models")
    }
}

impl ModelStore for FileModelRegistry {
    fn save(&self, models: &ModelSet, metrics: Option<&EvaluationReport>) -> Result<()> {
        models.ensure_complete()?;
        std::fs::create_dir_all(&self.dir)?;

        let json = serde_json::to_string(models)?;
        std::fs::write(self.model_path(), json)?;
        info!("Saved model set to {}", self.model_path().display());

        match metrics {
            Some(report) => {
                let json = serde_json::to_string_pretty(report)?;
                std::fs::write(self.metrics_path(), json)?;
                debug!("Saved metrics to {}", self.metrics_path().display());
            }
            None => {
                // Metrics of a replaced set no longer apply
                if self.metrics_path().is_file() {
                    std::fs::remove_file(self.metrics_path())?;
                }
            }
        }

        Ok(())
    }

    fn load(&self) -> Result<Option<ModelSet>> {
        let Some(content) = Self::read_if_present(&self.model_path())? else {
            debug!("No stored model set in {}", self.dir.display());
            return Ok(None);
        };

        let models: ModelSet = serde_json::from_str(&content)?;
        models.validate()?;
        info!(
            "Loaded model set ({} estimators) from {}",
            models.len(),
            self.model_path().display()
        );
        Ok(Some(models))
    }

    fn load_metrics(&self) -> Result<Option<EvaluationReport>> {
        Self::read_if_present(&self.metrics_path())?
            .map(|content| serde_json::from_str(&content).map_err(Into::into))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Target;
    use crate::error::Error;
    use crate::features::FeatureSchema;
    use crate::models::{
        Estimator, GbmParams, GbmRegressor, ModelMetrics, QuantileLevels, QuantileRole,
    };
    use ndarray::Array2;
    use tempfile::tempdir;

    fn trained_set() -> ModelSet {
        let schema = FeatureSchema::new(7);
        let levels = QuantileLevels::default();
        let x = Array2::from_shape_fn((12, schema.len()), |(i, j)| (i * (j + 1)) as f64);
        let y: Vec<f64> = (0..12).map(|i| i as f64 * 0.5).collect();
        let params = GbmParams {
            n_estimators: 5,
            max_depth: 2,
            ..Default::default()
        };

        let mut set = ModelSet::new(schema, levels);
        for target in Target::ALL {
            for role in QuantileRole::ALL {
                let mut model = GbmRegressor::with_params(params.clone(), role.loss(&levels));
                model.fit(&x, &y).unwrap();
                set.insert(target, role, model);
            }
        }
        set
    }

    #[test]
    fn test_empty_registry() {
        let dir = tempdir().unwrap();
        let registry = FileModelRegistry::new(dir.path().join("models"));
        assert!(!registry.exists());
        assert!(registry.load().unwrap().is_none());
        assert!(registry.load_metrics().unwrap().is_none());
    }

    #[test]
    fn test_round_trip() {
        let dir = tempdir().unwrap();
        let registry = FileModelRegistry::new(dir.path().join("models"));
        let set = trained_set();
        let mut report = EvaluationReport::new();
        report.insert(
            Target::Temperature,
            ModelMetrics {
                mae: 0.5,
                rmse: 0.7,
                r2: 0.9,
            },
        );

        registry.save(&set, Some(&report)).unwrap();
        assert!(registry.exists());

        let loaded = registry.load().unwrap().unwrap();
        let row = vec![1.0; set.schema().len()];
        for target in Target::ALL {
            assert_eq!(
                loaded.predict(target, &row).unwrap(),
                set.predict(target, &row).unwrap()
            );
        }
        assert_eq!(registry.load_metrics().unwrap(), Some(report));

        // Replacing without metrics drops the stale record
        registry.save(&set, None).unwrap();
        assert!(registry.load_metrics().unwrap().is_none());
    }

    #[test]
    fn test_corrupt_blob_is_error() {
        let dir = tempdir().unwrap();
        let registry = FileModelRegistry::new(dir.path());
        std::fs::write(registry.model_path(), "{not json").unwrap();
        assert!(matches!(registry.load(), Err(Error::Json(_))));
    }

    #[test]
    fn test_incomplete_blob_rejected() {
        let dir = tempdir().unwrap();
        let registry = FileModelRegistry::new(dir.path());

        let mut set = ModelSet::new(FeatureSchema::new(7), QuantileLevels::default());
        let full = trained_set();
        set.insert(
            Target::Temperature,
            QuantileRole::Central,
            full.get(Target::Temperature, QuantileRole::Central).unwrap().clone(),
        );
        assert!(registry.save(&set, None).is_err());

        std::fs::write(registry.model_path(), serde_json::to_string(&set).unwrap()).unwrap();
        assert!(matches!(
            registry.load(),
            Err(Error::ModelSetIncomplete { .. })
        ));
    }

    #[test]
    fn test_malformed_trees_rejected() {
        let dir = tempdir().unwrap();
        let registry = FileModelRegistry::new(dir.path());
        registry.save(&trained_set(), None).unwrap();
        let stored: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(registry.model_path()).unwrap()).unwrap();

        let tamper = |edit: &dyn Fn(&mut serde_json::Value)| {
            let mut blob = stored.clone();
            edit(&mut blob["estimators"]["temperature"]["central"]);
            std::fs::write(registry.model_path(), blob.to_string()).unwrap();
            registry.load()
        };

        let empty = tamper(&|m| m["trees"][0]["nodes"] = serde_json::json!([]));
        assert!(matches!(empty, Err(Error::Data(_))));

        let dangling = tamper(&|m| {
            m["trees"][0]["nodes"] = serde_json::json!([
                {"kind": "split", "feature": 0, "threshold": 1.0, "left": 1, "right": 9},
                {"kind": "leaf", "value": 0.0}
            ])
        });
        assert!(matches!(dangling, Err(Error::Data(_))));

        let wide = tamper(&|m| {
            m["trees"][0]["nodes"] = serde_json::json!([
                {"kind": "split", "feature": 500, "threshold": 1.0, "left": 1, "right": 2},
                {"kind": "leaf", "value": 0.0},
                {"kind": "leaf", "value": 1.0}
            ])
        });
        assert!(matches!(wide, Err(Error::Data(_))));

        let width = tamper(&|m| m["n_features"] = serde_json::json!(3));
        assert!(matches!(width, Err(Error::Data(_))));

        let untouched = tamper(&|_| {});
        assert!(untouched.unwrap().is_some());
    }
}
