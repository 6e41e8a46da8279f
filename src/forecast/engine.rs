//! Autoregressive multi-step forecasting
//!
//! The engine seeds a rollout with the newest feature row and, at every step,
//! predicts all three targets, emits a [`ForecastPoint`] and derives the next
//! input row by replacing each lag column with that step's central
//! prediction. Calendar and rolling columns keep the seed row's values.

use crate::data::{ReadingTable, Target};
use crate::error::{Error, Result};
use crate::features::{FeatureBuilder, FeatureConfig, FeatureRow};
use crate::models::{Estimator, ModelSet, QuantileLevels, QuantilePrediction};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal};
use tracing::{debug, info};

/// Forecast configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastConfig {
    /// Number of steps to roll forward
    pub horizon: usize,
    /// Upper tail level of the emitted interval
    pub alpha: f64,
    /// Spacing between consecutive forecast dates
    pub period_hours: i64,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            horizon: 1,
            alpha: 0.9,
            period_hours: 24,
        }
    }
}

impl ForecastConfig {
    pub fn validate(&self) -> Result<()> {
        if self.horizon == 0 {
            return Err(Error::InvalidHorizon(self.horizon));
        }
        check_alpha(self.alpha)?;
        self.period().map(|_| ())
    }

    /// Spacing between forecast dates; fails when non-positive or too large
    pub fn period(&self) -> Result<Duration> {
        if self.period_hours <= 0 {
            return Err(Error::Config(format!(
                "period_hours must be positive, got {}",
                self.period_hours
            )));
        }
        Duration::try_hours(self.period_hours).ok_or_else(|| {
            Error::Config(format!("period_hours {} is out of range", self.period_hours))
        })
    }
}

fn check_alpha(alpha: f64) -> Result<()> {
    if alpha > 0.5 && alpha < 1.0 {
        Ok(())
    } else {
        Err(Error::InvalidQuantile(alpha))
    }
}

/// Forecast of one target at one step
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TargetForecast {
    pub pred: f64,
    pub low: f64,
    pub high: f64,
}

/// One emitted forecast step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    /// 1-based step index
    pub step: usize,
    pub target_date: DateTime<Utc>,
    /// Per-target forecasts in [`Target::ALL`] order
    pub values: [TargetForecast; 3],
}

impl ForecastPoint {
    pub fn get(&self, target: Target) -> &TargetForecast {
        &self.values[target.index()]
    }
}

/// Maps trained quantile outputs to a requested interval level
///
/// Both bounds sit at the absolute distance of the trained bound from the
/// central prediction, scaled by `z(alpha) / z(q_high)`, so `low <= pred <=
/// high` always holds and the interval grows monotonically with `alpha`. A
/// bound on the wrong side of the central prediction is mirrored across it.
/// At the trained level, bounds already on the correct side pass through
/// untouched.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntervalScale {
    factor: f64,
    identity: bool,
}

impl IntervalScale {
    pub fn new(levels: &QuantileLevels, alpha: f64) -> Result<Self> {
        check_alpha(alpha)?;
        if alpha == levels.high {
            return Ok(Self {
                factor: 1.0,
                identity: true,
            });
        }

        let normal = Normal::new(0.0, 1.0)
            .map_err(|e| Error::Config(format!("standard normal: {}", e)))?;
        let factor = normal.inverse_cdf(alpha) / normal.inverse_cdf(levels.high);

        Ok(Self {
            factor,
            identity: false,
        })
    }

    pub fn is_identity(&self) -> bool {
        self.identity
    }

    pub fn apply(&self, p: QuantilePrediction) -> TargetForecast {
        let below = (p.central - p.low).abs();
        let above = (p.high - p.central).abs();
        if self.identity {
            return TargetForecast {
                pred: p.central,
                low: if p.low <= p.central { p.low } else { p.central - below },
                high: if p.high >= p.central { p.high } else { p.central + above },
            };
        }
        TargetForecast {
            pred: p.central,
            low: p.central - self.factor * below,
            high: p.central + self.factor * above,
        }
    }
}

/// Produces multi-step forecasts from a trained model set
#[derive(Debug, Clone)]
pub struct ForecastEngine {
    features: FeatureBuilder,
    period: Duration,
}

impl Default for ForecastEngine {
    fn default() -> Self {
        Self::new(FeatureBuilder::new(), Duration::days(1))
    }
}

impl ForecastEngine {
    pub fn new(features: FeatureBuilder, period: Duration) -> Self {
        Self { features, period }
    }

    pub fn from_config(features: &FeatureConfig, forecast: &ForecastConfig) -> Result<Self> {
        Ok(Self::new(
            FeatureBuilder::with_config(features.clone()),
            forecast.period()?,
        ))
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Forecast `horizon` steps past the newest reading of `latest`
    pub fn forecast<E: Estimator>(
        &self,
        models: &ModelSet<E>,
        latest: &ReadingTable,
        horizon: usize,
        quantile_alpha: f64,
    ) -> Result<Vec<ForecastPoint>> {
        self.check_request(models, horizon, quantile_alpha)?;

        let schema = self.features.schema();
        if &schema != models.schema() {
            return Err(Error::data(format!(
                "feature schema ({} columns) does not match the model set ({} columns)",
                schema.len(),
                models.schema().len()
            )));
        }

        let table = self.features.build(latest)?;
        let seed = table.last().ok_or_else(|| {
            Error::data("at least two readings are needed to build a forecast seed row")
        })?;

        info!(
            "Forecasting {} step(s) from {} with alpha {}",
            horizon,
            seed.timestamp.format("%Y-%m-%d %H:%M:%S"),
            quantile_alpha
        );
        self.rollout(models, seed, seed.timestamp, horizon, quantile_alpha)
    }

    /// Roll forward from an explicit seed row
    pub fn rollout<E: Estimator>(
        &self,
        models: &ModelSet<E>,
        seed: &FeatureRow,
        last_timestamp: DateTime<Utc>,
        horizon: usize,
        quantile_alpha: f64,
    ) -> Result<Vec<ForecastPoint>> {
        self.check_request(models, horizon, quantile_alpha)?;
        if seed.inputs.len() != models.schema().len() {
            return Err(Error::data(format!(
                "seed row has {} inputs, model set expects {}",
                seed.inputs.len(),
                models.schema().len()
            )));
        }

        let scale = IntervalScale::new(models.levels(), quantile_alpha)?;
        let mut points = Vec::with_capacity(horizon);
        let mut current = seed.clone();

        for step in 1..=horizon {
            let (point, next) = self.step(models, &current, last_timestamp, step, &scale)?;
            points.push(point);
            current = next;
        }

        Ok(points)
    }

    /// Predict one step and derive the input row for the following step
    pub fn step<E: Estimator>(
        &self,
        models: &ModelSet<E>,
        row: &FeatureRow,
        last_timestamp: DateTime<Utc>,
        step: usize,
        scale: &IntervalScale,
    ) -> Result<(ForecastPoint, FeatureRow)> {
        let mut values = [TargetForecast {
            pred: 0.0,
            low: 0.0,
            high: 0.0,
        }; 3];
        let mut lags = [0.0; 3];

        for target in Target::ALL {
            let forecast = scale.apply(models.predict(target, &row.inputs)?);
            values[target.index()] = forecast;
            lags[target.index()] = forecast.pred;
        }

        let target_date = i32::try_from(step)
            .ok()
            .and_then(|n| self.period.checked_mul(n))
            .and_then(|offset| last_timestamp.checked_add_signed(offset))
            .ok_or(Error::InvalidHorizon(step))?;
        debug!(
            "Step {} ({}): temperature={:.2}, humidity={:.2}, pressure={:.2}",
            step,
            target_date.format("%Y-%m-%d"),
            lags[0],
            lags[1],
            lags[2]
        );

        let next = row.with_lags(models.schema(), lags)?;
        Ok((
            ForecastPoint {
                step,
                target_date,
                values,
            },
            next,
        ))
    }

    fn check_request<E: Estimator>(
        &self,
        models: &ModelSet<E>,
        horizon: usize,
        quantile_alpha: f64,
    ) -> Result<()> {
        if horizon == 0 {
            return Err(Error::InvalidHorizon(horizon));
        }
        check_alpha(quantile_alpha)?;
        models.ensure_complete()
    }
}
