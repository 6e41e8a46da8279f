//! Weather forecast command line tool
//!
//! Usage: weather-forecast --data weather.csv --days 3 --alpha 0.9 [--retrain]

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, warn};
use weather_gbm::data::{ReadingTable, ReadingValidator, Target};
use weather_gbm::features::FeatureBuilder;
use weather_gbm::forecast::{save_forecast, ForecastEngine};
use weather_gbm::models::ModelSet;
use weather_gbm::registry::{FileModelRegistry, ModelStore};
use weather_gbm::training::QuantileModelTrainer;
use weather_gbm::utils::{setup_logging, Config};

#[derive(Parser, Debug)]
#[command(author, version, about = "Quantile gradient boosting weather forecasts")]
struct Args {
    /// CSV file with timestamp, temperature, humidity and pressure columns
    #[arg(long)]
    data: PathBuf,

    /// Number of days to forecast
    #[arg(long)]
    days: Option<usize>,

    /// Upper tail level of the prediction interval
    #[arg(long)]
    alpha: Option<f64>,

    /// Retrain even if a stored model set exists
    #[arg(long)]
    retrain: bool,

    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory for the stored model set and metrics
    #[arg(long)]
    model_dir: Option<PathBuf>,

    /// Where to write the forecast CSV
    #[arg(long, default_value = "forecast.csv")]
    output: PathBuf,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => Config::default(),
    };
    if let Some(days) = args.days {
        config.forecast.horizon = days;
    }
    if let Some(alpha) = args.alpha {
        config.forecast.alpha = alpha;
    }
    if let Some(dir) = &args.model_dir {
        config.registry.model_dir = dir.clone();
    }
    config.validate().context("invalid forecast options")?;

    setup_logging(&config.logging.level);

    let table = ReadingTable::from_csv_path(&args.data)
        .with_context(|| format!("failed to read {}", args.data.display()))?;
    ReadingValidator::new(config.validation.clone())
        .validate(&table)
        .context("input data failed validation")?;

    let builder = FeatureBuilder::with_config(config.features.clone());
    let registry = FileModelRegistry::new(&config.registry.model_dir);

    let stored = if args.retrain {
        None
    } else {
        registry.load().context("failed to load stored model set")?
    };

    let models: ModelSet = match stored {
        Some(models) if models.schema() == &builder.schema() => {
            info!("Using stored model set from {}", registry.dir().display());
            models
        }
        stored => {
            if stored.is_some() {
                warn!("Stored model set was trained on different features, retraining");
            }
            let features = builder.build(&table).context("failed to build features")?;
            let trainer = QuantileModelTrainer::new(config.model.clone(), config.training.clone());
            let (models, report) = trainer
                .train_and_evaluate(&features)
                .context("training failed")?;
            registry
                .save(&models, Some(&report))
                .context("failed to save model set")?;
            models
        }
    };

    let engine = ForecastEngine::from_config(&config.features, &config.forecast)
        .context("invalid forecast options")?;
    let points = engine
        .forecast(&models, &table, config.forecast.horizon, config.forecast.alpha)
        .context("forecast failed")?;

    save_forecast(&points, &args.output)
        .with_context(|| format!("failed to write {}", args.output.display()))?;

    println!("\n=== Forecast ({} day(s), alpha {}) ===\n", points.len(), config.forecast.alpha);
    for point in &points {
        println!("{}", point.target_date.format("%Y-%m-%d"));
        for target in Target::ALL {
            let f = point.get(target);
            println!(
                "  {:<12} {:>8.2}  [{:>8.2}, {:>8.2}]",
                target.column(),
                f.pred,
                f.low,
                f.high
            );
        }
    }

    Ok(())
}
