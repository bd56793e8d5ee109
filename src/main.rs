//! Weather Forecasting CLI
//!
//! Trains per-target linear models on hourly observations and serves
//! short-term forecasts from the promoted artifacts.

use clap::{Parser, Subcommand};
use nimbus::{Config, Result};

#[derive(Parser)]
#[command(name = "nimbus")]
#[command(about = "Short-term weather forecasting from hourly observations", long_about = None)]
struct Cli {
    /// Config file path
    #[arg(short, long, default_value = "nimbus.toml")]
    config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Train candidate models on the observation table
    Train {
        /// Override number of epochs
        #[arg(long)]
        epochs: Option<usize>,
        /// Override learning rate
        #[arg(long)]
        lr: Option<f64>,
    },
    /// Gate the candidate against thresholds and the deployed model
    Evaluate {
        /// Override minimum R²
        #[arg(long)]
        r2_min: Option<f64>,
        /// Override maximum MAE
        #[arg(long)]
        mae_max: Option<f64>,
    },
    /// Predict from a JSON observation file
    Predict {
        /// Observation file (JSON object of named numeric fields)
        input: String,
        /// Output format
        #[arg(long, default_value = "table")]
        format: OutputFormat,
    },
    /// Model management commands
    Model {
        #[command(subcommand)]
        action: ModelCommands,
    },
    /// Initialize a new project with default config
    Init,
}

#[derive(Subcommand)]
enum ModelCommands {
    /// Show deployed model information
    Info,
}

#[derive(Clone, Debug)]
enum OutputFormat {
    Table,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" => Ok(OutputFormat::Table),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Unknown format: {}. Use table or json.", s)),
        }
    }
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    // Load or create config
    let config = if std::path::Path::new(&cli.config).exists() {
        match Config::load(&cli.config) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Error loading config: {}", e);
                std::process::exit(1);
            }
        }
    } else {
        Config::default()
    };

    // Run command
    let result = match cli.command {
        Commands::Train { epochs, lr } => commands::train(&config, epochs, lr),
        Commands::Evaluate { r2_min, mae_max } => commands::evaluate(&config, r2_min, mae_max),
        Commands::Predict { input, format } => commands::predict(&config, &input, format),
        Commands::Model { action } => match action {
            ModelCommands::Info => commands::model_info(&config),
        },
        Commands::Init => commands::init(&cli.config),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

mod commands {
    use super::*;
    use std::path::Path;

    use nimbus::data::ObservationTable;
    use nimbus::model::registry::CANDIDATE_REGISTRY_FILE;
    use nimbus::predict::Predictor;
    use nimbus::training::evaluate::{self, EvaluationRecord};
    use nimbus::training::metrics::{CANDIDATE_RESULTS_FILE, RESULTS_FILE};
    use nimbus::training::TrainingRun;
    use nimbus::{Observation, Target, WeatherError};

    pub fn init(config_path: &str) -> Result<()> {
        let config = Config::default();
        config.save(config_path)?;
        println!("Created default config at {}", config_path);

        std::fs::create_dir_all("data")?;
        std::fs::create_dir_all("model")?;
        println!("Created data/ and model/ directories");

        println!("\nNext steps:");
        println!("  1. Edit {} to customize settings", config_path);
        println!("  2. Place hourly observations at data/weather_hourly.csv");
        println!("  3. Run 'nimbus train' to fit candidate models");
        println!("  4. Run 'nimbus evaluate' to promote or reject the candidate");
        println!("  5. Run 'nimbus predict observation.json' to forecast");

        Ok(())
    }

    pub fn train(config: &Config, epochs: Option<usize>, lr: Option<f64>) -> Result<()> {
        use burn::backend::{Autodiff, NdArray};
        use nimbus::training::Trainer;

        type TrainBackend = Autodiff<NdArray<f32>>;

        let mut training_config = config.training.clone();
        if let Some(e) = epochs {
            training_config.epochs = e;
        }
        if let Some(lr) = lr {
            training_config.learning_rate = lr;
        }

        println!("Loading observations from {}...", config.data.observations_path);
        let table = ObservationTable::load_csv(&config.data.observations_path)?;
        if table.is_empty() {
            return Err(WeatherError::Config(format!(
                "No observations in {}. Place an hourly CSV there first.",
                config.data.observations_path
            )));
        }
        println!("Loaded {} hourly observations", table.len());

        let device = Default::default();
        let trainer = Trainer::<TrainBackend>::new(&training_config, device);

        println!("\nTraining candidate models...\n");
        let (registry, run) = trainer.train_all(&table)?;

        let model_dir = Path::new(&config.data.model_dir);
        std::fs::create_dir_all(model_dir)?;
        registry.save(&model_dir.join(CANDIDATE_REGISTRY_FILE))?;
        run.save(&model_dir.join(CANDIDATE_RESULTS_FILE))?;

        println!("Candidate results");
        println!("───────────────────────────────");
        for (target, report) in &run.targets {
            println!("  {:<14} {}", format!("{}:", target), report.metrics);
            if let Some(cv) = &report.cv {
                println!(
                    "  {:<14} CV MAE: {:.4} | CV RMSE: {:.4}",
                    "", cv.cv_mae_mean, cv.cv_rmse_mean
                );
            }
        }
        println!("\nRun 'nimbus evaluate' to promote or reject the candidate.");

        Ok(())
    }

    pub fn evaluate(config: &Config, r2_min: Option<f64>, mae_max: Option<f64>) -> Result<()> {
        let model_dir = Path::new(&config.data.model_dir);

        let candidate_path = model_dir.join(CANDIDATE_RESULTS_FILE);
        if !candidate_path.exists() {
            return Err(WeatherError::Config(
                "No candidate to evaluate. Run 'nimbus train' first.".to_string(),
            ));
        }
        let candidate = TrainingRun::load(&candidate_path)?;
        let report = candidate.target(Target::Temperature).ok_or_else(|| {
            WeatherError::Config("Candidate has no temperature model".to_string())
        })?;

        // The gate runs on temperature; the other targets ride along with
        // whatever verdict it gets.
        let deployed = TrainingRun::load(&model_dir.join(RESULTS_FILE)).ok();
        let previous = deployed
            .as_ref()
            .and_then(|run| run.target(Target::Temperature))
            .map(|report| report.metrics);

        let mut thresholds = config.thresholds;
        if let Some(r2) = r2_min {
            thresholds.r2_min = r2;
        }
        if let Some(mae) = mae_max {
            thresholds.mae_max = mae;
        }

        let verdict = evaluate::evaluate(&report.metrics, previous.as_ref(), &thresholds);
        let record = EvaluationRecord::new(&verdict, report.metrics, previous, thresholds);
        record.append(model_dir)?;

        println!("Candidate temperature model");
        println!("───────────────────────────────");
        println!("  Candidate: {}", report.metrics);
        match &previous {
            Some(previous) => println!("  Deployed:  {}", previous),
            None => println!("  Deployed:  none"),
        }

        if !verdict.accepted {
            println!("\nRejected:");
            for reason in &verdict.reasons {
                println!("  - {}", reason);
            }
            println!("\nDeployed artifacts left untouched.");
            std::process::exit(1);
        }

        evaluate::promote(model_dir)?;
        if verdict.caution {
            println!("\nPromoted with caution:");
            for reason in &verdict.reasons {
                println!("  - {}", reason);
            }
        } else {
            println!("\nPromoted.");
        }

        Ok(())
    }

    pub fn predict(config: &Config, input: &str, format: OutputFormat) -> Result<()> {
        let content = std::fs::read_to_string(input)?;
        let observation: Observation = serde_json::from_str(&content)?;

        let predictor = Predictor::load(Path::new(&config.data.model_dir))?;
        let forecast = predictor.predict_all(&observation)?;

        match format {
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(&forecast)?);
            }
            OutputFormat::Table => {
                println!("Forecast ({})", forecast.model_version);
                println!("───────────────────────────────");
                match &forecast.temperature {
                    Some(t) => println!(
                        "  Temperature:   {:.1} °C  [{:.1}, {:.1}]",
                        t.value, t.confidence_interval[0], t.confidence_interval[1]
                    ),
                    None => println!("  Temperature:   no model deployed"),
                }
                match forecast.humidity {
                    Some(h) => println!("  Humidity:      {:.0} %", h),
                    None => println!("  Humidity:      no model deployed"),
                }
                match forecast.precipitation {
                    Some(p) => println!("  Precipitation: {:.2} mm", p),
                    None => println!("  Precipitation: no model deployed"),
                }
            }
        }

        Ok(())
    }

    pub fn model_info(config: &Config) -> Result<()> {
        let model_dir = Path::new(&config.data.model_dir);
        let predictor = Predictor::load(model_dir)?;
        let registry = predictor.registry();

        println!("Model Information");
        println!("───────────────────────────────");
        println!("  Directory:  {}", model_dir.display());
        println!("  Version:    {}", registry.model_version);
        println!("  Trained at: {}", registry.trained_at.format("%Y-%m-%d %H:%M UTC"));

        if registry.is_empty() {
            println!("  Targets:    none deployed");
            return Ok(());
        }

        let results = TrainingRun::load(&model_dir.join(RESULTS_FILE)).ok();
        for target in registry.targets() {
            let model = registry.get(target).unwrap();
            println!("\n  {} ({})", target, target.unit());
            println!("    Features: {}", model.features.join(", "));
            if let Some(report) = results.as_ref().and_then(|run| run.target(target)) {
                println!("    Held-out: {}", report.metrics);
                println!(
                    "    Samples:  {} train / {} test",
                    report.n_samples_train, report.n_samples_test
                );
            }
        }

        Ok(())
    }
}
