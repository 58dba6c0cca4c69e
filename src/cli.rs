use anyhow::{Context as _, Result, bail};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use steerage::config::{AppConfig, Parameters};
use steerage::dataset::Dataset;
use steerage::experiment::run_experiment;
use steerage::export::export_features;
use steerage::ingest::{ints_to_floats, load_csv};
use steerage::logging;
use steerage::pipeline::{Pipeline, PipelineVariant, build_pipeline, validate_pipeline};
use tracing::warn;

#[derive(Parser)]
#[command(
    name = "steerage",
    about = "Preprocessing pipeline and experiment runner for survival prediction"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Ingest, preprocess, train, evaluate and track one or more models
    Run {
        /// Path to the .env file with paths and tracker settings
        #[arg(short, long, env = "STEERAGE_ENV_FILE", default_value = ".env")]
        env: PathBuf,

        /// Model to run, e.g. `logreg`. Defaults to every model in the parameters file.
        #[arg(short, long)]
        model: Option<String>,
    },
    /// Run the preprocessing pipeline over a CSV and export the features
    Features {
        /// Path to the .env file with paths and tracker settings
        #[arg(short, long, env = "STEERAGE_ENV_FILE", default_value = ".env")]
        env: PathBuf,

        /// Raw input CSV
        #[arg(short, long)]
        input: PathBuf,

        /// Output CSV for the transformed features
        #[arg(short, long)]
        output: PathBuf,

        /// Stop after scaling instead of one-hot encoding categoricals
        #[arg(long)]
        minimal: bool,
    },
    /// Build both pipeline variants from a parameters file and report their wiring
    Check {
        /// Parameters file (YAML or JSON)
        #[arg(short, long)]
        params: PathBuf,
    },
}

pub fn run_command(command: Commands) -> Result<()> {
    match command {
        Commands::Run { env, model } => handle_run(&env, model.as_deref()),
        Commands::Features {
            env,
            input,
            output,
            minimal,
        } => handle_features(&env, &input, &output, minimal),
        Commands::Check { params } => handle_check(&params),
    }
}

fn load_settings(env: &Path) -> Result<(AppConfig, Parameters)> {
    let config = AppConfig::load(env)
        .with_context(|| format!("Failed to load configuration from {}", env.display()))?;
    logging::init(&config.app_name, &config.logs_path)?;
    let parameters = Parameters::from_file(&config.parameters_path).with_context(|| {
        format!(
            "Failed to load parameters from {}",
            config.parameters_path.display()
        )
    })?;
    Ok((config, parameters))
}

fn handle_run(env: &Path, model: Option<&str>) -> Result<()> {
    let (config, parameters) = load_settings(env)?;
    let models = match model {
        Some(name) => vec![name.to_owned()],
        None => parameters.model_names(),
    };
    if models.is_empty() {
        bail!("No <model>_hyperparameters blocks found in the parameters file");
    }

    for name in &models {
        let outcome = run_experiment(&config, &parameters, name)?;
        let m = outcome.metrics;
        println!("Model '{name}' (run {}):", outcome.run.run_id);
        println!("  accuracy        train {:>6}%  test {:>6}%", m.train_score, m.test_score);
        println!("  cv accuracy     train {:>6}%  test {:>6}%", m.train_cv_score, m.test_cv_score);
        println!(
            "  avg precision   train {:>6}%  test {:>6}%",
            m.train_average_precision, m.test_average_precision
        );
        println!("  macro recall    train {:>6}%  test {:>6}%", m.train_recall, m.test_recall);
    }
    Ok(())
}

fn handle_features(env: &Path, input: &Path, output: &Path, minimal: bool) -> Result<()> {
    let (_config, parameters) = load_settings(env)?;
    let variant = if minimal {
        PipelineVariant::Minimal
    } else {
        PipelineVariant::Full
    };
    let pipeline = build_pipeline(&parameters.pipeline_parameters, variant)?;

    let keep = [parameters.uid.as_str(), parameters.target.as_str()];
    let mut frame = ints_to_floats(load_csv(input)?, &keep)?;
    if frame.column(&parameters.target).is_ok() {
        warn!("Input has the target column '{}'; dropping it", parameters.target);
        frame = frame.drop(&parameters.target)?;
    }

    let (features, report) = pipeline.fit_transform_with_report(Dataset::new(frame))?;
    let path = export_features(&features, output)?;
    println!("{}", report.summary());
    println!("Features written to {}", path.display());
    Ok(())
}

fn handle_check(params: &Path) -> Result<()> {
    let parameters = Parameters::from_file(params)
        .with_context(|| format!("Failed to load parameters from {}", params.display()))?;
    for variant in [PipelineVariant::Minimal, PipelineVariant::Full] {
        let pipeline = build_pipeline(&parameters.pipeline_parameters, variant)?;
        print_pipeline(&pipeline);
        let report = validate_pipeline(&pipeline, None);
        println!("  wiring: {}\n", if report.is_valid() { "ok" } else { "invalid" });
    }
    Ok(())
}

fn print_pipeline(pipeline: &Pipeline) {
    println!("{} ({} steps)", pipeline.name, pipeline.steps.len());
    for (i, step) in pipeline.steps.iter().enumerate() {
        println!("  {:>2}. {:<22} {}", i + 1, step.name(), step.description());
    }
    println!("  required inputs: {}", pipeline.required_inputs.join(", "));
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory as _;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_features_command() {
        let cli = Cli::parse_from([
            "steerage", "features", "--input", "raw.csv", "--output", "out.csv", "--minimal",
        ]);
        match cli.command {
            Commands::Features {
                env,
                input,
                minimal,
                ..
            } => {
                assert_eq!(env, PathBuf::from(".env"));
                assert_eq!(input, PathBuf::from("raw.csv"));
                assert!(minimal);
            }
            _ => panic!("expected the features command"),
        }
    }
}
