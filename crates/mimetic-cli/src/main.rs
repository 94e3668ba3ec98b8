use std::io;
use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod assess;
mod config;
mod console;
mod live;
mod patient;
mod report;
mod setup;
mod speech;
mod terminal;

use config::Config;
use patient::Patient;

#[derive(Parser)]
#[command(name = "mimetic", version, about = "Facial muscle activation assessment")]
struct Cli {
    /// TOML config file; environment variables take precedence over it.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the expression battery from the camera and write reports
    Assess {
        #[command(flatten)]
        patient: PatientArgs,
        #[command(flatten)]
        output: OutputArgs,
        /// Also save every frame's landmarks to this file for later replay
        #[arg(long)]
        record: Option<PathBuf>,
        /// Camera device (overrides MIMETIC_CAMERA_DEVICE)
        #[arg(long)]
        device: Option<String>,
    },
    /// Run the expression battery over a landmark recording
    Replay {
        /// Recording written by `assess --record`
        recording: PathBuf,
        #[command(flatten)]
        patient: PatientArgs,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// List the expressions, muscles and thresholds
    Expressions,
    /// Download the face mesh model and pin its checksum
    Setup {
        /// Model download URL
        #[arg(long)]
        url: String,
        /// Expected SHA-256 of the download
        #[arg(long)]
        sha256: Option<String>,
        /// Target directory (default: system or user data dir)
        #[arg(long)]
        model_dir: Option<PathBuf>,
    },
    /// Check that installed models match their pinned checksums
    VerifyModels {
        #[arg(long)]
        model_dir: Option<PathBuf>,
    },
}

#[derive(Args)]
struct PatientArgs {
    /// Patient name (prompted if omitted)
    #[arg(long)]
    name: Option<String>,
    /// Patient age (prompted if omitted)
    #[arg(long)]
    age: Option<String>,
    /// Patient gender, M/F (prompted if omitted)
    #[arg(long)]
    gender: Option<String>,
}

#[derive(Args)]
struct OutputArgs {
    /// Report directory (overrides OUTPUT_DIR)
    #[arg(long)]
    output_dir: Option<PathBuf>,
    /// Capture window per expression in seconds
    #[arg(long)]
    seconds: Option<u64>,
    /// Do not speak prompts
    #[arg(long)]
    no_speech: bool,
}

impl OutputArgs {
    fn apply(self, config: &mut Config) {
        if let Some(dir) = self.output_dir {
            config.output_dir = dir;
        }
        if let Some(secs) = self.seconds {
            config.expression_secs = secs;
        }
        if self.no_speech {
            config.speech_enabled = false;
        }
    }
}

impl PatientArgs {
    fn collect(self) -> Result<Patient> {
        Patient::collect(
            self.name,
            self.age,
            self.gender,
            &mut io::stdin().lock(),
            &mut io::stdout(),
        )
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(console::log_writer)
        .init();

    let cli = Cli::parse();
    let mut config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Assess {
            patient,
            output,
            record,
            device,
        } => {
            output.apply(&mut config);
            if let Some(device) = device {
                config.camera_device = device;
            }
            mimetic_models::verify_models_dir(&config.model_dir)?;
            let patient = patient.collect()?;
            tracing::info!(patient = %patient.name, "assessment starting");
            let files = assess::run_live(&config, &patient, record.as_deref())?;
            assess::print_summary(&files, &mut io::stdout())?;
        }
        Commands::Replay {
            recording,
            patient,
            output,
        } => {
            output.apply(&mut config);
            let patient = patient.collect()?;
            let files = assess::run_replay(&config, &patient, &recording)?;
            assess::print_summary(&files, &mut io::stdout())?;
        }
        Commands::Expressions => {
            for (i, expr) in mimetic_core::EXPRESSIONS.iter().enumerate() {
                println!(
                    "{:>2}. {:<26} {:<34} threshold {:<6} landmarks {:?}",
                    i + 1,
                    expr.name,
                    expr.muscle,
                    expr.threshold,
                    expr.highlight
                );
            }
        }
        Commands::Setup {
            url,
            sha256,
            model_dir,
        } => setup::run(&url, sha256.as_deref(), model_dir)?,
        Commands::VerifyModels { model_dir } => {
            let dir = model_dir.unwrap_or_else(|| config.model_dir.clone());
            mimetic_models::verify_models_dir(&dir)?;
            for model in mimetic_models::MODELS {
                println!(
                    "{} ok ({}, {}x{} input)",
                    model.name, model.description, model.input_size, model.input_size
                );
            }
        }
    }

    Ok(())
}
