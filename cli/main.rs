#![deny(unused_variables)]
#![deny(dead_code)]
#![deny(unused_imports)]
#![deny(clippy::no_effect_underscore_binding)]

use clap::{Args, CommandFactory, Parser, Subcommand};
use std::path::PathBuf;
use std::process;

use confounder::AuditConfig;
use confounder::data::{Study, load_study, validate_study};
use confounder::proposer::{ResponseFileSource, format_generation_prompt, generate_candidates};
use confounder::{AuditReport, run_audit};

#[derive(Args)]
pub struct StudyArgs {
    /// Path to the study dataset (CSV, or TSV with a .tsv extension)
    pub data: PathBuf,

    /// Name of the treatment column
    #[arg(long, short = 't')]
    pub treatment: String,

    /// Name of the outcome column
    #[arg(long, short = 'o')]
    pub outcome: String,

    /// Research question the study tries to answer
    #[arg(long, short = 'q')]
    pub question: String,

    /// Optional text file with background on how the data were collected
    #[arg(long)]
    pub context: Option<PathBuf>,
}

impl StudyArgs {
    fn load(&self) -> Result<Study, Box<dyn std::error::Error>> {
        Ok(load_study(
            &self.data,
            &self.treatment,
            &self.outcome,
            &self.question,
            self.context.as_deref(),
        )?)
    }
}

#[derive(Args)]
pub struct CheckArgs {
    #[command(flatten)]
    pub study: StudyArgs,

    /// Saved generator response (JSON) holding the candidate confounders
    #[arg(long, value_name = "FILE")]
    pub candidates: PathBuf,

    /// TOML file with audit settings; flags below override it
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Significance level for the confounding tests
    #[arg(long)]
    pub alpha: Option<f64>,

    /// Fraction of the adjusted effect above which bias is flagged
    #[arg(long)]
    pub bias_threshold: Option<f64>,

    /// Minimum sample size accepted by the data-quality gate
    #[arg(long)]
    pub min_samples: Option<usize>,

    /// Write the full report as JSON to this path
    #[arg(long, value_name = "FILE")]
    pub report_json: Option<PathBuf>,
}

#[derive(Parser)]
#[command(
    name = "confounder",
    about = "Audit observational studies for hidden confounders",
    long_about = "Validates proposed confounders against a study dataset, quantifies the bias \
                 each one introduces and ranks them with suggested corrections."
)]
struct Cli {
    /// Enable debug logging (otherwise RUST_LOG or info)
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the confounder audit on a dataset
    #[command(about = "Validate, quantify and rank candidate confounders")]
    Check(CheckArgs),

    /// Print the request text for an external candidate generator
    #[command(about = "Print the candidate-generation prompt for a study")]
    Prompt(StudyArgs),
}

fn main() {
    let Cli { verbose, command } = Cli::parse();

    let default_level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    let result = match command {
        Some(Commands::Check(args)) => check(args),
        Some(Commands::Prompt(args)) => prompt(args),
        None => {
            let mut command = Cli::command();
            command
                .print_help()
                .map(|()| println!())
                .map_err(Into::into)
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn resolve_config(args: &CheckArgs) -> Result<AuditConfig, Box<dyn std::error::Error>> {
    let mut config = match &args.config {
        Some(path) => AuditConfig::load(path)?,
        None => AuditConfig::default(),
    };
    if let Some(alpha) = args.alpha {
        config.alpha = alpha;
    }
    if let Some(threshold) = args.bias_threshold {
        config.bias_threshold = threshold;
    }
    if let Some(min_samples) = args.min_samples {
        config.min_samples = min_samples;
    }
    config.validate()?;
    Ok(config)
}

fn check(args: CheckArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = resolve_config(&args)?;
    let study = args.study.load()?;

    let quality = validate_study(&study, config.min_samples);
    for warning in &quality.warnings {
        log::warn!("{warning}");
    }
    if !quality.is_valid() {
        return Err(format!("study failed validation: {}", quality.errors.join("; ")).into());
    }

    let source = ResponseFileSource::new(&args.candidates);
    let candidates = generate_candidates(&source, &study, &config.retry)?;
    if candidates.is_empty() {
        log::warn!("No plausible candidates in '{}'", args.candidates.display());
    }

    let outcome = run_audit(&candidates, &study, &config)?;
    let report = AuditReport::assemble(&study, &outcome)?;
    print!("{}", report.render_text());

    if let Some(path) = &args.report_json {
        report.save_json(path)?;
        log::info!("Report written to '{}'", path.display());
    }
    Ok(())
}

fn prompt(args: StudyArgs) -> Result<(), Box<dyn std::error::Error>> {
    let study = args.load()?;
    println!("{}", format_generation_prompt(&study));
    Ok(())
}
