//! Evaluate resistance caller output against truth phenotypes and write
//! accuracy, variant, confidence and regimen reports

use clap::Parser;
use env_logger::Env;
use rescall_eval::{
    aggregate::aggregate,
    report::write_all_reports,
    summary::load_summary_json,
    truth::{read_phenotype_table, GroundTruth, SecondaryPredictor},
    utils::{check_overwrite, log_memory_usage, parse_name_file_pairs, validate_file_readable, Timer},
    validate_config, EvalConfig, EvalError, EvalResult, Species,
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "summary_to_stats")]
#[command(about = "Measure resistance caller accuracy from a summary JSON file")]
#[command(long_about = "
Compares the per-sample resistance calls in a summary JSON file against truth
phenotype tables and writes four kinds of report next to OUTPREFIX:

  OUTPREFIX.accuracy_stats.tsv         counts, sensitivity, specificity, PPV, NPV,
                                       FNR and FPR with 95% intervals
  OUTPREFIX.variant_counts.TOOL.tsv    TP/FP per called variant combination
  OUTPREFIX.conf.tsv                   confidence and read depths by outcome
  OUTPREFIX.regimen_counts.tsv         WHO regimen concordance (tb only)

Truth tables are given as DATASET,FILE pairs. A dataset may be given more than
once to combine several files.
")]
struct Args {
    /// Summary JSON of all samples (may be gzipped)
    #[arg(long, value_name = "FILE")]
    summary_json: PathBuf,

    /// Truth phenotype tables as DATASET,FILE[,DATASET,FILE...]
    #[arg(long, value_name = "LIST", required = true)]
    truth: Vec<String>,

    /// Species of the samples
    #[arg(long, default_value = "tb")]
    species: Species,

    /// Read a lower case "r" call as susceptible instead of resistant
    #[arg(long)]
    r_means_susceptible: bool,

    /// Table of extra predictions to evaluate as an additional tool
    #[arg(long, value_name = "FILE", requires = "predictions_datasets")]
    predictions: Option<PathBuf>,

    /// Datasets the extra predictions apply to
    #[arg(long, value_name = "D1,D2", value_delimiter = ',')]
    predictions_datasets: Vec<String>,

    /// Tool name for the extra predictions
    #[arg(long, default_value = "10k_predict")]
    predictions_tool: String,

    /// Prefix of output files
    #[arg(long, value_name = "PREFIX")]
    outprefix: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Force overwrite of output files if they exist
    #[arg(short, long)]
    force: bool,
}

fn truth_files(values: &[String]) -> EvalResult<Vec<(String, PathBuf)>> {
    let mut files = Vec::new();
    for value in values {
        files.extend(parse_name_file_pairs(value)?);
    }
    for (_, path) in &files {
        validate_file_readable(path)?;
    }
    Ok(files)
}

fn run() -> EvalResult<()> {
    let args = Args::parse();

    let log_level = if args.debug {
        "debug"
    } else if args.verbose {
        "info"
    } else {
        "warn"
    };

    env_logger::Builder::from_env(Env::default().default_filter_or(log_level))
        .format_timestamp_secs()
        .init();

    let config = EvalConfig {
        species: args.species,
        r_means_resistant: !args.r_means_susceptible,
        predictor_tool: args.predictions_tool.clone(),
    };
    validate_config(&config)?;

    log::info!("Summary JSON: {:?}", args.summary_json);
    log::info!("Species: {}", config.species);
    log::info!("Lower case r means resistant: {}", config.r_means_resistant);

    validate_file_readable(&args.summary_json)?;
    let files = truth_files(&args.truth)?;
    check_overwrite(format!("{}.accuracy_stats.tsv", args.outprefix), args.force)?;

    let truth = {
        let _timer = Timer::new("Loading truth phenotypes");
        GroundTruth::load(&files, config.species)?
    };
    log::info!(
        "Loaded truth for {} samples in {} datasets",
        truth.samples.len(),
        truth.drugs.len()
    );

    let predictor = match &args.predictions {
        Some(path) => {
            validate_file_readable(path)?;
            let table = read_phenotype_table(path, config.species)?;
            Some(SecondaryPredictor::from_table(
                &config.predictor_tool,
                &args.predictions_datasets,
                table,
                &truth,
            )?)
        }
        None => None,
    };

    let call_store = {
        let _timer = Timer::new("Loading summary JSON");
        load_summary_json(&args.summary_json)?
    };
    log_memory_usage("after loading summary JSON");

    let aggregates = {
        let _timer = Timer::new("Aggregating calls");
        aggregate(&call_store, &truth, &config, predictor.as_ref())?
    };

    let _timer = Timer::new("Writing reports");
    let written = write_all_reports(&aggregates, &config, &args.outprefix)?;
    log::info!("Wrote {} report files", written.len());

    Ok(())
}

/// Handle application errors and provide user-friendly messages
fn handle_error(error: EvalError) -> ! {
    match error {
        EvalError::FileNotFound(path) => {
            eprintln!("Error: File not found: {}", path);
            eprintln!("Please check that the file exists and is readable.");
        }
        EvalError::Json { path, source } => {
            eprintln!("Error: Could not parse JSON file {}: {}", path, source);
            eprintln!("Please check that the summary JSON file is complete.");
        }
        EvalError::InvalidTruth(msg) => {
            eprintln!("Error: Invalid truth data: {}", msg);
            eprintln!("Each sample must be in exactly one dataset.");
        }
        EvalError::DrugSetMismatch { dataset, detail } => {
            eprintln!("Error: Drug sets disagree for dataset {}: {}", dataset, detail);
            eprintln!("The predictions table must have the same drug columns as the truth table.");
        }
        EvalError::ConflictingPhenotype { sample, drug, first, second } => {
            eprintln!(
                "Error: Truth files disagree for sample {}, drug {}: {} vs {}",
                sample, drug, first, second
            );
        }
        EvalError::InvalidConfig(msg) => {
            eprintln!("Error: Invalid configuration: {}", msg);
        }
        EvalError::Csv(ref e) => {
            eprintln!("Error: Could not parse table: {}", e);
            eprintln!("Tables must be tab separated with one header line.");
        }
        EvalError::Io(ref e) => {
            eprintln!("Error: I/O error: {}", e);
            eprintln!("Please check file permissions and disk space.");
        }
    }
    std::process::exit(1);
}

fn main() {
    if let Err(e) = run() {
        handle_error(e);
    }
}
