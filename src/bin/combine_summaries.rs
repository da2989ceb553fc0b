//! Combine per-sample summary JSON files into one summary JSON file

use anyhow::{Context, Result};
use clap::Parser;
use env_logger::Env;
use rescall_eval::{
    summary::{combine_sample_summaries, read_samples_tsv, write_combined_summary},
    utils::{check_overwrite, get_num_cpus, validate_file_readable, Timer},
    EvalError,
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "combine_summaries")]
#[command(about = "Combine per-sample summary JSON files into one file")]
#[command(long_about = "
Reads a tab separated table with columns 'sample' and 'summary_json' and writes
one JSON file keyed by sample name, suitable as input to summary_to_stats.

Relative summary paths are resolved against the directory of the table.
Samples whose summary file does not exist are skipped with a warning.
")]
struct Args {
    /// Table of sample names and summary JSON files
    #[arg(long, value_name = "FILE")]
    samples_tsv: PathBuf,

    /// Combined summary JSON file to write (.gz to compress)
    #[arg(long, value_name = "FILE")]
    output: PathBuf,

    /// Number of threads used to read summary files
    #[arg(long, default_value_t = get_num_cpus())]
    num_threads: usize,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Force overwrite of output file if it exists
    #[arg(short, long)]
    force: bool,
}

fn run() -> Result<()> {
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

    log::info!("Samples table: {:?}", args.samples_tsv);
    log::info!("Output: {:?}", args.output);
    log::info!("Number of threads: {}", args.num_threads);

    validate_file_readable(&args.samples_tsv)?;
    check_overwrite(&args.output, args.force)?;

    let samples = read_samples_tsv(&args.samples_tsv)
        .with_context(|| format!("reading samples table {}", args.samples_tsv.display()))?;
    log::info!("Found {} samples", samples.len());

    let combined = {
        let _timer = Timer::new("Reading sample summaries");
        combine_sample_summaries(samples, args.num_threads)?
    };

    if combined.is_empty() {
        log::warn!("No summary files found, writing empty JSON");
    }

    write_combined_summary(&combined, &args.output)
        .with_context(|| format!("writing {}", args.output.display()))?;
    log::info!("Wrote summaries of {} samples to {:?}", combined.len(), args.output);

    Ok(())
}

/// Handle application errors and provide user-friendly messages
fn handle_error(error: anyhow::Error) -> ! {
    match error.downcast_ref::<EvalError>() {
        Some(EvalError::FileNotFound(path)) => {
            eprintln!("Error: File not found: {}", path);
            eprintln!("Please check that the file exists and is readable.");
        }
        Some(EvalError::Json { path, .. }) => {
            eprintln!("Error: {:#}", error);
            eprintln!("Summary file {} is not valid JSON.", path);
        }
        Some(EvalError::InvalidConfig(msg)) => {
            eprintln!("Error: Invalid configuration: {}", msg);
        }
        _ => {
            eprintln!("Error: {:#}", error);
        }
    }
    std::process::exit(1);
}

fn main() {
    if let Err(e) = run() {
        handle_error(e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_args_parse() {
        let args = Args::try_parse_from([
            "combine_summaries",
            "--samples-tsv",
            "samples.tsv",
            "--output",
            "all.json",
            "--num-threads",
            "3",
            "-f",
        ])
        .unwrap();
        assert_eq!(args.num_threads, 3);
        assert!(args.force);

        let args = Args::try_parse_from([
            "combine_summaries",
            "--samples-tsv",
            "samples.tsv",
            "--output",
            "all.json",
        ])
        .unwrap();
        assert!(args.num_threads >= 1);
    }

    #[test]
    fn test_combine_from_samples_table() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("b")).unwrap();
        fs::write(dir.path().join("a.json"), r#"{"tool1": {"Success": false}}"#).unwrap();
        fs::write(dir.path().join("b/summary.json"), r#"{"tool1": {"Success": true, "resistance_calls": {}}}"#).unwrap();
        let table = dir.path().join("samples.tsv");
        fs::write(
            &table,
            "sample\tsummary_json\nb\tb/summary.json\na\ta.json\nc\tc.json\n",
        )
        .unwrap();

        let samples = read_samples_tsv(&table).unwrap();
        let combined = combine_sample_summaries(samples, 2).unwrap();
        let output = dir.path().join("all.json.gz");
        write_combined_summary(&combined, &output).unwrap();

        let store = rescall_eval::summary::load_summary_json(&output).unwrap();
        let names: Vec<&str> = store.keys().map(|k| k.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert!(store["b"]["tool1"].success);
    }
}
