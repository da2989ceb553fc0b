//! Summary JSON loading and combining of per-sample summary files

use crate::utils::{chunk_work, create_output, open_input};
use crate::{CallStore, EvalError, EvalResult};
use rayon::prelude::*;
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Load a (possibly gzipped) summary JSON file: sample -> tool -> run result
pub fn load_summary_json<P: AsRef<Path>>(path: P) -> EvalResult<CallStore> {
    let path = path.as_ref();
    let reader = open_input(path)?;
    let store: CallStore = serde_json::from_reader(reader).map_err(|source| EvalError::Json {
        path: path.display().to_string(),
        source,
    })?;

    log::info!("Loaded calls for {} samples from {}", store.len(), path.display());
    Ok(store)
}

/// Read the sample -> summary file table used by combine_summaries.
/// Relative paths are resolved against the table's directory.
pub fn read_samples_tsv<P: AsRef<Path>>(path: P) -> EvalResult<Vec<(String, PathBuf)>> {
    let path = path.as_ref();
    let base_dir = path.parent().unwrap_or_else(|| Path::new(""));
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .from_reader(open_input(path)?);

    let headers = reader.headers()?.clone();
    let column = |name: &str| {
        headers.iter().position(|h| h == name).ok_or_else(|| {
            EvalError::InvalidConfig(format!("column '{}' missing from {}", name, path.display()))
        })
    };
    let sample_col = column("sample")?;
    let json_col = column("summary_json")?;

    let mut samples = Vec::new();
    for result in reader.records() {
        let record = result?;
        let sample = record.get(sample_col).unwrap_or("").to_string();
        let json_file = PathBuf::from(record.get(json_col).unwrap_or(""));
        let json_file = if json_file.is_relative() {
            base_dir.join(json_file)
        } else {
            json_file
        };
        samples.push((sample, json_file));
    }

    Ok(samples)
}

fn load_sample_summary(sample: &str, path: &Path) -> EvalResult<Option<Value>> {
    if !path.exists() {
        return Ok(None);
    }

    let value = serde_json::from_reader(open_input(path)?).map_err(|source| EvalError::Json {
        path: path.display().to_string(),
        source,
    })?;
    log::debug!("Loaded summary of sample {} from {}", sample, path.display());
    Ok(Some(value))
}

/// Load one summary file per sample on a pool of `num_threads` workers.
/// Samples without a summary file are skipped with a warning.
pub fn combine_sample_summaries(
    samples: Vec<(String, PathBuf)>,
    num_threads: usize,
) -> EvalResult<BTreeMap<String, Value>> {
    let mut seen = BTreeSet::new();
    for (sample, _) in &samples {
        if sample.is_empty() {
            return Err(EvalError::InvalidConfig("empty sample name".to_string()));
        }
        if !seen.insert(sample.as_str()) {
            return Err(EvalError::InvalidConfig(format!(
                "sample {} listed more than once",
                sample
            )));
        }
    }

    let num_threads = num_threads.max(1);
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(num_threads)
        .build()
        .map_err(|e| EvalError::InvalidConfig(format!("failed to build thread pool: {}", e)))?;

    let chunks = chunk_work(samples, num_threads);
    let chunk_results: EvalResult<Vec<Vec<(String, Option<Value>)>>> = pool.install(|| {
        chunks
            .into_par_iter()
            .map(|chunk| {
                chunk
                    .into_iter()
                    .map(|(sample, path)| -> EvalResult<(String, Option<Value>)> {
                        let summary = load_sample_summary(&sample, &path)?;
                        Ok((sample, summary))
                    })
                    .collect()
            })
            .collect()
    });

    let mut combined = BTreeMap::new();
    for (sample, summary) in chunk_results?.into_iter().flatten() {
        match summary {
            Some(value) => {
                combined.insert(sample, value);
            }
            None => log::warn!("No JSON file for sample {}", sample),
        }
    }

    log::info!("Combined summaries of {} samples", combined.len());
    Ok(combined)
}

/// Write combined summaries as indented JSON with sorted keys
pub fn write_combined_summary<P: AsRef<Path>>(
    combined: &BTreeMap<String, Value>,
    path: P,
) -> EvalResult<()> {
    let path = path.as_ref();
    let mut writer = create_output(path)?;
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut writer, formatter);
    combined
        .serialize(&mut serializer)
        .map_err(|source| EvalError::Json {
            path: path.display().to_string(),
            source,
        })?;
    writeln!(writer)?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    const SAMPLE_SUMMARY: &str = r#"{
        "tool1": {
            "Success": true,
            "resistance_calls": {
                "Isoniazid": [["R", "katG", "S315T", {"conf": 100, "ref_depth": 1, "alt_depth": 50, "expected_depth": 48}]],
                "Rifampicin": [["S", null, null, null]]
            },
            "time_and_memory": {"wall_clock_time": 12.1, "ram": 0.5}
        },
        "tool2": {"Success": false}
    }"#;

    #[test]
    fn test_load_summary_json() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("summary.json");
        fs::write(&path, format!("{{\"sample1\": {}}}", SAMPLE_SUMMARY)).unwrap();

        let store = load_summary_json(&path).unwrap();
        let tools = &store["sample1"];
        assert!(tools["tool1"].success);
        assert!(!tools["tool2"].success);
        assert_eq!(tools["tool1"].resistance_calls["Isoniazid"][0].call, "R");
        assert!(tools["tool1"].resistance_calls["Isoniazid"][0].evidence.is_some());
    }

    #[test]
    fn test_load_summary_json_with_numeric_fourth_element() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("summary.json");
        fs::write(
            &path,
            r#"{"sample1": {"mykrobe": {"Success": true,
                "resistance_calls": {"Ethambutol": [["r", "embB", "M306J", 42]]}}}}"#,
        )
        .unwrap();

        let store = load_summary_json(&path).unwrap();
        let call = &store["sample1"]["mykrobe"].resistance_calls["Ethambutol"][0];
        assert_eq!(call.call, "r");
        assert_eq!(call.variant_id(), Some("embB.M306J".to_string()));
        assert!(call.evidence.is_none());
    }

    #[test]
    fn test_load_summary_json_error_names_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.json");
        fs::write(&path, "{\"sample1\": [").unwrap();

        match load_summary_json(&path) {
            Err(EvalError::Json { path: p, .. }) => assert!(p.ends_with("broken.json")),
            other => panic!("expected JSON error, got {:?}", other),
        }
    }

    #[test]
    fn test_read_samples_tsv() {
        let dir = tempdir().unwrap();
        let tsv = dir.path().join("samples.tsv");
        fs::write(&tsv, "sample\tsummary_json\ns1\ts1/summary.json\ns2\t/abs/summary.json\n").unwrap();

        let samples = read_samples_tsv(&tsv).unwrap();
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].1, dir.path().join("s1/summary.json"));
        assert_eq!(samples[1].1, PathBuf::from("/abs/summary.json"));
    }

    #[test]
    fn test_combine_sample_summaries() {
        let dir = tempdir().unwrap();
        let mut samples = Vec::new();
        for name in ["s3", "s1", "s2", "s4"] {
            let path = dir.path().join(format!("{}.json", name));
            if name != "s2" {
                fs::write(&path, SAMPLE_SUMMARY).unwrap();
            }
            samples.push((name.to_string(), path));
        }

        let combined = combine_sample_summaries(samples, 2).unwrap();
        let names: Vec<&str> = combined.keys().map(|k| k.as_str()).collect();
        assert_eq!(names, vec!["s1", "s3", "s4"]);

        let out = dir.path().join("combined.json");
        write_combined_summary(&combined, &out).unwrap();
        let store = load_summary_json(&out).unwrap();
        assert_eq!(store.len(), 3);
        assert!(store["s4"]["tool1"].success);
        assert!(fs::read_to_string(&out).unwrap().starts_with("{\n    \"s1\""));
    }

    #[test]
    fn test_combine_rejects_duplicate_samples() {
        let samples = vec![
            ("s1".to_string(), PathBuf::from("a.json")),
            ("s1".to_string(), PathBuf::from("b.json")),
        ];
        assert!(matches!(
            combine_sample_summaries(samples, 1),
            Err(EvalError::InvalidConfig(_))
        ));
    }
}
