//! Tab separated report writers

use crate::aggregate::{Aggregates, ConfDepth, ConfDepthEvidence, ConfusionCounts, RegimenCounts, VariantTallies};
use crate::merge::{add_all_counts, add_all_variants};
use crate::stats::{format_value, AccuracyStats};
use crate::utils::create_output;
use crate::{EvalConfig, EvalResult, Species};
use std::collections::BTreeSet;
use std::io::Write;
use std::path::{Path, PathBuf};

const ACCURACY_COUNT_COLUMNS: [&str; 10] = [
    "Dataset", "Drug", "Tool", "TP", "TN", "FP", "FN", "FAIL_R", "FAIL_S", "UNK",
];

fn accuracy_header() -> String {
    let mut columns: Vec<String> = ACCURACY_COUNT_COLUMNS.iter().map(|c| c.to_string()).collect();
    for name in AccuracyStats::NAMES {
        columns.push(name.to_string());
        columns.push(format!("{}_conf_low", name));
        columns.push(format!("{}_conf_high", name));
    }
    columns.join("\t")
}

/// One row per (dataset, drug, tool): raw counts then each rate with its interval
pub fn write_accuracy_stats<P: AsRef<Path>>(counts: &ConfusionCounts, path: P) -> EvalResult<()> {
    let mut writer = create_output(path)?;
    writeln!(writer, "{}", accuracy_header())?;

    for (dataset, drugs) in counts {
        for (drug, tools) in drugs {
            for (tool, bucket) in tools {
                let stats = AccuracyStats::from_bucket(bucket);
                let rates: Vec<String> = stats
                    .rates()
                    .iter()
                    .flat_map(|rate| rate.columns())
                    .collect();

                writeln!(
                    writer,
                    "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
                    dataset,
                    drug,
                    tool,
                    bucket.tp,
                    bucket.tn,
                    bucket.fp,
                    bucket.fn_,
                    bucket.fail_r,
                    bucket.fail_s,
                    bucket.unk,
                    rates.join("\t"),
                )?;
            }
        }
    }

    writer.flush()?;
    Ok(())
}

/// Variant tallies of a single tool, sorted by dataset, drug, PPV, TP, FP, variant
pub fn write_variant_counts_for_tool<P: AsRef<Path>>(
    variants: &VariantTallies,
    tool: &str,
    path: P,
) -> EvalResult<()> {
    let mut rows: Vec<(&str, &str, f64, u64, u64, &str)> = Vec::new();
    for (dataset, drugs) in variants {
        for (drug, tools) in drugs {
            if let Some(tallies) = tools.get(tool) {
                for (variant, tally) in tallies {
                    rows.push((
                        dataset.as_str(),
                        drug.as_str(),
                        tally.ppv(),
                        tally.tp,
                        tally.fp,
                        variant.as_str(),
                    ));
                }
            }
        }
    }

    rows.sort_by(|a, b| {
        a.0.cmp(b.0)
            .then_with(|| a.1.cmp(b.1))
            .then_with(|| a.2.total_cmp(&b.2))
            .then_with(|| a.3.cmp(&b.3))
            .then_with(|| a.4.cmp(&b.4))
            .then_with(|| a.5.cmp(b.5))
    });

    let mut writer = create_output(path)?;
    writeln!(writer, "Dataset\tDrug\tPPV\tTP\tFP\tVariant")?;
    for (dataset, drug, ppv, tp, fp, variant) in rows {
        writeln!(
            writer,
            "{}\t{}\t{}\t{}\t{}\t{}",
            dataset,
            drug,
            format_value(Some(ppv)),
            tp,
            fp,
            variant
        )?;
    }

    writer.flush()?;
    Ok(())
}

/// Write PREFIX.TOOL.tsv for every tool seen, except `skip_tool`
pub fn write_all_variant_counts(
    variants: &VariantTallies,
    prefix: &str,
    skip_tool: &str,
) -> EvalResult<Vec<PathBuf>> {
    let tools: BTreeSet<&str> = variants
        .values()
        .flat_map(|drugs| drugs.values())
        .flat_map(|tools| tools.keys())
        .map(|tool| tool.as_str())
        .filter(|tool| *tool != skip_tool)
        .collect();

    let mut written = Vec::new();
    for tool in tools {
        let path = PathBuf::from(format!("{}.{}.tsv", prefix, tool));
        write_variant_counts_for_tool(variants, tool, &path)?;
        written.push(path);
    }

    Ok(written)
}

fn conf_columns(value: &ConfDepth) -> String {
    format!(
        "{}\t{}\t{}\t{}",
        value.conf, value.ref_depth, value.alt_depth, value.expected_depth
    )
}

/// Confidence and depth tuples, sorted within each (dataset, drug, tool, call)
pub fn write_conf_file<P: AsRef<Path>>(conf_depths: &ConfDepthEvidence, path: P) -> EvalResult<()> {
    let mut writer = create_output(path)?;
    writeln!(
        writer,
        "Dataset\tTool\tDrug\tCall\tConf\tRef_depth\tAlt_depth\tExpected_depth"
    )?;

    for (dataset, drugs) in conf_depths {
        for (drug, tools) in drugs {
            for (tool, bucket) in tools {
                for (outcome, values) in bucket.by_call() {
                    let mut sorted: Vec<&ConfDepth> = values.iter().collect();
                    sorted.sort_by(|a, b| a.cmp_values(b));
                    for value in sorted {
                        writeln!(
                            writer,
                            "{}\t{}\t{}\t{}\t{}",
                            dataset,
                            tool,
                            drug,
                            outcome.as_str(),
                            conf_columns(value)
                        )?;
                    }
                }
            }
        }
    }

    writer.flush()?;
    Ok(())
}

fn regimen_label(regimen: Option<u8>) -> String {
    regimen.map_or_else(|| "None".to_string(), |n| n.to_string())
}

/// Regimen concordance counts. Unclassified regimens sort first.
pub fn write_regimen_counts<P: AsRef<Path>>(regimens: &RegimenCounts, path: P) -> EvalResult<()> {
    let mut writer = create_output(path)?;
    writeln!(writer, "Dataset\tTool\tTruth_regimen\tCalled_regimen\tCount")?;

    for (dataset, tools) in regimens {
        for (tool, pairs) in tools {
            for ((truth, called), count) in pairs {
                writeln!(
                    writer,
                    "{}\t{}\t{}\t{}\t{}",
                    dataset,
                    tool,
                    regimen_label(*truth),
                    regimen_label(*called),
                    count
                )?;
            }
        }
    }

    writer.flush()?;
    Ok(())
}

/// Write every report for one evaluation run and return the files written.
/// Tuberculosis runs also get the merged "all" dataset and regimen counts.
pub fn write_all_reports(
    aggregates: &Aggregates,
    config: &EvalConfig,
    outprefix: &str,
) -> EvalResult<Vec<PathBuf>> {
    let mut counts = aggregates.counts.clone();
    let mut variants = aggregates.variants.clone();
    let mut written = Vec::new();

    if config.species == Species::Tb {
        add_all_counts(&mut counts);
        add_all_variants(&mut variants);

        let path = PathBuf::from(format!("{}.regimen_counts.tsv", outprefix));
        write_regimen_counts(&aggregates.regimens, &path)?;
        written.push(path);
    }

    let path = PathBuf::from(format!("{}.accuracy_stats.tsv", outprefix));
    write_accuracy_stats(&counts, &path)?;
    written.push(path);

    let variant_prefix = format!("{}.variant_counts", outprefix);
    written.extend(write_all_variant_counts(
        &variants,
        &variant_prefix,
        &config.predictor_tool,
    )?);

    let path = PathBuf::from(format!("{}.conf.tsv", outprefix));
    write_conf_file(&aggregates.conf_depths, &path)?;
    written.push(path);

    for path in &written {
        log::info!("Wrote {}", path.display());
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::{ConfDepthBucket, ConfusionBucket, Outcome, VariantTally};
    use std::fs;
    use tempfile::tempdir;

    fn read_lines(path: &Path) -> Vec<String> {
        fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|l| l.to_string())
            .collect()
    }

    fn insert_bucket(counts: &mut ConfusionCounts, dataset: &str, drug: &str, tool: &str, bucket: ConfusionBucket) {
        counts
            .entry(dataset.to_string())
            .or_default()
            .entry(drug.to_string())
            .or_default()
            .insert(tool.to_string(), bucket);
    }

    fn insert_tally(variants: &mut VariantTallies, dataset: &str, drug: &str, tool: &str, variant: &str, tp: u64, fp: u64) {
        variants
            .entry(dataset.to_string())
            .or_default()
            .entry(drug.to_string())
            .or_default()
            .entry(tool.to_string())
            .or_default()
            .insert(variant.to_string(), VariantTally::new(tp, fp));
    }

    #[test]
    fn test_write_accuracy_stats() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("stats.tsv");

        let mut counts = ConfusionCounts::new();
        insert_bucket(
            &mut counts,
            "mykrobe",
            "Isoniazid",
            "tool2",
            ConfusionBucket { tp: 9, fp: 1, tn: 10, fn_: 2, unk: 3, fail_r: 1, fail_s: 0 },
        );
        insert_bucket(
            &mut counts,
            "mykrobe",
            "Isoniazid",
            "tool1",
            ConfusionBucket { tn: 4, ..ConfusionBucket::default() },
        );
        write_accuracy_stats(&counts, &path).unwrap();

        let lines = read_lines(&path);
        assert_eq!(lines.len(), 3);
        let header: Vec<&str> = lines[0].split('\t').collect();
        assert_eq!(header.len(), 28);
        assert_eq!(header[10], "Sensitivity");
        assert_eq!(header[27], "FPR_conf_high");

        let row: Vec<&str> = lines[1].split('\t').collect();
        assert_eq!(row.len(), 28);
        assert_eq!(&row[..10], ["mykrobe", "Isoniazid", "tool1", "0", "4", "0", "0", "0", "0", "0"]);
        assert_eq!(&row[10..13], ["NA", "NA", "NA"]);
        assert_eq!(row[13], "100.0");
        assert_eq!(row[15], "100.0");

        let row: Vec<&str> = lines[2].split('\t').collect();
        assert_eq!(&row[..10], ["mykrobe", "Isoniazid", "tool2", "9", "10", "1", "2", "1", "0", "3"]);
        assert_eq!(row[10], "81.82");
        assert_eq!(row[13], "90.91");
        assert_eq!(row[16], "90.0");
        assert_eq!(row[19], "83.33");
        assert_eq!(row[22], "18.18");
        assert_eq!(row[25], "9.09");
        assert_eq!(row[11], "52.3");
        assert_eq!(row[12], "94.86");
    }

    #[test]
    fn test_write_variant_counts_for_tool() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("variants.tsv");

        let mut variants = VariantTallies::new();
        insert_tally(&mut variants, "mykrobe", "Isoniazid", "tool1", "katG.S315T", 2, 0);
        insert_tally(&mut variants, "mykrobe", "Isoniazid", "tool1", "fabG1.C-15T;katG.S315T", 2, 1);
        insert_tally(&mut variants, "mykrobe", "Isoniazid", "tool1", "inhA.I21V", 0, 1);
        insert_tally(&mut variants, "mykrobe", "Isoniazid", "tool2", "katG.S315N", 1, 0);
        insert_tally(&mut variants, "10k_test", "Rifampicin", "tool1", "", 1, 0);
        write_variant_counts_for_tool(&variants, "tool1", &path).unwrap();

        assert_eq!(
            read_lines(&path),
            vec![
                "Dataset\tDrug\tPPV\tTP\tFP\tVariant",
                "10k_test\tRifampicin\t100.0\t1\t0\t",
                "mykrobe\tIsoniazid\t0.0\t0\t1\tinhA.I21V",
                "mykrobe\tIsoniazid\t66.67\t2\t1\tfabG1.C-15T;katG.S315T",
                "mykrobe\tIsoniazid\t100.0\t2\t0\tkatG.S315T",
            ]
        );
    }

    #[test]
    fn test_write_all_variant_counts_skips_predictor() {
        let dir = tempdir().unwrap();
        let prefix = dir.path().join("out.variant_counts").display().to_string();

        let mut variants = VariantTallies::new();
        insert_tally(&mut variants, "mykrobe", "Isoniazid", "tool1", "katG.S315T", 1, 0);
        insert_tally(&mut variants, "10k_test", "Isoniazid", "tool2", "katG.S315T", 1, 0);
        insert_tally(&mut variants, "10k_test", "Isoniazid", "10k_predict", "NA.NA", 1, 0);

        let written = write_all_variant_counts(&variants, &prefix, "10k_predict").unwrap();
        assert_eq!(
            written,
            vec![
                PathBuf::from(format!("{}.tool1.tsv", prefix)),
                PathBuf::from(format!("{}.tool2.tsv", prefix)),
            ]
        );
        assert!(!Path::new(&format!("{}.10k_predict.tsv", prefix)).exists());
        assert_eq!(read_lines(&written[1]).len(), 2);
    }

    #[test]
    fn test_write_conf_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("conf.tsv");

        let mut bucket = ConfDepthBucket::default();
        bucket.push(Outcome::Tp, ConfDepth::new(100, 2, 50, 40));
        bucket.push(Outcome::Tp, ConfDepth::new(20, 1, 9, 40));
        bucket.push(Outcome::Fn, ConfDepth::new(5, 30, 0, 40));
        bucket.push(Outcome::Unk, ConfDepth::new(1, 1, 1, 1));

        let mut conf = ConfDepthEvidence::new();
        conf.entry("mykrobe".to_string())
            .or_default()
            .entry("Isoniazid".to_string())
            .or_default()
            .insert("tool1".to_string(), bucket);
        write_conf_file(&conf, &path).unwrap();

        assert_eq!(
            read_lines(&path),
            vec![
                "Dataset\tTool\tDrug\tCall\tConf\tRef_depth\tAlt_depth\tExpected_depth",
                "mykrobe\ttool1\tIsoniazid\tFN\t5\t30\t0\t40",
                "mykrobe\ttool1\tIsoniazid\tTP\t20\t1\t9\t40",
                "mykrobe\ttool1\tIsoniazid\tTP\t100\t2\t50\t40",
            ]
        );
    }

    #[test]
    fn test_write_regimen_counts() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("regimens.tsv");

        let mut regimens = RegimenCounts::new();
        let tool = regimens
            .entry("mykrobe".to_string())
            .or_default()
            .entry("tool1".to_string())
            .or_default();
        tool.insert((Some(10), Some(2)), 1);
        tool.insert((Some(1), Some(1)), 5);
        tool.insert((None, Some(1)), 2);
        tool.insert((Some(1), None), 3);
        write_regimen_counts(&regimens, &path).unwrap();

        assert_eq!(
            read_lines(&path),
            vec![
                "Dataset\tTool\tTruth_regimen\tCalled_regimen\tCount",
                "mykrobe\ttool1\tNone\t1\t2",
                "mykrobe\ttool1\t1\tNone\t3",
                "mykrobe\ttool1\t1\t1\t5",
                "mykrobe\ttool1\t10\t2\t1",
            ]
        );
    }

    #[test]
    fn test_write_all_reports() {
        let dir = tempdir().unwrap();
        let prefix = dir.path().join("out").display().to_string();

        let mut aggregates = Aggregates::default();
        insert_bucket(&mut aggregates.counts, "mykrobe", "Isoniazid", "tool1", ConfusionBucket { tp: 1, ..ConfusionBucket::default() });
        insert_bucket(&mut aggregates.counts, "10k_test", "Isoniazid", "tool1", ConfusionBucket { tp: 2, ..ConfusionBucket::default() });
        insert_tally(&mut aggregates.variants, "mykrobe", "Isoniazid", "tool1", "katG.S315T", 1, 0);

        let written = write_all_reports(&aggregates, &EvalConfig::default(), &prefix).unwrap();
        assert_eq!(written.len(), 4);
        assert!(Path::new(&format!("{}.regimen_counts.tsv", prefix)).exists());

        let stats = read_lines(Path::new(&format!("{}.accuracy_stats.tsv", prefix)));
        let datasets: Vec<&str> = stats[1..].iter().map(|l| l.split('\t').next().unwrap()).collect();
        assert_eq!(datasets, vec!["10k_test", "all", "mykrobe"]);
        assert!(stats[2].starts_with("all\tIsoniazid\ttool1\t3\t"));

        let variants = read_lines(Path::new(&format!("{}.variant_counts.tool1.tsv", prefix)));
        assert_eq!(variants[1], "all\tIsoniazid\t100.0\t1\t0\tkatG.S315T");
        assert!(!aggregates.counts.contains_key("all"));
    }

    #[test]
    fn test_write_all_reports_staph() {
        let dir = tempdir().unwrap();
        let prefix = dir.path().join("staph").display().to_string();

        let mut aggregates = Aggregates::default();
        insert_bucket(&mut aggregates.counts, "mykrobe", "Penicillin", "tool1", ConfusionBucket { tn: 1, ..ConfusionBucket::default() });

        let config = EvalConfig {
            species: Species::Staph,
            ..EvalConfig::default()
        };
        let written = write_all_reports(&aggregates, &config, &prefix).unwrap();
        assert_eq!(written.len(), 2);
        assert!(!Path::new(&format!("{}.regimen_counts.tsv", prefix)).exists());

        let stats = read_lines(Path::new(&format!("{}.accuracy_stats.tsv", prefix)));
        assert_eq!(stats.len(), 2);
        assert!(stats[1].starts_with("mykrobe\tPenicillin\ttool1\t"));
    }
}
