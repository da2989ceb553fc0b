//! Loading of truth phenotype tables and secondary predictions

use crate::utils::open_input;
use crate::{EvalError, EvalResult, Phenotype, ResistanceCall, Species, ToolRunResult};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// Derived drug: resistant if any quinolone is resistant
pub const QUINOLONES: &str = "Quinolones";

const QUINOLONE_DRUGS: [&str; 3] = ["Ciprofloxacin", "Moxifloxacin", "Ofloxacin"];

/// Accepted names for the sample identifier column
const SAMPLE_COLUMNS: [&str; 2] = ["sample", "ena_id"];

/// Identifier columns that are not drugs
const IGNORED_COLUMNS: [&str; 1] = ["oxford_id"];

/// sample -> drug -> phenotype string, as read from one file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PhenotypeTable {
    pub drugs: BTreeSet<String>,
    pub samples: BTreeMap<String, BTreeMap<String, String>>,
}

/// Read a tab separated phenotype table. Values are kept as written.
pub fn read_phenotype_table<P: AsRef<Path>>(path: P, species: Species) -> EvalResult<PhenotypeTable> {
    let path = path.as_ref();
    let reader = open_input(path)?;
    let mut csv_reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .from_reader(reader);

    let headers = csv_reader.headers()?.clone();
    let sample_column = headers
        .iter()
        .position(|h| SAMPLE_COLUMNS.contains(&h))
        .ok_or_else(|| {
            EvalError::InvalidTruth(format!(
                "no sample column ({}) in {}",
                SAMPLE_COLUMNS.join(" or "),
                path.display()
            ))
        })?;

    let drug_columns: Vec<(usize, String)> = headers
        .iter()
        .enumerate()
        .filter(|(i, h)| *i != sample_column && !IGNORED_COLUMNS.contains(h))
        .map(|(i, h)| (i, h.to_string()))
        .collect();

    let mut table = PhenotypeTable {
        drugs: drug_columns.iter().map(|(_, d)| d.clone()).collect(),
        samples: BTreeMap::new(),
    };

    let quinolone_columns: Vec<&str> = QUINOLONE_DRUGS
        .iter()
        .copied()
        .filter(|q| table.drugs.contains(*q))
        .collect();
    let derive_quinolones = species == Species::Tb
        && !quinolone_columns.is_empty()
        && !table.drugs.contains(QUINOLONES);
    let mut added_quinolones = false;

    for result in csv_reader.records() {
        let record = result?;
        let sample = record.get(sample_column).unwrap_or("").to_string();
        if sample.is_empty() {
            return Err(EvalError::InvalidTruth(format!(
                "empty sample name in {}",
                path.display()
            )));
        }

        let mut phenos: BTreeMap<String, String> = drug_columns
            .iter()
            .map(|(i, drug)| (drug.clone(), record.get(*i).unwrap_or("").to_string()))
            .collect();

        if derive_quinolones {
            if let Some(value) = quinolone_phenotype(&phenos, &quinolone_columns) {
                phenos.insert(QUINOLONES.to_string(), value.as_str().to_string());
                added_quinolones = true;
            }
        }

        if table.samples.insert(sample.clone(), phenos).is_some() {
            return Err(EvalError::InvalidTruth(format!(
                "sample {} appears twice in {}",
                sample,
                path.display()
            )));
        }
    }

    if added_quinolones {
        table.drugs.insert(QUINOLONES.to_string());
    }

    log::info!(
        "Loaded {} samples and {} drugs from {}",
        table.samples.len(),
        table.drugs.len(),
        path.display()
    );
    Ok(table)
}

/// R if any quinolone is R, S if every quinolone column is S
fn quinolone_phenotype(phenos: &BTreeMap<String, String>, columns: &[&str]) -> Option<Phenotype> {
    let values: Vec<Phenotype> = columns
        .iter()
        .map(|q| phenos.get(*q).map(|v| Phenotype::from_call(v)).unwrap_or(Phenotype::Unknown))
        .collect();

    if values.contains(&Phenotype::Resistant) {
        Some(Phenotype::Resistant)
    } else if values.iter().all(|v| *v == Phenotype::Susceptible) {
        Some(Phenotype::Susceptible)
    } else {
        None
    }
}

/// Dataset membership and raw phenotypes of one sample
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SampleTruth {
    pub dataset: String,
    pub phenotypes: BTreeMap<String, String>,
}

/// All truth phenotypes plus the in-scope drugs of each dataset
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroundTruth {
    pub samples: BTreeMap<String, SampleTruth>,
    pub drugs: BTreeMap<String, BTreeSet<String>>,
}

impl GroundTruth {
    /// Load (dataset, file) pairs in order
    pub fn load(files: &[(String, std::path::PathBuf)], species: Species) -> EvalResult<Self> {
        let mut truth = GroundTruth::default();
        for (dataset, path) in files {
            let table = read_phenotype_table(path, species)?;
            truth.add_table(dataset, table)?;
        }
        Ok(truth)
    }

    /// Add one table to a dataset. A sample may appear in several files of
    /// the same dataset but never in two datasets.
    pub fn add_table(&mut self, dataset: &str, table: PhenotypeTable) -> EvalResult<()> {
        self.drugs
            .entry(dataset.to_string())
            .or_default()
            .extend(table.drugs);

        for (sample, phenos) in table.samples {
            match self.samples.get_mut(&sample) {
                Some(existing) if existing.dataset != dataset => {
                    return Err(EvalError::InvalidTruth(format!(
                        "sample {} is in datasets {} and {}",
                        sample, existing.dataset, dataset
                    )));
                }
                Some(existing) => merge_phenotypes(&sample, &mut existing.phenotypes, phenos)?,
                None => {
                    self.samples.insert(
                        sample,
                        SampleTruth {
                            dataset: dataset.to_string(),
                            phenotypes: phenos,
                        },
                    );
                }
            }
        }

        Ok(())
    }

    pub fn datasets(&self) -> impl Iterator<Item = &String> {
        self.drugs.keys()
    }
}

/// Known calls must agree; a known call replaces an unknown one
fn merge_phenotypes(
    sample: &str,
    existing: &mut BTreeMap<String, String>,
    new: BTreeMap<String, String>,
) -> EvalResult<()> {
    for (drug, value) in new {
        let new_pheno = Phenotype::from_call(&value);
        match existing.get(&drug) {
            Some(old) if Phenotype::from_call(old).is_known() => {
                if new_pheno.is_known() && *old != value {
                    return Err(EvalError::ConflictingPhenotype {
                        sample: sample.to_string(),
                        drug,
                        first: old.clone(),
                        second: value,
                    });
                }
            }
            Some(_) if !new_pheno.is_known() => {}
            _ => {
                existing.insert(drug, value);
            }
        }
    }
    Ok(())
}

/// Predictions of a tool that is not part of the summary JSON, added as an
/// extra tool for samples of the attached datasets
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SecondaryPredictor {
    pub tool: String,
    pub datasets: BTreeSet<String>,
    /// sample -> drug -> call
    pub calls: BTreeMap<String, BTreeMap<String, String>>,
}

impl SecondaryPredictor {
    /// The prediction table must cover exactly the drugs of every dataset
    /// it is attached to.
    pub fn from_table(
        tool: &str,
        datasets: &[String],
        table: PhenotypeTable,
        truth: &GroundTruth,
    ) -> EvalResult<Self> {
        for dataset in datasets {
            let truth_drugs = truth.drugs.get(dataset).ok_or_else(|| {
                EvalError::InvalidConfig(format!(
                    "predictions attached to unknown dataset {}",
                    dataset
                ))
            })?;

            if *truth_drugs != table.drugs {
                let missing: Vec<&String> = truth_drugs.difference(&table.drugs).collect();
                let extra: Vec<&String> = table.drugs.difference(truth_drugs).collect();
                return Err(EvalError::DrugSetMismatch {
                    dataset: dataset.clone(),
                    detail: format!(
                        "predictions lack {:?} and have extra {:?}",
                        missing, extra
                    ),
                });
            }
        }

        Ok(Self {
            tool: tool.to_string(),
            datasets: datasets.iter().cloned().collect(),
            calls: table.samples,
        })
    }

    /// Tool name and a run result holding one call per predicted drug
    pub fn tool_run_for(&self, sample: &str, dataset: &str) -> Option<(String, ToolRunResult)> {
        if !self.datasets.contains(dataset) {
            return None;
        }

        let predictions = self.calls.get(sample)?;
        let resistance_calls = predictions
            .iter()
            .map(|(drug, call)| {
                (
                    drug.clone(),
                    vec![ResistanceCall::new(call, Some("NA"), Some("NA"))],
                )
            })
            .collect();

        Some((self.tool.clone(), ToolRunResult::succeeded(resistance_calls)))
    }
}
