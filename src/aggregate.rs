//! Confusion matrix aggregation of tool calls against truth phenotypes
//!
//! One pass over every (sample, tool, drug) combination builds four
//! aggregates, all keyed dataset -> ... by name:
//! confusion counts, variant tallies, confidence/depth evidence and
//! regimen concordance counts.

use crate::regimen::{self, DstProfile};
use crate::truth::{GroundTruth, SecondaryPredictor};
use crate::{CallStore, EvalConfig, EvalError, EvalResult, Phenotype, ResistanceCall, Species, ToolRunResult};
use serde_json::Number;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::ops::AddAssign;

/// Classification of one (sample, tool, drug) against the truth phenotype
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Outcome {
    Tp,
    Fp,
    Tn,
    Fn,
    Unk,
    FailR,
    FailS,
}

impl Outcome {
    pub const ALL: [Outcome; 7] = [
        Outcome::Tp,
        Outcome::Fp,
        Outcome::Tn,
        Outcome::Fn,
        Outcome::Unk,
        Outcome::FailR,
        Outcome::FailS,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Tp => "TP",
            Outcome::Fp => "FP",
            Outcome::Tn => "TN",
            Outcome::Fn => "FN",
            Outcome::Unk => "UNK",
            Outcome::FailR => "FAIL_R",
            Outcome::FailS => "FAIL_S",
        }
    }

    /// Outcome of a failed tool run for a known truth phenotype
    pub fn failure(truth: Phenotype) -> Self {
        if truth == Phenotype::Resistant {
            Outcome::FailR
        } else {
            Outcome::FailS
        }
    }

    /// Outcome of a prediction for a known truth phenotype
    pub fn from_prediction(prediction: Phenotype, truth: Phenotype) -> Self {
        match (prediction, truth) {
            (Phenotype::Resistant, Phenotype::Resistant) => Outcome::Tp,
            (Phenotype::Resistant, _) => Outcome::Fp,
            (Phenotype::Susceptible, Phenotype::Susceptible) => Outcome::Tn,
            (Phenotype::Susceptible, _) => Outcome::Fn,
            (Phenotype::Unknown, _) => Outcome::Unk,
        }
    }
}

/// Outcome counters for one (dataset, drug, tool)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConfusionBucket {
    pub tp: u64,
    pub fp: u64,
    pub tn: u64,
    pub fn_: u64,
    pub unk: u64,
    pub fail_r: u64,
    pub fail_s: u64,
}

impl ConfusionBucket {
    pub fn record(&mut self, outcome: Outcome) {
        *self.slot(outcome) += 1;
    }

    pub fn get(&self, outcome: Outcome) -> u64 {
        match outcome {
            Outcome::Tp => self.tp,
            Outcome::Fp => self.fp,
            Outcome::Tn => self.tn,
            Outcome::Fn => self.fn_,
            Outcome::Unk => self.unk,
            Outcome::FailR => self.fail_r,
            Outcome::FailS => self.fail_s,
        }
    }

    fn slot(&mut self, outcome: Outcome) -> &mut u64 {
        match outcome {
            Outcome::Tp => &mut self.tp,
            Outcome::Fp => &mut self.fp,
            Outcome::Tn => &mut self.tn,
            Outcome::Fn => &mut self.fn_,
            Outcome::Unk => &mut self.unk,
            Outcome::FailR => &mut self.fail_r,
            Outcome::FailS => &mut self.fail_s,
        }
    }

    pub fn total(&self) -> u64 {
        Outcome::ALL.iter().map(|o| self.get(*o)).sum()
    }
}

impl AddAssign<&ConfusionBucket> for ConfusionBucket {
    fn add_assign(&mut self, rhs: &ConfusionBucket) {
        for outcome in Outcome::ALL {
            *self.slot(outcome) += rhs.get(outcome);
        }
    }
}

/// Correct/incorrect resistance calls attributed to one variant combination
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VariantTally {
    pub tp: u64,
    pub fp: u64,
}

impl VariantTally {
    pub fn new(tp: u64, fp: u64) -> Self {
        Self { tp, fp }
    }

    pub fn ppv(&self) -> f64 {
        crate::stats::round2(100.0 * self.tp as f64 / (self.tp + self.fp) as f64)
    }
}

impl AddAssign<&VariantTally> for VariantTally {
    fn add_assign(&mut self, rhs: &VariantTally) {
        self.tp += rhs.tp;
        self.fp += rhs.fp;
    }
}

/// Confidence and read depths reported with a call
#[derive(Debug, Clone, PartialEq)]
pub struct ConfDepth {
    pub conf: Number,
    pub ref_depth: Number,
    pub alt_depth: Number,
    pub expected_depth: Number,
}

impl ConfDepth {
    pub fn new<T: Into<Number>>(conf: T, ref_depth: T, alt_depth: T, expected_depth: T) -> Self {
        Self {
            conf: conf.into(),
            ref_depth: ref_depth.into(),
            alt_depth: alt_depth.into(),
            expected_depth: expected_depth.into(),
        }
    }

    /// Only calls carrying all four values contribute evidence
    pub fn from_call(call: &ResistanceCall) -> Option<Self> {
        let evidence = call.evidence.as_ref()?;
        Some(Self {
            conf: evidence.conf.clone()?,
            ref_depth: evidence.ref_depth.clone()?,
            alt_depth: evidence.alt_depth.clone()?,
            expected_depth: evidence.expected_depth.clone()?,
        })
    }

    fn values(&self) -> [f64; 4] {
        [
            &self.conf,
            &self.ref_depth,
            &self.alt_depth,
            &self.expected_depth,
        ]
        .map(|n| n.as_f64().unwrap_or(f64::NAN))
    }

    /// Numeric tuple ordering
    pub fn cmp_values(&self, other: &Self) -> Ordering {
        let a = self.values();
        let b = other.values();
        a.iter()
            .zip(b.iter())
            .map(|(x, y)| x.total_cmp(y))
            .find(|o| *o != Ordering::Equal)
            .unwrap_or(Ordering::Equal)
    }
}

/// Evidence tuples of one (dataset, drug, tool), by outcome
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfDepthBucket {
    pub tp: Vec<ConfDepth>,
    pub fp: Vec<ConfDepth>,
    pub tn: Vec<ConfDepth>,
    pub fn_: Vec<ConfDepth>,
}

impl ConfDepthBucket {
    /// UNK and FAIL outcomes carry no evidence
    pub fn push(&mut self, outcome: Outcome, value: ConfDepth) {
        match outcome {
            Outcome::Tp => self.tp.push(value),
            Outcome::Fp => self.fp.push(value),
            Outcome::Tn => self.tn.push(value),
            Outcome::Fn => self.fn_.push(value),
            Outcome::Unk | Outcome::FailR | Outcome::FailS => {}
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tp.is_empty() && self.fp.is_empty() && self.tn.is_empty() && self.fn_.is_empty()
    }

    /// Lists in call name order: FN, FP, TN, TP
    pub fn by_call(&self) -> [(Outcome, &[ConfDepth]); 4] {
        [
            (Outcome::Fn, self.fn_.as_slice()),
            (Outcome::Fp, self.fp.as_slice()),
            (Outcome::Tn, self.tn.as_slice()),
            (Outcome::Tp, self.tp.as_slice()),
        ]
    }
}

/// dataset -> drug -> tool -> counts
pub type ConfusionCounts = BTreeMap<String, BTreeMap<String, BTreeMap<String, ConfusionBucket>>>;

/// dataset -> drug -> tool -> variant string -> tally
pub type VariantTallies =
    BTreeMap<String, BTreeMap<String, BTreeMap<String, BTreeMap<String, VariantTally>>>>;

/// dataset -> drug -> tool -> evidence
pub type ConfDepthEvidence = BTreeMap<String, BTreeMap<String, BTreeMap<String, ConfDepthBucket>>>;

/// (truth regimen, called regimen)
pub type RegimenPair = (Option<u8>, Option<u8>);

/// dataset -> tool -> regimen pair -> sample count
pub type RegimenCounts = BTreeMap<String, BTreeMap<String, BTreeMap<RegimenPair, u64>>>;

/// Everything produced by one aggregation pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Aggregates {
    pub counts: ConfusionCounts,
    pub variants: VariantTallies,
    pub conf_depths: ConfDepthEvidence,
    pub regimens: RegimenCounts,
}

/// What one tool said about one drug for one sample
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub outcome: Outcome,
    pub prediction: Phenotype,
    /// Sorted, semicolon joined `gene.variant` ids; only for resistant predictions
    pub variant: Option<String>,
    pub evidence: Vec<ConfDepth>,
}

/// The tool's prediction for a drug. No calls means susceptible, and the
/// first call decides.
pub fn tool_prediction(calls: Option<&[ResistanceCall]>, r_means_resistant: bool) -> Phenotype {
    let first = match calls.and_then(|c| c.first()) {
        Some(call) => call.call.as_str(),
        None => return Phenotype::Susceptible,
    };

    match first {
        "r" if r_means_resistant => Phenotype::Resistant,
        "r" => Phenotype::Susceptible,
        other => Phenotype::from_call(other),
    }
}

/// Semicolon joined sorted variant ids of all calls with gene and variant set
pub fn variant_string(calls: &[ResistanceCall]) -> String {
    let mut variants: Vec<String> = calls.iter().filter_map(|c| c.variant_id()).collect();
    variants.sort();
    variants.join(";")
}

/// Classify one tool run for one drug with a known truth phenotype
pub fn classify_call(
    run: &ToolRunResult,
    drug: &str,
    truth: Phenotype,
    r_means_resistant: bool,
) -> Classification {
    if !run.success {
        return Classification {
            outcome: Outcome::failure(truth),
            prediction: Phenotype::Unknown,
            variant: None,
            evidence: Vec::new(),
        };
    }

    let calls = run.resistance_calls.get(drug).map(|c| c.as_slice());
    let prediction = tool_prediction(calls, r_means_resistant);
    let outcome = Outcome::from_prediction(prediction, truth);
    let calls = calls.unwrap_or(&[]);

    let variant = if prediction == Phenotype::Resistant {
        Some(variant_string(calls))
    } else {
        None
    };

    Classification {
        outcome,
        prediction,
        variant,
        evidence: calls.iter().filter_map(ConfDepth::from_call).collect(),
    }
}

impl Aggregates {
    /// Empty aggregates with every in-scope drug of every dataset present
    pub fn seeded(drugs: &BTreeMap<String, BTreeSet<String>>) -> Self {
        let mut aggregates = Self::default();
        for (dataset, drug_set) in drugs {
            let counts = aggregates.counts.entry(dataset.clone()).or_default();
            let variants = aggregates.variants.entry(dataset.clone()).or_default();
            let conf = aggregates.conf_depths.entry(dataset.clone()).or_default();
            for drug in drug_set {
                counts.entry(drug.clone()).or_default();
                variants.entry(drug.clone()).or_default();
                conf.entry(drug.clone()).or_default();
            }
        }
        aggregates
    }

    /// Record one classification. The tool gets an entry in counts, variants
    /// and evidence on first sight, even when it never calls a variant.
    pub fn record(&mut self, dataset: &str, drug: &str, tool: &str, classification: Classification) {
        let bucket = self
            .counts
            .entry(dataset.to_string())
            .or_default()
            .entry(drug.to_string())
            .or_default()
            .entry(tool.to_string())
            .or_default();
        bucket.record(classification.outcome);

        let tallies = self
            .variants
            .entry(dataset.to_string())
            .or_default()
            .entry(drug.to_string())
            .or_default()
            .entry(tool.to_string())
            .or_default();
        if let Some(variant) = classification.variant {
            let tally = tallies.entry(variant).or_default();
            match classification.outcome {
                Outcome::Tp => tally.tp += 1,
                Outcome::Fp => tally.fp += 1,
                _ => {}
            }
        }

        let evidence = self
            .conf_depths
            .entry(dataset.to_string())
            .or_default()
            .entry(drug.to_string())
            .or_default()
            .entry(tool.to_string())
            .or_default();
        for value in classification.evidence {
            evidence.push(classification.outcome, value);
        }
    }

    pub fn record_regimens(&mut self, dataset: &str, tool: &str, pair: RegimenPair) {
        *self
            .regimens
            .entry(dataset.to_string())
            .or_default()
            .entry(tool.to_string())
            .or_default()
            .entry(pair)
            .or_insert(0) += 1;
    }

    /// Drop tools that never supplied evidence for a drug
    pub fn prune_conf_depths(&mut self) {
        for drugs in self.conf_depths.values_mut() {
            for tools in drugs.values_mut() {
                tools.retain(|_, bucket| !bucket.is_empty());
            }
        }
    }
}

/// Build all aggregates from the call store in one pass
pub fn aggregate(
    call_store: &CallStore,
    truth: &GroundTruth,
    config: &EvalConfig,
    predictor: Option<&SecondaryPredictor>,
) -> EvalResult<Aggregates> {
    let mut aggregates = Aggregates::seeded(&truth.drugs);
    let mut skipped = 0usize;

    for (sample, runs) in call_store {
        let Some(sample_truth) = truth.samples.get(sample) else {
            log::warn!("Sample \"{}\" not found in any truth dataset", sample);
            skipped += 1;
            continue;
        };

        let dataset = sample_truth.dataset.as_str();
        let drugs = truth.drugs.get(dataset).ok_or_else(|| {
            EvalError::InvalidTruth(format!("no drug set for dataset {}", dataset))
        })?;

        let truth_pheno: BTreeMap<String, Phenotype> = sample_truth
            .phenotypes
            .iter()
            .map(|(drug, value)| (drug.clone(), Phenotype::from_call(value)))
            .collect();
        let is_tb = config.species == Species::Tb;
        let truth_regimen = if is_tb {
            DstProfile::new(&truth_pheno).regimen_number()
        } else {
            None
        };

        let injected = predictor.and_then(|p| p.tool_run_for(sample, dataset));
        let mut tools: BTreeMap<&str, &ToolRunResult> =
            runs.iter().map(|(tool, run)| (tool.as_str(), run)).collect();
        if let Some((tool, run)) = injected.as_ref() {
            tools.insert(tool.as_str(), run);
        }

        for (tool, run) in tools {
            let mut tool_pheno: BTreeMap<String, Phenotype> = BTreeMap::new();

            for drug in drugs {
                let truth_call = match truth_pheno.get(drug) {
                    Some(p) if p.is_known() => *p,
                    _ => continue,
                };

                let classification = classify_call(run, drug, truth_call, config.r_means_resistant);
                if run.success {
                    tool_pheno.insert(drug.clone(), classification.prediction);
                }
                aggregates.record(dataset, drug, tool, classification);
            }

            if is_tb {
                let called_regimen = regimen::classify(&tool_pheno).map(|r| r.number);
                aggregates.record_regimens(dataset, tool, (truth_regimen, called_regimen));
            }
        }
    }

    if skipped > 0 {
        log::warn!("{} samples skipped because they have no truth phenotypes", skipped);
    }

    aggregates.prune_conf_depths();
    Ok(aggregates)
}
