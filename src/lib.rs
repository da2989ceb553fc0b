//! # rescall-eval - Resistance Caller Evaluation
//!
//! Measures the accuracy of antimicrobial resistance prediction tools by
//! comparing their per-sample resistance calls against known drug
//! susceptibility phenotypes, and reports sensitivity/specificity style
//! statistics, per-variant predictive values and WHO regimen concordance.

pub mod aggregate;
pub mod merge;
pub mod regimen;
pub mod report;
pub mod stats;
pub mod summary;
pub mod truth;
pub mod utils;

use serde::Deserialize;
use serde_json::Number;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Drug susceptibility outcome for one sample and drug
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Phenotype {
    Resistant,
    Susceptible,
    Unknown,
}

impl Phenotype {
    /// Anything other than exactly "R" or "S" is unknown ("n/a", "U", "", ...)
    pub fn from_call(value: &str) -> Self {
        match value {
            "R" => Phenotype::Resistant,
            "S" => Phenotype::Susceptible,
            _ => Phenotype::Unknown,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Phenotype::Unknown)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Phenotype::Resistant => "R",
            Phenotype::Susceptible => "S",
            Phenotype::Unknown => "NA",
        }
    }
}

/// Structured evidence attached to a call. Only one caller writes this,
/// so every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Evidence {
    pub conf: Option<Number>,
    pub ref_depth: Option<Number>,
    pub alt_depth: Option<Number>,
    pub expected_depth: Option<Number>,
}

/// A single resistance call for a (sample, tool, drug) triple.
///
/// On disk this is a JSON array `[call, gene, variant]` or
/// `[call, gene, variant, evidence]` where gene, variant and evidence may be null.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "RawCall")]
pub struct ResistanceCall {
    pub call: String,
    pub gene: Option<String>,
    pub variant: Option<String>,
    pub evidence: Option<Evidence>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawCall {
    WithEvidence(String, Option<String>, Option<String>, Option<serde_json::Value>),
    Bare(String, Option<String>, Option<String>),
}

/// Only an object is evidence. Some callers put a bare number in this slot.
fn evidence_from_value(value: Option<serde_json::Value>) -> Option<Evidence> {
    match value {
        Some(v @ serde_json::Value::Object(_)) => serde_json::from_value(v).ok(),
        _ => None,
    }
}

impl From<RawCall> for ResistanceCall {
    fn from(raw: RawCall) -> Self {
        match raw {
            RawCall::WithEvidence(call, gene, variant, evidence) => Self {
                call,
                gene,
                variant,
                evidence: evidence_from_value(evidence),
            },
            RawCall::Bare(call, gene, variant) => Self {
                call,
                gene,
                variant,
                evidence: None,
            },
        }
    }
}

impl ResistanceCall {
    pub fn new(call: &str, gene: Option<&str>, variant: Option<&str>) -> Self {
        Self {
            call: call.to_string(),
            gene: gene.map(|g| g.to_string()),
            variant: variant.map(|v| v.to_string()),
            evidence: None,
        }
    }

    pub fn with_evidence(mut self, evidence: Evidence) -> Self {
        self.evidence = Some(evidence);
        self
    }

    /// `gene.variant`, only when both are present
    pub fn variant_id(&self) -> Option<String> {
        match (&self.gene, &self.variant) {
            (Some(gene), Some(variant)) => Some(format!("{}.{}", gene, variant)),
            _ => None,
        }
    }
}

/// Result of running one tool on one sample
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ToolRunResult {
    #[serde(rename = "Success")]
    pub success: bool,
    #[serde(default)]
    pub resistance_calls: BTreeMap<String, Vec<ResistanceCall>>,
}

impl ToolRunResult {
    pub fn failed() -> Self {
        Self::default()
    }

    pub fn succeeded(resistance_calls: BTreeMap<String, Vec<ResistanceCall>>) -> Self {
        Self {
            success: true,
            resistance_calls,
        }
    }
}

/// sample -> tool -> run result
pub type CallStore = BTreeMap<String, BTreeMap<String, ToolRunResult>>;

/// Organism the evaluation is run for. Regimen concordance and the merged
/// "all" dataset only apply to tuberculosis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Species {
    Tb,
    Staph,
}

impl FromStr for Species {
    type Err = EvalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "tb" => Ok(Species::Tb),
            "staph" => Ok(Species::Staph),
            other => Err(EvalError::InvalidConfig(format!(
                "unknown species '{}', must be tb or staph",
                other
            ))),
        }
    }
}

impl fmt::Display for Species {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Species::Tb => write!(f, "tb"),
            Species::Staph => write!(f, "staph"),
        }
    }
}

/// Configuration for one evaluation run
#[derive(Debug, Clone)]
pub struct EvalConfig {
    pub species: Species,
    /// How a lower case "r" call is read. Callers disagree on this convention.
    pub r_means_resistant: bool,
    /// Tool name used when injecting secondary predictions
    pub predictor_tool: String,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            species: Species::Tb,
            r_means_resistant: true,
            predictor_tool: "10k_predict".to_string(),
        }
    }
}

/// Validate evaluation configuration
pub fn validate_config(config: &EvalConfig) -> EvalResult<()> {
    if config.predictor_tool.trim().is_empty() {
        return Err(EvalError::InvalidConfig(
            "predictor tool name must not be empty".to_string(),
        ));
    }

    if config.predictor_tool.contains('/') {
        return Err(EvalError::InvalidConfig(format!(
            "predictor tool name '{}' must not contain '/'",
            config.predictor_tool
        )));
    }

    Ok(())
}

/// Error types for the rescall-eval library
#[derive(Debug, thiserror::Error)]
pub enum EvalError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error in {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Invalid truth data: {0}")]
    InvalidTruth(String),

    #[error("Drug sets disagree for dataset {dataset}: {detail}")]
    DrugSetMismatch { dataset: String, detail: String },

    #[error("Conflicting phenotype for sample {sample}, drug {drug}: {first} vs {second}")]
    ConflictingPhenotype {
        sample: String,
        drug: String,
        first: String,
        second: String,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type EvalResult<T> = Result<T, EvalError>;
