//! Accuracy rates and binomial confidence intervals

use crate::aggregate::ConfusionBucket;

/// Two-sided 95% normal quantile
pub const Z_95: f64 = 1.959964;

/// Round to 2 decimal places, halves to even
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round_ties_even() / 100.0
}

/// 100 * numerator / (numerator + other), or None when both are zero
pub fn percentage(numerator: u64, other: u64) -> Option<f64> {
    let total = numerator + other;
    if total == 0 {
        return None;
    }
    Some(round2(100.0 * numerator as f64 / total as f64))
}

/// Wilson score interval for `successes` out of `successes + failures`,
/// as percentages rounded to 2 decimal places
pub fn binconf(successes: u64, failures: u64) -> Option<(f64, f64)> {
    let total = successes + failures;
    if total == 0 {
        return None;
    }

    let n = total as f64;
    let p = successes as f64 / n;
    let z2 = Z_95 * Z_95;

    let denominator = 1.0 + z2 / n;
    let centre = p + z2 / (2.0 * n);
    let spread = Z_95 * (p * (1.0 - p) / n + z2 / (4.0 * n * n)).sqrt();

    let low = ((centre - spread) / denominator).max(0.0);
    let high = ((centre + spread) / denominator).min(1.0);

    Some((round2(100.0 * low), round2(100.0 * high)))
}

/// Format a value the way the reports expect: "NA" when missing, and
/// whole numbers keep one decimal place
pub fn format_value(value: Option<f64>) -> String {
    match value {
        None => "NA".to_string(),
        Some(v) if v.fract() == 0.0 => format!("{:.1}", v),
        Some(v) => format!("{}", v),
    }
}

/// A rate with its confidence interval
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rate {
    pub value: Option<f64>,
    pub interval: Option<(f64, f64)>,
}

impl Rate {
    pub fn new(numerator: u64, other: u64) -> Self {
        Self {
            value: percentage(numerator, other),
            interval: binconf(numerator, other),
        }
    }

    pub fn low(&self) -> Option<f64> {
        self.interval.map(|(low, _)| low)
    }

    pub fn high(&self) -> Option<f64> {
        self.interval.map(|(_, high)| high)
    }

    /// value, low, high
    pub fn columns(&self) -> [String; 3] {
        [
            format_value(self.value),
            format_value(self.low()),
            format_value(self.high()),
        ]
    }
}

/// Derived accuracy rates of one confusion bucket
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AccuracyStats {
    pub sensitivity: Rate,
    pub specificity: Rate,
    pub ppv: Rate,
    pub npv: Rate,
    pub fnr: Rate,
    pub fpr: Rate,
}

impl AccuracyStats {
    pub const NAMES: [&'static str; 6] = ["Sensitivity", "Specificity", "PPV", "NPV", "FNR", "FPR"];

    pub fn from_bucket(bucket: &ConfusionBucket) -> Self {
        Self {
            sensitivity: Rate::new(bucket.tp, bucket.fn_),
            specificity: Rate::new(bucket.tn, bucket.fp),
            ppv: Rate::new(bucket.tp, bucket.fp),
            npv: Rate::new(bucket.tn, bucket.fn_),
            fnr: Rate::new(bucket.fn_, bucket.tp),
            fpr: Rate::new(bucket.fp, bucket.tn),
        }
    }

    /// Rates in column order
    pub fn rates(&self) -> [&Rate; 6] {
        [
            &self.sensitivity,
            &self.specificity,
            &self.ppv,
            &self.npv,
            &self.fnr,
            &self.fpr,
        ]
    }
}
