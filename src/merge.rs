//! Summing per-dataset aggregates into the dataset independent "all" totals

use crate::aggregate::{ConfusionBucket, ConfusionCounts, VariantTallies, VariantTally};
use std::collections::BTreeMap;

/// Name of the merged dataset
pub const ALL_DATASETS: &str = "all";

/// Sum confusion counts over every dataset, by drug and tool.
/// An existing "all" entry is not summed into itself.
pub fn all_counts(counts: &ConfusionCounts) -> BTreeMap<String, BTreeMap<String, ConfusionBucket>> {
    let mut merged: BTreeMap<String, BTreeMap<String, ConfusionBucket>> = BTreeMap::new();

    for (dataset, drugs) in counts {
        if dataset == ALL_DATASETS {
            continue;
        }

        for (drug, tools) in drugs {
            let merged_tools = merged.entry(drug.clone()).or_default();
            for (tool, bucket) in tools {
                *merged_tools.entry(tool.clone()).or_default() += bucket;
            }
        }
    }

    merged
}

/// Sum variant tallies over every dataset, by drug, tool and variant
pub fn all_variants(
    variants: &VariantTallies,
) -> BTreeMap<String, BTreeMap<String, BTreeMap<String, VariantTally>>> {
    let mut merged: BTreeMap<String, BTreeMap<String, BTreeMap<String, VariantTally>>> =
        BTreeMap::new();

    for (dataset, drugs) in variants {
        if dataset == ALL_DATASETS {
            continue;
        }

        for (drug, tools) in drugs {
            let merged_tools = merged.entry(drug.clone()).or_default();
            for (tool, tallies) in tools {
                let merged_tallies = merged_tools.entry(tool.clone()).or_default();
                for (variant, tally) in tallies {
                    *merged_tallies.entry(variant.clone()).or_default() += tally;
                }
            }
        }
    }

    merged
}

/// Add the "all" dataset to confusion counts, replacing any previous one
pub fn add_all_counts(counts: &mut ConfusionCounts) {
    let merged = all_counts(counts);
    counts.insert(ALL_DATASETS.to_string(), merged);
}

/// Add the "all" dataset to variant tallies, replacing any previous one
pub fn add_all_variants(variants: &mut VariantTallies) {
    let merged = all_variants(variants);
    variants.insert(ALL_DATASETS.to_string(), merged);
}
