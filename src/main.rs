fn main() {
    println!("rescall-eval - Resistance Caller Evaluation");
    println!();
    println!("Tools:");
    println!("  summary_to_stats   - Summary JSON + truth tables -> accuracy, variant, conf and regimen TSVs");
    println!("  combine_summaries  - Per-sample summary JSON files -> one summary JSON");
    println!();
    println!("For help with each tool:");
    println!("  cargo run --bin summary_to_stats -- --help");
    println!("  cargo run --bin combine_summaries -- --help");
    println!();
    println!("Quick start example:");
    println!("  cargo run --bin combine_summaries -- --samples-tsv samples.tsv --output summary.json");
    println!("  cargo run --bin summary_to_stats -- --summary-json summary.json \\");
    println!("      --truth mykrobe,mykrobe.tsv,10k_test,10k_test.tsv --outprefix out");
}
