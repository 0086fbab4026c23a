use crate::output::{print_json, print_table};
use anyhow::Context;
use std::path::Path;
use std::time::Duration;
use tmgraph_core::export;
use tmgraph_core::manifest::Manifest;
use tmgraph_core::pipeline::{run as run_pipeline, PipelineOptions};
use tmgraph_core::rules::default_rules;

pub fn run(
    model: &Path,
    timeout_secs: Option<u64>,
    output: Option<&Path>,
    no_merge: bool,
    json: bool,
) -> anyhow::Result<()> {
    let manifest = Manifest::load(model)
        .with_context(|| format!("failed to load manifest {}", model.display()))?;
    let registry = manifest
        .into_registry()
        .context("failed to build model registry")?;

    let options = PipelineOptions {
        budget: timeout_secs.map(Duration::from_secs),
        merge_responses: if no_merge { Some(false) } else { None },
    };
    let mut outcome =
        run_pipeline(registry, default_rules(), &options).context("threat-model run failed")?;
    tracing::debug!(
        findings = outcome.report.findings.len(),
        suppressed = outcome.report.suppressed.len(),
        "run complete"
    );

    if let Some(dir) = output {
        export::write_artifacts(dir, &mut outcome.report, &outcome.graph)
            .with_context(|| format!("failed to write artifacts to {}", dir.display()))?;
    }

    let report = &outcome.report;
    if json {
        return print_json(report);
    }

    // -- Human-readable output ------------------------------------------------

    println!("Model: {}", report.model);
    println!(
        "Elements: {}  Dataflows: {}  Data assets: {}",
        report.elements, report.dataflows, report.data_assets
    );

    if report.findings.is_empty() {
        println!("\nNo findings.");
    } else {
        println!("\nFindings: {}", report.findings.len());
        let rows: Vec<Vec<String>> = report
            .findings
            .iter()
            .map(|f| {
                vec![
                    f.severity.to_string(),
                    f.rule_id.clone(),
                    f.target.clone(),
                    f.description.clone(),
                ]
            })
            .collect();
        print_table(&["SEVERITY", "RULE", "TARGET", "DESCRIPTION"], &rows);
    }

    if !report.suppressed.is_empty() {
        println!("\nSuppressed: {}", report.suppressed.len());
        for s in &report.suppressed {
            println!("  {} on {}: {}", s.rule_id, s.target, s.reason);
        }
    }

    if let Some(dir) = output {
        println!("\nArtifacts written to {}", dir.display());
    }

    Ok(())
}
