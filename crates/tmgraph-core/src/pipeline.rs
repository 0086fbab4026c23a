use crate::aggregate::aggregate;
use crate::engine::{EvalOptions, Finding, RuleEngine, Suppression};
use crate::error::Result;
use crate::graph::ModelGraph;
use crate::registry::ModelRegistry;
use crate::rules::ThreatRule;
use crate::types::RunStage;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default)]
pub struct PipelineOptions {
    /// Hard wall-clock limit on rule evaluation.
    pub budget: Option<Duration>,
    /// Override the model's `merge_responses` setting.
    pub merge_responses: Option<bool>,
}

// ---------------------------------------------------------------------------
// RunReport
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub generated_at: DateTime<Utc>,
    pub stage: RunStage,
    pub elements: usize,
    pub dataflows: usize,
    pub data_assets: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub assumptions: Vec<String>,
    pub findings: Vec<Finding>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub suppressed: Vec<Suppression>,
}

impl RunReport {
    pub fn mark_exported(&mut self) {
        self.stage = RunStage::Exported;
    }
}

/// The report plus the resolved graph it was derived from, for consumers
/// that also want a diagram description.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub report: RunReport,
    pub graph: ModelGraph,
}

// ---------------------------------------------------------------------------
// run
// ---------------------------------------------------------------------------

/// Drive one model through the full stage machine:
/// Building -> Finalized -> GraphResolved -> RulesEvaluated -> Aggregated.
/// (`Exported` is set by the exporter once artifacts are written.)
///
/// Fail-fast: the first error from any stage aborts the run and nothing is
/// emitted.
pub fn run(
    registry: ModelRegistry,
    rules: Vec<ThreatRule>,
    options: &PipelineOptions,
) -> Result<RunOutcome> {
    let snapshot = registry.finalize();
    let graph = ModelGraph::build(&snapshot)?;

    let engine = RuleEngine::new(rules);
    let eval = engine.evaluate(
        &graph,
        &EvalOptions {
            budget: options.budget,
        },
    )?;

    let merge = options
        .merge_responses
        .unwrap_or(graph.config.merge_responses);
    let findings = aggregate(eval.findings, merge);

    let report = RunReport {
        model: graph.config.name.clone(),
        description: graph.config.description.clone(),
        generated_at: Utc::now(),
        stage: RunStage::Aggregated,
        elements: graph.nodes.len(),
        dataflows: graph.edges.len(),
        data_assets: graph.data.len(),
        assumptions: graph.config.assumptions.clone(),
        findings,
        suppressed: eval.suppressed,
    };
    Ok(RunOutcome { report, graph })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TmError;
    use crate::model::{ActorSpec, DataSpec, DatastoreSpec, ElementCommon, FlowSpec, ServerSpec};
    use crate::registry::{ModelConfig, ModelRegistry};
    use crate::rules::default_rules;
    use crate::types::{Classification, Control};

    /// The two-tier comment system: User --HTTP--> Web --SQL--> Database.
    fn comment_system(merge: bool) -> ModelRegistry {
        let mut config = ModelConfig::new("comments");
        config.merge_responses = merge;
        let mut reg = ModelRegistry::new(config);
        reg.register_actor(ActorSpec {
            common: ElementCommon::named("User"),
        })
        .unwrap();
        reg.register_server(ServerSpec {
            common: ElementCommon {
                name: "Web".into(),
                controls: [(Control::AuthorizesSource, false)].into_iter().collect(),
                ..Default::default()
            },
            ..Default::default()
        })
        .unwrap();
        reg.register_datastore(DatastoreSpec {
            common: ElementCommon::named("Database"),
            max_classification: Classification::Public,
            ..Default::default()
        })
        .unwrap();
        reg.register_flow(FlowSpec {
            name: "post comment".into(),
            source: "User".into(),
            dest: "Web".into(),
            protocol: Some("HTTP".into()),
            data: vec!["Comment".into()],
            ..Default::default()
        })
        .unwrap();
        reg.register_flow(FlowSpec {
            name: "insert comment".into(),
            source: "Web".into(),
            dest: "Database".into(),
            protocol: Some("SQL".into()),
            data: vec!["Comment".into()],
            ..Default::default()
        })
        .unwrap();
        reg.register_data(DataSpec {
            name: "Comment".into(),
            classification: Classification::Public,
            created_at: vec!["User".into()],
            stored_at: vec!["Database".into()],
            traverses: vec!["post comment".into(), "insert comment".into()],
            ..Default::default()
        })
        .unwrap();
        reg
    }

    #[test]
    fn end_to_end_comment_system() {
        let outcome = run(
            comment_system(false),
            default_rules(),
            &PipelineOptions::default(),
        )
        .unwrap();
        let report = outcome.report;
        assert_eq!(report.stage, crate::types::RunStage::Aggregated);
        assert_eq!(report.elements, 3);
        assert_eq!(report.dataflows, 2);
        assert_eq!(report.data_assets, 1);
        // Public comment data within a public-ceiling store: no violation,
        // but the unauthorized inbound flow must be flagged.
        assert!(report
            .findings
            .iter()
            .any(|f| f.rule_id == "AC01" && f.target == "post comment"));
    }

    #[test]
    fn reruns_are_byte_identical() {
        let a = run(
            comment_system(false),
            default_rules(),
            &PipelineOptions::default(),
        )
        .unwrap();
        let b = run(
            comment_system(false),
            default_rules(),
            &PipelineOptions::default(),
        )
        .unwrap();
        let fa = serde_json::to_string(&a.report.findings).unwrap();
        let fb = serde_json::to_string(&b.report.findings).unwrap();
        assert_eq!(fa, fb);
    }

    /// User outside the DMZ, Web inside, cleartext HTTP both ways. CR01
    /// fires on both halves of the request/response pair.
    fn paired_system(merge: bool) -> ModelRegistry {
        let mut config = ModelConfig::new("paired");
        config.merge_responses = merge;
        let mut reg = ModelRegistry::new(config);
        reg.register_boundary(crate::model::BoundarySpec {
            common: ElementCommon::named("DMZ"),
        })
        .unwrap();
        reg.register_actor(ActorSpec {
            common: ElementCommon::named("User"),
        })
        .unwrap();
        reg.register_server(ServerSpec {
            common: ElementCommon {
                name: "Web".into(),
                in_boundary: Some("DMZ".into()),
                ..Default::default()
            },
            ..Default::default()
        })
        .unwrap();
        reg.register_flow(FlowSpec {
            name: "post comment".into(),
            source: "User".into(),
            dest: "Web".into(),
            protocol: Some("HTTP".into()),
            ..Default::default()
        })
        .unwrap();
        reg.register_flow(FlowSpec {
            name: "comment ack".into(),
            source: "Web".into(),
            dest: "User".into(),
            protocol: Some("HTTP".into()),
            response_to: Some("post comment".into()),
            ..Default::default()
        })
        .unwrap();
        reg
    }

    #[test]
    fn merge_responses_collapses_pairs() {
        let outcome = run(paired_system(true), default_rules(), &PipelineOptions::default())
            .unwrap();
        let cr01: Vec<_> = outcome
            .report
            .findings
            .iter()
            .filter(|f| f.rule_id == "CR01")
            .collect();
        assert_eq!(cr01.len(), 1);
        assert_eq!(cr01[0].target, "post comment <-> comment ack");
    }

    #[test]
    fn merge_override_wins_over_model_setting() {
        let outcome = run(
            paired_system(true),
            default_rules(),
            &PipelineOptions {
                merge_responses: Some(false),
                ..Default::default()
            },
        )
        .unwrap();
        let cr01 = outcome
            .report
            .findings
            .iter()
            .filter(|f| f.rule_id == "CR01")
            .count();
        assert_eq!(cr01, 2);
    }

    #[test]
    fn classification_violation_aborts_run() {
        let mut reg = comment_system(false);
        reg.register_data(DataSpec {
            name: "Audit Trail".into(),
            classification: Classification::Secret,
            stored_at: vec!["Database".into()],
            ..Default::default()
        })
        .unwrap();
        let err = run(reg, default_rules(), &PipelineOptions::default()).unwrap_err();
        assert!(matches!(err, TmError::ClassificationViolation { .. }));
    }

    #[test]
    fn findings_ranked_by_severity() {
        let outcome = run(
            comment_system(false),
            default_rules(),
            &PipelineOptions::default(),
        )
        .unwrap();
        let severities: Vec<_> = outcome.report.findings.iter().map(|f| f.severity).collect();
        let mut sorted = severities.clone();
        sorted.sort_by(|a, b| b.cmp(a));
        assert_eq!(severities, sorted);
    }
}
