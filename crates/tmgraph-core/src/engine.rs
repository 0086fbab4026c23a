use crate::error::{Result, TmError};
use crate::graph::ModelGraph;
use crate::rules::{RuleCtx, Subject, ThreatRule};
use crate::types::Severity;
use serde::Serialize;
use std::time::{Duration, Instant};

// ---------------------------------------------------------------------------
// Finding
// ---------------------------------------------------------------------------

/// One emitted threat instance. The skipped fields carry ordering and
/// merge keys for the aggregator; the serialized record is the external
/// contract: rule_id, severity, target, description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Finding {
    pub rule_id: String,
    pub severity: Severity,
    pub target: String,
    pub description: String,
    /// Registration ordinal of the target within its category.
    #[serde(skip)]
    pub ordinal: usize,
    /// Canonical request/response pair key (lower edge index) when the
    /// target is one half of a paired dataflow.
    #[serde(skip)]
    pub pair: Option<usize>,
}

/// Audit record for a rule excluded by an assumption. Suppressions never
/// become findings but are always reported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Suppression {
    pub rule_id: String,
    pub target: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Evaluation {
    pub findings: Vec<Finding>,
    pub suppressed: Vec<Suppression>,
}

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default)]
pub struct EvalOptions {
    /// Hard wall-clock limit on the whole evaluation pass. Exceeding it
    /// fails the run; partial results are discarded.
    pub budget: Option<Duration>,
}

// ---------------------------------------------------------------------------
// RuleEngine
// ---------------------------------------------------------------------------

/// Evaluates a rule corpus against a resolved graph. The corpus is an input,
/// not a constant: callers may pass `rules::default_rules()` or their own
/// table. Emission order is corpus order, then registration order within
/// each subject category, so repeated runs over the same graph are
/// byte-identical.
pub struct RuleEngine {
    rules: Vec<ThreatRule>,
}

impl RuleEngine {
    pub fn new(rules: Vec<ThreatRule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[ThreatRule] {
        &self.rules
    }

    pub fn evaluate(&self, graph: &ModelGraph, options: &EvalOptions) -> Result<Evaluation> {
        let started = Instant::now();
        let mut eval = Evaluation::default();

        for rule in &self.rules {
            for subject in subjects(graph) {
                if let Some(budget) = options.budget {
                    if started.elapsed() > budget {
                        return Err(TmError::RuleEvaluationTimeout {
                            budget_ms: budget.as_millis() as u64,
                        });
                    }
                }
                if !rule.applies_to(&subject) {
                    continue;
                }
                if let Some(reason) = subject.suppression_reason(rule.id) {
                    eval.suppressed.push(Suppression {
                        rule_id: rule.id.to_string(),
                        target: subject.name().to_string(),
                        reason: reason.to_string(),
                    });
                    continue;
                }
                let ctx = RuleCtx {
                    graph,
                    subject,
                };
                if (rule.condition)(&ctx) {
                    let pair = match subject {
                        Subject::Edge(edge) => graph.pair_key(edge.flow.id),
                        _ => None,
                    };
                    eval.findings.push(Finding {
                        rule_id: rule.id.to_string(),
                        severity: rule.severity,
                        target: subject.name().to_string(),
                        description: rule.render(subject.name()),
                        ordinal: subject.ordinal(),
                        pair,
                    });
                }
            }
        }
        Ok(eval)
    }
}

/// Subjects in deterministic order: nodes, then edges, then data assets,
/// each in registration order. Elements declared out of scope are skipped
/// entirely; their dataflows still participate.
fn subjects<'a>(graph: &'a ModelGraph) -> impl Iterator<Item = Subject<'a>> {
    graph
        .nodes
        .iter()
        .filter(|n| n.element.in_scope)
        .map(Subject::Node)
        .chain(graph.edges.iter().map(Subject::Edge))
        .chain(graph.data.iter().map(Subject::Data))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ActorSpec, Assumption, DatastoreSpec, ElementCommon, FlowSpec, ServerSpec};
    use crate::registry::{ModelConfig, ModelRegistry};
    use crate::rules::default_rules;
    use crate::types::Control;

    fn web_model(suppress_inp16: bool) -> ModelGraph {
        let mut reg = ModelRegistry::new(ModelConfig::new("web"));
        reg.register_actor(ActorSpec {
            common: ElementCommon::named("User"),
        })
        .unwrap();
        let assumptions = if suppress_inp16 {
            vec![Assumption::excluding("all output is templated", &["INP16"])]
        } else {
            Vec::new()
        };
        reg.register_server(ServerSpec {
            common: ElementCommon {
                name: "Web".into(),
                assumptions,
                ..Default::default()
            },
            ..Default::default()
        })
        .unwrap();
        reg.register_datastore(DatastoreSpec {
            common: ElementCommon::named("Database"),
            ..Default::default()
        })
        .unwrap();
        reg.register_flow(FlowSpec {
            name: "comments".into(),
            source: "User".into(),
            dest: "Web".into(),
            protocol: Some("HTTP".into()),
            ..Default::default()
        })
        .unwrap();
        ModelGraph::build(&reg.finalize()).unwrap()
    }

    #[test]
    fn unauthenticated_inbound_flow_fires_ac01() {
        let graph = web_model(false);
        let engine = RuleEngine::new(default_rules());
        let eval = engine.evaluate(&graph, &EvalOptions::default()).unwrap();
        assert!(eval
            .findings
            .iter()
            .any(|f| f.rule_id == "AC01" && f.target == "comments"));
    }

    #[test]
    fn suppressed_rule_never_fires_but_is_audited() {
        let graph = web_model(true);
        let engine = RuleEngine::new(default_rules());
        let eval = engine.evaluate(&graph, &EvalOptions::default()).unwrap();
        assert!(!eval
            .findings
            .iter()
            .any(|f| f.rule_id == "INP16" && f.target == "Web"));
        let audit = eval
            .suppressed
            .iter()
            .find(|s| s.rule_id == "INP16" && s.target == "Web")
            .expect("suppression must be audited");
        assert_eq!(audit.reason, "all output is templated");
    }

    #[test]
    fn unsuppressed_model_fires_inp16() {
        let graph = web_model(false);
        let engine = RuleEngine::new(default_rules());
        let eval = engine.evaluate(&graph, &EvalOptions::default()).unwrap();
        assert!(eval
            .findings
            .iter()
            .any(|f| f.rule_id == "INP16" && f.target == "Web"));
    }

    #[test]
    fn evaluation_is_idempotent() {
        let graph = web_model(false);
        let engine = RuleEngine::new(default_rules());
        let a = engine.evaluate(&graph, &EvalOptions::default()).unwrap();
        let b = engine.evaluate(&graph, &EvalOptions::default()).unwrap();
        assert_eq!(a.findings, b.findings);
        assert_eq!(a.suppressed, b.suppressed);
    }

    #[test]
    fn findings_follow_corpus_then_registration_order() {
        let graph = web_model(false);
        let engine = RuleEngine::new(default_rules());
        let eval = engine.evaluate(&graph, &EvalOptions::default()).unwrap();

        let corpus_index = |id: &str| {
            engine
                .rules()
                .iter()
                .position(|r| r.id == id)
                .expect("finding from unknown rule")
        };
        let keys: Vec<(usize, usize)> = eval
            .findings
            .iter()
            .map(|f| (corpus_index(&f.rule_id), f.ordinal))
            .collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
    }

    #[test]
    fn zero_budget_times_out() {
        let graph = web_model(false);
        let engine = RuleEngine::new(default_rules());
        let err = engine
            .evaluate(
                &graph,
                &EvalOptions {
                    budget: Some(Duration::ZERO),
                },
            )
            .unwrap_err();
        assert!(matches!(err, TmError::RuleEvaluationTimeout { .. }));
    }

    #[test]
    fn out_of_scope_element_is_skipped() {
        let mut reg = ModelRegistry::new(ModelConfig::new("web"));
        reg.register_server(ServerSpec {
            common: ElementCommon {
                name: "Legacy".into(),
                in_scope: false,
                ..Default::default()
            },
            ..Default::default()
        })
        .unwrap();
        let graph = ModelGraph::build(&reg.finalize()).unwrap();
        let eval = RuleEngine::new(default_rules())
            .evaluate(&graph, &EvalOptions::default())
            .unwrap();
        assert!(eval.findings.is_empty());
    }

    #[test]
    fn hardened_server_quiets_ha01() {
        let mut reg = ModelRegistry::new(ModelConfig::new("web"));
        reg.register_server(ServerSpec {
            common: ElementCommon {
                name: "Web".into(),
                controls: [(Control::IsHardened, true)].into_iter().collect(),
                ..Default::default()
            },
            ..Default::default()
        })
        .unwrap();
        let graph = ModelGraph::build(&reg.finalize()).unwrap();
        let eval = RuleEngine::new(default_rules())
            .evaluate(&graph, &EvalOptions::default())
            .unwrap();
        assert!(!eval.findings.iter().any(|f| f.rule_id == "HA01"));
    }
}
