use crate::graph::{Edge, ModelGraph, Node, ResolvedData};
use crate::types::{Classification, Control, ElementKind, Severity};

// ---------------------------------------------------------------------------
// Rule target
// ---------------------------------------------------------------------------

/// What a rule is evaluated against: elements of the listed kinds, every
/// dataflow, or every data asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleTarget {
    Elements(&'static [ElementKind]),
    Flows,
    Data,
}

impl RuleTarget {
    pub fn label(self) -> String {
        match self {
            RuleTarget::Elements(kinds) => kinds
                .iter()
                .map(|k| k.as_str())
                .collect::<Vec<_>>()
                .join("|"),
            RuleTarget::Flows => "dataflow".to_string(),
            RuleTarget::Data => "data".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Evaluation context
// ---------------------------------------------------------------------------

#[derive(Clone, Copy)]
pub enum Subject<'a> {
    Node(&'a Node),
    Edge(&'a Edge),
    Data(&'a ResolvedData),
}

impl<'a> Subject<'a> {
    pub fn name(&self) -> &'a str {
        match self {
            Subject::Node(n) => &n.element.name,
            Subject::Edge(e) => &e.flow.name,
            Subject::Data(d) => &d.asset.name,
        }
    }

    /// Registration ordinal of the subject within its category.
    pub fn ordinal(&self) -> usize {
        match self {
            Subject::Node(n) => n.element.id,
            Subject::Edge(e) => e.flow.id,
            Subject::Data(d) => d.asset.id,
        }
    }

    pub fn suppression_reason(&self, rule_id: &str) -> Option<&'a str> {
        match self {
            Subject::Node(n) => n.element.suppression_reason(rule_id),
            Subject::Edge(e) => e.flow.suppression_reason(rule_id),
            Subject::Data(d) => d.asset.suppression_reason(rule_id),
        }
    }
}

/// One subject plus the graph it lives in. Predicates are pure functions of
/// this context; no rule can observe another rule's result.
#[derive(Clone, Copy)]
pub struct RuleCtx<'a> {
    pub graph: &'a ModelGraph,
    pub subject: Subject<'a>,
}

impl<'a> RuleCtx<'a> {
    pub fn node(&self) -> Option<&'a Node> {
        match self.subject {
            Subject::Node(n) => Some(n),
            _ => None,
        }
    }

    pub fn edge(&self) -> Option<&'a Edge> {
        match self.subject {
            Subject::Edge(e) => Some(e),
            _ => None,
        }
    }

    pub fn data(&self) -> Option<&'a ResolvedData> {
        match self.subject {
            Subject::Data(d) => Some(d),
            _ => None,
        }
    }

    pub fn source(&self) -> Option<&'a Node> {
        self.edge().map(|e| &self.graph.nodes[e.source])
    }

    pub fn dest(&self) -> Option<&'a Node> {
        self.edge().map(|e| &self.graph.nodes[e.dest])
    }
}

// ---------------------------------------------------------------------------
// ThreatRule
// ---------------------------------------------------------------------------

/// A fn-pointer rule, zero-cost and with no heap allocation. `description` may
/// contain `{target}`, replaced with the subject name when a finding is
/// emitted.
pub struct ThreatRule {
    pub id: &'static str,
    pub target: RuleTarget,
    pub severity: Severity,
    pub description: &'static str,
    pub condition: fn(&RuleCtx) -> bool,
}

impl ThreatRule {
    pub fn applies_to(&self, subject: &Subject) -> bool {
        match (self.target, subject) {
            (RuleTarget::Elements(kinds), Subject::Node(n)) => kinds.contains(&n.element.kind),
            (RuleTarget::Flows, Subject::Edge(_)) => true,
            (RuleTarget::Data, Subject::Data(_)) => true,
            _ => false,
        }
    }

    pub fn render(&self, target_name: &str) -> String {
        self.description.replace("{target}", target_name)
    }
}

// ---------------------------------------------------------------------------
// Helper macro for concise rule definitions
// ---------------------------------------------------------------------------

macro_rules! rule {
    (
        id: $id:expr,
        target: $target:expr,
        severity: $sev:expr,
        description: $desc:expr,
        condition: $cond:expr
    ) => {
        ThreatRule {
            id: $id,
            target: $target,
            severity: $sev,
            description: $desc,
            condition: $cond,
        }
    };
}

// ---------------------------------------------------------------------------
// Condition helpers
// ---------------------------------------------------------------------------

const COMPUTE: &[ElementKind] = &[
    ElementKind::Server,
    ElementKind::Process,
    ElementKind::Lambda,
];

const ENCRYPTED_PROTOCOLS: &[&str] = &[
    "https", "wss", "ssh", "sftp", "tls", "mtls", "wireguard", "quic",
];

fn lacks(ctx: &RuleCtx, c: Control) -> bool {
    ctx.node().map(|n| !n.element.control(c)).unwrap_or(false)
}

fn dest_lacks(ctx: &RuleCtx, c: Control) -> bool {
    ctx.dest().map(|n| !n.element.control(c)).unwrap_or(false)
}

fn source_lacks(ctx: &RuleCtx, c: Control) -> bool {
    ctx.source().map(|n| !n.element.control(c)).unwrap_or(false)
}

fn dest_is_compute(ctx: &RuleCtx) -> bool {
    ctx.dest().map(|n| n.element.kind.is_compute()).unwrap_or(false)
}

fn crosses_boundary(ctx: &RuleCtx) -> bool {
    ctx.edge()
        .map(|e| ctx.graph.crosses_boundary(e))
        .unwrap_or(false)
}

/// A declared protocol outside the known-encrypted set. Flows with no
/// protocol at all (internal hops) are not flagged.
fn cleartext_protocol(protocol: Option<&str>) -> bool {
    match protocol {
        None => false,
        Some(p) => {
            let p = p.to_ascii_lowercase();
            !ENCRYPTED_PROTOCOLS.iter().any(|e| p.contains(e))
        }
    }
}

fn edge_cleartext(ctx: &RuleCtx) -> bool {
    ctx.edge()
        .map(|e| cleartext_protocol(e.flow.protocol.as_deref()))
        .unwrap_or(false)
}

fn store_profile<'a>(ctx: &RuleCtx<'a>) -> Option<&'a crate::model::StoreProfile> {
    ctx.node().and_then(|n| n.element.store.as_ref())
}

// ---------------------------------------------------------------------------
// Default corpus (versioned; order is the emission order of findings)
// ---------------------------------------------------------------------------

pub const CORPUS_VERSION: &str = "2026.1";

pub fn default_rules() -> Vec<ThreatRule> {
    vec![
        rule! {
            id: "AC01",
            target: RuleTarget::Flows,
            severity: Severity::High,
            description: "Inbound dataflow '{target}' reaches a service that does not authorize its source",
            condition: |ctx| {
                dest_is_compute(ctx)
                    && dest_lacks(ctx, Control::AuthorizesSource)
                    && ctx
                        .source()
                        .map(|n| {
                            matches!(
                                n.element.kind,
                                ElementKind::Actor | ElementKind::ExternalEntity
                            )
                        })
                        .unwrap_or(false)
            }
        },
        rule! {
            id: "AC02",
            target: RuleTarget::Elements(&[ElementKind::Datastore]),
            severity: Severity::High,
            description: "Datastore '{target}' has no access control",
            condition: |ctx| lacks(ctx, Control::HasAccessControl)
        },
        rule! {
            id: "AC03",
            target: RuleTarget::Elements(&[ElementKind::Actor]),
            severity: Severity::Medium,
            description: "Actor '{target}' writes directly to a datastore, bypassing any mediating service",
            condition: |ctx| {
                ctx.node()
                    .map(|n| {
                        ctx.graph
                            .edges_from(n.element.id)
                            .any(|e| ctx.graph.nodes[e.dest].element.kind == ElementKind::Datastore)
                    })
                    .unwrap_or(false)
            }
        },
        rule! {
            id: "AA01",
            target: RuleTarget::Flows,
            severity: Severity::Medium,
            description: "Dataflow '{target}' crosses a trust boundary without authenticating its source",
            condition: |ctx| {
                crosses_boundary(ctx)
                    && dest_is_compute(ctx)
                    && dest_lacks(ctx, Control::AuthenticatesSource)
            }
        },
        rule! {
            id: "AA02",
            target: RuleTarget::Flows,
            severity: Severity::Medium,
            description: "Dataflow '{target}' sends to an external service whose identity is never authenticated",
            condition: |ctx| {
                ctx.dest()
                    .map(|n| n.element.kind == ElementKind::ExternalEntity)
                    .unwrap_or(false)
                    && source_lacks(ctx, Control::AuthenticatesDestination)
            }
        },
        rule! {
            id: "CR01",
            target: RuleTarget::Flows,
            severity: Severity::High,
            description: "Dataflow '{target}' crosses a trust boundary over a cleartext protocol",
            condition: |ctx| crosses_boundary(ctx) && edge_cleartext(ctx)
        },
        rule! {
            id: "CR02",
            target: RuleTarget::Elements(&[ElementKind::Datastore]),
            severity: Severity::High,
            description: "Datastore '{target}' holds secret material without encryption at rest",
            condition: |ctx| {
                lacks(ctx, Control::IsEncrypted)
                    && store_profile(ctx)
                        .map(|s| {
                            s.stores_credentials
                                || s.max_classification >= Classification::Secret
                        })
                        .unwrap_or(false)
            }
        },
        rule! {
            id: "CR03",
            target: RuleTarget::Data,
            severity: Severity::VeryHigh,
            description: "Credential data '{target}' rests in a datastore without encryption at rest",
            condition: |ctx| {
                ctx.data()
                    .map(|d| {
                        d.asset.is_credentials
                            && d.stored_at.iter().any(|&idx| {
                                !ctx.graph.nodes[idx].element.control(Control::IsEncrypted)
                            })
                    })
                    .unwrap_or(false)
            }
        },
        rule! {
            id: "DF01",
            target: RuleTarget::Data,
            severity: Severity::High,
            description: "Sensitive data '{target}' traverses a cleartext dataflow",
            condition: |ctx| {
                ctx.data()
                    .map(|d| {
                        d.asset.classification >= Classification::Secret
                            && d.traverses.iter().any(|&idx| {
                                cleartext_protocol(
                                    ctx.graph.edges[idx].flow.protocol.as_deref(),
                                )
                            })
                    })
                    .unwrap_or(false)
            }
        },
        rule! {
            id: "DF02",
            target: RuleTarget::Data,
            severity: Severity::Medium,
            description: "PII '{target}' is stored outside any trust boundary",
            condition: |ctx| {
                ctx.data()
                    .map(|d| {
                        d.asset.is_pii
                            && d.stored_at
                                .iter()
                                .any(|&idx| ctx.graph.nodes[idx].parent.is_none())
                    })
                    .unwrap_or(false)
            }
        },
        rule! {
            id: "INP01",
            target: RuleTarget::Elements(&[ElementKind::Server, ElementKind::Process]),
            severity: Severity::Medium,
            description: "'{target}' accepts input without sanitization or validation",
            condition: |ctx| {
                lacks(ctx, Control::SanitizesInput) && lacks(ctx, Control::ValidatesInput)
            }
        },
        rule! {
            id: "INP16",
            target: RuleTarget::Elements(&[ElementKind::Server]),
            severity: Severity::Medium,
            description: "'{target}' does not encode output before returning it to clients",
            condition: |ctx| lacks(ctx, Control::EncodesOutput)
        },
        rule! {
            id: "HA01",
            target: RuleTarget::Elements(COMPUTE),
            severity: Severity::Low,
            description: "'{target}' runs without hardening",
            condition: |ctx| lacks(ctx, Control::IsHardened)
        },
        rule! {
            id: "DS01",
            target: RuleTarget::Elements(&[ElementKind::Datastore]),
            severity: Severity::High,
            description: "Datastore '{target}' holds PII without access control",
            condition: |ctx| {
                store_profile(ctx).map(|s| s.stores_pii).unwrap_or(false)
                    && lacks(ctx, Control::HasAccessControl)
            }
        },
        rule! {
            id: "BD01",
            target: RuleTarget::Elements(&[ElementKind::Boundary]),
            severity: Severity::VeryLow,
            description: "Trust boundary '{target}' contains no elements",
            condition: |ctx| {
                ctx.node()
                    .map(|n| ctx.graph.members_of(n.element.id).next().is_none())
                    .unwrap_or(false)
            }
        },
    ]
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn rule_ids_are_unique() {
        let rules = default_rules();
        let ids: HashSet<&str> = rules.iter().map(|r| r.id).collect();
        assert_eq!(ids.len(), rules.len());
    }

    #[test]
    fn corpus_contains_known_rules() {
        let rules = default_rules();
        for id in ["AC01", "INP16", "CR03", "BD01"] {
            assert!(rules.iter().any(|r| r.id == id), "missing {id}");
        }
    }

    #[test]
    fn render_substitutes_target() {
        let rules = default_rules();
        let inp16 = rules.iter().find(|r| r.id == "INP16").unwrap();
        let msg = inp16.render("Web");
        assert!(msg.contains("'Web'"));
        assert!(!msg.contains("{target}"));
    }

    #[test]
    fn cleartext_protocol_classification() {
        assert!(cleartext_protocol(Some("HTTP")));
        assert!(cleartext_protocol(Some("json-rpc")));
        assert!(!cleartext_protocol(Some("HTTPS")));
        assert!(!cleartext_protocol(Some("HTTPS/WSS")));
        assert!(!cleartext_protocol(None));
    }

    #[test]
    fn target_labels() {
        assert_eq!(RuleTarget::Flows.label(), "dataflow");
        assert_eq!(
            RuleTarget::Elements(&[ElementKind::Server, ElementKind::Process]).label(),
            "server|process"
        );
    }
}
