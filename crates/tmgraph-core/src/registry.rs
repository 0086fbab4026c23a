use crate::error::{Result, TmError};
use crate::model::{
    ActorSpec, BoundarySpec, DataAsset, DataSpec, DatastoreSpec, Element, ElementCommon,
    ExternalEntitySpec, Flow, FlowSpec, LambdaSpec, ProcessSpec, ServerSpec, StoreProfile,
};
use crate::types::ElementKind;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// Name validation
// ---------------------------------------------------------------------------

static NAME_RE: OnceLock<Regex> = OnceLock::new();

fn name_re() -> &'static Regex {
    // Names may carry spaces and light punctuation ("Mobile Apps (iOS/Android)")
    // but must not start with whitespace or punctuation.
    NAME_RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9 ()/&.,:_'-]*$").unwrap())
}

pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() || name.len() > 128 || !name_re().is_match(name) {
        return Err(TmError::InvalidName(name.to_string()));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// ModelConfig
// ---------------------------------------------------------------------------

/// Model-level settings recognized by the pipeline. `assumptions` here is
/// process-wide documentation with no behavioral effect, unlike per-element
/// assumptions which can suppress rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Preserve declaration order in diagram output.
    #[serde(default = "default_true")]
    pub is_ordered: bool,
    /// Collapse same-rule findings on a request/response pair into one.
    #[serde(default)]
    pub merge_responses: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub assumptions: Vec<String>,
}

fn default_true() -> bool {
    true
}

impl ModelConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            is_ordered: true,
            merge_responses: false,
            assumptions: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// ModelRegistry
// ---------------------------------------------------------------------------

/// Collects declarations for one threat-model session. Every constructor is
/// handed the registry explicitly; there is no ambient global model. IDs are
/// ordinals in registration order, which fixes all downstream iteration
/// order.
#[derive(Debug)]
pub struct ModelRegistry {
    config: ModelConfig,
    elements: Vec<Element>,
    flows: Vec<Flow>,
    data: Vec<DataAsset>,
    element_names: HashSet<String>,
    flow_names: HashSet<String>,
    data_names: HashSet<String>,
}

impl ModelRegistry {
    pub fn new(config: ModelConfig) -> Self {
        Self {
            config,
            elements: Vec::new(),
            flows: Vec::new(),
            data: Vec::new(),
            element_names: HashSet::new(),
            flow_names: HashSet::new(),
            data_names: HashSet::new(),
        }
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    fn push_element(
        &mut self,
        kind: ElementKind,
        common: ElementCommon,
        os: Option<String>,
        protocol: Option<String>,
        port: Option<u16>,
        store: Option<StoreProfile>,
    ) -> Result<usize> {
        validate_name(&common.name)?;
        if !self.element_names.insert(common.name.clone()) {
            return Err(TmError::DuplicateName(common.name));
        }
        let id = self.elements.len();
        self.elements.push(Element {
            id,
            kind,
            name: common.name,
            description: common.description,
            in_boundary: common.in_boundary,
            controls: common.controls,
            in_scope: common.in_scope,
            levels: common.levels,
            assumptions: common.assumptions,
            os,
            protocol,
            port,
            store,
        });
        Ok(id)
    }

    pub fn register_actor(&mut self, spec: ActorSpec) -> Result<usize> {
        self.push_element(ElementKind::Actor, spec.common, None, None, None, None)
    }

    pub fn register_external_entity(&mut self, spec: ExternalEntitySpec) -> Result<usize> {
        self.push_element(
            ElementKind::ExternalEntity,
            spec.common,
            None,
            spec.protocol,
            spec.port,
            None,
        )
    }

    pub fn register_boundary(&mut self, spec: BoundarySpec) -> Result<usize> {
        self.push_element(ElementKind::Boundary, spec.common, None, None, None, None)
    }

    pub fn register_server(&mut self, spec: ServerSpec) -> Result<usize> {
        self.push_element(
            ElementKind::Server,
            spec.common,
            spec.os,
            spec.protocol,
            spec.port,
            None,
        )
    }

    pub fn register_process(&mut self, spec: ProcessSpec) -> Result<usize> {
        self.push_element(ElementKind::Process, spec.common, spec.os, None, None, None)
    }

    pub fn register_lambda(&mut self, spec: LambdaSpec) -> Result<usize> {
        self.push_element(ElementKind::Lambda, spec.common, None, None, None, None)
    }

    pub fn register_datastore(&mut self, spec: DatastoreSpec) -> Result<usize> {
        let store = StoreProfile {
            store_kind: spec.store_kind,
            max_classification: spec.max_classification,
            stores_pii: spec.stores_pii,
            stores_credentials: spec.stores_credentials,
        };
        self.push_element(
            ElementKind::Datastore,
            spec.common,
            None,
            None,
            None,
            Some(store),
        )
    }

    pub fn register_flow(&mut self, spec: FlowSpec) -> Result<usize> {
        validate_name(&spec.name)?;
        if !self.flow_names.insert(spec.name.clone()) {
            return Err(TmError::DuplicateName(spec.name));
        }
        let id = self.flows.len();
        self.flows.push(Flow {
            id,
            name: spec.name,
            source: spec.source,
            dest: spec.dest,
            note: spec.note,
            protocol: spec.protocol,
            dst_port: spec.dst_port,
            data: spec.data,
            response_to: spec.response_to,
            max_classification: spec.max_classification,
            controls: spec.controls,
            assumptions: spec.assumptions,
        });
        Ok(id)
    }

    pub fn register_data(&mut self, spec: DataSpec) -> Result<usize> {
        validate_name(&spec.name)?;
        if !self.data_names.insert(spec.name.clone()) {
            return Err(TmError::DuplicateName(spec.name));
        }
        let id = self.data.len();
        self.data.push(DataAsset {
            id,
            name: spec.name,
            description: spec.description,
            classification: spec.classification,
            created_at: spec.created_at,
            transformed_at: spec.transformed_at,
            stored_at: spec.stored_at,
            traverses: spec.traverses,
            is_pii: spec.is_pii,
            is_credentials: spec.is_credentials,
            assumptions: spec.assumptions,
        });
        Ok(id)
    }

    pub fn element_count(&self) -> usize {
        self.elements.len()
    }

    pub fn flow_count(&self) -> usize {
        self.flows.len()
    }

    pub fn data_count(&self) -> usize {
        self.data.len()
    }

    /// Lock the registry. Consuming `self` makes post-finalize mutation
    /// unrepresentable; the snapshot is what the graph builder consumes.
    pub fn finalize(self) -> ModelSnapshot {
        ModelSnapshot {
            config: self.config,
            elements: self.elements,
            flows: self.flows,
            data: self.data,
        }
    }
}

// ---------------------------------------------------------------------------
// ModelSnapshot
// ---------------------------------------------------------------------------

/// Immutable snapshot of a finalized registry.
#[derive(Debug, Clone, Serialize)]
pub struct ModelSnapshot {
    pub config: ModelConfig,
    pub elements: Vec<Element>,
    pub flows: Vec<Flow>,
    pub data: Vec<DataAsset>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ElementCommon;

    fn registry() -> ModelRegistry {
        ModelRegistry::new(ModelConfig::new("test-model"))
    }

    #[test]
    fn ordinals_follow_registration_order() {
        let mut reg = registry();
        let a = reg
            .register_actor(ActorSpec {
                common: ElementCommon::named("User"),
            })
            .unwrap();
        let b = reg
            .register_server(ServerSpec {
                common: ElementCommon::named("Web"),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(a, 0);
        assert_eq!(b, 1);
        let snap = reg.finalize();
        assert_eq!(snap.elements[0].name, "User");
        assert_eq!(snap.elements[1].name, "Web");
    }

    #[test]
    fn duplicate_element_name_rejected() {
        let mut reg = registry();
        reg.register_actor(ActorSpec {
            common: ElementCommon::named("User"),
        })
        .unwrap();
        let err = reg
            .register_server(ServerSpec {
                common: ElementCommon::named("User"),
                ..Default::default()
            })
            .unwrap_err();
        assert!(matches!(err, TmError::DuplicateName(name) if name == "User"));
    }

    #[test]
    fn duplicate_flow_name_rejected() {
        let mut reg = registry();
        let spec = FlowSpec {
            name: "login".into(),
            source: "User".into(),
            dest: "Web".into(),
            ..Default::default()
        };
        reg.register_flow(spec.clone()).unwrap();
        assert!(matches!(
            reg.register_flow(spec),
            Err(TmError::DuplicateName(_))
        ));
    }

    #[test]
    fn flow_name_may_shadow_element_name() {
        // Dataflows and elements live in separate namespaces, matching how
        // model scripts reuse short labels.
        let mut reg = registry();
        reg.register_actor(ActorSpec {
            common: ElementCommon::named("User"),
        })
        .unwrap();
        assert!(reg
            .register_flow(FlowSpec {
                name: "User".into(),
                source: "User".into(),
                dest: "User".into(),
                ..Default::default()
            })
            .is_ok());
    }

    #[test]
    fn invalid_names_rejected() {
        let mut reg = registry();
        for bad in ["", " leading space", "tab\tname", "-dash-first"] {
            let err = reg
                .register_actor(ActorSpec {
                    common: ElementCommon::named(bad),
                })
                .unwrap_err();
            assert!(matches!(err, TmError::InvalidName(_)), "{bad:?}");
        }
    }

    #[test]
    fn punctuated_names_accepted() {
        let mut reg = registry();
        for good in [
            "Mobile Apps (iOS/Android)",
            "Anthropic Claude API",
            "user's browser",
        ] {
            reg.register_actor(ActorSpec {
                common: ElementCommon::named(good),
            })
            .unwrap();
        }
    }
}
