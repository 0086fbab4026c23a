use crate::types::{Classification, Control, ElementKind, StoreKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ---------------------------------------------------------------------------
// Assumption
// ---------------------------------------------------------------------------

/// A documented modeling assumption attached to an element, dataflow, or
/// data asset. When `excludes` names rule IDs, matching rules are suppressed
/// for that subject and recorded in the run's audit list instead of firing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Assumption {
    pub text: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub excludes: Vec<String>,
}

impl Assumption {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            excludes: Vec::new(),
        }
    }

    pub fn excluding(text: impl Into<String>, rule_ids: &[&str]) -> Self {
        Self {
            text: text.into(),
            excludes: rule_ids.iter().map(|s| s.to_string()).collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// ElementCommon
// ---------------------------------------------------------------------------

/// Fields shared by every element kind. Declared up front with defaults so a
/// spec is complete at construction; nothing is patched in afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElementCommon {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Name of the trust boundary this element sits in, if any. Resolved by
    /// the graph builder, not at declaration time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_boundary: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub controls: BTreeMap<Control, bool>,
    #[serde(default = "default_true")]
    pub in_scope: bool,
    /// Diagram detail levels this element appears at. Empty = all levels.
    /// Consumed by the exporter only.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub levels: Vec<u8>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub assumptions: Vec<Assumption>,
}

fn default_true() -> bool {
    true
}

impl Default for ElementCommon {
    fn default() -> Self {
        Self {
            name: String::new(),
            description: None,
            in_boundary: None,
            controls: BTreeMap::new(),
            in_scope: true,
            levels: Vec::new(),
            assumptions: Vec::new(),
        }
    }
}

impl ElementCommon {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

// ---------------------------------------------------------------------------
// Element specs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActorSpec {
    #[serde(flatten)]
    pub common: ElementCommon,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExternalEntitySpec {
    #[serde(flatten)]
    pub common: ElementCommon,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BoundarySpec {
    #[serde(flatten)]
    pub common: ElementCommon,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerSpec {
    #[serde(flatten)]
    pub common: ElementCommon,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProcessSpec {
    #[serde(flatten)]
    pub common: ElementCommon,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LambdaSpec {
    #[serde(flatten)]
    pub common: ElementCommon,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatastoreSpec {
    #[serde(flatten)]
    pub common: ElementCommon,
    #[serde(default)]
    pub store_kind: StoreKind,
    /// Ceiling on the classification of data this store may hold. Defaults
    /// to `top_secret`, i.e. unconstrained until the modeler says otherwise.
    #[serde(default = "default_ceiling")]
    pub max_classification: Classification,
    #[serde(default)]
    pub stores_pii: bool,
    #[serde(default)]
    pub stores_credentials: bool,
}

fn default_ceiling() -> Classification {
    Classification::TopSecret
}

impl Default for DatastoreSpec {
    fn default() -> Self {
        Self {
            common: ElementCommon::default(),
            store_kind: StoreKind::Unknown,
            max_classification: Classification::TopSecret,
            stores_pii: false,
            stores_credentials: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Element (registered form)
// ---------------------------------------------------------------------------

/// Profile fields only datastores carry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreProfile {
    pub store_kind: StoreKind,
    pub max_classification: Classification,
    pub stores_pii: bool,
    pub stores_credentials: bool,
}

/// An element as held by the registry: the declared fields plus the ordinal ID
/// assigned at registration. IDs are registration order, so iteration over
/// the element list is deterministic across runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Element {
    pub id: usize,
    pub kind: ElementKind,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_boundary: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub controls: BTreeMap<Control, bool>,
    pub in_scope: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub levels: Vec<u8>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub assumptions: Vec<Assumption>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store: Option<StoreProfile>,
}

impl Element {
    /// A missing control evaluates to false, an explicitly declared one to
    /// its declared value.
    pub fn control(&self, c: Control) -> bool {
        self.controls.get(&c).copied().unwrap_or(false)
    }

    pub fn suppression_reason(&self, rule_id: &str) -> Option<&str> {
        self.assumptions
            .iter()
            .find(|a| a.excludes.iter().any(|r| r == rule_id))
            .map(|a| a.text.as_str())
    }
}

// ---------------------------------------------------------------------------
// Dataflow
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FlowSpec {
    pub name: String,
    pub source: String,
    pub dest: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dst_port: Option<u16>,
    /// Names of data assets carried on this flow.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub data: Vec<String>,
    /// Name of the request flow this one answers. The graph builder verifies
    /// source and destination are swapped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_classification: Option<Classification>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub controls: BTreeMap<Control, bool>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub assumptions: Vec<Assumption>,
}

/// A registered dataflow. References are still by name; the graph builder
/// resolves them to node and edge indices.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Flow {
    pub id: usize,
    pub name: String,
    pub source: String,
    pub dest: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dst_port: Option<u16>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub data: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_classification: Option<Classification>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub controls: BTreeMap<Control, bool>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub assumptions: Vec<Assumption>,
}

impl Flow {
    pub fn control(&self, c: Control) -> bool {
        self.controls.get(&c).copied().unwrap_or(false)
    }

    pub fn suppression_reason(&self, rule_id: &str) -> Option<&str> {
        self.assumptions
            .iter()
            .find(|a| a.excludes.iter().any(|r| r == rule_id))
            .map(|a| a.text.as_str())
    }
}

// ---------------------------------------------------------------------------
// Data
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataSpec {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default = "default_classification")]
    pub classification: Classification,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub created_at: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub transformed_at: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stored_at: Vec<String>,
    /// Ordered dataflow names this data passes through. Must form a
    /// contiguous path; verified by the graph builder.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub traverses: Vec<String>,
    #[serde(default)]
    pub is_pii: bool,
    #[serde(default)]
    pub is_credentials: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub assumptions: Vec<Assumption>,
}

fn default_classification() -> Classification {
    Classification::Public
}

impl Default for DataSpec {
    fn default() -> Self {
        Self {
            name: String::new(),
            description: None,
            classification: Classification::Public,
            created_at: Vec::new(),
            transformed_at: Vec::new(),
            stored_at: Vec::new(),
            traverses: Vec::new(),
            is_pii: false,
            is_credentials: false,
            assumptions: Vec::new(),
        }
    }
}

/// A registered data asset with its ordinal ID.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataAsset {
    pub id: usize,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub classification: Classification,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub created_at: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub transformed_at: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stored_at: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub traverses: Vec<String>,
    pub is_pii: bool,
    pub is_credentials: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub assumptions: Vec<Assumption>,
}

impl DataAsset {
    pub fn suppression_reason(&self, rule_id: &str) -> Option<&str> {
        self.assumptions
            .iter()
            .find(|a| a.excludes.iter().any(|r| r == rule_id))
            .map(|a| a.text.as_str())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
