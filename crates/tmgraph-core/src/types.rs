use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// Ordered data sensitivity ladder. The ordering is load-bearing: a
/// datastore's `max_classification` is a ceiling checked against every data
/// asset stored in it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    Public,
    Restricted,
    Sensitive,
    Secret,
    TopSecret,
}

impl Classification {
    pub fn all() -> &'static [Classification] {
        &[
            Classification::Public,
            Classification::Restricted,
            Classification::Sensitive,
            Classification::Secret,
            Classification::TopSecret,
        ]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Classification::Public => "public",
            Classification::Restricted => "restricted",
            Classification::Sensitive => "sensitive",
            Classification::Secret => "secret",
            Classification::TopSecret => "top_secret",
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Classification {
    type Err = crate::error::TmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "public" => Ok(Classification::Public),
            "restricted" => Ok(Classification::Restricted),
            "sensitive" => Ok(Classification::Sensitive),
            "secret" => Ok(Classification::Secret),
            "top_secret" => Ok(Classification::TopSecret),
            _ => Err(crate::error::TmError::InvalidClassification(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Severity
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    VeryLow,
    Low,
    Medium,
    High,
    VeryHigh,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::VeryLow => "very_low",
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::VeryHigh => "very_high",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Severity {
    type Err = crate::error::TmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "very_low" => Ok(Severity::VeryLow),
            "low" => Ok(Severity::Low),
            "medium" => Ok(Severity::Medium),
            "high" => Ok(Severity::High),
            "very_high" => Ok(Severity::VeryHigh),
            _ => Err(crate::error::TmError::InvalidSeverity(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// ElementKind
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementKind {
    Actor,
    ExternalEntity,
    Boundary,
    Server,
    Process,
    Lambda,
    Datastore,
}

impl ElementKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ElementKind::Actor => "actor",
            ElementKind::ExternalEntity => "external_entity",
            ElementKind::Boundary => "boundary",
            ElementKind::Server => "server",
            ElementKind::Process => "process",
            ElementKind::Lambda => "lambda",
            ElementKind::Datastore => "datastore",
        }
    }

    /// Compute kinds: elements that run code and receive dataflows.
    pub fn is_compute(self) -> bool {
        matches!(
            self,
            ElementKind::Server | ElementKind::Process | ElementKind::Lambda
        )
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ElementKind {
    type Err = crate::error::TmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "actor" => Ok(ElementKind::Actor),
            "external_entity" => Ok(ElementKind::ExternalEntity),
            "boundary" => Ok(ElementKind::Boundary),
            "server" => Ok(ElementKind::Server),
            "process" => Ok(ElementKind::Process),
            "lambda" => Ok(ElementKind::Lambda),
            "datastore" => Ok(ElementKind::Datastore),
            _ => Err(crate::error::TmError::InvalidKind(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// StoreKind
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreKind {
    #[default]
    Unknown,
    FileSystem,
    Sql,
    Nosql,
    Ldap,
    ObjectStore,
}

impl StoreKind {
    pub fn as_str(self) -> &'static str {
        match self {
            StoreKind::Unknown => "unknown",
            StoreKind::FileSystem => "file_system",
            StoreKind::Sql => "sql",
            StoreKind::Nosql => "nosql",
            StoreKind::Ldap => "ldap",
            StoreKind::ObjectStore => "object_store",
        }
    }
}

impl fmt::Display for StoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Control
// ---------------------------------------------------------------------------

/// Closed vocabulary of control flags the rule corpus understands. Keeping
/// this an enum means a typo in a model manifest fails at parse time instead
/// of silently evaluating to false.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Control {
    IsHardened,
    SanitizesInput,
    ValidatesInput,
    EncodesOutput,
    AuthorizesSource,
    AuthenticatesSource,
    AuthenticatesDestination,
    HasAccessControl,
    IsEncrypted,
}

impl Control {
    pub fn all() -> &'static [Control] {
        &[
            Control::IsHardened,
            Control::SanitizesInput,
            Control::ValidatesInput,
            Control::EncodesOutput,
            Control::AuthorizesSource,
            Control::AuthenticatesSource,
            Control::AuthenticatesDestination,
            Control::HasAccessControl,
            Control::IsEncrypted,
        ]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Control::IsHardened => "is_hardened",
            Control::SanitizesInput => "sanitizes_input",
            Control::ValidatesInput => "validates_input",
            Control::EncodesOutput => "encodes_output",
            Control::AuthorizesSource => "authorizes_source",
            Control::AuthenticatesSource => "authenticates_source",
            Control::AuthenticatesDestination => "authenticates_destination",
            Control::HasAccessControl => "has_access_control",
            Control::IsEncrypted => "is_encrypted",
        }
    }
}

impl fmt::Display for Control {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Control {
    type Err = crate::error::TmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Control::all()
            .iter()
            .find(|c| c.as_str() == s)
            .copied()
            .ok_or_else(|| crate::error::TmError::InvalidControl(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// RunStage
// ---------------------------------------------------------------------------

/// Stages of a single threat-model run. Terminal on `Exported` or on the
/// first error; a failed run emits nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStage {
    Building,
    Finalized,
    GraphResolved,
    RulesEvaluated,
    Aggregated,
    Exported,
}

impl RunStage {
    pub fn all() -> &'static [RunStage] {
        &[
            RunStage::Building,
            RunStage::Finalized,
            RunStage::GraphResolved,
            RunStage::RulesEvaluated,
            RunStage::Aggregated,
            RunStage::Exported,
        ]
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn next(self) -> Option<RunStage> {
        let all = RunStage::all();
        all.get(self.index() + 1).copied()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RunStage::Building => "building",
            RunStage::Finalized => "finalized",
            RunStage::GraphResolved => "graph_resolved",
            RunStage::RulesEvaluated => "rules_evaluated",
            RunStage::Aggregated => "aggregated",
            RunStage::Exported => "exported",
        }
    }
}

impl fmt::Display for RunStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RunStage {
    type Err = crate::error::TmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RunStage::all()
            .iter()
            .find(|p| p.as_str() == s)
            .copied()
            .ok_or_else(|| crate::error::TmError::InvalidStage(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn classification_ordering() {
        assert!(Classification::Public < Classification::Restricted);
        assert!(Classification::Secret < Classification::TopSecret);
        assert!(Classification::TopSecret > Classification::Public);
    }

    #[test]
    fn classification_roundtrip() {
        for c in Classification::all() {
            assert_eq!(Classification::from_str(c.as_str()).unwrap(), *c);
        }
    }

    #[test]
    fn severity_ordering() {
        assert!(Severity::VeryLow < Severity::Low);
        assert!(Severity::High < Severity::VeryHigh);
    }

    #[test]
    fn compute_kinds() {
        assert!(ElementKind::Server.is_compute());
        assert!(ElementKind::Lambda.is_compute());
        assert!(!ElementKind::Actor.is_compute());
        assert!(!ElementKind::Datastore.is_compute());
    }

    #[test]
    fn control_roundtrip() {
        for c in Control::all() {
            assert_eq!(Control::from_str(c.as_str()).unwrap(), *c);
        }
        assert!(Control::from_str("is_hardend").is_err());
    }

    #[test]
    fn run_stage_sequence() {
        assert_eq!(RunStage::Building.next(), Some(RunStage::Finalized));
        assert_eq!(RunStage::Aggregated.next(), Some(RunStage::Exported));
        assert_eq!(RunStage::Exported.next(), None);
    }
}
