use crate::types::Classification;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TmError {
    #[error("duplicate name: '{0}' is already registered in this model")]
    DuplicateName(String),

    #[error("invalid name '{0}': must start with a letter or digit and contain only printable characters")]
    InvalidName(String),

    #[error("boundary cycle detected at '{0}'")]
    CyclicBoundary(String),

    #[error("unresolved reference: '{element}' refers to unknown '{reference}'")]
    UnresolvedReference { element: String, reference: String },

    #[error("data '{data}' cannot be stored at '{element}': not a datastore")]
    NotADatastore { data: String, element: String },

    #[error("'{element}' is placed in '{reference}', which is not a boundary")]
    NotABoundary { element: String, reference: String },

    #[error("asymmetric response: '{response}' does not mirror source and destination of '{request}'")]
    AsymmetricResponse { request: String, response: String },

    #[error("duplicate response: '{response}' answers '{request}', which is already paired")]
    DuplicateResponse { request: String, response: String },

    #[error("classification violation: data '{data}' ({classification}) exceeds the {ceiling} ceiling of datastore '{datastore}'")]
    ClassificationViolation {
        data: String,
        datastore: String,
        classification: Classification,
        ceiling: Classification,
    },

    #[error("classification violation: data '{data}' ({classification}) exceeds the {ceiling} ceiling of dataflow '{flow}'")]
    FlowClassificationViolation {
        data: String,
        flow: String,
        classification: Classification,
        ceiling: Classification,
    },

    #[error("broken traverse path on data '{data}': '{from}' does not hand off to '{to}'")]
    BrokenTraversePath {
        data: String,
        from: String,
        to: String,
    },

    #[error("rule evaluation exceeded the {budget_ms} ms budget")]
    RuleEvaluationTimeout { budget_ms: u64 },

    #[error("invalid classification: {0}")]
    InvalidClassification(String),

    #[error("invalid severity: {0}")]
    InvalidSeverity(String),

    #[error("invalid element kind: {0}")]
    InvalidKind(String),

    #[error("invalid control '{0}': not in the recognized control vocabulary")]
    InvalidControl(String),

    #[error("invalid run stage: {0}")]
    InvalidStage(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, TmError>;
