use crate::error::Result;
use crate::model::{
    ActorSpec, BoundarySpec, DataSpec, DatastoreSpec, ExternalEntitySpec, FlowSpec, LambdaSpec,
    ProcessSpec, ServerSpec,
};
use crate::registry::{ModelConfig, ModelRegistry};
use serde::Deserialize;
use std::path::Path;

// ---------------------------------------------------------------------------
// Manifest
// ---------------------------------------------------------------------------

/// The YAML model manifest, the declarative "build script" for one model.
/// Section order fixes registration order (boundaries, actors, external
/// entities, servers, processes, lambdas, datastores, then dataflows, then
/// data), and declaration order is preserved within each section, so ordinal
/// IDs are stable for a given file.
///
/// Control names and classifications are closed enums: a typo fails at parse
/// time instead of silently evaluating to false.
#[derive(Debug, Clone, Deserialize)]
pub struct Manifest {
    pub model: ModelConfig,
    #[serde(default)]
    pub boundaries: Vec<BoundarySpec>,
    #[serde(default)]
    pub actors: Vec<ActorSpec>,
    #[serde(default)]
    pub external_entities: Vec<ExternalEntitySpec>,
    #[serde(default)]
    pub servers: Vec<ServerSpec>,
    #[serde(default)]
    pub processes: Vec<ProcessSpec>,
    #[serde(default)]
    pub lambdas: Vec<LambdaSpec>,
    #[serde(default)]
    pub datastores: Vec<DatastoreSpec>,
    #[serde(default)]
    pub dataflows: Vec<FlowSpec>,
    #[serde(default)]
    pub data: Vec<DataSpec>,
}

impl Manifest {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self> {
        let manifest: Manifest = serde_yaml::from_str(text)?;
        Ok(manifest)
    }

    /// Populate a registry from the manifest in declaration order.
    pub fn into_registry(self) -> Result<ModelRegistry> {
        let mut reg = ModelRegistry::new(self.model);
        for spec in self.boundaries {
            reg.register_boundary(spec)?;
        }
        for spec in self.actors {
            reg.register_actor(spec)?;
        }
        for spec in self.external_entities {
            reg.register_external_entity(spec)?;
        }
        for spec in self.servers {
            reg.register_server(spec)?;
        }
        for spec in self.processes {
            reg.register_process(spec)?;
        }
        for spec in self.lambdas {
            reg.register_lambda(spec)?;
        }
        for spec in self.datastores {
            reg.register_datastore(spec)?;
        }
        for spec in self.dataflows {
            reg.register_flow(spec)?;
        }
        for spec in self.data {
            reg.register_data(spec)?;
        }
        Ok(reg)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TmError;
    use crate::types::{Classification, Control, StoreKind};

    const SAMPLE: &str = r#"
model:
  name: comment-board
  description: Two-tier comment board
  merge_responses: true
  assumptions:
    - Database runs on a private subnet

boundaries:
  - name: DMZ

actors:
  - name: User

servers:
  - name: Web
    in_boundary: DMZ
    protocol: HTTPS
    port: 443
    controls:
      sanitizes_input: true
      authorizes_source: false

datastores:
  - name: Database
    store_kind: sql
    max_classification: public
    controls:
      has_access_control: true

dataflows:
  - name: post comment
    source: User
    dest: Web
    protocol: HTTP
    data: [Comment]
  - name: insert comment
    source: Web
    dest: Database
    protocol: SQL
    data: [Comment]

data:
  - name: Comment
    classification: public
    created_at: [User]
    stored_at: [Database]
    traverses: [post comment, insert comment]
"#;

    #[test]
    fn parses_and_registers_in_order() {
        let manifest = Manifest::parse(SAMPLE).unwrap();
        assert!(manifest.model.merge_responses);
        let reg = manifest.into_registry().unwrap();
        assert_eq!(reg.element_count(), 4);
        assert_eq!(reg.flow_count(), 2);
        assert_eq!(reg.data_count(), 1);
        let snap = reg.finalize();
        assert_eq!(snap.elements[0].name, "DMZ");
        assert_eq!(snap.elements[1].name, "User");
        assert_eq!(snap.elements[2].name, "Web");
        assert_eq!(snap.elements[3].name, "Database");
    }

    #[test]
    fn typed_fields_survive_parse() {
        let manifest = Manifest::parse(SAMPLE).unwrap();
        let reg = manifest.into_registry().unwrap();
        let snap = reg.finalize();
        let web = &snap.elements[2];
        assert_eq!(web.port, Some(443));
        assert_eq!(web.controls.get(&Control::SanitizesInput), Some(&true));
        assert_eq!(web.controls.get(&Control::AuthorizesSource), Some(&false));
        let db = &snap.elements[3];
        let store = db.store.as_ref().unwrap();
        assert_eq!(store.store_kind, StoreKind::Sql);
        assert_eq!(store.max_classification, Classification::Public);
    }

    #[test]
    fn unknown_control_fails_parse() {
        let bad = SAMPLE.replace("sanitizes_input", "sanitises_input");
        assert!(matches!(Manifest::parse(&bad), Err(TmError::Yaml(_))));
    }

    #[test]
    fn unknown_classification_fails_parse() {
        let bad = SAMPLE.replace("classification: public", "classification: unclassified");
        assert!(matches!(Manifest::parse(&bad), Err(TmError::Yaml(_))));
    }

    #[test]
    fn duplicate_names_rejected_at_registration() {
        let dup = SAMPLE.replace("- name: User", "- name: Web");
        let manifest = Manifest::parse(&dup).unwrap();
        assert!(matches!(
            manifest.into_registry(),
            Err(TmError::DuplicateName(_))
        ));
    }

    #[test]
    fn load_reads_from_disk() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("model.yaml");
        std::fs::write(&path, SAMPLE).unwrap();
        let manifest = Manifest::load(&path).unwrap();
        assert_eq!(manifest.model.name, "comment-board");
    }
}
