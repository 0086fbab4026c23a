use crate::output::print_json;
use anyhow::{bail, Context};
use std::path::Path;

const STARTER_MANIFEST: &str = r#"model:
  name: comment-board
  description: Two-tier comment board behind a DMZ
  is_ordered: true
  merge_responses: true
  assumptions:
    - Database runs on a private subnet

boundaries:
  - name: DMZ

actors:
  - name: User
    description: Anonymous visitor posting comments

servers:
  - name: Web
    description: Public comment frontend
    in_boundary: DMZ
    protocol: HTTPS
    port: 443
    controls:
      sanitizes_input: true
      authorizes_source: false

datastores:
  - name: Database
    description: Comment storage
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

pub fn run(path: Option<&Path>, json: bool) -> anyhow::Result<()> {
    let path = path.unwrap_or_else(|| Path::new("model.yaml"));
    if path.exists() {
        bail!("refusing to overwrite existing manifest: {}", path.display());
    }
    std::fs::write(path, STARTER_MANIFEST)
        .with_context(|| format!("failed to write {}", path.display()))?;

    if json {
        #[derive(serde::Serialize)]
        struct InitOutput<'a> {
            path: &'a str,
        }
        return print_json(&InitOutput {
            path: &path.display().to_string(),
        });
    }
    println!("Wrote starter manifest to {}", path.display());
    println!("Next: tmgraph check {}", path.display());
    Ok(())
}
