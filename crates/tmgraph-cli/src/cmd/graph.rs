use crate::output::{print_json, print_table};
use anyhow::Context;
use std::path::Path;
use tmgraph_core::export;
use tmgraph_core::graph::ModelGraph;
use tmgraph_core::manifest::Manifest;

pub fn run(model: &Path, mermaid: bool, level: Option<u8>, json: bool) -> anyhow::Result<()> {
    let manifest = Manifest::load(model)
        .with_context(|| format!("failed to load manifest {}", model.display()))?;
    let snapshot = manifest
        .into_registry()
        .context("failed to build model registry")?
        .finalize();
    let graph = ModelGraph::build(&snapshot).context("failed to resolve model graph")?;

    if mermaid {
        print!("{}", export::mermaid_dfd(&graph, level));
        return Ok(());
    }

    if json {
        return print_json(&graph);
    }

    // -- Human-readable output ------------------------------------------------

    println!("Model: {}", graph.config.name);

    println!("\nNodes: {}", graph.nodes.len());
    let node_rows: Vec<Vec<String>> = graph
        .nodes
        .iter()
        .map(|n| {
            let boundary = n
                .parent
                .map(|p| graph.nodes[p].element.name.clone())
                .unwrap_or_default();
            vec![
                n.element.name.clone(),
                n.element.kind.to_string(),
                boundary,
            ]
        })
        .collect();
    print_table(&["NAME", "KIND", "BOUNDARY"], &node_rows);

    if !graph.edges.is_empty() {
        println!("\nEdges: {}", graph.edges.len());
        let edge_rows: Vec<Vec<String>> = graph
            .edges
            .iter()
            .map(|e| {
                vec![
                    e.flow.name.clone(),
                    graph.nodes[e.source].element.name.clone(),
                    graph.nodes[e.dest].element.name.clone(),
                    e.flow.protocol.clone().unwrap_or_default(),
                    if e.is_response { "response" } else { "" }.to_string(),
                ]
            })
            .collect();
        print_table(&["FLOW", "SOURCE", "DEST", "PROTOCOL", ""], &edge_rows);
    }

    Ok(())
}
