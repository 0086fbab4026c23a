use crate::error::Result;
use crate::graph::{ModelGraph, Node};
use crate::io::atomic_write;
use crate::pipeline::RunReport;
use crate::types::ElementKind;
use std::fmt::Write as _;
use std::path::Path;

// ---------------------------------------------------------------------------
// Findings serialization
// ---------------------------------------------------------------------------

pub fn findings_json(report: &RunReport) -> Result<String> {
    Ok(serde_json::to_string_pretty(report)?)
}

// ---------------------------------------------------------------------------
// Markdown report
// ---------------------------------------------------------------------------

pub fn markdown_report(report: &RunReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# Threat model: {}", report.model);
    if let Some(desc) = &report.description {
        let _ = writeln!(out, "\n{desc}");
    }
    let _ = writeln!(
        out,
        "\nGenerated: {}",
        report.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    let _ = writeln!(
        out,
        "\nElements: {} · Dataflows: {} · Data assets: {}",
        report.elements, report.dataflows, report.data_assets
    );

    if !report.assumptions.is_empty() {
        let _ = writeln!(out, "\n## Assumptions\n");
        for a in &report.assumptions {
            let _ = writeln!(out, "- {a}");
        }
    }

    let _ = writeln!(out, "\n## Findings ({})\n", report.findings.len());
    if report.findings.is_empty() {
        let _ = writeln!(out, "No findings.");
    } else {
        let _ = writeln!(out, "| Severity | Rule | Target | Description |");
        let _ = writeln!(out, "|---|---|---|---|");
        for f in &report.findings {
            let _ = writeln!(
                out,
                "| {} | {} | {} | {} |",
                f.severity, f.rule_id, f.target, f.description
            );
        }
    }

    if !report.suppressed.is_empty() {
        let _ = writeln!(out, "\n## Suppressed ({})\n", report.suppressed.len());
        for s in &report.suppressed {
            let _ = writeln!(out, "- `{}` on {}: {}", s.rule_id, s.target, s.reason);
        }
    }

    out
}

// ---------------------------------------------------------------------------
// Mermaid data-flow diagram description
// ---------------------------------------------------------------------------

/// Emit a mermaid flowchart describing the resolved graph. This is a diagram
/// *description*; rendering it is an external concern. `level` filters
/// elements by their declared detail levels (empty levels = every level).
/// Edges follow declaration order when the model sets `is_ordered`;
/// otherwise they are sorted by flow name for a canonical layout.
pub fn mermaid_dfd(graph: &ModelGraph, level: Option<u8>) -> String {
    let visible: Vec<bool> = graph
        .nodes
        .iter()
        .map(|n| match level {
            None => true,
            Some(l) => n.element.levels.is_empty() || n.element.levels.contains(&l),
        })
        .collect();

    let mut out = String::from("flowchart TD\n");
    // Top-level nodes and boundary subgraphs, in registration order.
    for (idx, node) in graph.nodes.iter().enumerate() {
        if node.parent.is_none() && visible[idx] {
            write_node(&mut out, graph, idx, node, &visible, 1);
        }
    }
    let mut order: Vec<usize> = (0..graph.edges.len()).collect();
    if !graph.config.is_ordered {
        order.sort_by(|&a, &b| graph.edges[a].flow.name.cmp(&graph.edges[b].flow.name));
    }
    for idx in order {
        let edge = &graph.edges[idx];
        if !visible[edge.source] || !visible[edge.dest] {
            continue;
        }
        let _ = writeln!(
            out,
            "    n{} -->|\"{}\"| n{}",
            edge.source,
            escape(&edge.flow.name),
            edge.dest
        );
    }
    out
}

fn write_node(
    out: &mut String,
    graph: &ModelGraph,
    idx: usize,
    node: &Node,
    visible: &[bool],
    depth: usize,
) {
    let pad = "    ".repeat(depth);
    if node.element.kind == ElementKind::Boundary {
        let _ = writeln!(out, "{pad}subgraph b{idx}[\"{}\"]", escape(&node.element.name));
        for (child_idx, child) in graph.nodes.iter().enumerate() {
            if child.parent == Some(idx) && visible[child_idx] {
                write_node(out, graph, child_idx, child, visible, depth + 1);
            }
        }
        let _ = writeln!(out, "{pad}end");
        return;
    }
    let name = escape(&node.element.name);
    let shape = match node.element.kind {
        ElementKind::Actor | ElementKind::ExternalEntity => format!("n{idx}([\"{name}\"])"),
        ElementKind::Datastore => format!("n{idx}[(\"{name}\")]"),
        _ => format!("n{idx}[\"{name}\"]"),
    };
    let _ = writeln!(out, "{pad}{shape}");
}

fn escape(name: &str) -> String {
    name.replace('"', "'")
}

// ---------------------------------------------------------------------------
// Artifact writing
// ---------------------------------------------------------------------------

/// Write findings.json, report.md, and dfd.mmd into `dir` and mark the
/// report exported. Writes are atomic; a failed run never gets this far.
pub fn write_artifacts(dir: &Path, report: &mut RunReport, graph: &ModelGraph) -> Result<()> {
    atomic_write(&dir.join("findings.json"), findings_json(report)?.as_bytes())?;
    atomic_write(&dir.join("report.md"), markdown_report(report).as_bytes())?;
    atomic_write(&dir.join("dfd.mmd"), mermaid_dfd(graph, None).as_bytes())?;
    report.mark_exported();
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
