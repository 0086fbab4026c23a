use crate::output::{print_json, print_table};
use tmgraph_core::rules::{default_rules, CORPUS_VERSION};

pub fn run(json: bool) -> anyhow::Result<()> {
    let rules = default_rules();

    if json {
        #[derive(serde::Serialize)]
        struct RuleRow<'a> {
            id: &'a str,
            target: String,
            severity: String,
            description: &'a str,
        }
        #[derive(serde::Serialize)]
        struct RulesOutput<'a> {
            corpus_version: &'a str,
            rules: Vec<RuleRow<'a>>,
        }
        let rows: Vec<RuleRow> = rules
            .iter()
            .map(|r| RuleRow {
                id: r.id,
                target: r.target.label(),
                severity: r.severity.to_string(),
                description: r.description,
            })
            .collect();
        return print_json(&RulesOutput {
            corpus_version: CORPUS_VERSION,
            rules: rows,
        });
    }

    println!("Rule corpus {} ({} rules)\n", CORPUS_VERSION, rules.len());
    let rows: Vec<Vec<String>> = rules
        .iter()
        .map(|r| {
            vec![
                r.id.to_string(),
                r.target.label(),
                r.severity.to_string(),
                r.description.to_string(),
            ]
        })
        .collect();
    print_table(&["ID", "TARGET", "SEVERITY", "DESCRIPTION"], &rows);
    Ok(())
}
