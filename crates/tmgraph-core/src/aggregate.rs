use crate::engine::Finding;
use std::collections::HashMap;

/// Reduce findings to their final, totally ordered form.
///
/// With `merge_responses`, same-rule findings on the two halves of a
/// request/response dataflow pair collapse into one finding attributed to
/// the pair. Output order is severity (descending), then rule ID, then the
/// target's registration ordinal; never arbitrary.
pub fn aggregate(findings: Vec<Finding>, merge_responses: bool) -> Vec<Finding> {
    let mut out: Vec<Finding> = if merge_responses {
        merge_pairs(findings)
    } else {
        findings
    };
    out.sort_by(|a, b| {
        b.severity
            .cmp(&a.severity)
            .then_with(|| a.rule_id.cmp(&b.rule_id))
            .then_with(|| a.ordinal.cmp(&b.ordinal))
    });
    out
}

fn merge_pairs(findings: Vec<Finding>) -> Vec<Finding> {
    let mut out: Vec<Finding> = Vec::with_capacity(findings.len());
    // (rule, canonical pair key) -> index of the finding already kept.
    let mut seen: HashMap<(String, usize), usize> = HashMap::new();
    for finding in findings {
        let Some(pair) = finding.pair else {
            out.push(finding);
            continue;
        };
        match seen.get(&(finding.rule_id.clone(), pair)) {
            None => {
                seen.insert((finding.rule_id.clone(), pair), out.len());
                out.push(finding);
            }
            Some(&kept) => {
                // Second half of the pair: fold into the kept finding,
                // attributed to the request/response pair.
                let first = &mut out[kept];
                let (req, resp) = if first.ordinal <= finding.ordinal {
                    (first.target.clone(), finding.target)
                } else {
                    (finding.target, first.target.clone())
                };
                first.target = format!("{req} <-> {resp}");
                first.description = format!("{} (request/response pair)", first.description);
                first.ordinal = first.ordinal.min(finding.ordinal);
            }
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Severity;

    fn finding(rule: &str, severity: Severity, target: &str, ordinal: usize) -> Finding {
        Finding {
            rule_id: rule.to_string(),
            severity,
            target: target.to_string(),
            description: format!("issue on '{target}'"),
            ordinal,
            pair: None,
        }
    }

    #[test]
    fn sorted_by_severity_then_rule_then_ordinal() {
        let input = vec![
            finding("HA01", Severity::Low, "Web", 1),
            finding("AC01", Severity::High, "comments", 0),
            finding("AC02", Severity::High, "Database", 2),
            finding("AC01", Severity::High, "uploads", 1),
        ];
        let out = aggregate(input, false);
        let order: Vec<(&str, &str)> = out
            .iter()
            .map(|f| (f.rule_id.as_str(), f.target.as_str()))
            .collect();
        assert_eq!(
            order,
            vec![
                ("AC01", "comments"),
                ("AC01", "uploads"),
                ("AC02", "Database"),
                ("HA01", "Web"),
            ]
        );
    }

    #[test]
    fn merge_collapses_request_response_pair() {
        let mut request = finding("CR01", Severity::High, "query", 3);
        request.pair = Some(3);
        let mut response = finding("CR01", Severity::High, "reply", 4);
        response.pair = Some(3);
        let out = aggregate(vec![request, response], true);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].target, "query <-> reply");
        assert!(out[0].description.contains("request/response pair"));
        assert_eq!(out[0].ordinal, 3);
    }

    #[test]
    fn merge_keeps_distinct_rules_apart() {
        let mut a = finding("CR01", Severity::High, "query", 3);
        a.pair = Some(3);
        let mut b = finding("AA01", Severity::Medium, "reply", 4);
        b.pair = Some(3);
        let out = aggregate(vec![a, b], true);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn merge_disabled_keeps_both_halves() {
        let mut request = finding("CR01", Severity::High, "query", 3);
        request.pair = Some(3);
        let mut response = finding("CR01", Severity::High, "reply", 4);
        response.pair = Some(3);
        let out = aggregate(vec![request, response], false);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn aggregation_is_pure() {
        let input = vec![
            finding("AC01", Severity::High, "comments", 0),
            finding("HA01", Severity::Low, "Web", 1),
        ];
        let a = aggregate(input.clone(), true);
        let b = aggregate(input, true);
        assert_eq!(a, b);
    }
}
