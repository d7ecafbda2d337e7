//! Outline point and story beat distribution across phases.

use std::collections::HashMap;

const BULLET_PREFIXES: &[&str] = &["- ", "* ", "• ", "+ "];

/// Split outline text into points: one per non-empty line, bullet and
/// numbering markers removed.
pub fn split_points(outline: &str) -> Vec<String> {
    outline
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(strip_marker)
        .filter(|point| !point.is_empty())
        .map(str::to_string)
        .collect()
}

fn strip_marker(line: &str) -> &str {
    for prefix in BULLET_PREFIXES {
        if let Some(rest) = line.strip_prefix(prefix) {
            return rest.trim();
        }
    }
    // "1. point" / "12) point"
    let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits > 0 {
        let rest = &line[digits..];
        if let Some(rest) = rest.strip_prefix(". ").or_else(|| rest.strip_prefix(") ")) {
            return rest.trim();
        }
    }
    line
}

/// Assign items to phases in contiguous, near-equal chunks.
///
/// Phase `i` of `k` receives `items[i*n/k .. (i+1)*n/k]`, so earlier items go
/// to earlier phases and no item is dropped. Phases that receive nothing are
/// still present with an empty list.
pub fn distribute(items: &[String], phase_ids: &[String]) -> HashMap<String, Vec<String>> {
    let k = phase_ids.len();
    let n = items.len();
    phase_ids
        .iter()
        .enumerate()
        .map(|(i, id)| {
            let start = i * n / k;
            let end = (i + 1) * n / k;
            (id.clone(), items[start..end].to_vec())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_split_points_strips_markers() {
        let outline = "- why it matters\n\n* history\n1. the modern take\n12) wrap up\nplain line";
        assert_eq!(
            split_points(outline),
            vec![
                "why it matters",
                "history",
                "the modern take",
                "wrap up",
                "plain line"
            ]
        );
    }

    #[test]
    fn test_split_points_empty() {
        assert!(split_points("  \n\n").is_empty());
    }

    #[test]
    fn test_distribute_covers_every_item_in_order() {
        let items: Vec<String> = (1..=5).map(|i| format!("p{}", i)).collect();
        let map = distribute(&items, &ids(&["a", "b", "c"]));
        assert_eq!(map["a"], vec!["p1"]);
        assert_eq!(map["b"], vec!["p2", "p3"]);
        assert_eq!(map["c"], vec!["p4", "p5"]);
    }

    #[test]
    fn test_distribute_fewer_items_than_phases() {
        let items = vec!["only".to_string()];
        let map = distribute(&items, &ids(&["a", "b"]));
        assert!(map["a"].is_empty());
        assert_eq!(map["b"], vec!["only"]);
    }

    #[test]
    fn test_distribute_no_phases() {
        assert!(distribute(&["x".to_string()], &[]).is_empty());
    }
}
