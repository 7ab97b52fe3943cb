//! WIQL query construction.

use std::sync::LazyLock;

use regex::Regex;

use super::model::{FIELD_CREATED, FIELD_STATE, FIELD_TITLE, FIELD_TYPE};
use crate::query::FilterSpec;

const SELECT: &str = "SELECT [System.Id], [System.Title], [System.State], [System.WorkItemType], \
                      [System.CreatedDate], [System.AssignedTo] FROM WorkItems";

/// Quote a string literal, doubling embedded single quotes.
pub fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Build the WIQL query for `filter` scoped to `project`.
///
/// Created date bounds use `>=` for the start and `<` for the exclusive end.
pub fn build_wiql(project: &str, filter: &FilterSpec) -> String {
    let mut clauses = vec![format!("[System.TeamProject] = {}", quote(project))];

    if let Some(kind) = filter.work_item_type() {
        clauses.push(format!("[{FIELD_TYPE}] = {}", quote(kind)));
    }
    if let Some(state) = filter.state() {
        clauses.push(format!("[{FIELD_STATE}] = {}", quote(state)));
    }
    if let Some(range) = &filter.date_range {
        if let Some(start) = range.start {
            clauses.push(format!("[{FIELD_CREATED}] >= '{start}'"));
        }
        if let Some(end) = range.end {
            clauses.push(format!("[{FIELD_CREATED}] < '{end}'"));
        }
    }
    for term in &filter.raw_terms {
        clauses.push(format!("[{FIELD_TITLE}] CONTAINS {}", quote(term)));
    }

    format!(
        "{SELECT} WHERE {} ORDER BY [{FIELD_CREATED}] DESC",
        clauses.join(" AND ")
    )
}

// ============================================================================
// Clause matching
// ============================================================================

static CLAUSE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\[([\w.]+)\]\s*(=|CONTAINS)\s*'((?:[^']|'')*)'").expect("Invalid regex")
});

/// Comparison in a [`Clause`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClauseOp {
    Equals,
    Contains,
}

/// A `[Field] = 'value'` or `[Field] CONTAINS 'value'` condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Clause {
    pub field: String,
    pub op: ClauseOp,
    pub value: String,
}

impl Clause {
    /// Case-insensitive test against a field value.
    pub fn matches(&self, actual: &str) -> bool {
        let actual = actual.to_lowercase();
        let expected = self.value.to_lowercase();
        match self.op {
            ClauseOp::Equals => actual == expected,
            ClauseOp::Contains => actual.contains(&expected),
        }
    }
}

/// The field conditions of a WIQL query, with quotes undoubled.
///
/// Returns `None` when the text is not a `SELECT` statement.
pub fn clauses(wiql: &str) -> Option<Vec<Clause>> {
    let trimmed = wiql.trim_start();
    if !trimmed.get(..6)?.eq_ignore_ascii_case("select") {
        return None;
    }
    Some(
        CLAUSE
            .captures_iter(trimmed)
            .map(|cap| Clause {
                field: cap[1].to_string(),
                op: if cap[2].eq_ignore_ascii_case("contains") {
                    ClauseOp::Contains
                } else {
                    ClauseOp::Equals
                },
                value: cap[3].replace("''", "'"),
            })
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{EntityHint, Resource};
    use crate::temporal::DateRange;

    #[test]
    fn test_unfiltered_query() {
        let wiql = build_wiql("Fabrikam", &FilterSpec::default());
        assert!(wiql.contains("WHERE [System.TeamProject] = 'Fabrikam' ORDER BY"));
        assert!(wiql.ends_with("ORDER BY [System.CreatedDate] DESC"));
    }

    #[test]
    fn test_type_and_month() {
        let filter = FilterSpec::new(Resource::WorkItems)
            .with_hint(EntityHint::Bug)
            .with_date_range(DateRange::month(2025, 4).unwrap());
        let wiql = build_wiql("Fabrikam", &filter);
        assert!(wiql.contains("[System.WorkItemType] = 'Bug'"));
        assert!(wiql.contains("[System.CreatedDate] >= '2025-04-01'"));
        assert!(wiql.contains("[System.CreatedDate] < '2025-05-01'"));
        assert!(!wiql.contains("[System.State]"));
    }

    #[test]
    fn test_state_hint() {
        let filter = FilterSpec::default().with_hint(EntityHint::Active);
        assert!(build_wiql("P", &filter).contains("[System.State] = 'Active'"));
    }

    #[test]
    fn test_terms_are_quoted() {
        let filter = FilterSpec::default().with_term("O'Brien");
        let wiql = build_wiql("Team's Project", &filter);
        assert!(wiql.contains("[System.TeamProject] = 'Team''s Project'"));
        assert!(wiql.contains("[System.Title] CONTAINS 'O''Brien'"));
    }

    #[test]
    fn test_clauses_read_back_built_query() {
        let filter = FilterSpec::default()
            .with_hint(EntityHint::Bug)
            .with_term("O'Brien");
        let parsed = clauses(&build_wiql("Fabrikam", &filter)).unwrap();
        assert_eq!(parsed.len(), 3);
        assert_eq!(parsed[1].field, "System.WorkItemType");
        assert!(parsed[1].matches("bug"));
        assert_eq!(parsed[2].op, ClauseOp::Contains);
        assert_eq!(parsed[2].value, "O'Brien");
    }

    #[test]
    fn test_clauses_require_select() {
        assert!(clauses("DELETE FROM WorkItems").is_none());
        assert!(clauses("").is_none());
        assert_eq!(clauses("select [System.Id] from WorkItems"), Some(Vec::new()));
    }
}
