use std::collections::BTreeSet;

use crate::session::{FilterField, QuerySession};

/// Boolean filter derived from a [`QuerySession`]: an `AND` of per-field
/// `OR`-of-equality clauses, omitting any field with no selections.
///
/// The expression is stateless and rebuilt fresh on every search or page
/// request; deriving it twice from the same session yields identical output.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FilterExpression {
    clauses: Vec<String>,
}

impl FilterExpression {
    pub fn from_session(session: &QuerySession) -> Self {
        let clauses = FilterField::ALL
            .iter()
            .filter_map(|field| or_clause(*field, session.selections(*field)))
            .collect();

        Self { clauses }
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    pub fn clause_count(&self) -> usize {
        self.clauses.len()
    }

    /// Formula for the backing table's query engine. `None` means no filter:
    /// the read should match every record.
    pub fn formula(&self) -> Option<String> {
        if self.clauses.is_empty() {
            None
        } else {
            Some(format!("AND({})", self.clauses.join(", ")))
        }
    }
}

fn or_clause(field: FilterField, values: &BTreeSet<String>) -> Option<String> {
    if values.is_empty() {
        return None;
    }

    let tests = values
        .iter()
        .map(|value| format!("{{{}}} = {}", field.column(), quote_literal(value)))
        .collect::<Vec<_>>()
        .join(", ");

    Some(format!("OR({tests})"))
}

/// Renders a selected value as a double-quoted formula string literal.
/// Backslashes and quotes are escaped so user-visible column values can
/// never break out of the literal.
fn quote_literal(value: &str) -> String {
    let mut literal = String::with_capacity(value.len() + 2);
    literal.push('"');
    for ch in value.chars() {
        if ch == '"' || ch == '\\' {
            literal.push('\\');
        }
        literal.push(ch);
    }
    literal.push('"');
    literal
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::{quote_literal, FilterExpression};
    use crate::session::{FilterField, QuerySession};

    fn set(values: &[&str]) -> BTreeSet<String> {
        values.iter().map(|value| (*value).to_owned()).collect()
    }

    #[test]
    fn empty_session_produces_no_formula() {
        let expression = FilterExpression::from_session(&QuerySession::default());
        assert!(expression.is_empty());
        assert_eq!(expression.formula(), None);
    }

    #[test]
    fn empty_field_contributes_no_clause() {
        let mut session = QuerySession::default();
        session.set_selections(FilterField::TimeCommitment, set(&["1-2 hrs"]));
        session.set_selections(FilterField::AreaOfFocus, set(&["Education", "Environment"]));

        let expression = FilterExpression::from_session(&session);
        assert_eq!(expression.clause_count(), 2);
        assert_eq!(
            expression.formula().as_deref(),
            Some(
                "AND(OR({Time Commitment} = \"1-2 hrs\"), \
                 OR({Area of Focus} = \"Education\", {Area of Focus} = \"Environment\"))"
            )
        );
    }

    #[test]
    fn single_value_or_clause_degenerates_correctly() {
        let mut session = QuerySession::default();
        session.set_selections(FilterField::Location, set(&["Remote"]));

        let expression = FilterExpression::from_session(&session);
        assert_eq!(expression.formula().as_deref(), Some("AND(OR({Location} = \"Remote\"))"));
    }

    #[test]
    fn values_are_ordered_lexicographically_for_determinism() {
        let mut session = QuerySession::default();
        session.set_selections(FilterField::Location, set(&["Zanesville", "Akron", "Miami"]));

        let expression = FilterExpression::from_session(&session);
        assert_eq!(
            expression.formula().as_deref(),
            Some(
                "AND(OR({Location} = \"Akron\", {Location} = \"Miami\", \
                 {Location} = \"Zanesville\"))"
            )
        );
    }

    #[test]
    fn rebuilding_from_the_same_session_is_idempotent() {
        let mut session = QuerySession::default();
        session.set_selections(FilterField::TimeCommitment, set(&["1-2 hrs", "3-5 hrs"]));
        session.set_selections(FilterField::Location, set(&["Remote"]));

        let first = FilterExpression::from_session(&session).formula();
        let second = FilterExpression::from_session(&session).formula();
        assert_eq!(first, second);
    }

    #[test]
    fn quotes_and_backslashes_are_escaped() {
        assert_eq!(quote_literal("St. John's"), "\"St. John's\"");
        assert_eq!(quote_literal("say \"hi\""), "\"say \\\"hi\\\"\"");
        assert_eq!(quote_literal("back\\slash"), "\"back\\\\slash\"");
    }

    #[test]
    fn hostile_value_stays_inside_the_literal() {
        let mut session = QuerySession::default();
        session.set_selections(FilterField::Location, set(&["\"), TRUE(), OR(\""]));

        let formula = FilterExpression::from_session(&session).formula().unwrap_or_default();
        assert_eq!(
            formula,
            "AND(OR({Location} = \"\\\"), TRUE(), OR(\\\"\"))"
        );
    }
}
