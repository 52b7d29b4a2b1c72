//! operation classification
//!
//! determines the operation kind of a graphql document and implements the
//! textual bare-query check used for mutation promotion.

use crate::error::{Error, Result};
use graphql_parser::query::{parse_query, Definition, OperationDefinition};

/// operation kind of a graphql document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Query,
    Mutation,
    Subscription,
}

/// classify a graphql document by its operation kind
///
/// the first operation definition in source order wins; multi-operation
/// documents are not a supported input. a selection set without a keyword
/// (`{ field }`) classifies as a query.
pub fn classify(query: &str) -> Result<OperationKind> {
    let document = parse_query::<&str>(query)
        .map_err(|err| Error::Classify(format!("invalid graphql document: {err}")))?;

    for definition in &document.definitions {
        if let Definition::Operation(operation) = definition {
            return Ok(match operation {
                OperationDefinition::SelectionSet(_) | OperationDefinition::Query(_) => {
                    OperationKind::Query
                }
                OperationDefinition::Mutation(_) => OperationKind::Mutation,
                OperationDefinition::Subscription(_) => OperationKind::Subscription,
            });
        }
    }

    Err(Error::Classify(
        "graphql document contains no operation".to_string(),
    ))
}

/// textual check for an explicit `query` keyword
///
/// the parser cannot distinguish an implicit-query document (`{ field }`)
/// from one a mutation caller supplied in bare form, so `mutation()`
/// rejects documents that spell the keyword out and promotes the rest.
/// this mirrors the original `^\s*query` multiline, case-insensitive
/// match, including the fact that any line starting with the keyword
/// counts.
pub fn starts_with_query_keyword(query: &str) -> bool {
    query.lines().any(|line| {
        let trimmed = line.trim_start();
        trimmed
            .get(..5)
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case("query"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_query_forms() {
        assert_eq!(classify("{ ok }").unwrap(), OperationKind::Query);
        assert_eq!(classify("query { ok }").unwrap(), OperationKind::Query);
        assert_eq!(
            classify("query Name { ok }").unwrap(),
            OperationKind::Query
        );
    }

    #[test]
    fn test_classify_mutation_forms() {
        assert_eq!(
            classify("mutation { create }").unwrap(),
            OperationKind::Mutation
        );
        assert_eq!(
            classify("mutation M($data: Input!) { create(data: $data) { id } }").unwrap(),
            OperationKind::Mutation
        );
    }

    #[test]
    fn test_classify_subscription() {
        assert_eq!(
            classify("subscription { events { node { id } } }").unwrap(),
            OperationKind::Subscription
        );
    }

    #[test]
    fn test_classify_unparseable() {
        let err = classify("query {").unwrap_err();
        assert!(matches!(err, Error::Classify(_)));
    }

    #[test]
    fn test_classify_first_operation_wins() {
        let kind = classify("mutation A { create }\nquery B { ok }").unwrap();
        assert_eq!(kind, OperationKind::Mutation);
    }

    #[test]
    fn test_starts_with_query_keyword() {
        assert!(starts_with_query_keyword("query { ok }"));
        assert!(starts_with_query_keyword("  QUERY Name { ok }"));
        assert!(starts_with_query_keyword("\n\n   query { ok }"));
        assert!(!starts_with_query_keyword("{ ok }"));
        assert!(!starts_with_query_keyword("mutation { create }"));
    }

    #[test]
    fn test_starts_with_query_keyword_matches_any_line() {
        // line-anchored like the original multiline regex
        assert!(starts_with_query_keyword("mutation M {\nquery: field\n}"));
    }
}
