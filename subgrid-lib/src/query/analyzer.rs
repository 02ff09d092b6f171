//! String-level query analysis.
//!
//! Each function parses the query afresh; nothing is cached between calls.
//! Use [`QueryDocument::parse`] directly when several facts are needed.

use crate::error::ParseError;

use super::document::LinkEntity;
use super::document::OrderDirective;
use super::document::QueryDocument;

/// Returns the root entity's logical name, `""` when there is no `<entity>`.
pub fn parse_entity_name(query: &str) -> Result<String, ParseError> {
    Ok(QueryDocument::parse(query)?.entity_name().to_string())
}

/// Returns every `<link-entity>` with its attributes, in document order.
pub fn parse_link_entities(query: &str) -> Result<Vec<LinkEntity>, ParseError> {
    Ok(QueryDocument::parse(query)?.link_entities().to_vec())
}

/// Returns the attribute names declared directly under the root entity.
pub fn parse_root_attribute_names(query: &str) -> Result<Vec<String>, ParseError> {
    Ok(QueryDocument::parse(query)?.root_attribute_names())
}

/// Returns the alias of each root attribute.
///
/// Entries are `None` where no alias is declared; aggregate callers should
/// go through [`QueryDocument::aggregate_aliases`] instead.
pub fn parse_alias_names(query: &str) -> Result<Vec<Option<String>>, ParseError> {
    Ok(QueryDocument::parse(query)?.alias_names())
}

/// Returns `true` only for `aggregate="true"` exactly.
pub fn is_aggregate(query: &str) -> Result<bool, ParseError> {
    Ok(QueryDocument::parse(query)?.is_aggregate())
}

/// Returns the first order directive.
pub fn parse_order(query: &str) -> Result<Option<OrderDirective>, ParseError> {
    Ok(QueryDocument::parse(query)?.order().cloned())
}

/// Returns the cap already carried by the query (`count`, then `top`).
///
/// Unlike the other analyzers this never fails: an unparsable query has no
/// cap and yields `0`.
pub fn parse_explicit_cap(query: &str) -> u32 {
    match QueryDocument::parse(query) {
        Ok(doc) => doc.explicit_cap(),
        Err(err) => {
            log::debug!("No explicit cap, query does not parse: {}", err);
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_name() {
        let query = r#"<fetch><entity name="account"><attribute name="name"/></entity></fetch>"#;
        assert_eq!(parse_entity_name(query).unwrap(), "account");
        assert_eq!(parse_entity_name(query).unwrap(), parse_entity_name(query).unwrap());
        assert_eq!(parse_entity_name("<fetch/>").unwrap(), "");
    }

    #[test]
    fn test_is_aggregate_requires_exact_literal() {
        let query = |flag: &str| format!(r#"<fetch {flag}><entity name="a"/></fetch>"#);

        assert!(is_aggregate(&query(r#"aggregate="true""#)).unwrap());
        assert!(!is_aggregate(&query(r#"aggregate="True""#)).unwrap());
        assert!(!is_aggregate(&query(r#"aggregate="1""#)).unwrap());
        assert!(!is_aggregate(&query("")).unwrap());
    }

    #[test]
    fn test_explicit_cap() {
        assert_eq!(parse_explicit_cap(r#"<fetch><entity name="a"/></fetch>"#), 0);
        assert_eq!(parse_explicit_cap(r#"<fetch top="10"><entity name="a"/></fetch>"#), 10);
        assert_eq!(parse_explicit_cap(r#"<fetch count="3" top="10"><entity name="a"/></fetch>"#), 3);
        assert_eq!(parse_explicit_cap("<fetch"), 0);
    }

    #[test]
    fn test_analyzers_reject_malformed_input() {
        let broken = "<fetch><entity name=\"a\">";

        assert!(parse_entity_name(broken).is_err());
        assert!(parse_link_entities(broken).is_err());
        assert!(parse_root_attribute_names(broken).is_err());
        assert!(parse_alias_names(broken).is_err());
        assert!(is_aggregate(broken).is_err());
        assert!(parse_order(broken).is_err());
    }

    #[test]
    fn test_same_named_link_entities_are_not_merged() {
        let query = r#"<fetch><entity name="account">
            <link-entity name="contact" alias="a"><attribute name="fullname"/></link-entity>
            <link-entity name="contact" alias="b"><attribute name="telephone1"/></link-entity>
        </entity></fetch>"#;

        let links = parse_link_entities(query).unwrap();
        assert_eq!(links.len(), 2);
        assert_eq!(links[0].attribute_names(), vec!["fullname"]);
        assert_eq!(links[1].attribute_names(), vec!["telephone1"]);
    }
}
