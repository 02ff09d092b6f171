//! Paging rewrite of FetchXML queries.

use quick_xml::Reader;
use quick_xml::Writer;
use quick_xml::events::BytesStart;
use quick_xml::events::Event;

use crate::error::ParseError;

use super::document::QueryDocument;
use super::document::element_name;

/// Injects `page` and `count` into the `<fetch>` element.
///
/// A positive `top` on the query is consumed: it is removed and becomes the
/// page window. Otherwise the window is `page_size`. The rest of the
/// document is re-emitted untouched.
///
/// The rewrite is not idempotent. Its output no longer carries `top`, so
/// rewriting it again uses whatever `page_size` the second call passes.
pub fn rewrite(query: &str, page_size: u32, current_page: u32) -> Result<String, ParseError> {
    let doc = QueryDocument::parse(query)?;

    let window = doc.top().unwrap_or(page_size);
    let page = current_page.to_string();
    let count = window.to_string();
    let remove: &[&str] = if doc.top().is_some() { &["top"] } else { &[] };

    set_fetch_attributes(query, &[("page", &page), ("count", &count)], remove)
}

/// Sets and removes attributes on the root `<fetch>` element.
///
/// Attributes that already exist keep their position; new ones are appended
/// in the order given.
pub fn set_fetch_attributes(
    query: &str,
    set: &[(&str, &str)],
    remove: &[&str],
) -> Result<String, ParseError> {
    let mut reader = Reader::from_str(query);
    let mut writer = Writer::new(Vec::new());
    let mut rewritten = false;

    loop {
        let event = reader.read_event();
        let position = reader.buffer_position() as u64;
        let event = event.map_err(|e| ParseError::malformed(position, e.to_string()))?;

        let out = match event {
            Event::Eof => break,
            Event::Start(element) if !rewritten => {
                rewritten = true;
                Event::Start(edit_attributes(&element, set, remove, position)?)
            }
            Event::Empty(element) if !rewritten => {
                rewritten = true;
                Event::Empty(edit_attributes(&element, set, remove, position)?)
            }
            other => other,
        };

        writer
            .write_event(out)
            .map_err(|e| ParseError::malformed(position, e.to_string()))?;
    }

    if !rewritten {
        return Err(ParseError::Empty);
    }

    String::from_utf8(writer.into_inner()).map_err(|e| ParseError::malformed(0, e.to_string()))
}

fn edit_attributes(
    element: &BytesStart<'_>,
    set: &[(&str, &str)],
    remove: &[&str],
    position: u64,
) -> Result<BytesStart<'static>, ParseError> {
    let mut edited = BytesStart::new(element_name(element));
    let mut pending: Vec<(&str, &str)> = set.to_vec();

    for attr in element.attributes() {
        let attr = attr.map_err(|e| ParseError::malformed(position, e.to_string()))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();

        if remove.contains(&key.as_str()) {
            continue;
        }
        match pending.iter().position(|(k, _)| *k == key) {
            Some(index) => {
                let replacement = pending.remove(index);
                edited.push_attribute(replacement);
            }
            None => {
                // Re-escaped so the value survives the switch to double quotes.
                let value = attr
                    .unescape_value()
                    .map_err(|e| ParseError::malformed(position, e.to_string()))?;
                edited.push_attribute((key.as_str(), &*value));
            }
        }
    }

    for attr in pending {
        edited.push_attribute(attr);
    }

    Ok(edited)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PLAIN: &str = r#"<fetch mapping="logical"><entity name="account"><attribute name="name"/></entity></fetch>"#;
    const CAPPED: &str = r#"<fetch top="10"><entity name="account"><attribute name="name"/></entity></fetch>"#;

    #[test]
    fn test_rewrite_without_cap() {
        let rewritten = rewrite(PLAIN, 25, 2).unwrap();
        let doc = QueryDocument::parse(&rewritten).unwrap();

        assert_eq!(doc.count(), Some(25));
        assert_eq!(doc.page(), Some(2));
        assert_eq!(doc.top(), None);
        assert_eq!(
            rewritten,
            r#"<fetch mapping="logical" page="2" count="25"><entity name="account"><attribute name="name"/></entity></fetch>"#
        );
    }

    #[test]
    fn test_rewrite_consumes_top() {
        let rewritten = rewrite(CAPPED, 25, 3).unwrap();
        let doc = QueryDocument::parse(&rewritten).unwrap();

        assert_eq!(doc.count(), Some(10));
        assert_eq!(doc.page(), Some(3));
        assert_eq!(doc.top(), None);
        assert!(!rewritten.contains("top="));
    }

    #[test]
    fn test_rewrite_replaces_existing_paging_in_place() {
        let query = r#"<fetch page="9" count="100" distinct="true"><entity name="a"/></fetch>"#;
        assert_eq!(
            rewrite(query, 20, 1).unwrap(),
            r#"<fetch page="1" count="20" distinct="true"><entity name="a"/></fetch>"#
        );
    }

    #[test]
    fn test_rewrite_is_not_idempotent() {
        let once = rewrite(CAPPED, 25, 1).unwrap();
        let twice = rewrite(&once, 25, 2).unwrap();
        let doc = QueryDocument::parse(&twice).unwrap();

        // The cap of 10 was consumed by the first rewrite.
        assert_eq!(doc.count(), Some(25));
        assert_eq!(doc.page(), Some(2));
    }

    #[test]
    fn test_rewrite_keeps_filters_and_entities() {
        let query = r#"<fetch><entity name="a"><filter type="and"><condition attribute="name" operator="like" value="%A &amp; B%"/></filter></entity></fetch>"#;
        let rewritten = rewrite(query, 5, 1).unwrap();
        assert!(rewritten.contains(r#"value="%A &amp; B%""#));
    }

    #[test]
    fn test_rewrite_requotes_single_quoted_attributes() {
        let query = r#"<fetch top='5' mapping='lo"gical'><entity name='a'/></fetch>"#;
        let rewritten = rewrite(query, 25, 1).unwrap();

        assert_eq!(
            rewritten,
            r#"<fetch mapping="lo&quot;gical" page="1" count="5"><entity name='a'/></fetch>"#
        );
        let doc = QueryDocument::parse(&rewritten).unwrap();
        assert_eq!(doc.count(), Some(5));
        assert_eq!(rewrite(&rewritten, 10, 2).unwrap().matches("lo&quot;gical").count(), 1);
    }

    #[test]
    fn test_set_fetch_attributes_on_empty_root() {
        assert_eq!(
            set_fetch_attributes("<fetch/>", &[("returntotalrecordcount", "true")], &[]).unwrap(),
            r#"<fetch returntotalrecordcount="true"/>"#
        );
    }

    #[test]
    fn test_rewrite_rejects_malformed_query() {
        assert!(rewrite("<fetch><entity>", 25, 1).is_err());
        assert!(rewrite("", 25, 1).is_err());
    }
}
