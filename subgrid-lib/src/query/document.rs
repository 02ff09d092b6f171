//! Structural walk over a FetchXML document.
//!
//! A query is read once, front to back, and every fact the grid needs is
//! collected on the way: the root entity, its attributes, each
//! `<link-entity>` (kept in document order, nested ones included), the first
//! `<order>` and the paging attributes on `<fetch>`. Link-entities are
//! identified by their position in that walk, so two joins on the same
//! entity never share attributes.

use quick_xml::Reader;
use quick_xml::events::BytesStart;
use quick_xml::events::Event;

use crate::error::ParseError;
use crate::error::ValidationError;

/// Literal the `aggregate` attribute must carry for an aggregate query.
pub const AGGREGATE_LITERAL: &str = "true";

/// An `<attribute>` element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeRef {
    /// Logical name of the field.
    pub name: String,
    /// Declared alias, if any.
    pub alias: Option<String>,
}

/// A `<link-entity>` element and the attributes declared directly under it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkEntity {
    /// Logical name of the joined entity.
    pub name: String,
    /// Declared alias of the join, if any.
    pub alias: Option<String>,
    /// Attributes selected from the joined entity.
    pub attributes: Vec<AttributeRef>,
}

impl LinkEntity {
    /// Returns the logical names of the selected attributes.
    pub fn attribute_names(&self) -> Vec<String> {
        self.attributes.iter().map(|a| a.name.clone()).collect()
    }

    /// Resolves the key under which a link-entity attribute appears in a
    /// result record.
    ///
    /// The attribute's own alias wins; otherwise the join alias qualifies the
    /// field; otherwise the platform's synthesized `{name}{position + 1}` join
    /// alias is used.
    pub fn cell_key(&self, position: usize, attribute: &AttributeRef) -> String {
        if let Some(alias) = attribute.alias.as_deref().filter(|a| !a.is_empty()) {
            return alias.to_string();
        }
        match self.alias.as_deref().filter(|a| !a.is_empty()) {
            Some(link_alias) => format!("{}.{}", link_alias, attribute.name),
            None => format!("{}{}.{}", self.name, position + 1, attribute.name),
        }
    }
}

/// The first `<order>` directive of a query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderDirective {
    /// Attribute name, or alias when ordering an aggregate.
    pub field: String,
    /// `descending="true"` was set.
    pub descending: bool,
}

/// Structural facts of a FetchXML query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryDocument {
    entity_name: String,
    root_attributes: Vec<AttributeRef>,
    link_entities: Vec<LinkEntity>,
    aggregate: bool,
    order: Option<OrderDirective>,
    count: Option<u32>,
    top: Option<u32>,
    page: Option<u32>,
}

impl QueryDocument {
    /// Parses a FetchXML string.
    ///
    /// # Errors
    ///
    /// Returns a [`ParseError`] if the XML is malformed, has no root, has a
    /// root other than `<fetch>`, or leaves an element unclosed.
    pub fn parse(query: &str) -> Result<Self, ParseError> {
        let mut reader = Reader::from_str(query);
        let mut walker = Walker::default();

        loop {
            let event = reader.read_event();
            let position = reader.buffer_position() as u64;

            match event {
                Ok(Event::Start(element)) => {
                    let frame = walker.open(&element, position)?;
                    walker.stack.push((element_name(&element), frame));
                }
                Ok(Event::Empty(element)) => {
                    walker.open(&element, position)?;
                }
                Ok(Event::End(_)) => {
                    walker.stack.pop();
                }
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(err) => return Err(ParseError::malformed(position, err.to_string())),
            }
        }

        if let Some((name, _)) = walker.stack.pop() {
            return Err(ParseError::Unclosed { name });
        }
        if !walker.root_seen {
            return Err(ParseError::Empty);
        }

        Ok(walker.doc)
    }

    /// Returns the root entity's logical name, or `""` without an `<entity>`.
    pub fn entity_name(&self) -> &str {
        &self.entity_name
    }

    /// Returns the attributes declared directly under the root entity.
    pub fn root_attributes(&self) -> &[AttributeRef] {
        &self.root_attributes
    }

    /// Returns the root attribute names in declaration order.
    pub fn root_attribute_names(&self) -> Vec<String> {
        self.root_attributes.iter().map(|a| a.name.clone()).collect()
    }

    /// Returns the alias of each root attribute in declaration order.
    pub fn alias_names(&self) -> Vec<Option<String>> {
        self.root_attributes.iter().map(|a| a.alias.clone()).collect()
    }

    /// Returns the alias of each root attribute, requiring every one to be set.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::MissingAggregateAlias`] for the first
    /// attribute without an alias.
    pub fn aggregate_aliases(&self) -> Result<Vec<String>, ValidationError> {
        self.root_attributes
            .iter()
            .map(|attribute| {
                attribute
                    .alias
                    .clone()
                    .filter(|alias| !alias.is_empty())
                    .ok_or_else(|| ValidationError::MissingAggregateAlias {
                        attribute: attribute.name.clone(),
                    })
            })
            .collect()
    }

    /// Returns the link-entities in document order.
    pub fn link_entities(&self) -> &[LinkEntity] {
        &self.link_entities
    }

    /// Returns `true` if `<fetch aggregate="true">`.
    pub fn is_aggregate(&self) -> bool {
        self.aggregate
    }

    /// Returns the first order directive, if any.
    pub fn order(&self) -> Option<&OrderDirective> {
        self.order.as_ref()
    }

    /// Returns the positive `count` attribute of `<fetch>`, if any.
    pub fn count(&self) -> Option<u32> {
        self.count
    }

    /// Returns the positive `top` attribute of `<fetch>`, if any.
    pub fn top(&self) -> Option<u32> {
        self.top
    }

    /// Returns the positive `page` attribute of `<fetch>`, if any.
    pub fn page(&self) -> Option<u32> {
        self.page
    }

    /// Returns the record cap already present in the query: `count` first,
    /// then `top`, `0` when neither is set.
    pub fn explicit_cap(&self) -> u32 {
        self.count.or(self.top).unwrap_or(0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Frame {
    Fetch,
    Entity,
    Link(usize),
    Other,
}

#[derive(Default)]
struct Walker {
    doc: QueryDocument,
    stack: Vec<(String, Frame)>,
    root_seen: bool,
    entity_seen: bool,
}

impl Walker {
    /// Records one opening (or self-closing) element and returns the frame it
    /// opens.
    fn open(&mut self, element: &BytesStart<'_>, position: u64) -> Result<Frame, ParseError> {
        let name = element_name(element);
        let parent = self.stack.last().map(|(_, frame)| *frame);

        let frame = match (parent, name.as_str()) {
            (None, "fetch") if !self.root_seen => {
                self.root_seen = true;
                self.read_fetch(element, position)?;
                Frame::Fetch
            }
            (None, _) if self.root_seen => return Err(ParseError::TrailingElement { found: name }),
            (None, _) => return Err(ParseError::UnexpectedRoot { found: name }),
            (Some(Frame::Fetch), "entity") if !self.entity_seen => {
                self.entity_seen = true;
                self.doc.entity_name = attribute_value(element, "name", position)?.unwrap_or_default();
                Frame::Entity
            }
            (Some(Frame::Entity), "attribute") => {
                let attribute = read_attribute(element, position)?;
                self.doc.root_attributes.push(attribute);
                Frame::Other
            }
            (Some(Frame::Link(index)), "attribute") => {
                let attribute = read_attribute(element, position)?;
                self.doc.link_entities[index].attributes.push(attribute);
                Frame::Other
            }
            (Some(Frame::Entity | Frame::Link(_)), "link-entity") => {
                let link_name = attribute_value(element, "name", position)?.ok_or(
                    ParseError::MissingAttribute {
                        element: "link-entity",
                        attribute: "name",
                    },
                )?;
                self.doc.link_entities.push(LinkEntity {
                    name: link_name,
                    alias: attribute_value(element, "alias", position)?,
                    attributes: Vec::new(),
                });
                Frame::Link(self.doc.link_entities.len() - 1)
            }
            (Some(_), "order") => {
                if self.doc.order.is_none() {
                    self.doc.order = read_order(element, position)?;
                }
                Frame::Other
            }
            _ => Frame::Other,
        };

        Ok(frame)
    }

    fn read_fetch(&mut self, element: &BytesStart<'_>, position: u64) -> Result<(), ParseError> {
        self.doc.aggregate =
            attribute_value(element, "aggregate", position)?.as_deref() == Some(AGGREGATE_LITERAL);
        self.doc.count = positive(attribute_value(element, "count", position)?);
        self.doc.top = positive(attribute_value(element, "top", position)?);
        self.doc.page = positive(attribute_value(element, "page", position)?);
        Ok(())
    }
}

fn read_attribute(element: &BytesStart<'_>, position: u64) -> Result<AttributeRef, ParseError> {
    let name = attribute_value(element, "name", position)?.ok_or(ParseError::MissingAttribute {
        element: "attribute",
        attribute: "name",
    })?;
    Ok(AttributeRef {
        name,
        alias: attribute_value(element, "alias", position)?,
    })
}

fn read_order(element: &BytesStart<'_>, position: u64) -> Result<Option<OrderDirective>, ParseError> {
    let field = match attribute_value(element, "attribute", position)? {
        Some(attribute) => attribute,
        None => match attribute_value(element, "alias", position)? {
            Some(alias) => alias,
            None => return Ok(None),
        },
    };
    let descending = attribute_value(element, "descending", position)?.as_deref() == Some("true");
    Ok(Some(OrderDirective { field, descending }))
}

pub(crate) fn element_name(element: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(element.name().as_ref()).into_owned()
}

/// Returns the unescaped value of an XML attribute.
pub(crate) fn attribute_value(
    element: &BytesStart<'_>,
    key: &str,
    position: u64,
) -> Result<Option<String>, ParseError> {
    for attr in element.attributes() {
        let attr = attr.map_err(|e| ParseError::malformed(position, e.to_string()))?;
        if attr.key.as_ref() == key.as_bytes() {
            let value = attr
                .unescape_value()
                .map_err(|e| ParseError::malformed(position, e.to_string()))?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}

/// Reads a paging number the way the platform does: positive integers only.
fn positive(value: Option<String>) -> Option<u32> {
    value
        .and_then(|v| v.trim().parse::<u32>().ok())
        .filter(|n| *n > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ACCOUNTS: &str = r#"<fetch version="1.0" mapping="logical">
        <entity name="account">
            <attribute name="name"/>
            <attribute name="revenue" alias="rev"/>
            <link-entity name="contact" from="contactid" to="primarycontactid" alias="pc">
                <attribute name="fullname"/>
                <link-entity name="systemuser" from="systemuserid" to="owninguser">
                    <attribute name="fullname" alias="owner"/>
                </link-entity>
            </link-entity>
            <link-entity name="contact" from="parentcustomerid" to="accountid">
                <attribute name="emailaddress1"/>
            </link-entity>
            <filter type="and"><condition attribute="statecode" operator="eq" value="0"/></filter>
            <order attribute="name" descending="true"/>
            <order attribute="revenue"/>
        </entity>
    </fetch>"#;

    #[test]
    fn test_walk_collects_structure() {
        let doc = QueryDocument::parse(ACCOUNTS).unwrap();

        assert_eq!(doc.entity_name(), "account");
        assert_eq!(doc.root_attribute_names(), vec!["name", "revenue"]);
        assert_eq!(doc.alias_names(), vec![None, Some("rev".to_string())]);
        assert_eq!(
            doc.order(),
            Some(&OrderDirective {
                field: "name".to_string(),
                descending: true
            })
        );
        assert!(!doc.is_aggregate());
        assert_eq!(doc.explicit_cap(), 0);
    }

    #[test]
    fn test_link_entities_kept_apart_by_position() {
        let doc = QueryDocument::parse(ACCOUNTS).unwrap();
        let links = doc.link_entities();

        assert_eq!(links.len(), 3);
        assert_eq!(links[0].name, "contact");
        assert_eq!(links[0].attribute_names(), vec!["fullname"]);
        assert_eq!(links[1].name, "systemuser");
        assert_eq!(links[2].name, "contact");
        assert_eq!(links[2].attribute_names(), vec!["emailaddress1"]);
    }

    #[test]
    fn test_cell_key_resolution() {
        let doc = QueryDocument::parse(ACCOUNTS).unwrap();
        let links = doc.link_entities();

        assert_eq!(links[0].cell_key(0, &links[0].attributes[0]), "pc.fullname");
        assert_eq!(links[1].cell_key(1, &links[1].attributes[0]), "owner");
        assert_eq!(links[2].cell_key(2, &links[2].attributes[0]), "contact3.emailaddress1");
    }

    #[test]
    fn test_paging_attributes() {
        let doc = QueryDocument::parse(r#"<fetch count="50" top="abc" page="2"><entity name="a"/></fetch>"#).unwrap();
        assert_eq!(doc.count(), Some(50));
        assert_eq!(doc.top(), None);
        assert_eq!(doc.page(), Some(2));
        assert_eq!(doc.explicit_cap(), 50);

        let doc = QueryDocument::parse(r#"<fetch top="7"><entity name="a"/></fetch>"#).unwrap();
        assert_eq!(doc.explicit_cap(), 7);

        let doc = QueryDocument::parse(r#"<fetch count="0" top="0"><entity name="a"/></fetch>"#).unwrap();
        assert_eq!(doc.explicit_cap(), 0);
    }

    #[test]
    fn test_aggregate_aliases() {
        let doc = QueryDocument::parse(
            r#"<fetch aggregate="true"><entity name="account">
                <attribute name="accountid" alias="cnt" aggregate="count"/>
                <attribute name="revenue" alias="total" aggregate="sum"/>
            </entity></fetch>"#,
        )
        .unwrap();
        assert!(doc.is_aggregate());
        assert_eq!(doc.aggregate_aliases().unwrap(), vec!["cnt", "total"]);

        let doc = QueryDocument::parse(
            r#"<fetch aggregate="true"><entity name="account">
                <attribute name="accountid" alias="cnt" aggregate="count"/>
                <attribute name="revenue" aggregate="sum"/>
            </entity></fetch>"#,
        )
        .unwrap();
        assert_eq!(
            doc.aggregate_aliases(),
            Err(ValidationError::MissingAggregateAlias {
                attribute: "revenue".to_string()
            })
        );
    }

    #[test]
    fn test_order_by_alias() {
        let doc = QueryDocument::parse(
            r#"<fetch><entity name="a"><order alias="cnt" descending="false"/></entity></fetch>"#,
        )
        .unwrap();
        assert_eq!(
            doc.order(),
            Some(&OrderDirective {
                field: "cnt".to_string(),
                descending: false
            })
        );
    }

    #[test]
    fn test_unescapes_attribute_values() {
        let doc = QueryDocument::parse(r#"<fetch><entity name="a&amp;b"/></fetch>"#).unwrap();
        assert_eq!(doc.entity_name(), "a&b");
    }

    #[test]
    fn test_malformed_documents() {
        assert_eq!(QueryDocument::parse(""), Err(ParseError::Empty));
        assert_eq!(QueryDocument::parse("not xml at all"), Err(ParseError::Empty));
        assert_eq!(
            QueryDocument::parse("<fetch><entity name=\"a\">"),
            Err(ParseError::Unclosed {
                name: "entity".to_string()
            })
        );
        assert_eq!(
            QueryDocument::parse("<query/>"),
            Err(ParseError::UnexpectedRoot {
                found: "query".to_string()
            })
        );
        assert_eq!(
            QueryDocument::parse("<fetch/><fetch/>"),
            Err(ParseError::TrailingElement {
                found: "fetch".to_string()
            })
        );
        assert!(matches!(
            QueryDocument::parse("<fetch><entity></fetch>"),
            Err(ParseError::Malformed { .. })
        ));
        assert!(matches!(
            QueryDocument::parse(r#"<fetch><entity name="a"><attribute alias="x"/></entity></fetch>"#),
            Err(ParseError::MissingAttribute {
                element: "attribute",
                ..
            })
        ));
    }
}
