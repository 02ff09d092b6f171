//! Grid loading: query in, projected page out.

use futures::future::try_join_all;

use super::columns::Column;
use super::columns::GridHeader;
use super::columns::column_width;
use super::columns::sort_columns;
use super::window::PageWindow;
use crate::error::Error;
use crate::error::MetadataError;
use crate::error::ValidationError;
use crate::model::AttributeDescriptor;
use crate::model::EntityMetadata;
use crate::model::ProjectedItem;
use crate::model::RawRecord;
use crate::projection::ExecutionContext;
use crate::projection::ProjectionContext;
use crate::projection::RecordProjector;
use crate::query::LinkEntity;
use crate::query::QueryDocument;
use crate::query::rewrite;
use crate::service::DataService;

/// One loaded grid page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GridPage {
    items: Vec<ProjectedItem>,
    window: PageWindow,
    record_ids: Vec<String>,
}

impl GridPage {
    /// Creates a page from its items, collecting their record ids.
    pub fn new(items: Vec<ProjectedItem>, window: PageWindow) -> Self {
        let record_ids = items.iter().map(|item| item.id().to_string()).collect();
        Self {
            items,
            window,
            record_ids,
        }
    }

    /// Returns the projected items.
    pub fn items(&self) -> &[ProjectedItem] {
        &self.items
    }

    /// Consumes the page and returns the items.
    pub fn into_items(self) -> Vec<ProjectedItem> {
        self.items
    }

    /// Returns the pagination counters.
    pub fn window(&self) -> &PageWindow {
        &self.window
    }

    /// Returns the ids of the records on this page, in item order.
    pub fn record_ids(&self) -> &[String] {
        &self.record_ids
    }
}

/// Loads grid pages from a [`DataService`].
///
/// # Example
///
/// ```ignore
/// let loader = GridLoader::new(&service);
/// let page = loader.load_page(query, 25, 1).await?;
///
/// for item in page.items() {
///     println!("{}", item.id());
/// }
/// println!("{} of {}", page.window().last_item_index, page.window().total_count);
/// ```
pub struct GridLoader<'a, S: ?Sized> {
    service: &'a S,
}

impl<'a, S: DataService + ?Sized> GridLoader<'a, S> {
    /// Creates a loader over a service.
    pub fn new(service: &'a S) -> Self {
        Self { service }
    }

    /// Loads page `current_page` together with its pagination counters.
    ///
    /// The total count comes from a separate count query. Any failure aborts
    /// the whole page; no partial item list is returned.
    pub async fn load_page(&self, query: &str, page_size: u32, current_page: u32) -> Result<GridPage, Error> {
        let total_count = self.service.get_records_count(query).await?;
        log::debug!("Query selects {} records", total_count);

        let window_size = effective_page_size(query, page_size)?;
        let items = self.get_items(query, page_size, current_page).await?;
        let window = PageWindow::compute(total_count, items.len(), window_size, current_page);

        Ok(GridPage::new(items, window))
    }

    /// Loads and projects the records of page `current_page`.
    ///
    /// A `count` or `top` already present in the query overrides
    /// `page_size`.
    pub async fn get_items(
        &self,
        query: &str,
        page_size: u32,
        current_page: u32,
    ) -> Result<Vec<ProjectedItem>, Error> {
        let window_size = effective_page_size(query, page_size)?;
        let paged_query = rewrite(query, window_size, current_page)?;
        let doc = QueryDocument::parse(&paged_query)?;
        log::debug!(
            "Loading page {} of {} (window {})",
            current_page,
            doc.entity_name(),
            window_size
        );

        let records = self.service.retrieve_records(&paged_query).await?.entities;
        log::debug!("Retrieved {} records", records.len());

        let root_fields = root_field_names(&doc, &records);
        if root_fields.is_empty() && doc.link_entities().is_empty() {
            return Ok(Vec::new());
        }

        let aliases = if doc.is_aggregate() {
            Some(doc.aggregate_aliases()?)
        } else {
            None
        };

        let (metadata, timezones) = futures::try_join!(
            self.resolve_metadata(&doc, &root_fields),
            self.service.get_timezone_definitions(),
        )?;

        let plans = cell_plans(&doc, &root_fields, aliases.as_deref(), &metadata)?;
        let primary_id = metadata.root.primary_id_attribute();
        let projector = RecordProjector::new(self.service, &timezones);

        let items = records
            .iter()
            .map(|record| {
                let id = record.raw_text(&primary_id).unwrap_or_default();
                let mut item = ProjectedItem::new(id.as_str());
                for plan in &plans {
                    let context = ProjectionContext {
                        execution: plan.execution,
                        attribute: plan.attribute,
                        cell_key: &plan.cell_key,
                        entity_name: plan.entity_name,
                        record_id: &id,
                    };
                    item.insert(projector.project(record, &context));
                }
                item
            })
            .collect();

        Ok(items)
    }

    /// Loads the column descriptors and the root entity display name.
    ///
    /// Headers come from attribute display names; link-entity headers are
    /// suffixed with the join alias (or entity name). The allocated width is
    /// shared evenly between columns and the query's order flags its column.
    pub async fn load_header(&self, query: &str, allocated_width: u32) -> Result<GridHeader, Error> {
        let doc = QueryDocument::parse(query)?;

        let root_fields = if doc.root_attributes().is_empty() && !doc.entity_name().is_empty() {
            let probe = rewrite(query, 1, 1)?;
            let records = self.service.retrieve_records(&probe).await?.entities;
            root_field_names(&doc, &records)
        } else {
            doc.root_attribute_names()
        };

        let aliases = if doc.is_aggregate() {
            Some(doc.aggregate_aliases()?)
        } else {
            None
        };

        let (metadata, display_name) = futures::try_join!(
            self.resolve_metadata(&doc, &root_fields),
            self.service.get_entity_display_name(doc.entity_name()),
        )?;

        let plans = cell_plans(&doc, &root_fields, aliases.as_deref(), &metadata)?;
        let width = column_width(allocated_width, plans.len());

        let mut columns: Vec<Column> = plans
            .iter()
            .map(|plan| {
                let column = Column::new(plan.cell_key.as_str(), plan.attribute.logical_name.as_str(), plan.header())
                    .with_width(width);
                match plan.execution {
                    ExecutionContext::LinkEntity => column.link_entity(),
                    _ => column,
                }
            })
            .collect();
        sort_columns(&mut columns, doc.order());

        Ok(GridHeader {
            columns,
            display_name,
        })
    }

    /// Fetches root metadata and one metadata set per distinct link-entity
    /// name, concurrently.
    async fn resolve_metadata(&self, doc: &QueryDocument, root_fields: &[String]) -> Result<ResolvedMetadata, Error> {
        let groups = if doc.is_aggregate() {
            LinkGroups::default()
        } else {
            LinkGroups::from_links(doc.link_entities())
        };

        let root = self.service.get_entity_metadata(doc.entity_name(), root_fields);
        let links = try_join_all(
            groups
                .names
                .iter()
                .zip(&groups.fields)
                .map(|(name, fields)| self.service.get_entity_metadata(name, fields)),
        );

        let (root, links) = futures::try_join!(root, links).inspect_err(|e| {
            log::warn!("Metadata resolution failed: {}", e);
        })?;
        log::debug!("Resolved metadata for {} and {} link-entities", root.logical_name(), links.len());

        Ok(ResolvedMetadata {
            root,
            links,
            link_index: groups.index,
        })
    }
}

/// Page size the query will actually be paged with.
fn effective_page_size(query: &str, page_size: u32) -> Result<u32, Error> {
    let cap = QueryDocument::parse(query)?.explicit_cap();
    Ok(if cap > 0 { cap } else { page_size })
}

/// Declared root attributes, or the first record's own fields when the
/// query selects all attributes.
fn root_field_names(doc: &QueryDocument, records: &[RawRecord]) -> Vec<String> {
    let declared = doc.root_attribute_names();
    if !declared.is_empty() || doc.entity_name().is_empty() {
        return declared;
    }
    records.first().map(RawRecord::field_names).unwrap_or_default()
}

// =============================================================================
// Metadata plumbing
// =============================================================================

/// Link-entities grouped by logical name, fields unioned per name.
#[derive(Debug, Default)]
struct LinkGroups {
    names: Vec<String>,
    fields: Vec<Vec<String>>,
    /// Group of each link-entity, by document position.
    index: Vec<usize>,
}

impl LinkGroups {
    fn from_links(links: &[LinkEntity]) -> Self {
        let mut groups = Self::default();

        for link in links {
            let group = match groups.names.iter().position(|name| *name == link.name) {
                Some(group) => group,
                None => {
                    groups.names.push(link.name.clone());
                    groups.fields.push(Vec::new());
                    groups.names.len() - 1
                }
            };

            for field in link.attribute_names() {
                if !groups.fields[group].contains(&field) {
                    groups.fields[group].push(field);
                }
            }
            groups.index.push(group);
        }

        groups
    }
}

struct ResolvedMetadata {
    root: EntityMetadata,
    links: Vec<EntityMetadata>,
    link_index: Vec<usize>,
}

impl ResolvedMetadata {
    fn for_link(&self, position: usize, link: &LinkEntity) -> Result<&EntityMetadata, MetadataError> {
        self.link_index
            .get(position)
            .and_then(|group| self.links.get(*group))
            .ok_or_else(|| MetadataError::entity_not_found(link.name.as_str()))
    }
}

/// How one column of every row is projected.
struct CellPlan<'m> {
    execution: ExecutionContext<'m>,
    attribute: &'m AttributeDescriptor,
    cell_key: String,
    entity_name: &'m str,
    link_label: Option<&'m str>,
}

impl CellPlan<'_> {
    fn header(&self) -> String {
        match (self.execution, self.link_label) {
            (ExecutionContext::Aggregate { alias }, _) => alias.to_string(),
            (_, Some(link)) => format!("{} ({})", self.attribute.label(), link),
            (_, None) => self.attribute.label().to_string(),
        }
    }
}

fn cell_plans<'m>(
    doc: &'m QueryDocument,
    root_fields: &'m [String],
    aliases: Option<&'m [String]>,
    metadata: &'m ResolvedMetadata,
) -> Result<Vec<CellPlan<'m>>, Error> {
    let mut plans = Vec::with_capacity(root_fields.len());
    let root_entity = doc.entity_name();

    for (index, field) in root_fields.iter().enumerate() {
        let attribute = metadata.root.require_attribute(field)?;
        let (execution, cell_key) = match aliases {
            Some(aliases) => {
                let alias = aliases
                    .get(index)
                    .ok_or_else(|| ValidationError::MissingAggregateAlias {
                        attribute: field.clone(),
                    })?;
                (ExecutionContext::Aggregate { alias: alias.as_str() }, alias.clone())
            }
            None => (
                ExecutionContext::Root {
                    primary_name: metadata.root.primary_name_attribute(),
                },
                field.clone(),
            ),
        };

        plans.push(CellPlan {
            execution,
            attribute,
            cell_key,
            entity_name: root_entity,
            link_label: None,
        });
    }

    // Aggregate rows carry only their aliased columns.
    if aliases.is_some() {
        return Ok(plans);
    }

    for (position, link) in doc.link_entities().iter().enumerate() {
        let link_metadata = metadata.for_link(position, link)?;
        for attribute_ref in &link.attributes {
            let attribute = link_metadata.require_attribute(&attribute_ref.name)?;
            plans.push(CellPlan {
                execution: ExecutionContext::LinkEntity,
                attribute,
                cell_key: link.cell_key(position, attribute_ref),
                entity_name: link_metadata.logical_name(),
                link_label: Some(link.alias.as_deref().unwrap_or(&link.name)),
            });
        }
    }

    Ok(plans)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::AttributeRef;

    fn link(name: &str, fields: &[&str]) -> LinkEntity {
        LinkEntity {
            name: name.to_string(),
            alias: None,
            attributes: fields
                .iter()
                .map(|f| AttributeRef {
                    name: f.to_string(),
                    alias: None,
                })
                .collect(),
        }
    }

    #[test]
    fn test_link_groups_merge_fields_per_name() {
        let links = vec![
            link("contact", &["fullname"]),
            link("systemuser", &["fullname"]),
            link("contact", &["emailaddress1", "fullname"]),
        ];

        let groups = LinkGroups::from_links(&links);
        assert_eq!(groups.names, vec!["contact", "systemuser"]);
        assert_eq!(groups.fields[0], vec!["fullname", "emailaddress1"]);
        assert_eq!(groups.index, vec![0, 1, 0]);
    }

    #[test]
    fn test_effective_page_size() {
        assert_eq!(
            effective_page_size("<fetch><entity name='account'/></fetch>", 25).unwrap(),
            25
        );
        assert_eq!(
            effective_page_size("<fetch top='5'><entity name='account'/></fetch>", 25).unwrap(),
            5
        );
        assert_eq!(
            effective_page_size("<fetch count='40'><entity name='account'/></fetch>", 25).unwrap(),
            40
        );
    }

    #[test]
    fn test_select_all_uses_first_record_order() {
        let doc = QueryDocument::parse("<fetch><entity name='account'/></fetch>").unwrap();
        let records = vec![
            RawRecord::new()
                .set("name", "Contoso")
                .set("accountid", "1")
                .set("_primarycontactid_value", "c-1"),
            RawRecord::new().set("accountid", "2"),
        ];

        assert_eq!(
            root_field_names(&doc, &records),
            vec!["name", "accountid", "primarycontactid"]
        );
        assert!(root_field_names(&doc, &[]).is_empty());
    }
}
