//! Record projection: raw record in, display-ready cells out.
//!
//! Which value a cell shows is decided by the execution context (aggregate
//! row, root entity, link-entity) and the attribute type. The rules are
//! ordered, first match wins:
//!
//! | Context / type | Display | Linkable |
//! |---|---|---|
//! | aggregate | raw value under the alias | no |
//! | whole number | duration / time zone formatter | no |
//! | money, picklist, datetime, multi-select, two options | formatted value | no |
//! | link-entity lookup, owner, customer | lookup formatted value | yes |
//! | link-entity, anything else | raw value | no |
//! | root primary name attribute | raw value | yes |
//! | root lookup, owner, customer | lookup formatted value | yes |
//! | root, anything else | raw value | no |
//!
//! A missing side-channel value yields [`DisplayValue::Unresolved`]; a
//! missing raw value in the fallback rows yields [`DisplayValue::Empty`].

use crate::model::AttributeDescriptor;
use crate::model::AttributeType;
use crate::model::DisplayValue;
use crate::model::FieldScope;
use crate::model::ProjectedCell;
use crate::model::RawRecord;
use crate::model::RecordLink;
use crate::model::TimeZoneDefinition;
use crate::service::MetadataResolver;

/// Where the attribute being projected comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionContext<'a> {
    /// Aggregate query; the value lives under the attribute's alias.
    Aggregate { alias: &'a str },
    /// Attribute of the root entity.
    Root { primary_name: Option<&'a str> },
    /// Attribute of a link-entity.
    LinkEntity,
}

/// Everything the projector needs to know about one cell.
#[derive(Debug, Clone, Copy)]
pub struct ProjectionContext<'a> {
    /// Rule context.
    pub execution: ExecutionContext<'a>,
    /// Metadata of the attribute.
    pub attribute: &'a AttributeDescriptor,
    /// Key of the cell, which is also the wire key of root and link values.
    pub cell_key: &'a str,
    /// Logical name of the entity owning the attribute.
    pub entity_name: &'a str,
    /// Id of the root record, used as the primary name link target.
    pub record_id: &'a str,
}

/// Turns raw record values into cells.
pub struct RecordProjector<'a, R: ?Sized> {
    resolver: &'a R,
    timezones: &'a [TimeZoneDefinition],
}

impl<'a, R: MetadataResolver + ?Sized> RecordProjector<'a, R> {
    /// Creates a projector rendering whole numbers through `resolver`.
    pub fn new(resolver: &'a R, timezones: &'a [TimeZoneDefinition]) -> Self {
        Self { resolver, timezones }
    }

    /// Projects one attribute of a record into a cell.
    pub fn project(&self, record: &RawRecord, context: &ProjectionContext<'_>) -> ProjectedCell {
        let (display, linkable, target) = self.resolve(record, context);

        ProjectedCell {
            key: context.cell_key.to_string(),
            display,
            linkable,
            attribute_type: context.attribute.attribute_type,
            entity_name: context.entity_name.to_string(),
            field_name: context.attribute.logical_name.clone(),
            is_link_entity: matches!(context.execution, ExecutionContext::LinkEntity),
            aggregate: matches!(context.execution, ExecutionContext::Aggregate { .. }),
            target,
        }
    }

    fn resolve(
        &self,
        record: &RawRecord,
        context: &ProjectionContext<'_>,
    ) -> (DisplayValue, bool, Option<RecordLink>) {
        use AttributeType::*;

        let key = context.cell_key;
        let attribute = context.attribute;

        match (context.execution, attribute.attribute_type) {
            (ExecutionContext::Aggregate { alias }, _) => {
                (DisplayValue::from_raw(record.raw_value(alias)), false, None)
            }
            (_, WholeNumber) => {
                let text = self.resolver.whole_number_display(
                    attribute.format.as_deref(),
                    record,
                    key,
                    self.timezones,
                );
                (DisplayValue::Text(text), false, None)
            }
            (_, Money | PickList | DateTime | MultiSelectPickList | TwoOptions) => {
                (DisplayValue::from_side_channel(record.formatted_value(key)), false, None)
            }
            (ExecutionContext::LinkEntity, Lookup | Owner | Customer) => (
                DisplayValue::from_side_channel(record.lookup_formatted_value(key, FieldScope::LinkEntity)),
                true,
                record.lookup_target(key, FieldScope::LinkEntity),
            ),
            (ExecutionContext::LinkEntity, Other) => (raw_or_empty(record, key), false, None),
            (ExecutionContext::Root { primary_name: Some(primary) }, _) if primary == attribute.logical_name => (
                DisplayValue::from_raw(record.raw_value(key)),
                true,
                Some(RecordLink::new(context.entity_name, context.record_id)),
            ),
            (ExecutionContext::Root { .. }, Lookup | Owner | Customer) => (
                DisplayValue::from_side_channel(record.lookup_formatted_value(key, FieldScope::Root)),
                true,
                record.lookup_target(key, FieldScope::Root),
            ),
            (ExecutionContext::Root { .. }, Other) => (raw_or_empty(record, key), false, None),
        }
    }
}

fn raw_or_empty(record: &RawRecord, key: &str) -> DisplayValue {
    match record.raw_value(key) {
        Some(value) => DisplayValue::Raw(value.clone()),
        None => DisplayValue::Empty,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::Value;

    use super::*;
    use crate::service::MemoryService;

    fn project(
        record: &RawRecord,
        execution: ExecutionContext<'_>,
        attribute: &AttributeDescriptor,
        cell_key: &str,
    ) -> ProjectedCell {
        let service = MemoryService::new();
        let timezones = [TimeZoneDefinition::new(4, "Pacific Time")];
        let projector = RecordProjector::new(&service, &timezones);
        let context = ProjectionContext {
            execution,
            attribute,
            cell_key,
            entity_name: "account",
            record_id: "acc-1",
        };
        projector.project(record, &context)
    }

    const ROOT: ExecutionContext<'static> = ExecutionContext::Root {
        primary_name: Some("name"),
    };

    #[test]
    fn test_money_uses_formatted_value() {
        let record = RawRecord::new()
            .set("revenue", 1000.5)
            .set_formatted("revenue", "$1,000.50");
        let attribute = AttributeDescriptor::new("revenue", AttributeType::Money);

        let cell = project(&record, ROOT, &attribute, "revenue");
        assert_eq!(cell.display, DisplayValue::Text("$1,000.50".to_string()));
        assert!(!cell.linkable);
        assert!(!cell.is_link_entity);
    }

    #[test]
    fn test_formatted_types_without_side_key_are_unresolved() {
        let record = RawRecord::new().set("statuscode", 1);
        let attribute = AttributeDescriptor::new("statuscode", AttributeType::PickList);

        let cell = project(&record, ROOT, &attribute, "statuscode");
        assert!(cell.display.is_unresolved());
    }

    #[test]
    fn test_link_entity_lookup() {
        let record = RawRecord::new()
            .set("pc.parentcustomerid", "f00d")
            .set_formatted("pc.parentcustomerid", "Fabrikam")
            .set_lookup_logical_name("pc.parentcustomerid", "account");
        let attribute = AttributeDescriptor::new("parentcustomerid", AttributeType::Customer);

        let cell = project(&record, ExecutionContext::LinkEntity, &attribute, "pc.parentcustomerid");
        assert_eq!(cell.display, DisplayValue::Text("Fabrikam".to_string()));
        assert!(cell.linkable);
        assert!(cell.is_link_entity);
        assert_eq!(cell.target, Some(RecordLink::new("account", "f00d")));

        let cell = project(&RawRecord::new(), ExecutionContext::LinkEntity, &attribute, "pc.parentcustomerid");
        assert!(cell.linkable);
        assert_eq!(cell.display, DisplayValue::Unresolved);
    }

    #[test]
    fn test_link_entity_raw_and_missing() {
        let record = RawRecord::new().set("pc.fullname", "Jane Doe");
        let attribute = AttributeDescriptor::new("fullname", AttributeType::Other);

        let cell = project(&record, ExecutionContext::LinkEntity, &attribute, "pc.fullname");
        assert_eq!(cell.display, DisplayValue::Raw(Value::from("Jane Doe")));
        assert!(!cell.linkable);

        let cell = project(&RawRecord::new(), ExecutionContext::LinkEntity, &attribute, "pc.fullname");
        assert_eq!(cell.display, DisplayValue::Empty);
    }

    #[test]
    fn test_primary_name_links_to_record() {
        let record = RawRecord::new().set("name", "Contoso");
        let attribute = AttributeDescriptor::new("name", AttributeType::Other);

        let cell = project(&record, ROOT, &attribute, "name");
        assert_eq!(cell.display.text(), "Contoso");
        assert!(cell.linkable);
        assert_eq!(cell.target, Some(RecordLink::new("account", "acc-1")));
    }

    #[test]
    fn test_root_lookup_uses_value_key() {
        let record = RawRecord::new()
            .set("_primarycontactid_value", "c-1")
            .set_formatted("_primarycontactid_value", "John Smith")
            .set_lookup_logical_name("_primarycontactid_value", "contact");
        let attribute = AttributeDescriptor::new("primarycontactid", AttributeType::Lookup);

        let cell = project(&record, ROOT, &attribute, "primarycontactid");
        assert_eq!(cell.display.text(), "John Smith");
        assert!(cell.linkable);
        assert_eq!(cell.target, Some(RecordLink::new("contact", "c-1")));
    }

    #[test]
    fn test_root_fallbacks() {
        let record = RawRecord::new().set("telephone1", "555-0100");
        let attribute = AttributeDescriptor::new("telephone1", AttributeType::Other);

        let cell = project(&record, ROOT, &attribute, "telephone1");
        assert_eq!(cell.display.text(), "555-0100");
        assert!(!cell.linkable);

        let missing = AttributeDescriptor::new("fax", AttributeType::Other);
        let cell = project(&record, ROOT, &missing, "fax");
        assert_eq!(cell.display, DisplayValue::Empty);
        assert!(!cell.linkable);
    }

    #[test]
    fn test_whole_number_goes_through_formatter() {
        let record = RawRecord::new().set("timezone", 4).set("actualdurationminutes", 90);
        let timezone = AttributeDescriptor::new("timezone", AttributeType::WholeNumber).with_format("TimeZone");
        let duration =
            AttributeDescriptor::new("actualdurationminutes", AttributeType::WholeNumber).with_format("Duration");

        assert_eq!(project(&record, ROOT, &timezone, "timezone").display.text(), "Pacific Time");
        assert_eq!(
            project(&record, ROOT, &duration, "actualdurationminutes").display.text(),
            "1.5 hours"
        );
    }

    #[test]
    fn test_aggregate_reads_alias() {
        let record = RawRecord::new().set("cnt", 12).set("total", 3400.0);
        let count = AttributeDescriptor::new("accountid", AttributeType::Other);
        let total = AttributeDescriptor::new("revenue", AttributeType::Money);

        let cell = project(&record, ExecutionContext::Aggregate { alias: "cnt" }, &count, "cnt");
        assert_eq!(cell.display, DisplayValue::Raw(Value::from(12)));
        assert!(cell.aggregate);
        assert!(!cell.linkable);

        let cell = project(&record, ExecutionContext::Aggregate { alias: "total" }, &total, "total");
        assert_eq!(cell.display, DisplayValue::Raw(Value::from(3400.0)));
        assert_eq!(cell.key, "total");
        assert_eq!(cell.field_name, "revenue");
    }
}
