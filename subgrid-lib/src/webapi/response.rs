//! Web API response shapes.

use serde::Deserialize;
use serde_json::Value;

use crate::model::AttributeDescriptor;
use crate::model::AttributeType;
use crate::model::EntityMetadata;

/// Generic `{"value": [...]}` collection.
#[derive(Debug, Deserialize)]
pub(crate) struct ValueResponse<T> {
    #[serde(default = "Vec::new")]
    pub value: Vec<T>,
}

/// FetchXML response read only for its count.
#[derive(Debug, Deserialize)]
pub(crate) struct CountResponse {
    #[serde(rename = "@Microsoft.Dynamics.CRM.totalrecordcount")]
    pub total_record_count: Option<i64>,
    #[serde(default)]
    pub value: Vec<Value>,
}

impl CountResponse {
    /// The platform count, or the rows returned when it was not computed.
    pub fn count(&self) -> usize {
        match self.total_record_count {
            Some(total) if total >= 0 => total as usize,
            _ => self.value.len(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Label {
    user_localized_label: Option<LocalizedLabel>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct LocalizedLabel {
    label: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct TypeName {
    value: String,
}

fn label_text(label: Option<Label>) -> Option<String> {
    label
        .and_then(|l| l.user_localized_label)
        .map(|l| l.label)
        .filter(|l| !l.is_empty())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AttributeDefinition {
    logical_name: String,
    attribute_type: Option<String>,
    attribute_type_name: Option<TypeName>,
    format: Option<String>,
    display_name: Option<Label>,
}

impl AttributeDefinition {
    fn into_descriptor(self) -> AttributeDescriptor {
        // Multi-select option sets come back as "Virtual"; the type name tells them apart.
        let platform_name = match (self.attribute_type.as_deref(), &self.attribute_type_name) {
            (Some("Virtual") | None, Some(type_name)) => type_name.value.as_str(),
            (Some(name), _) => name,
            (None, None) => "",
        };

        AttributeDescriptor {
            attribute_type: AttributeType::from_platform_name(platform_name),
            logical_name: self.logical_name,
            format: self.format,
            display_name: label_text(self.display_name),
        }
    }
}

/// `EntityDefinitions(LogicalName='...')` with its attributes expanded.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct EntityDefinition {
    logical_name: String,
    entity_set_name: Option<String>,
    primary_id_attribute: Option<String>,
    primary_name_attribute: Option<String>,
    display_name: Option<Label>,
    #[serde(default)]
    attributes: Vec<AttributeDefinition>,
}

/// What the service keeps per entity.
#[derive(Debug, Clone)]
pub(crate) struct ResolvedEntity {
    pub entity_set_name: String,
    pub metadata: EntityMetadata,
}

impl EntityDefinition {
    pub fn into_resolved(self) -> ResolvedEntity {
        let entity_set_name = self
            .entity_set_name
            .unwrap_or_else(|| format!("{}s", self.logical_name));

        let mut metadata = EntityMetadata::new(self.logical_name);
        if let Some(primary_id) = self.primary_id_attribute {
            metadata = metadata.with_primary_id(primary_id);
        }
        if let Some(primary_name) = self.primary_name_attribute {
            metadata = metadata.with_primary_name(primary_name);
        }
        if let Some(display_name) = label_text(self.display_name) {
            metadata = metadata.with_display_name(display_name);
        }
        for attribute in self.attributes {
            metadata = metadata.with_attribute(attribute.into_descriptor());
        }

        ResolvedEntity {
            entity_set_name,
            metadata,
        }
    }
}
