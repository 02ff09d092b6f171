//! Entity and attribute metadata types

use serde::Deserialize;
use serde::Serialize;

use crate::error::MetadataError;

/// Attribute types that drive cell formatting.
///
/// Platform types without their own formatting rule collapse into
/// [`AttributeType::Other`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttributeType {
    /// Integer; rendered through its format (duration, time zone, ...).
    WholeNumber,
    /// Currency value.
    Money,
    /// Option set, including state and status.
    PickList,
    /// Date and time.
    DateTime,
    /// Multi-select option set.
    MultiSelectPickList,
    /// Boolean (two options).
    TwoOptions,
    /// Lookup to another entity.
    Lookup,
    /// Owner lookup (user or team).
    Owner,
    /// Customer lookup (account or contact).
    Customer,
    /// Anything else (text, decimal, unique identifier, ...).
    Other,
}

impl AttributeType {
    /// Maps a Web API `AttributeType` name.
    pub fn from_platform_name(name: &str) -> Self {
        match name {
            "Integer" => Self::WholeNumber,
            "Money" => Self::Money,
            "Picklist" | "State" | "Status" => Self::PickList,
            "DateTime" => Self::DateTime,
            "MultiSelectPicklist" | "MultiSelectPicklistType" => Self::MultiSelectPickList,
            "Boolean" => Self::TwoOptions,
            "Lookup" => Self::Lookup,
            "Owner" => Self::Owner,
            "Customer" => Self::Customer,
            _ => Self::Other,
        }
    }

    /// Maps a client API attribute type code.
    pub fn from_code(code: i32) -> Self {
        match code {
            0 => Self::TwoOptions,
            1 => Self::Customer,
            2 => Self::DateTime,
            5 => Self::WholeNumber,
            6 => Self::Lookup,
            8 => Self::Money,
            9 => Self::Owner,
            11..=13 => Self::PickList,
            _ => Self::Other,
        }
    }
}

/// Metadata for one attribute (column).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeDescriptor {
    /// The logical name of the attribute (e.g., "revenue").
    pub logical_name: String,

    /// The attribute type.
    pub attribute_type: AttributeType,

    /// Format name for integer attributes ("Duration", "TimeZone", ...).
    #[serde(default)]
    pub format: Option<String>,

    /// Display name in the user's language.
    #[serde(default)]
    pub display_name: Option<String>,
}

impl AttributeDescriptor {
    /// Creates a descriptor with no format or display name.
    pub fn new(logical_name: impl Into<String>, attribute_type: AttributeType) -> Self {
        Self {
            logical_name: logical_name.into(),
            attribute_type,
            format: None,
            display_name: None,
        }
    }

    /// Sets the format.
    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    /// Sets the display name.
    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }

    /// Returns the display name, or the logical name if none is known.
    pub fn label(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.logical_name)
    }
}

/// Metadata for one entity, limited to what the grid needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityMetadata {
    /// The logical name of the entity (e.g., "account").
    pub logical_name: String,

    /// The primary ID attribute; `{logical_name}id` when unknown.
    #[serde(default)]
    pub primary_id_attribute: Option<String>,

    /// The primary name attribute, shown as a link to the record.
    #[serde(default)]
    pub primary_name_attribute: Option<String>,

    /// Display name of the entity.
    #[serde(default)]
    pub display_name: Option<String>,

    /// Attribute descriptors.
    #[serde(default)]
    pub attributes: Vec<AttributeDescriptor>,
}

impl EntityMetadata {
    /// Creates metadata with no attributes.
    pub fn new(logical_name: impl Into<String>) -> Self {
        Self {
            logical_name: logical_name.into(),
            primary_id_attribute: None,
            primary_name_attribute: None,
            display_name: None,
            attributes: Vec::new(),
        }
    }

    /// Sets the primary ID attribute.
    pub fn with_primary_id(mut self, attribute: impl Into<String>) -> Self {
        self.primary_id_attribute = Some(attribute.into());
        self
    }

    /// Sets the primary name attribute.
    pub fn with_primary_name(mut self, attribute: impl Into<String>) -> Self {
        self.primary_name_attribute = Some(attribute.into());
        self
    }

    /// Sets the display name.
    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }

    /// Adds an attribute descriptor.
    pub fn with_attribute(mut self, attribute: AttributeDescriptor) -> Self {
        self.attributes.push(attribute);
        self
    }

    /// Returns the logical name of the entity.
    pub fn logical_name(&self) -> &str {
        &self.logical_name
    }

    /// Returns the primary ID attribute name.
    pub fn primary_id_attribute(&self) -> String {
        self.primary_id_attribute
            .clone()
            .unwrap_or_else(|| format!("{}id", self.logical_name))
    }

    /// Returns the primary name attribute name, if any.
    pub fn primary_name_attribute(&self) -> Option<&str> {
        self.primary_name_attribute.as_deref()
    }

    /// Returns the display name, or the logical name if none is known.
    pub fn label(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.logical_name)
    }

    /// Finds an attribute by logical name.
    pub fn attribute(&self, logical_name: &str) -> Option<&AttributeDescriptor> {
        self.attributes.iter().find(|a| a.logical_name == logical_name)
    }

    /// Finds an attribute by logical name, failing if the entity lacks it.
    pub fn require_attribute(&self, logical_name: &str) -> Result<&AttributeDescriptor, MetadataError> {
        self.attribute(logical_name)
            .ok_or_else(|| MetadataError::attribute_not_found(&self.logical_name, logical_name))
    }

    /// Returns a copy restricted to the given fields, in that order.
    ///
    /// # Errors
    ///
    /// Returns [`MetadataError::AttributeNotFound`] for the first field the
    /// entity does not define.
    pub fn select(&self, fields: &[String]) -> Result<EntityMetadata, MetadataError> {
        let mut attributes = Vec::with_capacity(fields.len());
        for field in fields {
            let attribute = self.require_attribute(field)?;
            if !attributes.contains(attribute) {
                attributes.push(attribute.clone());
            }
        }
        Ok(EntityMetadata {
            attributes,
            ..self.clone()
        })
    }
}

/// A time zone definition, used to render time-zone-formatted integers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeZoneDefinition {
    /// Platform time zone code.
    #[serde(rename = "timezonecode")]
    pub code: i32,

    /// Display name, e.g. "(GMT-08:00) Pacific Time (US & Canada)".
    #[serde(rename = "userinterfacename")]
    pub user_interface_name: String,
}

impl TimeZoneDefinition {
    /// Creates a new definition.
    pub fn new(code: i32, user_interface_name: impl Into<String>) -> Self {
        Self {
            code,
            user_interface_name: user_interface_name.into(),
        }
    }
}
