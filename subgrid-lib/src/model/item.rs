//! Projected grid items

use std::borrow::Cow;
use std::fmt;

use serde::Serialize;
use serde::Serializer;
use serde::ser::SerializeMap;
use serde_json::Value;

use super::AttributeType;

/// What a cell shows.
#[derive(Debug, Clone, PartialEq)]
pub enum DisplayValue {
    /// A display string supplied by the platform or a formatter.
    Text(String),
    /// The raw field value, unformatted.
    Raw(Value),
    /// Nothing to show; the record has no value for this column.
    Empty,
    /// The rule expected a side-channel value that the record did not carry.
    Unresolved,
}

impl DisplayValue {
    /// Creates a display value from an optional side-channel string.
    pub fn from_side_channel(value: Option<&str>) -> Self {
        match value {
            Some(text) => Self::Text(text.to_string()),
            None => Self::Unresolved,
        }
    }

    /// Creates a display value from an optional raw value.
    pub fn from_raw(value: Option<&Value>) -> Self {
        match value {
            Some(raw) => Self::Raw(raw.clone()),
            None => Self::Unresolved,
        }
    }

    /// Returns `true` if the expected value was missing.
    pub fn is_unresolved(&self) -> bool {
        matches!(self, Self::Unresolved)
    }

    /// Returns the text to render.
    pub fn text(&self) -> Cow<'_, str> {
        match self {
            Self::Text(text) => Cow::Borrowed(text),
            Self::Raw(Value::String(text)) => Cow::Borrowed(text),
            Self::Raw(Value::Null) | Self::Empty | Self::Unresolved => Cow::Borrowed(""),
            Self::Raw(other) => Cow::Owned(other.to_string()),
        }
    }
}

impl fmt::Display for DisplayValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text())
    }
}

impl Serialize for DisplayValue {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Self::Text(text) => serializer.serialize_str(text),
            Self::Raw(value) => value.serialize(serializer),
            Self::Empty => serializer.serialize_str(""),
            Self::Unresolved => serializer.serialize_none(),
        }
    }
}

/// The record a linkable cell navigates to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordLink {
    /// Logical name of the target entity.
    pub entity_name: String,
    /// Record id.
    pub id: String,
}

impl RecordLink {
    /// Creates a new link.
    pub fn new(entity_name: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            entity_name: entity_name.into(),
            id: id.into(),
        }
    }
}

/// One display-ready cell.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectedCell {
    /// Cell key: field name, alias, or link-qualified name.
    #[serde(skip)]
    pub key: String,
    /// What to render.
    #[serde(rename = "displayName")]
    pub display: DisplayValue,
    /// Whether the cell renders as a link to a record.
    pub linkable: bool,
    /// The attribute type that chose the rule.
    pub attribute_type: AttributeType,
    /// Logical name of the entity the attribute belongs to.
    pub entity_name: String,
    /// Logical name of the attribute.
    pub field_name: String,
    /// Whether the attribute comes from a link-entity.
    pub is_link_entity: bool,
    /// Whether the cell holds an aggregate value.
    pub aggregate: bool,
    /// Navigation target of a linkable cell, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<RecordLink>,
}

/// One grid row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProjectedItem {
    id: String,
    cells: Vec<ProjectedCell>,
}

impl ProjectedItem {
    /// Creates an item with no cells.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            cells: Vec::new(),
        }
    }

    /// Returns the record id (empty for aggregate rows).
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Adds a cell, replacing any cell with the same key.
    pub fn insert(&mut self, cell: ProjectedCell) {
        match self.cells.iter_mut().find(|c| c.key == cell.key) {
            Some(existing) => *existing = cell,
            None => self.cells.push(cell),
        }
    }

    /// Returns the cell with the given key.
    pub fn get(&self, key: &str) -> Option<&ProjectedCell> {
        self.cells.iter().find(|c| c.key == key)
    }

    /// Returns the cells in insertion order.
    pub fn cells(&self) -> &[ProjectedCell] {
        &self.cells
    }

    /// Returns the cell keys in insertion order.
    pub fn keys(&self) -> Vec<&str> {
        self.cells.iter().map(|c| c.key.as_str()).collect()
    }

    /// Returns the number of cells.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Returns `true` if the item has no cells.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

/// Serializes as `{"id": ..., "<cell key>": <cell>, ...}`.
impl Serialize for ProjectedItem {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.cells.len() + 1))?;
        map.serialize_entry("id", &self.id)?;
        for cell in &self.cells {
            map.serialize_entry(&cell.key, cell)?;
        }
        map.end()
    }
}
