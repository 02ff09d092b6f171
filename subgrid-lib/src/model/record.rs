//! Raw record accessor
//!
//! Dataverse returns a record as a flat JSON object where display strings and
//! lookup targets travel as annotated sibling keys:
//!
//! - Formatted values: `"field@OData.Community.Display.V1.FormattedValue": "Display Text"`
//! - Root lookups: `"_primarycontactid_value": "guid"` with the annotations on
//!   `_primarycontactid_value@...`
//! - Link-entity columns: `"alias.field": ...` with the annotations on
//!   `alias.field@...`
//! - Anything else starting with or containing `@` is an annotation we skip
//!
//! [`RawRecord`] splits those apart once, at deserialization, so the
//! projector asks for a raw, formatted or lookup value instead of building
//! keys by hand.

use std::collections::HashMap;
use std::fmt;

use serde::Deserialize;
use serde::Deserializer;
use serde::de::MapAccess;
use serde::de::Visitor;
use serde_json::Map;
use serde_json::Value;

use super::RecordLink;

/// Annotation suffix carrying a field's display string.
pub const FORMATTED_VALUE_SUFFIX: &str = "@OData.Community.Display.V1.FormattedValue";

/// Annotation suffix carrying a lookup's target entity.
pub const LOOKUP_LOGICAL_NAME_SUFFIX: &str = "@Microsoft.Dynamics.CRM.lookuplogicalname";

/// Where a field sits in the query, which decides its wire key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldScope {
    /// Declared under the root `<entity>`.
    Root,
    /// Declared under a `<link-entity>`; the key is already alias-qualified.
    LinkEntity,
}

/// Returns the wire key of a lookup field: `_{field}_value` at the root,
/// the cell key itself under a link-entity.
pub fn lookup_key(field: &str, scope: FieldScope) -> String {
    match scope {
        FieldScope::Root => format!("_{}_value", field),
        FieldScope::LinkEntity => field.to_string(),
    }
}

/// A record as returned by the record service.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRecord {
    /// Raw field values in wire order.
    fields: Map<String, Value>,
    /// Formatted values keyed by the annotated wire key.
    formatted_values: HashMap<String, String>,
    /// Lookup target entities keyed by the annotated wire key.
    lookup_logical_names: HashMap<String, String>,
}

impl RawRecord {
    /// Creates an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Splits a wire object into raw fields and side-channel annotations.
    pub fn from_map(map: Map<String, Value>) -> Self {
        let mut record = Self::new();
        for (key, value) in map {
            record.ingest(key, value);
        }
        record
    }

    fn ingest(&mut self, key: String, value: Value) {
        if let Some(field) = key.strip_suffix(FORMATTED_VALUE_SUFFIX) {
            if let Some(text) = annotation_text(value) {
                self.formatted_values.insert(field.to_string(), text);
            }
        } else if let Some(field) = key.strip_suffix(LOOKUP_LOGICAL_NAME_SUFFIX) {
            if let Some(text) = annotation_text(value) {
                self.lookup_logical_names.insert(field.to_string(), text);
            }
        } else if key.contains('@') {
            // etag, navigation property and other annotations
        } else {
            self.fields.insert(key, value);
        }
    }

    // =========================================================================
    // Builders
    // =========================================================================

    /// Sets a raw field value (builder pattern).
    pub fn set(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Sets the formatted value annotation for a wire key.
    pub fn set_formatted(mut self, key: impl Into<String>, text: impl Into<String>) -> Self {
        self.formatted_values.insert(key.into(), text.into());
        self
    }

    /// Sets the lookup logical name annotation for a wire key.
    pub fn set_lookup_logical_name(mut self, key: impl Into<String>, entity: impl Into<String>) -> Self {
        self.lookup_logical_names.insert(key.into(), entity.into());
        self
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Returns the raw value stored under a wire key.
    pub fn raw_value(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Returns `true` if a raw value exists under the wire key.
    pub fn contains(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    /// Returns the raw value as text, the way it would be shown in a cell.
    ///
    /// `null` and missing fields yield `None`.
    pub fn raw_text(&self, key: &str) -> Option<String> {
        match self.fields.get(key)? {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Returns the `@OData.Community.Display.V1.FormattedValue` annotation of
    /// a wire key.
    pub fn formatted_value(&self, key: &str) -> Option<&str> {
        self.formatted_values.get(key).map(String::as_str)
    }

    /// Returns the display string of a lookup field.
    pub fn lookup_formatted_value(&self, field: &str, scope: FieldScope) -> Option<&str> {
        self.formatted_value(&lookup_key(field, scope))
    }

    /// Returns the record a lookup field points to, when both the id and the
    /// target entity are present.
    pub fn lookup_target(&self, field: &str, scope: FieldScope) -> Option<RecordLink> {
        let key = lookup_key(field, scope);
        let id = self.raw_text(&key)?;
        let entity_name = self.lookup_logical_names.get(&key)?;
        Some(RecordLink::new(entity_name.clone(), id))
    }

    /// Returns the raw field map in wire order.
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Returns the logical names of the root fields present, in wire order.
    ///
    /// Lookup keys are reported by their field name (`_x_value` becomes
    /// `x`); alias-qualified link-entity columns are left out.
    pub fn field_names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::with_capacity(self.fields.len());
        for key in self.fields.keys() {
            if key.contains('.') {
                continue;
            }
            let name = match key.strip_prefix('_').and_then(|k| k.strip_suffix("_value")) {
                Some(field) => field.to_string(),
                None => key.clone(),
            };
            if !names.contains(&name) {
                names.push(name);
            }
        }
        names
    }

    /// Returns the number of raw fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns `true` if the record has no raw fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

fn annotation_text(value: Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

impl From<Map<String, Value>> for RawRecord {
    fn from(map: Map<String, Value>) -> Self {
        Self::from_map(map)
    }
}

impl<'de> Deserialize<'de> for RawRecord {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_map(RawRecordVisitor)
    }
}

struct RawRecordVisitor;

impl<'de> Visitor<'de> for RawRecordVisitor {
    type Value = RawRecord;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a map representing a Dataverse record")
    }

    fn visit_map<M>(self, mut map: M) -> Result<RawRecord, M::Error>
    where
        M: MapAccess<'de>,
    {
        let mut record = RawRecord::new();
        while let Some(key) = map.next_key::<String>()? {
            let value: Value = map.next_value()?;
            record.ingest(key, value);
        }
        Ok(record)
    }
}
