//! Metadata error types

/// Errors reported while resolving entity metadata.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MetadataError {
    /// The entity does not exist.
    #[error("Entity not found: {name}")]
    EntityNotFound { name: String },

    /// The entity exists but has no attribute with this logical name.
    #[error("Attribute '{attribute}' not found on entity '{entity}'")]
    AttributeNotFound { entity: String, attribute: String },
}

impl MetadataError {
    /// Creates a new entity-not-found error.
    pub fn entity_not_found(name: impl Into<String>) -> Self {
        Self::EntityNotFound { name: name.into() }
    }

    /// Creates a new attribute-not-found error.
    pub fn attribute_not_found(entity: impl Into<String>, attribute: impl Into<String>) -> Self {
        Self::AttributeNotFound {
            entity: entity.into(),
            attribute: attribute.into(),
        }
    }
}
