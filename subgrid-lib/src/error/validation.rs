//! Validation error types

/// Contract violations in configuration input or query shape.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// The JSON configuration carries keys outside the recognised set.
    #[error("JSON is not valid: unrecognised keys {}", keys.join(", "))]
    UnknownConfigKeys {
        /// The offending keys, in input order.
        keys: Vec<String>,
    },

    /// An aggregate query declares a root attribute without an alias.
    #[error("Aggregate attribute '{attribute}' has no alias")]
    MissingAggregateAlias { attribute: String },
}

impl ValidationError {
    /// Creates a new unknown-keys error.
    pub fn unknown_keys<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::UnknownConfigKeys {
            keys: keys.into_iter().map(Into::into).collect(),
        }
    }
}
