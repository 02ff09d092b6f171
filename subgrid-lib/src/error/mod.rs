//! Error types

mod metadata;
mod parse;
mod transport;
mod validation;

pub use metadata::*;
pub use parse::*;
pub use transport::*;
pub use validation::*;

/// Top-level error for query analysis, configuration and grid loading.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The FetchXML query could not be parsed.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// Configuration or query contract violation.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Entity or attribute unknown to the metadata resolver.
    #[error(transparent)]
    Metadata(#[from] MetadataError),

    /// A remote call failed.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl Error {
    /// Returns `true` if this error was raised while reading configuration
    /// or the query itself, as opposed to during a fetch cycle.
    pub fn is_configuration_error(&self) -> bool {
        matches!(self, Self::Parse(_) | Self::Validation(_))
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(TransportError::from(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_errors() {
        assert!(Error::from(ParseError::Empty).is_configuration_error());
        assert!(
            Error::from(ValidationError::MissingAggregateAlias {
                attribute: "revenue".to_string()
            })
            .is_configuration_error()
        );
        assert!(!Error::from(TransportError::http(500, "boom")).is_configuration_error());
        assert!(!Error::from(MetadataError::attribute_not_found("account", "nope")).is_configuration_error());
    }
}
