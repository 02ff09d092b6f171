//! Bearer token supply

use async_trait::async_trait;

use crate::error::TransportError;

/// An OAuth2 access token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessToken {
    /// The bearer token used for API authentication.
    pub access_token: String,
}

impl AccessToken {
    /// Creates a new access token.
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
        }
    }

    /// Returns the token as a bearer authorization header value.
    pub fn as_bearer(&self) -> String {
        format!("Bearer {}", self.access_token)
    }
}

/// Supplies access tokens to the [`WebApiService`](super::WebApiService).
///
/// The service asks for a token before every request; implementations are
/// expected to cache and refresh as needed.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Gets an access token for the environment URL `resource`.
    async fn get_token(&self, resource: &str) -> Result<AccessToken, TransportError>;
}

/// Always returns the same token.
///
/// # Example
///
/// ```
/// use subgrid_lib::webapi::StaticTokenProvider;
///
/// let provider = StaticTokenProvider::new("my-access-token");
/// ```
#[derive(Debug, Clone)]
pub struct StaticTokenProvider {
    token: AccessToken,
}

impl StaticTokenProvider {
    /// Creates a provider for a fixed access token.
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            token: AccessToken::new(access_token),
        }
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn get_token(&self, _resource: &str) -> Result<AccessToken, TransportError> {
        if self.token.access_token.is_empty() {
            return Err(TransportError::Auth("empty access token".to_string()));
        }
        Ok(self.token.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_provider() {
        let provider = StaticTokenProvider::new("abc");
        let token = provider.get_token("https://org.crm.dynamics.com").await.unwrap();
        assert_eq!(token.as_bearer(), "Bearer abc");

        let empty = StaticTokenProvider::new("");
        assert!(matches!(
            empty.get_token("https://org.crm.dynamics.com").await,
            Err(TransportError::Auth(_))
        ));
    }
}
