//! Dataverse Web API data service
//!
//! [`WebApiService`] implements [`RecordSource`] and [`MetadataResolver`]
//! against an environment's Web API: FetchXML queries go to the entity set,
//! metadata comes from `EntityDefinitions`, time zones from
//! `timezonedefinitions`.

mod response;
mod token;

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::StatusCode;
use reqwest::header::AUTHORIZATION;
use serde::de::DeserializeOwned;
use url::Url;
use url::form_urlencoded;

pub use token::AccessToken;
pub use token::StaticTokenProvider;
pub use token::TokenProvider;

use self::response::CountResponse;
use self::response::EntityDefinition;
use self::response::ResolvedEntity;
use self::response::ValueResponse;
use crate::error::Error;
use crate::error::MetadataError;
use crate::error::ParseError;
use crate::error::TransportError;
use crate::model::EntityMetadata;
use crate::model::TimeZoneDefinition;
use crate::query::QueryDocument;
use crate::query::set_fetch_attributes;
use crate::service::MetadataResolver;
use crate::service::RecordSet;
use crate::service::RecordSource;

/// Default Web API version.
pub const DEFAULT_API_VERSION: &str = "v9.2";

const INCLUDE_ANNOTATIONS: &str = "odata.include-annotations=\"*\"";

/// A [`DataService`](crate::service::DataService) backed by the Dataverse
/// Web API.
///
/// Entity definitions are fetched once per entity and kept for the life of
/// the service. Cheap to clone.
///
/// # Example
///
/// ```ignore
/// use subgrid_lib::webapi::{StaticTokenProvider, WebApiService};
///
/// let service = WebApiService::builder()
///     .url("https://org.crm.dynamics.com")
///     .token_provider(StaticTokenProvider::new("my-token"))
///     .timeout(Duration::from_secs(30))
///     .build()?;
/// ```
#[derive(Clone)]
pub struct WebApiService {
    inner: Arc<WebApiServiceInner>,
}

struct WebApiServiceInner {
    base_url: String,
    api_version: String,
    token_provider: Arc<dyn TokenProvider>,
    http_client: Client,
    timeout: Option<Duration>,
    entities: Mutex<HashMap<String, ResolvedEntity>>,
}

impl WebApiService {
    /// Creates a new builder for constructing a service.
    pub fn builder() -> WebApiServiceBuilder<Missing, Missing> {
        WebApiServiceBuilder::new()
    }

    /// Returns the base URL of the environment.
    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    /// Returns the API version in use.
    pub fn api_version(&self) -> &str {
        &self.inner.api_version
    }

    fn url(&self, path: &str) -> String {
        api_url(&self.inner.base_url, &self.inner.api_version, path)
    }

    /// Sends an authenticated GET and decodes the JSON body.
    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, TransportError> {
        let token = self.inner.token_provider.get_token(&self.inner.base_url).await?;

        let mut request = self
            .inner
            .http_client
            .get(url)
            .header(AUTHORIZATION, token.as_bearer())
            .header("OData-MaxVersion", "4.0")
            .header("OData-Version", "4.0")
            .header("Accept", "application/json")
            .header("Prefer", INCLUDE_ANNOTATIONS);

        if let Some(timeout) = self.inner.timeout {
            request = request.timeout(timeout);
        }

        log::debug!("GET {}", url);
        let response = request.send().await.map_err(|e| self.transport_error(e))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| self.transport_error(e))?;
        if !status.is_success() {
            return Err(TransportError::http(status.as_u16(), error_message(&body)));
        }

        serde_json::from_str(&body).map_err(|e| TransportError::parse_with_body(e.to_string(), body))
    }

    fn transport_error(&self, err: reqwest::Error) -> TransportError {
        match self.inner.timeout {
            Some(timeout) if err.is_timeout() => TransportError::Timeout(timeout),
            _ => TransportError::Network(err),
        }
    }

    /// Returns the definition of an entity, fetching it on first use.
    async fn resolve_entity(&self, logical_name: &str) -> Result<ResolvedEntity, Error> {
        if let Some(entity) = self.cached_entity(logical_name) {
            return Ok(entity);
        }

        let url = self.url(&entity_definition_path(logical_name));
        let definition: EntityDefinition = match self.get_json(&url).await {
            Ok(definition) => definition,
            Err(err) if err.status_code() == Some(StatusCode::NOT_FOUND.as_u16()) => {
                return Err(MetadataError::entity_not_found(logical_name).into());
            }
            Err(err) => return Err(err.into()),
        };

        let entity = definition.into_resolved();
        self.inner
            .entities
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(logical_name.to_string(), entity.clone());

        Ok(entity)
    }

    fn cached_entity(&self, logical_name: &str) -> Option<ResolvedEntity> {
        self.inner
            .entities
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(logical_name)
            .cloned()
    }

    async fn fetch_url(&self, query: &str) -> Result<String, Error> {
        let doc = QueryDocument::parse(query)?;
        let entity = self.resolve_entity(doc.entity_name()).await?;
        Ok(self.url(&fetch_path(&entity.entity_set_name, query)))
    }
}

#[async_trait]
impl RecordSource for WebApiService {
    async fn retrieve_records(&self, query: &str) -> Result<RecordSet, Error> {
        let url = self.fetch_url(query).await?;
        let records: RecordSet = self.get_json(&url).await?;
        log::debug!("Web API returned {} records", records.entities.len());
        Ok(records)
    }

    async fn get_records_count(&self, query: &str) -> Result<usize, Error> {
        let url = self.fetch_url(&count_query(query)?).await?;
        let response: CountResponse = self.get_json(&url).await?;
        Ok(response.count())
    }
}

#[async_trait]
impl MetadataResolver for WebApiService {
    async fn get_entity_metadata(&self, entity_name: &str, fields: &[String]) -> Result<EntityMetadata, Error> {
        let entity = self.resolve_entity(entity_name).await?;
        Ok(entity.metadata.select(fields)?)
    }

    async fn get_timezone_definitions(&self) -> Result<Vec<TimeZoneDefinition>, Error> {
        let url = self.url("timezonedefinitions?$select=timezonecode,userinterfacename");
        let response: ValueResponse<TimeZoneDefinition> = self.get_json(&url).await?;
        Ok(response.value)
    }
}

// =============================================================================
// Request building
// =============================================================================

/// Joins the environment URL, API version and a resource path.
fn api_url(base_url: &str, api_version: &str, path: &str) -> String {
    format!("{}/api/data/{}/{}", base_url.trim_end_matches('/'), api_version, path)
}

fn entity_definition_path(logical_name: &str) -> String {
    format!(
        "EntityDefinitions(LogicalName='{}')?$select=LogicalName,EntitySetName,PrimaryIdAttribute,PrimaryNameAttribute,DisplayName&$expand=Attributes",
        logical_name
    )
}

fn fetch_path(entity_set_name: &str, query: &str) -> String {
    let encoded: String = form_urlencoded::byte_serialize(query.as_bytes()).collect();
    format!("{}?fetchXml={}", entity_set_name, encoded)
}

/// Turns a query into one that asks the platform for its total count.
///
/// Aggregate queries cannot carry a total count; their rows are counted
/// instead.
fn count_query(query: &str) -> Result<String, ParseError> {
    if QueryDocument::parse(query)?.is_aggregate() {
        return Ok(query.to_string());
    }
    set_fetch_attributes(
        query,
        &[("returntotalrecordcount", "true"), ("page", "1"), ("count", "1")],
        &["top"],
    )
}

/// Pulls `error.message` out of an OData error body.
fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.pointer("/error/message").and_then(|m| m.as_str()).map(str::to_string))
        .unwrap_or_else(|| body.to_string())
}

// =============================================================================
// Typestate Builder
// =============================================================================

/// Marker type for missing required builder fields.
pub struct Missing;

/// Marker type for set builder fields.
pub struct Set<T>(T);

/// Builder for a [`WebApiService`].
///
/// `url` and `token_provider` are required; `build` only exists once both
/// are set.
pub struct WebApiServiceBuilder<U, P> {
    url: U,
    token_provider: P,
    api_version: String,
    timeout: Option<Duration>,
    http_client: Option<Client>,
}

impl WebApiServiceBuilder<Missing, Missing> {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            url: Missing,
            token_provider: Missing,
            api_version: DEFAULT_API_VERSION.to_string(),
            timeout: None,
            http_client: None,
        }
    }
}

impl Default for WebApiServiceBuilder<Missing, Missing> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> WebApiServiceBuilder<Missing, P> {
    /// Sets the environment URL, e.g. `https://org.crm.dynamics.com`.
    pub fn url(self, url: impl Into<String>) -> WebApiServiceBuilder<Set<String>, P> {
        WebApiServiceBuilder {
            url: Set(url.into()),
            token_provider: self.token_provider,
            api_version: self.api_version,
            timeout: self.timeout,
            http_client: self.http_client,
        }
    }
}

impl<U> WebApiServiceBuilder<U, Missing> {
    /// Sets the token provider.
    pub fn token_provider<T: TokenProvider + 'static>(
        self,
        provider: T,
    ) -> WebApiServiceBuilder<U, Set<Arc<dyn TokenProvider>>> {
        WebApiServiceBuilder {
            url: self.url,
            token_provider: Set(Arc::new(provider) as Arc<dyn TokenProvider>),
            api_version: self.api_version,
            timeout: self.timeout,
            http_client: self.http_client,
        }
    }
}

impl<U, P> WebApiServiceBuilder<U, P> {
    /// Sets the API version. Defaults to `v9.2`.
    pub fn api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = version.into();
        self
    }

    /// Sets the per-request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets a custom HTTP client.
    pub fn http_client(mut self, client: Client) -> Self {
        self.http_client = Some(client);
        self
    }
}

impl WebApiServiceBuilder<Set<String>, Set<Arc<dyn TokenProvider>>> {
    /// Builds the service.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::InvalidUrl`] if the URL is not an absolute
    /// http(s) URL.
    pub fn build(self) -> Result<WebApiService, TransportError> {
        let base_url = self.url.0;
        match Url::parse(&base_url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            _ => return Err(TransportError::InvalidUrl(base_url)),
        }

        let http_client = match self.http_client {
            Some(client) => client,
            None => Client::builder().build()?,
        };

        Ok(WebApiService {
            inner: Arc::new(WebApiServiceInner {
                base_url,
                api_version: self.api_version,
                token_provider: self.token_provider.0,
                http_client,
                timeout: self.timeout,
                entities: Mutex::new(HashMap::new()),
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_url() {
        assert_eq!(
            api_url("https://org.crm.dynamics.com/", "v9.2", "accounts"),
            "https://org.crm.dynamics.com/api/data/v9.2/accounts"
        );
    }

    #[test]
    fn test_fetch_path_encodes_query() {
        let path = fetch_path("accounts", "<fetch count=\"5\"><entity name=\"account\"/></fetch>");
        assert_eq!(
            path,
            "accounts?fetchXml=%3Cfetch+count%3D%225%22%3E%3Centity+name%3D%22account%22%2F%3E%3C%2Ffetch%3E"
        );
    }

    #[test]
    fn test_count_query() {
        let query = "<fetch top=\"5\"><entity name=\"account\"/></fetch>";
        assert_eq!(
            count_query(query).unwrap(),
            "<fetch returntotalrecordcount=\"true\" page=\"1\" count=\"1\"><entity name=\"account\"/></fetch>"
        );

        let aggregate = "<fetch aggregate=\"true\"><entity name=\"account\"/></fetch>";
        assert_eq!(count_query(aggregate).unwrap(), aggregate);
    }

    #[test]
    fn test_error_message() {
        let body = r#"{"error":{"code":"0x80060888","message":"Resource not found for the segment 'foo'."}}"#;
        assert_eq!(error_message(body), "Resource not found for the segment 'foo'.");
        assert_eq!(error_message("Bad Gateway"), "Bad Gateway");
    }

    #[test]
    fn test_build_rejects_relative_url() {
        let result = WebApiService::builder()
            .url("org.crm.dynamics.com")
            .token_provider(StaticTokenProvider::new("token"))
            .build();
        assert!(matches!(result, Err(TransportError::InvalidUrl(_))));

        let service = WebApiService::builder()
            .url("https://org.crm.dynamics.com")
            .token_provider(StaticTokenProvider::new("token"))
            .api_version("v9.1")
            .build()
            .unwrap();
        assert_eq!(service.api_version(), "v9.1");
    }
}
