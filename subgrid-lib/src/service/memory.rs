//! In-memory data service

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::PoisonError;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use super::MetadataResolver;
use super::RecordSet;
use super::RecordSource;
use crate::error::Error;
use crate::error::MetadataError;
use crate::error::TransportError;
use crate::model::EntityMetadata;
use crate::model::RawRecord;
use crate::model::TimeZoneDefinition;
use crate::query::QueryDocument;

/// Window used when a query carries no `count` or `top`.
const DEFAULT_WINDOW: usize = 5000;

/// A call received by a [`MemoryService`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceCall {
    RetrieveRecords(String),
    RecordsCount(String),
    EntityMetadata { entity: String, fields: Vec<String> },
    TimeZoneDefinitions,
}

/// A call a [`MemoryService`] can be told to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePoint {
    RetrieveRecords,
    RecordsCount,
    EntityMetadata,
    TimeZoneDefinitions,
}

/// Serialized form of a [`MemoryService`], as read from a fixture file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MemoryFixture {
    /// Records in wire form, annotations included.
    #[serde(default)]
    pub records: Vec<RawRecord>,
    /// Metadata per entity.
    #[serde(default)]
    pub metadata: Vec<EntityMetadata>,
    /// Time zone definitions.
    #[serde(default)]
    pub timezones: Vec<TimeZoneDefinition>,
    /// Count reported by the count query; defaults to the number of records.
    #[serde(default)]
    pub total_count: Option<usize>,
}

/// A [`DataService`](super::DataService) backed by fixed data.
///
/// Pages records by the `page`/`count` attributes of the query it receives
/// and otherwise ignores the query body. Every call is recorded so tests can
/// assert what the loader asked for.
///
/// # Example
///
/// ```
/// use subgrid_lib::model::{AttributeDescriptor, AttributeType, EntityMetadata, RawRecord};
/// use subgrid_lib::service::MemoryService;
///
/// let service = MemoryService::new()
///     .with_metadata(
///         EntityMetadata::new("account")
///             .with_primary_name("name")
///             .with_attribute(AttributeDescriptor::new("name", AttributeType::Other)),
///     )
///     .with_record(RawRecord::new().set("accountid", "1").set("name", "Contoso"));
/// ```
#[derive(Debug, Default)]
pub struct MemoryService {
    records: Vec<RawRecord>,
    metadata: HashMap<String, EntityMetadata>,
    timezones: Vec<TimeZoneDefinition>,
    total_count: Option<usize>,
    latency: HashMap<String, Duration>,
    failure: Option<FailurePoint>,
    calls: Mutex<Vec<ServiceCall>>,
}

impl MemoryService {
    /// Creates an empty service.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads a service from fixture JSON.
    pub fn from_fixture_json(json: &str) -> Result<Self, serde_json::Error> {
        let fixture: MemoryFixture = serde_json::from_str(json)?;
        Ok(Self::from(fixture))
    }

    /// Adds a record.
    pub fn with_record(mut self, record: RawRecord) -> Self {
        self.records.push(record);
        self
    }

    /// Adds records.
    pub fn with_records(mut self, records: impl IntoIterator<Item = RawRecord>) -> Self {
        self.records.extend(records);
        self
    }

    /// Registers the metadata of an entity.
    pub fn with_metadata(mut self, metadata: EntityMetadata) -> Self {
        self.metadata.insert(metadata.logical_name.clone(), metadata);
        self
    }

    /// Sets the time zone definitions.
    pub fn with_timezones(mut self, timezones: Vec<TimeZoneDefinition>) -> Self {
        self.timezones = timezones;
        self
    }

    /// Overrides the count returned by the count query.
    pub fn with_total_count(mut self, count: usize) -> Self {
        self.total_count = Some(count);
        self
    }

    /// Delays metadata responses for one entity.
    pub fn with_latency(mut self, entity: impl Into<String>, latency: Duration) -> Self {
        self.latency.insert(entity.into(), latency);
        self
    }

    /// Makes one kind of call fail with a transport error.
    pub fn failing_at(mut self, point: FailurePoint) -> Self {
        self.failure = Some(point);
        self
    }

    /// Returns the calls received so far.
    pub fn calls(&self) -> Vec<ServiceCall> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn record_call(&self, call: ServiceCall) {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(call);
    }

    fn check_failure(&self, point: FailurePoint) -> Result<(), Error> {
        if self.failure == Some(point) {
            return Err(TransportError::service(format!("{:?} failed", point)).into());
        }
        Ok(())
    }
}

impl From<MemoryFixture> for MemoryService {
    fn from(fixture: MemoryFixture) -> Self {
        let service = Self::new()
            .with_records(fixture.records)
            .with_timezones(fixture.timezones);
        let service = fixture
            .metadata
            .into_iter()
            .fold(service, |service, metadata| service.with_metadata(metadata));
        match fixture.total_count {
            Some(count) => service.with_total_count(count),
            None => service,
        }
    }
}

#[async_trait]
impl RecordSource for MemoryService {
    async fn retrieve_records(&self, query: &str) -> Result<RecordSet, Error> {
        self.record_call(ServiceCall::RetrieveRecords(query.to_string()));
        self.check_failure(FailurePoint::RetrieveRecords)?;

        let doc = QueryDocument::parse(query)?;
        let page = doc.page().unwrap_or(1) as usize;
        let window = doc
            .count()
            .or(doc.top())
            .map(|n| n as usize)
            .unwrap_or(DEFAULT_WINDOW);

        let entities = self
            .records
            .iter()
            .skip((page - 1) * window)
            .take(window)
            .cloned()
            .collect();
        Ok(RecordSet::new(entities))
    }

    async fn get_records_count(&self, query: &str) -> Result<usize, Error> {
        self.record_call(ServiceCall::RecordsCount(query.to_string()));
        self.check_failure(FailurePoint::RecordsCount)?;
        Ok(self.total_count.unwrap_or(self.records.len()))
    }
}

#[async_trait]
impl MetadataResolver for MemoryService {
    async fn get_entity_metadata(&self, entity_name: &str, fields: &[String]) -> Result<EntityMetadata, Error> {
        self.record_call(ServiceCall::EntityMetadata {
            entity: entity_name.to_string(),
            fields: fields.to_vec(),
        });
        if let Some(latency) = self.latency.get(entity_name) {
            tokio::time::sleep(*latency).await;
        }
        self.check_failure(FailurePoint::EntityMetadata)?;

        let metadata = self
            .metadata
            .get(entity_name)
            .ok_or_else(|| MetadataError::entity_not_found(entity_name))?;
        Ok(metadata.select(fields)?)
    }

    async fn get_timezone_definitions(&self) -> Result<Vec<TimeZoneDefinition>, Error> {
        self.record_call(ServiceCall::TimeZoneDefinitions);
        self.check_failure(FailurePoint::TimeZoneDefinitions)?;
        Ok(self.timezones.clone())
    }
}
