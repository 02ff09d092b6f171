//! Record and metadata service contracts.
//!
//! The grid never talks to a transport directly. It is handed something that
//! implements [`RecordSource`] and [`MetadataResolver`] (together,
//! [`DataService`]): the Web API client in [`crate::webapi`], the
//! [`MemoryService`] used by tests and fixtures, or a host-provided bridge.

mod memory;
mod whole_number;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::Error;
use crate::model::EntityMetadata;
use crate::model::RawRecord;
use crate::model::TimeZoneDefinition;

pub use memory::FailurePoint;
pub use memory::MemoryFixture;
pub use memory::MemoryService;
pub use memory::ServiceCall;
pub use whole_number::WholeNumberFormat;
pub use whole_number::format_duration;
pub use whole_number::render_whole_number;

/// The records returned for one query.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RecordSet {
    /// Records in service order.
    #[serde(alias = "value")]
    pub entities: Vec<RawRecord>,
}

impl RecordSet {
    /// Creates a record set.
    pub fn new(entities: Vec<RawRecord>) -> Self {
        Self { entities }
    }
}

/// Executes FetchXML queries.
#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Returns the records selected by a (paged) query.
    async fn retrieve_records(&self, query: &str) -> Result<RecordSet, Error>;

    /// Returns how many records the query selects across all pages.
    async fn get_records_count(&self, query: &str) -> Result<usize, Error>;
}

/// Resolves entity metadata and formatting inputs.
#[async_trait]
pub trait MetadataResolver: Send + Sync {
    /// Returns the metadata of an entity restricted to `fields`.
    ///
    /// # Errors
    ///
    /// Fails with [`crate::error::MetadataError`] when the entity or one of
    /// the fields is unknown, or a transport error.
    async fn get_entity_metadata(&self, entity_name: &str, fields: &[String]) -> Result<EntityMetadata, Error>;

    /// Returns all time zone definitions.
    async fn get_timezone_definitions(&self) -> Result<Vec<TimeZoneDefinition>, Error>;

    /// Returns the display name of an entity (the "New ..." button label).
    async fn get_entity_display_name(&self, entity_name: &str) -> Result<String, Error> {
        let metadata = self.get_entity_metadata(entity_name, &[]).await?;
        Ok(metadata.label().to_string())
    }

    /// Renders a whole-number field according to its format.
    fn whole_number_display(
        &self,
        format: Option<&str>,
        record: &RawRecord,
        key: &str,
        timezones: &[TimeZoneDefinition],
    ) -> String {
        render_whole_number(format, record, key, timezones)
    }
}

/// Everything the grid loader needs from the outside world.
pub trait DataService: RecordSource + MetadataResolver {}

impl<T: RecordSource + MetadataResolver + ?Sized> DataService for T {}
