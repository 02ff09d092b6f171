//! Grid view state across fetch cycles.

use super::loader::GridLoader;
use super::loader::GridPage;
use super::window::PageWindow;
use crate::error::Error;
use crate::model::ProjectedItem;
use crate::query::is_aggregate;
use crate::service::DataService;

/// Handle of a started fetch cycle.
///
/// Carries the inputs the cycle must load with, so a cycle started before
/// a page or query change still loads what it was started for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleTicket {
    id: u64,
    /// Query the cycle loads.
    pub query: String,
    /// Requested page size.
    pub page_size: u32,
    /// Page the cycle loads.
    pub page: u32,
}

impl CycleTicket {
    /// Returns the cycle number; later cycles have larger numbers.
    pub fn id(&self) -> u64 {
        self.id
    }
}

/// What the grid currently shows.
///
/// Each fetch cycle is started with [`begin_cycle`](Self::begin_cycle) and
/// finished with [`complete_cycle`](Self::complete_cycle). A completion is
/// only applied if no later-started cycle has already been applied, so the
/// most recently started cycle always wins. A failed cycle records its error
/// and leaves the previous items in place.
#[derive(Debug)]
pub struct GridState {
    query: String,
    page_size: u32,
    page: u32,
    aggregate: bool,
    items: Vec<ProjectedItem>,
    record_ids: Vec<String>,
    window: PageWindow,
    error: Option<Error>,
    next_ticket: u64,
    latest_started: Option<u64>,
    latest_applied: Option<u64>,
}

impl GridState {
    /// Creates the state for a query, on page 1.
    pub fn new(query: impl Into<String>, page_size: u32) -> Self {
        let query = query.into();
        Self {
            aggregate: is_aggregate(&query).unwrap_or(false),
            query,
            page_size,
            page: 1,
            items: Vec::new(),
            record_ids: Vec::new(),
            window: PageWindow::default(),
            error: None,
            next_ticket: 0,
            latest_started: None,
            latest_applied: None,
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Returns the query the grid is showing.
    pub fn query(&self) -> &str {
        &self.query
    }

    /// Returns the current page number (1-based).
    pub fn page(&self) -> u32 {
        self.page
    }

    /// Returns the number of records per page.
    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Returns the items of the last successful cycle.
    pub fn items(&self) -> &[ProjectedItem] {
        &self.items
    }

    /// Returns the record ids of the current items, in display order.
    pub fn record_ids(&self) -> &[String] {
        &self.record_ids
    }

    /// Returns the pagination window of the last successful cycle.
    pub fn window(&self) -> &PageWindow {
        &self.window
    }

    /// Returns the error of the last applied cycle, if it failed.
    pub fn error(&self) -> Option<&Error> {
        self.error.as_ref()
    }

    /// Returns `true` while the most recently started cycle is outstanding.
    pub fn is_loading(&self) -> bool {
        self.latest_started.is_some() && self.latest_started != self.latest_applied
    }

    /// Returns `true` if the current query is an aggregate query.
    pub fn is_aggregate(&self) -> bool {
        self.aggregate
    }

    /// Returns whether the delete command is available for a selection.
    pub fn delete_enabled(&self, selected: usize) -> bool {
        selected > 0 && !self.aggregate
    }

    // =========================================================================
    // Navigation
    // =========================================================================

    /// Replaces the query. A different query goes back to page 1.
    pub fn set_query(&mut self, query: impl Into<String>) {
        let query = query.into();
        if query != self.query {
            log::debug!("Query changed, resetting to page 1");
            self.aggregate = is_aggregate(&query).unwrap_or(false);
            self.query = query;
            self.page = 1;
        }
    }

    /// Moves to the next page if the current window has one.
    pub fn next_page(&mut self) -> bool {
        if !self.window.has_next {
            return false;
        }
        self.page += 1;
        true
    }

    /// Moves to the previous page if there is one.
    pub fn previous_page(&mut self) -> bool {
        if self.page <= 1 {
            return false;
        }
        self.page -= 1;
        true
    }

    // =========================================================================
    // Cycles
    // =========================================================================

    /// Starts a fetch cycle for the current query and page.
    pub fn begin_cycle(&mut self) -> CycleTicket {
        let id = self.next_ticket;
        self.next_ticket += 1;
        self.latest_started = Some(id);

        CycleTicket {
            id,
            query: self.query.clone(),
            page_size: self.page_size,
            page: self.page,
        }
    }

    /// Applies the result of a cycle.
    ///
    /// Returns `false` if the result was discarded because a later cycle
    /// has already been applied.
    pub fn complete_cycle(&mut self, ticket: &CycleTicket, result: Result<GridPage, Error>) -> bool {
        if self.latest_applied.is_some_and(|applied| applied > ticket.id) {
            log::debug!("Discarding stale cycle {}", ticket.id);
            return false;
        }
        self.latest_applied = Some(ticket.id);

        match result {
            Ok(page) => {
                self.window = *page.window();
                self.record_ids = page.record_ids().to_vec();
                self.items = page.into_items();
                self.error = None;
            }
            Err(err) => {
                log::warn!("Grid cycle {} failed: {}", ticket.id, err);
                self.error = Some(err);
            }
        }
        true
    }

    /// Runs one full cycle against `loader`.
    pub async fn refresh<S: DataService + ?Sized>(&mut self, loader: &GridLoader<'_, S>) -> bool {
        let ticket = self.begin_cycle();
        let result = loader.load_page(&ticket.query, ticket.page_size, ticket.page).await;
        self.complete_cycle(&ticket, result)
    }
}
