//! Grid configuration
//!
//! A grid is configured from one raw text value that is either a JSON
//! object or a bare FetchXML query:
//!
//! ```json
//! {
//!   "fetchXml": "<fetch>...</fetch>",
//!   "pageSize": 25,
//!   "newButtonVisibility": true,
//!   "deleteButtonVisibility": false
//! }
//! ```
//!
//! Problems with the input never prevent a config from being built; they
//! are attached to [`GridConfig::error`] for the host to display.

use serde_json::Map;
use serde_json::Value;

use crate::error::Error;
use crate::error::ValidationError;
use crate::query::QueryDocument;

/// Smallest page size.
pub const MIN_PAGE_SIZE: u32 = 1;

/// Largest page size.
pub const MAX_PAGE_SIZE: u32 = 250;

/// Keys recognised in JSON configuration.
pub const CONFIG_KEYS: [&str; 4] = ["fetchXml", "pageSize", "newButtonVisibility", "deleteButtonVisibility"];

/// Values used for anything the raw input does not set.
///
/// # Example
///
/// ```
/// use subgrid_lib::config::GridDefaults;
///
/// let defaults = GridDefaults::default()
///     .with_page_size(50)
///     .with_delete_button_visibility(false);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridDefaults {
    /// Query used when the input is empty.
    ///
    /// Default: empty
    pub fetch_xml: String,

    /// Records per page.
    ///
    /// Default: 25
    pub page_size: u32,

    /// Whether the "New" button is shown.
    ///
    /// Default: true
    pub new_button_visibility: bool,

    /// Whether the "Delete" button is shown.
    ///
    /// Default: true
    pub delete_button_visibility: bool,
}

impl Default for GridDefaults {
    fn default() -> Self {
        Self {
            fetch_xml: String::new(),
            page_size: 25,
            new_button_visibility: true,
            delete_button_visibility: true,
        }
    }
}

impl GridDefaults {
    /// Creates defaults with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the fallback query.
    pub fn with_fetch_xml(mut self, fetch_xml: impl Into<String>) -> Self {
        self.fetch_xml = fetch_xml.into();
        self
    }

    /// Sets the page size.
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    /// Sets the "New" button visibility.
    pub fn with_new_button_visibility(mut self, visible: bool) -> Self {
        self.new_button_visibility = visible;
        self
    }

    /// Sets the "Delete" button visibility.
    pub fn with_delete_button_visibility(mut self, visible: bool) -> Self {
        self.delete_button_visibility = visible;
        self
    }
}

/// Effective grid configuration.
#[derive(Debug)]
pub struct GridConfig {
    /// Query to page through.
    pub fetch_xml: String,
    /// Records per page, within `1..=250`.
    pub page_size: u32,
    /// Whether the "New" button is shown.
    pub new_button_visibility: bool,
    /// Whether the "Delete" button is shown.
    pub delete_button_visibility: bool,
    /// Problem found in the raw input, if any.
    pub error: Option<Error>,
}

impl GridConfig {
    /// Builds a config from raw input.
    ///
    /// A JSON object applies every recognised key it carries; unknown keys
    /// attach a [`ValidationError`]. Anything else is taken as FetchXML
    /// (the default query when empty), attaching a parse error if it does
    /// not parse.
    pub fn from_raw_input(raw: Option<&str>, defaults: &GridDefaults) -> Self {
        let mut config = Self {
            fetch_xml: defaults.fetch_xml.clone(),
            page_size: clamp_page_size(f64::from(defaults.page_size)),
            new_button_visibility: defaults.new_button_visibility,
            delete_button_visibility: defaults.delete_button_visibility,
            error: None,
        };

        let raw = raw.unwrap_or_default();
        match serde_json::from_str::<Value>(raw) {
            Ok(Value::Object(object)) => config.apply_json(&object),
            _ => config.apply_fetch_xml(raw),
        }

        if let Some(err) = &config.error {
            log::warn!("Grid configuration problem: {}", err);
        }
        config
    }

    fn apply_json(&mut self, object: &Map<String, Value>) {
        let unknown: Vec<&str> = object
            .keys()
            .map(String::as_str)
            .filter(|key| !CONFIG_KEYS.contains(key))
            .collect();
        if !unknown.is_empty() {
            self.error = Some(ValidationError::unknown_keys(unknown).into());
        }

        if let Some(Value::String(fetch_xml)) = object.get("fetchXml")
            && !fetch_xml.is_empty()
        {
            self.fetch_xml = fetch_xml.clone();
        }

        if let Some(page_size) = object.get("pageSize").filter(|v| is_truthy(v)) {
            self.page_size = page_size_from_value(page_size);
        }

        if let Some(visible) = object.get("newButtonVisibility").and_then(Value::as_bool) {
            self.new_button_visibility = visible;
        }

        if let Some(visible) = object.get("deleteButtonVisibility").and_then(Value::as_bool) {
            self.delete_button_visibility = visible;
        }
    }

    fn apply_fetch_xml(&mut self, raw: &str) {
        let fetch_xml = if raw.is_empty() { self.fetch_xml.as_str() } else { raw };
        if fetch_xml.is_empty() {
            return;
        }

        if let Err(err) = QueryDocument::parse(fetch_xml) {
            self.error = Some(err.into());
        }
        self.fetch_xml = fetch_xml.to_string();
    }
}

/// Reads a page size from a JSON value, clamped to `1..=250`.
///
/// Numbers and numeric strings are accepted; anything else is `1`.
pub fn page_size_from_value(value: &Value) -> u32 {
    let number = match value {
        Value::Number(n) => n.as_f64().unwrap_or(f64::NAN),
        Value::String(s) => s.trim().parse::<f64>().unwrap_or(f64::NAN),
        _ => f64::NAN,
    };
    clamp_page_size(number)
}

fn clamp_page_size(number: f64) -> u32 {
    if number.is_nan() || number < f64::from(MIN_PAGE_SIZE) {
        return MIN_PAGE_SIZE;
    }
    if number > f64::from(MAX_PAGE_SIZE) {
        return MAX_PAGE_SIZE;
    }
    number as u32
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    const QUERY: &str = "<fetch><entity name='account'><attribute name='name'/></entity></fetch>";

    fn defaults() -> GridDefaults {
        GridDefaults::default().with_fetch_xml(QUERY)
    }

    #[test]
    fn test_json_input() {
        let raw = r#"{"fetchXml": "<fetch><entity name='contact'/></fetch>", "pageSize": 10, "deleteButtonVisibility": false}"#;
        let config = GridConfig::from_raw_input(Some(raw), &defaults());

        assert!(config.error.is_none());
        assert_eq!(config.fetch_xml, "<fetch><entity name='contact'/></fetch>");
        assert_eq!(config.page_size, 10);
        assert!(config.new_button_visibility);
        assert!(!config.delete_button_visibility);
    }

    #[test]
    fn test_unknown_keys_still_apply_known_ones() {
        let raw = r#"{"pageSize": 5, "colour": "red", "height": 3}"#;
        let config = GridConfig::from_raw_input(Some(raw), &defaults());

        assert_eq!(config.page_size, 5);
        assert_eq!(config.fetch_xml, QUERY);
        match config.error {
            Some(Error::Validation(ValidationError::UnknownConfigKeys { keys })) => {
                assert_eq!(keys, vec!["colour", "height"]);
            }
            other => panic!("expected unknown keys error, got {:?}", other),
        }
    }

    #[test]
    fn test_fetch_xml_input() {
        let config = GridConfig::from_raw_input(Some("<fetch><entity name='lead'/></fetch>"), &defaults());
        assert!(config.error.is_none());
        assert_eq!(config.fetch_xml, "<fetch><entity name='lead'/></fetch>");
        assert_eq!(config.page_size, 25);
    }

    #[test]
    fn test_empty_input_uses_default_query() {
        let config = GridConfig::from_raw_input(None, &defaults());
        assert!(config.error.is_none());
        assert_eq!(config.fetch_xml, QUERY);

        let config = GridConfig::from_raw_input(Some(""), &defaults());
        assert_eq!(config.fetch_xml, QUERY);
    }

    #[test]
    fn test_malformed_query_attaches_parse_error() {
        let config = GridConfig::from_raw_input(Some("<fetch><entity name='lead'>"), &defaults());
        assert!(matches!(config.error, Some(Error::Parse(_))));
        assert_eq!(config.fetch_xml, "<fetch><entity name='lead'>");
    }

    #[test]
    fn test_page_size_clamping() {
        assert_eq!(page_size_from_value(&json!(0)), 1);
        assert_eq!(page_size_from_value(&json!(-4)), 1);
        assert_eq!(page_size_from_value(&json!(40)), 40);
        assert_eq!(page_size_from_value(&json!(1000)), 250);
        assert_eq!(page_size_from_value(&json!("75")), 75);
        assert_eq!(page_size_from_value(&json!("lots")), 1);
        assert_eq!(page_size_from_value(&json!(null)), 1);

        let config = GridConfig::from_raw_input(Some(r#"{"pageSize": 900}"#), &defaults());
        assert_eq!(config.page_size, 250);
    }
}
