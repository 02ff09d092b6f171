//! Column descriptors for the grid header.

use serde::Serialize;

use crate::query::OrderDirective;

/// Narrowest width a column is given, in pixels.
pub const MIN_COLUMN_WIDTH: u32 = 100;

/// One grid column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Column {
    /// Cell key the column renders.
    pub key: String,
    /// Logical name of the attribute behind the column.
    pub field_name: String,
    /// Header text.
    pub name: String,
    /// Width in pixels.
    pub width: u32,
    /// Whether the attribute comes from a link-entity.
    pub is_link_entity: bool,
    /// Whether the query orders by this column.
    pub is_sorted: bool,
    /// Whether that order is descending.
    pub is_sorted_descending: bool,
}

impl Column {
    /// Creates an unsorted column.
    pub fn new(key: impl Into<String>, field_name: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            field_name: field_name.into(),
            name: name.into(),
            width: MIN_COLUMN_WIDTH,
            is_link_entity: false,
            is_sorted: false,
            is_sorted_descending: false,
        }
    }

    /// Marks the column as a link-entity column.
    pub fn link_entity(mut self) -> Self {
        self.is_link_entity = true;
        self
    }

    /// Sets the width.
    pub fn with_width(mut self, width: u32) -> Self {
        self.width = width;
        self
    }
}

/// Everything the grid needs to draw its chrome.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GridHeader {
    /// Columns in display order.
    pub columns: Vec<Column>,
    /// Display name of the root entity, used by the "New" button.
    pub display_name: String,
}

/// Splits the allocated width evenly, never going below
/// [`MIN_COLUMN_WIDTH`].
pub fn column_width(allocated_width: u32, column_count: usize) -> u32 {
    if column_count == 0 {
        return allocated_width.max(MIN_COLUMN_WIDTH);
    }
    let share = allocated_width / u32::try_from(column_count).unwrap_or(u32::MAX);
    share.max(MIN_COLUMN_WIDTH)
}

/// Flags the column the query orders by.
///
/// A column matches when its cell key or, for root columns, its field name
/// equals the order's field. Every other column is cleared.
pub fn sort_columns(columns: &mut [Column], order: Option<&OrderDirective>) {
    for column in columns.iter_mut() {
        let matched = order.filter(|o| {
            column.key == o.field || (!column.is_link_entity && column.field_name == o.field)
        });

        column.is_sorted = matched.is_some();
        column.is_sorted_descending = matched.is_some_and(|o| o.descending);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn columns() -> Vec<Column> {
        vec![
            Column::new("name", "name", "Account Name"),
            Column::new("revenue", "revenue", "Annual Revenue"),
            Column::new("pc.fullname", "fullname", "Full Name (pc)").link_entity(),
        ]
    }

    #[test]
    fn test_column_width() {
        assert_eq!(column_width(900, 3), 300);
        assert_eq!(column_width(250, 3), MIN_COLUMN_WIDTH);
        assert_eq!(column_width(50, 0), MIN_COLUMN_WIDTH);
    }

    #[test]
    fn test_sort_root_column() {
        let mut columns = columns();
        let order = OrderDirective {
            field: "revenue".to_string(),
            descending: true,
        };

        sort_columns(&mut columns, Some(&order));
        assert!(!columns[0].is_sorted);
        assert!(columns[1].is_sorted);
        assert!(columns[1].is_sorted_descending);
        assert!(!columns[2].is_sorted);
    }

    #[test]
    fn test_sort_by_link_cell_key() {
        let mut columns = columns();
        let order = OrderDirective {
            field: "pc.fullname".to_string(),
            descending: false,
        };

        sort_columns(&mut columns, Some(&order));
        assert!(columns[2].is_sorted);
        assert!(!columns[2].is_sorted_descending);
    }

    #[test]
    fn test_link_field_name_alone_does_not_match() {
        let mut columns = columns();
        let order = OrderDirective {
            field: "fullname".to_string(),
            descending: false,
        };

        sort_columns(&mut columns, Some(&order));
        assert!(columns.iter().all(|c| !c.is_sorted));
    }

    #[test]
    fn test_no_order_clears_flags() {
        let mut columns = columns();
        columns[0].is_sorted = true;
        columns[0].is_sorted_descending = true;

        sort_columns(&mut columns, None);
        assert!(!columns[0].is_sorted);
        assert!(!columns[0].is_sorted_descending);
    }
}
