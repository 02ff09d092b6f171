//! Pagination bookkeeping for one grid page.

/// Position of a loaded page within the full result.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageWindow {
    /// Records selected by the query across all pages.
    pub total_count: usize,
    /// 1-based page number.
    pub page: u32,
    /// Records per page.
    pub page_size: u32,
    /// 1-based index of the first item shown, `0` when the page is empty.
    pub first_item_index: usize,
    /// 1-based index of the last item shown, `0` when the page is empty.
    pub last_item_index: usize,
    /// Whether another page follows.
    pub has_next: bool,
    /// Whether a page precedes this one.
    pub has_previous: bool,
}

impl PageWindow {
    /// Computes the window of page `page` holding `item_count` items.
    pub fn compute(total_count: usize, item_count: usize, page_size: u32, page: u32) -> Self {
        let page_size_wide = page_size as usize;
        let offset = (page.max(1) as usize - 1) * page_size_wide;

        let (first_item_index, last_item_index) = if item_count == 0 {
            (0, 0)
        } else {
            (offset + 1, offset + item_count)
        };

        Self {
            total_count,
            page,
            page_size,
            first_item_index,
            last_item_index,
            has_next: (page as usize) * page_size_wide < total_count,
            has_previous: page > 1,
        }
    }
}
