//! Paged response envelope

use serde::{Deserialize, Serialize};

/// `{ data, pagination }` envelope returned by listing endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PagedResponse<T> {
    /// The items of the current page, in listing order
    pub data: Vec<T>,
    pub pagination: PaginationMetadata,
}

impl<T> PagedResponse<T> {
    pub fn new(data: Vec<T>, page: i64, page_size: i64, total_items: i64) -> Self {
        Self {
            data,
            pagination: PaginationMetadata::new(page, page_size, total_items),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationMetadata {
    /// Current page number (1-indexed)
    pub page: i64,
    pub page_size: i64,
    pub total_pages: i64,
    /// Number of items matching the filters across all pages
    pub total_items: i64,
    pub has_next_page: bool,
    pub has_previous_page: bool,
}

impl PaginationMetadata {
    pub fn new(page: i64, page_size: i64, total_items: i64) -> Self {
        let total_pages = total_pages(total_items, page_size);
        Self {
            page,
            page_size,
            total_pages,
            total_items,
            has_next_page: page < total_pages,
            has_previous_page: page > 1,
        }
    }

    /// Expected length of `data` for this page.
    pub fn expected_len(&self) -> i64 {
        let skipped = (self.page - 1).max(0).saturating_mul(self.page_size);
        self.total_items
            .saturating_sub(skipped)
            .max(0)
            .min(self.page_size)
    }
}

/// `ceil(total_items / page_size)`, zero when nothing matched.
pub fn total_pages(total_items: i64, page_size: i64) -> i64 {
    if total_items <= 0 || page_size <= 0 {
        return 0;
    }
    (total_items - 1) / page_size + 1
}
