//! Pagination types for list endpoints.

use serde::{Deserialize, Serialize};

/// Largest page a client may ask for.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Request parameters for paginated queries.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PageRequest {
    /// Page number (1-indexed).
    #[serde(default = "default_page")]
    pub page: u32,
    /// Number of items per page.
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

fn default_page() -> u32 {
    1
}

fn default_page_size() -> u32 {
    20
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: default_page(),
            page_size: default_page_size(),
        }
    }
}

impl PageRequest {
    /// Clamps the page to at least 1 and the size to `1..=MAX_PAGE_SIZE`.
    #[must_use]
    pub fn normalized(self) -> Self {
        Self {
            page: self.page.max(1),
            page_size: self.page_size.clamp(1, MAX_PAGE_SIZE),
        }
    }

    /// Calculates the offset for database queries.
    #[must_use]
    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.page_size)
    }

    /// Returns the limit for database queries.
    #[must_use]
    pub fn limit(&self) -> u64 {
        u64::from(self.page_size)
    }
}

/// Response wrapper for paginated data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageResponse<T> {
    /// The items in the current page.
    pub data: Vec<T>,
    /// Pagination metadata.
    pub meta: PageMeta,
}

/// Pagination metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageMeta {
    /// Current page number.
    pub page: u32,
    /// Items per page.
    pub page_size: u32,
    /// Total number of items across all pages.
    pub total: u64,
    /// Total number of pages; at least 1.
    pub total_pages: u64,
}

impl<T> PageResponse<T> {
    /// Creates a new paginated response.
    #[must_use]
    pub fn new(data: Vec<T>, request: PageRequest, total: u64) -> Self {
        let total_pages = total.div_ceil(u64::from(request.page_size.max(1))).max(1);
        Self {
            data,
            meta: PageMeta {
                page: request.page,
                page_size: request.page_size,
                total,
                total_pages,
            },
        }
    }

    /// Converts every item, keeping the metadata.
    #[must_use]
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> PageResponse<U> {
        PageResponse {
            data: self.data.into_iter().map(f).collect(),
            meta: self.meta,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offset_and_limit() {
        let request = PageRequest {
            page: 3,
            page_size: 20,
        };
        assert_eq!(request.offset(), 40);
        assert_eq!(request.limit(), 20);
        assert_eq!(PageRequest::default().offset(), 0);
    }

    #[test]
    fn test_normalized_clamps_bounds() {
        let request = PageRequest {
            page: 0,
            page_size: 5_000,
        }
        .normalized();
        assert_eq!(request.page, 1);
        assert_eq!(request.page_size, MAX_PAGE_SIZE);
        assert_eq!(PageRequest { page: 2, page_size: 0 }.normalized().page_size, 1);
    }

    #[test]
    fn test_total_pages_rounds_up() {
        let request = PageRequest {
            page: 1,
            page_size: 10,
        };
        assert_eq!(PageResponse::<u8>::new(vec![], request, 0).meta.total_pages, 1);
        assert_eq!(PageResponse::<u8>::new(vec![], request, 10).meta.total_pages, 1);
        assert_eq!(PageResponse::<u8>::new(vec![], request, 11).meta.total_pages, 2);
    }
}
