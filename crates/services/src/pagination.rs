//! Offset pagination shared by every list endpoint.
//!
//! Out-of-range input never errors: a limit outside `0..=MAX_LIMIT` yields an
//! empty page, and a page past the end falls back to the first page.

use domains::PageWindow;

/// Hard ceiling on documents returned by one list call.
pub const MAX_LIMIT: u64 = 20;

/// Page size used when none is configured.
pub const DEFAULT_PAGE_SIZE: u64 = 10;

/// Client-supplied paging parameters. `page` is 1-based.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageRequest {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

/// One resolved page of a listing.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Documents matching the listing's filter, across all pages.
    pub total: u64,
    pub window: PageWindow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaginationConfig {
    max_page_size: u64,
}

impl PaginationConfig {
    /// `max_page_size` is clamped to `1..=MAX_LIMIT`.
    pub fn new(max_page_size: u64) -> Self {
        Self {
            max_page_size: max_page_size.clamp(1, MAX_LIMIT),
        }
    }

    pub const fn max_page_size(&self) -> u64 {
        self.max_page_size
    }

    /// Turns a request into a concrete window over `doc_count` candidates.
    ///
    /// Pages are always `max_page_size` documents apart; `limit` only caps
    /// how many of them are returned.
    pub fn resolve(&self, request: PageRequest, doc_count: u64) -> PageWindow {
        let page_size = self.max_page_size;

        let limit = u64::try_from(request.limit.unwrap_or(page_size as i64))
            .ok()
            .filter(|limit| *limit <= MAX_LIMIT)
            .unwrap_or(0);

        let total_pages = doc_count.div_ceil(page_size);
        let page = request
            .page
            .unwrap_or(1)
            .checked_sub(1)
            .and_then(|index| u64::try_from(index).ok())
            .filter(|index| *index < total_pages)
            .unwrap_or(0);

        PageWindow {
            page,
            skip: page * page_size,
            limit,
        }
    }
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}
