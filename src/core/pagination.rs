//! Offset pagination for list endpoints

use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE_SIZE: i64 = 10;

/// Largest page a client may request
pub const MAX_PAGE_SIZE: i64 = 100;

/// Page selection as sent by clients (`?page=2&page_size=20`)
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

impl PageQuery {
    /// Normalize: pages start at 1, sizes fall back to the default when
    /// missing or non-positive and are capped at [`MAX_PAGE_SIZE`].
    pub fn params(&self) -> PageParams {
        let page = self.page.filter(|p| *p >= 1).unwrap_or(1);
        let page_size = self
            .page_size
            .filter(|s| *s >= 1)
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .min(MAX_PAGE_SIZE);

        PageParams { page, page_size }
    }
}

/// Normalized page selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageParams {
    pub page: i64,
    pub page_size: i64,
}

impl PageParams {
    pub fn limit(&self) -> i64 {
        self.page_size
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.page_size)
    }
}

impl Default for PageParams {
    fn default() -> Self {
        PageQuery::default().params()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub page: i64,
    pub page_size: i64,
    pub total: i64,
}

/// One page of results plus the total across all pages
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub pagination: Pagination,
}

impl<T> Page<T> {
    pub fn new(data: Vec<T>, params: PageParams, total: i64) -> Self {
        Self {
            data,
            pagination: Pagination {
                page: params.page,
                page_size: params.page_size,
                total,
            },
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            data: self.data.into_iter().map(f).collect(),
            pagination: self.pagination,
        }
    }
}
