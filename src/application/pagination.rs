//! Shared page-number pagination helpers.

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_PAGE: u32 = 1;
pub const DEFAULT_LIMIT: u32 = 20;
pub const MAX_LIMIT: u32 = 100;

/// Pagination as supplied by a client, before defaults and bounds are applied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PaginationInput {
    pub page: Option<i32>,
    pub limit: Option<i32>,
}

impl PaginationInput {
    pub fn new(page: Option<i32>, limit: Option<i32>) -> Self {
        Self { page, limit }
    }
}

/// Validated page request; `page` is 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PageRequest {
    page: u32,
    limit: u32,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            limit: DEFAULT_LIMIT,
        }
    }
}

impl PageRequest {
    pub fn new(page: u32, limit: u32) -> Result<Self, PaginationError> {
        if page < 1 {
            return Err(PaginationError::InvalidPage(page.into()));
        }
        if !(1..=MAX_LIMIT).contains(&limit) {
            return Err(PaginationError::InvalidLimit(limit.into()));
        }
        Ok(Self { page, limit })
    }

    pub fn from_input(input: PaginationInput) -> Result<Self, PaginationError> {
        let page = input.page.unwrap_or(DEFAULT_PAGE as i32);
        let limit = input.limit.unwrap_or(DEFAULT_LIMIT as i32);

        let page = u32::try_from(page).map_err(|_| PaginationError::InvalidPage(page.into()))?;
        let limit =
            u32::try_from(limit).map_err(|_| PaginationError::InvalidLimit(limit.into()))?;
        Self::new(page, limit)
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.limit)
    }
}

/// Page metadata computed from a request and the total number of matching rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageInfo {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub last_page: u64,
    pub has_next_page: bool,
    pub has_previous_page: bool,
}

impl PageInfo {
    pub fn new(request: PageRequest, total: u64) -> Self {
        let last_page = total.div_ceil(u64::from(request.limit));
        Self {
            page: request.page,
            limit: request.limit,
            total,
            last_page,
            has_next_page: u64::from(request.page) < last_page,
            has_previous_page: request.page > 1,
        }
    }
}

/// A page of items with its metadata.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub info: PageInfo,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, request: PageRequest, total: u64) -> Self {
        Self {
            items,
            info: PageInfo::new(request, total),
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PaginationError {
    #[error("page must be at least 1, got {0}")]
    InvalidPage(i64),
    #[error("limit must be between 1 and {MAX_LIMIT}, got {0}")]
    InvalidLimit(i64),
}
