use serde::{Deserialize, Serialize};
use validator::Validate;

pub const DEFAULT_PAGE: i64 = 1;
pub const DEFAULT_SIZE_PAGE: i64 = 100;
pub const MAX_SIZE_PAGE: i64 = 1000;

pub fn default_page() -> i64 {
    DEFAULT_PAGE
}

pub fn default_size_page() -> i64 {
    DEFAULT_SIZE_PAGE
}

/// Page request carried in the query string (`?page=2&size_page=20`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct Pagination {
    #[serde(default = "default_page")]
    #[validate(range(min = 1, message = "page must be greater than zero"))]
    pub page: i64,

    #[serde(default = "default_size_page")]
    #[validate(range(min = 1, max = 1000, message = "size_page must be between 1 and 1000"))]
    pub size_page: i64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            size_page: DEFAULT_SIZE_PAGE,
        }
    }
}

impl Pagination {
    pub fn new(page: i64, size_page: i64) -> Self {
        Self { page, size_page }
    }

    pub fn offset(&self) -> i64 {
        (self.page.max(1) - 1) * self.size_page.clamp(1, MAX_SIZE_PAGE)
    }

    pub fn limit(&self) -> i64 {
        self.size_page.clamp(1, MAX_SIZE_PAGE)
    }
}

/// Derived pagination block returned next to list data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationResults {
    pub total: i64,
    pub current_page: i64,
    pub size_page: i64,
    pub last_page: i64,
    pub from: i64,
    pub to: i64,
}

impl PaginationResults {
    pub fn from_params(pagination: &Pagination, total: i64) -> Self {
        let size_page = pagination.limit();
        let total = total.max(0);
        let offset = pagination.offset();
        let last_page = ((total + size_page - 1) / size_page).max(1);

        let (from, to) = if total > offset {
            (offset + 1, (offset + size_page).min(total))
        } else {
            (0, 0)
        };

        Self {
            total,
            current_page: pagination.page.max(1),
            size_page,
            last_page,
            from,
            to,
        }
    }
}

/// List data plus its pagination block
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub pagination: PaginationResults,
}
