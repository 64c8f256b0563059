//! List query parameters and paged responses.

use serde::{Deserialize, Serialize};

const MAX_PER_PAGE: u32 = 100;

fn default_page() -> u32 {
    1
}

fn default_per_page() -> u32 {
    20
}

/// Resolved paging window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    /// 1-indexed
    pub page: u32,
    pub per_page: u32,
}

impl Page {
    pub fn new(page: u32, per_page: u32) -> Self {
        Self {
            page: page.max(1),
            per_page: per_page.clamp(1, MAX_PER_PAGE),
        }
    }

    pub fn limit(&self) -> i64 {
        i64::from(self.per_page)
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page - 1) * self.limit()
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new(default_page(), default_per_page())
    }
}

/// Query string for plain paged lists.
///
/// `GET /api/v1/payments?page=2`
#[derive(Debug, Clone, Deserialize)]
pub struct PageQuery {
    #[serde(default = "default_page")]
    pub page: u32,

    #[serde(default = "default_per_page")]
    pub per_page: u32,
}

impl PageQuery {
    pub fn page(&self) -> Page {
        Page::new(self.page, self.per_page)
    }
}

/// Query string for status-filtered lists.
///
/// `GET /api/v1/loans?status=active&page=2&per_page=50`
#[derive(Debug, Clone, Deserialize)]
pub struct ListQuery<S> {
    pub status: Option<S>,

    #[serde(default = "default_page")]
    pub page: u32,

    #[serde(default = "default_per_page")]
    pub per_page: u32,
}

impl<S> ListQuery<S> {
    pub fn page(&self) -> Page {
        Page::new(self.page, self.per_page)
    }
}

/// Query string for the profile list: name/client number search plus paging.
///
/// `GET /api/v1/profiles?search=ngata`
#[derive(Debug, Clone, Deserialize)]
pub struct SearchQuery {
    pub search: Option<String>,

    #[serde(default = "default_page")]
    pub page: u32,

    #[serde(default = "default_per_page")]
    pub per_page: u32,
}

impl SearchQuery {
    pub fn page(&self) -> Page {
        Page::new(self.page, self.per_page)
    }

    /// `ILIKE` pattern for the search term, `None` when blank.
    pub fn pattern(&self) -> Option<String> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|term| !term.is_empty())
            .map(|term| {
                let escaped = term
                    .replace('\\', "\\\\")
                    .replace('%', "\\%")
                    .replace('_', "\\_");
                format!("%{escaped}%")
            })
    }
}

/// Response wrapper for paginated data.
#[derive(Debug, Serialize)]
pub struct PageResponse<T> {
    pub data: Vec<T>,
    pub meta: PageMeta,
}

#[derive(Debug, PartialEq, Eq, Serialize)]
pub struct PageMeta {
    pub page: u32,
    pub per_page: u32,
    pub total: i64,
    pub total_pages: i64,
}

impl<T> PageResponse<T> {
    pub fn new(data: Vec<T>, page: Page, total: i64) -> Self {
        let per_page = page.limit();
        let total_pages = if total <= 0 {
            1
        } else {
            (total + per_page - 1) / per_page
        };

        Self {
            data,
            meta: PageMeta {
                page: page.page,
                per_page: page.per_page,
                total,
                total_pages,
            },
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> PageResponse<U> {
        PageResponse {
            data: self.data.into_iter().map(f).collect(),
            meta: self.meta,
        }
    }
}
