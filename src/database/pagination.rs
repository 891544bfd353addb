use serde::{Deserialize, Serialize};

use crate::{
    constants::{MAX_PAGE_SIZE, PAGE_SIZE},
    error::Error,
};

/// Page number and size requested by a client, 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: i64,
    pub limit: i64,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            limit: PAGE_SIZE,
        }
    }
}

impl PageRequest {
    pub fn new(page: Option<i64>, limit: Option<i64>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            limit: limit.unwrap_or(PAGE_SIZE).clamp(1, MAX_PAGE_SIZE),
        }
    }

    /// Saturates instead of overflowing on absurd page numbers.
    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.limit)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PageContext<T> {
    pub count: i64,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
}

impl<T> PageContext<T> {
    /// `path` is the request path the `next`/`previous` links point back to.
    ///
    /// Any page past the last one is rejected; the first page always exists.
    pub fn from_rows(
        rows: Vec<T>,
        total_rows: i64,
        request: PageRequest,
        path: &str,
    ) -> Result<Self, Error> {
        if request.page > 1 && request.offset() >= total_rows {
            return Err(Error::not_found("Invalid page"));
        }

        let link = |page: i64| format!("{path}?page={page}&limit={}", request.limit);

        let next = (request.offset().saturating_add(request.limit) < total_rows)
            .then(|| link(request.page + 1));
        let previous = (request.page > 1).then(|| link(request.page - 1));

        Ok(Self {
            count: total_rows,
            next,
            previous,
            results: rows,
        })
    }

    pub fn map<U, F: FnMut(T) -> U>(self, f: F) -> PageContext<U> {
        PageContext {
            count: self.count,
            next: self.next,
            previous: self.previous,
            results: self.results.into_iter().map(f).collect(),
        }
    }
}
