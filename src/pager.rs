//! Offset pagination for flat catalog queries.
//!
//! A page token is the decimal row offset of the next page. Stores fetch
//! `limit + 1` rows and hand the row count to [`Pager::finish`], which trims the
//! extra row and produces the next token.

use crate::error::{Error, Result};

/// Page size used when the caller passes zero.
pub const DEFAULT_PAGE_SIZE: usize = 50;

/// Upper bound on a single page.
pub const MAX_PAGE_SIZE: usize = 1000;

/// One page request against a flat query.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Pager {
    pub token: Option<String>,
    pub size: usize,
}

impl Pager {
    pub fn new(token: Option<String>, size: usize) -> Self {
        Self { token, size }
    }

    /// Returns `(offset, limit)` for the query.
    pub fn parse(&self) -> Result<(usize, usize)> {
        let offset = match self.token.as_deref().map(str::trim) {
            None | Some("") => 0,
            Some(raw) => raw
                .parse::<usize>()
                .map_err(|_| Error::InvalidToken(format!("page token must be an offset: {raw:?}")))?,
        };
        let limit = match self.size {
            0 => DEFAULT_PAGE_SIZE,
            size => size.min(MAX_PAGE_SIZE),
        };
        Ok((offset, limit))
    }

    /// Trims `rows` (fetched with `limit + 1`) to the page and returns the
    /// next token, if any.
    pub fn finish<T>(offset: usize, limit: usize, rows: &mut Vec<T>) -> Option<String> {
        if rows.len() > limit {
            rows.truncate(limit);
            Some((offset + limit).to_string())
        } else {
            None
        }
    }
}
