//! Keyset pagination for newest-first listings.
//!
//! A page is requested with a `limit` and an optional `before` cursor. The
//! cursor encodes the id of the last item the caller saw; V7 ids are time
//! ordered so `(created_at, id)` gives a stable total order.
//!
//! ```rust,ignore
//! let page = PageRequest { limit: Some(50), before: None }.validate()?;
//! let result = audit_log.query(&filter, &page).await?;
//! let next = PageRequest { limit: Some(50), before: result.next_cursor };
//! ```

use anyhow::{Context, Result};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const DEFAULT_PAGE_SIZE: i64 = 50;
pub const MAX_PAGE_SIZE: i64 = 200;

/// Opaque cursor (base64-encoded UUID).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor(Uuid);

impl Cursor {
    pub fn new(id: Uuid) -> Self {
        Cursor(id)
    }

    pub fn encode(&self) -> String {
        URL_SAFE_NO_PAD.encode(self.0.as_bytes())
    }

    pub fn decode(s: &str) -> Result<Self> {
        let bytes = URL_SAFE_NO_PAD
            .decode(s)
            .context("Invalid cursor: not valid base64")?;
        let uuid = Uuid::from_slice(&bytes).context("Invalid cursor: not a valid UUID")?;
        Ok(Cursor(uuid))
    }

    pub fn into_uuid(self) -> Uuid {
        self.0
    }
}

/// Raw pagination input as it arrives from a caller.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageRequest {
    pub limit: Option<i64>,
    pub before: Option<String>,
}

impl PageRequest {
    pub fn first(limit: i64) -> Self {
        Self {
            limit: Some(limit),
            before: None,
        }
    }

    /// Clamp the limit and decode the cursor.
    pub fn validate(&self) -> Result<ValidatedPage> {
        let limit = self.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
        let before = self
            .before
            .as_deref()
            .map(Cursor::decode)
            .transpose()?
            .map(Cursor::into_uuid);
        Ok(ValidatedPage { limit, before })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidatedPage {
    pub limit: i64,
    pub before: Option<Uuid>,
}

impl Default for ValidatedPage {
    fn default() -> Self {
        Self {
            limit: DEFAULT_PAGE_SIZE,
            before: None,
        }
    }
}

impl ValidatedPage {
    /// Rows to fetch: one extra tells us whether another page exists.
    pub fn fetch_limit(&self) -> i64 {
        self.limit + 1
    }
}

/// One page of results plus the cursor for the next (older) page.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_cursor: Option<String>,
}

impl<T> Page<T> {
    /// Build a page from `fetch_limit()` rows, trimming the look-ahead row.
    pub fn from_rows(mut rows: Vec<T>, page: &ValidatedPage, id_of: impl Fn(&T) -> Uuid) -> Self {
        let has_more = rows.len() as i64 > page.limit;
        rows.truncate(page.limit as usize);
        let next_cursor = if has_more {
            rows.last().map(|item| Cursor::new(id_of(item)).encode())
        } else {
            None
        };
        Page {
            items: rows,
            next_cursor,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_roundtrip() {
        let id = Uuid::now_v7();
        let encoded = Cursor::new(id).encode();
        assert_eq!(Cursor::decode(&encoded).unwrap().into_uuid(), id);
    }

    #[test]
    fn test_cursor_rejects_garbage() {
        assert!(Cursor::decode("!!!").is_err());
        assert!(Cursor::decode(&URL_SAFE_NO_PAD.encode(b"short")).is_err());
    }

    #[test]
    fn test_limit_is_clamped() {
        assert_eq!(PageRequest::first(0).validate().unwrap().limit, 1);
        assert_eq!(PageRequest::first(10_000).validate().unwrap().limit, MAX_PAGE_SIZE);
        assert_eq!(
            PageRequest::default().validate().unwrap().limit,
            DEFAULT_PAGE_SIZE
        );
    }

    #[test]
    fn test_from_rows_sets_cursor_only_when_more_exist() {
        let page = ValidatedPage {
            limit: 2,
            before: None,
        };
        let ids: Vec<Uuid> = (0..3).map(|_| Uuid::now_v7()).collect();

        let full = Page::from_rows(ids.clone(), &page, |id| *id);
        assert_eq!(full.items.len(), 2);
        assert_eq!(full.next_cursor, Some(Cursor::new(ids[1]).encode()));

        let last = Page::from_rows(ids[..2].to_vec(), &page, |id| *id);
        assert!(last.next_cursor.is_none());
    }
}
