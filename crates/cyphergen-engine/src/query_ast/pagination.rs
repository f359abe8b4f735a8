//! Offset pagination and Relay-style cursors.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use cyphergen_adapters::cypher::Expr;
use cyphergen_common::utils::error::{InputError, Result};
use serde::Serialize;

use super::context::QueryAstContext;

const CURSOR_PREFIX: &str = "arrayconnection:";

/// `SKIP` and `LIMIT` of a read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Pagination {
    /// Rows to skip.
    pub skip: Option<i64>,
    /// Rows to keep.
    pub limit: Option<i64>,
}

impl Pagination {
    /// Returns `true` if neither bound is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.skip.is_none() && self.limit.is_none()
    }

    /// The `SKIP` and `LIMIT` expressions, as fresh parameters.
    pub fn get_pagination(&self, ctx: &QueryAstContext<'_>) -> (Option<Expr>, Option<Expr>) {
        let env = ctx.env();
        let skip = self.skip.map(|skip| env.param(skip).into());
        let limit = self.limit.map(|limit| env.param(limit).into());
        (skip, limit)
    }
}

/// Encodes an edge offset as an opaque cursor.
///
/// # Examples
///
/// ```
/// use cyphergen_engine::query_ast::{cursor_to_offset, offset_to_cursor};
///
/// let cursor = offset_to_cursor(3);
/// assert_eq!(cursor, "YXJyYXljb25uZWN0aW9uOjM=");
/// assert_eq!(cursor_to_offset(&cursor).unwrap(), 3);
/// ```
#[must_use]
pub fn offset_to_cursor(offset: i64) -> String {
    STANDARD.encode(format!("{CURSOR_PREFIX}{offset}"))
}

/// Decodes a cursor produced by [`offset_to_cursor`].
pub fn cursor_to_offset(cursor: &str) -> Result<i64> {
    let invalid = || InputError::InvalidCursor(cursor.to_string());
    let bytes = STANDARD.decode(cursor).map_err(|_| invalid())?;
    let text = String::from_utf8(bytes).map_err(|_| invalid())?;
    let offset = text
        .strip_prefix(CURSOR_PREFIX)
        .and_then(|n| n.parse::<i64>().ok())
        .filter(|offset| *offset >= 0)
        .ok_or_else(invalid)?;
    Ok(offset)
}

/// Relay `pageInfo` of one connection page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    /// Cursor of the first edge on the page.
    pub start_cursor: Option<String>,
    /// Cursor of the last edge on the page.
    pub end_cursor: Option<String>,
    /// More edges follow the page.
    pub has_next_page: bool,
    /// Edges precede the page.
    pub has_previous_page: bool,
}

impl PageInfo {
    /// Computes page info for `edge_count` edges starting at `offset`, out of
    /// `total_count`, when at most `limit` edges were requested.
    #[must_use]
    pub fn compute(offset: i64, limit: Option<i64>, edge_count: i64, total_count: i64) -> Self {
        let (start_cursor, end_cursor) = if edge_count > 0 {
            (
                Some(offset_to_cursor(offset)),
                Some(offset_to_cursor(offset + edge_count - 1)),
            )
        } else {
            (None, None)
        };
        Self {
            start_cursor,
            end_cursor,
            has_next_page: limit.is_some_and(|limit| offset + limit < total_count),
            has_previous_page: offset > 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cyphergen_common::utils::error::Error;

    #[test]
    fn test_cursor_rejects_foreign_strings() {
        assert!(matches!(
            cursor_to_offset("not base64!"),
            Err(Error::Input(InputError::InvalidCursor(_)))
        ));
        let foreign = STANDARD.encode("somethingelse:4");
        assert!(cursor_to_offset(&foreign).is_err());
    }

    #[test]
    fn test_cursor_offset_bounds() {
        assert_eq!(cursor_to_offset(&offset_to_cursor(0)).unwrap(), 0);
        assert_eq!(cursor_to_offset(&offset_to_cursor(i64::MAX)).unwrap(), i64::MAX);
        let negative = STANDARD.encode("arrayconnection:-5");
        assert!(matches!(
            cursor_to_offset(&negative),
            Err(Error::Input(InputError::InvalidCursor(_)))
        ));
    }

    #[test]
    fn test_page_info_middle_page() {
        let info = PageInfo::compute(10, Some(10), 10, 25);
        assert_eq!(info.start_cursor.as_deref(), Some(offset_to_cursor(10).as_str()));
        assert_eq!(info.end_cursor.as_deref(), Some(offset_to_cursor(19).as_str()));
        assert!(info.has_next_page);
        assert!(info.has_previous_page);
    }

    #[test]
    fn test_page_info_empty_page() {
        let info = PageInfo::compute(0, None, 0, 0);
        assert_eq!(info.start_cursor, None);
        assert!(!info.has_next_page);
        assert!(!info.has_previous_page);
    }
}
