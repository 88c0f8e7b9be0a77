//! Cursor pagination
//!
//! Offset-based cursors with the `limit+1` sizing convention: each stage
//! requests one row beyond the page size, uses the sentinel row only to
//! detect a further page, and drops it before returning. Cursors encode
//! an offset and direction flags, never a data snapshot; all pagination
//! state is client-held.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Opaque pagination token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    pub offset: usize,
    /// Whether this cursor points at the previous page.
    pub is_prev: bool,
    /// Whether following this cursor can yield results.
    pub has_results: bool,
}

impl Cursor {
    pub fn new(offset: usize, is_prev: bool, has_results: bool) -> Self {
        Self {
            offset,
            is_prev,
            has_results,
        }
    }
}

/// Compact wire form `offset:is_prev:has_results`, e.g. `5:0:1`.
impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}",
            self.offset, self.is_prev as u8, self.has_results as u8
        )
    }
}

impl FromStr for Cursor {
    type Err = crate::Error;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = raw.split(':').collect();
        let [offset, is_prev, has_results] = parts.as_slice() else {
            return Err(crate::Error::Config(format!(
                "malformed cursor '{raw}', expected offset:prev:results"
            )));
        };
        let parse_flag = |raw: &str| match raw {
            "0" => Ok(false),
            "1" => Ok(true),
            other => Err(crate::Error::Config(format!(
                "malformed cursor flag '{other}'"
            ))),
        };
        Ok(Cursor {
            offset: offset
                .parse()
                .map_err(|_| crate::Error::Config(format!("malformed cursor offset '{offset}'")))?,
            is_prev: parse_flag(is_prev)?,
            has_results: parse_flag(has_results)?,
        })
    }
}

/// One page of results with its neighboring cursors.
#[derive(Debug, Clone, Serialize)]
pub struct CursorPage<T> {
    pub results: Vec<T>,
    pub next: Cursor,
    pub prev: Cursor,
}

impl<T> CursorPage<T> {
    /// An empty page at the given offset.
    pub fn empty(limit: usize, offset: usize) -> Self {
        Self {
            results: Vec::new(),
            next: Cursor::new(offset + limit, false, false),
            prev: Cursor::new(offset.saturating_sub(limit), true, offset > 0),
        }
    }
}

/// Assemble a page from `limit+1`-sized fetch results.
///
/// `rows` must come from a query issued with `limit + 1`; the sentinel
/// row, when present, proves a further page exists and is dropped here.
pub fn paginate<T>(mut rows: Vec<T>, limit: usize, offset: usize) -> CursorPage<T> {
    let has_more = rows.len() == limit + 1;
    if has_more {
        rows.pop();
    }
    CursorPage {
        results: rows,
        next: Cursor::new(offset + limit, false, has_more),
        prev: Cursor::new(offset.saturating_sub(limit), true, offset > 0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_page_has_more_and_advances_offset() {
        // 6 matching rows, limit 5, offset 0.
        let page = paginate((0..6).collect(), 5, 0);
        assert_eq!(page.results.len(), 5);
        assert!(page.next.has_results);
        assert_eq!(page.next.offset, 5);
        assert!(!page.prev.has_results);
    }

    #[test]
    fn final_partial_page_has_no_more() {
        let page = paginate(vec![5], 5, 5);
        assert_eq!(page.results.len(), 1);
        assert!(!page.next.has_results);
        assert_eq!(page.next.offset, 10);
        assert!(page.prev.has_results);
        assert_eq!(page.prev.offset, 0);
    }

    #[test]
    fn prev_offset_never_goes_negative() {
        let page = paginate(vec![0, 1], 5, 3);
        assert_eq!(page.prev.offset, 0);
    }

    #[test]
    fn cursor_round_trips_through_wire_form() {
        let cursor = Cursor::new(15, false, true);
        let parsed: Cursor = cursor.to_string().parse().unwrap();
        assert_eq!(parsed, cursor);
        assert_eq!(cursor.to_string(), "15:0:1");
    }

    #[test]
    fn malformed_cursor_is_rejected() {
        assert!("not-a-cursor".parse::<Cursor>().is_err());
        assert!("1:2".parse::<Cursor>().is_err());
        assert!("x:0:1".parse::<Cursor>().is_err());
    }
}
