//! Single-page search and scrolled iteration.
//!
//! [`plan`] decides what the next List call sends; [`advance`] records the
//! backend's answer on the predicate. A scroll walks
//! `Fresh -> Active -> ... -> Exhausted`, after which every call is a no-op
//! until the caller builds a new predicate.

use crate::core::query::{translate, Keyword};
use crate::domain::model::SelectionPredicate;
use crate::utils::error::{Result, StorageError};
use serde_json::Value;

/// Deep pagination ceiling for `from + limit`.
pub const MAX_RESULT_WINDOW: usize = 10_000;

pub const DEFAULT_SCROLL_KEEP_ALIVE: &str = "1m";

#[derive(Debug, Clone, PartialEq)]
pub enum ListPlan {
    Search {
        from: Option<usize>,
        size: Option<usize>,
        query: Option<Value>,
    },
    Scroll(ScrollState),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ScrollState {
    Fresh {
        keep_alive: String,
        size: Option<usize>,
        query: Option<Value>,
    },
    Active {
        scroll_id: String,
        keep_alive: String,
    },
    Exhausted,
}

fn translate_opt(keyword: Option<&Keyword>) -> Option<Value> {
    keyword.and_then(translate)
}

fn non_zero(n: usize) -> Option<usize> {
    (n > 0).then_some(n)
}

pub fn plan(sp: &SelectionPredicate) -> Result<ListPlan> {
    if sp.is_scroll() {
        if sp.eof {
            return Ok(ListPlan::Scroll(ScrollState::Exhausted));
        }

        let keep_alive = sp
            .scroll_keep_alive
            .clone()
            .filter(|k| !k.is_empty())
            .unwrap_or_else(|| DEFAULT_SCROLL_KEEP_ALIVE.to_string());

        let state = match &sp.scroll_id {
            Some(scroll_id) if !scroll_id.is_empty() => ScrollState::Active {
                scroll_id: scroll_id.clone(),
                keep_alive,
            },
            _ => ScrollState::Fresh {
                keep_alive,
                size: non_zero(sp.limit),
                query: translate_opt(sp.keyword.as_ref()),
            },
        };
        return Ok(ListPlan::Scroll(state));
    }

    let window = sp.from.checked_add(sp.limit);
    if window.map_or(true, |w| w > MAX_RESULT_WINDOW) {
        return Err(StorageError::bad_request(format!(
            "from+size parameter must not exceed {}",
            MAX_RESULT_WINDOW
        )));
    }

    Ok(ListPlan::Search {
        from: non_zero(sp.from),
        size: non_zero(sp.limit),
        query: translate_opt(sp.keyword.as_ref()),
    })
}

/// Records a scroll page on the cursor. An empty page ends the stream.
pub fn advance(sp: &mut SelectionPredicate, next_scroll_id: Option<String>, hit_count: usize) {
    if hit_count == 0 {
        mark_exhausted(sp);
    } else {
        sp.scroll_id = next_scroll_id;
    }
}

pub fn mark_exhausted(sp: &mut SelectionPredicate) {
    sp.eof = true;
    sp.scroll_id = None;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_plain_search_plan() {
        let sp = SelectionPredicate::new().keyword("code:myid").page(100, 50);
        let plan = plan(&sp).unwrap();
        assert_eq!(
            plan,
            ListPlan::Search {
                from: Some(100),
                size: Some(50),
                query: Some(json!({"query_string": {"query": "code:myid"}})),
            }
        );
    }

    #[test]
    fn test_default_predicate_lists_everything() {
        let plan = plan(&SelectionPredicate::default()).unwrap();
        assert_eq!(
            plan,
            ListPlan::Search {
                from: None,
                size: None,
                query: None
            }
        );
    }

    #[test]
    fn test_result_window_ceiling() {
        let err = plan(&SelectionPredicate::new().page(9999, 2)).unwrap_err();
        assert!(err.is_bad_request());

        assert!(plan(&SelectionPredicate::new().page(9990, 10)).is_ok());
    }

    #[test]
    fn test_scroll_lifecycle() {
        let mut sp = SelectionPredicate::new().scroll("1m").limit(1);

        match plan(&sp).unwrap() {
            ListPlan::Scroll(ScrollState::Fresh {
                keep_alive, size, ..
            }) => {
                assert_eq!(keep_alive, "1m");
                assert_eq!(size, Some(1));
            }
            other => panic!("unexpected plan {:?}", other),
        }

        advance(&mut sp, Some("cursor-1".to_string()), 1);
        assert_eq!(
            plan(&sp).unwrap(),
            ListPlan::Scroll(ScrollState::Active {
                scroll_id: "cursor-1".to_string(),
                keep_alive: "1m".to_string(),
            })
        );

        advance(&mut sp, Some("cursor-2".to_string()), 0);
        assert!(sp.eof);
        assert_eq!(sp.scroll_id, None);
        assert_eq!(plan(&sp).unwrap(), ListPlan::Scroll(ScrollState::Exhausted));
    }

    #[test]
    fn test_scroll_ignores_result_window() {
        let sp = SelectionPredicate::new().page(9999, 500).scroll("30s");
        assert!(matches!(plan(&sp).unwrap(), ListPlan::Scroll(_)));
    }

    #[test]
    fn test_window_overflow_is_rejected() {
        let sp = SelectionPredicate::new().page(usize::MAX, 2);
        assert!(plan(&sp).unwrap_err().is_bad_request());
    }
}
