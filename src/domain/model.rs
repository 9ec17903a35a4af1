use crate::core::query::Keyword;
use crate::utils::error::StorageError;
use serde::{Deserialize, Serialize};

/// Request descriptor for List. The same instance is the cursor of a
/// scroll sequence: adapters overwrite `scroll_id` and set `eof`.
#[derive(Debug, Clone, Default)]
pub struct SelectionPredicate {
    pub keyword: Option<Keyword>,
    pub limit: usize,
    pub from: usize,

    pub scroll_keep_alive: Option<String>,
    pub scroll_id: Option<String>,
    pub eof: bool,

    /// Object storage only: return identifiers without fetching bodies.
    pub key_only: bool,
}

impl SelectionPredicate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn keyword(mut self, keyword: impl Into<Keyword>) -> Self {
        self.keyword = Some(keyword.into());
        self
    }

    pub fn page(mut self, from: usize, limit: usize) -> Self {
        self.from = from;
        self.limit = limit;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn scroll(mut self, keep_alive: impl Into<String>) -> Self {
        self.scroll_keep_alive = Some(keep_alive.into());
        self
    }

    pub fn key_only(mut self) -> Self {
        self.key_only = true;
        self
    }

    pub fn is_scroll(&self) -> bool {
        self.scroll_keep_alive.is_some() || self.scroll_id.is_some()
    }
}

/// Bulk-write item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelObj<T> {
    pub id: String,
    pub data: T,
}

impl<T> ChannelObj<T> {
    pub fn new(id: impl Into<String>, data: T) -> Self {
        Self {
            id: id.into(),
            data,
        }
    }
}

#[derive(Debug)]
pub enum ListItem<T> {
    Object(T),
    Key(String),
    Failed { key: String, error: StorageError },
}

impl<T> ListItem<T> {
    pub fn object(&self) -> Option<&T> {
        match self {
            ListItem::Object(obj) => Some(obj),
            _ => None,
        }
    }

    pub fn into_object(self) -> Option<T> {
        match self {
            ListItem::Object(obj) => Some(obj),
            _ => None,
        }
    }

    pub fn key(&self) -> Option<&str> {
        match self {
            ListItem::Key(key) | ListItem::Failed { key, .. } => Some(key),
            ListItem::Object(_) => None,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, ListItem::Failed { .. })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BulkReport {
    pub written: u64,
    pub failed: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct DeleteByQueryReport {
    #[serde(default)]
    pub deleted: i64,
    #[serde(default)]
    pub version_conflicts: i64,
}
