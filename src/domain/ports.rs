use crate::core::context::Context;
use crate::core::query::Keyword;
use crate::core::version::Versioned;
use crate::domain::model::{
    BulkReport, ChannelObj, DeleteByQueryReport, ListItem, SelectionPredicate,
};
use crate::utils::error::Result;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tokio::sync::mpsc;

/// Storage contract shared by every backend adapter.
///
/// Point operations take `/collection/subcollection/id` keys; `list`,
/// `delete_by_query` and `bulk_create` take `/collection[/subcollection]`.
/// `ttl` is accepted for interface compatibility; no adapter expires data.
#[async_trait]
pub trait Storage: Send + Sync {
    async fn get<T>(&self, ctx: &Context, key: &str) -> Result<T>
    where
        T: DeserializeOwned + Versioned + Send;

    async fn create<T>(
        &self,
        ctx: &Context,
        key: &str,
        obj: &T,
        ttl: Option<Duration>,
    ) -> Result<()>
    where
        T: Serialize + Sync;

    /// Drains `items` until every sender is dropped.
    async fn bulk_create<T>(
        &self,
        ctx: &Context,
        key: &str,
        items: mpsc::Receiver<ChannelObj<T>>,
        ttl: Option<Duration>,
    ) -> Result<BulkReport>
    where
        T: Serialize + Send + 'static;

    /// Partial update. A nonzero `resource_version` must match the stored
    /// version at apply time.
    async fn update<T>(
        &self,
        ctx: &Context,
        key: &str,
        resource_version: i64,
        obj: &T,
        ttl: Option<Duration>,
    ) -> Result<()>
    where
        T: Serialize + Sync;

    /// Updates with `update_obj` if the key exists, else inserts `insert_obj`
    /// (or `update_obj` when `insert_obj` is `None`).
    async fn upsert<U, I>(
        &self,
        ctx: &Context,
        key: &str,
        resource_version: i64,
        update_obj: &U,
        insert_obj: Option<&I>,
        ttl: Option<Duration>,
    ) -> Result<()>
    where
        U: Serialize + Sync,
        I: Serialize + Sync;

    async fn delete(&self, ctx: &Context, key: &str) -> Result<()>;

    async fn delete_by_query(
        &self,
        ctx: &Context,
        key: &str,
        keyword: Option<&Keyword>,
    ) -> Result<DeleteByQueryReport>;

    async fn list<T>(
        &self,
        ctx: &Context,
        key: &str,
        sp: &mut SelectionPredicate,
    ) -> Result<Vec<ListItem<T>>>
    where
        T: DeserializeOwned + Versioned + Send + 'static;
}
