//! Object-storage adapter.
//!
//! Every key is an independent object at the key path without its leading
//! `/`, holding the JSON encoding of the stored value. The store has no
//! versions and no query engine: updates overwrite, `delete_by_query` is a
//! no-op and listing walks a key prefix.

#[cfg(feature = "s3")]
pub mod s3;

use crate::core::context::Context;
use crate::core::fetch::{fetch_bounded, fetch_semaphore};
use crate::core::query::Keyword;
use crate::core::version::Versioned;
use crate::domain::key::{self, object_path};
use crate::domain::model::{
    BulkReport, ChannelObj, DeleteByQueryReport, ListItem, SelectionPredicate,
};
use crate::domain::ports::Storage;
use crate::utils::error::{Result, StorageError};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};

/// One page of a prefix listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectListing {
    pub keys: Vec<String>,
    /// Set when more keys remain after this page.
    pub next_token: Option<String>,
}

/// Raw object operations of a bucket-based store.
#[async_trait]
pub trait ObjectBackend: Send + Sync + 'static {
    /// Fails `KeyNotFound` when no object exists at `path`.
    async fn get_object(&self, path: &str) -> Result<Vec<u8>>;

    async fn put_object(&self, path: &str, body: Vec<u8>) -> Result<()>;

    /// Fails `KeyNotFound` when no object exists at `path`.
    async fn delete_object(&self, path: &str) -> Result<()>;

    async fn list_objects(
        &self,
        prefix: &str,
        max_keys: Option<usize>,
        continuation: Option<&str>,
    ) -> Result<ObjectListing>;
}

pub struct ObjectStore<B> {
    backend: Arc<B>,
    fetch_limit: Arc<Semaphore>,
}

impl<B> Clone for ObjectStore<B> {
    fn clone(&self) -> Self {
        Self {
            backend: self.backend.clone(),
            fetch_limit: self.fetch_limit.clone(),
        }
    }
}

fn rekey(err: StorageError, key: &str) -> StorageError {
    match err {
        StorageError::KeyNotFound {
            resource_version, ..
        } => StorageError::not_found(key, resource_version),
        other => other,
    }
}

impl<B: ObjectBackend> ObjectStore<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend: Arc::new(backend),
            fetch_limit: fetch_semaphore(),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Stores an already-serialized body as-is.
    pub async fn create_raw(&self, ctx: &Context, key: &str, body: Vec<u8>) -> Result<()> {
        key::parse(key)?;
        let path = object_path(key);
        tracing::debug!("putting object {} ({} bytes)", path, body.len());
        ctx.run(self.backend.put_object(path, body)).await
    }

    async fn put_json<T: Serialize>(&self, ctx: &Context, key: &str, obj: &T) -> Result<()> {
        let body =
            serde_json::to_vec(obj).map_err(|e| StorageError::invalid_object(key, e.to_string()))?;
        self.create_raw(ctx, key, body).await
    }

    async fn hydrate<T>(&self, ctx: &Context, paths: Vec<String>) -> Result<Vec<ListItem<T>>>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let outcome = fetch_bounded(ctx, self.fetch_limit.clone(), paths, |path| {
            let backend = self.backend.clone();
            let ctx = ctx.clone();
            async move {
                let body = ctx.run(backend.get_object(&path)).await?;
                serde_json::from_slice::<T>(&body)
                    .map_err(|e| StorageError::invalid_object(path, e.to_string()))
            }
        })
        .await;

        if outcome.failed_count() > 0 {
            tracing::warn!("{} objects could not be fetched", outcome.failed_count());
        }
        outcome.into_result()
    }
}

#[async_trait]
impl<B: ObjectBackend> Storage for ObjectStore<B> {
    async fn get<T>(&self, ctx: &Context, key: &str) -> Result<T>
    where
        T: DeserializeOwned + Versioned + Send,
    {
        key::parse(key)?;
        let body = ctx
            .run(self.backend.get_object(object_path(key)))
            .await
            .map_err(|e| rekey(e, key))?;

        serde_json::from_slice(&body).map_err(|e| StorageError::invalid_object(key, e.to_string()))
    }

    async fn create<T>(
        &self,
        ctx: &Context,
        key: &str,
        obj: &T,
        _ttl: Option<Duration>,
    ) -> Result<()>
    where
        T: Serialize + Sync,
    {
        self.put_json(ctx, key, obj).await
    }

    async fn bulk_create<T>(
        &self,
        ctx: &Context,
        key: &str,
        mut items: mpsc::Receiver<ChannelObj<T>>,
        _ttl: Option<Duration>,
    ) -> Result<BulkReport>
    where
        T: Serialize + Send + 'static,
    {
        let scope = key::parse_scope(key)?;
        if scope.subcollection.is_none() {
            return Err(StorageError::bad_request(
                "the key must match \"/collection/subcollection\" pattern",
            ));
        }
        let base = key.trim_end_matches('/');
        let mut report = BulkReport::default();

        loop {
            let item = tokio::select! {
                biased;
                err = ctx.done() => return Err(err),
                item = items.recv() => match item {
                    Some(item) => item,
                    None => break,
                },
            };

            let item_key = format!("{}/{}", base, item.id);
            let body = match serde_json::to_vec(&item.data) {
                Ok(body) => body,
                Err(e) => {
                    report.failed += 1;
                    tracing::warn!("skipping bulk item {}: {}", item_key, e);
                    continue;
                }
            };
            match self.create_raw(ctx, &item_key, body).await {
                Ok(()) => report.written += 1,
                Err(e) => {
                    report.failed += 1;
                    tracing::warn!("bulk write of {} failed: {}", item_key, e);
                }
            }
        }

        Ok(report)
    }

    async fn update<T>(
        &self,
        ctx: &Context,
        key: &str,
        _resource_version: i64,
        obj: &T,
        _ttl: Option<Duration>,
    ) -> Result<()>
    where
        T: Serialize + Sync,
    {
        self.put_json(ctx, key, obj).await
    }

    async fn upsert<U, I>(
        &self,
        ctx: &Context,
        key: &str,
        _resource_version: i64,
        update_obj: &U,
        _insert_obj: Option<&I>,
        _ttl: Option<Duration>,
    ) -> Result<()>
    where
        U: Serialize + Sync,
        I: Serialize + Sync,
    {
        self.put_json(ctx, key, update_obj).await
    }

    async fn delete(&self, ctx: &Context, key: &str) -> Result<()> {
        key::parse(key)?;
        ctx.run(self.backend.delete_object(object_path(key)))
            .await
            .map_err(|e| rekey(e, key))
    }

    async fn delete_by_query(
        &self,
        _ctx: &Context,
        _key: &str,
        _keyword: Option<&Keyword>,
    ) -> Result<DeleteByQueryReport> {
        Ok(DeleteByQueryReport::default())
    }

    async fn list<T>(
        &self,
        ctx: &Context,
        key: &str,
        sp: &mut SelectionPredicate,
    ) -> Result<Vec<ListItem<T>>>
    where
        T: DeserializeOwned + Versioned + Send + 'static,
    {
        key::parse_scope(key)?;
        if sp.eof {
            sp.scroll_id = None;
            return Ok(Vec::new());
        }

        let prefix = object_path(key);
        let max_keys = (sp.limit > 0).then_some(sp.limit);
        let listing = ctx
            .run(
                self.backend
                    .list_objects(prefix, max_keys, sp.scroll_id.as_deref()),
            )
            .await?;

        // 前綴本身的物件不列入結果
        let paths: Vec<String> = listing
            .keys
            .into_iter()
            .filter(|path| path != prefix)
            .collect();

        let items = if sp.key_only {
            paths.into_iter().map(ListItem::Key).collect()
        } else {
            self.hydrate(ctx, paths).await?
        };

        // 取回成功後才推進游標
        sp.eof = listing.next_token.is_none();
        sp.scroll_id = listing.next_token;
        Ok(items)
    }
}
