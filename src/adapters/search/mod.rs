//! Search-engine adapter over the Elasticsearch REST API.
//!
//! Keys map to `/{index}/{type}/{id}`. Versions come from the `_version`
//! metadata of each document; scroll ids are stored on the caller's
//! [`SelectionPredicate`].

mod bulk;
mod response;

pub use bulk::{BULK_ACTIONS, FLUSH_INTERVAL};

use crate::config::SearchConfig;
use crate::core::context::Context;
use crate::core::listing::{self, ListPlan, ScrollState};
use crate::core::query::{translate, Keyword};
use crate::core::version::Versioned;
use crate::domain::key::{self, KeyScope};
use crate::domain::model::{
    BulkReport, ChannelObj, DeleteByQueryReport, ListItem, SelectionPredicate,
};
use crate::domain::ports::Storage;
use crate::utils::error::{Result, StorageError};
use async_trait::async_trait;
use bulk::BulkBatch;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use response::{check, classify, decode_hits, decode_source, read_json};
use response::{BulkResponse, GetResponse, SearchResponse};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use url::Url;

#[derive(Serialize)]
struct UpdateBody<'a, U, I> {
    doc: &'a U,
    #[serde(skip_serializing_if = "Option::is_none")]
    upsert: Option<&'a I>,
}

fn encode<T: Serialize>(key: &str, obj: &T) -> Result<Vec<u8>> {
    serde_json::to_vec(obj).map_err(|e| StorageError::invalid_object(key, e.to_string()))
}

fn version_param(resource_version: i64) -> Vec<(&'static str, String)> {
    if resource_version != 0 {
        vec![("version", resource_version.to_string())]
    } else {
        Vec::new()
    }
}

pub struct SearchStore {
    client: Client,
    urls: Vec<Url>,
    next_url: AtomicUsize,
}

impl SearchStore {
    pub fn new(config: &SearchConfig) -> Result<Self> {
        let client = config.client.build_client()?;
        Self::with_client(client, &config.urls)
    }

    /// Uses an existing client (and its connection pool) for all requests.
    pub fn with_client<S: AsRef<str>>(client: Client, urls: &[S]) -> Result<Self> {
        let urls = urls
            .iter()
            .map(|u| {
                Url::parse(u.as_ref()).map_err(|e| {
                    StorageError::bad_request(format!("invalid search url {}: {}", u.as_ref(), e))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        if urls.is_empty() {
            return Err(StorageError::bad_request("at least one search url is required"));
        }

        Ok(Self {
            client,
            urls,
            next_url: AtomicUsize::new(0),
        })
    }

    /// Builds a node URL from path segments, round-robin across nodes.
    fn url(&self, segments: &[&str]) -> Result<Url> {
        let n = self.next_url.fetch_add(1, Ordering::Relaxed) % self.urls.len();
        let mut url = self.urls[n].clone();
        url.path_segments_mut()
            .map_err(|_| {
                StorageError::internal(format!("search url {} cannot be a base", self.urls[n]))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, segments: &[&str]) -> Result<RequestBuilder> {
        Ok(self.client.request(method, self.url(segments)?))
    }

    fn scope_segments<'a>(scope: &KeyScope<'a>, endpoint: &'a str) -> Vec<&'a str> {
        let mut segments = vec![scope.collection];
        if let Some(sub) = scope.subcollection {
            segments.push(sub);
        }
        segments.push(endpoint);
        segments
    }

    async fn send(ctx: &Context, req: RequestBuilder) -> Result<Response> {
        ctx.run(async { req.send().await.map_err(StorageError::from) })
            .await
    }

    async fn send_json(ctx: &Context, req: RequestBuilder, body: Vec<u8>) -> Result<Response> {
        Self::send(ctx, req.header(CONTENT_TYPE, "application/json").body(body)).await
    }

    async fn send_bulk(&self, ctx: &Context, body: Vec<u8>) -> Result<BulkResponse> {
        let req = self
            .request(Method::POST, &["_bulk"])?
            .header(CONTENT_TYPE, "application/x-ndjson")
            .body(body);
        let resp = check(ctx, Self::send(ctx, req).await?, "/_bulk", 0).await?;
        ctx.run(read_json(resp, "/_bulk")).await
    }

    async fn write_doc(
        &self,
        ctx: &Context,
        key: &str,
        resource_version: i64,
        body: Vec<u8>,
        update: bool,
    ) -> Result<()> {
        let k = key::parse(key)?;
        let req = if update {
            self.request(Method::POST, &[k.collection, k.subcollection, k.id, "_update"])?
                .query(&version_param(resource_version))
        } else {
            self.request(Method::PUT, &[k.collection, k.subcollection, k.id])?
        };

        tracing::debug!("writing document {} (update: {})", key, update);
        let resp = Self::send_json(ctx, req, body).await?;
        check(ctx, resp, key, resource_version).await?;
        Ok(())
    }

    async fn search(
        &self,
        ctx: &Context,
        key: &str,
        scope: &KeyScope<'_>,
        params: &[(&str, &str)],
        body: Value,
    ) -> Result<SearchResponse> {
        let req = self
            .request(Method::POST, &Self::scope_segments(scope, "_search"))?
            .query(&[("version", "true")])
            .query(params);
        let resp = Self::send_json(ctx, req, encode(key, &body)?).await?;
        let resp = check(ctx, resp, key, 0).await?;
        ctx.run(read_json(resp, key)).await
    }

    async fn list_by_search(
        &self,
        ctx: &Context,
        key: &str,
        scope: &KeyScope<'_>,
        from: Option<usize>,
        size: Option<usize>,
        query: Option<Value>,
    ) -> Result<SearchResponse> {
        let mut body = Map::new();
        if let Some(from) = from {
            body.insert("from".to_string(), from.into());
        }
        if let Some(size) = size {
            body.insert("size".to_string(), size.into());
        }
        if let Some(query) = query {
            body.insert("query".to_string(), query);
        }

        tracing::debug!("search {} from {:?} size {:?}", key, from, size);
        self.search(ctx, key, scope, &[], Value::Object(body)).await
    }

    async fn list_by_scroll(
        &self,
        ctx: &Context,
        key: &str,
        scope: &KeyScope<'_>,
        state: ScrollState,
        sp: &mut SelectionPredicate,
    ) -> Result<SearchResponse> {
        let resp = match state {
            ScrollState::Exhausted => {
                listing::mark_exhausted(sp);
                return Ok(SearchResponse::default());
            }
            ScrollState::Fresh {
                keep_alive,
                size,
                query,
            } => {
                let mut body = Map::new();
                if let Some(size) = size {
                    body.insert("size".to_string(), size.into());
                }
                if let Some(query) = query {
                    body.insert("query".to_string(), query);
                }
                if !ctx.excludes().is_empty() {
                    body.insert(
                        "_source".to_string(),
                        json!({ "excludes": ctx.excludes() }),
                    );
                }

                tracing::debug!("opening scroll on {} (keep alive {})", key, keep_alive);
                let params = [("scroll", keep_alive.as_str())];
                self.search(ctx, key, scope, &params, Value::Object(body))
                    .await?
            }
            ScrollState::Active {
                scroll_id,
                keep_alive,
            } => {
                let body = json!({ "scroll": keep_alive, "scroll_id": scroll_id });
                let req = self.request(Method::POST, &["_search", "scroll"])?;
                let resp = Self::send_json(ctx, req, encode(key, &body)?).await?;
                let resp = check(ctx, resp, key, 0).await?;
                ctx.run(read_json(resp, key)).await?
            }
        };

        listing::advance(sp, resp.scroll_id.clone(), resp.hits.hits.len());
        Ok(resp)
    }

    async fn flush(&self, ctx: &Context, batch: &mut BulkBatch, report: &mut BulkReport) {
        let (body, len) = batch.take();
        if len == 0 {
            return;
        }

        match self.send_bulk(ctx, body).await {
            Ok(resp) => {
                let failed = resp.failed_items().min(len);
                report.written += (len - failed) as u64;
                report.failed += failed as u64;
                if failed > 0 {
                    tracing::warn!("bulk flush: {} of {} items rejected", failed, len);
                } else {
                    tracing::debug!("bulk flush: {} items written", len);
                }
            }
            Err(e) => {
                report.failed += len as u64;
                tracing::warn!("bulk flush of {} items failed: {}", len, e);
            }
        }
    }
}

#[async_trait]
impl Storage for SearchStore {
    async fn get<T>(&self, ctx: &Context, key: &str) -> Result<T>
    where
        T: DeserializeOwned + Versioned + Send,
    {
        let k = key::parse(key)?;
        let req = self.request(Method::GET, &[k.collection, k.subcollection, k.id])?;

        let resp = Self::send(ctx, req).await?;
        let resp = check(ctx, resp, key, 0).await?;
        let doc: GetResponse = ctx.run(read_json(resp, key)).await?;
        if !doc.found {
            return Err(StorageError::not_found(key, 0));
        }

        decode_source(key, doc.source, doc.version)
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
        let body = encode(key, obj)?;
        self.write_doc(ctx, key, 0, body, false).await
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
        let doc_type = scope.subcollection.ok_or_else(|| {
            StorageError::bad_request("the key must match \"/index/type\" pattern")
        })?;

        let mut batch = BulkBatch::new(scope.collection, doc_type);
        let mut report = BulkReport::default();
        let mut ticker = tokio::time::interval(FLUSH_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        loop {
            tokio::select! {
                item = items.recv() => match item {
                    Some(item) => {
                        if let Err(e) = batch.push(&item.id, &item.data) {
                            report.failed += 1;
                            tracing::warn!("skipping bulk item {}: {}", item.id, e);
                        } else if batch.is_full() {
                            self.flush(ctx, &mut batch, &mut report).await;
                        }
                    }
                    None => break,
                },
                _ = ticker.tick() => {
                    if !batch.is_empty() {
                        self.flush(ctx, &mut batch, &mut report).await;
                    }
                }
                err = ctx.done() => {
                    tracing::warn!("bulk create on {} interrupted after {} writes", key, report.written);
                    return Err(err);
                }
            }
        }

        self.flush(ctx, &mut batch, &mut report).await;
        Ok(report)
    }

    async fn update<T>(
        &self,
        ctx: &Context,
        key: &str,
        resource_version: i64,
        obj: &T,
        _ttl: Option<Duration>,
    ) -> Result<()>
    where
        T: Serialize + Sync,
    {
        let body = encode(
            key,
            &UpdateBody::<T, T> {
                doc: obj,
                upsert: None,
            },
        )?;
        self.write_doc(ctx, key, resource_version, body, true).await
    }

    async fn upsert<U, I>(
        &self,
        ctx: &Context,
        key: &str,
        resource_version: i64,
        update_obj: &U,
        insert_obj: Option<&I>,
        _ttl: Option<Duration>,
    ) -> Result<()>
    where
        U: Serialize + Sync,
        I: Serialize + Sync,
    {
        let body = match insert_obj {
            Some(insert) => encode(
                key,
                &UpdateBody {
                    doc: update_obj,
                    upsert: Some(insert),
                },
            )?,
            None => encode(
                key,
                &UpdateBody {
                    doc: update_obj,
                    upsert: Some(update_obj),
                },
            )?,
        };
        self.write_doc(ctx, key, resource_version, body, true).await
    }

    async fn delete(&self, ctx: &Context, key: &str) -> Result<()> {
        let k = key::parse(key)?;
        let req = self.request(Method::DELETE, &[k.collection, k.subcollection, k.id])?;

        let resp = Self::send(ctx, req).await?;
        check(ctx, resp, key, 0).await?;
        Ok(())
    }

    async fn delete_by_query(
        &self,
        ctx: &Context,
        key: &str,
        keyword: Option<&Keyword>,
    ) -> Result<DeleteByQueryReport> {
        let scope = key::parse_scope(key)?;
        let query = keyword
            .and_then(translate)
            .unwrap_or_else(|| json!({ "match_all": {} }));

        let req = self
            .request(Method::POST, &Self::scope_segments(&scope, "_delete_by_query"))?
            .query(&[("conflicts", "proceed")]);
        let resp = Self::send_json(ctx, req, encode(key, &json!({ "query": query }))?).await?;

        let status = resp.status();
        let body = ctx
            .run(async { resp.bytes().await.map_err(StorageError::from) })
            .await?;
        if !status.is_success() && status != StatusCode::CONFLICT {
            return Err(classify(status, &String::from_utf8_lossy(&body), key, 0));
        }

        let report: DeleteByQueryReport = serde_json::from_slice(&body).map_err(|e| {
            StorageError::internal(format!("unexpected delete_by_query response: {}", e))
        })?;
        tracing::debug!(
            "delete by query on {}: {} deleted, {} conflicts",
            key,
            report.deleted,
            report.version_conflicts
        );
        Ok(report)
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
        let scope = key::parse_scope(key)?;
        let resp = match listing::plan(sp)? {
            ListPlan::Search { from, size, query } => {
                self.list_by_search(ctx, key, &scope, from, size, query)
                    .await?
            }
            ListPlan::Scroll(state) => self.list_by_scroll(ctx, key, &scope, state, sp).await?,
        };

        decode_hits(key.trim_end_matches('/'), resp.hits.hits)
    }
}
