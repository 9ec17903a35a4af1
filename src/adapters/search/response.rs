use crate::core::context::Context;
use crate::core::version::Versioned;
use crate::domain::model::ListItem;
use crate::utils::error::{Result, StorageError};
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Deserialize)]
pub(crate) struct GetResponse {
    #[serde(default)]
    pub found: bool,
    #[serde(rename = "_version")]
    pub version: Option<i64>,
    #[serde(rename = "_source")]
    pub source: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct SearchResponse {
    #[serde(rename = "_scroll_id")]
    pub scroll_id: Option<String>,
    #[serde(default)]
    pub hits: Hits,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct Hits {
    #[serde(default)]
    pub hits: Vec<Hit>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Hit {
    #[serde(rename = "_id", default)]
    pub id: String,
    #[serde(rename = "_version")]
    pub version: Option<i64>,
    #[serde(rename = "_source")]
    pub source: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct BulkResponse {
    #[serde(default)]
    pub errors: bool,
    #[serde(default)]
    pub items: Vec<Value>,
}

impl BulkResponse {
    /// Number of items the backend rejected.
    pub fn failed_items(&self) -> usize {
        if !self.errors {
            return 0;
        }
        self.items
            .iter()
            .filter_map(|item| item.as_object().and_then(|op| op.values().next()))
            .filter(|result| result.get("error").is_some())
            .count()
    }
}

/// Decodes a `_source` document into `T` and stamps its version.
pub(crate) fn decode_source<T>(key: &str, source: Option<Value>, version: Option<i64>) -> Result<T>
where
    T: DeserializeOwned + Versioned,
{
    let source = source.unwrap_or(Value::Null);
    let mut obj: T = serde_json::from_value(source)
        .map_err(|e| StorageError::invalid_object(key, e.to_string()))?;
    if let Some(version) = version {
        obj.set_resource_version(version);
    }
    Ok(obj)
}

pub(crate) fn decode_hits<T>(scope: &str, hits: Vec<Hit>) -> Result<Vec<ListItem<T>>>
where
    T: DeserializeOwned + Versioned,
{
    hits.into_iter()
        .map(|hit| {
            let key = format!("{}/{}", scope, hit.id);
            decode_source(&key, hit.source, hit.version).map(ListItem::Object)
        })
        .collect()
}

fn error_type(body: &Value) -> Option<&str> {
    let error = body.get("error")?;
    error
        .get("type")
        .or_else(|| error.pointer("/root_cause/0/type"))
        .and_then(Value::as_str)
}

/// Classifies a backend failure by status code and error type.
pub(crate) fn classify(status: StatusCode, body: &str, key: &str, version: i64) -> StorageError {
    let parsed: Value = serde_json::from_str(body).unwrap_or(Value::Null);
    let kind = error_type(&parsed).unwrap_or_default();

    match status {
        StatusCode::NOT_FOUND => StorageError::not_found(key, version),
        StatusCode::CONFLICT if kind == "document_already_exists_exception" => {
            StorageError::key_exists(key, version)
        }
        StatusCode::CONFLICT => StorageError::conflict(key, version),
        _ => StorageError::internal(format!("{} {}: {}", status.as_u16(), kind, body)),
    }
}

/// Passes successful responses through; everything else becomes a
/// classified [`StorageError`].
pub(crate) async fn check(
    ctx: &Context,
    resp: Response,
    key: &str,
    version: i64,
) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let body = ctx
        .run(async { Ok(resp.text().await.unwrap_or_default()) })
        .await?;
    tracing::debug!("search backend returned {} for {}: {}", status, key, body);
    Err(classify(status, &body, key, version))
}

pub(crate) async fn read_json<T: DeserializeOwned>(resp: Response, key: &str) -> Result<T> {
    let bytes = resp.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| {
        StorageError::internal(format!("unexpected search response for {}: {}", key, e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_classify_statuses() {
        let missing = r#"{"_index":"myindex","_type":"mytype","_id":"x","found":false}"#;
        assert!(classify(StatusCode::NOT_FOUND, missing, "/myindex/mytype/x", 0).is_not_found());

        let conflict = json!({"error": {"type": "version_conflict_engine_exception"}, "status": 409});
        let err = classify(StatusCode::CONFLICT, &conflict.to_string(), "/a/b/c", 4);
        assert!(err.is_conflict());
        assert_eq!(err.resource_version(), Some(4));

        let exists = json!({"error": {"root_cause": [{"type": "document_already_exists_exception"}]}});
        assert!(classify(StatusCode::CONFLICT, &exists.to_string(), "/a/b/c", 0).is_key_exists());

        let err = classify(StatusCode::BAD_REQUEST, "{}", "/a/b/c", 0);
        assert!(err.is_internal());
    }

    #[test]
    fn test_bulk_failed_items() {
        let resp: BulkResponse = serde_json::from_value(json!({
            "errors": true,
            "items": [
                {"index": {"_id": "1", "status": 201}},
                {"index": {"_id": "2", "status": 400, "error": {"type": "mapper_parsing_exception"}}}
            ]
        }))
        .unwrap();
        assert_eq!(resp.failed_items(), 1);
    }

    #[test]
    fn test_decode_hits_stamps_versions() {
        let hits = vec![Hit {
            id: "myid".to_string(),
            version: Some(3),
            source: Some(json!({"code": "myid"})),
        }];
        let items: Vec<ListItem<Value>> = decode_hits("/myindex", hits).unwrap();
        let obj = items[0].object().unwrap();
        assert_eq!(obj["code"], "myid");
        assert_eq!(obj["_version"], 3);
    }

    fn response(status: u16, body: &'static str) -> Response {
        Response::from(
            http::Response::builder()
                .status(status)
                .body(body)
                .unwrap(),
        )
    }

    #[tokio::test]
    async fn test_check_classifies_error_body() {
        let err = check(&Context::new(), response(404, r#"{"found":false}"#), "/a/b/c", 0)
            .await
            .unwrap_err();
        assert!(err.is_not_found());

        assert!(check(&Context::new(), response(200, "{}"), "/a/b/c", 0).await.is_ok());
    }

    #[tokio::test]
    async fn test_check_observes_cancellation_on_error_body() {
        let ctx = Context::new();
        ctx.cancel();
        let err = check(&ctx, response(500, "boom"), "/a/b/c", 0)
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
    }
}
