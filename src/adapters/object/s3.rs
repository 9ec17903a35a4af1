//! S3-compatible backend (AWS S3, Tencent COS, MinIO) on `aws-sdk-s3`.

use super::{ObjectBackend, ObjectListing};
use crate::config::ObjectStoreConfig;
use crate::utils::error::{Result, StorageError};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::error::{DisplayErrorContext, SdkError};
use aws_sdk_s3::operation::get_object::GetObjectError;
use aws_sdk_s3::operation::head_object::HeadObjectError;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::ObjectCannedAcl;
use aws_sdk_s3::Client as S3Client;

#[derive(Debug, Clone)]
pub struct S3Backend {
    client: S3Client,
    bucket: String,
}

impl S3Backend {
    pub fn new(client: S3Client, bucket: String) -> Self {
        Self { client, bucket }
    }

    /// 依設定建立 S3 client (區域、端點、靜態憑證)
    pub async fn from_config(config: &ObjectStoreConfig) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region().to_string()));

        if let (Some(id), Some(secret)) = (&config.access_key_id, &config.secret_access_key) {
            loader = loader.credentials_provider(Credentials::new(
                id.clone(),
                secret.clone(),
                None,
                None,
                "docstore",
            ));
        }
        if let Some(endpoint) = config.endpoint() {
            loader = loader.endpoint_url(endpoint);
        }

        let sdk_config = loader.load().await;
        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(config.force_path_style())
            .build();

        Self::new(S3Client::from_conf(s3_config), config.bucket_name())
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

fn sdk_error<E, R>(path: &str, err: SdkError<E, R>) -> StorageError
where
    E: std::error::Error + Send + Sync + 'static,
    R: std::fmt::Debug + Send + Sync + 'static,
{
    match &err {
        SdkError::TimeoutError(_) => StorageError::Timeout {
            reason: format!("{}: {}", path, DisplayErrorContext(&err)),
        },
        SdkError::DispatchFailure(_) => StorageError::unreachable(path, 0),
        _ => StorageError::internal(format!("{}: {}", path, DisplayErrorContext(&err))),
    }
}

#[async_trait]
impl ObjectBackend for S3Backend {
    async fn get_object(&self, path: &str) -> Result<Vec<u8>> {
        let resp = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(path)
            .send()
            .await;

        match resp {
            Ok(output) => {
                let data = output.body.collect().await.map_err(|e| {
                    StorageError::internal(format!("failed to read {}: {}", path, e))
                })?;
                Ok(data.into_bytes().to_vec())
            }
            Err(err) => {
                if matches!(err.as_service_error(), Some(GetObjectError::NoSuchKey(_))) {
                    return Err(StorageError::not_found(path, 0));
                }
                Err(sdk_error(path, err))
            }
        }
    }

    async fn put_object(&self, path: &str, body: Vec<u8>) -> Result<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(path)
            .content_type("application/octet-stream")
            .acl(ObjectCannedAcl::Private)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|err| sdk_error(path, err))?;
        Ok(())
    }

    async fn delete_object(&self, path: &str) -> Result<()> {
        // S3 的刪除是冪等的，先確認物件存在
        let head = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(path)
            .send()
            .await;
        if let Err(err) = head {
            if matches!(err.as_service_error(), Some(HeadObjectError::NotFound(_))) {
                return Err(StorageError::not_found(path, 0));
            }
            return Err(sdk_error(path, err));
        }

        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(path)
            .send()
            .await
            .map_err(|err| sdk_error(path, err))?;
        Ok(())
    }

    async fn list_objects(
        &self,
        prefix: &str,
        max_keys: Option<usize>,
        continuation: Option<&str>,
    ) -> Result<ObjectListing> {
        let output = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(prefix)
            .set_max_keys(max_keys.map(|n| i32::try_from(n).unwrap_or(i32::MAX)))
            .set_continuation_token(continuation.map(str::to_string))
            .send()
            .await
            .map_err(|err| sdk_error(prefix, err))?;

        let keys = output
            .contents()
            .iter()
            .filter_map(|obj| obj.key().map(str::to_string))
            .collect();
        let next_token = if output.is_truncated().unwrap_or(false) {
            output.next_continuation_token().map(str::to_string)
        } else {
            None
        };

        Ok(ObjectListing { keys, next_token })
    }
}
