//! S3 implementation of [`ObjectStore`] over aws-sdk-s3.
//!
//! Parts carry an MD5 content checksum. Flush failures are not retried
//! here; a failed part is fatal to its single upload only.

use crate::error::{GatewayError, Result};
use crate::store::{CompletedPart, ObjectStore};
use async_trait::async_trait;
use aws_sdk_s3::Client;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as B64;

pub struct S3Store {
    client: Client,
}

impl S3Store {
    /// Build a client from environment credentials, optionally pointed at
    /// a custom endpoint (MinIO and friends).
    pub async fn from_env(region: &str, endpoint: Option<&str>) -> Self {
        let mut loader = aws_config::ConfigLoader::default()
            .credentials_provider(
                aws_config::environment::EnvironmentVariableCredentialsProvider::new(),
            )
            .region(aws_config::Region::new(region.to_string()));
        if let Some(url) = endpoint {
            loader = loader.endpoint_url(url);
        }
        let conf = loader.load().await;
        Self {
            client: Client::new(&conf),
        }
    }

    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn md5_base64(data: &[u8]) -> String {
        let sum = md5::compute(data);
        B64.encode(sum.0)
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn create_multipart_upload(&self, bucket: &str, key: &str) -> Result<String> {
        let created = self
            .client
            .create_multipart_upload()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| GatewayError::Storage(format!("create_multipart_upload: {e}")))?;
        created
            .upload_id()
            .map(|id| id.to_string())
            .ok_or_else(|| GatewayError::Storage("create_multipart_upload: no upload id".into()))
    }

    async fn upload_part(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        part_number: i32,
        body: Vec<u8>,
    ) -> Result<String> {
        let checksum = Self::md5_base64(&body);
        let resp = self
            .client
            .upload_part()
            .bucket(bucket)
            .key(key)
            .upload_id(upload_id)
            .part_number(part_number)
            .content_md5(checksum)
            .body(body.into())
            .send()
            .await
            .map_err(|e| GatewayError::Storage(format!("upload_part {part_number}: {e}")))?;
        resp.e_tag()
            .map(|t| t.to_string())
            .ok_or_else(|| GatewayError::Storage(format!("upload_part {part_number}: no etag")))
    }

    async fn complete_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        parts: &[CompletedPart],
    ) -> Result<String> {
        let completed_parts = parts
            .iter()
            .map(|p| {
                aws_sdk_s3::types::CompletedPart::builder()
                    .part_number(p.part_number)
                    .e_tag(&p.e_tag)
                    .build()
            })
            .collect::<Vec<_>>();
        let completed = aws_sdk_s3::types::CompletedMultipartUpload::builder()
            .set_parts(Some(completed_parts))
            .build();
        let resp = self
            .client
            .complete_multipart_upload()
            .bucket(bucket)
            .key(key)
            .upload_id(upload_id)
            .multipart_upload(completed)
            .send()
            .await
            .map_err(|e| GatewayError::Storage(format!("complete_multipart_upload: {e}")))?;
        Ok(resp.location().unwrap_or_default().to_string())
    }
}
