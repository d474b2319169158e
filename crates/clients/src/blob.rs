use std::env;

use aws_sdk_s3::config::{Builder as S3ConfigBuilder, Credentials, Region};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;
use uuid::Uuid;

use backpack_common::{define_module_client, ModuleClient};
use backpack_core::{BackpackError, ImageStore};

/// All badge images land under one prefix; keys are minted per upload.
const UPLOAD_FOLDER: &str = "images/uploads";

define_module_client! {
    (struct BlobClient, "blob")
    client_type: S3Client,
    env: ["BLOB_ENDPOINT_URL", "BLOB_ACCESS_KEY_ID", "BLOB_SECRET_ACCESS_KEY", "BLOB_BUCKET_NAME"],
    setup: async {
        let endpoint_url = env::var("BLOB_ENDPOINT_URL").expect("BLOB_ENDPOINT_URL is not set");
        let access_key_id = env::var("BLOB_ACCESS_KEY_ID").expect("BLOB_ACCESS_KEY_ID is not set");
        let secret_access_key = env::var("BLOB_SECRET_ACCESS_KEY").expect("BLOB_SECRET_ACCESS_KEY is not set");

        let credentials = Credentials::new(
            access_key_id,
            secret_access_key,
            None,
            None,
            "blob-client"
        );

        let s3_config = S3ConfigBuilder::new()
            .endpoint_url(endpoint_url)
            .credentials_provider(credentials)
            .region(Region::new("auto"))
            .behavior_version_latest()
            .build();

        S3Client::from_conf(s3_config)
    }
}

impl BlobClient {
    /// Uploads raw bytes under a fresh object key and returns that key.
    pub async fn upload(&self, extension: &str, bytes: &[u8]) -> Result<String, BackpackError> {
        let bucket = env::var("BLOB_BUCKET_NAME")
            .map_err(|_| BackpackError::storage("BLOB_BUCKET_NAME is not set"))?;
        let key = format!("{}/{}.{}", UPLOAD_FOLDER, Uuid::new_v4(), extension);

        self.get_client()
            .put_object()
            .bucket(bucket)
            .key(&key)
            .content_type(format!("image/{}", extension))
            .body(ByteStream::from(bytes.to_vec()))
            .send()
            .await
            .map_err(|e| BackpackError::storage(e))?;

        tracing::debug!("[BlobClient::upload] stored {} bytes at {}", bytes.len(), key);
        Ok(key)
    }
}

#[async_trait::async_trait]
impl ImageStore for BlobClient {
    async fn store(&self, bytes: &[u8], extension: &str) -> Result<String, BackpackError> {
        self.upload(extension, bytes).await
    }
}
