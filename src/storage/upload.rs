//! Relay of user files into S3-compatible buckets.
//!
//! One `ObjectStore` is built per bucket on first use and cached.

use std::sync::Arc;

use bytes::Bytes;
use dashmap::DashMap;
use object_store::aws::AmazonS3Builder;
use object_store::memory::InMemory;
use object_store::path::Path;
use object_store::{Attribute, Attributes, ClientOptions, ObjectStore, PutOptions};
use serde::Serialize;

use crate::config::StorageConfig;
use crate::errors::AppError;

pub const ALLOWED_EXTENSIONS: [&str; 5] = [".json", ".csv", ".parquet", ".avro", ".orc"];
pub const MAX_FILES_PER_REQUEST: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedFile {
    pub file_name: String,
    pub bucket: String,
    pub key: String,
    pub size: usize,
    pub content_type: String,
    pub s3_path: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedUpload {
    pub file_name: String,
    pub error: String,
}

/// Per-file outcome of a multi-file upload.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadReport {
    pub uploaded: Vec<UploadedFile>,
    pub failed: Vec<FailedUpload>,
    pub total: usize,
    pub successful: usize,
}

impl UploadReport {
    pub fn all_succeeded(&self) -> bool {
        self.failed.is_empty()
    }
}

/// A file received from a multipart request.
#[derive(Debug, Clone)]
pub struct IncomingFile {
    pub file_name: String,
    pub content_type: String,
    pub data: Bytes,
}

enum Backend {
    S3(StorageConfig),
    Memory,
}

pub struct UploadStore {
    backend: Backend,
    max_bytes: usize,
    stores: DashMap<String, Arc<dyn ObjectStore>>,
}

impl UploadStore {
    pub fn s3(cfg: StorageConfig) -> Self {
        Self {
            max_bytes: cfg.max_upload_bytes,
            backend: Backend::S3(cfg),
            stores: DashMap::new(),
        }
    }

    /// Buckets backed by process memory. Used for local runs without object storage.
    pub fn in_memory(max_bytes: usize) -> Self {
        Self {
            backend: Backend::Memory,
            max_bytes,
            stores: DashMap::new(),
        }
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    fn store_for(&self, bucket: &str) -> Result<Arc<dyn ObjectStore>, AppError> {
        if let Some(store) = self.stores.get(bucket) {
            return Ok(store.clone());
        }

        let store: Arc<dyn ObjectStore> = match &self.backend {
            Backend::Memory => Arc::new(InMemory::new()),
            Backend::S3(cfg) => {
                let client_options =
                    ClientOptions::new().with_allow_invalid_certificates(!cfg.verify_tls);
                let s3 = AmazonS3Builder::new()
                    .with_bucket_name(bucket)
                    .with_region(&cfg.region)
                    .with_endpoint(&cfg.endpoint)
                    .with_virtual_hosted_style_request(false)
                    .with_allow_http(cfg.endpoint.starts_with("http://"))
                    .with_access_key_id(&cfg.access_key_id)
                    .with_secret_access_key(&cfg.secret_access_key)
                    .with_client_options(client_options)
                    .build()?;
                Arc::new(s3)
            }
        };

        tracing::debug!(bucket, "object store created for bucket");
        Ok(self
            .stores
            .entry(bucket.to_string())
            .or_insert(store)
            .clone())
    }

    pub async fn upload(
        &self,
        bucket: &str,
        prefix: Option<&str>,
        file: IncomingFile,
    ) -> Result<UploadedFile, AppError> {
        let bucket = bucket.trim();
        check_bucket_name(bucket)?;
        check_extension(&file.file_name)?;
        if file.data.len() > self.max_bytes {
            return Err(AppError::Validation(format!(
                "File {} exceeds the {} byte upload limit",
                file.file_name, self.max_bytes
            )));
        }

        let key = object_key(prefix, &file.file_name);
        let size = file.data.len();
        tracing::info!(file = %file.file_name, bucket, key = %key, size, "uploading file");

        let mut attributes = Attributes::new();
        attributes.insert(Attribute::ContentType, file.content_type.clone().into());
        let opts = PutOptions {
            attributes,
            ..PutOptions::default()
        };

        self.store_for(bucket)?
            .put_opts(&Path::from(key.as_str()), file.data.into(), opts)
            .await?;

        tracing::info!(bucket, key = %key, "file uploaded");
        Ok(UploadedFile {
            s3_path: format!("s3://{}/{}", bucket, key),
            file_name: file.file_name,
            bucket: bucket.to_string(),
            key,
            size,
            content_type: file.content_type,
        })
    }

    /// Upload each file independently; one failure does not stop the rest.
    pub async fn upload_many(
        &self,
        bucket: &str,
        prefix: Option<&str>,
        files: Vec<IncomingFile>,
    ) -> Result<UploadReport, AppError> {
        if files.is_empty() {
            return Err(AppError::Validation("No files provided".into()));
        }
        if files.len() > MAX_FILES_PER_REQUEST {
            return Err(AppError::Validation(format!(
                "At most {} files can be uploaded at once",
                MAX_FILES_PER_REQUEST
            )));
        }
        check_bucket_name(bucket.trim())?;

        let total = files.len();
        let mut uploaded = Vec::with_capacity(total);
        let mut failed = Vec::new();
        for file in files {
            let file_name = file.file_name.clone();
            match self.upload(bucket, prefix, file).await {
                Ok(done) => uploaded.push(done),
                Err(e) => {
                    tracing::error!(file = %file_name, error = %e, "failed to upload file");
                    failed.push(FailedUpload {
                        file_name,
                        error: e.to_string(),
                    });
                }
            }
        }

        Ok(UploadReport {
            successful: uploaded.len(),
            uploaded,
            failed,
            total,
        })
    }

    #[cfg(test)]
    async fn read(&self, bucket: &str, key: &str) -> Bytes {
        self.store_for(bucket)
            .unwrap()
            .get(&Path::from(key))
            .await
            .unwrap()
            .bytes()
            .await
            .unwrap()
    }
}

/// S3 bucket naming: 3-63 chars of `[a-z0-9.-]`, starting and ending with a
/// letter or digit. Checked before a store is built and cached for the name.
pub fn check_bucket_name(bucket: &str) -> Result<(), AppError> {
    if bucket.is_empty() {
        return Err(AppError::Validation("Bucket name is required".into()));
    }
    let bytes = bucket.as_bytes();
    let edge_ok = |b: u8| b.is_ascii_lowercase() || b.is_ascii_digit();
    let valid = (3..=63).contains(&bytes.len())
        && bytes
            .iter()
            .all(|&b| edge_ok(b) || b == b'.' || b == b'-')
        && edge_ok(bytes[0])
        && edge_ok(bytes[bytes.len() - 1]);
    if valid {
        Ok(())
    } else {
        Err(AppError::Validation(format!("Invalid bucket name: {}", bucket)))
    }
}

pub fn check_extension(file_name: &str) -> Result<(), AppError> {
    let lower = file_name.to_ascii_lowercase();
    let allowed = lower
        .rfind('.')
        .map(|i| ALLOWED_EXTENSIONS.contains(&&lower[i..]))
        .unwrap_or(false);
    if allowed {
        Ok(())
    } else {
        Err(AppError::Validation(format!(
            "File type not allowed. Allowed types: {}",
            ALLOWED_EXTENSIONS.join(", ")
        )))
    }
}

/// `prefix/file_name`, or just `file_name` when no prefix is given.
pub fn object_key(prefix: Option<&str>, file_name: &str) -> String {
    match prefix.map(|p| p.trim_matches('/')).filter(|p| !p.is_empty()) {
        Some(p) => format!("{}/{}", p, file_name),
        None => file_name.to_string(),
    }
}
