//! `BinaryStore`: streaming download/upload over an S3-compatible bucket.

use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tracing::{debug, instrument, warn};

use crate::errors::StorageError;

const DEFAULT_MULTIPART_PART_SIZE: usize = 100 * 1024 * 1024;

/// Options governing an `upload` call.
#[derive(Debug, Clone)]
pub struct UploadOptions {
    pub acl: String,
    pub content_type: Option<String>,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            acl: "public-read".to_string(),
            content_type: None,
        }
    }
}

/// S3-compatible object store client. No caching — every call round-trips.
pub struct BinaryStore {
    client: Client,
    bucket: String,
}

impl BinaryStore {
    pub fn new(client: Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }

    /// Build a client from the environment (`AWS_*`/`STORAGE_*` variables,
    /// via `aws-config`'s default credential/region chain) pointed at a
    /// custom S3-compatible endpoint.
    pub async fn from_env(bucket: impl Into<String>, endpoint_url: &str) -> Self {
        let config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        let s3_config = aws_sdk_s3::config::Builder::from(&config)
            .endpoint_url(endpoint_url)
            .force_path_style(true)
            .build();
        Self::new(Client::from_conf(s3_config), bucket)
    }

    /// Stream bytes from `key` into `sink` without buffering the whole
    /// file in memory.
    #[instrument(skip(self, sink), fields(bucket = %self.bucket, key = %key))]
    pub async fn download(
        &self,
        key: &str,
        mut sink: impl AsyncWrite + Unpin,
    ) -> Result<(), StorageError> {
        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(classify_sdk_error)?;

        let mut reader = output.body.into_async_read();
        tokio::io::copy(&mut reader, &mut sink)
            .await
            .map_err(|e| StorageError::Transient(e.to_string()))?;
        sink.flush()
            .await
            .map_err(|e| StorageError::Transient(e.to_string()))?;
        Ok(())
    }

    /// Upload a byte buffer, defaulting to `acl=public-read`.
    #[instrument(skip(self, body), fields(bucket = %self.bucket, key = %key))]
    pub async fn upload(
        &self,
        key: &str,
        body: Vec<u8>,
        options: UploadOptions,
    ) -> Result<(), StorageError> {
        let mut request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .acl(options.acl.parse().unwrap_or(aws_sdk_s3::types::ObjectCannedAcl::PublicRead))
            .body(ByteStream::from(body));

        if let Some(content_type) = options.content_type {
            request = request.content_type(content_type);
        }

        request.send().await.map_err(classify_sdk_error)?;
        Ok(())
    }

    /// Multipart upload streamed from a local file, `partSize` defaulting
    /// to 100 MiB. Aborts the multipart upload on any error before
    /// surfacing the failure.
    #[instrument(skip(self, reader), fields(bucket = %self.bucket, key = %key))]
    pub async fn upload_multipart(
        &self,
        key: &str,
        mut reader: impl AsyncRead + Unpin,
        part_size: Option<usize>,
    ) -> Result<(), StorageError> {
        let part_size = part_size.unwrap_or(DEFAULT_MULTIPART_PART_SIZE);

        let create = self
            .client
            .create_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(classify_sdk_error)?;

        let upload_id = create
            .upload_id()
            .ok_or_else(|| StorageError::Fatal("missing upload id".to_string()))?
            .to_string();

        match self
            .stream_parts(key, &upload_id, &mut reader, part_size)
            .await
        {
            Ok(parts) => {
                self.client
                    .complete_multipart_upload()
                    .bucket(&self.bucket)
                    .key(key)
                    .upload_id(&upload_id)
                    .multipart_upload(
                        aws_sdk_s3::types::CompletedMultipartUpload::builder()
                            .set_parts(Some(parts))
                            .build(),
                    )
                    .send()
                    .await
                    .map_err(classify_sdk_error)?;
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, "multipart upload failed, aborting");
                let _ = self
                    .client
                    .abort_multipart_upload()
                    .bucket(&self.bucket)
                    .key(key)
                    .upload_id(&upload_id)
                    .send()
                    .await;
                Err(err)
            }
        }
    }

    async fn stream_parts(
        &self,
        key: &str,
        upload_id: &str,
        reader: &mut (impl AsyncRead + Unpin),
        part_size: usize,
    ) -> Result<Vec<aws_sdk_s3::types::CompletedPart>, StorageError> {
        use tokio::io::AsyncReadExt;

        let mut parts = Vec::new();
        let mut part_number = 1i32;
        loop {
            let mut buf = vec![0u8; part_size];
            let mut filled = 0usize;
            while filled < part_size {
                let n = reader
                    .read(&mut buf[filled..])
                    .await
                    .map_err(|e| StorageError::Transient(e.to_string()))?;
                if n == 0 {
                    break;
                }
                filled += n;
            }
            if filled == 0 {
                break;
            }
            buf.truncate(filled);

            let part = self
                .client
                .upload_part()
                .bucket(&self.bucket)
                .key(key)
                .upload_id(upload_id)
                .part_number(part_number)
                .body(ByteStream::from(buf))
                .send()
                .await
                .map_err(classify_sdk_error)?;

            parts.push(
                aws_sdk_s3::types::CompletedPart::builder()
                    .e_tag(part.e_tag().unwrap_or_default())
                    .part_number(part_number)
                    .build(),
            );
            part_number += 1;

            if filled < part_size {
                break;
            }
        }
        debug!(parts = parts.len(), "multipart upload parts streamed");
        Ok(parts)
    }

    #[instrument(skip(self), fields(bucket = %self.bucket))]
    pub async fn copy(&self, src_key: &str, dst_key: &str) -> Result<(), StorageError> {
        let source = format!("{}/{}", self.bucket, src_key);
        self.client
            .copy_object()
            .bucket(&self.bucket)
            .copy_source(source)
            .key(dst_key)
            .send()
            .await
            .map_err(classify_sdk_error)?;
        Ok(())
    }

    #[instrument(skip(self), fields(bucket = %self.bucket, key = %key))]
    pub async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(classify_sdk_error)?;
        Ok(())
    }
}

fn classify_sdk_error<E, R>(err: aws_sdk_s3::error::SdkError<E, R>) -> StorageError
where
    E: std::error::Error + aws_sdk_s3::error::ProvideErrorMetadata + 'static,
{
    use aws_sdk_s3::error::SdkError;
    match &err {
        SdkError::ServiceError(service_err) => {
            let code = service_err.err().code().unwrap_or_default();
            if code == "NoSuchKey" || code == "NotFound" {
                StorageError::NotFound(err.to_string())
            } else if code.starts_with('5') {
                StorageError::Transient(err.to_string())
            } else {
                StorageError::Fatal(err.to_string())
            }
        }
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) => {
            StorageError::Transient(err.to_string())
        }
        _ => StorageError::Fatal(err.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_options_default_to_public_read() {
        let options = UploadOptions::default();
        assert_eq!(options.acl, "public-read");
        assert!(options.content_type.is_none());
    }

    #[test]
    fn default_multipart_part_size_is_100_mib() {
        assert_eq!(DEFAULT_MULTIPART_PART_SIZE, 100 * 1024 * 1024);
    }
}
