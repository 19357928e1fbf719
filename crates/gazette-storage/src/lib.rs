//! Streaming S3-compatible object store client (`BinaryStore`).
//!
//! Streamed get/put, multipart upload with explicit abort-on-error, and a
//! default `public-read` ACL, built on the `aws-sdk-s3` + `aws-config`
//! stack.

pub mod errors;
pub mod store;

pub use errors::StorageError;
pub use store::{BinaryStore, UploadOptions};
