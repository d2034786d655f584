//! I/O abstraction layer for fetching source objects from different stores

pub mod local_store;
pub mod object_store;
pub mod s3_store;

pub use local_store::LocalObjectStore;
pub use object_store::ObjectStore;
pub use s3_store::{S3ObjectStore, S3Settings};
