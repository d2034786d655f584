use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;

/// Abstraction over bucket/key addressed storage
/// The loader only ever needs whole-object reads; decoders work on the full
/// byte stream, so there is no range or streaming interface here.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch the complete contents of `key` in `bucket`
    async fn get_object(&self, bucket: &str, key: &str) -> Result<Bytes>;

    /// Human readable location of the store, used in progress logs
    fn describe(&self) -> String;
}
