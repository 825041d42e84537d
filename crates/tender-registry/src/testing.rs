//! Test doubles shared by the unit tests.

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use std::time::Duration;
use tender_core::{Codec, CodecError, JobOffer, KeyValueStore, Mutation, Node, StoreError, StoreResult};

/// A store that is never reachable.
pub struct UnavailableStore;

fn down<T>() -> StoreResult<T> {
    Err(StoreError::Unavailable("connection refused".to_string()))
}

#[async_trait]
impl KeyValueStore for UnavailableStore {
    async fn get(&self, _key: &str, _recursive: bool) -> StoreResult<Node> {
        down()
    }

    async fn set(&self, _key: &str, _value: &str, _ttl: Option<Duration>) -> StoreResult<Node> {
        down()
    }

    async fn create(&self, _key: &str, _value: &str, _ttl: Option<Duration>) -> StoreResult<Node> {
        down()
    }

    async fn delete(&self, _key: &str, _recursive: bool) -> StoreResult<()> {
        down()
    }

    fn watch(&self, _prefix: &str) -> BoxStream<'static, Mutation> {
        stream::empty().boxed()
    }
}

/// A codec that rejects every offer on the way in.
pub struct RefusingCodec;

impl Codec for RefusingCodec {
    fn encode_offer(&self, offer: &JobOffer) -> Result<String, CodecError> {
        Err(CodecError::Other(format!("refusing to encode {}", offer.job_id())))
    }

    fn decode_offer(&self, _raw: &str) -> Result<JobOffer, CodecError> {
        Err(CodecError::Other("refusing to decode".to_string()))
    }
}
