//! Payload encoding for values kept in the store.

use crate::{CodecError, JobOffer};

/// Serialization boundary for offer payloads.
pub trait Codec: Send + Sync {
    fn encode_offer(&self, offer: &JobOffer) -> Result<String, CodecError>;

    fn decode_offer(&self, raw: &str) -> Result<JobOffer, CodecError>;
}

/// JSON codec, the default.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode_offer(&self, offer: &JobOffer) -> Result<String, CodecError> {
        Ok(serde_json::to_string(offer)?)
    }

    fn decode_offer(&self, raw: &str) -> Result<JobOffer, CodecError> {
        Ok(serde_json::from_str(raw)?)
    }
}
