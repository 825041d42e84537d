//! Registry error types.

use tender_core::{CodecError, InvalidIdentity, StoreError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("encoding failed: {0}")]
    Encode(#[from] CodecError),

    #[error("invalid identity: {0}")]
    InvalidIdentity(#[from] InvalidIdentity),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

pub type RegistryResult<T> = std::result::Result<T, RegistryError>;
