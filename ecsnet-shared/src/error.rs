//! Crate-level error umbrella (§7): aggregates the per-module error taxonomies
//! behind one enum so callers crossing module boundaries don't have to match on
//! each source separately.

use thiserror::Error;

use crate::registry::RegistryError;
use crate::transport::TransportError;
use crate::wire::CodecError;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum NetError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}
