//! Binary back end: a `postcard`-serialized `ProjectionData` blob, read
//! directly by the runtime without a text-parsing step (§4.5, §6).

use crate::data::ProjectionData;

#[derive(Debug, thiserror::Error)]
pub enum BytecodeError {
    #[error("failed to serialize projection data: {0}")]
    Encode(#[source] postcard::Error),
    #[error("failed to deserialize projection data: {0}")]
    Decode(#[source] postcard::Error),
}

/// Serialize `data` to its compact binary form.
pub fn emit(data: &ProjectionData) -> Result<Vec<u8>, BytecodeError> {
    postcard::to_allocvec(data).map_err(BytecodeError::Encode)
}

/// Parse a binary blob produced by [`emit`] back into `ProjectionData`.
pub fn decode(bytes: &[u8]) -> Result<ProjectionData, BytecodeError> {
    postcard::from_bytes(bytes).map_err(BytecodeError::Decode)
}
