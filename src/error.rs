//! Error taxonomy for the note store, activation engine and emission
//! pipeline.

use std::fmt;

/// Error type for every fallible operation this crate surfaces.
#[derive(Debug, Clone, PartialEq)]
pub enum CoreError {
    /// A `create` call used an id that is already present in the store.
    AlreadyExists(String),
    /// A lookup, mutation or deletion referenced an id (or index) that
    /// does not exist.
    NotFound(String),
    /// An ordered read was requested while the store's views are dirty;
    /// the caller must call `sort()` first.
    OutOfOrder,
    /// An index was out of bounds for the current primary sequence.
    OutOfRange { index: usize, len: usize },
    /// A binary note record could not be decoded.
    DecodeError(String),
    /// The caller-supplied buffer cannot hold the required serialization.
    BufferTooSmall { required: usize, available: usize },
    /// A malformed sprite name, draw setting, or render pass selector.
    Invalid(String),
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoreError::AlreadyExists(id) => write!(f, "id already exists: {id}"),
            CoreError::NotFound(id) => write!(f, "not found: {id}"),
            CoreError::OutOfOrder => {
                write!(f, "store is out of order, call sort() before ordered reads")
            }
            CoreError::OutOfRange { index, len } => {
                write!(f, "index {index} out of range (len {len})")
            }
            CoreError::DecodeError(msg) => write!(f, "decode error: {msg}"),
            CoreError::BufferTooSmall { required, available } => write!(
                f,
                "buffer too small: required {required} bytes, have {available}"
            ),
            CoreError::Invalid(msg) => write!(f, "invalid: {msg}"),
        }
    }
}

impl std::error::Error for CoreError {}

pub type CoreResult<T> = Result<T, CoreError>;

/// Maps a poisoned lock into the same error a caller would see from any
/// other ordering violation, instead of re-panicking on the next access.
pub(crate) fn lock_poisoned() -> CoreError {
    CoreError::Invalid("lock poisoned".to_string())
}
