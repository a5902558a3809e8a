//! Fixed-width binary encoding for sequence numbers.
//!
//! Sequence numbers are stored as 6-byte big-endian unsigned integers, which
//! covers the full 48-bit range a log can assign.

use crate::entry::{Seq, MAX_SEQ};
use thiserror::Error;

/// Width in bytes of an encoded sequence number.
pub const U48_LEN: usize = 6;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("Invalid length: expected {expected} bytes, found {found}")]
    InvalidLength { expected: usize, found: usize },

    #[error("Value {0} does not fit in 48 bits")]
    ValueTooLarge(u64),
}

/// Encode a value as 6 big-endian bytes.
pub fn encode_u48(value: Seq) -> Result<[u8; U48_LEN], CodecError> {
    if value > MAX_SEQ {
        return Err(CodecError::ValueTooLarge(value));
    }
    let wide = value.to_be_bytes();
    let mut out = [0u8; U48_LEN];
    out.copy_from_slice(&wide[8 - U48_LEN..]);
    Ok(out)
}

/// Decode exactly 6 big-endian bytes.
pub fn decode_u48(buf: &[u8]) -> Result<Seq, CodecError> {
    if buf.len() != U48_LEN {
        return Err(CodecError::InvalidLength {
            expected: U48_LEN,
            found: buf.len(),
        });
    }
    Ok(buf.iter().fold(0u64, |acc, b| (acc << 8) | u64::from(*b)))
}

/// Append the 6-byte encoding of `value` to `out`.
pub fn put_u48(out: &mut Vec<u8>, value: Seq) -> Result<(), CodecError> {
    out.extend_from_slice(&encode_u48(value)?);
    Ok(())
}
