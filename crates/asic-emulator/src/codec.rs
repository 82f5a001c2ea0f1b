//! Length-prefixed request/reply frames.
//!
//! A frame is `[identity_len: u8][identity][payload_len: u32 BE][payload]`.
//! Payloads carry a transaction serialized as a JSON array of bytes.

use std::io::{self, Read, Write};

use crate::CodecError;

/// Largest identity a frame can carry.
pub const MAX_IDENTITY_LEN: usize = u8::MAX as usize;
/// Largest payload a frame can carry.
pub const MAX_PAYLOAD_LEN: usize = 64 * 1024;

/// One request or reply on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Opaque token naming the client the frame belongs to.
    pub identity: Vec<u8>,
    /// Serialized transaction.
    pub payload: Vec<u8>,
}

impl Frame {
    /// Builds a frame carrying `transaction` for `identity`.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Decode`] if the transaction cannot be
    /// serialized.
    pub fn for_transaction(identity: &[u8], transaction: &[u8]) -> Result<Self, CodecError> {
        Ok(Self {
            identity: identity.to_vec(),
            payload: encode_transaction(transaction)?,
        })
    }

    /// Builds a reply to this frame carrying `payload`.
    #[must_use]
    pub fn reply(&self, payload: Vec<u8>) -> Self {
        Self {
            identity: self.identity.clone(),
            payload,
        }
    }
}

/// Serializes a transaction into a frame payload.
///
/// # Errors
///
/// Returns [`CodecError::Decode`] if serialization fails.
pub fn encode_transaction(transaction: &[u8]) -> Result<Vec<u8>, CodecError> {
    Ok(serde_json::to_vec(transaction)?)
}

/// Deserializes a frame payload into a transaction.
///
/// # Errors
///
/// Returns [`CodecError::Decode`] unless the payload is a JSON array of
/// integers in `0..=255`.
pub fn decode_transaction(payload: &[u8]) -> Result<Vec<u8>, CodecError> {
    Ok(serde_json::from_slice(payload)?)
}

/// Writes one frame and flushes the writer.
///
/// # Errors
///
/// Returns [`CodecError::IdentityTooLong`] or [`CodecError::PayloadTooLong`]
/// before anything is written if the frame exceeds the limits, and
/// [`CodecError::Io`] if the writer fails.
pub fn write_frame<W: Write>(writer: &mut W, frame: &Frame) -> Result<(), CodecError> {
    let identity_len = u8::try_from(frame.identity.len()).map_err(|_| CodecError::IdentityTooLong {
        len: frame.identity.len(),
        max: MAX_IDENTITY_LEN,
    })?;
    let payload_len = checked_payload_len(frame.payload.len())?;

    let mut buffer = Vec::with_capacity(1 + frame.identity.len() + 4 + frame.payload.len());
    buffer.push(identity_len);
    buffer.extend_from_slice(&frame.identity);
    buffer.extend_from_slice(&payload_len.to_be_bytes());
    buffer.extend_from_slice(&frame.payload);

    writer.write_all(&buffer)?;
    writer.flush()?;
    Ok(())
}

/// Reads one frame.
///
/// Returns `Ok(None)` when the stream ends cleanly before a new frame
/// starts.
///
/// # Errors
///
/// Returns [`CodecError::PayloadTooLong`] for an oversized length prefix and
/// [`CodecError::Io`] if the stream fails or ends mid-frame.
pub fn read_frame<R: Read>(reader: &mut R) -> Result<Option<Frame>, CodecError> {
    let mut identity_len = [0_u8; 1];
    match reader.read_exact(&mut identity_len) {
        Ok(()) => {}
        Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(err) => return Err(err.into()),
    }

    let mut identity = vec![0; usize::from(identity_len[0])];
    reader.read_exact(&mut identity)?;

    let mut payload_len = [0_u8; 4];
    reader.read_exact(&mut payload_len)?;
    let payload_len = u32::from_be_bytes(payload_len);
    let payload_len = usize::try_from(payload_len).unwrap_or(usize::MAX);
    checked_payload_len(payload_len)?;

    let mut payload = vec![0; payload_len];
    reader.read_exact(&mut payload)?;

    Ok(Some(Frame { identity, payload }))
}

fn checked_payload_len(len: usize) -> Result<u32, CodecError> {
    let too_long = CodecError::PayloadTooLong {
        len,
        max: MAX_PAYLOAD_LEN,
    };
    if len > MAX_PAYLOAD_LEN {
        return Err(too_long);
    }
    u32::try_from(len).map_err(|_| too_long)
}
