// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wire framing: 4-byte big-endian length prefix `L` counting only the
//! JSON payload, then an 8-byte header (4-byte session timestamp, 4-byte
//! sequence number), then `L` bytes of JSON. `L == 0` is a distinguished
//! forwarding/replay request carrying no payload; `sessionTs`/`seqNum`
//! are read unconditionally before `L` is consulted.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::message::Message;

const HEADER_LEN: usize = 8;

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("I/O error while framing a message: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed message payload: {0}")]
    Json(#[from] serde_json::Error),
    #[error("connection closed mid-frame")]
    Truncated,
}

/// A decoded wire frame: either a real message, or a zero-payload
/// forwarding/replay request asking the peer to resend everything it has
/// buffered for `session_ts` from `seq_num` onward.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Message { session_ts: u32, seq_num: u32, message: Message },
    ReplayRequest { session_ts: u32, seq_num: u32 },
}

impl Frame {
    pub fn message(session_ts: u32, seq_num: u32, message: Message) -> Frame {
        Frame::Message { session_ts, seq_num, message }
    }

    pub fn replay_request(session_ts: u32, seq_num: u32) -> Frame {
        Frame::ReplayRequest { session_ts, seq_num }
    }

    pub fn session_ts(&self) -> u32 {
        match self {
            Frame::Message { session_ts, .. } => *session_ts,
            Frame::ReplayRequest { session_ts, .. } => *session_ts,
        }
    }

    pub fn seq_num(&self) -> u32 {
        match self {
            Frame::Message { seq_num, .. } => *seq_num,
            Frame::ReplayRequest { seq_num, .. } => *seq_num,
        }
    }

    /// Encodes the 8-byte `sessionTs`/`seqNum` header plus, for a
    /// [`Frame::Message`], its JSON payload. Returns the header and the
    /// payload separately so the caller can derive `L` from the payload
    /// alone.
    fn encode(&self) -> Result<([u8; HEADER_LEN], Vec<u8>), ProtocolError> {
        let mut header = [0u8; HEADER_LEN];
        header[..4].copy_from_slice(&self.session_ts().to_be_bytes());
        header[4..].copy_from_slice(&self.seq_num().to_be_bytes());
        let payload = match self {
            Frame::Message { message, .. } => serde_json::to_vec(message)?,
            Frame::ReplayRequest { .. } => Vec::new(),
        };
        Ok((header, payload))
    }
}

/// Writes one length-prefixed frame to `writer`. The length prefix `L`
/// counts only the JSON payload (0 for a replay request); the 8-byte
/// `sessionTs`/`seqNum` header always follows it.
pub async fn write_frame<W: AsyncWrite + Unpin>(writer: &mut W, frame: &Frame) -> Result<(), ProtocolError> {
    let (header, payload) = frame.encode()?;
    writer.write_all(&(payload.len() as u32).to_be_bytes()).await?;
    writer.write_all(&header).await?;
    writer.write_all(&payload).await?;
    writer.flush().await?;
    Ok(())
}

/// Reads one length-prefixed frame from `reader`. Returns `Ok(None)` on a
/// clean EOF at a frame boundary (peer closed the connection).
pub async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Option<Frame>, ProtocolError> {
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }
    let payload_len = u32::from_be_bytes(len_buf) as usize;
    let mut header = [0u8; HEADER_LEN];
    reader.read_exact(&mut header).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::UnexpectedEof => ProtocolError::Truncated,
        _ => ProtocolError::Io(e),
    })?;
    let session_ts = u32::from_be_bytes([header[0], header[1], header[2], header[3]]);
    let seq_num = u32::from_be_bytes([header[4], header[5], header[6], header[7]]);
    if payload_len == 0 {
        return Ok(Some(Frame::ReplayRequest { session_ts, seq_num }));
    }
    let mut payload = vec![0u8; payload_len];
    reader.read_exact(&mut payload).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::UnexpectedEof => ProtocolError::Truncated,
        _ => ProtocolError::Io(e),
    })?;
    let message: Message = serde_json::from_slice(&payload)?;
    Ok(Some(Frame::Message { session_ts, seq_num, message }))
}

#[cfg(test)]
#[path = "frame_tests.rs"]
mod tests;
