//! Frame codec for backend RPC streams.
//!
//! # Purpose
//! Length-prefixed JSON frames over QUIC streams: a 4-byte big-endian
//! length followed by the serialized message. A maximum frame size is
//! enforced before allocating for the payload.

use anyhow::{Context, Result, anyhow};
use quinn::{ReadExactError, RecvStream, SendStream};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::api::{CredentialUpdate, ModelInfo, ModelSpec, ModelStatusInfo, OfferSpec};
use crate::delta::Delta;

/// Upper bound for a single frame. Control RPC payloads are small; anything
/// beyond this indicates a corrupt or hostile peer.
pub const MAX_FRAME_BYTES: usize = 4 * 1024 * 1024;

const HEADER_LEN: usize = 4;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    Login { user: String, password: String },
    WatchAllModels,
    AddModel { spec: ModelSpec },
    DestroyModel { uuid: String },
    GrantModelAccess { uuid: String, user: String, access: String },
    RevokeModelAccess { uuid: String, user: String, access: String },
    AddApplicationOffer { spec: OfferSpec },
    DestroyApplicationOffer { url: String },
    UpdateCredential { update: CredentialUpdate },
    ModelStatus { uuid: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    Ok,
    Error { code: String, message: String },
    Model { info: ModelInfo },
    Offer { uuid: String },
    Status { status: ModelStatusInfo },
    Deltas { deltas: Vec<Delta> },
}

impl Response {
    /// Collapse a response into `Ok` or a backend error.
    pub fn into_result(self) -> Result<Response> {
        match self {
            Response::Error { code, message } => {
                Err(anyhow!("backend error ({code}): {message}"))
            }
            other => Ok(other),
        }
    }
}

pub async fn write_message<T: Serialize>(send: &mut SendStream, message: &T) -> Result<()> {
    let payload = serde_json::to_vec(message).context("encode message")?;
    if payload.len() > MAX_FRAME_BYTES {
        return Err(anyhow!("frame too large: {} bytes", payload.len()));
    }
    let header = (payload.len() as u32).to_be_bytes();
    send.write_all(&header).await.context("write frame header")?;
    send.write_all(&payload).await.context("write frame payload")?;
    Ok(())
}

/// Read one frame; `None` on a cleanly finished stream.
pub async fn read_message<T: DeserializeOwned>(recv: &mut RecvStream) -> Result<Option<T>> {
    let mut header = [0u8; HEADER_LEN];
    match recv.read_exact(&mut header).await {
        Ok(()) => {}
        Err(ReadExactError::FinishedEarly(_)) => return Ok(None),
        Err(ReadExactError::ReadError(err)) => return Err(err.into()),
    }
    let length = u32::from_be_bytes(header) as usize;
    if length > MAX_FRAME_BYTES {
        return Err(anyhow!("frame too large: {length} bytes (cap {MAX_FRAME_BYTES})"));
    }
    let mut payload = vec![0u8; length];
    recv.read_exact(&mut payload)
        .await
        .context("read frame payload")?;
    let message = serde_json::from_slice(&payload).context("decode message")?;
    Ok(Some(message))
}
