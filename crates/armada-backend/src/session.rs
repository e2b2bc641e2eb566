//! A live RPC session with one backend controller.
//!
//! # Purpose
//! Implements [`ModelManager`] over a QUIC connection. Every call opens its
//! own bi-directional stream (request frame out, response frame back), so
//! independent calls never head-of-line block each other and a caller's
//! cancellation aborts only its own stream. The connection itself stays
//! cached until the transport is confirmed dead.

use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use quinn::{Connection, RecvStream, SendStream};
use tracing::debug;

use crate::api::{
    AllWatcher, CredentialUpdate, ModelInfo, ModelManager, ModelSpec, ModelStatusInfo, OfferSpec,
};
use crate::delta::Delta;
use crate::transport::BackendTransport;
use crate::wire::{Request, Response, read_message, write_message};

pub struct Session {
    connection: Connection,
}

impl Session {
    /// Dial the first reachable address and authenticate as the admin user.
    pub async fn open(
        transport: &BackendTransport,
        addresses: &[String],
        ca_pem: &str,
        user: &str,
        password: &str,
    ) -> Result<Self> {
        let mut last_err = anyhow!("controller has no addresses");
        for addr in addresses {
            match transport.connect(addr, ca_pem).await {
                Ok(connection) => {
                    debug!(addr, "backend connection established");
                    let session = Session { connection };
                    session.login(user, password).await?;
                    return Ok(session);
                }
                Err(err) => {
                    debug!(addr, error = %err, "backend dial failed");
                    last_err = err;
                }
            }
        }
        Err(last_err)
    }

    async fn login(&self, user: &str, password: &str) -> Result<()> {
        let response = self
            .round_trip(&Request::Login {
                user: user.to_string(),
                password: password.to_string(),
            })
            .await
            .context("authenticate session")?;
        match response {
            Response::Ok => Ok(()),
            other => Err(anyhow!("unexpected login response: {other:?}")),
        }
    }

    async fn round_trip(&self, request: &Request) -> Result<Response> {
        // The deadline aborts only this call's stream; the connection stays
        // cached unless the transport itself is dead.
        tokio::time::timeout(REQUEST_DEADLINE, self.round_trip_inner(request))
            .await
            .map_err(|_| anyhow!("backend request timed out"))?
    }

    async fn round_trip_inner(&self, request: &Request) -> Result<Response> {
        let (mut send, mut recv) = self
            .connection
            .open_bi()
            .await
            .context("open request stream")?;
        write_message(&mut send, request).await?;
        send.finish()?;
        let response: Response = read_message(&mut recv)
            .await?
            .ok_or_else(|| anyhow!("response stream closed early"))?;
        response.into_result()
    }
}

const REQUEST_DEADLINE: Duration = Duration::from_secs(30);

#[async_trait]
impl ModelManager for Session {
    async fn watch_all_models(&self) -> Result<Box<dyn AllWatcher>> {
        let (mut send, recv) = self
            .connection
            .open_bi()
            .await
            .context("open watch stream")?;
        write_message(&mut send, &Request::WatchAllModels).await?;
        Ok(Box::new(WireWatcher { _send: send, recv }))
    }

    async fn add_model(&self, spec: &ModelSpec) -> Result<ModelInfo> {
        match self
            .round_trip(&Request::AddModel { spec: spec.clone() })
            .await?
        {
            Response::Model { info } => Ok(info),
            other => Err(anyhow!("unexpected add model response: {other:?}")),
        }
    }

    async fn destroy_model(&self, uuid: &str) -> Result<()> {
        self.round_trip(&Request::DestroyModel {
            uuid: uuid.to_string(),
        })
        .await
        .map(|_| ())
    }

    async fn grant_model_access(&self, uuid: &str, user: &str, access: &str) -> Result<()> {
        self.round_trip(&Request::GrantModelAccess {
            uuid: uuid.to_string(),
            user: user.to_string(),
            access: access.to_string(),
        })
        .await
        .map(|_| ())
    }

    async fn revoke_model_access(&self, uuid: &str, user: &str, access: &str) -> Result<()> {
        self.round_trip(&Request::RevokeModelAccess {
            uuid: uuid.to_string(),
            user: user.to_string(),
            access: access.to_string(),
        })
        .await
        .map(|_| ())
    }

    async fn add_application_offer(&self, spec: &OfferSpec) -> Result<String> {
        match self
            .round_trip(&Request::AddApplicationOffer { spec: spec.clone() })
            .await?
        {
            Response::Offer { uuid } => Ok(uuid),
            other => Err(anyhow!("unexpected offer response: {other:?}")),
        }
    }

    async fn destroy_application_offer(&self, offer_url: &str) -> Result<()> {
        self.round_trip(&Request::DestroyApplicationOffer {
            url: offer_url.to_string(),
        })
        .await
        .map(|_| ())
    }

    async fn update_credential(&self, update: &CredentialUpdate) -> Result<()> {
        self.round_trip(&Request::UpdateCredential {
            update: update.clone(),
        })
        .await
        .map(|_| ())
    }

    async fn model_status(&self, uuid: &str) -> Result<ModelStatusInfo> {
        match self
            .round_trip(&Request::ModelStatus {
                uuid: uuid.to_string(),
            })
            .await?
        {
            Response::Status { status } => Ok(status),
            other => Err(anyhow!("unexpected status response: {other:?}")),
        }
    }

    fn is_closed(&self) -> bool {
        self.connection.close_reason().is_some()
    }

    async fn close(&self) {
        self.connection.close(0u32.into(), b"session closed");
    }
}

struct WireWatcher {
    // Kept open so the backend sees a live peer for the watch.
    _send: SendStream,
    recv: RecvStream,
}

#[async_trait]
impl AllWatcher for WireWatcher {
    async fn next(&mut self) -> Result<Vec<Delta>> {
        match read_message::<Response>(&mut self.recv).await? {
            Some(response) => match response.into_result()? {
                Response::Deltas { deltas } => Ok(deltas),
                other => Err(anyhow!("unexpected watch response: {other:?}")),
            },
            None => Err(anyhow!("watch stream closed")),
        }
    }

    async fn stop(&mut self) -> Result<()> {
        self.recv.stop(0u32.into()).ok();
        Ok(())
    }
}
