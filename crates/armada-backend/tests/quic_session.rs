//! End-to-end session tests against a minimal QUIC backend.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use armada_backend::api::{AllWatcher, ModelManager};
use armada_backend::dialer::{CachingDialer, Dialer};
use armada_backend::wire::{Request, Response, read_message, write_message};
use armada_catalog::{Controller, Life};
use quinn::Endpoint;
use rustls::pki_types::PrivatePkcs8KeyDer;

struct FakeBackend {
    addr: SocketAddr,
    ca_pem: String,
    // Keeps the acceptor task alive for the test's duration.
    _endpoint: Endpoint,
}

/// Spawn a backend that answers the wire protocol with canned data.
fn spawn_backend() -> Result<FakeBackend> {
    rustls::crypto::ring::default_provider().install_default().ok();
    let rcgen::CertifiedKey { cert, key_pair } =
        rcgen::generate_simple_self_signed(vec!["localhost".into()])?;
    let ca_pem = cert.pem();
    let cert_der = cert.der().clone();
    let key_der = PrivatePkcs8KeyDer::from(key_pair.serialize_der());
    let server_config = quinn::ServerConfig::with_single_cert(vec![cert_der], key_der.into())?;
    let endpoint = Endpoint::server(server_config, "127.0.0.1:0".parse()?)?;
    let addr = endpoint.local_addr()?;

    let accept_endpoint = endpoint.clone();
    tokio::spawn(async move {
        while let Some(connecting) = accept_endpoint.accept().await {
            let Ok(connection) = connecting.await else {
                continue;
            };
            tokio::spawn(async move {
                while let Ok((send, recv)) = connection.accept_bi().await {
                    tokio::spawn(handle_stream(send, recv));
                }
            });
        }
    });
    Ok(FakeBackend {
        addr,
        ca_pem,
        _endpoint: endpoint,
    })
}

async fn handle_stream(mut send: quinn::SendStream, mut recv: quinn::RecvStream) -> Result<()> {
    while let Some(request) = read_message::<Request>(&mut recv).await? {
        let response = match request {
            Request::Login { user, .. } if user == "admin" => Response::Ok,
            Request::Login { user, .. } => Response::Error {
                code: "unauthorized".to_string(),
                message: format!("unknown user {user}"),
            },
            Request::ModelStatus { uuid } if uuid == "u-1" => Response::Status {
                status: armada_backend::ModelStatusInfo {
                    uuid,
                    life: Life::Alive,
                    status: "available".to_string(),
                    unit_count: 3,
                },
            },
            Request::ModelStatus { uuid } => Response::Error {
                code: "not_found".to_string(),
                message: format!("model {uuid} not found"),
            },
            Request::WatchAllModels => {
                let batch = Response::Deltas {
                    deltas: vec![armada_backend::Delta::Model(armada_backend::ModelDelta {
                        uuid: "u-1".to_string(),
                        life: Life::Alive,
                        status: "available".to_string(),
                        unit_count: 3,
                    })],
                };
                write_message(&mut send, &batch).await?;
                continue;
            }
            _ => Response::Ok,
        };
        write_message(&mut send, &response).await?;
    }
    Ok(())
}

fn controller_for(backend: &FakeBackend) -> Controller {
    Controller {
        path: "bob/c1".parse().expect("path"),
        uuid: "c1-uuid".to_string(),
        // The self-signed certificate names "localhost", so dial by name.
        addresses: vec![format!("localhost:{}", backend.addr.port())],
        ca_cert: backend.ca_pem.clone(),
        admin_user: "admin".to_string(),
        admin_password: "hunter2".to_string(),
        ..Default::default()
    }
}

#[tokio::test]
async fn session_round_trips_rpcs() -> Result<()> {
    let backend = spawn_backend()?;
    let dialer = CachingDialer::new()?;
    let ctl = controller_for(&backend);

    let session = dialer.open(&ctl).await.context("open session")?;
    let status = session.model_status("u-1").await?;
    assert_eq!(status.unit_count, 3);
    assert!(session.model_status("u-404").await.is_err());

    session.grant_model_access("u-1", "alice", "write").await?;
    session.revoke_model_access("u-1", "alice", "write").await?;

    let mut watcher = session.watch_all_models().await?;
    let deltas = watcher.next().await?;
    assert_eq!(deltas.len(), 1);
    watcher.stop().await?;
    Ok(())
}

#[tokio::test]
async fn dialer_caches_and_evicts_sessions() -> Result<()> {
    let backend = spawn_backend()?;
    let dialer = CachingDialer::new()?;
    let ctl = controller_for(&backend);

    let first = dialer.open(&ctl).await?;
    let second = dialer.open(&ctl).await?;
    assert!(Arc::ptr_eq(&first, &second), "open must reuse the session");

    dialer.evict(&ctl.path);
    let third = dialer.open(&ctl).await?;
    assert!(!Arc::ptr_eq(&first, &third), "eviction must force a redial");
    dialer.close_all().await;
    Ok(())
}

#[tokio::test]
async fn bad_credentials_are_rejected_at_login() -> Result<()> {
    let backend = spawn_backend()?;
    let dialer = CachingDialer::new()?;
    let mut ctl = controller_for(&backend);
    ctl.admin_user = "mallory".to_string();
    assert!(dialer.open(&ctl).await.is_err());
    Ok(())
}
