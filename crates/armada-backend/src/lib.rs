//! RPC client surface for backend model-management controllers.
//!
//! # Purpose
//! Everything the control plane needs to talk to a backend: the
//! [`ModelManager`] operation trait, the delta stream types, a QUIC
//! transport with a length-prefixed JSON wire codec, a multiplexed
//! [`Session`], and the [`Dialer`] connection cache that opens, shares and
//! evicts sessions per controller.
//!
//! Callers always hold a `Arc<dyn Dialer>`; the concrete QUIC stack is
//! swappable for the in-process backend in [`inprocess`] when testing.

pub mod api;
pub mod delta;
pub mod dialer;
pub mod inprocess;
pub mod session;
pub mod transport;
pub mod wire;

pub use api::{
    AllWatcher, CredentialUpdate, ModelInfo, ModelManager, ModelSpec, ModelStatusInfo, OfferSpec,
};
pub use delta::{ApplicationDelta, Delta, MachineDelta, ModelDelta};
pub use dialer::{CachingDialer, Dialer, DirectDialer};
pub use session::Session;
