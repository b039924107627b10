//! Shared wire protocol, component registry, snapshot differ, per-client view
//! and ECS/transport boundary traits used by both `ecsnet-server` and
//! `ecsnet-client`.
//!
//! Nothing in this crate depends on a concrete ECS or transport: both are
//! expressed as traits (`ecs::NetWorld`, `transport::Transport`/
//! `transport::ClientTransport`/`transport::Handlers`) that a host application
//! implements over its own archetype store and socket layer.

pub mod differ;
pub mod ecs;
pub mod error;
pub mod ids;
pub mod registry;
pub mod transport;
pub mod util;
pub mod view;
pub mod wire;

pub use differ::OwnerComponent;
pub use error::NetError;
pub use ids::{ClientId, ConnectionId, NetId};
