//! Authoritative tick orchestrator built on `ecsnet-shared`'s snapshot differ,
//! per-client view and wire codec: session/handshake lifecycle, reconnect, and
//! server-side ingress validation for client-owned components.

pub mod applier;
pub mod config;
pub mod error;
pub mod server;
pub mod session;

pub use applier::{ApplyOutcome, ValidatorSet, Validators};
pub use config::{OwnerComponent, ServerConfig};
pub use error::ServerError;
pub use server::{NetServer, ServerHandler};
pub use session::{ConnState, SessionError, SessionTable};
