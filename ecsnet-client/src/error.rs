use ecsnet_shared::error::NetError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ClientError {
    #[error(transparent)]
    Net(#[from] NetError),

    #[error("not connected")]
    NotConnected,
}
