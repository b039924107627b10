use thiserror::Error;

use ecsnet_shared::error::NetError;

use crate::session::SessionError;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ServerError {
    #[error(transparent)]
    Net(#[from] NetError),

    #[error(transparent)]
    Session(#[from] SessionError),
}
