use tokio::io;

use crate::game::SessionError;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("io failure: {0}")]
    Io(#[from] io::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] shared::ProtocolError),

    #[error("session error: {0}")]
    Session(#[from] SessionError),

    #[error("player {0} is no longer connected")]
    PlayerGone(u32),
}
