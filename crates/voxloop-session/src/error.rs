use thiserror::Error;

#[derive(Error, Debug)]
pub enum SessionError {
    /// The remote service reported an error event.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The transport failed while sending or receiving.
    #[error("transport error: {0}")]
    Transport(String),
}
