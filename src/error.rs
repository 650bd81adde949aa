use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// A socket operation failed; `op` names the call that failed.
    #[error("{op}: {source}")]
    Socket {
        op: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Returns a closure tagging an I/O error with the socket operation that produced it.
    ///
    /// Meant for `map_err`: `socket.connect(addr).await.map_err(Error::socket("connect"))?`.
    pub fn socket(op: &'static str) -> impl FnOnce(std::io::Error) -> Error {
        move |source| Error::Socket { op, source }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
