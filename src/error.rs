use thiserror::Error;

/// Host-level failures: the ones fatal enough to abort bootstrap and exit 1.
#[derive(Debug, Error)]
pub enum HubError {
    #[error("invalid PORT value {0:?}: must be a u16")]
    InvalidPort(String),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("http server error: {0}")]
    Serve(#[source] std::io::Error),
}
