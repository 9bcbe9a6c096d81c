use std::time::Duration;

pub type Result<T> = std::result::Result<T, Error>;

/// Coarse class of a failed exchange, carried by status-0 outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum HttpTransportErrorKind {
    /// The request never left the process (bad URL, scheme or header).
    InvalidRequest,
    Connect,
    Timeout,
    /// Connection dropped or protocol error after connecting.
    Request,
    BodyRead,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid url `{0}`")]
    InvalidUrl(String),

    #[error("unsupported scheme in `{0}` (expected http or https)")]
    UnsupportedScheme(String),

    #[error("invalid header `{0}`")]
    Header(String),

    #[error("malformed request: {0}")]
    Malformed(#[from] http::Error),

    #[error("exchange failed: {0}")]
    Request(#[from] hyper_util::client::legacy::Error),

    #[error("no response within {0:?}")]
    Timeout(Duration),

    #[error("response body read failed: {0}")]
    BodyRead(#[from] hyper::Error),
}

impl Error {
    #[must_use]
    pub fn transport_error_kind(&self) -> HttpTransportErrorKind {
        match self {
            Self::InvalidUrl(_)
            | Self::UnsupportedScheme(_)
            | Self::Header(_)
            | Self::Malformed(_) => HttpTransportErrorKind::InvalidRequest,
            Self::Request(e) if e.is_connect() => HttpTransportErrorKind::Connect,
            Self::Request(_) => HttpTransportErrorKind::Request,
            Self::Timeout(_) => HttpTransportErrorKind::Timeout,
            Self::BodyRead(_) => HttpTransportErrorKind::BodyRead,
        }
    }
}
