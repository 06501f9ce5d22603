//! Platform service contracts.
//!
//! A service knows how to fetch the latest [`Channel`] snapshot for one
//! concrete identity type. Services are implemented outside the kernel and
//! plugged into a [`Context`](crate::context::Context) at registration.

use crate::channel::Channel;
use crate::future::Future;
use crate::identity::Identity;
use crate::result::SharedError;
use std::error::Error as StdError;
use std::fmt;

/// Fetches the latest channel for a single identity.
pub trait Service: Send + Sync + 'static {
    type Identity: Identity + Clone;

    fn channel(&self, identity: &Self::Identity) -> Future<Channel, ServiceError>;
}

/// Fetches the latest channels for many identities in one call.
pub trait BatchService: Service {
    /// Resolves with channels in the order the service returns them.
    fn channels(&self, identities: &[Self::Identity]) -> Future<Vec<Channel>, ServiceError>;
}

/// Stable numeric codes for [`ServiceError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceErrorCode {
    Unknown,
    NotFound,
    Cancelled,
    Unavailable,
    NetworkError,
    InvalidCredentials,
}

impl ServiceErrorCode {
    pub const fn raw(self) -> i32 {
        match self {
            Self::Unknown => -1,
            Self::NotFound => -2,
            Self::Cancelled => -999,
            Self::Unavailable => -1000,
            Self::NetworkError => -2000,
            Self::InvalidCredentials => -3000,
        }
    }

    pub const fn from_raw(raw: i32) -> Option<Self> {
        match raw {
            -1 => Some(Self::Unknown),
            -2 => Some(Self::NotFound),
            -999 => Some(Self::Cancelled),
            -1000 => Some(Self::Unavailable),
            -2000 => Some(Self::NetworkError),
            -3000 => Some(Self::InvalidCredentials),
            _ => None,
        }
    }

    fn describe(self) -> &'static str {
        match self {
            Self::Unknown => "unknown service error",
            Self::NotFound => "channel not found",
            Self::Cancelled => "fetch cancelled",
            Self::Unavailable => "service unavailable",
            Self::NetworkError => "network error",
            Self::InvalidCredentials => "invalid credentials",
        }
    }
}

/// Why a service failed to fetch channel(s).
#[derive(Debug, Clone)]
pub struct ServiceError {
    code: ServiceErrorCode,
    underlying: Option<SharedError>,
}

impl ServiceError {
    pub fn new(code: ServiceErrorCode) -> Self {
        Self {
            code,
            underlying: None,
        }
    }

    pub fn with_underlying(code: ServiceErrorCode, underlying: SharedError) -> Self {
        Self {
            code,
            underlying: Some(underlying),
        }
    }

    pub fn unknown() -> Self {
        Self::new(ServiceErrorCode::Unknown)
    }

    pub fn not_found() -> Self {
        Self::new(ServiceErrorCode::NotFound)
    }

    pub fn cancelled() -> Self {
        Self::new(ServiceErrorCode::Cancelled)
    }

    /// No registered handler can serve the request.
    pub fn unavailable() -> Self {
        Self::new(ServiceErrorCode::Unavailable)
    }

    pub fn network(underlying: SharedError) -> Self {
        Self::with_underlying(ServiceErrorCode::NetworkError, underlying)
    }

    pub fn invalid_credentials() -> Self {
        Self::new(ServiceErrorCode::InvalidCredentials)
    }

    pub fn code(&self) -> ServiceErrorCode {
        self.code
    }

    pub fn raw_code(&self) -> i32 {
        self.code.raw()
    }

    pub fn underlying(&self) -> Option<&SharedError> {
        self.underlying.as_ref()
    }

    pub fn is_unavailable(&self) -> bool {
        self.code == ServiceErrorCode::Unavailable
    }
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.code.describe(), self.code.raw())?;
        if let Some(underlying) = &self.underlying {
            write!(f, ": {underlying}")?;
        }
        Ok(())
    }
}

impl StdError for ServiceError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.underlying
            .as_deref()
            .map(|err| err as &(dyn StdError + 'static))
    }
}

impl From<ServiceErrorCode> for ServiceError {
    fn from(code: ServiceErrorCode) -> Self {
        Self::new(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::share;

    #[test]
    fn raw_codes_round_trip() {
        for code in [
            ServiceErrorCode::Unknown,
            ServiceErrorCode::NotFound,
            ServiceErrorCode::Cancelled,
            ServiceErrorCode::Unavailable,
            ServiceErrorCode::NetworkError,
            ServiceErrorCode::InvalidCredentials,
        ] {
            assert_eq!(ServiceErrorCode::from_raw(code.raw()), Some(code));
        }
        assert_eq!(ServiceErrorCode::from_raw(7), None);
    }

    #[test]
    fn unknown_shortcut_uses_unknown_code() {
        assert_eq!(ServiceError::unknown().raw_code(), -1);
        assert_eq!(ServiceError::unavailable().raw_code(), -1000);
    }

    #[test]
    fn underlying_cause_is_exposed_as_source() {
        let io = std::io::Error::new(std::io::ErrorKind::TimedOut, "timed out");
        let err = ServiceError::network(share(io));

        assert_eq!(err.code(), ServiceErrorCode::NetworkError);
        assert_eq!(err.to_string(), "network error (-2000): timed out");
        let source = err.source().expect("network error must carry a source");
        assert_eq!(source.to_string(), "timed out");
    }
}
