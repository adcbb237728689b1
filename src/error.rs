use std::backtrace::Backtrace;
use std::error::Error as StdError;
use std::fmt;

use reqwest::{Method, StatusCode};

/// Broad classification of every failure this crate can produce.
#[non_exhaustive]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Kind {
    /// The server answered with a non-2xx status. Payload: [`Status`].
    Status,
    /// An authorization failure intercepted while trading; the session was torn down.
    AuthExpired,
    /// The wallet signer rejected the challenge. Payload: [`Signer`].
    Signer,
    /// Local input was rejected before any request was made. Payload: [`Validation`].
    Validation,
    /// The durable key-value slot could not be read or written.
    Storage,
    /// Transport or decoding failure.
    Internal,
}

#[derive(Debug)]
pub struct Error {
    kind: Kind,
    source: Option<Box<dyn StdError + Send + Sync + 'static>>,
    backtrace: Backtrace,
}

impl Error {
    pub fn with_source<S: StdError + Send + Sync + 'static>(kind: Kind, source: S) -> Self {
        Self {
            kind,
            source: Some(Box::new(source)),
            backtrace: Backtrace::capture(),
        }
    }

    #[must_use]
    pub fn kind(&self) -> Kind {
        self.kind
    }

    #[must_use]
    pub fn backtrace(&self) -> &Backtrace {
        &self.backtrace
    }

    #[must_use]
    pub fn inner(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        self.source.as_deref()
    }

    #[must_use]
    pub fn downcast_ref<E: StdError + 'static>(&self) -> Option<&E> {
        let e = self.source.as_deref()?;
        e.downcast_ref::<E>()
    }

    pub fn validation<S: Into<String>>(reason: S) -> Self {
        Self::with_source(
            Kind::Validation,
            Validation {
                reason: reason.into(),
            },
        )
    }

    pub fn signer<S: Into<String>>(reason: S) -> Self {
        Self::with_source(
            Kind::Signer,
            Signer {
                reason: reason.into(),
            },
        )
    }

    pub fn status<S: Into<String>>(
        status_code: StatusCode,
        method: Method,
        path: String,
        message: S,
    ) -> Self {
        Self::with_source(
            Kind::Status,
            Status {
                status_code,
                method,
                path,
                message: message.into(),
            },
        )
    }

    pub fn storage<S: StdError + Send + Sync + 'static>(source: S) -> Self {
        Self::with_source(Kind::Storage, source)
    }

    /// Re-tags an authorization failure after the session has been torn down.
    #[must_use]
    pub fn into_auth_expired(self) -> Self {
        Self {
            kind: Kind::AuthExpired,
            source: self.source,
            backtrace: self.backtrace,
        }
    }

    /// The HTTP status retained from a non-2xx response, if any.
    #[must_use]
    pub fn status_code(&self) -> Option<StatusCode> {
        self.downcast_ref::<Status>().map(|s| s.status_code)
    }

    /// `true` when the server rejected the bearer credential.
    ///
    /// Decided on the retained status code only, so business errors whose text
    /// mentions authorization never match.
    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        match self.kind {
            Kind::AuthExpired => true,
            Kind::Status => self.status_code() == Some(StatusCode::UNAUTHORIZED),
            _ => false,
        }
    }

    /// User-facing text for error-state flags.
    #[must_use]
    pub fn message(&self) -> String {
        if let Some(status) = self.downcast_ref::<Status>() {
            return status.message.clone();
        }
        if let Some(signer) = self.downcast_ref::<Signer>() {
            return signer.reason.clone();
        }
        if let Some(validation) = self.downcast_ref::<Validation>() {
            return validation.reason.clone();
        }
        match &self.source {
            Some(source) => source.to_string(),
            None => format!("{:?} error", self.kind),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source {
            Some(src) => write!(f, "{:?}: {}", self.kind, src),
            None => write!(f, "{:?}", self.kind),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn StdError + 'static))
    }
}

/// A non-2xx response, normalized to its message.
#[non_exhaustive]
#[derive(Debug)]
pub struct Status {
    pub status_code: StatusCode,
    pub method: Method,
    pub path: String,
    pub message: String,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "error({}) making {} call to {} with {}",
            self.status_code, self.method, self.path, self.message
        )
    }
}

impl StdError for Status {}

#[non_exhaustive]
#[derive(Debug)]
pub struct Signer {
    pub reason: String,
}

impl fmt::Display for Signer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.reason)
    }
}

impl StdError for Signer {}

#[non_exhaustive]
#[derive(Debug)]
pub struct Validation {
    pub reason: String,
}

impl fmt::Display for Validation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid: {}", self.reason)
    }
}

impl StdError for Validation {}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::with_source(Kind::Internal, e)
    }
}

impl From<url::ParseError> for Error {
    fn from(e: url::ParseError) -> Self {
        Error::with_source(Kind::Internal, e)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::with_source(Kind::Internal, e)
    }
}

impl From<reqwest::header::InvalidHeaderValue> for Error {
    fn from(e: reqwest::header::InvalidHeaderValue) -> Self {
        Error::with_source(Kind::Internal, e)
    }
}

impl From<alloy::signers::Error> for Error {
    fn from(e: alloy::signers::Error) -> Self {
        Error::signer(e.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::storage(e)
    }
}
