use std::fmt::Display;

use thiserror::Error;

/// Errors produced while encoding, decoding or configuring.
///
/// A missing key is not an error: [`OrderedMap::get`](crate::OrderedMap::get)
/// returns `None` for it.
#[derive(Debug, Error)]
pub enum Error {
    /// The input is not well-formed JSON.
    #[error("invalid JSON at byte {offset}: {reason}")]
    InvalidJson { offset: usize, reason: &'static str },

    /// The value has no JSON representation.
    #[error("unsupported value: {0}")]
    UnsupportedValue(String),

    #[error("invalid map key: keys must be strings")]
    InvalidMapKey,

    #[error("nesting exceeds the maximum depth of {0}")]
    DepthLimitExceeded(usize),

    #[error("{0}")]
    Message(String),

    #[error("config error: {0}")]
    Config(Box<figment::Error>),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn invalid_json(offset: usize, reason: &'static str) -> Self {
        Self::InvalidJson { offset, reason }
    }

    pub(crate) fn unsupported(what: impl Display) -> Self {
        Self::UnsupportedValue(what.to_string())
    }
}

impl From<figment::Error> for Error {
    fn from(e: figment::Error) -> Self {
        Self::Config(Box::new(e))
    }
}

impl serde::ser::Error for Error {
    fn custom<T>(msg: T) -> Self
    where
        T: Display,
    {
        Self::Message(msg.to_string())
    }
}

impl serde::de::Error for Error {
    fn custom<T>(msg: T) -> Self
    where
        T: Display,
    {
        Self::Message(msg.to_string())
    }
}
