//! Error kinds surfaced by [`crate::Engine`]'s public operations (spec §7).

use std::fmt;

/// The four error kinds a caller of the engine can observe.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No original exists for this id.
    #[error("no original image with id {id}")]
    IdNotFound { id: u64 },

    /// An uploaded stream failed to decode as an image.
    #[error("uploaded data is not a valid image: {0}")]
    InvalidImage(#[from] image::ImageError),

    /// A construction-time or request-time parameter was invalid.
    #[error("invalid parameters: {0}")]
    InvalidParams(String),

    /// An I/O or encoding failure unrelated to the caller's input.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Internal(e.to_string())
    }
}

impl Error {
    pub fn invalid_params(msg: impl fmt::Display) -> Self {
        Error::InvalidParams(msg.to_string())
    }

    pub fn internal(msg: impl fmt::Display) -> Self {
        Error::Internal(msg.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
