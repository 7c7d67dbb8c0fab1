//! Unified error type for every player surface.
//!
//! Errors are values, never panics.  Two broad kinds:
//!
//! - **Fatal** — the current call aborts and the player is left in a defined
//!   but unusable state; the caller should close it.  `CorruptFile`,
//!   `UnsupportedVersion`, `InternalBufferTooSmall`, and a `ShortRead` in the
//!   middle of a record are fatal.
//! - **Expected** — returned to the caller with player state still valid.
//!   `BadNodeName`, `BadParam`, `NoMatch`, `IllegalPosition`,
//!   `NotImplemented`, `InvalidOperation`.
//!
//! An error returned by a [`NodeNotifications`](crate::notify::NodeNotifications)
//! sink aborts the current dispatch call and propagates unchanged.

use std::io;
use thiserror::Error;

use crate::header::Version;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Corrupt recording: {0}")]
    CorruptFile(String),
    #[error("Unsupported recording version {0}")]
    UnsupportedVersion(Version),
    #[error("Bad parameter: {0}")]
    BadParam(String),
    #[error("No node named '{0}'")]
    BadNodeName(String),
    #[error("Short read: wanted {wanted} bytes, got {got}")]
    ShortRead { wanted: usize, got: usize },
    #[error("No matching record found")]
    NoMatch,
    #[error("Requested position is beyond the end of the recording")]
    IllegalPosition,
    #[error("Invalid operation: {0}")]
    InvalidOperation(&'static str),
    #[error("Operation is not implemented")]
    NotImplemented,
    #[error("Record of {0} bytes is larger than the player's internal buffer")]
    InternalBufferTooSmall(u64),
    #[error("Codec error: {0}")]
    Codec(String),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    /// Shorthand used by decode/validation paths throughout the crate.
    pub(crate) fn corrupt(msg: impl Into<String>) -> Self {
        Error::CorruptFile(msg.into())
    }

    /// Fatal errors leave the player unusable; the caller should close it.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::CorruptFile(_)
                | Error::UnsupportedVersion(_)
                | Error::InternalBufferTooSmall(_)
                | Error::ShortRead { .. }
                | Error::Io(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
