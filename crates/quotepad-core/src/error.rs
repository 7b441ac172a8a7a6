//! Recoverable failure taxonomy shared by the acquisition engine.

use core::fmt;

/// Every failure the engine absorbs. None of these halt the control loop.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum QuoteError {
    /// A join candidate did not reach `Connected` within the join timeout.
    ConnectivityTimeout,
    /// The request could not be issued or returned a non-success status.
    TransportFailure,
    /// The response body did not contain a usable quote.
    MalformedPayload,
    /// The removable-storage quote file is missing or unreadable.
    StorageUnavailable,
    /// The persistent byte store reported that a commit did not stick.
    PersistentStoreCommitFailure,
}

impl fmt::Display for QuoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::ConnectivityTimeout => "connectivity timeout",
            Self::TransportFailure => "transport failure",
            Self::MalformedPayload => "malformed payload",
            Self::StorageUnavailable => "storage unavailable",
            Self::PersistentStoreCommitFailure => "persistent store commit failure",
        };
        f.write_str(text)
    }
}
