//! Error types for email composition.

/// Result type alias for composer operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Composer error types.
///
/// The validation variants render exactly their message so callers can show
/// it to the user unchanged.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed address, or an address list that is missing or invalid.
    #[error("{0}")]
    InvalidAddress(String),

    /// Missing or empty argument, such as a header name or value.
    #[error("{0}")]
    InvalidArgument(String),

    /// Transport configuration that cannot produce a session.
    #[error("{0}")]
    InvalidTransportConfig(String),

    /// Operation not allowed in the composer's current state.
    #[error("{0}")]
    IllegalState(String),

    /// The MIME layer rejected a value while assembling the message.
    #[error("MIME error: {0}")]
    Mime(#[from] mailforge_mime::Error),
}

impl Error {
    /// Creates an invalid-address error.
    #[must_use]
    pub fn invalid_address(message: impl Into<String>) -> Self {
        Self::InvalidAddress(message.into())
    }

    /// Creates an invalid-argument error.
    #[must_use]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Creates an illegal-state error.
    #[must_use]
    pub fn illegal_state(message: impl Into<String>) -> Self {
        Self::IllegalState(message.into())
    }

    /// Returns true for [`Error::InvalidAddress`].
    #[must_use]
    pub const fn is_invalid_address(&self) -> bool {
        matches!(self, Self::InvalidAddress(_))
    }

    /// Returns true for [`Error::InvalidArgument`].
    #[must_use]
    pub const fn is_invalid_argument(&self) -> bool {
        matches!(self, Self::InvalidArgument(_))
    }

    /// Returns true for [`Error::InvalidTransportConfig`].
    #[must_use]
    pub const fn is_invalid_transport_config(&self) -> bool {
        matches!(self, Self::InvalidTransportConfig(_))
    }

    /// Returns true for [`Error::IllegalState`].
    #[must_use]
    pub const fn is_illegal_state(&self) -> bool {
        matches!(self, Self::IllegalState(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_errors_render_their_message() {
        let err = Error::invalid_address("Address List invalid");
        assert_eq!(err.to_string(), "Address List invalid");
        assert!(err.is_invalid_address());
        assert!(!err.is_illegal_state());
    }

    #[test]
    fn test_mime_error_is_prefixed() {
        let err: Error = mailforge_mime::Error::InvalidHeader("x".into()).into();
        assert_eq!(err.to_string(), "MIME error: Invalid MIME header: x");
    }
}
