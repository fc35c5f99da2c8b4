//! Error handling for the device engine.

use thiserror::Error;

/// Result type for device operations.
pub type DeviceResult<T> = Result<T, DeviceError>;

/// Errors surfaced at the device boundary.
///
/// The taxonomy is fixed: argument errors ([`InvalidArgument`],
/// [`BufferTooSmall`], [`JobNotFound`]), state errors ([`BadState`]),
/// capability errors ([`NotSupported`]), [`Fatal`], and [`Timeout`]. All
/// operations report failures synchronously through these variants; nothing
/// panics across the scheduler boundary.
///
/// [`InvalidArgument`]: DeviceError::InvalidArgument
/// [`BufferTooSmall`]: DeviceError::BufferTooSmall
/// [`JobNotFound`]: DeviceError::JobNotFound
/// [`BadState`]: DeviceError::BadState
/// [`NotSupported`]: DeviceError::NotSupported
/// [`Fatal`]: DeviceError::Fatal
/// [`Timeout`]: DeviceError::Timeout
#[derive(Error, Debug)]
pub enum DeviceError {
    /// Malformed call parameter.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Handle does not address a live job in the arena.
    #[error("unknown job handle: {0}")]
    JobNotFound(crate::job::JobHandle),

    /// Destination buffer smaller than the required size. The destination
    /// is left untouched.
    #[error("buffer too small: {required} bytes required, {provided} provided")]
    BufferTooSmall { required: usize, provided: usize },

    /// Operation invalid for the current session/job/device phase.
    #[error("{operation} not allowed in state {found}")]
    BadState {
        operation: &'static str,
        found: String,
    },

    /// Recognized but unimplemented feature or format.
    #[error("not supported: {0}")]
    NotSupported(String),

    /// Backend or device unavailable; the device stays offline.
    #[error("fatal device error: {0}")]
    Fatal(String),

    /// Wait budget exceeded before the job reached `Done`.
    #[error("wait budget exceeded")]
    Timeout,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DeviceError::BufferTooSmall {
            required: 16,
            provided: 4,
        };
        assert_eq!(
            err.to_string(),
            "buffer too small: 16 bytes required, 4 provided"
        );

        let err = DeviceError::BadState {
            operation: "submit",
            found: "Done".to_string(),
        };
        assert_eq!(err.to_string(), "submit not allowed in state Done");
    }
}
