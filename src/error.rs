//! Status taxonomy for badge operations.
//!
//! Every public operation resolves to either a value or one of these
//! statuses. The numeric codes are the ones the badge service puts in the
//! first field of a reply, so server-reported outcomes round-trip verbatim.

/// Result type for badge operations.
pub type Result<T> = std::result::Result<T, BadgeError>;

/// Wire code for a successful reply.
pub const STATUS_OK: i32 = 0;

/// Errors that can be returned by badge operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum BadgeError {
    /// Caller-supplied argument was missing, empty or out of range.
    #[error("invalid parameter")]
    InvalidParameter,

    /// Local allocation failure, or the service ran out of memory.
    #[error("out of memory")]
    OutOfMemory,

    /// The backing store reported a failure.
    #[error("error from store")]
    FromStore,

    /// A badge already exists for this application.
    #[error("badge already exists")]
    AlreadyExists,

    /// No badge exists for this application.
    #[error("badge does not exist")]
    NotExist,

    /// Caller is neither the owner nor a writable grantee.
    #[error("permission denied")]
    PermissionDenied,

    /// Transport or connection failure while the service was reachable.
    #[error("i/o error")]
    Io,

    /// The badge service is not running or did not answer.
    #[error("service not ready")]
    ServiceNotReady,

    /// Caller identity could not be resolved.
    #[error("invalid caller")]
    InvalidCaller,

    /// The service is reachable but did not answer before the deadline.
    #[error("request timed out")]
    Timeout,

    /// Status code the client does not know, passed through unchanged.
    #[error("unrecognized status {0}")]
    Unrecognized(i32),
}

impl BadgeError {
    /// Returns the numeric status code for this error.
    pub fn code(&self) -> i32 {
        match self {
            BadgeError::InvalidParameter => -1,
            BadgeError::OutOfMemory => -2,
            BadgeError::FromStore => -3,
            BadgeError::AlreadyExists => -4,
            BadgeError::NotExist => -6,
            BadgeError::PermissionDenied => -7,
            BadgeError::Io => -8,
            BadgeError::ServiceNotReady => -9,
            BadgeError::InvalidCaller => -10,
            BadgeError::Timeout => -11,
            BadgeError::Unrecognized(code) => *code,
        }
    }

    /// Maps a status code to an error. Returns `None` for success.
    ///
    /// Code -5 is the legacy bus-error status and decodes as [`BadgeError::Io`].
    pub fn from_code(code: i32) -> Option<Self> {
        let err = match code {
            STATUS_OK => return None,
            -1 => BadgeError::InvalidParameter,
            -2 => BadgeError::OutOfMemory,
            -3 => BadgeError::FromStore,
            -4 => BadgeError::AlreadyExists,
            -5 | -8 => BadgeError::Io,
            -6 => BadgeError::NotExist,
            -7 => BadgeError::PermissionDenied,
            -9 => BadgeError::ServiceNotReady,
            -10 => BadgeError::InvalidCaller,
            -11 => BadgeError::Timeout,
            other => BadgeError::Unrecognized(other),
        };
        Some(err)
    }

    /// Converts a status code into a `Result`.
    pub fn check(code: i32) -> Result<()> {
        match Self::from_code(code) {
            None => Ok(()),
            Some(err) => Err(err),
        }
    }

    /// Returns true if the connection to the service failed rather than the
    /// request itself, so retrying once the service is back may succeed.
    pub fn is_service_unavailable(&self) -> bool {
        matches!(
            self,
            BadgeError::ServiceNotReady | BadgeError::Timeout | BadgeError::Io
        )
    }
}

/// Collapses a result into its integer status.
pub fn status_of<T>(result: &Result<T>) -> i32 {
    match result {
        Ok(_) => STATUS_OK,
        Err(e) => e.code(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_code_is_not_an_error() {
        assert_eq!(BadgeError::from_code(0), None);
        assert!(BadgeError::check(0).is_ok());
    }

    #[test]
    fn test_known_codes_map_back() {
        for err in [
            BadgeError::InvalidParameter,
            BadgeError::OutOfMemory,
            BadgeError::FromStore,
            BadgeError::AlreadyExists,
            BadgeError::NotExist,
            BadgeError::PermissionDenied,
            BadgeError::Io,
            BadgeError::ServiceNotReady,
            BadgeError::InvalidCaller,
            BadgeError::Timeout,
        ] {
            assert_eq!(BadgeError::from_code(err.code()), Some(err));
        }
    }

    #[test]
    fn test_legacy_bus_error_decodes_as_io() {
        assert_eq!(BadgeError::from_code(-5), Some(BadgeError::Io));
    }

    #[test]
    fn test_unknown_code_passes_through() {
        let err = BadgeError::from_code(-42).unwrap();
        assert_eq!(err, BadgeError::Unrecognized(-42));
        assert_eq!(err.code(), -42);
        assert_eq!(err.to_string(), "unrecognized status -42");
    }

    #[test]
    fn test_status_of() {
        let ok: Result<u32> = Ok(5);
        let err: Result<u32> = Err(BadgeError::ServiceNotReady);
        assert_eq!(status_of(&ok), 0);
        assert_eq!(status_of(&err), -9);
    }

    #[test]
    fn test_is_service_unavailable() {
        assert!(BadgeError::ServiceNotReady.is_service_unavailable());
        assert!(BadgeError::Timeout.is_service_unavailable());
        assert!(BadgeError::Io.is_service_unavailable());
        assert!(!BadgeError::PermissionDenied.is_service_unavailable());
    }
}
