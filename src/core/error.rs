//! Error types for the OSAL
//!
//! Every operation returns its status explicitly through [`OsResult`].
//! The set of codes is closed and shared by all components.

use core::fmt;

/// OSAL status code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u16)]
pub enum OsError {
    /// No error
    None = 0,

    /// Blocking operation did not complete within its timeout
    Timeout = 1,

    /// Caller misuse, detected before any blocking or kernel call
    InvalidArgument = 2,

    /// Object table full or the kernel refused to allocate
    ResourceExhausted = 3,

    /// Mutex released by a task that does not hold it, relocked without
    /// recursion, or acquired from a task that died holding it
    NotOwner = 4,

    /// Name already used by a live object of the same kind
    AlreadyExists = 5,

    /// Stale handle, or object deleted while the caller was waiting on it
    NotFound = 6,

    /// Underlying kernel failure not otherwise classified
    KernelError = 7,
}

/// Result type alias for OSAL operations
pub type OsResult<T> = Result<T, OsError>;

impl OsError {
    #[inline]
    pub fn is_ok(self) -> bool {
        self == OsError::None
    }

    #[inline]
    pub fn is_err(self) -> bool {
        self != OsError::None
    }

    /// A timeout is the expected outcome of a bounded wait, not a failure.
    #[inline]
    pub fn is_timeout(self) -> bool {
        self == OsError::Timeout
    }

    /// True for every error except [`OsError::Timeout`].
    #[inline]
    pub fn is_failure(self) -> bool {
        self.is_err() && !self.is_timeout()
    }

    /// Numeric status code
    #[inline]
    pub fn code(self) -> u16 {
        self as u16
    }

    /// Status for a numeric code, `None` if the code is unknown
    pub fn from_code(code: u16) -> Option<Self> {
        Some(match code {
            0 => OsError::None,
            1 => OsError::Timeout,
            2 => OsError::InvalidArgument,
            3 => OsError::ResourceExhausted,
            4 => OsError::NotOwner,
            5 => OsError::AlreadyExists,
            6 => OsError::NotFound,
            7 => OsError::KernelError,
            _ => return Option::None,
        })
    }

    /// Collapse a result into its status code
    #[inline]
    pub fn status<T>(result: &OsResult<T>) -> Self {
        match result {
            Ok(_) => OsError::None,
            Err(e) => *e,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OsError::None => "success",
            OsError::Timeout => "timeout",
            OsError::InvalidArgument => "invalid argument",
            OsError::ResourceExhausted => "resource exhausted",
            OsError::NotOwner => "not owner",
            OsError::AlreadyExists => "already exists",
            OsError::NotFound => "not found",
            OsError::KernelError => "kernel error",
        }
    }
}

impl fmt::Display for OsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(feature = "std")]
impl std::error::Error for OsError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_round_trip() {
        for code in 0..8 {
            let err = OsError::from_code(code).unwrap();
            assert_eq!(err.code(), code);
        }
        assert_eq!(OsError::from_code(8), None);
    }

    #[test]
    fn test_timeout_is_not_failure() {
        assert!(OsError::Timeout.is_err());
        assert!(!OsError::Timeout.is_failure());
        assert!(OsError::NotFound.is_failure());
        assert!(!OsError::None.is_failure());
    }

    #[test]
    fn test_status() {
        let ok: OsResult<u32> = Ok(3);
        let err: OsResult<u32> = Err(OsError::NotOwner);
        assert_eq!(OsError::status(&ok), OsError::None);
        assert_eq!(OsError::status(&err), OsError::NotOwner);
    }
}
