//! # MAGMA Error Handling
//!
//! Error type for the FIFO stack.
//!
//! Error handling in MAGMA follows these principles:
//! - Errors are typed and categorized
//! - No panics in production code paths
//! - Every error maps onto the POSIX code reported at the driver API
//! - Errors are `no_std` compatible

use core::fmt;

// =============================================================================
// RESULT TYPE
// =============================================================================

/// MAGMA Result type alias
pub type Result<T> = core::result::Result<T, Error>;

// =============================================================================
// ERRNO VALUES
// =============================================================================

/// POSIX error numbers reported at the driver API boundary
pub mod errno {
    //! Linux errno values

    /// Operation not permitted
    pub const EPERM: i32 = 1;
    /// No such entry
    pub const ENOENT: i32 = 2;
    /// I/O error
    pub const EIO: i32 = 5;
    /// Try again
    pub const EAGAIN: i32 = 11;
    /// Device or resource busy
    pub const EBUSY: i32 = 16;
    /// Invalid argument
    pub const EINVAL: i32 = 22;
    /// Operation not supported
    pub const ENOTSUP: i32 = 95;
    /// Connection timed out
    pub const ETIMEDOUT: i32 = 110;
    /// Interrupted system call, restart
    pub const ERESTARTSYS: i32 = 512;
}

// =============================================================================
// ERROR ENUM
// =============================================================================

/// MAGMA unified error type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    // =========================================================================
    // Generic Errors
    // =========================================================================
    /// Invalid parameter provided
    InvalidParameter,
    /// Resource not found
    NotFound,
    /// Operation timed out
    Timeout,
    /// Wait was cut short by a signal
    Interrupted,
    /// Resource is busy
    Busy,
    /// Hardware still transitioning, try again
    TryAgain,
    /// Operation not supported on this hardware
    NotSupported,
    /// Internal primitive failure
    Internal,

    // =========================================================================
    // Hardware Errors
    // =========================================================================
    /// Engine did not release the context and was flagged for reset
    EngineHang(u32),
    /// PBDMA did not unload the context
    PbdmaHang(u32),
    /// MMIO access error
    MmioError,

    // =========================================================================
    // Hardware Mutex Errors
    // =========================================================================
    /// No mutex token could be generated
    HwMutexUnavailable,
    /// Release attempted with a token that does not own the mutex
    HwMutexNotOwner,
}

impl Error {
    /// Negative POSIX error code reported for this error
    pub const fn errno(self) -> i32 {
        let code = match self {
            Self::InvalidParameter => errno::EINVAL,
            Self::NotFound => errno::ENOENT,
            Self::Timeout => errno::ETIMEDOUT,
            Self::Interrupted => errno::ERESTARTSYS,
            Self::Busy => errno::EBUSY,
            Self::TryAgain => errno::EAGAIN,
            Self::NotSupported => errno::ENOTSUP,
            Self::Internal => errno::EIO,
            Self::EngineHang(_) => errno::EBUSY,
            Self::PbdmaHang(_) => errno::EBUSY,
            Self::MmioError => errno::EIO,
            Self::HwMutexUnavailable => errno::EBUSY,
            Self::HwMutexNotOwner => errno::EPERM,
        };
        -code
    }

    /// Only a context switch still in flight is worth another attempt
    #[inline]
    pub const fn is_retryable(self) -> bool {
        matches!(self, Self::TryAgain)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            // Generic
            Self::InvalidParameter => write!(f, "invalid parameter"),
            Self::NotFound => write!(f, "resource not found"),
            Self::Timeout => write!(f, "operation timed out"),
            Self::Interrupted => write!(f, "operation interrupted"),
            Self::Busy => write!(f, "resource busy"),
            Self::TryAgain => write!(f, "try again"),
            Self::NotSupported => write!(f, "operation not supported"),
            Self::Internal => write!(f, "internal error"),

            // Hardware
            Self::EngineHang(id) => write!(f, "engine {} hung, flagged for reset", id),
            Self::PbdmaHang(id) => write!(f, "PBDMA {} did not unload context", id),
            Self::MmioError => write!(f, "MMIO access error"),

            // Hardware mutex
            Self::HwMutexUnavailable => write!(f, "hardware mutex token unavailable"),
            Self::HwMutexNotOwner => write!(f, "hardware mutex not owned by requester"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_errno_is_negative() {
        assert_eq!(Error::TryAgain.errno(), -11);
        assert_eq!(Error::Timeout.errno(), -110);
        assert_eq!(Error::EngineHang(3).errno(), -16);
        assert_eq!(Error::Interrupted.errno(), -512);
    }

    #[test]
    fn test_only_try_again_retries() {
        assert!(Error::TryAgain.is_retryable());
        assert!(!Error::Timeout.is_retryable());
        assert!(!Error::EngineHang(0).is_retryable());
        assert!(!Error::Interrupted.is_retryable());
    }

    #[test]
    fn test_error_display() {
        let s = std::format!("{}", Error::PbdmaHang(2));
        assert!(s.contains("PBDMA 2"));
    }
}
