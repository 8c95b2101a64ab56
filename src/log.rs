//! Logging macros for the OSAL
//!
//! Forwards to `defmt` on embedded builds and to the `log` crate (target
//! `osal`) on hosted builds. With neither feature the arguments are still
//! type-checked but nothing is emitted.

#[cfg(feature = "defmt")]
#[doc(hidden)]
#[macro_export]
macro_rules! __osal_log {
    ($level:ident, $($arg:tt)*) => { $crate::__defmt::$level!($($arg)*) };
}

#[cfg(all(feature = "log", not(feature = "defmt")))]
#[doc(hidden)]
#[macro_export]
macro_rules! __osal_log {
    ($level:ident, $($arg:tt)*) => { $crate::__log::$level!(target: "osal", $($arg)*) };
}

#[cfg(not(any(feature = "defmt", feature = "log")))]
#[doc(hidden)]
#[macro_export]
macro_rules! __osal_log {
    ($level:ident, $($arg:tt)*) => {{
        let _ = ::core::format_args!($($arg)*);
    }};
}

/// Trace message
#[macro_export]
macro_rules! trace {
    ($($arg:tt)*) => { $crate::__osal_log!(trace, $($arg)*) };
}

/// Debug message
#[macro_export]
macro_rules! debug {
    ($($arg:tt)*) => { $crate::__osal_log!(debug, $($arg)*) };
}

/// Info message
#[macro_export]
macro_rules! info {
    ($($arg:tt)*) => { $crate::__osal_log!(info, $($arg)*) };
}

/// Warning message
#[macro_export]
macro_rules! warn {
    ($($arg:tt)*) => { $crate::__osal_log!(warn, $($arg)*) };
}

/// Error message
#[macro_export]
macro_rules! error {
    ($($arg:tt)*) => { $crate::__osal_log!(error, $($arg)*) };
}
