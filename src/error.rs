//! Error codes shared by every module's typed error.
//!
//! DESIGN
//! ======
//! Each module owns its own `thiserror` enum. None of them abort the process:
//! callers degrade to a no-op and log the failure with its grepable code.

/// Grepable error code and retryable flag for structured diagnostics.
pub trait ErrorCode: std::fmt::Display {
    fn error_code(&self) -> &'static str;

    fn retryable(&self) -> bool {
        false
    }
}
