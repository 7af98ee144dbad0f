//! Centralized constants for the built-in services
//!
//! Engine and reporter timing is never read from here: those values travel
//! in explicit config structs.

use std::time::Duration;

// ═══════════════════════════════════════════════════════════════
// Execution Timeouts
// ═══════════════════════════════════════════════════════════════

/// Timeout for `exec.run` when the request sets none
pub const EXEC_TIMEOUT: Duration = Duration::from_secs(60);

/// Timeout for each `http.send` request
pub const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Timeout for establishing HTTP connections
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

// ═══════════════════════════════════════════════════════════════
// HTTP Client Limits
// ═══════════════════════════════════════════════════════════════

/// Maximum number of HTTP redirects to follow
pub const REDIRECT_LIMIT: usize = 5;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_timeout_is_shorter_than_request_timeout() {
        assert!(CONNECT_TIMEOUT < HTTP_TIMEOUT);
    }
}
