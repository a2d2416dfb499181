//! Shared constants for end-to-end tests

/// Credential accepted by the mock upstream.
pub const TEST_TOKEN: &str = "tok-alice-0123456789";

/// A second accepted credential, for cache partitioning tests.
pub const OTHER_TOKEN: &str = "tok-bob-9876543210";

/// Credential the mock upstream rejects with 401.
pub const BAD_TOKEN: &str = "bad-token";

/// Per-request timeout for test clients.
pub const REQUEST_TIMEOUT_SECS: u64 = 10;

/// How long to wait for a spawned server to answer /health.
pub const SERVER_READY_TIMEOUT_MS: u64 = 5000;
pub const SERVER_READY_POLL_INTERVAL_MS: u64 = 20;
