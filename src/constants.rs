//! Global constants used throughout the solkit codebase.
//!
//! Timeouts, retry parameters and environment variable names that are used
//! across multiple modules live here so the magic numbers stay discoverable.

use std::time::Duration;

/// Environment variable that overrides the global config path.
pub const CONFIG_PATH_ENV: &str = "SOLKIT_CONFIG";

/// Environment variable that supplies a portal token when the config has none.
pub const TOKEN_ENV: &str = "SOLKIT_TOKEN";

/// Environment variable that disables progress bars when set.
pub const NO_PROGRESS_ENV: &str = "SOLKIT_NO_PROGRESS";

/// Starting delay for exponential backoff of portal requests (100ms).
///
/// Doubles on each retry attempt.
pub const STARTING_BACKOFF_DELAY_MS: u64 = 100;

/// Maximum backoff delay between portal request retries (5 seconds).
pub const MAX_BACKOFF_DELAY_MS: u64 = 5_000;

/// Default number of retries for transport failures.
pub const DEFAULT_RETRY_ATTEMPTS: usize = 3;

/// Default timeout for a single portal request (60 seconds).
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;

/// Default request timeout as a [`Duration`].
pub fn default_request_timeout() -> Duration {
    Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS)
}

/// Default number of items deployed at once.
///
/// Deployment is sequential unless the user opts in to parallel waves.
pub const DEFAULT_MAX_PARALLEL: usize = 1;

/// Upper bound accepted for `--max-parallel`.
///
/// Portals throttle aggressively above this.
pub const MAX_PARALLEL_LIMIT: usize = 16;
